use std::fmt;

#[derive(Debug)]
pub enum IoError {
    /// Workbook or CSV bytes could not be parsed.
    Read(String),
    /// Workbook-to-bytes conversion failed. No partial output is returned.
    Serialization(String),
    /// Packaging the annotated files into the archive failed.
    Archive(String),
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(msg) => write!(f, "read error: {msg}"),
            Self::Serialization(msg) => write!(f, "serialization failed: {msg}"),
            Self::Archive(msg) => write!(f, "archive error: {msg}"),
        }
    }
}

impl std::error::Error for IoError {}
