use std::fmt;

use crate::model::FileSide;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Column or start-row settings do not fit the loaded sheet.
    InvalidConfiguration { file: FileSide, reason: String },
}

impl ReconError {
    pub fn invalid(file: FileSide, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            file,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::InvalidConfiguration { file, reason } => {
                write!(f, "invalid configuration for {file}: {reason}")
            }
        }
    }
}

impl std::error::Error for ReconError {}
