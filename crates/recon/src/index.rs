use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::CanonicalRecord;

/// Records grouped by invoice key; each group keeps source row order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InvoiceIndex {
    groups: BTreeMap<String, Vec<CanonicalRecord>>,
}

impl InvoiceIndex {
    pub fn get(&self, key: &str) -> Option<&[CanonicalRecord]> {
        self.groups.get(key).map(|v| v.as_slice())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.groups.contains_key(key)
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[CanonicalRecord])> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total records across all keys.
    pub fn record_count(&self) -> usize {
        self.groups.values().map(|v| v.len()).sum()
    }
}

/// Group records by invoice key.
pub fn build_index(records: &[CanonicalRecord]) -> InvoiceIndex {
    let mut groups: BTreeMap<String, Vec<CanonicalRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.invoice_key.clone())
            .or_default()
            .push(record.clone());
    }
    InvoiceIndex { groups }
}
