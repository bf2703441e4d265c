//! Serializable import report handed to an external renderer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entry::{EntryKind, ImportEntry, Severity};

/// Flat, serializable view of one outcome entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrySummary {
    pub kind: EntryKind,
    pub index: usize,
    pub index_in_group: usize,
    pub group: String,
    pub severity: Severity,
    pub message: String,
    pub node_count: usize,
}

impl EntrySummary {
    pub fn from_entry<N, L>(entry: &ImportEntry<N, L>) -> Self {
        Self {
            kind: entry.kind(),
            index: entry.index,
            index_in_group: entry.index_in_group,
            group: entry.group.clone(),
            severity: entry.severity,
            message: entry.message.clone(),
            node_count: entry.nodes().len(),
        }
    }
}

/// The output surface of a parse: detected schema version, group names,
/// per-group header strings, and one summary per outcome entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportReport {
    pub version: u32,
    pub filename: String,
    pub groups: Vec<String>,
    pub headers: BTreeMap<String, Vec<String>>,
    pub entries: Vec<EntrySummary>,
}

impl ImportReport {
    pub fn new(version: u32, filename: impl Into<String>, groups: Vec<String>) -> Self {
        Self {
            version,
            filename: filename.into(),
            groups,
            headers: BTreeMap::new(),
            entries: Vec::new(),
        }
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, Vec<String>>) -> Self {
        self.headers = headers;
        self
    }

    pub fn push<N, L>(&mut self, entry: &ImportEntry<N, L>) {
        self.entries.push(EntrySummary::from_entry(entry));
    }

    pub fn error_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.severity == Severity::Warn)
            .count()
    }

    pub fn mapped_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.kind == EntryKind::Mapped)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}
