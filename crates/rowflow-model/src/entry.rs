//! Outcome entries: the unit flowing through the whole pipeline.
//!
//! Every row or group event produced by a reader yields exactly one
//! [`ImportEntry`]. The classification is a closed tagged set
//! ([`EntryPayload`]); processors declare the subset of kinds they handle
//! through a [`KindSet`].

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use serde::{Deserialize, Serialize};

use crate::action::ActionType;

/// Diagnostic level attached to an outcome entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    #[default]
    Info,
    Warn,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Save-depth counter shared by reference across every entry derived from
/// the same logical row.
///
/// Cloning shares the underlying counter rather than duplicating the value,
/// so cooperating downstream consumers observe and increment one cell. The
/// pipeline is single-threaded; the atomic is the shared-ownership cell, not
/// a synchronization promise.
#[derive(Clone, Default)]
pub struct SaveDepth(Arc<AtomicI32>);

impl SaveDepth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> i32 {
        self.0.load(Ordering::Relaxed)
    }

    /// Increments the shared counter and returns the previous value.
    pub fn increment(&self) -> i32 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    pub fn set(&self, value: i32) {
        self.0.store(value, Ordering::Relaxed);
    }
}

impl fmt::Debug for SaveDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SaveDepth({})", self.get())
    }
}

/// Discriminant of an entry's classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    Header,
    Empty,
    Ignored,
    Error,
    Mapped,
    Line,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Header => "header",
            EntryKind::Empty => "empty",
            EntryKind::Ignored => "ignored",
            EntryKind::Error => "error",
            EntryKind::Mapped => "mapped",
            EntryKind::Line => "line",
        }
    }

    const fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// A small set over [`EntryKind`], used by processors to declare the
/// entry classifications they handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindSet(u8);

impl KindSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn all() -> Self {
        Self(
            EntryKind::Header.bit()
                | EntryKind::Empty.bit()
                | EntryKind::Ignored.bit()
                | EntryKind::Error.bit()
                | EntryKind::Mapped.bit()
                | EntryKind::Line.bit(),
        )
    }

    pub fn of(kinds: &[EntryKind]) -> Self {
        kinds.iter().fold(Self::empty(), |set, kind| set.with(*kind))
    }

    pub const fn with(self, kind: EntryKind) -> Self {
        Self(self.0 | kind.bit())
    }

    pub const fn contains(self, kind: EntryKind) -> bool {
        self.0 & kind.bit() != 0
    }
}

impl Default for KindSet {
    fn default() -> Self {
        Self::all()
    }
}

/// Closed classification of an outcome entry.
///
/// `N` is the mapped domain object ("node") type, `L` the typed-line type
/// produced by a binding table.
#[derive(Debug, Clone)]
pub enum EntryPayload<N, L> {
    /// A header-zone row; carries no nodes.
    Header,
    /// A row whose cells were all empty; ends the current group.
    Empty,
    /// A data row whose action type resolved to `Ignore`.
    Ignored,
    /// A row- or source-scoped failure; never carries nodes.
    Error,
    /// A data row mapped into zero or more domain objects.
    Mapped { nodes: Vec<N> },
    /// A data row returned as its raw typed line, unwrapped.
    Line { line: L },
}

impl<N, L> EntryPayload<N, L> {
    pub fn kind(&self) -> EntryKind {
        match self {
            EntryPayload::Header => EntryKind::Header,
            EntryPayload::Empty => EntryKind::Empty,
            EntryPayload::Ignored => EntryKind::Ignored,
            EntryPayload::Error => EntryKind::Error,
            EntryPayload::Mapped { .. } => EntryKind::Mapped,
            EntryPayload::Line { .. } => EntryKind::Line,
        }
    }
}

/// One row's (or one group's) processing result.
#[derive(Debug, Clone)]
pub struct ImportEntry<N, L> {
    pub payload: EntryPayload<N, L>,
    /// Absolute position across all groups.
    pub index: usize,
    /// Position within the current group.
    pub index_in_group: usize,
    /// Name of the group the row belongs to.
    pub group: String,
    /// All group names of the source, informational.
    pub groups: Vec<String>,
    /// Total expected rows, computed from the filter.
    pub count: usize,
    /// Identifiers to suppress downstream.
    pub excluded_ids: BTreeSet<u64>,
    pub action_type: ActionType,
    pub severity: Severity,
    pub message: String,
    /// Shared across copies of the same logical row.
    pub save_depth: SaveDepth,
}

impl<N, L> ImportEntry<N, L> {
    pub fn new(payload: EntryPayload<N, L>) -> Self {
        Self {
            payload,
            index: 0,
            index_in_group: 0,
            group: String::new(),
            groups: Vec::new(),
            count: 1,
            excluded_ids: BTreeSet::new(),
            action_type: ActionType::Persist,
            severity: Severity::Info,
            message: String::new(),
            save_depth: SaveDepth::new(),
        }
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn with_index_in_group(mut self, index_in_group: usize) -> Self {
        self.index_in_group = index_in_group;
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_action_type(mut self, action_type: ActionType) -> Self {
        self.action_type = action_type;
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn kind(&self) -> EntryKind {
        self.payload.kind()
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self.payload, EntryPayload::Mapped { .. })
    }

    /// The mapped nodes; an empty slice for every non-`Mapped` payload.
    pub fn nodes(&self) -> &[N] {
        match &self.payload {
            EntryPayload::Mapped { nodes } => nodes,
            _ => &[],
        }
    }

    /// Mutable access to the mapped nodes, for processors that rewrite them.
    pub fn nodes_mut(&mut self) -> Option<&mut Vec<N>> {
        match &mut self.payload {
            EntryPayload::Mapped { nodes } => Some(nodes),
            _ => None,
        }
    }

    pub fn into_nodes(self) -> Vec<N> {
        match self.payload {
            EntryPayload::Mapped { nodes } => nodes,
            _ => Vec::new(),
        }
    }

    /// The raw typed line, when the mapper left the row unwrapped.
    pub fn line(&self) -> Option<&L> {
        match &self.payload {
            EntryPayload::Line { line } => Some(line),
            _ => None,
        }
    }

    /// Converts this entry into a row-scoped error entry, keeping its
    /// position metadata and the shared save-depth cell.
    pub fn into_error(mut self, message: impl Into<String>) -> Self {
        self.payload = EntryPayload::Error;
        self.severity = Severity::Error;
        self.message = message.into();
        self
    }

    /// A source-scoped synthetic error entry with default position metadata.
    pub fn synthetic_error(message: impl Into<String>, groups: Vec<String>) -> Self {
        ImportEntry::new(EntryPayload::Error)
            .with_groups(groups)
            .with_severity(Severity::Error)
            .with_message(message)
    }

    /// A copy of this entry with the node payload stripped. The save-depth
    /// cell stays shared with the original.
    pub fn without_nodes(&self) -> Self
    where
        L: Clone,
    {
        let payload = match &self.payload {
            EntryPayload::Header => EntryPayload::Header,
            EntryPayload::Empty => EntryPayload::Empty,
            EntryPayload::Ignored => EntryPayload::Ignored,
            EntryPayload::Error => EntryPayload::Error,
            EntryPayload::Mapped { .. } => EntryPayload::Mapped { nodes: Vec::new() },
            EntryPayload::Line { line } => EntryPayload::Line { line: line.clone() },
        };
        Self {
            payload,
            index: self.index,
            index_in_group: self.index_in_group,
            group: self.group.clone(),
            groups: self.groups.clone(),
            count: self.count,
            excluded_ids: self.excluded_ids.clone(),
            action_type: self.action_type,
            severity: self.severity,
            message: self.message.clone(),
            save_depth: self.save_depth.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Entry = ImportEntry<String, Vec<String>>;

    #[test]
    fn save_depth_is_shared_across_clones() {
        let entry = Entry::new(EntryPayload::Mapped {
            nodes: vec!["a".to_string()],
        });
        let copy = entry.clone();
        entry.save_depth.increment();
        copy.save_depth.increment();
        assert_eq!(entry.save_depth.get(), 2);
        assert_eq!(copy.save_depth.get(), 2);
    }

    #[test]
    fn without_nodes_keeps_shared_save_depth() {
        let entry = Entry::new(EntryPayload::Mapped {
            nodes: vec!["a".to_string()],
        });
        let stripped = entry.without_nodes();
        assert!(stripped.nodes().is_empty());
        entry.save_depth.increment();
        assert_eq!(stripped.save_depth.get(), 1);
    }

    #[test]
    fn error_entries_carry_no_nodes() {
        let entry = Entry::new(EntryPayload::Mapped {
            nodes: vec!["a".to_string()],
        })
        .with_index(4);
        let error = entry.into_error("boom");
        assert_eq!(error.kind(), EntryKind::Error);
        assert_eq!(error.severity, Severity::Error);
        assert!(error.nodes().is_empty());
        assert_eq!(error.index, 4);
    }

    #[test]
    fn kind_set_membership() {
        let set = KindSet::of(&[EntryKind::Mapped, EntryKind::Line]);
        assert!(set.contains(EntryKind::Mapped));
        assert!(set.contains(EntryKind::Line));
        assert!(!set.contains(EntryKind::Header));
        assert!(KindSet::all().contains(EntryKind::Error));
        assert!(!KindSet::empty().contains(EntryKind::Empty));
    }
}
