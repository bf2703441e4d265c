//! Pre-scan filter: an immutable structural snapshot of a source.
//!
//! A [`ReadFilter`] is created once per parse invocation by a reader's
//! pre-scan pass. A caller-supplied adjustment hook may remove groups or
//! rows before the real read; the reader then restricts itself to exactly
//! the groups and row numbers recorded here, and computes every entry
//! count from the filter rather than from live enumeration.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::vec;

/// Single-use lazy raw-cell sequence for one row.
///
/// The first [`take`](RawCells::take) yields the cell iterator; re-iterating
/// after that is unsupported and every later take returns `None`.
pub struct RawCells(RefCell<Option<vec::IntoIter<String>>>);

impl RawCells {
    pub fn new(cells: Vec<String>) -> Self {
        Self(RefCell::new(Some(cells.into_iter())))
    }

    pub fn take(&self) -> Option<vec::IntoIter<String>> {
        self.0.borrow_mut().take()
    }
}

impl fmt::Debug for RawCells {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.0.borrow().is_some() {
            "pending"
        } else {
            "consumed"
        };
        write!(f, "RawCells({state})")
    }
}

/// Structural snapshot of a source: detected schema version, ordered
/// groups, and per-group row numbers with their raw cells.
#[derive(Debug)]
pub struct ReadFilter {
    version: u32,
    filename: String,
    groups: Vec<String>,
    rows: BTreeMap<String, BTreeMap<usize, RawCells>>,
}

impl ReadFilter {
    pub fn new(
        version: u32,
        filename: impl Into<String>,
        groups: Vec<String>,
        rows: BTreeMap<String, BTreeMap<usize, RawCells>>,
    ) -> Self {
        Self {
            version,
            filename: filename.into(),
            groups,
            rows,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn contains_group(&self, group: &str) -> bool {
        self.groups.iter().any(|name| name == group)
    }

    pub fn contains_row(&self, group: &str, row_number: usize) -> bool {
        self.rows
            .get(group)
            .is_some_and(|rows| rows.contains_key(&row_number))
    }

    /// Selected row numbers for a group, ascending.
    pub fn row_numbers(&self, group: &str) -> Vec<usize> {
        self.rows
            .get(group)
            .map(|rows| rows.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn group_row_count(&self, group: &str) -> usize {
        self.rows.get(group).map(BTreeMap::len).unwrap_or(0)
    }

    /// Total selected rows across all groups.
    pub fn total_row_count(&self) -> usize {
        self.groups
            .iter()
            .map(|group| self.group_row_count(group))
            .sum()
    }

    /// Takes a row's single-use raw-cell sequence, if still unconsumed.
    pub fn take_cells(&self, group: &str, row_number: usize) -> Option<vec::IntoIter<String>> {
        self.rows
            .get(group)?
            .get(&row_number)
            .and_then(RawCells::take)
    }

    pub fn remove_row(&mut self, group: &str, row_number: usize) {
        if let Some(rows) = self.rows.get_mut(group) {
            rows.remove(&row_number);
        }
    }

    pub fn remove_group(&mut self, group: &str) {
        self.groups.retain(|name| name != group);
        self.rows.remove(group);
    }

    pub fn retain_rows(&mut self, group: &str, mut keep: impl FnMut(usize) -> bool) {
        if let Some(rows) = self.rows.get_mut(group) {
            rows.retain(|row_number, _| keep(*row_number));
        }
    }
}
