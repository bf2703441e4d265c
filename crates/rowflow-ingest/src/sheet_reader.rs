//! Multi-group spreadsheet reader.
//!
//! The reader scans a [`TableSource`] twice: [`SheetReader::create_filter`]
//! snapshots the structure (groups, row numbers, raw cells, schema version),
//! then [`SheetReader::read`] re-opens the source and streams outcome
//! entries for exactly the rows the filter selects. A single malformed row
//! never aborts the sequence; only a source-level failure does, degrading
//! the read to one synthetic error entry.

use std::collections::BTreeMap;

use tracing::{debug, error};

use rowflow_model::{
    ActionType, EntryPayload, ImportEntry, ImportError, Result, Severity, resolve_action_type,
};

use crate::binding::BindingTable;
use crate::filter::{RawCells, ReadFilter};
use crate::mapper::{EntryHook, RowMapper};
use crate::source::{TableScan, TableSource};

type MapperSelector<L, N> = Box<dyn Fn(u32) -> Box<dyn RowMapper<L, N>>>;

pub struct SheetReader<S, L, N> {
    source: S,
    bindings: BindingTable<L>,
    mapper_for: MapperSelector<L, N>,
    empty_cell: Box<dyn Fn(&str) -> bool>,
    header_message: Box<dyn Fn() -> String>,
    empty_message: Box<dyn Fn(usize) -> String>,
    ignored_message: Box<dyn Fn(usize) -> String>,
    line_message: Box<dyn Fn(&N) -> String>,
    headers: BTreeMap<String, Vec<String>>,
    version: u32,
}

impl<S: TableSource, L: Default, N> SheetReader<S, L, N> {
    pub fn new(
        source: S,
        bindings: BindingTable<L>,
        mapper_for: impl Fn(u32) -> Box<dyn RowMapper<L, N>> + 'static,
    ) -> Self {
        Self {
            source,
            bindings,
            mapper_for: Box::new(mapper_for),
            empty_cell: Box::new(|cell| cell.trim().is_empty()),
            header_message: Box::new(|| "The table has headers".to_string()),
            empty_message: Box::new(|index| format!("Row at index {} is empty (EOF)", index + 1)),
            ignored_message: Box::new(|index| format!("Row at index {} is ignored", index + 1)),
            line_message: Box::new(|_| "Imported instance".to_string()),
            headers: BTreeMap::new(),
            version: 0,
        }
    }

    /// Replaces the predicate deciding whether a raw cell counts as empty.
    pub fn with_empty_cell(mut self, predicate: impl Fn(&str) -> bool + 'static) -> Self {
        self.empty_cell = Box::new(predicate);
        self
    }

    pub fn with_header_message(mut self, message: impl Fn() -> String + 'static) -> Self {
        self.header_message = Box::new(message);
        self
    }

    pub fn with_empty_message(mut self, message: impl Fn(usize) -> String + 'static) -> Self {
        self.empty_message = Box::new(message);
        self
    }

    pub fn with_ignored_message(mut self, message: impl Fn(usize) -> String + 'static) -> Self {
        self.ignored_message = Box::new(message);
        self
    }

    /// Per-node message used on mapped entries, applied after the processor
    /// chain has run so rewritten nodes are reflected.
    pub fn with_line_message(mut self, message: impl Fn(&N) -> String + 'static) -> Self {
        self.line_message = Box::new(message);
        self
    }

    pub fn filename(&self) -> &str {
        self.source.filename()
    }

    /// Header strings captured per group during the last read.
    pub fn headers(&self) -> &BTreeMap<String, Vec<String>> {
        &self.headers
    }

    /// Schema version detected during the last filter creation or read.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Swaps the underlying source and drops captured state, for a new
    /// import run.
    pub fn replace_source(&mut self, source: S) {
        self.source = source;
        self.headers.clear();
        self.version = 0;
    }

    /// Pre-scans the source into an immutable structural snapshot.
    ///
    /// The schema version is parsed from the first cell of the first row of
    /// the first group; any failure here is fatal and aborts the import
    /// before a single row is read.
    pub fn create_filter(&self) -> Result<ReadFilter> {
        let filename = self.source.filename().to_string();
        let fail = |reason: String| ImportError::FilterCreation {
            filename: filename.clone(),
            reason,
        };

        let mut scan = self.source.open().map_err(|e| fail(e.to_string()))?;
        let groups = scan.group_names().to_vec();
        let mut rows: BTreeMap<String, BTreeMap<usize, RawCells>> = groups
            .iter()
            .map(|group| (group.clone(), BTreeMap::new()))
            .collect();
        while let Some(row) = scan.next_row().map_err(|e| fail(e.to_string()))? {
            let Some(group) = groups.get(row.group_index) else {
                continue;
            };
            if let Some(group_rows) = rows.get_mut(group) {
                group_rows.insert(row.row_number, RawCells::new(row.cells));
            }
        }

        let first_group = groups
            .first()
            .ok_or_else(|| fail("source has no groups".to_string()))?;
        let first_cell = rows
            .get(first_group)
            .and_then(|group_rows| group_rows.values().next())
            .and_then(RawCells::take)
            .and_then(|mut cells| cells.next())
            .ok_or_else(|| fail("first row of first group has no cells".to_string()))?;
        let version = first_cell
            .trim()
            .parse::<u32>()
            .map_err(|e| fail(format!("cannot parse version from '{first_cell}': {e}")))?;

        Ok(ReadFilter::new(version, filename, groups, rows))
    }

    /// Re-opens the source and streams one outcome entry per selected row.
    ///
    /// Every entry passes through `on_entry` (the processor chain) before it
    /// is yielded; a hook failure converts that entry into a row-scoped
    /// error entry. A failure to open or enumerate the source degrades the
    /// sequence to one synthetic error entry.
    pub fn read<'r>(
        &'r mut self,
        filter: ReadFilter,
        on_entry: EntryHook<'r, N, L>,
    ) -> SheetEntries<'r, S, L, N> {
        self.version = filter.version();
        let mapper = (self.mapper_for)(filter.version());
        let mapper_version = filter.version();

        match self.source.open() {
            Ok(scan) => {
                let live_groups = scan.group_names().to_vec();
                let mut offsets = BTreeMap::new();
                let mut total = 0;
                for group in &live_groups {
                    if filter.contains_group(group) {
                        offsets.insert(group.clone(), total);
                        total += filter.group_row_count(group);
                    }
                }
                SheetEntries {
                    reader: self,
                    on_entry,
                    scan: Some(scan),
                    filter,
                    live_groups,
                    offsets,
                    total,
                    mapper,
                    mapper_version,
                    skip_group: None,
                    fatal: None,
                    finished: false,
                }
            }
            Err(e) => SheetEntries {
                live_groups: filter.groups().to_vec(),
                reader: self,
                on_entry,
                scan: None,
                filter,
                offsets: BTreeMap::new(),
                total: 0,
                mapper,
                mapper_version,
                skip_group: None,
                fatal: Some(e),
                finished: false,
            },
        }
    }
}

/// Lazy outcome-entry sequence over one read pass.
pub struct SheetEntries<'r, S, L, N> {
    reader: &'r mut SheetReader<S, L, N>,
    on_entry: EntryHook<'r, N, L>,
    scan: Option<Box<dyn TableScan>>,
    filter: ReadFilter,
    live_groups: Vec<String>,
    offsets: BTreeMap<String, usize>,
    total: usize,
    mapper: Box<dyn RowMapper<L, N>>,
    mapper_version: u32,
    /// Group currently being skipped after an empty row.
    skip_group: Option<usize>,
    fatal: Option<ImportError>,
    finished: bool,
}

impl<'r, S: TableSource, L: Default, N> SheetEntries<'r, S, L, N> {
    /// Whether the sequence may still produce entries.
    pub fn has_next(&self) -> bool {
        !self.finished && (self.scan.is_some() || self.fatal.is_some())
    }

    /// Drains all remaining input without emitting entries, releasing the
    /// source deterministically.
    pub fn abort(&mut self) {
        if let Some(mut scan) = self.scan.take() {
            while let Ok(Some(_)) = scan.next_row() {}
        }
        self.fatal = None;
        self.finished = true;
    }

    pub fn next_entry(&mut self) -> Option<ImportEntry<N, L>> {
        if self.finished {
            return None;
        }
        if let Some(err) = self.fatal.take() {
            return Some(self.finish_fatal(err));
        }
        loop {
            let Some(scan) = self.scan.as_mut() else {
                self.finished = true;
                return None;
            };
            let row = match scan.next_row() {
                Ok(Some(row)) => row,
                Ok(None) => {
                    self.scan = None;
                    self.finished = true;
                    return None;
                }
                Err(e) => return Some(self.finish_fatal(e)),
            };
            let Some(group) = self.live_groups.get(row.group_index).cloned() else {
                continue;
            };
            if !self.filter.contains_row(&group, row.row_number) {
                continue;
            }
            if self.skip_group == Some(row.group_index) {
                continue;
            }

            let mut entry = self.classify(row.group_index, &group, row.row_number, row.cells);
            if let Err(err) = (self.on_entry)(&mut entry) {
                error!(index = entry.index, error = %err, "processor failed, row degraded to error entry");
                let mut error_entry = entry.into_error(err.to_string());
                if let Err(chain_err) = (self.on_entry)(&mut error_entry) {
                    debug!(error = %chain_err, "processor failed again on the error entry");
                }
                return Some(error_entry);
            }
            if entry.is_mapped() {
                entry.message = self.mapped_message(&entry);
            }
            return Some(entry);
        }
    }

    fn mapped_message(&self, entry: &ImportEntry<N, L>) -> String {
        entry
            .nodes()
            .iter()
            .map(|node| (self.reader.line_message)(node))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn finish_fatal(&mut self, err: ImportError) -> ImportEntry<N, L> {
        error!(error = %err, "source failure aborts the read");
        self.scan = None;
        self.finished = true;
        let mut entry = ImportEntry::synthetic_error(err.to_string(), self.live_groups.clone());
        if let Err(chain_err) = (self.on_entry)(&mut entry) {
            debug!(error = %chain_err, "processor failed on the synthetic error entry");
        }
        entry
    }

    fn classify(
        &mut self,
        group_index: usize,
        group: &str,
        row_number: usize,
        cells: Vec<String>,
    ) -> ImportEntry<N, L> {
        let index = self.offsets.get(group).copied().unwrap_or(0) + row_number;
        let groups = self.live_groups.clone();
        let total = self.total;
        let base = move |payload: EntryPayload<N, L>| {
            ImportEntry::new(payload)
                .with_group(group.to_string())
                .with_groups(groups)
                .with_index(index)
                .with_index_in_group(row_number + 1)
                .with_count(total)
        };

        // Header zone: row 0 always; further leading rows per the mapper.
        if row_number == 0 || row_number < self.mapper.skip_lines() {
            if row_number == 0 {
                let first_cell = cells.first().cloned().unwrap_or_default();
                let Ok(version) = first_cell.trim().parse::<u32>() else {
                    error!(group, "cannot re-derive version from header row");
                    return base(EntryPayload::Error)
                        .with_severity(Severity::Error)
                        .with_message(format!(
                            "cannot re-derive version from header cell '{first_cell}'"
                        ));
                };
                self.reader.headers.insert(group.to_string(), cells);
                if version != self.mapper_version {
                    self.mapper = (self.reader.mapper_for)(version);
                    self.mapper_version = version;
                }
                self.reader.version = version;
            }
            return base(EntryPayload::Header).with_message((self.reader.header_message)());
        }

        let mut line = L::default();
        let headers = self
            .reader
            .headers
            .get(group)
            .cloned()
            .unwrap_or_default();
        let applied = match self.reader.bindings.apply(
            &mut line,
            &cells,
            self.reader.empty_cell.as_ref(),
            &headers,
            row_number,
        ) {
            Ok(applied) => applied,
            Err(err) => {
                error!(group, row_number, error = %err, "cell conversion failed");
                return base(EntryPayload::Error)
                    .with_severity(Severity::Error)
                    .with_message(err.to_string());
            }
        };

        if applied.empty {
            // End-of-group sentinel: remaining rows of this group are
            // consumed without producing entries.
            self.skip_group = Some(group_index);
            return base(EntryPayload::Empty).with_message((self.reader.empty_message)(index));
        }

        let action_type = resolve_action_type(&applied.flagged);
        if action_type == ActionType::Ignore {
            return base(EntryPayload::Ignored)
                .with_severity(Severity::Warn)
                .with_action_type(ActionType::Ignore)
                .with_message((self.reader.ignored_message)(index));
        }

        if self.mapper.needed() {
            match self.mapper.map(&line) {
                Ok(node) => base(EntryPayload::Mapped {
                    nodes: node.into_iter().collect(),
                })
                .with_action_type(action_type),
                Err(err) => {
                    error!(group, row_number, error = %err, "row mapper failed");
                    base(EntryPayload::Error)
                        .with_severity(Severity::Error)
                        .with_message(err.to_string())
                }
            }
        } else {
            base(EntryPayload::Line { line }).with_action_type(action_type)
        }
    }
}

impl<'r, S: TableSource, L: Default, N> Iterator for SheetEntries<'r, S, L, N> {
    type Item = ImportEntry<N, L>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry()
    }
}
