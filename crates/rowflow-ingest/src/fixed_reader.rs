//! Single-group fixed-width text reader.
//!
//! Lines are sliced into fields by declared character ranges; there is no
//! type conversion, no empty-row detection, and no action-type logic —
//! every produced data entry is `Persist`/`Info`. The first `skip_lines`
//! lines are header entries unconditionally. Failure isolation matches the
//! sheet reader: a mapper failure is row-scoped, a source failure degrades
//! the read to one synthetic error entry.

use std::collections::BTreeMap;
use std::io;

use tracing::{debug, error};

use rowflow_model::{EntryPayload, ImportEntry, ImportError, Result, Severity};

use crate::binding::FixedBindingTable;
use crate::filter::{RawCells, ReadFilter};
use crate::mapper::{EntryHook, RowMapper};
use crate::source::LineSource;

/// Group name used for the single group of a line source.
const LINE_GROUP: &str = "";

pub struct FixedWidthReader<S, L, N> {
    source: S,
    bindings: FixedBindingTable<L>,
    mapper: Box<dyn RowMapper<L, N>>,
    line_message: Box<dyn Fn(&N) -> String>,
    header_message: Box<dyn Fn(usize) -> String>,
}

impl<S: LineSource, L: Default, N> FixedWidthReader<S, L, N> {
    pub fn new(
        source: S,
        bindings: FixedBindingTable<L>,
        mapper: impl RowMapper<L, N> + 'static,
    ) -> Self {
        Self {
            source,
            bindings,
            mapper: Box::new(mapper),
            line_message: Box::new(|_| "Imported instance".to_string()),
            header_message: Box::new(|_| "Skipping header line".to_string()),
        }
    }

    pub fn with_line_message(mut self, message: impl Fn(&N) -> String + 'static) -> Self {
        self.line_message = Box::new(message);
        self
    }

    pub fn with_header_message(mut self, message: impl Fn(usize) -> String + 'static) -> Self {
        self.header_message = Box::new(message);
        self
    }

    pub fn filename(&self) -> &str {
        self.source.filename()
    }

    pub fn replace_source(&mut self, source: S) {
        self.source = source;
    }

    /// Builds a trivial single-group filter recording one entry per line,
    /// so that entry counts come from the filter rather than the live pass.
    pub fn create_filter(&self) -> Result<ReadFilter> {
        let filename = self.source.filename().to_string();
        let fail = |reason: String| ImportError::FilterCreation {
            filename: filename.clone(),
            reason,
        };
        let lines = self.source.open().map_err(|e| fail(e.to_string()))?;
        let mut rows = BTreeMap::new();
        for (number, line) in lines.enumerate() {
            line.map_err(|e| fail(e.to_string()))?;
            rows.insert(number, RawCells::new(Vec::new()));
        }
        let mut all_rows = BTreeMap::new();
        all_rows.insert(LINE_GROUP.to_string(), rows);
        Ok(ReadFilter::new(
            0,
            filename,
            vec![LINE_GROUP.to_string()],
            all_rows,
        ))
    }

    /// Streams one outcome entry per selected line; entries pass through
    /// `on_entry` before being yielded.
    pub fn read<'r>(
        &'r mut self,
        filter: ReadFilter,
        on_entry: EntryHook<'r, N, L>,
    ) -> FixedEntries<'r, S, L, N> {
        let total = filter.total_row_count();
        match self.source.open() {
            Ok(lines) => FixedEntries {
                reader: self,
                on_entry,
                lines: Some(lines),
                filter,
                total,
                next_line: 0,
                fatal: None,
                finished: false,
            },
            Err(e) => FixedEntries {
                reader: self,
                on_entry,
                lines: None,
                filter,
                total,
                next_line: 0,
                fatal: Some(e),
                finished: false,
            },
        }
    }
}

/// Lazy outcome-entry sequence over one fixed-width pass.
pub struct FixedEntries<'r, S, L, N> {
    reader: &'r mut FixedWidthReader<S, L, N>,
    on_entry: EntryHook<'r, N, L>,
    lines: Option<Box<dyn Iterator<Item = io::Result<String>>>>,
    filter: ReadFilter,
    total: usize,
    next_line: usize,
    fatal: Option<ImportError>,
    finished: bool,
}

impl<'r, S: LineSource, L: Default, N> FixedEntries<'r, S, L, N> {
    pub fn has_next(&self) -> bool {
        !self.finished && (self.lines.is_some() || self.fatal.is_some())
    }

    pub fn abort(&mut self) {
        if let Some(lines) = self.lines.take() {
            for _ in lines {}
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
            let Some(lines) = self.lines.as_mut() else {
                self.finished = true;
                return None;
            };
            let raw = match lines.next() {
                Some(Ok(raw)) => raw,
                Some(Err(e)) => return Some(self.finish_fatal(e.into())),
                None => {
                    self.lines = None;
                    self.finished = true;
                    return None;
                }
            };
            let number = self.next_line;
            self.next_line += 1;
            if !self.filter.contains_row(LINE_GROUP, number) {
                continue;
            }

            let mut entry = self.classify(number, &raw);
            if let Err(err) = (self.on_entry)(&mut entry) {
                error!(index = number, error = %err, "processor failed, line degraded to error entry");
                let mut error_entry = entry.into_error(err.to_string());
                if let Err(chain_err) = (self.on_entry)(&mut error_entry) {
                    debug!(error = %chain_err, "processor failed again on the error entry");
                }
                return Some(error_entry);
            }
            if entry.is_mapped() {
                entry.message = entry
                    .nodes()
                    .iter()
                    .map(|node| (self.reader.line_message)(node))
                    .collect::<Vec<_>>()
                    .join("\n");
            }
            return Some(entry);
        }
    }

    fn finish_fatal(&mut self, err: ImportError) -> ImportEntry<N, L> {
        error!(error = %err, "source failure aborts the read");
        self.lines = None;
        self.finished = true;
        let mut entry = ImportEntry::synthetic_error(err.to_string(), Vec::new());
        if let Err(chain_err) = (self.on_entry)(&mut entry) {
            debug!(error = %chain_err, "processor failed on the synthetic error entry");
        }
        entry
    }

    fn classify(&mut self, number: usize, raw: &str) -> ImportEntry<N, L> {
        let base = |payload: EntryPayload<N, L>| {
            ImportEntry::new(payload)
                .with_group(LINE_GROUP.to_string())
                .with_index(number)
                .with_index_in_group(number)
                .with_count(self.total)
        };

        if number < self.reader.mapper.skip_lines() {
            return base(EntryPayload::Header)
                .with_index_in_group(number + 1)
                .with_message((self.reader.header_message)(number));
        }

        let mut line = L::default();
        self.reader.bindings.apply(&mut line, raw);
        if self.reader.mapper.needed() {
            match self.reader.mapper.map(&line) {
                Ok(node) => base(EntryPayload::Mapped {
                    nodes: node.into_iter().collect(),
                }),
                Err(err) => {
                    error!(index = number, error = %err, "row mapper failed");
                    base(EntryPayload::Error)
                        .with_severity(Severity::Error)
                        .with_message(err.to_string())
                }
            }
        } else {
            base(EntryPayload::Line { line })
        }
    }
}

impl<'r, S: LineSource, L: Default, N> Iterator for FixedEntries<'r, S, L, N> {
    type Item = ImportEntry<N, L>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry()
    }
}
