//! File-backed import strategies.
//!
//! A strategy owns a reader, the processor chain, post-processors, and the
//! accumulated result buffer. `parse()` obtains a filter from the reader
//! (after the optional adjustment hook), fully materializes the lazy entry
//! sequence, retains the mapped entries, and invokes every post-processor
//! once with the complete batch. Cancellation is cooperative: `abort()`
//! flips a shared flag and the in-progress parse drains the remaining
//! input without emitting further entries.

use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rowflow_ingest::{FixedWidthReader, LineSource, ReadFilter, SheetReader, TableSource};
use rowflow_model::{EntryKind, EntrySummary, ImportEntry, ImportReport, Result};

use crate::chain::{EntryProcessor, ProcessorChain};

/// Shared cooperative cancellation flag. Clones observe the same flag.
#[derive(Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

pub type PostProcessor<N, L> = Box<dyn FnMut(&[ImportEntry<N, L>])>;

pub type FilterAdjust = Box<dyn Fn(ReadFilter) -> ReadFilter>;

/// Common behavior of every strategy.
pub trait ImportStrategy<N, L> {
    fn parse(&mut self) -> Result<()>;

    /// The retained entries of the last parse.
    fn results(&self) -> &[ImportEntry<N, L>];

    /// Requests cooperative cancellation; remaining input is drained
    /// without emitting results.
    fn abort(&mut self);

    fn has_next(&self) -> bool;
}

/// State shared by all strategy implementations: chain, post-processors,
/// result buffer, abort flag.
pub struct StrategyCore<N, L> {
    chain: ProcessorChain<N, L>,
    post_processors: Vec<PostProcessor<N, L>>,
    results: Vec<ImportEntry<N, L>>,
    summaries: Vec<EntrySummary>,
    abort: AbortHandle,
    keep_raw_lines: bool,
}

impl<N, L> Default for StrategyCore<N, L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N, L> StrategyCore<N, L> {
    pub fn new() -> Self {
        Self {
            chain: ProcessorChain::new(),
            post_processors: Vec::new(),
            results: Vec::new(),
            summaries: Vec::new(),
            abort: AbortHandle::new(),
            keep_raw_lines: false,
        }
    }

    pub fn register_processor(&mut self, processor: impl EntryProcessor<N, L> + 'static) {
        self.chain.register(processor);
    }

    pub fn add_post_processor(&mut self, post: impl FnMut(&[ImportEntry<N, L>]) + 'static) {
        self.post_processors.push(Box::new(post));
    }

    pub fn clear_processors(&mut self) {
        self.chain.clear();
        self.post_processors.clear();
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn results(&self) -> &[ImportEntry<N, L>] {
        &self.results
    }

    /// Summaries of every entry seen by the last parse, retained or not.
    pub fn summaries(&self) -> &[EntrySummary] {
        &self.summaries
    }

    pub(crate) fn set_keep_raw_lines(&mut self, keep: bool) {
        self.keep_raw_lines = keep;
    }

    pub(crate) fn take_chain(&mut self) -> ProcessorChain<N, L> {
        mem::take(&mut self.chain)
    }

    pub(crate) fn restore_chain(&mut self, chain: ProcessorChain<N, L>) {
        self.chain = chain;
    }

    /// Stores the materialized batch: summarizes every entry, retains the
    /// fully mapped ones (plus raw lines when configured), and runs the
    /// post-processors once with the retained batch.
    pub(crate) fn finish(&mut self, buffer: Vec<ImportEntry<N, L>>) {
        self.summaries = buffer.iter().map(EntrySummary::from_entry).collect();
        let keep_raw_lines = self.keep_raw_lines;
        self.results = buffer
            .into_iter()
            .filter(|entry| {
                entry.is_mapped() || (keep_raw_lines && entry.kind() == EntryKind::Line)
            })
            .collect();
        let Self {
            post_processors,
            results,
            ..
        } = self;
        for post in post_processors.iter_mut() {
            post(results);
        }
    }

    /// Resets state for a new import run: buffer, registrations, flag.
    pub(crate) fn reinitialize(&mut self) {
        self.clear_processors();
        self.results.clear();
        self.summaries.clear();
        self.abort.reset();
    }
}

/// Strategy over a multi-group spreadsheet-shaped source.
pub struct SheetStrategy<S, L, N> {
    reader: SheetReader<S, L, N>,
    core: StrategyCore<N, L>,
    filter_adjust: Option<FilterAdjust>,
    last_groups: Vec<String>,
    remaining: bool,
}

impl<S: TableSource, L: Default, N> SheetStrategy<S, L, N> {
    pub fn new(reader: SheetReader<S, L, N>) -> Self {
        Self {
            reader,
            core: StrategyCore::new(),
            filter_adjust: None,
            last_groups: Vec::new(),
            remaining: false,
        }
    }

    /// Caller-supplied hook rewriting the filter before the real read.
    pub fn with_filter_adjust(mut self, adjust: impl Fn(ReadFilter) -> ReadFilter + 'static) -> Self {
        self.filter_adjust = Some(Box::new(adjust));
        self
    }

    /// Retain unwrapped raw-line entries in the results alongside mapped
    /// entries.
    pub fn with_keep_raw_lines(mut self, keep: bool) -> Self {
        self.core.set_keep_raw_lines(keep);
        self
    }

    pub fn register_processor(&mut self, processor: impl EntryProcessor<N, L> + 'static) {
        self.core.register_processor(processor);
    }

    pub fn add_post_processor(&mut self, post: impl FnMut(&[ImportEntry<N, L>]) + 'static) {
        self.core.add_post_processor(post);
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.core.abort_handle()
    }

    pub fn reader(&self) -> &SheetReader<S, L, N> {
        &self.reader
    }

    /// Resets the strategy for a new import: fresh source, cleared results
    /// and processor registrations.
    pub fn reinitialize(&mut self, source: S) {
        self.reader.replace_source(source);
        self.core.reinitialize();
        self.last_groups.clear();
        self.remaining = false;
    }

    /// Output surface for an external renderer: detected version, group
    /// names, captured headers, and one summary per produced entry.
    pub fn report(&self) -> ImportReport {
        let mut report = ImportReport::new(
            self.reader.version(),
            self.reader.filename(),
            self.last_groups.clone(),
        )
        .with_headers(self.reader.headers().clone());
        report.entries = self.core.summaries().to_vec();
        report
    }
}

impl<S: TableSource, L: Default, N> ImportStrategy<N, L> for SheetStrategy<S, L, N> {
    fn parse(&mut self) -> Result<()> {
        let filter = self.reader.create_filter()?;
        let filter = match &self.filter_adjust {
            Some(adjust) => adjust(filter),
            None => filter,
        };
        self.last_groups = filter.groups().to_vec();

        let abort = self.core.abort_handle();
        let mut chain = self.core.take_chain();
        let mut hook = |entry: &mut ImportEntry<N, L>| chain.run(entry);
        let mut entries = self.reader.read(filter, &mut hook);
        let mut buffer = Vec::new();
        loop {
            if abort.is_aborted() {
                entries.abort();
                break;
            }
            match entries.next_entry() {
                Some(entry) => buffer.push(entry),
                None => break,
            }
        }
        let remaining = entries.has_next();
        drop(entries);
        self.remaining = remaining;
        self.core.restore_chain(chain);
        self.core.finish(buffer);
        Ok(())
    }

    fn results(&self) -> &[ImportEntry<N, L>] {
        self.core.results()
    }

    fn abort(&mut self) {
        self.core.abort_handle().abort();
        self.remaining = false;
    }

    fn has_next(&self) -> bool {
        self.remaining
    }
}

/// Strategy over a single-group fixed-width line source.
pub struct FixedStrategy<S, L, N> {
    reader: FixedWidthReader<S, L, N>,
    core: StrategyCore<N, L>,
    filter_adjust: Option<FilterAdjust>,
    remaining: bool,
}

impl<S: LineSource, L: Default, N> FixedStrategy<S, L, N> {
    pub fn new(reader: FixedWidthReader<S, L, N>) -> Self {
        Self {
            reader,
            core: StrategyCore::new(),
            filter_adjust: None,
            remaining: false,
        }
    }

    pub fn with_filter_adjust(mut self, adjust: impl Fn(ReadFilter) -> ReadFilter + 'static) -> Self {
        self.filter_adjust = Some(Box::new(adjust));
        self
    }

    pub fn with_keep_raw_lines(mut self, keep: bool) -> Self {
        self.core.set_keep_raw_lines(keep);
        self
    }

    pub fn register_processor(&mut self, processor: impl EntryProcessor<N, L> + 'static) {
        self.core.register_processor(processor);
    }

    pub fn add_post_processor(&mut self, post: impl FnMut(&[ImportEntry<N, L>]) + 'static) {
        self.core.add_post_processor(post);
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.core.abort_handle()
    }

    pub fn reinitialize(&mut self, source: S) {
        self.reader.replace_source(source);
        self.core.reinitialize();
        self.remaining = false;
    }
}

impl<S: LineSource, L: Default, N> ImportStrategy<N, L> for FixedStrategy<S, L, N> {
    fn parse(&mut self) -> Result<()> {
        let filter = self.reader.create_filter()?;
        let filter = match &self.filter_adjust {
            Some(adjust) => adjust(filter),
            None => filter,
        };

        let abort = self.core.abort_handle();
        let mut chain = self.core.take_chain();
        let mut hook = |entry: &mut ImportEntry<N, L>| chain.run(entry);
        let mut entries = self.reader.read(filter, &mut hook);
        let mut buffer = Vec::new();
        loop {
            if abort.is_aborted() {
                entries.abort();
                break;
            }
            match entries.next_entry() {
                Some(entry) => buffer.push(entry),
                None => break,
            }
        }
        let remaining = entries.has_next();
        drop(entries);
        self.remaining = remaining;
        self.core.restore_chain(chain);
        self.core.finish(buffer);
        Ok(())
    }

    fn results(&self) -> &[ImportEntry<N, L>] {
        self.core.results()
    }

    fn abort(&mut self) {
        self.core.abort_handle().abort();
        self.remaining = false;
    }

    fn has_next(&self) -> bool {
        self.remaining
    }
}
