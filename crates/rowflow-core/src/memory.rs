//! In-memory strategies over non-file sources.
//!
//! Both variants replay pre-existing nodes or pre-classified entries
//! through the same processor chain and isolation rules as the file-backed
//! strategies, and honor the same cooperative abort contract.

use std::collections::VecDeque;

use tracing::error;

use rowflow_model::{ActionType, EntryKind, EntryPayload, ImportEntry, ImportError, Result};

use crate::chain::EntryProcessor;
use crate::strategy::{AbortHandle, ImportStrategy, StrategyCore};

fn replayable<N, L>(entry: &ImportEntry<N, L>) -> Result<()> {
    match entry.kind() {
        EntryKind::Mapped | EntryKind::Line => Ok(()),
        kind => Err(ImportError::UnsupportedStrategy(format!(
            "cannot replay a '{}' entry through an in-memory strategy",
            kind.as_str()
        ))),
    }
}

/// Wraps a node list (or one pre-classified entry) as exactly one entry
/// covering the whole list.
pub struct SingleEntryStrategy<N, L> {
    entry: Option<ImportEntry<N, L>>,
    core: StrategyCore<N, L>,
}

impl<N, L> SingleEntryStrategy<N, L> {
    /// One mapped entry covering the whole node list, tagged with the
    /// requested action type.
    pub fn from_nodes(nodes: Vec<N>, action_type: ActionType) -> Self {
        let entry = ImportEntry::new(EntryPayload::Mapped { nodes })
            .with_action_type(action_type)
            .with_count(1);
        Self {
            entry: Some(entry),
            core: StrategyCore::new(),
        }
    }

    /// Replays one pre-classified entry. Fails immediately, before any row
    /// is read, when the entry's kind cannot be replayed.
    pub fn from_entry(entry: ImportEntry<N, L>) -> Result<Self> {
        replayable(&entry)?;
        Ok(Self {
            entry: Some(entry),
            core: StrategyCore::new(),
        })
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
}

impl<N, L> ImportStrategy<N, L> for SingleEntryStrategy<N, L> {
    fn parse(&mut self) -> Result<()> {
        let abort = self.core.abort_handle();
        let entry = self.entry.take().filter(|_| !abort.is_aborted());
        let Some(mut entry) = entry else {
            self.core.finish(Vec::new());
            return Ok(());
        };

        let mut chain = self.core.take_chain();
        let buffer = match chain.run(&mut entry) {
            Ok(()) => vec![entry],
            Err(err) => {
                error!(error = %err, "processor failed, entry degraded to error entry");
                let mut error_entry = entry.into_error(err.to_string());
                let _ = chain.run(&mut error_entry);
                vec![error_entry]
            }
        };
        self.core.restore_chain(chain);
        self.core.finish(buffer);
        Ok(())
    }

    fn results(&self) -> &[ImportEntry<N, L>] {
        self.core.results()
    }

    fn abort(&mut self) {
        self.core.abort_handle().abort();
        // Drain the remaining input without emitting results.
        self.entry = None;
    }

    fn has_next(&self) -> bool {
        self.entry.is_some()
    }
}

/// Emits one entry per input item, preserving input order.
pub struct PerItemStrategy<N, L> {
    queue: VecDeque<ImportEntry<N, L>>,
    core: StrategyCore<N, L>,
}

impl<N, L> PerItemStrategy<N, L> {
    /// One mapped entry per node, tagged with the caller's action type.
    pub fn from_nodes(nodes: Vec<N>, action_type: ActionType) -> Self {
        let count = nodes.len();
        let queue = nodes
            .into_iter()
            .enumerate()
            .map(|(index, node)| {
                ImportEntry::new(EntryPayload::Mapped { nodes: vec![node] })
                    .with_action_type(action_type)
                    .with_index(index)
                    .with_index_in_group(index)
                    .with_count(count)
            })
            .collect();
        Self {
            queue,
            core: StrategyCore::new(),
        }
    }

    /// Replays pre-classified entries in order. Fails immediately when any
    /// entry's kind cannot be replayed.
    pub fn from_entries(entries: Vec<ImportEntry<N, L>>) -> Result<Self> {
        for entry in &entries {
            replayable(entry)?;
        }
        Ok(Self {
            queue: entries.into(),
            core: StrategyCore::new(),
        })
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
}

impl<N, L> ImportStrategy<N, L> for PerItemStrategy<N, L> {
    fn parse(&mut self) -> Result<()> {
        let abort = self.core.abort_handle();
        let mut chain = self.core.take_chain();
        let mut buffer = Vec::new();
        while let Some(mut entry) = self.queue.pop_front() {
            // Drain without emitting once aborted.
            if abort.is_aborted() {
                continue;
            }
            match chain.run(&mut entry) {
                Ok(()) => buffer.push(entry),
                Err(err) => {
                    error!(index = buffer.len(), error = %err, "processor failed, item degraded to error entry");
                    let mut error_entry = entry.into_error(err.to_string());
                    let _ = chain.run(&mut error_entry);
                    buffer.push(error_entry);
                }
            }
        }
        self.core.restore_chain(chain);
        self.core.finish(buffer);
        Ok(())
    }

    fn results(&self) -> &[ImportEntry<N, L>] {
        self.core.results()
    }

    fn abort(&mut self) {
        self.core.abort_handle().abort();
        self.queue.clear();
    }

    fn has_next(&self) -> bool {
        !self.queue.is_empty()
    }
}
