//! Entry processor chain.
//!
//! Processors are registered in append order and invoked in reverse: the
//! most recently registered runs first. Each processor declares the entry
//! kinds it handles; an entry outside that set is skipped for that
//! processor without error. The chain runs once per produced entry,
//! synchronously, before the entry is yielded onward, and a processor may
//! mutate the entry in place so that earlier-registered (later-invoked)
//! processors observe the change.

use tracing::debug;

use rowflow_model::{ImportEntry, KindSet, Result};

/// Callback capability-typed to a subset of outcome-entry kinds.
pub trait EntryProcessor<N, L> {
    /// Name used in skip diagnostics.
    fn name(&self) -> &str {
        "processor"
    }

    /// Entry kinds this processor handles. Defaults to all.
    fn kinds(&self) -> KindSet {
        KindSet::all()
    }

    fn process(&mut self, entry: &mut ImportEntry<N, L>) -> Result<()>;
}

/// Closure-backed [`EntryProcessor`].
pub struct FnProcessor<F> {
    name: String,
    kinds: KindSet,
    process: F,
}

impl<F> FnProcessor<F> {
    pub fn new(process: F) -> Self {
        Self {
            name: "fn-processor".to_string(),
            kinds: KindSet::all(),
            process,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_kinds(mut self, kinds: KindSet) -> Self {
        self.kinds = kinds;
        self
    }
}

impl<N, L, F> EntryProcessor<N, L> for FnProcessor<F>
where
    F: FnMut(&mut ImportEntry<N, L>) -> Result<()>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn kinds(&self) -> KindSet {
        self.kinds
    }

    fn process(&mut self, entry: &mut ImportEntry<N, L>) -> Result<()> {
        (self.process)(entry)
    }
}

/// Ordered, mutable processor list with reverse-registration invocation.
pub struct ProcessorChain<N, L> {
    processors: Vec<Box<dyn EntryProcessor<N, L>>>,
}

impl<N, L> Default for ProcessorChain<N, L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N, L> ProcessorChain<N, L> {
    pub fn new() -> Self {
        Self {
            processors: Vec::new(),
        }
    }

    pub fn register(&mut self, processor: impl EntryProcessor<N, L> + 'static) {
        self.processors.push(Box::new(processor));
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn clear(&mut self) {
        self.processors.clear();
    }

    /// Runs the chain on one entry. The first processor failure aborts the
    /// chain for this entry and is returned to the caller, which degrades
    /// the entry to a row-scoped error.
    pub fn run(&mut self, entry: &mut ImportEntry<N, L>) -> Result<()> {
        for processor in self.processors.iter_mut().rev() {
            if !processor.kinds().contains(entry.kind()) {
                debug!(
                    processor = processor.name(),
                    kind = entry.kind().as_str(),
                    "processor does not handle this entry kind and is skipped"
                );
                continue;
            }
            processor.process(entry)?;
        }
        Ok(())
    }
}
