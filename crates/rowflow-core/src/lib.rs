pub mod chain;
pub mod memory;
pub mod strategy;
pub mod validate;

pub use chain::{EntryProcessor, FnProcessor, ProcessorChain};
pub use memory::{PerItemStrategy, SingleEntryStrategy};
pub use strategy::{
    AbortHandle, FilterAdjust, FixedStrategy, ImportStrategy, PostProcessor, SheetStrategy,
    StrategyCore,
};
pub use validate::{Validator, Violation, validate_node};
