pub mod action;
pub mod entry;
pub mod error;
pub mod report;

pub use action::{ActionType, TRUTHY_FLAGS, is_truthy_flag, resolve_action_type};
pub use entry::{EntryKind, EntryPayload, ImportEntry, KindSet, SaveDepth, Severity};
pub use error::{ImportError, Result};
pub use report::{EntrySummary, ImportReport};
