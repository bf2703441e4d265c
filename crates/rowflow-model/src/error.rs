use thiserror::Error;

/// Import failure taxonomy.
///
/// Fatal kinds (`FilterCreation`, `Validation`, `UnsupportedStrategy`)
/// propagate to the caller. `Source` failures degrade a read to a single
/// synthetic error entry. Row-scoped kinds (`Convert`, `Mapping`,
/// `Processor`) are absorbed into diagnostic entries so the batch always
/// completes.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("cannot create filter for '{filename}': {reason}")]
    FilterCreation { filename: String, reason: String },
    #[error("source error: {0}")]
    Source(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse failed on field '{header}' at row {row}: {reason}")]
    Convert {
        header: String,
        row: usize,
        reason: String,
    },
    #[error("row mapper failed: {0}")]
    Mapping(String),
    #[error("processor failed: {0}")]
    Processor(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unsupported strategy: {0}")]
    UnsupportedStrategy(String),
}

pub type Result<T> = std::result::Result<T, ImportError>;
