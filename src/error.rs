use thiserror::Error;

/// Convenience result type for container and load operations.
pub type MprResult<T> = Result<T, MprError>;

/// Error type shared across the container codec, row sources, intuition
/// engines and the load orchestrator.
///
/// The read path never surfaces raw codec errors: decode and decompression
/// failures are folded into [`MprError::CorruptContainer`].
#[derive(Debug, Error)]
pub enum MprError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV row-source error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Structural violation of the container: bad magic, trailer offsets
    /// outside file bounds, checksum mismatch, or a decode/decompression
    /// failure inside the row or metadata block.
    #[error("corrupt container: {message}")]
    CorruptContainer { message: String },

    /// A row's shape disagrees with the committed schema (wrong arity).
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// An intuition engine was given too few rows to decide. Recoverable by
    /// supplying more rows or an explicit schema/row classification.
    #[error("insufficient sample: {message}")]
    InsufficientSample { message: String },

    /// Metadata could not be serialized on the write path.
    #[error("metadata encode error: {0}")]
    MetaEncode(#[from] rmp_serde::encode::Error),
}

impl MprError {
    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        MprError::CorruptContainer {
            message: message.into(),
        }
    }

    pub(crate) fn schema_mismatch(message: impl Into<String>) -> Self {
        MprError::SchemaMismatch {
            message: message.into(),
        }
    }
}
