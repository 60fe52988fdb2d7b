//! Error types.

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by slab, key and table construction and by fixed-width writes.
///
/// All of these are programmer errors: they are reported synchronously at the
/// point of violation and the structure is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Invalid construction parameters.
    #[error("invalid configuration: {reason}")]
    Configuration { reason: String },

    /// Input longer than the fixed buffer it is written into.
    #[error("input of {len} bytes exceeds capacity of {capacity} bytes")]
    Capacity { len: usize, capacity: usize },

    /// Logical index or range outside a view.
    #[error("index {index} out of range for length {len}")]
    Index { index: usize, len: usize },

    /// Key shorter than the fixed key width of a table.
    #[error("key width mismatch: expected {expected} bytes, got {actual}")]
    KeyWidth { expected: usize, actual: usize },
}

impl Error {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Error::Configuration {
            reason: reason.into(),
        }
    }
}
