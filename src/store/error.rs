use std::error::Error;
use thiserror::Error;

/// Result alias for score store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error raised by score store backends regardless of the underlying storage.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing storage could not be read, parsed or written.
    #[error("score store unavailable: {message}")]
    Unavailable {
        /// Human readable description of the failing operation.
        message: String,
        /// Underlying backend failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A write kept failing after every retry attempt.
    #[error("score persistence failed after {attempts} attempts")]
    RetryExhausted {
        /// Number of attempts made before giving up.
        attempts: u32,
        /// Failure reported by the last attempt.
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StoreError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
