use thiserror::Error;

/// Canonical error type for the coordinator's query path.
///
/// Variants correspond one-to-one with the error kinds in the coordinator
/// specification: per-shard failures never reach this type (they are
/// recovered at the fan-out boundary and only show up as reduced recall plus
/// a metrics counter).
#[derive(Debug, Error)]
pub enum MosaicError {
    /// Malformed arguments, dimension mismatch, or an empty required field.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Human-readable explanation.
        message: String,
    },

    /// No active shards exist, or an analytics table reference is unrecognized.
    #[error("not found: {message}")]
    NotFound {
        /// Human-readable explanation.
        message: String,
    },

    /// Every shard failed or timed out and no results were produced.
    #[error("all shards failed: {attempted} attempted, {failed} failed")]
    AllShardsFailed {
        /// Number of shards the executor attempted to query.
        attempted: usize,
        /// Number of shards that failed or timed out.
        failed: usize,
    },

    /// The overall query deadline elapsed before any successful aggregation step.
    #[error("query timed out after {elapsed_ms}ms")]
    Timeout {
        /// Elapsed time in milliseconds when the deadline fired.
        elapsed_ms: u64,
    },

    /// The scoring or fan-out queue is saturated.
    #[error("overloaded: {message}")]
    Overloaded {
        /// Human-readable explanation.
        message: String,
    },

    /// An explicit force-engine option named a class the classifier does not know.
    #[error("classifier bypass rejected: {requested}")]
    ClassifierBypass {
        /// The invalid forced class the caller requested.
        requested: String,
    },

    /// Invariant violation in routing or ranking, logged with context by the caller.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable details for debugging purposes.
        message: String,
    },
}

impl MosaicError {
    /// Creates an `InvalidInput` variant.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a `NotFound` variant.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates an `Internal` variant.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an `Overloaded` variant.
    #[must_use]
    pub fn overloaded(message: impl Into<String>) -> Self {
        Self::Overloaded {
            message: message.into(),
        }
    }

    /// Creates a `Timeout` variant.
    #[must_use]
    pub fn timeout(elapsed_ms: u64) -> Self {
        Self::Timeout { elapsed_ms }
    }

    /// Creates an `AllShardsFailed` variant.
    #[must_use]
    pub fn all_shards_failed(attempted: usize, failed: usize) -> Self {
        Self::AllShardsFailed { attempted, failed }
    }

    /// Creates a `ClassifierBypass` variant.
    #[must_use]
    pub fn classifier_bypass(requested: impl Into<String>) -> Self {
        Self::ClassifierBypass {
            requested: requested.into(),
        }
    }
}

impl From<rusqlite::Error> for MosaicError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Internal {
            message: format!("sqlite error: {err}"),
        }
    }
}

impl From<serde_json::Error> for MosaicError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput {
            message: format!("json error: {err}"),
        }
    }
}

impl From<tokio::time::error::Elapsed> for MosaicError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::Timeout { elapsed_ms: 0 }
    }
}

/// Convenient result alias for coordinator operations.
pub type MosaicResult<T> = Result<T, MosaicError>;
