use std::sync::Arc;
use thiserror::Error;

/// Unified error type for the batching engine.
///
/// Token-validity and construction errors are raised synchronously to the
/// offending caller only; cancellation is broadcast to every suspended
/// caller; processing failures surface only when the chunk processor's
/// policy resolves to [`AbortAndRethrow`](crate::ErrorDecision::AbortAndRethrow).
#[derive(Debug, Error)]
pub enum Error {
    /// The aggregator token was disposed by its holder and can never be
    /// used again.
    #[error("the aggregator token was already disposed")]
    TokenDisposed,

    /// The token is not a member of the batch's active aggregator set:
    /// it already completed, or it belongs to a different batch.
    #[error("invalid aggregator token: {reason}")]
    InvalidToken { reason: String },

    /// Invalid batch configuration.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// The batch was disposed while this call was suspended (or before it
    /// started). Every waiter observes this.
    #[error("operation cancelled: the batch was disposed")]
    Cancelled,

    /// A chunk processor invocation failed. Produced by processors; the
    /// engine never constructs this variant itself.
    #[error("chunk processing failed: {0}")]
    Processing(String),

    /// The round this caller contributed to was aborted by the error
    /// policy. The inner error is shared by every caller of that round.
    #[error("batch round aborted: {0}")]
    Aborted(Arc<Error>),
}

impl Error {
    /// Create a processing failure, typically from inside a
    /// [`ChunkProcessor::process`](crate::ChunkProcessor::process) impl.
    pub fn processing(msg: impl Into<String>) -> Self {
        Error::Processing(msg.into())
    }

    pub(crate) fn invalid_token(reason: impl Into<String>) -> Self {
        Error::InvalidToken {
            reason: reason.into(),
        }
    }

    pub(crate) fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration {
            message: msg.into(),
        }
    }

    /// True when this error (directly or through [`Error::Aborted`])
    /// originated from a failed processor invocation.
    pub fn is_processing_failure(&self) -> bool {
        match self {
            Error::Processing(_) => true,
            Error::Aborted(inner) => inner.is_processing_failure(),
            _ => false,
        }
    }
}
