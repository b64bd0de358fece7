//! Chunk processing collaborator contract.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// The bounded slice of buffered items selected for one processor
/// invocation, together with its attempt counter.
///
/// The attempt counter starts at 1 and is incremented by the engine each
/// time the error policy asks for a [`Retry`](ErrorDecision::Retry).
#[derive(Debug, Clone)]
pub struct Chunk<T> {
    items: Vec<T>,
    attempt: u32,
}

impl<T> Chunk<T> {
    pub(crate) fn new(items: Vec<T>) -> Self {
        Self { items, attempt: 1 }
    }

    pub(crate) fn bump_attempt(&mut self) {
        self.attempt += 1;
    }

    /// The items of this chunk. Order within a chunk is unspecified.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// 1-based attempt number of the current processor invocation.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// What the engine does with a chunk after a failed processor invocation.
///
/// The engine only dispatches on this decision; retry budgets and backoff
/// live entirely in the [`ChunkProcessor`] implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDecision {
    /// Treat the chunk as handled; no retry, the error is suppressed.
    Continue,

    /// Re-invoke the processor on the same chunk with the attempt counter
    /// incremented.
    Retry,

    /// Propagate the error to every caller awaiting this round's
    /// completion.
    AbortAndRethrow,
}

/// Consumer of finalized chunks.
///
/// `process` must tolerate being invoked again on the same chunk under
/// [`Retry`](ErrorDecision::Retry) (idempotence is the implementor's
/// responsibility) and should honor cooperative cancellation promptly: the
/// engine cancels the token when the batch is disposed.
#[async_trait]
pub trait ChunkProcessor<T>: Send + Sync {
    /// Consume one finalized chunk.
    async fn process(&self, chunk: &Chunk<T>, cancel: &CancellationToken) -> Result<()>;

    /// Decide how the engine handles a failed `process` invocation.
    ///
    /// The default aborts: a processor that implements no policy never
    /// silently loses items.
    fn handle_error(&self, chunk: &Chunk<T>, error: &Error) -> ErrorDecision {
        let _ = (chunk, error);
        ErrorDecision::AbortAndRethrow
    }
}
