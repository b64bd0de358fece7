//! Batch configuration.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::processor::ChunkProcessor;

/// Immutable parameters of a [`Batch`](crate::Batch).
///
/// The chunk processor is required and supplied at construction; everything
/// else has a default and can be overridden builder-style:
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use auto_batcher::BatchConfiguration;
/// # use auto_batcher::{Chunk, ChunkProcessor, Result};
/// # use tokio_util::sync::CancellationToken;
/// # struct Sink;
/// # #[async_trait::async_trait]
/// # impl ChunkProcessor<String> for Sink {
/// #     async fn process(&self, _: &Chunk<String>, _: &CancellationToken) -> Result<()> { Ok(()) }
/// # }
///
/// let config = BatchConfiguration::new(Arc::new(Sink))
///     .with_identifier("orders")
///     .with_idle_window(Duration::from_millis(125))
///     .with_chunk_size(100);
/// ```
pub struct BatchConfiguration<T> {
    identifier: String,
    idle_window: Duration,
    chunk_size: usize,
    processor: Arc<dyn ChunkProcessor<T>>,
}

impl<T: 'static> BatchConfiguration<T> {
    /// Create a configuration with a fresh unique identifier, a zero idle
    /// window and an unbounded chunk size.
    pub fn new<P>(processor: Arc<P>) -> Self
    where
        P: ChunkProcessor<T> + 'static,
    {
        Self::with_processor(processor as Arc<dyn ChunkProcessor<T>>)
    }

    /// Like [`new`](BatchConfiguration::new), for an already type-erased
    /// processor.
    pub fn with_processor(processor: Arc<dyn ChunkProcessor<T>>) -> Self {
        Self {
            identifier: Uuid::new_v4().to_string(),
            idle_window: Duration::ZERO,
            chunk_size: 0,
            processor,
        }
    }

    /// Identifier correlating this batch instance in logs.
    pub fn with_identifier(mut self, id: impl Into<String>) -> Self {
        self.identifier = id.into();
        self
    }

    /// Debounce interval: the round closes one continuous idle window after
    /// the last add/registration activity.
    pub fn with_idle_window(mut self, window: Duration) -> Self {
        self.idle_window = window;
        self
    }

    /// Maximum items handed to one processor invocation. Zero means
    /// unbounded: one chunk per round.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn idle_window(&self) -> Duration {
        self.idle_window
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub(crate) fn into_parts(self) -> (String, Duration, usize, Arc<dyn ChunkProcessor<T>>) {
        (
            self.identifier,
            self.idle_window,
            self.chunk_size,
            self.processor,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::Chunk;
    use crate::Result;
    use tokio_util::sync::CancellationToken;

    struct NoopProcessor;

    #[async_trait::async_trait]
    impl ChunkProcessor<u32> for NoopProcessor {
        async fn process(&self, _chunk: &Chunk<u32>, _cancel: &CancellationToken) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn defaults_are_zero_window_unbounded_chunks() {
        let config = BatchConfiguration::new(Arc::new(NoopProcessor));
        assert_eq!(config.idle_window(), Duration::ZERO);
        assert_eq!(config.chunk_size(), 0);
        assert!(!config.identifier().is_empty());
    }

    #[test]
    fn identifiers_default_to_fresh_unique_values() {
        let a = BatchConfiguration::new(Arc::new(NoopProcessor));
        let b = BatchConfiguration::new(Arc::new(NoopProcessor));
        assert_ne!(a.identifier(), b.identifier());
    }

    #[test]
    fn builder_overrides_apply() {
        let config = BatchConfiguration::new(Arc::new(NoopProcessor))
            .with_identifier("orders")
            .with_idle_window(Duration::from_millis(125))
            .with_chunk_size(100);
        assert_eq!(config.identifier(), "orders");
        assert_eq!(config.idle_window(), Duration::from_millis(125));
        assert_eq!(config.chunk_size(), 100);
    }
}
