//! # auto-batcher
//!
//! Adaptive in-process batching engine: multiple concurrent producers
//! ("aggregators") contribute items to a shared, time- and size-bounded
//! collection round; the engine debounces activity, closes the round once
//! quiet, splits the buffered items into bounded chunks, and hands each
//! chunk to an injected processor, applying a caller-supplied error policy
//! on failure.
//!
//! ## Overview
//!
//! - **Token-based access**: every producer holds an [`AggregatorToken`]
//!   issued by the batch; tokens are checked against engine-held membership
//!   state on every use and released explicitly.
//! - **Trailing-edge debouncing**: a round closes exactly one idle window
//!   after the last add/registration activity, once every token has
//!   completed, or immediately when the buffer reaches the chunk size.
//! - **Non-blocking rounds**: the batch reopens before the processor is
//!   awaited, so round *N*'s processing overlaps round *N+1*'s collection.
//! - **Pluggable failure policy**: the processor decides per failed chunk
//!   whether to [`Continue`](ErrorDecision::Continue),
//!   [`Retry`](ErrorDecision::Retry), or
//!   [`AbortAndRethrow`](ErrorDecision::AbortAndRethrow).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use auto_batcher::{
//!     Batch, BatchConfiguration, CancellationToken, Chunk, ChunkProcessor, Result,
//! };
//!
//! struct Printer;
//!
//! #[async_trait::async_trait]
//! impl ChunkProcessor<String> for Printer {
//!     async fn process(&self, chunk: &Chunk<String>, _cancel: &CancellationToken) -> Result<()> {
//!         println!("processing {} items", chunk.len());
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let batch = Batch::new(
//!         BatchConfiguration::new(Arc::new(Printer))
//!             .with_idle_window(Duration::from_millis(125)),
//!     )?;
//!
//!     let token = batch.new_aggregator_token().await?;
//!     batch.add("hello".to_string(), &token).await?;
//!     batch.complete_submission(&token).await?;
//!     token.dispose();
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`batch`] | The batch engine and round state machine |
//! | [`config`] | Batch configuration builder |
//! | [`processor`] | Chunk type and the processor/error-policy contract |
//! | [`token`] | Aggregator capability tokens |
//! | [`signal`] | Reusable resettable async latch |
//! | [`error`] | Error taxonomy |

pub mod batch;
pub mod config;
pub mod error;
pub mod processor;
pub mod signal;
pub mod token;

pub use batch::{Batch, BatchStatus};
pub use config::BatchConfiguration;
pub use error::Error;
pub use processor::{Chunk, ChunkProcessor, ErrorDecision};
pub use signal::{AsyncSignal, SignalWaiter};
pub use token::AggregatorToken;

// Re-exported so processor implementations do not need their own
// tokio-util dependency for the cancellation parameter.
pub use tokio_util::sync::CancellationToken;

/// Result type alias for the library.
pub type Result<T> = std::result::Result<T, Error>;
