//! Simple producer demo.
//!
//! One producer feeds integers into a batch with a three second idle
//! window. The round closes three seconds after production goes quiet, and
//! each chunk the engine dispatches is logged. Press Ctrl+C to stop
//! producing and flush the final round.
//!
//! ```sh
//! RUST_LOG=info cargo run --example simple_producer
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use auto_batcher::{
    Batch, BatchConfiguration, CancellationToken, Chunk, ChunkProcessor, Result,
};

struct LoggingProcessor;

#[async_trait::async_trait]
impl ChunkProcessor<u64> for LoggingProcessor {
    async fn process(&self, chunk: &Chunk<u64>, _cancel: &CancellationToken) -> Result<()> {
        info!(
            items = chunk.len(),
            attempt = chunk.attempt(),
            "processing chunk: {:?}",
            chunk.items()
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let batch = Batch::new(
        BatchConfiguration::new(Arc::new(LoggingProcessor))
            .with_identifier("simple-producer")
            .with_idle_window(Duration::from_secs(3)),
    )?;

    info!("producing items until Ctrl+C; the round closes three seconds after production stops");

    let token = batch.new_aggregator_token().await?;
    let mut produced = 0u64;
    loop {
        let think_time = Duration::from_millis(200 + (produced % 7) * 100);
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(think_time) => {
                info!(item = produced, "produced");
                batch.add(produced, &token).await?;
                produced += 1;
            }
        }
    }

    info!(produced, "production stopped, completing submission");
    batch.complete_submission(&token).await?;
    token.dispose();
    batch.dispose();
    Ok(())
}
