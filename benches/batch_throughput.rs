//! Benchmarks for batch round throughput
//!
//! This benchmark measures:
//! - Full round latency (token, add, complete, process) for one producer
//! - Scaling with concurrent producers contributing to the same round

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tokio::runtime::Runtime;

use auto_batcher::{
    Batch, BatchConfiguration, CancellationToken, Chunk, ChunkProcessor, Result,
};

struct Discard;

#[async_trait::async_trait]
impl ChunkProcessor<u64> for Discard {
    async fn process(&self, _chunk: &Chunk<u64>, _cancel: &CancellationToken) -> Result<()> {
        Ok(())
    }
}

async fn run_round(producers: u64) {
    let batch = Arc::new(Batch::new(BatchConfiguration::new(Arc::new(Discard))).unwrap());

    let tasks: Vec<_> = (0..producers)
        .map(|i| {
            let batch = Arc::clone(&batch);
            tokio::spawn(async move {
                let token = batch.new_aggregator_token().await.unwrap();
                batch.add(i, &token).await.unwrap();
                batch.complete_submission(&token).await.unwrap();
                token.dispose();
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }
}

fn bench_rounds(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("batch_round");
    for producers in [1u64, 8, 64] {
        group.throughput(Throughput::Elements(producers));
        group.bench_with_input(
            BenchmarkId::from_parameter(producers),
            &producers,
            |b, &n| {
                b.to_async(&rt).iter(|| run_round(n));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_rounds);
criterion_main!(benches);
