//! Benchmarks for batch orchestration overhead.
//!
//! The backend does no work, so these measure discovery, dispatch, the
//! worker pool and aggregation rather than the external tools.
//!
//! Run with: cargo bench --package doc-converter-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use doc_converter_core::{
    BatchProcessor, BatchRequest, ConversionBackend, ConversionRequest, ConverterConfig,
    NoProgress, Operation, Result, TargetFormat,
};
use futures::future::{BoxFuture, FutureExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct NoopBackend;

impl ConversionBackend for NoopBackend {
    fn convert<'a>(
        &'a self,
        _op: Operation,
        request: &'a ConversionRequest,
    ) -> BoxFuture<'a, Result<Vec<PathBuf>>> {
        async move { Ok(vec![request.output_path()]) }.boxed()
    }
}

fn input_tree(files: usize) -> TempDir {
    let dir = TempDir::new().unwrap();
    let extensions = ["pdf", "docx", "pptx", "txt", "html"];
    for i in 0..files {
        let ext = extensions[i % extensions.len()];
        std::fs::write(dir.path().join(format!("doc_{:04}.{}", i, ext)), b"x").unwrap();
    }
    dir
}

fn benchmark_batch_throughput(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("batch");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(5));

    for files in [10, 100, 500] {
        let input = input_tree(files);
        let output = TempDir::new().unwrap();
        group.throughput(Throughput::Elements(files as u64));

        for workers in [1, 8] {
            let processor = BatchProcessor::with_backend(
                Arc::new(NoopBackend),
                &ConverterConfig::new(workers, 150),
            )
            .unwrap();
            let request = BatchRequest::new(input.path(), output.path(), TargetFormat::Pdf);

            group.bench_with_input(
                BenchmarkId::new(format!("workers_{}", workers), files),
                &request,
                |b, request| {
                    b.to_async(&runtime).iter(|| async {
                        let summary = processor
                            .convert_directory(request, NoProgress, CancellationToken::new())
                            .await
                            .unwrap();
                        black_box(summary.succeeded)
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, benchmark_batch_throughput);
criterion_main!(benches);
