//! Bounded worker pool for per-file conversion units.
//!
//! A dispatcher task hands units to workers as permits of a semaphore become
//! free. Each unit reports exactly one [`CompletionEvent`] on a channel,
//! whatever happens to it: success, tool failure, timeout, panic, or
//! cancellation before dispatch.

use crate::backend::ConversionBackend;
use crate::config::{display_name, ConversionRequest, ConversionResult, PoolConfig};
use crate::error::{ConversionError, Result};
use crate::format::Operation;
use crate::output::ensure_dir;
use async_channel::{unbounded, Receiver, Sender};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One file's conversion task.
#[derive(Debug)]
pub struct WorkUnit {
    /// Position in discovery order.
    pub index: usize,
    pub source: PathBuf,
    job: std::result::Result<(Operation, ConversionRequest), ConversionError>,
}

impl WorkUnit {
    pub fn new(index: usize, op: Operation, request: ConversionRequest) -> Self {
        Self {
            index,
            source: request.source.clone(),
            job: Ok((op, request)),
        }
    }

    /// A unit that already failed during planning; it is reported without
    /// ever reaching a worker.
    pub fn rejected(index: usize, source: PathBuf, error: ConversionError) -> Self {
        Self {
            index,
            source,
            job: Err(error),
        }
    }
}

/// Emitted once per unit.
#[derive(Debug, Clone)]
pub struct CompletionEvent {
    pub index: usize,
    pub result: ConversionResult,
}

impl CompletionEvent {
    pub fn file_name(&self) -> String {
        display_name(&self.result.source)
    }
}

/// Worker pool running units against a [`ConversionBackend`].
pub struct WorkerPool {
    backend: Arc<dyn ConversionBackend>,
    config: PoolConfig,
    semaphore: Arc<Semaphore>,
    total_processed: Arc<AtomicUsize>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .field("available_permits", &self.semaphore.available_permits())
            .field("total_processed", &self.total_processed())
            .finish()
    }
}

impl WorkerPool {
    pub fn new(backend: Arc<dyn ConversionBackend>, config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let workers = config.max_workers;
        Ok(Self {
            backend,
            config,
            semaphore: Arc::new(Semaphore::new(workers)),
            total_processed: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn workers(&self) -> usize {
        self.config.max_workers
    }

    /// Units executed by workers so far, across all runs.
    pub fn total_processed(&self) -> usize {
        self.total_processed.load(Ordering::SeqCst)
    }

    /// Start processing `units`. The returned channel yields one event per
    /// unit and closes once all of them have reported.
    ///
    /// After `cancel` fires no further unit is dispatched; in-flight units
    /// run to completion or to their timeout, and every undispatched unit
    /// reports a `Cancelled` failure.
    pub fn run(
        &self,
        units: Vec<WorkUnit>,
        cancel: CancellationToken,
    ) -> Receiver<CompletionEvent> {
        let (tx, rx) = unbounded();
        let backend = Arc::clone(&self.backend);
        let semaphore = Arc::clone(&self.semaphore);
        let total_processed = Arc::clone(&self.total_processed);
        let unit_timeout = self.config.timeout();

        info!(
            "Dispatching {} units to {} workers",
            units.len(),
            self.config.max_workers
        );

        tokio::spawn(async move {
            for unit in units {
                let (op, request) = match unit.job {
                    Ok(job) => job,
                    Err(error) => {
                        let result = ConversionResult::failed(unit.source, &error, Duration::ZERO);
                        report(&tx, unit.index, result).await;
                        continue;
                    }
                };

                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
                };

                let Some(permit) = permit else {
                    let error = ConversionError::Cancelled {
                        path: unit.source.clone(),
                    };
                    let result = ConversionResult::failed(unit.source, &error, Duration::ZERO);
                    report(&tx, unit.index, result).await;
                    continue;
                };

                let backend = Arc::clone(&backend);
                let total_processed = Arc::clone(&total_processed);
                let tx = tx.clone();
                tokio::spawn(async move {
                    let result = execute(backend.as_ref(), op, request, unit_timeout).await;
                    drop(permit);
                    total_processed.fetch_add(1, Ordering::SeqCst);
                    report(&tx, unit.index, result).await;
                });
            }
            debug!("Dispatcher finished");
        });

        rx
    }
}

async fn report(tx: &Sender<CompletionEvent>, index: usize, result: ConversionResult) {
    if tx.send(CompletionEvent { index, result }).await.is_err() {
        warn!("Completion receiver dropped; result for unit {} lost", index);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Run one unit, turning every failure mode into a [`ConversionResult`].
async fn execute(
    backend: &dyn ConversionBackend,
    op: Operation,
    request: ConversionRequest,
    unit_timeout: Option<Duration>,
) -> ConversionResult {
    let start = Instant::now();
    let source = request.source.clone();
    debug!("Starting {} for {:?}", op, source);

    let work = async {
        ensure_dir(&request.output_dir).await?;
        backend.convert(op, &request).await
    };
    let guarded = AssertUnwindSafe(work).catch_unwind();

    let outcome = match unit_timeout {
        Some(limit) => match tokio::time::timeout(limit, guarded).await {
            Ok(outcome) => outcome,
            Err(_) => Ok(Err(ConversionError::Timeout {
                path: source.clone(),
                timeout: limit,
            })),
        },
        None => guarded.await,
    };

    let error = match outcome {
        Ok(Ok(outputs)) => {
            debug!("Finished {:?} in {:?}", source, start.elapsed());
            return ConversionResult::succeeded(source, outputs, start.elapsed());
        }
        Ok(Err(error)) => error,
        Err(panic) => ConversionError::ConversionFailed {
            path: source.clone(),
            message: format!("worker panicked: {}", panic_message(panic.as_ref())),
        },
    };

    warn!("Failed to convert {:?}: {}", source, error);
    ConversionResult::failed(source, &error, start.elapsed())
}
