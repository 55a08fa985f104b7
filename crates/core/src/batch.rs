//! Batch conversion: discovery, dispatch, the worker pool and aggregation.

use crate::backend::{ConversionBackend, ExternalToolBackend};
use crate::config::{
    BatchProgress, BatchSummary, ConversionOptions, ConversionResult, ConverterConfig,
};
use crate::discovery::{discover, DiscoveryOptions, ExtensionFilter};
use crate::error::{ConversionError, Result};
use crate::format::{DispatchTable, TargetFormat};
use crate::output::{ensure_dir, probe_writable, OutputPlanner};
use crate::pool::{WorkUnit, WorkerPool};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Receives progress after each file completes.
///
/// Called from the aggregating task only, so implementations need not be
/// thread-safe. Errors and panics are logged and otherwise ignored.
pub trait ProgressReporter: Send {
    fn report(&mut self, progress: &BatchProgress) -> anyhow::Result<()>;
}

impl<F> ProgressReporter for F
where
    F: FnMut(&BatchProgress) -> anyhow::Result<()> + Send,
{
    fn report(&mut self, progress: &BatchProgress) -> anyhow::Result<()> {
        self(progress)
    }
}

/// Reporter that ignores progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&mut self, _progress: &BatchProgress) -> anyhow::Result<()> {
        Ok(())
    }
}

/// What to convert and where to put it.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub target: TargetFormat,
    pub discovery: DiscoveryOptions,
    /// Per-format options; the processor's configured defaults when None.
    pub options: Option<ConversionOptions>,
}

impl BatchRequest {
    pub fn new(
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        target: TargetFormat,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            target,
            discovery: DiscoveryOptions::default(),
            options: None,
        }
    }

    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.discovery = self.discovery.with_patterns(patterns);
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.discovery = self.discovery.recursive(recursive);
        self
    }

    /// Also pick up files without a recognized extension; they are reported
    /// as unsupported instead of being skipped silently.
    pub fn include_unsupported(mut self, include: bool) -> Self {
        let filter = if include {
            ExtensionFilter::Any
        } else {
            ExtensionFilter::Supported
        };
        self.discovery = self.discovery.with_filter(filter);
        self
    }

    pub fn with_options(mut self, options: ConversionOptions) -> Self {
        self.options = Some(options);
        self
    }
}

/// Runs batches of conversions over a bounded worker pool.
#[derive(Debug)]
pub struct BatchProcessor {
    pool: WorkerPool,
    table: DispatchTable,
    options: ConversionOptions,
}

impl BatchProcessor {
    /// Create a processor backed by the external tools named in `config`.
    pub fn new(config: &ConverterConfig) -> Result<Self> {
        config.validate()?;
        let backend = ExternalToolBackend::from_config(config)?;
        Self::with_backend(Arc::new(backend), config)
    }

    /// Create a processor with a custom backend.
    pub fn with_backend(
        backend: Arc<dyn ConversionBackend>,
        config: &ConverterConfig,
    ) -> Result<Self> {
        config.validate()?;
        let pool = WorkerPool::new(backend, config.conversion.clone())?;
        info!("Batch processor ready with {} workers", pool.workers());
        Ok(Self {
            pool,
            table: DispatchTable::new()?,
            options: ConversionOptions::from_config(config),
        })
    }

    pub fn workers(&self) -> usize {
        self.pool.workers()
    }

    pub fn dispatch_table(&self) -> &DispatchTable {
        &self.table
    }

    /// Convert every matching file under `request.input_dir`.
    ///
    /// Fails only on setup problems: a missing input directory, invalid
    /// options or an unusable output directory. Per-file failures are in
    /// the returned summary.
    pub async fn convert_directory<P: ProgressReporter>(
        &self,
        request: &BatchRequest,
        progress: P,
        cancel: CancellationToken,
    ) -> Result<BatchSummary> {
        let start = Instant::now();
        let options = request.options.clone().unwrap_or_else(|| self.options.clone());
        options.validate()?;

        let input_dir = request.input_dir.clone();
        let discovery = request.discovery.clone().exclude_dir(&request.output_dir);
        let files = tokio::task::spawn_blocking(move || discover(&input_dir, &discovery))
            .await
            .map_err(|e| ConversionError::ChannelError(format!("discovery task failed: {}", e)))??;

        info!(
            "Found {} files in {:?} to convert to {}",
            files.len(),
            request.input_dir,
            request.target
        );
        if files.is_empty() {
            return Ok(BatchSummary::empty(start.elapsed()));
        }

        self.run_batch(
            files,
            Some(request.input_dir.clone()),
            &request.output_dir,
            request.target,
            &options,
            progress,
            cancel,
            start,
        )
        .await
    }

    /// Convert an explicit list of files into `output_dir`.
    ///
    /// Missing files are reported as `NotFound` failures in the summary.
    pub async fn convert_file_list<P: ProgressReporter>(
        &self,
        files: &[PathBuf],
        output_dir: &Path,
        target: TargetFormat,
        progress: P,
        cancel: CancellationToken,
    ) -> Result<BatchSummary> {
        let start = Instant::now();
        let options = self.options.clone();
        options.validate()?;

        if files.is_empty() {
            return Ok(BatchSummary::empty(start.elapsed()));
        }

        self.run_batch(
            files.to_vec(),
            None,
            output_dir,
            target,
            &options,
            progress,
            cancel,
            start,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_batch<P: ProgressReporter>(
        &self,
        files: Vec<PathBuf>,
        input_root: Option<PathBuf>,
        output_dir: &Path,
        target: TargetFormat,
        options: &ConversionOptions,
        mut progress: P,
        cancel: CancellationToken,
        start: Instant,
    ) -> Result<BatchSummary> {
        ensure_dir(output_dir).await?;
        probe_writable(output_dir)?;

        let mut planner = OutputPlanner::new(output_dir, input_root);
        planner.reserve_sources(&files);

        let units: Vec<WorkUnit> = files
            .iter()
            .enumerate()
            .map(|(index, source)| {
                if !source.exists() {
                    warn!("File not found: {:?}", source);
                    return WorkUnit::rejected(
                        index,
                        source.clone(),
                        ConversionError::InputNotFound(source.clone()),
                    );
                }
                match self.table.dispatch(source, target) {
                    Ok(op) => WorkUnit::new(index, op, planner.plan(source, op, target, options)),
                    Err(e) => {
                        warn!("Skipping {:?}: {}", source, e);
                        WorkUnit::rejected(index, source.clone(), e)
                    }
                }
            })
            .collect();

        let total = units.len();
        let events = self.pool.run(units, cancel.clone());

        let mut slots: Vec<Option<ConversionResult>> = vec![None; total];
        let mut completed = 0;
        while let Ok(event) = events.recv().await {
            completed += 1;
            let update = BatchProgress {
                completed,
                total,
                file_name: event.file_name(),
            };
            notify(&mut progress, &update);
            slots[event.index] = Some(event.result);
        }

        let results: Vec<ConversionResult> = slots
            .into_iter()
            .zip(files)
            .map(|(slot, source)| {
                slot.unwrap_or_else(|| {
                    let error = ConversionError::ChannelError("no result reported".to_string());
                    error!("No result for {:?}", source);
                    ConversionResult::failed(source, &error, Duration::ZERO)
                })
            })
            .collect();

        let summary = BatchSummary::from_results(results, start.elapsed(), cancel.is_cancelled());
        info!(
            "Batch finished: {} succeeded, {} failed in {:?}",
            summary.succeeded,
            summary.failed,
            start.elapsed()
        );
        Ok(summary)
    }
}

/// Deliver progress, containing reporter errors and panics.
fn notify<P: ProgressReporter>(progress: &mut P, update: &BatchProgress) {
    match std::panic::catch_unwind(AssertUnwindSafe(|| progress.report(update))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Progress callback failed: {:#}", e),
        Err(_) => error!("Progress callback panicked at {}/{}", update.completed, update.total),
    }
}
