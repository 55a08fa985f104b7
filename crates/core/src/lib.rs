//! # doc-converter-core
//!
//! Batch document conversion driven by external tools.
//!
//! Nothing is parsed or rendered in-process. Each conversion is delegated to
//! an installed binary:
//!
//! - **Poppler** (`pdftoppm`, `pdfinfo`) for PDF to JPEG/PNG
//! - **LibreOffice** for DOCX/PPTX/TXT to PDF and DOCX to HTML
//! - **wkhtmltopdf** for HTML to PDF
//!
//! The crate locates the tools, runs them under a timeout over a bounded
//! worker pool and reports one result per input file.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doc_converter_core::{DocumentConverter, ConverterConfig, ImageFormat};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let converter = DocumentConverter::new(&ConverterConfig::default())?;
//!
//!     let pdf = converter.docx_to_pdf(Path::new("report.docx"), None).await?;
//!     let pages = converter.pdf_to_images(&pdf, None, ImageFormat::Png, None).await?;
//!
//!     println!("Rendered {} pages", pages.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Batch Processing with Progress
//!
//! ```rust,no_run
//! use doc_converter_core::{
//!     BatchProcessor, BatchProgress, BatchRequest, ConverterConfig, TargetFormat,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let processor = BatchProcessor::new(&ConverterConfig::new(4, 200))?;
//!     let request = BatchRequest::new("./input", "./output", TargetFormat::Pdf).recursive(true);
//!
//!     let summary = processor
//!         .convert_directory(
//!             &request,
//!             |progress: &BatchProgress| -> anyhow::Result<()> {
//!                 println!("{}/{}: {}", progress.completed, progress.total, progress.file_name);
//!                 Ok(())
//!             },
//!             CancellationToken::new(),
//!         )
//!         .await?;
//!
//!     println!("{} succeeded, {} failed", summary.succeeded, summary.failed);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod batch;
pub mod config;
pub mod converter;
pub mod discovery;
pub mod error;
pub mod format;
pub mod loader;
pub mod output;
pub mod pool;
pub mod tools;

// Re-export main types for convenience
pub use backend::{ConversionBackend, ExternalToolBackend};
pub use batch::{BatchProcessor, BatchRequest, NoProgress, ProgressReporter};
pub use config::{
    BatchProgress, BatchSummary, ConversionOptions, ConversionRequest, ConversionResult,
    ConverterConfig, LibreOfficeConfig, LoggingConfig, OutputConfig, PageSetup, PoolConfig,
    PopplerConfig, WkhtmltopdfConfig,
};
pub use converter::{supported_formats, DocumentConverter, SupportedConversion, SupportedFormats};
pub use discovery::{discover, DiscoveryOptions, ExtensionFilter};
pub use error::{ConversionError, ErrorKind, Result};
pub use format::{DispatchTable, ImageFormat, InputFormat, Operation, TargetFormat, Tool};
pub use loader::load_config;
pub use pool::{CompletionEvent, WorkUnit, WorkerPool};

/// Recognized input file extensions.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "docx", "pptx", "txt", "html", "htm"];

/// Check if a file extension is a recognized input format.
pub fn is_supported_extension(ext: &str) -> bool {
    SUPPORTED_EXTENSIONS
        .iter()
        .any(|&e| e.eq_ignore_ascii_case(ext))
}

/// Initialize logging to stderr.
///
/// `level` is used when `RUST_LOG` is unset. Calling this more than once
/// keeps the first subscriber.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
