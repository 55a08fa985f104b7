//! CLI binary for doc-converter.
//!
//! A thin shim over the core crate: maps flags onto `ConverterConfig`,
//! runs one command and turns the outcome into an exit code.

mod exit;
mod progress;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use doc_converter_core::{
    init_logging, load_config, BatchProcessor, BatchRequest, BatchSummary, ConverterConfig,
    DocumentConverter, ImageFormat, NoProgress, TargetFormat,
};
use progress::BarReporter;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a folder of office documents to PDF
  doc-converter batch-convert -i ./inbox -o ./pdf -f pdf -r

  # Render every PDF page as PNG at 300 DPI
  doc-converter pdf-to-images report.pdf -f png --dpi 300

  # Web page to PDF
  doc-converter html-to-pdf https://example.com -o example.pdf

  # HTML from another program to PDF
  render-invoice | doc-converter html-string-to-pdf -o invoice.pdf

EXIT CODES:
  0    success
  2    invalid arguments, configuration or unsupported conversion
  3    file or directory not found
  4    conversion failure (including any failed file in a batch)
  5    permission denied
  130  batch cancelled

ENVIRONMENT VARIABLES:
  DOC_CONVERTER__<SECTION>__<KEY>  Override a configuration value,
                                   e.g. DOC_CONVERTER__CONVERSION__MAX_WORKERS=8
  RUST_LOG                         Log filter, overrides --verbose/--quiet
"#;

/// Convert documents with Poppler, LibreOffice and wkhtmltopdf.
#[derive(Parser, Debug)]
#[command(
    name = "doc-converter",
    version,
    about = "Convert documents with Poppler, LibreOffice and wkhtmltopdf",
    arg_required_else_help = true,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// YAML configuration file.
    #[arg(long, global = true, env = "DOC_CONVERTER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render PDF pages as images.
    PdfToImages(PdfToImagesArgs),
    /// Convert DOCX to PDF.
    DocxToPdf(SingleArgs),
    /// Convert PPTX to PDF.
    PptxToPdf(SingleArgs),
    /// Convert plain text to PDF.
    TxtToPdf(SingleArgs),
    /// Convert an HTML file or URL to PDF.
    HtmlToPdf(HtmlToPdfArgs),
    /// Convert HTML markup given inline or on stdin to PDF.
    HtmlStringToPdf(HtmlStringArgs),
    /// Convert DOCX to HTML.
    DocxToHtml(SingleArgs),
    /// Print the number of pages in a PDF.
    PageCount {
        input: PathBuf,
    },
    /// Convert every matching file in a directory.
    BatchConvert(BatchArgs),
    /// List supported formats and conversions.
    Formats {
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as JSON.
    Config,
}

#[derive(Args, Debug)]
struct SingleArgs {
    input: PathBuf,

    /// Output file; defaults to the input's directory.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ImageArg {
    #[value(alias = "jpg")]
    Jpeg,
    Png,
}

impl From<ImageArg> for ImageFormat {
    fn from(arg: ImageArg) -> Self {
        match arg {
            ImageArg::Jpeg => ImageFormat::Jpeg,
            ImageArg::Png => ImageFormat::Png,
        }
    }
}

#[derive(Args, Debug)]
struct PdfToImagesArgs {
    input: PathBuf,

    /// Output directory; defaults to `<stem>_images` next to the PDF.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Image format; defaults to the configured one.
    #[arg(short, long, value_enum)]
    format: Option<ImageArg>,

    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=1200))]
    dpi: Option<u32>,

    /// JPEG quality (1-100).
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    #[arg(long)]
    first_page: Option<u32>,

    #[arg(long)]
    last_page: Option<u32>,
}

#[derive(Args, Debug)]
struct HtmlToPdfArgs {
    /// Local HTML file or http(s) URL.
    source: String,

    /// Output file; required for URLs.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Extra wkhtmltopdf option as KEY or KEY=VALUE; repeatable.
    #[arg(long = "option", value_name = "KEY[=VALUE]")]
    options: Vec<String>,
}

#[derive(Args, Debug)]
struct HtmlStringArgs {
    /// HTML markup; read from stdin when omitted or `-`.
    html: Option<String>,

    #[arg(short, long)]
    output: PathBuf,

    /// Extra wkhtmltopdf option as KEY or KEY=VALUE; repeatable.
    #[arg(long = "option", value_name = "KEY[=VALUE]")]
    options: Vec<String>,
}

#[derive(Args, Debug)]
struct BatchArgs {
    #[arg(short, long)]
    input_dir: PathBuf,

    #[arg(short, long)]
    output_dir: PathBuf,

    /// Target format: pdf, html, jpeg or png.
    #[arg(short, long, value_parser = parse_target)]
    format: TargetFormat,

    /// Glob patterns selecting input files.
    #[arg(long, num_args = 1.., default_value = "*")]
    patterns: Vec<String>,

    #[arg(short, long)]
    recursive: bool,

    /// Concurrent conversions; defaults to the configured count.
    #[arg(short, long)]
    workers: Option<usize>,

    /// Per-file time budget in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Report files with unrecognized extensions as failures instead of
    /// skipping them.
    #[arg(long)]
    include_unsupported: bool,

    /// Print the summary as JSON.
    #[arg(long)]
    json: bool,

    #[arg(long)]
    no_progress: bool,
}

fn parse_target(s: &str) -> std::result::Result<TargetFormat, String> {
    TargetFormat::from_str(s).map_err(|e| e.to_string())
}

/// Split `KEY=VALUE` (or a bare flag `KEY`) into wkhtmltopdf options.
fn parse_options(raw: &[String]) -> BTreeMap<String, Option<String>> {
    raw.iter()
        .map(|item| match item.split_once('=') {
            Some((key, value)) => (key.to_string(), Some(value.to_string())),
            None => (item.clone(), None),
        })
        .collect()
}

fn log_level(cli: &Cli, config: &ConverterConfig, progress_bar: bool) -> String {
    if cli.verbose {
        "debug".to_string()
    } else if cli.quiet {
        "error".to_string()
    } else if progress_bar {
        // The bar carries the per-file feedback.
        "warn".to_string()
    } else {
        config.logging.level.clone()
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => exit::exit_code(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit::exit_code(exit::code_for_error(&e))
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let config = load_config(cli.config.as_deref()).context("loading configuration")?;

    let progress_bar = matches!(
        &cli.command,
        Command::BatchConvert(args) if !args.json && !args.no_progress && !cli.quiet
    );
    init_logging(&log_level(&cli, &config, progress_bar));

    match cli.command {
        Command::PdfToImages(args) => {
            let converter = DocumentConverter::new(&config)?;
            let mut options = converter.default_options();
            if let Some(dpi) = args.dpi {
                options = options.with_dpi(dpi);
            }
            if let Some(quality) = args.quality {
                options.image_quality = quality;
            }
            let options = options.with_page_range(args.first_page, args.last_page);
            let format = args
                .format
                .map(ImageFormat::from)
                .unwrap_or_else(|| converter.default_image_format());

            let pages = converter
                .pdf_to_images(&args.input, args.output_dir.as_deref(), format, Some(options))
                .await
                .with_context(|| format!("rendering {}", args.input.display()))?;
            for page in &pages {
                println!("{}", page.display());
            }
        }
        Command::DocxToPdf(args) => {
            let converter = DocumentConverter::new(&config)?;
            print_single(&args, converter.docx_to_pdf(&args.input, args.output.as_deref()).await)?;
        }
        Command::PptxToPdf(args) => {
            let converter = DocumentConverter::new(&config)?;
            print_single(&args, converter.pptx_to_pdf(&args.input, args.output.as_deref()).await)?;
        }
        Command::TxtToPdf(args) => {
            let converter = DocumentConverter::new(&config)?;
            print_single(&args, converter.txt_to_pdf(&args.input, args.output.as_deref()).await)?;
        }
        Command::DocxToHtml(args) => {
            let converter = DocumentConverter::new(&config)?;
            print_single(&args, converter.docx_to_html(&args.input, args.output.as_deref()).await)?;
        }
        Command::HtmlToPdf(args) => {
            let converter = DocumentConverter::new(&config)?;
            let options = parse_options(&args.options);
            let pdf = converter
                .html_to_pdf(&args.source, args.output.as_deref(), Some(options))
                .await
                .with_context(|| format!("converting {}", args.source))?;
            println!("{}", pdf.display());
        }
        Command::HtmlStringToPdf(args) => {
            let html = match args.html.as_deref() {
                Some(html) if html != "-" => html.to_string(),
                _ => {
                    let mut html = String::new();
                    tokio::io::stdin()
                        .read_to_string(&mut html)
                        .await
                        .context("reading HTML from stdin")?;
                    html
                }
            };
            let converter = DocumentConverter::new(&config)?;
            let pdf = converter
                .html_string_to_pdf(&html, &args.output, Some(parse_options(&args.options)))
                .await
                .with_context(|| format!("rendering HTML to {}", args.output.display()))?;
            println!("{}", pdf.display());
        }
        Command::PageCount { input } => {
            let converter = DocumentConverter::new(&config)?;
            let pages = converter
                .pdf_page_count(&input)
                .await
                .with_context(|| format!("reading {}", input.display()))?;
            println!("{}", pages);
        }
        Command::BatchConvert(args) => {
            return batch_convert(config, args, progress_bar).await;
        }
        Command::Formats { json } => {
            let formats = doc_converter_core::supported_formats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&formats)?);
            } else {
                println!("Input formats:  {}", formats.input.join(", "));
                println!("Output formats: {}", formats.output.join(", "));
                println!("Conversions:");
                for c in &formats.conversions {
                    println!(
                        "  {:<5} -> {:<5} {}",
                        c.input.to_string(),
                        c.target.to_string(),
                        c.operation
                    );
                }
            }
        }
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(exit::SUCCESS)
}

fn print_single(args: &SingleArgs, result: doc_converter_core::Result<PathBuf>) -> Result<()> {
    let output = result.with_context(|| format!("converting {}", args.input.display()))?;
    println!("{}", output.display());
    Ok(())
}

async fn batch_convert(
    mut config: ConverterConfig,
    args: BatchArgs,
    progress_bar: bool,
) -> Result<u8> {
    if let Some(workers) = args.workers {
        config.conversion.max_workers = workers;
    }
    if let Some(timeout) = args.timeout {
        config.conversion.timeout_secs = Some(timeout);
    }

    let processor = BatchProcessor::new(&config)?;
    let request = BatchRequest::new(&args.input_dir, &args.output_dir, args.format)
        .with_patterns(args.patterns.iter().cloned())
        .recursive(args.recursive)
        .include_unsupported(args.include_unsupported);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing in-flight conversions");
            on_signal.cancel();
        }
    });

    let outcome = if progress_bar {
        let reporter = BarReporter::new();
        let bar = reporter.handle();
        let outcome = processor.convert_directory(&request, reporter, cancel).await;
        bar.finish_and_clear();
        outcome
    } else {
        processor.convert_directory(&request, NoProgress, cancel).await
    };
    let summary = outcome.with_context(|| format!("converting {}", args.input_dir.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_report(&summary, &args.output_dir);
    }
    Ok(exit::code_for_summary(&summary))
}

fn print_report(summary: &BatchSummary, output_dir: &Path) {
    for failure in summary.failures() {
        println!(
            "FAILED {}: {}",
            failure.source.display(),
            failure.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!(
        "{} of {} files converted into {} ({} failed) in {:.1}s",
        summary.succeeded,
        summary.total_files,
        output_dir.display(),
        summary.failed,
        summary.duration_ms as f64 / 1000.0
    );
    if summary.cancelled {
        println!("Batch cancelled before all files were dispatched");
    }
}
