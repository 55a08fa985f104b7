//! Single-file conversion API.
//!
//! Each method converts one document through the external tools and returns
//! the produced path(s). Outputs default to the input's directory.

use crate::backend::{ConversionBackend, ExternalToolBackend};
use crate::config::{is_url, ConversionOptions, ConversionRequest, ConverterConfig};
use crate::error::{ConversionError, Result};
use crate::format::{DispatchTable, ImageFormat, InputFormat, Operation, TargetFormat};
use crate::output::{ensure_dir, sibling_images_dir, sibling_output};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// One supported conversion, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupportedConversion {
    pub input: InputFormat,
    pub target: TargetFormat,
    pub operation: String,
}

/// Formats and conversions this crate can perform.
#[derive(Debug, Clone, Serialize)]
pub struct SupportedFormats {
    pub input: Vec<String>,
    pub output: Vec<String>,
    pub conversions: Vec<SupportedConversion>,
}

/// Describe every supported conversion.
pub fn supported_formats() -> Result<SupportedFormats> {
    let table = DispatchTable::new()?;
    Ok(SupportedFormats {
        input: InputFormat::ALL.iter().map(|f| f.to_string()).collect(),
        output: TargetFormat::ALL.iter().map(|f| f.to_string()).collect(),
        conversions: table
            .supported()
            .into_iter()
            .map(|(input, target, op)| SupportedConversion {
                input,
                target,
                operation: op.name().to_string(),
            })
            .collect(),
    })
}

fn require_input(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(ConversionError::InputNotFound(path.to_path_buf()))
    }
}

/// Converts individual documents.
#[derive(Debug)]
pub struct DocumentConverter {
    tools: ExternalToolBackend,
    options: ConversionOptions,
    image_format: ImageFormat,
}

impl DocumentConverter {
    /// Create a converter, locating the external tools named in `config`.
    pub fn new(config: &ConverterConfig) -> Result<Self> {
        config.validate()?;
        let tools = ExternalToolBackend::from_config(config)?;
        info!("Document converter initialized");
        Ok(Self {
            tools,
            options: ConversionOptions::from_config(config),
            image_format: config.output.image_format,
        })
    }

    /// Options derived from the configuration, for callers to adjust.
    pub fn default_options(&self) -> ConversionOptions {
        self.options.clone()
    }

    /// Configured default image format.
    pub fn default_image_format(&self) -> ImageFormat {
        self.image_format
    }

    async fn run(&self, op: Operation, request: ConversionRequest) -> Result<Vec<PathBuf>> {
        let start = Instant::now();
        if !request.is_remote() {
            require_input(&request.source)?;
        }
        request.options.validate()?;
        ensure_dir(&request.output_dir).await?;

        info!("Running {} for {:?}", op, request.source);
        let outputs = self.tools.convert(op, &request).await?;
        info!(
            "{} produced {} file(s) in {:?}",
            op,
            outputs.len(),
            start.elapsed()
        );
        Ok(outputs)
    }

    async fn single(
        &self,
        op: Operation,
        source: &Path,
        output: Option<&Path>,
        target: TargetFormat,
    ) -> Result<PathBuf> {
        let output = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| sibling_output(source, target));
        let request =
            ConversionRequest::new(source, &output, target).with_options(self.default_options());
        self.run(op, request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ConversionError::ConversionFailed {
                path: source.to_path_buf(),
                message: "no output produced".to_string(),
            })
    }

    /// Rasterize a PDF into `output_dir` (default `<stem>_images/` next to
    /// the PDF) as `page_NNN.<ext>`.
    ///
    /// DPI, JPEG quality and page range come from `options`, or from the
    /// configuration when None.
    pub async fn pdf_to_images(
        &self,
        pdf: &Path,
        output_dir: Option<&Path>,
        format: ImageFormat,
        options: Option<ConversionOptions>,
    ) -> Result<Vec<PathBuf>> {
        let output_dir = output_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| sibling_images_dir(pdf));
        let request = ConversionRequest::images(pdf, output_dir, format)
            .with_options(options.unwrap_or_else(|| self.default_options()));
        self.run(Operation::PdfToImages(format), request).await
    }

    pub async fn docx_to_pdf(&self, docx: &Path, output: Option<&Path>) -> Result<PathBuf> {
        self.single(Operation::DocxToPdf, docx, output, TargetFormat::Pdf)
            .await
    }

    pub async fn pptx_to_pdf(&self, pptx: &Path, output: Option<&Path>) -> Result<PathBuf> {
        self.single(Operation::PptxToPdf, pptx, output, TargetFormat::Pdf)
            .await
    }

    pub async fn txt_to_pdf(&self, txt: &Path, output: Option<&Path>) -> Result<PathBuf> {
        self.single(Operation::TxtToPdf, txt, output, TargetFormat::Pdf)
            .await
    }

    pub async fn docx_to_html(&self, docx: &Path, output: Option<&Path>) -> Result<PathBuf> {
        self.single(Operation::DocxToHtml, docx, output, TargetFormat::Html)
            .await
    }

    /// Render an HTML file or `http(s)://` URL to PDF.
    ///
    /// `extra_options` are wkhtmltopdf flags merged over the configured ones.
    /// A URL source requires an explicit output path.
    pub async fn html_to_pdf(
        &self,
        source: &str,
        output: Option<&Path>,
        extra_options: Option<BTreeMap<String, Option<String>>>,
    ) -> Result<PathBuf> {
        let source_path = PathBuf::from(source);
        let output = match output {
            Some(output) => output.to_path_buf(),
            None if is_url(source) => {
                return Err(ConversionError::InvalidConfig(
                    "an output path is required when converting a URL".to_string(),
                ))
            }
            None => sibling_output(&source_path, TargetFormat::Pdf),
        };

        let options = self
            .default_options()
            .with_extra_options(extra_options.unwrap_or_default());
        let request =
            ConversionRequest::new(source_path, &output, TargetFormat::Pdf).with_options(options);

        self.run(Operation::HtmlToPdf, request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ConversionError::ConversionFailed {
                path: PathBuf::from(source),
                message: "no output produced".to_string(),
            })
    }

    /// Render HTML markup held in memory to `output`.
    ///
    /// The markup is staged in a temporary `.html` file, so relative links
    /// in it resolve against the temp directory rather than `output`.
    pub async fn html_string_to_pdf(
        &self,
        html: &str,
        output: &Path,
        extra_options: Option<BTreeMap<String, Option<String>>>,
    ) -> Result<PathBuf> {
        let staged = tempfile::Builder::new()
            .prefix("doc-converter-")
            .suffix(".html")
            .tempfile()
            .map_err(|e| ConversionError::output_io(std::env::temp_dir(), e))?;
        tokio::fs::write(staged.path(), html)
            .await
            .map_err(|e| ConversionError::output_io(staged.path(), e))?;

        let source = staged.path().to_string_lossy().into_owned();
        self.html_to_pdf(&source, Some(output), extra_options).await
    }

    /// Number of pages in a PDF.
    pub async fn pdf_page_count(&self, pdf: &Path) -> Result<u32> {
        require_input(pdf)?;
        self.tools.poppler()?.page_count(pdf).await
    }

    pub fn supported_formats(&self) -> Result<SupportedFormats> {
        supported_formats()
    }
}
