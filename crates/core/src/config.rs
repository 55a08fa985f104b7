//! Configuration and request/result types for document conversion.

use crate::error::{ConversionError, ErrorKind, Result};
use crate::format::{ImageFormat, TargetFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Image output defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default image format for PDF rasterization.
    /// Default: jpeg.
    pub image_format: ImageFormat,

    /// JPEG quality (1-100).
    /// Default: 95.
    pub image_quality: u8,

    /// Rasterization resolution.
    /// Default: 200.
    pub image_dpi: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            image_format: ImageFormat::Jpeg,
            image_quality: 95,
            image_dpi: 200,
        }
    }
}

/// Configuration for the batch worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of units converted concurrently.
    /// Default: number of CPU cores.
    pub max_workers: usize,

    /// Optional time budget for one unit of work, in seconds.
    /// Default: none (each tool still has its own timeout).
    pub timeout_secs: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: num_cpus::get(),
            timeout_secs: None,
        }
    }
}

impl PoolConfig {
    /// Create a new pool config with the given worker count.
    pub fn with_workers(max_workers: usize) -> Self {
        Self {
            max_workers,
            ..Default::default()
        }
    }

    /// Set the per-unit timeout.
    pub fn unit_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs().max(1));
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(ConversionError::InvalidConfig(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.timeout_secs == Some(0) {
            return Err(ConversionError::InvalidConfig(
                "conversion timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_tool_timeout() -> u64 {
    300
}

/// LibreOffice settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibreOfficeConfig {
    /// Path to the soffice binary. If None, searches well-known locations and PATH.
    pub path: Option<PathBuf>,

    /// Timeout for one soffice invocation, in seconds.
    /// Default: 300.
    pub timeout_secs: u64,
}

impl Default for LibreOfficeConfig {
    fn default() -> Self {
        Self {
            path: None,
            timeout_secs: default_tool_timeout(),
        }
    }
}

/// Poppler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopplerConfig {
    pub pdftoppm_path: Option<PathBuf>,
    pub pdfinfo_path: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for PopplerConfig {
    fn default() -> Self {
        Self {
            pdftoppm_path: None,
            pdfinfo_path: None,
            timeout_secs: default_tool_timeout(),
        }
    }
}

/// wkhtmltopdf settings and page defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WkhtmltopdfConfig {
    pub path: Option<PathBuf>,
    pub timeout_secs: u64,
    pub page_size: String,
    pub margin_top: String,
    pub margin_right: String,
    pub margin_bottom: String,
    pub margin_left: String,
    pub encoding: String,

    /// Additional `--flag [value]` options passed through verbatim.
    pub extra_options: BTreeMap<String, Option<String>>,
}

impl Default for WkhtmltopdfConfig {
    fn default() -> Self {
        Self {
            path: None,
            timeout_secs: default_tool_timeout(),
            page_size: "A4".to_string(),
            margin_top: "0.75in".to_string(),
            margin_right: "0.75in".to_string(),
            margin_bottom: "0.75in".to_string(),
            margin_left: "0.75in".to_string(),
            encoding: "UTF-8".to_string(),
            extra_options: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level when RUST_LOG is not set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Combined configuration for the converter.
///
/// Loaded from YAML by [`crate::loader`], or built in code; either way it is
/// passed explicitly to the entry points.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub output: OutputConfig,
    pub conversion: PoolConfig,
    pub libreoffice: LibreOfficeConfig,
    pub poppler: PopplerConfig,
    pub wkhtmltopdf: WkhtmltopdfConfig,
    pub logging: LoggingConfig,
}

impl ConverterConfig {
    /// Create a converter config with the given worker count and DPI.
    pub fn new(max_workers: usize, dpi: u32) -> Self {
        let mut config = Self::default();
        config.conversion.max_workers = max_workers;
        config.output.image_dpi = dpi;
        config
    }

    /// Validate the entire configuration.
    pub fn validate(&self) -> Result<()> {
        self.conversion.validate()?;
        if self.output.image_dpi == 0 || self.output.image_dpi > 1200 {
            return Err(ConversionError::InvalidConfig(
                "image_dpi must be between 1 and 1200".to_string(),
            ));
        }
        if self.output.image_quality == 0 || self.output.image_quality > 100 {
            return Err(ConversionError::InvalidConfig(
                "image_quality must be between 1 and 100".to_string(),
            ));
        }
        for (name, secs) in [
            ("libreoffice.timeout_secs", self.libreoffice.timeout_secs),
            ("poppler.timeout_secs", self.poppler.timeout_secs),
            ("wkhtmltopdf.timeout_secs", self.wkhtmltopdf.timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConversionError::InvalidConfig(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Dotted key-path lookup, e.g. `output.image_dpi`.
    pub fn lookup(&self, key: &str) -> Option<serde_json::Value> {
        let root = serde_json::to_value(self).ok()?;
        key.split('.')
            .try_fold(&root, |value, part| value.get(part))
            .cloned()
    }
}

/// Page layout for HTML rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSetup {
    pub page_size: String,
    pub margin_top: String,
    pub margin_right: String,
    pub margin_bottom: String,
    pub margin_left: String,
    pub encoding: String,
}

/// Per-format options carried by every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionOptions {
    pub dpi: u32,
    pub image_quality: u8,
    /// First page to rasterize (1-indexed).
    pub first_page: Option<u32>,
    /// Last page to rasterize (1-indexed, inclusive).
    pub last_page: Option<u32>,
    pub page: PageSetup,
    pub extra_options: BTreeMap<String, Option<String>>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self::from_config(&ConverterConfig::default())
    }
}

impl ConversionOptions {
    /// Take defaults from the loaded configuration.
    pub fn from_config(config: &ConverterConfig) -> Self {
        let wk = &config.wkhtmltopdf;
        Self {
            dpi: config.output.image_dpi,
            image_quality: config.output.image_quality,
            first_page: None,
            last_page: None,
            page: PageSetup {
                page_size: wk.page_size.clone(),
                margin_top: wk.margin_top.clone(),
                margin_right: wk.margin_right.clone(),
                margin_bottom: wk.margin_bottom.clone(),
                margin_left: wk.margin_left.clone(),
                encoding: wk.encoding.clone(),
            },
            extra_options: wk.extra_options.clone(),
        }
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn with_page_range(mut self, first: Option<u32>, last: Option<u32>) -> Self {
        self.first_page = first;
        self.last_page = last;
        self
    }

    /// Merge caller-supplied wkhtmltopdf options over the configured ones.
    pub fn with_extra_options(mut self, options: BTreeMap<String, Option<String>>) -> Self {
        self.extra_options.extend(options);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.dpi == 0 || self.dpi > 1200 {
            return Err(ConversionError::InvalidConfig(
                "dpi must be between 1 and 1200".to_string(),
            ));
        }
        if !(1..=100).contains(&self.image_quality) {
            return Err(ConversionError::InvalidConfig(format!(
                "image_quality must be between 1 and 100, got {}",
                self.image_quality
            )));
        }
        if self.first_page == Some(0) || self.last_page == Some(0) {
            return Err(ConversionError::InvalidConfig(
                "page numbers are 1-indexed".to_string(),
            ));
        }
        if let (Some(first), Some(last)) = (self.first_page, self.last_page) {
            if first > last {
                return Err(ConversionError::InvalidConfig(format!(
                    "first page {} is after last page {}",
                    first, last
                )));
            }
        }
        Ok(())
    }
}

/// A single conversion request: one source, one destination, one target.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// Path to the input document (or an http(s) URL for HTML input).
    pub source: PathBuf,

    /// Directory the output is written to.
    pub output_dir: PathBuf,

    /// Output file name for single-file targets; page-name prefix for images.
    pub output_name: String,

    pub target: TargetFormat,

    pub options: ConversionOptions,
}

impl ConversionRequest {
    /// Request a single output file at `output_path`.
    pub fn new(
        source: impl Into<PathBuf>,
        output_path: impl AsRef<Path>,
        target: TargetFormat,
    ) -> Self {
        let output_path = output_path.as_ref();
        let output_dir = match output_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let output_name = output_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("output.{}", target.extension()));
        Self {
            source: source.into(),
            output_dir,
            output_name,
            target,
            options: ConversionOptions::default(),
        }
    }

    /// Request page images written into `output_dir` as `page_NNN.<ext>`.
    pub fn images(
        source: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        format: ImageFormat,
    ) -> Self {
        Self {
            source: source.into(),
            output_dir: output_dir.into(),
            output_name: "page".to_string(),
            target: format.into(),
            options: ConversionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ConversionOptions) -> Self {
        self.options = options;
        self
    }

    /// Destination of a single-file conversion.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_name)
    }

    /// File name of a rendered page.
    pub fn page_file_name(&self, page_number: u32) -> String {
        format!(
            "{}_{:03}.{}",
            self.output_name,
            page_number,
            self.target.extension()
        )
    }

    /// Whether the source is a URL rather than a local path.
    pub fn is_remote(&self) -> bool {
        self.source.to_str().map(is_url).unwrap_or(false)
    }

    pub fn source_name(&self) -> String {
        display_name(&self.source)
    }
}

/// Whether `source` is an http(s) URL.
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

/// Outcome of converting one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub source: PathBuf,
    pub outputs: Vec<PathBuf>,
    pub success: bool,
    pub error_kind: Option<ErrorKind>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ConversionResult {
    pub fn succeeded(source: PathBuf, outputs: Vec<PathBuf>, duration: Duration) -> Self {
        Self {
            source,
            outputs,
            success: true,
            error_kind: None,
            error: None,
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn failed(source: PathBuf, error: &ConversionError, duration: Duration) -> Self {
        Self {
            source,
            outputs: Vec::new(),
            success: false,
            error_kind: Some(error.kind()),
            error: Some(error.to_string()),
            duration_ms: duration.as_millis() as u64,
        }
    }
}

/// Progress reported after each unit completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    /// Units finished so far, 1..=total.
    pub completed: usize,
    pub total: usize,
    pub file_name: String,
}

/// Result of a batch conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_files: usize,
    pub succeeded: usize,
    pub failed: usize,

    /// One entry per discovered file, in discovery order.
    pub results: Vec<ConversionResult>,

    pub duration_ms: u64,

    /// Whether cancellation was requested during the batch.
    pub cancelled: bool,
}

impl BatchSummary {
    pub fn from_results(
        results: Vec<ConversionResult>,
        duration: Duration,
        cancelled: bool,
    ) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total_files: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
            duration_ms: duration.as_millis() as u64,
            cancelled,
        }
    }

    pub fn empty(duration: Duration) -> Self {
        Self::from_results(Vec::new(), duration, false)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ConversionResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn output_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.results.iter().flat_map(|r| r.outputs.iter())
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && !self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config_defaults() {
        let config = PoolConfig::default();
        assert!(config.max_workers > 0);
        assert!(config.timeout().is_none());
    }

    #[test]
    fn test_pool_config_builder_pattern() {
        let config = PoolConfig::with_workers(4).unit_timeout(Duration::from_secs(60));
        assert_eq!(config.max_workers, 4);
        assert_eq!(config.timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_pool_config_validation_zero_workers() {
        assert!(PoolConfig::with_workers(0).validate().is_err());
        assert!(PoolConfig::with_workers(1).validate().is_ok());
    }

    #[test]
    fn test_converter_config_defaults_match_documented_values() {
        let config = ConverterConfig::default();
        assert_eq!(config.output.image_format, ImageFormat::Jpeg);
        assert_eq!(config.output.image_quality, 95);
        assert_eq!(config.output.image_dpi, 200);
        assert_eq!(config.libreoffice.timeout_secs, 300);
        assert_eq!(config.wkhtmltopdf.page_size, "A4");
        assert_eq!(config.wkhtmltopdf.margin_left, "0.75in");
        assert_eq!(config.wkhtmltopdf.encoding, "UTF-8");
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_converter_config_validate_propagates() {
        let mut config = ConverterConfig::default();
        config.conversion.max_workers = 0;
        assert!(config.validate().is_err());

        let mut config = ConverterConfig::default();
        config.output.image_dpi = 1201;
        assert!(config.validate().is_err());

        let mut config = ConverterConfig::default();
        config.output.image_quality = 0;
        assert!(config.validate().is_err());

        let mut config = ConverterConfig::default();
        config.poppler.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_converter_config_lookup() {
        let config = ConverterConfig::new(3, 150);
        assert_eq!(
            config.lookup("output.image_dpi"),
            Some(serde_json::json!(150))
        );
        assert_eq!(
            config.lookup("conversion.max_workers"),
            Some(serde_json::json!(3))
        );
        assert_eq!(
            config.lookup("wkhtmltopdf.page_size"),
            Some(serde_json::json!("A4"))
        );
        assert!(config.lookup("output.missing").is_none());
        assert!(config.lookup("output.image_dpi.deeper").is_none());
    }

    #[test]
    fn test_options_from_config() {
        let mut config = ConverterConfig::default();
        config.output.image_dpi = 300;
        config.wkhtmltopdf.page_size = "Letter".to_string();
        let options = ConversionOptions::from_config(&config);
        assert_eq!(options.dpi, 300);
        assert_eq!(options.page.page_size, "Letter");
        assert_eq!(options.first_page, None);
    }

    #[test]
    fn test_options_page_range_validation() {
        let options = ConversionOptions::default().with_page_range(Some(3), Some(2));
        assert!(options.validate().is_err());

        let options = ConversionOptions::default().with_page_range(Some(0), None);
        assert!(options.validate().is_err());

        let options = ConversionOptions::default().with_page_range(Some(2), Some(5));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_image_quality_range() {
        for quality in [0u8, 101, 250] {
            let options = ConversionOptions {
                image_quality: quality,
                ..ConversionOptions::default()
            };
            let err = options.validate().unwrap_err();
            assert!(matches!(err, ConversionError::InvalidConfig(_)));
            assert!(err.to_string().contains("image_quality"));
        }

        let options = ConversionOptions {
            image_quality: 1,
            ..ConversionOptions::default()
        };
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_extra_options_merge() {
        let mut extra = BTreeMap::new();
        extra.insert("grayscale".to_string(), None);
        let options = ConversionOptions::default().with_extra_options(extra);
        assert!(options.extra_options.contains_key("grayscale"));
    }

    #[test]
    fn test_conversion_request_new() {
        let request =
            ConversionRequest::new("in/report.docx", "/out/report.pdf", TargetFormat::Pdf);
        assert_eq!(request.source, PathBuf::from("in/report.docx"));
        assert_eq!(request.output_dir, PathBuf::from("/out"));
        assert_eq!(request.output_name, "report.pdf");
        assert_eq!(request.output_path(), PathBuf::from("/out/report.pdf"));
    }

    #[test]
    fn test_conversion_request_bare_file_name_uses_cwd() {
        let request = ConversionRequest::new("a.txt", "a.pdf", TargetFormat::Pdf);
        assert_eq!(request.output_dir, PathBuf::from("."));
    }

    #[test]
    fn test_conversion_request_images_page_names() {
        let request = ConversionRequest::images("doc.pdf", "/out/doc_images", ImageFormat::Png);
        assert_eq!(request.target, TargetFormat::Png);
        assert_eq!(request.page_file_name(1), "page_001.png");
        assert_eq!(request.page_file_name(12), "page_012.png");
    }

    #[test]
    fn test_conversion_request_is_remote() {
        let request =
            ConversionRequest::new("https://example.com", "/out/a.pdf", TargetFormat::Pdf);
        assert!(request.is_remote());
        let request = ConversionRequest::new("page.html", "/out/a.pdf", TargetFormat::Pdf);
        assert!(!request.is_remote());
    }

    #[test]
    fn test_batch_summary_counts() {
        let ok = ConversionResult::succeeded(
            PathBuf::from("a.pdf"),
            vec![PathBuf::from("out/a_images/page_001.jpeg")],
            Duration::from_millis(10),
        );
        let err = ConversionError::UnsupportedConversion {
            extension: "xyz".to_string(),
            target: "pdf".to_string(),
        };
        let bad = ConversionResult::failed(PathBuf::from("c.xyz"), &err, Duration::ZERO);

        let summary = BatchSummary::from_results(vec![ok, bad], Duration::from_secs(1), false);
        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert!(!summary.is_success());
        assert_eq!(summary.output_paths().count(), 1);
        let failure = summary.failures().next().unwrap();
        assert_eq!(failure.error_kind, Some(ErrorKind::UnsupportedConversion));
    }

    #[test]
    fn test_batch_summary_empty() {
        let summary = BatchSummary::empty(Duration::ZERO);
        assert_eq!(summary.total_files, 0);
        assert!(summary.results.is_empty());
        assert!(summary.is_success());
    }

    #[test]
    fn test_batch_summary_serializes() {
        let summary = BatchSummary::empty(Duration::from_millis(5));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["total_files"], 0);
        assert_eq!(json["duration_ms"], 5);
    }
}
