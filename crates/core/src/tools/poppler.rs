//! Poppler wrapper: `pdftoppm` for rasterization, `pdfinfo` for page counts.

use super::{list_files, move_file, run_tool, ToolSpec, WorkArea};
use crate::config::{ConversionRequest, PopplerConfig};
use crate::error::{ConversionError, Result};
use crate::format::ImageFormat;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const PDFTOPPM: ToolSpec = ToolSpec {
    name: "pdftoppm",
    binaries: &["pdftoppm"],
    candidates: &[
        "/usr/bin/pdftoppm",
        "/usr/local/bin/pdftoppm",
        "/opt/homebrew/bin/pdftoppm",
    ],
    hint: "Install Poppler (poppler-utils) and ensure 'pdftoppm' is in PATH",
};

pub const PDFINFO: ToolSpec = ToolSpec {
    name: "pdfinfo",
    binaries: &["pdfinfo"],
    candidates: &[
        "/usr/bin/pdfinfo",
        "/usr/local/bin/pdfinfo",
        "/opt/homebrew/bin/pdfinfo",
    ],
    hint: "Install Poppler (poppler-utils) and ensure 'pdfinfo' is in PATH",
};

const PAGE_PREFIX: &str = "page";

/// Page number from a `pdftoppm` output name such as `page-07.png`.
fn page_number(path: &Path) -> Option<u32> {
    let stem = path.file_stem()?.to_str()?;
    let (prefix, number) = stem.rsplit_once('-')?;
    if prefix != PAGE_PREFIX {
        return None;
    }
    number.parse().ok()
}

/// Extract the `Pages:` field from `pdfinfo` output.
fn parse_page_count(info: &str) -> Option<u32> {
    info.lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|value| value.trim().parse().ok())
}

#[derive(Debug)]
pub struct Poppler {
    pdftoppm: PathBuf,
    pdfinfo: Option<PathBuf>,
    timeout: Duration,
    work: WorkArea,
}

impl Poppler {
    pub fn new(config: &PopplerConfig) -> Result<Self> {
        let pdftoppm = PDFTOPPM.locate(config.pdftoppm_path.as_deref())?;
        info!("Found pdftoppm at: {:?}", pdftoppm);

        let pdfinfo = match PDFINFO.locate(config.pdfinfo_path.as_deref()) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("{}", e);
                None
            }
        };

        Ok(Self {
            pdftoppm,
            pdfinfo,
            timeout: Duration::from_secs(config.timeout_secs),
            work: WorkArea::new("doc-converter-pdf-")?,
        })
    }

    fn command(&self, request: &ConversionRequest, format: ImageFormat, prefix: &Path) -> Command {
        let options = &request.options;
        let mut cmd = Command::new(&self.pdftoppm);
        cmd.arg("-r").arg(options.dpi.to_string());
        if let Some(first) = options.first_page {
            cmd.arg("-f").arg(first.to_string());
        }
        if let Some(last) = options.last_page {
            cmd.arg("-l").arg(last.to_string());
        }
        match format {
            ImageFormat::Png => {
                cmd.arg("-png");
            }
            ImageFormat::Jpeg => {
                cmd.arg("-jpeg")
                    .arg("-jpegopt")
                    .arg(format!("quality={}", options.image_quality));
            }
        }
        cmd.arg(&request.source);
        cmd.arg(prefix);
        cmd
    }

    /// Rasterize every requested page into `request.output_dir` as
    /// `page_NNN.<ext>`, returning the images in page order.
    pub async fn render(&self, request: &ConversionRequest) -> Result<Vec<PathBuf>> {
        let source = request.source.as_path();
        if !source.exists() {
            return Err(ConversionError::InputNotFound(source.to_path_buf()));
        }
        request.options.validate()?;
        let format = request
            .target
            .image_format()
            .ok_or_else(|| ConversionError::UnsupportedConversion {
                extension: "pdf".to_string(),
                target: request.target.to_string(),
            })?;

        let job = self.work.job_dir().await?;
        let cmd = self.command(request, format, &job.path().join(PAGE_PREFIX));
        run_tool(cmd, PDFTOPPM.name, source, self.timeout).await?;

        let mut pages: Vec<(u32, PathBuf)> = list_files(job.path())
            .await?
            .into_iter()
            .filter_map(|p| page_number(&p).map(|n| (n, p)))
            .collect();
        pages.sort_by_key(|(n, _)| *n);

        if pages.is_empty() {
            return Err(ConversionError::ConversionFailed {
                path: source.to_path_buf(),
                message: "pdftoppm produced no pages".to_string(),
            });
        }

        let mut outputs = Vec::with_capacity(pages.len());
        for (number, page) in pages {
            let dest = request.output_dir.join(request.page_file_name(number));
            move_file(&page, &dest).await?;
            outputs.push(dest);
        }

        debug!("Rendered {} pages from {:?}", outputs.len(), source.file_name());
        Ok(outputs)
    }

    /// Number of pages in `pdf`.
    pub async fn page_count(&self, pdf: &Path) -> Result<u32> {
        if !pdf.exists() {
            return Err(ConversionError::InputNotFound(pdf.to_path_buf()));
        }
        let pdfinfo = self.pdfinfo.as_ref().ok_or_else(|| PDFINFO.not_found())?;

        let mut cmd = Command::new(pdfinfo);
        cmd.arg(pdf);
        let output = run_tool(cmd, PDFINFO.name, pdf, self.timeout).await?;

        parse_page_count(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            ConversionError::ConversionFailed {
                path: pdf.to_path_buf(),
                message: "pdfinfo did not report a page count".to_string(),
            }
        })
    }
}
