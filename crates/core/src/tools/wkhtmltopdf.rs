//! wkhtmltopdf wrapper for HTML to PDF rendering.

use super::{run_tool, ToolSpec};
use crate::config::{ConversionRequest, WkhtmltopdfConfig};
use crate::error::{ConversionError, Result};
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use tracing::{debug, info};

pub const SPEC: ToolSpec = ToolSpec {
    name: "wkhtmltopdf",
    binaries: &["wkhtmltopdf"],
    candidates: &[
        "/usr/bin/wkhtmltopdf",
        "/usr/local/bin/wkhtmltopdf",
        "C:\\Program Files\\wkhtmltopdf\\bin\\wkhtmltopdf.exe",
    ],
    hint: "Install wkhtmltopdf and ensure it is in PATH",
};

#[derive(Debug)]
pub struct Wkhtmltopdf {
    binary: PathBuf,
    timeout: Duration,
}

impl Wkhtmltopdf {
    pub fn new(config: &WkhtmltopdfConfig) -> Result<Self> {
        let binary = SPEC.locate(config.path.as_deref())?;
        info!("Found wkhtmltopdf at: {:?}", binary);
        Ok(Self {
            binary,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Build the argument list for `request`.
    fn args(request: &ConversionRequest) -> Vec<String> {
        let page = &request.options.page;
        let mut args = vec![
            "--page-size".to_string(),
            page.page_size.clone(),
            "--margin-top".to_string(),
            page.margin_top.clone(),
            "--margin-right".to_string(),
            page.margin_right.clone(),
            "--margin-bottom".to_string(),
            page.margin_bottom.clone(),
            "--margin-left".to_string(),
            page.margin_left.clone(),
            "--encoding".to_string(),
            page.encoding.clone(),
            "--no-outline".to_string(),
            "--enable-local-file-access".to_string(),
        ];

        for (key, value) in &request.options.extra_options {
            let flag = if key.starts_with('-') {
                key.clone()
            } else {
                format!("--{}", key)
            };
            if args.contains(&flag) {
                continue;
            }
            args.push(flag);
            if let Some(value) = value {
                args.push(value.clone());
            }
        }
        args
    }

    /// Render `request.source` (a local file or an http(s) URL) to
    /// `request.output_path()`.
    pub async fn render(&self, request: &ConversionRequest) -> Result<Vec<PathBuf>> {
        let source = request.source.as_path();
        if !request.is_remote() && !source.exists() {
            return Err(ConversionError::InputNotFound(source.to_path_buf()));
        }

        let output_path = request.output_path();
        let mut cmd = Command::new(&self.binary);
        cmd.args(Self::args(request));
        cmd.arg(source);
        cmd.arg(&output_path);
        run_tool(cmd, SPEC.name, source, self.timeout).await?;

        if !output_path.exists() {
            return Err(ConversionError::ConversionFailed {
                path: source.to_path_buf(),
                message: "PDF output file not found".to_string(),
            });
        }

        debug!("Rendered {:?} to {:?}", source, output_path);
        Ok(vec![output_path])
    }
}
