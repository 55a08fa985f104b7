//! The seam between the batch machinery and whatever executes a conversion.

use crate::config::{ConversionRequest, ConverterConfig};
use crate::error::{ConversionError, Result};
use crate::format::{Operation, Tool};
use crate::tools::libreoffice::{self, Export};
use crate::tools::{copy_file, poppler, wkhtmltopdf, LibreOffice, Poppler, Wkhtmltopdf};
use futures::future::{BoxFuture, FutureExt};
use std::path::PathBuf;
use tracing::warn;

/// Executes one conversion operation, writing into `request.output_dir`.
///
/// Implementations must be safe to call concurrently from many workers.
pub trait ConversionBackend: Send + Sync {
    fn convert<'a>(
        &'a self,
        op: Operation,
        request: &'a ConversionRequest,
    ) -> BoxFuture<'a, Result<Vec<PathBuf>>>;
}

/// Treat a missing tool as absent instead of fatal.
fn optional<T>(tool: Result<T>) -> Result<Option<T>> {
    match tool {
        Ok(tool) => Ok(Some(tool)),
        Err(e @ ConversionError::ToolNotFound { .. }) => {
            warn!("{}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Production backend delegating to Poppler, LibreOffice and wkhtmltopdf.
///
/// Tools are located once at construction. A missing tool only fails the
/// operations that need it.
#[derive(Debug)]
pub struct ExternalToolBackend {
    libreoffice: Option<LibreOffice>,
    poppler: Option<Poppler>,
    wkhtmltopdf: Option<Wkhtmltopdf>,
}

impl ExternalToolBackend {
    pub fn from_config(config: &ConverterConfig) -> Result<Self> {
        let slots = config.conversion.max_workers;
        Ok(Self {
            libreoffice: optional(LibreOffice::new(&config.libreoffice, slots))?,
            poppler: optional(Poppler::new(&config.poppler))?,
            wkhtmltopdf: optional(Wkhtmltopdf::new(&config.wkhtmltopdf))?,
        })
    }

    pub fn libreoffice(&self) -> Result<&LibreOffice> {
        self.libreoffice
            .as_ref()
            .ok_or_else(|| libreoffice::SPEC.not_found())
    }

    pub fn poppler(&self) -> Result<&Poppler> {
        self.poppler
            .as_ref()
            .ok_or_else(|| poppler::PDFTOPPM.not_found())
    }

    pub fn wkhtmltopdf(&self) -> Result<&Wkhtmltopdf> {
        self.wkhtmltopdf
            .as_ref()
            .ok_or_else(|| wkhtmltopdf::SPEC.not_found())
    }

    pub fn is_available(&self, tool: Tool) -> bool {
        match tool {
            Tool::Poppler => self.poppler.is_some(),
            Tool::LibreOffice => self.libreoffice.is_some(),
            Tool::Wkhtmltopdf => self.wkhtmltopdf.is_some(),
            Tool::Builtin => true,
        }
    }
}

impl ConversionBackend for ExternalToolBackend {
    fn convert<'a>(
        &'a self,
        op: Operation,
        request: &'a ConversionRequest,
    ) -> BoxFuture<'a, Result<Vec<PathBuf>>> {
        async move {
            match op {
                Operation::PdfToImages(_) => self.poppler()?.render(request).await,
                Operation::CopyPdf => copy_file(&request.source, &request.output_path()).await,
                Operation::DocxToPdf | Operation::PptxToPdf | Operation::TxtToPdf => {
                    self.libreoffice()?.convert(request, Export::Pdf).await
                }
                Operation::DocxToHtml => self.libreoffice()?.convert(request, Export::Html).await,
                Operation::HtmlToPdf => self.wkhtmltopdf()?.render(request).await,
            }
        }
        .boxed()
    }
}
