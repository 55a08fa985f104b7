//! Input/target formats and the typed dispatch table between them.
//!
//! Every supported `(InputFormat, TargetFormat)` pair maps to exactly one
//! [`Operation`] through an exhaustive `match`, so adding a format without
//! deciding its conversions is a compile error rather than a silent gap.

use crate::error::{ConversionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Formats accepted as conversion input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Pdf,
    Docx,
    Pptx,
    Txt,
    Html,
}

impl InputFormat {
    pub const ALL: [InputFormat; 5] = [
        InputFormat::Pdf,
        InputFormat::Docx,
        InputFormat::Pptx,
        InputFormat::Txt,
        InputFormat::Html,
    ];

    /// Parse a file extension (without the dot), case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(InputFormat::Pdf),
            "docx" => Some(InputFormat::Docx),
            "pptx" => Some(InputFormat::Pptx),
            "txt" => Some(InputFormat::Txt),
            "html" | "htm" => Some(InputFormat::Html),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Extensions recognized for this format.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            InputFormat::Pdf => &["pdf"],
            InputFormat::Docx => &["docx"],
            InputFormat::Pptx => &["pptx"],
            InputFormat::Txt => &["txt"],
            InputFormat::Html => &["html", "htm"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.extensions()[0]
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raster formats produced by PDF rasterization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[serde(alias = "jpg")]
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            "png" => Ok(ImageFormat::Png),
            other => Err(ConversionError::InvalidConfig(format!(
                "unknown image format '{}', expected jpeg or png",
                other
            ))),
        }
    }
}

/// Formats a batch can convert to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Pdf,
    Html,
    Jpeg,
    Png,
}

impl TargetFormat {
    pub const ALL: [TargetFormat; 4] = [
        TargetFormat::Pdf,
        TargetFormat::Html,
        TargetFormat::Jpeg,
        TargetFormat::Png,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Pdf => "pdf",
            TargetFormat::Html => "html",
            TargetFormat::Jpeg => "jpeg",
            TargetFormat::Png => "png",
        }
    }

    /// The raster format, for image targets.
    pub fn image_format(&self) -> Option<ImageFormat> {
        match self {
            TargetFormat::Jpeg => Some(ImageFormat::Jpeg),
            TargetFormat::Png => Some(ImageFormat::Png),
            TargetFormat::Pdf | TargetFormat::Html => None,
        }
    }

    pub fn is_image(&self) -> bool {
        self.image_format().is_some()
    }
}

impl From<ImageFormat> for TargetFormat {
    fn from(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Jpeg => TargetFormat::Jpeg,
            ImageFormat::Png => TargetFormat::Png,
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TargetFormat {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" => Ok(TargetFormat::Pdf),
            "html" | "htm" => Ok(TargetFormat::Html),
            "jpeg" | "jpg" => Ok(TargetFormat::Jpeg),
            "png" => Ok(TargetFormat::Png),
            other => Err(ConversionError::InvalidConfig(format!(
                "unknown target format '{}', expected one of pdf, html, jpeg, png",
                other
            ))),
        }
    }
}

/// The external tool an operation is delegated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tool {
    Poppler,
    LibreOffice,
    Wkhtmltopdf,
    /// Handled in-process without an external binary.
    Builtin,
}

/// A single-file conversion operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    PdfToImages(ImageFormat),
    /// PDF input for a PDF target: copied into the output tree unchanged.
    CopyPdf,
    DocxToPdf,
    PptxToPdf,
    TxtToPdf,
    HtmlToPdf,
    DocxToHtml,
}

impl Operation {
    /// One representative of every variant; used to check table coverage.
    pub const ALL: [Operation; 8] = [
        Operation::PdfToImages(ImageFormat::Jpeg),
        Operation::PdfToImages(ImageFormat::Png),
        Operation::CopyPdf,
        Operation::DocxToPdf,
        Operation::PptxToPdf,
        Operation::TxtToPdf,
        Operation::HtmlToPdf,
        Operation::DocxToHtml,
    ];

    /// Map an input/target pair onto its operation.
    pub fn resolve(input: InputFormat, target: TargetFormat) -> Option<Operation> {
        match (input, target) {
            (InputFormat::Pdf, TargetFormat::Jpeg) => {
                Some(Operation::PdfToImages(ImageFormat::Jpeg))
            }
            (InputFormat::Pdf, TargetFormat::Png) => Some(Operation::PdfToImages(ImageFormat::Png)),
            (InputFormat::Pdf, TargetFormat::Pdf) => Some(Operation::CopyPdf),
            (InputFormat::Pdf, TargetFormat::Html) => None,
            (InputFormat::Docx, TargetFormat::Pdf) => Some(Operation::DocxToPdf),
            (InputFormat::Docx, TargetFormat::Html) => Some(Operation::DocxToHtml),
            (InputFormat::Docx, TargetFormat::Jpeg | TargetFormat::Png) => None,
            (InputFormat::Pptx, TargetFormat::Pdf) => Some(Operation::PptxToPdf),
            (InputFormat::Pptx, _) => None,
            (InputFormat::Txt, TargetFormat::Pdf) => Some(Operation::TxtToPdf),
            (InputFormat::Txt, _) => None,
            (InputFormat::Html, TargetFormat::Pdf) => Some(Operation::HtmlToPdf),
            (InputFormat::Html, _) => None,
        }
    }

    /// Snake-case name, e.g. `docx_to_pdf`.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::PdfToImages(_) => "pdf_to_images",
            Operation::CopyPdf => "pdf_to_pdf",
            Operation::DocxToPdf => "docx_to_pdf",
            Operation::PptxToPdf => "pptx_to_pdf",
            Operation::TxtToPdf => "txt_to_pdf",
            Operation::HtmlToPdf => "html_to_pdf",
            Operation::DocxToHtml => "docx_to_html",
        }
    }

    pub fn tool(&self) -> Tool {
        match self {
            Operation::PdfToImages(_) => Tool::Poppler,
            Operation::DocxToPdf
            | Operation::PptxToPdf
            | Operation::TxtToPdf
            | Operation::DocxToHtml => Tool::LibreOffice,
            Operation::HtmlToPdf => Tool::Wkhtmltopdf,
            Operation::CopyPdf => Tool::Builtin,
        }
    }

    /// Whether the operation writes a directory of pages instead of one file.
    pub fn produces_images(&self) -> bool {
        matches!(self, Operation::PdfToImages(_))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lookup table from `(input, target)` to [`Operation`], built once and
/// checked for coverage at construction.
#[derive(Debug, Clone)]
pub struct DispatchTable {
    entries: HashMap<(InputFormat, TargetFormat), Operation>,
}

impl DispatchTable {
    /// Build the table from [`Operation::resolve`] and verify that every
    /// operation is reachable from at least one pair.
    pub fn new() -> Result<Self> {
        let mut entries = HashMap::new();
        for input in InputFormat::ALL {
            for target in TargetFormat::ALL {
                if let Some(op) = Operation::resolve(input, target) {
                    entries.insert((input, target), op);
                }
            }
        }

        for op in Operation::ALL {
            if !entries.values().any(|o| *o == op) {
                return Err(ConversionError::InvalidConfig(format!(
                    "operation {:?} is not reachable from any format pair",
                    op
                )));
            }
        }

        debug!("Dispatch table built with {} conversions", entries.len());
        Ok(Self { entries })
    }

    pub fn get(&self, input: InputFormat, target: TargetFormat) -> Option<Operation> {
        self.entries.get(&(input, target)).copied()
    }

    /// Select the operation for `path`, failing fast for unknown extensions
    /// and unsupported pairs.
    pub fn dispatch(&self, path: &Path, target: TargetFormat) -> Result<Operation> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        InputFormat::from_extension(&ext)
            .and_then(|input| self.get(input, target))
            .ok_or_else(|| ConversionError::UnsupportedConversion {
                extension: if ext.is_empty() {
                    "(none)".to_string()
                } else {
                    ext
                },
                target: target.to_string(),
            })
    }

    /// All supported pairs, sorted by input format.
    pub fn supported(&self) -> Vec<(InputFormat, TargetFormat, Operation)> {
        let mut pairs: Vec<_> = self
            .entries
            .iter()
            .map(|((i, t), op)| (*i, *t, *op))
            .collect();
        pairs.sort_by_key(|(i, t, _)| (*i, t.extension()));
        pairs
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_input_format_from_extension_case_insensitive() {
        assert_eq!(InputFormat::from_extension("PDF"), Some(InputFormat::Pdf));
        assert_eq!(InputFormat::from_extension("Docx"), Some(InputFormat::Docx));
        assert_eq!(InputFormat::from_extension("htm"), Some(InputFormat::Html));
        assert_eq!(InputFormat::from_extension("xyz"), None);
        assert_eq!(InputFormat::from_extension(""), None);
    }

    #[test]
    fn test_target_format_parse() {
        assert_eq!("pdf".parse::<TargetFormat>().unwrap(), TargetFormat::Pdf);
        assert_eq!("JPG".parse::<TargetFormat>().unwrap(), TargetFormat::Jpeg);
        assert!("tiff".parse::<TargetFormat>().is_err());
    }

    #[test]
    fn test_resolve_supported_pairs() {
        assert_eq!(
            Operation::resolve(InputFormat::Pdf, TargetFormat::Png),
            Some(Operation::PdfToImages(ImageFormat::Png))
        );
        assert_eq!(
            Operation::resolve(InputFormat::Docx, TargetFormat::Html),
            Some(Operation::DocxToHtml)
        );
        assert_eq!(
            Operation::resolve(InputFormat::Html, TargetFormat::Pdf),
            Some(Operation::HtmlToPdf)
        );
        assert_eq!(Operation::resolve(InputFormat::Pptx, TargetFormat::Html), None);
        assert_eq!(
            Operation::resolve(InputFormat::Pdf, TargetFormat::Pdf),
            Some(Operation::CopyPdf)
        );
        assert_eq!(Operation::resolve(InputFormat::Pdf, TargetFormat::Html), None);
    }

    #[test]
    fn test_table_covers_every_operation() {
        let table = DispatchTable::new().unwrap();
        assert_eq!(table.len(), 8);
        for op in Operation::ALL {
            assert!(table.supported().iter().any(|(_, _, o)| *o == op));
        }
    }

    #[test]
    fn test_dispatch_unsupported_names_pair() {
        let table = DispatchTable::new().unwrap();
        let err = table
            .dispatch(&PathBuf::from("c.xyz"), TargetFormat::Pdf)
            .unwrap_err();
        match err {
            ConversionError::UnsupportedConversion { extension, target } => {
                assert_eq!(extension, "xyz");
                assert_eq!(target, "pdf");
            }
            other => panic!("Expected UnsupportedConversion, got {:?}", other),
        }
    }

    #[test]
    fn test_dispatch_without_extension() {
        let table = DispatchTable::new().unwrap();
        let err = table
            .dispatch(&PathBuf::from("README"), TargetFormat::Pdf)
            .unwrap_err();
        assert!(format!("{}", err).contains("(none)"));
    }

    #[test]
    fn test_dispatch_known_extension_wrong_target() {
        let table = DispatchTable::new().unwrap();
        assert!(table
            .dispatch(&PathBuf::from("slides.pptx"), TargetFormat::Png)
            .is_err());
        assert_eq!(
            table
                .dispatch(&PathBuf::from("slides.PPTX"), TargetFormat::Pdf)
                .unwrap(),
            Operation::PptxToPdf
        );
    }

    #[test]
    fn test_operation_tools() {
        assert_eq!(Operation::PdfToImages(ImageFormat::Jpeg).tool(), Tool::Poppler);
        assert_eq!(Operation::TxtToPdf.tool(), Tool::LibreOffice);
        assert_eq!(Operation::HtmlToPdf.tool(), Tool::Wkhtmltopdf);
        assert_eq!(Operation::CopyPdf.tool(), Tool::Builtin);
        assert!(Operation::PdfToImages(ImageFormat::Png).produces_images());
        assert!(!Operation::DocxToHtml.produces_images());
    }
}
