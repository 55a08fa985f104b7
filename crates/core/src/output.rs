//! Output path management.
//!
//! Destinations are derived from input names: `<out>/<rel>/<stem>.<ext>` for
//! single-file targets and `<out>/<rel>/<stem>_images/` for page images.

use crate::config::{ConversionOptions, ConversionRequest};
use crate::error::{ConversionError, Result};
use crate::format::{Operation, TargetFormat};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

const MAX_FILE_NAME_LEN: usize = 255;

/// Create `path` and its parents. Safe to call concurrently for the same path.
pub async fn ensure_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| ConversionError::output_io(path, e))
}

/// Check that files can be created in `dir`.
pub fn probe_writable(dir: &Path) -> Result<()> {
    tempfile::tempfile_in(dir)
        .map(drop)
        .map_err(|e| ConversionError::output_io(dir, e))
}

/// Make a file stem safe for any common filesystem.
pub fn sanitize_file_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = replaced.trim_matches(|c: char| c == '.' || c == ' ');

    let mut out = String::with_capacity(trimmed.len().min(MAX_FILE_NAME_LEN));
    for c in trimmed.chars() {
        if out.len() + c.len_utf8() > MAX_FILE_NAME_LEN {
            break;
        }
        out.push(c);
    }

    if out.is_empty() {
        "unnamed".to_string()
    } else {
        out
    }
}

fn file_stem(source: &Path) -> String {
    sanitize_file_name(
        &source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    )
}

/// Default single-file output next to the input, e.g. `report.docx` -> `report.pdf`.
pub fn sibling_output(source: &Path, target: TargetFormat) -> PathBuf {
    source.with_file_name(format!("{}.{}", file_stem(source), target.extension()))
}

/// Default image directory next to the input, e.g. `deck.pdf` -> `deck_images/`.
pub fn sibling_images_dir(source: &Path) -> PathBuf {
    source.with_file_name(format!("{}_images", file_stem(source)))
}

/// Comparable form of a path: canonical parent plus file name.
fn path_key(path: &Path) -> PathBuf {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|p| p.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

/// Plans collision-free destinations for one batch.
///
/// Sources are claimed up front so no output can overwrite an input, and
/// each planned destination is claimed so two inputs never share one.
/// Planning is deterministic for a given input order.
#[derive(Debug)]
pub struct OutputPlanner {
    output_root: PathBuf,
    input_root: Option<PathBuf>,
    claimed: HashSet<PathBuf>,
}

impl OutputPlanner {
    pub fn new(output_root: impl Into<PathBuf>, input_root: Option<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            input_root,
            claimed: HashSet::new(),
        }
    }

    /// Mark input files as taken.
    pub fn reserve_sources<'a>(&mut self, sources: impl IntoIterator<Item = &'a PathBuf>) {
        for source in sources {
            self.claimed.insert(path_key(source));
        }
    }

    /// Directory under the output root mirroring the source's input subdirectory.
    fn destination_dir(&self, source: &Path) -> PathBuf {
        let relative = self
            .input_root
            .as_deref()
            .and_then(|root| source.parent()?.strip_prefix(root).ok());
        match relative {
            Some(rel) if !rel.as_os_str().is_empty() => self.output_root.join(rel),
            _ => self.output_root.clone(),
        }
    }

    fn claim(&mut self, dir: &Path, source: &Path, make_name: impl Fn(&str) -> String) -> PathBuf {
        let stem = file_stem(source);
        let source_ext = source
            .extension()
            .map(|e| sanitize_file_name(&e.to_string_lossy().to_ascii_lowercase()));

        let mut candidates = vec![stem.clone()];
        if let Some(ext) = &source_ext {
            candidates.push(format!("{}_{}", stem, ext));
        }
        let base = candidates.last().cloned().unwrap_or_else(|| stem.clone());

        let mut counter = 2usize;
        let mut iter = candidates.into_iter();
        loop {
            let name = match iter.next() {
                Some(name) => name,
                None => {
                    let name = format!("{}_{}", base, counter);
                    counter += 1;
                    name
                }
            };
            let path = dir.join(make_name(&name));
            if self.claimed.insert(path_key(&path)) {
                return path;
            }
            debug!("Output {:?} already taken, trying another name", path);
        }
    }

    /// Plan the request for `source` converted by `op`.
    pub fn plan(
        &mut self,
        source: &Path,
        op: Operation,
        target: TargetFormat,
        options: &ConversionOptions,
    ) -> ConversionRequest {
        let dir = self.destination_dir(source);
        let request = match op {
            Operation::PdfToImages(format) => {
                let images_dir = self.claim(&dir, source, |stem| format!("{}_images", stem));
                ConversionRequest::images(source, images_dir, format)
            }
            _ => {
                let ext = target.extension();
                let output = self.claim(&dir, source, |stem| format!("{}.{}", stem, ext));
                ConversionRequest::new(source, output, target)
            }
        };
        request.with_options(options.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ImageFormat;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("a<b>c:d\"e|f?g*h"), "a_b_c_d_e_f_g_h");
        assert_eq!(sanitize_file_name("  .hidden. "), "hidden");
        assert_eq!(sanitize_file_name("..."), "unnamed");
        assert_eq!(sanitize_file_name(&"x".repeat(300)).len(), 255);
        assert_eq!(sanitize_file_name("résumé"), "résumé");
    }

    #[test]
    fn test_sibling_outputs() {
        assert_eq!(
            sibling_output(Path::new("/docs/report.docx"), TargetFormat::Pdf),
            PathBuf::from("/docs/report.pdf")
        );
        assert_eq!(
            sibling_images_dir(Path::new("/docs/deck.pdf")),
            PathBuf::from("/docs/deck_images")
        );
    }

    #[test]
    fn test_plan_single_file_and_images() {
        let mut planner = OutputPlanner::new("/out", Some(PathBuf::from("/in")));
        let options = ConversionOptions::default();

        let request = planner.plan(
            Path::new("/in/report.docx"),
            Operation::DocxToPdf,
            TargetFormat::Pdf,
            &options,
        );
        assert_eq!(request.output_path(), PathBuf::from("/out/report.pdf"));

        let request = planner.plan(
            Path::new("/in/deck.pdf"),
            Operation::PdfToImages(ImageFormat::Png),
            TargetFormat::Png,
            &options,
        );
        assert_eq!(request.output_dir, PathBuf::from("/out/deck_images"));
        assert_eq!(request.page_file_name(1), "page_001.png");
    }

    #[test]
    fn test_plan_mirrors_subdirectories() {
        let mut planner = OutputPlanner::new("/out", Some(PathBuf::from("/in")));
        let request = planner.plan(
            Path::new("/in/a/b/notes.txt"),
            Operation::TxtToPdf,
            TargetFormat::Pdf,
            &ConversionOptions::default(),
        );
        assert_eq!(request.output_path(), PathBuf::from("/out/a/b/notes.pdf"));
    }

    #[test]
    fn test_plan_resolves_collisions_deterministically() {
        let plan_all = || {
            let mut planner = OutputPlanner::new("/out", Some(PathBuf::from("/in")));
            let options = ConversionOptions::default();
            let a = planner.plan(
                Path::new("/in/a.docx"),
                Operation::DocxToPdf,
                TargetFormat::Pdf,
                &options,
            );
            let b = planner.plan(
                Path::new("/in/a.pptx"),
                Operation::PptxToPdf,
                TargetFormat::Pdf,
                &options,
            );
            (a.output_path(), b.output_path())
        };

        let (a, b) = plan_all();
        assert_eq!(a, PathBuf::from("/out/a.pdf"));
        assert_eq!(b, PathBuf::from("/out/a_pptx.pdf"));
        assert_eq!(plan_all(), plan_all());
    }

    #[test]
    fn test_plan_never_overwrites_a_source() {
        let dir = TempDir::new().unwrap();
        let docx = dir.path().join("a.docx");
        let pdf = dir.path().join("a.pdf");
        std::fs::write(&docx, b"x").unwrap();
        std::fs::write(&pdf, b"x").unwrap();

        let mut planner = OutputPlanner::new(dir.path(), Some(dir.path().to_path_buf()));
        planner.reserve_sources([&docx, &pdf]);
        let request = planner.plan(
            &docx,
            Operation::DocxToPdf,
            TargetFormat::Pdf,
            &ConversionOptions::default(),
        );
        assert_eq!(request.output_path(), dir.path().join("a_docx.pdf"));
    }

    #[test]
    fn test_counter_after_extension_suffix() {
        let mut planner = OutputPlanner::new("/out", None);
        let options = ConversionOptions::default();
        let mut plan = |source: &str| {
            planner
                .plan(Path::new(source), Operation::TxtToPdf, TargetFormat::Pdf, &options)
                .output_path()
        };
        let first = plan("/x/a.txt");
        let second = plan("/y/a.txt");
        let third = plan("/z/a.txt");
        assert_eq!(first, PathBuf::from("/out/a.pdf"));
        assert_eq!(second, PathBuf::from("/out/a_txt.pdf"));
        assert_eq!(third, PathBuf::from("/out/a_txt_2.pdf"));
    }

    #[tokio::test]
    async fn test_ensure_dir_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b/c");
        ensure_dir(&nested).await.unwrap();
        ensure_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        probe_writable(&nested).unwrap();
    }

    #[tokio::test]
    async fn test_ensure_dir_concurrent_calls() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("shared/out");
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let nested = nested.clone();
                tokio::spawn(async move { ensure_dir(&nested).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn test_ensure_dir_over_file_fails() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();
        let err = ensure_dir(&file.join("sub")).await.unwrap_err();
        assert!(matches!(err, ConversionError::OutputDirError { .. }));
    }
}
