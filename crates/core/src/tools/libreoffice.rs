//! LibreOffice (`soffice`) wrapper for office document conversion.
//!
//! Concurrent `soffice` processes that share a user profile block on each
//! other, so every conversion borrows its own profile directory from a
//! bounded pool sized to the worker count.

use super::{list_files, move_file, run_tool, ToolSpec, WorkArea};
use crate::config::{ConversionRequest, LibreOfficeConfig};
use crate::error::{ConversionError, Result};
use crate::output::ensure_dir;
use async_channel::{bounded, Receiver, Sender};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, info};

pub const SPEC: ToolSpec = ToolSpec {
    name: "LibreOffice",
    binaries: &["soffice", "libreoffice"],
    candidates: &[
        // macOS
        "/Applications/LibreOffice.app/Contents/MacOS/soffice",
        // Linux
        "/usr/bin/soffice",
        "/usr/lib/libreoffice/program/soffice",
        "/opt/libreoffice/program/soffice",
        // Snap (Ubuntu)
        "/snap/bin/libreoffice.soffice",
    ],
    hint: "Install LibreOffice and ensure 'soffice' is in PATH",
};

/// Export target passed to `--convert-to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Export {
    Pdf,
    Html,
}

impl Export {
    fn convert_to(&self) -> &'static str {
        match self {
            Export::Pdf => "pdf",
            Export::Html => "html",
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            Export::Pdf => "pdf",
            Export::Html => "html",
        }
    }
}

/// Input filter for formats LibreOffice cannot sniff reliably.
fn input_filter(source: &Path) -> Option<&'static str> {
    let ext = source.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "txt" => Some("Text (encoded):UTF8"),
        _ => None,
    }
}

/// A user profile directory owned by one slot of the pool.
#[derive(Debug)]
struct Profile {
    id: usize,
    dir: TempDir,
}

impl Profile {
    fn new(id: usize) -> Result<Self> {
        let dir = TempDir::with_prefix(format!("lo-profile-{}-", id))
            .map_err(ConversionError::ProcessStartFailed)?;
        debug!("Created LibreOffice profile {} at {:?}", id, dir.path());
        Ok(Self { id, dir })
    }

    fn installation_arg(&self) -> String {
        format!("-env:UserInstallation=file://{}", self.dir.path().display())
    }
}

/// A borrowed profile, returned to the pool on drop.
struct ProfileLease {
    id: usize,
    installation_arg: String,
    profile: Option<Profile>,
    release: Sender<Profile>,
}

impl ProfileLease {
    fn new(profile: Profile, release: Sender<Profile>) -> Self {
        Self {
            id: profile.id,
            installation_arg: profile.installation_arg(),
            profile: Some(profile),
            release,
        }
    }
}

impl Drop for ProfileLease {
    fn drop(&mut self) {
        if let Some(profile) = self.profile.take() {
            let _ = self.release.try_send(profile);
        }
    }
}

/// LibreOffice converter with a pool of isolated user profiles.
#[derive(Debug)]
pub struct LibreOffice {
    binary: PathBuf,
    timeout: Duration,
    profiles_tx: Sender<Profile>,
    profiles_rx: Receiver<Profile>,
    work: WorkArea,
    total_processed: AtomicUsize,
}

impl LibreOffice {
    /// Locate `soffice` and create `slots` profiles.
    pub fn new(config: &LibreOfficeConfig, slots: usize) -> Result<Self> {
        let binary = SPEC.locate(config.path.as_deref())?;
        info!("Found LibreOffice at: {:?}", binary);

        let slots = slots.max(1);
        let (profiles_tx, profiles_rx) = bounded(slots);
        for id in 0..slots {
            profiles_tx
                .try_send(Profile::new(id)?)
                .map_err(|_| ConversionError::ChannelError("profile pool full".to_string()))?;
        }

        Ok(Self {
            binary,
            timeout: Duration::from_secs(config.timeout_secs),
            profiles_tx,
            profiles_rx,
            work: WorkArea::new("doc-converter-lo-")?,
            total_processed: AtomicUsize::new(0),
        })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Number of conversions completed successfully.
    pub fn total_processed(&self) -> usize {
        self.total_processed.load(Ordering::SeqCst)
    }

    async fn lease(&self) -> Result<ProfileLease> {
        let profile = self.profiles_rx.recv().await?;
        Ok(ProfileLease::new(profile, self.profiles_tx.clone()))
    }

    fn command(
        &self,
        profile: &ProfileLease,
        source: &Path,
        export: Export,
        out_dir: &Path,
    ) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args([
            "--headless",
            "--invisible",
            "--nologo",
            "--nofirststartwizard",
            "--norestore",
        ]);
        cmd.arg(&profile.installation_arg);
        if let Some(filter) = input_filter(source) {
            cmd.arg(format!("--infilter={}", filter));
        }
        cmd.args(["--convert-to", export.convert_to(), "--outdir"]);
        cmd.arg(out_dir);
        cmd.arg(source);
        cmd
    }

    /// Convert `request.source` and place the result at `request.output_path()`.
    ///
    /// Side files written next to the main output (images from HTML export)
    /// go to a `<stem>_files/` directory beside it. Returns every placed
    /// file, main output first.
    pub async fn convert(
        &self,
        request: &ConversionRequest,
        export: Export,
    ) -> Result<Vec<PathBuf>> {
        let source = request.source.as_path();
        if !source.exists() {
            return Err(ConversionError::InputNotFound(source.to_path_buf()));
        }

        let start = Instant::now();
        let profile = self.lease().await?;
        let job = self.work.job_dir().await?;

        debug!(
            "Profile {} converting {:?} to {}",
            profile.id,
            source.file_name(),
            export.extension()
        );

        let cmd = self.command(&profile, source, export, job.path());
        run_tool(cmd, SPEC.name, source, self.timeout).await?;
        drop(profile);

        let produced = list_files(job.path()).await?;
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");
        let expected = job.path().join(format!("{}.{}", stem, export.extension()));
        let main = if produced.contains(&expected) {
            expected
        } else {
            produced
                .iter()
                .find(|p| {
                    p.extension()
                        .map(|e| e == export.extension())
                        .unwrap_or(false)
                })
                .cloned()
                .ok_or_else(|| ConversionError::ConversionFailed {
                    path: source.to_path_buf(),
                    message: format!("{} output file not found", export.extension().to_uppercase()),
                })?
        };

        let output_path = request.output_path();
        let mut outputs = vec![output_path.clone()];
        let side_files: Vec<&PathBuf> = produced.iter().filter(|p| **p != main).collect();
        if !side_files.is_empty() {
            outputs.extend(place_side_files(&main, &side_files, &output_path).await?);
        }
        move_file(&main, &output_path).await?;

        self.total_processed.fetch_add(1, Ordering::SeqCst);
        debug!("Converted {:?} in {:?}", source.file_name(), start.elapsed());
        Ok(outputs)
    }
}

/// Directory holding the side files of one HTML export, e.g.
/// `out/report.html` -> `out/report_files/`.
fn side_files_dir(output_path: &Path) -> PathBuf {
    let stem = output_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output_path.with_file_name(format!("{}_files", stem))
}

/// Point quoted references to `name` in `html` at `folder/name`.
fn relink(html: &str, name: &str, folder: &str) -> String {
    ['"', '\''].iter().fold(html.to_string(), |html, quote| {
        html.replace(
            &format!("{q}{name}{q}", q = quote, name = name),
            &format!("{q}{folder}/{name}{q}", q = quote, folder = folder, name = name),
        )
    })
}

/// Move `side_files` into the side files directory of `output_path` and
/// rewrite `main` so its references follow them.
async fn place_side_files(
    main: &Path,
    side_files: &[&PathBuf],
    output_path: &Path,
) -> Result<Vec<PathBuf>> {
    let dir = side_files_dir(output_path);
    ensure_dir(&dir).await?;
    let folder = dir
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let bytes = tokio::fs::read(main)
        .await
        .map_err(|e| ConversionError::output_io(main, e))?;
    let mut html = String::from_utf8_lossy(&bytes).into_owned();

    let mut placed = Vec::with_capacity(side_files.len());
    for side in side_files {
        if let Some(name) = side.file_name() {
            let dest = dir.join(name);
            move_file(side, &dest).await?;
            html = relink(&html, &name.to_string_lossy(), &folder);
            placed.push(dest);
        }
    }

    tokio::fs::write(main, html)
        .await
        .map_err(|e| ConversionError::output_io(main, e))?;
    Ok(placed)
}
