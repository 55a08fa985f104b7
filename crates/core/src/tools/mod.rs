//! Wrappers around the external conversion tools.
//!
//! Each wrapper locates its binary, builds the command line, runs it under a
//! timeout and moves the produced files to their destination. On unix each
//! tool runs in its own process group, and a timed-out or abandoned run
//! kills the whole group along with anything the tool forked.

pub mod libreoffice;
pub mod poppler;
pub mod wkhtmltopdf;

pub use libreoffice::LibreOffice;
pub use poppler::Poppler;
pub use wkhtmltopdf::Wkhtmltopdf;

use crate::error::{ConversionError, Result};
use async_process::{Output, Stdio};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// How to find one external binary.
#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub name: &'static str,
    pub binaries: &'static [&'static str],
    pub candidates: &'static [&'static str],
    pub hint: &'static str,
}

impl ToolSpec {
    pub fn not_found(&self) -> ConversionError {
        ConversionError::ToolNotFound {
            tool: self.name,
            hint: self.hint,
        }
    }

    /// Locate the binary: explicit path, then well-known install
    /// locations, then `PATH`.
    pub fn locate(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            warn!("Configured {} path {:?} does not exist", self.name, path);
            return Err(self.not_found());
        }

        for candidate in self.candidates {
            let path = PathBuf::from(candidate);
            if path.exists() {
                return Ok(path);
            }
        }

        self.binaries
            .iter()
            .find_map(|binary| which::which(binary).ok())
            .ok_or_else(|| self.not_found())
    }
}

/// Kills a tool's process group on drop unless disarmed.
struct GroupGuard {
    pgid: Option<u32>,
}

impl GroupGuard {
    fn new(pgid: u32) -> Self {
        Self { pgid: Some(pgid) }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // SAFETY: killpg takes no pointers; pgid names the group created for this run.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
        debug!("killpg({}) failed: {}", pgid, std::io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

/// Run `cmd` to completion within `limit`, failing on a non-zero exit.
pub(crate) async fn run_tool(
    cmd: Command,
    tool: &'static str,
    source: &Path,
    limit: Duration,
) -> Result<Output> {
    #[cfg(unix)]
    let cmd = {
        let mut cmd = cmd;
        std::os::unix::process::CommandExt::process_group(&mut cmd, 0);
        cmd
    };

    let mut cmd = async_process::Command::from(cmd);
    cmd.kill_on_drop(true)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("Running {} for {:?}", tool, source);

    let child = cmd.spawn().map_err(ConversionError::ProcessStartFailed)?;
    let mut group = GroupGuard::new(child.id());

    let output = timeout(limit, child.output())
        .await
        .map_err(|_| {
            warn!("{} timed out after {:?} for {:?}", tool, limit, source);
            ConversionError::Timeout {
                path: source.to_path_buf(),
                timeout: limit,
            }
        })?
        .map_err(ConversionError::ProcessStartFailed)?;
    group.disarm();

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("{} failed for {:?}: {}", tool, source, stderr.trim());
        return Err(ConversionError::ConversionFailed {
            path: source.to_path_buf(),
            message: format!("{} exited with {}: {}", tool, output.status, stderr.trim()),
        });
    }

    Ok(output)
}

/// Move a file, falling back to copy + remove across filesystems.
pub(crate) async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to)
        .await
        .map_err(|e| ConversionError::output_io(to, e))?;
    if let Err(e) = tokio::fs::remove_file(from).await {
        debug!("Could not remove {:?} after copy: {}", from, e);
    }
    Ok(())
}

/// Copy `source` to `dest`, leaving the source in place.
pub(crate) async fn copy_file(source: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    if !source.exists() {
        return Err(ConversionError::InputNotFound(source.to_path_buf()));
    }
    tokio::fs::copy(source, dest)
        .await
        .map_err(|e| ConversionError::output_io(dest, e))?;
    Ok(vec![dest.to_path_buf()])
}

/// Files directly inside `dir`, sorted by name.
pub(crate) async fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ConversionError::output_io(dir, e))?;
    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ConversionError::output_io(dir, e))?
    {
        if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Scratch space for tool output, one uniquely named subdirectory per job.
#[derive(Debug)]
pub(crate) struct WorkArea {
    root: TempDir,
}

impl WorkArea {
    pub(crate) fn new(prefix: &str) -> Result<Self> {
        let root = TempDir::with_prefix(prefix).map_err(ConversionError::ProcessStartFailed)?;
        Ok(Self { root })
    }

    pub(crate) async fn job_dir(&self) -> Result<JobDir> {
        let path = self.root.path().join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| ConversionError::output_io(&path, e))?;
        Ok(JobDir { path })
    }
}

/// A job's scratch directory, removed on drop.
#[derive(Debug)]
pub(crate) struct JobDir {
    path: PathBuf,
}

impl JobDir {
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for JobDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            debug!("Failed to clean up {:?}: {}", self.path, e);
        }
    }
}
