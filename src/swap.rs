use {
    anyhow::{ensure, Context, Result},
    log::{debug, info},
    std::{
        fs,
        path::{Path, PathBuf},
    },
};

use crate::constants::{BACKUP_SUFFIX, SCRATCH_SUFFIX};

/// Backup-and-swap editor for a single dataset file.
///
/// `begin` takes a backup copy of the target and reserves a guarded scratch
/// path next to it. The caller writes the rewritten file to the scratch path
/// and calls `commit`, which replaces the target atomically. If the swap is
/// dropped without committing, the scratch file is removed; the backup is
/// never removed and is the only recovery path after an interrupted run.
#[derive(Debug)]
pub struct SwapFile {
    original: PathBuf,
    scratch: PathBuf,
    backup: PathBuf,
    committed: bool,
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

impl SwapFile {
    pub fn begin<P: AsRef<Path>>(original: P) -> Result<Self> {
        let original = original.as_ref().to_owned();
        let scratch = with_suffix(&original, SCRATCH_SUFFIX);
        let backup = with_suffix(&original, BACKUP_SUFFIX);

        ensure!(
            original.exists(),
            "{} does not exist",
            original.display()
        );
        // A leftover scratch or backup file means a previous run aborted
        // partway; refuse to clobber whatever it left behind.
        ensure!(
            !scratch.exists(),
            "{} already exists; a previous run may have been interrupted, clean up before re-running",
            scratch.display()
        );
        ensure!(
            !backup.exists(),
            "{} already exists; a previous run may have been interrupted, clean up before re-running",
            backup.display()
        );

        fs::copy(&original, &backup)
            .with_context(|| format!("failed to back up {}", original.display()))?;
        ensure!(
            backup.exists(),
            "backup {} did not appear after copying",
            backup.display()
        );

        debug!(
            "backed up {} to {}",
            original.display(),
            backup.display()
        );

        Ok(SwapFile {
            original,
            scratch,
            backup,
            committed: false,
        })
    }

    /// Path of the file being rewritten.
    pub fn original(&self) -> &Path {
        &self.original
    }

    /// Guarded output path; write the full replacement file here.
    pub fn scratch(&self) -> &Path {
        &self.scratch
    }

    /// Path of the backup copy taken by `begin`.
    pub fn backup(&self) -> &Path {
        &self.backup
    }

    /// Replaces the original with the scratch file.
    pub fn commit(mut self) -> Result<()> {
        ensure!(
            self.scratch.exists(),
            "nothing was written to {}",
            self.scratch.display()
        );

        fs::remove_file(&self.original)
            .with_context(|| format!("failed to remove {}", self.original.display()))?;
        fs::rename(&self.scratch, &self.original).with_context(|| {
            format!(
                "failed to move {} to {}",
                self.scratch.display(),
                self.original.display()
            )
        })?;

        self.committed = true;
        info!("rewrote {}", self.original.display());

        Ok(())
    }
}

impl Drop for SwapFile {
    fn drop(&mut self) {
        if !self.committed && self.scratch.exists() {
            // Best effort; the backup still holds the pristine file.
            fs::remove_file(&self.scratch).ok();
        }
    }
}
