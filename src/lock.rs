//! Per-dataset advisory locks (fs2) for callers that run periodic jobs.
//!
//! The library itself never serializes access to a dataset; the CLI takes one
//! of these around prune and send-recv when a lock directory is configured.
//!
//! Lock file: <lock_dir>/<dataset with '/' replaced by '%'>.lock
//! The lock is released on Drop.

use anyhow::{anyhow, Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

pub fn lock_file_path(lock_dir: &Path, dataset: &str) -> PathBuf {
    lock_dir.join(format!("{}.lock", dataset.replace('/', "%")))
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create lock dir {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(path)
        .with_context(|| format!("open lock file {}", path.display()))
}

/// Take the dataset lock or fail immediately if another run holds it.
pub fn try_lock_dataset(lock_dir: &Path, dataset: &str) -> Result<LockGuard> {
    let path = lock_file_path(lock_dir, dataset);
    let file = open_lock_file(&path)?;
    file.try_lock_exclusive()
        .map_err(|e| anyhow!("{} is busy ({}): {}", dataset, path.display(), e))?;
    Ok(LockGuard { file, path })
}

/// Lock several datasets in a stable order; all or nothing.
pub fn try_lock_datasets(lock_dir: &Path, datasets: &[&str]) -> Result<Vec<LockGuard>> {
    let mut names: Vec<&str> = datasets.to_vec();
    names.sort_unstable();
    names.dedup();
    names.into_iter().map(|d| try_lock_dataset(lock_dir, d)).collect()
}
