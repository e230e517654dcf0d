use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use fs2::FileExt;
use tracing::debug;

pub const LOCK_FILE_NAME: &str = "kabo.lock";

/// Exclusive advisory lock on a memory directory.  The stores rewrite whole
/// files and assume a single writer, so every process that mutates them
/// holds this for its lifetime.  Dropping it releases the lock.
#[derive(Debug)]
pub struct DataDirLock {
    path: PathBuf,
    _file: File,
}

impl DataDirLock {
    pub fn acquire(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("creating memory directory {}", data_dir.display()))?;
        let path = data_dir.join(LOCK_FILE_NAME);
        let file = File::create(&path)?;
        file.try_lock_exclusive().map_err(|_| {
            anyhow!(
                "another kabo process is using {} (lock held at {})",
                data_dir.display(),
                path.display()
            )
        })?;
        debug!(path = %path.display(), "memory directory locked");
        Ok(Self { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn second_holder_is_refused_until_release() {
        let dir = TempDir::new().unwrap();
        let first = DataDirLock::acquire(dir.path()).unwrap();
        assert!(first.path().ends_with(LOCK_FILE_NAME));
        assert!(DataDirLock::acquire(dir.path()).is_err());
        drop(first);
        assert!(DataDirLock::acquire(dir.path()).is_ok());
    }
}
