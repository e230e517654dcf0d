//! Whole-file JSON snapshots with atomic replace.
//!
//! Every store in this crate rewrites its complete file on each mutation.
//! The new content goes to a `.tmp` sibling which is fsync'd and renamed over
//! the original, so a reader sees either the old snapshot or the new one and
//! never a partial write.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::warn;

fn tmp_path(path: &Path) -> PathBuf {
    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| "snapshot.json".to_string());
    path.with_file_name(format!("{filename}.tmp"))
}

/// Atomically replace `path` with `bytes`.  The `.tmp` file is removed on
/// any error path.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let tmp = tmp_path(path);
    let write_result: Result<()> = async {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
    .await;

    if let Err(err) = write_result {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(err.context(format!("writing {}", tmp.display())));
    }

    if let Err(err) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(anyhow::Error::new(err).context(format!("replacing {}", path.display())));
    }

    Ok(())
}

/// Serialize `value` as pretty JSON and atomically replace `path`.
pub async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    write_atomic(path, &bytes).await
}

/// Load a JSON array of records, decoding each one independently.
///
/// Returns `Ok(None)` when the file does not exist.  Records that fail to
/// decode are skipped with a warning.  A file that is not a JSON array at all,
/// including one that is not valid UTF-8, is logged and read as empty.  Only
/// I/O errors are returned.
pub fn read_json_records<T: DeserializeOwned>(path: &Path) -> Result<Option<Vec<T>>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Some(Vec::new()));
    }

    let values: Vec<serde_json::Value> = match serde_json::from_slice(&raw) {
        Ok(values) => values,
        Err(err) => {
            warn!(
                error = %err,
                path = %path.display(),
                "snapshot is not a JSON array, treating as empty"
            );
            return Ok(Some(Vec::new()));
        }
    };

    let mut records = Vec::with_capacity(values.len());
    let mut skipped = 0usize;
    for (idx, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<T>(value) {
            Ok(record) => records.push(record),
            Err(err) => {
                skipped += 1;
                warn!(
                    record = idx,
                    error = %err,
                    path = %path.display(),
                    "skipping malformed record"
                );
            }
        }
    }

    if skipped > 0 {
        warn!(skipped, path = %path.display(), "snapshot loaded with skipped records");
    }

    Ok(Some(records))
}
