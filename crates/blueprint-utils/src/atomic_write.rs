//! Atomic file writes for the file-backed project store.
//!
//! Content is written to a temporary file in the target directory, fsynced,
//! then renamed over the target. Readers therefore see either the previous
//! document or the new one, never a torn write. When the rename crosses a
//! filesystem boundary the content is copied next to the target first.

use anyhow::{Context, Result};
use camino::Utf8Path;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Outcome details of an atomic write
#[derive(Debug, Clone, Default)]
pub struct AtomicWriteResult {
    /// Whether the copy-then-rename fallback was needed
    pub used_cross_filesystem_fallback: bool,
    /// Bytes written to the target
    pub bytes_written: usize,
}

/// Atomically replace `path` with `content`, creating parent directories.
pub fn write_file_atomic(path: &Utf8Path, content: &[u8]) -> Result<AtomicWriteResult> {
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create parent directory: {parent}"))?;

    let mut temp_file = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temporary file in: {parent}"))?;
    temp_file
        .write_all(content)
        .context("Failed to write content to temporary file")?;
    temp_file
        .as_file()
        .sync_all()
        .context("Failed to fsync temporary file")?;

    let temp_path = temp_file.path().to_path_buf();
    let mut result = AtomicWriteResult {
        bytes_written: content.len(),
        ..AtomicWriteResult::default()
    };

    match temp_file.persist(path.as_std_path()) {
        Ok(_) => {}
        Err(err) if is_cross_filesystem_error(&err.error) => {
            result.used_cross_filesystem_fallback = true;
            tracing::debug!(path = %path, "Rename crossed filesystems, copying instead");
            copy_then_persist(&temp_path, path)?;
        }
        Err(err) => {
            return Err(anyhow::Error::new(err.error))
                .with_context(|| format!("Failed to atomically write file: {path}"));
        }
    }

    Ok(result)
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Utf8Path,
    value: &T,
) -> Result<AtomicWriteResult> {
    let mut body = serde_json::to_vec_pretty(value)
        .with_context(|| format!("Failed to serialize JSON for {path}"))?;
    body.push(b'\n');
    write_file_atomic(path, &body)
}

#[cfg(unix)]
fn is_cross_filesystem_error(err: &std::io::Error) -> bool {
    // EXDEV on Linux and macOS
    err.raw_os_error() == Some(18)
}

#[cfg(not(unix))]
fn is_cross_filesystem_error(_err: &std::io::Error) -> bool {
    false
}

fn copy_then_persist(temp_path: &Path, target: &Utf8Path) -> Result<()> {
    let content = fs::read(temp_path)
        .context("Failed to read temporary file for cross-filesystem copy")?;

    let target_dir = target.parent().unwrap_or_else(|| Utf8Path::new("."));
    let mut target_temp = NamedTempFile::new_in(target_dir)
        .with_context(|| format!("Failed to create temp file in target directory: {target_dir}"))?;
    target_temp
        .write_all(&content)
        .context("Failed to write content during cross-filesystem copy")?;
    target_temp
        .as_file()
        .sync_all()
        .context("Failed to fsync during cross-filesystem copy")?;
    target_temp
        .persist(target.as_std_path())
        .map_err(|e| anyhow::Error::new(e.error))
        .context("Failed to persist during cross-filesystem copy")?;

    let _ = fs::remove_file(temp_path);
    Ok(())
}
