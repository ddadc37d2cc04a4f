//! Write-to-temp-then-rename file replacement.

use super::StorageError;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Sibling temp path: `AAPL.csv` → `AAPL.csv.tmp`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replace `path` with whatever `fill` writes.
///
/// The content goes to a temp file in the same directory, is synced, then
/// renamed over `path`. If `fill`, the sync or the rename fails, the temp
/// file is removed and `path` keeps its previous content.
pub fn write_atomic<F>(path: &Path, fill: F) -> Result<(), StorageError>
where
    F: FnOnce(&mut File) -> Result<(), StorageError>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = temp_path(path);

    let result = (|| -> Result<(), StorageError> {
        let mut file = File::create(&tmp)?;
        fill(&mut file)?;
        file.flush()?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}
