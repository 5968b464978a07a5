//! File system helpers shared by checkpoint and index persistence.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Suffix used for in-flight files before they are renamed into place.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Write `bytes` to `path` so readers observe either the old file or the
/// complete new one, never a torn write.
///
/// The data is written to a sibling temp file, fsynced, then renamed over
/// the destination. The parent directory is synced afterwards on Unix so the
/// rename itself survives a crash. On failure the temp file is removed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let temp_path = temp_path_for(path);

    if let Err(error) = write_then_rename(&temp_path, path, bytes) {
        let _ = fs::remove_file(&temp_path);
        return Err(error);
    }

    sync_parent(path);
    Ok(())
}

fn write_then_rename(temp_path: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    {
        let mut file = File::create(temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(temp_path, path)
}

/// Path of the temp file used by [`write_atomic`] for `path`.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}

#[cfg(unix)]
fn sync_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_replaces_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.bin");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_failed_rename_removes_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        // A non-empty directory cannot be replaced by a file
        let path = temp_dir.path().join("occupied");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("inner"), b"keep").unwrap();

        assert!(write_atomic(&path, b"data").is_err());
        assert!(!temp_path_for(&path).exists());
        assert_eq!(fs::read(path.join("inner")).unwrap(), b"keep");
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let path = Path::new("/tmp/checkpoints/a%2Fb.vec");
        assert_eq!(
            temp_path_for(path),
            PathBuf::from("/tmp/checkpoints/a%2Fb.vec.tmp")
        );
    }
}
