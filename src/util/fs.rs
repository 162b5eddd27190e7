//! Filesystem utilities.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<bool> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
        return Ok(true);
    }
    Ok(false)
}

/// Remove a file, if it exists.
pub fn remove_file_if_exists(path: &Path) -> Result<bool> {
    if path.exists() {
        fs::remove_file(path)
            .with_context(|| format!("failed to remove file: {}", path.display()))?;
        return Ok(true);
    }
    Ok(false)
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read file: {}", path.display()))
}

/// Write `contents` to `path` through a temporary sibling file and a rename.
///
/// Readers observe either the old file or the complete new one, never a
/// partial write.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = parent_dir(path);
    ensure_dir(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
    tmp.write_all(contents)
        .with_context(|| format!("failed to write temporary file for {}", path.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("failed to write file: {}", path.display()))?;
    Ok(())
}

/// Copy `src` to `dst` atomically; `src` is left untouched.
pub fn copy_atomic(src: &Path, dst: &Path) -> Result<()> {
    let contents =
        fs::read(src).with_context(|| format!("failed to read file: {}", src.display()))?;
    write_atomic(dst, &contents)
        .with_context(|| format!("failed to copy {} to {}", src.display(), dst.display()))
}

/// Append an extension to a path, keeping the existing one (`a.json` -> `a.json.old`).
pub fn with_appended_extension(path: &Path, extension: &str) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".");
    os.push(extension);
    PathBuf::from(os)
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_replaces_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("qx-lock.json");
        fs::write(&path, "old").unwrap();

        write_atomic(&path, b"new").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        // Only the target file is left behind.
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_copy_atomic_keeps_source() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("qx-lock.json");
        let dst = with_appended_extension(&src, "old");
        fs::write(&src, "{\"version\": \"1.0.0\"}").unwrap();

        copy_atomic(&src, &dst).unwrap();

        assert!(src.exists());
        assert_eq!(
            fs::read_to_string(&dst).unwrap(),
            "{\"version\": \"1.0.0\"}"
        );
    }

    #[test]
    fn test_with_appended_extension() {
        assert_eq!(
            with_appended_extension(Path::new("app/qx-lock.json"), "old"),
            PathBuf::from("app/qx-lock.json.old")
        );
    }

    #[test]
    fn test_remove_dir_all_if_exists() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("compiled/source");
        fs::create_dir_all(&dir).unwrap();

        assert!(remove_dir_all_if_exists(&dir).unwrap());
        assert!(!remove_dir_all_if_exists(&dir).unwrap());
    }
}
