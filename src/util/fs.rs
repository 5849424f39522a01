//! Filesystem helpers.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Copy the regular files directly under `src` into `dst`, without
/// recursing. Used for carrying a package's stage logs along.
pub fn copy_flat_files(src: &Path, dst: &Path) -> Result<()> {
    for entry in
        fs::read_dir(src).with_context(|| format!("failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            let to = dst.join(entry.file_name());
            fs::copy(entry.path(), &to).with_context(|| {
                format!(
                    "failed to copy {} to {}",
                    entry.path().display(),
                    to.display()
                )
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_flat_files_ignores_subdirs() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::create_dir_all(&dst).unwrap();
        fs::write(src.join("stage.stdout"), "out").unwrap();
        fs::write(src.join("stage.stderr"), "err").unwrap();
        fs::write(src.join("nested/deep.txt"), "deep").unwrap();

        copy_flat_files(&src, &dst).unwrap();

        assert!(dst.join("stage.stdout").exists());
        assert!(dst.join("stage.stderr").exists());
        assert!(!dst.join("nested").exists());
        assert!(!dst.join("deep.txt").exists());
    }

    #[test]
    fn test_remove_dir_all_if_exists_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("gone");
        fs::create_dir(&dir).unwrap();

        remove_dir_all_if_exists(&dir).unwrap();
        assert!(!dir.exists());
        // second call is a no-op
        remove_dir_all_if_exists(&dir).unwrap();
    }
}
