//! Per-package workspace lifecycle: create, fetch, clean up.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::OutputDirs;
use crate::error::PackageError;
use crate::process::StageCommand;
use crate::shell::{Shell, Status};

/// The working directory of one package under `all/`.
///
/// Owned exclusively by the loop iteration processing that package.
/// The directory itself is the resumability marker: it is never removed,
/// only its `src/` subtree is.
pub struct PackageWorkspace<'a> {
    name: String,
    root: PathBuf,
    keep_src: bool,
    src_moved: bool,
    shell: &'a Shell,
}

impl<'a> PackageWorkspace<'a> {
    /// Create `all/<name>`.
    ///
    /// Returns `Ok(None)` when the directory already exists: the
    /// package was handled by an earlier run and is skipped wholesale.
    /// There is no partial resume within a package.
    pub fn create(
        dirs: &OutputDirs,
        keep_src: bool,
        name: &str,
        shell: &'a Shell,
    ) -> Result<Option<Self>> {
        let root = dirs.all.join(name);
        if root.exists() {
            return Ok(None);
        }
        fs::create_dir(&root)
            .with_context(|| format!("failed to create directory: {}", root.display()))?;
        Ok(Some(PackageWorkspace {
            name: name.to_string(),
            root,
            keep_src,
            src_moved: false,
            shell,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding the per-stage log files.
    pub fn log_dir(&self) -> &Path {
        &self.root
    }

    /// The `src/` subtree holding fetched sources.
    pub fn src_dir(&self) -> PathBuf {
        self.root.join("src")
    }

    /// Record that `src/` was relocated into the success tree, so
    /// cleanup must not touch it.
    pub fn mark_src_moved(&mut self) {
        self.src_moved = true;
    }

    /// Run `apt-get source <name>` into `src/` and validate that it
    /// left exactly one extracted directory. Leftover archives next to
    /// the extracted tree are removed.
    pub fn fetch_source(&self) -> Result<PathBuf, PackageError> {
        let src = self.src_dir();
        fs::create_dir(&src).map_err(|err| PackageError::FetchFailed(err.to_string()))?;

        self.shell
            .status(Status::Fetching, format!("running apt-get source {}", self.name));
        StageCommand::new("apt-get", &self.root, "apt-get-source")
            .args(["source", &self.name])
            .cwd(&src)
            .run()
            .map_err(|err| PackageError::FetchFailed(err.to_string()))?;

        let src_root = validate_extracted(&src)?;
        remove_leftover_archives(&src);

        self.shell
            .info(format!("unpacked and patched sources in {}/", src_root.display()));
        Ok(src_root)
    }

    /// Remove `src/` to bound disk usage, unless retention was
    /// requested or the tree was already moved into `success/`.
    /// Removal errors are logged, never raised.
    pub fn cleanup(&self) {
        if self.keep_src || self.src_moved {
            return;
        }
        let src = self.src_dir();
        if !src.exists() {
            return;
        }
        self.shell.info(format!("removing {}/", src.display()));
        if let Err(err) = fs::remove_dir_all(&src) {
            self.shell
                .error(format!("could not remove {}/: {}", src.display(), err));
        }
    }
}

/// `apt-get source` unpacks (and patches) the sources into exactly one
/// directory; anything else means the fetch went wrong.
fn validate_extracted(src: &Path) -> Result<PathBuf, PackageError> {
    let entries = fs::read_dir(src).map_err(|err| PackageError::FetchFailed(err.to_string()))?;

    let mut dirs_found = Vec::new();
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        if path.is_dir() {
            dirs_found.push(path);
        }
    }

    if dirs_found.is_empty() {
        return Err(PackageError::NoSourceDir);
    }
    if dirs_found.len() > 1 {
        dirs_found.sort();
        return Err(PackageError::AmbiguousSourceDir(dirs_found));
    }

    dirs_found
        .remove(0)
        .canonicalize()
        .map_err(|err| PackageError::FetchFailed(err.to_string()))
}

/// Keep only the extracted sources; the downloaded .dsc/.tar files next
/// to them are dead weight once unpacking succeeded.
fn remove_leftover_archives(src: &Path) {
    let Ok(entries) = fs::read_dir(src) else {
        return;
    };
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        if path.is_file() {
            if let Err(err) = fs::remove_file(&path) {
                tracing::warn!("could not remove {}: {}", path.display(), err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{ColorChoice, Verbosity};
    use tempfile::TempDir;

    fn test_shell() -> Shell {
        Shell::new(Verbosity::Quiet, ColorChoice::Never)
    }

    fn output_dirs(tmp: &TempDir) -> OutputDirs {
        OutputDirs::create(&tmp.path().join("output")).unwrap()
    }

    #[test]
    fn test_existing_directory_skips_package() {
        let tmp = TempDir::new().unwrap();
        let dirs = output_dirs(&tmp);
        let shell = test_shell();

        let first = PackageWorkspace::create(&dirs, false, "zlib1g", &shell).unwrap();
        assert!(first.is_some());

        let second = PackageWorkspace::create(&dirs, false, "zlib1g", &shell).unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn test_validate_extracted_single_dir() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("pkg-1.0")).unwrap();
        fs::write(tmp.path().join("pkg_1.0.orig.tar.gz"), "archive").unwrap();

        let root = validate_extracted(tmp.path()).unwrap();
        assert!(root.ends_with("pkg-1.0"));
    }

    #[test]
    fn test_validate_extracted_none() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("pkg_1.0.dsc"), "").unwrap();

        match validate_extracted(tmp.path()) {
            Err(PackageError::NoSourceDir) => {}
            other => panic!("expected NoSourceDir, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_extracted_ambiguous() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("pkg-1.0")).unwrap();
        fs::create_dir(tmp.path().join("pkg-2.0")).unwrap();

        match validate_extracted(tmp.path()) {
            Err(PackageError::AmbiguousSourceDir(dirs)) => assert_eq!(dirs.len(), 2),
            other => panic!("expected AmbiguousSourceDir, got {:?}", other),
        }
    }

    #[test]
    fn test_cleanup_removes_src() {
        let tmp = TempDir::new().unwrap();
        let dirs = output_dirs(&tmp);
        let shell = test_shell();

        let ws = PackageWorkspace::create(&dirs, false, "pkg", &shell)
            .unwrap()
            .unwrap();
        fs::create_dir_all(ws.src_dir().join("pkg-1.0")).unwrap();

        ws.cleanup();
        assert!(!ws.src_dir().exists());
        assert!(ws.log_dir().exists());
    }

    #[test]
    fn test_cleanup_honors_keep_src() {
        let tmp = TempDir::new().unwrap();
        let dirs = output_dirs(&tmp);
        let shell = test_shell();

        let ws = PackageWorkspace::create(&dirs, true, "pkg", &shell)
            .unwrap()
            .unwrap();
        fs::create_dir_all(ws.src_dir()).unwrap();

        ws.cleanup();
        assert!(ws.src_dir().exists());
    }

    #[test]
    fn test_cleanup_skips_moved_src() {
        let tmp = TempDir::new().unwrap();
        let dirs = output_dirs(&tmp);
        let shell = test_shell();

        let mut ws = PackageWorkspace::create(&dirs, false, "pkg", &shell)
            .unwrap()
            .unwrap();
        fs::create_dir_all(ws.src_dir()).unwrap();
        ws.mark_src_moved();

        ws.cleanup();
        // the tree was (conceptually) renamed away; whatever is left
        // under the old path must not be deleted again
        assert!(ws.src_dir().exists());
    }
}
