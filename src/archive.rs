//! Promotion of successful packages into the curated output trees.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::OutputDirs;
use crate::scan::Artifact;
use crate::shell::{Shell, Status};
use crate::util::fs::{copy_flat_files, ensure_dir, remove_dir_all_if_exists};
use crate::util::human::format_size;
use crate::workspace::PackageWorkspace;

/// Archives packages that produced at least one artifact.
pub struct ArchiveManager<'a> {
    dirs: &'a OutputDirs,
    shell: &'a Shell,
}

impl<'a> ArchiveManager<'a> {
    pub fn new(dirs: &'a OutputDirs, shell: &'a Shell) -> Self {
        ArchiveManager { dirs, shell }
    }

    /// Promote one package: `success/<pkg>` gets the stage logs and the
    /// relocated source tree, `wasm/` gets every artifact under its path
    /// relative to `all/`, and `wasm-dwarf/` the subset with debug info.
    ///
    /// Callers only invoke this with a non-empty artifact list, which
    /// keeps the invariant that a `success/` entry exists iff the
    /// package produced at least one artifact in this run.
    pub fn promote(
        &self,
        workspace: &mut PackageWorkspace<'_>,
        artifacts: &[Artifact],
    ) -> Result<()> {
        let success_dir = self.dirs.success.join(workspace.name());
        if success_dir.exists() {
            // stale entry from an aborted earlier run
            self.shell
                .warn(format!("{}/ already exists, removing", success_dir.display()));
            remove_dir_all_if_exists(&success_dir)?;
        }
        fs::create_dir(&success_dir)
            .with_context(|| format!("failed to create directory: {}", success_dir.display()))?;

        for artifact in artifacts {
            let relative = match artifact.path.strip_prefix(&self.dirs.all) {
                Ok(relative) => relative,
                Err(_) => {
                    self.shell.warn(format!(
                        "{} resolved outside the output tree, not copying",
                        artifact.path.display()
                    ));
                    continue;
                }
            };

            self.shell.status(Status::Success, relative.display());
            self.shell
                .info(format!("file size: {}", format_size(artifact.len)));
            self.shell.info(format!(
                "DWARF info: {}",
                if artifact.has_dwarf { "yes" } else { "no" }
            ));

            self.copy_artifact(&self.dirs.wasm, relative, &artifact.path)?;
            if artifact.has_dwarf {
                self.copy_artifact(&self.dirs.wasm_dwarf, relative, &artifact.path)?;
            }
        }

        self.shell.info(format!(
            "copying log files to {}/",
            success_dir.display()
        ));
        copy_flat_files(workspace.log_dir(), &success_dir)?;

        self.move_src(workspace, &success_dir);
        Ok(())
    }

    fn copy_artifact(&self, tree: &Path, relative: &Path, source: &Path) -> Result<()> {
        let destination = tree.join(relative);
        if let Some(parent) = destination.parent() {
            ensure_dir(parent)?;
        }
        fs::copy(source, &destination).with_context(|| {
            format!(
                "failed to copy {} to {}",
                source.display(),
                destination.display()
            )
        })?;
        Ok(())
    }

    /// Relocate `src/` with a rename instead of a recursive copy:
    /// cheaper, and immune to self-referential symlink trees that
    /// defeat copy-then-delete.
    fn move_src(&self, workspace: &mut PackageWorkspace<'_>, success_dir: &Path) {
        let src = workspace.src_dir();
        if !src.exists() {
            return;
        }
        self.shell.info(format!(
            "moving {}/ to {}/",
            src.display(),
            success_dir.display()
        ));
        match fs::rename(&src, success_dir.join("src")) {
            Ok(()) => workspace.mark_src_moved(),
            Err(err) => self
                .shell
                .error(format!("could not move {}/: {}", src.display(), err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{ColorChoice, Verbosity};
    use std::path::PathBuf;
    use tempfile::TempDir;

    const WASM_HEADER: &[u8] = b"\0asm\x01\x00\x00\x00";

    struct Setup {
        _tmp: TempDir,
        dirs: OutputDirs,
    }

    fn setup() -> Setup {
        let tmp = TempDir::new().unwrap();
        let dirs = OutputDirs::create(&tmp.path().join("output")).unwrap();
        Setup { _tmp: tmp, dirs }
    }

    fn make_artifact(path: PathBuf, has_dwarf: bool) -> Artifact {
        let len = fs::metadata(&path).unwrap().len();
        Artifact {
            path: path.canonicalize().unwrap(),
            len,
            has_dwarf,
        }
    }

    #[test]
    fn test_promote_without_dwarf() {
        let setup = setup();
        let shell = Shell::new(Verbosity::Quiet, ColorChoice::Never);
        let mut ws = PackageWorkspace::create(&setup.dirs, false, "pkg", &shell)
            .unwrap()
            .unwrap();

        let built = ws.src_dir().join("pkg-1.0");
        fs::create_dir_all(&built).unwrap();
        let wasm = built.join("hello.wasm");
        fs::write(&wasm, WASM_HEADER).unwrap();
        fs::write(ws.log_dir().join("emmake-toplevel-dir.stdout"), "log").unwrap();

        let artifacts = vec![make_artifact(wasm, false)];
        ArchiveManager::new(&setup.dirs, &shell)
            .promote(&mut ws, &artifacts)
            .unwrap();

        let success = setup.dirs.success.join("pkg");
        assert!(success.join("emmake-toplevel-dir.stdout").exists());
        // src was moved, not copied
        assert!(success.join("src/pkg-1.0/hello.wasm").exists());
        assert!(!ws.src_dir().exists());
        // artifact mirrored under its path relative to all/
        assert!(setup.dirs.wasm.join("pkg/src/pkg-1.0/hello.wasm").exists());
        // no dwarf, no wasm-dwarf entry
        assert!(!setup.dirs.wasm_dwarf.join("pkg").exists());
    }

    #[test]
    fn test_promote_with_dwarf_copies_to_both_trees() {
        let setup = setup();
        let shell = Shell::new(Verbosity::Quiet, ColorChoice::Never);
        let mut ws = PackageWorkspace::create(&setup.dirs, false, "pkg", &shell)
            .unwrap()
            .unwrap();

        let built = ws.src_dir().join("pkg-1.0");
        fs::create_dir_all(&built).unwrap();
        let wasm = built.join("debug.wasm");
        let mut bytes = WASM_HEADER.to_vec();
        bytes.extend_from_slice(b".debug_info");
        fs::write(&wasm, &bytes).unwrap();

        let artifacts = vec![make_artifact(wasm, true)];
        ArchiveManager::new(&setup.dirs, &shell)
            .promote(&mut ws, &artifacts)
            .unwrap();

        assert!(setup.dirs.wasm.join("pkg/src/pkg-1.0/debug.wasm").exists());
        assert!(setup
            .dirs
            .wasm_dwarf
            .join("pkg/src/pkg-1.0/debug.wasm")
            .exists());
    }

    #[test]
    fn test_stale_success_dir_is_replaced() {
        let setup = setup();
        let shell = Shell::new(Verbosity::Quiet, ColorChoice::Never);

        let stale = setup.dirs.success.join("pkg");
        fs::create_dir_all(stale.join("old-stuff")).unwrap();

        let mut ws = PackageWorkspace::create(&setup.dirs, false, "pkg", &shell)
            .unwrap()
            .unwrap();
        let built = ws.src_dir().join("pkg-1.0");
        fs::create_dir_all(&built).unwrap();
        let wasm = built.join("new.wasm");
        fs::write(&wasm, WASM_HEADER).unwrap();

        let artifacts = vec![make_artifact(wasm, false)];
        ArchiveManager::new(&setup.dirs, &shell)
            .promote(&mut ws, &artifacts)
            .unwrap();

        assert!(!stale.join("old-stuff").exists());
        assert!(stale.join("src/pkg-1.0/new.wasm").exists());
    }
}
