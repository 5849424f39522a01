//! The sequential package loop.
//!
//! One package at a time: prepare workspace → build cascade → artifact
//! scan → archive → cleanup. Per-package failures are logged and the
//! loop continues; the harness only fails for harness-level problems
//! (unreadable package list, uncreatable output tree).

use std::fs;
use std::path::Path;

use anyhow::Result;

use crate::archive::ArchiveManager;
use crate::cascade::BuildCascade;
use crate::config::{Config, OutputDirs};
use crate::error::PackageError;
use crate::process::find_tool;
use crate::scan::{scan_artifacts, Artifact};
use crate::shell::{Shell, Status};
use crate::workspace::PackageWorkspace;

/// External commands the pipeline shells out to.
const REQUIRED_TOOLS: &[&str] = &["apt-get", "emconfigure", "emcmake", "emmake"];

/// Aggregate outcome of a run.
#[derive(Debug, Clone, Copy)]
pub struct RunStats {
    /// Packages iterated over, including skipped ones.
    pub processed: usize,
    /// Packages with a `success/` entry, counted from the filesystem
    /// so resumed runs report cumulative numbers.
    pub succeeded: usize,
}

/// Iterates the package sequence and reports running statistics.
pub struct PackageLoopDriver<'a> {
    config: &'a Config,
    shell: &'a Shell,
}

impl<'a> PackageLoopDriver<'a> {
    pub fn new(config: &'a Config, shell: &'a Shell) -> Self {
        PackageLoopDriver { config, shell }
    }

    /// Process every package in order.
    pub fn run(&self, packages: &[String]) -> Result<RunStats> {
        self.preflight();

        let dirs = OutputDirs::create(&self.config.output_dir)?;
        let total = packages.len();
        let mut stats = RunStats {
            processed: 0,
            succeeded: count_success_dirs(&dirs.success),
        };

        for (index, package) in packages.iter().enumerate() {
            self.shell.info(format!(
                "package {} ({}/{}, {:.1}%)",
                package,
                index,
                total,
                percent(index, total)
            ));
            stats.processed = index + 1;

            let mut workspace =
                match PackageWorkspace::create(&dirs, self.config.keep_src, package, self.shell) {
                    Ok(Some(workspace)) => workspace,
                    Ok(None) => {
                        self.shell
                            .skipped(format!("directory for {} exists", package));
                        continue;
                    }
                    Err(err) => {
                        self.shell.error(format!(
                            "could not create workspace for {}: {:#}",
                            package, err
                        ));
                        continue;
                    }
                };

            match self.process(&mut workspace) {
                Ok(artifacts) if !artifacts.is_empty() => {
                    self.shell.status(
                        Status::Success,
                        format!("found {} wasm binaries", artifacts.len()),
                    );
                    if let Err(err) =
                        ArchiveManager::new(&dirs, self.shell).promote(&mut workspace, &artifacts)
                    {
                        self.shell
                            .error(format!("could not archive {}: {:#}", package, err));
                    }
                }
                Ok(_) => {}
                Err(err) => self.shell.error(err),
            }

            workspace.cleanup();

            stats.succeeded = count_success_dirs(&dirs.success);
            self.shell.info(format!(
                "{}/{} ({:.1}%) packages could be (partially) built",
                stats.succeeded,
                index + 1,
                percent(stats.succeeded, index + 1)
            ));
        }

        Ok(stats)
    }

    /// The per-package pipeline: fetch → cascade → scan.
    fn process(
        &self,
        workspace: &mut PackageWorkspace<'_>,
    ) -> Result<Vec<Artifact>, PackageError> {
        let src_root = workspace.fetch_source()?;
        let cascade = BuildCascade::new(self.config, self.shell, workspace.log_dir());
        let before_make = cascade.run(&src_root)?;
        Ok(scan_artifacts(&src_root, before_make))
    }

    /// Missing tools are only warned about: every package would fail
    /// the same way, but the run itself stays valid and resumable.
    fn preflight(&self) {
        for tool in REQUIRED_TOOLS {
            if find_tool(tool).is_none() {
                self.shell.warn(format!(
                    "{} not found in PATH, builds depending on it will fail",
                    tool
                ));
            }
        }
    }
}

fn count_success_dirs(success: &Path) -> usize {
    fs::read_dir(success)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|entry| entry.path().is_dir())
                .count()
        })
        .unwrap_or(0)
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}
