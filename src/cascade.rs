//! The best-effort configure → cmake → make cascade for one package.
//!
//! Both middle stages are optional and independent: a package may ship
//! a configure script, a CMakeLists.txt, both, or neither. No stage
//! failure (non-zero exit or timeout) stops later stages; the cascade
//! always runs to the end so the artifact scan can happen.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

use regex::Regex;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::PackageError;
use crate::locate::find_marker_bfs;
use crate::process::{StageCommand, StageError};
use crate::shell::{Shell, Status};

/// Extensions emcc accepts as compilable sources or headers.
const SOURCE_EXTENSIONS: &[&str] = &["c", "cpp", "c++", "cc", "h", "h++", "hxx", "hpp"];

// Special-cased configure failures, surfaced as targeted diagnostics
// for quicker triage of mass failures.
static RE_MISSING_LIBRARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)required library (.*?) not found").unwrap());
static RE_MISSING_PACKAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)no package (.*) found").unwrap());

/// Drives the build stages of a single package's source tree.
pub struct BuildCascade<'a> {
    config: &'a Config,
    shell: &'a Shell,
    log_dir: &'a Path,
}

impl<'a> BuildCascade<'a> {
    pub fn new(config: &'a Config, shell: &'a Shell, log_dir: &'a Path) -> Self {
        BuildCascade {
            config,
            shell,
            log_dir,
        }
    }

    /// Run all stages over a validated source tree.
    ///
    /// The returned timestamp was taken right before the first make
    /// invocation; the artifact scan must use it as its cutoff.
    pub fn run(&self, src_dir: &Path) -> Result<SystemTime, PackageError> {
        self.check_sources(src_dir)?;

        let configure_dir = self.configure_stage(src_dir);
        let cmake_dir = self.cmake_stage(src_dir);

        let before_make = SystemTime::now();
        for (dir, role) in
            plan_make_invocations(src_dir, configure_dir.as_deref(), cmake_dir.as_deref())
        {
            self.run_make(&dir, role);
        }

        Ok(before_make)
    }

    /// Fail fast when nothing in the tree is compilable, instead of
    /// invoking a build system futilely.
    fn check_sources(&self, src_dir: &Path) -> Result<(), PackageError> {
        let found = WalkDir::new(src_dir)
            .into_iter()
            .filter_map(Result::ok)
            .any(|entry| {
                entry.file_type().is_file()
                    && entry
                        .path()
                        .extension()
                        .and_then(OsStr::to_str)
                        .is_some_and(|ext| {
                            SOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
                        })
            });
        if found {
            Ok(())
        } else {
            Err(PackageError::NoSources)
        }
    }

    /// Directory of the topmost marker match, if any. Deeper matches
    /// are assumed to be vendored sub-projects and only warned about.
    fn topmost_marker_dir(&self, src_dir: &Path, marker: &str) -> Option<PathBuf> {
        let mut found = find_marker_bfs(src_dir, marker);
        if found.is_empty() {
            return None;
        }
        if found.len() > 1 {
            self.shell.warn(format!(
                "more than one {} found, taking topmost: {}",
                marker,
                found[0].display()
            ));
        }
        found.swap_remove(0).parent().map(Path::to_path_buf)
    }

    fn configure_stage(&self, src_dir: &Path) -> Option<PathBuf> {
        let dir = match self.topmost_marker_dir(src_dir, "configure") {
            Some(dir) => dir,
            None => {
                self.shell
                    .info("no configure script found, trying to build without");
                return None;
            }
        };

        self.shell.status(
            Status::Configuring,
            format!("running emconfigure in {}/", dir.display()),
        );
        let result = StageCommand::new("emconfigure", self.log_dir, "emconfigure")
            .arg("./configure")
            .cwd(&dir)
            .timeout(self.config.configure_timeout)
            .run();

        match result {
            // some feature probes (sleep/nanosleep detection) loop
            // forever under emulation; a timeout here usually means
            // such a hang rather than a genuinely huge configure
            Err(StageError::Timeout { budget, .. }) => self.shell.error(format!(
                "configure: killed after {}s, maybe a hanging feature probe (sleep/nanosleep)?",
                budget.as_secs()
            )),
            Err(err) => self.shell.error(format!("configure: {err}")),
            Ok(outcome) => {
                if let Some(stderr) = &outcome.stderr {
                    self.report_configure_diagnostics(stderr);
                }
            }
        }

        Some(dir)
    }

    fn report_configure_diagnostics(&self, stderr: &str) {
        for capture in RE_MISSING_LIBRARY.captures_iter(stderr) {
            self.shell
                .error(format!("configure: missing library {}", &capture[1]));
        }
        for capture in RE_MISSING_PACKAGE.captures_iter(stderr) {
            self.shell
                .error(format!("configure: missing package {}", &capture[1]));
        }
    }

    fn cmake_stage(&self, src_dir: &Path) -> Option<PathBuf> {
        let dir = match self.topmost_marker_dir(src_dir, "CMakeLists.txt") {
            Some(dir) => dir,
            None => {
                self.shell
                    .info("no CMakeLists.txt found, trying to build without cmake");
                return None;
            }
        };

        self.shell.status(
            Status::Configuring,
            format!("running emcmake in {}/", dir.display()),
        );
        let result = StageCommand::new("emcmake", self.log_dir, "emcmake")
            .args(["cmake", "."])
            .cwd(&dir)
            .timeout(self.config.configure_timeout)
            .run();
        if let Err(err) = result {
            self.shell.error(format!("cmake: {err}"));
        }

        Some(dir)
    }

    fn run_make(&self, dir: &Path, role: &'static str) {
        self.shell.status(
            Status::Building,
            format!("running emmake in {}/", dir.display()),
        );
        let result = StageCommand::new("emmake", self.log_dir, &format!("emmake-{role}-dir"))
            .arg("make")
            .cwd(dir)
            // emcc picks this up, so every object is built with debug info
            .env("EMMAKEN_CFLAGS", "-g")
            .timeout(self.config.make_timeout)
            .run();

        match result {
            Err(err) => self.shell.error(format!("make: {err}")),
            Ok(outcome) => {
                if let Some(stderr) = &outcome.stderr {
                    if stderr.contains("no makefile found") {
                        self.shell.error("make: no makefile found");
                    }
                }
            }
        }
    }
}

/// Make runs once per distinct directory among {configure dir, cmake
/// dir, source root}; the source root is always last. When directories
/// coincide, the first role to claim a directory keeps its log label.
fn plan_make_invocations(
    src_dir: &Path,
    configure_dir: Option<&Path>,
    cmake_dir: Option<&Path>,
) -> Vec<(PathBuf, &'static str)> {
    let mut plan: Vec<(PathBuf, &'static str)> = Vec::new();
    for (dir, role) in [(configure_dir, "configure"), (cmake_dir, "cmake")] {
        if let Some(dir) = dir {
            if dir != src_dir && !plan.iter().any(|(planned, _)| planned.as_path() == dir) {
                plan.push((dir.to_path_buf(), role));
            }
        }
    }
    plan.push((src_dir.to_path_buf(), "toplevel"));
    plan
}
