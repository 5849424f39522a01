//! External command execution with captured logs and hard timeouts.
//!
//! Build tools routinely fork sub-make and sub-configure children, so a
//! timeout must kill the whole process tree, not only the direct child.
//! Every stage is therefore spawned as the leader of a fresh process
//! group, and expiry SIGKILLs that entire group before the error is
//! handed back to the caller.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Poll interval while waiting for a running stage.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Set while an operator interrupt (SIGINT) is pending.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_interrupt(_: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Route SIGINT into the stage wait loop.
///
/// Stages run in their own process groups and would not see a terminal
/// interrupt at all; with the handler installed, an interrupt kills the
/// in-flight group and surfaces as [`StageError::Interrupted`], and the
/// package loop moves on instead of leaving runaway children behind.
pub fn install_interrupt_handler() {
    let handler = on_interrupt as extern "C" fn(libc::c_int);
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
    }
}

/// Failure modes of a stage invocation.
#[derive(Debug, Error)]
pub enum StageError {
    /// The stage overran its budget; its whole process group was killed.
    #[error("`{command}` killed after {}s (timeout)", .budget.as_secs())]
    Timeout { command: String, budget: Duration },

    /// An operator interrupt arrived; the process group was killed.
    #[error("`{command}` interrupted, process group killed")]
    Interrupted { command: String },

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("i/o error while running `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: io::Error,
    },
}

/// Result of a finished stage.
///
/// `stderr` is read back from the captured log file (not the live
/// stream, to avoid buffering races) and is only populated on a
/// non-zero exit; a clean exit needs no diagnostics.
#[derive(Debug)]
pub struct StageOutcome {
    pub code: i32,
    pub stderr: Option<String>,
}

impl StageOutcome {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Builder for one external stage invocation.
///
/// The child's stdout and stderr are redirected into
/// `<label>.stdout` / `<label>.stderr` under the log directory; both
/// files exist after [`StageCommand::run`] returns, win or lose.
#[derive(Debug, Clone)]
pub struct StageCommand {
    program: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
    cwd: Option<PathBuf>,
    timeout: Option<Duration>,
    log_dir: PathBuf,
    label: String,
}

impl StageCommand {
    /// Create a new stage for the given program, logging under
    /// `log_dir` with the given stage label.
    pub fn new(program: impl AsRef<Path>, log_dir: impl AsRef<Path>, label: &str) -> Self {
        StageCommand {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            timeout: None,
            log_dir: log_dir.as_ref().to_path_buf(),
            label: label.to_string(),
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable for the child.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Set a hard timeout for the whole process group.
    pub fn timeout(mut self, budget: Duration) -> Self {
        self.timeout = Some(budget);
        self
    }

    /// Path of the captured stdout log.
    pub fn stdout_log_path(&self) -> PathBuf {
        self.log_dir.join(format!("{}.stdout", self.label))
    }

    /// Path of the captured stderr log.
    pub fn stderr_log_path(&self) -> PathBuf {
        self.log_dir.join(format!("{}.stderr", self.label))
    }

    /// Display the command for log messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }

    /// Spawn the stage as a process-group leader and wait for it.
    ///
    /// On timeout (or any wait error) the whole group is SIGKILLed and
    /// reaped before the error is returned, so no descendant survives
    /// the call.
    pub fn run(&self) -> Result<StageOutcome, StageError> {
        let stdout = File::create(self.stdout_log_path()).map_err(|e| self.io_error(e))?;
        let stderr = File::create(self.stderr_log_path()).map_err(|e| self.io_error(e))?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            // group leader, so killpg reaches every descendant
            .process_group(0);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        let child = cmd.spawn().map_err(|source| StageError::Spawn {
            command: self.display_command(),
            source,
        })?;
        let mut child = GroupChild::new(child);

        let status = match self.wait(&mut child) {
            Ok(status) => status,
            Err(err) => {
                child.kill_group();
                return Err(err);
            }
        };

        let code = exit_code(status);
        if code == 0 {
            return Ok(StageOutcome { code, stderr: None });
        }

        let stderr_text = fs::read_to_string(self.stderr_log_path()).unwrap_or_default();
        tracing::warn!(
            "non-zero exit code {} of `{}`, see logs in {}",
            code,
            self.display_command(),
            self.log_dir.display()
        );
        Ok(StageOutcome {
            code,
            stderr: Some(stderr_text),
        })
    }

    fn wait(&self, child: &mut GroupChild) -> Result<ExitStatus, StageError> {
        let deadline = self.timeout.map(|budget| (Instant::now() + budget, budget));
        loop {
            if let Some(status) = child.try_wait().map_err(|e| self.io_error(e))? {
                return Ok(status);
            }
            if INTERRUPTED.swap(false, Ordering::SeqCst) {
                return Err(StageError::Interrupted {
                    command: self.display_command(),
                });
            }
            if let Some((deadline, budget)) = deadline {
                if Instant::now() >= deadline {
                    return Err(StageError::Timeout {
                        command: self.display_command(),
                        budget,
                    });
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn io_error(&self, source: io::Error) -> StageError {
        StageError::Io {
            command: self.display_command(),
            source,
        }
    }
}

/// A child spawned as the leader of its own process group.
///
/// The group is killed and the leader reaped on drop if the child was
/// never waited for, so an early return cannot leak runaway builds.
struct GroupChild {
    inner: Child,
    reaped: bool,
}

impl GroupChild {
    fn new(inner: Child) -> Self {
        GroupChild {
            inner,
            reaped: false,
        }
    }

    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        let status = self.inner.try_wait()?;
        if status.is_some() {
            self.reaped = true;
        }
        Ok(status)
    }

    /// SIGKILL the whole group and reap the leader.
    fn kill_group(&mut self) {
        if self.reaped {
            return;
        }
        // the child is its own group leader, so its pid is the pgid
        unsafe {
            libc::killpg(self.inner.id() as libc::pid_t, libc::SIGKILL);
        }
        let _ = self.inner.wait();
        self.reaped = true;
    }
}

impl Drop for GroupChild {
    fn drop(&mut self) {
        self.kill_group();
    }
}

/// Exit code of a finished stage, folding signal termination into the
/// usual shell convention of `128 + signal`.
fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}

/// Find an executable in PATH.
pub fn find_tool(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}
