//! Status-line output for the package loop.
//!
//! Callers pick a semantic [`Status`]; the shell owns colors, alignment,
//! and verbosity. `Success` is part of the fixed enum, not a
//! runtime-registered log level, so every severity the harness can
//! report is visible at compile time.

use std::fmt::Display;
use std::io::{self, IsTerminal, Write};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Warnings and errors only.
    Quiet,
    /// Default: all status lines.
    #[default]
    Normal,
    /// Same status lines; detail goes through `tracing` at debug level.
    Verbose,
}

/// Color output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Detect TTY and use colors if available.
    #[default]
    Auto,
    /// Always use ANSI colors.
    Always,
    /// Never use ANSI colors.
    Never,
}

/// Status types for output messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    // In-progress statuses (cyan)
    Fetching,
    Configuring,
    Building,

    // Success statuses (green)
    Success,
    Finished,

    // Info status (blue)
    Info,

    // Warning statuses (yellow)
    Skipped,
    Warning,

    // Error status (red)
    Error,
}

impl Status {
    /// Get the display text for this status.
    fn as_str(&self) -> &'static str {
        match self {
            Status::Fetching => "Fetching",
            Status::Configuring => "Configuring",
            Status::Building => "Building",
            Status::Success => "Success",
            Status::Finished => "Finished",
            Status::Info => "Info",
            Status::Skipped => "Skipped",
            Status::Warning => "Warning",
            Status::Error => "error",
        }
    }

    /// Get the ANSI color code for this status.
    fn color_code(&self) -> &'static str {
        match self {
            // In-progress: bold cyan
            Status::Fetching | Status::Configuring | Status::Building => "\x1b[1;36m",
            // Success: bold green
            Status::Success | Status::Finished => "\x1b[1;32m",
            // Info: bold blue
            Status::Info => "\x1b[1;34m",
            // Warning: bold yellow
            Status::Skipped | Status::Warning => "\x1b[1;33m",
            // Error: bold red
            Status::Error => "\x1b[1;31m",
        }
    }
}

/// Central shell for user-facing harness output.
#[derive(Debug)]
pub struct Shell {
    verbosity: Verbosity,
    use_color: bool,
}

impl Shell {
    /// Create a new shell.
    pub fn new(verbosity: Verbosity, color: ColorChoice) -> Self {
        let use_color = match color {
            ColorChoice::Auto => io::stderr().is_terminal(),
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        };
        Shell {
            verbosity,
            use_color,
        }
    }

    /// Print one status line to stderr.
    pub fn status(&self, status: Status, message: impl Display) {
        if self.verbosity == Verbosity::Quiet
            && !matches!(status, Status::Warning | Status::Error)
        {
            return;
        }
        let line = render(self.use_color, status, &message);
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "{}", line);
    }

    pub fn info(&self, message: impl Display) {
        self.status(Status::Info, message);
    }

    pub fn warn(&self, message: impl Display) {
        self.status(Status::Warning, message);
    }

    pub fn error(&self, message: impl Display) {
        self.status(Status::Error, message);
    }

    pub fn skipped(&self, message: impl Display) {
        self.status(Status::Skipped, message);
    }
}

/// Format one line with the status right-aligned to 12 characters.
fn render(use_color: bool, status: Status, message: &dyn Display) -> String {
    if use_color {
        format!(
            "{}{:>12}\x1b[0m {}",
            status.color_code(),
            status.as_str(),
            message
        )
    } else {
        format!("{:>12} {}", status.as_str(), message)
    }
}
