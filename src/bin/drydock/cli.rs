//! CLI definitions using clap.

use std::path::PathBuf;

use clap::Parser;

/// Drydock - download OS source packages and try to cross-compile them
/// to WebAssembly
#[derive(Parser)]
#[command(name = "drydock")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// File with one package name per line (produced by the collection
    /// tooling)
    #[arg(long, default_value = "packages.list")]
    pub package_list: PathBuf,

    /// Directory for workspaces, logs, and compiled binaries
    #[arg(short, long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Do not delete the src/ directory of failed packages
    #[arg(long)]
    pub keep_src: bool,

    /// Timeout for the configure and cmake stages, in minutes
    #[arg(long, default_value_t = 20)]
    pub timeout_configure: u64,

    /// Timeout for each make invocation, in minutes
    #[arg(long, default_value_t = 90)]
    pub timeout_make: u64,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}
