//! Drydock CLI - a mass-compilation harness for WebAssembly

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use drydock::config::Config;
use drydock::driver::PackageLoopDriver;
use drydock::process::install_interrupt_handler;
use drydock::shell::{ColorChoice, Shell, Status, Verbosity};

mod cli;

use cli::Cli;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("drydock=debug")
    } else {
        EnvFilter::new("drydock=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    install_interrupt_handler();

    let config = Config {
        package_list: cli.package_list,
        output_dir: cli.output_dir,
        keep_src: cli.keep_src,
        configure_timeout: Duration::from_secs(cli.timeout_configure * 60),
        make_timeout: Duration::from_secs(cli.timeout_make * 60),
    };

    let verbosity = if cli.verbose {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    };
    let color = if cli.no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    let shell = Shell::new(verbosity, color);

    let packages = config.read_package_list()?;
    shell.info(format!("{} packages to process", packages.len()));

    let stats = PackageLoopDriver::new(&config, &shell).run(&packages)?;
    shell.status(
        Status::Finished,
        format!(
            "{}/{} packages produced wasm binaries",
            stats.succeeded, stats.processed
        ),
    );
    Ok(())
}
