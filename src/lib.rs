//! Drydock - a best-effort mass-compilation harness for WebAssembly
//!
//! Given an ordered list of OS source packages, drydock fetches each
//! one, drives its build system through the emscripten cross-compilation
//! wrappers (configure, cmake, make), discovers WebAssembly outputs by
//! content signature, and promotes successful packages into a curated
//! output tree for later dataset construction.
//!
//! The loop is strictly sequential and resumable: a package whose
//! `all/<name>` directory already exists is skipped wholesale, and no
//! per-package failure ever aborts the run.

pub mod archive;
pub mod cascade;
pub mod config;
pub mod driver;
pub mod error;
pub mod locate;
pub mod process;
pub mod scan;
pub mod shell;
pub mod util;
pub mod workspace;

pub use config::{Config, OutputDirs};
pub use error::PackageError;
pub use scan::Artifact;
pub use shell::{Shell, Status};
