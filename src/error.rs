//! Package-local error taxonomy.

use std::path::PathBuf;

use thiserror::Error;

/// Expected, non-fatal conditions that abandon a single package.
///
/// The loop driver logs these and moves on to the next package;
/// nothing in this enum ever aborts the overall run.
#[derive(Debug, Error)]
pub enum PackageError {
    /// The source fetch could not be started or its result was unusable.
    #[error("source fetch failed: {0}")]
    FetchFailed(String),

    /// The fetch ran but did not leave an extracted source directory.
    #[error("no extracted source directory found after fetch")]
    NoSourceDir,

    /// The fetch left more than one top-level directory, so the source
    /// root cannot be determined.
    #[error("more than one extracted source directory: {0:?}")]
    AmbiguousSourceDir(Vec<PathBuf>),

    /// Nothing in the tree looks compilable; running a build system
    /// would be futile.
    #[error("no C/C++ source or header files found")]
    NoSources,
}
