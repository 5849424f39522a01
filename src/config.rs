//! Harness configuration and output-tree layout.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

/// Immutable harness configuration, built once from the CLI and passed
/// by reference into every component.
#[derive(Debug, Clone)]
pub struct Config {
    /// Plain-text file with one package name per line.
    pub package_list: PathBuf,
    /// Root of the output tree (`all/`, `success/`, `wasm/`, `wasm-dwarf/`).
    pub output_dir: PathBuf,
    /// Keep the `src/` directory of failed packages instead of deleting it.
    pub keep_src: bool,
    /// Budget for the configure and cmake stages.
    pub configure_timeout: Duration,
    /// Budget for each make invocation.
    pub make_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            package_list: PathBuf::from("packages.list"),
            output_dir: PathBuf::from("output"),
            keep_src: false,
            configure_timeout: Duration::from_secs(20 * 60),
            make_timeout: Duration::from_secs(90 * 60),
        }
    }
}

impl Config {
    /// Read the package list: one name per line, blank lines skipped.
    ///
    /// Producing the list is the collection tooling's job; a missing
    /// file is a fatal startup error here, not something to generate.
    pub fn read_package_list(&self) -> Result<Vec<String>> {
        let contents = fs::read_to_string(&self.package_list).with_context(|| {
            format!(
                "failed to read package list: {}",
                self.package_list.display()
            )
        })?;
        Ok(contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }
}

/// The four parallel output trees, created up front and canonicalized
/// so that artifact paths can be relativized with `strip_prefix`.
#[derive(Debug, Clone)]
pub struct OutputDirs {
    /// One subdirectory per attempted package, always created.
    pub all: PathBuf,
    /// Only packages that produced at least one artifact.
    pub success: PathBuf,
    /// Flat mirror of every discovered artifact path.
    pub wasm: PathBuf,
    /// Subset of `wasm/` whose artifacts carry DWARF info.
    pub wasm_dwarf: PathBuf,
}

impl OutputDirs {
    /// Create (if needed) and resolve the four trees under `output_dir`.
    pub fn create(output_dir: &Path) -> Result<Self> {
        Ok(OutputDirs {
            all: make_tree(output_dir, "all", "all packages")?,
            success: make_tree(output_dir, "success", "successful builds")?,
            wasm: make_tree(output_dir, "wasm", "wasm binaries only")?,
            wasm_dwarf: make_tree(output_dir, "wasm-dwarf", "wasm binaries with DWARF info")?,
        })
    }
}

fn make_tree(output_dir: &Path, name: &str, description: &str) -> Result<PathBuf> {
    let path = output_dir.join(name);
    fs::create_dir_all(&path)
        .with_context(|| format!("failed to create directory: {}", path.display()))?;
    let path = path
        .canonicalize()
        .with_context(|| format!("failed to resolve directory: {}", path.display()))?;
    tracing::info!("output directory for {}: {}/", description, path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_package_list_skips_blank_lines() {
        let tmp = TempDir::new().unwrap();
        let list = tmp.path().join("packages.list");
        fs::write(&list, "zlib1g\n\n  \nbison\nlibpng\n").unwrap();

        let config = Config {
            package_list: list,
            ..Config::default()
        };

        assert_eq!(
            config.read_package_list().unwrap(),
            vec!["zlib1g", "bison", "libpng"]
        );
    }

    #[test]
    fn test_missing_package_list_is_fatal() {
        let config = Config {
            package_list: PathBuf::from("/nonexistent/packages.list"),
            ..Config::default()
        };

        let err = config.read_package_list().unwrap_err();
        assert!(err.to_string().contains("packages.list"));
    }

    #[test]
    fn test_output_dirs_are_created_and_absolute() {
        let tmp = TempDir::new().unwrap();
        let dirs = OutputDirs::create(&tmp.path().join("output")).unwrap();

        for dir in [&dirs.all, &dirs.success, &dirs.wasm, &dirs.wasm_dwarf] {
            assert!(dir.is_dir());
            assert!(dir.is_absolute());
        }
        assert!(dirs.wasm_dwarf.ends_with("wasm-dwarf"));
    }
}
