//! Artifact discovery by binary content signature.
//!
//! Build systems do not reliably give WebAssembly outputs a `.wasm`
//! suffix, so classification goes by the first four bytes of the file.
//! Known imprecision, carried over deliberately: intermediate object
//! files also start with the wasm magic and are counted as artifacts;
//! the scan does not distinguish linked modules from objects.
//! Downstream consumers filter if they care.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

/// Magic bytes at the start of every WebAssembly module.
pub const WASM_MAGIC: &[u8; 4] = b"\0asm";

/// Custom-section name present when a binary carries DWARF debug info.
const DEBUG_INFO_MARKER: &[u8] = b".debug_info";

/// A discovered build output in the target bytecode format.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Resolved absolute path.
    pub path: PathBuf,
    /// File size in bytes.
    pub len: u64,
    /// Whether the file embeds DWARF debug information.
    pub has_dwarf: bool,
}

/// Walk `root` and collect every regular file that was modified at or
/// after `since` and starts with the wasm magic.
///
/// The mtime filter is the sole mechanism separating genuinely produced
/// build outputs from binaries already shipped in the source tarball;
/// `since` must be captured immediately before the make stage runs.
/// Filesystem anomalies (unreadable entries, cyclic symlinks) skip the
/// affected path and never abort the scan.
pub fn scan_artifacts(root: &Path, since: SystemTime) -> Vec<Artifact> {
    let mut artifacts = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!("scan: skipping unreadable entry: {}", err);
                continue;
            }
        };

        // resolve symlinks to the true file; canonicalize fails on
        // cyclic links, which are silently skipped
        let path = match entry.path().canonicalize() {
            Ok(path) => path,
            Err(_) => continue,
        };
        let meta = match path.metadata() {
            Ok(meta) => meta,
            Err(_) => continue,
        };
        if !meta.is_file() {
            continue;
        }

        // older files are vendored or pre-existing, not build outputs
        match meta.modified() {
            Ok(modified) if modified >= since => {}
            _ => continue,
        }

        match is_wasm_by_magic(&path) {
            Ok(true) => {}
            _ => continue,
        }

        let has_dwarf = contains_debug_info(&path).unwrap_or(false);
        artifacts.push(Artifact {
            path,
            len: meta.len(),
            has_dwarf,
        });
    }

    // symlinks can resolve to an already-collected file
    artifacts.sort_by(|a, b| a.path.cmp(&b.path));
    artifacts.dedup_by(|a, b| a.path == b.path);
    artifacts
}

/// Check the first four bytes against the wasm magic. A file shorter
/// than the magic cannot be a module.
fn is_wasm_by_magic(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(&magic == WASM_MAGIC),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(err) => Err(err),
    }
}

/// Look for the DWARF section-name marker anywhere in the file bytes.
fn contains_debug_info(path: &Path) -> io::Result<bool> {
    let bytes = fs::read(path)?;
    Ok(bytes
        .windows(DEBUG_INFO_MARKER.len())
        .any(|window| window == DEBUG_INFO_MARKER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    use filetime::FileTime;
    use tempfile::TempDir;

    const WASM_HEADER: &[u8] = b"\0asm\x01\x00\x00\x00";

    #[test]
    fn test_magic_bytes_beat_file_extension() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("output.bin"), WASM_HEADER).unwrap();
        fs::write(tmp.path().join("fake.wasm"), b"not a module").unwrap();

        let artifacts = scan_artifacts(tmp.path(), UNIX_EPOCH);

        assert_eq!(artifacts.len(), 1);
        assert!(artifacts[0].path.ends_with("output.bin"));
    }

    #[test]
    fn test_short_file_is_not_an_artifact() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("tiny"), b"\0as").unwrap();

        assert!(scan_artifacts(tmp.path(), UNIX_EPOCH).is_empty());
    }

    #[test]
    fn test_prebuild_files_are_excluded() {
        let tmp = TempDir::new().unwrap();
        let vendored = tmp.path().join("vendored.wasm");
        let fresh = tmp.path().join("fresh.wasm");
        fs::write(&vendored, WASM_HEADER).unwrap();
        fs::write(&fresh, WASM_HEADER).unwrap();

        let hour_ago = SystemTime::now() - Duration::from_secs(3600);
        filetime::set_file_mtime(&vendored, FileTime::from_system_time(hour_ago)).unwrap();
        let since = SystemTime::now() - Duration::from_secs(1800);

        let artifacts = scan_artifacts(tmp.path(), since);

        assert_eq!(artifacts.len(), 1);
        assert!(artifacts[0].path.ends_with("fresh.wasm"));
    }

    #[test]
    fn test_dwarf_marker_detection() {
        let tmp = TempDir::new().unwrap();
        let mut with_dwarf = WASM_HEADER.to_vec();
        with_dwarf.extend_from_slice(b"custom section .debug_info here");
        fs::write(tmp.path().join("debug.wasm"), &with_dwarf).unwrap();
        fs::write(tmp.path().join("stripped.wasm"), WASM_HEADER).unwrap();

        let mut artifacts = scan_artifacts(tmp.path(), UNIX_EPOCH);
        artifacts.sort_by_key(|a| a.path.clone());

        assert_eq!(artifacts.len(), 2);
        assert!(artifacts[0].path.ends_with("debug.wasm"));
        assert!(artifacts[0].has_dwarf);
        assert!(!artifacts[1].has_dwarf);
    }

    #[test]
    fn test_cyclic_symlink_is_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("good.wasm"), WASM_HEADER).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("loop"), tmp.path().join("loop")).unwrap();

        let artifacts = scan_artifacts(tmp.path(), UNIX_EPOCH);

        assert_eq!(artifacts.len(), 1);
        assert!(artifacts[0].path.ends_with("good.wasm"));
    }

    #[test]
    fn test_symlink_to_artifact_is_deduplicated() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("real.wasm");
        fs::write(&target, WASM_HEADER).unwrap();
        std::os::unix::fs::symlink(&target, tmp.path().join("alias.wasm")).unwrap();

        let artifacts = scan_artifacts(tmp.path(), UNIX_EPOCH);

        assert_eq!(artifacts.len(), 1);
    }

    #[test]
    fn test_artifact_records_size() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("sized.wasm"), WASM_HEADER).unwrap();

        let artifacts = scan_artifacts(tmp.path(), UNIX_EPOCH);

        assert_eq!(artifacts[0].len, WASM_HEADER.len() as u64);
    }
}
