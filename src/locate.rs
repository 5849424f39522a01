//! Breadth-first marker-file search for build-system detection.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

/// Find every file named `marker` under `root`, breadth-first, with
/// unbounded depth.
///
/// The shallowest match comes first, so callers can take the topmost
/// occurrence as the project's own build entry point; deeper matches
/// are usually vendored sub-projects. Returns an empty vector when the
/// marker does not exist anywhere - absence is a normal outcome, many
/// packages build with neither a configure script nor CMake.
///
/// Entries within one directory are visited in name order, so the
/// result is deterministic. Directory symlinks are not followed.
pub fn find_marker_bfs(root: &Path, marker: &str) -> Vec<PathBuf> {
    let mut matches = Vec::new();
    let mut queue = VecDeque::from([root.to_path_buf()]);

    while let Some(dir) = queue.pop_front() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::debug!("cannot read {}: {}", dir.display(), err);
                continue;
            }
        };

        let mut entries: Vec<_> = entries.filter_map(Result::ok).collect();
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(_) => continue,
            };
            if file_type.is_dir() {
                queue.push_back(entry.path());
            } else if file_type.is_file() && entry.file_name() == *marker {
                matches.push(entry.path());
            }
        }
    }

    matches
}
