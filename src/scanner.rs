// Corpus discovery: walk one or more roots, prune excluded directories,
// accept image files by extension and size, and yield each distinct path
// once in first-encounter order.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::EngineConfig;
use crate::indexer::CancelFlag;

/// Filtering rules applied during a scan, derived from [`EngineConfig`].
#[derive(Debug, Clone)]
pub struct ScanFilter {
    extensions: HashSet<String>,
    excluded_tokens: Vec<String>,
    min_bytes: u64,
    max_bytes: u64,
}

impl ScanFilter {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            excluded_tokens: config
                .excluded_folders
                .iter()
                .map(|t| t.to_lowercase())
                .collect(),
            min_bytes: config.min_file_size_kb * 1024,
            max_bytes: config.max_file_size_mb * 1024 * 1024,
        }
    }

    /// A directory is pruned when its own name contains any exclusion token,
    /// case-insensitively. The whole subtree is skipped.
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.excluded_tokens.iter().any(|token| name.contains(token))
    }

    pub fn accepts_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }

    /// Extension and size check. Both bounds are inclusive; a file that
    /// cannot be stat-ed is skipped.
    pub fn accepts(&self, path: &Path) -> bool {
        if !self.accepts_extension(path) {
            return false;
        }
        match fs::metadata(path) {
            Ok(meta) => {
                let size = meta.len();
                size >= self.min_bytes && size <= self.max_bytes
            }
            Err(_) => false,
        }
    }
}

/// Counters reported to the scan progress callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanProgress {
    pub directories: usize,
    pub files: usize,
}

/// Walk `roots` and collect every accepted image path exactly once, in
/// first-encounter order. Unreadable directories are treated as empty;
/// `on_progress` fires every 100 directories. The walk stops early (returning
/// the partial list, which the caller must discard) once `cancel` is set.
pub fn scan<F>(
    roots: &[PathBuf],
    filter: &ScanFilter,
    cancel: &CancelFlag,
    mut on_progress: F,
) -> Vec<PathBuf>
where
    F: FnMut(&ScanProgress),
{
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut found: Vec<PathBuf> = Vec::new();
    let mut progress = ScanProgress::default();

    for root in roots {
        if cancel.is_cancelled() {
            return found;
        }
        if !root.exists() {
            log::debug!("skipping missing scan root {}", root.display());
            continue;
        }
        let root = fs::canonicalize(root).unwrap_or_else(|_| root.clone());

        let walker = WalkDir::new(&root).into_iter().filter_entry(|entry| {
            !(entry.file_type().is_dir()
                && filter.is_excluded_dir(&entry.file_name().to_string_lossy()))
        });

        for entry in walker {
            if cancel.is_cancelled() {
                return found;
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    // Unreadable directory: same as an empty listing.
                    log::debug!("skipping unreadable entry: {}", err);
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                progress.directories += 1;
                if progress.directories % 100 == 0 {
                    on_progress(&progress);
                }
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            if filter.accepts(&path) && seen.insert(path.clone()) {
                found.push(path);
                progress.files += 1;
            }
        }
    }

    found
}

/// Root-set provider for "scan everything reachable": every mounted volume
/// visible to this machine.
#[cfg(not(windows))]
pub fn all_drive_roots() -> Vec<PathBuf> {
    let mut roots = vec![PathBuf::from("/")];
    for mount in ["/media", "/mnt", "/Volumes"] {
        let mount = Path::new(mount);
        if !mount.exists() {
            continue;
        }
        let Ok(entries) = fs::read_dir(mount) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                roots.push(path);
            }
        }
    }
    roots
}

#[cfg(windows)]
pub fn all_drive_roots() -> Vec<PathBuf> {
    ('A'..='Z')
        .map(|letter| PathBuf::from(format!("{letter}:\\")))
        .filter(|drive| drive.exists())
        .collect()
}

/// Suggest likely image folders under the user's home directory: the usual
/// suspects that actually contain at least one image at top level.
pub fn common_image_folders(filter: &ScanFilter) -> Vec<PathBuf> {
    let Some(home) = home_dir() else {
        return Vec::new();
    };
    common_image_folders_in(&home, filter)
}

fn common_image_folders_in(home: &Path, filter: &ScanFilter) -> Vec<PathBuf> {
    ["Pictures", "Desktop", "Downloads"]
        .iter()
        .map(|name| home.join(name))
        .filter(|dir| has_image_at_top_level(dir, filter))
        .collect()
}

fn has_image_at_top_level(dir: &Path, filter: &ScanFilter) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries
        .flatten()
        .any(|entry| filter.accepts_extension(&entry.path()))
}

fn home_dir() -> Option<PathBuf> {
    #[cfg(windows)]
    let var = "USERPROFILE";
    #[cfg(not(windows))]
    let var = "HOME";
    std::env::var_os(var).map(PathBuf::from)
}
