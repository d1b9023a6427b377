//! Watch-folder state.
//!
//! The caller owns a [`WatchState`] for the lifetime of one watcher and passes
//! it into every poll. Nothing is global, so two watchers never interfere.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Paths already handed out by [`WatchState::poll`] and marked as processed.
#[derive(Debug, Default, Clone)]
pub struct WatchState {
    seen: HashSet<PathBuf>,
}

impl WatchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Regular files directly inside `dir` that have not been marked seen,
    /// sorted by path. Hidden files (leading `.`) and partial downloads
    /// (`.part`, `.tmp`, `.crdownload`) are skipped.
    pub fn poll(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut fresh = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if is_ignored(&path) || self.seen.contains(&path) {
                continue;
            }
            fresh.push(path);
        }
        fresh.sort();
        debug!("Watch poll of {}: {} new file(s)", dir.display(), fresh.len());
        Ok(fresh)
    }

    /// Record `path` as handled, whether its conversion succeeded or not.
    pub fn mark_seen(&mut self, path: impl Into<PathBuf>) {
        self.seen.insert(path.into());
    }

    pub fn is_seen(&self, path: &Path) -> bool {
        self.seen.contains(path)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

fn is_ignored(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(true);
    let partial = path
        .extension()
        .map(|e| {
            let e = e.to_string_lossy().to_ascii_lowercase();
            matches!(e.as_str(), "part" | "tmp" | "crdownload")
        })
        .unwrap_or(false);
    hidden || partial
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_returns_new_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.docx", ".hidden", "c.pdf.part"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let mut state = WatchState::new();
        let first = state.poll(dir.path()).unwrap();
        let names: Vec<_> = first
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.docx", "b.pdf"]);

        state.mark_seen(first[0].clone());
        let second = state.poll(dir.path()).unwrap();
        assert_eq!(second, vec![first[1].clone()]);
        assert!(state.is_seen(&first[0]));
    }

    #[test]
    fn independent_states_do_not_share() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"x").unwrap();
        let mut one = WatchState::new();
        let two = WatchState::new();
        for p in one.poll(dir.path()).unwrap() {
            one.mark_seen(p);
        }
        assert!(one.poll(dir.path()).unwrap().is_empty());
        assert_eq!(two.poll(dir.path()).unwrap().len(), 1);
        assert_eq!(one.len(), 1);
        assert!(two.is_empty());
    }

    #[test]
    fn missing_dir_is_an_error() {
        assert!(WatchState::new().poll(Path::new("/nonexistent/watch")).is_err());
    }
}
