use std::ffi::OsString;
use std::path::{Path, PathBuf};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::cell::ThemeCell;
use crate::mode::{ThemeError, ThemeMode};

/// Mirrors edits of the persisted preference file into a [`ThemeCell`].
///
/// The parent directory is watched rather than the file itself so the file
/// may be created, replaced, or written atomically after the watcher starts.
/// `read` turns the file into a mode; `None` leaves the cell untouched.
pub struct ThemeWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
}

impl ThemeWatcher {
    pub fn watch<F>(path: &Path, cell: ThemeCell, read: F) -> Result<Self, ThemeError>
    where
        F: Fn(&Path) -> Option<ThemeMode> + Send + 'static,
    {
        let parent = path
            .parent()
            .ok_or_else(|| ThemeError::NoParent(path.display().to_string()))?
            .to_path_buf();
        let file_name: Option<OsString> = path.file_name().map(|name| name.to_os_string());
        let target = path.to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "theme preference watch error");
                        return;
                    }
                };
                if !matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any
                ) {
                    return;
                }
                let touches_target = event
                    .paths
                    .iter()
                    .any(|changed| changed.file_name().map(|n| n.to_os_string()) == file_name);
                if !touches_target {
                    return;
                }
                match read(&target) {
                    Some(mode) => {
                        if cell.set(mode) {
                            tracing::info!(theme = %mode, "theme preference changed on disk");
                        }
                    }
                    None => {
                        tracing::trace!(path = %target.display(), "preference file has no theme");
                    }
                }
            },
            Config::default(),
        )?;
        watcher.watch(&parent, RecursiveMode::NonRecursive)?;
        tracing::debug!(path = %path.display(), "watching theme preference");

        Ok(Self {
            path: path.to_path_buf(),
            _watcher: watcher,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn read_plain(path: &Path) -> Option<ThemeMode> {
        fs::read_to_string(path).ok()?.trim().parse().ok()
    }

    #[test]
    fn file_edit_updates_cell() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("theme.txt");
        fs::write(&path, "light").unwrap();

        let cell = ThemeCell::new(ThemeMode::Light);
        let _watcher = ThemeWatcher::watch(&path, cell.clone(), read_plain).unwrap();

        fs::write(&path, "dark").unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while cell.get() != ThemeMode::Dark && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(cell.get(), ThemeMode::Dark);
    }

    fn wait_until(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        true
    }

    #[test]
    fn sibling_files_and_unreadable_values_leave_cell_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("theme.txt");
        fs::write(&path, "light").unwrap();

        let cell = ThemeCell::new(ThemeMode::Light);
        let reads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reads);
        let _watcher = ThemeWatcher::watch(&path, cell.clone(), move |path| {
            counter.fetch_add(1, Ordering::SeqCst);
            read_plain(path)
        })
        .unwrap();

        fs::write(dir.path().join("other.txt"), "dark").unwrap();
        std::thread::sleep(Duration::from_millis(300));
        assert_eq!(reads.load(Ordering::SeqCst), 0);
        assert_eq!(cell.get(), ThemeMode::Light);

        fs::write(&path, "sepia").unwrap();
        assert!(wait_until(|| reads.load(Ordering::SeqCst) > 0));
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(cell.get(), ThemeMode::Light);

        fs::write(&path, "dark").unwrap();
        assert!(wait_until(|| cell.get() == ThemeMode::Dark));
    }

    #[test]
    fn rejects_path_without_parent() {
        let cell = ThemeCell::new(ThemeMode::Dark);
        let err = ThemeWatcher::watch(Path::new("/"), cell, read_plain)
            .err()
            .expect("root has no parent");
        assert!(matches!(err, ThemeError::NoParent(_)));
    }
}
