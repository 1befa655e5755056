//! Readiness probe: wait for the transcoder's first output artifact.
//!
//! Races a filesystem watcher against a poll tick and a bounded deadline.
//! Whichever fires first resolves the probe; both the watcher and the timer
//! are dropped when this function returns, so repeated start calls never
//! leak watch handles.

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Fallback poll interval while waiting on the watcher.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Wait until `path` exists, bounded by `timeout`.
///
/// Returns `false` on timeout, never an error. The parent directory not
/// existing yet is tolerated: watch setup is retried on each poll tick until
/// the directory shows up or the deadline passes.
pub async fn wait_for_artifact(path: &Path, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => return path.exists(),
    };
    let file_name = match path.file_name() {
        Some(n) => n.to_os_string(),
        None => return false,
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher: Option<RecommendedWatcher> = None;

    loop {
        if path.exists() {
            return true;
        }

        // The watcher callback runs on notify's own thread; an unbounded
        // sender is safe to use from there.
        if watcher.is_none() && parent.is_dir() {
            let tx = tx.clone();
            let name = file_name.clone();
            let created = RecommendedWatcher::new(
                move |res: Result<notify::Event, notify::Error>| {
                    if let Ok(event) = res {
                        if event
                            .paths
                            .iter()
                            .any(|p| p.file_name() == Some(name.as_os_str()))
                        {
                            let _ = tx.send(());
                        }
                    }
                },
                notify::Config::default(),
            );
            if let Ok(mut w) = created {
                if w.watch(&parent, RecursiveMode::NonRecursive).is_ok() {
                    watcher = Some(w);
                }
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        let poll = POLL_INTERVAL.min(deadline - now);

        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            _ = rx.recv() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_existing_file_resolves_immediately() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cam.m3u8");
        std::fs::write(&path, "#EXTM3U").unwrap();

        assert!(wait_for_artifact(&path, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_file_appearing_late_resolves() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cam.m3u8");

        let write_path = path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            std::fs::write(&write_path, "#EXTM3U").unwrap();
        });

        assert!(wait_for_artifact(&path, Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_parent_directory_created_late() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("session");
        let path = sub.join("cam.m3u8");

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            std::fs::create_dir_all(&sub).unwrap();
            std::fs::write(sub.join("cam.m3u8"), "#EXTM3U").unwrap();
        });

        assert!(wait_for_artifact(&path, Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_timeout_returns_false() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("never.m3u8");

        let start = std::time::Instant::now();
        assert!(!wait_for_artifact(&path, Duration::from_millis(400)).await);
        assert!(start.elapsed() >= Duration::from_millis(400));
    }
}
