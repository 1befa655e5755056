//! One managed lifecycle of source feed to segmented HLS output.
//!
//! A session exclusively owns one external transcoder process and its output
//! directory. All lifecycle events for a session (process exit, deadline
//! fire, explicit stop) are handled by a single `select!` loop, so state
//! transitions within a session are totally ordered. Stop, timeout and
//! unexpected exit all converge on the same teardown path.

use chrono::Local;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::config::{SessionCategory, SessionConfig};
use crate::error::StartupError;
use crate::probe::wait_for_artifact;
use crate::registry::SessionRegistry;
use crate::supervisor::Deadline;

/// Name of the playlist the transcoder writes, and the probe waits for.
pub const MANIFEST_NAME: &str = "cam.m3u8";

/// Dated folder format for Record sessions, e.g. `7-Mar-2026`.
const DATE_FORMAT: &str = "%-d-%b-%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Starting,
    Probing,
    Active,
    Restarting,
    Stopping,
    Terminated,
}

#[derive(Debug, Clone, Copy)]
pub enum SessionCommand {
    Stop,
}

/// What the registry stores for an active session.
///
/// Holds no process state: the process and directory are owned by the
/// session's event loop, reachable only through the command channel.
#[derive(Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    pub category: SessionCategory,
    pub directory: PathBuf,
    pub(crate) cmd_tx: mpsc::Sender<SessionCommand>,
    pub(crate) status_rx: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    pub fn status(&self) -> SessionStatus {
        *self.status_rx.borrow()
    }

    /// Wait until the session reaches Terminated. Resolves immediately if the
    /// session loop is already gone.
    pub async fn wait_terminated(&self) {
        let mut rx = self.status_rx.clone();
        loop {
            if *rx.borrow() == SessionStatus::Terminated {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

pub(crate) struct Session {
    id: Uuid,
    config: SessionConfig,
    directory: PathBuf,
    child: Option<Child>,
    disable_restart: bool,
    status_tx: watch::Sender<SessionStatus>,
}

impl Session {
    pub(crate) fn new(root: &Path, config: SessionConfig) -> Self {
        let id = Uuid::new_v4();
        let directory = match config.category {
            SessionCategory::Record => {
                let name = config.name.as_deref().unwrap_or("camera");
                root.join("recordings")
                    .join(name)
                    .join(Local::now().format(DATE_FORMAT).to_string())
            }
            SessionCategory::Stream => root.join("streams").join(id.to_string()),
        };
        let (status_tx, _) = watch::channel(SessionStatus::Idle);

        Self {
            id,
            config,
            directory,
            child: None,
            disable_restart: false,
            status_tx,
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn directory(&self) -> &Path {
        &self.directory
    }

    pub(crate) fn handle(&self, cmd_tx: mpsc::Sender<SessionCommand>) -> SessionHandle {
        SessionHandle {
            id: self.id,
            category: self.config.category,
            directory: self.directory.clone(),
            cmd_tx,
            status_rx: self.status_tx.subscribe(),
        }
    }

    fn manifest_path(&self) -> PathBuf {
        self.directory.join(MANIFEST_NAME)
    }

    fn set_status(&self, status: SessionStatus) {
        self.status_tx.send_replace(status);
    }

    /// Create the directory, spawn the transcoder and wait for the first
    /// manifest. Failures are cleaned up here and surfaced to the caller;
    /// nothing is left behind on disk or in the process table.
    ///
    /// The returned deadline is armed before the probe runs: the time limit
    /// is a hard ceiling on the session regardless of probe outcome.
    pub(crate) async fn start(&mut self) -> Result<Deadline, StartupError> {
        self.set_status(SessionStatus::Starting);
        let deadline = Deadline::arm(self.config.time_limit());

        tokio::fs::create_dir_all(&self.directory).await?;

        match self.spawn_transcoder() {
            Ok(child) => self.child = Some(child),
            Err(e) => {
                self.fail_startup().await;
                return Err(StartupError::Spawn(e));
            }
        }

        self.set_status(SessionStatus::Probing);
        let manifest = self.manifest_path();
        tracing::debug!(id = %self.id, path = %manifest.display(), "Waiting for first manifest");

        if !wait_for_artifact(&manifest, self.config.probe_timeout()).await {
            self.fail_startup().await;
            return Err(StartupError::ArtifactTimeout {
                path: manifest,
                waited_ms: self.config.tuning.probe_timeout_ms,
            });
        }

        self.set_status(SessionStatus::Active);
        tracing::info!(id = %self.id, dir = %self.directory.display(), "Session active");
        Ok(deadline)
    }

    fn spawn_transcoder(&self) -> std::io::Result<Child> {
        let tuning = &self.config.tuning;
        let mut cmd = Command::new(&tuning.ffmpeg_path);
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("warning")
            .arg("-i")
            .arg(&self.config.source_url)
            .arg("-c")
            .arg("copy")
            .arg("-f")
            .arg("hls")
            .arg("-hls_time")
            .arg(tuning.segment_seconds.to_string())
            .arg("-hls_list_size")
            .arg(tuning.playlist_size.to_string());

        // Record appends across restarts so the dated folder stays one
        // continuous recording; both categories rotate old segments away.
        match self.config.category {
            SessionCategory::Record => {
                cmd.arg("-hls_flags").arg("delete_segments+append_list");
            }
            SessionCategory::Stream => {
                cmd.arg("-hls_flags").arg("delete_segments");
            }
        }

        cmd.arg(self.manifest_path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        cmd.spawn()
    }

    /// Event loop: owns the session after a successful start. Every
    /// transition is driven from this one select, so stop-by-timeout and
    /// stop-by-request cannot race into double cleanup.
    pub(crate) async fn supervise(
        mut self,
        mut cmd_rx: mpsc::Receiver<SessionCommand>,
        mut deadline: Deadline,
        registry: Arc<SessionRegistry>,
    ) {
        loop {
            let child = match self.child.as_mut() {
                Some(child) => child,
                None => break,
            };

            tokio::select! {
                _ = deadline.fired() => {
                    tracing::info!(id = %self.id, "Time limit reached, stopping session");
                    self.disable_restart = true;
                    break;
                }
                cmd = cmd_rx.recv() => {
                    // None means every handle is gone; treat like a stop.
                    match cmd {
                        Some(SessionCommand::Stop) | None => {
                            self.disable_restart = true;
                            break;
                        }
                    }
                }
                status = child.wait() => {
                    match status {
                        Ok(code) => {
                            tracing::warn!(id = %self.id, %code, "Transcoder exited")
                        }
                        Err(e) => {
                            tracing::warn!(id = %self.id, error = %e, "Transcoder wait failed")
                        }
                    }
                    self.child = None;
                    if self.disable_restart {
                        break;
                    }
                    if !self.restart(&mut cmd_rx, &mut deadline).await {
                        break;
                    }
                }
            }
        }

        self.teardown(&registry).await;
    }

    /// Restart-on-unexpected-exit policy: fixed backoff, unlimited retries.
    /// No retry cap matches the observed behavior of the system this
    /// replaces; an unreachable source will keep cycling here until the
    /// deadline fires or a stop arrives. Returns false when interrupted.
    async fn restart(
        &mut self,
        cmd_rx: &mut mpsc::Receiver<SessionCommand>,
        deadline: &mut Deadline,
    ) -> bool {
        loop {
            self.set_status(SessionStatus::Restarting);

            tokio::select! {
                _ = tokio::time::sleep(self.config.restart_backoff()) => {}
                _ = deadline.fired() => {
                    self.disable_restart = true;
                    return false;
                }
                _ = cmd_rx.recv() => {
                    self.disable_restart = true;
                    return false;
                }
            }

            // Same id, same directory: a Record session keeps appending to
            // the dated folder it started with.
            if let Err(e) = tokio::fs::create_dir_all(&self.directory).await {
                tracing::warn!(id = %self.id, error = %e, "Failed to recreate session directory");
                continue;
            }

            match self.spawn_transcoder() {
                Ok(child) => {
                    self.child = Some(child);
                    deadline.rearm(self.config.time_limit());
                    self.set_status(SessionStatus::Probing);
                    if wait_for_artifact(&self.manifest_path(), self.config.probe_timeout()).await
                    {
                        self.set_status(SessionStatus::Active);
                        tracing::info!(id = %self.id, "Session restarted");
                        return true;
                    }
                    // Respawned process produced nothing; kill it and retry.
                    if let Some(mut child) = self.child.take() {
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                    }
                }
                Err(e) => {
                    tracing::warn!(id = %self.id, error = %e, "Respawn failed, retrying");
                }
            }
        }
    }

    /// Startup failed: kill whatever was spawned and remove the directory so
    /// no trace of the session remains.
    async fn fail_startup(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
        self.remove_directory().await;
        self.set_status(SessionStatus::Terminated);
    }

    /// Converging teardown for stop, timeout and terminal process exit.
    /// Kill is idempotent (already-dead errors ignored) and directory
    /// removal is best-effort: cleanup never blocks forward progress.
    async fn teardown(&mut self, registry: &Arc<SessionRegistry>) {
        self.set_status(SessionStatus::Stopping);

        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }

        self.remove_directory().await;
        registry.remove(self.id).await;
        self.set_status(SessionStatus::Terminated);
        tracing::info!(id = %self.id, "Session terminated");
    }

    async fn remove_directory(&self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.directory).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    id = %self.id,
                    dir = %self.directory.display(),
                    error = %e,
                    "Failed to remove session directory"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_directory_layout_per_category() {
        let dir = TempDir::new().unwrap();

        let stream = Session::new(
            dir.path(),
            SessionConfig::new("rtsp://cam/stream"),
        );
        assert_eq!(
            stream.directory,
            dir.path().join("streams").join(stream.id().to_string())
        );

        let record = Session::new(
            dir.path(),
            SessionConfig::new("rtsp://cam/stream")
                .with_category(SessionCategory::Record)
                .with_name("garden"),
        );
        let parent = record.directory.parent().unwrap().parent().unwrap();
        assert_eq!(parent, dir.path().join("recordings"));
        assert!(record.directory.to_string_lossy().contains("garden"));
    }

    #[test]
    fn test_ids_are_unique() {
        let dir = TempDir::new().unwrap();
        let a = Session::new(dir.path(), SessionConfig::new("rtsp://cam"));
        let b = Session::new(dir.path(), SessionConfig::new("rtsp://cam"));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_manifest_path_under_session_directory() {
        let dir = TempDir::new().unwrap();
        let session = Session::new(dir.path(), SessionConfig::new("rtsp://cam"));
        assert_eq!(session.manifest_path(), session.directory.join(MANIFEST_NAME));
    }
}
