//! Authoritative map of active sessions.
//!
//! The registry is an explicit, injected object (never a global). All
//! mutating operations are serialized through its mutex, so a stop arriving
//! from a timeout and a stop arriving from an HTTP request cannot both tear
//! down the same session: the second caller observes not-found and exits
//! silently. Directory bookkeeping is driven exclusively through session
//! teardown, never by the registry itself.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::session::{Session, SessionCommand, SessionHandle};

pub struct SessionRegistry {
    root: PathBuf,
    sessions: Mutex<HashMap<Uuid, SessionHandle>>,
}

impl SessionRegistry {
    /// Create a registry rooted at the given media directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where Stream session directories live, keyed by session id.
    pub fn streams_dir(&self) -> PathBuf {
        self.root.join("streams")
    }

    /// Validate the config, bring the session up and register it.
    ///
    /// Spawn failures and probe timeouts are surfaced here, synchronously;
    /// a failed start leaves no registry entry, no directory and no process.
    pub async fn create(self: &Arc<Self>, config: SessionConfig) -> Result<Uuid, SessionError> {
        config.validate()?;

        let mut session = Session::new(&self.root, config);
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let handle = session.handle(cmd_tx);
        let id = handle.id;

        // Reserve the directory under the lock before anything touches the
        // filesystem. A session's directory is exclusively owned: a second
        // Record session for the same camera and date would otherwise share
        // it, and either teardown would delete the other's live output.
        {
            let mut sessions = self.sessions.lock().await;
            if sessions.values().any(|h| h.directory == handle.directory) {
                return Err(SessionError::DirectoryInUse(handle.directory));
            }
            sessions.insert(id, handle);
        }

        match session.start().await {
            Ok(deadline) => {
                tokio::spawn(session.supervise(cmd_rx, deadline, Arc::clone(self)));
                tracing::info!("{} active session(s)", self.active_count().await);
                Ok(id)
            }
            Err(e) => {
                self.remove(id).await;
                Err(e.into())
            }
        }
    }

    /// Look up a live session. Terminated sessions are gone from the map;
    /// stale ids resolve to `None`, never to a resurrected session.
    pub async fn lookup(&self, id: Uuid) -> Option<SessionHandle> {
        self.sessions.lock().await.get(&id).cloned()
    }

    /// Ask a session to stop and wait for its teardown to finish.
    ///
    /// Idempotent: stopping an unknown or already-stopped id is a no-op
    /// returning false.
    pub async fn stop(&self, id: Uuid) -> bool {
        let handle = match self.lookup(id).await {
            Some(handle) => handle,
            None => return false,
        };

        // A send failure means the loop is already tearing down; either way
        // waiting on the status channel observes Terminated.
        let _ = handle.cmd_tx.send(SessionCommand::Stop).await;
        handle.wait_terminated().await;
        true
    }

    /// Erase a registry entry. Called by session teardown; removing an id
    /// that is already gone is a no-op.
    pub(crate) async fn remove(&self, id: Uuid) {
        self.sessions.lock().await.remove(&id);
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Stop every session. Used by graceful shutdown so no transcoder
    /// process or session directory outlives the server.
    pub async fn shutdown(&self) {
        let ids: Vec<Uuid> = self.sessions.lock().await.keys().copied().collect();
        for id in ids {
            self.stop(id).await;
        }
    }
}
