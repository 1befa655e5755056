use std::sync::Arc;
use stream_session::{SessionRegistry, SessionTuning};

/// Shared state for all HTTP handlers.
pub struct ServerState {
    /// Authoritative map of active sessions
    pub registry: Arc<SessionRegistry>,
    /// Shared secret gating manifest retrieval
    pub access_key: String,
    /// Tunables applied to every session started over HTTP
    pub tuning: SessionTuning,
}

impl ServerState {
    pub fn new(registry: Arc<SessionRegistry>, access_key: impl Into<String>) -> Self {
        Self {
            registry,
            access_key: access_key.into(),
            tuning: SessionTuning::default(),
        }
    }

    pub fn with_tuning(mut self, tuning: SessionTuning) -> Self {
        self.tuning = tuning;
        self
    }
}
