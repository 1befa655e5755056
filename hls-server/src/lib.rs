//! HTTP Live Streaming server over managed transcoding sessions.
//!
//! Exposes the session lifecycle and the on-disk HLS output over HTTP:
//!
//! | Endpoint | Description |
//! |----------|-------------|
//! | `GET /start?url=<feed>&category=<record\|stream>` | Start a session, returns `{"id": ...}` |
//! | `GET /stop?id=<id>` | Stop a session (always 200, idempotent) |
//! | `GET /play/<id>/cam.m3u8?ClientAccessKey=<key>` | Playlist, access-key gated, gzip negotiated |
//! | `GET /play/<id>/<segment>.ts` | Media segment |
//! | `GET /ping` | Health check |
//!
//! # Usage
//!
//! ```rust,ignore
//! use hls_server::{routes::router, ServerState};
//! use std::sync::Arc;
//! use stream_session::SessionRegistry;
//!
//! let registry = Arc::new(SessionRegistry::new("media"));
//! let state = Arc::new(ServerState::new(registry, access_key));
//! let app = router(state);
//! ```

pub mod error;
pub mod routes;
mod state;

pub use error::HlsError;
pub use routes::{router, MANIFEST_CONTENT_TYPE, SEGMENT_CONTENT_TYPE};
pub use state::ServerState;
