//! HTTP surface: session control (`/start`, `/stop`) and content serving
//! (`/play/{id}/{file}`).
//!
//! The content server only ever reads files. It resolves a request to a path
//! under the streams root, so a manifest or segment stays fetchable for as
//! long as the session directory exists, independent of the session's
//! internal state. A file vanishing between the existence check and the open
//! (a teardown racing a request) is a stream error, never a crash.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tower_http::compression::{predicate::Predicate, CompressionLayer};
use uuid::Uuid;

use crate::error::HlsError;
use crate::state::ServerState;
use stream_session::{SessionConfig, SessionError};

pub const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
pub const SEGMENT_CONTENT_TYPE: &str = "video/MP2T";

/// Compress playlists only. Segments are already-compressed video and are
/// always piped raw, whatever the client advertises.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompressManifestOnly;

impl Predicate for CompressManifestOnly {
    fn should_compress<B>(&self, response: &axum::http::Response<B>) -> bool
    where
        B: http_body::Body,
    {
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.as_bytes() == MANIFEST_CONTENT_TYPE.as_bytes())
            .unwrap_or(false)
    }
}

/// Create the router with all endpoints.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/ping", get(ping_handler))
        .route("/start", get(start_handler))
        .route("/stop", get(stop_handler))
        .route("/play/{id}/{file}", get(play_handler))
        .layer(CompressionLayer::new().compress_when(CompressManifestOnly))
        .with_state(state)
}

async fn ping_handler() -> Json<Value> {
    Json(json!({ "success": "true", "data": { "reply": "pong" } }))
}

#[derive(Debug, Deserialize)]
struct StartParams {
    url: Option<String>,
    category: Option<String>,
    name: Option<String>,
    time_limit: Option<u64>,
}

/// Start a session. Config errors and startup failures (spawn failed, no
/// manifest within the probe window) surface here as 500 with the error in
/// the body; on success the caller gets the session id to play against.
async fn start_handler(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<StartParams>,
) -> Result<Json<Value>, HlsError> {
    let mut config = SessionConfig::new(params.url.unwrap_or_default())
        .with_tuning(state.tuning.clone());

    if let Some(category) = &params.category {
        let category = category
            .parse()
            .map_err(|e| HlsError::Session(SessionError::Config(e)))?;
        config = config.with_category(category);
    }
    if let Some(name) = params.name {
        config = config.with_name(name);
    }
    if let Some(secs) = params.time_limit {
        config = config.with_time_limit_secs(secs);
    }

    let id = state.registry.create(config).await?;
    Ok(Json(json!({ "id": id })))
}

#[derive(Debug, Deserialize)]
struct StopParams {
    id: Option<String>,
}

/// Stop a session. Always 200: stopping an unknown, malformed or
/// already-stopped id is reported in the body, not as an error.
async fn stop_handler(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<StopParams>,
) -> Json<Value> {
    let id = params.id.unwrap_or_default();
    let stopped = match Uuid::parse_str(&id) {
        Ok(uuid) => state.registry.stop(uuid).await,
        Err(_) => false,
    };

    let message = if stopped {
        format!("Stopped stream: {id}")
    } else {
        format!("Unable to stop stream: {id}")
    };
    tracing::info!("{} active session(s)", state.registry.active_count().await);

    Json(json!({ "data": message }))
}

#[derive(Debug, Deserialize)]
struct PlayParams {
    #[serde(rename = "ClientAccessKey")]
    client_access_key: Option<String>,
}

async fn play_handler(
    State(state): State<Arc<ServerState>>,
    Path((id, file)): Path<(String, String)>,
    Query(params): Query<PlayParams>,
) -> Result<Response, HlsError> {
    let not_found = || HlsError::NotFound(format!("Stream does not exist: {id}/{file}"));

    if !is_safe_component(&id) || !is_safe_component(&file) {
        return Err(not_found());
    }

    let path = state.registry.streams_dir().join(&id).join(&file);
    if !path.is_file() {
        return Err(not_found());
    }

    let extension = std::path::Path::new(&file)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    match extension {
        "m3u8" => {
            // The key is checked before the manifest is ever opened. An
            // unconfigured (empty) key rejects every manifest request
            // rather than matching an empty query value.
            let authorized = !state.access_key.is_empty()
                && params.client_access_key.as_deref() == Some(state.access_key.as_str());
            if !authorized {
                return Err(HlsError::Auth);
            }
            serve_file(&path, MANIFEST_CONTENT_TYPE).await
        }
        // Segment URLs are treated as already authorized via the manifest
        // that referenced them.
        "ts" => serve_file(&path, SEGMENT_CONTENT_TYPE).await,
        _ => Err(not_found()),
    }
}

async fn serve_file(
    path: &std::path::Path,
    content_type: &'static str,
) -> Result<Response, HlsError> {
    let file = tokio::fs::File::open(path).await.map_err(HlsError::Stream)?;
    let stream = ReaderStream::new(file);

    Ok((
        [(header::CONTENT_TYPE, content_type)],
        Body::from_stream(stream),
    )
        .into_response())
}

/// A single path component supplied by the client: no traversal, no
/// separators.
fn is_safe_component(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && !s.contains("..")
        && !s.contains('/')
        && !s.contains('\\')
}


#[cfg(all(test, unix))]
mod e2e_tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::{Request, StatusCode};
    use std::os::unix::fs::PermissionsExt;
    use stream_session::{SessionRegistry, SessionTuning};
    use tempfile::TempDir;
    use tower::ServiceExt;

    /// Fake ffmpeg: writes the manifest (last argument) and keeps running.
    fn fake_transcoder(dir: &std::path::Path) -> String {
        let path = dir.join("fake-ffmpeg.sh");
        let body = r#"#!/bin/sh
for a in "$@"; do out="$a"; done
printf '#EXTM3U\n' > "$out"
exec sleep 60
"#;
        std::fs::write(&path, body).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_start_play_stop_roundtrip() {
        let temp = TempDir::new().unwrap();
        let registry = Arc::new(SessionRegistry::new(temp.path().join("media")));
        let tuning = SessionTuning {
            ffmpeg_path: fake_transcoder(temp.path()),
            ..SessionTuning::default()
        };
        let state = Arc::new(ServerState::new(registry, "secret").with_tuning(tuning));

        let start = router(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/start?url=rtsp%3A%2F%2Fcam%2Fstream&category=stream&time_limit=600")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(start.status(), StatusCode::OK);
        let body = to_bytes(start.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        let id = json["id"].as_str().unwrap().to_string();

        let play = router(state.clone())
            .oneshot(
                Request::builder()
                    .uri(format!("/play/{id}/cam.m3u8?ClientAccessKey=secret"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(play.status(), StatusCode::OK);
        assert_eq!(
            play.headers().get(header::CONTENT_TYPE).unwrap(),
            MANIFEST_CONTENT_TYPE
        );
        let body = to_bytes(play.into_body(), usize::MAX).await.unwrap();
        assert!(body.starts_with(b"#EXTM3U"));

        let stop = router(state.clone())
            .oneshot(
                Request::builder()
                    .uri(format!("/stop?id={id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(stop.status(), StatusCode::OK);

        // The directory is gone; any further play is a 404.
        let replay = router(state.clone())
            .oneshot(
                Request::builder()
                    .uri(format!("/play/{id}/cam.m3u8?ClientAccessKey=secret"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(replay.status(), StatusCode::NOT_FOUND);
    }
}
