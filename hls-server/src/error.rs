use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use stream_session::SessionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HlsError {
    #[error("There was a problem authenticating you.")]
    Auth,

    #[error("Stream does not exist: {0}")]
    NotFound(String),

    #[error("Stream error: {0}")]
    Stream(std::io::Error),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl IntoResponse for HlsError {
    fn into_response(self) -> Response {
        tracing::warn!("HLS error: {}", self);

        match self {
            HlsError::Auth => (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": 401,
                    "data": "There was a problem authenticating you.",
                })),
            )
                .into_response(),
            // Diagnostic bodies name the stream, never internal paths.
            HlsError::NotFound(what) => (StatusCode::NOT_FOUND, what).into_response(),
            HlsError::Stream(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string()).into_response()
            }
            HlsError::Session(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response(),
        }
    }
}
