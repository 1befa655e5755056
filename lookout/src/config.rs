use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use stream_session::SessionTuning;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFailed(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    ParseFailed(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    /// Root directory for session output (streams/, recordings/)
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,
    /// Shared secret gating manifest requests; empty rejects everything
    #[serde(default)]
    pub access_key: String,
    /// Per-session tunables
    #[serde(default)]
    pub session: SessionTuning,
}

fn default_bind() -> SocketAddr {
    "0.0.0.0:3978".parse().expect("valid default bind address")
}

fn default_media_root() -> PathBuf {
    PathBuf::from("media")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            media_root: default_media_root(),
            access_key: String::new(),
            session: SessionTuning::default(),
        }
    }
}

impl ServerConfig {
    pub fn read_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.bind, "0.0.0.0:3978".parse::<SocketAddr>().unwrap());
        assert_eq!(config.media_root, PathBuf::from("media"));
        assert!(config.access_key.is_empty());
        assert_eq!(config.session.segment_seconds, 3);
    }

    #[test]
    fn test_partial_config_parses() {
        let config: ServerConfig = toml::from_str(
            r#"
            bind = "127.0.0.1:8080"
            access_key = "secret"

            [session]
            time_limit_secs = 300
            "#,
        )
        .unwrap();
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.access_key, "secret");
        assert_eq!(config.session.time_limit_secs, 300);
        // Unset tunables keep their defaults
        assert_eq!(config.session.restart_backoff_secs, 5);
    }

    #[test]
    fn test_read_missing_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = ServerConfig::read_from_file(&dir.path().join("nope.toml"));
        assert!(matches!(err, Err(ConfigError::ReadFailed(_))));
    }
}
