use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Webcam source URL not set")]
    MissingSourceUrl,
    #[error("Unknown session category: {0}")]
    UnknownCategory(String),
}

/// What a session does with the transcoded output.
///
/// `Record` keeps rotating segments in a dated folder under the camera's name
/// and restarts the transcoder whenever it dies. `Stream` serves a transient
/// on-demand view from a folder named after the session id; once explicitly
/// stopped it is never restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionCategory {
    Record,
    Stream,
}

impl FromStr for SessionCategory {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "record" => Ok(SessionCategory::Record),
            "stream" => Ok(SessionCategory::Stream),
            other => Err(ConfigError::UnknownCategory(other.to_string())),
        }
    }
}

/// Server-level tunables shared by every session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTuning {
    /// Transcoder binary to invoke (default: "ffmpeg")
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    /// Maximum session lifetime in seconds (default: 600)
    #[serde(default = "default_time_limit_secs")]
    pub time_limit_secs: u64,
    /// Duration of each HLS segment in seconds (default: 3)
    #[serde(default = "default_segment_seconds")]
    pub segment_seconds: u32,
    /// Number of segments kept in the playlist window (default: 10)
    #[serde(default = "default_playlist_size")]
    pub playlist_size: u32,
    /// How long to wait for the first manifest to appear (default: 10000)
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Pause between a process exit and its restart (default: 5)
    #[serde(default = "default_restart_backoff_secs")]
    pub restart_backoff_secs: u64,
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_time_limit_secs() -> u64 {
    600
}

fn default_segment_seconds() -> u32 {
    3
}

fn default_playlist_size() -> u32 {
    10
}

fn default_probe_timeout_ms() -> u64 {
    10_000
}

fn default_restart_backoff_secs() -> u64 {
    5
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            time_limit_secs: default_time_limit_secs(),
            segment_seconds: default_segment_seconds(),
            playlist_size: default_playlist_size(),
            probe_timeout_ms: default_probe_timeout_ms(),
            restart_backoff_secs: default_restart_backoff_secs(),
        }
    }
}

/// Configuration for one transcoding session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upstream feed locator (RTSP/HTTP URL)
    pub source_url: String,
    /// Camera name, used in Record directory paths
    pub name: Option<String>,
    pub category: SessionCategory,
    pub tuning: SessionTuning,
}

impl SessionConfig {
    /// Create a config with default tuning and category Stream.
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            name: None,
            category: SessionCategory::Stream,
            tuning: SessionTuning::default(),
        }
    }

    pub fn with_category(mut self, category: SessionCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_tuning(mut self, tuning: SessionTuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn with_time_limit_secs(mut self, secs: u64) -> Self {
        self.tuning.time_limit_secs = secs;
        self
    }

    /// Check the config is usable before any side effect happens.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_url.trim().is_empty() {
            return Err(ConfigError::MissingSourceUrl);
        }
        Ok(())
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.tuning.time_limit_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.tuning.probe_timeout_ms)
    }

    pub fn restart_backoff(&self) -> Duration {
        Duration::from_secs(self.tuning.restart_backoff_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_url_rejected() {
        let config = SessionConfig::new("");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingSourceUrl)
        ));

        let config = SessionConfig::new("   ");
        assert!(config.validate().is_err());

        let config = SessionConfig::new("rtsp://cam/stream");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!(
            "record".parse::<SessionCategory>().unwrap(),
            SessionCategory::Record
        );
        assert_eq!(
            "Stream".parse::<SessionCategory>().unwrap(),
            SessionCategory::Stream
        );
        assert!("live".parse::<SessionCategory>().is_err());
    }

    #[test]
    fn test_tuning_defaults() {
        let tuning = SessionTuning::default();
        assert_eq!(tuning.time_limit_secs, 600);
        assert_eq!(tuning.segment_seconds, 3);
        assert_eq!(tuning.playlist_size, 10);
        assert_eq!(tuning.restart_backoff_secs, 5);
    }
}
