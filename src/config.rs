use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{error::EngineError, recognition::RecognitionPolicy};

pub const TOKEN_ENV: &str = "ATTENDANCE_BACKEND_TOKEN";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    pub poll_interval_secs: u64,
    pub capture_interval_secs: u64,
    pub grab_timeout_secs: u64,
    pub recognition_timeout_secs: u64,
    pub result_display_secs: u64,
    pub late_after_minutes: i64,
    pub live_log_capacity: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            capture_interval_secs: 30,
            grab_timeout_secs: 10,
            recognition_timeout_secs: 15,
            result_display_secs: 3,
            late_after_minutes: 30,
            live_log_capacity: 10,
        }
    }
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn capture_interval(&self) -> Duration {
        Duration::from_secs(self.capture_interval_secs)
    }

    pub fn grab_timeout(&self) -> Duration {
        Duration::from_secs(self.grab_timeout_secs)
    }

    pub fn recognition_timeout(&self) -> Duration {
        Duration::from_secs(self.recognition_timeout_secs)
    }

    pub fn result_display(&self) -> Duration {
        Duration::from_secs(self.result_display_secs)
    }

    pub fn late_after(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.late_after_minutes)
    }
}

/// Where the timetable, session store and roster come from.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Remote,
    Local,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            token: None,
            request_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    pub snapshot_url: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            snapshot_url: "http://127.0.0.1:8080/snapshot.jpg".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("attendance.db"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub timing: TimingConfig,
    pub policy: RecognitionPolicy,
    pub source: SourceConfig,
    pub backend: BackendConfig,
    pub camera: CameraConfig,
    pub database: DatabaseConfig,
}

impl EngineConfig {
    /// Reads `path` if it exists, otherwise starts from defaults. The backend
    /// token falls back to the environment when the file has none.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config from {}", path.display()))?;
                Self::from_toml(&contents)
                    .with_context(|| format!("invalid config in {}", path.display()))?
            }
            _ => Self::default(),
        };

        if config.backend.token.is_none() {
            config.backend.token = std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty());
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse TOML")
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let timing = &self.timing;
        let intervals = [
            ("timing.poll_interval_secs", timing.poll_interval_secs),
            ("timing.capture_interval_secs", timing.capture_interval_secs),
            ("timing.grab_timeout_secs", timing.grab_timeout_secs),
            ("timing.recognition_timeout_secs", timing.recognition_timeout_secs),
            ("backend.request_timeout_secs", self.backend.request_timeout_secs),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, value)| *value == 0) {
            return Err(EngineError::Config(format!("{name} must be greater than zero")));
        }
        if timing.live_log_capacity == 0 {
            return Err(EngineError::Config(
                "timing.live_log_capacity must be greater than zero".into(),
            ));
        }
        if timing.late_after_minutes < 0 {
            return Err(EngineError::Config(
                "timing.late_after_minutes cannot be negative".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.policy.min_confidence) {
            return Err(EngineError::Config(format!(
                "policy.min_confidence must be within [0, 1], got {}",
                self.policy.min_confidence
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.timing, TimingConfig::default());
        assert_eq!(config.source.kind, SourceKind::Remote);
        assert_eq!(config.timing.capture_interval(), Duration::from_secs(30));
        assert_eq!(config.timing.recognition_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            [timing]
            capture_interval_secs = 20

            [policy]
            min_confidence = 0.6

            [source]
            kind = "local"

            [database]
            path = "/var/lib/attendance/engine.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.timing.capture_interval_secs, 20);
        assert_eq!(config.timing.poll_interval_secs, 60);
        assert_eq!(config.policy.min_confidence, 0.6);
        assert!(!config.policy.accept_absent);
        assert_eq!(config.source.kind, SourceKind::Local);
        assert_eq!(config.database.path, PathBuf::from("/var/lib/attendance/engine.db"));
        assert_eq!(config.backend, BackendConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let zero_tick = EngineConfig::from_toml("[timing]\ncapture_interval_secs = 0").unwrap();
        assert!(matches!(zero_tick.validate(), Err(EngineError::Config(msg)) if msg.contains("capture_interval")));

        let no_log = EngineConfig::from_toml("[timing]\nlive_log_capacity = 0").unwrap();
        assert!(no_log.validate().is_err());

        let confidence = EngineConfig::from_toml("[policy]\nmin_confidence = 1.5").unwrap();
        assert!(confidence.validate().is_err());

        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[timing\npoll_interval_secs = ").unwrap();
        assert!(EngineConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn token_in_file_wins_over_environment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[backend]\ntoken = \"from-file\"").unwrap();
        let config = EngineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.backend.token.as_deref(), Some("from-file"));
    }
}
