use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Dispatch policy selected for a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// One request per tick until `duration` elapses.
    Interval,
    /// `workerNumber` workers drain `totalRequests` jobs.
    #[default]
    Quota,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub total_requests: usize,
    pub post_ratio: f64,
    #[serde(rename = "baseURL")]
    pub base_url: String,
    pub worker_number: usize,
    /// Per-request timeout in seconds.
    pub timeout: u64,
    /// Run length in seconds, interval mode only.
    pub duration: u64,
    pub interval_ms: u64,
    pub batch_size: usize,
    pub seed: Option<u64>,
    pub mode: RunMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            total_requests: 100,
            post_ratio: 0.7,
            base_url: "localhost:8080".to_string(),
            worker_number: 10,
            timeout: 5,
            duration: 30,
            interval_ms: 100,
            batch_size: 10,
            seed: None,
            mode: RunMode::Quota,
        }
    }
}

impl Config {
    /// Read and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults unless
    /// the caller named the file explicitly.
    pub fn load_or_default(path: impl AsRef<Path>, explicit: bool) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !explicit && !path.exists() {
            tracing::info!("no config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        if self.total_requests == 0 {
            return invalid("totalRequests must be greater than 0");
        }
        if !(0.0..=1.0).contains(&self.post_ratio) {
            return invalid("postRatio must be between 0 and 1");
        }
        if self.endpoint().is_empty() {
            return invalid("baseURL cannot be empty");
        }
        if self.worker_number == 0 {
            return invalid("workerNumber must be greater than 0");
        }
        if self.timeout == 0 {
            return invalid("timeout must be greater than 0");
        }
        if self.interval_ms == 0 {
            return invalid("intervalMs must be greater than 0");
        }
        if self.batch_size == 0 {
            return invalid("batchSize must be greater than 0");
        }
        if self.mode == RunMode::Interval && self.duration == 0 {
            return invalid("duration must be greater than 0 in interval mode");
        }
        Ok(())
    }

    /// Base endpoint as a bare `host:port`, the same form servers report
    /// in `host_ip`.
    pub fn endpoint(&self) -> String {
        let trimmed = self.base_url.trim();
        let bare = trimmed
            .strip_prefix("http://")
            .or_else(|| trimmed.strip_prefix("https://"))
            .unwrap_or(trimmed);
        bare.trim_end_matches('/').to_string()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}
