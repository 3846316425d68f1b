//! Error types.
//!
//! [`ConfigError`] is fatal and only raised before a run starts.
//! [`RequestError`] classifies a failed request inside the executor; it is
//! logged and folded into a failed outcome, never returned to the engine.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("error reading config file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error parsing config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("request timed out")]
    Timeout,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("could not encode request body: {0}")]
    Encode(String),
}

impl RequestError {
    /// Classify a [`reqwest::Error`] into a transport failure.
    pub fn classify_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else if err.is_builder() || err.is_body() {
            Self::Encode(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connection(_) => "connection",
            Self::Status(_) => "status",
            Self::Decode(_) => "decode",
            Self::Encode(_) => "encode",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_distinct() {
        let all = [
            RequestError::Timeout.category(),
            RequestError::Connection("refused".into()).category(),
            RequestError::Status(503).category(),
            RequestError::Encode("bad".into()).category(),
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn invalid_config_message_is_readable() {
        let err = ConfigError::Invalid("postRatio must be between 0 and 1".into());
        assert_eq!(
            err.to_string(),
            "invalid configuration: postRatio must be between 0 and 1"
        );
    }
}
