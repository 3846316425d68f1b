use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP method of a planned request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkKind {
    Get,
    Post,
}

impl WorkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkKind::Get => "GET",
            WorkKind::Post => "POST",
        }
    }
}

impl fmt::Display for WorkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One planned request. Consumed exactly once by the executor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkItem {
    pub kind: WorkKind,
    pub sequence_index: usize,
}

impl WorkItem {
    pub fn new(kind: WorkKind, sequence_index: usize) -> Self {
        Self {
            kind,
            sequence_index,
        }
    }
}

/// Synthetic message attached to every request, kept in the results log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub content: String,
    pub method: WorkKind,
    pub timestamp: DateTime<Utc>,
}

/// Body shape returned by the target server for a stored message.
///
/// Only `host_ip` matters to the engine; the other fields are tolerated
/// so that partial bodies still yield a host.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub host_ip: String,
}

/// Recorded result of executing one [`WorkItem`].
#[derive(Clone, Debug, Serialize)]
pub struct RequestOutcome {
    pub message: Message,
    pub success: bool,
    #[serde(rename = "response_time_ms")]
    pub latency_ms: f64,
    #[serde(skip)]
    pub sequence_index: usize,
}

impl RequestOutcome {
    pub fn kind(&self) -> WorkKind {
        self.message.method
    }

    pub fn generated_id(&self) -> &str {
        &self.message.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.message.timestamp
    }
}

/// Running counters plus the raw result log of a run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct AggregateStats {
    #[serde(rename = "total_requests")]
    pub total: usize,
    pub successful_posts: usize,
    pub failed_posts: usize,
    pub successful_gets: usize,
    pub failed_gets: usize,
    #[serde(rename = "total_response_time_ms")]
    pub total_latency_ms: f64,
    pub results: Vec<RequestOutcome>,
}

impl AggregateStats {
    pub fn average_latency_ms(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.total_latency_ms / self.total as f64)
        }
    }

    pub fn successful(&self) -> usize {
        self.successful_posts + self.successful_gets
    }

    pub fn failed(&self) -> usize {
        self.failed_posts + self.failed_gets
    }

    /// Fraction of successful requests in `[0, 1]`; zero for an empty run.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successful() as f64 / self.total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(kind: WorkKind, success: bool) -> RequestOutcome {
        RequestOutcome {
            message: Message {
                id: "msg-1".to_string(),
                content: String::new(),
                method: kind,
                timestamp: Utc::now(),
            },
            success,
            latency_ms: 12.0,
            sequence_index: 0,
        }
    }

    #[test]
    fn outcome_serializes_with_report_field_names() {
        let value = serde_json::to_value(outcome(WorkKind::Get, true)).unwrap();
        assert_eq!(value["message"]["method"], "GET");
        assert_eq!(value["response_time_ms"], 12.0);
        assert_eq!(value["message"]["content"], "");
        assert!(value.get("sequence_index").is_none());
    }

    #[test]
    fn response_tolerates_missing_fields() {
        let parsed: MessageResponse = serde_json::from_str(r#"{"host_ip":"10.0.0.2:8080"}"#).unwrap();
        assert_eq!(parsed.host_ip, "10.0.0.2:8080");
        assert_eq!(parsed.id, 0);
    }

    #[test]
    fn empty_stats_have_no_average() {
        let stats = AggregateStats::default();
        assert_eq!(stats.average_latency_ms(), None);
        assert_eq!(stats.success_rate(), 0.0);
    }
}
