//! Post-run output: console summary, server cross-check and results file.

use crate::client::MessageClient;
use crate::dispatch::RunReport;
use crate::model::{AggregateStats, MessageResponse};
use chrono::{DateTime, Utc};
use console::style;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub fn summary(report: &RunReport) -> String {
    let stats = &report.stats;
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", style("Test Results:").bold());
    let _ = writeln!(out, "Total Requests: {}", stats.total);
    let _ = writeln!(
        out,
        "Successful POST requests: {}",
        style(stats.successful_posts).green()
    );
    let _ = writeln!(out, "Failed POST requests: {}", style(stats.failed_posts).red());
    let _ = writeln!(
        out,
        "Successful GET requests: {}",
        style(stats.successful_gets).green()
    );
    let _ = writeln!(out, "Failed GET requests: {}", style(stats.failed_gets).red());
    if let Some(avg) = stats.average_latency_ms() {
        let _ = writeln!(out, "Average Response Time: {avg:.2} ms");
        let _ = writeln!(out, "Success Rate: {:.1}%", stats.success_rate() * 100.0);
    }
    if report.skipped > 0 {
        let _ = writeln!(out, "Skipped after stop: {}", report.skipped);
    }
    let ending = match report.stop_reason {
        Some(reason) => reason.to_string(),
        None => "completed".to_string(),
    };
    let _ = writeln!(
        out,
        "Finished ({ending}) after {:.2}s",
        report.elapsed.as_secs_f64()
    );
    out
}

/// Server-side view of the run, from one GET against the base endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub server_messages: usize,
    pub client_successful_posts: usize,
    pub client_successful_gets: usize,
}

impl Verification {
    pub fn render(&self) -> String {
        format!(
            "\n{}\nServer successful POST requests: {} (Client: {})\nClient successful GET requests: {}\n",
            style("Server Verification:").bold(),
            self.server_messages,
            self.client_successful_posts,
            self.client_successful_gets,
        )
    }
}

/// Ask the server how many messages it stored. Failures are logged and
/// yield `None`.
pub async fn verify<C: MessageClient>(
    client: &C,
    endpoint: &str,
    stats: &AggregateStats,
) -> Option<Verification> {
    let reply = match client.list_messages(endpoint).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!("error getting statistics from server: {e}");
            return None;
        }
    };
    if !reply.is_success() {
        tracing::warn!("server verification returned status {}", reply.status);
        return None;
    }
    match serde_json::from_str::<Vec<MessageResponse>>(&reply.body) {
        Ok(messages) => Some(Verification {
            server_messages: messages.len(),
            client_successful_posts: stats.successful_posts,
            client_successful_gets: stats.successful_gets,
        }),
        Err(e) => {
            tracing::warn!("error decoding server statistics: {e}");
            None
        }
    }
}

pub fn results_file_name(at: DateTime<Utc>) -> String {
    format!("http_test_results_{}.json", at.format("%Y%m%d_%H%M%S"))
}

/// Write `stats` as pretty JSON into `dir`, named by the current UTC time.
pub fn save_results(stats: &AggregateStats, dir: &Path) -> std::io::Result<PathBuf> {
    let path = dir.join(results_file_name(Utc::now()));
    let data = serde_json::to_vec_pretty(stats)?;
    std::fs::write(&path, data)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RequestError;
    use crate::executor::testing::{reply, FakeClient};
    use crate::model::{Message, RequestOutcome, WorkKind};
    use crate::shutdown::StopReason;
    use chrono::TimeZone;
    use std::time::Duration;

    fn stats() -> AggregateStats {
        let outcome = RequestOutcome {
            message: Message {
                id: "msg-1-0".into(),
                content: "hello".into(),
                method: WorkKind::Post,
                timestamp: Utc::now(),
            },
            success: true,
            latency_ms: 40.0,
            sequence_index: 0,
        };
        AggregateStats {
            total: 2,
            successful_posts: 1,
            failed_gets: 1,
            total_latency_ms: 50.0,
            results: vec![
                outcome.clone(),
                RequestOutcome {
                    success: false,
                    latency_ms: 10.0,
                    ..outcome
                },
            ],
            ..AggregateStats::default()
        }
    }

    #[test]
    fn summary_lists_counts_and_average() {
        console::set_colors_enabled(false);
        let report = RunReport {
            stats: stats(),
            stop_reason: Some(StopReason::Operator),
            elapsed: Duration::from_millis(1500),
            dispatched: 3,
            skipped: 1,
        };
        let text = summary(&report);
        assert!(text.contains("Total Requests: 2"));
        assert!(text.contains("Successful POST requests: 1"));
        assert!(text.contains("Failed GET requests: 1"));
        assert!(text.contains("Average Response Time: 25.00 ms"));
        assert!(text.contains("Skipped after stop: 1"));
        assert!(text.contains("stopped by operator"));
    }

    #[test]
    fn summary_of_empty_run_has_no_average() {
        let report = RunReport {
            stats: AggregateStats::default(),
            stop_reason: None,
            elapsed: Duration::ZERO,
            dispatched: 0,
            skipped: 0,
        };
        let text = summary(&report);
        assert!(!text.contains("Average"));
        assert!(text.contains("completed"));
    }

    #[test]
    fn file_name_uses_utc_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(results_file_name(at), "http_test_results_20240309_070501.json");
    }

    #[test]
    fn saved_file_has_report_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_results(&stats(), dir.path()).unwrap();
        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(value["total_requests"], 2);
        assert_eq!(value["successful_posts"], 1);
        assert_eq!(value["total_response_time_ms"], 50.0);
        assert_eq!(value["results"].as_array().unwrap().len(), 2);
        assert_eq!(value["results"][0]["message"]["method"], "POST");
    }

    #[tokio::test]
    async fn verify_counts_server_messages() {
        let client = FakeClient::new(|_, _| Ok(reply(200, r#"[{"id":1},{"id":2},{"id":3}]"#)));
        let verification = verify(&client, "base:1", &stats()).await.unwrap();
        assert_eq!(verification.server_messages, 3);
        assert_eq!(verification.client_successful_posts, 1);
    }

    #[tokio::test]
    async fn verify_failure_is_not_fatal() {
        let down = FakeClient::new(|_, _| Err(RequestError::Timeout));
        assert_eq!(verify(&down, "base:1", &stats()).await, None);
        let garbled = FakeClient::new(|_, _| Ok(reply(200, "{")));
        assert_eq!(verify(&garbled, "base:1", &stats()).await, None);
        let erroring = FakeClient::new(|_, _| Ok(reply(500, "[]")));
        assert_eq!(verify(&erroring, "base:1", &stats()).await, None);
    }
}
