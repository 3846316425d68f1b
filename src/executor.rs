//! Executes a single [`WorkItem`] against the target and records the outcome.

use crate::client::{HttpReply, MessageClient, NewMessage};
use crate::endpoint::EndpointState;
use crate::error::RequestError;
use crate::model::{Message, MessageResponse, RequestOutcome, WorkItem, WorkKind};
use crate::stats::Recorder;
use chrono::Utc;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Hands out message ids that are unique within a run.
#[derive(Debug)]
pub struct MessageIds {
    run: i64,
    next: AtomicU64,
}

impl MessageIds {
    pub fn new() -> Self {
        Self {
            run: Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            next: AtomicU64::new(0),
        }
    }

    pub fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("msg-{}-{n}", self.run)
    }
}

impl Default for MessageIds {
    fn default() -> Self {
        Self::new()
    }
}

/// Perform one call for `item` against `endpoint` and record it.
///
/// Never fails: transport errors and non-2xx statuses become a failed
/// outcome and keep `endpoint`. On success the server's `host_ip` (if it
/// parses) is returned as the endpoint for the next request.
pub async fn execute<C: MessageClient>(
    client: &C,
    item: WorkItem,
    endpoint: &str,
    ids: &MessageIds,
    recorder: &Recorder,
) -> (String, RequestOutcome) {
    let timestamp = Utc::now();
    let message = Message {
        id: ids.next_id(),
        content: match item.kind {
            WorkKind::Post => format!("Content generated at {timestamp}"),
            WorkKind::Get => String::new(),
        },
        method: item.kind,
        timestamp,
    };

    let start = Instant::now();
    let reply = match item.kind {
        WorkKind::Post => {
            let body = NewMessage {
                content: message.content.clone(),
            };
            client.post_message(endpoint, &body).await
        }
        WorkKind::Get => client.list_messages(endpoint).await,
    };
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

    let (success, next_endpoint) = match reply.and_then(check_status) {
        Ok(reply) => {
            let next = match next_host(item.kind, &reply.body) {
                Ok(Some(host)) => host,
                Ok(None) => endpoint.to_string(),
                Err(e) => {
                    tracing::debug!("{} #{}: keeping {endpoint}: {e}", item.kind, item.sequence_index);
                    endpoint.to_string()
                }
            };
            (true, next)
        }
        Err(e) => {
            tracing::warn!(
                category = e.category(),
                "{} request #{} to {endpoint} failed: {e}",
                item.kind,
                item.sequence_index
            );
            (false, endpoint.to_string())
        }
    };

    let outcome = RequestOutcome {
        message,
        success,
        latency_ms,
        sequence_index: item.sequence_index,
    };
    recorder.record(outcome.clone());
    (next_endpoint, outcome)
}

fn check_status(reply: HttpReply) -> Result<HttpReply, RequestError> {
    if reply.is_success() {
        Ok(reply)
    } else {
        Err(RequestError::Status(reply.status))
    }
}

/// Server-suggested host from a successful body: a single object for POST,
/// the first element of an array for GET.
pub fn next_host(kind: WorkKind, body: &str) -> Result<Option<String>, RequestError> {
    let value = match kind {
        WorkKind::Post => Some(serde_json::from_str::<Value>(body)?),
        WorkKind::Get => serde_json::from_str::<Vec<Value>>(body)?.into_iter().next(),
    };
    let Some(value) = value else {
        return Ok(None);
    };
    // derived structs also accept positional arrays; only objects are replies
    if !value.is_object() {
        return Err(RequestError::Decode(serde::de::Error::custom(
            "expected a message object",
        )));
    }
    let response: MessageResponse = serde_json::from_value(value)?;
    Ok(Some(response.host_ip).filter(|host| !host.is_empty()))
}

/// Everything a spawned request needs, cloned into each task.
pub struct Executor<C> {
    client: Arc<C>,
    endpoint: EndpointState,
    recorder: Recorder,
    ids: Arc<MessageIds>,
}

impl<C> Clone for Executor<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            recorder: self.recorder.clone(),
            ids: self.ids.clone(),
        }
    }
}

impl<C: MessageClient> Executor<C> {
    pub fn new(client: Arc<C>, endpoint: EndpointState, recorder: Recorder) -> Self {
        Self {
            client,
            endpoint,
            recorder,
            ids: Arc::new(MessageIds::new()),
        }
    }

    pub fn endpoint(&self) -> &EndpointState {
        &self.endpoint
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Run `item` against the current endpoint and publish any rewrite.
    pub async fn run(&self, item: WorkItem) -> RequestOutcome {
        let current = self.endpoint.load();
        let (next, outcome) =
            execute(self.client.as_ref(), item, &current, &self.ids, &self.recorder).await;
        if next != *current && self.endpoint.rewrite(&next) {
            tracing::debug!("endpoint rewritten {current} -> {next}");
        }
        outcome
    }
}
