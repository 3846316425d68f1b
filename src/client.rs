//! HTTP side of the engine: the [`MessageClient`] seam and its reqwest
//! implementation.

use crate::error::RequestError;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

pub const MESSAGES_PATH: &str = "/api/v1/messages";

/// POST body accepted by the target server.
#[derive(Clone, Debug, Serialize)]
pub struct NewMessage {
    pub content: String,
}

/// Status and raw body of a completed call.
#[derive(Clone, Debug)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The two calls the engine makes against `endpoint` (`host:port`).
///
/// Implementations enforce their own per-request timeout and report
/// transport failures as `Err`; any HTTP status, 2xx or not, is `Ok`.
pub trait MessageClient: Send + Sync + 'static {
    fn post_message(
        &self,
        endpoint: &str,
        message: &NewMessage,
    ) -> impl Future<Output = Result<HttpReply, RequestError>> + Send;

    fn list_messages(
        &self,
        endpoint: &str,
    ) -> impl Future<Output = Result<HttpReply, RequestError>> + Send;
}

pub fn messages_url(endpoint: &str) -> String {
    format!("http://{endpoint}{MESSAGES_PATH}")
}

/// Pooled reqwest client shared by every request of a run. Dropping it
/// closes the idle connections.
#[derive(Clone, Debug)]
pub struct HttpMessageClient {
    inner: reqwest::Client,
}

impl HttpMessageClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let inner = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(100)
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;
        Ok(Self { inner })
    }

    async fn into_reply(response: reqwest::Response) -> HttpReply {
        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!("could not read response body: {e}");
                String::new()
            }
        };
        HttpReply { status, body }
    }
}

impl MessageClient for HttpMessageClient {
    async fn post_message(
        &self,
        endpoint: &str,
        message: &NewMessage,
    ) -> Result<HttpReply, RequestError> {
        let response = self
            .inner
            .post(messages_url(endpoint))
            .json(message)
            .send()
            .await
            .map_err(|e| RequestError::classify_reqwest(&e))?;
        Ok(Self::into_reply(response).await)
    }

    async fn list_messages(&self, endpoint: &str) -> Result<HttpReply, RequestError> {
        let response = self
            .inner
            .get(messages_url(endpoint))
            .send()
            .await
            .map_err(|e| RequestError::classify_reqwest(&e))?;
        Ok(Self::into_reply(response).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_targets_messages_path() {
        assert_eq!(
            messages_url("10.1.2.3:8080"),
            "http://10.1.2.3:8080/api/v1/messages"
        );
    }

    #[test]
    fn only_2xx_is_success() {
        let reply = |status| HttpReply {
            status,
            body: String::new(),
        };
        assert!(reply(200).is_success());
        assert!(reply(201).is_success());
        assert!(reply(299).is_success());
        assert!(!reply(199).is_success());
        assert!(!reply(302).is_success());
        assert!(!reply(404).is_success());
        assert!(!reply(500).is_success());
    }
}
