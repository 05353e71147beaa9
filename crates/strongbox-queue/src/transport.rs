//! Transports that carry casts to worker processes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::QueueError;

/// Delivers a fire-and-forget call to the worker tier.
#[async_trait]
pub trait CastTransport: Send + Sync {
    /// Send `method` with its bound named arguments.
    async fn cast(&self, method: &str, kwargs: Map<String, Value>) -> Result<(), QueueError>;
}

#[derive(Serialize)]
struct CastRequest<'a> {
    method: &'a str,
    kwargs: &'a Map<String, Value>,
}

/// Casts over HTTP: `POST {base_url}/v1/tasks/{method}`.
///
/// Per-call timeouts are enforced here; callers add none of their own.
pub struct HttpCastTransport {
    http: Client,
    base_url: String,
}

impl HttpCastTransport {
    /// Create a transport for the worker endpoint at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, QueueError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CastTransport for HttpCastTransport {
    async fn cast(&self, method: &str, kwargs: Map<String, Value>) -> Result<(), QueueError> {
        let url = format!("{}/v1/tasks/{}", self.base_url, method);

        let response = self
            .http
            .post(&url)
            .json(&CastRequest {
                method,
                kwargs: &kwargs,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("failed to read response: {e}"));
            return Err(QueueError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(method, status = status.as_u16(), "cast delivered");
        Ok(())
    }
}
