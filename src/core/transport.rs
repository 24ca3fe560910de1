//! Single streaming request per turn.
//!
//! A [`Transport`] turns a [`GenerateRequest`] into a stream of raw body
//! chunks. Chunk boundaries are arbitrary; line reassembly happens in
//! [`crate::core::stream`]. Dropping the returned stream closes the
//! connection.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use tracing::{debug, warn};

use crate::api::GenerateRequest;
use crate::core::error::TurnError;
use crate::utils::url::construct_api_url;

pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, TurnError>>;

/// Upper bound on establishing the TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest silence tolerated between body chunks. Generous, since the first
/// chunk only arrives once the model has been loaded into memory.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, request: &GenerateRequest) -> Result<ChunkStream, TurnError>;
}

/// Posts to `{base_url}/api/generate` over HTTP.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    idle_timeout: Duration,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, request: &GenerateRequest) -> Result<ChunkStream, TurnError> {
        let generate_url = construct_api_url(&self.base_url, "api/generate");
        debug!(url = %generate_url, model = %request.model, "opening generate stream");

        let response = self
            .client
            .post(generate_url)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(TurnError::transport)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TurnError::Status {
                status: status.as_u16(),
                message: summarize_error_body(&error_text),
            });
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(TurnError::transport))
            .boxed();
        Ok(bound_idle(body, self.idle_timeout))
    }
}

/// Fail the stream once `idle` passes without a chunk. The source is dropped
/// with the error, closing the connection.
fn bound_idle(body: ChunkStream, idle: Duration) -> ChunkStream {
    stream::unfold(Some(body), move |state| async move {
        let Some(mut body) = state else {
            return None;
        };
        match tokio::time::timeout(idle, body.next()).await {
            Ok(Some(chunk)) => Some((chunk, Some(body))),
            Ok(None) => None,
            Err(_) => {
                warn!(idle_ms = idle.as_millis() as u64, "generate stream stalled");
                let message = format!("no data from the server for {}s", idle.as_secs_f32());
                Some((Err(TurnError::transport(message)), None))
            }
        }
    })
    .boxed()
}

/// Reduce an error body to one line, preferring the server's `error` field.
pub(crate) fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let summary = serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|v| match v {
                    serde_json::Value::String(s) => Some(s.to_string()),
                    serde_json::Value::Object(map) => map
                        .get("message")
                        .and_then(|message| message.as_str().map(str::to_owned)),
                    _ => None,
                })
                .or_else(|| {
                    value
                        .get("message")
                        .and_then(|v| v.as_str().map(str::to_owned))
                })
        })
        .unwrap_or_else(|| trimmed.to_string());

    summary.split_whitespace().collect::<Vec<_>>().join(" ")
}
