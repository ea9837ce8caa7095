//! Knowledge-base publishing for reportcast.
//!
//! Pushes report chunks to the KB ingestion API one at a time, pausing for
//! the configured interval after every call. A publish attempt never fails
//! the run: each chunk yields a [`PublishOutcome`] and failures are tallied,
//! not propagated.

pub mod rate_limit;

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use reportcast_shared::{
    Chunk, KbCredentials, KnowledgeBaseConfig, PublishOutcome, ReportcastError, Result,
};

pub use rate_limit::RateLimiter;

/// Path of the ingestion endpoint, relative to the instance API root.
const PUSH_PATH: &str = "/api/core/dataset/data/push";

// ---------------------------------------------------------------------------
// Request payload
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    #[serde(rename = "collectionId")]
    collection_id: &'a str,
    #[serde(rename = "trainingType")]
    training_type: &'static str,
    data: [PushItem<'a>; 1],
}

#[derive(Debug, Serialize)]
struct PushItem<'a> {
    q: &'a str,
    a: &'static str,
    #[serde(rename = "sourceName")]
    source_name: &'a str,
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// HTTP client for the KB ingestion API.
#[derive(Debug)]
pub struct KbPublisher {
    client: reqwest::Client,
    push_url: String,
    credentials: KbCredentials,
    limiter: RateLimiter,
}

impl KbPublisher {
    /// Build a publisher from resolved config and credentials.
    pub fn new(config: &KnowledgeBaseConfig, credentials: KbCredentials) -> Result<Self> {
        Url::parse(&config.base_url).map_err(|e| {
            ReportcastError::config(format!(
                "invalid knowledge_base.base_url {:?}: {e}",
                config.base_url
            ))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ReportcastError::Publish(e.to_string()))?;

        Ok(Self {
            client,
            push_url: push_endpoint(&config.base_url),
            credentials,
            limiter: RateLimiter::from_millis(config.rate_limit_ms),
        })
    }

    /// The fully resolved push endpoint URL.
    pub fn push_url(&self) -> &str {
        &self.push_url
    }

    /// Number of rate-limit pauses taken so far.
    pub fn pauses(&self) -> usize {
        self.limiter.pauses()
    }

    /// Publish a single chunk. Always returns an outcome; network and API
    /// failures are captured in it rather than raised.
    pub async fn publish(&self, chunk: Chunk) -> PublishOutcome {
        match self.push(&chunk).await {
            Ok(()) => {
                debug!(label = %chunk.label, "chunk published");
                PublishOutcome {
                    chunk,
                    success: true,
                    error_detail: None,
                }
            }
            Err(detail) => {
                warn!(label = %chunk.label, %detail, "chunk publish failed");
                PublishOutcome {
                    chunk,
                    success: false,
                    error_detail: Some(detail),
                }
            }
        }
    }

    /// Wait out the configured interval. `publish_all` does this after
    /// every push; callers driving [`publish`](Self::publish) directly
    /// should do the same.
    pub async fn throttle(&self) {
        self.limiter.pause().await;
    }

    /// Publish chunks in order, pausing after every call (including the
    /// last, and including failed calls).
    pub async fn publish_all(&self, chunks: Vec<Chunk>) -> Vec<PublishOutcome> {
        let mut outcomes = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let outcome = self.publish(chunk).await;
            outcomes.push(outcome);
            self.throttle().await;
        }
        outcomes
    }

    async fn push(&self, chunk: &Chunk) -> std::result::Result<(), String> {
        let payload = PushRequest {
            collection_id: &self.credentials.collection_id,
            training_type: "chunk",
            data: [PushItem {
                q: &chunk.content,
                a: "",
                source_name: &chunk.label,
            }],
        };

        let response = self
            .client
            .post(&self.push_url)
            .bearer_auth(&self.credentials.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| format!("failed to read response body: {e}"))?;

        if !status.is_success() {
            return Err(format!("HTTP {status}: {}", truncate(&body, 200)));
        }

        // A 2xx with an absent or empty `data` field means the KB accepted
        // the request but ingested nothing.
        let parsed: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| format!("unparseable response body: {e}"))?;
        match parsed.get("data") {
            Some(data) if !is_empty_value(data) => Ok(()),
            _ => Err(format!(
                "response missing ingestion data: {}",
                truncate(&body, 200)
            )),
        }
    }
}

/// Resolve the push endpoint from a configured base URL.
///
/// Tolerates a trailing slash and a base URL that already ends in `/api`,
/// so `https://kb.example.com/api` does not become `.../api/api/...`.
pub fn push_endpoint(base_url: &str) -> String {
    let mut base = base_url.trim_end_matches('/');
    if let Some(stripped) = base.strip_suffix("/api") {
        base = stripped;
    }
    format!("{base}{PUSH_PATH}")
}

fn is_empty_value(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.is_empty(),
        serde_json::Value::Array(a) => a.is_empty(),
        serde_json::Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
