//! JSON POST with retry and exponential backoff.
//!
//! Shared by the embedding providers and the Pinecone adapter:
//! - HTTP 429 and 5xx → retry
//! - other 4xx → fail immediately
//! - network errors → retry
//! - backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use std::time::Duration;

/// Request description for [`post_json`].
pub struct JsonPost<'a> {
    /// Service name used in error messages (e.g. `"OpenAI"`).
    pub service: &'a str,
    pub url: &'a str,
    pub headers: &'a [(&'a str, &'a str)],
    pub body: &'a serde_json::Value,
    pub max_retries: u32,
}

pub fn client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

pub async fn post_json(
    client: &reqwest::Client,
    request: JsonPost<'_>,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=request.max_retries {
        if attempt > 0 {
            let delay = backoff(attempt);
            tracing::debug!(
                service = request.service,
                attempt,
                delay_secs = delay.as_secs(),
                "retrying request"
            );
            tokio::time::sleep(delay).await;
        }

        let mut builder = client
            .post(request.url)
            .header("Content-Type", "application/json");
        for (name, value) in request.headers {
            builder = builder.header(*name, *value);
        }

        match builder.json(request.body).send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    // Some endpoints answer with an empty body.
                    let text = response.text().await?;
                    if text.trim().is_empty() {
                        return Ok(serde_json::Value::Null);
                    }
                    return Ok(serde_json::from_str(&text)?);
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow::anyhow!(
                        "{} API error {}: {}",
                        request.service,
                        status,
                        body_text
                    ));
                    continue;
                }

                bail!("{} API error {}: {}", request.service, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow::anyhow!(
                    "{} connection error ({}): {}",
                    request.service,
                    request.url,
                    e
                ));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        anyhow::anyhow!("{} request failed after retries", request.service)
    }))
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt.saturating_sub(1)).min(5))
}
