//! Adapter over the two embedding backend protocols: `llm_mcp`'s job-based
//! API and Ollama's direct synchronous endpoint (spec §4.3).

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::{BackendKind, EmbeddingBackendConfig};
use crate::error::IngestError;

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const JOB_SOURCE: &str = "bcs-mcp";
const JOB_PRIORITY: u8 = 2;
const JOB_MAX_ATTEMPTS: u8 = 2;

pub struct BackendAdapter {
    http: Client,
    config: EmbeddingBackendConfig,
}

#[derive(Deserialize)]
struct EnqueueResponse {
    job_id: String,
}

#[derive(Deserialize)]
struct JobStatusResponse {
    status: String,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    #[serde(default)]
    embedding: Vec<Value>,
}

/// Coerces a JSON array into floats, dropping elements that aren't numeric
/// (spec §4.3).
fn coerce_floats(values: &[Value]) -> Vec<f64> {
    values.iter().filter_map(Value::as_f64).collect()
}

impl BackendAdapter {
    pub fn new(config: EmbeddingBackendConfig) -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(config.timeout_sec.max(3) + 5))
                .build()
                .expect("failed to build embedding http client"),
            config,
        }
    }

    /// Produces an embedding vector for `text`, trying the configured
    /// primary backend first and falling back to Ollama on failure when
    /// `fallback_to_ollama` is set and the primary is `llm_mcp` (spec §4.3).
    pub async fn embed(&self, text: &str) -> Result<Vec<f64>, IngestError> {
        let primary_result = match self.config.primary {
            BackendKind::LlmMcp => self.embed_llm_mcp(text).await,
            BackendKind::Ollama => self.embed_ollama(text).await,
        };

        match primary_result {
            Ok(v) => Ok(v),
            Err(e) if self.config.fallback_to_ollama && self.config.primary == BackendKind::LlmMcp => {
                warn!(error = %e, "primary embedding backend failed, falling back to ollama");
                self.embed_ollama(text).await
            }
            Err(e) => Err(e),
        }
    }

    async fn embed_llm_mcp(&self, text: &str) -> Result<Vec<f64>, IngestError> {
        let enqueue_url = format!("{}/v1/llm/request", self.config.llm_mcp_base_url);
        let mut body = json!({
            "task": "embed",
            "provider": self.config.llm_mcp_provider,
            "prompt": text,
            "source": JOB_SOURCE,
            "priority": JOB_PRIORITY,
            "max_attempts": JOB_MAX_ATTEMPTS,
        });
        if !self.config.ollama_model.is_empty() {
            body["model"] = json!(self.config.ollama_model);
        }

        let resp = self.http.post(&enqueue_url).json(&body).send().await?;
        let status = resp.status();
        if status.as_u16() != 200 && status.as_u16() != 202 {
            return Err(IngestError::Backend(format!(
                "llm_mcp enqueue returned {status}"
            )));
        }

        let enqueued: EnqueueResponse = resp.json().await?;
        if enqueued.job_id.is_empty() {
            return Err(IngestError::Backend(
                "llm_mcp enqueue response missing job_id".to_string(),
            ));
        }

        let status_url = format!("{}/v1/jobs/{}", self.config.llm_mcp_base_url, enqueued.job_id);
        let deadline =
            std::time::Instant::now() + Duration::from_secs(self.config.timeout_sec.max(3));

        loop {
            if std::time::Instant::now() >= deadline {
                return Err(IngestError::Backend(format!(
                    "llm_mcp job {} timed out",
                    enqueued.job_id
                )));
            }

            let resp = self.http.get(&status_url).send().await?;
            if resp.status().as_u16() != 200 {
                return Err(IngestError::Backend(format!(
                    "llm_mcp job status check returned {}",
                    resp.status()
                )));
            }
            let parsed: JobStatusResponse = resp.json().await?;

            match parsed.status.to_ascii_lowercase().as_str() {
                "done" => {
                    let embedding = parsed
                        .result
                        .as_ref()
                        .and_then(|r| r.get("data"))
                        .and_then(|d| d.get("embedding"))
                        .and_then(Value::as_array)
                        .ok_or_else(|| {
                            IngestError::Backend(format!(
                                "llm_mcp job {} done without result.data.embedding",
                                enqueued.job_id
                            ))
                        })?;
                    return Ok(coerce_floats(embedding));
                }
                "failed" | "error" | "cancelled" | "canceled" => {
                    return Err(IngestError::Backend(format!(
                        "llm_mcp job {} failed: {}",
                        enqueued.job_id,
                        parsed.error.unwrap_or_default()
                    )));
                }
                _ => {
                    debug!(job_id = %enqueued.job_id, status = %parsed.status, "polling llm_mcp job");
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }
    }

    async fn embed_ollama(&self, text: &str) -> Result<Vec<f64>, IngestError> {
        let url = format!("{}/api/embeddings", self.config.ollama_base_url);
        let resp = self
            .http
            .post(&url)
            .json(&json!({"model": self.config.ollama_model, "prompt": text}))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(IngestError::Backend(format!(
                "ollama returned {}",
                resp.status()
            )));
        }

        let parsed: OllamaEmbedResponse = resp.json().await?;
        Ok(coerce_floats(&parsed.embedding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_floats_skips_non_numeric_elements() {
        let values = vec![json!(1.0), json!("not a number"), json!(2.5), json!(null)];
        assert_eq!(coerce_floats(&values), vec![1.0, 2.5]);
    }

    #[test]
    fn coerce_floats_on_empty_array_yields_empty_vector() {
        assert!(coerce_floats(&[]).is_empty());
    }
}
