//! HTTP embedding adapters: OpenAI, Azure OpenAI and Ollama.
//!
//! All three share one [`HttpVectoriser`]: texts are sent in batches of
//! `embedding.batch_size`, each batch retried with backoff on 429/5xx and
//! network errors, and the vectors are returned in input order.

use std::time::Duration;

use async_trait::async_trait;
use harmony_core::embedding::{ModelKey, Vectoriser};
use harmony_core::MatchError;
use serde_json::Value;
use tracing::{debug, warn};

use super::backoff_delay;
use crate::config::EmbeddingConfig;

const OPENAI_URL: &str = "https://api.openai.com/v1/embeddings";
const AZURE_API_VERSION: &str = "2023-05-15";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone)]
enum Endpoint {
    OpenAi { api_key: String },
    Azure { api_key: String, url: String },
    Ollama { url: String },
}

impl Endpoint {
    fn label(&self) -> &'static str {
        match self {
            Endpoint::OpenAi { .. } => "OpenAI",
            Endpoint::Azure { .. } => "Azure OpenAI",
            Endpoint::Ollama { .. } => "Ollama",
        }
    }
}

/// Batched, retrying vectoriser over an HTTP embeddings API.
pub struct HttpVectoriser {
    key: ModelKey,
    endpoint: Endpoint,
    client: reqwest::Client,
    batch_size: usize,
    max_retries: u32,
}

/// Factory for `openai/*` models. Requires `OPENAI_API_KEY`.
pub fn openai(config: &EmbeddingConfig, key: &ModelKey) -> Result<Box<dyn Vectoriser>, MatchError> {
    let api_key = require_env(key, "OPENAI_API_KEY")?;
    Ok(Box::new(HttpVectoriser::new(
        config,
        key,
        Endpoint::OpenAi { api_key },
    )?))
}

/// Factory for `azure_openai/*` models.
///
/// Requires `AZURE_OPENAI_API_KEY` and `AZURE_OPENAI_ENDPOINT`. The
/// deployment id is `embedding.deployment`, else the model name.
pub fn azure_openai(
    config: &EmbeddingConfig,
    key: &ModelKey,
) -> Result<Box<dyn Vectoriser>, MatchError> {
    let api_key = require_env(key, "AZURE_OPENAI_API_KEY")?;
    let endpoint = require_env(key, "AZURE_OPENAI_ENDPOINT")?;
    let deployment = config.deployment.as_deref().unwrap_or(&key.model);
    let url = format!(
        "{}/openai/deployments/{}/embeddings?api-version={}",
        endpoint.trim_end_matches('/'),
        deployment,
        AZURE_API_VERSION
    );
    Ok(Box::new(HttpVectoriser::new(
        config,
        key,
        Endpoint::Azure { api_key, url },
    )?))
}

/// Factory for `ollama/*` models, served at `embedding.url`.
pub fn ollama(config: &EmbeddingConfig, key: &ModelKey) -> Result<Box<dyn Vectoriser>, MatchError> {
    let url = config
        .url
        .clone()
        .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
    Ok(Box::new(HttpVectoriser::new(
        config,
        key,
        Endpoint::Ollama {
            url: url.trim_end_matches('/').to_string(),
        },
    )?))
}

fn require_env(key: &ModelKey, var: &str) -> Result<String, MatchError> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(key.unavailable(format!("{} environment variable not set", var))),
    }
}

impl HttpVectoriser {
    fn new(config: &EmbeddingConfig, key: &ModelKey, endpoint: Endpoint) -> Result<Self, MatchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| key.unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            key: key.clone(),
            endpoint,
            client,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
        })
    }

    fn request(&self) -> reqwest::RequestBuilder {
        let builder = match &self.endpoint {
            Endpoint::OpenAi { api_key } => self
                .client
                .post(OPENAI_URL)
                .header("Authorization", format!("Bearer {}", api_key)),
            Endpoint::Azure { api_key, url } => self.client.post(url).header("api-key", api_key),
            Endpoint::Ollama { url } => self.client.post(format!("{}/api/embed", url)),
        };
        builder.header("Content-Type", "application/json")
    }

    fn body(&self, texts: &[String]) -> Value {
        match &self.endpoint {
            // Azure routes by deployment; the model goes in the URL.
            Endpoint::Azure { .. } => serde_json::json!({ "input": texts }),
            _ => serde_json::json!({ "model": self.key.model, "input": texts }),
        }
    }

    /// POST one batch with retry/backoff and return the parsed JSON body.
    async fn post_with_retry(&self, body: &Value) -> Result<Value, MatchError> {
        let label = self.endpoint.label();
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                warn!(
                    model = %self.key,
                    attempt,
                    delay_secs = delay.as_secs(),
                    error = last_err.as_deref().unwrap_or(""),
                    "retrying embedding request"
                );
                tokio::time::sleep(delay).await;
            }

            match self.request().json(body).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response.json::<Value>().await.map_err(|e| {
                            self.key.failed(format!("{} returned invalid JSON: {}", label, e))
                        });
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let message = format!("{} API error {}: {}", label, status, body_text);

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(message);
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    return Err(self.key.failed(message));
                }
                Err(e) => {
                    last_err = Some(match &self.endpoint {
                        Endpoint::Ollama { url } => {
                            format!("Ollama connection error (is Ollama running at {}?): {}", url, e)
                        }
                        _ => format!("{} connection error: {}", label, e),
                    });
                }
            }
        }

        Err(self.key.failed(
            last_err.unwrap_or_else(|| "embedding failed after retries".to_string()),
        ))
    }
}

#[async_trait]
impl Vectoriser for HttpVectoriser {
    fn model_key(&self) -> &ModelKey {
        &self.key
    }

    async fn vectorise(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MatchError> {
        let mut vectors = Vec::with_capacity(texts.len());

        for (n, batch) in texts.chunks(self.batch_size).enumerate() {
            debug!(model = %self.key, batch = n, size = batch.len(), "embedding batch");
            let json = self.post_with_retry(&self.body(batch)).await?;
            let parsed = match self.endpoint {
                Endpoint::Ollama { .. } => parse_ollama_response(&json),
                _ => parse_openai_response(&json),
            }
            .map_err(|msg| self.key.failed(msg))?;

            if parsed.len() != batch.len() {
                return Err(MatchError::VectorCountMismatch {
                    expected: batch.len(),
                    actual: parsed.len(),
                });
            }
            vectors.extend(parsed);
        }

        Ok(vectors)
    }
}

/// Extract `data[].embedding`, ordered by each entry's `index` when present.
pub fn parse_openai_response(json: &Value) -> Result<Vec<Vec<f32>>, String> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or("Invalid OpenAI response: missing data array")?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .ok_or("Invalid OpenAI response: missing embedding")?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map_or(position, |i| i as usize);
        indexed.push((index, to_vector(embedding)?));
    }

    // Sort by index to ensure order matches input
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

/// Extract `embeddings[]` from an Ollama `/api/embed` response.
pub fn parse_ollama_response(json: &Value) -> Result<Vec<Vec<f32>>, String> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or("Invalid Ollama response: missing embeddings array")?
        .iter()
        .map(to_vector)
        .collect()
}

fn to_vector(value: &Value) -> Result<Vec<f32>, String> {
    value
        .as_array()
        .ok_or_else(|| "Invalid response: embedding is not an array".to_string())?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| "Invalid response: embedding contains a non-number".to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_openai_reorders_by_index() {
        let json = json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        });
        let vectors = parse_openai_response(&json).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_openai_rejects_bad_payloads() {
        assert!(parse_openai_response(&json!({"error": "nope"})).is_err());
        assert!(parse_openai_response(&json!({"data": [{"embedding": [1.0, "x"]}]})).is_err());
    }

    #[test]
    fn test_parse_ollama() {
        let json = json!({"model": "nomic-embed-text", "embeddings": [[0.5, 0.5], [1.0, 0.0]]});
        assert_eq!(parse_ollama_response(&json).unwrap().len(), 2);
        assert!(parse_ollama_response(&json!({})).is_err());
    }

    #[test]
    fn test_missing_api_key_is_unavailable() {
        let key = ModelKey::new("openai", "text-embedding-3-large");
        let err = require_env(&key, "HARMONY_TEST_UNSET_VARIABLE").unwrap_err();
        assert!(matches!(err, MatchError::ProviderUnavailable { .. }));
        assert!(err.to_string().contains("HARMONY_TEST_UNSET_VARIABLE"));
    }

    /// Serve canned HTTP responses, one per connection, recording request bodies.
    async fn serve(responses: Vec<(u16, String)>) -> (String, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let mut bodies = Vec::new();
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                loop {
                    let n = socket.read(&mut chunk).await.unwrap();
                    buf.extend_from_slice(&chunk[..n]);
                    let text = String::from_utf8_lossy(&buf).to_string();
                    if let Some(split) = text.find("\r\n\r\n") {
                        let length = text[..split]
                            .lines()
                            .find_map(|l| {
                                l.to_ascii_lowercase()
                                    .strip_prefix("content-length:")
                                    .map(|v| v.trim().parse::<usize>().unwrap())
                            })
                            .unwrap_or(0);
                        if buf.len() >= split + 4 + length {
                            bodies.push(text[split + 4..].to_string());
                            break;
                        }
                    }
                    if n == 0 {
                        break;
                    }
                }
                let reply = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
            bodies
        });
        (url, handle)
    }

    fn ollama_config(url: &str, batch_size: usize, max_retries: u32) -> EmbeddingConfig {
        EmbeddingConfig {
            framework: "ollama".into(),
            model: "nomic-embed-text".into(),
            batch_size,
            max_retries,
            timeout_secs: 5,
            url: Some(url.to_string()),
            deployment: None,
        }
    }

    #[tokio::test]
    async fn test_ollama_batches_requests() {
        let (url, server) = serve(vec![
            (200, r#"{"embeddings": [[1.0, 0.0], [0.0, 1.0]]}"#.to_string()),
            (200, r#"{"embeddings": [[0.6, 0.8]]}"#.to_string()),
        ])
        .await;
        let config = ollama_config(&url, 2, 0);
        let vectoriser = ollama(&config, &config.model_key()).unwrap();

        let texts: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let vectors = vectoriser.vectorise(&texts).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.6, 0.8]]);

        let bodies = server.await.unwrap();
        assert_eq!(bodies.len(), 2);
        assert!(bodies[0].contains("nomic-embed-text"));
        assert!(bodies[1].contains("\"c\""));
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let (url, server) = serve(vec![
            (503, r#"{"error": "loading model"}"#.to_string()),
            (200, r#"{"embeddings": [[1.0, 0.0]]}"#.to_string()),
        ])
        .await;
        let config = ollama_config(&url, 8, 1);
        let vectoriser = ollama(&config, &config.model_key()).unwrap();

        let vectors = vectoriser.vectorise(&["a".to_string()]).await.unwrap();
        assert_eq!(vectors.len(), 1);
        assert_eq!(server.await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_client_error_fails_immediately() {
        let (url, server) = serve(vec![(404, r#"{"error": "model not found"}"#.to_string())]).await;
        let config = ollama_config(&url, 8, 3);
        let vectoriser = ollama(&config, &config.model_key()).unwrap();

        let err = vectoriser.vectorise(&["a".to_string()]).await.unwrap_err();
        assert!(matches!(err, MatchError::Vectorisation { ref message, .. } if message.contains("404")));
        assert_eq!(server.await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_vector_count_is_rejected() {
        let (url, _server) = serve(vec![(200, r#"{"embeddings": [[1.0, 0.0]]}"#.to_string())]).await;
        let config = ollama_config(&url, 8, 0);
        let vectoriser = ollama(&config, &config.model_key()).unwrap();

        let texts = vec!["a".to_string(), "b".to_string()];
        let err = vectoriser.vectorise(&texts).await.unwrap_err();
        assert_eq!(err, MatchError::VectorCountMismatch { expected: 2, actual: 1 });
    }
}
