//! Chat client for a locally hosted Ollama server.
//!
//! Non-streaming calls decode a single JSON object. Streaming calls read the
//! newline-delimited JSON body line by line and yield each `message.content`
//! as soon as its line arrives.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncBufReadExt;
use tracing::{debug, error};

use super::{BackendError, ChatMessage, ModelClient, ModelInfo, TokenStream};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

// ── Ollama request/response ──

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaChatChunk {
    #[serde(default)]
    message: Option<OllamaMessageOwned>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaMessageOwned {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaTag>,
}

#[derive(Deserialize)]
struct OllamaTag {
    name: String,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct OllamaError {
    error: String,
}

// ── Client ──

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    client: Client,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let parsed = url::Url::parse(base_url)
            .with_context(|| format!("Invalid model backend URL: {}", base_url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("Model backend URL must use http or https: {}", base_url);
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn post_chat(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        stream: bool,
        options: Option<OllamaOptions>,
    ) -> Result<reqwest::Response, BackendError> {
        let req = OllamaChatRequest {
            model: model_id,
            messages: messages
                .iter()
                .map(|m| OllamaMessage {
                    role: &m.role,
                    content: &m.content,
                })
                .collect(),
            stream,
            options,
        };

        debug!(
            model_id = %model_id,
            message_count = messages.len(),
            stream,
            "Sending chat request to Ollama"
        );

        let res = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, base_url = %self.base_url, "Failed to reach Ollama");
                BackendError::from_reqwest(e, &self.base_url)
            })?;

        self.check_status(model_id, res).await
    }

    async fn check_status(
        &self,
        model_id: &str,
        res: reqwest::Response,
    ) -> Result<reqwest::Response, BackendError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }

        let body = res.text().await.unwrap_or_default();
        error!(status = %status, body = %body, "Ollama returned an error status");
        let detail = serde_json::from_str::<OllamaError>(&body)
            .map(|e| e.error)
            .unwrap_or(body);

        if !model_id.is_empty() && (status == StatusCode::NOT_FOUND || detail.contains("not found"))
        {
            return Err(BackendError::Status(format!(
                "Model '{}' not found. Pull it with 'ollama pull {}'.",
                model_id, model_id
            )));
        }
        Err(BackendError::Status(format!(
            "Ollama API error ({}): {}",
            status, detail
        )))
    }
}

#[async_trait]
impl ModelClient for OllamaClient {
    fn endpoint(&self) -> &str {
        &self.base_url
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendError> {
        let res = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(e, &self.base_url))?;
        let res = self.check_status("", res).await?;
        let tags: OllamaTags = res
            .json()
            .await
            .map_err(|e| BackendError::Malformed(format!("Failed to parse model list: {}", e)))?;

        Ok(tags
            .models
            .into_iter()
            .map(|t| ModelInfo {
                id: t.model.unwrap_or_else(|| t.name.clone()),
                name: t.name,
            })
            .collect())
    }

    async fn complete(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
    ) -> Result<String, BackendError> {
        let res = self.post_chat(model_id, messages, false, None).await?;
        let parsed: OllamaChatChunk = res
            .json()
            .await
            .map_err(|e| BackendError::Malformed(format!("Failed to parse response: {}", e)))?;
        if let Some(err) = parsed.error {
            return Err(BackendError::Stream(err));
        }
        Ok(parsed.message.map(|m| m.content).unwrap_or_default())
    }

    async fn stream(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
    ) -> Result<TokenStream, BackendError> {
        let res = self.post_chat(model_id, messages, true, None).await?;

        let body = res.bytes_stream().map(|r| r.map_err(std::io::Error::other));
        let reader = tokio::io::BufReader::new(tokio_util::io::StreamReader::new(body));
        let mut lines = reader.lines();

        let tokens = async_stream::stream! {
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<OllamaChatChunk>(line) {
                            Ok(chunk) => {
                                if let Some(err) = chunk.error {
                                    yield Err(BackendError::Stream(err));
                                    break;
                                }
                                if let Some(message) = chunk.message {
                                    yield Ok(message.content);
                                }
                                if chunk.done {
                                    break;
                                }
                            }
                            Err(e) => {
                                yield Err(BackendError::Malformed(format!(
                                    "Failed to decode stream fragment: {}",
                                    e
                                )));
                                break;
                            }
                        }
                    }
                    Ok(None) => {
                        yield Err(BackendError::Stream(
                            "Model backend closed the stream before completion".to_string(),
                        ));
                        break;
                    }
                    Err(e) => {
                        yield Err(BackendError::Stream(format!(
                            "Connection to model backend lost: {}",
                            e
                        )));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(tokens))
    }

    async fn ping(&self, model_id: &str) -> Result<(), BackendError> {
        self.post_chat(
            model_id,
            &[ChatMessage::user("ping")],
            false,
            Some(OllamaOptions { num_predict: 1 }),
        )
        .await
        .map(|_| ())
    }
}
