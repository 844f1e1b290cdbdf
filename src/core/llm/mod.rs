mod error;
pub mod ollama;

#[cfg(test)]
pub(crate) mod scripted;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

pub use error::BackendError;

/// Lazy, forward-only sequence of decoded text fragments. Fragments may be empty.
pub type TokenStream = BoxStream<'static, Result<String, BackendError>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Where the backend lives, for logs and health reports.
    fn endpoint(&self) -> &str;

    // Models installed on the backend
    async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendError>;

    // Single complete response for a structured conversation
    async fn complete(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
    ) -> Result<String, BackendError>;

    // Incremental response; the stream ends abruptly with an Err on backend failure
    async fn stream(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
    ) -> Result<TokenStream, BackendError>;

    /// Cheapest possible round-trip used by health checks.
    async fn ping(&self, model_id: &str) -> Result<(), BackendError> {
        self.complete(model_id, &[ChatMessage::user("ping")])
            .await
            .map(|_| ())
    }
}
