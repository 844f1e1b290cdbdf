use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{BackendError, ChatMessage, ModelClient, ModelInfo, TokenStream};

/// One canned backend reply, consumed in call order.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Tokens(Vec<String>),
    /// Yields the given tokens, then fails mid-stream.
    BreaksAfter(Vec<String>, String),
    /// Fails before any token is produced.
    Refuses(String),
}

impl Reply {
    pub(crate) fn tokens(tokens: &[&str]) -> Self {
        Reply::Tokens(tokens.iter().map(|t| t.to_string()).collect())
    }

    pub(crate) fn text(text: &str) -> Self {
        Reply::Tokens(vec![text.to_string()])
    }
}

/// In-memory backend for tests: replays queued replies and records every conversation.
pub(crate) struct ScriptedClient {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedClient {
    pub(crate) fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }

    fn next_reply(&self, messages: &[ChatMessage]) -> Reply {
        self.calls.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Reply::Refuses("no scripted reply left".to_string()))
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    fn endpoint(&self) -> &str {
        "scripted://backend"
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendError> {
        Ok(vec![ModelInfo {
            id: "scripted".to_string(),
            name: "Scripted".to_string(),
        }])
    }

    async fn complete(
        &self,
        _model_id: &str,
        messages: &[ChatMessage],
    ) -> Result<String, BackendError> {
        match self.next_reply(messages) {
            Reply::Tokens(tokens) => Ok(tokens.concat()),
            Reply::BreaksAfter(_, msg) | Reply::Refuses(msg) => Err(BackendError::Stream(msg)),
        }
    }

    async fn stream(
        &self,
        _model_id: &str,
        messages: &[ChatMessage],
    ) -> Result<TokenStream, BackendError> {
        let items: Vec<Result<String, BackendError>> = match self.next_reply(messages) {
            Reply::Tokens(tokens) => tokens.into_iter().map(Ok).collect(),
            Reply::BreaksAfter(tokens, msg) => tokens
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(BackendError::Stream(msg))))
                .collect(),
            Reply::Refuses(msg) => return Err(BackendError::Unreachable(msg)),
        };
        Ok(Box::pin(futures_util::stream::iter(items)))
    }
}
