//! Scripted provider for tests.

use super::provider::{ChatMessage, CompletionProvider};
use crate::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A provider that replays queued results and records every request.
///
/// When the queue is empty it echoes the last user message back.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedProvider {
    replies: Arc<Mutex<VecDeque<ProviderResult<String>>>>,
    calls: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl ScriptedProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub(crate) fn fail(self) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(ProviderError::request("connection refused")));
        self
    }

    pub(crate) fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn last_call(&self) -> Vec<ChatMessage> {
        self.calls.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn complete(&self, _model: &str, messages: &[ChatMessage]) -> ProviderResult<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            Ok(messages
                .last()
                .map(|m| format!("echo: {}", m.content))
                .unwrap_or_default())
        })
    }
}
