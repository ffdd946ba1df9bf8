//! Scripted providers for unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::LlmError;

use super::provider::{CompletionRequest, CompletionResponse, LlmProvider};

/// What the provider does on each call.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Reply with this text.
    Reply(String),
    /// Fail with a request error.
    Fail,
    /// Sleep for this long, then reply with the text.
    Slow(Duration, String),
}

/// Provider that follows a fixed behavior and records every prompt it sees.
pub struct ScriptedProvider {
    behavior: Behavior,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(Behavior::Reply(text.to_string()))
    }

    pub fn failing() -> Self {
        Self::new(Behavior::Fail)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt_text());

        let content = match &self.behavior {
            Behavior::Reply(text) => text.clone(),
            Behavior::Fail => {
                return Err(LlmError::RequestFailed {
                    provider: "scripted".to_string(),
                    reason: "simulated outage".to_string(),
                });
            }
            Behavior::Slow(delay, text) => {
                tokio::time::sleep(*delay).await;
                text.clone()
            }
        };

        Ok(CompletionResponse {
            content,
            input_tokens: 0,
            output_tokens: 0,
        })
    }
}
