//! Scripted text generator for engine unit tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::traits::{CompletionRequest, CompletionResponse, ModelInfo, TextGenerator, TokenUsage};

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Text(String),
    Status(u16),
    RateLimited(u64),
    Network,
    Hang,
    Panic,
}

impl Reply {
    pub(crate) fn text(s: &str) -> Self {
        Reply::Text(s.to_string())
    }
}

/// Replies by prompt substring, in rule order; otherwise the default.
/// A queue of one-shot replies, when non-empty, takes precedence.
pub(crate) struct ScriptedGenerator {
    rules: Vec<(String, Reply)>,
    default: Reply,
    queue: Mutex<Vec<Reply>>,
    calls: AtomicU32,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub(crate) fn fixed(reply: Reply) -> Self {
        Self {
            rules: Vec::new(),
            default: reply,
            queue: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn when(mut self, needle: &str, reply: Reply) -> Self {
        self.rules.push((needle.to_string(), reply));
        self
    }

    /// Replies consumed first-in-first-out before rules apply.
    pub(crate) fn then_queue(self, replies: Vec<Reply>) -> Self {
        *self.queue.lock().unwrap() = replies.into_iter().rev().collect();
        self
    }

    pub(crate) fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());

        let queued = self.queue.lock().unwrap().pop();
        let reply = queued.unwrap_or_else(|| {
            self.rules
                .iter()
                .find(|(needle, _)| request.prompt.contains(needle.as_str()))
                .map(|(_, r)| r.clone())
                .unwrap_or_else(|| self.default.clone())
        });

        match reply {
            Reply::Text(content) => Ok(CompletionResponse {
                content,
                model: request.model.clone(),
                token_usage: TokenUsage::default(),
                latency_ms: 1,
            }),
            Reply::Status(status) => Err(ProviderError::ApiError {
                status,
                message: "scripted failure".into(),
            }
            .into()),
            Reply::RateLimited(ms) => Err(ProviderError::RateLimited { retry_after_ms: ms }.into()),
            Reply::Network => Err(ProviderError::NetworkError("connection reset".into()).into()),
            Reply::Panic => panic!("scripted generator panic"),
            Reply::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        Vec::new()
    }
}
