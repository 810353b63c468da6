//! Offline providers: a scripted mock and a provider that is switched off.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use skillcheck_core::traits::{
    CompletionRequest, CompletionResponse, ModelInfo, TextGenerator, TokenUsage,
};

use crate::error::ProviderError;

/// A mock text generator for running the engines without real API calls.
///
/// Returns configurable responses based on prompt content matching.
pub struct MockProvider {
    /// Prompt substring → response text, checked in key order.
    responses: BTreeMap<String, String>,
    /// Response used when no substring matches.
    default_response: String,
    call_count: AtomicU32,
    last_request: Mutex<Option<CompletionRequest>>,
}

impl MockProvider {
    pub fn new(responses: BTreeMap<String, String>, default_response: &str) -> Self {
        Self {
            responses,
            default_response: default_response.to_string(),
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Create a mock that always returns the same response.
    pub fn with_fixed_response(response: &str) -> Self {
        Self::new(BTreeMap::new(), response)
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl TextGenerator for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<CompletionResponse> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }

        let content = self
            .responses
            .iter()
            .find(|(key, _)| request.prompt.contains(key.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| self.default_response.clone());

        // Rough estimate: four characters per token.
        let prompt_tokens = (request.prompt.len() / 4) as u32;
        let completion_tokens = (content.len() / 4) as u32;

        Ok(CompletionResponse {
            content,
            model: request.model.clone(),
            token_usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            latency_ms: 1,
        })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo {
            id: "mock-model".into(),
            name: "Mock Model".into(),
            provider: "mock".into(),
            max_context: 100_000,
        }]
    }
}

/// Provider used when text generation is switched off.
///
/// Every call fails with [`ProviderError::Disabled`], so every gateway call
/// degrades to its deterministic fallback.
pub struct DisabledProvider;

#[async_trait]
impl TextGenerator for DisabledProvider {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _request: &CompletionRequest) -> anyhow::Result<CompletionResponse> {
        Err(ProviderError::Disabled.into())
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str) -> CompletionRequest {
        CompletionRequest {
            model: "mock".into(),
            system_prompt: None,
            prompt: prompt.into(),
            max_tokens: 100,
            temperature: 0.0,
            json_mode: false,
        }
    }

    #[tokio::test]
    async fn fixed_response() {
        let provider = MockProvider::with_fixed_response("Nice work.");
        let response = provider.complete(&request("anything")).await.unwrap();
        assert_eq!(response.content, "Nice work.");
        assert_eq!(provider.call_count(), 1);
        assert_eq!(provider.last_request().unwrap().prompt, "anything");
    }

    #[tokio::test]
    async fn prompt_matching() {
        let responses = BTreeMap::from([
            ("Grade this".to_string(), r#"{"score_percentage": 90}"#.to_string()),
            ("Student Performance".to_string(), "Keep going.".to_string()),
        ]);
        let provider = MockProvider::new(responses, "default");

        let graded = provider.complete(&request("Grade this student response")).await.unwrap();
        assert!(graded.content.contains("score_percentage"));

        let summary = provider
            .complete(&request("Student Performance Summary for s1"))
            .await
            .unwrap();
        assert_eq!(summary.content, "Keep going.");

        let other = provider.complete(&request("Write ONE mcq")).await.unwrap();
        assert_eq!(other.content, "default");
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn disabled_always_fails() {
        let err = DisabledProvider.complete(&request("x")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProviderError>(),
            Some(ProviderError::Disabled)
        ));
    }
}
