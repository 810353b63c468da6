//! The upstream text-generation seam.
//!
//! `TextGenerator` is implemented by the `skillcheck-providers` crate. The
//! engines never call it directly; they go through [`crate::gateway::Gateway`],
//! which turns every failure into a degraded outcome.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Text generator trait
// ---------------------------------------------------------------------------

/// Trait for LLM backends that complete a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Human-readable provider name (e.g. "openai").
    fn name(&self) -> &str;

    /// Send one completion request.
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<CompletionResponse>;

    /// List available models for this provider.
    fn available_models(&self) -> Vec<ModelInfo>;
}

/// Request for a single completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier (e.g. "llama-3.1-8b-instant").
    pub model: String,
    /// Optional system prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// The user prompt.
    pub prompt: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// Ask the backend for a JSON object response where supported.
    #[serde(default)]
    pub json_mode: bool,
}

/// Response from a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The raw response content.
    pub content: String,
    /// Model that actually generated the response.
    pub model: String,
    /// Token usage.
    pub token_usage: TokenUsage,
    /// Latency in milliseconds.
    pub latency_ms: u64,
}

/// Token accounting reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Information about an available model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier.
    pub id: String,
    /// Human-readable model name.
    pub name: String,
    /// Provider name.
    pub provider: String,
    /// Maximum context window size in tokens.
    pub max_context: u32,
}

// ---------------------------------------------------------------------------
// JSON extraction
// ---------------------------------------------------------------------------

/// Extract the JSON document from a possibly Markdown-wrapped LLM response.
///
/// Handles:
/// - ```json``` blocks (preferred, first one wins)
/// - Generic ``` blocks
/// - Unclosed blocks from truncated responses
/// - Prose around a bare object, by taking the outermost `{...}` span
pub fn extract_json_payload(response: &str) -> String {
    let mut json_blocks = Vec::new();
    let mut generic_blocks = Vec::new();
    let mut in_block = false;
    let mut is_json_block = false;
    let mut is_generic_block = false;
    let mut current_block = String::new();

    for line in response.lines() {
        let trimmed = line.trim();

        if !in_block && trimmed.starts_with("```") {
            in_block = true;
            let lang = trimmed.trim_start_matches('`').trim().to_lowercase();
            is_json_block = lang == "json";
            is_generic_block = lang.is_empty();
            current_block.clear();
            continue;
        }

        if in_block && trimmed == "```" {
            in_block = false;
            if is_json_block {
                json_blocks.push(current_block.clone());
            } else if is_generic_block {
                generic_blocks.push(current_block.clone());
            }
            current_block.clear();
            continue;
        }

        if in_block {
            if !current_block.is_empty() {
                current_block.push('\n');
            }
            current_block.push_str(line);
        }
    }

    if in_block && !current_block.is_empty() {
        if is_json_block {
            json_blocks.push(current_block);
        } else if is_generic_block {
            generic_blocks.push(current_block);
        }
    }

    if let Some(block) = json_blocks.into_iter().next() {
        return block.trim().to_string();
    }
    if let Some(block) = generic_blocks.into_iter().next() {
        return block.trim().to_string();
    }

    let raw = response.trim();
    match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => raw[start..=end].to_string(),
        _ => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_block() {
        let input = "Here you go:\n\n```json\n{\"score_percentage\": 80}\n```\n\nHope it helps!";
        assert_eq!(extract_json_payload(input), "{\"score_percentage\": 80}");
    }

    #[test]
    fn extract_prefers_json_over_generic() {
        let input = "```\n{\"a\": 1}\n```\n\n```json\n{\"b\": 2}\n```\n";
        assert_eq!(extract_json_payload(input), "{\"b\": 2}");
    }

    #[test]
    fn extract_generic_block_fallback() {
        let input = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_json_payload(input), "{\"a\": 1}");
    }

    #[test]
    fn extract_bare_object_inside_prose() {
        let input = "Sure. {\"feedback\": \"ok\"} Let me know.";
        assert_eq!(extract_json_payload(input), "{\"feedback\": \"ok\"}");
    }

    #[test]
    fn extract_truncated_unclosed_block() {
        let input = "```json\n{\"score_percentage\": 40";
        assert_eq!(extract_json_payload(input), "{\"score_percentage\": 40");
    }

    #[test]
    fn extract_plain_text_returned_as_is() {
        assert_eq!(extract_json_payload("  no json here  "), "no json here");
    }
}
