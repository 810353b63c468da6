//! Caller-side retry around the gateway.
//!
//! Only transient degradation (timeouts, rate limits, 5xx, transport errors)
//! is retried. The last outcome is returned as-is, so a call that keeps
//! failing still ends in the gateway's deterministic fallback.

use std::time::Duration;

use crate::gateway::{Gateway, GenerationOutcome};
use crate::prompts::{PromptKind, PromptParams};
use crate::settings::RetryPolicy;

/// Call the gateway up to `policy.max_attempts` times with exponential backoff.
pub async fn generate_with_retry(
    gateway: &Gateway,
    kind: PromptKind,
    params: &PromptParams,
    timeout: Duration,
    policy: &RetryPolicy,
) -> GenerationOutcome {
    let mut backoff = policy.initial_backoff;
    let mut attempt = 1;

    loop {
        let outcome = gateway.generate(kind, params, timeout).await;
        let GenerationOutcome::Degraded { reason, .. } = &outcome else {
            return outcome;
        };
        if attempt >= policy.max_attempts || !reason.is_transient() {
            return outcome;
        }

        let wait = reason.retry_after().unwrap_or(backoff).min(policy.max_backoff);
        tracing::debug!(%kind, attempt, wait_ms = wait.as_millis() as u64, "retrying generation");
        tokio::time::sleep(wait).await;

        backoff = (backoff * 2).min(policy.max_backoff);
        attempt += 1;
    }
}
