//! Provider error mapping.
//!
//! [`ProviderError`] itself is defined in `skillcheck-core` so the gateway
//! can classify failures; this module maps HTTP outcomes onto it.

pub use skillcheck_core::error::ProviderError;

/// Seconds assumed when a 429 carries no usable `retry-after` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Map a transport failure.
pub(crate) fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(timeout_secs)
    } else {
        ProviderError::NetworkError(err.to_string())
    }
}

/// Turn a non-success response into an error; pass successes through.
///
/// `extract_message` pulls a readable message out of a provider-specific
/// error body.
pub(crate) async fn check_status(
    response: reqwest::Response,
    model: &str,
    extract_message: fn(&str) -> Option<String>,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();
    if status < 400 {
        return Ok(response);
    }
    if status == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(ProviderError::RateLimited {
            retry_after_ms: retry_after * 1000,
        });
    }

    let body = response.text().await.unwrap_or_default();
    let message = extract_message(&body).unwrap_or(body);
    Err(match status {
        401 | 403 => ProviderError::AuthenticationFailed(message),
        404 => ProviderError::ModelNotFound(model.to_string()),
        _ => ProviderError::ApiError { status, message },
    })
}

/// Error body shape shared by the OpenAI-compatible and Anthropic APIs:
/// `{"error": {"message": "..."}}`.
pub(crate) fn nested_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_message_is_extracted() {
        let body = r#"{"error": {"type": "invalid_request_error", "message": "bad model"}}"#;
        assert_eq!(nested_error_message(body).as_deref(), Some("bad model"));
        assert_eq!(nested_error_message("plain text"), None);
    }
}
