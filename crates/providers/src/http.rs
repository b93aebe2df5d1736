//! Shared HTTP plumbing for the provider adapters.

use kubrick_core::error::ProviderError;
use std::time::Duration;
use tracing::warn;

/// Build the HTTP client every adapter uses.
pub(crate) fn client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

pub(crate) fn network_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Map a non-success response to a [`ProviderError`].
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();
    if (200..300).contains(&status) {
        return Ok(response);
    }

    let retry_after_secs = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(5);
    let body = response.text().await.unwrap_or_default();
    warn!(provider, status, body = %body, "Provider returned error");

    Err(classify_status(status, body, retry_after_secs))
}

pub(crate) fn classify_status(status: u16, body: String, retry_after_secs: u64) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited { retry_after_secs },
        401 | 403 => ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        404 => ProviderError::ModelNotFound(body),
        400 | 413 if is_context_overflow(&body) => ProviderError::ContextLengthExceeded(body),
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

fn is_context_overflow(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    ["context_length", "context length", "maximum context", "too many tokens", "prompt is too long"]
        .iter()
        .any(|needle| lower.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(
            classify_status(429, String::new(), 12),
            ProviderError::RateLimited { retry_after_secs: 12 }
        ));
        assert!(matches!(
            classify_status(401, String::new(), 5),
            ProviderError::AuthenticationFailed(_)
        ));
        assert!(matches!(classify_status(404, "no such model".into(), 5), ProviderError::ModelNotFound(_)));
        assert!(matches!(
            classify_status(500, "oops".into(), 5),
            ProviderError::ApiError { status_code: 500, .. }
        ));
    }

    #[test]
    fn context_overflow_is_recognised() {
        let body = r#"{"error":{"code":"context_length_exceeded"}}"#.to_string();
        assert!(matches!(classify_status(400, body, 5), ProviderError::ContextLengthExceeded(_)));
        let body = "prompt is too long: 210000 tokens > 200000 maximum".to_string();
        assert!(matches!(classify_status(400, body, 5), ProviderError::ContextLengthExceeded(_)));
        assert!(matches!(
            classify_status(400, "bad request".into(), 5),
            ProviderError::ApiError { status_code: 400, .. }
        ));
    }
}
