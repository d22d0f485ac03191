//! Shared utilities for handling API responses across providers

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::ProviderError;

const DEFAULT_RATE_LIMIT_RETRY_MS: u64 = 60_000;

/// Extract retry-after delay from response headers
/// Returns delay in milliseconds
pub fn extract_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(|secs| secs * 1000)
}

/// Pass a successful response through; map anything else to a [`ProviderError`]
pub async fn error_for_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = extract_retry_after(response.headers());
    let message = parse_error_body(response).await;
    warn!(provider, status = status.as_u16(), %message, "Provider returned an error");

    Err(match status.as_u16() {
        401 | 403 => ProviderError::AuthenticationFailed(message),
        429 => ProviderError::RateLimited {
            retry_after_ms: retry_after.unwrap_or(DEFAULT_RATE_LIMIT_RETRY_MS),
        },
        503 | 529 => ProviderError::Unavailable {
            provider: provider.to_string(),
        },
        code => ProviderError::Status {
            status: code,
            message,
        },
    })
}

/// Parse error message from API error response body
async fn parse_error_body(response: reqwest::Response) -> String {
    match response.text().await {
        Ok(text) => describe_error_body(&text),
        Err(_) => "failed to read error response body".to_string(),
    }
}

fn describe_error_body(text: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return text.trim().to_string();
    };

    // OpenAI and Anthropic nest the detail under "error"; Ollama sends a bare string
    let detail = match value.get("error") {
        Some(Value::String(message)) => return message.clone(),
        Some(nested @ Value::Object(_)) => nested.clone(),
        _ => value,
    };

    match serde_json::from_value::<ErrorDetail>(detail) {
        Ok(detail) if !detail.is_empty() => detail.to_string(),
        _ => text.trim().to_string(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    #[serde(default, alias = "type")]
    error_type: Option<String>,
    #[serde(default, alias = "message")]
    error_message: Option<String>,
    #[serde(default, alias = "code")]
    error_code: Option<Value>,
}

impl ErrorDetail {
    fn is_empty(&self) -> bool {
        self.error_type.is_none() && self.error_message.is_none() && self.error_code.is_none()
    }
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();

        if let Some(code) = &self.error_code {
            match code {
                Value::String(code) => parts.push(format!("code: {}", code)),
                Value::Null => {}
                other => parts.push(format!("code: {}", other)),
            }
        }
        if let Some(error_type) = &self.error_type {
            parts.push(format!("type: {}", error_type));
        }
        if let Some(message) = &self.error_message {
            parts.push(format!("message: {}", message));
        }

        if parts.is_empty() {
            write!(f, "unknown error")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}
