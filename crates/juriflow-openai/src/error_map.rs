//! Classification of `OpenAI` client failures into the core taxonomy.

use async_openai::error::OpenAIError;

use juriflow::error::Error;

/// Map a provider error to the gateway-visible taxonomy. Rate limits and
/// timeouts become the retryable variants; everything else is `Upstream`.
pub fn classify(err: &OpenAIError) -> Error {
    let rendered = err.to_string();
    let lower = rendered.to_ascii_lowercase();

    if lower.contains("rate limit") || lower.contains("rate_limit") || lower.contains("429") {
        Error::rate_limit(format!("OpenAI API error: {rendered}"))
    } else if lower.contains("timed out") || lower.contains("timeout") {
        Error::timeout(format!("OpenAI API error: {rendered}"))
    } else {
        Error::upstream(format!("OpenAI API error: {rendered}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_message_is_retryable() {
        let err = OpenAIError::InvalidArgument(
            "429: Rate limit reached for gpt-4 in organization org-x".to_string(),
        );
        let classified = classify(&err);
        assert!(matches!(classified, Error::RateLimitExceeded(_)));
        assert!(classified.is_retryable());
    }

    #[test]
    fn timeout_message_is_retryable() {
        let err = OpenAIError::InvalidArgument("request timed out".to_string());
        let classified = classify(&err);
        assert!(matches!(classified, Error::Timeout(_)));
        assert!(classified.is_retryable());
    }

    #[test]
    fn other_errors_are_upstream() {
        let err = OpenAIError::InvalidArgument("model not found".to_string());
        let classified = classify(&err);
        assert!(matches!(classified, Error::Upstream(_)));
        assert!(!classified.is_retryable());
    }
}
