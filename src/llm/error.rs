//! LLM error types.

use thiserror::Error;

/// Errors that can occur when making LLM API calls.
#[derive(Debug, Error)]
pub enum LLMError {
    /// HTTP request failed
    #[error("http request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// API returned an error response
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The provider rejected the credential (401/403)
    #[error("authentication failed (status {status}): {message}")]
    Authentication { status: u16, message: String },

    /// Rate limited (429)
    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimit { retry_after: Option<u64> },
}

/// Turn a non-success HTTP response into an `LLMError`.
///
/// Returns the response untouched when the status is a success.
pub async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, LLMError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status.as_u16() == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        return Err(LLMError::RateLimit { retry_after });
    }

    let code = status.as_u16();
    let message = response.text().await.unwrap_or_default();
    if code == 401 || code == 403 {
        return Err(LLMError::Authentication {
            status: code,
            message,
        });
    }
    Err(LLMError::Api {
        status: code,
        message,
    })
}

/// An `{"error": {...}}` object sent inside a successful event stream.
///
/// OpenAI puts a string in `code`, Gemini an HTTP status number; only the
/// numeric form is kept as the status.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct StreamErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: String,
}

impl From<StreamErrorBody> for LLMError {
    fn from(body: StreamErrorBody) -> Self {
        let status = body
            .code
            .as_ref()
            .and_then(serde_json::Value::as_u64)
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or(200);
        LLMError::Api {
            status,
            message: body.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LLMError::Api {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "api error (status 500): boom");

        let err = LLMError::Authentication {
            status: 401,
            message: "invalid key".to_string(),
        };
        assert!(err.to_string().starts_with("authentication failed"));

        let err = LLMError::RateLimit {
            retry_after: Some(3),
        };
        assert_eq!(err.to_string(), "rate limited (retry after Some(3)s)");
    }

    #[test]
    fn test_stream_error_body_status() {
        let body: StreamErrorBody = serde_json::from_str(
            r#"{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}"#,
        )
        .unwrap();
        assert!(matches!(
            LLMError::from(body),
            LLMError::Api { status: 429, message } if message == "Resource has been exhausted"
        ));

        let body: StreamErrorBody = serde_json::from_str(
            r#"{"message":"You exceeded your current quota","type":"insufficient_quota","code":"insufficient_quota"}"#,
        )
        .unwrap();
        assert!(matches!(LLMError::from(body), LLMError::Api { status: 200, .. }));
    }
}
