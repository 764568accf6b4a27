//! Azure Resource Manager error types and categorization.
//!
//! Every remote failure is an [`ArmError`]. The batch driver does not retry anything, but the
//! category of a failure is still useful to the operator: a throttled or timed-out resource is
//! worth a rerun, a permission error is not.

use super::credentials::CredentialError;
use super::resource::ResourceError;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArmError {
    /// ARM answered with a non-success status
    #[error("{code}: {message} (HTTP {status})")]
    Api {
        status: u16,
        code: String,
        message: String,
        /// Hint from the Retry-After header if present
        retry_after: Option<Duration>,
    },
    /// The request never produced a response
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// A success response whose body could not be used
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
    #[error("authentication failed: {0}")]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

impl ArmError {
    /// Build an API error from a status code and an ARM error body
    pub fn from_response(status: u16, body: &Value, retry_after: Option<Duration>) -> Self {
        let (code, message) = parse_arm_error(body);
        ArmError::Api {
            status,
            code,
            message: truncate_message(&message, 300),
            retry_after,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        categorize(self)
    }
}

/// Categorized error types for ARM failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    /// HTTP 429
    Throttled {
        error_code: String,
        retry_after: Option<Duration>,
    },
    Timeout,
    NetworkError { message: String },
    /// HTTP 5xx
    ServiceUnavailable { message: String },
    /// HTTP 404, the resource or resource group is gone
    NotFound { message: String },
    /// HTTP 409/412, a concurrent update won
    Conflict { message: String },
    /// Permissions, validation and everything else
    NonRetryable {
        code: String,
        message: String,
        is_permission_error: bool,
    },
}

impl ErrorCategory {
    /// Returns true if rerunning the tool may succeed without any other change
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Throttled { .. }
                | ErrorCategory::Timeout
                | ErrorCategory::NetworkError { .. }
                | ErrorCategory::ServiceUnavailable { .. }
                | ErrorCategory::Conflict { .. }
        )
    }

    /// Short label for the run summary
    pub fn short_label(&self) -> &'static str {
        match self {
            ErrorCategory::Throttled { .. } => "throttled",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::NetworkError { .. } => "network",
            ErrorCategory::ServiceUnavailable { .. } => "unavailable",
            ErrorCategory::NotFound { .. } => "not found",
            ErrorCategory::Conflict { .. } => "conflict",
            ErrorCategory::NonRetryable {
                is_permission_error: true,
                ..
            } => "permission denied",
            ErrorCategory::NonRetryable { .. } => "error",
        }
    }
}

/// Classify an ARM failure
pub fn categorize(error: &ArmError) -> ErrorCategory {
    match error {
        ArmError::Api {
            status,
            code,
            message,
            retry_after,
        } => match *status {
            429 => ErrorCategory::Throttled {
                error_code: code.clone(),
                retry_after: *retry_after,
            },
            408 | 504 => ErrorCategory::Timeout,
            404 => ErrorCategory::NotFound {
                message: message.clone(),
            },
            409 | 412 => ErrorCategory::Conflict {
                message: message.clone(),
            },
            500..=599 => ErrorCategory::ServiceUnavailable {
                message: message.clone(),
            },
            _ => ErrorCategory::NonRetryable {
                code: code.clone(),
                message: message.clone(),
                is_permission_error: *status == 401
                    || *status == 403
                    || code.contains("AuthorizationFailed")
                    || code.contains("InvalidAuthenticationToken"),
            },
        },
        ArmError::Transport { source, .. } => {
            if source.is_timeout() {
                ErrorCategory::Timeout
            } else {
                ErrorCategory::NetworkError {
                    message: truncate_message(&source.to_string(), 100),
                }
            }
        }
        ArmError::Decode { message, .. } => ErrorCategory::NonRetryable {
            code: "InvalidResponse".to_string(),
            message: truncate_message(message, 200),
            is_permission_error: false,
        },
        ArmError::Credential(e) => ErrorCategory::NonRetryable {
            code: "AuthenticationFailed".to_string(),
            message: truncate_message(&e.to_string(), 200),
            is_permission_error: true,
        },
        ArmError::Resource(e) => ErrorCategory::NonRetryable {
            code: "InvalidResource".to_string(),
            message: e.to_string(),
            is_permission_error: false,
        },
    }
}

/// Extract `code` and `message` from an ARM error body.
///
/// ARM uses `{"error": {"code", "message"}}`; a few older endpoints capitalize `Error`
/// or put the fields at the top level.
pub fn parse_arm_error(body: &Value) -> (String, String) {
    let err = body
        .get("error")
        .or_else(|| body.get("Error"))
        .unwrap_or(body);
    let code = err
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .to_string();
    let message = err
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| match body {
            Value::Null => "no response body".to_string(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
    (code, message)
}

/// Parse a Retry-After header given in whole seconds
pub fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Truncate a message to max characters, adding ellipsis if truncated
fn truncate_message(msg: &str, max_len: usize) -> String {
    if msg.chars().count() <= max_len {
        msg.to_string()
    } else {
        let head: String = msg.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
