//! OpenvCloud client error types

use thiserror::Error;

/// OpenvCloud client errors
#[derive(Error, Debug)]
pub enum OvcError {
    #[error("OVC authentication error")]
    Authentication,

    #[error("Malformed JWT: {0}")]
    MalformedCredential(String),

    #[error("JWT is expired and cannot be refreshed")]
    ExpiredCredential,

    #[error("Identity provider error: {0}")]
    IdentityProvider(String),

    #[error("Failed to encode request body: {0}")]
    Encoding(String),

    #[error("Request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task was not successful taskID: {task}: {diagnostic}")]
    TaskFailed {
        task: String,
        diagnostic: serde_json::Value,
    },

    #[error(
        "Task response is incorrect taskId {task}, expected response in form [True/False, taskResult]: {detail}"
    )]
    ProtocolViolation { task: String, detail: String },

    #[error("Job timeout: {0}")]
    Timeout(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OvcError {
    /// Whether re-running the whole operation may succeed.
    ///
    /// Transient server answers never surface here; they are retried inside
    /// the dispatcher. What remains retryable is a deadline that ran out or a
    /// transport failure that exhausted its attempts.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OvcError::Timeout(_) | OvcError::Http(_))
    }
}

pub type Result<T> = std::result::Result<T, OvcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_failed_carries_diagnostic() {
        let err = OvcError::TaskFailed {
            task: "abc".to_string(),
            diagnostic: serde_json::json!("disk full"),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn test_is_retryable() {
        assert!(OvcError::Timeout("t".into()).is_retryable());
        assert!(!OvcError::Authentication.is_retryable());
        assert!(!OvcError::TaskNotFound("t".into()).is_retryable());
    }
}
