//! Error types for fetching, analysis, retries and orchestration.
//!
//! Each failure cause is classified as retryable or not through the
//! [`Retryable`] trait; [`crate::retry::RetryPolicy`] only retries the
//! retryable class.

use thiserror::Error;

/// Decides whether a failure is worth another attempt.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// HTTP statuses that signal a transient condition.
pub fn is_transient_status(status: Option<u16>) -> bool {
    match status {
        // No status means the request never completed (connect/reset).
        None => true,
        Some(code) => code == 429 || code == 408 || code >= 500,
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|s| format!(" with HTTP {}", s))
        .unwrap_or_default()
}

/// Invalid monitoring input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("company name must not be empty")]
    EmptyCompanyName,
}

/// Failure of the content fetch capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("fetching {target} timed out")]
    Timeout { target: String },

    #[error("fetching {target} failed{}: {message}", status_suffix(.status))]
    Http {
        target: String,
        status: Option<u16>,
        message: String,
    },

    #[error("fetching {target} was blocked: {message}")]
    Blocked { target: String, message: String },

    #[error("fetch service returned no content for {target}")]
    Empty { target: String },

    #[error("invalid fetch target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Empty { .. } => true,
            FetchError::Http { status, .. } => is_transient_status(*status),
            FetchError::Blocked { .. } | FetchError::InvalidTarget { .. } => false,
        }
    }
}

/// Failure of the language-model analysis capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("model quota exceeded: {message}")]
    QuotaExceeded { message: String },

    #[error("invalid model response: {message}")]
    InvalidResponse { message: String },

    #[error("model request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("model request failed{}: {message}", status_suffix(.status))]
    Request {
        status: Option<u16>,
        message: String,
    },

    #[error("unknown analysis type: {0}")]
    UnknownAnalysisType(String),
}

impl Retryable for AnalysisError {
    fn is_retryable(&self) -> bool {
        match self {
            AnalysisError::QuotaExceeded { .. }
            | AnalysisError::InvalidResponse { .. }
            | AnalysisError::Timeout { .. } => true,
            AnalysisError::Request { status, .. } => is_transient_status(*status),
            AnalysisError::UnknownAnalysisType(_) => false,
        }
    }
}

/// Terminal failure of a retried operation, annotated with the number of
/// attempts that were made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError<E: std::error::Error + 'static> {
    #[error("{source} (gave up after {attempts} attempts)")]
    Exhausted { attempts: u32, source: E },

    #[error("{source} (not retryable, attempt {attempts})")]
    NonRetryable { attempts: u32, source: E },
}

impl<E: std::error::Error + 'static> RetryError<E> {
    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::NonRetryable { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Run-level failures surfaced to the caller of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestrationError {
    #[error("monitoring run cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("every source failed for {company} and the summary failed: {summary_error}")]
    AllSourcesFailed {
        company: String,
        summary_error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_classification() {
        let timeout = FetchError::Timeout {
            target: "https://a".to_string(),
        };
        assert!(timeout.is_retryable());

        let throttled = FetchError::Http {
            target: "https://a".to_string(),
            status: Some(429),
            message: "slow down".to_string(),
        };
        assert!(throttled.is_retryable());

        let not_found = FetchError::Http {
            target: "https://a".to_string(),
            status: Some(404),
            message: "missing".to_string(),
        };
        assert!(!not_found.is_retryable());

        let blocked = FetchError::Blocked {
            target: "https://a".to_string(),
            message: "captcha".to_string(),
        };
        assert!(!blocked.is_retryable());
    }

    #[test]
    fn test_analysis_error_classification() {
        assert!(AnalysisError::QuotaExceeded {
            message: "429".to_string()
        }
        .is_retryable());
        assert!(AnalysisError::Timeout { seconds: 30 }.is_retryable());
        assert!(!AnalysisError::UnknownAnalysisType("poetry".to_string()).is_retryable());
        assert!(!AnalysisError::Request {
            status: Some(401),
            message: "bad key".to_string()
        }
        .is_retryable());
        assert!(AnalysisError::Request {
            status: Some(503),
            message: "overloaded".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = FetchError::Http {
            target: "https://a".to_string(),
            status: Some(502),
            message: "bad gateway".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "fetching https://a failed with HTTP 502: bad gateway"
        );

        let retry = RetryError::Exhausted {
            attempts: 3,
            source: AnalysisError::Timeout { seconds: 5 },
        };
        assert_eq!(
            retry.to_string(),
            "model request timed out after 5s (gave up after 3 attempts)"
        );
        assert_eq!(retry.attempts(), 3);
    }
}
