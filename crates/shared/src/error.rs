//! Error taxonomy shared by the request client and the event stream.

use std::time::Duration;

use thiserror::Error;

/// Error returned by every request/response call against the backend.
///
/// Transport failures (`Network`, `Http`) are kept apart from envelopes the
/// backend answered with `success: false` (`Application`), so callers can tell
/// "the backend is unreachable" from "the backend refused the operation".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never produced a response (connection refused, reset, DNS).
    #[error("Network error: {0}")]
    Network(String),
    /// The backend answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    /// The backend answered 2xx but flagged the envelope as unsuccessful.
    #[error("{0}")]
    Application(String),
    /// The response body did not match the expected envelope or payload.
    #[error("Deserialization error: {0}")]
    Deserialize(String),
    /// No response arrived within the configured timeout.
    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    /// The caller cancelled the request.
    #[error("Request aborted")]
    Aborted,
}

impl ApiError {
    /// Whether the failure was a caller-initiated cancellation rather than a
    /// real failure. Cancellations should not be reported as errors.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ApiError::Aborted)
    }

    /// HTTP status code, if the failure came from a non-2xx response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Why an inbound WebSocket frame could not be turned into a [`crate::ServerEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    NotJson(String),
    #[error("frame has no string `type` field")]
    MissingType,
    #[error("payload of `{event_type}` does not match its schema: {reason}")]
    Payload { event_type: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_text_carries_status_code() {
        let err = ApiError::Http {
            status: 503,
            body: "backend starting".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503: backend starting");
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn application_error_is_the_backend_message() {
        let err = ApiError::Application("display not found".to_string());
        assert_eq!(err.to_string(), "display not found");
        assert!(!err.is_cancellation());
    }

    #[test]
    fn only_aborts_count_as_cancellation() {
        assert!(ApiError::Aborted.is_cancellation());
        assert!(!ApiError::Timeout(Duration::from_millis(10)).is_cancellation());
        assert_eq!(
            ApiError::Timeout(Duration::from_millis(1500)).to_string(),
            "Request timed out after 1500ms"
        );
    }
}
