//! Transport-level failures talking to the certification service.

use std::time::Duration;

/// A call to the certification service failed before a usable answer arrived.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection refused.
    #[error("connection refused: {0}")]
    Refused(String),

    /// Host name could not be resolved.
    #[error("DNS lookup failed: {0}")]
    Dns(String),

    /// Connection dropped mid-request.
    #[error("connection reset: {0}")]
    Reset(String),

    /// No answer within the deadline. The remote side may still complete the call.
    #[error("no response within {}s", .0.as_secs())]
    Timeout(Duration),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Http {
        /// Status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// Response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),

    /// Anything else.
    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// The service is not reachable at all.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Refused(_) | Self::Dns(_) | Self::Reset(_))
    }

    /// The request may or may not have been processed.
    #[must_use]
    pub const fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// The bearer token was not accepted.
    #[must_use]
    pub const fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::Http { status: 401 | 403, .. })
    }
}

const MAX_BODY_CHARS: usize = 512;

/// Keep error bodies short enough for logs.
pub(crate) fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_BODY_CHARS {
        body.to_string()
    } else {
        let mut short: String = body.chars().take(MAX_BODY_CHARS).collect();
        short.push('…');
        short
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(TransportError::Dns("x".into()).is_unavailable());
        assert!(TransportError::Reset("x".into()).is_unavailable());
        assert!(!TransportError::Timeout(Duration::from_secs(1)).is_unavailable());
        assert!(TransportError::Timeout(Duration::from_secs(1)).is_ambiguous());
        assert!(
            TransportError::Http {
                status: 401,
                body: String::new()
            }
            .is_auth_rejection()
        );
        assert!(
            !TransportError::Http {
                status: 500,
                body: String::new()
            }
            .is_auth_rejection()
        );
    }

    #[test]
    fn test_truncate_body() {
        let long = "a".repeat(600);
        let short = truncate_body(&long);
        assert_eq!(short.chars().count(), MAX_BODY_CHARS + 1);
        assert_eq!(truncate_body("ok"), "ok");
    }
}
