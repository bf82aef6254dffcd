//! Error code constants.
//!
//! Error codes are organized by category:
//! - 1xxx: Sequence range errors
//! - 2xxx: Authentication/Authorization errors
//! - 3xxx: Validation errors
//! - 4xxx: Resource errors
//! - 5xxx: Internal/System errors
//! - 6xxx: Certification service errors

/// Error code type with semantic categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(i32);

impl ErrorCode {
    // ===== Sequence Range Errors (1xxx) =====

    /// New window overlaps an active range of the same scope.
    pub const RANGE_OVERLAP: Self = Self(1001);

    /// Range has no numbers left.
    pub const RANGE_EXHAUSTED: Self = Self(1002);

    /// Range state does not allow the operation.
    pub const INVALID_RANGE_STATE: Self = Self(1003);

    /// Range already handed out numbers.
    pub const RANGE_IN_USE: Self = Self(1004);

    // ===== Authentication/Authorization Errors (2xxx) =====

    /// Authentication required.
    pub const UNAUTHORIZED: Self = Self(2001);

    /// Insufficient permissions.
    pub const FORBIDDEN: Self = Self(2002);

    /// Certification service token expired or was rejected.
    pub const TOKEN_EXPIRED: Self = Self(2004);

    // ===== Validation Errors (3xxx) =====

    /// Bad request / invalid parameters.
    pub const BAD_REQUEST: Self = Self(3001);

    /// One or more fields failed validation.
    pub const VALIDATION_FAILED: Self = Self(3002);

    // ===== Resource Errors (4xxx) =====

    /// Resource not found.
    pub const NOT_FOUND: Self = Self(4001);

    // ===== Internal/System Errors (5xxx) =====

    /// Storage backend error.
    pub const STORAGE_ERROR: Self = Self(5001);

    /// Internal server error.
    pub const INTERNAL_ERROR: Self = Self(5002);

    /// Service unavailable.
    pub const SERVICE_UNAVAILABLE: Self = Self(5003);

    // ===== Certification Service Errors (6xxx) =====

    /// Certification service unreachable.
    pub const UPSTREAM_UNAVAILABLE: Self = Self(6001);

    /// Certification service did not answer in time.
    pub const UPSTREAM_TIMEOUT: Self = Self(6002);

    /// Certification service rejected the document.
    pub const UPSTREAM_REJECTED: Self = Self(6003);

    /// Certification service refused our credentials.
    pub const UPSTREAM_AUTH_FAILED: Self = Self(6004);

    /// Unexpected certification service response.
    pub const UPSTREAM_ERROR: Self = Self(6005);

    /// Get the error code as an i32.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Get the category of this error code.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self.0 {
            1000..=1999 => ErrorCategory::Sequence,
            2000..=2999 => ErrorCategory::Authentication,
            3000..=3999 => ErrorCategory::Validation,
            4000..=4999 => ErrorCategory::Resource,
            5000..=5999 => ErrorCategory::Internal,
            6000..=6999 => ErrorCategory::Upstream,
            _ => ErrorCategory::Unknown,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code.0
    }
}

/// Error category based on error code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Sequence range errors (1xxx).
    Sequence,
    /// Authentication/authorization errors (2xxx).
    Authentication,
    /// Validation errors (3xxx).
    Validation,
    /// Resource errors (4xxx).
    Resource,
    /// Internal/system errors (5xxx).
    Internal,
    /// Certification service errors (6xxx).
    Upstream,
    /// Unknown category.
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequence => write!(f, "sequence"),
            Self::Authentication => write!(f, "authentication"),
            Self::Validation => write!(f, "validation"),
            Self::Resource => write!(f, "resource"),
            Self::Internal => write!(f, "internal"),
            Self::Upstream => write!(f, "upstream"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::RANGE_OVERLAP.as_i32(), 1001);
        assert_eq!(ErrorCode::UNAUTHORIZED.as_i32(), 2001);
        assert_eq!(ErrorCode::VALIDATION_FAILED.as_i32(), 3002);
        assert_eq!(ErrorCode::NOT_FOUND.as_i32(), 4001);
        assert_eq!(ErrorCode::UPSTREAM_TIMEOUT.as_i32(), 6002);
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            ErrorCode::RANGE_EXHAUSTED.category(),
            ErrorCategory::Sequence
        );
        assert_eq!(
            ErrorCode::TOKEN_EXPIRED.category(),
            ErrorCategory::Authentication
        );
        assert_eq!(ErrorCode::BAD_REQUEST.category(), ErrorCategory::Validation);
        assert_eq!(ErrorCode::NOT_FOUND.category(), ErrorCategory::Resource);
        assert_eq!(
            ErrorCode::INTERNAL_ERROR.category(),
            ErrorCategory::Internal
        );
        assert_eq!(
            ErrorCode::UPSTREAM_UNAVAILABLE.category(),
            ErrorCategory::Upstream
        );
    }
}
