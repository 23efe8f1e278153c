//! Error types for formatting and publishing.

use amber_relay_core::ConnectionId;
use amber_relay_workflow::Platform;
use std::fmt;
use std::time::Duration;

/// Content that cannot be made compliant with a platform's constraints.
///
/// Required fields are never silently dropped: formatting fails instead of
/// publishing non-compliant content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Nothing publishable remains after formatting.
    EmptyContent { platform: Platform },
    /// The platform requires media and the content carries none.
    MediaRequired { platform: Platform },
    /// The text still exceeds the platform limit (externally-built posts).
    TextTooLong {
        platform: Platform,
        length: usize,
        limit: usize,
    },
    /// Too many media attachments (externally-built posts).
    TooManyMedia {
        platform: Platform,
        count: usize,
        limit: usize,
    },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyContent { platform } => {
                write!(f, "no publishable content remains for {platform}")
            }
            Self::MediaRequired { platform } => {
                write!(f, "{platform} requires at least one media attachment")
            }
            Self::TextTooLong {
                platform,
                length,
                limit,
            } => {
                write!(
                    f,
                    "text length {length} exceeds the {platform} limit of {limit}"
                )
            }
            Self::TooManyMedia {
                platform,
                count,
                limit,
            } => {
                write!(
                    f,
                    "{count} media attachments exceed the {platform} limit of {limit}"
                )
            }
        }
    }
}

impl std::error::Error for FormatError {}

/// Classified failures from a publish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// Retriable: rate limits, server errors, network failures.
    Transient {
        reason: String,
        /// Server-suggested wait before the next attempt.
        retry_after: Option<Duration>,
    },
    /// Not retriable: invalid or expired credentials, client errors.
    /// Carries an actionable message for the workflow owner.
    Permanent { reason: String },
}

impl PublishError {
    /// Classifies an HTTP status into a publish error.
    ///
    /// 429 and 5xx are transient; any other 4xx is permanent. 401/403 get
    /// the reconnect guidance the account owner needs.
    #[must_use]
    pub fn from_http_status(status: u16, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match status {
            429 => Self::Transient {
                reason: format!("rate limited ({detail})"),
                retry_after: None,
            },
            500..=599 => Self::Transient {
                reason: format!("server error {status} ({detail})"),
                retry_after: None,
            },
            401 | 403 => Self::Permanent {
                reason: format!(
                    "authorization failed ({status}): reconnect the account ({detail})"
                ),
            },
            _ => Self::Permanent {
                reason: format!("request rejected ({status}): {detail}"),
            },
        }
    }

    /// Returns true if the failure may succeed on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient { reason, .. } => write!(f, "transient publish failure: {reason}"),
            Self::Permanent { reason } => write!(f, "publish failed: {reason}"),
        }
    }
}

impl std::error::Error for PublishError {}

/// Errors from connection lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// No connection registered under this ID.
    NotFound { id: ConnectionId },
    /// The lookup collaborator failed.
    LookupFailed { message: String },
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "connection not found: {id}"),
            Self::LookupFailed { message } => write!(f, "connection lookup failed: {message}"),
        }
    }
}

impl std::error::Error for ConnectionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_is_transient() {
        let err = PublishError::from_http_status(429, "slow down");
        assert!(err.is_transient());
    }

    #[test]
    fn server_error_is_transient() {
        assert!(PublishError::from_http_status(503, "unavailable").is_transient());
    }

    #[test]
    fn unauthorized_is_permanent_with_reconnect_guidance() {
        let err = PublishError::from_http_status(401, "token expired");
        assert!(!err.is_transient());
        assert!(err.to_string().contains("reconnect the account"));
    }

    #[test]
    fn bad_request_is_permanent() {
        assert!(!PublishError::from_http_status(400, "bad body").is_transient());
    }

    #[test]
    fn format_error_display() {
        let err = FormatError::MediaRequired {
            platform: Platform::Instagram,
        };
        assert!(err.to_string().contains("instagram"));
    }
}
