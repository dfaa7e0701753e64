// src/classify.rs

//! Upstream failure classification.
//!
//! Status codes are authoritative: 429 and 503 always classify as rate-limit
//! or overload. Only when the status code does not decide the matter is the
//! error text searched (case-insensitively) for a fixed set of markers.

use serde::Serialize;
use std::fmt;

/// Transport status codes that always indicate rate limiting or overload.
pub const ROTATING_STATUS_CODES: [u16; 2] = [429, 503];

/// Error-text markers of rate limiting (first four) and overload (last two).
pub const ROTATING_MARKERS: [&str; 6] = [
    "rate limit",
    "quota",
    "limit exceeded",
    "too many requests",
    "overloaded",
    "unavailable",
];

const OVERLOAD_MARKERS: [&str; 2] = ["overloaded", "unavailable"];

/// Classification of a failed upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RateLimited,
    Overloaded,
    Other,
}

impl FailureKind {
    /// Whether switching to another credential can plausibly fix the failure.
    pub fn triggers_rotation(self) -> bool {
        matches!(self, Self::RateLimited | Self::Overloaded)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Overloaded => "overloaded",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed upstream call: the transport status (absent when the request
/// never got a response) and the error text or response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamFailure {
    pub status: Option<u16>,
    pub message: String,
}

impl UpstreamFailure {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Failure with an HTTP status.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(Some(status), message)
    }

    /// Failure that never produced an HTTP response (connect error, timeout).
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }

    pub fn kind(&self) -> FailureKind {
        classify_failure(self.status, &self.message)
    }
}

impl fmt::Display for UpstreamFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "upstream status {status}: {}", self.message),
            None => write!(f, "upstream transport error: {}", self.message),
        }
    }
}

/// Maps a failure to its classification.
pub fn classify_failure(status: Option<u16>, message: &str) -> FailureKind {
    match status {
        Some(429) => FailureKind::RateLimited,
        Some(503) => FailureKind::Overloaded,
        _ => classify_message(message),
    }
}

fn classify_message(message: &str) -> FailureKind {
    let lowered = message.to_lowercase();
    match ROTATING_MARKERS
        .iter()
        .find(|marker| lowered.contains(**marker))
    {
        Some(marker) if OVERLOAD_MARKERS.contains(marker) => FailureKind::Overloaded,
        Some(_) => FailureKind::RateLimited,
        None => FailureKind::Other,
    }
}

/// Tagged result of one upstream call, consumed by the retry loop.
#[derive(Debug)]
pub enum CallOutcome<T> {
    Success(T),
    RateLimited(UpstreamFailure),
    Overloaded(UpstreamFailure),
    Other(UpstreamFailure),
}

impl<T> CallOutcome<T> {
    pub fn classify(result: Result<T, UpstreamFailure>) -> Self {
        match result {
            Ok(payload) => Self::Success(payload),
            Err(failure) => match failure.kind() {
                FailureKind::RateLimited => Self::RateLimited(failure),
                FailureKind::Overloaded => Self::Overloaded(failure),
                FailureKind::Other => Self::Other(failure),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_authoritative() {
        assert_eq!(classify_failure(Some(429), ""), FailureKind::RateLimited);
        assert_eq!(classify_failure(Some(503), ""), FailureKind::Overloaded);
        // 429 wins even when the text mentions overload
        assert_eq!(
            classify_failure(Some(429), "model is overloaded"),
            FailureKind::RateLimited
        );
    }

    #[test]
    fn message_markers_are_case_insensitive() {
        let cases = [
            ("Rate Limit reached for requests", FailureKind::RateLimited),
            ("RESOURCE_EXHAUSTED: Quota exceeded", FailureKind::RateLimited),
            ("daily limit exceeded", FailureKind::RateLimited),
            ("Too Many Requests", FailureKind::RateLimited),
            ("The model is OVERLOADED. Please try again later.", FailureKind::Overloaded),
            ("Service Unavailable", FailureKind::Overloaded),
        ];
        for (message, expected) in cases {
            assert_eq!(classify_failure(Some(500), message), expected, "{message}");
            assert_eq!(classify_failure(None, message), expected, "{message}");
        }
    }

    #[test]
    fn generic_errors_are_other() {
        assert_eq!(
            classify_failure(Some(401), "API key not valid"),
            FailureKind::Other
        );
        assert_eq!(
            classify_failure(Some(400), "Request contains an invalid argument"),
            FailureKind::Other
        );
        assert_eq!(
            classify_failure(None, "connection refused"),
            FailureKind::Other
        );
        assert!(!FailureKind::Other.triggers_rotation());
    }

    #[test]
    fn call_outcome_tags_results() {
        assert!(matches!(
            CallOutcome::classify(Ok::<_, UpstreamFailure>(7)),
            CallOutcome::Success(7)
        ));
        assert!(matches!(
            CallOutcome::<()>::classify(Err(UpstreamFailure::http(503, "busy"))),
            CallOutcome::Overloaded(_)
        ));
        assert!(matches!(
            CallOutcome::<()>::classify(Err(UpstreamFailure::http(403, "denied"))),
            CallOutcome::Other(_)
        ));
    }
}
