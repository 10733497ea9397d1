//! Result and error types for Vigia.

use crate::locator::CandidateAttempt;
use thiserror::Error;

/// Result type for Vigia operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors that can occur while driving a scenario
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Every candidate selector was tried and none became visible
    #[error("No visible element for candidates [{}]: {}", .candidates.join(", "), describe_attempts(.attempts))]
    ElementNotFound {
        /// Candidate selectors, in the order they were tried
        candidates: Vec<String>,
        /// What was observed for each candidate
        attempts: Vec<CandidateAttempt>,
    },

    /// A selector could not be parsed by the browser
    #[error("Malformed selector `{selector}`: {message}")]
    SelectorSyntax {
        /// Offending selector
        selector: String,
        /// Parser message
        message: String,
    },

    /// The login form showed an error banner
    #[error("Authentication rejected: {banner}")]
    AuthenticationRejected {
        /// Text of the error banner
        banner: String,
    },

    /// Login neither completed nor was visibly rejected in time
    #[error("Authentication did not complete within {ms}ms (still at {url})")]
    AuthenticationTimeout {
        /// Timeout in milliseconds
        ms: u64,
        /// Location when the wait gave up
        url: String,
    },

    /// `login` was called on a session that is already authenticated
    #[error("Session is already authenticated as {identifier}")]
    AlreadyAuthenticated {
        /// Identifier of the existing login
        identifier: String,
    },

    /// Expected condition not met
    #[error("Assertion failed: {message}")]
    AssertionFailure {
        /// Error message
        message: String,
    },

    /// Navigation did not finish in time
    #[error("Navigation to {url} timed out after {ms}ms")]
    NavigationTimeout {
        /// Target URL
        url: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Device profile with a zero dimension
    #[error("Invalid device profile `{name}`: {width}x{height}")]
    InvalidProfile {
        /// Profile name
        name: String,
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// Device name not present in the matrix
    #[error("Unknown device `{name}`")]
    UnknownDevice {
        /// Requested name
        name: String,
    },

    /// Browser launch or protocol error
    #[error("Browser error: {message}")]
    Browser {
        /// Error message
        message: String,
    },

    /// Screenshot error
    #[error("Screenshot failed: {message}")]
    Screenshot {
        /// Error message
        message: String,
    },

    /// Suite file failed validation
    #[error("Invalid suite: {message}")]
    Suite {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl HarnessError {
    /// Create a browser error
    #[must_use]
    pub fn browser(message: impl Into<String>) -> Self {
        Self::Browser {
            message: message.into(),
        }
    }

    /// Create a suite validation error
    #[must_use]
    pub fn suite(message: impl Into<String>) -> Self {
        Self::Suite {
            message: message.into(),
        }
    }

    /// Whether the error leaves the scenario unable to continue.
    ///
    /// Missing elements and malformed selectors fail one step; a page that
    /// never loaded or a login that did not happen fails everything after it.
    #[must_use]
    pub const fn aborts_scenario(&self) -> bool {
        matches!(
            self,
            Self::NavigationTimeout { .. }
                | Self::Navigation { .. }
                | Self::AuthenticationRejected { .. }
                | Self::AuthenticationTimeout { .. }
                | Self::AlreadyAuthenticated { .. }
                | Self::InvalidProfile { .. }
        )
    }
}

fn describe_attempts(attempts: &[CandidateAttempt]) -> String {
    if attempts.is_empty() {
        return "nothing tried".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::locator::CandidateOutcome;

    #[test]
    fn test_element_not_found_lists_every_candidate() {
        let err = HarnessError::ElementNotFound {
            candidates: vec!["#email".into(), "input[name=user]".into()],
            attempts: vec![
                CandidateAttempt::new("#email", CandidateOutcome::NoMatch),
                CandidateAttempt::new("input[name=user]", CandidateOutcome::Hidden { matches: 2 }),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("#email"));
        assert!(text.contains("input[name=user]"));
        assert!(text.contains("2 hidden"));
    }

    #[test]
    fn test_rejected_carries_banner() {
        let err = HarnessError::AuthenticationRejected {
            banner: "Incorrect password".into(),
        };
        assert!(err.to_string().contains("Incorrect password"));
    }

    #[test]
    fn test_aborting_errors() {
        let missing = HarnessError::ElementNotFound {
            candidates: vec!["#save".into()],
            attempts: vec![],
        };
        assert!(!missing.aborts_scenario());
        assert!(HarnessError::NavigationTimeout {
            url: "https://app.test/admin".into(),
            ms: 30_000,
        }
        .aborts_scenario());
        assert!(HarnessError::AuthenticationRejected {
            banner: "nope".into(),
        }
        .aborts_scenario());
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: HarnessError = io_err.into();
        assert!(err.to_string().contains("I/O"));
    }
}
