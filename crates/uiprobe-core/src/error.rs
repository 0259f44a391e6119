//! AI-friendly error types with suggestions.
//!
//! Parse failures never show up here: the parser absorbs them into a
//! degraded snapshot. Everything else that can go wrong while querying or
//! driving a device is reported as an [`ApiError`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Error codes for failed operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    Timeout,
    InvalidSelector,
    InvalidInput,
    DeviceError,
    CommandFailed,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::NotFound => write!(f, "NOT_FOUND"),
            ErrorCode::Timeout => write!(f, "TIMEOUT"),
            ErrorCode::InvalidSelector => write!(f, "INVALID_SELECTOR"),
            ErrorCode::InvalidInput => write!(f, "INVALID_INPUT"),
            ErrorCode::DeviceError => write!(f, "DEVICE_ERROR"),
            ErrorCode::CommandFailed => write!(f, "COMMAND_FAILED"),
        }
    }
}

/// An error with AI-friendly context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub suggestion: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (hint: {})", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// A required single match was requested but the selector matched nothing.
    pub fn not_found(selector: &str) -> Self {
        Self {
            code: ErrorCode::NotFound,
            message: format!("No element matches selector {}", selector),
            suggestion: Some(
                "Run 'uiprobe dump' to inspect the current screen, or use 'uiprobe wait-for' if the element appears later".into(),
            ),
        }
    }

    /// A wait's condition never held within the allotted time.
    pub fn timeout(what: &str, elapsed: Duration) -> Self {
        Self {
            code: ErrorCode::Timeout,
            message: format!(
                "Timeout waiting for {} after {}ms",
                what,
                elapsed.as_millis()
            ),
            suggestion: Some(
                "The condition never held. Try increasing --timeout or check that the selector matches the screen you expect".into(),
            ),
        }
    }

    /// Timeout that also reports the last capture failure seen while polling.
    pub fn timeout_with_cause(what: &str, elapsed: Duration, cause: &str) -> Self {
        let mut err = Self::timeout(what, elapsed);
        err.message = format!("{} (last capture error: {})", err.message, cause);
        err
    }

    pub fn invalid_selector(selector: &str, reason: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidSelector,
            message: format!("Invalid selector '{}': {}", selector, reason.into()),
            suggestion: Some(
                "Use '#id', '.Class', '[attr=value]', '[attr*=value]', plain text, a path like '//Button[@text=\"OK\"]', or a JSON object".into(),
            ),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidInput,
            message: message.into(),
            suggestion: Some("Check the command syntax and try again".into()),
        }
    }

    /// Create an invalid input error with a custom suggestion.
    pub fn invalid_input_with_suggestion(
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            code: ErrorCode::InvalidInput,
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }

    /// The device collaborator failed to capture or dispatch.
    pub fn device(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::DeviceError,
            message: message.into(),
            suggestion: Some(
                "Check that the device is connected ('adb devices') and the screen is unlocked"
                    .into(),
            ),
        }
    }

    /// Create a command failed error with a custom suggestion.
    pub fn command_failed_with_suggestion(
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            code: ErrorCode::CommandFailed,
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }
}

impl From<crate::bridge::BridgeError> for ApiError {
    fn from(err: crate::bridge::BridgeError) -> Self {
        ApiError::device(err.to_string())
    }
}
