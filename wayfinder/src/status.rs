//! User-facing status messages.
//!
//! Failures reach the user as short, auto-dismissing messages. Cancellations
//! never do: a superseded lookup is not a failure from the user's point of
//! view.

use std::fmt;
use std::time::Duration;

use crate::error::{ErrorCategory, MapError};

/// Default time a message stays visible.
pub const DEFAULT_DISMISS_AFTER: Duration = Duration::from_millis(3000);

/// Severity of a status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

impl StatusKind {
    pub fn label(&self) -> &'static str {
        match self {
            StatusKind::Info => "info",
            StatusKind::Success => "success",
            StatusKind::Error => "error",
        }
    }
}

/// A transient message for the status area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub kind: StatusKind,
    /// `None` keeps the message until replaced.
    pub dismiss_after: Option<Duration>,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self::new(text, StatusKind::Info)
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(text, StatusKind::Success)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(text, StatusKind::Error)
    }

    fn new(text: impl Into<String>, kind: StatusKind) -> Self {
        Self {
            text: text.into(),
            kind,
            dismiss_after: Some(DEFAULT_DISMISS_AFTER),
        }
    }

    /// Override how long the message stays visible.
    pub fn dismiss_after(mut self, after: Option<Duration>) -> Self {
        self.dismiss_after = after;
        self
    }

    /// Message for a failed operation, or `None` for a cancellation.
    pub fn from_error(error: &MapError) -> Option<Self> {
        if !error.is_user_visible() {
            return None;
        }
        let text = match error.category() {
            ErrorCategory::NotFound => "Location not found".to_string(),
            ErrorCategory::PermissionDenied => {
                "Location access denied. Please enable location services.".to_string()
            }
            ErrorCategory::Timeout => "Location request timed out. Please try again.".to_string(),
            ErrorCategory::ProviderUnavailable => match error {
                MapError::Config(detail) => format!("Configuration error: {}", detail),
                _ => "Service temporarily unavailable. Please try again.".to_string(),
            },
            ErrorCategory::Cancelled => return None,
        };
        Some(Self::error(text))
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.label(), self.text)
    }
}
