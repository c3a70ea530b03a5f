//! Error taxonomy shared by every lookup in the crate.
//!
//! Errors are grouped into categories that decide how a failure is surfaced:
//!
//! | Category | Retryable | Shown to user |
//! |----------|-----------|---------------|
//! | `NotFound` | no (user-correctable) | yes |
//! | `ProviderUnavailable` | yes | yes |
//! | `PermissionDenied` | no (needs user action) | yes |
//! | `Cancelled` | - | never |
//! | `Timeout` | yes | yes |
//!
//! `MapError` is `Clone` because a single failure from a coalesced request is
//! fanned out to every caller waiting on the same key.

use thiserror::Error;

/// Errors produced by lookups, the geolocation tracker and the proxy layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    /// The query produced no result.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network failure or a 5xx from the provider.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The user (or platform) refused access to location.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Superseded by a newer request.
    #[error("Request cancelled")]
    Cancelled,

    /// A geolocation or network request exceeded its window.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The provider answered with a body we could not interpret.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid configuration prevented the operation.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a [`MapError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    ProviderUnavailable,
    PermissionDenied,
    Cancelled,
    Timeout,
}

impl MapError {
    /// Category used for retry and visibility decisions.
    ///
    /// Malformed responses count as provider failures; configuration problems
    /// are reported like an unavailable provider since no request can succeed.
    pub fn category(&self) -> ErrorCategory {
        match self {
            MapError::NotFound(_) => ErrorCategory::NotFound,
            MapError::ProviderUnavailable(_)
            | MapError::InvalidResponse(_)
            | MapError::Config(_) => ErrorCategory::ProviderUnavailable,
            MapError::PermissionDenied(_) => ErrorCategory::PermissionDenied,
            MapError::Cancelled => ErrorCategory::Cancelled,
            MapError::Timeout(_) => ErrorCategory::Timeout,
        }
    }

    /// Returns true if repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::ProviderUnavailable | ErrorCategory::Timeout
        ) && !matches!(self, MapError::Config(_))
    }

    /// Returns true if this is a supersede-cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, MapError::Cancelled)
    }

    /// Returns true if the failure should reach the user.
    pub fn is_user_visible(&self) -> bool {
        !self.is_cancelled()
    }
}

impl From<reqwest::Error> for MapError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            MapError::Timeout(e.to_string())
        } else if e.is_decode() {
            MapError::InvalidResponse(e.to_string())
        } else if e.status() == Some(reqwest::StatusCode::NOT_FOUND) {
            MapError::NotFound(e.to_string())
        } else {
            MapError::ProviderUnavailable(e.to_string())
        }
    }
}

impl From<serde_json::Error> for MapError {
    fn from(e: serde_json::Error) -> Self {
        MapError::InvalidResponse(e.to_string())
    }
}

/// Convenience alias for results carrying a [`MapError`].
pub type MapResult<T> = Result<T, MapError>;
