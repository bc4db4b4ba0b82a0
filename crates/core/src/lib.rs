//! Shared primitives for all Rust crates in the identity bridge.

#![forbid(unsafe_code)]

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across identity bridge crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl Display for NonEmptyString {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Tenant identifier issued by the internal directory service.
///
/// Directory tenants are addressed by opaque strings, so the only invariant
/// enforced here is that the identifier is not blank.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(NonEmptyString);

impl TenantId {
    /// Creates a validated tenant identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        NonEmptyString::new(value)
            .map(Self)
            .map_err(|_| AppError::Validation("tenant id must not be empty".to_owned()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for TenantId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input, configuration, or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Credentials were rejected by an upstream system.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// An external system failed or returned an unexpected response.
    #[error("external service error: {0}")]
    External(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Prefixes the error message with call-site context, keeping the error kind.
    #[must_use]
    pub fn context(self, context: &str) -> Self {
        match self {
            Self::Validation(message) => Self::Validation(format!("{context}: {message}")),
            Self::NotFound(message) => Self::NotFound(format!("{context}: {message}")),
            Self::Conflict(message) => Self::Conflict(format!("{context}: {message}")),
            Self::Unauthorized(message) => Self::Unauthorized(format!("{context}: {message}")),
            Self::External(message) => Self::External(format!("{context}: {message}")),
            Self::Internal(message) => Self::Internal(format!("{context}: {message}")),
        }
    }

    /// Returns true when the error signals a missing resource.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
