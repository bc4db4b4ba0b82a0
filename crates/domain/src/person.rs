//! Directory person types consumed by provisioning.

use std::fmt::{Display, Formatter};

use idbridge_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Identifier of a person in the internal directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(NonEmptyString);

impl PersonId {
    /// Creates a validated person identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        NonEmptyString::new(value)
            .map(Self)
            .map_err(|_| AppError::Validation("person id must not be empty".to_owned()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for PersonId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Validated email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Creates a validated email address.
    ///
    /// Performs basic structural validation: non-empty, contains exactly one `@`,
    /// local part and domain are non-empty, domain contains at least one `.`.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim().to_lowercase();

        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "email address must not be empty".to_owned(),
            ));
        }

        let Some((local, domain)) = trimmed.split_once('@') else {
            return Err(AppError::Validation(
                "email address must contain exactly one '@'".to_owned(),
            ));
        };

        if domain.contains('@') {
            return Err(AppError::Validation(
                "email address must contain exactly one '@'".to_owned(),
            ));
        }

        if local.is_empty() {
            return Err(AppError::Validation(
                "email local part must not be empty".to_owned(),
            ));
        }

        if domain.is_empty() || !domain.contains('.') {
            return Err(AppError::Validation(
                "email domain must contain at least one '.'".to_owned(),
            ));
        }

        if trimmed.len() > 254 {
            return Err(AppError::Validation(
                "email address must not exceed 254 characters".to_owned(),
            ));
        }

        Ok(Self(trimmed))
    }

    /// Returns the validated email string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

/// A person owned by the internal directory service.
///
/// Role identifiers are kept exactly as the directory reports them:
/// unordered, possibly duplicated, and possibly unrelated to any legacy tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    id: PersonId,
    email: EmailAddress,
    #[serde(default)]
    role_ids: Vec<String>,
}

impl Person {
    /// Creates a person from directory data.
    #[must_use]
    pub fn new(id: PersonId, email: EmailAddress, role_ids: Vec<String>) -> Self {
        Self {
            id,
            email,
            role_ids,
        }
    }

    /// Returns the directory identifier.
    #[must_use]
    pub fn id(&self) -> &PersonId {
        &self.id
    }

    /// Returns the person's email address.
    #[must_use]
    pub fn email(&self) -> &EmailAddress {
        &self.email
    }

    /// Returns the internal role identifiers held by the person.
    #[must_use]
    pub fn role_ids(&self) -> &[String] {
        self.role_ids.as_slice()
    }
}
