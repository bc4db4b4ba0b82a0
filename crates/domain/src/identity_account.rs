//! Identity provider account types and correlation metadata.

use std::fmt::{Display, Formatter};

use idbridge_core::{AppError, AppResult, NonEmptyString, TenantId};
use serde::{Deserialize, Serialize};

use crate::{EmailAddress, Person, PersonId};

/// Default password/email connection used for provisioned accounts.
pub const DEFAULT_PASSWORD_CONNECTION: &str = "Username-Password-Authentication";

/// Opaque account identifier assigned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdpAccountId(NonEmptyString);

impl IdpAccountId {
    /// Creates a validated identity provider account identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        NonEmptyString::new(value).map(Self).map_err(|_| {
            AppError::Validation("identity provider account id must not be empty".to_owned())
        })
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for IdpAccountId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// License flags stored on the identity provider account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLicense {
    /// Whether the account holds an active license.
    pub is_active: bool,
}

/// Application metadata correlating an identity provider account with a
/// directory person. It is the only link between the two systems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMetadata {
    /// License state of the account.
    pub license: AccountLicense,
    /// Directory person identifier.
    pub person_id: PersonId,
    /// Directory tenant identifier.
    pub tenant_id: TenantId,
}

impl AccountMetadata {
    /// Builds metadata for a freshly provisioned, licensed account.
    #[must_use]
    pub fn licensed(tenant_id: &TenantId, person_id: &PersonId) -> Self {
        Self {
            license: AccountLicense { is_active: true },
            person_id: person_id.clone(),
            tenant_id: tenant_id.clone(),
        }
    }

    /// Returns true when the metadata points at the given tenant and person.
    #[must_use]
    pub fn correlates_with(&self, tenant_id: &TenantId, person_id: &PersonId) -> bool {
        &self.tenant_id == tenant_id && &self.person_id == person_id
    }
}

/// Account creation request sent to the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIdpAccount {
    /// Identity provider connection the account is created in.
    pub connection: String,
    /// Account email.
    pub email: EmailAddress,
    /// Always true: the directory is the source of truth for email ownership.
    pub email_verified: bool,
    /// Correlation metadata.
    pub app_metadata: AccountMetadata,
}

impl NewIdpAccount {
    /// Builds the creation request for a directory person.
    #[must_use]
    pub fn for_person(tenant_id: &TenantId, person: &Person, connection: &str) -> Self {
        Self {
            connection: connection.to_owned(),
            email: person.email().clone(),
            email_verified: true,
            app_metadata: AccountMetadata::licensed(tenant_id, person.id()),
        }
    }
}

/// Account returned by an identity provider search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpAccount {
    /// Identity provider account identifier.
    pub id: IdpAccountId,
    /// Account email, when returned.
    pub email: Option<String>,
    /// Correlation metadata, when present on the account.
    pub app_metadata: Option<AccountMetadata>,
}

/// Search criteria locating the account of one directory person.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountCorrelationQuery {
    /// Directory tenant identifier.
    pub tenant_id: TenantId,
    /// Directory person identifier.
    pub person_id: PersonId,
}

impl AccountCorrelationQuery {
    /// Creates a query for a tenant and person pair.
    #[must_use]
    pub fn new(tenant_id: &TenantId, person_id: &PersonId) -> Self {
        Self {
            tenant_id: tenant_id.clone(),
            person_id: person_id.clone(),
        }
    }

    /// Renders the query in the identity provider's search syntax.
    ///
    /// Both fields must match exactly. Quotes and backslashes inside values
    /// are escaped so that a value stays inside its phrase.
    #[must_use]
    pub fn to_search_query(&self) -> String {
        format!(
            "app_metadata.tenant_id:\"{}\" AND app_metadata.person_id:\"{}\"",
            escape_phrase(self.tenant_id.as_str()),
            escape_phrase(self.person_id.as_str())
        )
    }

    /// Returns true when the metadata matches both fields of the query.
    #[must_use]
    pub fn matches(&self, metadata: &AccountMetadata) -> bool {
        metadata.correlates_with(&self.tenant_id, &self.person_id)
    }
}

fn escape_phrase(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for character in value.chars() {
        if matches!(character, '"' | '\\') {
            escaped.push('\\');
        }
        escaped.push(character);
    }
    escaped
}
