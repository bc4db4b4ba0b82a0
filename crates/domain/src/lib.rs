//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod identity_account;
mod legacy_role;
mod person;

pub use identity_account::{
    AccountCorrelationQuery, AccountLicense, AccountMetadata, DEFAULT_PASSWORD_CONNECTION,
    IdpAccount, IdpAccountId, NewIdpAccount,
};
pub use legacy_role::{IdpRoleId, LegacyRoleMapping, LegacyTier};
pub use person::{EmailAddress, Person, PersonId};
