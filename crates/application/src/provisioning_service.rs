//! Identity provider account provisioning.
//!
//! Creates identity provider accounts for directory persons, assigns the
//! identity provider roles matching their legacy tiers, and removes the
//! accounts again when persons leave the directory.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use idbridge_core::AppError;
use idbridge_domain::{DEFAULT_PASSWORD_CONNECTION, IdpAccountId, IdpRoleId, LegacyRoleMapping};

use crate::IdentityProviderConnector;

/// What to do with a freshly created account when role assignment fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartialProvisioningPolicy {
    /// Delete the created account so that no role-less account is left behind.
    #[default]
    CompensatingDelete,
    /// Keep the role-less account and report the failure.
    KeepAccount,
}

impl PartialProvisioningPolicy {
    /// Returns a stable configuration value for this policy.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CompensatingDelete => "compensate",
            Self::KeepAccount => "keep",
        }
    }
}

impl FromStr for PartialProvisioningPolicy {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "compensate" => Ok(Self::CompensatingDelete),
            "keep" => Ok(Self::KeepAccount),
            other => Err(AppError::Validation(format!(
                "partial provisioning policy must be 'compensate' or 'keep', got '{other}'"
            ))),
        }
    }
}

/// Outcome of a successful provisioning call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedAccount {
    /// Identifier assigned by the identity provider.
    pub account_id: IdpAccountId,
    /// Identity provider roles assigned to the account.
    pub assigned_roles: BTreeSet<IdpRoleId>,
}

/// Application service bridging directory persons to identity provider accounts.
#[derive(Clone)]
pub struct ProvisioningService {
    connector: Arc<dyn IdentityProviderConnector>,
    role_mapping: Arc<LegacyRoleMapping>,
    connection: String,
    partial_policy: PartialProvisioningPolicy,
}

impl ProvisioningService {
    /// Creates a provisioning service using the default password connection.
    #[must_use]
    pub fn new(
        connector: Arc<dyn IdentityProviderConnector>,
        role_mapping: Arc<LegacyRoleMapping>,
    ) -> Self {
        Self {
            connector,
            role_mapping,
            connection: DEFAULT_PASSWORD_CONNECTION.to_owned(),
            partial_policy: PartialProvisioningPolicy::default(),
        }
    }

    /// Overrides the identity provider connection used for new accounts.
    #[must_use]
    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = connection.into();
        self
    }

    /// Overrides the policy applied when role assignment fails.
    #[must_use]
    pub fn with_partial_policy(mut self, partial_policy: PartialProvisioningPolicy) -> Self {
        self.partial_policy = partial_policy;
        self
    }
}

mod provision;
mod unprovision;
