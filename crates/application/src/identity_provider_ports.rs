use std::collections::BTreeSet;

use async_trait::async_trait;
use idbridge_core::AppResult;
use idbridge_domain::{AccountCorrelationQuery, IdpAccount, IdpAccountId, IdpRoleId, NewIdpAccount};

/// Port that opens short-lived sessions against the identity provider
/// management API.
///
/// Every provisioning operation opens its own session and drops it when the
/// operation returns. Sessions are never shared between operations.
#[async_trait]
pub trait IdentityProviderConnector: Send + Sync {
    /// Authenticates against the management API and returns a fresh session.
    async fn open_session(&self) -> AppResult<Box<dyn IdentityProviderSession>>;
}

/// Authenticated management API session.
#[async_trait]
pub trait IdentityProviderSession: Send + Sync {
    /// Creates an account and returns the identifier assigned by the provider.
    async fn create_account(&self, account: &NewIdpAccount) -> AppResult<IdpAccountId>;

    /// Assigns roles to an existing account.
    async fn assign_roles(
        &self,
        account_id: &IdpAccountId,
        role_ids: &BTreeSet<IdpRoleId>,
    ) -> AppResult<()>;

    /// Searches accounts by correlation metadata, returning at most `limit` results.
    async fn search_accounts(
        &self,
        query: &AccountCorrelationQuery,
        limit: u32,
    ) -> AppResult<Vec<IdpAccount>>;

    /// Deletes an account.
    async fn delete_account(&self, account_id: &IdpAccountId) -> AppResult<()>;
}
