use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use idbridge_application::{IdentityProviderConnector, IdentityProviderSession};
use idbridge_core::{AppError, AppResult};
use idbridge_domain::{AccountCorrelationQuery, IdpAccount, IdpAccountId, IdpRoleId, NewIdpAccount};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredAccount {
    account: IdpAccount,
    roles: BTreeSet<IdpRoleId>,
}

/// In-memory identity provider for local runs and tests.
///
/// Sessions share the store of the connector that opened them. Accounts are
/// kept in creation order so that search results are deterministic.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdentityProvider {
    accounts: Arc<RwLock<BTreeMap<u64, StoredAccount>>>,
}

impl InMemoryIdentityProvider {
    /// Creates an empty identity provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the roles currently assigned to an account.
    pub async fn roles_for(&self, account_id: &IdpAccountId) -> Option<BTreeSet<IdpRoleId>> {
        self.accounts
            .read()
            .await
            .values()
            .find(|stored| &stored.account.id == account_id)
            .map(|stored| stored.roles.clone())
    }

    /// Returns the number of stored accounts.
    pub async fn account_count(&self) -> usize {
        self.accounts.read().await.len()
    }
}

#[async_trait]
impl IdentityProviderConnector for InMemoryIdentityProvider {
    async fn open_session(&self) -> AppResult<Box<dyn IdentityProviderSession>> {
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl IdentityProviderSession for InMemoryIdentityProvider {
    async fn create_account(&self, account: &NewIdpAccount) -> AppResult<IdpAccountId> {
        let mut accounts = self.accounts.write().await;
        let email_taken = accounts.values().any(|stored| {
            stored.account.email.as_deref() == Some(account.email.as_str())
        });
        if email_taken {
            return Err(AppError::Conflict(format!(
                "account with email '{}' already exists",
                account.email.as_str()
            )));
        }

        let account_id = IdpAccountId::new(format!("memory|{}", Uuid::new_v4().simple()))?;
        let sequence = accounts.keys().next_back().map_or(1, |last| last + 1);
        accounts.insert(
            sequence,
            StoredAccount {
                account: IdpAccount {
                    id: account_id.clone(),
                    email: Some(account.email.as_str().to_owned()),
                    app_metadata: Some(account.app_metadata.clone()),
                },
                roles: BTreeSet::new(),
            },
        );

        Ok(account_id)
    }

    async fn assign_roles(
        &self,
        account_id: &IdpAccountId,
        role_ids: &BTreeSet<IdpRoleId>,
    ) -> AppResult<()> {
        let mut accounts = self.accounts.write().await;
        let stored = accounts
            .values_mut()
            .find(|stored| &stored.account.id == account_id)
            .ok_or_else(|| AppError::NotFound(format!("account '{account_id}' does not exist")))?;

        stored.roles.extend(role_ids.iter().cloned());
        Ok(())
    }

    async fn search_accounts(
        &self,
        query: &AccountCorrelationQuery,
        limit: u32,
    ) -> AppResult<Vec<IdpAccount>> {
        let limit = usize::try_from(limit.max(1)).unwrap_or(usize::MAX);
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .filter(|stored| {
                stored
                    .account
                    .app_metadata
                    .as_ref()
                    .is_some_and(|metadata| query.matches(metadata))
            })
            .take(limit)
            .map(|stored| stored.account.clone())
            .collect())
    }

    async fn delete_account(&self, account_id: &IdpAccountId) -> AppResult<()> {
        let mut accounts = self.accounts.write().await;
        let sequence = accounts
            .iter()
            .find_map(|(sequence, stored)| (&stored.account.id == account_id).then_some(*sequence))
            .ok_or_else(|| AppError::NotFound(format!("account '{account_id}' does not exist")))?;

        accounts.remove(&sequence);
        Ok(())
    }
}
