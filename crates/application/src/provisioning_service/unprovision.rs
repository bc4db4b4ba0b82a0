use idbridge_core::{AppError, AppResult, TenantId};
use idbridge_domain::{AccountCorrelationQuery, IdpAccountId, PersonId};
use tracing::{error, info};

use super::ProvisioningService;

impl ProvisioningService {
    /// Deletes the identity provider account correlated with a directory person.
    ///
    /// Returns [`AppError::NotFound`] without deleting anything when no
    /// account carries the tenant and person metadata. When several accounts
    /// match, only the first search result is deleted.
    pub async fn unprovision(
        &self,
        tenant_id: &TenantId,
        person_id: &PersonId,
    ) -> AppResult<IdpAccountId> {
        let session = self.connector.open_session().await.map_err(|error| {
            error!(
                tenant_id = %tenant_id,
                person_id = %person_id,
                error = %error,
                "failed to open identity provider session for unprovisioning"
            );
            error.context("failed to open identity provider session")
        })?;

        let query = AccountCorrelationQuery::new(tenant_id, person_id);
        let accounts = session.search_accounts(&query, 1).await.map_err(|error| {
            error!(
                tenant_id = %tenant_id,
                person_id = %person_id,
                error = %error,
                "failed to search identity provider accounts"
            );
            error.context("failed to search identity provider accounts")
        })?;

        let Some(account) = accounts.into_iter().next() else {
            return Err(AppError::NotFound(format!(
                "no identity provider account for person '{person_id}' in tenant '{tenant_id}'"
            )));
        };

        session.delete_account(&account.id).await.map_err(|error| {
            error!(
                tenant_id = %tenant_id,
                person_id = %person_id,
                account_id = %account.id,
                error = %error,
                "failed to delete identity provider account"
            );
            error.context(&format!(
                "failed to delete identity provider account '{}'",
                account.id
            ))
        })?;

        info!(
            tenant_id = %tenant_id,
            person_id = %person_id,
            account_id = %account.id,
            "unprovisioned identity provider account"
        );

        Ok(account.id)
    }
}
