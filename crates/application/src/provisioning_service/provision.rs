use idbridge_core::{AppError, AppResult, TenantId};
use idbridge_domain::{IdpAccountId, NewIdpAccount, Person};
use tracing::{debug, error, info, warn};

use super::{PartialProvisioningPolicy, ProvisionedAccount, ProvisioningService};
use crate::IdentityProviderSession;

impl ProvisioningService {
    /// Creates an identity provider account for a directory person and assigns
    /// the roles mapped from the person's legacy tiers.
    ///
    /// Nothing is retried. When role assignment fails, the configured
    /// [`PartialProvisioningPolicy`] decides whether the new account is deleted.
    pub async fn provision(
        &self,
        tenant_id: &TenantId,
        person: &Person,
    ) -> AppResult<ProvisionedAccount> {
        let role_ids = self.role_mapping.map_roles(person.role_ids());
        let account = NewIdpAccount::for_person(tenant_id, person, self.connection.as_str());

        let session = self.connector.open_session().await.map_err(|error| {
            error!(
                tenant_id = %tenant_id,
                person_id = %person.id(),
                error = %error,
                "failed to open identity provider session for provisioning"
            );
            error.context("failed to open identity provider session")
        })?;

        let account_id = session.create_account(&account).await.map_err(|error| {
            error!(
                tenant_id = %tenant_id,
                person_id = %person.id(),
                error = %error,
                "failed to create identity provider account"
            );
            error.context("failed to create identity provider account")
        })?;

        if role_ids.is_empty() {
            debug!(
                tenant_id = %tenant_id,
                person_id = %person.id(),
                account_id = %account_id,
                "person holds no legacy roles, skipping role assignment"
            );
        } else if let Err(assign_error) = session.assign_roles(&account_id, &role_ids).await {
            error!(
                tenant_id = %tenant_id,
                person_id = %person.id(),
                account_id = %account_id,
                error = %assign_error,
                "failed to assign identity provider roles"
            );
            return Err(self
                .handle_partial_provisioning(session.as_ref(), tenant_id, person, &account_id)
                .await
                .unwrap_or_else(|| {
                    assign_error.context(&format!(
                        "failed to assign roles to identity provider account '{account_id}'"
                    ))
                }));
        }

        info!(
            tenant_id = %tenant_id,
            person_id = %person.id(),
            account_id = %account_id,
            role_count = role_ids.len(),
            "provisioned identity provider account"
        );

        Ok(ProvisionedAccount {
            account_id,
            assigned_roles: role_ids,
        })
    }

    /// Applies the partial provisioning policy after a failed role assignment.
    ///
    /// Returns a replacement error only when the account could not be cleaned
    /// up and is now orphaned.
    async fn handle_partial_provisioning(
        &self,
        session: &dyn IdentityProviderSession,
        tenant_id: &TenantId,
        person: &Person,
        account_id: &IdpAccountId,
    ) -> Option<AppError> {
        match self.partial_policy {
            PartialProvisioningPolicy::KeepAccount => {
                warn!(
                    tenant_id = %tenant_id,
                    person_id = %person.id(),
                    account_id = %account_id,
                    "identity provider account left without roles"
                );
                None
            }
            PartialProvisioningPolicy::CompensatingDelete => {
                match session.delete_account(account_id).await {
                    Ok(()) => {
                        info!(
                            tenant_id = %tenant_id,
                            person_id = %person.id(),
                            account_id = %account_id,
                            "deleted identity provider account after failed role assignment"
                        );
                        None
                    }
                    Err(delete_error) => {
                        error!(
                            tenant_id = %tenant_id,
                            person_id = %person.id(),
                            account_id = %account_id,
                            error = %delete_error,
                            "failed to delete identity provider account after failed role assignment"
                        );
                        Some(AppError::Internal(format!(
                            "role assignment failed and identity provider account '{account_id}' \
                             could not be deleted, remove it manually: {delete_error}"
                        )))
                    }
                }
            }
        }
    }
}
