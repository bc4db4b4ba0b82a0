use std::env;
use std::time::Duration;

use idbridge_application::PartialProvisioningPolicy;
use idbridge_core::{AppError, AppResult};
use idbridge_domain::{DEFAULT_PASSWORD_CONNECTION, IdpRoleId, LegacyRoleMapping, LegacyTier};
use idbridge_infrastructure::Auth0ManagementConfig;

#[derive(Debug, Clone)]
pub enum IdentityProviderBackend {
    Auth0(Auth0ManagementConfig),
    /// Process-local store that starts empty on every run. Only useful for
    /// provision dry runs.
    Memory,
}

impl IdentityProviderBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth0(_) => "auth0",
            Self::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    pub backend: IdentityProviderBackend,
    pub connection: String,
    pub http_timeout: Duration,
    pub partial_policy: PartialProvisioningPolicy,
    pub role_mapping: LegacyRoleMapping,
}

impl ProvisionerConfig {
    pub fn load() -> AppResult<Self> {
        Self::load_from(|name| env::var(name).ok())
    }

    pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        let required = |name: &str| {
            non_empty(name).ok_or_else(|| AppError::Validation(format!("{name} is required")))
        };

        let backend = match non_empty("IDP_BACKEND")
            .unwrap_or_else(|| "auth0".to_owned())
            .as_str()
        {
            "auth0" => IdentityProviderBackend::Auth0(Auth0ManagementConfig::new(
                required("AUTH0_DOMAIN")?.as_str(),
                required("AUTH0_CLIENT_ID")?,
                required("AUTH0_CLIENT_SECRET")?,
            )?),
            "memory" => IdentityProviderBackend::Memory,
            other => {
                return Err(AppError::Validation(format!(
                    "IDP_BACKEND must be either 'auth0' or 'memory', got '{other}'"
                )));
            }
        };

        let connection = non_empty("AUTH0_CONNECTION")
            .unwrap_or_else(|| DEFAULT_PASSWORD_CONNECTION.to_owned());

        let timeout_seconds = match non_empty("IDP_HTTP_TIMEOUT_SECONDS") {
            Some(value) => value.parse::<u64>().map_err(|error| {
                AppError::Validation(format!(
                    "invalid IDP_HTTP_TIMEOUT_SECONDS value '{value}': {error}"
                ))
            })?,
            None => 15,
        };
        if timeout_seconds == 0 {
            return Err(AppError::Validation(
                "IDP_HTTP_TIMEOUT_SECONDS must be greater than zero".to_owned(),
            ));
        }

        let partial_policy = non_empty("IDP_ROLE_FAILURE_POLICY")
            .map(|value| value.parse::<PartialProvisioningPolicy>())
            .transpose()?
            .unwrap_or_default();

        let mut role_mapping = LegacyRoleMapping::standard().clone();
        for tier in LegacyTier::all() {
            let name = role_override_env(*tier);
            if let Some(value) = non_empty(name.as_str()) {
                let idp_role_id = IdpRoleId::new(value)
                    .map_err(|error| error.context(&format!("invalid {name}")))?;
                role_mapping = role_mapping.with_idp_role_id(*tier, idp_role_id);
            }
        }

        Ok(Self {
            backend,
            connection,
            http_timeout: Duration::from_secs(timeout_seconds),
            partial_policy,
            role_mapping,
        })
    }
}

fn role_override_env(tier: LegacyTier) -> String {
    format!("IDP_ROLE_ID_{}", tier.as_str().to_ascii_uppercase())
}
