//! Identity bridge provisioning runtime.

#![forbid(unsafe_code)]

mod provisioner_config;

use std::env;
use std::sync::Arc;

use idbridge_application::{IdentityProviderConnector, ProvisioningService};
use idbridge_core::{AppError, AppResult, TenantId};
use idbridge_domain::{Person, PersonId};
use idbridge_infrastructure::{Auth0ManagementConnector, InMemoryIdentityProvider};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::provisioner_config::{IdentityProviderBackend, ProvisionerConfig};

const USAGE: &str = "usage: idbridge-provisioner provision <tenant_id> <person.json|->\n       \
                     idbridge-provisioner unprovision <tenant_id> <person_id>\n\n\
                     IDP_BACKEND=memory keeps accounts only for the current process and is \
                     meant for provision dry runs; unprovision against it always reports \
                     no matching account.";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Provision {
        tenant_id: TenantId,
        person_source: String,
    },
    Unprovision {
        tenant_id: TenantId,
        person_id: PersonId,
    },
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let command = Command::parse(env::args().skip(1))?;
    let config = ProvisionerConfig::load()?;
    let service = build_provisioning_service(&config)?;

    info!(
        backend = config.backend.as_str(),
        connection = %config.connection,
        partial_policy = config.partial_policy.as_str(),
        http_timeout_seconds = config.http_timeout.as_secs(),
        "idbridge-provisioner started"
    );

    match command {
        Command::Provision {
            tenant_id,
            person_source,
        } => {
            let person = read_person(person_source.as_str())?;
            let provisioned = service.provision(&tenant_id, &person).await?;
            println!("{}", provisioned.account_id);
            Ok(())
        }
        Command::Unprovision {
            tenant_id,
            person_id,
        } => {
            if matches!(config.backend, IdentityProviderBackend::Memory) {
                warn!("memory backend starts empty; unprovision will find no account");
            }

            match service.unprovision(&tenant_id, &person_id).await {
                Ok(account_id) => {
                    println!("{account_id}");
                    Ok(())
                }
                Err(error) if error.is_not_found() => {
                    warn!(
                        tenant_id = %tenant_id,
                        person_id = %person_id,
                        "nothing to unprovision"
                    );
                    Err(error)
                }
                Err(error) => Err(error),
            }
        }
    }
}

fn build_provisioning_service(config: &ProvisionerConfig) -> AppResult<ProvisioningService> {
    let connector: Arc<dyn IdentityProviderConnector> = match &config.backend {
        IdentityProviderBackend::Auth0(auth0_config) => {
            let http_client = reqwest::Client::builder()
                .timeout(config.http_timeout)
                .build()
                .map_err(|error| {
                    AppError::Internal(format!("failed to build HTTP client: {error}"))
                })?;
            Arc::new(Auth0ManagementConnector::new(
                http_client,
                auth0_config.clone(),
            ))
        }
        IdentityProviderBackend::Memory => Arc::new(InMemoryIdentityProvider::new()),
    };

    Ok(
        ProvisioningService::new(connector, Arc::new(config.role_mapping.clone()))
            .with_connection(config.connection.as_str())
            .with_partial_policy(config.partial_policy),
    )
}

impl Command {
    fn parse(mut args: impl Iterator<Item = String>) -> AppResult<Self> {
        let usage = || AppError::Validation(USAGE.to_owned());

        let name = args.next().ok_or_else(usage)?;
        let tenant_id = TenantId::new(args.next().ok_or_else(usage)?)?;
        let target = args.next().ok_or_else(usage)?;
        if args.next().is_some() {
            return Err(usage());
        }

        match name.as_str() {
            "provision" => Ok(Self::Provision {
                tenant_id,
                person_source: target,
            }),
            "unprovision" => Ok(Self::Unprovision {
                tenant_id,
                person_id: PersonId::new(target)?,
            }),
            _ => Err(usage()),
        }
    }
}

fn read_person(source: &str) -> AppResult<Person> {
    let raw = if source == "-" {
        std::io::read_to_string(std::io::stdin())
            .map_err(|error| AppError::Validation(format!("failed to read person from stdin: {error}")))?
    } else {
        std::fs::read_to_string(source).map_err(|error| {
            AppError::Validation(format!("failed to read person file '{source}': {error}"))
        })?
    };

    serde_json::from_str::<Person>(raw.as_str())
        .map_err(|error| AppError::Validation(format!("invalid person payload: {error}")))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use idbridge_core::AppResult;

    use super::{Command, USAGE};

    fn args(values: &[&str]) -> impl Iterator<Item = String> {
        values
            .iter()
            .map(|value| (*value).to_owned())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn parses_provision_command() -> AppResult<()> {
        let command = Command::parse(args(&["provision", "tenant-1", "person.json"]))?;
        assert!(matches!(
            command,
            Command::Provision { tenant_id, person_source }
                if tenant_id.as_str() == "tenant-1" && person_source == "person.json"
        ));
        Ok(())
    }

    #[test]
    fn parses_unprovision_command() -> AppResult<()> {
        let command = Command::parse(args(&["unprovision", "tenant-1", "person-9"]))?;
        assert!(matches!(
            command,
            Command::Unprovision { tenant_id, person_id }
                if tenant_id.as_str() == "tenant-1" && person_id.as_str() == "person-9"
        ));
        Ok(())
    }

    #[test]
    fn rejects_unknown_or_incomplete_commands() {
        assert!(Command::parse(args(&[])).is_err());
        assert!(Command::parse(args(&["provision", "tenant-1"])).is_err());
        assert!(Command::parse(args(&["sync", "tenant-1", "person-1"])).is_err());
        assert!(Command::parse(args(&["unprovision", "tenant-1", "p", "extra"])).is_err());
        assert!(Command::parse(args(&["unprovision", " ", "person-1"])).is_err());
    }

    #[test]
    fn usage_limits_memory_backend_to_provision_dry_runs() {
        assert!(USAGE.contains("IDP_BACKEND=memory"));
        assert!(USAGE.contains("provision dry runs"));
    }
}
