//! Auth0 Management API v2 adapter for identity provider sessions.

use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use idbridge_application::{IdentityProviderConnector, IdentityProviderSession};
use idbridge_core::{AppError, AppResult};
use idbridge_domain::{
    AccountCorrelationQuery, AccountMetadata, IdpAccount, IdpAccountId, IdpRoleId, NewIdpAccount,
};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

const SEARCH_ENGINE_VERSION: &str = "v3";

/// Connection settings for the Auth0 Management API.
#[derive(Clone)]
pub struct Auth0ManagementConfig {
    base_url: Url,
    client_id: String,
    client_secret: String,
}

impl Auth0ManagementConfig {
    /// Creates settings for an Auth0 tenant domain such as `acme.eu.auth0.com`.
    pub fn new(
        domain: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> AppResult<Self> {
        let domain = domain
            .trim()
            .trim_start_matches("https://")
            .trim_end_matches('/');
        if domain.is_empty() {
            return Err(AppError::Validation("Auth0 domain must not be empty".to_owned()));
        }

        let base_url = Url::parse(&format!("https://{domain}/")).map_err(|error| {
            AppError::Validation(format!("invalid Auth0 domain '{domain}': {error}"))
        })?;

        Self::with_base_url(base_url, client_id, client_secret)
    }

    /// Creates settings against an explicit base URL, e.g. a custom domain or proxy.
    pub fn with_base_url(
        base_url: Url,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> AppResult<Self> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        if client_id.trim().is_empty() || client_secret.trim().is_empty() {
            return Err(AppError::Validation(
                "Auth0 client id and client secret are required".to_owned(),
            ));
        }

        if base_url.cannot_be_a_base() {
            return Err(AppError::Validation(format!(
                "Auth0 base URL '{base_url}' cannot be used as a base"
            )));
        }

        let mut base_url = base_url;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(path.as_str());
        }

        Ok(Self {
            base_url,
            client_id,
            client_secret,
        })
    }

    fn token_url(&self) -> AppResult<Url> {
        join_url(&self.base_url, "oauth/token")
    }

    fn api_url(&self) -> AppResult<Url> {
        join_url(&self.base_url, "api/v2/")
    }
}

impl Debug for Auth0ManagementConfig {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Auth0ManagementConfig")
            .field("base_url", &self.base_url.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize)]
struct ClientCredentialsRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    audience: &'a str,
}

#[derive(Deserialize)]
struct ClientCredentialsResponse {
    access_token: String,
}

#[derive(Serialize)]
struct CreateUserRequest<'a> {
    connection: &'a str,
    email: &'a str,
    email_verified: bool,
    password: String,
    app_metadata: &'a AccountMetadata,
}

#[derive(Debug, Deserialize)]
struct CreateUserResponse {
    user_id: String,
}

#[derive(Debug, Serialize)]
struct AssignRolesRequest<'a> {
    roles: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SearchUserResponse {
    user_id: String,
    email: Option<String>,
    #[serde(default)]
    app_metadata: Option<Value>,
}

/// Opens Auth0 Management API sessions using the client-credentials grant.
///
/// The HTTP client is shared and only pools connections. Every session
/// requests its own access token.
#[derive(Clone)]
pub struct Auth0ManagementConnector {
    http_client: reqwest::Client,
    config: Auth0ManagementConfig,
}

impl Auth0ManagementConnector {
    /// Creates a new connector.
    #[must_use]
    pub fn new(http_client: reqwest::Client, config: Auth0ManagementConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }
}

#[async_trait]
impl IdentityProviderConnector for Auth0ManagementConnector {
    async fn open_session(&self) -> AppResult<Box<dyn IdentityProviderSession>> {
        let api_url = self.config.api_url()?;
        let response = self
            .http_client
            .post(self.config.token_url()?)
            .json(&ClientCredentialsRequest {
                grant_type: "client_credentials",
                client_id: self.config.client_id.as_str(),
                client_secret: self.config.client_secret.as_str(),
                audience: api_url.as_str(),
            })
            .send()
            .await
            .map_err(|error| {
                AppError::External(format!("failed to call Auth0 token endpoint: {error}"))
            })?;

        if !response.status().is_success() {
            return Err(error_for_status(response, "Auth0 token endpoint").await);
        }

        let token = response
            .json::<ClientCredentialsResponse>()
            .await
            .map_err(|error| {
                AppError::External(format!(
                    "failed to parse Auth0 token endpoint response body: {error}"
                ))
            })?;

        debug!(client_id = %self.config.client_id, "opened Auth0 management session");

        Ok(Box::new(Auth0ManagementSession {
            http_client: self.http_client.clone(),
            api_url,
            access_token: token.access_token,
        }))
    }
}

struct Auth0ManagementSession {
    http_client: reqwest::Client,
    api_url: Url,
    access_token: String,
}

impl Auth0ManagementSession {
    fn users_url(&self) -> AppResult<Url> {
        join_url(&self.api_url, "users")
    }

    /// Auth0 user ids contain `|`, which must reach the path as `%7C`.
    fn user_url(&self, account_id: &IdpAccountId, suffix: &str) -> AppResult<Url> {
        let account_segment = urlencoding::encode(account_id.as_str());
        join_url(
            &self.api_url,
            format!("users/{account_segment}{suffix}").as_str(),
        )
    }
}

#[async_trait]
impl IdentityProviderSession for Auth0ManagementSession {
    async fn create_account(&self, account: &NewIdpAccount) -> AppResult<IdpAccountId> {
        let response = self
            .http_client
            .post(self.users_url()?)
            .bearer_auth(self.access_token.as_str())
            .json(&CreateUserRequest {
                connection: account.connection.as_str(),
                email: account.email.as_str(),
                email_verified: account.email_verified,
                password: generate_initial_password()?,
                app_metadata: &account.app_metadata,
            })
            .send()
            .await
            .map_err(|error| {
                AppError::External(format!("failed to call Auth0 create user endpoint: {error}"))
            })?;

        if !response.status().is_success() {
            return Err(error_for_status(response, "Auth0 create user endpoint").await);
        }

        let created = response.json::<CreateUserResponse>().await.map_err(|error| {
            AppError::External(format!(
                "failed to parse Auth0 create user response body: {error}"
            ))
        })?;

        IdpAccountId::new(created.user_id)
    }

    async fn assign_roles(
        &self,
        account_id: &IdpAccountId,
        role_ids: &BTreeSet<IdpRoleId>,
    ) -> AppResult<()> {
        let response = self
            .http_client
            .post(self.user_url(account_id, "/roles")?)
            .bearer_auth(self.access_token.as_str())
            .json(&AssignRolesRequest {
                roles: role_ids.iter().map(IdpRoleId::as_str).collect(),
            })
            .send()
            .await
            .map_err(|error| {
                AppError::External(format!("failed to call Auth0 assign roles endpoint: {error}"))
            })?;

        if !response.status().is_success() {
            return Err(error_for_status(response, "Auth0 assign roles endpoint").await);
        }

        Ok(())
    }

    async fn search_accounts(
        &self,
        query: &AccountCorrelationQuery,
        limit: u32,
    ) -> AppResult<Vec<IdpAccount>> {
        let mut url = self.users_url()?;
        url.query_pairs_mut()
            .append_pair("q", query.to_search_query().as_str())
            .append_pair("per_page", limit.max(1).to_string().as_str())
            .append_pair("search_engine", SEARCH_ENGINE_VERSION);

        let response = self
            .http_client
            .get(url)
            .bearer_auth(self.access_token.as_str())
            .send()
            .await
            .map_err(|error| {
                AppError::External(format!("failed to call Auth0 search users endpoint: {error}"))
            })?;

        if !response.status().is_success() {
            return Err(error_for_status(response, "Auth0 search users endpoint").await);
        }

        let users = response
            .json::<Vec<SearchUserResponse>>()
            .await
            .map_err(|error| {
                AppError::External(format!(
                    "failed to parse Auth0 search users response body: {error}"
                ))
            })?;

        users
            .into_iter()
            .map(|user| {
                let app_metadata = user.app_metadata.and_then(|value| {
                    serde_json::from_value::<AccountMetadata>(value)
                        .map_err(|error| {
                            warn!(
                                account_id = %user.user_id,
                                error = %error,
                                "ignoring unrecognised Auth0 app_metadata"
                            );
                        })
                        .ok()
                });

                Ok(IdpAccount {
                    id: IdpAccountId::new(user.user_id)?,
                    email: user.email,
                    app_metadata,
                })
            })
            .collect()
    }

    async fn delete_account(&self, account_id: &IdpAccountId) -> AppResult<()> {
        let response = self
            .http_client
            .delete(self.user_url(account_id, "")?)
            .bearer_auth(self.access_token.as_str())
            .send()
            .await
            .map_err(|error| {
                AppError::External(format!("failed to call Auth0 delete user endpoint: {error}"))
            })?;

        if !response.status().is_success() {
            return Err(error_for_status(response, "Auth0 delete user endpoint").await);
        }

        Ok(())
    }
}

async fn error_for_status(response: reqwest::Response, endpoint: &str) -> AppError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_owned());
    let message = format!("{endpoint} returned status {}: {body}", status.as_u16());

    // A 404 means a misconfigured domain or path. Missing accounts are only
    // decided from an empty search result.
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Unauthorized(message),
        StatusCode::CONFLICT => AppError::Conflict(message),
        _ => AppError::External(message),
    }
}

fn join_url(base: &Url, path: &str) -> AppResult<Url> {
    base.join(path)
        .map_err(|error| AppError::Internal(format!("failed to build Auth0 URL '{path}': {error}")))
}

/// Generates the initial password required by database connections.
///
/// Nobody learns this password: accounts sign in through the identity
/// provider's reset or federated flows.
fn generate_initial_password() -> AppResult<String> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes).map_err(|error| {
        AppError::Internal(format!("failed to generate initial password: {error}"))
    })?;

    // Suffix satisfies Auth0 character-class password policies.
    Ok(format!("{}-Aa1!", URL_SAFE_NO_PAD.encode(bytes)))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use idbridge_application::{IdentityProviderConnector, ProvisioningService};
    use idbridge_core::{AppError, AppResult, TenantId};
    use idbridge_domain::{
        AccountCorrelationQuery, EmailAddress, IdpAccountId, IdpRoleId, LegacyRoleMapping,
        NewIdpAccount, Person, PersonId,
    };
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{Auth0ManagementConfig, Auth0ManagementConnector, Auth0ManagementSession};

    fn connector(server: &MockServer) -> AppResult<Auth0ManagementConnector> {
        let base_url = Url::parse(server.uri().as_str())
            .map_err(|error| AppError::Internal(error.to_string()))?;
        let config = Auth0ManagementConfig::with_base_url(base_url, "client-1", "secret-1")?;
        Ok(Auth0ManagementConnector::new(reqwest::Client::new(), config))
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_partial_json(json!({
                "grant_type": "client_credentials",
                "client_id": "client-1",
                "client_secret": "secret-1",
                "audience": format!("{}/api/v2/", server.uri()),
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "token-123",
                "token_type": "Bearer",
                "expires_in": 86400,
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn create_account_posts_verified_user_with_metadata() -> AppResult<()> {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/v2/users"))
            .and(header("authorization", "Bearer token-123"))
            .and(body_partial_json(json!({
                "connection": "Username-Password-Authentication",
                "email": "ada@example.com",
                "email_verified": true,
                "app_metadata": {
                    "license": { "is_active": true },
                    "person_id": "person-1",
                    "tenant_id": "tenant-1",
                },
            })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "user_id": "auth0|abc123" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let person = Person::new(
            PersonId::new("person-1")?,
            EmailAddress::new("ada@example.com")?,
            Vec::new(),
        );
        let account = NewIdpAccount::for_person(
            &TenantId::new("tenant-1")?,
            &person,
            "Username-Password-Authentication",
        );

        let session = connector(&server)?.open_session().await?;
        let account_id = session.create_account(&account).await?;

        assert_eq!(account_id.as_str(), "auth0|abc123");
        Ok(())
    }

    #[tokio::test]
    async fn create_account_sends_generated_password() -> AppResult<()> {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/v2/users"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "user_id": "auth0|abc123" })),
            )
            .mount(&server)
            .await;

        let person = Person::new(
            PersonId::new("person-1")?,
            EmailAddress::new("ada@example.com")?,
            Vec::new(),
        );
        let account = NewIdpAccount::for_person(&TenantId::new("tenant-1")?, &person, "db");
        let session = connector(&server)?.open_session().await?;
        session.create_account(&account).await?;

        let requests = server.received_requests().await.unwrap_or_default();
        let create_request = requests
            .iter()
            .find(|request| request.url.path() == "/api/v2/users")
            .ok_or_else(|| AppError::Internal("create request not received".to_owned()))?;
        let body: serde_json::Value = serde_json::from_slice(&create_request.body)
            .map_err(|error| AppError::Internal(error.to_string()))?;
        let password = body["password"].as_str().unwrap_or_default();
        assert!(password.len() >= 40);
        assert!(password.ends_with("-Aa1!"));
        Ok(())
    }

    #[tokio::test]
    async fn create_account_conflict_maps_to_conflict() -> AppResult<()> {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/v2/users"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "statusCode": 409,
                "error": "Conflict",
                "message": "The user already exists.",
            })))
            .mount(&server)
            .await;

        let person = Person::new(
            PersonId::new("person-1")?,
            EmailAddress::new("ada@example.com")?,
            Vec::new(),
        );
        let account = NewIdpAccount::for_person(&TenantId::new("tenant-1")?, &person, "db");
        let session = connector(&server)?.open_session().await?;
        let result = session.create_account(&account).await;

        assert!(matches!(result, Err(AppError::Conflict(message)) if message.contains("409")));
        Ok(())
    }

    #[tokio::test]
    async fn assign_roles_posts_role_ids_to_encoded_user_path() -> AppResult<()> {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/v2/users/auth0%7Cabc123/roles"))
            .and(header("authorization", "Bearer token-123"))
            .and(body_partial_json(json!({ "roles": ["rol_admin", "rol_user"] })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let session = connector(&server)?.open_session().await?;
        session
            .assign_roles(
                &IdpAccountId::new("auth0|abc123")?,
                &BTreeSet::from([IdpRoleId::new("rol_user")?, IdpRoleId::new("rol_admin")?]),
            )
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn search_accounts_sends_correlation_query() -> AppResult<()> {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/v2/users"))
            .and(query_param(
                "q",
                r#"app_metadata.tenant_id:"tenant-1" AND app_metadata.person_id:"person-1""#,
            ))
            .and(query_param("per_page", "1"))
            .and(query_param("search_engine", "v3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "user_id": "auth0|abc123",
                    "email": "ada@example.com",
                    "app_metadata": {
                        "license": { "is_active": true },
                        "person_id": "person-1",
                        "tenant_id": "tenant-1",
                    },
                }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let tenant_id = TenantId::new("tenant-1")?;
        let person_id = PersonId::new("person-1")?;
        let session = connector(&server)?.open_session().await?;
        let accounts = session
            .search_accounts(&AccountCorrelationQuery::new(&tenant_id, &person_id), 1)
            .await?;

        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].id.as_str(), "auth0|abc123");
        assert_eq!(accounts[0].email.as_deref(), Some("ada@example.com"));
        assert!(
            accounts[0]
                .app_metadata
                .as_ref()
                .is_some_and(|metadata| metadata.correlates_with(&tenant_id, &person_id))
        );
        Ok(())
    }

    #[tokio::test]
    async fn search_accounts_tolerates_foreign_metadata() -> AppResult<()> {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/v2/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "user_id": "auth0|legacy", "app_metadata": { "plan": "gold" } }
            ])))
            .mount(&server)
            .await;

        let session = connector(&server)?.open_session().await?;
        let accounts = session
            .search_accounts(
                &AccountCorrelationQuery::new(
                    &TenantId::new("tenant-1")?,
                    &PersonId::new("person-1")?,
                ),
                1,
            )
            .await?;

        assert_eq!(accounts.len(), 1);
        assert!(accounts[0].app_metadata.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn delete_account_targets_encoded_user_path() -> AppResult<()> {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("DELETE"))
            .and(path("/api/v2/users/auth0%7Cabc123"))
            .and(header("authorization", "Bearer token-123"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let session = connector(&server)?.open_session().await?;
        session
            .delete_account(&IdpAccountId::new("auth0|abc123")?)
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn rejected_client_credentials_map_to_unauthorized() -> AppResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": "access_denied",
                "error_description": "Unauthorized",
            })))
            .mount(&server)
            .await;

        let result = connector(&server)?.open_session().await;

        assert!(matches!(result, Err(AppError::Unauthorized(_))));
        Ok(())
    }

    fn unprovisioning_service(server: &MockServer) -> AppResult<ProvisioningService> {
        Ok(ProvisioningService::new(
            Arc::new(connector(server)?),
            Arc::new(LegacyRoleMapping::standard().clone()),
        ))
    }

    #[tokio::test]
    async fn token_endpoint_404_is_not_a_missing_account() -> AppResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let result = unprovisioning_service(&server)?
            .unprovision(&TenantId::new("tenant-1")?, &PersonId::new("person-1")?)
            .await;

        assert!(matches!(&result, Err(AppError::External(message))
            if message.contains("Auth0 token endpoint returned status 404")));
        assert!(!result.is_err_and(|error| error.is_not_found()));
        Ok(())
    }

    #[tokio::test]
    async fn search_endpoint_404_is_not_a_missing_account() -> AppResult<()> {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/v2/users"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let result = unprovisioning_service(&server)?
            .unprovision(&TenantId::new("tenant-1")?, &PersonId::new("person-1")?)
            .await;

        assert!(matches!(&result, Err(AppError::External(message))
            if message.contains("Auth0 search users endpoint returned status 404")));
        assert!(!result.is_err_and(|error| error.is_not_found()));
        Ok(())
    }

    #[tokio::test]
    async fn server_errors_map_to_external() -> AppResult<()> {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("DELETE"))
            .and(path("/api/v2/users/auth0%7Cabc123"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let session = connector(&server)?.open_session().await?;
        let result = session
            .delete_account(&IdpAccountId::new("auth0|abc123")?)
            .await;

        assert!(matches!(result, Err(AppError::External(message))
            if message == "Auth0 delete user endpoint returned status 503: maintenance"));
        Ok(())
    }

    #[test]
    fn config_rejects_blank_credentials() {
        assert!(Auth0ManagementConfig::new("acme.auth0.com", "", "secret").is_err());
        assert!(Auth0ManagementConfig::new("", "client", "secret").is_err());
    }

    #[test]
    fn config_debug_redacts_secret() -> AppResult<()> {
        let config = Auth0ManagementConfig::new("https://acme.auth0.com/", "client", "s3cr3t")?;
        let rendered = format!("{config:?}");
        assert!(rendered.contains("https://acme.auth0.com/"));
        assert!(!rendered.contains("s3cr3t"));
        Ok(())
    }

    #[test]
    fn user_url_escapes_reserved_characters_in_account_id() -> AppResult<()> {
        let session = Auth0ManagementSession {
            http_client: reqwest::Client::new(),
            api_url: Url::parse("https://acme.auth0.com/api/v2/")
                .map_err(|error| AppError::Internal(error.to_string()))?,
            access_token: String::new(),
        };

        let roles_url = session.user_url(&IdpAccountId::new("auth0|abc-1.2_~")?, "/roles")?;
        let user_url = session.user_url(&IdpAccountId::new("a/b c%")?, "")?;

        assert_eq!(
            roles_url.as_str(),
            "https://acme.auth0.com/api/v2/users/auth0%7Cabc-1.2_~/roles"
        );
        assert_eq!(
            user_url.as_str(),
            "https://acme.auth0.com/api/v2/users/a%2Fb%20c%25"
        );
        Ok(())
    }
}
