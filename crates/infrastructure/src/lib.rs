//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod auth0_management_connector;
mod in_memory_identity_provider;

pub use auth0_management_connector::{Auth0ManagementConfig, Auth0ManagementConnector};
pub use in_memory_identity_provider::InMemoryIdentityProvider;
