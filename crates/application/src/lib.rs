//! Application services and ports.

#![forbid(unsafe_code)]

mod identity_provider_ports;
mod provisioning_service;

pub use identity_provider_ports::{IdentityProviderConnector, IdentityProviderSession};
pub use provisioning_service::{
    PartialProvisioningPolicy, ProvisionedAccount, ProvisioningService,
};
