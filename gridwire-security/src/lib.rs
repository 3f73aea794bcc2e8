//! # gridwire-security
//!
//! Security service for the gridwire gateway.
//!
//! This crate provides:
//! - The [`SecurityService`] strategy (disabled, legacy, enabled, custom)
//!   consulted by every operation
//! - [`SecurityServiceFactory`] selecting the strategy from security properties
//! - Pluggable [`SecurityManager`], [`PostProcessor`], [`Authenticator`] and
//!   [`ExternalSecurity`] components resolved through a [`SecurityRegistry`]
//! - Built-in SHA-256 credential table and INI realm implementations
//! - Resource permissions with wildcard implication

pub mod credentials;
pub mod error;
pub mod factory;
pub mod manager;
pub mod permission;
pub mod realm;
pub mod registry;
pub mod service;

pub use credentials::{CredentialStore, CredentialsAuthenticator, CredentialsSecurityManager};
pub use error::SecurityError;
pub use factory::{SecurityComponents, SecurityServiceFactory};
pub use manager::{Authenticator, ExternalSecurity, PostProcessor, Principal, SecurityManager};
pub use permission::{Operation, Resource, ResourcePermission};
pub use realm::IniRealm;
pub use registry::SecurityRegistry;
pub use service::{SecurityService, SecurityServiceType};

use std::collections::BTreeMap;

/// Security properties and credential sets.
pub type Properties = BTreeMap<String, String>;

/// Name of the security manager component.
pub const SECURITY_MANAGER: &str = "security-manager";
/// Name of the post-processor component.
pub const SECURITY_POST_PROCESSOR: &str = "security-post-processor";
/// Name of the legacy client authenticator.
pub const SECURITY_CLIENT_AUTHENTICATOR: &str = "security-client-authenticator";
/// Name of the legacy peer authenticator.
pub const SECURITY_PEER_AUTHENTICATOR: &str = "security-peer-authenticator";
/// Path of the INI realm file.
pub const SECURITY_SHIRO_INIT: &str = "security-shiro-init";

/// Credential property carrying the identity to act as, when given.
pub const SECURITY_AUTHORIZATION_ID: &str = "security-authorization-id";
/// Credential property carrying the username.
pub const SECURITY_USERNAME: &str = "security-username";
/// Credential property carrying the password.
pub const SECURITY_PASSWORD: &str = "security-password";

/// Prefix of `<user> = <sha256 hex>` entries read by the credential table.
pub const CREDENTIALS_PREFIX: &str = "security-credentials.";
/// Prefix of `<user> = PERM, PERM` entries read by the credential table.
pub const PERMISSIONS_PREFIX: &str = "security-permissions.";
