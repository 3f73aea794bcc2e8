//! Built-in credential table.
//!
//! Passwords are validated against SHA-256 hashes supplied in the security
//! properties, so no plaintext password is ever configured:
//!
//! ```text
//! security-credentials.alice = <sha256 hex of alice's password>
//! security-permissions.alice = DATA:READ, DATA:WRITE:orders
//! ```

use crate::error::SecurityError;
use crate::manager::{Authenticator, Principal, SecurityManager};
use crate::permission::{parse_permissions, ResourcePermission};
use crate::{Properties, CREDENTIALS_PREFIX, PERMISSIONS_PREFIX, SECURITY_PASSWORD, SECURITY_USERNAME};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Message returned for any rejected username/password pair.
pub const AUTHENTICATION_FAILED_MESSAGE: &str =
    "Authentication error. Please check your credentials.";

#[derive(Debug, Clone, Default)]
struct UserRecord {
    password_hash: String,
    permissions: Vec<ResourcePermission>,
}

/// Users with hashed passwords and granted permissions.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    users: HashMap<String, UserRecord>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the table from `security-credentials.*` and
    /// `security-permissions.*` properties.
    pub fn from_properties(props: &Properties) -> Result<Self, SecurityError> {
        let mut store = Self::new();
        for (name, value) in props {
            if let Some(user) = name.strip_prefix(CREDENTIALS_PREFIX) {
                store.users.entry(user.to_string()).or_default().password_hash =
                    value.trim().to_ascii_lowercase();
            }
        }
        for (name, value) in props {
            if let Some(user) = name.strip_prefix(PERMISSIONS_PREFIX) {
                let record = store.users.get_mut(user).ok_or_else(|| {
                    SecurityError::Config(format!("permissions given for unknown user '{}'", user))
                })?;
                record.permissions = parse_permissions(value)?;
            }
        }
        Ok(store)
    }

    pub fn with_user(
        mut self,
        name: impl Into<String>,
        password: &str,
        permissions: Vec<ResourcePermission>,
    ) -> Self {
        self.users.insert(
            name.into(),
            UserRecord {
                password_hash: Self::hash_password(password),
                permissions,
            },
        );
        self
    }

    /// Adds every user of `other`, replacing users with the same name.
    pub fn merge(&mut self, other: CredentialStore) {
        self.users.extend(other.users);
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Hashes a password using SHA-256, returning a lowercase hex string.
    pub fn hash_password(password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(password.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Validates a plaintext password by hashing and comparing.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        match self.users.get(username) {
            Some(record) => record.password_hash == Self::hash_password(password),
            None => false,
        }
    }

    /// Authenticates `security-username`/`security-password` credentials.
    pub fn authenticate(&self, credentials: &Properties) -> Result<Principal, SecurityError> {
        let username = credentials.get(SECURITY_USERNAME);
        let password = credentials.get(SECURITY_PASSWORD);
        match (username, password) {
            (Some(u), Some(p)) if self.verify(u, p) => Ok(Principal::new(u.as_str())),
            _ => Err(SecurityError::AuthenticationFailed(
                AUTHENTICATION_FAILED_MESSAGE.to_string(),
            )),
        }
    }

    pub fn is_permitted(&self, principal: &Principal, permission: &ResourcePermission) -> bool {
        self.users
            .get(principal.name())
            .map(|record| record.permissions.iter().any(|p| p.implies(permission)))
            .unwrap_or(false)
    }
}

/// Security manager backed by a [`CredentialStore`].
///
/// Users found in the properties at `init` are added to the users the
/// manager was built with.
#[derive(Default)]
pub struct CredentialsSecurityManager {
    store: RwLock<CredentialStore>,
}

impl CredentialsSecurityManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: CredentialStore) -> Self {
        Self {
            store: RwLock::new(store),
        }
    }
}

impl SecurityManager for CredentialsSecurityManager {
    fn init(&self, props: &Properties) -> Result<(), SecurityError> {
        let loaded = CredentialStore::from_properties(props)?;
        tracing::info!(target: "gridwire::security", "Loaded {} user credential(s)", loaded.user_count());
        self.store.write().merge(loaded);
        Ok(())
    }

    fn authenticate(&self, credentials: &Properties) -> Result<Principal, SecurityError> {
        self.store.read().authenticate(credentials)
    }

    fn authorize(&self, principal: &Principal, permission: &ResourcePermission) -> bool {
        self.store.read().is_permitted(principal, permission)
    }
}

/// Legacy authenticator sharing the credential table format.
#[derive(Default)]
pub struct CredentialsAuthenticator {
    store: RwLock<CredentialStore>,
}

impl CredentialsAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: CredentialStore) -> Self {
        Self {
            store: RwLock::new(store),
        }
    }
}

impl Authenticator for CredentialsAuthenticator {
    fn init(&self, props: &Properties) -> Result<(), SecurityError> {
        let loaded = CredentialStore::from_properties(props)?;
        self.store.write().merge(loaded);
        Ok(())
    }

    fn authenticate(&self, credentials: &Properties) -> Result<Principal, SecurityError> {
        self.store.read().authenticate(credentials)
    }
}
