//! INI realm used when security is configured through an init file.
//!
//! ```ini
//! [users]
//! # name = sha256(password), role, role
//! admin = 8c6976e5b5410415bde908bd4dee15dfb167a9c873fc4bb8a81f6f2ab448a918, admin
//! reader = 3d4f2bf07dc1be38b20cd6e46949a1071f9d0e3d..., reader
//!
//! [roles]
//! admin = *
//! reader = DATA:READ
//! ```

use crate::credentials::AUTHENTICATION_FAILED_MESSAGE;
use crate::credentials::CredentialStore;
use crate::error::SecurityError;
use crate::manager::{ExternalSecurity, Principal};
use crate::permission::{parse_permissions, ResourcePermission};
use crate::{Properties, SECURITY_PASSWORD, SECURITY_USERNAME};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone)]
struct RealmUser {
    password_hash: String,
    roles: Vec<String>,
}

/// Users, roles and role permissions loaded from an INI file.
#[derive(Debug, Clone, Default)]
pub struct IniRealm {
    users: HashMap<String, RealmUser>,
    roles: HashMap<String, Vec<ResourcePermission>>,
}

impl IniRealm {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SecurityError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let realm = Self::parse(&contents)?;
        tracing::info!(
            target: "gridwire::security",
            "Loaded realm from {:?}: {} user(s), {} role(s)",
            path,
            realm.users.len(),
            realm.roles.len()
        );
        Ok(realm)
    }

    pub fn parse(contents: &str) -> Result<Self, SecurityError> {
        let mut realm = Self::default();
        let mut section = String::new();

        for (lineno, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = name.trim().to_ascii_lowercase();
                continue;
            }

            let (name, value) = line.split_once('=').ok_or_else(|| {
                SecurityError::Config(format!("line {}: expected 'name = value'", lineno + 1))
            })?;
            let name = name.trim().to_string();
            let value = value.trim();

            match section.as_str() {
                "users" => {
                    let mut parts = value.split(',').map(str::trim);
                    let password_hash = parts
                        .next()
                        .filter(|h| !h.is_empty())
                        .ok_or_else(|| {
                            SecurityError::Config(format!(
                                "line {}: user '{}' has no password hash",
                                lineno + 1,
                                name
                            ))
                        })?
                        .to_ascii_lowercase();
                    let roles = parts.filter(|r| !r.is_empty()).map(String::from).collect();
                    realm.users.insert(
                        name,
                        RealmUser {
                            password_hash,
                            roles,
                        },
                    );
                }
                "roles" => {
                    realm.roles.insert(name, parse_permissions(value)?);
                }
                // Sections for other frameworks are ignored.
                _ => {}
            }
        }

        for (user, record) in &realm.users {
            if let Some(role) = record.roles.iter().find(|r| !realm.roles.contains_key(*r)) {
                return Err(SecurityError::Config(format!(
                    "user '{}' references undefined role '{}'",
                    user, role
                )));
            }
        }

        Ok(realm)
    }
}

impl ExternalSecurity for IniRealm {
    fn login(&self, credentials: &Properties) -> Result<Principal, SecurityError> {
        let username = credentials.get(SECURITY_USERNAME);
        let password = credentials.get(SECURITY_PASSWORD);
        match (username, password) {
            (Some(u), Some(p)) => match self.users.get(u) {
                Some(user) if user.password_hash == CredentialStore::hash_password(p) => {
                    Ok(Principal::new(u.as_str()))
                }
                _ => Err(SecurityError::AuthenticationFailed(
                    AUTHENTICATION_FAILED_MESSAGE.to_string(),
                )),
            },
            _ => Err(SecurityError::AuthenticationFailed(
                AUTHENTICATION_FAILED_MESSAGE.to_string(),
            )),
        }
    }

    fn is_permitted(&self, principal: &Principal, permission: &ResourcePermission) -> bool {
        let Some(user) = self.users.get(principal.name()) else {
            return false;
        };
        user.roles
            .iter()
            .filter_map(|r| self.roles.get(r))
            .flatten()
            .any(|granted| granted.implies(permission))
    }
}
