//! Pluggable security components.

use crate::error::SecurityError;
use crate::permission::ResourcePermission;
use crate::Properties;
use gridwire_protocol::Value;
use std::fmt;

/// An authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    name: String,
}

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Identity used when security is disabled.
    pub fn anonymous() -> Self {
        Self::new("anonymous")
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Integrated security manager: authenticates credentials and authorizes
/// every operation.
pub trait SecurityManager: Send + Sync {
    /// Receives the full security property set once at startup.
    fn init(&self, _props: &Properties) -> Result<(), SecurityError> {
        Ok(())
    }

    /// Verifies `credentials` (`security-username`, `security-password` and,
    /// from PLAIN, `security-authorization-id`).
    fn authenticate(&self, credentials: &Properties) -> Result<Principal, SecurityError>;

    fn authorize(&self, principal: &Principal, permission: &ResourcePermission) -> bool;

    fn close(&self) {}
}

/// Transforms values right before they are returned to a client.
pub trait PostProcessor: Send + Sync {
    fn init(&self, _props: &Properties) -> Result<(), SecurityError> {
        Ok(())
    }

    fn process_region_value(
        &self,
        principal: &Principal,
        region_name: &str,
        key: &Value,
        value: Value,
    ) -> Value;

    fn close(&self) {}
}

/// Legacy authenticator. Verifies credentials only; it has no say in
/// authorization.
pub trait Authenticator: Send + Sync {
    fn init(&self, _props: &Properties) -> Result<(), SecurityError> {
        Ok(())
    }

    fn authenticate(&self, credentials: &Properties) -> Result<Principal, SecurityError>;

    fn close(&self) {}
}

/// An externally configured security framework, such as a realm loaded from
/// an INI file or one already active in the embedding process.
pub trait ExternalSecurity: Send + Sync {
    fn login(&self, credentials: &Properties) -> Result<Principal, SecurityError>;

    fn is_permitted(&self, principal: &Principal, permission: &ResourcePermission) -> bool;

    fn close(&self) {}
}
