//! The security service consulted by every operation.

use crate::error::SecurityError;
use crate::manager::{Authenticator, ExternalSecurity, PostProcessor, Principal, SecurityManager};
use crate::permission::ResourcePermission;
use crate::Properties;
use gridwire_protocol::Value;
use std::fmt;
use std::sync::Arc;

/// How security was configured for this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityServiceType {
    Disabled,
    Legacy,
    Enabled,
    Custom,
}

impl fmt::Display for SecurityServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SecurityServiceType::Disabled => "disabled",
            SecurityServiceType::Legacy => "legacy",
            SecurityServiceType::Enabled => "enabled",
            SecurityServiceType::Custom => "custom",
        };
        f.write_str(s)
    }
}

/// Authorization and post-processing strategy selected at startup.
pub enum SecurityService {
    /// No authentication, no authorization.
    Disabled,
    /// Authenticator-only security. Authorization checks pass.
    Legacy {
        client_authenticator: Option<Arc<dyn Authenticator>>,
        peer_authenticator: Option<Arc<dyn Authenticator>>,
    },
    /// Integrated security manager with an optional post-processor.
    Enabled {
        manager: Arc<dyn SecurityManager>,
        post_processor: Option<Arc<dyn PostProcessor>>,
    },
    /// Externally configured security framework.
    Custom { external: Arc<dyn ExternalSecurity> },
}

impl SecurityService {
    pub fn service_type(&self) -> SecurityServiceType {
        match self {
            SecurityService::Disabled => SecurityServiceType::Disabled,
            SecurityService::Legacy { .. } => SecurityServiceType::Legacy,
            SecurityService::Enabled { .. } => SecurityServiceType::Enabled,
            SecurityService::Custom { .. } => SecurityServiceType::Custom,
        }
    }

    /// Whether authorization is enforced on every operation.
    pub fn is_integrated_security(&self) -> bool {
        matches!(
            self,
            SecurityService::Enabled { .. } | SecurityService::Custom { .. }
        )
    }

    /// Whether clients must authenticate before sending requests.
    pub fn is_client_security_required(&self) -> bool {
        match self {
            SecurityService::Disabled => false,
            SecurityService::Legacy {
                client_authenticator,
                ..
            } => client_authenticator.is_some(),
            SecurityService::Enabled { .. } | SecurityService::Custom { .. } => true,
        }
    }

    pub fn is_peer_security_required(&self) -> bool {
        match self {
            SecurityService::Disabled => false,
            SecurityService::Legacy {
                peer_authenticator, ..
            } => peer_authenticator.is_some(),
            SecurityService::Enabled { .. } | SecurityService::Custom { .. } => true,
        }
    }

    /// Authenticates client credentials.
    pub fn authenticate(&self, credentials: &Properties) -> Result<Principal, SecurityError> {
        match self {
            SecurityService::Disabled => Ok(Principal::anonymous()),
            SecurityService::Legacy {
                client_authenticator,
                ..
            } => match client_authenticator {
                Some(authenticator) => authenticator.authenticate(credentials),
                None => Ok(Principal::anonymous()),
            },
            SecurityService::Enabled { manager, .. } => manager.authenticate(credentials),
            SecurityService::Custom { external } => external.login(credentials),
        }
    }

    /// Checks `permission` for `principal`.
    ///
    /// A no-op unless security is integrated. Without an authenticated
    /// principal an integrated check always fails.
    pub fn authorize(
        &self,
        principal: Option<&Principal>,
        permission: &ResourcePermission,
    ) -> Result<(), SecurityError> {
        let permitted = match self {
            SecurityService::Disabled | SecurityService::Legacy { .. } => return Ok(()),
            SecurityService::Enabled { manager, .. } => {
                principal.map_or(false, |p| manager.authorize(p, permission))
            }
            SecurityService::Custom { external } => {
                principal.map_or(false, |p| external.is_permitted(p, permission))
            }
        };

        if permitted {
            return Ok(());
        }

        let principal = principal.map_or("unauthenticated".to_string(), |p| p.to_string());
        tracing::warn!(
            target: "gridwire::security",
            "{} not authorized for {}",
            principal,
            permission
        );
        Err(SecurityError::NotAuthorized {
            principal,
            permission: permission.to_string(),
        })
    }

    pub fn authorize_data_read(&self, principal: Option<&Principal>) -> Result<(), SecurityError> {
        self.authorize(principal, &ResourcePermission::data_read())
    }

    pub fn authorize_data_write(&self, principal: Option<&Principal>) -> Result<(), SecurityError> {
        self.authorize(principal, &ResourcePermission::data_write())
    }

    pub fn authorize_region_read(
        &self,
        principal: Option<&Principal>,
        region: &str,
        key: Option<&str>,
    ) -> Result<(), SecurityError> {
        self.authorize(principal, &ResourcePermission::region_read(region, key))
    }

    pub fn authorize_region_write(
        &self,
        principal: Option<&Principal>,
        region: &str,
        key: Option<&str>,
    ) -> Result<(), SecurityError> {
        self.authorize(principal, &ResourcePermission::region_write(region, key))
    }

    pub fn authorize_cluster_manage(
        &self,
        principal: Option<&Principal>,
    ) -> Result<(), SecurityError> {
        self.authorize(principal, &ResourcePermission::cluster_manage())
    }

    /// Fast-path hint: `false` means [`post_process`](Self::post_process)
    /// would return every value unchanged.
    pub fn need_post_process(&self) -> bool {
        matches!(
            self,
            SecurityService::Enabled {
                post_processor: Some(_),
                ..
            }
        )
    }

    /// Lets the configured post-processor transform a value before it is
    /// returned to a client.
    ///
    /// When `is_serialized` is set the value must be a binary blob holding a
    /// JSON-serialized [`Value`]; it is decoded, processed and re-encoded.
    pub fn post_process(
        &self,
        principal: Option<&Principal>,
        region_path: &str,
        key: &Value,
        value: Value,
        is_serialized: bool,
    ) -> Result<Value, SecurityError> {
        let post_processor = match self {
            SecurityService::Enabled {
                post_processor: Some(pp),
                ..
            } => pp,
            _ => return Ok(value),
        };
        let Some(principal) = principal else {
            return Ok(value);
        };

        let region_name = region_path.strip_prefix('/').unwrap_or(region_path);

        if !is_serialized {
            return Ok(post_processor.process_region_value(principal, region_name, key, value));
        }

        let blob = match value {
            Value::Binary(bytes) => bytes,
            other => {
                return Err(SecurityError::Serialization(format!(
                    "serialized value must be binary, got {}",
                    other.encoding_type()
                )))
            }
        };
        let native: Value = serde_json::from_slice(&blob)
            .map_err(|e| SecurityError::Serialization(e.to_string()))?;
        let processed = post_processor.process_region_value(principal, region_name, key, native);
        let reserialized = serde_json::to_vec(&processed)
            .map_err(|e| SecurityError::Serialization(e.to_string()))?;
        Ok(Value::Binary(reserialized))
    }

    /// Releases the configured components.
    pub fn close(&self) {
        match self {
            SecurityService::Disabled => {}
            SecurityService::Legacy {
                client_authenticator,
                peer_authenticator,
            } => {
                for authenticator in [client_authenticator, peer_authenticator]
                    .into_iter()
                    .flatten()
                {
                    authenticator.close();
                }
            }
            SecurityService::Enabled {
                manager,
                post_processor,
            } => {
                manager.close();
                if let Some(pp) = post_processor {
                    pp.close();
                }
            }
            SecurityService::Custom { external } => external.close(),
        }
    }
}

impl fmt::Debug for SecurityService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityService")
            .field("type", &self.service_type())
            .field("need_post_process", &self.need_post_process())
            .finish()
    }
}
