//! Per-connection execution context.

use gridwire_protocol::CodecRegistry;
use gridwire_security::{Principal, SecurityService};
use gridwire_store::Cache;
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

/// State handed to every operation handler on one connection.
///
/// Owned by the connection task. The shared pieces are read-only snapshots
/// taken when the connection was accepted.
#[derive(Clone)]
pub struct ExecutionContext {
    /// Unique connection ID.
    pub connection_id: String,
    pub remote_addr: Option<SocketAddr>,
    cache: Arc<dyn Cache>,
    security: Arc<SecurityService>,
    codecs: Arc<CodecRegistry>,
    principal: Option<Principal>,
}

impl ExecutionContext {
    pub fn new(
        cache: Arc<dyn Cache>,
        security: Arc<SecurityService>,
        codecs: Arc<CodecRegistry>,
    ) -> Self {
        Self {
            connection_id: Uuid::new_v4().to_string(),
            remote_addr: None,
            cache,
            security,
            codecs,
            principal: None,
        }
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn cache(&self) -> &dyn Cache {
        self.cache.as_ref()
    }

    pub fn security(&self) -> &SecurityService {
        &self.security
    }

    /// Shared handle to the security snapshot this connection runs under.
    pub fn security_handle(&self) -> Arc<SecurityService> {
        self.security.clone()
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    /// Principal bound by a completed handshake.
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn set_principal(&mut self, principal: Principal) {
        self.principal = Some(principal);
    }

    /// Label used as the log prefix for this connection.
    pub fn label(&self) -> String {
        match self.remote_addr {
            Some(addr) => addr.to_string(),
            None => self.connection_id.clone(),
        }
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("connection_id", &self.connection_id)
            .field("remote_addr", &self.remote_addr)
            .field("security", &self.security.service_type())
            .field("principal", &self.principal)
            .finish()
    }
}
