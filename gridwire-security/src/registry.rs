//! Startup registry resolving configured component names to instances.

use crate::credentials::{CredentialsAuthenticator, CredentialsSecurityManager};
use crate::error::SecurityError;
use crate::manager::{Authenticator, PostProcessor, SecurityManager};
use std::collections::HashMap;
use std::sync::Arc;

type Constructor<T> = Arc<dyn Fn() -> Arc<T> + Send + Sync>;

/// Name of the built-in credential table components.
pub const CREDENTIALS_COMPONENT: &str = "credentials";

/// Maps component names found in configuration to constructors.
#[derive(Clone, Default)]
pub struct SecurityRegistry {
    managers: HashMap<String, Constructor<dyn SecurityManager>>,
    post_processors: HashMap<String, Constructor<dyn PostProcessor>>,
    authenticators: HashMap<String, Constructor<dyn Authenticator>>,
}

impl SecurityRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in `credentials` manager and
    /// authenticator.
    pub fn with_builtins() -> Self {
        Self::new()
            .with_manager(CREDENTIALS_COMPONENT, || {
                Arc::new(CredentialsSecurityManager::new()) as Arc<dyn SecurityManager>
            })
            .with_authenticator(CREDENTIALS_COMPONENT, || {
                Arc::new(CredentialsAuthenticator::new()) as Arc<dyn Authenticator>
            })
    }

    pub fn with_manager<F>(mut self, name: impl Into<String>, ctor: F) -> Self
    where
        F: Fn() -> Arc<dyn SecurityManager> + Send + Sync + 'static,
    {
        self.managers.insert(name.into(), Arc::new(ctor));
        self
    }

    pub fn with_post_processor<F>(mut self, name: impl Into<String>, ctor: F) -> Self
    where
        F: Fn() -> Arc<dyn PostProcessor> + Send + Sync + 'static,
    {
        self.post_processors.insert(name.into(), Arc::new(ctor));
        self
    }

    pub fn with_authenticator<F>(mut self, name: impl Into<String>, ctor: F) -> Self
    where
        F: Fn() -> Arc<dyn Authenticator> + Send + Sync + 'static,
    {
        self.authenticators.insert(name.into(), Arc::new(ctor));
        self
    }

    pub fn create_manager(&self, name: &str) -> Result<Arc<dyn SecurityManager>, SecurityError> {
        resolve(&self.managers, "security manager", name)
    }

    pub fn create_post_processor(
        &self,
        name: &str,
    ) -> Result<Arc<dyn PostProcessor>, SecurityError> {
        resolve(&self.post_processors, "post processor", name)
    }

    pub fn create_authenticator(
        &self,
        name: &str,
    ) -> Result<Arc<dyn Authenticator>, SecurityError> {
        resolve(&self.authenticators, "authenticator", name)
    }
}

fn resolve<T: ?Sized>(
    table: &HashMap<String, Constructor<T>>,
    kind: &'static str,
    name: &str,
) -> Result<Arc<T>, SecurityError> {
    let name = name.trim();
    table
        .get(name)
        .map(|ctor| ctor())
        .ok_or_else(|| SecurityError::UnknownComponent {
            kind,
            name: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_resolve() {
        let registry = SecurityRegistry::with_builtins();
        assert!(registry.create_manager("credentials").is_ok());
        assert!(registry.create_manager(" credentials ").is_ok());
        assert!(registry.create_authenticator("credentials").is_ok());
    }

    #[test]
    fn test_unknown_names() {
        let registry = SecurityRegistry::with_builtins();
        for result in [
            registry.create_manager("com.example.Missing").err(),
            registry.create_manager("").err(),
            registry.create_post_processor("credentials").err(),
        ] {
            assert!(matches!(
                result,
                Some(SecurityError::UnknownComponent { .. })
            ));
        }
    }
}
