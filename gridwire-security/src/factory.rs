//! Selects and builds the [`SecurityService`] from startup configuration.

use crate::error::SecurityError;
use crate::manager::{ExternalSecurity, PostProcessor, SecurityManager};
use crate::realm::IniRealm;
use crate::registry::SecurityRegistry;
use crate::service::{SecurityService, SecurityServiceType};
use crate::{
    Properties, SECURITY_CLIENT_AUTHENTICATOR, SECURITY_MANAGER, SECURITY_PEER_AUTHENTICATOR,
    SECURITY_POST_PROCESSOR, SECURITY_SHIRO_INIT,
};
use std::sync::Arc;

/// Already-built components handed to the factory by the embedding process.
///
/// An injected manager or post-processor wins over a configured name.
#[derive(Clone, Default)]
pub struct SecurityComponents {
    pub manager: Option<Arc<dyn SecurityManager>>,
    pub post_processor: Option<Arc<dyn PostProcessor>>,
    /// External security framework already active in the process.
    pub active_external: Option<Arc<dyn ExternalSecurity>>,
}

impl SecurityComponents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_manager(mut self, manager: Arc<dyn SecurityManager>) -> Self {
        self.manager = Some(manager);
        self
    }

    pub fn with_post_processor(mut self, post_processor: Arc<dyn PostProcessor>) -> Self {
        self.post_processor = Some(post_processor);
        self
    }

    pub fn with_active_external(mut self, external: Arc<dyn ExternalSecurity>) -> Self {
        self.active_external = Some(external);
        self
    }
}

pub struct SecurityServiceFactory;

impl SecurityServiceFactory {
    /// Picks the security mode. First match wins:
    ///
    /// 1. an init file property is present: `Custom`
    /// 2. a security manager is available: `Enabled`
    /// 3. a legacy client or peer authenticator is named: `Legacy`
    /// 4. an external framework is already active: `Custom`
    /// 5. otherwise `Disabled`
    pub fn determine_type(
        props: &Properties,
        has_manager: bool,
        external_active: bool,
    ) -> SecurityServiceType {
        if props.contains_key(SECURITY_SHIRO_INIT) {
            return SecurityServiceType::Custom;
        }
        if has_manager {
            return SecurityServiceType::Enabled;
        }
        if props.contains_key(SECURITY_CLIENT_AUTHENTICATOR)
            || props.contains_key(SECURITY_PEER_AUTHENTICATOR)
        {
            return SecurityServiceType::Legacy;
        }
        if external_active {
            return SecurityServiceType::Custom;
        }
        SecurityServiceType::Disabled
    }

    /// Builds the service and hands the security properties to every
    /// component it configures.
    pub fn create(
        props: &Properties,
        registry: &SecurityRegistry,
        components: SecurityComponents,
    ) -> Result<SecurityService, SecurityError> {
        let manager = match components.manager {
            Some(manager) => Some(manager),
            None => configured(props, SECURITY_MANAGER)
                .map(|name| registry.create_manager(name))
                .transpose()?,
        };
        let post_processor = match components.post_processor {
            Some(pp) => Some(pp),
            None => configured(props, SECURITY_POST_PROCESSOR)
                .map(|name| registry.create_post_processor(name))
                .transpose()?,
        };

        let service_type = Self::determine_type(
            props,
            manager.is_some(),
            components.active_external.is_some(),
        );

        if post_processor.is_some() && service_type != SecurityServiceType::Enabled {
            tracing::warn!(
                target: "gridwire::security",
                "Post processor ignored: security mode is {}",
                service_type
            );
        }

        let service = match service_type {
            SecurityServiceType::Custom => {
                let external: Arc<dyn ExternalSecurity> =
                    match configured(props, SECURITY_SHIRO_INIT) {
                        Some(path) => Arc::new(IniRealm::load(path)?) as Arc<dyn ExternalSecurity>,
                        None => components.active_external.ok_or_else(|| {
                            SecurityError::Config(format!(
                                "{} is blank and no external security is active",
                                SECURITY_SHIRO_INIT
                            ))
                        })?,
                    };
                SecurityService::Custom { external }
            }
            SecurityServiceType::Enabled => {
                let manager = manager.ok_or_else(|| {
                    SecurityError::Config("security manager disappeared".to_string())
                })?;
                manager.init(props)?;
                if let Some(pp) = &post_processor {
                    pp.init(props)?;
                }
                SecurityService::Enabled {
                    manager,
                    post_processor,
                }
            }
            SecurityServiceType::Legacy => {
                let client_authenticator = configured(props, SECURITY_CLIENT_AUTHENTICATOR)
                    .map(|name| registry.create_authenticator(name))
                    .transpose()?;
                let peer_authenticator = configured(props, SECURITY_PEER_AUTHENTICATOR)
                    .map(|name| registry.create_authenticator(name))
                    .transpose()?;
                for authenticator in [&client_authenticator, &peer_authenticator]
                    .into_iter()
                    .flatten()
                {
                    authenticator.init(props)?;
                }
                SecurityService::Legacy {
                    client_authenticator,
                    peer_authenticator,
                }
            }
            SecurityServiceType::Disabled => SecurityService::Disabled,
        };

        tracing::info!(target: "gridwire::security", "Security mode: {}", service_type);

        Ok(service)
    }
}

/// Returns a property value unless it is missing or blank.
fn configured<'a>(props: &'a Properties, key: &str) -> Option<&'a str> {
    props
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialStore;
    use crate::manager::Principal;
    use crate::permission::ResourcePermission;
    use crate::{CREDENTIALS_PREFIX, PERMISSIONS_PREFIX, SECURITY_PASSWORD, SECURITY_USERNAME};
    use gridwire_protocol::Value;
    use std::io::Write;

    fn props(pairs: &[(&str, &str)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn create(props: &Properties) -> Result<SecurityService, SecurityError> {
        SecurityServiceFactory::create(
            props,
            &SecurityRegistry::with_builtins(),
            SecurityComponents::new(),
        )
    }

    struct DenyAll;

    impl ExternalSecurity for DenyAll {
        fn login(&self, _credentials: &Properties) -> Result<Principal, SecurityError> {
            Err(SecurityError::AuthenticationFailed("denied".into()))
        }

        fn is_permitted(&self, _principal: &Principal, _permission: &ResourcePermission) -> bool {
            false
        }
    }

    struct Identity;

    impl PostProcessor for Identity {
        fn process_region_value(
            &self,
            _principal: &Principal,
            _region_name: &str,
            _key: &Value,
            value: Value,
        ) -> Value {
            value
        }
    }

    #[test]
    fn test_nothing_configured_is_disabled() {
        let service = create(&Properties::new()).unwrap();
        assert_eq!(service.service_type(), SecurityServiceType::Disabled);
        assert!(!service.is_integrated_security());
        assert!(!service.is_client_security_required());
        assert!(!service.is_peer_security_required());
    }

    #[test]
    fn test_client_authenticator_is_legacy() {
        let service = create(&props(&[(SECURITY_CLIENT_AUTHENTICATOR, "credentials")])).unwrap();
        assert_eq!(service.service_type(), SecurityServiceType::Legacy);
        assert!(!service.is_integrated_security());
        assert!(service.is_client_security_required());
        assert!(!service.is_peer_security_required());
    }

    #[test]
    fn test_peer_authenticator_is_legacy() {
        let service = create(&props(&[(SECURITY_PEER_AUTHENTICATOR, "credentials")])).unwrap();
        assert_eq!(service.service_type(), SecurityServiceType::Legacy);
        assert!(!service.is_client_security_required());
        assert!(service.is_peer_security_required());
    }

    #[test]
    fn test_security_manager_is_enabled() {
        let service = create(&props(&[
            (SECURITY_MANAGER, "credentials"),
            (SECURITY_CLIENT_AUTHENTICATOR, "credentials"),
        ]))
        .unwrap();
        assert_eq!(service.service_type(), SecurityServiceType::Enabled);
        assert!(service.is_integrated_security());
        assert!(service.is_client_security_required());
        assert!(service.is_peer_security_required());
        assert!(!service.need_post_process());
    }

    #[test]
    fn test_manager_receives_properties() {
        let service = create(&props(&[
            (SECURITY_MANAGER, "credentials"),
            (
                format!("{}alice", CREDENTIALS_PREFIX).as_str(),
                CredentialStore::hash_password("pw").as_str(),
            ),
            (format!("{}alice", PERMISSIONS_PREFIX).as_str(), "DATA:READ"),
        ]))
        .unwrap();

        let principal = service
            .authenticate(&props(&[
                (SECURITY_USERNAME, "alice"),
                (SECURITY_PASSWORD, "pw"),
            ]))
            .unwrap();
        assert!(service.authorize_data_read(Some(&principal)).is_ok());
        assert!(service.authorize_data_write(Some(&principal)).is_err());
    }

    #[test]
    fn test_injected_manager_wins_over_name() {
        let injected = crate::credentials::CredentialsSecurityManager::with_store(
            CredentialStore::new().with_user("bob", "pw", Vec::new()),
        );
        let service = SecurityServiceFactory::create(
            &props(&[(SECURITY_MANAGER, "does-not-exist")]),
            &SecurityRegistry::with_builtins(),
            SecurityComponents::new().with_manager(Arc::new(injected)),
        )
        .unwrap();
        assert_eq!(service.service_type(), SecurityServiceType::Enabled);

        let mut creds = Properties::new();
        creds.insert(SECURITY_USERNAME.to_string(), "bob".to_string());
        creds.insert(SECURITY_PASSWORD.to_string(), "pw".to_string());
        let principal = service.authenticate(&creds).unwrap();
        assert_eq!(principal.name(), "bob");

        creds.insert(SECURITY_PASSWORD.to_string(), "wrong".to_string());
        assert!(service.authenticate(&creds).is_err());
    }

    #[test]
    fn test_unknown_component_names() {
        assert!(matches!(
            create(&props(&[(SECURITY_MANAGER, "com.example.Nope")])),
            Err(SecurityError::UnknownComponent { .. })
        ));
        assert!(matches!(
            create(&props(&[(SECURITY_CLIENT_AUTHENTICATOR, "nope")])),
            Err(SecurityError::UnknownComponent { .. })
        ));
    }

    #[test]
    fn test_post_processor_enables_post_processing() {
        let registry = SecurityRegistry::with_builtins()
            .with_post_processor("identity", || Arc::new(Identity) as Arc<dyn PostProcessor>);
        let service = SecurityServiceFactory::create(
            &props(&[
                (SECURITY_MANAGER, "credentials"),
                (SECURITY_POST_PROCESSOR, "identity"),
            ]),
            &registry,
            SecurityComponents::new(),
        )
        .unwrap();
        assert!(service.need_post_process());
    }

    #[test]
    fn test_init_file_wins_over_manager() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[users]\nroot = {}, admin\n[roles]\nadmin = *",
            CredentialStore::hash_password("toor")
        )
        .unwrap();

        let service = create(&props(&[
            (SECURITY_SHIRO_INIT, file.path().to_str().unwrap()),
            (SECURITY_MANAGER, "credentials"),
        ]))
        .unwrap();
        assert_eq!(service.service_type(), SecurityServiceType::Custom);
        assert!(service.is_integrated_security());
        assert!(service.is_client_security_required());
        assert!(service.is_peer_security_required());
    }

    #[test]
    fn test_active_external_is_custom_after_legacy() {
        let components = SecurityComponents::new().with_active_external(Arc::new(DenyAll));
        let service = SecurityServiceFactory::create(
            &Properties::new(),
            &SecurityRegistry::new(),
            components.clone(),
        )
        .unwrap();
        assert_eq!(service.service_type(), SecurityServiceType::Custom);
        assert!(service.is_integrated_security());

        let service = SecurityServiceFactory::create(
            &props(&[(SECURITY_CLIENT_AUTHENTICATOR, "credentials")]),
            &SecurityRegistry::with_builtins(),
            components,
        )
        .unwrap();
        assert_eq!(service.service_type(), SecurityServiceType::Legacy);
    }

    #[test]
    fn test_determine_type_precedence() {
        let all = props(&[
            (SECURITY_SHIRO_INIT, "realm.ini"),
            (SECURITY_CLIENT_AUTHENTICATOR, "x"),
        ]);
        assert_eq!(
            SecurityServiceFactory::determine_type(&all, true, true),
            SecurityServiceType::Custom
        );
        let legacy = props(&[(SECURITY_PEER_AUTHENTICATOR, "x")]);
        assert_eq!(
            SecurityServiceFactory::determine_type(&legacy, true, true),
            SecurityServiceType::Enabled
        );
        assert_eq!(
            SecurityServiceFactory::determine_type(&legacy, false, true),
            SecurityServiceType::Legacy
        );
        assert_eq!(
            SecurityServiceFactory::determine_type(&Properties::new(), false, false),
            SecurityServiceType::Disabled
        );
    }
}
