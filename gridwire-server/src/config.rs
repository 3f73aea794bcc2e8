//! Server configuration.
//!
//! Configuration is loaded in order of precedence (later overrides earlier):
//! 1. Default values
//! 2. Config file (YAML)
//! 3. Environment variables
//!
//! Command line flags are applied on top by the binary.

use gridwire_protocol::{EncodingType, DEFAULT_PORT, MAX_FRAME_SIZE};
use gridwire_security::{
    Properties, SECURITY_CLIENT_AUTHENTICATOR, SECURITY_MANAGER, SECURITY_PEER_AUTHENTICATOR,
    SECURITY_POST_PROCESSOR, SECURITY_SHIRO_INIT,
};
use gridwire_store::RegionAttributes;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "GRIDWIRE_CONFIG";

/// Complete server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub network: NetworkConfig,
    pub security: SecurityConfig,
    pub regions: Vec<RegionConfig>,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
    /// Idle connection timeout in seconds (0 disables).
    pub idle_timeout_secs: u64,
    /// Time allowed for handshake and authentication in seconds.
    pub handshake_timeout_secs: u64,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Runtime worker threads.
    pub worker_threads: usize,
    /// Largest accepted frame body in bytes.
    pub max_frame_bytes: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            idle_timeout_secs: 300,
            handshake_timeout_secs: 10,
            max_connections: 1000,
            worker_threads: 16,
            max_frame_bytes: MAX_FRAME_SIZE,
        }
    }
}

impl NetworkConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs.max(1))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("GRIDWIRE_BIND") {
            if let Ok(parsed) = addr.parse() {
                self.bind_addr = parsed;
            }
        }
        if let Ok(val) = std::env::var("GRIDWIRE_IDLE_TIMEOUT") {
            if let Ok(parsed) = val.parse() {
                self.idle_timeout_secs = parsed;
            }
        }
        if let Ok(val) = std::env::var("GRIDWIRE_HANDSHAKE_TIMEOUT") {
            if let Ok(parsed) = val.parse() {
                self.handshake_timeout_secs = parsed;
            }
        }
        if let Ok(val) = std::env::var("GRIDWIRE_MAX_CONNECTIONS") {
            if let Ok(parsed) = val.parse() {
                self.max_connections = parsed;
            }
        }
        if let Ok(val) = std::env::var("GRIDWIRE_WORKER_THREADS") {
            if let Ok(parsed) = val.parse() {
                self.worker_threads = parsed;
            }
        }
        if let Ok(val) = std::env::var("GRIDWIRE_MAX_FRAME_BYTES") {
            if let Ok(parsed) = val.parse() {
                self.max_frame_bytes = parsed;
            }
        }
    }
}

/// Security configuration.
///
/// Named fields take precedence over entries of the same name in
/// `properties`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Security manager component name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
    /// Post-processor component name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_processor: Option<String>,
    /// Legacy client authenticator name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_authenticator: Option<String>,
    /// Legacy peer authenticator name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_authenticator: Option<String>,
    /// Path to an INI realm file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shiro_init: Option<PathBuf>,
    /// Additional `security-*` properties passed to components.
    pub properties: BTreeMap<String, String>,
}

impl SecurityConfig {
    /// Flattens the section into the property set read by the security
    /// factory.
    pub fn to_properties(&self) -> Properties {
        let mut props: Properties = self.properties.clone();
        let named = [
            (SECURITY_MANAGER, self.manager.clone()),
            (SECURITY_POST_PROCESSOR, self.post_processor.clone()),
            (SECURITY_CLIENT_AUTHENTICATOR, self.client_authenticator.clone()),
            (SECURITY_PEER_AUTHENTICATOR, self.peer_authenticator.clone()),
            (
                SECURITY_SHIRO_INIT,
                self.shiro_init
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
            ),
        ];
        for (name, value) in named {
            if let Some(value) = value {
                props.insert(name.to_string(), value);
            }
        }
        props
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("GRIDWIRE_SECURITY_MANAGER") {
            self.manager = Some(val);
        }
        if let Ok(val) = std::env::var("GRIDWIRE_SECURITY_POST_PROCESSOR") {
            self.post_processor = Some(val);
        }
        if let Ok(val) = std::env::var("GRIDWIRE_SECURITY_CLIENT_AUTHENTICATOR") {
            self.client_authenticator = Some(val);
        }
        if let Ok(val) = std::env::var("GRIDWIRE_SECURITY_PEER_AUTHENTICATOR") {
            self.peer_authenticator = Some(val);
        }
        if let Ok(val) = std::env::var("GRIDWIRE_SECURITY_SHIRO_INIT") {
            self.shiro_init = Some(PathBuf::from(val));
        }
    }
}

/// A region created in the store at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
}

impl RegionConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_type: None,
            value_type: None,
        }
    }

    /// Resolves the configured type constraints.
    pub fn attributes(&self) -> Result<RegionAttributes, ConfigError> {
        let mut attrs = RegionAttributes::new();
        if let Some(key_type) = &self.key_type {
            attrs = attrs.with_key_type(parse_encoding(&self.name, "key_type", key_type)?);
        }
        if let Some(value_type) = &self.value_type {
            attrs = attrs.with_value_type(parse_encoding(&self.name, "value_type", value_type)?);
        }
        Ok(attrs)
    }
}

fn parse_encoding(region: &str, field: &str, name: &str) -> Result<EncodingType, ConfigError> {
    name.parse().map_err(|e| {
        ConfigError::ValidationError(format!("region '{}' {}: {}", region, field, e))
    })
}

impl Config {
    /// Loads configuration from the file named by `GRIDWIRE_CONFIG` (if set)
    /// and environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from);
        Self::load_from(path.as_deref())
    }

    /// Loads configuration from an optional file, then applies environment
    /// overrides and validates the result.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;

        serde_yaml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))
    }

    /// Creates configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        self.network.apply_env_overrides();
        self.security.apply_env_overrides();

        // Comma-separated names, appended to the configured regions.
        if let Ok(val) = std::env::var("GRIDWIRE_REGIONS") {
            for name in val.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                if !self.regions.iter().any(|r| r.name == name) {
                    self.regions.push(RegionConfig::new(name));
                }
            }
        }
    }

    /// Checks values that cannot be expressed in the type system.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.worker_threads == 0 {
            return Err(ConfigError::ValidationError(
                "network.worker_threads must be at least 1".into(),
            ));
        }
        if self.network.max_frame_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "network.max_frame_bytes must be greater than 0".into(),
            ));
        }

        let mut seen = HashSet::new();
        for region in &self.regions {
            if region.name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "region name cannot be empty".into(),
                ));
            }
            if !seen.insert(region.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate region '{}'",
                    region.name
                )));
            }
            region.attributes()?;
        }
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file {:?}: {}", path, e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file {:?}: {}", path, e)
            }
            ConfigError::ValidationError(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

mod socket_addr_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::net::SocketAddr;

    pub fn serialize<S>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.bind_addr.to_string(), "127.0.0.1:40404");
        assert_eq!(config.network.idle_timeout_secs, 300);
        assert_eq!(config.network.handshake_timeout_secs, 10);
        assert_eq!(config.network.max_connections, 1000);
        assert_eq!(config.network.worker_threads, 16);
        assert_eq!(config.network.max_frame_bytes, 16 * 1024 * 1024);
        assert!(config.security.to_properties().is_empty());
        assert!(config.regions.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
network:
  bind_addr: "0.0.0.0:50505"
  idle_timeout_secs: 0
security:
  manager: credentials
  properties:
    security-credentials.admin: abc123
regions:
  - name: orders
    key_type: string
    value_type: STRING
  - name: scratch
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.network.bind_addr.to_string(), "0.0.0.0:50505");
        assert_eq!(config.network.idle_timeout(), None);
        // Unspecified fields keep defaults.
        assert_eq!(config.network.worker_threads, 16);
        assert_eq!(config.regions.len(), 2);
        assert!(config.validate().is_ok());

        let attrs = config.regions[0].attributes().unwrap();
        assert_eq!(attrs.key_type, Some(EncodingType::String));
        assert_eq!(attrs.value_type, Some(EncodingType::String));
        assert_eq!(config.regions[1].attributes().unwrap(), RegionAttributes::new());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = Config::default();
        config.security.manager = Some("credentials".into());
        config.regions.push(RegionConfig::new("orders"));

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(config.network.bind_addr, parsed.network.bind_addr);
        assert_eq!(config.security.manager, parsed.security.manager);
        assert_eq!(config.regions, parsed.regions);
    }

    #[test]
    fn test_security_properties_flattened() {
        let mut security = SecurityConfig::default();
        security
            .properties
            .insert(SECURITY_MANAGER.into(), "from-map".into());
        security
            .properties
            .insert("security-credentials.admin".into(), "hash".into());
        security.manager = Some("credentials".into());
        security.shiro_init = Some(PathBuf::from("/etc/gridwire/realm.ini"));

        let props = security.to_properties();
        assert_eq!(props.get(SECURITY_MANAGER).unwrap(), "credentials");
        assert_eq!(
            props.get(SECURITY_SHIRO_INIT).unwrap(),
            "/etc/gridwire/realm.ini"
        );
        assert_eq!(props.get("security-credentials.admin").unwrap(), "hash");
        assert!(!props.contains_key(SECURITY_POST_PROCESSOR));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = Config::default();
        config.network.worker_threads = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = Config::default();
        config.network.max_frame_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.regions = vec![RegionConfig::new("a"), RegionConfig::new("a")];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.regions = vec![RegionConfig::new(" ")];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        let mut region = RegionConfig::new("r");
        region.value_type = Some("DECIMAL".into());
        config.regions = vec![region];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gridwire.yaml");

        let mut config = Config::default();
        config.network.max_connections = 7;
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.network.max_connections, 7);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        bad.write_all(b"network: [not, a, map]").unwrap();
        assert!(matches!(
            Config::from_file(bad.path()),
            Err(ConfigError::ParseError(..))
        ));
        assert!(matches!(
            Config::from_file(dir.path().join("missing.yaml")),
            Err(ConfigError::IoError(..))
        ));
    }
}
