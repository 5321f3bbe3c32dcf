//! Configuration settings management
//!
//! Settings are layered: built-in defaults, then the configuration file,
//! then `AZVISOR__*` environment variables, then the well-known `AZURE_*`
//! variables used by every Azure tool.

use crate::error::{AzvisorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_MANAGEMENT_URL: &str = "https://management.azure.com";
pub const DEFAULT_AUTHORITY_URL: &str = "https://login.microsoftonline.com";
pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://{account}.blob.core.windows.net";

/// Base URLs of the services the client talks to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EndpointConfig {
    pub management: String,
    pub authority: String,
    /// Blob endpoint template, `{account}` is replaced by the storage account name
    pub storage: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            management: DEFAULT_MANAGEMENT_URL.to_string(),
            authority: DEFAULT_AUTHORITY_URL.to_string(),
            storage: DEFAULT_STORAGE_ENDPOINT.to_string(),
        }
    }
}

/// Throttling retry behaviour of the request executor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub wait_seconds: u64,
    pub max_wait_seconds: u64,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            wait_seconds: 300,
            max_wait_seconds: 300,
            multiplier: 1.0,
            jitter: false,
        }
    }
}

/// Provisioning poll intervals and bounds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollingConfig {
    pub nic_interval_seconds: u64,
    pub nic_max_attempts: u32,
    pub resource_interval_seconds: u64,
    pub resource_deadline_seconds: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            nic_interval_seconds: 120,
            nic_max_attempts: 5,
            resource_interval_seconds: 60,
            resource_deadline_seconds: 7200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Safety ceiling for marker-based listings
    pub max_pages: usize,
    pub connect_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_pages: 500,
            connect_timeout_seconds: 30,
            request_timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub debug: bool,
    pub subscription_id: String,
    pub tenant_id: String,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    /// `clientsecret` or `default`
    pub auth_provider: String,
    pub endpoints: EndpointConfig,
    pub retry: RetryConfig,
    pub polling: PollingConfig,
    pub storage: StorageConfig,
    /// Credential lookup keyed by provider or OS name
    #[serde(skip_serializing)]
    pub credentials: HashMap<String, String>,
    pub output_json: bool,
    pub no_color: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            subscription_id: String::new(),
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            auth_provider: "clientsecret".to_string(),
            endpoints: EndpointConfig::default(),
            retry: RetryConfig::default(),
            polling: PollingConfig::default(),
            storage: StorageConfig::default(),
            credentials: HashMap::new(),
            output_json: false,
            no_color: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.subscription_id.is_empty() {
            return Err(AzvisorError::config("Subscription ID is required"));
        }

        if self.tenant_id.is_empty() && self.lookup_credentials("azure").is_none() {
            return Err(AzvisorError::config("Tenant ID is required"));
        }

        if self.retry.max_attempts == 0 {
            return Err(AzvisorError::config("retry.max_attempts must be at least 1"));
        }

        if !self.endpoints.storage.contains("{account}") {
            return Err(AzvisorError::config(
                "endpoints.storage must contain the {account} placeholder",
            ));
        }

        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        #[cfg(any(target_os = "linux", target_os = "macos"))]
        {
            use std::env;
            let config_dir = if let Ok(xdg_config_home) = env::var("XDG_CONFIG_HOME") {
                PathBuf::from(xdg_config_home)
            } else {
                let home_dir = env::var("HOME")
                    .map_err(|_| AzvisorError::config("HOME environment variable not set"))?;
                PathBuf::from(home_dir).join(".config")
            };
            Ok(config_dir.join("azvisor").join("azvisor.toml"))
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            let config_dir = dirs::config_dir()
                .ok_or_else(|| AzvisorError::config("Unable to determine config directory"))?;
            Ok(config_dir.join("azvisor").join("azvisor.toml"))
        }
    }

    pub fn load() -> Result<Self> {
        load_config()
    }

    /// Look up a credential entry by provider or OS name (case-insensitive)
    pub fn lookup_credentials(&self, key: &str) -> Option<&str> {
        find_credential(&self.credentials, key)
    }
}

/// Case-insensitive lookup in a credential map; empty entries count as missing
pub fn find_credential<'a>(credentials: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    let key = key.to_lowercase();
    credentials
        .iter()
        .find(|(k, _)| k.to_lowercase() == key)
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.is_empty())
}

/// Load configuration from the default path and validate it
pub fn load_config() -> Result<Config> {
    let config = load_config_no_validation()?;
    config.validate()?;
    Ok(config)
}

/// Load configuration without validation
pub fn load_config_no_validation() -> Result<Config> {
    let config_path = Config::get_config_path()?;
    load_from_path(Some(&config_path))
}

/// Load configuration with an explicit file, falling back to defaults when it is absent
pub fn load_from_path(path: Option<&Path>) -> Result<Config> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path.to_path_buf()).required(false));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("AZVISOR")
            .separator("__")
            .try_parsing(true),
    );

    let mut config: Config = builder.build()?.try_deserialize()?;
    load_from_env(&mut config);
    Ok(config)
}

fn load_from_env(config: &mut Config) {
    if let Ok(value) = std::env::var("DEBUG") {
        config.debug = value.to_lowercase() == "true" || value == "1";
    }

    if let Ok(value) = std::env::var("AZURE_SUBSCRIPTION_ID") {
        config.subscription_id = value;
    }

    if let Ok(value) = std::env::var("AZURE_TENANT_ID") {
        config.tenant_id = value;
    }

    if let Ok(value) = std::env::var("AZURE_CLIENT_ID") {
        config.client_id = value;
    }

    if let Ok(value) = std::env::var("AZURE_CLIENT_SECRET") {
        config.client_secret = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn defaults_keep_fixed_throttle_wait() {
        let config = Config::default();
        assert_eq!(config.retry.max_attempts, 10);
        assert_eq!(config.retry.wait_seconds, 300);
        assert_eq!(config.retry.multiplier, 1.0);
        assert!(!config.retry.jitter);
        assert_eq!(config.polling.nic_max_attempts, 5);
        assert_eq!(config.polling.nic_interval_seconds, 120);
    }

    #[test]
    fn validate_requires_subscription() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(AzvisorError::ConfigError(_))));
    }

    #[test]
    fn validate_accepts_credential_lookup_instead_of_tenant() {
        let mut config = Config::default();
        config.subscription_id = "sub".to_string();
        config
            .credentials
            .insert("azure".to_string(), "tenant:client:secret".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_storage_template_without_placeholder() {
        let mut config = Config::default();
        config.subscription_id = "sub".to_string();
        config.tenant_id = "tenant".to_string();
        config.endpoints.storage = "https://blob.example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn lookup_credentials_is_case_insensitive() {
        let mut config = Config::default();
        config
            .credentials
            .insert("Windows".to_string(), "admin:pass".to_string());
        assert_eq!(config.lookup_credentials("windows"), Some("admin:pass"));
        assert_eq!(config.lookup_credentials("unix"), None);
    }

    #[test]
    #[serial]
    fn file_values_are_loaded_and_env_overrides_them() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
subscription_id = "file-sub"
tenant_id = "file-tenant"

[retry]
max_attempts = 3
jitter = true

[credentials]
windows = "admin:secret"
"#
        )
        .unwrap();

        std::env::set_var("AZURE_SUBSCRIPTION_ID", "env-sub");
        let config = load_from_path(Some(file.path())).unwrap();
        std::env::remove_var("AZURE_SUBSCRIPTION_ID");

        assert_eq!(config.subscription_id, "env-sub");
        assert_eq!(config.tenant_id, "file-tenant");
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.retry.jitter);
        assert_eq!(config.retry.wait_seconds, 300);
        assert_eq!(config.lookup_credentials("windows"), Some("admin:secret"));
    }

    #[test]
    #[serial]
    fn missing_file_falls_back_to_defaults() {
        let config = load_from_path(Some(Path::new("/nonexistent/azvisor.toml"))).unwrap();
        assert_eq!(config.endpoints, EndpointConfig::default());
    }
}
