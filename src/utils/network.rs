use crate::config::StorageConfig;
use crate::error::{AzvisorError, Result};
use reqwest::Client;
use std::time::Duration;

/// Timeouts and identification used for every outbound HTTP client
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(120),
            user_agent: format!("azvisor/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl From<&StorageConfig> for NetworkConfig {
    fn from(config: &StorageConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.connect_timeout_seconds),
            request_timeout: Duration::from_secs(config.request_timeout_seconds),
            ..Self::default()
        }
    }
}

/// Create a properly configured HTTP client with timeouts
pub fn create_http_client(config: &NetworkConfig) -> Result<Client> {
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .user_agent(&config.user_agent)
        .build()
        .map_err(|e| AzvisorError::network(format!("Failed to create HTTP client: {}", e)))
}

/// Turn a transport failure into an error naming the host that could not be reached
pub fn classify_network_error(error: &reqwest::Error, url: &str) -> AzvisorError {
    let host = host_from_url(url);

    if error.is_timeout() {
        return AzvisorError::connection_timeout(format!(
            "Request to '{}' timed out",
            host
        ));
    }

    if error.is_connect() {
        if is_dns_resolution_error(error) {
            return AzvisorError::network(format!("Unable to resolve host '{}'", host));
        }
        return AzvisorError::network(format!("Failed to connect to '{}': {}", host, error));
    }

    AzvisorError::network(format!("Network error when accessing '{}': {}", host, error))
}

fn is_dns_resolution_error(error: &reqwest::Error) -> bool {
    let error_msg = error.to_string().to_lowercase();
    let dns_indicators = [
        "dns",
        "name resolution",
        "name or service not known",
        "nodename nor servname provided",
        "no such host",
        "failed to lookup address",
    ];

    dns_indicators
        .iter()
        .any(|&indicator| error_msg.contains(indicator))
}

/// Host part of a URL, used in error messages
pub fn host_from_url(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| "unknown-host".to_string())
}

/// Transport failures worth another attempt; API errors are never retried here
pub fn is_retryable_error(error: &AzvisorError) -> bool {
    match error {
        AzvisorError::ConnectionTimeout(_) => true,
        AzvisorError::NetworkError(msg) => !msg.starts_with("Unable to resolve host"),
        AzvisorError::HttpError(e) => e.is_timeout() || e.is_connect(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_is_extracted_from_url() {
        assert_eq!(
            host_from_url("https://acct.blob.core.windows.net/vhds?comp=list"),
            "acct.blob.core.windows.net"
        );
        assert_eq!(host_from_url("not a url"), "unknown-host");
    }

    #[test]
    fn retryable_errors() {
        assert!(is_retryable_error(&AzvisorError::connection_timeout("timeout")));
        assert!(is_retryable_error(&AzvisorError::network("connection reset")));
        assert!(!is_retryable_error(&AzvisorError::network(
            "Unable to resolve host 'x'"
        )));
        assert!(!is_retryable_error(&AzvisorError::api(Some(500), "boom")));
    }

    #[test]
    fn storage_config_timeouts_are_applied() {
        let storage = StorageConfig {
            connect_timeout_seconds: 5,
            request_timeout_seconds: 9,
            ..StorageConfig::default()
        };
        let config = NetworkConfig::from(&storage);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(9));
        assert!(config.user_agent.starts_with("azvisor/"));
    }
}
