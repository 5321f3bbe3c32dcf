use std::time::Duration;
use thiserror::Error;

/// Main error type for azvisor operations
#[derive(Debug, Error)]
pub enum AzvisorError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Azure API error (status {}): {message}", status_label(.status))]
    ApiError {
        status: Option<u16>,
        message: String,
    },

    #[error("Request to {endpoint} still throttled after {attempts} attempts")]
    Throttled { endpoint: String, attempts: usize },

    #[error("{kind} not found: {name}")]
    ResourceNotFound { kind: String, name: String },

    #[error("{resource} was not provisioned after {attempts} checks")]
    ProvisioningTimeout { resource: String, attempts: u32 },

    #[error("Deadline of {:?} exceeded waiting for {resource}", .deadline)]
    DeadlineExceeded { resource: String, deadline: Duration },

    #[error("Provisioning of {resource} ended in state '{state}'")]
    ProvisioningFailed { resource: String, state: String },

    #[error("Unable to obtain a SAS token for storage account '{account}'")]
    SasUnavailable { account: String },

    #[error("Listing stopped after {pages} pages with a continuation marker still pending")]
    PaginationLimit { pages: usize },

    #[error("Invalid resource id '{id}': {reason}")]
    InvalidResourceId { id: String, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Connection timeout: {0}")]
    ConnectionTimeout(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    XmlError(#[from] quick_xml::DeError),

    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("Configuration loading error: {0}")]
    ConfigLoadError(#[from] config::ConfigError),
}

fn status_label(status: &Option<u16>) -> String {
    status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "none".to_string())
}

impl AzvisorError {
    pub fn authentication<S: Into<String>>(msg: S) -> Self {
        Self::AuthenticationError(msg.into())
    }

    pub fn api<S: Into<String>>(status: Option<u16>, msg: S) -> Self {
        Self::ApiError {
            status,
            message: msg.into(),
        }
    }

    pub fn throttled<S: Into<String>>(endpoint: S, attempts: usize) -> Self {
        Self::Throttled {
            endpoint: endpoint.into(),
            attempts,
        }
    }

    pub fn not_found<K: Into<String>, N: Into<String>>(kind: K, name: N) -> Self {
        Self::ResourceNotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn provisioning_timeout<S: Into<String>>(resource: S, attempts: u32) -> Self {
        Self::ProvisioningTimeout {
            resource: resource.into(),
            attempts,
        }
    }

    pub fn deadline_exceeded<S: Into<String>>(resource: S, deadline: Duration) -> Self {
        Self::DeadlineExceeded {
            resource: resource.into(),
            deadline,
        }
    }

    pub fn provisioning_failed<R: Into<String>, S: Into<String>>(resource: R, state: S) -> Self {
        Self::ProvisioningFailed {
            resource: resource.into(),
            state: state.into(),
        }
    }

    pub fn sas_unavailable<S: Into<String>>(account: S) -> Self {
        Self::SasUnavailable {
            account: account.into(),
        }
    }

    pub fn invalid_resource_id<I: Into<String>, R: Into<String>>(id: I, reason: R) -> Self {
        Self::InvalidResourceId {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::NetworkError(msg.into())
    }

    pub fn connection_timeout<S: Into<String>>(msg: S) -> Self {
        Self::ConnectionTimeout(msg.into())
    }

    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// HTTP status carried by the error, if it came from an API response
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ApiError { status, .. } => *status,
            Self::Throttled { .. } => Some(429),
            _ => None,
        }
    }
}

/// Result type alias for azvisor operations
pub type Result<T> = std::result::Result<T, AzvisorError>;
