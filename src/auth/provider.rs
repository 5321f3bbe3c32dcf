//! Authentication provider trait and implementations
//!
//! Every component asks its provider for a token on each call. The
//! `azure_identity` credentials keep their own per-scope cache, so callers
//! never compare expiry times.

use crate::auth::token::{Token, TokenScope, TokenSource};
use crate::config::{Config, DEFAULT_AUTHORITY_URL};
use crate::error::{AzvisorError, Result};
use async_trait::async_trait;
use azure_core::auth::{AccessToken, TokenCredential};
use azure_identity::{ClientSecretCredential, DefaultAzureCredential, TokenCredentialOptions};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;
use zeroize::Zeroizing;

/// Cached tokens are handed out until this long before they expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Trait for Azure authentication providers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AzureAuthProvider: Send + Sync {
    /// Get an access token for the given scope
    async fn get_token(&self, scope: TokenScope) -> Result<Token>;

    /// Tenant the provider authenticates against, when known
    fn tenant_id(&self) -> Option<String>;
}

/// Last token value handed out per scope. The credential types cache
/// internally, so a changed value is how a fresh acquisition shows up.
#[derive(Default)]
struct IssuedTokens(Mutex<HashMap<TokenScope, Zeroizing<String>>>);

impl IssuedTokens {
    async fn record(&self, scope: TokenScope, access_token: AccessToken) -> Token {
        let value = access_token.token.secret().to_string();
        let expires_on = DateTime::<Utc>::from_timestamp(access_token.expires_on.unix_timestamp(), 0)
            .unwrap_or_else(Utc::now);

        let mut issued = self.0.lock().await;
        let source = match issued.get(&scope) {
            Some(previous) if previous.as_str() == value => TokenSource::Cache,
            _ => TokenSource::IdentityProvider,
        };
        issued.insert(scope, Zeroizing::new(value.clone()));

        match source {
            TokenSource::IdentityProvider => info!("Acquired new {} token from identity provider", scope),
            TokenSource::Cache => debug!("Serving cached {} token", scope),
        }
        Token::new(value, scope, source, expires_on)
    }
}

/// Flatten an error and its sources into one line
fn describe(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Client-credentials grant through `azure_identity::ClientSecretCredential`
pub struct ClientSecretProvider {
    credential: Arc<ClientSecretCredential>,
    tenant_id: String,
    client_id: String,
    issued: IssuedTokens,
}

impl ClientSecretProvider {
    /// Create a provider against the public cloud authority
    pub fn new(tenant_id: String, client_id: String, client_secret: String) -> Result<Self> {
        Self::with_authority(tenant_id, client_id, client_secret, DEFAULT_AUTHORITY_URL)
    }

    /// Create a provider against another authority host
    pub fn with_authority(
        tenant_id: String,
        client_id: String,
        client_secret: String,
        authority: &str,
    ) -> Result<Self> {
        if tenant_id.is_empty() || client_id.is_empty() || client_secret.is_empty() {
            return Err(AzvisorError::config(
                "tenant_id, client_id and client_secret are required for client secret authentication",
            ));
        }

        let authority_url = Url::parse(authority)
            .map_err(|e| AzvisorError::config(format!("Invalid authority URL '{}': {}", authority, e)))?;

        let credential = Arc::new(ClientSecretCredential::new(
            azure_core::new_http_client(),
            authority_url,
            tenant_id.clone(),
            client_id.clone(),
            client_secret,
        ));

        Ok(Self {
            credential,
            tenant_id,
            client_id,
            issued: IssuedTokens::default(),
        })
    }

    /// Build from configuration. When no client secret is configured the
    /// credential lookup entry `azure` (`tenant:client-id:secret`) supplies
    /// all three values.
    pub fn from_config(config: &Config) -> Result<Self> {
        let (tenant_id, client_id, client_secret) = if config.client_secret.is_empty() {
            let entry = config.lookup_credentials("azure").ok_or_else(|| {
                AzvisorError::config("No client secret configured and no 'azure' credential entry")
            })?;
            parse_credential_entry(entry)?
        } else {
            (
                config.tenant_id.clone(),
                config.client_id.clone(),
                config.client_secret.clone(),
            )
        };

        Self::with_authority(tenant_id, client_id, client_secret, &config.endpoints.authority)
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

/// Split a `tenant:client-id:secret` entry; the secret may itself contain ':'
fn parse_credential_entry(entry: &str) -> Result<(String, String, String)> {
    let mut parts = entry.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(tenant), Some(client), Some(secret))
            if !tenant.is_empty() && !client.is_empty() && !secret.is_empty() =>
        {
            Ok((tenant.to_string(), client.to_string(), secret.to_string()))
        }
        _ => Err(AzvisorError::config(
            "Credential entry must have the form tenant:client-id:secret",
        )),
    }
}

#[async_trait]
impl AzureAuthProvider for ClientSecretProvider {
    async fn get_token(&self, scope: TokenScope) -> Result<Token> {
        let access_token = self
            .credential
            .get_token(&[scope.as_str()])
            .await
            .map_err(|e| {
                AzvisorError::authentication(format!("Failed to get {} token: {}", scope, describe(&e)))
            })?;

        Ok(self.issued.record(scope, access_token).await)
    }

    fn tenant_id(&self) -> Option<String> {
        Some(self.tenant_id.clone())
    }
}

/// Provider backed by `DefaultAzureCredential` (environment, managed identity, CLI)
pub struct DefaultAzureCredentialProvider {
    credential: Arc<DefaultAzureCredential>,
    tenant_id: Option<String>,
    issued: IssuedTokens,
}

impl DefaultAzureCredentialProvider {
    pub fn new(tenant_id: Option<String>) -> Result<Self> {
        let credential = DefaultAzureCredential::create(TokenCredentialOptions::default()).map_err(|e| {
            AzvisorError::authentication(format!("Failed to create DefaultAzureCredential: {}", e))
        })?;

        Ok(Self {
            credential: Arc::new(credential),
            tenant_id: tenant_id.filter(|t| !t.is_empty()),
            issued: IssuedTokens::default(),
        })
    }
}

#[async_trait]
impl AzureAuthProvider for DefaultAzureCredentialProvider {
    async fn get_token(&self, scope: TokenScope) -> Result<Token> {
        let access_token = self
            .credential
            .get_token(&[scope.as_str()])
            .await
            .map_err(|e| AzvisorError::authentication(format!("Failed to get token: {}", describe(&e))))?;

        Ok(self.issued.record(scope, access_token).await)
    }

    fn tenant_id(&self) -> Option<String> {
        self.tenant_id.clone()
    }
}

/// Serves tokens acquired elsewhere
pub struct StaticTokenProvider {
    tokens: HashMap<TokenScope, Zeroizing<String>>,
}

impl StaticTokenProvider {
    /// Use the same bearer value for both planes
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        Self::with_scopes(token.clone(), token)
    }

    pub fn with_scopes(management: impl Into<String>, storage: impl Into<String>) -> Self {
        let mut tokens = HashMap::new();
        tokens.insert(TokenScope::Management, Zeroizing::new(management.into()));
        tokens.insert(TokenScope::Storage, Zeroizing::new(storage.into()));
        Self { tokens }
    }
}

#[async_trait]
impl AzureAuthProvider for StaticTokenProvider {
    async fn get_token(&self, scope: TokenScope) -> Result<Token> {
        let value = self
            .tokens
            .get(&scope)
            .ok_or_else(|| AzvisorError::authentication(format!("No static token for {} scope", scope)))?;
        Ok(Token::new(
            value.as_str(),
            scope,
            TokenSource::Cache,
            Utc::now() + chrono::Duration::hours(1),
        ))
    }

    fn tenant_id(&self) -> Option<String> {
        None
    }
}

/// Authentication provider factory
pub struct AuthProviderFactory;

impl AuthProviderFactory {
    /// Create an authentication provider based on configuration
    pub fn create_provider(provider_type: &str, config: &Config) -> Result<Arc<dyn AzureAuthProvider>> {
        match provider_type.to_lowercase().as_str() {
            "default" | "defaultazurecredential" => Ok(Arc::new(DefaultAzureCredentialProvider::new(
                Some(config.tenant_id.clone()),
            )?)),
            "clientsecret" | "" => Ok(Arc::new(ClientSecretProvider::from_config(config)?)),
            _ => Err(AzvisorError::config(format!(
                "Unsupported authentication provider: {}",
                provider_type
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_entry_keeps_colons_in_secret() {
        let (tenant, client, secret) = parse_credential_entry("t1:c1:se:cr:et").unwrap();
        assert_eq!(tenant, "t1");
        assert_eq!(client, "c1");
        assert_eq!(secret, "se:cr:et");
    }

    #[test]
    fn credential_entry_requires_three_parts() {
        assert!(parse_credential_entry("t1:c1").is_err());
        assert!(parse_credential_entry("t1::secret").is_err());
    }

    #[test]
    fn from_config_uses_lookup_when_secret_missing() {
        let mut config = Config::default();
        config
            .credentials
            .insert("azure".to_string(), "lookup-tenant:lookup-client:s3cret".to_string());
        let provider = ClientSecretProvider::from_config(&config).unwrap();
        assert_eq!(provider.tenant_id(), Some("lookup-tenant".to_string()));
        assert_eq!(provider.client_id(), "lookup-client");
    }

    #[test]
    fn from_config_fails_without_any_secret() {
        let mut config = Config::default();
        config.tenant_id = "t".to_string();
        config.client_id = "c".to_string();
        assert!(matches!(
            ClientSecretProvider::from_config(&config),
            Err(AzvisorError::ConfigError(_))
        ));
    }

    #[test]
    fn authority_must_be_a_url() {
        let result = ClientSecretProvider::with_authority(
            "t".to_string(),
            "c".to_string(),
            "s".to_string(),
            "not a url",
        );
        assert!(matches!(result, Err(AzvisorError::ConfigError(_))));
    }

    #[tokio::test]
    async fn static_provider_serves_per_scope_tokens() {
        let provider = StaticTokenProvider::with_scopes("mgmt", "blob");
        let management = provider.get_token(TokenScope::Management).await.unwrap();
        let storage = provider.get_token(TokenScope::Storage).await.unwrap();
        assert_eq!(management.secret(), "mgmt");
        assert_eq!(storage.secret(), "blob");
        assert_eq!(storage.scope(), TokenScope::Storage);
    }

    #[test]
    fn factory_rejects_unknown_provider() {
        let config = Config::default();
        assert!(AuthProviderFactory::create_provider("kerberos", &config).is_err());
    }
}
