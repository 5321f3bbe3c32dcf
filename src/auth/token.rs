//! Bearer tokens and the OAuth scopes they are issued for

use chrono::{DateTime, Utc};
use std::fmt;
use zeroize::Zeroizing;

/// Scope requested for resource manager calls
pub const MANAGEMENT_SCOPE: &str = "https://management.core.windows.net/.default";

/// Scope requested for blob data-plane calls
pub const STORAGE_SCOPE: &str = "https://storage.azure.com/.default";

/// The plane a token is valid for. A token minted for one scope is never
/// attached to a request for the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenScope {
    Management,
    Storage,
}

impl TokenScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenScope::Management => MANAGEMENT_SCOPE,
            TokenScope::Storage => STORAGE_SCOPE,
        }
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenScope::Management => write!(f, "management"),
            TokenScope::Storage => write!(f, "storage"),
        }
    }
}

/// Where a token came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// Served from the provider's in-process cache
    Cache,
    /// A round trip to the identity provider happened
    IdentityProvider,
}

/// An access token together with its scope and origin
#[derive(Clone)]
pub struct Token {
    value: Zeroizing<String>,
    scope: TokenScope,
    source: TokenSource,
    expires_on: DateTime<Utc>,
}

impl Token {
    pub fn new(
        value: impl Into<String>,
        scope: TokenScope,
        source: TokenSource,
        expires_on: DateTime<Utc>,
    ) -> Self {
        Self {
            value: Zeroizing::new(value.into()),
            scope,
            source,
            expires_on,
        }
    }

    /// Raw bearer value
    pub fn secret(&self) -> &str {
        self.value.as_str()
    }

    pub fn scope(&self) -> TokenScope {
        self.scope
    }

    pub fn source(&self) -> TokenSource {
        self.source
    }

    pub fn expires_on(&self) -> DateTime<Utc> {
        self.expires_on
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"<redacted>")
            .field("scope", &self.scope)
            .field("source", &self.source)
            .field("expires_on", &self.expires_on)
            .finish()
    }
}
