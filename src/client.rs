//! Wiring of the executor, caches and managers for one subscription

use crate::arm::RequestExecutor;
use crate::auth::{AuthProviderFactory, AzureAuthProvider};
use crate::config::Config;
use crate::error::Result;
use crate::inventory::{InventoryCache, ResourceDiscovery};
use crate::provision::Provisioner;
use crate::storage::StorageAccessor;
use std::sync::Arc;
use tracing::debug;

/// Every component shares one executor and therefore one token cache
pub struct AzureClient {
    executor: Arc<RequestExecutor>,
    storage: Arc<StorageAccessor>,
    inventory: InventoryCache,
    discovery: ResourceDiscovery,
    provisioner: Provisioner,
}

impl AzureClient {
    /// Build a client with the auth provider named in the configuration
    pub fn new(config: &Config) -> Result<Self> {
        let auth = AuthProviderFactory::create_provider(&config.auth_provider, config)?;
        Self::with_auth(config, auth)
    }

    pub fn with_auth(config: &Config, auth: Arc<dyn AzureAuthProvider>) -> Result<Self> {
        debug!(
            "Creating client for subscription {} against {}",
            config.subscription_id, config.endpoints.management
        );
        let executor = Arc::new(RequestExecutor::from_config(auth, config)?);
        let storage = Arc::new(StorageAccessor::from_config(executor.clone(), config));

        Ok(Self {
            inventory: InventoryCache::new(executor.clone(), storage.clone(), &config.subscription_id),
            discovery: ResourceDiscovery::new(executor.clone(), &config.subscription_id),
            provisioner: Provisioner::from_config(executor.clone(), storage.clone(), config),
            executor,
            storage,
        })
    }

    pub fn executor(&self) -> &Arc<RequestExecutor> {
        &self.executor
    }

    pub fn storage(&self) -> &StorageAccessor {
        &self.storage
    }

    pub fn inventory(&self) -> &InventoryCache {
        &self.inventory
    }

    pub fn discovery(&self) -> &ResourceDiscovery {
        &self.discovery
    }

    pub fn provisioner(&self) -> &Provisioner {
        &self.provisioner
    }
}
