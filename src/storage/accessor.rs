//! Storage accounts, account SAS minting and blob data-plane calls

use crate::arm::api_versions;
use crate::arm::models::StorageAccount;
use crate::arm::{ApiRequest, ApiResponse, RequestExecutor};
use crate::config::Config;
use crate::error::{AzvisorError, Result};
use crate::storage::listing::{BlobItem, EnumerationResults};
use crate::storage::sas::SasRequest;
use chrono::Utc;
use reqwest::Method;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const VHDS_CONTAINER: &str = "vhds";
const ACCOUNT_PLACEHOLDER: &str = "{account}";

pub struct StorageAccessor {
    executor: Arc<RequestExecutor>,
    subscription_id: String,
    /// Blob endpoint template containing `{account}`
    endpoint_template: String,
    max_pages: usize,
    accounts: RwLock<Option<Arc<Vec<StorageAccount>>>>,
}

impl StorageAccessor {
    pub fn new(
        executor: Arc<RequestExecutor>,
        subscription_id: impl Into<String>,
        endpoint_template: impl Into<String>,
        max_pages: usize,
    ) -> Self {
        Self {
            executor,
            subscription_id: subscription_id.into(),
            endpoint_template: endpoint_template.into().trim_end_matches('/').to_string(),
            max_pages: max_pages.max(1),
            accounts: RwLock::new(None),
        }
    }

    pub fn from_config(executor: Arc<RequestExecutor>, config: &Config) -> Self {
        Self::new(
            executor,
            &config.subscription_id,
            &config.endpoints.storage,
            config.storage.max_pages,
        )
    }

    /// Storage accounts of the subscription, listed on first access
    pub async fn storage_accounts(&self) -> Result<Arc<Vec<StorageAccount>>> {
        if let Some(accounts) = self.accounts.read().await.clone() {
            return Ok(accounts);
        }
        self.refresh_storage_accounts().await
    }

    /// Re-list the subscription's storage accounts. A failed listing is
    /// returned as an error and leaves the cached set untouched.
    pub async fn refresh_storage_accounts(&self) -> Result<Arc<Vec<StorageAccount>>> {
        let endpoint = format!(
            "/subscriptions/{}/providers/Microsoft.Storage/storageAccounts",
            self.subscription_id
        );
        let accounts: Vec<StorageAccount> = self
            .executor
            .list_all(ApiRequest::get(endpoint, api_versions::STORAGE_ACCOUNTS))
            .await?;
        debug!("Collected {} storage accounts", accounts.len());

        let accounts = Arc::new(accounts);
        *self.accounts.write().await = Some(accounts.clone());
        Ok(accounts)
    }

    /// Storage accounts of one resource group, empty when the listing fails
    pub async fn get_storage_account(&self, resource_group: &str) -> Result<Vec<StorageAccount>> {
        let endpoint = format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Storage/storageAccounts",
            self.subscription_id, resource_group
        );
        self.executor
            .list_all(ApiRequest::get(endpoint, api_versions::STORAGE_ACCOUNTS).fail_on_error(false))
            .await
    }

    /// Look an account up by name, re-listing once when the cached set
    /// does not contain it
    pub async fn find_account(&self, account: &str) -> Result<Option<StorageAccount>> {
        let cached = self.accounts.read().await.clone();
        if let Some(accounts) = cached {
            if let Some(found) = accounts.iter().find(|a| a.name == account) {
                return Ok(Some(found.clone()));
            }
        }

        let accounts = self.refresh_storage_accounts().await?;
        Ok(accounts.iter().find(|a| a.name == account).cloned())
    }

    pub async fn get_storage_account_location(&self, account: &str) -> Result<Option<String>> {
        Ok(self.find_account(account).await?.map(|a| a.location))
    }

    /// Mint an account SAS through `ListAccountSas`
    pub async fn try_storage_sas(&self, account: &str, sas: &SasRequest) -> Result<String> {
        let found = self
            .find_account(account)
            .await?
            .ok_or_else(|| AzvisorError::not_found("Storage account", account))?;

        let request = ApiRequest::post(format!("{}/ListAccountSas", found.id), api_versions::LIST_ACCOUNT_SAS)
            .json(sas.body(Utc::now())?);
        let response = self.executor.execute(request).await?;

        response
            .str_at("/accountSasToken")
            .map(str::to_string)
            .ok_or_else(|| {
                AzvisorError::api(
                    Some(response.status),
                    format!("ListAccountSas for '{}' returned no accountSasToken", account),
                )
            })
    }

    /// Lossy variant of [`try_storage_sas`](Self::try_storage_sas): an empty
    /// string when the account is unknown or the call fails
    pub async fn get_storage_sas(&self, account: &str, sas: &SasRequest) -> String {
        match self.try_storage_sas(account, sas).await {
            Ok(token) => token,
            Err(e) => {
                warn!("No SAS for storage account '{}': {}", account, e);
                String::new()
            }
        }
    }

    /// Blob endpoint of an account, without a trailing slash
    pub fn account_url(&self, account: &str) -> String {
        self.endpoint_template.replace(ACCOUNT_PLACEHOLDER, account)
    }

    /// Storage account named by a blob URI, `None` when the URI does not
    /// point at the configured blob endpoint
    pub fn parse_disk_storage_account(&self, uri: &str) -> Option<String> {
        let template = strip_scheme(&self.endpoint_template);
        let (prefix, suffix) = template.split_once(ACCOUNT_PLACEHOLDER)?;

        let uri = strip_scheme(uri);
        if uri.len() < prefix.len() || !uri[..prefix.len()].eq_ignore_ascii_case(prefix) {
            return None;
        }
        let rest = &uri[prefix.len()..];

        let account = if suffix.is_empty() {
            rest.split(['/', '?']).next().unwrap_or_default()
        } else {
            let lower = rest.to_ascii_lowercase();
            let end = lower.find(&suffix.to_ascii_lowercase())?;
            &rest[..end]
        };

        let valid = !account.is_empty() && account.chars().all(|c| c.is_ascii_alphanumeric());
        valid.then(|| account.to_ascii_lowercase())
    }

    /// Container names of an account; empty when no SAS can be minted
    pub async fn get_containers_in_storage_account(&self, account: &str) -> Result<Vec<String>> {
        let sas = self.get_storage_sas(account, &SasRequest::list_containers()).await;
        if sas.is_empty() {
            warn!("Cannot list containers of '{}' without a SAS", account);
            return Ok(Vec::new());
        }

        let url = format!("{}/?comp=list&{}", self.account_url(account), sas);
        let mut names = Vec::new();
        for page in self.list_pages(&url).await? {
            names.extend(page.container_names());
        }
        debug!("Storage account '{}' has {} containers", account, names.len());
        Ok(names)
    }

    /// Blobs of the `vhds` container, empty when the account has none
    pub async fn get_vhds_in_storage_account(&self, account: &str) -> Result<Vec<BlobItem>> {
        let containers = self.get_containers_in_storage_account(account).await?;
        if !containers.iter().any(|c| c == VHDS_CONTAINER) {
            debug!("Storage account '{}' has no {} container", account, VHDS_CONTAINER);
            return Ok(Vec::new());
        }

        let sas = self.get_storage_sas(account, &SasRequest::list_blobs()).await;
        if sas.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!(
            "{}/{}?restype=container&comp=list&{}",
            self.account_url(account),
            VHDS_CONTAINER,
            sas
        );
        let mut blobs = Vec::new();
        for page in self.list_pages(&url).await? {
            blobs.extend(page.into_blobs());
        }
        Ok(blobs)
    }

    /// Follow `NextMarker` until the listing ends. A 404 ends it early.
    async fn list_pages(&self, url: &str) -> Result<Vec<EnumerationResults>> {
        let mut pages = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            if pages.len() >= self.max_pages {
                return Err(AzvisorError::PaginationLimit {
                    pages: self.max_pages,
                });
            }

            let mut request = ApiRequest::data_plane(Method::GET, url);
            if let Some(marker) = &marker {
                request = request.query("marker", marker.as_str());
            }

            let response = self.executor.execute(request).await?;
            if response.is_absent() {
                break;
            }

            let page = EnumerationResults::parse(&response.text)?;
            marker = page.marker().map(str::to_string);
            pages.push(page);

            if marker.is_none() {
                break;
            }
        }

        Ok(pages)
    }

    /// True when the blob at `uri` answers a HEAD with 200
    pub async fn check_blob_exists_in_storage_account(&self, uri: &str) -> Result<bool> {
        let Some(account) = self.parse_disk_storage_account(uri) else {
            debug!("'{}' is not a blob storage URI", uri);
            return Ok(false);
        };

        let sas = self.get_storage_sas(&account, &SasRequest::read_blob()).await;
        if sas.is_empty() {
            return Ok(false);
        }

        let request = ApiRequest::data_plane(Method::HEAD, format!("{}?{}", uri, sas))
            .fail_on_error(false)
            .suppress_logging(true);
        let response = self.executor.execute(request).await?;
        Ok(response.status == 200)
    }

    /// DELETE `{account}/{container_path}/{name}` under a one-minute SAS.
    /// The response is returned unclassified.
    pub async fn delete_blob(&self, account: &str, container_path: &str, name: &str) -> Result<ApiResponse> {
        let sas = self.get_storage_sas(account, &SasRequest::delete_blob()).await;
        if sas.is_empty() {
            return Err(AzvisorError::sas_unavailable(account));
        }

        let url = format!(
            "{}/{}/{}?{}",
            self.account_url(account),
            container_path.trim_matches('/'),
            name,
            sas
        );
        info!("Deleting blob {}/{} in storage account '{}'", container_path, name, account);
        self.executor
            .execute(ApiRequest::data_plane(Method::DELETE, url).fail_on_error(false))
            .await
    }
}

fn strip_scheme(url: &str) -> &str {
    url.split_once("://").map(|(_, rest)| rest).unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenProvider;
    use crate::utils::network::NetworkConfig;
    use crate::utils::retry::RetryOptions;

    fn accessor(template: &str) -> StorageAccessor {
        let executor = RequestExecutor::new(
            Arc::new(StaticTokenProvider::new("t")),
            "https://management.example.com",
            RetryOptions::default(),
            &NetworkConfig::default(),
        )
        .unwrap();
        StorageAccessor::new(Arc::new(executor), "sub", template, 500)
    }

    #[test]
    fn parses_account_from_public_blob_uri() {
        let storage = accessor("https://{account}.blob.core.windows.net");
        assert_eq!(
            storage.parse_disk_storage_account("https://Disks01.blob.core.windows.net/vhds/os.vhd"),
            Some("disks01".to_string())
        );
        assert_eq!(
            storage.parse_disk_storage_account("http://disks01.blob.core.windows.net/vhds/os.vhd"),
            Some("disks01".to_string())
        );
        assert_eq!(
            storage.parse_disk_storage_account("https://disks01.file.core.windows.net/share/x"),
            None
        );
        assert_eq!(storage.parse_disk_storage_account("not a uri"), None);
    }

    #[test]
    fn parses_account_from_path_style_template() {
        let storage = accessor("http://127.0.0.1:10000/{account}");
        assert_eq!(storage.account_url("devacct"), "http://127.0.0.1:10000/devacct");
        assert_eq!(
            storage.parse_disk_storage_account("http://127.0.0.1:10000/devacct/vhds/a.vhd"),
            Some("devacct".to_string())
        );
        assert_eq!(
            storage.parse_disk_storage_account("http://127.0.0.1:9999/devacct/vhds/a.vhd"),
            None
        );
    }
}
