#![allow(dead_code)]

use azvisor::auth::StaticTokenProvider;
use azvisor::config::{Config, PollingConfig, RetryConfig};
use azvisor::AzureClient;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SUBSCRIPTION: &str = "sub-1";
pub const TOKEN: &str = "test-token";

/// Configuration with every endpoint pointed at the mock server and all
/// waits collapsed to zero
pub fn test_config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.subscription_id = SUBSCRIPTION.to_string();
    config.tenant_id = "tenant-1".to_string();
    config.client_id = "client-1".to_string();
    config.client_secret = "secret-1".to_string();
    config.endpoints.management = server.uri();
    config.endpoints.authority = server.uri();
    config.endpoints.storage = format!("{}/{{account}}", server.uri());
    config.retry = RetryConfig {
        max_attempts: 3,
        wait_seconds: 0,
        max_wait_seconds: 0,
        multiplier: 1.0,
        jitter: false,
    };
    config.polling = PollingConfig {
        nic_interval_seconds: 0,
        nic_max_attempts: 5,
        resource_interval_seconds: 0,
        resource_deadline_seconds: 30,
    };
    config
}

pub fn client(config: &Config) -> AzureClient {
    AzureClient::with_auth(config, Arc::new(StaticTokenProvider::new(TOKEN))).unwrap()
}

pub fn rg_path(resource_group: &str) -> String {
    format!("/subscriptions/{}/resourceGroups/{}", SUBSCRIPTION, resource_group)
}

pub fn storage_account_id(resource_group: &str, account: &str) -> String {
    format!(
        "{}/providers/Microsoft.Storage/storageAccounts/{}",
        rg_path(resource_group),
        account
    )
}

pub fn listing(items: Value) -> Value {
    json!({ "value": items })
}

/// Register `account` in `resource_group` and answer its SAS requests
pub async fn mount_storage_account(server: &MockServer, resource_group: &str, account: &str, sas: &str) {
    Mock::given(method("GET"))
        .and(path(format!(
            "/subscriptions/{}/providers/Microsoft.Storage/storageAccounts",
            SUBSCRIPTION
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(json!([{
            "id": storage_account_id(resource_group, account),
            "name": account,
            "location": "eastus"
        }]))))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("{}/ListAccountSas", storage_account_id(resource_group, account))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accountSasToken": sas })))
        .mount(server)
        .await;
}

pub fn xml(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/xml")
        .set_body_string(body.to_string())
}
