//! Single entry point for resource manager and storage data-plane HTTP calls
//!
//! Status contract:
//!
//! | Status      | Outcome                                   |
//! |-------------|-------------------------------------------|
//! | 200/201/202 | success, JSON body (empty object if none) |
//! | 404/204     | resource absent, empty success            |
//! | 429         | wait and retry, never returned            |
//! | other       | `ApiError` unless `fail_on_error` is off  |

use crate::arm::models::Listing;
use crate::auth::{AzureAuthProvider, TokenScope};
use crate::config::Config;
use crate::error::{AzvisorError, Result};
use crate::utils::network::{classify_network_error, create_http_client, is_retryable_error, NetworkConfig};
use crate::utils::retry::{retry_with_backoff, RetryOptions};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
enum Target {
    /// Path below the management base URL, api-version appended
    Endpoint { path: String, api_version: String },
    /// Fully formed URL such as an ARM `nextLink` or a storage data-plane URL
    Absolute(String),
}

/// How a request authenticates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAuth {
    /// Bearer token for the given scope
    Bearer(TokenScope),
    /// No Authorization header, e.g. a SAS is carried in the query string
    Anonymous,
}

/// Description of one HTTP call
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    target: Target,
    query: Vec<(String, String)>,
    payload: Option<Value>,
    headers: Vec<(String, String)>,
    auth: RequestAuth,
    fail_on_error: bool,
    suppress_logging: bool,
    retry: Option<RetryOptions>,
}

impl ApiRequest {
    /// Resource manager request against `{management}{endpoint}?api-version={api_version}`
    pub fn new(method: Method, endpoint: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self {
            method,
            target: Target::Endpoint {
                path: endpoint.into(),
                api_version: api_version.into(),
            },
            query: Vec::new(),
            payload: None,
            headers: Vec::new(),
            auth: RequestAuth::Bearer(TokenScope::Management),
            fail_on_error: true,
            suppress_logging: false,
            retry: None,
        }
    }

    pub fn get(endpoint: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint, api_version)
    }

    pub fn put(endpoint: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self::new(Method::PUT, endpoint, api_version)
    }

    pub fn post(endpoint: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint, api_version)
    }

    pub fn delete(endpoint: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint, api_version)
    }

    /// Follow an ARM `nextLink`; the link already carries its api-version
    pub fn next_page(url: impl Into<String>) -> Self {
        Self {
            target: Target::Absolute(url.into()),
            ..Self::get("", "")
        }
    }

    /// Storage data-plane call whose URL already carries a SAS
    pub fn data_plane(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            target: Target::Absolute(url.into()),
            auth: RequestAuth::Anonymous,
            ..Self::get("", "")
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn auth(mut self, auth: RequestAuth) -> Self {
        self.auth = auth;
        self
    }

    /// Return non-success responses to the caller instead of failing
    pub fn fail_on_error(mut self, fail: bool) -> Self {
        self.fail_on_error = fail;
        self
    }

    pub fn suppress_logging(mut self, suppress: bool) -> Self {
        self.suppress_logging = suppress;
        self
    }

    /// Override the executor's throttling policy for this call
    pub fn retry(mut self, options: RetryOptions) -> Self {
        self.retry = Some(options);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Endpoint path or absolute URL, as given
    pub fn endpoint(&self) -> &str {
        match &self.target {
            Target::Endpoint { path, .. } => path,
            Target::Absolute(url) => url,
        }
    }

    /// Copy the behavioural flags onto a follow-up request
    fn inherit_flags(mut self, from: &ApiRequest) -> Self {
        self.fail_on_error = from.fail_on_error;
        self.suppress_logging = from.suppress_logging;
        self.retry = from.retry.clone();
        self.auth = from.auth;
        self
    }
}

/// Normalized outcome of a call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body, an empty object when the body is not JSON
    pub body: Value,
    /// Raw body text (XML for storage listings)
    pub text: String,
}

impl ApiResponse {
    fn new(status: u16, text: String) -> Self {
        let body = serde_json::from_str(&text).unwrap_or_else(|_| Value::Object(Default::default()));
        Self { status, body, text }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, 200 | 201 | 202)
    }

    /// 404 or 204: the resource does not exist
    pub fn is_absent(&self) -> bool {
        matches!(self.status, 404 | 204)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.body.clone())?)
    }

    /// String at a JSON pointer such as `/properties/provisioningState`
    pub fn str_at(&self, pointer: &str) -> Option<&str> {
        self.body.pointer(pointer)?.as_str()
    }
}

/// Issues requests, absorbs throttling and classifies responses
pub struct RequestExecutor {
    http_client: Client,
    auth: Arc<dyn AzureAuthProvider>,
    management_url: String,
    retry: RetryOptions,
}

impl RequestExecutor {
    pub fn new(
        auth: Arc<dyn AzureAuthProvider>,
        management_url: impl Into<String>,
        retry: RetryOptions,
        network: &NetworkConfig,
    ) -> Result<Self> {
        Ok(Self {
            http_client: create_http_client(network)?,
            auth,
            management_url: management_url.into().trim_end_matches('/').to_string(),
            retry,
        })
    }

    pub fn from_config(auth: Arc<dyn AzureAuthProvider>, config: &Config) -> Result<Self> {
        Self::new(
            auth,
            &config.endpoints.management,
            RetryOptions::from(&config.retry),
            &NetworkConfig::from(&config.storage),
        )
    }

    pub fn auth_provider(&self) -> &Arc<dyn AzureAuthProvider> {
        &self.auth
    }

    pub fn management_url(&self) -> &str {
        &self.management_url
    }

    /// Full URL a request resolves to
    pub fn url_for(&self, request: &ApiRequest) -> Result<String> {
        let base = match &request.target {
            Target::Endpoint { path, api_version } => {
                let separator = if path.contains('?') { '&' } else { '?' };
                format!(
                    "{}{}{}api-version={}",
                    self.management_url, path, separator, api_version
                )
            }
            Target::Absolute(url) => url.clone(),
        };

        if request.query.is_empty() {
            return Ok(base);
        }

        let mut url = url::Url::parse(&base)
            .map_err(|e| AzvisorError::invalid_argument(format!("Invalid URL '{}': {}", base, e)))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url.to_string())
    }

    async fn build_headers(&self, request: &ApiRequest) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        if let RequestAuth::Bearer(scope) = request.auth {
            let token = self.auth.get_token(scope).await?;
            let value = HeaderValue::from_str(&format!("Bearer {}", token.secret()))
                .map_err(|e| AzvisorError::authentication(format!("Invalid token format: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        if request.payload.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        let request_id = uuid::Uuid::new_v4().to_string();
        headers.insert(
            HeaderName::from_static("x-ms-client-request-id"),
            HeaderValue::from_str(&request_id)
                .map_err(|e| AzvisorError::invalid_argument(e.to_string()))?,
        );

        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| AzvisorError::invalid_argument(format!("Invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| AzvisorError::invalid_argument(format!("Invalid header value: {}", e)))?;
            headers.insert(name, value);
        }

        Ok(headers)
    }

    /// Execute a request according to the status contract
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = self.url_for(&request)?;
        let display_url = loggable_url(&url, request.auth);
        let options = request.retry.clone().unwrap_or_else(|| self.retry.clone());

        if !request.suppress_logging {
            info!("Executing Azure API: [{}] {}", request.method, display_url);
        }

        let (request_ref, url_ref, display_ref) = (&request, url.as_str(), display_url.as_str());
        let max_attempts = options.max_attempts;
        let result = retry_with_backoff(
            move |attempt| self.attempt(request_ref, url_ref, display_ref, attempt, max_attempts),
            &options,
            |e| matches!(e, AzvisorError::Throttled { .. }) || is_retryable_error(e),
        )
        .await;

        result.map_err(|e| match e {
            AzvisorError::NetworkError(msg) | AzvisorError::ConnectionTimeout(msg) => {
                AzvisorError::api(None, msg)
            }
            other => other,
        })
    }

    async fn attempt(
        &self,
        request: &ApiRequest,
        url: &str,
        display_url: &str,
        attempt: usize,
        max_attempts: usize,
    ) -> Result<ApiResponse> {
        let headers = self.build_headers(request).await?;
        let mut builder = self
            .http_client
            .request(request.method.clone(), url)
            .headers(headers);
        if let Some(payload) = &request.payload {
            builder = builder.body(serde_json::to_vec(payload)?);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(
                "Transport failure on attempt {}/{} for {}: {}",
                attempt, max_attempts, display_url, e
            );
            classify_network_error(&e, url)
        })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| classify_network_error(&e, url))?;

        match status {
            200 | 201 | 202 | 204 | 404 => {
                debug!("{} returned HTTP {}", display_url, status);
                Ok(ApiResponse::new(status, text))
            }
            429 => {
                warn!(
                    "Throttled by Azure (attempt {}/{}): {}",
                    attempt, max_attempts, display_url
                );
                Err(AzvisorError::throttled(display_url, attempt))
            }
            _ if request.fail_on_error => Err(AzvisorError::api(Some(status), text)),
            _ => {
                if !request.suppress_logging {
                    warn!("{} returned HTTP {}", display_url, status);
                }
                Ok(ApiResponse::new(status, text))
            }
        }
    }

    /// Execute and deserialize a successful body
    pub async fn get_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<Option<T>> {
        let response = self.execute(request).await?;
        if !response.is_success() {
            return Ok(None);
        }
        Ok(Some(response.json()?))
    }

    /// Collect every page of an ARM collection by following `nextLink`.
    /// An absent or (with `fail_on_error` off) failed page ends the listing.
    pub async fn list_all<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut current = request.clone();

        loop {
            let response = self.execute(current).await?;
            if !response.is_success() {
                break;
            }

            let page: Listing<T> = response.json()?;
            items.extend(page.value);

            match page.next_link {
                Some(link) if !link.is_empty() => {
                    current = ApiRequest::next_page(link).inherit_flags(&request);
                }
                _ => break,
            }
        }

        Ok(items)
    }
}

/// Data-plane URLs carry a SAS signature in the query; keep it out of logs
fn loggable_url(url: &str, auth: RequestAuth) -> String {
    match auth {
        RequestAuth::Anonymous => url.split('?').next().unwrap_or(url).to_string(),
        RequestAuth::Bearer(_) => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MockAzureAuthProvider, StaticTokenProvider};
    use std::time::Duration;

    fn executor(auth: Arc<dyn AzureAuthProvider>) -> RequestExecutor {
        RequestExecutor::new(
            auth,
            "https://management.example.com/",
            RetryOptions::fixed(3, Duration::from_millis(1)),
            &NetworkConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn endpoint_url_gets_api_version_and_query() {
        let exec = executor(Arc::new(StaticTokenProvider::new("t")));
        let request = ApiRequest::get(
            "/subscriptions/s/providers/Microsoft.Compute/skus",
            "2019-04-01",
        )
        .query("$filter", "location eq 'eastus'");

        let url = exec.url_for(&request).unwrap();
        assert!(url.starts_with(
            "https://management.example.com/subscriptions/s/providers/Microsoft.Compute/skus?api-version=2019-04-01&"
        ));
        let parsed = url::Url::parse(&url).unwrap();
        let filter = parsed
            .query_pairs()
            .find(|(k, _)| k == "$filter")
            .map(|(_, v)| v.into_owned());
        assert_eq!(filter.as_deref(), Some("location eq 'eastus'"));
    }

    #[test]
    fn absolute_url_is_used_verbatim() {
        let exec = executor(Arc::new(StaticTokenProvider::new("t")));
        let link = "https://management.example.com/next?api-version=2014-04-01&$skiptoken=abc";
        assert_eq!(exec.url_for(&ApiRequest::next_page(link)).unwrap(), link);
    }

    #[test]
    fn sas_is_not_logged() {
        let url = "https://acct.blob.core.windows.net/?comp=list&sv=2017&sig=secret";
        assert_eq!(
            loggable_url(url, RequestAuth::Anonymous),
            "https://acct.blob.core.windows.net/"
        );
    }

    #[test]
    fn absent_statuses_are_not_success() {
        let response = ApiResponse::new(404, String::new());
        assert!(response.is_absent());
        assert!(!response.is_success());
        assert_eq!(response.body, serde_json::json!({}));
    }

    #[tokio::test]
    async fn authentication_failure_is_not_retried() {
        let mut auth = MockAzureAuthProvider::new();
        auth.expect_get_token()
            .withf(|scope| *scope == TokenScope::Management)
            .times(1)
            .returning(|_| Err(AzvisorError::authentication("invalid_client")));

        let exec = executor(Arc::new(auth));
        let result = exec
            .execute(ApiRequest::get("/subscriptions/s/resourcegroups", "2014-04-01"))
            .await;

        assert!(matches!(result, Err(AzvisorError::AuthenticationError(_))));
    }

    #[tokio::test]
    async fn data_plane_requests_never_ask_for_a_token() {
        let mut auth = MockAzureAuthProvider::new();
        auth.expect_get_token().times(0);
        let exec = executor(Arc::new(auth));

        let request = ApiRequest::data_plane(Method::HEAD, "https://acct.blob.core.windows.net/c/b?sig=x");
        let headers = exec.build_headers(&request).await.unwrap();
        assert!(headers.get(AUTHORIZATION).is_none());
        assert!(headers.get("x-ms-client-request-id").is_some());
    }
}
