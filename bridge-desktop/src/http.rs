//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy},
};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Reqwest-based HTTP client implementation
///
/// Provides HTTP operations with:
/// - Connection pooling via reqwest
/// - A cookie jar, so the server-set refresh cookie rides along on every call
/// - Automatic retry with exponential backoff on 5xx, 429 and transport errors,
///   for idempotent methods only unless a policy is passed explicitly
/// - TLS via rustls
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a new HTTP client with custom timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .cookie_store(true)
            .user_agent(concat!("catalog-session-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                BridgeError::OperationFailed(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }

    /// Wrap a preconfigured client. It should have a cookie store enabled.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Convert bridge HttpMethod to reqwest Method
    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }

    /// Build reqwest request from bridge request
    fn build_request(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let method = Self::convert_method(request.method);
        let mut req = self.client.request(method, &request.url);

        for (key, value) in request.headers {
            req = req.header(key, value);
        }

        if let Some(body) = request.body {
            req = req.body(body);
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        req
    }

    async fn into_response(response: reqwest::Response) -> Result<HttpResponse> {
        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    /// Execute request with retry logic
    ///
    /// A retryable status that persists through the last attempt is returned
    /// as a response, not an error.
    async fn execute_with_retry_internal(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0;
        let mut last_error = None;

        while attempt < max_attempts {
            debug!(
                attempt = attempt + 1,
                max_attempts,
                method = ?request.method,
                url = %request.url,
                "Executing HTTP request"
            );

            let is_last = attempt + 1 == max_attempts;

            match self.build_request(request.clone()).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();

                    if (status >= 500 || status == 429) && !is_last {
                        warn!(
                            status = status,
                            attempt = attempt + 1,
                            "HTTP request failed with retryable status"
                        );
                        last_error = Some(BridgeError::OperationFailed(format!(
                            "HTTP {} error",
                            status
                        )));
                    } else {
                        return Self::into_response(response).await;
                    }
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        attempt = attempt + 1,
                        "HTTP request failed"
                    );

                    last_error = Some(if e.is_timeout() {
                        BridgeError::OperationFailed("Request timed out".to_string())
                    } else if e.is_connect() {
                        BridgeError::OperationFailed(format!("Connection failed: {}", e))
                    } else {
                        BridgeError::OperationFailed(e.to_string())
                    });
                }
            }

            attempt += 1;

            if attempt < max_attempts {
                let delay = backoff_delay(&policy, attempt);
                debug!(delay_ms = delay.as_millis() as u64, "Retrying after delay");
                sleep(delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BridgeError::OperationFailed("All retry attempts exhausted".to_string())
        }))
    }
}

/// Delay before retry number `attempt` (1-based).
fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    if policy.use_exponential_backoff {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        policy
            .base_delay
            .checked_mul(factor)
            .unwrap_or(policy.max_delay)
            .min(policy.max_delay)
    } else {
        policy.base_delay
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let policy = RetryPolicy::for_method(request.method);
        self.execute_with_retry(request, policy).await
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        self.execute_with_retry_internal(request, policy).await
    }
}
