//! # Authorized Client
//!
//! Wraps any [`HttpClient`] so outgoing requests carry the current bearer
//! token and a rejected token is rotated once.
//!
//! ## Request stage
//!
//! `Authorization: Bearer <token>` is attached when a token is held. A
//! request that already carries its own `Authorization` header is passed
//! through untouched and never retried.
//!
//! ## Response stage
//!
//! A `401` on a non-exempt request triggers one refresh through the
//! [`RefreshCoordinator`] (so concurrent 401s share one exchange), then the
//! request is replayed once with the rotated token. Whatever the replay
//! returns is final. A failed refresh is returned to the caller as is.
//!
//! The auth endpoints themselves and anonymous data routes are exempt from
//! the response stage.

use crate::error::{AuthError, Result};
use crate::refresh::RefreshCoordinator;
use crate::session_store::SessionStore;
use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use core_runtime::config::CoreConfig;
use std::sync::Arc;
use tracing::{debug, instrument};
use url::Url;

const AUTHORIZATION: &str = "Authorization";

/// Which request paths never go through refresh-and-retry.
#[derive(Debug, Clone, Default)]
pub struct Exemptions {
    endpoint_paths: Vec<String>,
    base_path: String,
    public_prefixes: Vec<String>,
}

impl Exemptions {
    /// `endpoint_paths` are matched exactly; `public_prefixes` are matched
    /// against the path relative to `base_path`, and against the full path.
    pub fn new<E, P>(base_path: &str, endpoint_paths: E, public_prefixes: P) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            endpoint_paths: endpoint_paths.into_iter().map(Into::into).collect(),
            base_path: base_path.trim_end_matches('/').to_string(),
            public_prefixes: public_prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Login and refresh endpoints plus the configured public API prefixes.
    pub fn from_config(config: &CoreConfig) -> Self {
        let endpoint_paths = [&config.endpoints.login, &config.endpoints.refresh]
            .into_iter()
            .map(|path| path_of(&config.endpoint_url(path)))
            .collect::<Vec<_>>();

        Self::new(
            config.api_base_url.path(),
            endpoint_paths,
            config.public_api_prefixes.iter().cloned(),
        )
    }

    pub fn is_exempt(&self, url: &str) -> bool {
        let path = path_of(url);
        let path = path.as_str();
        if self.endpoint_paths.iter().any(|p| p == path) {
            return true;
        }

        let relative = path.strip_prefix(self.base_path.as_str()).unwrap_or(path);
        self.public_prefixes
            .iter()
            .any(|prefix| relative.starts_with(prefix.as_str()) || path.starts_with(prefix.as_str()))
    }
}

fn path_of(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
    }
}

/// An [`HttpClient`] that authenticates requests against the live session.
pub struct AuthorizedClient {
    inner: Arc<dyn HttpClient>,
    store: Arc<SessionStore>,
    refresher: Arc<RefreshCoordinator>,
    exemptions: Exemptions,
}

impl AuthorizedClient {
    pub fn new(
        inner: Arc<dyn HttpClient>,
        store: Arc<SessionStore>,
        refresher: Arc<RefreshCoordinator>,
        exemptions: Exemptions,
    ) -> Self {
        Self {
            inner,
            store,
            refresher,
            exemptions,
        }
    }

    /// Sends `request`, refreshing and replaying once on `401`.
    #[instrument(skip(self, request), fields(method = ?request.method, url = %request.url))]
    pub async fn send(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        if request.header_value(AUTHORIZATION).is_some() {
            return self.dispatch(request).await;
        }

        if let Some(token) = self.store.token() {
            request.set_header(AUTHORIZATION, token.bearer_value());
        }

        let replay = request.clone();
        let response = self.dispatch(request).await?;
        if !response.is_unauthorized() || self.exemptions.is_exempt(&replay.url) {
            return Ok(response);
        }

        debug!("Request rejected with 401; refreshing and replaying once");
        let token = self.refresher.refresh().await?;

        let mut replay = replay;
        replay.set_header(AUTHORIZATION, token.bearer_value());
        self.dispatch(replay).await
    }

    async fn dispatch(&self, request: HttpRequest) -> Result<HttpResponse> {
        Ok(self.inner.execute(request).await?)
    }
}

#[async_trait]
impl HttpClient for AuthorizedClient {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.send(request).await.map_err(|e| match e {
            AuthError::Network(message) => BridgeError::OperationFailed(message),
            other => BridgeError::Unauthorized(other.to_string()),
        })
    }
}
