//! # Auth Endpoint Client
//!
//! The three server calls the session core depends on, behind the
//! [`AuthApi`] trait so tests and alternative backends can stand in.
//!
//! ## Wire format
//!
//! - `POST {login}` with `{"email", "password"}` returns a token under
//!   `accessToken`, `token` or `access_token`, plus a `user` object.
//! - `POST {refresh}` returns a token under the same names. The refresh
//!   credential itself is an httpOnly cookie the HTTP client carries; an
//!   optional bearer hint accompanies it during boot.
//! - `POST {logout}` returns any 2xx.
//!
//! Any other status becomes [`AuthError::Rejected`] with the server's
//! `message` or `error` field, falling back to the raw body.

use crate::error::{AuthError, Result};
use crate::types::{AccessToken, LoginGrant, User};
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use core_runtime::config::CoreConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Server-side auth operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchanges credentials for a token and user record.
    async fn login(&self, email: &str, password: &str) -> Result<LoginGrant>;

    /// Mints a fresh token from the ambient refresh credential.
    ///
    /// `hint` is the last known token, sent as pre-authorization when
    /// available.
    async fn refresh(&self, hint: Option<AccessToken>) -> Result<AccessToken>;

    /// Invalidates the server-side session.
    async fn logout(&self, token: Option<AccessToken>) -> Result<()>;
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenBody {
    #[serde(rename = "accessToken")]
    access_token_camel: Option<String>,
    token: Option<String>,
    access_token: Option<String>,
    user: Option<User>,
}

impl TokenBody {
    /// First non-empty token field, in `accessToken`, `token`, `access_token` order.
    fn token(&mut self) -> Option<String> {
        [
            self.access_token_camel.take(),
            self.token.take(),
            self.access_token.take(),
        ]
        .into_iter()
        .flatten()
        .find(|token| !token.is_empty())
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// [`AuthApi`] over JSON HTTP.
///
/// Must be given the raw transport, not the authorized client, so auth
/// calls never recurse into refresh handling.
pub struct HttpAuthApi {
    http_client: Arc<dyn HttpClient>,
    login_url: String,
    refresh_url: String,
    logout_url: String,
}

impl HttpAuthApi {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        login_url: impl Into<String>,
        refresh_url: impl Into<String>,
        logout_url: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            login_url: login_url.into(),
            refresh_url: refresh_url.into(),
            logout_url: logout_url.into(),
        }
    }

    /// Builds the client from the configured base URL, endpoints and transport.
    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(
            Arc::clone(&config.http_client),
            config.endpoint_url(&config.endpoints.login),
            config.endpoint_url(&config.endpoints.refresh),
            config.endpoint_url(&config.endpoints.logout),
        )
    }

    async fn post(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.http_client.execute(request).await?;

        if response.is_success() {
            Ok(response)
        } else {
            Err(rejection(&response))
        }
    }

    fn parse_token_body(response: &HttpResponse) -> Result<TokenBody> {
        response
            .json::<TokenBody>()
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))
    }
}

fn rejection(response: &HttpResponse) -> AuthError {
    let message = response
        .json::<ErrorBody>()
        .ok()
        .and_then(|body| body.message.or(body.error))
        .or_else(|| {
            response
                .text()
                .ok()
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
        })
        .unwrap_or_else(|| format!("HTTP {}", response.status));

    AuthError::Rejected {
        status: response.status,
        message,
    }
}

fn require_token(body: &mut TokenBody) -> Result<AccessToken> {
    body.token()
        .map(AccessToken::new)
        .ok_or_else(|| AuthError::InvalidResponse("response carries no access token".to_string()))
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    #[instrument(skip(self, email, password))]
    async fn login(&self, email: &str, password: &str) -> Result<LoginGrant> {
        let request = HttpRequest::new(HttpMethod::Post, &self.login_url)
            .json(&LoginBody { email, password })
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

        let response = self.post(request).await?;
        let mut body = Self::parse_token_body(&response)?;
        let token = require_token(&mut body)?;
        let user = body
            .user
            .ok_or_else(|| AuthError::InvalidResponse("login response carries no user".to_string()))?;

        debug!(role = %user.role, "Credential exchange succeeded");
        Ok(LoginGrant { token, user })
    }

    #[instrument(skip(self, hint), fields(with_hint = hint.is_some()))]
    async fn refresh(&self, hint: Option<AccessToken>) -> Result<AccessToken> {
        let mut request = HttpRequest::new(HttpMethod::Post, &self.refresh_url);
        if let Some(hint) = hint {
            request = request.bearer_token(hint.as_str());
        }

        let response = self.post(request).await?;
        let mut body = Self::parse_token_body(&response)?;
        require_token(&mut body)
    }

    #[instrument(skip(self, token), fields(with_token = token.is_some()))]
    async fn logout(&self, token: Option<AccessToken>) -> Result<()> {
        let mut request = HttpRequest::new(HttpMethod::Post, &self.logout_url);
        if let Some(token) = token {
            request = request.bearer_token(token.as_str());
        }

        self.post(request).await.map(|_| ())
    }
}
