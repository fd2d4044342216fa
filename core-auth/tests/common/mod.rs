//! Shared fixtures for the session core integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::storage::KeyValueStore;
use bridge_traits::time::FixedClock;
use core_async::sync::watch;
use core_auth::{
    AccessToken, AuthApi, AuthError, AuthSession, AuthorizedClient, Exemptions, LoginGrant,
    RefreshCoordinator, RefreshSchedule, Role, SessionStore, User, ACCESS_TOKEN_KEY, USER_KEY,
};
use core_runtime::config::PublicSurfaces;
use core_runtime::events::EventBus;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const NOW: i64 = 1_700_000_000;
pub const BASE: &str = "https://catalog.test/api";

// ============================================================================
// Helpers
// ============================================================================

/// JWT-shaped token expiring at `exp`, tagged so different tokens differ.
pub fn jwt(tag: &str, exp: i64) -> AccessToken {
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"{}","exp":{}}}"#, tag, exp));
    AccessToken::new(format!("eyJhbGciOiJIUzI1NiJ9.{}.sig", payload))
}

pub fn manager() -> User {
    User {
        id: "17".to_string(),
        email: "ana@brand.example".to_string(),
        role: Role::BrandManager,
        brand_id: Some("3".to_string()),
    }
}

pub fn rejected(status: u16, message: &str) -> AuthError {
    AuthError::Rejected {
        status,
        message: message.to_string(),
    }
}

/// Yields until `condition` holds, giving spawned tasks a chance to run.
pub async fn settle_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        core_async::task::yield_now().await;
    }
    panic!("condition never became true");
}

// ============================================================================
// Mock Implementations
// ============================================================================

/// In-memory durable store.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn insert(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_string(), value.to_string());
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn seed_session(&self, token: &AccessToken, user: &User) {
        self.insert(ACCESS_TOKEN_KEY, token.as_str());
        self.insert(USER_KEY, &serde_json::to_string(user).unwrap());
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> BridgeResult<Option<String>> {
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.insert(key, value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> BridgeResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Auth endpoints with scripted outcomes.
///
/// Refresh calls can be held behind a gate so tests control exactly when the
/// exchange settles.
pub struct ScriptedAuthApi {
    login_results: Mutex<VecDeque<core_auth::Result<LoginGrant>>>,
    refresh_results: Mutex<VecDeque<core_auth::Result<AccessToken>>>,
    refresh_hints: Mutex<Vec<Option<String>>>,
    refresh_calls: AtomicUsize,
    logout_tokens: Mutex<Vec<Option<String>>>,
    logout_result: Mutex<core_auth::Result<()>>,
    gate: watch::Sender<bool>,
}

impl ScriptedAuthApi {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            login_results: Mutex::new(VecDeque::new()),
            refresh_results: Mutex::new(VecDeque::new()),
            refresh_hints: Mutex::new(Vec::new()),
            refresh_calls: AtomicUsize::new(0),
            logout_tokens: Mutex::new(Vec::new()),
            logout_result: Mutex::new(Ok(())),
            gate,
        }
    }

    /// Refresh calls block until [`release`](Self::release).
    pub fn gated() -> Self {
        let api = Self::new();
        api.gate.send_replace(false);
        api
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    pub fn push_login(&self, result: core_auth::Result<LoginGrant>) {
        self.login_results.lock().push_back(result);
    }

    pub fn push_refresh(&self, result: core_auth::Result<AccessToken>) {
        self.refresh_results.lock().push_back(result);
    }

    pub fn fail_logout(&self, error: AuthError) {
        *self.logout_result.lock() = Err(error);
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_hints(&self) -> Vec<Option<String>> {
        self.refresh_hints.lock().clone()
    }

    pub fn logout_tokens(&self) -> Vec<Option<String>> {
        self.logout_tokens.lock().clone()
    }
}

#[async_trait]
impl AuthApi for ScriptedAuthApi {
    async fn login(&self, _email: &str, _password: &str) -> core_auth::Result<LoginGrant> {
        self.login_results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(rejected(401, "Invalid email or password")))
    }

    async fn refresh(&self, hint: Option<AccessToken>) -> core_auth::Result<AccessToken> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_hints
            .lock()
            .push(hint.map(|t| t.as_str().to_string()));

        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        self.refresh_results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(rejected(401, "Refresh token missing")))
    }

    async fn logout(&self, token: Option<AccessToken>) -> core_auth::Result<()> {
        self.logout_tokens
            .lock()
            .push(token.map(|t| t.as_str().to_string()));
        self.logout_result.lock().clone()
    }
}

type Responder = dyn Fn(&HttpRequest) -> BridgeResult<HttpResponse> + Send + Sync;

/// Transport that answers through a closure and records every request.
pub struct RecordingHttpClient {
    requests: Mutex<Vec<HttpRequest>>,
    responder: Box<Responder>,
}

impl RecordingHttpClient {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&HttpRequest) -> BridgeResult<HttpResponse> + Send + Sync + 'static,
    {
        Self {
            requests: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        }
    }

    /// 200 for `Bearer <token>`, 401 for anything else.
    pub fn accepting(token: &AccessToken) -> Self {
        let expected = token.bearer_value();
        Self::new(move |request| {
            if request.header_value("authorization") == Some(expected.as_str()) {
                Ok(HttpResponse::new(200, r#"{"items":[]}"#))
            } else {
                Ok(HttpResponse::new(401, r#"{"message":"jwt expired"}"#))
            }
        })
    }

    pub fn offline() -> Self {
        Self::new(|_| Err(BridgeError::OperationFailed("connection refused".to_string())))
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn authorization_headers(&self) -> Vec<Option<String>> {
        self.requests
            .lock()
            .iter()
            .map(|r| r.header_value("authorization").map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl HttpClient for RecordingHttpClient {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        let response = (self.responder)(&request);
        self.requests.lock().push(request);
        response
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Fully wired session core over in-memory bridges.
pub struct Harness {
    pub storage: Arc<MemoryStore>,
    pub api: Arc<ScriptedAuthApi>,
    pub clock: Arc<FixedClock>,
    pub events: EventBus,
    pub store: Arc<SessionStore>,
    pub refresher: Arc<RefreshCoordinator>,
    pub session: AuthSession,
}

impl Harness {
    pub fn new(api: ScriptedAuthApi) -> Self {
        Self::with_storage(api, MemoryStore::default())
    }

    pub fn with_storage(api: ScriptedAuthApi, storage: MemoryStore) -> Self {
        let storage = Arc::new(storage);
        let api = Arc::new(api);
        let clock = Arc::new(FixedClock::new(NOW));
        let events = EventBus::new(32);

        let store = Arc::new(SessionStore::new(
            storage.clone(),
            clock.clone(),
            RefreshSchedule::default(),
        ));
        let refresher = RefreshCoordinator::new(api.clone(), store.clone(), events.clone());
        let session = AuthSession::new(
            api.clone(),
            store.clone(),
            refresher.clone(),
            events.clone(),
            PublicSurfaces::prefixes(["/login", "/reset-password"]),
        );

        Self {
            storage,
            api,
            clock,
            events,
            store,
            refresher,
            session,
        }
    }

    pub fn authorized_client(&self, transport: Arc<RecordingHttpClient>) -> AuthorizedClient {
        AuthorizedClient::new(
            transport,
            self.store.clone(),
            self.refresher.clone(),
            Exemptions::new("/api", ["/api/auth/login", "/api/auth/refresh"], ["/public/"]),
        )
    }
}
