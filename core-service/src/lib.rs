//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP transport and
//! durable key-value storage) into the session core. Desktop apps typically
//! enable the `desktop-shims` feature (which depends on `bridge-desktop`) and
//! let [`CoreConfig`] fill in the defaults; other hosts inject their own
//! bridges through the config builder.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::CoreService;
//!
//! # async fn example() -> core_service::Result<()> {
//! let config = CoreConfig::builder()
//!     .api_base_url("https://catalog.example.com/api")
//!     .storage_path("/var/lib/catalog/session.db")
//!     .build()?;
//!
//! let core = CoreService::bootstrap(config)?;
//! core.start().await;
//!
//! if !core.session().is_authenticated() {
//!     core.session().login("ana@brand.example", "secret").await?;
//! }
//!
//! // Bearer attached, 401s refreshed and replayed once.
//! let api = core.http_client();
//! # Ok(())
//! # }
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{http::HttpClient, time::SystemClock};
use core_auth::{
    AuthApi, AuthSession, AuthorizedClient, Exemptions, HttpAuthApi, RefreshCoordinator,
    RefreshSchedule, SessionStatus, SessionStore,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream};
use tracing::info;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::{MemoryKeyValueStore, ReqwestHttpClient, SqliteKeyValueStore};

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<CoreConfig>,
    events: EventBus,
    store: Arc<SessionStore>,
    session: Arc<AuthSession>,
    client: Arc<AuthorizedClient>,
}

impl CoreService {
    /// Wire the session core against the auth endpoints named in `config`.
    pub fn bootstrap(config: CoreConfig) -> Result<Self> {
        let api: Arc<dyn AuthApi> = Arc::new(HttpAuthApi::from_config(&config));
        Self::bootstrap_with_api(config, api)
    }

    /// Like [`bootstrap`](Self::bootstrap) with a caller-supplied auth backend.
    pub fn bootstrap_with_api(config: CoreConfig, api: Arc<dyn AuthApi>) -> Result<Self> {
        config.validate()?;
        let schedule = RefreshSchedule::from_timing(&config.refresh)?;

        let events = EventBus::new(config.event_buffer_size);
        let store = Arc::new(SessionStore::new(
            Arc::clone(&config.key_value_store),
            Arc::new(SystemClock),
            schedule,
        ));
        let refresher = RefreshCoordinator::new(Arc::clone(&api), Arc::clone(&store), events.clone());
        let session = Arc::new(AuthSession::new(
            api,
            Arc::clone(&store),
            Arc::clone(&refresher),
            events.clone(),
            config.public_surfaces.clone(),
        ));
        let client = Arc::new(AuthorizedClient::new(
            Arc::clone(&config.http_client),
            Arc::clone(&store),
            refresher,
            Exemptions::from_config(&config),
        ));

        info!(
            api_base_url = %config.api_base_url,
            guard_window_secs = schedule.guard_window().as_secs(),
            "Session core bootstrapped"
        );

        Ok(Self {
            config: Arc::new(config),
            events,
            store,
            session,
            client,
        })
    }

    /// Rehydrate the session from storage. Safe to call more than once.
    pub async fn start(&self) -> SessionStatus {
        self.session.hydrate().await
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// The authorized HTTP client for data requests.
    pub fn http_client(&self) -> Arc<dyn HttpClient> {
        self.client.clone()
    }

    pub fn authorized_client(&self) -> &Arc<AuthorizedClient> {
        &self.client
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpMethod, HttpRequest, HttpResponse};
    use bridge_traits::storage::KeyValueStore;
    use core_runtime::events::{CoreEvent, SessionEvent};
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Minimal auth server: one user, tokens `T1`, `T2`, ...
    #[derive(Default)]
    struct FakeServer {
        issued: Mutex<u32>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl FakeServer {
        fn current(&self) -> String {
            format!("Bearer T{}", *self.issued.lock())
        }
    }

    #[async_trait]
    impl HttpClient for FakeServer {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            self.requests.lock().push(request.clone());
            let path = request.url.trim_start_matches("https://catalog.test/api");

            let response = match path {
                "/auth/login" => {
                    let body: serde_json::Value =
                        serde_json::from_slice(request.body.as_deref().unwrap_or_default())
                            .unwrap_or_default();
                    if body["password"] == "secret" {
                        *self.issued.lock() += 1;
                        HttpResponse::new(
                            200,
                            format!(
                                r#"{{"accessToken":"T{}","user":{{"id":5,"email":"ana@brand.example","role":"brand_manager","brandId":2}}}}"#,
                                *self.issued.lock()
                            ),
                        )
                    } else {
                        HttpResponse::new(401, r#"{"message":"Invalid email or password"}"#)
                    }
                }
                "/auth/refresh" => {
                    *self.issued.lock() += 1;
                    HttpResponse::new(200, format!(r#"{{"token":"T{}"}}"#, *self.issued.lock()))
                }
                "/auth/logout" => HttpResponse::new(204, ""),
                _ if request.header_value("authorization") == Some(self.current().as_str()) => {
                    HttpResponse::new(200, r#"{"items":[]}"#)
                }
                _ => HttpResponse::new(401, ""),
            };
            Ok(response)
        }
    }

    #[derive(Default)]
    struct MockKeyValueStore {
        entries: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl KeyValueStore for MockKeyValueStore {
        async fn get(&self, key: &str) -> BridgeResult<Option<String>> {
            Ok(self.entries.lock().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str) -> BridgeResult<()> {
            self.entries.lock().insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn remove(&self, key: &str) -> BridgeResult<()> {
            self.entries.lock().remove(key);
            Ok(())
        }
    }

    fn service(server: Arc<FakeServer>, storage: Arc<MockKeyValueStore>) -> CoreService {
        let config = CoreConfig::builder()
            .api_base_url("https://catalog.test/api")
            .http_client(server)
            .key_value_store(storage)
            .build()
            .unwrap();
        CoreService::bootstrap(config).unwrap()
    }

    #[tokio::test]
    async fn test_full_session_round_trip() {
        let server = Arc::new(FakeServer::default());
        let storage = Arc::new(MockKeyValueStore::default());
        let core = service(server.clone(), storage.clone());
        let mut events = core.subscribe_events();

        assert_eq!(core.start().await, SessionStatus::Unauthenticated);

        let err = core.session().login("ana@brand.example", "nope").await.unwrap_err();
        assert!(err.is_credential_rejection());

        let user = core.session().login("ana@brand.example", "secret").await.unwrap();
        assert_eq!(user.id, "5");
        assert_eq!(user.brand_id.as_deref(), Some("2"));

        let response = core
            .http_client()
            .execute(HttpRequest::new(HttpMethod::Get, "https://catalog.test/api/products"))
            .await
            .unwrap();
        assert_eq!(response.status, 200);

        core.session().logout().await;
        assert!(storage.entries.lock().is_empty());

        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Session(SessionEvent::Hydrated { authenticated: false })
        );
        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Session(SessionEvent::LoggedIn { .. })
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Session(SessionEvent::LoggedOut { .. })
        ));
    }

    #[tokio::test]
    async fn test_restart_rotates_stored_session() {
        let server = Arc::new(FakeServer::default());
        let storage = Arc::new(MockKeyValueStore::default());

        let first = service(server.clone(), storage.clone());
        first.start().await;
        first.session().login("ana@brand.example", "secret").await.unwrap();

        let second = service(server.clone(), storage.clone());
        assert_eq!(second.start().await, SessionStatus::Authenticated);
        assert_eq!(second.session().access_token().unwrap().as_str(), "T2");

        let refresh = server
            .requests
            .lock()
            .iter()
            .rev()
            .find(|r| r.url.ends_with("/auth/refresh"))
            .cloned()
            .unwrap();
        assert_eq!(refresh.header_value("authorization"), Some("Bearer T1"));
    }

    #[tokio::test]
    async fn test_data_request_recovers_from_expired_token() {
        let server = Arc::new(FakeServer::default());
        let storage = Arc::new(MockKeyValueStore::default());
        let core = service(server.clone(), storage);
        core.start().await;
        core.session().login("ana@brand.example", "secret").await.unwrap();

        // Server-side rotation the client has not seen yet.
        *server.issued.lock() += 1;

        let response = core
            .http_client()
            .execute(HttpRequest::new(HttpMethod::Get, "https://catalog.test/api/products"))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(core.session().access_token().unwrap().as_str(), "T3");
    }

    #[test]
    fn test_bootstrap_rejects_invalid_timing() {
        let config = CoreConfig::builder()
            .api_base_url("https://catalog.test/api")
            .http_client(Arc::new(FakeServer::default()))
            .key_value_store(Arc::new(MockKeyValueStore::default()))
            .refresh_timing(core_runtime::config::RefreshTiming {
                guard_window: std::time::Duration::from_secs(1),
                floor: std::time::Duration::from_secs(5),
            })
            .build();

        let result = config.map_err(CoreError::from).and_then(CoreService::bootstrap);
        assert!(matches!(result, Err(CoreError::Runtime(_))));
    }
}
