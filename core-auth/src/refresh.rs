//! # Refresh Coordinator
//!
//! Mints new access tokens from the ambient refresh credential, with at most
//! one exchange in flight at any time.
//!
//! Every caller that asks for a refresh while one is already running joins
//! the running exchange and observes exactly its outcome. Once that exchange
//! settles the slot is empty again, so the next request starts a fresh one.
//!
//! A successful exchange is committed through [`SessionStore`] (durable
//! write, memory, timer re-arm) before any waiter sees the new token. If the
//! session is torn down while the exchange is running, the result is thrown
//! away and waiters get [`AuthError::SessionEnded`].

use crate::api::AuthApi;
use crate::error::{AuthError, Result};
use crate::session_store::SessionStore;
use crate::types::AccessToken;
use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

type SharedRefresh = Shared<BoxFuture<'static, Result<AccessToken>>>;

struct InFlight {
    id: u64,
    future: SharedRefresh,
}

pub struct RefreshCoordinator {
    api: Arc<dyn AuthApi>,
    store: Arc<SessionStore>,
    events: EventBus,
    in_flight: Mutex<Option<InFlight>>,
    next_id: AtomicU64,
    me: Weak<RefreshCoordinator>,
}

impl RefreshCoordinator {
    /// Creates the coordinator and binds it to `store` as the target of
    /// scheduled refreshes.
    pub fn new(api: Arc<dyn AuthApi>, store: Arc<SessionStore>, events: EventBus) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Self>| {
            store.bind_refresher(me.clone());
            Self {
                api,
                store,
                events,
                in_flight: Mutex::new(None),
                next_id: AtomicU64::new(1),
                me: me.clone(),
            }
        })
    }

    /// Obtains a new access token, joining any exchange already in flight.
    pub async fn refresh(&self) -> Result<AccessToken> {
        self.join_or_start(None).await
    }

    /// Like [`refresh`](Self::refresh), presenting `hint` as pre-authorization
    /// if this call ends up starting the exchange.
    pub async fn refresh_with_hint(&self, hint: Option<AccessToken>) -> Result<AccessToken> {
        self.join_or_start(hint).await
    }

    /// Whether an exchange is currently running.
    pub fn is_refreshing(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    /// Entry point for the background timer.
    ///
    /// A failure here is soft: the in-memory token is dropped so the next
    /// request goes through the 401 path, but the session status and the
    /// durable mirror are left alone. A failure that lands after the session
    /// was replaced or ended touches nothing.
    pub async fn refresh_scheduled(&self) {
        debug!("Scheduled refresh firing");
        let epoch = self.store.epoch();
        match self.refresh().await {
            Ok(_) => {}
            Err(AuthError::SessionEnded) => {
                debug!("Scheduled refresh outlived its session");
            }
            Err(e) => {
                if self.store.clear_memory_token_if(epoch).await {
                    warn!(error = %e, "Scheduled refresh failed; dropping in-memory token");
                } else {
                    debug!(error = %e, "Scheduled refresh failed for a session that has since ended");
                }
            }
        }
    }

    fn join_or_start(&self, hint: Option<AccessToken>) -> SharedRefresh {
        let mut slot = self.in_flight.lock();
        if let Some(in_flight) = slot.as_ref() {
            debug!(refresh_id = in_flight.id, "Joining in-flight refresh");
            return in_flight.future.clone();
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let me = self.me.clone();
        let future = async move {
            match me.upgrade() {
                Some(coordinator) => coordinator.run_exchange(id, hint).await,
                None => Err(AuthError::SessionEnded),
            }
        }
        .boxed()
        .shared();

        *slot = Some(InFlight {
            id,
            future: future.clone(),
        });
        future
    }

    async fn run_exchange(&self, id: u64, hint: Option<AccessToken>) -> Result<AccessToken> {
        let epoch = self.store.epoch();
        debug!(refresh_id = id, "Starting token exchange");

        let result = match self.api.refresh(hint).await {
            Ok(token) => self
                .store
                .commit_token(token.clone(), Some(epoch))
                .await
                .map(|_| token),
            Err(e) => Err(e),
        };

        {
            let mut slot = self.in_flight.lock();
            if slot.as_ref().map(|f| f.id) == Some(id) {
                *slot = None;
            }
        }

        match &result {
            Ok(token) => {
                let expires_at = token.expires_at();
                info!(refresh_id = id, expires_at, "Access token refreshed");
                self.events
                    .emit(CoreEvent::Session(SessionEvent::TokenRefreshed { expires_at }))
                    .ok();
            }
            Err(AuthError::SessionEnded) => {
                debug!(refresh_id = id, "Refreshed token discarded; session ended");
            }
            Err(e) => {
                warn!(refresh_id = id, error = %e, "Access token refresh failed");
                self.events
                    .emit(CoreEvent::Session(SessionEvent::RefreshFailed {
                        message: e.to_string(),
                    }))
                    .ok();
            }
        }

        result
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &self.is_refreshing())
            .finish()
    }
}
