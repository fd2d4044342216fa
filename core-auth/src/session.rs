//! # Auth Session
//!
//! The session state machine consumers observe.
//!
//! ```text
//!             hydrate()
//! Hydrating ────────────┬──► Authenticated ◄─┐
//!                       │        │ logout()   │ login()
//!                       └──► Unauthenticated ─┘
//! ```
//!
//! `Hydrating` is only the initial value; nothing ever moves back to it.
//! Boot, login and logout are serialized by one async operation lock, so a
//! login issued while the boot is still resolving simply waits its turn.

use crate::api::AuthApi;
use crate::error::{AuthError, Result};
use crate::refresh::RefreshCoordinator;
use crate::session_store::{LogoutHandlerId, SessionStore};
use crate::types::{AccessToken, SessionStatus, User};
use core_async::sync::{watch, Mutex as AsyncMutex};
use core_runtime::config::PublicSurfaces;
use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
use core_runtime::logging::redact_if_sensitive;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct AuthSession {
    api: Arc<dyn AuthApi>,
    store: Arc<SessionStore>,
    refresher: Arc<RefreshCoordinator>,
    events: EventBus,
    public_surfaces: PublicSurfaces,
    status: watch::Sender<SessionStatus>,
    user: RwLock<Option<User>>,
    op_lock: AsyncMutex<()>,
    boot_started: AtomicBool,
    current_path: Mutex<Option<String>>,
    redirect_path: Mutex<Option<String>>,
}

impl AuthSession {
    pub fn new(
        api: Arc<dyn AuthApi>,
        store: Arc<SessionStore>,
        refresher: Arc<RefreshCoordinator>,
        events: EventBus,
        public_surfaces: PublicSurfaces,
    ) -> Self {
        let (status, _) = watch::channel(SessionStatus::Hydrating);
        Self {
            api,
            store,
            refresher,
            events,
            public_surfaces,
            status,
            user: RwLock::new(None),
            op_lock: AsyncMutex::new(()),
            boot_started: AtomicBool::new(false),
            current_path: Mutex::new(None),
            redirect_path: Mutex::new(None),
        }
    }

    /// Resolves the boot state from the durable mirror.
    ///
    /// Only the first call does any work; every other caller waits for that
    /// outcome. A stored session is held optimistically while one refresh
    /// exchange validates it; if that exchange fails the stored session is
    /// discarded.
    #[instrument(skip(self))]
    pub async fn hydrate(&self) -> SessionStatus {
        if self.boot_started.swap(true, Ordering::SeqCst) {
            return self.wait_until_hydrated().await;
        }

        let _op = self.op_lock.lock().await;
        if self.status() != SessionStatus::Hydrating {
            // A login got the lock first.
            return self.status();
        }

        let status = match self.store.read_mirror().await {
            None => {
                *self.user.write() = None;
                SessionStatus::Unauthenticated
            }
            Some(stored) => {
                *self.user.write() = Some(stored.user);
                match self.refresher.refresh_with_hint(Some(stored.token)).await {
                    Ok(_) => SessionStatus::Authenticated,
                    Err(e) => {
                        warn!(error = %e, "Stored session could not be refreshed; signing out");
                        self.store.clear_session().await;
                        *self.user.write() = None;
                        SessionStatus::Unauthenticated
                    }
                }
            }
        };

        self.set_status(status);
        info!(status = %status, "Session hydrated");
        self.emit(SessionEvent::Hydrated {
            authenticated: status == SessionStatus::Authenticated,
        });
        status
    }

    /// Waits until the status has left `Hydrating`.
    pub async fn wait_until_hydrated(&self) -> SessionStatus {
        let mut receiver = self.status.subscribe();
        let status = match receiver
            .wait_for(|status| *status != SessionStatus::Hydrating)
            .await
        {
            Ok(status) => *status,
            Err(_) => self.status(),
        };
        status
    }

    /// Exchanges credentials and starts a new session.
    ///
    /// Errors from the exchange are returned unchanged and leave the session
    /// exactly as it was.
    #[instrument(skip(self, email, password), fields(email = %redact_if_sensitive("email", email)))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let _op = self.op_lock.lock().await;

        let grant = self.api.login(email, password).await?;
        self.store.begin_session(&grant.token, &grant.user).await?;

        *self.user.write() = Some(grant.user.clone());
        self.boot_started.store(true, Ordering::SeqCst);
        self.set_status(SessionStatus::Authenticated);

        info!(user_id = %grant.user.id, role = %grant.user.role, "User logged in");
        self.emit(SessionEvent::LoggedIn {
            user_id: grant.user.id.clone(),
            role: grant.user.role.to_string(),
        });
        Ok(grant.user)
    }

    /// Ends the session on the server (best effort) and locally.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        let _op = self.op_lock.lock().await;

        if let Err(e) = self.api.logout(self.store.token()).await {
            warn!(error = %e, "Server-side logout failed; clearing local session anyway");
        }
        self.end_session().await;
    }

    /// Ends the session locally without contacting the server.
    #[instrument(skip(self))]
    pub async fn invalidate(&self) {
        let _op = self.op_lock.lock().await;
        self.end_session().await;
    }

    async fn end_session(&self) {
        let redirect = self
            .current_path
            .lock()
            .clone()
            .filter(|path| !self.public_surfaces.is_public(path));
        if let Some(path) = &redirect {
            *self.redirect_path.lock() = Some(path.clone());
        }

        self.store.clear_session().await;
        *self.user.write() = None;
        self.boot_started.store(true, Ordering::SeqCst);
        self.set_status(SessionStatus::Unauthenticated);

        self.store.notify_logout();
        info!(redirect = redirect.is_some(), "User logged out");
        self.emit(SessionEvent::LoggedOut {
            redirect_path: redirect,
        });
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    pub fn is_hydrating(&self) -> bool {
        self.status() == SessionStatus::Hydrating
    }

    pub fn user(&self) -> Option<User> {
        self.user.read().clone()
    }

    /// The signed-in user, or [`AuthError::NotAuthenticated`].
    pub fn require_user(&self) -> Result<User> {
        self.user().ok_or(AuthError::NotAuthenticated)
    }

    pub fn access_token(&self) -> Option<AccessToken> {
        self.store.token()
    }

    /// Watch channel that yields every status change.
    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Records where the user currently is, for post-login redirect.
    pub fn set_current_path(&self, path: impl Into<String>) {
        *self.current_path.lock() = Some(path.into());
    }

    /// Takes the path recorded at the last logout, if any.
    pub fn take_redirect_path(&self) -> Option<String> {
        self.redirect_path.lock().take()
    }

    pub fn on_logout<F>(&self, handler: F) -> LogoutHandlerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.store.register_logout_handler(handler)
    }

    pub fn remove_logout_handler(&self, id: LogoutHandlerId) -> bool {
        self.store.unregister_logout_handler(id)
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn refresher(&self) -> &Arc<RefreshCoordinator> {
        &self.refresher
    }

    fn set_status(&self, status: SessionStatus) {
        debug_assert!(status != SessionStatus::Hydrating);
        let previous = self.status.send_replace(status);
        if previous != status {
            debug!(from = %previous, to = %status, "Session status changed");
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        self.events.emit(CoreEvent::Session(event)).ok();
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("status", &self.status())
            .field("has_user", &self.user.read().is_some())
            .finish()
    }
}
