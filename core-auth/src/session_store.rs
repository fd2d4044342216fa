//! # Session Store
//!
//! Holds the live access token, mirrors the session into durable key-value
//! storage, owns the background refresh timer and fans out logout signals.
//!
//! ## Durable mirror
//!
//! Two entries, written and cleared as a pair:
//!
//! | Key | Value |
//! |-----|-------|
//! | `auth.access_token` | raw token string |
//! | `auth.user` | user record as JSON |
//!
//! A reader that finds only one of them, or a user entry that does not
//! parse, deletes both and reports no session. Corruption is logged, never
//! surfaced.
//!
//! ## Timer
//!
//! Every committed token re-arms a single [`TimerSlot`] from the token's
//! expiry. When it fires it calls back into the bound
//! [`RefreshCoordinator`] through a weak reference, so the store never keeps
//! the coordinator alive.

use crate::error::{AuthError, Result};
use crate::refresh::RefreshCoordinator;
use crate::token_clock::{self, RefreshSchedule};
use crate::types::{AccessToken, User};
use bridge_traits::storage::KeyValueStore;
use bridge_traits::time::Clock;
use core_async::sync::Mutex as AsyncMutex;
use core_async::timer::TimerSlot;
use parking_lot::{Mutex, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// Storage key of the mirrored access token.
pub const ACCESS_TOKEN_KEY: &str = "auth.access_token";

/// Storage key of the mirrored user record.
pub const USER_KEY: &str = "auth.user";

/// A session recovered from durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub token: AccessToken,
    pub user: User,
}

/// Handle returned by [`SessionStore::register_logout_handler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogoutHandlerId(u64);

type LogoutHandler = Arc<dyn Fn() + Send + Sync>;

pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    schedule: RefreshSchedule,
    token: RwLock<Option<AccessToken>>,
    /// Bumped whenever the session is replaced or torn down. A refresh that
    /// started under an older epoch must not commit.
    epoch: AtomicU64,
    /// Serializes every durable write together with its epoch check.
    write_lock: AsyncMutex<()>,
    timer: TimerSlot,
    refresher: RwLock<Option<Weak<RefreshCoordinator>>>,
    logout_handlers: Mutex<Vec<(LogoutHandlerId, LogoutHandler)>>,
    next_handler_id: AtomicU64,
}

impl SessionStore {
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        schedule: RefreshSchedule,
    ) -> Self {
        Self {
            storage,
            clock,
            schedule,
            token: RwLock::new(None),
            epoch: AtomicU64::new(0),
            write_lock: AsyncMutex::new(()),
            timer: TimerSlot::new("session-refresh"),
            refresher: RwLock::new(None),
            logout_handlers: Mutex::new(Vec::new()),
            next_handler_id: AtomicU64::new(1),
        }
    }

    /// Current in-memory token.
    pub fn token(&self) -> Option<AccessToken> {
        self.token.read().clone()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub fn schedule(&self) -> &RefreshSchedule {
        &self.schedule
    }

    /// Whether a background refresh is currently pending.
    pub fn is_refresh_armed(&self) -> bool {
        self.timer.is_armed()
    }

    /// Connects the timer to the coordinator that should run scheduled
    /// refreshes. Called once by [`RefreshCoordinator::new`].
    pub fn bind_refresher(&self, refresher: Weak<RefreshCoordinator>) {
        *self.refresher.write() = Some(refresher);
    }

    /// Commits `token` to memory and storage and re-arms the refresh timer.
    ///
    /// Storage is written first; if that fails nothing changes in memory.
    pub async fn set_token(&self, token: AccessToken) -> Result<()> {
        self.commit_token(token, None).await
    }

    /// Like [`set_token`](Self::set_token), but only while the session epoch
    /// still equals `epoch`. Fails with [`AuthError::SessionEnded`] otherwise
    /// and leaves no trace of `token` behind.
    pub(crate) async fn commit_token(&self, token: AccessToken, epoch: Option<u64>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if let Some(expected) = epoch {
            if self.epoch() != expected {
                debug!("Session changed while the token was being minted; discarding it");
                return Err(AuthError::SessionEnded);
            }
        }

        self.write(ACCESS_TOKEN_KEY, token.as_str()).await?;
        *self.token.write() = Some(token.clone());

        self.arm_refresh(&token);
        Ok(())
    }

    /// Starts a new session: writes both mirror entries, then the in-memory
    /// token, then arms the timer. Any refresh still in flight for the
    /// previous session is invalidated.
    pub async fn begin_session(&self, token: &AccessToken, user: &User) -> Result<()> {
        let user_json = serde_json::to_string(user)
            .map_err(|e| AuthError::Storage(format!("Failed to serialize user: {}", e)))?;

        let _guard = self.write_lock.lock().await;
        self.epoch.fetch_add(1, Ordering::SeqCst);

        self.write(ACCESS_TOKEN_KEY, token.as_str()).await?;
        if let Err(e) = self.write(USER_KEY, &user_json).await {
            self.remove_quietly(ACCESS_TOKEN_KEY).await;
            return Err(e);
        }

        *self.token.write() = Some(token.clone());
        self.arm_refresh(token);
        Ok(())
    }

    /// Mirrors the user record.
    pub async fn write_user(&self, user: &User) -> Result<()> {
        let user_json = serde_json::to_string(user)
            .map_err(|e| AuthError::Storage(format!("Failed to serialize user: {}", e)))?;
        self.write(USER_KEY, &user_json).await
    }

    /// Cancels the timer, forgets the in-memory token and removes the
    /// durable token entry. The user entry is left to the caller.
    pub async fn clear_token(&self) {
        let _guard = self.write_lock.lock().await;
        self.clear_memory_token();
        self.remove_quietly(ACCESS_TOKEN_KEY).await;
    }

    /// Cancels the timer and forgets the in-memory token only.
    pub fn clear_memory_token(&self) {
        self.timer.cancel();
        *self.token.write() = None;
    }

    /// Soft clear for a failed scheduled refresh. Only applies while the
    /// session epoch still equals `epoch`; returns whether anything changed.
    pub(crate) async fn clear_memory_token_if(&self, epoch: u64) -> bool {
        let _guard = self.write_lock.lock().await;
        if self.epoch() != epoch {
            debug!("Session changed since the refresh was scheduled; keeping its token");
            return false;
        }
        self.clear_memory_token();
        true
    }

    /// Tears the whole session down: timer, memory and both mirror entries.
    pub async fn clear_session(&self) {
        let _guard = self.write_lock.lock().await;
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.clear_memory_token();

        self.remove_quietly(ACCESS_TOKEN_KEY).await;
        self.remove_quietly(USER_KEY).await;
        debug!("Session cleared");
    }

    /// Reads the durable mirror, healing it when only half of it is present
    /// or the user record is unreadable.
    pub async fn read_mirror(&self) -> Option<StoredSession> {
        let token = self.read(ACCESS_TOKEN_KEY).await;
        let user = self.read(USER_KEY).await;

        match (token, user) {
            (None, None) => {
                debug!("No stored session");
                None
            }
            (Some(token), Some(user_json)) => {
                if token.trim().is_empty() {
                    warn!("Stored access token is empty; clearing stored session");
                    self.clear_mirror().await;
                    return None;
                }

                match serde_json::from_str::<User>(&user_json) {
                    Ok(user) => Some(StoredSession {
                        token: AccessToken::new(token),
                        user,
                    }),
                    Err(e) => {
                        let err = AuthError::CorruptedState(format!("user record: {}", e));
                        warn!(error = %err, "Clearing stored session");
                        self.clear_mirror().await;
                        None
                    }
                }
            }
            (token, _) => {
                warn!(
                    has_token = token.is_some(),
                    "Stored session is incomplete; clearing stored session"
                );
                self.clear_mirror().await;
                None
            }
        }
    }

    /// Registers a callback fired after every logout.
    pub fn register_logout_handler<F>(&self, handler: F) -> LogoutHandlerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = LogoutHandlerId(self.next_handler_id.fetch_add(1, Ordering::SeqCst));
        self.logout_handlers.lock().push((id, Arc::new(handler)));
        id
    }

    /// Returns `false` if the handler was already gone.
    pub fn unregister_logout_handler(&self, id: LogoutHandlerId) -> bool {
        let mut handlers = self.logout_handlers.lock();
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != before
    }

    /// Invokes every registered logout handler in registration order.
    ///
    /// A panicking handler is logged and does not stop the others.
    pub fn notify_logout(&self) {
        let handlers: Vec<LogoutHandler> = self
            .logout_handlers
            .lock()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler())).is_err() {
                error!("Logout handler panicked");
            }
        }
    }

    fn arm_refresh(&self, token: &AccessToken) {
        let now = self.clock.unix_timestamp();
        let Some(delay) = self.schedule.delay_for(token.as_str(), now) else {
            self.timer.cancel();
            debug!("Token carries no usable expiry; background refresh not scheduled");
            return;
        };

        let Some(refresher) = self.refresher.read().clone() else {
            debug!("No refresher bound; background refresh not scheduled");
            return;
        };

        self.timer.arm(delay, async move {
            if let Some(refresher) = refresher.upgrade() {
                refresher.refresh_scheduled().await;
            }
        });

        info!(
            delay_secs = delay.as_secs(),
            expires_at = token_clock::expiry_of(token.as_str()),
            "Background refresh scheduled"
        );
    }

    async fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to read stored session entry");
                None
            }
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        self.storage.set(key, value).await.map_err(|e| {
            warn!(key, error = %e, "Failed to persist session entry");
            AuthError::Storage(e.to_string())
        })
    }

    async fn remove_quietly(&self, key: &str) {
        if let Err(e) = self.storage.remove(key).await {
            warn!(key, error = %e, "Failed to remove stored session entry");
        }
    }

    async fn clear_mirror(&self) {
        self.remove_quietly(ACCESS_TOKEN_KEY).await;
        self.remove_quietly(USER_KEY).await;
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("has_token", &self.token.read().is_some())
            .field("epoch", &self.epoch())
            .field("refresh_armed", &self.is_refresh_armed())
            .finish()
    }
}
