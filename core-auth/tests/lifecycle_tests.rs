//! Integration tests for login and logout
//!
//! These tests verify the full lifecycle over in-memory bridges:
//! - Login commits token and user to memory and storage
//! - Logout wipes everything and notifies handlers, even when the server call fails
//! - Failed logins leave no trace
//! - Status observers see each transition

mod common;

use common::*;
use core_auth::{AuthError, LoginGrant, SessionStatus, User, ACCESS_TOKEN_KEY, USER_KEY};
use core_runtime::events::{CoreEvent, SessionEvent};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn grant(tag: &str) -> LoginGrant {
    LoginGrant {
        token: jwt(tag, NOW + 600),
        user: manager(),
    }
}

#[tokio::test]
async fn test_login_then_logout_leaves_storage_empty() {
    let api = ScriptedAuthApi::new();
    api.push_login(Ok(grant("t0")));
    let h = Harness::new(api);
    h.session.hydrate().await;

    let user = h.session.login("ana@brand.example", "pw").await.unwrap();

    assert_eq!(user, manager());
    assert!(h.session.is_authenticated());
    assert_eq!(h.session.require_user(), Ok(manager()));
    let stored_user: User = serde_json::from_str(&h.storage.value(USER_KEY).unwrap()).unwrap();
    assert_eq!(stored_user, manager());
    assert!(h.storage.value(ACCESS_TOKEN_KEY).is_some());
    assert!(h.store.is_refresh_armed());

    h.session.logout().await;

    assert_eq!(h.session.status(), SessionStatus::Unauthenticated);
    assert!(h.session.user().is_none());
    assert_eq!(h.session.require_user(), Err(AuthError::NotAuthenticated));
    assert!(h.session.access_token().is_none());
    assert!(h.storage.is_empty());
    assert!(!h.store.is_refresh_armed());
    assert_eq!(
        h.api.logout_tokens(),
        vec![Some(jwt("t0", NOW + 600).as_str().to_string())]
    );
}

#[tokio::test]
async fn test_logout_survives_server_failure() {
    let api = ScriptedAuthApi::new();
    api.push_login(Ok(grant("t0")));
    api.fail_logout(AuthError::Network("offline".to_string()));
    let h = Harness::new(api);
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    h.session.on_logout(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    h.session.login("ana@brand.example", "pw").await.unwrap();
    h.session.logout().await;

    assert_eq!(h.session.status(), SessionStatus::Unauthenticated);
    assert!(h.storage.is_empty());
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_removed_logout_handler_is_not_called() {
    let h = Harness::new(ScriptedAuthApi::new());
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    let id = h.session.on_logout(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(h.session.remove_logout_handler(id));
    h.session.logout().await;

    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_login_leaves_no_trace() {
    let api = ScriptedAuthApi::new();
    api.push_login(Err(rejected(401, "Invalid email or password")));
    let h = Harness::new(api);
    h.session.hydrate().await;

    let err = h.session.login("ana@brand.example", "nope").await.unwrap_err();

    assert_eq!(err, rejected(401, "Invalid email or password"));
    assert!(err.is_credential_rejection());
    assert_eq!(h.session.status(), SessionStatus::Unauthenticated);
    assert!(h.storage.is_empty());
    assert!(!h.store.is_refresh_armed());
}

#[tokio::test]
async fn test_relogin_replaces_session() {
    let api = ScriptedAuthApi::new();
    api.push_login(Ok(grant("first")));
    let admin = User {
        id: "1".to_string(),
        email: "root@catalog.example".to_string(),
        role: core_auth::Role::Admin,
        brand_id: None,
    };
    api.push_login(Ok(LoginGrant {
        token: jwt("second", NOW + 600),
        user: admin.clone(),
    }));
    let h = Harness::new(api);

    h.session.login("ana@brand.example", "pw").await.unwrap();
    h.session.logout().await;
    h.session.login("root@catalog.example", "pw").await.unwrap();

    assert_eq!(h.session.user(), Some(admin.clone()));
    assert!(h.session.user().unwrap().is_admin());
    assert_eq!(
        h.storage.value(ACCESS_TOKEN_KEY).as_deref(),
        Some(jwt("second", NOW + 600).as_str())
    );
}

#[tokio::test]
async fn test_logout_redirect_path_skips_public_surfaces() {
    let api = ScriptedAuthApi::new();
    api.push_login(Ok(grant("t0")));
    api.push_login(Ok(grant("t1")));
    let h = Harness::new(api);

    h.session.login("ana@brand.example", "pw").await.unwrap();
    h.session.set_current_path("/brands/3/products");
    h.session.logout().await;
    assert_eq!(h.session.take_redirect_path().as_deref(), Some("/brands/3/products"));

    h.session.login("ana@brand.example", "pw").await.unwrap();
    h.session.set_current_path("/reset-password?token=abc");
    h.session.logout().await;
    assert_eq!(h.session.take_redirect_path(), None);
}

#[tokio::test]
async fn test_status_observers_see_transitions() {
    let api = ScriptedAuthApi::new();
    api.push_login(Ok(grant("t0")));
    let h = Harness::new(api);
    let mut status = h.session.subscribe_status();
    let mut events = h.events.subscribe();
    assert_eq!(*status.borrow_and_update(), SessionStatus::Hydrating);

    h.session.hydrate().await;
    status.changed().await.unwrap();
    assert_eq!(*status.borrow_and_update(), SessionStatus::Unauthenticated);

    h.session.login("ana@brand.example", "pw").await.unwrap();
    status.changed().await.unwrap();
    assert_eq!(*status.borrow_and_update(), SessionStatus::Authenticated);

    h.session.logout().await;
    status.changed().await.unwrap();
    assert_eq!(*status.borrow_and_update(), SessionStatus::Unauthenticated);

    let mut seen = Vec::new();
    while let Ok(CoreEvent::Session(event)) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(
        seen,
        vec![
            SessionEvent::Hydrated { authenticated: false },
            SessionEvent::LoggedIn {
                user_id: "17".to_string(),
                role: "brand_manager".to_string(),
            },
            SessionEvent::LoggedOut { redirect_path: None },
        ]
    );
}
