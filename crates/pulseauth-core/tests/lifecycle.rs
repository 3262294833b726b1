//! Session lifecycle tests against a scripted backend under paused time.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use common::{HOUR_MS, Harness, LEAD_MS, Reply, ScriptedBackend, alice, creds, settle};
use pulseauth_core::{AuthState, Clock, Error, MemoryStorage, Storage};

async fn stored_record(storage: &MemoryStorage) -> Option<serde_json::Value> {
    let raw = storage.get("session").await.unwrap()?;
    Some(serde_json::from_str(&raw).unwrap())
}

async fn seed_record(storage: &MemoryStorage, token: &str, expires_at_ms: i64) {
    let record = json!({
        "token": token,
        "user": { "id": "1", "username": "alice", "roles": ["athlete"] },
        "expiresAt": expires_at_ms
    });
    storage.set("session", &record.to_string()).await.unwrap();
}

fn assert_close(actual: Duration, expected_ms: u64) {
    let expected = Duration::from_millis(expected_ms);
    let slack = Duration::from_millis(5);
    assert!(
        actual <= expected && actual + slack >= expected,
        "expected ~{expected:?}, got {actual:?}"
    );
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test(start_paused = true)]
async fn login_installs_session_and_arms_timer() {
    let backend = ScriptedBackend::new();
    backend.on_login(Reply::grant("T1", HOUR_MS));
    let h = Harness::new(backend);

    let session = h.manager.login(creds()).await.unwrap();

    assert_eq!(h.manager.state(), AuthState::LoggedIn);
    assert_eq!(h.manager.session(), Some(session.clone()));
    assert_eq!(session.token().as_str(), "T1");
    assert_eq!(session.principal(), &alice());
    assert_eq!(
        session.credential().expires_at() - session.credential().issued_at(),
        chrono::Duration::milliseconds(HOUR_MS as i64)
    );
    assert_eq!(
        h.manager.next_refresh_in(),
        Some(Duration::from_millis(HOUR_MS - LEAD_MS))
    );

    let stored = stored_record(&h.storage).await.unwrap();
    assert_eq!(stored["token"], "T1");
    assert_eq!(stored["user"]["username"], "alice");
    assert_eq!(
        stored["expiresAt"].as_i64().unwrap(),
        session.credential().expires_at().timestamp_millis()
    );
}

#[tokio::test(start_paused = true)]
async fn failed_login_returns_to_logged_out() {
    let backend = ScriptedBackend::new();
    backend.on_login(Reply::Unauthorized);
    let h = Harness::new(backend);

    let err = h.manager.login(creds()).await.unwrap_err();

    assert!(matches!(err, Error::AuthInvalid { status: 401 }));
    assert_eq!(h.manager.state(), AuthState::LoggedOut);
    assert!(h.manager.session().is_none());
    assert!(h.manager.next_refresh_in().is_none());
    assert!(h.storage.keys().is_empty());
}

#[tokio::test(start_paused = true)]
async fn login_without_user_is_malformed() {
    let backend = ScriptedBackend::new();
    backend.on_login(Reply::Grant {
        token: "T1",
        expires_in_ms: Some(HOUR_MS),
        principal: None,
    });
    let h = Harness::new(backend);

    let err = h.manager.login(creds()).await.unwrap_err();
    assert!(matches!(err, Error::MalformedResponse { .. }));
    assert_eq!(h.manager.state(), AuthState::LoggedOut);
}

#[tokio::test(start_paused = true)]
async fn concurrent_login_is_rejected() {
    let backend = ScriptedBackend::new().with_latency(Duration::from_millis(500));
    backend.on_login(Reply::grant("T1", HOUR_MS));
    backend.on_login(Reply::grant("T2", HOUR_MS));
    let h = Harness::new(backend.clone());

    let first = {
        let manager = h.manager.clone();
        tokio::spawn(async move { manager.login(creds()).await })
    };
    tokio::task::yield_now().await;
    assert_eq!(h.manager.state(), AuthState::LoggingIn);

    let second = h.manager.login(creds()).await;
    assert!(matches!(
        second,
        Err(Error::Busy {
            state: AuthState::LoggingIn
        })
    ));

    let session = first.await.unwrap().unwrap();
    assert_eq!(session.token().as_str(), "T1");
    assert_eq!(backend.login_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn empty_credentials_never_reach_backend() {
    let backend = ScriptedBackend::new();
    let h = Harness::new(backend.clone());

    let err = h
        .manager
        .login(pulseauth_core::LoginCredentials::new("", "pw"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(backend.login_calls(), 0);
}

// ============================================================================
// Refresh
// ============================================================================

#[tokio::test(start_paused = true)]
async fn scheduled_refresh_replaces_credential() {
    let backend = ScriptedBackend::new();
    backend.on_login(Reply::grant("T1", HOUR_MS));
    backend.on_refresh(Reply::grant("T2", HOUR_MS));
    let h = Harness::new(backend.clone());

    h.manager.login(creds()).await.unwrap();
    let first_issue = h.manager.session().unwrap().credential().issued_at();

    // settle() itself moves the clock by 1ms
    tokio::time::advance(Duration::from_millis(HOUR_MS - LEAD_MS - 2)).await;
    settle().await;
    assert_eq!(backend.refresh_calls(), 0);

    tokio::time::advance(Duration::from_millis(1)).await;
    settle().await;

    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(backend.refreshed_tokens(), vec!["T1".to_string()]);
    assert_eq!(h.manager.state(), AuthState::LoggedIn);

    let session = h.manager.session().unwrap();
    assert_eq!(session.token().as_str(), "T2");
    assert_eq!(session.principal().id(), "1");
    assert!(session.credential().issued_at() > first_issue);
    assert_close(h.manager.next_refresh_in().unwrap(), HOUR_MS - LEAD_MS);

    let stored = stored_record(&h.storage).await.unwrap();
    assert_eq!(stored["token"], "T2");
}

#[tokio::test(start_paused = true)]
async fn overlapping_refresh_makes_one_call() {
    let backend = ScriptedBackend::new().with_latency(Duration::from_millis(200));
    backend.on_login(Reply::grant("T1", HOUR_MS));
    backend.on_refresh(Reply::grant("T2", HOUR_MS));
    let h = Harness::new(backend.clone());
    h.manager.login(creds()).await.unwrap();

    let first = {
        let manager = h.manager.clone();
        tokio::spawn(async move { manager.refresh().await })
    };
    tokio::task::yield_now().await;
    assert_eq!(h.manager.state(), AuthState::Refreshing);

    assert!(!h.manager.refresh().await.unwrap());
    assert!(first.await.unwrap().unwrap());

    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(h.manager.session().unwrap().token().as_str(), "T2");
}

#[tokio::test(start_paused = true)]
async fn refresh_without_session_is_noop() {
    let backend = ScriptedBackend::new();
    let h = Harness::new(backend.clone());

    assert!(!h.manager.refresh().await.unwrap());
    assert_eq!(backend.refresh_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_ends_session_without_retry() {
    let backend = ScriptedBackend::new();
    backend.on_login(Reply::grant("T1", HOUR_MS));
    backend.on_refresh(Reply::NetworkDown);
    let h = Harness::new(backend.clone());
    h.manager.login(creds()).await.unwrap();

    let err = h.manager.refresh().await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));

    assert_eq!(h.manager.state(), AuthState::LoggedOut);
    assert!(h.manager.session().is_none());
    assert!(h.manager.next_refresh_in().is_none());
    assert!(h.storage.keys().is_empty());

    tokio::time::sleep(Duration::from_millis(10 * HOUR_MS)).await;
    assert_eq!(backend.refresh_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn refresh_for_different_principal_ends_session() {
    let backend = ScriptedBackend::new();
    backend.on_login(Reply::grant("T1", HOUR_MS));
    backend.on_refresh(Reply::Grant {
        token: "T2",
        expires_in_ms: Some(HOUR_MS),
        principal: Some(pulseauth_core::Principal::new("99", "mallory")),
    });
    let h = Harness::new(backend);
    h.manager.login(creds()).await.unwrap();

    let err = h.manager.refresh().await.unwrap_err();
    assert!(matches!(err, Error::MalformedResponse { .. }));
    assert_eq!(h.manager.state(), AuthState::LoggedOut);
}

// ============================================================================
// Logout
// ============================================================================

#[tokio::test(start_paused = true)]
async fn logout_cancels_timer() {
    let backend = ScriptedBackend::new();
    backend.on_login(Reply::grant("T1", HOUR_MS));
    backend.on_refresh(Reply::grant("T2", HOUR_MS));
    let h = Harness::new(backend.clone());
    h.manager.login(creds()).await.unwrap();
    assert!(h.manager.next_refresh_in().is_some());

    h.manager.logout().await;

    assert_eq!(h.manager.state(), AuthState::LoggedOut);
    assert!(h.manager.next_refresh_in().is_none());
    assert!(h.storage.keys().is_empty());

    tokio::time::advance(Duration::from_millis(HOUR_MS)).await;
    settle().await;
    assert_eq!(backend.refresh_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn logout_discards_in_flight_refresh() {
    let backend = ScriptedBackend::new().with_latency(Duration::from_millis(500));
    backend.on_login(Reply::grant("T1", HOUR_MS));
    backend.on_refresh(Reply::grant("T2", HOUR_MS));
    let h = Harness::new(backend.clone());
    h.manager.login(creds()).await.unwrap();

    let refresh = {
        let manager = h.manager.clone();
        tokio::spawn(async move { manager.refresh().await })
    };
    tokio::task::yield_now().await;
    assert_eq!(backend.refresh_calls(), 1);

    h.manager.logout().await;
    assert!(matches!(refresh.await.unwrap(), Err(Error::Cancelled)));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.manager.state(), AuthState::LoggedOut);
    assert!(h.manager.session().is_none());
    assert!(h.storage.keys().is_empty());
}

#[tokio::test(start_paused = true)]
async fn logout_during_login_discards_result() {
    let backend = ScriptedBackend::new().with_latency(Duration::from_millis(500));
    backend.on_login(Reply::grant("T1", HOUR_MS));
    let h = Harness::new(backend);

    let login = {
        let manager = h.manager.clone();
        tokio::spawn(async move { manager.login(creds()).await })
    };
    tokio::task::yield_now().await;
    h.manager.logout().await;

    assert!(matches!(login.await.unwrap(), Err(Error::Cancelled)));
    assert_eq!(h.manager.state(), AuthState::LoggedOut);
    assert!(h.storage.keys().is_empty());
}

#[tokio::test(start_paused = true)]
async fn subscribers_observe_transitions() {
    let backend = ScriptedBackend::new();
    backend.on_login(Reply::grant("T1", HOUR_MS));
    let h = Harness::new(backend);
    let mut states = h.manager.subscribe();
    assert_eq!(*states.borrow(), AuthState::LoggedOut);

    h.manager.login(creds()).await.unwrap();
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), AuthState::LoggedIn);

    h.manager.logout().await;
    assert_eq!(*states.borrow_and_update(), AuthState::LoggedOut);
}

// ============================================================================
// Startup
// ============================================================================

#[tokio::test(start_paused = true)]
async fn empty_storage_restores_logged_out() {
    let h = Harness::new(ScriptedBackend::new());
    assert_eq!(h.manager.restore().await, AuthState::LoggedOut);
    assert!(h.backend.verify_times().is_empty());
}

#[tokio::test(start_paused = true)]
async fn fresh_record_restores_without_network() {
    let storage = Arc::new(MemoryStorage::new());
    let backend = ScriptedBackend::new();
    let h = Harness::with_storage(backend.clone(), storage.clone());
    let expires = h.clock.now() + chrono::Duration::hours(1);
    seed_record(&storage, "T1", expires.timestamp_millis()).await;

    assert_eq!(h.manager.restore().await, AuthState::LoggedIn);
    assert!(backend.verify_times().is_empty());
    assert_eq!(h.manager.session().unwrap().token().as_str(), "T1");
    assert_close(h.manager.next_refresh_in().unwrap(), HOUR_MS - LEAD_MS);
}

#[tokio::test(start_paused = true)]
async fn expired_record_exhausts_verification_and_clears() {
    let storage = Arc::new(MemoryStorage::new());
    let backend = ScriptedBackend::new();
    let h = Harness::with_storage(backend.clone(), storage.clone());
    let expired = h.clock.now() - chrono::Duration::minutes(10);
    seed_record(&storage, "T0", expired.timestamp_millis()).await;

    assert_eq!(h.manager.restore().await, AuthState::LoggedOut);

    let times = backend.verify_times();
    assert_eq!(times.len(), 4);
    let gaps: Vec<_> = times.windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(
        gaps,
        vec![
            Duration::from_millis(1000),
            Duration::from_millis(2000),
            Duration::from_millis(3000)
        ]
    );
    assert!(h.manager.session().is_none());
    assert!(storage.keys().is_empty());
}

#[tokio::test(start_paused = true)]
async fn expiring_record_is_verified_then_armed() {
    let storage = Arc::new(MemoryStorage::new());
    let backend = ScriptedBackend::new();
    backend.on_verify(Reply::NetworkDown);
    backend.on_verify(Reply::grant("ignored", HOUR_MS));
    let h = Harness::with_storage(backend.clone(), storage.clone());
    let soon = h.clock.now() + chrono::Duration::minutes(2);
    seed_record(&storage, "T1", soon.timestamp_millis()).await;

    assert_eq!(h.manager.restore().await, AuthState::LoggedIn);
    assert_eq!(backend.verify_times().len(), 2);

    let session = h.manager.session().unwrap();
    assert_eq!(session.token().as_str(), "T1");
    assert_close(h.manager.next_refresh_in().unwrap(), HOUR_MS - LEAD_MS);
    assert_eq!(
        stored_record(&storage).await.unwrap()["expiresAt"].as_i64().unwrap(),
        session.credential().expires_at().timestamp_millis()
    );
}

#[tokio::test(start_paused = true)]
async fn verification_without_lifetime_keeps_stored_expiry() {
    let storage = Arc::new(MemoryStorage::new());
    let backend = ScriptedBackend::new().with_latency(Duration::from_millis(100));
    backend.on_verify(Reply::Grant {
        token: "ignored",
        expires_in_ms: None,
        principal: Some(alice()),
    });
    backend.on_refresh(Reply::grant("T2", HOUR_MS));
    let h = Harness::with_storage(backend.clone(), storage.clone());
    let soon = (h.clock.now() + chrono::Duration::minutes(2)).timestamp_millis();
    seed_record(&storage, "T1", soon).await;

    let state = h.manager.restore().await;
    assert!(matches!(state, AuthState::LoggedIn | AuthState::Refreshing), "{state:?}");
    assert_eq!(backend.verify_times().len(), 1);

    let session = h.manager.session().unwrap();
    assert_eq!(session.token().as_str(), "T1");
    assert_eq!(session.credential().expires_at().timestamp_millis(), soon);
    assert_eq!(
        stored_record(&storage).await.unwrap()["expiresAt"].as_i64().unwrap(),
        soon
    );

    // Already inside the lead window, so the refresh is due at once
    tokio::time::sleep(Duration::from_millis(200)).await;
    settle().await;

    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(backend.refreshed_tokens(), vec!["T1".to_string()]);
    assert_eq!(h.manager.state(), AuthState::LoggedIn);
    assert_eq!(h.manager.session().unwrap().token().as_str(), "T2");
    assert_eq!(stored_record(&storage).await.unwrap()["token"], "T2");
}

#[tokio::test(start_paused = true)]
async fn unauthorized_verification_clears_immediately() {
    let storage = Arc::new(MemoryStorage::new());
    let backend = ScriptedBackend::new();
    backend.on_verify(Reply::Unauthorized);
    let h = Harness::with_storage(backend.clone(), storage.clone());
    seed_record(&storage, "T0", h.clock.now().timestamp_millis() - 1).await;

    assert_eq!(h.manager.restore().await, AuthState::LoggedOut);
    assert_eq!(backend.verify_times().len(), 1);
    assert!(storage.keys().is_empty());
}

#[tokio::test(start_paused = true)]
async fn corrupted_record_restores_logged_out() {
    let storage = Arc::new(MemoryStorage::new());
    let backend = ScriptedBackend::new();
    let record = json!({
        "user": { "id": "1", "username": "alice" },
        "expiresAt": 4_102_444_800_000i64
    });
    storage.set("session", &record.to_string()).await.unwrap();
    let h = Harness::with_storage(backend.clone(), storage.clone());

    assert_eq!(h.manager.restore().await, AuthState::LoggedOut);
    assert!(backend.verify_times().is_empty());
    assert!(storage.keys().is_empty());
}

#[tokio::test(start_paused = true)]
async fn legacy_layout_is_verified_and_migrated() {
    let storage = Arc::new(MemoryStorage::new());
    storage.set("token", "legacy-token").await.unwrap();
    storage
        .set("user", &json!({ "id": 1, "username": "alice" }).to_string())
        .await
        .unwrap();
    let backend = ScriptedBackend::new();
    backend.on_verify(Reply::grant("unused", HOUR_MS));
    let h = Harness::with_storage(backend.clone(), storage.clone());

    assert_eq!(h.manager.restore().await, AuthState::LoggedIn);
    assert_eq!(backend.verify_times().len(), 1);
    assert_eq!(storage.keys(), vec!["session".to_string()]);

    let stored = stored_record(&storage).await.unwrap();
    assert_eq!(stored["token"], "legacy-token");
}

#[tokio::test(start_paused = true)]
async fn logout_abandons_startup_verification() {
    let storage = Arc::new(MemoryStorage::new());
    let backend = ScriptedBackend::new();
    let h = Harness::with_storage(backend.clone(), storage.clone());
    seed_record(&storage, "T0", h.clock.now().timestamp_millis() - 1).await;

    let restore = {
        let manager = h.manager.clone();
        tokio::spawn(async move { manager.restore().await })
    };
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(h.manager.state(), AuthState::Verifying);
    assert_eq!(backend.verify_times().len(), 2);

    h.manager.logout().await;
    assert_eq!(restore.await.unwrap(), AuthState::LoggedOut);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(backend.verify_times().len(), 2);
    assert!(storage.keys().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_releases_timer_and_keeps_storage() {
    let backend = ScriptedBackend::new();
    backend.on_login(Reply::grant("T1", HOUR_MS));
    let h = Harness::new(backend.clone());
    h.manager.login(creds()).await.unwrap();

    h.manager.shutdown();
    assert!(h.manager.next_refresh_in().is_none());
    assert_eq!(h.storage.keys(), vec!["session".to_string()]);

    tokio::time::advance(Duration::from_millis(HOUR_MS)).await;
    settle().await;
    assert_eq!(backend.refresh_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn dropping_manager_releases_timer() {
    let backend = ScriptedBackend::new();
    backend.on_login(Reply::grant("T1", HOUR_MS));
    let h = Harness::new(backend.clone());
    h.manager.login(creds()).await.unwrap();
    drop(h.manager);

    tokio::time::advance(Duration::from_millis(HOUR_MS)).await;
    settle().await;
    assert_eq!(backend.refresh_calls(), 0);
}
