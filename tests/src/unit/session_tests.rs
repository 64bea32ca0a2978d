use super::{test_runtime, Harness};
use chrono::Duration;
use gait_core::auth::LOGIN_PATH;
use gait_core::mock::mint_token;
use gait_core::{
    ApiResponse, Clock, FileTokenStore, GaitClient, MockBackend, SessionStatus, SystemClock,
    TokenStore,
};
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn login_then_restart_resumes_the_session() {
    let runtime = test_runtime();
    let harness = Harness::new();
    let token = harness.token();
    harness
        .backend
        .reply(LOGIN_PATH, ApiResponse::new(200, token.clone()));

    let client = harness.client();
    assert!(!client.session().is_logged_in());
    runtime
        .block_on(client.session().login("a@b.com", "x"))
        .expect("login");
    assert!(client.session().is_logged_in());
    assert_eq!(harness.tokens.writes(), 1);

    let restarted = harness.client();
    assert!(restarted.session().is_logged_in());
    assert_eq!(harness.backend.request_count(), 1);
}

#[test]
fn login_failure_changes_nothing() {
    let runtime = test_runtime();
    let harness = Harness::new();
    harness.backend.reply(LOGIN_PATH, ApiResponse::new(401, ""));

    let client = harness.client();
    let mut status = client.session().subscribe();
    assert!(runtime
        .block_on(client.session().login("a@b.com", "wrong"))
        .is_err());

    assert_eq!(harness.tokens.writes(), 0);
    assert_eq!(client.session().status(), SessionStatus::Anonymous);
    assert!(!status.has_changed().unwrap());
}

#[test]
fn expired_token_on_disk_starts_anonymous() {
    let harness = Harness::new();
    let expired = mint_token("a@b.com", harness.clock.now() - Duration::seconds(1));
    harness.tokens.set(&expired).unwrap();

    assert!(!harness.client().session().is_logged_in());
}

#[test]
fn logout_is_idempotent_and_offline() {
    let harness = Harness::new().logged_in();
    let client = harness.client();

    client.session().logout();
    client.session().logout();

    assert!(!client.session().is_logged_in());
    assert_eq!(harness.tokens.get(), None);
    assert_eq!(harness.backend.request_count(), 0);
    assert!(!harness.client().session().is_logged_in());
}

#[test]
fn session_survives_restart_through_token_file() {
    let runtime = test_runtime();
    let temp_dir = TempDir::new().expect("temp dir");
    let path = temp_dir.path().join("session.token");
    let backend = MockBackend::new();
    let token = mint_token("a@b.com", SystemClock.now() + Duration::hours(1));
    backend.reply(LOGIN_PATH, ApiResponse::new(200, format!("\"{token}\"")));

    let build = || {
        GaitClient::new(
            Arc::new(backend.clone()),
            Arc::new(FileTokenStore::new(path.clone())),
            Arc::new(SystemClock),
        )
    };

    let first = build();
    runtime
        .block_on(first.session().login("a@b.com", "x"))
        .expect("login");
    drop(first);

    let second = build();
    assert!(second.session().is_logged_in());
    assert_eq!(
        FileTokenStore::new(path).get().as_deref(),
        Some(token.as_str())
    );
}
