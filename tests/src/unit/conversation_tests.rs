use super::{test_runtime, Harness};
use gait_core::conversation::{HISTORY_PATH, SEND_PROMPT_PATH};
use gait_core::{ApiResponse, CurrentSlot, SendError, SlotOrigin, TokenStore};

#[test]
fn answered_prompt_is_shown_and_recorded() {
    let runtime = test_runtime();
    let harness = Harness::new().logged_in();
    harness
        .backend
        .reply(SEND_PROMPT_PATH, ApiResponse::new(200, "hi"));
    let client = harness.client();
    let conversations = client.conversations();
    let mut slot = conversations.subscribe();

    let entry = runtime
        .block_on(conversations.send_prompt("hello"))
        .expect("answer");

    assert_eq!((entry.prompt.as_str(), entry.answer.as_str()), ("hello", "hi"));
    assert_eq!(
        *slot.borrow_and_update(),
        CurrentSlot::Resolved {
            entry: entry.clone(),
            origin: SlotOrigin::Fresh,
        }
    );
    assert_eq!(conversations.history().first(), Some(&entry));
}

#[test]
fn every_backend_call_carries_the_stored_token() {
    let runtime = test_runtime();
    let harness = Harness::new().logged_in();
    harness.backend.reply(HISTORY_PATH, ApiResponse::new(200, "[]"));
    harness
        .backend
        .reply(SEND_PROMPT_PATH, ApiResponse::new(200, "hi"));
    let client = harness.client();

    runtime
        .block_on(client.conversations().load_history())
        .expect("history");
    runtime
        .block_on(client.conversations().send_prompt("hello"))
        .expect("answer");

    let expected = harness.tokens.get();
    for request in harness.backend.requests() {
        assert_eq!(request.bearer_token(), expected.as_deref());
    }
}

#[test]
fn authorization_failure_logs_out_and_keeps_history() {
    let runtime = test_runtime();
    let harness = Harness::new().logged_in();
    harness.backend.reply(
        HISTORY_PATH,
        ApiResponse::new(
            200,
            r#"[{"prompt":"earlier","answer":"yes","createdAt":"2025-02-23T10:00:00Z"}]"#,
        ),
    );
    harness
        .backend
        .reply(SEND_PROMPT_PATH, ApiResponse::new(403, ""));
    let client = harness.client();
    let before = runtime
        .block_on(client.conversations().load_history())
        .expect("history");

    let result = runtime.block_on(client.conversations().send_prompt("hello"));

    assert_eq!(result, Err(SendError::Unauthorized));
    assert!(!client.session().is_logged_in());
    assert_eq!(harness.tokens.get(), None);
    assert_eq!(client.conversations().history(), before);
}

#[test]
fn whitespace_prompt_is_ignored() {
    let runtime = test_runtime();
    let harness = Harness::new().logged_in();
    let client = harness.client();

    let result = runtime.block_on(client.conversations().send_prompt("   "));

    assert_eq!(result, Err(SendError::EmptyPrompt));
    assert_eq!(harness.backend.request_count(), 0);
    assert_eq!(client.conversations().current(), CurrentSlot::Empty);
    assert!(client.conversations().history().is_empty());
}

#[test]
fn anonymous_client_never_reaches_the_backend() {
    let runtime = test_runtime();
    let harness = Harness::new();
    let client = harness.client();

    assert_eq!(
        runtime.block_on(client.conversations().send_prompt("hello")),
        Err(SendError::Unauthorized)
    );
    assert!(runtime
        .block_on(client.conversations().load_history())
        .is_err());
    assert_eq!(harness.backend.request_count(), 0);
}

#[test]
fn history_never_holds_unanswered_entries() {
    let runtime = test_runtime();
    let harness = Harness::new().logged_in();
    harness.backend.reply(
        HISTORY_PATH,
        ApiResponse::new(
            200,
            r#"[
                {"prompt":"a","answer":"","createdAt":"2025-02-23T10:00:00Z"},
                {"prompt":"b","answer":"ok","createdAt":"2025-02-22T10:00:00Z"}
            ]"#,
        ),
    );
    harness
        .backend
        .reply(SEND_PROMPT_PATH, ApiResponse::new(200, ""));
    harness
        .backend
        .reply(SEND_PROMPT_PATH, ApiResponse::new(500, "boom"));
    let client = harness.client();
    let conversations = client.conversations();

    runtime.block_on(conversations.load_history()).unwrap();
    let empty_answer = runtime.block_on(conversations.send_prompt("c"));
    let server_error = runtime.block_on(conversations.send_prompt("d"));

    assert_eq!(empty_answer, Err(SendError::EmptyAnswer));
    assert!(matches!(server_error, Err(SendError::Network(_))));
    let history = conversations.history();
    assert_eq!(history.len(), 1);
    assert!(history.iter().all(|entry| !entry.answer.is_empty()));
}
