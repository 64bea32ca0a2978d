use super::{test_runtime, Harness};
use gait::{ChatApp, Flow};
use gait_core::auth::LOGIN_PATH;
use gait_core::conversation::{HISTORY_PATH, SEND_PROMPT_PATH};
use gait_core::{ApiResponse, CurrentSlot, TokenStore};
use std::io::Cursor;
use std::sync::Arc;

const HISTORY_BODY: &str = r#"[
    {"prompt":"What is the capital of France?","answer":"Paris","createdAt":"2025-02-24T14:00:00Z"},
    {"prompt":"And of Spain?","graphqlResponse":"Madrid","createdAt":"2025-02-24T13:00:00Z","userId":7}
]"#;

fn chat(harness: &Harness) -> ChatApp {
    ChatApp::new(harness.client(), Arc::new(test_runtime()))
}

fn output(buffer: Vec<u8>) -> String {
    String::from_utf8(buffer).expect("utf8 output")
}

#[test]
fn login_command_reports_outcome() {
    let harness = Harness::new();
    harness
        .backend
        .reply(LOGIN_PATH, ApiResponse::new(200, harness.token()));
    harness.backend.reply(LOGIN_PATH, ApiResponse::new(401, ""));
    let app = chat(&harness);

    let mut out = Vec::new();
    assert!(app.login("a@b.com", "x", &mut out).unwrap());
    assert!(!app.login("a@b.com", "wrong", &mut out).unwrap());

    let text = output(out);
    assert!(text.contains("Logged in as a@b.com."));
    assert!(text.contains("Login failed."));
    assert!(app.client().session().is_logged_in());
}

#[test]
fn chat_loop_lists_selects_and_redoes_history() {
    let harness = Harness::new().logged_in();
    harness
        .backend
        .reply(HISTORY_PATH, ApiResponse::new(200, HISTORY_BODY));
    harness
        .backend
        .reply(SEND_PROMPT_PATH, ApiResponse::new(200, "Madrid, still"));
    let app = chat(&harness);

    let input = Cursor::new(":history\n:select 2\n:redo\n:quit\nnever sent\n");
    let mut out = Vec::new();
    app.run_chat(input, &mut out).unwrap();

    let text = output(out);
    assert!(text.contains("  1. What is the capital ..."));
    assert!(text.contains("from history"));
    assert!(text.contains("Madrid, still"));

    let conversations = app.client().conversations();
    let history = conversations.history();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].prompt, "And of Spain?");
    assert_eq!(history[0].answer, "Madrid, still");
    // one history fetch for the session plus the redo
    assert_eq!(harness.backend.request_count(), 2);
}

#[test]
fn delete_and_new_only_touch_local_state() {
    let harness = Harness::new().logged_in();
    harness
        .backend
        .reply(HISTORY_PATH, ApiResponse::new(200, HISTORY_BODY));
    let app = chat(&harness);
    let mut out = Vec::new();
    assert!(app.history(&mut out).unwrap());

    assert_eq!(app.handle_line(":select 1", &mut out).unwrap(), Flow::Continue);
    assert_eq!(app.handle_line(":delete 1", &mut out).unwrap(), Flow::Continue);
    assert_eq!(app.handle_line(":delete 9", &mut out).unwrap(), Flow::Continue);
    assert_eq!(app.handle_line(":new", &mut out).unwrap(), Flow::Continue);

    let conversations = app.client().conversations();
    assert_eq!(conversations.history().len(), 1);
    assert_eq!(conversations.current(), CurrentSlot::Empty);
    assert_eq!(harness.backend.request_count(), 1);
    let text = output(out);
    assert!(text.contains("Removed \"What is the capital ...\"."));
    assert!(text.contains("No history entry 9."));
}

#[test]
fn unauthorized_answer_ends_the_chat() {
    let harness = Harness::new().logged_in();
    harness.backend.reply(HISTORY_PATH, ApiResponse::new(200, "[]"));
    harness
        .backend
        .reply(SEND_PROMPT_PATH, ApiResponse::new(401, ""));
    let app = chat(&harness);

    let input = Cursor::new("hello\nnot reached\n");
    let mut out = Vec::new();
    app.run_chat(input, &mut out).unwrap();

    assert!(output(out).contains("Your session has ended."));
    assert!(!app.client().session().is_logged_in());
    assert_eq!(harness.tokens.get(), None);
    assert_eq!(harness.backend.request_count(), 2);
}

#[test]
fn chat_refuses_to_start_without_a_session() {
    let harness = Harness::new();
    let app = chat(&harness);

    let mut out = Vec::new();
    app.run_chat(Cursor::new("hello\n"), &mut out).unwrap();

    assert!(output(out).contains("Not logged in."));
    assert_eq!(harness.backend.request_count(), 0);
}

#[test]
fn logout_command_clears_everything() {
    let harness = Harness::new().logged_in();
    harness
        .backend
        .reply(HISTORY_PATH, ApiResponse::new(200, HISTORY_BODY));
    let app = chat(&harness);
    let mut out = Vec::new();
    app.history(&mut out).unwrap();

    assert_eq!(app.handle_line(":logout", &mut out).unwrap(), Flow::Quit);

    assert_eq!(harness.tokens.get(), None);
    assert!(app.client().conversations().history().is_empty());
    assert!(output(out).contains("Logged out."));
}
