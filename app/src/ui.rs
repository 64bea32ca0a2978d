use gait_core::conversation::{ConversationEntry, CurrentSlot, SendError, SlotOrigin};
use gait_core::Credential;
use gait_core::SessionStatus;

const SNIPPET_CHARS: usize = 20;

/// Shorten a prompt for list views.
pub fn snippet(content: &str) -> String {
    let trimmed = content.trim();
    let mut chars = trimmed.chars();
    let mut acc = String::new();
    for _ in 0..SNIPPET_CHARS {
        if let Some(ch) = chars.next() {
            acc.push(ch);
        } else {
            return trimmed.to_string();
        }
    }
    if chars.next().is_none() {
        return acc;
    }
    acc.push_str("...");
    acc
}

pub fn render_entry(entry: &ConversationEntry) -> String {
    format!(
        "[{}]\n> {}\n{}",
        entry.created_at.format("%Y-%m-%d %H:%M"),
        entry.prompt,
        entry.answer
    )
}

pub fn render_slot(slot: &CurrentSlot) -> String {
    match slot {
        CurrentSlot::Empty => "Ask a question to get started.".to_string(),
        CurrentSlot::Pending { entry, .. } => format!("> {}\n(waiting for an answer...)", entry.prompt),
        CurrentSlot::Resolved { entry, origin } => {
            let hint = match origin {
                SlotOrigin::Fresh => "",
                SlotOrigin::History => "\n(from history, `:redo` to ask again)",
            };
            format!("{}{hint}", render_entry(entry))
        }
        CurrentSlot::Failed { entry, error } => {
            format!("> {}\n{}", entry.prompt, describe_send_error(error))
        }
    }
}

pub fn render_history(history: &[ConversationEntry]) -> String {
    if history.is_empty() {
        return "No history yet.".to_string();
    }
    history
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            format!(
                "{:>3}. {:<23} {}",
                idx + 1,
                snippet(&entry.prompt),
                entry.created_at.format("%Y-%m-%d %H:%M")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_status(status: SessionStatus, credential: Option<&Credential>) -> String {
    match (status, credential) {
        (SessionStatus::Authenticated, Some(credential)) => {
            let who = credential.subject().unwrap_or_else(|| "unknown user".to_string());
            match credential.expiry() {
                Some(expiry) => format!("Logged in as {who} until {}", expiry.to_rfc3339()),
                None => format!("Logged in as {who}"),
            }
        }
        (SessionStatus::Authenticated, None) => "Logged in".to_string(),
        (SessionStatus::Anonymous, _) => "Not logged in. Run `gait login`.".to_string(),
    }
}

pub fn describe_send_error(error: &SendError) -> String {
    match error {
        SendError::Unauthorized => "Your session has ended. Run `gait login` again.".to_string(),
        error if error.is_retryable() => format!("Failed: {error}. `:retry` to try again."),
        error => format!("Failed: {error}."),
    }
}
