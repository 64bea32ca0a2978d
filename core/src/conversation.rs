use crate::clock::Clock;
use crate::session::SessionState;
use crate::transport::{ApiRequest, ApiResponse, HttpTransport};
use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const SEND_PROMPT_PATH: &str = "/client/use-api";
pub const HISTORY_PATH: &str = "/client";

/// One prompt and its answer. The answer is empty only while pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntry {
    pub prompt: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationEntry {
    fn pending(prompt: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            prompt: prompt.to_string(),
            answer: String::new(),
            created_at,
        }
    }

    fn resolve(self, answer: String) -> Self {
        Self { answer, ..self }
    }

    pub fn is_pending(&self) -> bool {
        self.answer.is_empty()
    }
}

// Older backends name the answer `graphqlResponse` and add a `userId`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryRecord {
    prompt: String,
    #[serde(default, alias = "graphqlResponse")]
    answer: String,
    created_at: DateTime<Utc>,
}

impl HistoryRecord {
    fn into_entry(self) -> Option<ConversationEntry> {
        if self.answer.is_empty() {
            return None;
        }
        Some(ConversationEntry {
            prompt: self.prompt,
            answer: self.answer,
            created_at: self.created_at,
        })
    }
}

/// Identity of one prompt submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotOrigin {
    Fresh,
    History,
}

/// What the "current conversation" area shows.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CurrentSlot {
    #[default]
    Empty,
    Pending {
        request: RequestId,
        entry: ConversationEntry,
    },
    Resolved {
        entry: ConversationEntry,
        origin: SlotOrigin,
    },
    Failed {
        entry: ConversationEntry,
        error: SendError,
    },
}

impl CurrentSlot {
    pub fn entry(&self) -> Option<&ConversationEntry> {
        match self {
            Self::Empty => None,
            Self::Pending { entry, .. } | Self::Resolved { entry, .. } | Self::Failed { entry, .. } => {
                Some(entry)
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    fn is_pending_for(&self, request: RequestId) -> bool {
        matches!(self, Self::Pending { request: r, .. } if *r == request)
    }

    /// Loaded from history, so the UI offers "redo" instead of "new question".
    pub fn is_from_history(&self) -> bool {
        matches!(
            self,
            Self::Resolved {
                origin: SlotOrigin::History,
                ..
            }
        )
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("session is not authorized")]
    Unauthorized,
    #[error("could not reach the backend: {0}")]
    Network(String),
    #[error("backend returned an empty answer")]
    EmptyAnswer,
    #[error("superseded by a newer request")]
    Superseded,
    #[error("session ended before the answer arrived")]
    Cancelled,
    #[error("nothing to resend")]
    NothingToResend,
}

impl SendError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::EmptyAnswer)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("not logged in")]
    NotAuthenticated,
    #[error("session is not authorized")]
    Unauthorized,
    #[error("could not reach the backend: {0}")]
    Network(String),
    #[error("history payload could not be decoded: {0}")]
    Decode(String),
    #[error("session ended before history arrived")]
    Cancelled,
}

struct InnerState {
    generation: u64,
    history: Vec<ConversationEntry>,
    history_loaded: bool,
    current: CurrentSlot,
    /// Answers inserted locally this session, tagged with an insert sequence.
    inserted: Vec<(u64, ConversationEntry)>,
    next_insert: u64,
}

/// Optimistic prompt submission plus the user's history.
///
/// Only the most recently issued request may settle the current slot; an
/// older request's answer is dropped on arrival. Once a new session starts,
/// everything held for the previous one is discarded.
#[derive(Clone)]
pub struct ConversationStore {
    inner: Arc<RwLock<InnerState>>,
    slot: Arc<watch::Sender<CurrentSlot>>,
    session: Arc<SessionState>,
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
}

impl ConversationStore {
    pub fn new(
        session: Arc<SessionState>,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (slot, _) = watch::channel(CurrentSlot::Empty);
        Self {
            inner: Arc::new(RwLock::new(InnerState {
                generation: session.generation(),
                history: Vec::new(),
                history_loaded: false,
                current: CurrentSlot::Empty,
                inserted: Vec::new(),
                next_insert: 0,
            })),
            slot: Arc::new(slot),
            session,
            transport,
            clock,
        }
    }

    pub fn current(&self) -> CurrentSlot {
        self.lock().current.clone()
    }

    pub fn history(&self) -> Vec<ConversationEntry> {
        self.lock().history.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CurrentSlot> {
        self.slot.subscribe()
    }

    pub async fn load_history(&self) -> Result<Vec<ConversationEntry>, FetchError> {
        if !self.session.ensure_valid() {
            return Err(FetchError::NotAuthenticated);
        }
        let generation = self.session.generation();
        let inserts_before = self.lock().next_insert;

        let outcome = match self.transport.send(ApiRequest::get(HISTORY_PATH)).await {
            Ok(response) if response.is_success() => {
                serde_json::from_str::<Vec<HistoryRecord>>(&response.body)
                    .map_err(|err| FetchError::Decode(err.to_string()))
            }
            Ok(response) if response.is_unauthorized() => Err(FetchError::Unauthorized),
            Ok(response) => Err(FetchError::Network(status_message(&response))),
            Err(err) => Err(FetchError::Network(err.to_string())),
        };

        if self.session.generation() != generation {
            debug!("dropping history fetched for an earlier session");
            return Err(FetchError::Cancelled);
        }
        let unauthorized = matches!(outcome, Err(FetchError::Unauthorized));
        let result = {
            let mut inner = self.lock();
            match outcome {
                Ok(records) => {
                    let received = records.len();
                    let entries: Vec<_> = records
                        .into_iter()
                        .filter_map(HistoryRecord::into_entry)
                        .collect();
                    if entries.len() != received {
                        debug!(
                            dropped = received - entries.len(),
                            "ignoring history records without an answer"
                        );
                    }
                    let merged = inner.merge_fetched(entries, inserts_before);
                    info!(entries = merged.len(), "history loaded");
                    inner.history = merged.clone();
                    inner.history_loaded = true;
                    Ok(merged)
                }
                Err(err) => {
                    warn!(%err, "history load failed, showing empty history");
                    inner.history.clear();
                    inner.history_loaded = false;
                    Err(err)
                }
            }
        };
        if unauthorized {
            self.session.invalidate();
        }
        result
    }

    /// Load history unless this session already has it.
    pub async fn ensure_history(&self) -> Result<Vec<ConversationEntry>, FetchError> {
        if !self.session.ensure_valid() {
            return Err(FetchError::NotAuthenticated);
        }
        {
            let inner = self.lock();
            if inner.history_loaded {
                return Ok(inner.history.clone());
            }
        }
        self.load_history().await
    }

    pub async fn send_prompt(&self, text: &str) -> Result<ConversationEntry, SendError> {
        if text.trim().is_empty() {
            return Err(SendError::EmptyPrompt);
        }
        if !self.session.ensure_valid() {
            return Err(SendError::Unauthorized);
        }
        let generation = self.session.generation();
        let request = RequestId::new();
        let pending = ConversationEntry::pending(text, self.clock.now());
        {
            let mut inner = self.lock();
            if let CurrentSlot::Pending {
                request: previous, ..
            } = &inner.current
            {
                debug!(%previous, "superseding pending prompt");
            }
            self.publish(
                &mut inner,
                CurrentSlot::Pending {
                    request,
                    entry: pending.clone(),
                },
            );
        }
        debug!(%request, chars = text.chars().count(), "sending prompt");

        let outcome = match self
            .transport
            .send(ApiRequest::post_text(SEND_PROMPT_PATH, text))
            .await
        {
            Ok(response) if response.is_success() && response.body.is_empty() => {
                Err(SendError::EmptyAnswer)
            }
            Ok(response) if response.is_success() => Ok(response.body),
            Ok(response) if response.is_unauthorized() => Err(SendError::Unauthorized),
            Ok(response) => Err(SendError::Network(status_message(&response))),
            Err(err) => Err(SendError::Network(err.to_string())),
        };
        self.settle(generation, request, pending, outcome)
    }

    /// Send the prompt of an entry loaded from history again.
    pub async fn redo(&self) -> Result<ConversationEntry, SendError> {
        let prompt = match self.current() {
            CurrentSlot::Resolved {
                entry,
                origin: SlotOrigin::History,
            } => entry.prompt,
            _ => return Err(SendError::NothingToResend),
        };
        self.send_prompt(&prompt).await
    }

    /// Send the prompt of a failed submission again.
    pub async fn retry(&self) -> Result<ConversationEntry, SendError> {
        let prompt = match self.current() {
            CurrentSlot::Failed { entry, .. } => entry.prompt,
            _ => return Err(SendError::NothingToResend),
        };
        self.send_prompt(&prompt).await
    }

    /// Show a history entry without asking the backend again.
    ///
    /// Returns false when the entry is not in history.
    pub fn select_from_history(&self, entry: &ConversationEntry) -> bool {
        let mut inner = self.lock();
        let Some(found) = inner.history.iter().find(|e| *e == entry).cloned() else {
            return false;
        };
        self.publish(
            &mut inner,
            CurrentSlot::Resolved {
                entry: found,
                origin: SlotOrigin::History,
            },
        );
        true
    }

    /// Remove an entry from the local history. Nothing is sent to the backend.
    pub fn delete_from_history(&self, entry: &ConversationEntry) -> bool {
        let mut inner = self.lock();
        match inner.history.iter().position(|e| e == entry) {
            Some(position) => {
                inner.history.remove(position);
                true
            }
            None => false,
        }
    }

    /// Clear the current slot. A pending answer is dropped when it arrives.
    pub fn new_question(&self) {
        let mut inner = self.lock();
        self.publish(&mut inner, CurrentSlot::Empty);
    }

    /// Forget history and the current slot.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.reset();
        self.publish(&mut inner, CurrentSlot::Empty);
    }

    fn settle(
        &self,
        generation: u64,
        request: RequestId,
        pending: ConversationEntry,
        outcome: Result<String, SendError>,
    ) -> Result<ConversationEntry, SendError> {
        if self.session.generation() != generation {
            debug!(%request, "dropping answer for an earlier session");
            let mut inner = self.lock();
            if inner.current.is_pending_for(request) {
                self.publish(&mut inner, CurrentSlot::Empty);
            }
            return Err(SendError::Cancelled);
        }

        let unauthorized = matches!(outcome, Err(SendError::Unauthorized));
        let result = {
            let mut inner = self.lock();
            if !inner.current.is_pending_for(request) {
                debug!(%request, "dropping stale answer");
                Err(SendError::Superseded)
            } else {
                match outcome {
                    Ok(answer) => {
                        let entry = pending.resolve(answer);
                        inner.record_insert(entry.clone());
                        self.publish(
                            &mut inner,
                            CurrentSlot::Resolved {
                                entry: entry.clone(),
                                origin: SlotOrigin::Fresh,
                            },
                        );
                        Ok(entry)
                    }
                    Err(error) => {
                        warn!(%request, %error, "prompt failed");
                        self.publish(
                            &mut inner,
                            CurrentSlot::Failed {
                                entry: pending,
                                error: error.clone(),
                            },
                        );
                        Err(error)
                    }
                }
            }
        };
        if unauthorized {
            self.session.invalidate();
        }
        result
    }

    fn publish(&self, inner: &mut InnerState, slot: CurrentSlot) {
        inner.current = slot.clone();
        self.slot.send_replace(slot);
    }

    /// Lock the state after syncing it with the current session.
    fn lock(&self) -> RwLockWriteGuard<'_, InnerState> {
        let mut inner = self.inner.write();
        self.sync_generation(&mut inner);
        inner
    }

    /// Discard everything held for an earlier session once a new one is live.
    fn sync_generation(&self, inner: &mut InnerState) {
        let generation = self.session.generation();
        if inner.generation == generation || !self.session.is_logged_in() {
            return;
        }
        debug!(
            from = inner.generation,
            to = generation,
            "new session, dropping conversation state"
        );
        inner.generation = generation;
        inner.reset();
        self.publish(inner, CurrentSlot::Empty);
    }
}

impl InnerState {
    fn reset(&mut self) {
        self.history.clear();
        self.history_loaded = false;
        self.inserted.clear();
    }

    fn record_insert(&mut self, entry: ConversationEntry) {
        self.history.insert(0, entry.clone());
        self.inserted.push((self.next_insert, entry));
        self.next_insert += 1;
    }

    /// Fetched history plus answers confirmed locally after the fetch began
    /// that the backend did not return yet. Local deletions stay deleted.
    fn merge_fetched(
        &self,
        fetched: Vec<ConversationEntry>,
        inserts_before: u64,
    ) -> Vec<ConversationEntry> {
        let mut merged: Vec<_> = self
            .inserted
            .iter()
            .rev()
            .filter(|(seq, _)| *seq >= inserts_before)
            .map(|(_, entry)| entry)
            .filter(|entry| self.history.contains(entry) && !fetched.contains(entry))
            .cloned()
            .collect();
        if !merged.is_empty() {
            debug!(kept = merged.len(), "keeping answers confirmed during history load");
        }
        merged.extend(fetched);
        merged
    }
}

fn status_message(response: &ApiResponse) -> String {
    format!("backend responded with status {}", response.status)
}
