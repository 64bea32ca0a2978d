use crate::transport::{ApiRequest, ApiResponse, HttpTransport, TransportError};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::oneshot;

type Reply = Result<ApiResponse, TransportError>;

enum Scripted {
    Ready(Reply),
    Deferred(oneshot::Receiver<Reply>),
}

#[derive(Default)]
struct MockState {
    replies: HashMap<String, VecDeque<Scripted>>,
    requests: Vec<ApiRequest>,
}

/// In-process backend that answers from a per-path script and records
/// every request it sees.
///
/// Paths with nothing scripted answer 404.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, path: &str, response: ApiResponse) {
        self.push(path, Scripted::Ready(Ok(response)));
    }

    pub fn fail(&self, path: &str, error: TransportError) {
        self.push(path, Scripted::Ready(Err(error)));
    }

    /// Queue a reply that is only delivered once the returned handle says so.
    pub fn defer(&self, path: &str) -> DeferredReply {
        let (tx, rx) = oneshot::channel();
        self.push(path, Scripted::Deferred(rx));
        DeferredReply { tx }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.state.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    fn push(&self, path: &str, scripted: Scripted) {
        self.state
            .lock()
            .replies
            .entry(path.to_string())
            .or_default()
            .push_back(scripted);
    }
}

#[async_trait]
impl HttpTransport for MockBackend {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let path = request.path.split('?').next().unwrap_or_default().to_string();
        let next = {
            let mut state = self.state.lock();
            state.requests.push(request);
            state.replies.get_mut(&path).and_then(VecDeque::pop_front)
        };
        match next {
            Some(Scripted::Ready(reply)) => reply,
            Some(Scripted::Deferred(rx)) => rx.await.unwrap_or_else(|_| {
                Err(TransportError::Request("connection closed".to_string()))
            }),
            None => Ok(ApiResponse::new(404, format!("no route for {path}"))),
        }
    }
}

/// Releases a reply queued with [`MockBackend::defer`].
pub struct DeferredReply {
    tx: oneshot::Sender<Reply>,
}

impl DeferredReply {
    pub fn respond(self, response: ApiResponse) {
        let _ = self.tx.send(Ok(response));
    }
}

/// Build an unsigned token in the backend's compact format.
pub fn mint_token(subject: &str, expires_at: DateTime<Utc>) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = serde_json::json!({
        "sub": subject,
        "iat": Utc::now().timestamp(),
        "exp": expires_at.timestamp(),
    });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    let signature = URL_SAFE_NO_PAD.encode("mock-signature");
    format!("{header}.{payload}.{signature}")
}
