mod chat_tests;
mod conversation_tests;
mod session_tests;

use gait_core::mock::{mint_token, MockBackend};
use gait_core::{Clock, GaitClient, ManualClock, MemoryTokenStore, TokenStore};
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;

pub(crate) fn test_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

pub(crate) struct Harness {
    pub backend: MockBackend,
    pub tokens: MemoryTokenStore,
    pub clock: ManualClock,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            backend: MockBackend::new(),
            tokens: MemoryTokenStore::new(),
            clock: ManualClock::new(Utc.with_ymd_and_hms(2025, 2, 24, 15, 0, 0).unwrap()),
        }
    }

    /// A token for `a@b.com` that expires in an hour.
    pub fn token(&self) -> String {
        mint_token("a@b.com", self.clock.now() + Duration::seconds(3600))
    }

    pub fn logged_in(self) -> Self {
        let token = self.token();
        self.tokens.set(&token).expect("seed token");
        self
    }

    /// Build a client the way a freshly started process would.
    pub fn client(&self) -> GaitClient {
        GaitClient::new(
            Arc::new(self.backend.clone()),
            Arc::new(self.tokens.clone()),
            Arc::new(self.clock.clone()),
        )
    }
}
