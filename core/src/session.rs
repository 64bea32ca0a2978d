use crate::auth::{AuthError, AuthGateway, Registration};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Anonymous,
    Authenticated,
}

/// Process-wide "are we logged in" state.
///
/// The flag is only ever changed by the transition methods below. Every
/// transition bumps [`SessionState::generation`], which in-flight work
/// compares against to discard results that belong to an earlier session.
pub struct SessionState {
    gateway: AuthGateway,
    status: watch::Sender<SessionStatus>,
    generation: AtomicU64,
}

impl SessionState {
    /// Derive the initial status from whatever token is already stored.
    pub fn restore(gateway: AuthGateway) -> Self {
        let initial = if gateway.is_session_valid() {
            SessionStatus::Authenticated
        } else {
            SessionStatus::Anonymous
        };
        info!(status = ?initial, "session restored");
        let (status, _) = watch::channel(initial);
        Self {
            gateway,
            status,
            generation: AtomicU64::new(0),
        }
    }

    pub fn gateway(&self) -> &AuthGateway {
        &self.gateway
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    pub fn is_logged_in(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), AuthError> {
        self.gateway.login(email, password).await?;
        self.transition(SessionStatus::Authenticated);
        Ok(())
    }

    /// Registration never changes the session.
    pub async fn register(&self, registration: &Registration) -> Result<(), AuthError> {
        self.gateway.register(registration).await
    }

    pub fn logout(&self) {
        self.gateway.logout();
        self.transition(SessionStatus::Anonymous);
    }

    /// The backend refused our token.
    pub fn invalidate(&self) {
        warn!("backend rejected the session token, logging out");
        self.gateway.logout();
        self.transition(SessionStatus::Anonymous);
    }

    /// Re-check the stored token before a privileged call.
    ///
    /// Demotes to anonymous when the token has expired or gone missing.
    pub fn ensure_valid(&self) -> bool {
        if !self.is_logged_in() {
            return false;
        }
        if self.gateway.is_session_valid() {
            return true;
        }
        info!("session token expired");
        self.gateway.logout();
        self.transition(SessionStatus::Anonymous);
        false
    }

    fn transition(&self, next: SessionStatus) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let changed = self.status.send_if_modified(|status| {
            let changed = *status != next;
            *status = next;
            changed
        });
        if changed {
            info!(status = ?next, generation, "session transition");
        }
    }
}
