use crate::clock::Clock;
use crate::credential::{normalize_token_body, Credential, MalformedToken};
use crate::store::TokenStore;
use crate::transport::{ApiRequest, HttpTransport};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Uniform rejection; the client never says which field was wrong.
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("session token is malformed: {0}")]
    TokenMalformed(MalformedToken),
    #[error("failed to persist session token: {0}")]
    Storage(String),
}

/// Body of a registration request.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub fullname: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
}

impl Registration {
    pub fn new(
        fullname: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            fullname: fullname.into(),
            email: email.into(),
            password: password.into(),
            age: None,
        }
    }

    pub fn with_age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }
}

/// Talks to the backend's auth endpoints and owns every write to the
/// [`TokenStore`].
///
/// `transport` is expected to be the bearer-augmented transport shared with
/// the rest of the client.
#[derive(Clone)]
pub struct AuthGateway {
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
}

impl AuthGateway {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        tokens: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            transport,
            tokens,
            clock,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let request = ApiRequest::post_json(
            LOGIN_PATH,
            json!({ "email": email, "password": password }),
        );
        let response = match self.transport.send(request).await {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                warn!(status = response.status, "login rejected by backend");
                return Err(AuthError::InvalidCredentials);
            }
            Err(err) => {
                warn!(%err, "login request failed");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let credential = Credential::decode(normalize_token_body(&response.body))
            .map_err(|err| {
                warn!(%err, "backend issued an unreadable token");
                AuthError::TokenMalformed(err)
            })?;
        self.tokens
            .set(credential.raw())
            .map_err(|err| AuthError::Storage(format!("{err:#}")))?;
        info!(expires_at = credential.expires_at(), "session token stored");
        Ok(())
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, registration: &Registration) -> Result<(), AuthError> {
        let body =
            serde_json::to_value(registration).map_err(|_| AuthError::InvalidCredentials)?;
        match self
            .transport
            .send(ApiRequest::post_json(REGISTER_PATH, body))
            .await
        {
            Ok(response) if response.is_success() => {
                info!("account registered");
                Ok(())
            }
            Ok(response) => {
                warn!(status = response.status, "registration rejected by backend");
                Err(AuthError::InvalidCredentials)
            }
            Err(err) => {
                warn!(%err, "registration request failed");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Drop the stored token. Local only and idempotent.
    pub fn logout(&self) {
        match self.tokens.clear() {
            Ok(()) => debug!("session token cleared"),
            Err(err) => warn!(error = %format!("{err:#}"), "failed to clear session token"),
        }
    }

    /// The stored credential, if any.
    pub fn credential(&self) -> Result<Option<Credential>, AuthError> {
        match self.tokens.get() {
            None => Ok(None),
            Some(raw) => Credential::decode(&raw)
                .map(Some)
                .map_err(AuthError::TokenMalformed),
        }
    }

    pub fn is_session_valid(&self) -> bool {
        match self.credential() {
            Ok(Some(credential)) => credential.is_valid_at(self.clock.now()),
            Ok(None) => false,
            Err(err) => {
                debug!(%err, "treating stored token as no session");
                false
            }
        }
    }
}
