use crate::auth::AuthGateway;
use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::conversation::ConversationStore;
use crate::session::SessionState;
use crate::store::{FileTokenStore, TokenStore};
use crate::transport::{AuthenticatedTransport, HttpTransport, ReqwestTransport};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Everything a front end needs, wired once at startup and shared by handle.
#[derive(Clone)]
pub struct GaitClient {
    session: Arc<SessionState>,
    conversations: ConversationStore,
}

impl GaitClient {
    /// Wire the components over `transport`, which is wrapped so every
    /// request carries the stored token.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        tokens: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let transport: Arc<dyn HttpTransport> =
            Arc::new(AuthenticatedTransport::new(transport, tokens.clone()));
        let gateway = AuthGateway::new(transport.clone(), tokens, clock.clone());
        let session = Arc::new(SessionState::restore(gateway));
        let conversations = ConversationStore::new(session.clone(), transport, clock);
        Self {
            session,
            conversations,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let base_url = config.api.base_url()?;
        let transport = ReqwestTransport::new(base_url.clone())
            .context("failed to build HTTP client")?;
        let tokens = match &config.token_file {
            Some(path) => FileTokenStore::new(path.clone()),
            None => FileTokenStore::default_location(),
        };
        info!(api = %base_url, token_file = %tokens.path().display(), "client configured");
        Ok(Self::new(
            Arc::new(transport),
            Arc::new(tokens),
            Arc::new(SystemClock),
        ))
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }
}
