pub mod auth;
pub mod client;
pub mod clock;
pub mod config;
pub mod conversation;
pub mod credential;
pub mod mock;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod transport;

pub use auth::{AuthError, AuthGateway, Registration};
pub use client::GaitClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ApiOrigin, ClientConfig, ConfigError};
pub use conversation::{
    ConversationEntry, ConversationStore, CurrentSlot, FetchError, SendError, SlotOrigin,
};
pub use credential::Credential;
pub use mock::MockBackend;
pub use session::{SessionState, SessionStatus};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, ReqwestTransport};
