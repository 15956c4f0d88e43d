mod error;
mod store;
mod types;

pub use error::SessionStoreError;
pub use store::SessionStore;
pub use types::{session_key, ConversationId, DEFAULT_PROVIDER};
