pub mod cache_store;
pub mod record;
pub mod store;

pub use cache_store::CacheSessionStore;
pub use record::{Session, SessionValue, is_authenticated, session_owner_matches};
pub use store::{SessionError, SessionStore};
