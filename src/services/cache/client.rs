//! Cache client interface used by higher-level services (session lookup).
use async_trait::async_trait;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-layer errors (transport/command).
///
/// Note:
/// - Kept independent from `AppError`; the session gate treats every variant
///   as a lookup failure (fail-closed).
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    BackendConnection(String),
    #[error("cache command error: {0}")]
    BackendCommand(String),
}

/// A minimal, read-mostly cache interface.
///
/// Session records are written by whatever issues sessions (login flow),
/// so the gate only ever needs `GET`.
///
/// Implementations must be cheap to clone (typically `Arc<...>` inside).
#[async_trait]
pub trait CacheClient: Clone + Send + Sync + 'static {
    // Returns the cache backend name (for logging).
    fn backend_name(&self) -> &'static str;

    // Get UTF-8 string value.
    async fn get_string(&self, key: &str) -> CacheResult<Option<String>>;
}
