use std::{future::Future, pin::Pin};

use axum::http::{HeaderMap, header};
use cookie::Cookie;

use crate::services::cache::CacheError;
use crate::services::session::record::Session;

/// Session lookup result:
/// - `Ok(session)`: record found and decoded
/// - `Err(_)`: anything else (caller must treat as authorization failure)
pub trait SessionStore: Send + Sync {
    // Resolve the session bound to the cookie named `cookie_name`.
    //
    // Must tolerate concurrent calls from many in-flight requests.
    fn load<'a>(
        &'a self,
        headers: &'a HeaderMap,
        cookie_name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Session, SessionError>> + Send + 'a>>;
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session cookie not present")]
    MissingCookie,

    #[error("no session record for cookie")]
    NotFound,

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("session record decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("session lookup timed out")]
    Timeout,
}

/// Extract the value of cookie `name` from all `Cookie` headers.
///
/// First non-empty match wins. Malformed pairs are skipped.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == name && !c.value().is_empty())
        .map(|c| c.value().to_string())
}
