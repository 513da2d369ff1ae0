use std::{future::Future, pin::Pin, sync::Arc};

use axum::http::HeaderMap;

use crate::services::{
    cache::{CacheClient, ValkeyClient},
    session::{
        record::Session,
        store::{SessionError, SessionStore, cookie_value},
    },
};

/// Cache-backed session store (Valkey in production).
///
/// The cookie value is the session id; the record lives at `<prefix>:<id>` as
/// JSON. Every backend or decode failure is surfaced as `Err` (fail-closed).
#[derive(Clone)]
pub struct CacheSessionStore<C: CacheClient> {
    cache: Arc<C>,
    prefix: String,
}

impl CacheSessionStore<ValkeyClient> {
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, SessionError> {
        let client = ValkeyClient::new(url).await?;
        Ok(Self::new_with_cache(Arc::new(client), prefix))
    }
}

impl<C: CacheClient> CacheSessionStore<C> {
    pub fn new_with_cache(cache: Arc<C>, prefix: impl Into<String>) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
        }
    }

    pub fn key(&self, session_id: &str) -> String {
        format!("{}:{}", self.prefix, session_id)
    }

    pub fn backend_name(&self) -> &'static str {
        self.cache.backend_name()
    }
}

impl<C: CacheClient> SessionStore for CacheSessionStore<C> {
    fn load<'a>(
        &'a self,
        headers: &'a HeaderMap,
        cookie_name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Session, SessionError>> + Send + 'a>> {
        Box::pin(async move {
            let session_id =
                cookie_value(headers, cookie_name).ok_or(SessionError::MissingCookie)?;

            let raw = self
                .cache
                .get_string(&self.key(&session_id))
                .await?
                .ok_or(SessionError::NotFound)?;

            Ok(Session::from_json(&raw)?)
        })
    }
}
