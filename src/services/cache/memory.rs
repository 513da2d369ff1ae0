use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::services::cache::client::{CacheClient, CacheResult};

/// Process-local cache client.
///
/// Used when no `VALKEY_URL` is configured (local development) and by tests
/// to seed session records.
#[derive(Clone, Debug, Default)]
pub struct MemoryClient {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.write().await.insert(key.into(), value.into());
    }
}

#[async_trait]
impl CacheClient for MemoryClient {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }
}
