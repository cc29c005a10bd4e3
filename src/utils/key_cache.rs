use std::{
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use chrono::{DateTime, Utc};
use log::{info, warn};

use super::{Fetch, FetchRequest};
use crate::config::ResolverConfig;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct CachedKey {
    key: String,
    fetched_at: Option<DateTime<Utc>>,
}

/// Shared decryption key published by a remote plaintext document.
///
/// The key is never empty: it starts as the configured fallback and a failed
/// refresh keeps whatever was cached before.
pub struct KeyCache {
    fetcher: Arc<dyn Fetch>,
    clock: Arc<dyn Clock>,
    url: String,
    ttl: chrono::Duration,
    timeout: Duration,
    state: RwLock<CachedKey>,
}

impl KeyCache {
    pub fn new(config: &ResolverConfig, fetcher: Arc<dyn Fetch>, clock: Arc<dyn Clock>) -> Self {
        Self {
            fetcher,
            clock,
            url: config.key_url.clone(),
            ttl: config.key_ttl(),
            timeout: config.key_timeout(),
            state: RwLock::new(CachedKey {
                key: config.fallback_key.trim().to_owned(),
                fetched_at: None,
            }),
        }
    }

    /// Returns the key without any I/O while it is still fresh.
    pub fn cached_key(&self) -> Option<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let fetched_at = state.fetched_at?;

        if self.clock.now() - fetched_at < self.ttl {
            Some(state.key.clone())
        } else {
            None
        }
    }

    pub async fn get_key(&self) -> String {
        if let Some(key) = self.cached_key() {
            return key;
        }

        match self.load_key().await {
            Ok(key) => {
                info!("[keys] refreshed decryption key");
                let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
                state.key = key.clone();
                state.fetched_at = Some(self.clock.now());
                key
            }
            Err(err) => {
                warn!("[keys] failed to refresh key from {}: {err:#}", self.url);
                self.current_key()
            }
        }
    }

    fn current_key(&self) -> String {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .key
            .clone()
    }

    async fn load_key(&self) -> anyhow::Result<String> {
        let body = self
            .fetcher
            .fetch(FetchRequest::get(&self.url, self.timeout))
            .await?;

        let key = body.trim();
        if key.is_empty() {
            return Err(anyhow::anyhow!("key document is empty"));
        }

        Ok(key.to_owned())
    }
}
