use std::sync::{Arc, OnceLock};

use log::warn;
use tokio_util::sync::CancellationToken;

use crate::{
    config::ResolverConfig,
    extractors::{self, ExtractorContext, Resolver, ResolverRegistry, VidSrcResolver},
    models::{EmbedTarget, StreamCandidate},
    utils::{
        self,
        key_cache::{Clock, KeyCache, SystemClock},
        Fetch, ReqwestFetch,
    },
};

/// Entry point for the host application: owns the resolver list, the chain
/// resolver and the shared key cache.
pub struct StreamEngine {
    registry: ResolverRegistry,
    chain: VidSrcResolver,
    keys: Arc<KeyCache>,
}

impl StreamEngine {
    pub fn new(config: ResolverConfig) -> anyhow::Result<Self> {
        let client = utils::create_client(&config)?;
        Self::with_fetcher(config, Arc::new(ReqwestFetch::new(client)), Arc::new(SystemClock))
    }

    pub fn with_fetcher(
        config: ResolverConfig,
        fetcher: Arc<dyn Fetch>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let keys = Arc::new(KeyCache::new(&config, fetcher.clone(), clock));
        let ctx = ExtractorContext::new(fetcher, config);

        Ok(Self {
            registry: ResolverRegistry::new(ctx.clone(), keys.clone()),
            chain: VidSrcResolver::new(ctx)?,
            keys,
        })
    }

    pub fn key_cache(&self) -> &KeyCache {
        &self.keys
    }

    pub fn available_resolvers(&self) -> Vec<String> {
        extractors::available_resolvers()
    }

    /// Provider resolvers first, then the chain when the URL is one of its
    /// bases.
    pub async fn resolve_url(&self, url: &str, cancel: &CancellationToken) -> Vec<StreamCandidate> {
        let streams = self.registry.auto_resolve(url, cancel).await;
        if !streams.is_empty() || cancel.is_cancelled() {
            return streams;
        }

        if self.chain.can_handle(url) {
            return self.chain.resolve(url, cancel).await;
        }

        vec![]
    }

    pub async fn resolve_target(
        &self,
        target: &EmbedTarget,
        cancel: &CancellationToken,
    ) -> Vec<StreamCandidate> {
        let url = match target.embed_url.as_deref() {
            Some(url) if self.registry.can_handle(url) => url,
            _ => return self.chain.resolve_target(target, cancel).await,
        };

        let streams = self.registry.auto_resolve(url, cancel).await;
        if !streams.is_empty() || cancel.is_cancelled() {
            return streams;
        }
        if self.chain.can_handle(url) {
            return self.chain.resolve_target(target, cancel).await;
        }

        // provider pages are no chain embeds, only the synthesized ones are tried
        let chain_target = EmbedTarget {
            embed_url: None,
            ..target.clone()
        };
        self.chain.resolve_target(&chain_target, cancel).await
    }

    /// Runs a single resolver picked by name, regardless of `can_handle`.
    pub async fn resolve_with(
        &self,
        name: &str,
        url: &str,
        cancel: &CancellationToken,
    ) -> Vec<StreamCandidate> {
        let resolver = match self.registry.get(name) {
            Some(resolver) => resolver,
            None => {
                warn!("[api] unknown resolver {name}");
                return vec![];
            }
        };

        resolver.resolve(url, cancel).await.unwrap_or_else(|err| {
            warn!("[api] {name} failed for {url}: {err:#}");
            vec![]
        })
    }
}

pub fn default_engine() -> anyhow::Result<&'static StreamEngine> {
    static ENGINE: OnceLock<StreamEngine> = OnceLock::new();

    if let Some(engine) = ENGINE.get() {
        return Ok(engine);
    }

    let engine = StreamEngine::new(ResolverConfig::default())?;
    Ok(ENGINE.get_or_init(|| engine))
}

pub async fn resolve_url(url: String) -> Vec<StreamCandidate> {
    match default_engine() {
        Ok(engine) => engine.resolve_url(&url, &CancellationToken::new()).await,
        Err(err) => {
            warn!("[api] engine unavailable: {err:#}");
            vec![]
        }
    }
}

pub async fn resolve_target(target: EmbedTarget) -> Vec<StreamCandidate> {
    match default_engine() {
        Ok(engine) => engine.resolve_target(&target, &CancellationToken::new()).await,
        Err(err) => {
            warn!("[api] engine unavailable: {err:#}");
            vec![]
        }
    }
}
