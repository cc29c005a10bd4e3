mod akcloud;
mod megacloud;
mod upcloud;
pub mod vidsrc;

pub use akcloud::AKCloudResolver;
pub use megacloud::MegaCloudResolver;
pub use upcloud::UpCloudResolver;
pub use vidsrc::VidSrcResolver;

use std::sync::Arc;

use enum_dispatch::enum_dispatch;
use log::{debug, warn};
use strum::VariantNames;
use strum_macros::{IntoStaticStr, VariantNames};
use tokio_util::sync::CancellationToken;

use crate::{
    config::ResolverConfig,
    models::StreamCandidate,
    utils::{key_cache::KeyCache, Fetch, FetchRequest},
};

/// Everything a resolver needs from the host application.
#[derive(Clone)]
pub struct ExtractorContext {
    pub fetcher: Arc<dyn Fetch>,
    pub config: Arc<ResolverConfig>,
}

impl ExtractorContext {
    pub fn new(fetcher: Arc<dyn Fetch>, config: Arc<ResolverConfig>) -> Self {
        Self { fetcher, config }
    }

    /// Page GET with the desktop user agent and the page timeout.
    pub fn page(&self, url: &str) -> FetchRequest {
        FetchRequest::get(url, self.config.page_timeout())
            .header("User-Agent", self.config.user_agent.as_str())
    }
}

fn matches_any_host(url: &str, hosts: &[String]) -> bool {
    hosts.iter().any(|host| !host.is_empty() && url.contains(host.as_str()))
}

#[allow(async_fn_in_trait)]
#[enum_dispatch]
pub trait Resolver {
    fn can_handle(&self, url: &str) -> bool;
    async fn resolve(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<StreamCandidate>>;
}

#[enum_dispatch(Resolver)]
#[derive(Clone, IntoStaticStr, VariantNames)]
pub enum AllResolvers {
    #[strum(serialize = "MegaCloud")]
    MegaCloudResolver,
    #[strum(serialize = "UpCloud")]
    UpCloudResolver,
    #[strum(serialize = "AKCloud")]
    AKCloudResolver,
}

pub fn available_resolvers() -> Vec<String> {
    AllResolvers::VARIANTS.iter().map(|&s| s.to_owned()).collect()
}

/// Ordered resolver list. The first resolver that both claims a URL and
/// produces streams wins.
pub struct ResolverRegistry {
    resolvers: Vec<AllResolvers>,
}

impl ResolverRegistry {
    pub fn new(ctx: ExtractorContext, keys: Arc<KeyCache>) -> Self {
        let megacloud = MegaCloudResolver::new(ctx.clone(), keys);

        Self::from_resolvers(vec![
            megacloud.clone().into(),
            UpCloudResolver::new(ctx.clone()).into(),
            AKCloudResolver::new(ctx, megacloud).into(),
        ])
    }

    pub fn from_resolvers(resolvers: Vec<AllResolvers>) -> Self {
        Self { resolvers }
    }

    pub fn get(&self, name: &str) -> Option<&AllResolvers> {
        self.resolvers
            .iter()
            .find(|r| <&'static str>::from(*r).eq_ignore_ascii_case(name))
    }

    pub fn can_handle(&self, url: &str) -> bool {
        self.resolvers.iter().any(|r| r.can_handle(url))
    }

    pub async fn auto_resolve(&self, url: &str, cancel: &CancellationToken) -> Vec<StreamCandidate> {
        for resolver in self.resolvers.iter().filter(|r| r.can_handle(url)) {
            if cancel.is_cancelled() {
                break;
            }

            let name: &'static str = resolver.into();
            match resolver.resolve(url, cancel).await {
                Ok(streams) if !streams.is_empty() => return streams,
                Ok(_) => debug!("[registry] {name} found no streams for {url}"),
                Err(err) => warn!("[registry] {name} failed for {url}: {err:#}"),
            }
        }

        vec![]
    }
}
