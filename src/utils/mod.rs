pub mod crypto;
pub mod crypto_js;
mod dns_over_https;
pub mod jwp_player;
pub mod key_cache;
pub mod payload;
pub mod text;

#[cfg(test)]
pub mod testing;

use std::{sync::Arc, time::Duration};

use anyhow::anyhow;
use dns_over_https::DoHResolver;
use futures::future::BoxFuture;
use log::{debug, warn};
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    ClientBuilder,
};
use tokio_util::sync::CancellationToken;

use crate::config::ResolverConfig;

pub fn create_client(config: &ResolverConfig) -> anyhow::Result<reqwest::Client> {
    let mut builder = ClientBuilder::new()
        .connect_timeout(Duration::from_secs(5))
        .timeout(config.page_timeout())
        .user_agent(&config.user_agent)
        .cookie_store(true)
        .default_headers(get_default_headers());

    if config.dns_over_https {
        builder = builder.dns_resolver(Arc::new(DoHResolver::default()));
    }

    Ok(builder.build()?)
}

pub fn get_default_headers() -> HeaderMap {
    let mut headers = HeaderMap::default();

    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.5"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::DNT, HeaderValue::from_static("1"));
    headers
}

/// One GET request as the resolvers describe it.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            headers: vec![],
            timeout,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn referer(self, referer: impl Into<String>) -> Self {
        self.header("Referer", referer)
    }
}

/// Text fetching seam shared by every resolver.
pub trait Fetch: Send + Sync {
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'_, anyhow::Result<String>>;
}

pub struct ReqwestFetch {
    client: reqwest::Client,
}

impl ReqwestFetch {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Fetch for ReqwestFetch {
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'_, anyhow::Result<String>> {
        Box::pin(async move {
            let mut builder = self.client.get(&request.url).timeout(request.timeout);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            let res = builder.send().await?;
            let status = res.status();
            if !status.is_success() {
                return Err(anyhow!("unexpected status {status}"));
            }

            Ok(res.text().await?)
        })
    }
}

/// Runs one fetch as a pipeline stage: transport errors and cancellation both
/// come back as `None`.
pub async fn fetch_stage(
    fetcher: &dyn Fetch,
    request: FetchRequest,
    cancel: &CancellationToken,
    tag: &str,
    stage: &str,
) -> Option<String> {
    let url = request.url.clone();
    debug!("[{tag}] {stage}: GET {url}");

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("[{tag}] {stage}: cancelled while fetching {url}");
            None
        }
        res = fetcher.fetch(request) => match res {
            Ok(body) => Some(body),
            Err(err) => {
                warn!("[{tag}] {stage}: fetch {url} failed: {err:#}");
                None
            }
        }
    }
}
