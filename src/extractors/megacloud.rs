use std::sync::{Arc, OnceLock};

use log::{debug, warn};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    models::StreamCandidate,
    utils::{
        fetch_stage, jwp_player, key_cache::KeyCache, payload,
        text::{self, first_match_any},
    },
};

use super::{matches_any_host, ExtractorContext, Resolver};

const TAG: &str = "megacloud";

/// Embed pages that expose a file id and serve their (usually encrypted)
/// sources through an AJAX endpoint.
#[derive(Clone)]
pub struct MegaCloudResolver {
    ctx: ExtractorContext,
    keys: Arc<KeyCache>,
}

#[derive(Deserialize, Debug)]
struct GetSourcesResponse {
    #[serde(default)]
    encrypted: bool,
    #[serde(default)]
    sources: Value,
}

impl MegaCloudResolver {
    pub fn new(ctx: ExtractorContext, keys: Arc<KeyCache>) -> Self {
        Self { ctx, keys }
    }

    fn sources_url(&self, embed_url: &str, id: &str) -> Option<String> {
        let mut url = Url::parse(embed_url)
            .and_then(|base| base.join(&self.ctx.config.megacloud_sources_path))
            .ok()?;
        url.query_pairs_mut().clear().append_pair("id", id);

        Some(url.into())
    }

    async fn load_sources(
        &self,
        res: GetSourcesResponse,
        cancel: &CancellationToken,
    ) -> Vec<Value> {
        if !res.encrypted {
            return match res.sources {
                Value::Array(items) => items,
                _ => vec![],
            };
        }

        match res.sources {
            Value::String(encrypted) => {
                let key = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("[{TAG}] cancelled while loading key");
                        return vec![];
                    }
                    key = self.keys.get_key() => key,
                };
                payload::decode(&encrypted, &key)
            }
            Value::Array(items) => items,
            _ => vec![],
        }
    }
}

impl Resolver for MegaCloudResolver {
    fn can_handle(&self, url: &str) -> bool {
        matches_any_host(url, &self.ctx.config.megacloud_hosts)
    }

    async fn resolve(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<StreamCandidate>> {
        let fetcher = self.ctx.fetcher.as_ref();

        let request = self.ctx.page(url).referer(url);
        let html = match fetch_stage(fetcher, request, cancel, TAG, "embed page").await {
            Some(html) => html,
            None => return Ok(vec![]),
        };

        let id = match extract_file_id(&html) {
            Some(id) => id,
            None => {
                warn!("[{TAG}] no data-id found in {url}");
                return Ok(vec![]);
            }
        };

        let sources_url = match self.sources_url(url, id) {
            Some(sources_url) => sources_url,
            None => {
                warn!("[{TAG}] can't build sources url from {url}");
                return Ok(vec![]);
            }
        };

        let request = self
            .ctx
            .page(&sources_url)
            .referer(url)
            .header("X-Requested-With", "XMLHttpRequest");

        let body = match fetch_stage(fetcher, request, cancel, TAG, "sources api").await {
            Some(body) => body,
            None => return Ok(vec![]),
        };

        let res: GetSourcesResponse = match serde_json::from_str(&body) {
            Ok(res) => res,
            Err(err) => {
                warn!("[{TAG}] unexpected sources response from {sources_url}: {err}");
                return Ok(vec![]);
            }
        };

        let sources = self.load_sources(res, cancel).await;
        if cancel.is_cancelled() {
            return Ok(vec![]);
        }

        let headers = jwp_player::referer_headers(url, text::origin_of(url));

        Ok(jwp_player::to_stream_candidates(sources, Some(headers)))
    }
}

fn extract_file_id(html: &str) -> Option<&str> {
    static QUOTED_ID_RE: OnceLock<Regex> = OnceLock::new();
    static UNQUOTED_ID_RE: OnceLock<Regex> = OnceLock::new();

    first_match_any(
        &[
            QUOTED_ID_RE.get_or_init(|| Regex::new(r#"data-id\s*=\s*["']([^"']+)["']"#).unwrap()),
            UNQUOTED_ID_RE.get_or_init(|| Regex::new(r#"data-id\s*=\s*([\w-]+)"#).unwrap()),
        ],
        html,
    )
}
