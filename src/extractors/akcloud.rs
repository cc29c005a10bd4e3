use std::sync::OnceLock;

use log::warn;
use scraper::Selector;
use tokio_util::sync::CancellationToken;

use crate::{
    models::StreamCandidate,
    utils::{fetch_stage, text},
};

use super::{matches_any_host, ExtractorContext, MegaCloudResolver, Resolver};

const TAG: &str = "akcloud";

/// Wrapper pages that only iframe a MegaCloud player.
#[derive(Clone)]
pub struct AKCloudResolver {
    ctx: ExtractorContext,
    megacloud: MegaCloudResolver,
}

impl AKCloudResolver {
    pub fn new(ctx: ExtractorContext, megacloud: MegaCloudResolver) -> Self {
        Self { ctx, megacloud }
    }
}

impl Resolver for AKCloudResolver {
    fn can_handle(&self, url: &str) -> bool {
        matches_any_host(url, &self.ctx.config.akcloud_hosts)
    }

    async fn resolve(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<StreamCandidate>> {
        let request = self.ctx.page(url).referer(url);
        let html = match fetch_stage(self.ctx.fetcher.as_ref(), request, cancel, TAG, "embed page")
            .await
        {
            Some(html) => html,
            None => return Ok(vec![]),
        };

        let iframe_url = match extract_iframe_src(&html) {
            Some(src) => text::to_absolute(&src, url),
            None => {
                warn!("[{TAG}] no iframe found in {url}");
                return Ok(vec![]);
            }
        };

        self.megacloud.resolve(&iframe_url, cancel).await
    }
}

fn extract_iframe_src(html: &str) -> Option<String> {
    static IFRAME_SELECTOR: OnceLock<Selector> = OnceLock::new();

    let document = scraper::Html::parse_document(html);
    document
        .select(IFRAME_SELECTOR.get_or_init(|| Selector::parse("iframe[src]").unwrap()))
        .filter_map(|el| el.attr("src"))
        .map(str::trim)
        .find(|src| !src.is_empty())
        .map(|src| src.to_owned())
}
