//! Three hop iframe chain: embed page -> rcp player -> prorcp player, the last
//! one carrying a templated `file:` value.

use std::sync::OnceLock;

use indexmap::IndexSet;
use log::{debug, warn};
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::{
    models::{EmbedTarget, StreamCandidate},
    utils::{
        fetch_stage, jwp_player,
        text::{self, first_match_any},
    },
};

use super::ExtractorContext;

const TAG: &str = "vidsrc";

struct HopResult {
    url: String,
    body: String,
}

pub struct VidSrcResolver {
    ctx: ExtractorContext,
    player_iframe_re: Regex,
    player_path_re: Regex,
    nested_single_re: Regex,
    nested_double_re: Regex,
}

impl VidSrcResolver {
    pub fn new(ctx: ExtractorContext) -> anyhow::Result<Self> {
        let host = regex::escape(&ctx.config.chain_player_host);
        let marker = regex::escape(&ctx.config.chain_marker);

        Ok(Self {
            player_iframe_re: Regex::new(
                r#"id\s*=\s*["']player_iframe["'][^>]*?\ssrc\s*=\s*["']([^"']+)["']"#,
            )?,
            player_path_re: Regex::new(&format!(r#"(//[^"'\s<>]*{host}/rcp/[^"'\s<>]+)"#))?,
            nested_single_re: Regex::new(&format!(r#"'([^'\s]*/{marker}/[^'\s]*)'"#))?,
            nested_double_re: Regex::new(&format!(r#""([^"\s]*/{marker}/[^"\s]*)""#))?,
            ctx,
        })
    }

    /// Whether `url` points at one of the configured chain bases.
    pub fn can_handle(&self, url: &str) -> bool {
        let host = match text::host_of(url) {
            Some(host) => host,
            None => return false,
        };

        self.ctx
            .config
            .chain_bases
            .iter()
            .filter_map(|base| text::host_of(base))
            .any(|base_host| base_host == host)
    }

    /// Embed URLs to try for `target`, in order, without duplicates.
    pub fn candidate_urls(&self, target: &EmbedTarget) -> Vec<String> {
        let mut urls = IndexSet::new();

        if let Some(url) = target.embed_url.as_ref().filter(|u| !u.is_empty()) {
            urls.insert(url.clone());
        }

        for base in &self.ctx.config.chain_bases {
            if let Some(url) = target.chain_embed_url(base) {
                urls.insert(url);
            }
        }

        urls.into_iter().collect()
    }

    pub async fn resolve_target(
        &self,
        target: &EmbedTarget,
        cancel: &CancellationToken,
    ) -> Vec<StreamCandidate> {
        for url in self.candidate_urls(target) {
            if cancel.is_cancelled() {
                break;
            }

            let streams = self.resolve(&url, cancel).await;
            if !streams.is_empty() {
                return streams;
            }
            debug!("[{TAG}] no streams from candidate {url}");
        }

        vec![]
    }

    pub async fn resolve(
        &self,
        embed_url: &str,
        cancel: &CancellationToken,
    ) -> Vec<StreamCandidate> {
        let (player_url, urls) = match self.walk(embed_url, cancel).await {
            Some(res) => res,
            None => return vec![],
        };

        let origin = text::origin_of(&player_url);
        let referer = origin
            .as_deref()
            .map(|origin| format!("{origin}/"))
            .unwrap_or_else(|| player_url.clone());
        let headers = jwp_player::referer_headers(&referer, origin);

        urls.into_iter()
            .map(|url| StreamCandidate::new(url, None, Some(headers.clone())))
            .collect()
    }

    /// Media URLs found at the end of the chain.
    pub async fn resolve_urls(
        &self,
        embed_url: &str,
        cancel: &CancellationToken,
    ) -> IndexSet<String> {
        self.walk(embed_url, cancel)
            .await
            .map(|(_, urls)| urls)
            .unwrap_or_default()
    }

    async fn walk(
        &self,
        embed_url: &str,
        cancel: &CancellationToken,
    ) -> Option<(String, IndexSet<String>)> {
        let embed = self.hop(embed_url, embed_url, cancel, "embed page").await?;

        let player_patterns = [&self.player_iframe_re, &self.player_path_re];
        let rcp_url = match first_match_any(&player_patterns, &embed.body) {
            Some(src) => text::to_absolute(src, &embed.url),
            None => {
                warn!("[{TAG}] embed page: no player iframe in {embed_url}");
                return None;
            }
        };

        let rcp = self.hop(&rcp_url, embed_url, cancel, "rcp player").await?;

        let nested_patterns = [&self.nested_single_re, &self.nested_double_re];
        let prorcp_url = match first_match_any(&nested_patterns, &rcp.body) {
            Some(path) => text::to_absolute(path, &rcp.url),
            None => {
                let marker = &self.ctx.config.chain_marker;
                warn!("[{TAG}] rcp player: no {marker} path in {}", rcp.url);
                return None;
            }
        };

        let prorcp = self.hop(&prorcp_url, &rcp.url, cancel, "prorcp player").await?;

        let file = match text::extract_file_property(&prorcp.body) {
            Some(file) => file,
            None => {
                warn!("[{TAG}] prorcp player: no file property in {}", prorcp.url);
                return None;
            }
        };

        let rcp_host = text::host_of(&rcp.url).unwrap_or_default();
        let urls = expand_file_value(file, &rcp_host, &prorcp.url);

        Some((prorcp.url, urls))
    }

    async fn hop(
        &self,
        url: &str,
        referer: &str,
        cancel: &CancellationToken,
        stage: &str,
    ) -> Option<HopResult> {
        let request = self.ctx.page(url).referer(referer);
        let body = fetch_stage(self.ctx.fetcher.as_ref(), request, cancel, TAG, stage).await?;

        Some(HopResult {
            url: url.to_owned(),
            body,
        })
    }
}

/// Substitutes every `{vN}` with `host`, splits `" or "` alternatives and
/// resolves each against `base`.
fn expand_file_value(file: &str, host: &str, base: &str) -> IndexSet<String> {
    static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();
    static SEPARATOR_RE: OnceLock<Regex> = OnceLock::new();

    let file = PLACEHOLDER_RE
        .get_or_init(|| Regex::new(r"\{v\d+\}").unwrap())
        .replace_all(file, regex::NoExpand(host));

    SEPARATOR_RE
        .get_or_init(|| Regex::new(r"(?i) or ").unwrap())
        .split(&file)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| text::to_absolute(s, base))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::ResolverConfig, models::ContentType, utils::testing::FakeFetch};

    const EMBED_URL: &str = "https://vidsrc.xyz/embed/movie/tt0111161";
    const RCP_URL: &str = "https://cloudnestra.com/rcp/abc";
    const PRORCP_URL: &str = "https://cloudnestra.com/prorcp/xyz";

    const EMBED_HTML: &str = r#"<iframe id="player_iframe" src="//cloudnestra.com/rcp/abc" frameborder="0"></iframe>"#;
    const RCP_HTML: &str = r#"<script>$('#the_frame').html($('<iframe>', {src: 'https://cloudnestra.com/prorcp/xyz', frameborder: 0}));</script>"#;
    const PRORCP_HTML: &str = r#"<script>var player = new Playerjs({id:"player_parent", file: "https://edge-{v1}.example.com/a.m3u8 or https://edge-{v1}.example.com/b.m3u8"});</script>"#;

    fn create_resolver(fake: &FakeFetch) -> VidSrcResolver {
        let ctx = ExtractorContext::new(Arc::new(fake.clone()), Arc::new(ResolverConfig::default()));
        VidSrcResolver::new(ctx).unwrap()
    }

    fn chain_fake() -> FakeFetch {
        FakeFetch::default()
            .with_page(EMBED_URL, EMBED_HTML)
            .with_page(RCP_URL, RCP_HTML)
            .with_page(PRORCP_URL, PRORCP_HTML)
    }

    #[test]
    fn should_expand_placeholders_and_alternatives() {
        let urls = expand_file_value(
            "https://e-{v1}.t/a.m3u8 OR https://e-{v2}.t/a.m3u8 or  or https://e-{v1}.t/a.m3u8",
            "h.net",
            "https://cloudnestra.com/prorcp/xyz",
        );

        assert_eq!(
            urls.into_iter().collect::<Vec<_>>(),
            vec!["https://e-h.net.t/a.m3u8".to_string()]
        );
    }

    #[test]
    fn should_keep_value_without_placeholder_or_separator() {
        let urls = expand_file_value(
            "/hls/master.m3u8",
            "h.net",
            "https://cloudnestra.com/prorcp/xyz",
        );

        assert_eq!(
            urls.into_iter().collect::<Vec<_>>(),
            vec!["https://cloudnestra.com/hls/master.m3u8".to_string()]
        );
    }

    #[test]
    fn should_not_split_inside_words() {
        let urls = expand_file_value("https://a.t/editor/x.m3u8", "h", "https://b.t/");
        assert_eq!(urls.len(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn should_walk_the_whole_chain() {
        let fake = chain_fake();
        let resolver = create_resolver(&fake);

        let urls = resolver.resolve_urls(EMBED_URL, &CancellationToken::new()).await;

        assert_eq!(
            urls.into_iter().collect::<Vec<_>>(),
            vec![
                "https://edge-cloudnestra.com.example.com/a.m3u8".to_string(),
                "https://edge-cloudnestra.com.example.com/b.m3u8".to_string(),
            ]
        );
        assert_eq!(fake.requested_urls(), vec![EMBED_URL, RCP_URL, PRORCP_URL]);

        let requests = fake.requests();
        assert!(requests[0].headers.contains(&("Referer".into(), EMBED_URL.into())));
        assert!(requests[1].headers.contains(&("Referer".into(), EMBED_URL.into())));
        assert!(requests[2].headers.contains(&("Referer".into(), RCP_URL.into())));
    }

    #[test_log::test(tokio::test)]
    async fn should_map_chain_urls_to_candidates() {
        let fake = chain_fake();
        let resolver = create_resolver(&fake);

        let res = resolver.resolve(EMBED_URL, &CancellationToken::new()).await;

        assert_eq!(res.len(), 2);
        assert!(res.iter().all(|c| c.quality == "auto"));
        let headers = res[0].headers.as_ref().unwrap();
        assert_eq!(headers["Referer"], "https://cloudnestra.com/");
        assert_eq!(headers["Origin"], "https://cloudnestra.com");
    }

    #[test_log::test(tokio::test)]
    async fn should_find_protocol_relative_player_path() {
        let fake = chain_fake().with_page(
            EMBED_URL,
            r#"<script>var base = "//cloudnestra.com/rcp/abc";</script>"#,
        );
        let resolver = create_resolver(&fake);

        let urls = resolver.resolve_urls(EMBED_URL, &CancellationToken::new()).await;

        assert_eq!(urls.len(), 2);
    }

    #[test_log::test(tokio::test)]
    async fn should_accept_double_quoted_relative_paths() {
        let fake = chain_fake()
            .with_page(RCP_URL, r#"<script>loadIframe({src: "/prorcp/xyz"});</script>"#)
            .with_page(PRORCP_URL, "<script>var o = {file: '/hls/a.m3u8'};</script>");
        let resolver = create_resolver(&fake);

        let urls = resolver.resolve_urls(EMBED_URL, &CancellationToken::new()).await;

        assert_eq!(
            urls.into_iter().collect::<Vec<_>>(),
            vec!["https://cloudnestra.com/hls/a.m3u8".to_string()]
        );
    }

    #[test_log::test(tokio::test)]
    async fn should_stop_when_embed_page_has_no_player() {
        let fake = chain_fake().with_page(EMBED_URL, "<html>nothing here</html>");
        let resolver = create_resolver(&fake);

        let urls = resolver.resolve_urls(EMBED_URL, &CancellationToken::new()).await;

        assert!(urls.is_empty());
        assert_eq!(fake.requested_urls(), vec![EMBED_URL]);
    }

    #[test_log::test(tokio::test)]
    async fn should_stop_when_player_page_has_no_marker() {
        let fake = chain_fake().with_page(RCP_URL, "<html>captcha</html>");
        let resolver = create_resolver(&fake);

        assert!(resolver.resolve(EMBED_URL, &CancellationToken::new()).await.is_empty());
        assert_eq!(fake.requested_urls(), vec![EMBED_URL, RCP_URL]);
    }

    #[test_log::test(tokio::test)]
    async fn should_stop_when_final_page_has_no_file() {
        let fake = chain_fake().with_page(PRORCP_URL, "<html></html>");
        let resolver = create_resolver(&fake);

        assert!(resolver.resolve(EMBED_URL, &CancellationToken::new()).await.is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn should_treat_failed_hop_as_empty() {
        let fake = chain_fake().with_error(RCP_URL, "timeout");
        let resolver = create_resolver(&fake);

        assert!(resolver.resolve(EMBED_URL, &CancellationToken::new()).await.is_empty());
        assert_eq!(fake.count(PRORCP_URL), 0);
    }

    #[test_log::test(tokio::test)]
    async fn should_fall_back_to_alternate_base() {
        let alternate = "https://vidsrc.net/embed/movie/tt0111161";
        let fake = FakeFetch::default()
            .with_page(EMBED_URL, "<html>removed</html>")
            .with_page(alternate, EMBED_HTML)
            .with_page(RCP_URL, RCP_HTML)
            .with_page(PRORCP_URL, PRORCP_HTML);
        let resolver = create_resolver(&fake);
        let target = EmbedTarget {
            embed_url: None,
            imdb_id: Some("tt0111161".into()),
            tmdb_id: None,
            content_type: ContentType::Movie,
            season: None,
            episode: None,
        };

        let res = resolver.resolve_target(&target, &CancellationToken::new()).await;

        assert_eq!(res.len(), 2);
        assert_eq!(fake.requested_urls()[..2], [EMBED_URL, alternate]);
    }

    #[test]
    fn should_build_candidates_without_duplicates() {
        let resolver = create_resolver(&FakeFetch::default());
        let mut target = EmbedTarget::from_url(EMBED_URL);
        target.imdb_id = Some("tt0111161".into());

        assert_eq!(
            resolver.candidate_urls(&target),
            vec![EMBED_URL, "https://vidsrc.net/embed/movie/tt0111161"]
        );
    }

    #[test]
    fn should_claim_chain_bases_only() {
        let resolver = create_resolver(&FakeFetch::default());

        assert!(resolver.can_handle(EMBED_URL));
        assert!(resolver.can_handle("https://vidsrc.net/embed/tv/tt0944947/1-1"));
        assert!(!resolver.can_handle("https://megacloud.tv/embed-2/e-1/x"));
    }

    #[test_log::test(tokio::test)]
    async fn should_return_empty_when_cancelled() {
        let fake = chain_fake();
        let resolver = create_resolver(&fake);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(resolver.resolve(EMBED_URL, &cancel).await.is_empty());
        assert!(fake.requests().is_empty());
    }
}
