use std::sync::OnceLock;

use log::warn;
use regex::Regex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{
    models::StreamCandidate,
    utils::{
        fetch_stage, jwp_player,
        text,
    },
};

use super::{matches_any_host, ExtractorContext, Resolver};

const TAG: &str = "upcloud";

/// Embed pages with the player sources inlined as a JS array literal.
#[derive(Clone)]
pub struct UpCloudResolver {
    ctx: ExtractorContext,
}

impl UpCloudResolver {
    pub fn new(ctx: ExtractorContext) -> Self {
        Self { ctx }
    }
}

impl Resolver for UpCloudResolver {
    fn can_handle(&self, url: &str) -> bool {
        matches_any_host(url, &self.ctx.config.upcloud_hosts)
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

        let literal = match extract_sources_literal(&html) {
            Some(literal) => literal,
            None => {
                warn!("[{TAG}] no sources array found in {url}");
                return Ok(vec![]);
            }
        };

        // the page owns this literal, a parse failure means the format changed
        let sources: Vec<Value> = serde_json::from_str(literal)?;
        let headers = jwp_player::referer_headers(url, text::origin_of(url));

        Ok(jwp_player::to_stream_candidates(sources, Some(headers)))
    }
}

fn extract_sources_literal(html: &str) -> Option<&str> {
    static SOURCES_RE: OnceLock<Regex> = OnceLock::new();

    let start = SOURCES_RE
        .get_or_init(|| Regex::new(r"sources\s*:\s*\[").unwrap())
        .find(html)?
        .end()
        - 1;
    let end = closing_bracket(&html[start..])?;

    Some(&html[start..=start + end])
}

/// Byte offset of the `]` closing the array that opens `literal`, ignoring
/// brackets inside string literals.
fn closing_bracket(literal: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote = None;
    let mut escaped = false;

    for (i, c) in literal.char_indices() {
        if let Some(q) = quote {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                _ if c == q => quote = None,
                _ => {}
            }
            continue;
        }

        match c {
            '"' | '\'' => quote = Some(c),
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}
