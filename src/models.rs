use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_QUALITY: &str = "auto";

/// A directly playable media URL plus whatever the player needs to fetch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCandidate {
    pub url: String,
    pub quality: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

impl StreamCandidate {
    pub fn new(
        url: impl Into<String>,
        quality: Option<String>,
        headers: Option<HashMap<String, String>>,
    ) -> Self {
        Self {
            url: url.into(),
            quality: quality
                .filter(|q| !q.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_QUALITY.into()),
            headers,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Movie,
    Series,
}

/// Input of a single resolution call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmdb_id: Option<u32>,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
}

impl EmbedTarget {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            embed_url: Some(url.into()),
            imdb_id: None,
            tmdb_id: None,
            content_type: ContentType::Movie,
            season: None,
            episode: None,
        }
    }

    /// IMDb id when known, TMDB id otherwise.
    pub fn content_id(&self) -> Option<String> {
        self.imdb_id
            .as_ref()
            .filter(|id| !id.is_empty())
            .cloned()
            .or_else(|| self.tmdb_id.map(|id| id.to_string()))
    }

    /// Builds the chain-style embed URL for this target under `base`.
    pub fn chain_embed_url(&self, base: &str) -> Option<String> {
        let id = self.content_id()?;
        let base = base.trim_end_matches('/');

        match self.content_type {
            ContentType::Movie => Some(format!("{base}/embed/movie/{id}")),
            ContentType::Series => {
                let s = self.season.unwrap_or(1);
                let e = self.episode.unwrap_or(1);
                Some(format!("{base}/embed/tv/{id}/{s}-{e}"))
            }
        }
    }
}
