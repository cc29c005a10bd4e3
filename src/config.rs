use std::time::Duration;

use serde::Deserialize;

const KEYS_URL: &str =
    "https://raw.githubusercontent.com/itzzzme/megacloud-keys/refs/heads/main/key.txt";
const FALLBACK_KEY: &str = "d1a5b3c7e9f2a4b6c8d0e1f3a5b7c9d2e4f6a8b0c1d3e5f7a9b2c4d6e8f0a1b3";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub user_agent: String,
    pub page_timeout_secs: u64,
    pub key_timeout_secs: u64,
    pub key_ttl_secs: i64,
    pub key_url: String,
    pub fallback_key: String,
    pub dns_over_https: bool,

    pub megacloud_hosts: Vec<String>,
    /// Resolved against the embed page URL, the file id goes into the `id` query
    /// parameter.
    pub megacloud_sources_path: String,
    pub upcloud_hosts: Vec<String>,
    pub akcloud_hosts: Vec<String>,

    /// First entry is the primary chain base, the rest are tried in order.
    pub chain_bases: Vec<String>,
    pub chain_player_host: String,
    pub chain_marker: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36 Edg/138.0.0.0".into(),
            page_timeout_secs: 15,
            key_timeout_secs: 5,
            key_ttl_secs: 3600,
            key_url: KEYS_URL.into(),
            fallback_key: FALLBACK_KEY.into(),
            dns_over_https: false,
            megacloud_hosts: vec!["megacloud".into(), "videostr".into()],
            megacloud_sources_path: "/embed-2/ajax/e-1/getSources".into(),
            upcloud_hosts: vec!["upcloud".into()],
            akcloud_hosts: vec!["akcloud".into()],
            chain_bases: vec![
                "https://vidsrc.xyz".into(),
                "https://vidsrc.net".into(),
            ],
            chain_player_host: "cloudnestra.com".into(),
            chain_marker: "prorcp".into(),
        }
    }
}

impl ResolverConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json)?;

        if config.fallback_key.trim().is_empty() {
            return Err(anyhow::anyhow!("fallback_key must not be empty"));
        }

        Ok(config)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn key_timeout(&self) -> Duration {
        Duration::from_secs(self.key_timeout_secs)
    }

    pub fn key_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.key_ttl_secs)
    }
}
