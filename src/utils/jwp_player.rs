use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::models::StreamCandidate;

/// One entry of a JW Player style `sources` array.
#[derive(Deserialize, Debug)]
pub struct Source {
    #[serde(alias = "url", default)]
    pub file: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// Maps raw `sources` entries to candidates, silently dropping anything that
/// is not an object with a non-empty `file`.
pub fn to_stream_candidates(
    sources: Vec<Value>,
    headers: Option<HashMap<String, String>>,
) -> Vec<StreamCandidate> {
    sources
        .into_iter()
        .filter_map(|value| serde_json::from_value::<Source>(value).ok())
        .filter(|source| !source.file.trim().is_empty())
        .map(|source| StreamCandidate::new(source.file, source.label, headers.clone()))
        .collect()
}

pub fn referer_headers(referer: &str, origin: Option<String>) -> HashMap<String, String> {
    let mut headers = HashMap::from([("Referer".to_owned(), referer.to_owned())]);
    if let Some(origin) = origin {
        headers.insert("Origin".into(), origin);
    }
    headers
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn should_map_sources_with_labels() {
        let res = to_stream_candidates(
            vec![
                json!({"file": "https://a/1.m3u8", "label": "1080p"}),
                json!({"url": "https://a/2.m3u8"}),
            ],
            None,
        );

        assert_eq!(
            res,
            vec![
                StreamCandidate::new("https://a/1.m3u8", Some("1080p".into()), None),
                StreamCandidate::new("https://a/2.m3u8", Some("auto".into()), None),
            ]
        );
    }

    #[test]
    fn should_drop_malformed_entries() {
        let res = to_stream_candidates(
            vec![
                json!({"file": ""}),
                json!({"label": "720p"}),
                json!("https://a/3.m3u8"),
                json!(42),
                json!({"file": "https://a/4.m3u8", "label": null}),
            ],
            None,
        );

        assert_eq!(res.len(), 1);
        assert_eq!(res[0].url, "https://a/4.m3u8");
        assert_eq!(res[0].quality, "auto");
    }

    #[test]
    fn should_attach_headers_to_every_candidate() {
        let headers = referer_headers("https://e.test/embed/1", Some("https://e.test".into()));
        let res = to_stream_candidates(
            vec![json!({"file": "https://a/1.m3u8"}), json!({"file": "https://a/2.m3u8"})],
            Some(headers.clone()),
        );

        assert!(res.iter().all(|c| c.headers.as_ref() == Some(&headers)));
        assert_eq!(headers.get("Origin").map(String::as_str), Some("https://e.test"));
    }
}
