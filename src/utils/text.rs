use std::sync::OnceLock;

use regex::Regex;
use url::Url;

/// First capture group of the first match.
pub fn first_match<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures(text)
        .and_then(|m| m.get(1))
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty())
}

/// Tries the patterns in order, returns the first hit.
pub fn first_match_any<'t>(patterns: &[&Regex], text: &'t str) -> Option<&'t str> {
    patterns.iter().find_map(|re| first_match(re, text))
}

/// First `file: "..."` or `file: '...'` of a player config script.
pub fn extract_file_property(script: &str) -> Option<&str> {
    static FILE_RE: OnceLock<Regex> = OnceLock::new();

    FILE_RE
        .get_or_init(|| Regex::new(r#"\bfile\s*:\s*(?:"([^"]+)"|'([^']+)')"#).unwrap())
        .captures(script)
        .and_then(|m| m.get(1).or_else(|| m.get(2)))
        .map(|m| m.as_str())
}

pub fn to_full_url(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{url}")
    } else {
        url.into()
    }
}

/// Resolves `url` against `base`. Never fails: unresolvable input comes back
/// unchanged.
pub fn to_absolute(url: &str, base: &str) -> String {
    if url.is_empty() {
        return String::new();
    }
    if url.starts_with("//") {
        return to_full_url(url);
    }

    Url::parse(base)
        .and_then(|base| base.join(url))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_owned())
}

/// `scheme://host[:port]` of `url`.
pub fn origin_of(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    match url.origin() {
        origin @ url::Origin::Tuple(..) => Some(origin.ascii_serialization()),
        url::Origin::Opaque(_) => None,
    }
}

pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(|h| h.to_owned())
}
