// URL classification: which adapter should handle a URL. No network.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// CDN hosts serving media files directly. `i.imgur.com` is deliberately absent:
/// the Imgur adapter has its own no-network shortcut for it.
const DIRECT_CDN_HOSTS: &[&str] = &[
    "pbs.twimg.com",
    "video.twimg.com",
    "i.redd.it",
    "preview.redd.it",
    "media.giphy.com",
];

const TWITTER_HOSTS: &[&str] = &["twitter.com", "x.com", "fxtwitter.com", "vxtwitter.com"];
const REDDIT_HOSTS: &[&str] = &["reddit.com", "redd.it"];
const IMGUR_HOSTS: &[&str] = &["imgur.com"];

const IMAGE_FORMATS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

static MEDIA_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(jpg|jpeg|png|gif|webp|mp4|webm)$").expect("Failed to compile media path regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    Twitter,
    Reddit,
    Imgur,
    Direct,
    Unknown,
    Invalid,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Twitter => "twitter",
            SourceTag::Reddit => "reddit",
            SourceTag::Imgur => "imgur",
            SourceTag::Direct => "direct",
            SourceTag::Unknown => "unknown",
            SourceTag::Invalid => "invalid",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True if `host` is `domain` or one of its subdomains.
pub fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn host_in(host: &str, domains: &[&str]) -> bool {
    domains.iter().any(|d| host_matches(host, d))
}

/// Classify a raw URL string. Total: every input maps to exactly one tag.
pub fn classify(raw: &str) -> SourceTag {
    let url = match Url::parse(raw.trim()) {
        Ok(u) => u,
        Err(_) => return SourceTag::Invalid,
    };
    classify_url(&url)
}

pub fn classify_url(url: &Url) -> SourceTag {
    let host = url.host_str().unwrap_or_default().to_lowercase();

    if host_in(&host, DIRECT_CDN_HOSTS) {
        return SourceTag::Direct;
    }
    if host_in(&host, TWITTER_HOSTS) {
        return SourceTag::Twitter;
    }
    if host_in(&host, REDDIT_HOSTS) {
        return SourceTag::Reddit;
    }
    if host_in(&host, IMGUR_HOSTS) {
        return SourceTag::Imgur;
    }

    if MEDIA_PATH.is_match(url.path()) || has_image_format_param(url) {
        return SourceTag::Direct;
    }

    SourceTag::Unknown
}

/// Twitter-style `?format=jpg` query parameter.
pub fn has_image_format_param(url: &Url) -> bool {
    url.query_pairs().any(|(key, value)| {
        key == "format" && IMAGE_FORMATS.contains(&value.to_ascii_lowercase().as_str())
    })
}
