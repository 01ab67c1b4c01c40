use super::{
    decode_html_entities, fetch_json, fetch_text, run_chain, SourceAdapter, Strategy,
    StrategyResult, DIRECT_ADDRESS_HINT,
};
use crate::{errors::ExtractError, http::HttpClient, media::RawMedia};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use url::{form_urlencoded::byte_serialize, Url};

const FXTWITTER_API: &str = "https://api.fxtwitter.com";
const OEMBED_ENDPOINT: &str = "https://publish.twitter.com/oembed";
const TEXT_PREVIEW_CHARS: usize = 100;
/// Tried in order. Keep in sync with the validator's allow-list.
const NITTER_INSTANCES: &[&str] = &["nitter.net", "nitter.poast.org", "nitter.privacydev.net"];

const EXHAUSTED_REASON: &str = "Twitter extraction failed. Twitter blocks programmatic video retrieval \
and has restricted API access. Right-click the image or video, choose Copy image/video address";

static STATUS_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"status/(\d+)").expect("Failed to compile status id regex"));

static HANDLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:twitter\.com|x\.com)/([^/?#]+)/status")
        .expect("Failed to compile handle regex")
});

static PBS_MEDIA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https://pbs\.twimg\.com/media/[^"'\s<>]+"#)
        .expect("Failed to compile pbs media regex")
});

static NITTER_PIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"/pic/[^"'\s<>]+"#).expect("Failed to compile nitter pic regex"));

/// What the Twitter strategies need to know about a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TweetRef {
    pub id: String,
    pub handle: Option<String>,
    pub url: String,
}

impl TweetRef {
    pub fn parse(url: &str) -> Option<Self> {
        let id = STATUS_ID.captures(url)?.get(1)?.as_str().to_string();
        let handle = HANDLE
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());

        Some(Self {
            id,
            handle,
            url: url.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct FxResponse {
    code: Option<u16>,
    tweet: Option<FxTweet>,
}

#[derive(Debug, Deserialize)]
struct FxTweet {
    text: Option<String>,
    author: Option<FxAuthor>,
    media: Option<FxMedia>,
}

#[derive(Debug, Deserialize)]
struct FxAuthor {
    screen_name: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FxMedia {
    #[serde(default)]
    photos: Vec<FxPhoto>,
    #[serde(default)]
    videos: Vec<FxVideo>,
    #[serde(default)]
    all: Vec<FxAny>,
}

#[derive(Debug, Deserialize)]
struct FxPhoto {
    url: String,
    width: Option<u64>,
    height: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FxVideo {
    url: String,
    thumbnail_url: Option<String>,
    duration: Option<f64>,
    width: Option<u64>,
    height: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FxAny {
    url: String,
    #[serde(rename = "type")]
    media_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OembedResponse {
    html: Option<String>,
    author_name: Option<String>,
    author_url: Option<String>,
}

/// fxtwitter JSON mirror keyed by handle and status id.
pub struct FxTwitter;

impl FxTwitter {
    fn api_url(tweet: &TweetRef) -> String {
        let handle = tweet.handle.as_deref().unwrap_or("i");
        format!("{FXTWITTER_API}/{handle}/status/{}", tweet.id)
    }

    fn parse(value: serde_json::Value, tweet: &TweetRef) -> StrategyResult {
        let resp: FxResponse = serde_json::from_value(value)
            .map_err(|e| ExtractError::UpstreamUnavailable(format!("unexpected fxtwitter payload: {e}")))?;

        let data = match resp.tweet {
            Some(t) if resp.code != Some(404) => t,
            _ => {
                return Err(ExtractError::UpstreamUnavailable(
                    "Tweet not found or is private".into(),
                ))
            }
        };

        let author = data.author.as_ref().and_then(|a| a.screen_name.clone());
        let author_name = data.author.as_ref().and_then(|a| a.name.clone());
        let text: Option<String> = data
            .text
            .as_ref()
            .map(|t| t.chars().take(TEXT_PREVIEW_CHARS).collect());
        let media = data.media.unwrap_or_default();

        let mut results = Vec::new();

        for photo in media.photos {
            results.push(
                RawMedia::new(photo.url, "image")
                    .with("source", "fxtwitter")
                    .with("tweetId", tweet.id.as_str())
                    .with("author", author.clone())
                    .with("authorName", author_name.clone())
                    .with("text", text.clone())
                    .with("width", photo.width)
                    .with("height", photo.height),
            );
        }

        for video in media.videos {
            results.push(
                RawMedia::new(video.url, "video")
                    .with_thumbnail(video.thumbnail_url)
                    .with("source", "fxtwitter")
                    .with("tweetId", tweet.id.as_str())
                    .with("author", author.clone())
                    .with("authorName", author_name.clone())
                    .with("duration", video.duration)
                    .with("width", video.width)
                    .with("height", video.height),
            );
        }

        if results.is_empty() {
            for item in media.all {
                let kind = match item.media_type.as_deref() {
                    Some("video") => "video",
                    Some("gif") => "gif",
                    _ => "image",
                };
                results.push(
                    RawMedia::new(item.url, kind)
                        .with("source", "fxtwitter")
                        .with("tweetId", tweet.id.as_str()),
                );
            }
        }

        Ok(Some(results))
    }
}

#[async_trait]
impl Strategy<TweetRef> for FxTwitter {
    fn name(&self) -> &'static str {
        "fxtwitter"
    }

    async fn run(&self, client: &dyn HttpClient, tweet: &TweetRef) -> StrategyResult {
        let value = fetch_json(client, &Self::api_url(tweet)).await?;
        Self::parse(value, tweet)
    }
}

/// oEmbed embed HTML scanned for image CDN links. Never yields video.
pub struct Oembed;

impl Oembed {
    fn api_url(tweet: &TweetRef) -> String {
        let encoded: String = byte_serialize(tweet.url.as_bytes()).collect();
        format!("{OEMBED_ENDPOINT}?url={encoded}")
    }

    fn parse(value: serde_json::Value, tweet: &TweetRef) -> StrategyResult {
        let resp: OembedResponse = serde_json::from_value(value)
            .map_err(|e| ExtractError::UpstreamUnavailable(format!("unexpected oEmbed payload: {e}")))?;

        let html = match resp.html {
            Some(h) => h,
            None => return Ok(None),
        };

        let media = PBS_MEDIA
            .find_iter(&html)
            .map(|m| {
                RawMedia::new(decode_html_entities(m.as_str()), "image")
                    .with("source", "oembed")
                    .with("tweetId", tweet.id.as_str())
                    .with("author", resp.author_name.clone())
                    .with("authorUrl", resp.author_url.clone())
            })
            .collect();

        Ok(Some(media))
    }
}

#[async_trait]
impl Strategy<TweetRef> for Oembed {
    fn name(&self) -> &'static str {
        "oembed"
    }

    async fn run(&self, client: &dyn HttpClient, tweet: &TweetRef) -> StrategyResult {
        let value = fetch_json(client, &Self::api_url(tweet)).await?;
        Self::parse(value, tweet)
    }
}

/// Nitter mirror pages, scanned for the `/pic/` proxy paths of the post's images.
pub struct Nitter;

impl Nitter {
    fn page_url(instance: &str, tweet: &TweetRef) -> String {
        let handle = tweet.handle.as_deref().unwrap_or("i");
        format!("https://{instance}/{handle}/status/{}", tweet.id)
    }

    fn parse(html: &str, instance: &str, tweet: &TweetRef) -> Vec<RawMedia> {
        NITTER_PIC
            .find_iter(html)
            .map(|m| decode_html_entities(m.as_str()))
            // avatars are proxied the same way
            .filter(|path| !path.contains("profile_images"))
            .map(|path| {
                RawMedia::new(format!("https://{instance}{path}"), "image")
                    .with("source", "nitter")
                    .with("instance", instance)
                    .with("tweetId", tweet.id.as_str())
            })
            .collect()
    }
}

#[async_trait]
impl Strategy<TweetRef> for Nitter {
    fn name(&self) -> &'static str {
        "nitter"
    }

    async fn run(&self, client: &dyn HttpClient, tweet: &TweetRef) -> StrategyResult {
        let mut last_error = None;

        for instance in NITTER_INSTANCES {
            match fetch_text(client, &Self::page_url(instance, tweet)).await {
                Ok(html) => {
                    let media = Self::parse(&html, instance, tweet);
                    if !media.is_empty() {
                        return Ok(Some(media));
                    }
                    log::debug!("nitter {instance}: no images on page");
                }
                Err(e) => {
                    log::debug!("nitter {instance}: {e}");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }
}

pub struct TwitterAdapter {
    strategies: Vec<Box<dyn Strategy<TweetRef>>>,
}

impl TwitterAdapter {
    pub fn new() -> Self {
        Self {
            strategies: vec![Box::new(FxTwitter), Box::new(Oembed), Box::new(Nitter)],
        }
    }
}

impl Default for TwitterAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for TwitterAdapter {
    fn name(&self) -> &'static str {
        "twitter"
    }

    async fn extract(
        &self,
        client: &dyn HttpClient,
        url: &Url,
    ) -> Result<Vec<RawMedia>, ExtractError> {
        let tweet = TweetRef::parse(url.as_str()).ok_or_else(|| {
            ExtractError::ExtractionFailed(
                "Invalid Twitter URL - no tweet ID found. Paste a link to a single post \
                 (it contains /status/<id>)."
                    .into(),
            )
        })?;

        run_chain(self.name(), &self.strategies, client, &tweet)
            .await
            .map_err(|_| {
                ExtractError::ExtractionFailed(format!("{EXHAUSTED_REASON}, then {DIRECT_ADDRESS_HINT}."))
            })
    }
}
