use super::{run_chain, SourceAdapter, Strategy, StrategyResult, DIRECT_ADDRESS_HINT};
use crate::{
    classify::{has_image_format_param, host_matches},
    errors::ExtractError,
    http::HttpClient,
    media::{MediaType, RawMedia},
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Hosts whose URLs are trusted to be media without a round trip.
const TRUSTED_HOSTS: &[&str] = &[
    "pbs.twimg.com",
    "i.imgur.com",
    "i.redd.it",
    "preview.redd.it",
    "media.giphy.com",
    "placekitten.com",
    "picsum.photos",
];

static IMAGE_EXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(jpg|jpeg|png|gif|webp|bmp|svg)(\?.*)?$")
        .expect("Failed to compile image extension regex")
});

static VIDEO_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(mp4|webm|mov)$").expect("Failed to compile video regex"));

static GIF_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.gif$").expect("Failed to compile gif regex"));

fn is_trusted(url: &Url) -> bool {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    TRUSTED_HOSTS.iter().any(|h| host_matches(&host, h))
}

fn looks_like_image(url: &Url) -> bool {
    IMAGE_EXT.is_match(url.as_str()) || has_image_format_param(url)
}

/// Trusted CDN host: typed by extension, no request.
pub struct TrustedHost;

#[async_trait]
impl Strategy<Url> for TrustedHost {
    fn name(&self) -> &'static str {
        "trusted_host"
    }

    async fn run(&self, _client: &dyn HttpClient, url: &Url) -> StrategyResult {
        if !is_trusted(url) {
            return Ok(None);
        }

        Ok(Some(vec![RawMedia::new(
            url.as_str(),
            MediaType::guess(url.as_str()).as_str(),
        )
        .with("source", "direct-trusted")]))
    }
}

/// HEAD the URL and type it by content type.
pub struct HeadProbe;

#[async_trait]
impl Strategy<Url> for HeadProbe {
    fn name(&self) -> &'static str {
        "head_probe"
    }

    async fn run(&self, client: &dyn HttpClient, url: &Url) -> StrategyResult {
        let resp = match client.head(url.as_str()).await {
            Ok(resp) => resp,
            Err(e) if e.is_network() => {
                log::debug!("direct probe inconclusive ({e}), returning unverified");
                return Ok(Some(vec![RawMedia::new(
                    url.as_str(),
                    MediaType::guess(url.as_str()).as_str(),
                )
                .with("source", "direct-unverified")
                .with("note", "Could not verify the URL is reachable")
                .unverified()]));
            }
            Err(e) => return Err(ExtractError::ExtractionFailed(e.to_string())),
        };

        if !resp.is_success() {
            return Err(ExtractError::ExtractionFailed(format!(
                "URL returned {}",
                resp.status
            )));
        }

        let content_type = resp.content_type.clone().unwrap_or_default().to_lowercase();
        let path = url.path();

        let kind = if content_type.contains("video") || VIDEO_PATH.is_match(path) {
            MediaType::Video
        } else if content_type.contains("gif") || GIF_PATH.is_match(path) {
            MediaType::Gif
        } else if content_type.contains("image") || looks_like_image(url) {
            MediaType::Image
        } else {
            return Err(ExtractError::ExtractionFailed(
                "URL does not appear to be an image or video".into(),
            ));
        };

        Ok(Some(vec![RawMedia::new(url.as_str(), kind.as_str())
            .with("source", "direct")
            .with("contentType", resp.content_type)
            .with("contentLength", resp.content_length)]))
    }
}

pub struct DirectAdapter {
    strategies: Vec<Box<dyn Strategy<Url>>>,
}

impl DirectAdapter {
    pub fn new() -> Self {
        Self {
            strategies: vec![Box::new(TrustedHost), Box::new(HeadProbe)],
        }
    }
}

impl Default for DirectAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for DirectAdapter {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn extract(
        &self,
        client: &dyn HttpClient,
        url: &Url,
    ) -> Result<Vec<RawMedia>, ExtractError> {
        run_chain(self.name(), &self.strategies, client, url)
            .await
            .map_err(|exhausted| {
                ExtractError::ExtractionFailed(format!(
                    "Direct URL extraction failed: {}. Check the link and {DIRECT_ADDRESS_HINT}.",
                    exhausted.reason()
                ))
            })
    }
}
