use super::{
    decode_html_entities, fetch_json, is_image_url, run_chain, upstream, SourceAdapter, Strategy,
    StrategyResult, DIRECT_ADDRESS_HINT,
};
use crate::{classify::host_matches, errors::ExtractError, http::HttpClient, media::RawMedia};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use url::Url;

#[derive(Debug, Deserialize)]
struct RedditPost {
    title: Option<String>,
    subreddit: Option<String>,
    author: Option<String>,
    score: Option<i64>,
    permalink: Option<String>,
    url: Option<String>,
    url_overridden_by_dest: Option<String>,
    preview: Option<Preview>,
    media: Option<PostMedia>,
    gallery_data: Option<GalleryData>,
    media_metadata: Option<HashMap<String, GalleryMedia>>,
}

#[derive(Debug, Deserialize)]
struct Preview {
    #[serde(default)]
    images: Vec<PreviewImage>,
}

#[derive(Debug, Deserialize)]
struct PreviewImage {
    source: Option<ImageSource>,
    variants: Option<Variants>,
}

#[derive(Debug, Deserialize)]
struct ImageSource {
    url: Option<String>,
    width: Option<u64>,
    height: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Variants {
    gif: Option<Variant>,
    mp4: Option<Variant>,
}

#[derive(Debug, Deserialize)]
struct Variant {
    source: Option<ImageSource>,
}

#[derive(Debug, Deserialize)]
struct PostMedia {
    reddit_video: Option<RedditVideo>,
}

#[derive(Debug, Deserialize)]
struct RedditVideo {
    fallback_url: Option<String>,
    duration: Option<f64>,
    width: Option<u64>,
    height: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct GalleryData {
    #[serde(default)]
    items: Vec<GalleryItem>,
}

#[derive(Debug, Deserialize)]
struct GalleryItem {
    media_id: String,
}

#[derive(Debug, Deserialize)]
struct GalleryMedia {
    /// Encoding, e.g. "Image" or "AnimatedImage".
    e: Option<String>,
    s: Option<GallerySource>,
}

#[derive(Debug, Deserialize)]
struct GallerySource {
    u: Option<String>,
    gif: Option<String>,
}

/// `<post url>.json`: no query, no fragment, no trailing slash.
pub fn json_url(post: &Url) -> String {
    let mut url = post.clone();
    url.set_query(None);
    url.set_fragment(None);
    let base = url.as_str().trim_end_matches('/');
    format!("{base}.json")
}

fn is_short_link(url: &Url) -> bool {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    host_matches(&host, "redd.it")
}

/// Collects candidates, skipping any URL already seen.
struct Candidates {
    seen: HashSet<String>,
    media: Vec<RawMedia>,
}

impl Candidates {
    fn new() -> Self {
        Self {
            seen: HashSet::new(),
            media: Vec::new(),
        }
    }

    fn push(&mut self, media: RawMedia) {
        if self.seen.insert(media.url.clone()) {
            self.media.push(media);
        }
    }
}

fn parse_listing(listing: Value) -> Result<Vec<RawMedia>, ExtractError> {
    let post = listing
        .get(0)
        .and_then(|l| l.pointer("/data/children/0/data"))
        .cloned()
        .ok_or_else(|| upstream("Could not parse Reddit response"))?;
    let post: RedditPost = serde_json::from_value(post)
        .map_err(|e| upstream(format!("unexpected Reddit post shape: {e}")))?;

    Ok(collect_candidates(post))
}

fn collect_candidates(post: RedditPost) -> Vec<RawMedia> {
    let permalink = post
        .permalink
        .as_ref()
        .map(|p| format!("https://reddit.com{p}"));
    let base = |url: &str, kind: &str| {
        RawMedia::new(url, kind)
            .with("source", "reddit")
            .with("title", post.title.clone())
            .with("subreddit", post.subreddit.clone())
            .with("author", post.author.clone())
            .with("score", post.score)
            .with("permalink", permalink.clone())
    };
    let mut out = Candidates::new();

    if let Some(url) = post.url.as_deref().filter(|u| is_image_url(u)) {
        out.push(base(&decode_html_entities(url), "image"));
    }

    if let Some(url) = post
        .url_overridden_by_dest
        .as_deref()
        .filter(|u| is_image_url(u))
    {
        out.push(base(&decode_html_entities(url), "image"));
    }

    for image in post.preview.iter().flat_map(|p| &p.images) {
        if let Some(source) = &image.source {
            if let Some(url) = &source.url {
                out.push(
                    base(&decode_html_entities(url), "image")
                        .with("width", source.width)
                        .with("height", source.height),
                );
            }
        }

        let variants = match &image.variants {
            Some(v) => v,
            None => continue,
        };
        let variant_url = |v: &Option<Variant>| {
            v.as_ref()
                .and_then(|v| v.source.as_ref())
                .and_then(|s| s.url.as_deref())
                .map(decode_html_entities)
        };
        if let Some(url) = variant_url(&variants.gif) {
            out.push(base(&url, "gif"));
        }
        if let Some(url) = variant_url(&variants.mp4) {
            out.push(base(&url, "video"));
        }
    }

    if let Some(video) = post.media.as_ref().and_then(|m| m.reddit_video.as_ref()) {
        if let Some(url) = &video.fallback_url {
            out.push(
                base(&decode_html_entities(url), "video")
                    .with("duration", video.duration)
                    .with("width", video.width)
                    .with("height", video.height),
            );
        }
    }

    if let (Some(gallery), Some(metadata)) = (&post.gallery_data, &post.media_metadata) {
        for (index, item) in gallery.items.iter().enumerate() {
            let media = match metadata.get(&item.media_id) {
                Some(m) => m,
                None => continue,
            };
            let animated = media.e.as_deref() == Some("AnimatedImage");
            let source = media.s.as_ref();
            let url = if animated {
                source.and_then(|s| s.gif.as_deref().or(s.u.as_deref()))
            } else {
                source.and_then(|s| s.u.as_deref())
            };
            if let Some(url) = url {
                out.push(
                    base(
                        &decode_html_entities(url),
                        if animated { "gif" } else { "image" },
                    )
                    .with("galleryIndex", index),
                );
            }
        }
    }

    out.media
}

/// Public `.json` view of the post.
pub struct PostJson;

#[async_trait]
impl Strategy<Url> for PostJson {
    fn name(&self) -> &'static str {
        "post_json"
    }

    async fn run(&self, client: &dyn HttpClient, url: &Url) -> StrategyResult {
        let post_url = if is_short_link(url) {
            let resp = client
                .get(url.as_str())
                .await
                .map_err(|e| upstream(format!("failed to resolve short link: {e}")))?;
            Url::parse(&resp.final_url)
                .map_err(|_| upstream("short link resolved to an invalid URL"))?
        } else {
            url.clone()
        };

        let listing = fetch_json(client, &json_url(&post_url)).await?;
        parse_listing(listing).map(Some)
    }
}

pub struct RedditAdapter {
    strategies: Vec<Box<dyn Strategy<Url>>>,
}

impl RedditAdapter {
    pub fn new() -> Self {
        Self {
            strategies: vec![Box::new(PostJson)],
        }
    }
}

impl Default for RedditAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for RedditAdapter {
    fn name(&self) -> &'static str {
        "reddit"
    }

    async fn extract(
        &self,
        client: &dyn HttpClient,
        url: &Url,
    ) -> Result<Vec<RawMedia>, ExtractError> {
        run_chain(self.name(), &self.strategies, client, url)
            .await
            .map_err(|exhausted| {
                let summary = match exhausted.last_error {
                    Some(_) => format!("Reddit extraction failed: {}", exhausted.reason()),
                    None => "No media found in Reddit post".to_string(),
                };
                ExtractError::ExtractionFailed(format!(
                    "{summary}. Open the post and {DIRECT_ADDRESS_HINT}."
                ))
            })
    }
}
