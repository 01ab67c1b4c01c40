use super::{
    fetch_text, run_chain, SourceAdapter, Strategy, StrategyResult, DIRECT_ADDRESS_HINT,
};
use crate::{
    errors::ExtractError,
    http::HttpClient,
    media::{MediaType, RawMedia},
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

const CDN: &str = "https://i.imgur.com";
const ALBUM_PROBE_EXTS: &[&str] = &[".jpg", ".png", ".gif", ".mp4"];
const SINGLE_PROBE_EXTS: &[&str] = &[".jpg", ".png", ".gif", ".mp4", ".webp"];

static ALBUM_RECORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\{"id":"([a-zA-Z0-9]+)"[^{}]*"ext":"(\.[a-z0-9]+)""#)
        .expect("Failed to compile album record regex")
});

static CDN_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https://i\.imgur\.com/([a-zA-Z0-9]+)(\.[a-z0-9]+)")
        .expect("Failed to compile imgur cdn regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImgurShape {
    /// Already a CDN file URL.
    Direct,
    Album(String),
    Single(String),
}

impl ImgurShape {
    pub fn of(url: &Url) -> Result<Self, ExtractError> {
        let host = url.host_str().unwrap_or_default().to_lowercase();
        if host.starts_with("i.") {
            return Ok(ImgurShape::Direct);
        }

        let parts: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();

        match parts.as_slice() {
            [] => Err(ExtractError::ExtractionFailed("Invalid Imgur URL".into())),
            ["a" | "gallery"] => Err(ExtractError::ExtractionFailed(
                "Invalid Imgur URL: album id missing".into(),
            )),
            ["a" | "gallery", id, ..] => Ok(ImgurShape::Album(id.to_string())),
            [first, ..] => match first.split('.').next() {
                Some(id) if !id.is_empty() => Ok(ImgurShape::Single(id.to_string())),
                _ => Err(ExtractError::ExtractionFailed(
                    "Invalid Imgur URL: image id missing".into(),
                )),
            },
        }
    }
}

/// `(id, ext)` pairs, first occurrence of each id wins.
fn dedup_by_id(pairs: impl Iterator<Item = (String, String)>) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    pairs.filter(|(id, _)| seen.insert(id.clone())).collect()
}

/// Image records embedded in the album page's inline JSON.
pub fn scan_album_records(html: &str) -> Vec<(String, String)> {
    dedup_by_id(
        ALBUM_RECORD
            .captures_iter(html)
            .map(|c| (c[1].to_string(), c[2].to_string())),
    )
}

/// Any absolute CDN file links on the page.
pub fn scan_cdn_links(html: &str) -> Vec<(String, String)> {
    dedup_by_id(
        CDN_LINK
            .captures_iter(html)
            .map(|c| (c[1].to_string(), c[2].to_string())),
    )
}

fn album_media(album_id: &str, images: Vec<(String, String)>) -> Vec<RawMedia> {
    images
        .into_iter()
        .enumerate()
        .map(|(index, (id, ext))| {
            RawMedia::new(format!("{CDN}/{id}{ext}"), MediaType::guess(&ext).as_str())
                .with("source", "imgur-album")
                .with("albumId", album_id)
                .with("index", index)
        })
        .collect()
}

/// Fetch the album page, read its image records, then fall back to bare CDN links.
pub struct AlbumPage;

#[async_trait]
impl Strategy<str> for AlbumPage {
    fn name(&self) -> &'static str {
        "album_page"
    }

    async fn run(&self, client: &dyn HttpClient, album_id: &str) -> StrategyResult {
        let html = fetch_text(client, &format!("https://imgur.com/a/{album_id}")).await?;

        let mut images = scan_album_records(&html);
        if images.is_empty() {
            log::debug!("imgur album {album_id}: no image records, scanning cdn links");
            images = scan_cdn_links(&html);
        }

        Ok(Some(album_media(album_id, images)))
    }
}

/// HEAD each candidate extension in order. Imgur answers missing files with a
/// redirect to its "removed" placeholder, which is not a hit.
async fn probe(client: &dyn HttpClient, id: &str, exts: &[&str]) -> Option<(String, &'static str)> {
    for ext in exts {
        let url = format!("{CDN}/{id}{ext}");
        match client.head(&url).await {
            Ok(resp) if resp.is_success() && !resp.final_url.contains("removed.") => {
                return Some((url, MediaType::guess(ext).as_str()));
            }
            Ok(resp) => log::debug!("imgur probe {url}: {}", resp.status),
            Err(e) => log::debug!("imgur probe {url}: {e}"),
        }
    }

    None
}

/// Album id used as if it were an image id.
pub struct AlbumIdProbe;

#[async_trait]
impl Strategy<str> for AlbumIdProbe {
    fn name(&self) -> &'static str {
        "album_id_probe"
    }

    async fn run(&self, client: &dyn HttpClient, album_id: &str) -> StrategyResult {
        let hit = probe(client, album_id, ALBUM_PROBE_EXTS).await;
        Ok(hit.map(|(url, kind)| vec![RawMedia::new(url, kind).with("source", "imgur-fallback")]))
    }
}

pub struct ExtensionProbe;

#[async_trait]
impl Strategy<str> for ExtensionProbe {
    fn name(&self) -> &'static str {
        "extension_probe"
    }

    async fn run(&self, client: &dyn HttpClient, image_id: &str) -> StrategyResult {
        let hit = probe(client, image_id, SINGLE_PROBE_EXTS).await;
        Ok(hit.map(|(url, kind)| {
            vec![RawMedia::new(url, kind)
                .with("source", "imgur-single")
                .with("imageId", image_id)]
        }))
    }
}

/// `.jpg` guess when nothing could be confirmed.
pub struct JpgGuess;

#[async_trait]
impl Strategy<str> for JpgGuess {
    fn name(&self) -> &'static str {
        "jpg_guess"
    }

    async fn run(&self, _client: &dyn HttpClient, image_id: &str) -> StrategyResult {
        Ok(Some(vec![RawMedia::new(format!("{CDN}/{image_id}.jpg"), "image")
            .with("source", "imgur-guess")
            .with("imageId", image_id)
            .unverified()]))
    }
}

pub struct ImgurAdapter {
    album: Vec<Box<dyn Strategy<str>>>,
    single: Vec<Box<dyn Strategy<str>>>,
}

impl ImgurAdapter {
    pub fn new() -> Self {
        Self {
            album: vec![Box::new(AlbumPage), Box::new(AlbumIdProbe)],
            single: vec![Box::new(ExtensionProbe), Box::new(JpgGuess)],
        }
    }
}

impl Default for ImgurAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for ImgurAdapter {
    fn name(&self) -> &'static str {
        "imgur"
    }

    async fn extract(
        &self,
        client: &dyn HttpClient,
        url: &Url,
    ) -> Result<Vec<RawMedia>, ExtractError> {
        let (strategies, id) = match ImgurShape::of(url)? {
            ImgurShape::Direct => {
                return Ok(vec![RawMedia::new(
                    url.as_str(),
                    MediaType::guess(url.as_str()).as_str(),
                )
                .with("source", "imgur-direct")]);
            }
            ImgurShape::Album(id) => (&self.album, id),
            ImgurShape::Single(id) => (&self.single, id),
        };

        run_chain(self.name(), strategies, client, id.as_str())
            .await
            .map_err(|exhausted| {
                ExtractError::ExtractionFailed(format!(
                    "Imgur extraction failed: {}. Open the image on Imgur and {DIRECT_ADDRESS_HINT} \
                     (it starts with i.imgur.com).",
                    exhausted.reason()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::FakeHttp;

    fn shape(raw: &str) -> Result<ImgurShape, ExtractError> {
        ImgurShape::of(&Url::parse(raw).unwrap())
    }

    #[test]
    fn test_shapes() {
        assert_eq!(shape("https://i.imgur.com/abc.png"), Ok(ImgurShape::Direct));
        assert_eq!(
            shape("https://imgur.com/a/XyZ12"),
            Ok(ImgurShape::Album("XyZ12".into()))
        );
        assert_eq!(
            shape("https://imgur.com/gallery/XyZ12/comment/1"),
            Ok(ImgurShape::Album("XyZ12".into()))
        );
        assert_eq!(
            shape("https://imgur.com/abc123.gifv"),
            Ok(ImgurShape::Single("abc123".into()))
        );
        assert!(matches!(
            shape("https://imgur.com/"),
            Err(ExtractError::ExtractionFailed(_))
        ));
        assert!(shape("https://imgur.com/a/").is_err());
        assert_eq!(
            shape("https://imgur.com/.png"),
            Err(ExtractError::ExtractionFailed(
                "Invalid Imgur URL: image id missing".into()
            ))
        );
    }

    #[test]
    fn test_scan_album_records() {
        let html = r#"<script>window.postDataJSON={"media":[{"id":"aaa111","name":"x","ext":".png"},{"id":"bbb222","type":"video","ext":".mp4"},{"id":"aaa111","ext":".png"}]}</script>"#;
        assert_eq!(
            scan_album_records(html),
            vec![
                ("aaa111".to_string(), ".png".to_string()),
                ("bbb222".to_string(), ".mp4".to_string()),
            ]
        );
    }

    #[test]
    fn test_scan_nested_album_payload() {
        // album wrapper record with its images nested inside
        let html = r#"<script>window.postDataJSON={"id":"ALBUM1","title":"t","media":[{"id":"aaa111","name":"x","ext":".png"},{"id":"bbb222","ext":".jpg"}]}</script>"#;
        assert_eq!(
            scan_album_records(html),
            vec![
                ("aaa111".to_string(), ".png".to_string()),
                ("bbb222".to_string(), ".jpg".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_album_page_with_nested_records() {
        let http = FakeHttp::new().get_text(
            "https://imgur.com/a/ALBUM1",
            r#"{"id":"ALBUM1","media":[{"id":"img1","ext":".jpeg"},{"id":"clip2","type":"video","ext":".mp4"}]}"#,
        );
        let url = Url::parse("https://imgur.com/a/ALBUM1").unwrap();

        let media = ImgurAdapter::new().extract(&http, &url).await.unwrap();
        let urls: Vec<&str> = media.iter().map(|m| m.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://i.imgur.com/img1.jpeg", "https://i.imgur.com/clip2.mp4"]
        );
        assert_eq!(media[1].kind, "video");
        assert_eq!(http.calls(), vec!["GET https://imgur.com/a/ALBUM1"]);
    }

    #[test]
    fn test_scan_cdn_links() {
        let html = r#"<img src="https://i.imgur.com/one.jpg"><meta content="https://i.imgur.com/two.gif"><img src="https://i.imgur.com/one.jpg">"#;
        assert_eq!(
            scan_cdn_links(html),
            vec![
                ("one".to_string(), ".jpg".to_string()),
                ("two".to_string(), ".gif".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_direct_cdn_url_needs_no_network() {
        let http = FakeHttp::new();
        let url = Url::parse("https://i.imgur.com/abc123.gif").unwrap();

        let media = ImgurAdapter::new().extract(&http, &url).await.unwrap();
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].url, "https://i.imgur.com/abc123.gif");
        assert_eq!(media[0].kind, "gif");
        assert!(http.calls().is_empty());
    }

    #[tokio::test]
    async fn test_album_falls_back_to_cdn_links() {
        let http = FakeHttp::new().get_text(
            "https://imgur.com/a/alb",
            r#"<a href="https://i.imgur.com/pic1.png"></a><a href="https://i.imgur.com/vid2.mp4"></a>"#,
        );
        let url = Url::parse("https://imgur.com/a/alb").unwrap();

        let media = ImgurAdapter::new().extract(&http, &url).await.unwrap();
        assert_eq!(media.len(), 2);
        assert_eq!(media[0].url, "https://i.imgur.com/pic1.png");
        assert_eq!(media[1].kind, "video");
        assert_eq!(media[1].metadata["index"], 1);
        assert_eq!(media[1].metadata["albumId"], "alb");
    }

    #[tokio::test]
    async fn test_album_page_failure_probes_album_id() {
        let http = FakeHttp::new()
            .get_status("https://imgur.com/a/alb", 404)
            .head_status("https://i.imgur.com/alb.jpg", 404)
            .head_ok("https://i.imgur.com/alb.png", "image/png");
        let url = Url::parse("https://imgur.com/a/alb").unwrap();

        let media = ImgurAdapter::new().extract(&http, &url).await.unwrap();
        assert_eq!(media[0].url, "https://i.imgur.com/alb.png");
        assert_eq!(media[0].metadata["source"], "imgur-fallback");
    }

    #[tokio::test]
    async fn test_single_image_probe_order() {
        let http = FakeHttp::new()
            .head_status("https://i.imgur.com/abc.jpg", 404)
            .head_ok("https://i.imgur.com/abc.png", "image/png")
            .head_ok("https://i.imgur.com/abc.gif", "image/gif");
        let url = Url::parse("https://imgur.com/abc").unwrap();

        let media = ImgurAdapter::new().extract(&http, &url).await.unwrap();
        assert_eq!(media[0].url, "https://i.imgur.com/abc.png");
        assert!(!media[0].unverified);
        assert_eq!(
            http.calls(),
            vec![
                "HEAD https://i.imgur.com/abc.jpg",
                "HEAD https://i.imgur.com/abc.png",
            ]
        );
    }

    #[tokio::test]
    async fn test_removed_placeholder_is_not_a_hit() {
        let http = FakeHttp::new()
            .head_redirect("https://i.imgur.com/gone.jpg", "https://i.imgur.com/removed.png");
        let url = Url::parse("https://imgur.com/gone").unwrap();

        let media = ImgurAdapter::new().extract(&http, &url).await.unwrap();
        assert_eq!(media[0].url, "https://i.imgur.com/gone.jpg");
        assert!(media[0].unverified);
        assert_eq!(media[0].metadata["source"], "imgur-guess");
    }

    #[tokio::test]
    async fn test_single_image_degrades_to_jpg_guess() {
        let http = FakeHttp::new();
        let url = Url::parse("https://imgur.com/zzz.png").unwrap();

        let media = ImgurAdapter::new().extract(&http, &url).await.unwrap();
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].url, "https://i.imgur.com/zzz.jpg");
        assert!(media[0].unverified);
        assert_eq!(http.calls().len(), SINGLE_PROBE_EXTS.len());
    }
}
