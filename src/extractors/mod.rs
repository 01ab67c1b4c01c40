pub mod direct;
pub mod imgur;
pub mod reddit;
pub mod twitter;

use crate::{
    errors::ExtractError,
    http::{HttpClient, HttpResponse},
    media::RawMedia,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use url::Url;

pub use direct::DirectAdapter;
pub use imgur::ImgurAdapter;
pub use reddit::RedditAdapter;
pub use twitter::TwitterAdapter;

/// Remediation every adapter puts in its exhaustion message.
pub(crate) const DIRECT_ADDRESS_HINT: &str = "paste the direct image or video address instead";

/// `Ok(None)` and `Ok(Some(vec![]))` both mean "nothing here, try the next strategy".
pub type StrategyResult = Result<Option<Vec<RawMedia>>, ExtractError>;

/// One way of getting media out of a source. Adapters hold an ordered list of these.
#[async_trait]
pub trait Strategy<T: Sync + ?Sized>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, client: &dyn HttpClient, target: &T) -> StrategyResult;
}

/// Per-source extraction entry point.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn extract(&self, client: &dyn HttpClient, url: &Url)
        -> Result<Vec<RawMedia>, ExtractError>;
}

/// Every strategy of a chain came back empty or failed.
#[derive(Debug, Default)]
pub struct ChainExhausted {
    pub last_error: Option<ExtractError>,
}

impl ChainExhausted {
    /// Short reason for the remediation message.
    pub fn reason(&self) -> String {
        match &self.last_error {
            Some(e) => e.message().to_string(),
            None => "no media found".to_string(),
        }
    }
}

/// Run strategies in order, one at a time, stopping at the first that yields media.
pub async fn run_chain<T: Sync + ?Sized>(
    adapter: &str,
    strategies: &[Box<dyn Strategy<T>>],
    client: &dyn HttpClient,
    target: &T,
) -> Result<Vec<RawMedia>, ChainExhausted> {
    let mut exhausted = ChainExhausted::default();

    for strategy in strategies {
        let name = strategy.name();
        match strategy.run(client, target).await {
            Ok(Some(media)) if !media.is_empty() => {
                log::info!(
                    "adapter={adapter} strategy={name} outcome=success count={}",
                    media.len()
                );
                return Ok(media);
            }
            Ok(_) => {
                log::info!("adapter={adapter} strategy={name} outcome=empty");
            }
            Err(e) => {
                log::warn!("adapter={adapter} strategy={name} outcome=error err={e}");
                exhausted.last_error = Some(e);
            }
        }
    }

    Err(exhausted)
}

fn upstream(msg: impl Into<String>) -> ExtractError {
    ExtractError::UpstreamUnavailable(msg.into())
}

fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| url.to_string())
}

/// GET that treats transport errors and non-2xx statuses as a strategy failure.
pub(crate) async fn fetch_ok(client: &dyn HttpClient, url: &str) -> Result<HttpResponse, ExtractError> {
    let resp = client
        .get(url)
        .await
        .map_err(|e| upstream(format!("{}: {e}", host_of(url))))?;

    if !resp.is_success() {
        return Err(upstream(format!(
            "{} returned {}",
            host_of(url),
            resp.status
        )));
    }

    Ok(resp)
}

pub(crate) async fn fetch_json(client: &dyn HttpClient, url: &str) -> Result<Value, ExtractError> {
    let resp = fetch_ok(client, url).await?;
    serde_json::from_slice(&resp.body)
        .map_err(|e| upstream(format!("invalid JSON from {}: {e}", host_of(url))))
}

pub(crate) async fn fetch_text(client: &dyn HttpClient, url: &str) -> Result<String, ExtractError> {
    fetch_ok(client, url).await.map(|r| r.text())
}

static IMAGE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(jpg|jpeg|png|gif|webp)(\?.*)?$").expect("Failed to compile image url regex")
});

/// Image-looking URL: an image extension or one of the platforms' image CDNs.
pub(crate) fn is_image_url(url: &str) -> bool {
    IMAGE_URL.is_match(url)
        || url.contains("i.redd.it")
        || url.contains("i.imgur.com")
        || url.contains("pbs.twimg.com")
}

pub(crate) fn decode_html_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
