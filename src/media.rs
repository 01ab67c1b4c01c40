use crate::{classify::SourceTag, errors::ErrorKind};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

static GIF_EXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.gifv?(\?.*)?$|[?&]format=gif").expect("Failed to compile gif regex")
});

static VIDEO_EXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(mp4|webm|mov)(\?.*)?$").expect("Failed to compile video regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Gif,
    Video,
}

impl MediaType {
    /// Map an adapter's free-form type hint onto the public enum. Unknown hints are images.
    pub fn coerce(hint: &str) -> Self {
        match hint.trim().to_ascii_lowercase().as_str() {
            "video" | "mp4" | "webm" => MediaType::Video,
            "gif" | "animated_gif" | "animatedimage" | "gifv" => MediaType::Gif,
            _ => MediaType::Image,
        }
    }

    /// Best-effort guess from a URL or a bare extension like `.mp4`.
    pub fn guess(url_or_ext: &str) -> Self {
        if GIF_EXT.is_match(url_or_ext) {
            MediaType::Gif
        } else if VIDEO_EXT.is_match(url_or_ext) {
            MediaType::Video
        } else {
            MediaType::Image
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Gif => "gif",
            MediaType::Video => "video",
        }
    }
}

/// The normalized unit handed back to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaReference {
    pub media_url: String,
    pub media_type: MediaType,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Adapter output before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMedia {
    pub url: String,
    /// Type hint as the upstream spelled it ("photo", "video", "AnimatedImage", ...)
    pub kind: String,
    pub thumbnail: Option<String>,
    /// Set when the adapter guessed instead of confirming the resource exists.
    pub unverified: bool,
    pub metadata: Map<String, Value>,
}

impl RawMedia {
    pub fn new(url: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: kind.into(),
            ..Default::default()
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.metadata.insert(key.to_string(), value);
        }
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: Option<String>) -> Self {
        self.thumbnail = thumbnail;
        self
    }

    pub fn unverified(mut self) -> Self {
        self.unverified = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    Success { media: Vec<MediaReference> },
    Failure { reason: ErrorKind, message: String },
}

impl ExtractionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionOutcome::Success { .. })
    }
}

/// One URL's full trip through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    pub url: String,
    pub source_tag: SourceTag,
    pub outcome: ExtractionOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub items: Vec<Extraction>,
}

impl BatchResult {
    pub fn from_items(items: Vec<Extraction>) -> Self {
        let succeeded = items.iter().filter(|i| i.outcome.is_success()).count();
        Self {
            total: items.len(),
            succeeded,
            failed: items.len() - succeeded,
            items,
        }
    }
}
