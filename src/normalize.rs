use crate::media::{MediaReference, MediaType, RawMedia};
use serde_json::Value;
use std::collections::HashSet;

/// Turn adapter output into public references.
///
/// Drops entries that are not absolute http(s) URLs, tags every entry with the
/// adapter that produced it and removes repeated `mediaUrl`s. Order is kept.
/// A preview image travels as `metadata.thumbnail`.
pub fn normalize(adapter: &str, raw: Vec<RawMedia>) -> Vec<MediaReference> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(raw.len());

    for item in raw {
        if !is_absolute_http(&item.url) {
            log::debug!("dropping non-http media url from {adapter}");
            continue;
        }
        if !seen.insert(item.url.clone()) {
            continue;
        }

        let mut metadata = item.metadata;
        metadata.insert("adapter".into(), Value::from(adapter));
        metadata
            .entry("source")
            .or_insert_with(|| Value::from(adapter));
        if item.unverified {
            metadata.insert("unverified".into(), Value::Bool(true));
        }
        if let Some(thumbnail) = item.thumbnail {
            metadata
                .entry("thumbnail")
                .or_insert_with(|| Value::from(thumbnail));
        }

        out.push(MediaReference {
            media_type: MediaType::coerce(&item.kind),
            media_url: item.url,
            metadata,
        });
    }

    out
}

fn is_absolute_http(raw: &str) -> bool {
    url::Url::parse(raw).is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
}
