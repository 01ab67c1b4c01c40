use crate::{
    classify::{classify, SourceTag},
    config::Config,
    errors::ExtractError,
    extractors::{DirectAdapter, ImgurAdapter, RedditAdapter, SourceAdapter, TwitterAdapter},
    http::HttpClient,
    media::{BatchResult, Extraction, ExtractionOutcome},
    normalize::normalize,
    security::{sanitize_url_for_logging, validate_url, ValidateOptions},
};
use futures::{stream, StreamExt};
use std::sync::Arc;

/// Runs URLs through classify, validate, extract and normalize.
pub struct MediaExtractor {
    client: Arc<dyn HttpClient>,
    twitter: TwitterAdapter,
    reddit: RedditAdapter,
    imgur: ImgurAdapter,
    direct: DirectAdapter,
    batch_concurrency: usize,
    batch_max_urls: usize,
}

impl MediaExtractor {
    pub fn new(client: Arc<dyn HttpClient>, config: &Config) -> Self {
        Self {
            client,
            twitter: TwitterAdapter::new(),
            reddit: RedditAdapter::new(),
            imgur: ImgurAdapter::new(),
            direct: DirectAdapter::new(),
            batch_concurrency: config.batch_concurrency.max(1),
            batch_max_urls: config.batch_max_urls,
        }
    }

    fn adapter(&self, tag: SourceTag) -> &dyn SourceAdapter {
        match tag {
            SourceTag::Twitter => &self.twitter,
            SourceTag::Reddit => &self.reddit,
            SourceTag::Imgur => &self.imgur,
            _ => &self.direct,
        }
    }

    /// Never fails as a whole: every problem ends up in the returned outcome.
    pub async fn extract(&self, raw: &str) -> Extraction {
        let source_tag = classify(raw);
        let outcome = self.run(raw, source_tag).await;

        match &outcome {
            ExtractionOutcome::Success { media } => log::info!(
                "url={} type={source_tag} state=success count={}",
                sanitize_url_for_logging(raw),
                media.len()
            ),
            ExtractionOutcome::Failure { reason, message } => log::info!(
                "url={} type={source_tag} state=failed reason={reason:?} message={message:?}",
                sanitize_url_for_logging(raw)
            ),
        }

        Extraction {
            url: raw.to_string(),
            source_tag,
            outcome,
        }
    }

    async fn run(&self, raw: &str, source_tag: SourceTag) -> ExtractionOutcome {
        let safe_url = sanitize_url_for_logging(raw);
        log::debug!("url={safe_url} state=classified type={source_tag}");

        let effective = match source_tag {
            SourceTag::Invalid => {
                return failure(ExtractError::InvalidUrl("Malformed URL".into()));
            }
            SourceTag::Unknown => SourceTag::Direct,
            tag => tag,
        };

        let opts = ValidateOptions {
            allow_any_https: effective == SourceTag::Direct,
        };
        let url = match validate_url(raw, opts) {
            Ok(url) => url,
            Err(err) => {
                if matches!(err, ExtractError::Blocked(_)) {
                    log::warn!("url={safe_url} blocked: {err}");
                }
                return failure(err);
            }
        };
        log::debug!("url={safe_url} state=validated");

        let adapter = self.adapter(effective);
        let raw_media = match adapter.extract(self.client.as_ref(), &url).await {
            Ok(media) => media,
            Err(err) => {
                return failure(ExtractError::ExtractionFailed(err.message().to_string()));
            }
        };
        log::debug!(
            "url={safe_url} state=extracted adapter={} count={}",
            adapter.name(),
            raw_media.len()
        );

        let media = normalize(adapter.name(), raw_media);
        log::debug!("url={safe_url} state=normalized count={}", media.len());

        ExtractionOutcome::Success { media }
    }

    /// Extract every URL with bounded concurrency. Results keep input order and
    /// one failing URL never affects the others. URLs past `batch_max_urls` are
    /// not extracted and fail individually.
    pub async fn extract_batch(&self, mut urls: Vec<String>) -> BatchResult {
        let excess = if urls.len() > self.batch_max_urls {
            urls.split_off(self.batch_max_urls)
        } else {
            Vec::new()
        };
        if !excess.is_empty() {
            log::warn!(
                "batch of {} urls exceeds limit {}, skipping the last {}",
                urls.len() + excess.len(),
                self.batch_max_urls,
                excess.len()
            );
        }

        log::info!("batch extraction starting count={}", urls.len());

        let mut items: Vec<Extraction> = stream::iter(urls)
            .map(|url| async move { self.extract(&url).await })
            .buffered(self.batch_concurrency)
            .collect()
            .await;

        let limit = format!("Batch limit of {} URLs exceeded", self.batch_max_urls);
        items.extend(excess.into_iter().map(|url| Extraction {
            source_tag: classify(&url),
            outcome: failure(ExtractError::InvalidUrl(limit.clone())),
            url,
        }));

        let result = BatchResult::from_items(items);
        log::info!(
            "batch extraction complete total={} success={}",
            result.total,
            result.succeeded
        );

        result
    }
}

fn failure(err: ExtractError) -> ExtractionOutcome {
    ExtractionOutcome::Failure {
        reason: err.kind(),
        message: err.message().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::ErrorKind, tests::FakeHttp};

    fn extractor(http: &Arc<FakeHttp>) -> MediaExtractor {
        MediaExtractor::new(http.clone(), &Config::default())
    }

    #[tokio::test]
    async fn test_invalid_url_fails_without_network() {
        let http = Arc::new(FakeHttp::new());
        let result = extractor(&http).extract("not a url").await;

        assert_eq!(result.source_tag, SourceTag::Invalid);
        assert_eq!(
            result.outcome,
            ExtractionOutcome::Failure {
                reason: ErrorKind::InvalidUrl,
                message: "Malformed URL".into()
            }
        );
        assert!(http.calls().is_empty());
    }

    #[tokio::test]
    async fn test_blocked_url_never_reaches_adapter() {
        let http = Arc::new(FakeHttp::new());
        let result = extractor(&http).extract("http://localhost/x").await;

        assert_eq!(result.source_tag, SourceTag::Unknown);
        assert!(matches!(
            result.outcome,
            ExtractionOutcome::Failure {
                reason: ErrorKind::Blocked,
                ..
            }
        ));
        assert!(http.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_is_treated_as_direct() {
        let http = Arc::new(FakeHttp::new().head_ok("https://cdn.example/asset", "image/webp"));
        let result = extractor(&http).extract("https://cdn.example/asset").await;

        assert_eq!(result.source_tag, SourceTag::Unknown);
        match result.outcome {
            ExtractionOutcome::Success { media } => {
                assert_eq!(media.len(), 1);
                assert_eq!(media[0].metadata["adapter"], "direct");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_plain_http_platform_url_must_be_allowed() {
        let http = Arc::new(FakeHttp::new());
        let result = extractor(&http)
            .extract("http://example.com/page")
            .await;

        assert!(matches!(
            result.outcome,
            ExtractionOutcome::Failure {
                reason: ErrorKind::DomainNotAllowed,
                ..
            }
        ));
        assert!(http.calls().is_empty());
    }

    #[tokio::test]
    async fn test_adapter_failure_message_is_kept() {
        let http = Arc::new(FakeHttp::new());
        let result = extractor(&http).extract("https://twitter.com/someone").await;

        match result.outcome {
            ExtractionOutcome::Failure { reason, message } => {
                assert_eq!(reason, ErrorKind::ExtractionFailed);
                assert!(message.starts_with("Invalid Twitter URL"), "{message}");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_batch_limit_fails_excess_items() {
        let http = Arc::new(FakeHttp::new());
        let mut urls = vec!["https://i.imgur.com/a.png".to_string(); 20];
        urls.push("https://i.imgur.com/last.png".to_string());

        let result = extractor(&http).extract_batch(urls).await;
        assert_eq!(result.total, 21);
        assert_eq!(result.items.len(), 21);
        assert_eq!(result.succeeded, 20);
        assert_eq!(result.failed, 1);

        let last = &result.items[20];
        assert_eq!(last.url, "https://i.imgur.com/last.png");
        assert_eq!(last.source_tag, SourceTag::Imgur);
        assert_eq!(
            last.outcome,
            ExtractionOutcome::Failure {
                reason: ErrorKind::InvalidUrl,
                message: "Batch limit of 20 URLs exceeded".into()
            }
        );
        assert!(http.calls().is_empty());
    }
}
