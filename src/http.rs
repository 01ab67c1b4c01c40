use crate::{config::Config, security};
use async_trait::async_trait;
use reqwest::{header, redirect, StatusCode};
use std::{error::Error, time::Duration};
use url::Url;

const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    /// URL after redirects were followed.
    pub final_url: String,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

/// Network-level failures. A non-success HTTP status is not one of these.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("redirect refused: {0}")]
    Redirect(String),

    #[error("request failed: {0}")]
    Other(String),
}

impl TransportError {
    /// Timeouts and connection failures say nothing about whether the resource exists.
    pub fn is_network(&self) -> bool {
        matches!(self, TransportError::Timeout | TransportError::Connect(_))
    }
}

/// Outbound HTTP seam. Adapters only talk to the network through this.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;

    /// Existence check; the body is not read.
    async fn head(&self, url: &str) -> Result<HttpResponse, TransportError>;
}

pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .redirect(redirect_policy())
            .build()?;

        Ok(Self { client })
    }

    async fn send(
        &self,
        req: reqwest::RequestBuilder,
        read_body: bool,
    ) -> Result<HttpResponse, TransportError> {
        let resp = req.send().await.map_err(|err| classify_error(&err))?;

        let status = resp.status();
        let final_url = resp.url().to_string();
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let content_length = resp
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        if status != StatusCode::OK {
            log::debug!("{final_url}: {status}");
        }

        let body = if read_body {
            resp.bytes()
                .await
                .map_err(|err| classify_error(&err))?
                .to_vec()
        } else {
            Vec::new()
        };

        Ok(HttpResponse {
            status: status.as_u16(),
            final_url,
            content_type,
            content_length,
            body,
        })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        log::debug!("GET {}", security::sanitize_url_for_logging(url));
        self.send(self.client.get(url), true).await
    }

    async fn head(&self, url: &str) -> Result<HttpResponse, TransportError> {
        log::debug!("HEAD {}", security::sanitize_url_for_logging(url));
        self.send(self.client.head(url), false).await
    }
}

/// Whether a redirect to `next`, after `hops` earlier redirects, may be followed.
fn check_redirect(next: &Url, hops: usize) -> Result<(), &'static str> {
    if hops >= MAX_REDIRECTS {
        return Err("too many redirects");
    }
    if security::is_blocked_url(next) {
        log::warn!(
            "refusing redirect to {}",
            security::sanitize_url_for_logging(next.as_str())
        );
        return Err("redirect to an internal address");
    }
    Ok(())
}

/// Follow redirects, but never into a private network.
fn redirect_policy() -> redirect::Policy {
    redirect::Policy::custom(|attempt| {
        match check_redirect(attempt.url(), attempt.previous().len()) {
            Ok(()) => attempt.follow(),
            Err(reason) => attempt.error(reason),
        }
    })
}

fn get_error(error: &reqwest::Error) -> String {
    match error.source() {
        Some(e) => match e.source() {
            Some(e) => e.to_string(),
            None => e.to_string(),
        },
        None => error.to_string(),
    }
}

fn classify_error(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_redirect() {
        TransportError::Redirect(get_error(err))
    } else if err.is_connect() || err.is_request() {
        TransportError::Connect(get_error(err))
    } else {
        TransportError::Other(get_error(err))
    }
}
