use crate::{
    classify::SourceTag,
    config::Config,
    extract::MediaExtractor,
    http::ReqwestClient,
    media::{BatchResult, Extraction, ExtractionOutcome, MediaReference},
};
use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

#[derive(Clone)]
struct SharedState {
    extractor: Arc<MediaExtractor>,
}

pub fn router(extractor: Arc<MediaExtractor>) -> Router {
    let shared_state = Arc::new(SharedState { extractor });

    Router::new()
        .route("/extract", post(extract))
        .route("/extract-batch", post(extract_batch))
        .route("/health", get(health))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                log::error!("failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::warn!("shutting down");
}

async fn start_app(config: Config) -> anyhow::Result<()> {
    let client = ReqwestClient::new(&config).context("failed to build http client")?;
    let extractor = Arc::new(MediaExtractor::new(Arc::new(client), &config));
    let app = router(extractor);

    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    log::info!("listening on {}", config.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn start_daemon(config: Config) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_app(config))
}

#[derive(thiserror::Error, Debug)]
enum HttpError {
    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        log::warn!("rejected request: {self}");
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": self.to_string()})),
        )
            .into_response()
    }
}

impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        HttpError::BadRequest(rejection.body_text())
    }
}

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub success: bool,
    pub url: String,
    #[serde(rename = "type")]
    pub source_tag: SourceTag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<MediaReference>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Extraction> for ExtractResponse {
    fn from(extraction: Extraction) -> Self {
        let (success, media, error) = match extraction.outcome {
            ExtractionOutcome::Success { media } => (true, Some(media), None),
            ExtractionOutcome::Failure { message, .. } => (false, None, Some(message)),
        };

        Self {
            success,
            url: extraction.url,
            source_tag: extraction.source_tag,
            media,
            error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub results: Vec<ExtractResponse>,
}

impl From<BatchResult> for BatchResponse {
    fn from(result: BatchResult) -> Self {
        Self {
            total: result.total,
            success: result.succeeded,
            failed: result.failed,
            results: result.items.into_iter().map(Into::into).collect(),
        }
    }
}

async fn extract(
    State(state): State<Arc<SharedState>>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ExtractResponse>), HttpError> {
    let Json(payload) = payload?;

    let extraction = state.extractor.extract(&payload.url).await;
    let status = if extraction.outcome.is_success() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };

    Ok((status, Json(extraction.into())))
}

async fn extract_batch(
    State(state): State<Arc<SharedState>>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, HttpError> {
    let Json(payload) = payload?;

    let result = state.extractor.extract_batch(payload.urls).await;

    Ok(Json(result.into()))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}
