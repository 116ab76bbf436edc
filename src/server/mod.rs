//! HTTP surface: `POST /transcript` and `POST /upload_transcript`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use tokio::signal;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::output::{ErrorBody, ExhaustedBody, TranscriptBody, UploadAck};
use crate::pipeline::{FetchError, TranscriptPipeline};
use crate::RelayError;

pub mod uploads;

pub use uploads::UploadLedger;

/// Shared, read-mostly state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<TranscriptPipeline>,
    uploads: Arc<UploadLedger>,
    require_video_id: bool,
}

impl AppState {
    pub fn new(pipeline: TranscriptPipeline, uploads: UploadLedger, require_video_id: bool) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            uploads: Arc::new(uploads),
            require_video_id,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            TranscriptPipeline::from_config(config)?,
            UploadLedger::new(config.upload_window()),
            config.uploads.require_video_id,
        ))
    }

    pub fn uploads(&self) -> &UploadLedger {
        &self.uploads
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Creates a 400 error with the provided message.
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Creates a 409 error with the provided message.
    fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    fn from_multipart(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: &self.message })).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Deserialize)]
struct TranscriptRequest {
    video_id: Option<String>,
}

/// Build the application router
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/transcript", post(fetch_transcript))
        .route(
            "/upload_transcript",
            post(upload_transcript).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .fallback(not_found)
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl+C
pub async fn serve(config: &Config, addr: SocketAddr) -> Result<()> {
    let state = AppState::from_config(config)?;
    tracing::info!(
        "Strategy chain: {} (language: {}, timeout per strategy: {}s)",
        state.pipeline.strategy_names().join(" -> "),
        state.pipeline.language(),
        state.pipeline.strategy_timeout().as_secs()
    );

    let app = router(state, config.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| RelayError::Bind { addr, source })?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RelayError::Server(e.to_string()))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", err);
    }
    tracing::info!("Shutting down");
}

async fn not_found() -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        message: "Not found".to_string(),
    }
}

async fn fetch_transcript(
    State(state): State<AppState>,
    payload: std::result::Result<Json<TranscriptRequest>, JsonRejection>,
) -> Response {
    let video_id = match payload {
        Ok(Json(request)) => request.video_id.unwrap_or_default(),
        Err(rejection) => {
            tracing::debug!("Rejected transcript request body: {}", rejection);
            String::new()
        }
    };

    let span = tracing::info_span!(
        "transcript_request",
        request_id = %Uuid::new_v4(),
        video_id = %video_id.trim()
    );

    match state.pipeline.fetch(&video_id).instrument(span).await {
        Ok(acquisition) => (StatusCode::OK, Json(TranscriptBody::from(&acquisition))).into_response(),
        Err(err @ FetchError::MissingVideoId) => ApiError::bad_request(err.to_string()).into_response(),
        Err(FetchError::Exhausted(report)) => {
            state.uploads.record_exhausted(video_id.trim());
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ExhaustedBody::from(&report)),
            )
                .into_response()
        }
    }
}

async fn upload_transcript(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadAck>> {
    let mut multipart = multipart.map_err(|rejection| {
        tracing::debug!("Rejected upload: {}", rejection);
        ApiError::bad_request("No file part")
    })?;

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut video_id: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(ApiError::from_multipart)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                // A plain form value named `file` is not a file part
                let Some(file_name) = field.file_name().map(str::to_owned) else {
                    continue;
                };
                let data = field.bytes().await.map_err(ApiError::from_multipart)?;
                file = Some((file_name, data.to_vec()));
            }
            Some("video_id") => {
                let text = field.text().await.map_err(ApiError::from_multipart)?;
                video_id = Some(text.trim().to_string()).filter(|id| !id.is_empty());
            }
            _ => {}
        }
    }

    let (file_name, data) = file.ok_or_else(|| ApiError::bad_request("No file part"))?;
    if file_name.is_empty() || data.is_empty() {
        return Err(ApiError::bad_request("No selected file"));
    }

    let content = String::from_utf8(data)
        .map_err(|_| ApiError::bad_request("Uploaded file is not valid UTF-8 text"))?;

    match &video_id {
        Some(id) if !state.uploads.claim(id) => {
            return Err(ApiError::conflict(
                "No failed transcript request is pending for this video",
            ));
        }
        None if state.require_video_id => {
            return Err(ApiError::bad_request("Missing video_id"));
        }
        _ => {}
    }

    tracing::info!(
        "Accepted uploaded transcript {} ({} bytes){}",
        file_name,
        content.len(),
        video_id
            .as_deref()
            .map(|id| format!(" for {}", id))
            .unwrap_or_default()
    );

    Ok(Json(UploadAck {
        transcript_uploaded: true,
        content,
        video_id,
    }))
}
