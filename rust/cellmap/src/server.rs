use crate::{
    config::AppConfig,
    db,
    error::{Result, ServiceError},
    extract::ApiJson,
    ingest::{IngestDetails, SampleIngestor, SpeedTestSubmission},
    state::AppState,
    store::{CellStore, PgStore},
};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{debug, info};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub struct Server {
    config: Arc<AppConfig>,
    state: AppState,
}

impl Server {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let pool = db::connect_pool(&config.database, "primary").await?;
        Ok(Self::with_store(config, Arc::new(PgStore::new(pool))))
    }

    /// Builds the server over an already constructed store.
    pub fn with_store(config: AppConfig, store: Arc<dyn CellStore>) -> Self {
        let config = Arc::new(config);
        let state = AppState::new(Arc::clone(&config), SampleIngestor::new(store));
        Self { config, state }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(Self::banner))
            .route("/healthz", get(Self::health))
            .route("/api/speedtest", post(Self::speedtest))
            .route("/api/download", get(Self::download))
            .route("/api/upload", post(Self::upload))
            .with_state(self.state.clone())
            .layer(DefaultBodyLimit::max(self.config.max_body_bytes))
            .layer(TimeoutLayer::new(self.config.request_timeout))
            .layer(cors_layer(&self.config))
            .layer(TraceLayer::new_for_http())
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.config.listen_addr;
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "speed test API listening");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    async fn banner() -> &'static str {
        "Speed Test API is running"
    }

    async fn health() -> Json<serde_json::Value> {
        Json(json!({ "status": "ok" }))
    }

    async fn speedtest(
        State(state): State<AppState>,
        headers: HeaderMap,
        ApiJson(submission): ApiJson<SpeedTestSubmission>,
    ) -> Result<(StatusCode, Json<SpeedTestResponse>)> {
        enforce_api_key(&headers, &state.config)?;
        let sample = state.ingestor.ingest(submission).await?;

        Ok((
            StatusCode::CREATED,
            Json(SpeedTestResponse {
                message: "Speed test saved successfully",
                details: IngestDetails::from(&sample),
            }),
        ))
    }

    async fn download(
        State(state): State<AppState>,
        Query(params): Query<DownloadParams>,
    ) -> Result<impl IntoResponse> {
        let len = params.byte_len(state.config.max_download_bytes)?;
        debug!(bytes = len, "serving download payload");
        Ok((
            [(header::CONTENT_TYPE, "application/octet-stream")],
            vec![0u8; len],
        ))
    }

    async fn upload(body: Bytes) -> StatusCode {
        debug!(bytes = body.len(), "upload payload received");
        StatusCode::OK
    }
}

#[derive(Debug, Serialize)]
pub struct SpeedTestResponse {
    pub message: &'static str,
    pub details: IngestDetails,
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadParams {
    /// Payload size in megabytes; fractional values are allowed.
    pub size: Option<f64>,
}

impl DownloadParams {
    fn byte_len(&self, cap: usize) -> Result<usize> {
        let size_mb = self.size.unwrap_or(1.0);
        if !size_mb.is_finite() || size_mb < 0.0 {
            return Err(ServiceError::InvalidRequest(
                "size must be a non-negative number of megabytes".into(),
            ));
        }
        let bytes = (size_mb * BYTES_PER_MB).floor();
        Ok(if bytes >= cap as f64 { cap } else { bytes as usize })
    }
}

fn enforce_api_key(headers: &HeaderMap, config: &AppConfig) -> Result<()> {
    if let Some(expected) = &config.api_key {
        let provided = headers
            .get("x-api-key")
            .and_then(|value| value.to_str().ok());

        if provided != Some(expected.as_str()) {
            return Err(ServiceError::Auth);
        }
    }

    Ok(())
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

    match &config.allowed_origins {
        None => cors.allow_origin(Any).allow_headers(Any),
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect();
            cors.allow_origin(origins).allow_headers([
                header::CONTENT_TYPE,
                header::ACCEPT,
                header::HeaderName::from_static("x-api-key"),
            ])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAP: usize = 50 * 1024 * 1024;

    #[test]
    fn download_defaults_to_one_megabyte() {
        assert_eq!(DownloadParams::default().byte_len(CAP).unwrap(), 1024 * 1024);
    }

    #[test]
    fn download_size_is_capped() {
        let params = DownloadParams { size: Some(500.0) };
        assert_eq!(params.byte_len(CAP).unwrap(), CAP);
    }

    #[test]
    fn download_accepts_fractions() {
        let params = DownloadParams { size: Some(0.5) };
        assert_eq!(params.byte_len(CAP).unwrap(), 512 * 1024);
    }

    #[test]
    fn download_rejects_negative_sizes() {
        let params = DownloadParams { size: Some(-1.0) };
        assert!(matches!(
            params.byte_len(CAP),
            Err(ServiceError::InvalidRequest(_))
        ));
    }
}
