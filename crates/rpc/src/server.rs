use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use agrocast_core::{PredictionQuery, Predictor};
use agrocast_types::{HealthStatus, SegmentKey, SupportedCatalog};
use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::api::{
    numeric_input, round_price, ApiError, DataResponse, PredictRequest, PredictionData,
    INVALID_DATE, INVALID_NUMBERS,
};

#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<Predictor>,
    pub catalog: Arc<SupportedCatalog>,
    pub static_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(predictor: Arc<Predictor>, catalog: SupportedCatalog) -> Self {
        Self {
            predictor,
            catalog: Arc::new(catalog),
            static_dir: None,
        }
    }

    pub fn with_static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    fn static_assets_root(&self) -> Option<PathBuf> {
        self.static_dir.clone()
    }
}

type SharedState = Arc<AppState>;

pub async fn start_server(state: AppState, addr: &str) -> Result<()> {
    let app = build_router(state);
    let listener = bind_listener(addr).await?;
    info!("Price prediction API listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .await
        .context("RPC server terminated unexpectedly")
}

pub async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind RPC listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind RPC listener on {addr}"))
    }
}

pub fn build_router(state: AppState) -> Router {
    let state: SharedState = Arc::new(state);
    let mut router = Router::new()
        .route("/api/crops", get(handle_crops))
        .route("/api/predict", post(handle_predict))
        .route("/api/health", get(handle_health));

    if let Some(static_root) = state.static_assets_root() {
        if Path::new(&static_root).exists() {
            info!("Serving web UI assets from {:?}", static_root);
            router = router.fallback(serve_static_assets);
        } else {
            warn!("Web UI assets directory {:?} does not exist", static_root);
        }
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn serve_static_assets(State(state): State<SharedState>, req: Request<Body>) -> Response {
    let Some(static_root) = state.static_assets_root() else {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };

    let index_path = static_root.join("index.html");
    let service = ServeDir::new(static_root)
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new(index_path));

    match service.oneshot(req).await {
        Ok(response) => response.into_response(),
        Err(err) => {
            warn!("Static asset error: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to serve static asset: {err}"),
            )
                .into_response()
        }
    }
}

async fn handle_crops(
    State(state): State<SharedState>,
) -> Json<DataResponse<SupportedCatalog>> {
    Json(DataResponse::ok(state.catalog.as_ref().clone()))
}

async fn handle_health() -> Json<HealthStatus> {
    Json(HealthStatus::healthy(chrono::Utc::now().to_rfc3339()))
}

async fn handle_predict(
    State(state): State<SharedState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<DataResponse<PredictionData>>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        debug!("Rejected predict body: {}", rejection.body_text());
        ApiError::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    })?;

    let key = SegmentKey::normalized(&request.crop, &request.state);
    let date_text = request.date.trim().to_string();
    let rainfall = numeric_input(request.rainfall.as_ref())
        .ok_or_else(|| ApiError::bad_request(INVALID_NUMBERS))?;
    let demand = numeric_input(request.demand.as_ref())
        .ok_or_else(|| ApiError::bad_request(INVALID_NUMBERS))?;

    state
        .catalog
        .check(&key)
        .map_err(|err| ApiError::bad_request(err.to_string()))?;

    let date = NaiveDate::parse_from_str(&date_text, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request(INVALID_DATE))?;

    let query = PredictionQuery {
        key: key.clone(),
        date,
        rainfall,
        demand,
    };
    let predictor = Arc::clone(&state.predictor);
    let outcome = tokio::task::spawn_blocking(move || predictor.predict(&query))
        .await
        .map_err(|err| ApiError::internal(format!("An unexpected error occurred: {err}")))?;

    let price = outcome.map_err(|err| {
        if err.is_invalid_input() {
            ApiError::bad_request(err.to_string())
        } else {
            warn!("Prediction for {} failed: {}", key, err);
            ApiError::internal(err.to_string())
        }
    })?;

    Ok(Json(DataResponse::ok(PredictionData {
        crop: key.crop,
        state: key.state,
        date: date_text,
        rainfall,
        demand,
        predicted_price: round_price(price),
    })))
}
