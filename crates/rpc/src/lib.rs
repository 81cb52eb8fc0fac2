//! HTTP surface of the price predictor: crop catalog, prediction and health
//! endpoints, plus optional static web UI assets.

pub mod api;
pub mod server;

pub use api::{ApiError, PredictRequest, PredictionData};
pub use server::{bind_listener, build_router, start_server, AppState};
