//! Wire types for the JSON API.
//!
//! Every response carries `success`; successful ones add `data`, failed ones
//! add `error`.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const INVALID_NUMBERS: &str =
    "Invalid input values. Please check rainfall and demand are numbers.";
pub const INVALID_DATE: &str = "Invalid date format. Use YYYY-MM-DD";

#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let payload = Json(ErrorResponse {
            success: false,
            error: self.message,
        });
        (self.status, payload).into_response()
    }
}

/// Body of `POST /api/predict`.
///
/// Rainfall and demand are kept as raw JSON so that numeric strings can be
/// accepted alongside numbers.
#[derive(Debug, Default, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub crop: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub rainfall: Option<Value>,
    #[serde(default)]
    pub demand: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionData {
    pub crop: String,
    pub state: String,
    pub date: String,
    pub rainfall: f64,
    pub demand: f64,
    pub predicted_price: f64,
}

/// Absent → 0, number → itself, numeric string → parsed. Anything else
/// (null, bool, non-numeric text) is rejected.
pub fn numeric_input(value: Option<&Value>) -> Option<f64> {
    match value {
        None => Some(0.0),
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        Some(_) => None,
    }
}

pub fn round_price(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}
