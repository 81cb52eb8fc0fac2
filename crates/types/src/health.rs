use serde::Serialize;

/// Public liveness payload returned by `/api/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub success: bool,
    pub status: &'static str,
    /// ISO-8601 timestamp of the check.
    pub timestamp: String,
}

impl HealthStatus {
    pub fn healthy(timestamp: impl Into<String>) -> Self {
        Self {
            success: true,
            status: "healthy",
            timestamp: timestamp.into(),
        }
    }
}
