use axum::{http::StatusCode, response::IntoResponse, Json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("No element matching `{selector}` appeared within {timeout_ms}ms")]
    ContentNotFound { selector: String, timeout_ms: u64 },

    #[error("Failed to extract prediction markets from {url}: {reason}")]
    Extraction { url: String, reason: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Scrape timed out after {0}s")]
    Timeout(u64),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Navigation and content errors are the page's fault; everything else is ours.
    pub fn is_page_failure(&self) -> bool {
        matches!(self, AppError::Navigation { .. } | AppError::ContentNotFound { .. })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
