use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Everything a request can fail with. Each variant maps to one HTTP
/// status; error bodies are uniformly `{"success": false, "error": ...}`.
/// None of these are retried and none are fatal to the process.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network or HTTP failure while scraping.
    #[error("fetch failed: {0}")]
    Fetch(String),
    /// The page body could not be read.
    #[error("unreadable page: {0}")]
    Parse(String),
    /// A required field is missing or invalid. Rejected before any
    /// persistence attempt.
    #[error("{0}")]
    Validation(String),
    /// Missing or incorrect admin secret.
    #[error("Unauthorized")]
    Auth,
    /// The catalog file rewrite failed. The in-memory sequence has
    /// already advanced and is not rolled back.
    #[error("failed to save product: {0}")]
    Persist(String),
    /// The payment processor call failed.
    #[error("{0}")]
    Payment(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth => StatusCode::UNAUTHORIZED,
            ApiError::Fetch(_)
            | ApiError::Parse(_)
            | ApiError::Persist(_)
            | ApiError::Payment(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(json!({ "success": false, "error": self.to_string() }))
    }
}
