use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Errors surfaced by the catalog, search, chat and scan layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Catalog file missing or malformed.
    #[error("Data source error: {0}")]
    DataSource(String),

    /// No embedding credentials, no vectors loaded, or the provider call failed.
    #[error("Embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Generative provider error: {0}")]
    Generation(String),

    /// Malformed or empty reranking output. Never returned to HTTP callers.
    #[error("Refinement failed: {0}")]
    Refinement(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::EmbeddingUnavailable(_) | Error::Generation(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Undecodable request bodies answer 400 in the usual error envelope.
impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::Validation(rejection.body_text())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {self}");
        }
        let body = serde_json::json!({ "success": false, "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::NotFound("Scan".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(Error::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::EmbeddingUnavailable("no key".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            Error::DataSource("missing".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(Error::NotFound("Product".into()).to_string(), "Product not found");
    }
}
