use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

use crate::classifier::ClassifierError;
use crate::emi::EmiError;

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// Bad request error (invalid input, unsupported upload, missing field).
    BadRequest(String),
    /// The statement could not be turned into usable text or structured data.
    ExtractionFailed(String),
    /// An optional collaborator required by the request is not configured.
    ServiceUnavailable(String),
    /// Error interacting with an external API.
    ExternalApiError(String),
    /// The deterministic pipeline could not produce a score.
    ScoringFailed(String),
    /// Internal server error.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::ExtractionFailed(msg) => write!(f, "Failed to process statement: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::ExternalApiError(msg) => write!(f, "External API error: {}", msg),
            AppError::ScoringFailed(msg) => write!(f, "Scoring failed: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Maps each error variant to an HTTP status code and JSON body.
    ///
    /// Client-facing variants carry their detail; server-side variants are
    /// logged in full and answered with a generic message.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::ExtractionFailed(msg) => {
                tracing::warn!("Statement processing failed: {}", msg);
                (
                    StatusCode::BAD_REQUEST,
                    format!("Failed to process statement: {}", msg),
                )
            }
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::ExternalApiError(msg) => {
                tracing::error!("External API error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "External service error".to_string(),
                )
            }
            AppError::ScoringFailed(msg) => {
                tracing::error!("Scoring error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Scoring failed: {}", msg),
                )
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source);
                return source.clone().into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        match self {
            AppError::BadRequest(msg) => AppError::BadRequest(msg.clone()),
            AppError::ExtractionFailed(msg) => AppError::ExtractionFailed(msg.clone()),
            AppError::ServiceUnavailable(msg) => AppError::ServiceUnavailable(msg.clone()),
            AppError::ExternalApiError(msg) => AppError::ExternalApiError(msg.clone()),
            AppError::ScoringFailed(msg) => AppError::ScoringFailed(msg.clone()),
            AppError::InternalError(msg) => AppError::InternalError(msg.clone()),
            AppError::WithContext { source, context } => AppError::WithContext {
                source: source.clone(),
                context: context.clone(),
            },
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalApiError(err.to_string())
    }
}

impl From<ClassifierError> for AppError {
    fn from(err: ClassifierError) -> Self {
        AppError::ScoringFailed(err.to_string())
    }
}

impl From<EmiError> for AppError {
    fn from(err: EmiError) -> Self {
        AppError::ScoringFailed(err.to_string())
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_response_uses_source_status() {
        let err: Result<(), AppError> = Err(AppError::BadRequest("empty file".to_string()));
        let wrapped = err.context("reading upload").unwrap_err();

        assert_eq!(wrapped.to_string(), "reading upload: Bad request: empty file");
        assert_eq!(wrapped.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn extraction_failures_are_client_errors() {
        let response = AppError::ExtractionFailed("Insufficient text".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn classifier_errors_become_scoring_failures() {
        let err: AppError = ClassifierError::SchemaMismatch {
            expected: 3,
            actual: 2,
        }
        .into();
        assert!(matches!(err, AppError::ScoringFailed(_)));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
