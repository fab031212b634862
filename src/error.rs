use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
};

use crate::api::response;
use crate::pipeline::GENERIC_FAILURE_MESSAGE;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to fetch article: {0}")]
    FetchError(String),

    #[error("Error parsing article: {0}")]
    ParseError(String),

    #[error("Summarization error: {0}")]
    SummarizationError(String),

    #[error("Failed to load summarization model: {0}")]
    ModelError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// The only text a user ever sees for a failed request. The specific
    /// cause stays in the logs.
    pub fn user_message(&self) -> &'static str {
        GENERIC_FAILURE_MESSAGE
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::FetchError(_) => StatusCode::BAD_GATEWAY,
            AppError::ParseError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::SummarizationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ModelError(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        response::error::<()>(self.status_code(), self.user_message().to_string()).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::FetchError(err.to_string())
    }
}

impl From<candle_core::Error> for AppError {
    fn from(err: candle_core::Error) -> Self {
        AppError::SummarizationError(err.to_string())
    }
}

impl From<hf_hub::api::sync::ApiError> for AppError {
    fn from(err: hf_hub::api::sync::ApiError) -> Self {
        AppError::ModelError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_failure_shows_the_same_message() {
        let errors = [
            AppError::FetchError("dns".into()),
            AppError::ParseError("empty".into()),
            AppError::SummarizationError("oom".into()),
        ];
        for err in errors {
            assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);
        }
    }

    #[test]
    fn status_follows_failure_kind() {
        assert_eq!(AppError::FetchError(String::new()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            AppError::ParseError(String::new()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::SummarizationError(String::new()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
