use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] mongodb::bson::ser::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} request failed: {status} {body}")]
    Upstream {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{0} is missing in .env")]
    MissingApiKey(&'static str),

    #[error("{provider} unavailable: {reason}")]
    SourceUnavailable {
        provider: &'static str,
        reason: String,
    },

    #[error("invalid asset id: {0}")]
    InvalidAsset(String),

    #[error("{0} is already on the watchlist")]
    DuplicateAsset(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidAsset(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateAsset(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Upstream { .. }
            | AppError::MissingApiKey(_)
            | AppError::SourceUnavailable { .. }
            | AppError::Http(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
