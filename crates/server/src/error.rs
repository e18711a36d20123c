use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::{
    DbErr,
    models::{account::AccountError, image::ImageError, user::UserError},
};
use services::services::{
    caption::CaptionError, diffusion::DiffusionError, generation::GenerationError,
    storage::StorageError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error, ts_rs::TS)]
#[ts(type = "string")]
pub enum ApiError {
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<&'static str> for ApiError {
    fn from(msg: &'static str) -> Self {
        ApiError::BadRequest(msg.to_string())
    }
}

fn account_error_status(err: &AccountError) -> StatusCode {
    match err {
        AccountError::AccountNotFound | AccountError::UserNotFound => StatusCode::NOT_FOUND,
        AccountError::ImageNotOwnedByAccount => StatusCode::BAD_REQUEST,
        AccountError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn image_error_status(err: &ImageError) -> StatusCode {
    match err {
        ImageError::ImageNotFound | ImageError::UserNotFound | ImageError::AccountNotFound => {
            StatusCode::NOT_FOUND
        }
        ImageError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn generation_error_status(err: &GenerationError) -> StatusCode {
    match err {
        GenerationError::Validation(_) | GenerationError::NoMainImage => StatusCode::BAD_REQUEST,
        GenerationError::AccountNotFound => StatusCode::NOT_FOUND,
        GenerationError::Account(inner) => account_error_status(inner),
        GenerationError::Image(inner) => image_error_status(inner),
        GenerationError::Diffusion(DiffusionError::Timeout)
        | GenerationError::Caption(CaptionError::Timeout) => StatusCode::REQUEST_TIMEOUT,
        GenerationError::Diffusion(_)
        | GenerationError::Caption(_)
        | GenerationError::CaptionUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
        GenerationError::Storage(StorageError::Decode(_)) => StatusCode::BAD_REQUEST,
        GenerationError::Storage(_) | GenerationError::Database(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = match &self {
            ApiError::Account(err) => (account_error_status(err), "AccountError"),
            ApiError::Image(err) => (image_error_status(err), "ImageError"),
            ApiError::User(err) => match err {
                UserError::UserNotFound => (StatusCode::NOT_FOUND, "UserError"),
                UserError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "UserError"),
            },
            ApiError::Generation(err) => (generation_error_status(err), "GenerationError"),
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IoError"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UnauthorizedError"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFoundError"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequestError"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        };

        let error_message = match &self {
            ApiError::Unauthorized => "Unauthorized".to_string(),
            ApiError::NotFound(msg) | ApiError::BadRequest(msg) | ApiError::Internal(msg) => {
                msg.clone()
            }
            _ => format!("{}: {}", error_type, self),
        };

        if status_code.is_server_error() {
            tracing::error!(
                status = %status_code,
                error_type,
                error = %self,
                "API request failed"
            );
        }
        let response = ApiResponse::<()>::error(&error_message);
        (status_code, Json(response)).into_response()
    }
}
