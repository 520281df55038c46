use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::error::Error;
use thiserror::Error;
use tracing::error;

use crate::backend::BackendError;
use crate::model::user::CredentialsError;
use crate::upload::UploadError;

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("BadRequest Status: `{0}`")]
    BadRequest(String),
    #[error("NotFound Status")]
    NotFound,
    #[error("Unauthorized Status")]
    Unauthorized,
    #[error(transparent)]
    Credentials(#[from] CredentialsError),
    #[error(transparent)]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("Backend error: `{0}`")]
    Backend(#[from] BackendError),
}

impl HttpError {
    fn status(&self) -> StatusCode {
        match self {
            HttpError::BadRequest(_) | HttpError::Credentials(_) | HttpError::Multipart(_) => {
                StatusCode::BAD_REQUEST
            }
            HttpError::NotFound => StatusCode::NOT_FOUND,
            HttpError::Unauthorized => StatusCode::UNAUTHORIZED,
            HttpError::Upload(UploadError::NotSignedIn) => StatusCode::UNAUTHORIZED,
            HttpError::Upload(e) if e.is_validation() => StatusCode::BAD_REQUEST,
            // The upload was attempted and failed on the photo's content
            HttpError::Upload(UploadError::MissingLocation) => StatusCode::UNPROCESSABLE_ENTITY,
            HttpError::Upload(_) => StatusCode::INTERNAL_SERVER_ERROR,
            // Rejections from the remote service keep their status
            HttpError::Backend(BackendError::Api { status, .. }) => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            HttpError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();

        if !status.is_client_error() {
            if let Some(source) = self.source() {
                error!("Error: {self}, caused by: {source}");
            } else {
                error!("Error: {self}");
            }
        }

        match self {
            HttpError::NotFound | HttpError::Unauthorized => status.into_response(),
            HttpError::BadRequest(message) => (status, message).into_response(),
            HttpError::Backend(BackendError::Api { message, .. }) => {
                (status, message).into_response()
            }
            other => (status, other.to_string()).into_response(),
        }
    }
}

pub type HttpResult<T = Response> = Result<T, HttpError>;
