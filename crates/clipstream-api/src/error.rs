use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use clipstream_types::api::ApiErrorBody;

/// Every way a request can fail. Rendered as the JSON error envelope with the
/// transport status equal to `statusCode`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("All fields are required")]
    MissingFields,

    #[error("User with Email or Username already exist")]
    UserExists,

    /// No avatar file came with the form.
    #[error("Avatar file is required")]
    MissingAvatar,

    /// An avatar was sent but the asset host did not accept it.
    #[error("Avatar file is required")]
    AvatarUploadFailed,

    /// The user row vanished between insert and re-read.
    #[error("Something went wrong while registering the user")]
    RegistrationFailed,

    /// The request did not finish within the configured deadline.
    #[error("Request timed out")]
    Timeout,

    #[error("Invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Failed to stage upload: {0}")]
    Staging(#[from] std::io::Error),

    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingFields
            | ApiError::MissingAvatar
            | ApiError::AvatarUploadFailed
            | ApiError::Multipart(_) => StatusCode::BAD_REQUEST,
            ApiError::UserExists => StatusCode::CONFLICT,
            ApiError::Timeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::RegistrationFailed | ApiError::Staging(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Text shown to the client. Internal details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            ApiError::Multipart(_) => "Invalid multipart body".to_string(),
            ApiError::Staging(_) | ApiError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}", self);
        } else {
            debug!("emitting error response: {}", self);
        }

        let body = ApiErrorBody::new(status.as_u16(), self.public_message());
        (status, Json(body)).into_response()
    }
}
