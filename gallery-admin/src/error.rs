use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gallery_core::GalleryError;

/// Plain-text error response.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<GalleryError> for AppError {
    fn from(error: GalleryError) -> Self {
        let status = match &error {
            GalleryError::NotFound(_) => StatusCode::NOT_FOUND,
            GalleryError::Duplicate(_) | GalleryError::StemConflict { .. } => StatusCode::CONFLICT,
            GalleryError::InvalidImageDir(_) | GalleryError::PathEscape(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        GalleryError::from(error).into()
    }
}

impl From<MultipartError> for AppError {
    fn from(error: MultipartError) -> Self {
        Self::new(error.status(), error.body_text())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("Background task failed: {error}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("Request failed: {}", self.message);
        } else {
            tracing::debug!("Request rejected ({}): {}", self.status, self.message);
        }
        (self.status, self.message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gallery_errors_map_to_statuses() {
        let cases = [
            (GalleryError::NotFound("a.jpg".into()), StatusCode::NOT_FOUND),
            (GalleryError::Duplicate("a.jpg".into()), StatusCode::CONFLICT),
            (
                GalleryError::StemConflict {
                    src: "a.png".into(),
                    existing: "a.jpg".into(),
                },
                StatusCode::CONFLICT,
            ),
            (GalleryError::InvalidImageDir("/x/".into()), StatusCode::BAD_REQUEST),
            (GalleryError::InvalidManifest, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(AppError::from(error).status, status);
        }
    }
}
