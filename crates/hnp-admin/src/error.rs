//! Error types for the admin control plane.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hnp_room::RoomError;

/// Authentication failure. Raised before any action runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Header missing or secret wrong. Deliberately indistinguishable.
    #[error("unauthorized")]
    Unauthorized,
}

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error("unknown admin action: {0}")]
    UnknownAction(String),

    #[error("action {0} needs a room id")]
    MissingRoom(&'static str),

    #[error("invalid admin header name: {0}")]
    InvalidHeader(String),

    /// The HTTP request itself failed (client side).
    #[error("admin request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an unexpected status (client side).
    #[error("admin server answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("admin server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdminError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Room(RoomError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Room(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::UnknownAction(_) | Self::MissingRoom(_) | Self::InvalidHeader(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Http(_) | Self::Status { .. } | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
