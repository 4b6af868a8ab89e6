//! Error types for the transport module.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use castline_ipc::IpcError;
use thiserror::Error;
use tracing::warn;

/// Errors returned by HTTP handlers and the server.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Required form field is missing or empty.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Requested file name is not one castline serves.
    #[error("Invalid media path: {0}")]
    InvalidMediaPath(String),

    /// Requested file does not exist.
    #[error("Not found")]
    NotFound,

    /// Command could not be handed to the engine, or a value was invalid.
    #[error(transparent)]
    Ipc(#[from] IpcError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// HTTP status reported for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingField(_) | Self::InvalidMediaPath(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Ipc(IpcError::ChannelFull | IpcError::ChannelDisconnected) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Ipc(_) => StatusCode::BAD_REQUEST,
            Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for TransportError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "Request failed");
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(TransportError::MissingField("app").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            TransportError::Ipc(IpcError::InvalidStreamPath("/x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            TransportError::Ipc(IpcError::ChannelFull).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            TransportError::Io(std::io::Error::from(std::io::ErrorKind::NotFound)).status(),
            StatusCode::NOT_FOUND
        );
    }
}
