use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("authentication failed")]
    Auth,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("storage error: {0}")]
    Storage(#[source] anyhow::Error),
}

impl ServiceError {
    pub(crate) fn storage<E>(err: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        ServiceError::Storage(err.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            ServiceError::Auth => StatusCode::UNAUTHORIZED,
            ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text safe to return to clients; storage causes stay in the logs.
    fn client_message(&self) -> String {
        match self {
            ServiceError::Storage(_) => "storage error".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();

        if let ServiceError::Storage(cause) = &self {
            error!(error = ?cause, "request failed");
        }

        let body = ErrorBody {
            error: self.client_message(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_4xx() {
        assert_eq!(
            ServiceError::InvalidRequest("latitude must be numeric".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ServiceError::Auth.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn storage_errors_are_server_errors() {
        let err = ServiceError::storage(anyhow::anyhow!("connection reset"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "storage error: connection reset");
    }

    #[test]
    fn storage_causes_are_not_sent_to_clients() {
        let err = ServiceError::storage(anyhow::anyhow!(
            "duplicate key value violates unique constraint \"speed_tests_pkey\""
        ));
        assert_eq!(err.client_message(), "storage error");
        assert_eq!(
            ServiceError::InvalidRequest("latitude must be numeric".into()).client_message(),
            "invalid request: latitude must be numeric"
        );
    }
}
