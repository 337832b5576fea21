use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Rejection raised before any upstream call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Prompt is required")]
    EmptyPrompt,
}

/// Classified outcome of a failed call to the generation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamFailure {
    /// No response was received (connection refused, DNS, reset, TLS...).
    #[error("Network Error: {message}")]
    Transport { message: String },
    #[error("timeout of {}ms exceeded", .timeout.as_millis())]
    Timeout { timeout: Duration },
    /// The endpoint answered with a non-2xx status.
    #[error("Request failed with status code {status}")]
    Status { status: u16, body: String },
    /// A status line arrived but the body could not be read to the end.
    #[error("Response body interrupted (status code {status}): {message}")]
    Body { status: u16, message: String },
}

impl UpstreamFailure {
    pub fn is_transport(&self) -> bool {
        matches!(self, UpstreamFailure::Transport { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamFailure::Transport { .. } => "transport",
            UpstreamFailure::Timeout { .. } => "timeout",
            UpstreamFailure::Status { .. } => "status",
            UpstreamFailure::Body { .. } => "body",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
    #[error("invalid URL in {name}: {reason}")]
    InvalidUrl { name: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    BadRequest(String),
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match self {
            ServiceError::Validation(_) | ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ServiceError::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "success": false,
            "message": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_messages_read_like_http_client_errors() {
        let timeout = UpstreamFailure::Timeout {
            timeout: Duration::from_secs(60),
        };
        assert_eq!(timeout.to_string(), "timeout of 60000ms exceeded");

        let status = UpstreamFailure::Status {
            status: 502,
            body: "bad gateway".into(),
        };
        assert_eq!(status.to_string(), "Request failed with status code 502");
        assert!(!status.is_transport());

        let body = UpstreamFailure::Body {
            status: 200,
            message: "connection closed before message completed".into(),
        };
        assert_eq!(body.kind(), "body");
        assert!(!body.is_transport());
    }

    #[test]
    fn validation_error_maps_to_bad_request() {
        let response = ServiceError::from(ValidationError::EmptyPrompt).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bad_request_renders_failure_envelope() {
        let response = ServiceError::BadRequest("Invalid request body: eof".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
            .await
            .expect("read body");
        let json: serde_json::Value = serde_json::from_slice(&bytes).expect("parse json");
        assert_eq!(
            json,
            serde_json::json!({ "success": false, "message": "Invalid request body: eof" })
        );
    }

    #[test]
    fn method_not_allowed_maps_to_405() {
        let response = ServiceError::MethodNotAllowed.into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
