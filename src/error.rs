//! Error types.
//!
//! [`FetchError`] is internal to the fetchers and the profile extractor: it is
//! logged and converted to an empty result at the fetcher boundary and never
//! reaches the orchestrator's caller. [`ApiError`] is what HTTP handlers return.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Failure while talking to a judge or to the text-generation service.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Connection failure, timeout, or undecodable body.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// The API answered but reported an error in its payload.
    #[error("API error: {0}")]
    Api(String),

    /// The API answered with a shape we do not understand.
    #[error("invalid response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("user not found: {0}")]
    UserNotFound(String),

    /// A required credential was not configured.
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
}

/// Error returned from HTTP handlers, rendered as a JSON body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
