//! Error rendering for the request pipeline.
//!
//! Every failure maps to an HTTP status plus a JSON envelope. The envelope
//! groups the error chain under its highest-level component:
//!
//! ```json
//! { "message": "failed fetching manifest",
//!   "errors": { "fetching manifest": ["returning http status of 404"] } }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;

/// The error envelope body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub errors: HashMap<String, Vec<String>>,
}

/// A pipeline failure, ready to render.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: &'static str, err: impl Display) -> Self {
        Self {
            status,
            message,
            detail: err.to_string(),
        }
    }

    pub fn internal(message: &'static str, err: impl Display) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message, err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::info!(error = %self.detail, "{}", self.message);

        let mut chain = self.detail.split(": ");
        let category = chain.next().unwrap_or_default().to_string();
        let rest: Vec<String> = chain.map(str::to_string).collect();

        let body = ErrorResponse {
            message: self.message.to_string(),
            errors: HashMap::from([(category, rest)]),
        };

        (self.status, Json(body)).into_response()
    }
}
