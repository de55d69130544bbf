//! Origin-token authentication for manifest requests.

use crate::server::error::ApiError;
use crate::server::AppContext;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

/// Header carrying the caller's origin token.
pub const TOKEN_HEADER: &str = "x-bakery-origin-token";

/// Middleware validating the origin token. A gateway running as localhost
/// skips the check entirely.
pub async fn origin_token_middleware(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !ctx.config.authenticate(token) {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "failed authenticating request",
            "authentication",
        ));
    }

    Ok(next.run(request).await)
}
