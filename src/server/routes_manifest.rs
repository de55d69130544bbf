//! The manifest handler: parse the filter path, resolve and fetch the
//! origin, run the matching filter engine, shape the response.

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode, Uri},
    response::Response,
};
use chrono::Utc;

use crate::filters::{self, FilterError};
use crate::origin::Origin;
use crate::parser;
use crate::server::error::ApiError;
use crate::server::AppContext;

pub async fn serve_manifest(
    State(ctx): State<AppContext>,
    uri: Uri,
) -> Result<Response, ApiError> {
    let path = uri.path();
    tracing::debug!(path, "received manifest request");

    // parse all the filters from the URL
    let (origin_path, media_filters) = parser::parse_path(path)
        .map_err(|e| ApiError::internal("failed parsing filters", e))?;

    // configure origin from path
    let origin = Origin::configure(&ctx.config, ctx.propeller_api(), &origin_path)
        .await
        .map_err(|e| ApiError::internal("failed configuring origin", e))?;

    // fetch manifest from origin
    let info = origin
        .fetch_manifest(&ctx.http)
        .await
        .map_err(|e| ApiError::internal("failed fetching manifest", e))?;

    if !media_filters.plugins.is_empty() {
        // plugin execution lives outside the filter core
        tracing::debug!(plugins = ?media_filters.plugins, "plugin chain requested");
    }

    // apply the filters to the origin manifest
    let filtered = filters::filter_manifest(
        &ctx.config,
        origin.playback_url(),
        &info.manifest,
        &media_filters,
    )
    .map_err(|e| match e {
        FilterError::UnsupportedProtocol => {
            ApiError::new(StatusCode::BAD_REQUEST, "failed to select filter", e)
        }
        other => ApiError::internal("failed to filter manifest", other),
    })?;

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, filtered.content_type);

    // cache advisory only applies to media playlists
    if let Some(max_age) = filtered.max_age.filter(|n| *n > 0) {
        response = response.header(header::CACHE_CONTROL, format!("max-age={max_age}"));
    }

    if let Some(last_modified) = info.last_modified {
        response = response.header(
            header::LAST_MODIFIED,
            last_modified
                .with_timezone(&Utc)
                .format("%a, %d %b %Y %H:%M:%S GMT")
                .to_string(),
        );
    }

    Ok(response.body(Body::from(filtered.body)).unwrap())
}
