//! Shared test harness: spins up the gateway plus fake origin and
//! propeller servers on ephemeral ports and drives them with reqwest.

#![allow(dead_code)]

use axum::{
    http::{header, StatusCode, Uri},
    response::IntoResponse,
    routing::any,
    Router,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bakery::config::Config;
use bakery::server::{create_router, AppContext};

/// Serve a router on an ephemeral port and return its address.
pub async fn spawn(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Start the gateway with the given configuration.
pub async fn spawn_gateway(config: Config) -> SocketAddr {
    let ctx = AppContext::new(config).unwrap();
    spawn(create_router(ctx)).await
}

/// A canned response the fake origin serves for one path.
#[derive(Clone)]
pub struct CannedResponse {
    pub content_type: &'static str,
    pub body: String,
    pub last_modified: Option<&'static str>,
}

impl CannedResponse {
    pub fn hls(body: &str) -> Self {
        Self {
            content_type: "application/x-mpegURL",
            body: body.to_string(),
            last_modified: None,
        }
    }

    pub fn dash(body: &str) -> Self {
        Self {
            content_type: "application/dash+xml",
            body: body.to_string(),
            last_modified: None,
        }
    }
}

/// A fake manifest origin: a map of paths to canned responses, 404 for
/// everything else.
pub async fn spawn_origin(routes: Vec<(&str, CannedResponse)>) -> SocketAddr {
    let map: Arc<HashMap<String, CannedResponse>> = Arc::new(
        routes
            .into_iter()
            .map(|(path, response)| (path.to_string(), response))
            .collect(),
    );

    let router = Router::new().fallback(any(move |uri: Uri| {
        let map = map.clone();
        async move {
            match map.get(uri.path()) {
                Some(canned) => {
                    let mut response = axum::response::Response::builder()
                        .status(StatusCode::OK)
                        .header(header::CONTENT_TYPE, canned.content_type);
                    if let Some(last_modified) = canned.last_modified {
                        response = response.header(header::LAST_MODIFIED, last_modified);
                    }
                    response.body(canned.body.clone().into()).unwrap()
                }
                None => StatusCode::NOT_FOUND.into_response(),
            }
        }
    }));

    spawn(router).await
}

/// A fake Propeller API serving canned channel and clip JSON documents
/// keyed by `orgID/id`, 404 for everything else.
pub async fn spawn_propeller(
    channels: Vec<(&str, serde_json::Value)>,
    clips: Vec<(&str, serde_json::Value)>,
) -> SocketAddr {
    let mut map: HashMap<String, serde_json::Value> = HashMap::new();
    for (key, value) in channels {
        let (org, id) = key.split_once('/').unwrap();
        map.insert(format!("/v1/organization/{org}/channel/{id}"), value);
    }
    for (key, value) in clips {
        let (org, id) = key.split_once('/').unwrap();
        map.insert(format!("/v1/organization/{org}/clip/{id}"), value);
    }
    let map = Arc::new(map);

    let router = Router::new().fallback(any(move |uri: Uri| {
        let map = map.clone();
        async move {
            match map.get(uri.path()) {
                Some(doc) => axum::Json(doc.clone()).into_response(),
                None => StatusCode::NOT_FOUND.into_response(),
            }
        }
    }));

    spawn(router).await
}

/// Gateway config pointing at a fake origin, auth bypassed via localhost.
pub fn gateway_config(origin: SocketAddr) -> Config {
    Config {
        origin_host: format!("http://{origin}"),
        ..Config::default()
    }
}

pub async fn get(gateway: SocketAddr, path: &str) -> reqwest::Response {
    reqwest::get(format!("http://{gateway}{path}")).await.unwrap()
}
