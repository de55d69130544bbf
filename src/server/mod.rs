use crate::config::Config;
use crate::propeller::{PropellerApi, PropellerClient};
use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    middleware,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod auth;
pub mod error;
pub mod routes_manifest;

/// Shared application context. Everything in here is immutable after
/// startup; requests never share mutable state.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// Shared origin-fetch client carrying the configured timeout.
    pub http: reqwest::Client,
    /// Propeller client, present only when host and creds are configured.
    pub propeller: Option<Arc<PropellerClient>>,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let http = config.http_client();

        let propeller = if config.propeller.is_configured() {
            let client = PropellerClient::new(
                &config.propeller.host,
                &config.propeller.creds,
                config.client.timeout,
            )
            .context("configuring propeller client")?;
            Some(Arc::new(client))
        } else {
            tracing::info!("propeller origin disabled: host or creds not configured");
            None
        };

        Ok(Self {
            config: Arc::new(config),
            http,
            propeller,
        })
    }

    pub fn propeller_api(&self) -> Option<&dyn PropellerApi> {
        self.propeller.as_deref().map(|c| c as &dyn PropellerApi)
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    // every path that is not the healthcheck is a manifest request
    let manifest_routes = Router::new()
        .fallback(routes_manifest::serve_manifest)
        .layer(middleware::from_fn_with_state(
            ctx.clone(),
            auth::origin_token_middleware,
        ));

    Router::new()
        .route("/healthcheck", get(health_check))
        .merge(manifest_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check() -> impl IntoResponse {
    "OK"
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let addr = config.bind_addr();
    let ctx = AppContext::new(config)?;
    let app = create_router(ctx);

    tracing::info!("starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
