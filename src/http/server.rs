//! HTTP server setup
//!
//! Builds the router, binds the listener and serves until the shutdown
//! signal fires.

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::{any::Any, net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    catch_panic::CatchPanicLayer, compression::CompressionLayer, limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::{error, info, instrument};

use crate::{
    config::{parse_size_string, validate_metrics_path, SystemConfig},
    http::handlers::*,
    types::{ConfigError, Error, Result},
};

/// Serve the API until `shutdown_signal` resolves and in-flight requests
/// drain
#[instrument(skip_all)]
pub async fn start_server(
    app_state: Arc<AppState>,
    shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let router = create_router(app_state.clone())?;
    let config = &app_state.config;

    let addr = parse_listen_address(&config.server.listen)?;

    info!(
        listen_addr = %addr,
        max_request_size = %config.server.max_request_size,
        request_timeout = config.server.request_timeout,
        metrics_enabled = config.monitoring.metrics_enabled,
        "Starting HTTP server"
    );

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        error!(
            error = %e,
            addr = %addr,
            "Failed to bind to address"
        );
        Error::Io(e)
    })?;

    info!(
        local_addr = %listener.local_addr().unwrap_or(addr),
        "HTTP server listening"
    );

    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        shutdown_signal.await;
        info!("Shutdown signal received, starting graceful shutdown");
    });

    if let Err(e) = server.await {
        error!(error = %e, "HTTP server error");
        return Err(Error::Io(e));
    }

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Create the router with all endpoints and middleware
pub fn create_router(app_state: Arc<AppState>) -> Result<Router> {
    let config = &app_state.config;
    let body_limit = usize::try_from(parse_size_string(&config.server.max_request_size)?)
        .map_err(|_| ConfigError::Invalid {
            message: format!(
                "max_request_size '{}' does not fit in memory",
                config.server.max_request_size
            ),
        })?;

    let mut router = Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/health", get(handle_health))
        .route("/status", get(handle_status));

    if config.monitoring.metrics_enabled {
        // axum panics on malformed paths, so a config that skipped
        // validation must fail here instead
        validate_metrics_path(&config.monitoring.metrics_path)?;
        router = router.route(&config.monitoring.metrics_path, get(handle_metrics));
    }

    let request_timeout = Duration::from_secs(config.server.request_timeout);

    Ok(router
        .fallback(handle_not_found)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CompressionLayer::new())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(app_state))
}

/// Turn a handler panic into a logged 500 instead of a dropped connection
fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    error!(panic = %detail, "Request handler panicked");
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error\n").into_response()
}

/// Parse the listen address from configuration
fn parse_listen_address(listen: &str) -> Result<SocketAddr> {
    listen.parse().map_err(|e| {
        error!(
            listen_addr = %listen,
            error = %e,
            "Invalid listen address format"
        );
        Error::Config(ConfigError::Invalid {
            message: format!("Invalid listen address '{}': {}", listen, e),
        })
    })
}
