use anyhow::{Context, Result};
use axum::{
    http::{HeaderName, HeaderValue, Method},
    middleware, Router,
};
use std::net::SocketAddr;
use tokio::signal;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use super::middleware::{logging_middleware, recover_panic, request_context, shape_exceptions};
use crate::config::ServerConfig;
use crate::metrics::middleware::track_metrics;

/// HTTP server with the fixed middleware chain applied around an application router.
///
/// Outermost first: CORS, request context, HTTP tracing, request logging,
/// metrics, exception shaping, panic recovery.
pub struct Server {
    config: ServerConfig,
    router: Router,
}

impl Server {
    pub fn new(config: ServerConfig, router: Router) -> Self {
        let mut router = router
            .layer(CatchPanicLayer::custom(recover_panic))
            .layer(middleware::from_fn(shape_exceptions))
            .layer(middleware::from_fn(track_metrics))
            .layer(middleware::from_fn(logging_middleware))
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn(request_context));

        if config.cors {
            router = router.layer(cors_layer(&config));
        }

        Self { config, router }
    }

    /// The fully layered router
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn serve(self) -> Result<()> {
        let addr = self.config.address();
        info!("Starting server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .context("Failed to bind server")?;

        info!("Server listening on {}", addr);

        axum::serve(
            listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

        info!("Server shutdown complete");
        Ok(())
    }
}

fn is_wildcard(values: &[String]) -> bool {
    values.is_empty() || values.iter().any(|v| v == "*")
}

/// Build the CORS layer. Wildcards cannot be combined with credentials, so
/// they mirror the request instead when credentials are allowed.
pub fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins = if !is_wildcard(&config.allow_origins) {
        AllowOrigin::list(config.allow_origins.iter().filter_map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|_| warn!(origin = %origin, "Ignoring invalid CORS origin"))
                .ok()
        }))
    } else if config.allow_credentials {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::any()
    };

    let methods = if !is_wildcard(&config.allow_methods) {
        AllowMethods::list(config.allow_methods.iter().filter_map(|method| {
            Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .map_err(|_| warn!(method = %method, "Ignoring invalid CORS method"))
                .ok()
        }))
    } else if config.allow_credentials {
        AllowMethods::mirror_request()
    } else {
        AllowMethods::any()
    };

    let headers = if !is_wildcard(&config.allow_headers) {
        AllowHeaders::list(config.allow_headers.iter().filter_map(|name| {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| warn!(header = %name, "Ignoring invalid CORS header"))
                .ok()
        }))
    } else if config.allow_credentials {
        AllowHeaders::mirror_request()
    } else {
        AllowHeaders::any()
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(config.allow_credentials)
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }

    info!("Starting graceful shutdown...");
}
