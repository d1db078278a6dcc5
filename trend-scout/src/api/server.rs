//! API server setup and configuration.

use axum::Router;
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::api::middleware::ApiKeyAuth;
use crate::api::routes;
use crate::config::EnvSource;
use crate::services::ServiceContainer;
use crate::{Error, Result};

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Server bind address
    pub bind_address: String,
    /// Server port
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Request body size limit in bytes
    pub body_limit: usize,
    /// Keys accepted on `/queue/*`; empty disables the check
    pub api_keys: Vec<String>,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            body_limit: 1024 * 1024, // 1MB
            api_keys: Vec::new(),
        }
    }
}

impl ApiServerConfig {
    /// Load API server config, falling back to defaults.
    ///
    /// Supported keys:
    /// - `API_BIND_ADDRESS` (e.g. "0.0.0.0")
    /// - `API_PORT` (e.g. "8080")
    /// - `API_ENABLE_CORS` ("true"/"false")
    /// - `API_BODY_LIMIT_BYTES`
    /// - `API_KEYS` (comma-separated)
    pub fn from_source(env: &EnvSource<'_>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            bind_address: env.string("API_BIND_ADDRESS", &defaults.bind_address),
            port: env.parse("API_PORT", defaults.port)?,
            enable_cors: env.parse("API_ENABLE_CORS", defaults.enable_cors)?,
            body_limit: env.parse("API_BODY_LIMIT_BYTES", defaults.body_limit)?,
            api_keys: env.list("API_KEYS").unwrap_or_default(),
        })
    }
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Server start time
    pub start_time: Instant,
    pub services: Arc<ServiceContainer>,
    pub auth: ApiKeyAuth,
}

impl AppState {
    pub fn new(services: Arc<ServiceContainer>, api_keys: Vec<String>) -> Self {
        Self {
            start_time: Instant::now(),
            services,
            auth: ApiKeyAuth::new(api_keys),
        }
    }
}

/// API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    /// Create a new API server.
    pub fn new(config: ApiServerConfig, services: Arc<ServiceContainer>) -> Self {
        let state = AppState::new(services, config.api_keys.clone());
        Self {
            config,
            state,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Stop serving when `token` is cancelled.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    /// Get the cancellation token for graceful shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Build the router with all middleware and routes.
    pub fn build_router(&self) -> Router {
        build_router(&self.config, self.state.clone())
    }

    /// Start the server.
    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| Error::config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("API server listening on http://{}", addr);

        let cancel_token = self.cancel_token.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                tracing::info!("API server shutting down...");
            })
            .await?;

        Ok(())
    }
}

/// Answer bare `OPTIONS` requests that aren't CORS preflights.
async fn answer_options(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    next.run(request).await
}

fn is_health_probe(req: &Request) -> bool {
    req.uri().path().starts_with("/health")
}

/// Routes plus CORS, body limit and request tracing.
pub fn build_router(config: &ApiServerConfig, state: AppState) -> Router {
    let mut router = routes::create_router(state)
        .layer(axum::middleware::from_fn(answer_options))
        .layer(DefaultBodyLimit::max(config.body_limit));

    // Add CORS if enabled
    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router = router.layer(cors);
    }

    // Add tracing
    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(|req: &Request| {
                if is_health_probe(req) {
                    Span::none()
                } else {
                    let mut make_span =
                        tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO);
                    use tower_http::trace::MakeSpan;
                    make_span.make_span(req)
                }
            })
            .on_request(|req: &Request, span: &Span| {
                if span.is_disabled() || is_health_probe(req) {
                    return;
                }
                let mut on_request =
                    tower_http::trace::DefaultOnRequest::new().level(tracing::Level::INFO);
                use tower_http::trace::OnRequest;
                on_request.on_request(req, span);
            })
            .on_response(
                |res: &axum::http::Response<_>, latency: Duration, span: &Span| {
                    if span.is_disabled() {
                        return;
                    }
                    let on_response =
                        tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO);
                    use tower_http::trace::OnResponse;
                    on_response.on_response(res, latency, span);
                },
            ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ApiServerConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert!(config.enable_cors);
        assert!(config.api_keys.is_empty());
    }
}
