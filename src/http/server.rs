//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum Router with the forwarding handler as fallback
//! - Wire up middleware (tracing, timeout, body limit, request ID)
//! - Hold the hot-swappable route table and the client registry
//! - Dispatch each request to the matched route's upstream
//! - Serve the optional health-check path
//!
//! # Design Decisions
//! - The route table lives behind `ArcSwap`; reloads never block requests
//! - The registry outlives reloads, so unchanged targets keep their pools
//! - Dropping the handler future (client went away) drops the upstream call

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::config::{compile_routes, transport_options, ConfigError, GatewayConfig};
use crate::http::request::{self, propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::http::response;
use crate::observability::metrics;
use crate::routing::RouteTable;
use crate::upstream::{ClientRegistry, ForwardOutcome};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<ArcSwap<RouteTable>>,
    pub max_body_size: usize,
    pub health_check_path: Option<Arc<str>>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    config: GatewayConfig,
    routes: Arc<ArcSwap<RouteTable>>,
    registry: ClientRegistry,
}

impl HttpServer {
    /// Create a server with an HTTP client registry built from `config`.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        let registry = ClientRegistry::http(transport_options(&config));
        Self::with_registry(config, registry)
    }

    /// Create a server that obtains upstream clients from `registry`.
    pub fn with_registry(config: GatewayConfig, registry: ClientRegistry) -> Result<Self, ConfigError> {
        let table = compile_routes(&config, &registry).map_err(ConfigError::Validation)?;
        tracing::info!(routes = table.len(), "Route table compiled");
        Ok(Self {
            config,
            routes: Arc::new(ArcSwap::from_pointee(table)),
            registry,
        })
    }

    /// Compile `config` and swap the new route table in.
    ///
    /// Only routes and translations are reloaded; listener and timeout changes
    /// need a restart.
    pub fn reload(&self, config: &GatewayConfig) -> Result<(), ConfigError> {
        reload_routes(&self.routes, &self.registry, config)
    }

    pub fn route_table(&self) -> Arc<RouteTable> {
        self.routes.load_full()
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        let state = AppState {
            routes: self.routes.clone(),
            max_body_size: self.config.listener.max_body_size,
            health_check_path: self.config.listener.health_check_path.as_deref().map(Arc::from),
        };

        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(handler_timeout(&self.config)))
            .layer(RequestBodyLimitLayer::new(self.config.listener.max_body_size))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Serve on `listener` until `shutdown` fires.
    ///
    /// Configurations received on `config_updates` replace the route table.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router();

        let routes = self.routes.clone();
        let registry = self.registry.clone();
        let reloader = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                if let Err(e) = reload_routes(&routes, &registry, &config) {
                    tracing::error!(error = %e, "Rejected configuration update, keeping current routes");
                }
            }
        });

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        result
    }
}

/// Outer bound on a whole request; leaves room for the upstream's own timeouts.
fn handler_timeout(config: &GatewayConfig) -> Duration {
    Duration::from_secs(config.timeouts.connect_secs + config.timeouts.request_secs)
}

fn reload_routes(
    routes: &ArcSwap<RouteTable>,
    registry: &ClientRegistry,
    config: &GatewayConfig,
) -> Result<(), ConfigError> {
    let table = compile_routes(config, registry).map_err(ConfigError::Validation)?;
    tracing::info!(routes = table.len(), "Route table reloaded");
    routes.store(Arc::new(table));
    Ok(())
}

/// Matches the route, buffers the body and forwards to the upstream.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request.request_id().unwrap_or("unknown").to_string();

    if let Some(health) = &state.health_check_path {
        if request.uri().path() == health.as_ref() {
            return StatusCode::OK.into_response();
        }
    }

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
        route = tracing::field::Empty,
    );

    async move {
        let (parts, body) = request.into_parts();

        let table = state.routes.load_full();
        let Some(matched) = table.match_request(&parts) else {
            tracing::debug!("No route matched");
            metrics::record_route_miss();
            return response::no_route(&request_id);
        };

        let route = matched.route.name().to_string();
        tracing::Span::current().record("route", route.as_str());
        let upstream = matched.route.upstream().clone();
        let ctx = matched.context(&parts, &request_id);

        let req = match request::buffer(parts, body, state.max_body_size).await {
            Ok(req) => req,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected request body");
                let res = response::body_error(&e, &request_id);
                metrics::record_request(&route, "rejected", res.status().as_u16(), start);
                return res;
            }
        };

        tracing::debug!(upstream = %upstream.target(), "Forwarding request");
        let outcome = upstream.execute(&ctx, req).await;
        let state_name = outcome.state().as_str();
        let res = match outcome {
            ForwardOutcome::Completed(res) | ForwardOutcome::Translated(res) => {
                response::from_proxy(res)
            }
            ForwardOutcome::Propagated(err) => response::forward_error(&err, &request_id),
        };

        tracing::debug!(status = res.status().as_u16(), "Request finished");
        metrics::record_request(&route, state_name, res.status().as_u16(), start);
        res
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::error::DispatchError;
    use crate::http::message::{ProxyRequest, ProxyResponse};
    use crate::upstream::Transport;
    use axum::body::{self, Bytes};
    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;
    use tower::ServiceExt;

    /// Answers with the outbound method and URI in the body.
    struct Echo;

    impl Transport for Echo {
        fn send(&self, req: ProxyRequest) -> BoxFuture<'static, Result<ProxyResponse, DispatchError>> {
            let body = format!("{} {}", req.method(), req.uri());
            async move {
                Ok(axum::http::Response::builder()
                    .status(201)
                    .header("server", "echo")
                    .body(Bytes::from(body))
                    .unwrap())
            }
            .boxed()
        }
    }

    fn server(toml: &str) -> HttpServer {
        let registry = ClientRegistry::new(|_| Arc::new(Echo) as Arc<dyn Transport>);
        HttpServer::with_registry(parse_config(toml).unwrap(), registry).unwrap()
    }

    const CONFIG: &str = r#"
        [listener]
        health_check_path = "/healthz"

        [[routes]]
        name = "items"
        path = "/items/{id}"
        upstream = { uri = "http://backend/api" }
        remapping = { path = "/v2/items/{id}" }
        response_headers = { deny = ["server"] }
        status = [{ from = [201], to = "OK" }]
    "#;

    async fn call(server: &HttpServer, uri: &str) -> Response {
        server
            .router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_forwards_matched_route() {
        let server = server(CONFIG);
        let res = call(&server, "/items/7?q=1").await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get("server").is_none());
        assert!(res.headers().contains_key("x-request-id"));

        let body = body::to_bytes(res.into_body(), 1024).await.unwrap();
        assert_eq!(body, "GET /v2/items/7");
    }

    #[tokio::test]
    async fn test_no_route_and_health() {
        let server = server(CONFIG);
        assert_eq!(call(&server, "/other").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(call(&server, "/healthz").await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_reload_swaps_routes() {
        let server = server(CONFIG);
        let updated = parse_config(
            r#"
            [[routes]]
            name = "other"
            path_prefix = "/other"
            upstream = { uri = "http://backend" }
            "#,
        )
        .unwrap();
        server.reload(&updated).unwrap();

        assert_eq!(server.route_table().routes()[0].name(), "other");
        assert_eq!(call(&server, "/other").await.status(), StatusCode::CREATED);
        assert_eq!(call(&server, "/items/7").await.status(), StatusCode::NOT_FOUND);
    }
}
