use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::{Router, middleware};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::auth::require_auth;
use crate::core::ServerState;
use shared::error::AppError;

/// Multipart framing on top of the file itself
const BODY_LIMIT_MARGIN: usize = 64 * 1024;

/// HTTP 请求日志中间件
async fn log_request(
    request: http::Request<axum::body::Body>,
    next: middleware::Next,
) -> http::Response<axum::body::Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let started = std::time::Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        target: "http_access",
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        request_id = %request_id,
        "request"
    );

    response
}

/// Route table; the state is only needed for rate-limited routes
fn routes(state: &ServerState) -> Router<ServerState> {
    Router::<ServerState>::new()
        .merge(crate::api::health::router())
        .merge(crate::api::uploads::router())
        .merge(crate::api::auth::router(state))
        .merge(crate::api::users::router())
        .merge(crate::api::products::router())
        .merge(crate::api::orders::router())
        .merge(crate::api::payments::router())
        .merge(crate::api::wishlist::router())
        .merge(crate::api::newsletter::router())
        .merge(crate::api::contact::router())
        .merge(crate::api::content::router())
}

/// Build the complete application
///
/// Layers, outermost first: request id, access log, trace, CORS,
/// compression, body limit, then `require_auth` in front of the routes.
pub fn build_app(state: ServerState) -> Router {
    let body_limit = state.config.max_upload_bytes + BODY_LIMIT_MARGIN;

    routes(&state)
        // require_auth 内部跳过公共路由
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(log_request))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Plain HTTP listener around [`build_app`]
#[derive(Clone)]
pub struct HttpsService {
    router: Router,
    port: u16,
}

impl HttpsService {
    pub fn new(state: ServerState) -> Self {
        let port = state.config.http_port;
        Self {
            router: build_app(state),
            port,
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown_signal` resolves, then drain for up to 10 seconds
    pub async fn start_server<F>(&self, shutdown_signal: F) -> Result<(), AppError>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        tracing::info!("🚀 Starting HTTP server on {}", addr);

        let handle = axum_server::Handle::new();
        let handle_clone = handle.clone();
        tokio::spawn(async move {
            shutdown_signal.await;
            handle_clone.graceful_shutdown(Some(Duration::from_secs(10)));
        });

        axum_server::bind(addr)
            .handle(handle)
            .serve(
                self.router
                    .clone()
                    .into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

        Ok(())
    }
}
