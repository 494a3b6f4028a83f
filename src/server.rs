//! HTTP server: router construction, binding and serving.

use crate::config::HttpConfig;
use crate::error::ServerError;
use crate::handlers::{index_handler, test_connection_handler};
use crate::shutdown::ShutdownSignal;
use crate::state::AppState;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the router with all routes and request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/test-connection", get(test_connection_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the listener to exactly `config.host:config.port`.
pub async fn bind(config: &HttpConfig) -> Result<TcpListener, ServerError> {
    let addr = format!("{}:{}", config.host, config.port);
    TcpListener::bind(&addr).await.map_err(|e| {
        ServerError::connection_with_source(format!("Failed to bind {}: {}", addr, e), e)
    })
}

/// Serve `app` until `shutdown` fires, then drain in-flight requests.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    mut shutdown: ShutdownSignal,
) -> Result<(), ServerError> {
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::internal(format!("Listener has no local address: {}", e)))?;

    info!("Server running on port {}", addr.port());
    info!("Probe endpoint: http://{}/test-connection", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.recv().await;
            info!("HTTP server received shutdown signal");
        })
        .await
        .map_err(|e| ServerError::internal(format!("HTTP server error: {}", e)))
}
