//! HTTP front end for the action handlers. Each route accepts the same event
//! document a serverless runtime would deliver and answers with the envelope.

pub mod error;
pub mod routes;
pub mod state;

use actions_core::ActionRouter;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the application router around a shared [`ActionRouter`].
pub fn build_router(router: Arc<ActionRouter>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/api/handlers", get(routes::handlers::list_handlers))
        .route("/invoke", post(routes::invoke::invoke_default))
        .route("/invoke/{handler}", post(routes::invoke::invoke_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(router))
}

/// Start the server on the given port.
pub async fn serve(router: Arc<ActionRouter>, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!(port, "action server listening");
    serve_on(router, listener).await
}

/// Serve on an already-bound listener.
pub async fn serve_on(router: Arc<ActionRouter>, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let app = build_router(router);
    axum::serve(listener, app).await?;
    Ok(())
}
