//! HTTP surface: webhook intake plus the query/mutation API.

use {
    axum::{
        Router,
        routing::{get, post, put},
    },
    tower_http::{cors::CorsLayer, trace::TraceLayer},
    tracing::info,
};

pub mod caller;
pub mod routes;
pub mod state;
pub mod webhook;

pub use state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", get(webhook::verify).post(webhook::receive))
        .route("/api/threads", get(routes::list_threads))
        .route("/api/threads/{key}/viewed", put(routes::mark_thread_viewed))
        .route("/api/messages", get(routes::list_messages))
        .route("/api/messages/stats", get(routes::message_stats))
        .route(
            "/api/messages/{id}",
            get(routes::get_message).delete(routes::delete_message),
        )
        .route("/api/messages/{id}/viewed", put(routes::mark_message_viewed))
        .route("/api/send", post(routes::send))
        .route("/api/connection", get(routes::connection_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process ends.
pub async fn serve(state: AppState, bind: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{bind}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "gateway listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
