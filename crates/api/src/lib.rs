#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Tawi API
//!
//! The HTTP entry points wiring the compiler, engine, session store, and
//! journal together, plus the scheduled-trigger ticker and the server
//! binary. The [`Runtime`] bundle is constructed explicitly in the
//! binary and injected as axum state — there are no globals, so tests
//! build a runtime over fakes and drive the same router.

pub mod config;
pub mod error;
pub mod handlers;
pub mod scheduler;
pub mod state;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;
pub use state::{Runtime, SharedRuntime};

/// Build the API router over a runtime.
pub fn router(runtime: SharedRuntime) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/workflows/validate", post(handlers::workflows::validate))
        .route("/workflows/compile", post(handlers::workflows::compile))
        .route("/workflows/execute", post(handlers::workflows::execute))
        .route(
            "/workflows/executions",
            get(handlers::executions::query),
        )
        .route(
            "/workflows/executions/{id}",
            get(handlers::executions::get_one),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(runtime)
}
