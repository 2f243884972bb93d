use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that are **unauthenticated**: the identity entry point and a health probe.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for local tooling and the end-to-end tests.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/login
        // Exchanges username/password for a bearer token plus the account record.
        .route("/auth/login", post(handlers::login))
}
