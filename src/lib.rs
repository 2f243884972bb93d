use axum::{
    extract::{FromRef, Request},
    http::HeaderName,
    Router,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Console core: session gate, account screen state machine, service client.
pub mod api;
pub mod console;
pub mod error;
pub mod guard;
pub mod manager;
pub mod notice;
pub mod session;

// Shared configuration and wire types.
pub mod config;
pub mod models;

// Reference accounts service (local development and end-to-end tests).
// A stand-in for the real identity/accounts backend: its token issuing and password
// checks are not part of the console's contract, which only consumes the HTTP
// interface through `AccountService`.
pub mod auth;
pub mod handlers;
pub mod repository;
pub mod routes;
use routes::{admin, public};
use auth::AuthAccount;

// --- Public Re-exports ---

pub use api::{AccountService, HttpAccountService, MockAccountService, ServiceState};
pub use config::AppConfig;
pub use console::{Action, Console, Route, Screen};
pub use error::ConsoleError;
pub use guard::{Access, DenyReason, SessionGuard};
pub use manager::{AccountManager, ManagerState};
pub use repository::{InMemoryRepository, RepositoryState};
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionState, SessionStore};

/// ApiDoc
///
/// Auto-generates the OpenAPI document of the reference accounts service from the
/// `#[utoipa::path]` handlers and `ToSchema` models. Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login, handlers::list_users, handlers::register_user,
        handlers::update_user, handlers::delete_user
    ),
    components(
        schemas(
            models::AccountRecord, models::LoginRequest, models::LoginResponse,
            models::CreateAccountRequest, models::UpdateAccountRequest, models::ErrorBody,
        )
    ),
    tags(
        (name = "admin-console", description = "Accounts service consumed by the admin console")
    )
)]
struct ApiDoc;

/// AppState
///
/// Implements the **Unified State Pattern** for the reference service: the single,
/// cheaply clonable container of its services and configuration.
#[derive(Clone)]
pub struct AppState {
    /// Account persistence (in-memory for the reference service).
    pub repo: RepositoryState,
    /// The loaded, immutable configuration (token secret and lifetime).
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Enforces authentication for the admin routes. Extracting `AuthAccount` rejects the
/// request with 401 before the handler runs when the token is missing, invalid,
/// expired, or belongs to a deleted account.
async fn auth_middleware(
    _caller: AuthAccount,
    request: Request,
    next: Next,
) -> Response {
    next.run(request).await
}

/// seed_admin
///
/// Ensures the configured administrator exists. Safe to call repeatedly.
pub async fn seed_admin(state: &AppState) -> Result<(), repository::RepositoryError> {
    if state
        .repo
        .find_by_username(&state.config.seed_admin_username)
        .await
        .is_some()
    {
        return Ok(());
    }

    let account = state
        .repo
        .create_account(models::CreateAccountRequest {
            username: state.config.seed_admin_username.clone(),
            email: format!("{}@localhost.localdomain", state.config.seed_admin_username),
            password: state.config.seed_admin_password.clone(),
            can_scan_qr: true,
            is_admin: true,
        })
        .await?;
    tracing::info!(account_id = %account.id, username = %account.username, "seeded administrator");
    Ok(())
}

/// create_router
///
/// Assembles the reference service's routes, applies global and scoped middleware,
/// and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration: the console may be served from any origin in development.
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // Admin routes: authentication as a route layer, role check inside the handlers.
        .merge(
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware
                ))
        )
        .with_state(state);

    // 3. Observability and Correlation Layers (Applied outermost/first)
    base_router
        .layer(
             ServiceBuilder::new()
                 .layer(SetRequestIdLayer::new(
                     x_request_id.clone(),
                     MakeRequestUuid,
                 ))
                 .layer(
                     TraceLayer::new_for_http()
                         .make_span_with(trace_span_logger)
                         .on_response(
                             DefaultOnResponse::new()
                                 .level(Level::INFO)
                                 .latency_unit(tower_http::LatencyUnit::Millis)
                         )
                 )
                 .layer(PropagateRequestIdLayer::new(x_request_id))
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span so every log line of one request carries its
/// `x-request-id`, method and URI.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
