use admin_console::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{InMemoryRepository, RepositoryState},
    seed_admin,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point of the reference accounts service the console runs against locally:
/// Configuration, Logging, Repository (seeded with an administrator), HTTP Server.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    // RUST_LOG wins; otherwise sensible defaults for local development.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "admin_console=debug,tower_http=info,axum=trace".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for log aggregators.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Accounts service starting in {:?} mode", config.env);

    // 4. Repository Initialization
    let repo = Arc::new(InMemoryRepository::new()) as RepositoryState;
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState { repo, config };

    if let Err(e) = seed_admin(&app_state).await {
        tracing::error!("FATAL: could not seed the administrator account: {}", e);
        std::process::exit(1);
    }

    // 5. Router and Server Startup
    let app = create_router(app_state);

    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("FATAL: could not bind {}: {}", bind_addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server terminated: {}", e);
        std::process::exit(1);
    }
}
