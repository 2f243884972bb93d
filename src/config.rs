use std::{env, path::PathBuf, time::Duration};

const DEFAULT_API_URL: &str = "http://localhost:5000";
const DEFAULT_SESSION_PATH: &str = ".admin-console/session.json";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded and
/// shared by both halves of the crate: the console (API location, session cache,
/// notice lifetime, timeouts) and the reference accounts service (bind address,
/// token signing, seed administrator). Pulled into the service state via FromRef.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and which secrets are mandatory.
    pub env: Env,
    // Base URL of the accounts service the console talks to.
    pub api_url: String,
    // Where the console keeps its session cache between runs.
    pub session_path: PathBuf,
    // How long a non-disruptive notice stays visible.
    pub notice_ttl: Duration,
    // Per-request timeout for calls to the accounts service.
    pub request_timeout: Duration,
    // Listen address of the reference accounts service.
    pub bind_addr: String,
    // HS256 secret used to sign and validate bearer tokens.
    pub jwt_secret: String,
    // Lifetime of issued bearer tokens.
    pub token_ttl: Duration,
    // Administrator account created when the reference service starts.
    pub seed_admin_username: String,
    pub seed_admin_password: String,
}

/// Env
///
/// Defines the runtime context: developer-friendly defaults locally, explicit
/// secrets and machine-readable logs in production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// default
    ///
    /// Provides a safe, non-panicking AppConfig instance primarily used for test setup,
    /// without needing environment variables.
    fn default() -> Self {
        Self {
            env: Env::Local,
            api_url: DEFAULT_API_URL.to_string(),
            session_path: PathBuf::from(DEFAULT_SESSION_PATH),
            notice_ttl: Duration::from_millis(6000),
            request_timeout: Duration::from_secs(15),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            token_ttl: Duration::from_secs(3600),
            seed_admin_username: "admin".to_string(),
            seed_admin_password: "admin".to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// The canonical function for initializing configuration at startup. Reads all
    /// parameters from environment variables and implements the **fail-fast** principle.
    ///
    /// # Panics
    /// Panics in `Production` if `ADMIN_JWT_SECRET` or `ADMIN_SEED_PASSWORD` is not set,
    /// so the service never starts with a guessable signing key or admin password.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let defaults = Self::default();

        let (jwt_secret, seed_admin_password) = match env {
            Env::Production => (
                env::var("ADMIN_JWT_SECRET")
                    .expect("FATAL: ADMIN_JWT_SECRET must be set in production."),
                env::var("ADMIN_SEED_PASSWORD")
                    .expect("FATAL: ADMIN_SEED_PASSWORD must be set in production."),
            ),
            Env::Local => (
                env::var("ADMIN_JWT_SECRET").unwrap_or(defaults.jwt_secret),
                env::var("ADMIN_SEED_PASSWORD").unwrap_or(defaults.seed_admin_password),
            ),
        };

        Self {
            env,
            api_url: env::var("ADMIN_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            session_path: env::var("ADMIN_SESSION_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.session_path),
            notice_ttl: parse_var("ADMIN_NOTICE_TTL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.notice_ttl),
            request_timeout: parse_var("ADMIN_REQUEST_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            bind_addr: env::var("ADMIN_BIND_ADDR").unwrap_or(defaults.bind_addr),
            jwt_secret,
            token_ttl: parse_var("ADMIN_TOKEN_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.token_ttl),
            seed_admin_username: env::var("ADMIN_SEED_USERNAME")
                .unwrap_or(defaults.seed_admin_username),
            seed_admin_password,
        }
    }
}

// Unset or unparseable numbers fall back to the default.
fn parse_var(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|value| value.trim().parse().ok())
}
