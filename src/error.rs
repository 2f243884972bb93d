use thiserror::Error;

// Fallback messages used when the service gives no reason of its own.
pub const LOAD_FAILED: &str = "Failed to load accounts.";
pub const SAVE_FAILED: &str = "Failed to save account.";
pub const DELETE_FAILED: &str = "Failed to delete account.";
pub const LOGIN_FAILED: &str = "Login failed. Please try again.";
pub const SESSION_EXPIRED: &str =
    "Your session has expired or you lack permission. Please sign in again.";

/// ConsoleError
///
/// The failure taxonomy of the console. None of these is fatal: every path that
/// produces one leaves the state machine in a stable, user-actionable state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    /// A local precondition failed (e.g. a required draft field is empty).
    /// Produced before any network call is attempted.
    #[error("{0}")]
    Validation(String),

    /// The service answered 401/403, or there was no session to authorize the call.
    /// Handled uniformly as session expiry.
    #[error("session expired (status {status})")]
    AuthExpired { status: u16 },

    /// Any other non-2xx answer, transport failure, or undecodable body.
    #[error("request failed (status {status:?}): {message:?}")]
    RequestFailed {
        status: Option<u16>,
        message: Option<String>,
    },

    /// The session cache could not be read or written.
    #[error("session storage error: {0}")]
    Storage(String),
}

impl ConsoleError {
    /// Status used when a call is refused locally because no session exists.
    pub const NO_SESSION_STATUS: u16 = 401;

    pub fn request_failed(status: Option<u16>, message: Option<String>) -> Self {
        Self::RequestFailed { status, message }
    }

    /// transport
    ///
    /// A network-level failure: no status and no server message.
    pub fn transport() -> Self {
        Self::RequestFailed {
            status: None,
            message: None,
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired { .. })
    }

    /// message_or
    ///
    /// The text to show the operator: the server-provided message (or the local
    /// validation reason) when there is one, otherwise `fallback`.
    pub fn message_or(&self, fallback: &str) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::RequestFailed {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            Self::AuthExpired { .. } => SESSION_EXPIRED.to_string(),
            _ => fallback.to_string(),
        }
    }
}
