use crate::session::{Session, SessionState};

/// DenyReason
///
/// Why a guarded navigation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No complete session is stored.
    NoSession,
    /// A session exists but its principal lacks the admin capability.
    InsufficientPrivilege,
}

/// Access
///
/// Outcome of a guard check. `Allow` carries the session that was validated so
/// the caller does not need to read the store a second time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Allow(Session),
    Deny(DenyReason),
}

impl Access {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Access::Allow(_))
    }
}

/// evaluate
///
/// The guard predicate: allowed iff a session is present with a non-empty token
/// and its principal holds the admin role.
pub fn evaluate(session: Option<&Session>) -> Access {
    match session {
        None => Access::Deny(DenyReason::NoSession),
        Some(session) if session.token().trim().is_empty() => Access::Deny(DenyReason::NoSession),
        Some(session) if !session.principal().is_admin() => {
            Access::Deny(DenyReason::InsufficientPrivilege)
        }
        Some(session) => Access::Allow(session.clone()),
    }
}

/// SessionGuard
///
/// Gates the protected views. It holds no result of its own: every call to
/// `authorize` reads the store again, so a session cleared elsewhere is observed
/// on the very next check.
#[derive(Clone)]
pub struct SessionGuard {
    sessions: SessionState,
}

impl SessionGuard {
    pub fn new(sessions: SessionState) -> Self {
        Self { sessions }
    }

    /// authorize
    ///
    /// Redirecting on `Deny` is the caller's job.
    pub fn authorize(&self) -> Access {
        let session = match self.sessions.load() {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("session cache unreadable, treating as signed out: {}", e);
                None
            }
        };

        let access = evaluate(session.as_ref());
        if let Access::Deny(reason) = &access {
            tracing::debug!(?reason, "guarded navigation denied");
        }
        access
    }
}
