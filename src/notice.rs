use std::time::{Duration, Instant};

/// Severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
}

/// Notice
///
/// A transient message for the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub severity: Severity,
    /// Disruptive notices (session expiry) stay up until dismissed explicitly.
    pub disruptive: bool,
    pub raised_at: Instant,
}

/// Notifier
///
/// The notification channel: at most one notice is visible at a time, and a new
/// notice replaces the previous one instead of queueing behind it.
#[derive(Debug, Clone)]
pub struct Notifier {
    current: Option<Notice>,
    ttl: Duration,
}

impl Notifier {
    pub fn new(ttl: Duration) -> Self {
        Self { current: None, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn raise(&mut self, message: impl Into<String>, severity: Severity) {
        self.raise_at(message, severity, false, Instant::now());
    }

    pub fn raise_disruptive(&mut self, message: impl Into<String>) {
        self.raise_at(message, Severity::Error, true, Instant::now());
    }

    /// raise_at
    ///
    /// Replaces the current notice. Exposed with an explicit clock for tests.
    pub fn raise_at(
        &mut self,
        message: impl Into<String>,
        severity: Severity,
        disruptive: bool,
        now: Instant,
    ) {
        let message = message.into();
        match severity {
            Severity::Success => tracing::info!(notice = %message),
            Severity::Error => tracing::warn!(notice = %message, disruptive),
        }
        self.current = Some(Notice {
            message,
            severity,
            disruptive,
            raised_at: now,
        });
    }

    pub fn dismiss(&mut self) {
        self.current = None;
    }

    /// current
    ///
    /// The visible notice at `now`, hiding a non-disruptive one past its lifetime.
    pub fn current(&self, now: Instant) -> Option<&Notice> {
        self.current
            .as_ref()
            .filter(|notice| notice.disruptive || now.duration_since(notice.raised_at) < self.ttl)
    }

    /// expire
    ///
    /// Drops the current notice if it has outlived the auto-dismiss duration.
    pub fn expire(&mut self, now: Instant) {
        if self.current(now).is_none() {
            self.current = None;
        }
    }
}
