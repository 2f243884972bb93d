use std::{collections::VecDeque, future::Future, time::Instant};

use crate::{
    api::{AccountService, HttpAccountService, ServiceState},
    config::AppConfig,
    error::{ConsoleError, LOGIN_FAILED, SESSION_EXPIRED},
    guard::{self, Access, DenyReason, SessionGuard},
    manager::{AccountManager, Command, DraftField, Effect, Outcome, Request, Ticket},
    models::{AccountId, LoginRequest, Principal},
    notice::{Notice, Notifier},
    session::{FileSessionStore, Session, SessionState, SessionStore},
};
use std::sync::Arc;

/// Route
///
/// The console's navigable locations. `/` and unknown paths resolve to the login form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard,
    Accounts,
}

impl Route {
    pub fn parse(path: &str) -> Self {
        match path.trim_end_matches('/') {
            "/dashboard" => Route::Dashboard,
            "/users" => Route::Accounts,
            _ => Route::Login,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Dashboard => "/dashboard",
            Route::Accounts => "/users",
        }
    }

    pub fn is_guarded(self) -> bool {
        !matches!(self, Route::Login)
    }
}

/// Action
///
/// Operator input on the accounts view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Reload,
    OpenCreate,
    OpenEdit(AccountId),
    Edit(DraftField),
    CancelDialog,
    Save,
    RequestDelete(AccountId),
    ConfirmDelete,
    CancelDelete,
}

/// Completion
///
/// A finished network call, ready to be delivered back to the view that issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub ticket: Ticket,
    pub outcome: Outcome,
}

/// Screen
///
/// What the rendering layer should draw right now.
#[derive(Debug)]
pub enum Screen<'a> {
    Login {
        error: Option<&'a str>,
        denied: Option<DenyReason>,
    },
    Dashboard {
        principal: Principal,
    },
    Accounts {
        principal: Principal,
        manager: &'a AccountManager,
    },
}

// The mounted view. The account manager only exists while its view is mounted,
// so tearing the view down drops it together with its in-flight ticket.
#[derive(Debug)]
enum View {
    Login,
    Dashboard,
    Accounts(AccountManager),
}

/// Console
///
/// The single composition point. It evaluates the session guard on every
/// navigation, render and action, hosts the account manager while `/users` is
/// mounted, executes the manager's commands, and owns the invalidation path
/// (clear session, drop view, force re-authentication).
pub struct Console {
    sessions: SessionState,
    guard: SessionGuard,
    service: ServiceState,
    notifier: Notifier,
    view: View,
    login_error: Option<String>,
    denied: Option<DenyReason>,
}

impl Console {
    pub fn new(config: &AppConfig, sessions: SessionState, service: ServiceState) -> Self {
        Self {
            guard: SessionGuard::new(sessions.clone()),
            sessions,
            service,
            notifier: Notifier::new(config.notice_ttl),
            view: View::Login,
            login_error: None,
            denied: None,
        }
    }

    /// from_config
    ///
    /// Wires the file-backed session cache and the HTTP service client.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConsoleError> {
        let sessions = Arc::new(FileSessionStore::new(&config.session_path)) as SessionState;
        let service = Arc::new(HttpAccountService::from_config(config)?) as ServiceState;
        Ok(Self::new(config, sessions, service))
    }

    pub fn route(&self) -> Route {
        match self.view {
            View::Login => Route::Login,
            View::Dashboard => Route::Dashboard,
            View::Accounts(_) => Route::Accounts,
        }
    }

    /// The mounted account manager, if `/users` is showing.
    pub fn accounts(&self) -> Option<&AccountManager> {
        match &self.view {
            View::Accounts(manager) => Some(manager),
            _ => None,
        }
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notifier.current(Instant::now())
    }

    pub fn dismiss_notice(&mut self) {
        self.notifier.dismiss();
    }

    /// tick
    ///
    /// Lets the notification channel auto-dismiss. Called by the host's timer.
    pub fn tick(&mut self, now: Instant) {
        self.notifier.expire(now);
    }

    fn deny(&mut self, reason: DenyReason) {
        if matches!(self.view, View::Accounts(_)) {
            tracing::info!(?reason, "tearing down accounts view");
        }
        self.view = View::Login;
        self.denied = Some(reason);
    }

    /// screen
    ///
    /// Re-evaluates the guard on every call, so a session cleared elsewhere
    /// redirects on the next render.
    pub fn screen(&mut self) -> Screen<'_> {
        if self.route().is_guarded() {
            match self.guard.authorize() {
                Access::Allow(session) => {
                    let principal = session.principal().clone();
                    return match &self.view {
                        View::Accounts(manager) => Screen::Accounts { principal, manager },
                        _ => Screen::Dashboard { principal },
                    };
                }
                Access::Deny(reason) => self.deny(reason),
            }
        }

        Screen::Login {
            error: self.login_error.as_deref(),
            denied: self.denied,
        }
    }

    // --- Navigation and session lifecycle ---

    /// navigate
    ///
    /// Resolves `path`, applies the guard, and mounts the target view. Entering
    /// `/users` mounts a fresh account manager and runs its initial load.
    pub async fn navigate(&mut self, path: &str) -> Route {
        let route = Route::parse(path);

        if route.is_guarded() {
            if let Access::Deny(reason) = self.guard.authorize() {
                self.deny(reason);
                return Route::Login;
            }
        }

        self.denied = None;
        match route {
            Route::Login => self.view = View::Login,
            Route::Dashboard => self.view = View::Dashboard,
            Route::Accounts => {
                let mut manager = AccountManager::new();
                let effects = manager.mount();
                self.view = View::Accounts(manager);
                let commands = self.apply(effects);
                self.run(commands).await;
            }
        }

        tracing::debug!(path = route.path(), "navigated");
        self.route()
    }

    /// login
    ///
    /// Exchanges credentials for a session, persists it as one unit, then heads to
    /// the dashboard. The dashboard is guarded, so a non-admin lands back on the
    /// login form.
    pub async fn login(&mut self, username: &str, password: &str) -> Route {
        self.login_error = None;

        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response = match self.service.login(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(username, "login failed: {}", e);
                self.login_error = Some(e.message_or(LOGIN_FAILED));
                return self.route();
            }
        };

        let principal = Principal::from_account(&response.user);
        let persisted = Session::new(response.token, principal)
            .and_then(|session| self.sessions.persist(&session).map_err(ConsoleError::from));
        if let Err(e) = persisted {
            tracing::error!("could not establish session: {}", e);
            self.login_error = Some(LOGIN_FAILED.to_string());
            return self.route();
        }

        tracing::info!(username, "signed in");
        self.navigate(Route::Dashboard.path()).await
    }

    /// logout
    pub fn logout(&mut self) {
        if let Err(e) = self.sessions.clear() {
            tracing::error!("failed to clear session cache: {}", e);
        }
        self.view = View::Login;
        self.login_error = None;
        self.denied = None;
        tracing::info!("signed out");
    }

    /// expire_session
    ///
    /// The invalidation path for any 401/403: the session is cleared, the view is
    /// dropped (discarding any in-flight result), and the operator is sent back to
    /// the login form with a notice that stays until dismissed.
    pub fn expire_session(&mut self) {
        if let Err(e) = self.sessions.clear() {
            tracing::error!("failed to clear session cache: {}", e);
        }
        self.view = View::Login;
        self.denied = Some(DenyReason::NoSession);
        self.notifier.raise_disruptive(SESSION_EXPIRED);
        tracing::warn!("session invalidated after an authorization failure");
    }

    // --- Accounts view ---

    /// dispatch
    ///
    /// Routes an operator action to the mounted account manager and runs whatever
    /// calls it issues to completion.
    pub async fn dispatch(&mut self, action: Action) {
        let commands = self.start(action);
        self.run(commands).await;
    }

    /// start
    ///
    /// Applies an action and returns the calls to perform, without performing them.
    /// Hosts that drive calls themselves pair this with `perform` and `deliver`.
    pub fn start(&mut self, action: Action) -> Vec<Command> {
        if let Access::Deny(reason) = self.guard.authorize() {
            self.deny(reason);
            return Vec::new();
        }
        let View::Accounts(manager) = &mut self.view else {
            tracing::debug!(?action, "no accounts view mounted; action ignored");
            return Vec::new();
        };

        let effects = match action {
            Action::Reload => manager.reload(),
            Action::OpenCreate => manager.open_create(),
            Action::OpenEdit(id) => manager.open_edit(&id),
            Action::Edit(field) => manager.edit(field),
            Action::CancelDialog => manager.cancel_dialog(),
            Action::Save => manager.save(),
            Action::RequestDelete(id) => manager.request_delete(&id),
            Action::ConfirmDelete => manager.confirm_delete(),
            Action::CancelDelete => manager.cancel_delete(),
        };
        self.apply(effects)
    }

    /// perform
    ///
    /// Executes a command against the service. The returned future borrows nothing
    /// from the console, so the view may be torn down while it is outstanding. The
    /// bearer token is read from the session cache at call time; without a valid
    /// session the call is not made and the result is `AuthExpired`.
    pub fn perform(&self, command: Command) -> impl Future<Output = Completion> + Send + use<> {
        let service = self.service.clone();
        let sessions = self.sessions.clone();
        async move {
            let outcome = execute(service.as_ref(), sessions.as_ref(), command.request).await;
            Completion {
                ticket: command.ticket,
                outcome,
            }
        }
    }

    /// deliver
    ///
    /// Feeds a completion back to the mounted view. With no view mounted the result
    /// is discarded. Returns any follow-up calls (e.g. the reload after a save).
    pub fn deliver(&mut self, completion: Completion) -> Vec<Command> {
        let View::Accounts(manager) = &mut self.view else {
            tracing::debug!(ticket = ?completion.ticket, "view torn down; completion discarded");
            return Vec::new();
        };
        let effects = manager.complete(completion.ticket, completion.outcome);
        self.apply(effects)
    }

    fn apply(&mut self, effects: Vec<Effect>) -> Vec<Command> {
        let mut commands = Vec::new();
        for effect in effects {
            match effect {
                Effect::Request(command) => commands.push(command),
                Effect::Notify { message, severity } => self.notifier.raise(message, severity),
                Effect::SessionExpired => {
                    self.expire_session();
                    // The view is gone; nothing it asked for may run.
                    return Vec::new();
                }
            }
        }
        commands
    }

    async fn run(&mut self, commands: Vec<Command>) {
        let mut queue = VecDeque::from(commands);
        while let Some(command) = queue.pop_front() {
            let completion = self.perform(command).await;
            queue.extend(self.deliver(completion));
        }
    }
}

/// execute
///
/// Performs one request with the token of the current admin session.
async fn execute(
    service: &dyn AccountService,
    sessions: &dyn SessionStore,
    request: Request,
) -> Outcome {
    let session = sessions.load().unwrap_or_else(|e| {
        tracing::warn!("session cache unreadable: {}", e);
        None
    });
    let token = match guard::evaluate(session.as_ref()) {
        Access::Allow(session) => session.token().to_string(),
        Access::Deny(reason) => {
            tracing::info!(?reason, "refusing to call the service without a valid session");
            return refused(
                request,
                ConsoleError::AuthExpired {
                    status: ConsoleError::NO_SESSION_STATUS,
                },
            );
        }
    };

    match request {
        Request::List => Outcome::Listed(service.list_accounts(&token).await),
        Request::Create(body) => Outcome::Saved(service.create_account(&token, body).await),
        Request::Update { id, request } => {
            Outcome::Saved(service.update_account(&token, &id, request).await)
        }
        Request::Delete(id) => Outcome::Deleted(service.delete_account(&token, &id).await),
    }
}

fn refused(request: Request, error: ConsoleError) -> Outcome {
    match request {
        Request::List => Outcome::Listed(Err(error)),
        Request::Create(_) | Request::Update { .. } => Outcome::Saved(Err(error)),
        Request::Delete(_) => Outcome::Deleted(Err(error)),
    }
}
