use std::sync::atomic::{AtomicU64, Ordering};

use crate::{
    error::{ConsoleError, DELETE_FAILED, LOAD_FAILED, SAVE_FAILED},
    models::{AccountId, AccountRecord, CreateAccountRequest, UpdateAccountRequest},
    notice::Severity,
};

// Process-wide so that a completion from a torn-down view can never match the
// ticket of a newer view.
static NEXT_TICKET: AtomicU64 = AtomicU64::new(1);

/// Ticket
///
/// Identifies one outstanding network call. The manager accepts exactly one
/// completion per ticket, and only for the ticket it is currently waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

impl Ticket {
    fn next() -> Self {
        Ticket(NEXT_TICKET.fetch_add(1, Ordering::Relaxed))
    }
}

// --- Draft ---

/// DialogMode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogMode {
    Create,
    Edit(AccountId),
}

/// DraftField
///
/// A single field edit coming from the dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftField {
    Username(String),
    Email(String),
    Password(String),
    CanScanQr(bool),
    IsAdmin(bool),
}

/// DraftForm
///
/// The locally edited copy of an account while the dialog is open. It never
/// aliases a record in the list: edits stay local until the save succeeds and the
/// list is reloaded from the service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DraftForm {
    pub username: String,
    pub email: String,
    pub can_scan_qr: bool,
    pub is_admin: bool,
    // `Some` only in create mode; edit mode never transmits a password.
    password: Option<String>,
}

impl DraftForm {
    /// Blank draft for create mode, with an empty password.
    pub fn empty() -> Self {
        Self {
            password: Some(String::new()),
            ..Self::default()
        }
    }

    /// Copy of a record's editable fields for edit mode.
    pub fn from_record(record: &AccountRecord) -> Self {
        Self {
            username: record.username.clone(),
            email: record.email.clone(),
            can_scan_qr: record.can_scan_qr,
            is_admin: record.is_admin,
            password: None,
        }
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    fn apply(&mut self, field: DraftField) {
        match field {
            DraftField::Username(value) => self.username = value,
            DraftField::Email(value) => self.email = value,
            DraftField::Password(value) => match self.password.as_mut() {
                Some(password) => *password = value,
                None => tracing::debug!("password edit ignored outside create mode"),
            },
            DraftField::CanScanQr(value) => self.can_scan_qr = value,
            DraftField::IsAdmin(value) => self.is_admin = value,
        }
    }

    /// missing_for_create
    ///
    /// Names of the required create-mode fields that are still empty.
    fn missing_for_create(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.username.trim().is_empty() {
            missing.push("username");
        }
        if self.email.trim().is_empty() {
            missing.push("email");
        }
        if self.password.as_deref().is_none_or(str::is_empty) {
            missing.push("password");
        }
        missing
    }

    fn create_request(&self) -> CreateAccountRequest {
        CreateAccountRequest {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone().unwrap_or_default(),
            can_scan_qr: self.can_scan_qr,
            is_admin: self.is_admin,
        }
    }

    fn update_request(&self) -> UpdateAccountRequest {
        UpdateAccountRequest {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            can_scan_qr: self.can_scan_qr,
            is_admin: self.is_admin,
        }
    }
}

// --- State, commands and effects ---

/// ManagerState
///
/// The account screen's state. `Loaded` shows `AccountManager::records()`, which
/// also stays visible behind the dialog and during transitional states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerState {
    Idle,
    Loading,
    Loaded,
    LoadError(String),
    DialogOpen {
        mode: DialogMode,
        draft: DraftForm,
        /// Inline validation message, cleared by the next field edit.
        error: Option<String>,
    },
    /// The draft is kept so a failed save can reopen the dialog untouched.
    Saving {
        mode: DialogMode,
        draft: DraftForm,
    },
    Deleting(AccountId),
}

/// Request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    List,
    Create(CreateAccountRequest),
    Update {
        id: AccountId,
        request: UpdateAccountRequest,
    },
    Delete(AccountId),
}

/// Command
///
/// A network call the host must perform and then report back with `complete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub ticket: Ticket,
    pub request: Request,
}

/// Outcome
///
/// The result of a `Command`, shaped by its request kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Listed(Result<Vec<AccountRecord>, ConsoleError>),
    Saved(Result<AccountRecord, ConsoleError>),
    Deleted(Result<(), ConsoleError>),
}

/// Effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Request(Command),
    Notify { message: String, severity: Severity },
    /// The service rejected the session: the host must run the invalidation path.
    SessionExpired,
}

impl Effect {
    fn success(message: &str) -> Self {
        Effect::Notify {
            message: message.to_string(),
            severity: Severity::Success,
        }
    }

    fn error(message: String) -> Self {
        Effect::Notify {
            message,
            severity: Severity::Error,
        }
    }
}

// --- Manager ---

/// AccountManager
///
/// Owns the cached account list and the lifecycle of one create/edit dialog.
/// It performs no I/O: every method returns the effects the host has to carry out,
/// and network results come back through `complete`.
///
/// While a call is in flight every action that would start another one is
/// suppressed (it returns no effects), so a double-clicked save issues one request.
/// Every successful mutation, and every failed delete, reloads the full list: the
/// service is the source of truth and nothing is patched locally.
#[derive(Debug)]
pub struct AccountManager {
    state: ManagerState,
    records: Vec<AccountRecord>,
    in_flight: Option<Ticket>,
    pending_confirmation: Option<AccountId>,
}

impl Default for AccountManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountManager {
    pub fn new() -> Self {
        Self {
            state: ManagerState::Idle,
            records: Vec::new(),
            in_flight: None,
            pending_confirmation: None,
        }
    }

    pub fn state(&self) -> &ManagerState {
        &self.state
    }

    /// The cached list, in server order.
    pub fn records(&self) -> &[AccountRecord] {
        &self.records
    }

    pub fn in_flight(&self) -> Option<Ticket> {
        self.in_flight
    }

    /// is_busy
    ///
    /// True while a call is outstanding; triggering controls should be disabled.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// The record awaiting delete confirmation, if any.
    pub fn pending_confirmation(&self) -> Option<&AccountId> {
        self.pending_confirmation.as_ref()
    }

    fn begin_load(&mut self) -> Effect {
        let ticket = Ticket::next();
        self.in_flight = Some(ticket);
        self.state = ManagerState::Loading;
        tracing::debug!(?ticket, "loading accounts");
        Effect::Request(Command {
            ticket,
            request: Request::List,
        })
    }

    fn dispatch(&mut self, state: ManagerState, request: Request) -> Effect {
        let ticket = Ticket::next();
        self.in_flight = Some(ticket);
        self.state = state;
        Effect::Request(Command { ticket, request })
    }

    // --- UI events ---

    /// mount
    ///
    /// Starts the initial load. Only meaningful once, from `Idle`.
    pub fn mount(&mut self) -> Vec<Effect> {
        if self.state != ManagerState::Idle {
            return Vec::new();
        }
        vec![self.begin_load()]
    }

    /// reload
    ///
    /// Re-fetches the list from `Loaded` or `LoadError`.
    pub fn reload(&mut self) -> Vec<Effect> {
        if self.is_busy() {
            return Vec::new();
        }
        match self.state {
            ManagerState::Loaded | ManagerState::LoadError(_) => {
                self.pending_confirmation = None;
                vec![self.begin_load()]
            }
            _ => Vec::new(),
        }
    }

    pub fn open_create(&mut self) -> Vec<Effect> {
        if self.state != ManagerState::Loaded || self.is_busy() {
            return Vec::new();
        }
        self.pending_confirmation = None;
        self.state = ManagerState::DialogOpen {
            mode: DialogMode::Create,
            draft: DraftForm::empty(),
            error: None,
        };
        Vec::new()
    }

    pub fn open_edit(&mut self, id: &str) -> Vec<Effect> {
        if self.state != ManagerState::Loaded || self.is_busy() {
            return Vec::new();
        }
        let Some(record) = self.records.iter().find(|record| record.id == id) else {
            tracing::warn!(id, "edit requested for an account not in the list");
            return Vec::new();
        };

        self.pending_confirmation = None;
        self.state = ManagerState::DialogOpen {
            mode: DialogMode::Edit(record.id.clone()),
            draft: DraftForm::from_record(record),
            error: None,
        };
        Vec::new()
    }

    /// edit
    ///
    /// Pure local mutation of the open draft.
    pub fn edit(&mut self, field: DraftField) -> Vec<Effect> {
        if let ManagerState::DialogOpen { draft, error, .. } = &mut self.state {
            draft.apply(field);
            *error = None;
        }
        Vec::new()
    }

    /// cancel_dialog
    ///
    /// Closes the dialog and discards the draft.
    pub fn cancel_dialog(&mut self) -> Vec<Effect> {
        if matches!(self.state, ManagerState::DialogOpen { .. }) {
            self.state = ManagerState::Loaded;
        }
        Vec::new()
    }

    /// save
    ///
    /// Create mode requires username, email and password; a missing one keeps the
    /// dialog open with a validation notice and nothing is sent. Edit mode has no
    /// password precondition.
    pub fn save(&mut self) -> Vec<Effect> {
        if self.is_busy() {
            return Vec::new();
        }
        let ManagerState::DialogOpen { mode, draft, error } = &mut self.state else {
            return Vec::new();
        };

        let request = match mode {
            DialogMode::Create => {
                let missing = draft.missing_for_create();
                if !missing.is_empty() {
                    let message = ConsoleError::Validation(format!(
                        "Please fill in the required fields: {}.",
                        missing.join(", ")
                    ))
                    .message_or(SAVE_FAILED);
                    *error = Some(message.clone());
                    return vec![Effect::error(message)];
                }
                Request::Create(draft.create_request())
            }
            DialogMode::Edit(id) => Request::Update {
                id: id.clone(),
                request: draft.update_request(),
            },
        };

        let saving = ManagerState::Saving {
            mode: mode.clone(),
            draft: draft.clone(),
        };
        vec![self.dispatch(saving, request)]
    }

    /// request_delete
    ///
    /// Stages `id` for deletion. Nothing is sent until `confirm_delete`.
    pub fn request_delete(&mut self, id: &str) -> Vec<Effect> {
        if self.state != ManagerState::Loaded || self.is_busy() {
            return Vec::new();
        }
        if self.records.iter().any(|record| record.id == id) {
            self.pending_confirmation = Some(id.to_string());
        } else {
            tracing::warn!(id, "delete requested for an account not in the list");
        }
        Vec::new()
    }

    pub fn cancel_delete(&mut self) -> Vec<Effect> {
        self.pending_confirmation = None;
        Vec::new()
    }

    pub fn confirm_delete(&mut self) -> Vec<Effect> {
        if self.state != ManagerState::Loaded || self.is_busy() {
            return Vec::new();
        }
        let Some(id) = self.pending_confirmation.take() else {
            return Vec::new();
        };
        vec![self.dispatch(ManagerState::Deleting(id.clone()), Request::Delete(id))]
    }

    // --- Network completions ---

    /// complete
    ///
    /// Applies the result of the outstanding call. A completion for any other
    /// ticket is discarded without touching the state.
    pub fn complete(&mut self, ticket: Ticket, outcome: Outcome) -> Vec<Effect> {
        if self.in_flight != Some(ticket) {
            tracing::debug!(?ticket, "discarding completion that is no longer awaited");
            return Vec::new();
        }
        self.in_flight = None;

        let state = std::mem::replace(&mut self.state, ManagerState::Idle);
        match (state, outcome) {
            (ManagerState::Loading, Outcome::Listed(Ok(records))) => {
                tracing::debug!(count = records.len(), "accounts loaded");
                self.records = records;
                self.state = ManagerState::Loaded;
                Vec::new()
            }
            (ManagerState::Loading, Outcome::Listed(Err(e))) => {
                let message = e.message_or(LOAD_FAILED);
                self.state = ManagerState::LoadError(message.clone());
                if e.is_auth_expired() {
                    vec![Effect::SessionExpired]
                } else {
                    vec![Effect::error(message)]
                }
            }
            (ManagerState::Saving { mode, .. }, Outcome::Saved(Ok(record))) => {
                let message = match mode {
                    DialogMode::Create => "Account created.",
                    DialogMode::Edit(_) => "Account updated.",
                };
                tracing::info!(id = %record.id, "account saved");
                vec![Effect::success(message), self.begin_load()]
            }
            (ManagerState::Saving { mode, draft }, Outcome::Saved(Err(e))) => {
                self.state = ManagerState::DialogOpen {
                    mode,
                    draft,
                    error: None,
                };
                if e.is_auth_expired() {
                    vec![Effect::SessionExpired]
                } else {
                    vec![Effect::error(e.message_or(SAVE_FAILED))]
                }
            }
            (ManagerState::Deleting(id), Outcome::Deleted(result)) => match result {
                Ok(()) => {
                    tracing::info!(%id, "account deleted");
                    vec![Effect::success("Account deleted."), self.begin_load()]
                }
                // The stale token must not be used again, so there is no reload.
                Err(e) if e.is_auth_expired() => {
                    self.state = ManagerState::Loaded;
                    vec![Effect::SessionExpired]
                }
                Err(e) => vec![Effect::error(e.message_or(DELETE_FAILED)), self.begin_load()],
            },
            // Wrong outcome kind for the pending call. The ticket is spent, so fall
            // back to a state the operator can act on again.
            (state, outcome) => {
                tracing::warn!(?state, ?outcome, "completion does not match the pending call");
                self.state = match state {
                    ManagerState::Loading => ManagerState::LoadError(LOAD_FAILED.to_string()),
                    ManagerState::Saving { mode, draft } => ManagerState::DialogOpen {
                        mode,
                        draft,
                        error: None,
                    },
                    ManagerState::Deleting(_) => ManagerState::Loaded,
                    other => other,
                };
                Vec::new()
            }
        }
    }
}
