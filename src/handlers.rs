use crate::{
    AppState,
    auth::{self, AuthAccount},
    models::{
        AccountRecord, CreateAccountRequest, ErrorBody, LoginRequest, LoginResponse,
        UpdateAccountRequest,
    },
    repository::RepositoryError,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

// --- Error Response ---

/// ApiFailure
///
/// A non-2xx answer carrying an `ErrorBody`, so clients can surface the message verbatim.
#[derive(Debug, Clone)]
pub struct ApiFailure {
    pub status: StatusCode,
    pub message: String,
}

impl ApiFailure {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Account not found.")
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody::new(self.message))).into_response()
    }
}

impl From<RepositoryError> for ApiFailure {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DuplicateUsername => {
                ApiFailure::new(StatusCode::CONFLICT, "Username already exists.")
            }
            RepositoryError::NotFound => ApiFailure::not_found(),
            RepositoryError::Hashing => ApiFailure::internal(),
        }
    }
}

// --- Validation ---

/// is_valid_email
///
/// Syntactic check only: one `@`, a non-empty local part, and a dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn validate_account_fields(username: &str, email: &str) -> Result<(), ApiFailure> {
    if username.trim().is_empty() {
        return Err(ApiFailure::bad_request("Username is required."));
    }
    if !is_valid_email(email.trim()) {
        return Err(ApiFailure::bad_request("A valid email address is required."));
    }
    Ok(())
}

// --- Handlers ---

/// login
///
/// [Public Route] Exchanges credentials for a bearer token and the account record.
/// Unknown usernames and wrong passwords get the same answer.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 400, description = "Missing credentials", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiFailure> {
    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiFailure::bad_request("Username and password are required."));
    }

    let account = state
        .repo
        .find_by_username(payload.username.trim())
        .await
        .filter(|account| auth::verify_password(&account.password_hash, &payload.password))
        .ok_or_else(|| ApiFailure::unauthorized("Invalid username or password."))?;

    let token = auth::issue_token(&state.config, account.id).map_err(|e| {
        tracing::error!("token signing failed: {}", e);
        ApiFailure::internal()
    })?;

    tracing::info!(account_id = %account.id, "login succeeded");
    Ok(Json(LoginResponse {
        token,
        user: account.to_record(),
    }))
}

/// list_users
///
/// [Admin Route] Lists every account in insertion order.
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All accounts", body = [AccountRecord]),
        (status = 401, description = "Not signed in", body = ErrorBody),
        (status = 403, description = "Not an administrator", body = ErrorBody)
    )
)]
pub async fn list_users(
    caller: AuthAccount,
    State(state): State<AppState>,
) -> Result<Json<Vec<AccountRecord>>, ApiFailure> {
    caller.require_admin()?;
    let accounts = state.repo.list_accounts().await;
    Ok(Json(accounts.iter().map(|a| a.to_record()).collect()))
}

/// register_user
///
/// [Admin Route] Creates an account. The password is hashed and never echoed back.
#[utoipa::path(
    post,
    path = "/users/register",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Created", body = AccountRecord),
        (status = 400, description = "Invalid fields", body = ErrorBody),
        (status = 409, description = "Duplicate username", body = ErrorBody)
    )
)]
pub async fn register_user(
    caller: AuthAccount,
    State(state): State<AppState>,
    Json(mut payload): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountRecord>), ApiFailure> {
    caller.require_admin()?;
    validate_account_fields(&payload.username, &payload.email)?;
    if payload.password.is_empty() {
        return Err(ApiFailure::bad_request("Password is required."));
    }

    payload.username = payload.username.trim().to_string();
    payload.email = payload.email.trim().to_string();

    let account = state.repo.create_account(payload).await?;
    tracing::info!(account_id = %account.id, by = %caller.id, "account created");
    Ok((StatusCode::CREATED, Json(account.to_record())))
}

/// update_user
///
/// [Admin Route] Replaces an account's editable fields. Passwords are not changed here.
#[utoipa::path(
    put,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "Account ID")),
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, description = "Updated", body = AccountRecord),
        (status = 400, description = "Invalid fields", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 409, description = "Duplicate username", body = ErrorBody)
    )
)]
pub async fn update_user(
    caller: AuthAccount,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<UpdateAccountRequest>,
) -> Result<Json<AccountRecord>, ApiFailure> {
    caller.require_admin()?;
    validate_account_fields(&payload.username, &payload.email)?;

    payload.username = payload.username.trim().to_string();
    payload.email = payload.email.trim().to_string();

    let account = state.repo.update_account(id, payload).await?;
    tracing::info!(account_id = %account.id, by = %caller.id, "account updated");
    Ok(Json(account.to_record()))
}

/// delete_user
///
/// [Admin Route] Removes an account. Tokens issued to it stop working immediately.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "Account ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_user(
    caller: AuthAccount,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiFailure> {
    caller.require_admin()?;
    if state.repo.delete_account(id).await {
        tracing::info!(account_id = %id, by = %caller.id, "account deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiFailure::not_found())
    }
}
