use async_trait::async_trait;
use reqwest::{StatusCode, Url, header};
use serde::de::DeserializeOwned;
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use crate::{
    config::AppConfig,
    error::ConsoleError,
    models::{
        AccountId, AccountRecord, CreateAccountRequest, ErrorBody, LoginRequest, LoginResponse,
        UpdateAccountRequest,
    },
};

// 1. AccountService Contract
/// AccountService
///
/// The remote accounts/identity service as the console consumes it. Every method
/// except `login` is authorized with the bearer token of the current session, and
/// every implementation normalizes failures into `ConsoleError`:
/// - 401/403 on an authorized call -> `AuthExpired`
/// - anything else -> `RequestFailed` (with the server message when one was sent)
#[async_trait]
pub trait AccountService: Send + Sync {
    /// Exchanges credentials for a token. A rejection here is a bad credential, not
    /// an expiry, so it is always reported as `RequestFailed`.
    async fn login(&self, request: LoginRequest) -> Result<LoginResponse, ConsoleError>;

    /// `GET /users`. Server order is preserved.
    async fn list_accounts(&self, token: &str) -> Result<Vec<AccountRecord>, ConsoleError>;

    /// `POST /users/register`.
    async fn create_account(
        &self,
        token: &str,
        request: CreateAccountRequest,
    ) -> Result<AccountRecord, ConsoleError>;

    /// `PUT /users/{id}`.
    async fn update_account(
        &self,
        token: &str,
        id: &str,
        request: UpdateAccountRequest,
    ) -> Result<AccountRecord, ConsoleError>;

    /// `DELETE /users/{id}`.
    async fn delete_account(&self, token: &str, id: &str) -> Result<(), ConsoleError>;
}

/// ServiceState
///
/// The concrete type used to share the service client between the console and its
/// in-flight calls.
pub type ServiceState = Arc<dyn AccountService>;

// 2. The Real Implementation (HTTP)
/// HttpAccountService
///
/// `reqwest`-backed client for the accounts service. The underlying client is
/// cheap to clone and pools connections.
#[derive(Clone)]
pub struct HttpAccountService {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpAccountService {
    /// new
    ///
    /// Builds the client with a per-request timeout. `base_url` may carry a trailing
    /// slash and a path prefix; it must be an absolute http(s) URL.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConsoleError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| {
                tracing::error!(base_url, "accounts service URL is not a valid base URL");
                ConsoleError::transport()
            })?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                tracing::error!("failed to build HTTP client: {}", e);
                ConsoleError::transport()
            })?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConsoleError> {
        Self::new(&config.api_url, config.request_timeout)
    }

    /// url
    ///
    /// Appends `segments` to the base path. Each segment is percent-encoded, so an
    /// id can never escape its path position.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        authorized: bool,
    ) -> Result<reqwest::Response, ConsoleError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!("accounts service unreachable: {}", e);
            ConsoleError::transport()
        })?;
        check_status(response, authorized).await
    }
}

/// check_status
///
/// Normalizes a response into the console's failure taxonomy.
async fn check_status(
    response: reqwest::Response,
    authorized: bool,
) -> Result<reqwest::Response, ConsoleError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if authorized && (status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN) {
        tracing::info!(status = status.as_u16(), "accounts service rejected the session");
        return Err(ConsoleError::AuthExpired {
            status: status.as_u16(),
        });
    }

    // The message is optional: plain-text or empty bodies simply yield `None`.
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .map(|body| body.message);

    tracing::warn!(status = status.as_u16(), ?message, "accounts service call failed");
    Err(ConsoleError::request_failed(Some(status.as_u16()), message))
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ConsoleError> {
    let status = response.status().as_u16();
    response.json::<T>().await.map_err(|e| {
        tracing::warn!("undecodable accounts service response: {}", e);
        ConsoleError::request_failed(Some(status), None)
    })
}

#[async_trait]
impl AccountService for HttpAccountService {
    async fn login(&self, request: LoginRequest) -> Result<LoginResponse, ConsoleError> {
        let response = self
            .send(self.client.post(self.url(&["auth", "login"])).json(&request), false)
            .await?;
        read_json(response).await
    }

    async fn list_accounts(&self, token: &str) -> Result<Vec<AccountRecord>, ConsoleError> {
        let response = self
            .send(self.client.get(self.url(&["users"])).bearer_auth(token), true)
            .await?;
        read_json(response).await
    }

    async fn create_account(
        &self,
        token: &str,
        request: CreateAccountRequest,
    ) -> Result<AccountRecord, ConsoleError> {
        let response = self
            .send(
                self.client
                    .post(self.url(&["users", "register"]))
                    .bearer_auth(token)
                    .json(&request),
                true,
            )
            .await?;
        read_json(response).await
    }

    async fn update_account(
        &self,
        token: &str,
        id: &str,
        request: UpdateAccountRequest,
    ) -> Result<AccountRecord, ConsoleError> {
        let response = self
            .send(
                self.client
                    .put(self.url(&["users", id]))
                    .bearer_auth(token)
                    .json(&request),
                true,
            )
            .await?;
        read_json(response).await
    }

    async fn delete_account(&self, token: &str, id: &str) -> Result<(), ConsoleError> {
        self.send(
            self.client
                .delete(self.url(&["users", id]))
                .bearer_auth(token)
                .header(header::ACCEPT, "application/json"),
            true,
        )
        .await?;
        Ok(())
    }
}

// 3. The Mock Implementation (For Tests and Offline Runs)

/// MockOperation
///
/// Selects which operation a scripted failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    Login,
    List,
    Create,
    Update,
    Delete,
}

/// ServiceCall
///
/// One recorded call against the mock, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    Login { username: String },
    List { token: String },
    Create { token: String, request: CreateAccountRequest },
    Update { token: String, id: AccountId, request: UpdateAccountRequest },
    Delete { token: String, id: AccountId },
}

#[derive(Default)]
struct MockInner {
    accounts: Vec<(AccountRecord, String)>,
    tokens: HashMap<String, AccountId>,
    failures: HashMap<MockOperation, VecDeque<ConsoleError>>,
    calls: Vec<ServiceCall>,
    next_id: u64,
}

/// MockAccountService
///
/// An in-memory `AccountService` that behaves like the real one closely enough for
/// the console's workflows: it issues tokens on login, enforces the admin role on
/// `/users` calls, keeps insertion order, and rejects duplicate usernames.
/// Failures can be scripted per operation with `fail_next`.
#[derive(Default)]
pub struct MockAccountService {
    inner: Mutex<MockInner>,
}

impl MockAccountService {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// seed
    ///
    /// Inserts an account directly, bypassing authorization. Returns the stored record.
    pub fn seed(
        &self,
        username: &str,
        email: &str,
        password: &str,
        can_scan_qr: bool,
        is_admin: bool,
    ) -> AccountRecord {
        let mut inner = self.lock();
        inner.next_id += 1;
        let record = AccountRecord {
            id: inner.next_id.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            can_scan_qr,
            is_admin,
        };
        inner.accounts.push((record.clone(), password.to_string()));
        record
    }

    /// seed_with_id
    ///
    /// Like `seed`, but with a caller-chosen id.
    pub fn seed_with_id(&self, record: AccountRecord, password: &str) -> AccountRecord {
        let mut inner = self.lock();
        inner.accounts.push((record.clone(), password.to_string()));
        record
    }

    /// issue_token
    ///
    /// Mints a valid token for an existing account without a login call.
    pub fn issue_token(&self, username: &str) -> Option<String> {
        let mut inner = self.lock();
        let id = inner
            .accounts
            .iter()
            .find(|(record, _)| record.username == username)
            .map(|(record, _)| record.id.clone())?;
        let token = format!("mock-token-{}-{}", id, inner.tokens.len() + 1);
        inner.tokens.insert(token.clone(), id);
        Some(token)
    }

    /// revoke_tokens
    ///
    /// Invalidates every issued token, as if the identity service expired them.
    pub fn revoke_tokens(&self) {
        self.lock().tokens.clear();
    }

    /// fail_next
    ///
    /// Queues `error` as the result of the next call to `operation`.
    pub fn fail_next(&self, operation: MockOperation, error: ConsoleError) {
        self.lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.lock().calls.clone()
    }

    pub fn accounts(&self) -> Vec<AccountRecord> {
        self.lock()
            .accounts
            .iter()
            .map(|(record, _)| record.clone())
            .collect()
    }
}

impl MockInner {
    fn scripted(&mut self, operation: MockOperation) -> Result<(), ConsoleError> {
        match self.failures.get_mut(&operation).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn authorize_admin(&self, token: &str) -> Result<(), ConsoleError> {
        let id = self
            .tokens
            .get(token)
            .ok_or(ConsoleError::AuthExpired { status: 401 })?;
        match self.accounts.iter().find(|(record, _)| &record.id == id) {
            Some((record, _)) if record.is_admin => Ok(()),
            Some(_) => Err(ConsoleError::AuthExpired { status: 403 }),
            None => Err(ConsoleError::AuthExpired { status: 401 }),
        }
    }

    fn username_taken(&self, username: &str, except: Option<&str>) -> bool {
        self.accounts
            .iter()
            .any(|(record, _)| record.username == username && Some(record.id.as_str()) != except)
    }
}

fn conflict() -> ConsoleError {
    ConsoleError::request_failed(Some(409), Some("Username already exists.".to_string()))
}

fn not_found() -> ConsoleError {
    ConsoleError::request_failed(Some(404), Some("Account not found.".to_string()))
}

#[async_trait]
impl AccountService for MockAccountService {
    async fn login(&self, request: LoginRequest) -> Result<LoginResponse, ConsoleError> {
        let mut inner = self.lock();
        inner.calls.push(ServiceCall::Login {
            username: request.username.clone(),
        });
        inner.scripted(MockOperation::Login)?;

        let user = inner
            .accounts
            .iter()
            .find(|(record, password)| {
                record.username == request.username && *password == request.password
            })
            .map(|(record, _)| record.clone())
            .ok_or_else(|| {
                ConsoleError::request_failed(
                    Some(401),
                    Some("Invalid username or password.".to_string()),
                )
            })?;

        let token = format!("mock-token-{}-{}", user.id, inner.tokens.len() + 1);
        inner.tokens.insert(token.clone(), user.id.clone());
        Ok(LoginResponse { token, user })
    }

    async fn list_accounts(&self, token: &str) -> Result<Vec<AccountRecord>, ConsoleError> {
        let mut inner = self.lock();
        inner.calls.push(ServiceCall::List {
            token: token.to_string(),
        });
        inner.scripted(MockOperation::List)?;
        inner.authorize_admin(token)?;

        Ok(inner.accounts.iter().map(|(record, _)| record.clone()).collect())
    }

    async fn create_account(
        &self,
        token: &str,
        request: CreateAccountRequest,
    ) -> Result<AccountRecord, ConsoleError> {
        let mut inner = self.lock();
        inner.calls.push(ServiceCall::Create {
            token: token.to_string(),
            request: request.clone(),
        });
        inner.scripted(MockOperation::Create)?;
        inner.authorize_admin(token)?;

        if inner.username_taken(&request.username, None) {
            return Err(conflict());
        }

        inner.next_id += 1;
        let record = AccountRecord {
            id: inner.next_id.to_string(),
            username: request.username,
            email: request.email,
            can_scan_qr: request.can_scan_qr,
            is_admin: request.is_admin,
        };
        inner.accounts.push((record.clone(), request.password));
        Ok(record)
    }

    async fn update_account(
        &self,
        token: &str,
        id: &str,
        request: UpdateAccountRequest,
    ) -> Result<AccountRecord, ConsoleError> {
        let mut inner = self.lock();
        inner.calls.push(ServiceCall::Update {
            token: token.to_string(),
            id: id.to_string(),
            request: request.clone(),
        });
        inner.scripted(MockOperation::Update)?;
        inner.authorize_admin(token)?;

        if inner.username_taken(&request.username, Some(id)) {
            return Err(conflict());
        }

        let (record, _) = inner
            .accounts
            .iter_mut()
            .find(|(record, _)| record.id == id)
            .ok_or_else(not_found)?;
        record.username = request.username;
        record.email = request.email;
        record.can_scan_qr = request.can_scan_qr;
        record.is_admin = request.is_admin;
        Ok(record.clone())
    }

    async fn delete_account(&self, token: &str, id: &str) -> Result<(), ConsoleError> {
        let mut inner = self.lock();
        inner.calls.push(ServiceCall::Delete {
            token: token.to_string(),
            id: id.to_string(),
        });
        inner.scripted(MockOperation::Delete)?;
        inner.authorize_admin(token)?;

        let before = inner.accounts.len();
        inner.accounts.retain(|(record, _)| record.id != id);
        if inner.accounts.len() == before {
            return Err(not_found());
        }
        Ok(())
    }
}
