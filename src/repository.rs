use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{AccountRecord, CreateAccountRequest, UpdateAccountRequest};

/// StoredAccount
///
/// An account as the reference service keeps it: the public record plus the
/// password hash, which never leaves this module's callers.
#[derive(Debug, Clone)]
pub struct StoredAccount {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub can_scan_qr: bool,
    pub is_admin: bool,
}

impl StoredAccount {
    /// Public view of the account, as sent over the wire.
    pub fn to_record(&self) -> AccountRecord {
        AccountRecord {
            id: self.id.to_string(),
            username: self.username.clone(),
            email: self.email.clone(),
            can_scan_qr: self.can_scan_qr,
            is_admin: self.is_admin,
        }
    }
}

/// RepositoryError
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("username already exists")]
    DuplicateUsername,
    #[error("account not found")]
    NotFound,
    #[error("failed to hash password")]
    Hashing,
}

/// AccountRepository Trait
///
/// Defines the abstract contract for account persistence, so handlers work against
/// the trait and tests can substitute their own implementation.
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn AccountRepository>`) shareable across Axum's task boundaries.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    // Insertion order is the listing order.
    async fn list_accounts(&self) -> Vec<StoredAccount>;
    async fn get_account(&self, id: Uuid) -> Option<StoredAccount>;
    async fn find_by_username(&self, username: &str) -> Option<StoredAccount>;

    // Usernames are unique; both writes reject a clash with another account.
    async fn create_account(
        &self,
        req: CreateAccountRequest,
    ) -> Result<StoredAccount, RepositoryError>;
    async fn update_account(
        &self,
        id: Uuid,
        req: UpdateAccountRequest,
    ) -> Result<StoredAccount, RepositoryError>;

    /// Returns true if a row was removed.
    async fn delete_account(&self, id: Uuid) -> bool;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn AccountRepository>;

/// hash_password
///
/// Argon2id with a fresh random salt, PHC string format.
pub fn hash_password(password: &str) -> Result<String, RepositoryError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            tracing::error!("password hashing failed: {}", e);
            RepositoryError::Hashing
        })
}

/// InMemoryRepository
///
/// Process-local implementation backing the reference service. State is lost on restart.
#[derive(Default)]
pub struct InMemoryRepository {
    accounts: RwLock<Vec<StoredAccount>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountRepository for InMemoryRepository {
    async fn list_accounts(&self) -> Vec<StoredAccount> {
        self.accounts.read().await.clone()
    }

    async fn get_account(&self, id: Uuid) -> Option<StoredAccount> {
        self.accounts
            .read()
            .await
            .iter()
            .find(|account| account.id == id)
            .cloned()
    }

    async fn find_by_username(&self, username: &str) -> Option<StoredAccount> {
        self.accounts
            .read()
            .await
            .iter()
            .find(|account| account.username == username)
            .cloned()
    }

    async fn create_account(
        &self,
        req: CreateAccountRequest,
    ) -> Result<StoredAccount, RepositoryError> {
        // Hash before taking the write lock; argon2 is deliberately slow.
        let password_hash = hash_password(&req.password)?;

        let mut accounts = self.accounts.write().await;
        if accounts.iter().any(|account| account.username == req.username) {
            return Err(RepositoryError::DuplicateUsername);
        }

        let account = StoredAccount {
            id: Uuid::new_v4(),
            username: req.username,
            email: req.email,
            password_hash,
            can_scan_qr: req.can_scan_qr,
            is_admin: req.is_admin,
        };
        accounts.push(account.clone());
        Ok(account)
    }

    async fn update_account(
        &self,
        id: Uuid,
        req: UpdateAccountRequest,
    ) -> Result<StoredAccount, RepositoryError> {
        let mut accounts = self.accounts.write().await;
        if accounts
            .iter()
            .any(|account| account.username == req.username && account.id != id)
        {
            return Err(RepositoryError::DuplicateUsername);
        }

        let account = accounts
            .iter_mut()
            .find(|account| account.id == id)
            .ok_or(RepositoryError::NotFound)?;
        account.username = req.username;
        account.email = req.email;
        account.can_scan_qr = req.can_scan_qr;
        account.is_admin = req.is_admin;
        Ok(account.clone())
    }

    async fn delete_account(&self, id: Uuid) -> bool {
        let mut accounts = self.accounts.write().await;
        let before = accounts.len();
        accounts.retain(|account| account.id != id);
        accounts.len() != before
    }
}
