use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{config::AppConfig, handlers::ApiFailure, repository::RepositoryState};

/// Claims
///
/// The payload signed into every bearer token the reference service issues.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the account id. Resolved against the repository on every request.
    pub sub: Uuid,
    /// Expiration Time (exp): always validated.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// issue_token
///
/// Signs an HS256 token for `account_id`, valid for `config.token_ttl`.
pub fn issue_token(
    config: &AppConfig,
    account_id: Uuid,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp().max(0) as usize;
    let claims = Claims {
        sub: account_id,
        iat: now,
        exp: now + config.token_ttl.as_secs() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

/// verify_password
///
/// Checks `password` against a stored PHC hash. A malformed hash never verifies.
pub fn verify_password(password_hash: &str, password: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::error!("stored password hash is malformed: {}", e);
            false
        }
    }
}

/// AuthAccount Extractor Result
///
/// The resolved identity of an authenticated request. Handlers use it to check
/// the admin capability before touching the account collection.
#[derive(Debug, Clone)]
pub struct AuthAccount {
    pub id: Uuid,
    pub is_admin: bool,
}

impl AuthAccount {
    /// require_admin
    ///
    /// 403 for authenticated callers without the admin capability.
    pub fn require_admin(&self) -> Result<(), ApiFailure> {
        if self.is_admin {
            Ok(())
        } else {
            Err(ApiFailure::forbidden("Administrator access required."))
        }
    }
}

/// AuthAccount Extractor Implementation
///
/// Makes AuthAccount usable as a handler argument, keeping authentication out of
/// the handlers' business logic. The process:
/// 1. Dependency Resolution: Repository and AppConfig from the application state.
/// 2. Token Extraction: `Authorization: Bearer <token>`.
/// 3. Token Validation: signature and expiry.
/// 4. Repository Lookup: the account must still exist (deleted accounts lose access
///    immediately, even with an unexpired token), and its current admin flag is used.
///
/// Rejection: 401 with an `ErrorBody` on any failure.
impl<S> FromRequestParts<S> for AuthAccount
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiFailure;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // 1. Dependency Resolution
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        // 2. Token Extraction
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| ApiFailure::unauthorized("Missing bearer token."))?;

        // 3. Decode and Validate the Token
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => ApiFailure::unauthorized("Token expired."),
            _ => ApiFailure::unauthorized("Invalid token."),
        })?;

        // 4. Repository Lookup (Final Verification)
        let account = repo
            .get_account(token_data.claims.sub)
            .await
            .ok_or_else(|| ApiFailure::unauthorized("Account no longer exists."))?;

        Ok(AuthAccount {
            id: account.id,
            is_admin: account.is_admin,
        })
    }
}
