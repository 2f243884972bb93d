use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use ts_rs::TS;
use utoipa::ToSchema;

/// AccountId
///
/// Stable, server-assigned identifier of an account. Treated as opaque on the client.
pub type AccountId = String;

// --- Core Account Schemas ---

/// AccountRecord
///
/// A single user account as returned by the accounts service (`GET /users`).
/// The console never fabricates these: every record it shows came from the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AccountRecord {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub can_scan_qr: bool,
    pub is_admin: bool,
}

// Deserialize-only mirror of `AccountRecord`. Older service builds expose the
// primary key as `_id`; the alias lives here so the exported bindings stay plain.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountRecordWire {
    #[serde(alias = "_id")]
    id: AccountId,
    username: String,
    email: String,
    can_scan_qr: bool,
    is_admin: bool,
}

impl<'de> Deserialize<'de> for AccountRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = AccountRecordWire::deserialize(deserializer)?;
        Ok(Self {
            id: wire.id,
            username: wire.username,
            email: wire.email,
            can_scan_qr: wire.can_scan_qr,
            is_admin: wire.is_admin,
        })
    }
}

/// Role
///
/// Capability flags carried by an authenticated principal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum Role {
    /// Grants access to the administrative console.
    Admin,
    /// May scan QR codes in the field applications.
    QrScanner,
}

/// Principal
///
/// The descriptive record of the signed-in identity, persisted alongside the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Principal {
    pub id: AccountId,
    pub display_name: String,
    pub roles: BTreeSet<Role>,
}

impl Principal {
    /// from_account
    ///
    /// Derives the principal from the account record the login endpoint returns.
    pub fn from_account(account: &AccountRecord) -> Self {
        let mut roles = BTreeSet::new();
        if account.is_admin {
            roles.insert(Role::Admin);
        }
        if account.can_scan_qr {
            roles.insert(Role::QrScanner);
        }

        Self {
            id: account.id.clone(),
            display_name: account.username.clone(),
            roles,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

/// --- Request Payloads ---

/// LoginRequest
///
/// Credentials for `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// LoginResponse
///
/// Issued by the identity endpoint. The token is opaque to the console.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub user: AccountRecord,
}

/// CreateAccountRequest
///
/// Input payload for `POST /users/register`. The password is write-only: it is
/// never echoed back by the service and never stored by the console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateAccountRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub can_scan_qr: bool,
    pub is_admin: bool,
}

/// UpdateAccountRequest
///
/// Input payload for `PUT /users/{id}`. Edit mode never transmits a password,
/// so the type has no field for one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateAccountRequest {
    pub username: String,
    pub email: String,
    pub can_scan_qr: bool,
    pub is_admin: bool,
}

/// --- Error Schema ---

/// ErrorBody
///
/// Body shape of every non-2xx response that carries a human-readable reason.
/// The console surfaces `message` verbatim when it is present.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorBody {
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
