use admin_console::{
    AppState, InMemoryRepository,
    auth::AuthAccount,
    config::AppConfig,
    handlers::{self, is_valid_email},
    models::{CreateAccountRequest, LoginRequest, UpdateAccountRequest},
    repository::{AccountRepository, RepositoryState},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use std::sync::Arc;
use uuid::Uuid;

// --- Test Fixtures ---

fn test_state() -> AppState {
    AppState {
        repo: Arc::new(InMemoryRepository::new()) as RepositoryState,
        config: AppConfig::default(),
    }
}

fn admin() -> AuthAccount {
    AuthAccount {
        id: Uuid::new_v4(),
        is_admin: true,
    }
}

fn create_request(username: &str, email: &str, password: &str) -> CreateAccountRequest {
    CreateAccountRequest {
        username: username.to_string(),
        email: email.to_string(),
        password: password.to_string(),
        can_scan_qr: true,
        is_admin: false,
    }
}

// --- Login ---

#[tokio::test]
async fn test_login_returns_token_and_record() {
    let state = test_state();
    handlers::register_user(
        admin(),
        State(state.clone()),
        Json(create_request("alice", "a@x.com", "pw")),
    )
    .await
    .unwrap();

    let Json(response) = handlers::login(
        State(state),
        Json(LoginRequest {
            username: "alice".to_string(),
            password: "pw".to_string(),
        }),
    )
    .await
    .unwrap();

    assert!(!response.token.is_empty());
    assert_eq!(response.user.username, "alice");
    assert!(response.user.can_scan_qr);
}

#[tokio::test]
async fn test_login_rejects_wrong_password_and_unknown_user_alike() {
    let state = test_state();
    handlers::register_user(
        admin(),
        State(state.clone()),
        Json(create_request("alice", "a@x.com", "pw")),
    )
    .await
    .unwrap();

    for (username, password) in [("alice", "nope"), ("mallory", "pw")] {
        let failure = handlers::login(
            State(state.clone()),
            Json(LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(failure.status, StatusCode::UNAUTHORIZED);
        assert_eq!(failure.message, "Invalid username or password.");
    }
}

#[tokio::test]
async fn test_login_requires_both_fields() {
    let failure = handlers::login(
        State(test_state()),
        Json(LoginRequest {
            username: "  ".to_string(),
            password: "pw".to_string(),
        }),
    )
    .await
    .unwrap_err();

    assert_eq!(failure.status, StatusCode::BAD_REQUEST);
}

// --- Registration ---

#[tokio::test]
async fn test_register_trims_and_creates() {
    let state = test_state();
    let (status, Json(record)) = handlers::register_user(
        admin(),
        State(state.clone()),
        Json(create_request("  bob ", " b@x.com ", "pw")),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record.username, "bob");
    assert_eq!(record.email, "b@x.com");
    assert!(state.repo.find_by_username("bob").await.is_some());
}

#[tokio::test]
async fn test_register_validation_messages() {
    let cases = [
        (create_request("", "a@x.com", "pw"), "Username is required."),
        (create_request("alice", "not-an-email", "pw"), "A valid email address is required."),
        (create_request("alice", "a@x.com", ""), "Password is required."),
    ];

    for (request, message) in cases {
        let failure = handlers::register_user(admin(), State(test_state()), Json(request))
            .await
            .unwrap_err();
        assert_eq!(failure.status, StatusCode::BAD_REQUEST);
        assert_eq!(failure.message, message);
    }
}

#[tokio::test]
async fn test_register_duplicate_username_conflicts() {
    let state = test_state();
    handlers::register_user(
        admin(),
        State(state.clone()),
        Json(create_request("alice", "a@x.com", "pw")),
    )
    .await
    .unwrap();

    let failure = handlers::register_user(
        admin(),
        State(state),
        Json(create_request("alice", "other@x.com", "pw")),
    )
    .await
    .unwrap_err();

    assert_eq!(failure.status, StatusCode::CONFLICT);
    assert_eq!(failure.message, "Username already exists.");
}

#[tokio::test]
async fn test_non_admin_cannot_list() {
    let caller = AuthAccount {
        id: Uuid::new_v4(),
        is_admin: false,
    };
    let failure = handlers::list_users(caller, State(test_state()))
        .await
        .unwrap_err();
    assert_eq!(failure.status, StatusCode::FORBIDDEN);
}

// --- Update / Delete ---

#[tokio::test]
async fn test_update_changes_fields() {
    let state = test_state();
    let (_, Json(created)) = handlers::register_user(
        admin(),
        State(state.clone()),
        Json(create_request("alice", "a@x.com", "pw")),
    )
    .await
    .unwrap();
    let id: Uuid = created.id.parse().unwrap();

    let Json(updated) = handlers::update_user(
        admin(),
        State(state.clone()),
        Path(id),
        Json(UpdateAccountRequest {
            username: "alice2".to_string(),
            email: "a2@x.com".to_string(),
            can_scan_qr: false,
            is_admin: true,
        }),
    )
    .await
    .unwrap();

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.username, "alice2");
    assert!(updated.is_admin);

    let Json(all) = handlers::list_users(admin(), State(state)).await.unwrap();
    assert_eq!(all, vec![updated]);
}

#[tokio::test]
async fn test_update_and_delete_unknown_account() {
    let state = test_state();
    let missing = Uuid::new_v4();

    let failure = handlers::update_user(
        admin(),
        State(state.clone()),
        Path(missing),
        Json(UpdateAccountRequest {
            username: "ghost".to_string(),
            email: "g@x.com".to_string(),
            can_scan_qr: false,
            is_admin: false,
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(failure.status, StatusCode::NOT_FOUND);

    let failure = handlers::delete_user(admin(), State(state), Path(missing))
        .await
        .unwrap_err();
    assert_eq!(failure.status, StatusCode::NOT_FOUND);
    assert_eq!(failure.message, "Account not found.");
}

#[tokio::test]
async fn test_delete_then_list_excludes_account() {
    let state = test_state();
    let (_, Json(created)) = handlers::register_user(
        admin(),
        State(state.clone()),
        Json(create_request("alice", "a@x.com", "pw")),
    )
    .await
    .unwrap();

    let status = handlers::delete_user(admin(), State(state.clone()), Path(created.id.parse().unwrap()))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let Json(all) = handlers::list_users(admin(), State(state)).await.unwrap();
    assert!(all.is_empty());
}

#[test]
fn test_email_syntax() {
    assert!(is_valid_email("a@x.com"));
    assert!(is_valid_email("first.last@sub.example.org"));
    assert!(!is_valid_email("a@x"));
    assert!(!is_valid_email("@x.com"));
    assert!(!is_valid_email("a@@x.com"));
    assert!(!is_valid_email("a b@x.com"));
    assert!(!is_valid_email("a@.com"));
}
