use admin_console::{
    AppConfig, AppState, InMemoryRepository, create_router,
    auth::issue_token,
    models::{AccountRecord, CreateAccountRequest, ErrorBody, LoginResponse},
    repository::{AccountRepository, RepositoryState},
    seed_admin,
};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tower::ServiceExt;

// --- Helpers ---

async fn test_router() -> (Router, AppState) {
    let state = AppState {
        repo: Arc::new(InMemoryRepository::new()) as RepositoryState,
        config: AppConfig::default(),
    };
    seed_admin(&state).await.unwrap();
    (create_router(state.clone()), state)
}

async fn token_for(state: &AppState, username: &str) -> String {
    let account = state.repo.find_by_username(username).await.unwrap();
    issue_token(&state.config, account.id).unwrap()
}

async fn read_body<T: DeserializeOwned>(response: Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

// --- Tests ---

#[tokio::test]
async fn test_users_requires_bearer_token() {
    let (router, _) = test_router().await;

    let response = router
        .oneshot(Request::get("/users").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: ErrorBody = read_body(response).await;
    assert_eq!(body.message, "Missing bearer token.");
}

#[tokio::test]
async fn test_login_then_list() {
    let (router, _) = test_router().await;

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            None,
            serde_json::json!({ "username": "admin", "password": "admin" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let login: LoginResponse = read_body(response).await;

    let response = router
        .oneshot(
            Request::get("/users")
                .header(header::AUTHORIZATION, format!("Bearer {}", login.token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let accounts: Vec<AccountRecord> = read_body(response).await;
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].id, login.user.id);
}

#[tokio::test]
async fn test_register_validates_payload() {
    let (router, state) = test_router().await;
    let token = token_for(&state, "admin").await;

    let response = router
        .oneshot(json_request(
            "POST",
            "/users/register",
            Some(&token),
            serde_json::json!({
                "username": "bob", "email": "bob-at-example", "password": "pw",
                "canScanQr": false, "isAdmin": false
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = read_body(response).await;
    assert_eq!(body.message, "A valid email address is required.");
}

#[tokio::test]
async fn test_non_admin_gets_forbidden() {
    let (router, state) = test_router().await;
    state
        .repo
        .create_account(CreateAccountRequest {
            username: "gate".to_string(),
            email: "gate@example.com".to_string(),
            password: "pw".to_string(),
            can_scan_qr: true,
            is_admin: false,
        })
        .await
        .unwrap();
    let token = token_for(&state, "gate").await;

    let response = router
        .oneshot(
            Request::delete(format!("/users/{}", uuid::Uuid::new_v4()))
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // The role check runs before the lookup, so even an unknown id is 403.
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_openapi_document_lists_account_routes() {
    let (router, _) = test_router().await;

    let response = router
        .oneshot(Request::get("/api-docs/openapi.json").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let doc: serde_json::Value = read_body(response).await;
    let paths = doc["paths"].as_object().unwrap();
    for path in ["/auth/login", "/users", "/users/register", "/users/{id}"] {
        assert!(paths.contains_key(path), "missing {}", path);
    }
}

#[tokio::test]
async fn test_seed_admin_is_idempotent() {
    let (_, state) = test_router().await;
    seed_admin(&state).await.unwrap();
    assert_eq!(state.repo.list_accounts().await.len(), 1);
}
