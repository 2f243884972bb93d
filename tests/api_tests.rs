use admin_console::{
    AccountService, Action, AppConfig, AppState, Console, ConsoleError, HttpAccountService,
    InMemoryRepository, ManagerState, MemorySessionStore, Route, ServiceState, SessionState,
    create_router,
    manager::DraftField,
    models::{CreateAccountRequest, LoginRequest, UpdateAccountRequest},
    repository::RepositoryState,
    seed_admin,
};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;

const ADMIN: (&str, &str) = ("admin", "admin");

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
}

async fn spawn_app() -> TestApp {
    let repo = Arc::new(InMemoryRepository::new()) as RepositoryState;
    let config = AppConfig::default();
    let state = AppState { repo, config };
    seed_admin(&state).await.expect("Failed to seed administrator");
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address }
}

fn client_for(app: &TestApp) -> HttpAccountService {
    HttpAccountService::new(&format!("{}/", app.address), Duration::from_secs(5)).unwrap()
}

async fn admin_token(client: &HttpAccountService) -> String {
    client
        .login(LoginRequest {
            username: ADMIN.0.to_string(),
            password: ADMIN.1.to_string(),
        })
        .await
        .expect("admin login")
        .token
}

fn new_account(username: &str, is_admin: bool) -> CreateAccountRequest {
    CreateAccountRequest {
        username: username.to_string(),
        email: format!("{}@example.com", username),
        password: "pw".to_string(),
        can_scan_qr: true,
        is_admin,
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let response = client
        .get(&format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());

    // Every response is tagged for correlation.
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_login_returns_seeded_admin() {
    let app = spawn_app().await;
    let client = client_for(&app);

    let response = client
        .login(LoginRequest {
            username: ADMIN.0.to_string(),
            password: ADMIN.1.to_string(),
        })
        .await
        .unwrap();

    assert!(!response.token.is_empty());
    assert_eq!(response.user.username, "admin");
    assert!(response.user.is_admin);
}

#[tokio::test]
async fn test_bad_login_is_request_failure_not_expiry() {
    let app = spawn_app().await;
    let client = client_for(&app);

    let err = client
        .login(LoginRequest {
            username: "admin".to_string(),
            password: "wrong".to_string(),
        })
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ConsoleError::request_failed(Some(401), Some("Invalid username or password.".to_string()))
    );
}

#[tokio::test]
async fn test_account_lifecycle_over_http() {
    let app = spawn_app().await;
    let client = client_for(&app);
    let token = admin_token(&client).await;

    let created = client
        .create_account(&token, new_account("alice", false))
        .await
        .unwrap();
    assert_eq!(created.username, "alice");

    let updated = client
        .update_account(
            &token,
            &created.id,
            UpdateAccountRequest {
                username: "alice2".to_string(),
                email: created.email.clone(),
                can_scan_qr: true,
                is_admin: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.id, created.id);

    let names: Vec<String> = client
        .list_accounts(&token)
        .await
        .unwrap()
        .into_iter()
        .map(|record| record.username)
        .collect();
    assert_eq!(names, vec!["admin", "alice2"]);

    client.delete_account(&token, &created.id).await.unwrap();
    let remaining = client.list_accounts(&token).await.unwrap();
    assert!(remaining.iter().all(|record| record.id != created.id));
}

#[tokio::test]
async fn test_service_failures_map_to_console_errors() {
    let app = spawn_app().await;
    let client = client_for(&app);
    let token = admin_token(&client).await;

    // 409 with the server's message.
    let err = client
        .create_account(&token, new_account("admin", false))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ConsoleError::request_failed(Some(409), Some("Username already exists.".to_string()))
    );

    // 404 for an id that does not exist.
    let err = client
        .delete_account(&token, &uuid::Uuid::new_v4().to_string())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ConsoleError::request_failed(Some(404), Some("Account not found.".to_string()))
    );

    // A forged token is an expired session.
    let err = client.list_accounts("not-a-jwt").await.unwrap_err();
    assert_eq!(err, ConsoleError::AuthExpired { status: 401 });
}

#[tokio::test]
async fn test_non_admin_token_is_forbidden() {
    let app = spawn_app().await;
    let client = client_for(&app);
    let token = admin_token(&client).await;
    client
        .create_account(&token, new_account("gate", false))
        .await
        .unwrap();

    let gate = client
        .login(LoginRequest {
            username: "gate".to_string(),
            password: "pw".to_string(),
        })
        .await
        .unwrap();
    assert!(!gate.user.is_admin);

    let err = client.list_accounts(&gate.token).await.unwrap_err();
    assert_eq!(err, ConsoleError::AuthExpired { status: 403 });
}

#[tokio::test]
async fn test_unreachable_service_is_transport_failure() {
    // Nothing listens on this port.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = HttpAccountService::new(&address, Duration::from_secs(2)).unwrap();
    let err = client.list_accounts("token").await.unwrap_err();
    assert_eq!(err, ConsoleError::transport());
}

#[tokio::test]
async fn test_console_against_running_service() {
    let app = spawn_app().await;
    let service = Arc::new(client_for(&app)) as ServiceState;
    let sessions = Arc::new(MemorySessionStore::new()) as SessionState;
    let mut console = Console::new(&AppConfig::default(), sessions, service);

    assert_eq!(console.login(ADMIN.0, ADMIN.1).await, Route::Dashboard);
    assert_eq!(console.navigate("/users").await, Route::Accounts);
    assert_eq!(console.accounts().unwrap().records().len(), 1);

    console.dispatch(Action::OpenCreate).await;
    for field in [
        DraftField::Username("carol".to_string()),
        DraftField::Email("carol@example.com".to_string()),
        DraftField::Password("pw".to_string()),
    ] {
        console.dispatch(Action::Edit(field)).await;
    }
    console.dispatch(Action::Save).await;

    let manager = console.accounts().unwrap();
    assert_eq!(manager.state(), &ManagerState::Loaded);
    let carol = manager
        .records()
        .iter()
        .find(|record| record.username == "carol")
        .expect("created account listed")
        .id
        .clone();

    console.dispatch(Action::RequestDelete(carol.clone())).await;
    console.dispatch(Action::ConfirmDelete).await;
    assert!(console
        .accounts()
        .unwrap()
        .records()
        .iter()
        .all(|record| record.id != carol));
}

#[tokio::test]
async fn test_account_id_stays_one_path_segment() {
    let app = spawn_app().await;
    let client = client_for(&app);
    let token = admin_token(&client).await;

    // Encoded as `a%2Fb`, the id reaches `/users/{id}` and fails its id check there,
    // instead of matching no route at all.
    let err = client
        .update_account(
            &token,
            "a/b",
            UpdateAccountRequest {
                username: "x".to_string(),
                email: "x@example.com".to_string(),
                can_scan_qr: false,
                is_admin: false,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ConsoleError::RequestFailed { status: Some(400), .. }));

    // The seeded admin survives a delete aimed at a crafted id.
    let admin_id = client.list_accounts(&token).await.unwrap()[0].id.clone();
    let err = client
        .delete_account(&token, &format!("{}?x=#", admin_id))
        .await
        .unwrap_err();
    assert!(matches!(err, ConsoleError::RequestFailed { status: Some(400), .. }));
    assert_eq!(client.list_accounts(&token).await.unwrap().len(), 1);
}

#[test]
fn test_invalid_base_url_is_rejected() {
    assert!(HttpAccountService::new("not a url", Duration::from_secs(1)).is_err());
    assert!(HttpAccountService::new("mailto:admin@example.com", Duration::from_secs(1)).is_err());
}
