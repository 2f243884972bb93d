use admin_console::{
    InMemoryRepository,
    auth::verify_password,
    models::{CreateAccountRequest, UpdateAccountRequest},
    repository::{AccountRepository, RepositoryError},
};
use uuid::Uuid;

fn new_account(username: &str) -> CreateAccountRequest {
    CreateAccountRequest {
        username: username.to_string(),
        email: format!("{}@example.com", username),
        password: "pw".to_string(),
        can_scan_qr: false,
        is_admin: false,
    }
}

#[tokio::test]
async fn test_create_and_list_preserve_insertion_order() {
    let repo = InMemoryRepository::new();
    repo.create_account(new_account("zed")).await.unwrap();
    repo.create_account(new_account("amy")).await.unwrap();

    let names: Vec<String> = repo
        .list_accounts()
        .await
        .into_iter()
        .map(|a| a.username)
        .collect();
    assert_eq!(names, vec!["zed", "amy"]);
}

#[tokio::test]
async fn test_password_is_hashed() {
    let repo = InMemoryRepository::new();
    let account = repo.create_account(new_account("alice")).await.unwrap();

    assert_ne!(account.password_hash, "pw");
    assert!(verify_password(&account.password_hash, "pw"));
    assert!(!verify_password(&account.password_hash, "wrong"));
}

#[tokio::test]
async fn test_duplicate_username_rejected() {
    let repo = InMemoryRepository::new();
    repo.create_account(new_account("alice")).await.unwrap();

    let result = repo.create_account(new_account("alice")).await;
    assert_eq!(result.unwrap_err(), RepositoryError::DuplicateUsername);
}

#[tokio::test]
async fn test_update_renames_and_checks_uniqueness() {
    let repo = InMemoryRepository::new();
    let alice = repo.create_account(new_account("alice")).await.unwrap();
    repo.create_account(new_account("bob")).await.unwrap();

    let clash = repo
        .update_account(
            alice.id,
            UpdateAccountRequest {
                username: "bob".to_string(),
                email: alice.email.clone(),
                can_scan_qr: false,
                is_admin: false,
            },
        )
        .await;
    assert_eq!(clash.unwrap_err(), RepositoryError::DuplicateUsername);

    // Keeping one's own username is not a clash.
    let updated = repo
        .update_account(
            alice.id,
            UpdateAccountRequest {
                username: "alice".to_string(),
                email: "new@example.com".to_string(),
                can_scan_qr: true,
                is_admin: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.email, "new@example.com");
    assert!(updated.is_admin);
    // The password is untouched by updates.
    assert_eq!(updated.password_hash, alice.password_hash);
}

#[tokio::test]
async fn test_update_unknown_account() {
    let repo = InMemoryRepository::new();
    let result = repo
        .update_account(Uuid::new_v4(), UpdateAccountRequest::default())
        .await;
    assert_eq!(result.unwrap_err(), RepositoryError::NotFound);
}

#[tokio::test]
async fn test_delete_removes_account() {
    let repo = InMemoryRepository::new();
    let alice = repo.create_account(new_account("alice")).await.unwrap();

    assert!(repo.delete_account(alice.id).await);
    assert!(repo.get_account(alice.id).await.is_none());
    assert!(repo.find_by_username("alice").await.is_none());
    // Second delete finds nothing.
    assert!(!repo.delete_account(alice.id).await);
}
