use admin_console::models::{
    AccountRecord, CreateAccountRequest, ErrorBody, Principal, Role, UpdateAccountRequest,
};
use serde_json::json;

#[test]
fn test_account_record_uses_camel_case() {
    let record = AccountRecord {
        id: "7".to_string(),
        username: "alice".to_string(),
        email: "a@x.com".to_string(),
        can_scan_qr: true,
        is_admin: false,
    };

    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(
        value,
        json!({ "id": "7", "username": "alice", "email": "a@x.com", "canScanQr": true, "isAdmin": false })
    );
}

#[test]
fn test_account_record_accepts_legacy_id_key() {
    // Older service builds send the primary key as `_id`.
    let record: AccountRecord = serde_json::from_value(json!({
        "_id": "65f0c1", "username": "bob", "email": "b@x.com", "canScanQr": false, "isAdmin": true
    }))
    .unwrap();

    assert_eq!(record.id, "65f0c1");
    assert!(record.is_admin);
}

#[test]
fn test_update_request_never_carries_password() {
    let value = serde_json::to_value(UpdateAccountRequest {
        username: "alice2".to_string(),
        email: "a@x.com".to_string(),
        can_scan_qr: true,
        is_admin: false,
    })
    .unwrap();

    assert!(value.get("password").is_none());
    assert_eq!(value["canScanQr"], json!(true));
}

#[test]
fn test_create_request_shape() {
    let value = serde_json::to_value(CreateAccountRequest {
        username: "carol".to_string(),
        email: "c@x.com".to_string(),
        password: "pw".to_string(),
        can_scan_qr: false,
        is_admin: true,
    })
    .unwrap();

    assert_eq!(
        value,
        json!({ "username": "carol", "email": "c@x.com", "password": "pw", "canScanQr": false, "isAdmin": true })
    );
}

#[test]
fn test_principal_roles_follow_account_flags() {
    let admin = Principal::from_account(&AccountRecord {
        id: "1".to_string(),
        username: "root".to_string(),
        email: "root@x.com".to_string(),
        can_scan_qr: true,
        is_admin: true,
    });
    assert!(admin.is_admin());
    assert!(admin.has_role(Role::QrScanner));
    assert_eq!(admin.display_name, "root");

    let scanner = Principal::from_account(&AccountRecord {
        id: "2".to_string(),
        username: "gate".to_string(),
        email: "gate@x.com".to_string(),
        can_scan_qr: true,
        is_admin: false,
    });
    assert!(!scanner.is_admin());

    let value = serde_json::to_value(&admin).unwrap();
    assert_eq!(value["displayName"], json!("root"));
    assert_eq!(value["roles"], json!(["admin", "qrScanner"]));
}

#[test]
fn test_error_body_round_trips_message() {
    let body: ErrorBody = serde_json::from_str(r#"{"message":"Username already exists."}"#).unwrap();
    assert_eq!(body.message, "Username already exists.");
}

#[test]
fn test_legacy_id_is_written_back_as_id() {
    let record: AccountRecord = serde_json::from_value(json!({
        "_id": "65f0c1", "username": "bob", "email": "b@x.com", "canScanQr": false, "isAdmin": true
    }))
    .unwrap();

    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["id"], json!("65f0c1"));
    assert!(value.get("_id").is_none());

    // A record with no key at all is rejected.
    let missing = serde_json::from_value::<AccountRecord>(json!({
        "username": "bob", "email": "b@x.com", "canScanQr": false, "isAdmin": true
    }));
    assert!(missing.is_err());
}
