//! User management: the last-admin invariant, username uniqueness, and
//! password rotation.

mod common;

use common::{admin, auth_user};
use steward_core::rbac::Role;
use steward_daemon::error::ApiError;
use steward_daemon::store::{Store, StoreError, UserUpdate};
use steward_daemon::users::{self, NewUser, UserPatch};

fn seed_admin(store: &Store) -> String {
    store
        .create_user("root-admin", "salt$digest", Role::Admin, &[])
        .unwrap()
        .id
}

#[test]
fn demoting_the_sole_admin_is_rejected() {
    let store = Store::open_in_memory().unwrap();
    let admin_id = seed_admin(&store);

    let demote = UserUpdate {
        role: Some(Role::Operator),
        ..UserUpdate::default()
    };
    let err = store.update_user(&admin_id, &demote).unwrap_err();
    assert!(matches!(err, StoreError::LastAdmin));

    // Role unchanged.
    assert_eq!(store.get_user(&admin_id).unwrap().unwrap().role, Role::Admin);
}

#[test]
fn demotion_succeeds_once_a_second_admin_exists() {
    let store = Store::open_in_memory().unwrap();
    let first = seed_admin(&store);
    store
        .create_user("backup-admin", "salt$digest", Role::Admin, &[])
        .unwrap();

    let demote = UserUpdate {
        role: Some(Role::Operator),
        ..UserUpdate::default()
    };
    let updated = store.update_user(&first, &demote).unwrap();
    assert_eq!(updated.role, Role::Operator);
}

#[test]
fn duplicate_usernames_are_conflicts() {
    let store = Store::open_in_memory().unwrap();
    seed_admin(&store);

    let err = store
        .create_user("root-admin", "salt$digest", Role::Viewer, &[])
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateUsername(_)));

    let other = store
        .create_user("other", "salt$digest", Role::Viewer, &[])
        .unwrap();
    let rename = UserUpdate {
        username: Some("root-admin".to_string()),
        ..UserUpdate::default()
    };
    let err = store.update_user(&other.id, &rename).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateUsername(_)));
}

#[test]
fn create_user_op_hashes_and_normalizes() {
    let store = Store::open_in_memory().unwrap();
    let acting = admin();

    let new_user: NewUser = serde_json::from_value(serde_json::json!({
        "username": "  dana  ",
        "password": "password1",
        "role": "operator",
        "service_scopes": [" svc-a ", "", "svc-b"],
    }))
    .unwrap();

    let view = users::create_user(&store, &acting, &new_user).unwrap();
    assert_eq!(view.username, "dana");
    assert_eq!(view.service_scopes, vec!["svc-a", "svc-b"]);
    assert!(view.permissions.contains(&"services:control".to_string()));

    // The stored hash is salted, never the raw password.
    let record = store.get_user_by_username("dana").unwrap().unwrap();
    assert_ne!(record.password_hash, "password1");
    assert!(record.password_hash.contains('$'));
}

#[test]
fn blank_credentials_are_rejected() {
    let store = Store::open_in_memory().unwrap();
    let acting = admin();

    let new_user: NewUser = serde_json::from_value(serde_json::json!({
        "username": "   ",
        "password": "password1",
        "role": "viewer",
    }))
    .unwrap();
    let err = users::create_user(&store, &acting, &new_user).unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
}

#[test]
fn update_op_rotates_the_password_hash() {
    let store = Store::open_in_memory().unwrap();
    let acting = admin();
    let record = store
        .create_user("erin", "old-salt$old-digest", Role::Viewer, &[])
        .unwrap();

    let patch: UserPatch = serde_json::from_value(serde_json::json!({
        "password": "brand-new-pass",
        "role": "operator",
    }))
    .unwrap();

    let view = users::update_user(&store, &acting, &record.id, &patch).unwrap();
    assert_eq!(view.role, Role::Operator);

    let stored = store.get_user(&record.id).unwrap().unwrap();
    assert_ne!(stored.password_hash, "old-salt$old-digest");

    let err = users::update_user(&store, &acting, "no-such-id", &UserPatch::default())
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[test]
fn last_admin_surfaces_as_conflict_through_the_op() {
    let store = Store::open_in_memory().unwrap();
    let acting = admin();
    let admin_id = seed_admin(&store);

    let patch: UserPatch = serde_json::from_value(serde_json::json!({ "role": "viewer" })).unwrap();
    let err = users::update_user(&store, &acting, &admin_id, &patch).unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    let scoped = auth_user(Role::Admin, &["svc-a"]);
    // Scopes do not gate user management, only service-addressed requests.
    users::list_users(&store, &scoped).unwrap();
}
