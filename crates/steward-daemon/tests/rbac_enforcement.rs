//! RBAC and session behavior: scope enforcement, permission gating,
//! cookie-to-identity resolution, and the sliding expiry window.

mod common;

use chrono::{Duration, Utc};
use common::{auth_user, new_service, FakeSupervisor};
use secrecy::SecretString;
use steward_core::rbac::Role;
use steward_daemon::auth::{
    authenticate, hash_password, hash_token, open_session, resolve_auth_user, SESSION_COOKIE,
};
use steward_daemon::error::ApiError;
use steward_daemon::store::Store;
use steward_daemon::{services, users};

fn secret(value: &str) -> SecretString {
    SecretString::new(value.to_string())
}

#[tokio::test]
async fn scoped_viewer_reads_only_its_services() {
    let store = Store::open_in_memory().unwrap();
    let supervisor = FakeSupervisor::new();
    store.create_service(&new_service("svc-a", Some(3000))).unwrap();
    store.create_service(&new_service("svc-b", Some(3001))).unwrap();

    let viewer = auth_user(Role::Viewer, &["svc-a"]);

    let allowed = services::get_service(&store, &supervisor, &viewer, "svc-a")
        .await
        .unwrap();
    assert!(allowed.managed);

    let err = services::get_service(&store, &supervisor, &viewer, "svc-b")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden));

    // Listing silently narrows to the scope.
    let listed = services::list_services(&store, &viewer).unwrap();
    let names: Vec<_> = listed.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["svc-a"]);
}

#[tokio::test]
async fn unscoped_operator_acts_on_everything() {
    let store = Store::open_in_memory().unwrap();
    let supervisor = FakeSupervisor::new();
    store.create_service(&new_service("svc-a", Some(3000))).unwrap();
    store.create_service(&new_service("svc-b", Some(3001))).unwrap();

    let operator = auth_user(Role::Operator, &[]);
    for name in ["svc-a", "svc-b"] {
        services::get_service(&store, &supervisor, &operator, name)
            .await
            .unwrap();
    }
    assert_eq!(services::list_services(&store, &operator).unwrap().len(), 2);
}

#[test]
fn viewer_cannot_mutate_intent() {
    let store = Store::open_in_memory().unwrap();
    let viewer = auth_user(Role::Viewer, &[]);

    let err = services::create_service(&store, &viewer, &new_service("web", None)).unwrap_err();
    assert!(matches!(err, ApiError::Forbidden));
}

#[test]
fn only_user_managers_touch_users() {
    let store = Store::open_in_memory().unwrap();
    let operator = auth_user(Role::Operator, &[]);
    let admin = auth_user(Role::Admin, &[]);

    assert!(matches!(
        users::list_users(&store, &operator).unwrap_err(),
        ApiError::Forbidden
    ));
    users::list_users(&store, &admin).unwrap();
}

#[test]
fn session_cookie_resolves_to_the_user() {
    let store = Store::open_in_memory().unwrap();
    let record = store
        .create_user(
            "alice",
            &hash_password(&secret("correct horse")),
            Role::Operator,
            &["svc-a".to_string()],
        )
        .unwrap();

    let session = open_session(&store, &record).unwrap();
    let header = format!("{SESSION_COOKIE}={}", session.token);

    let resolved = resolve_auth_user(&store, Some(&header)).unwrap().unwrap();
    assert_eq!(resolved.username, "alice");
    assert_eq!(resolved.role, Role::Operator);
    assert_eq!(resolved.service_scopes, vec!["svc-a".to_string()]);

    // No cookie, garbage cookie: anonymous.
    assert!(resolve_auth_user(&store, None).unwrap().is_none());
    let bogus = format!("{SESSION_COOKIE}=deadbeef");
    assert!(resolve_auth_user(&store, Some(&bogus)).unwrap().is_none());
}

#[test]
fn expired_sessions_resolve_to_none_and_are_removed() {
    let store = Store::open_in_memory().unwrap();
    let record = store
        .create_user("bob", &hash_password(&secret("password1")), Role::Viewer, &[])
        .unwrap();

    let token_hash = hash_token("stale-token");
    store
        .create_session(&token_hash, &record.id, Utc::now() - Duration::hours(1))
        .unwrap();

    let now = Utc::now();
    let resolved = store
        .resolve_session(&token_hash, now, now + Duration::days(7))
        .unwrap();
    assert!(resolved.is_none());

    // The lazy cleanup removed the row; a second lookup hits nothing.
    let again = store
        .resolve_session(&token_hash, now, now + Duration::days(7))
        .unwrap();
    assert!(again.is_none());
}

#[test]
fn successful_lookups_slide_the_expiry_forward() {
    let store = Store::open_in_memory().unwrap();
    let record = store
        .create_user("carol", &hash_password(&secret("password1")), Role::Viewer, &[])
        .unwrap();

    let token_hash = hash_token("fresh-token");
    let now = Utc::now();
    store
        .create_session(&token_hash, &record.id, now + Duration::minutes(5))
        .unwrap();

    // Resolve refreshes the expiry well past the original five minutes.
    store
        .resolve_session(&token_hash, now, now + Duration::days(7))
        .unwrap()
        .unwrap();

    // A lookup an hour later still succeeds only because of the refresh.
    let later = now + Duration::hours(1);
    let resolved = store
        .resolve_session(&token_hash, later, later + Duration::days(7))
        .unwrap();
    assert!(resolved.is_some());
}

#[test]
fn first_login_bootstraps_the_admin() {
    let store = Store::open_in_memory().unwrap();

    let record = authenticate(&store, "first-admin", &secret("longenough")).unwrap();
    assert_eq!(record.role, Role::Admin);
    assert!(record.service_scopes.is_empty());

    // Bootstrap happens exactly once; a second unknown user is rejected.
    let err = authenticate(&store, "second-user", &secret("longenough")).unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));

    // And the admin can log back in.
    authenticate(&store, "first-admin", &secret("longenough")).unwrap();
    let err = authenticate(&store, "first-admin", &secret("wrong-password")).unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
}

#[test]
fn bootstrap_enforces_credential_rules() {
    let store = Store::open_in_memory().unwrap();

    let err = authenticate(&store, "ab", &secret("longenough")).unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    let err = authenticate(&store, "valid-name", &secret("short")).unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));

    // Nothing was created by the failed attempts.
    assert_eq!(store.count_users().unwrap(), 0);
}
