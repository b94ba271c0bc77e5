//! Authentication: password hashing, bearer-token sessions, identity
//! resolution.
//!
//! Identity is resolved once per request into an [`AuthUser`] value object
//! and threaded explicitly into every downstream authorization check. The
//! raw session token only ever exists in the caller's cookie; the store sees
//! its SHA-256. Passwords are stored as `salt_hex$digest_hex` with a random
//! per-user salt and compared in constant time.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use steward_core::rbac::{AuthUser, Role};

use crate::error::ApiError;
use crate::store::{Store, UserRecord};

/// Name of the httpOnly session cookie.
pub const SESSION_COOKIE: &str = "steward_session";

/// Sliding session lifetime in seconds (7 days).
pub const SESSION_TTL_SECS: i64 = 60 * 60 * 24 * 7;

const SALT_LEN: usize = 16;
const TOKEN_LEN: usize = 32;

/// A freshly minted session: the raw token (for the cookie) and its expiry.
#[derive(Debug)]
pub struct SessionToken {
    /// Raw bearer token; never persisted.
    pub token: String,
    /// Absolute expiry.
    pub expires_at: DateTime<Utc>,
}

/// Hash a password with a fresh random salt.
#[must_use]
pub fn hash_password(password: &SecretString) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    let digest = password_digest(&salt, password.expose_secret());
    format!("{}${}", hex::encode(salt), hex::encode(digest))
}

/// Verify a password against a stored `salt_hex$digest_hex` value in
/// constant time. Malformed stored values never verify.
#[must_use]
pub fn verify_password(password: &SecretString, stored: &str) -> bool {
    let Some((salt_hex, digest_hex)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(digest_hex)) else {
        return false;
    };
    let computed = password_digest(&salt, password.expose_secret());
    computed.ct_eq(expected.as_slice()).into()
}

fn password_digest(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

/// Generate a fresh random session token.
#[must_use]
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_LEN];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 hex of a raw session token; the only form the store ever sees.
#[must_use]
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Extract the session token from a `Cookie` request header.
#[must_use]
pub fn session_token_from_cookies(header: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

/// Username rule for the bootstrap admin: 3-32 characters from the safe
/// class.
#[must_use]
pub fn is_valid_username(username: &str) -> bool {
    (3..=32).contains(&username.len())
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Verify credentials, bootstrapping the very first user as admin.
///
/// When no users exist yet, the supplied credentials create the initial
/// admin (subject to username and password-length rules). Afterwards,
/// unknown usernames and wrong passwords are indistinguishable to the
/// caller.
///
/// # Errors
///
/// Returns [`ApiError::Validation`] for bad bootstrap credentials and
/// [`ApiError::Unauthorized`] for failed verification.
pub fn authenticate(
    store: &Store,
    username: &str,
    password: &SecretString,
) -> Result<UserRecord, ApiError> {
    let username = username.trim();
    if username.is_empty() || password.expose_secret().is_empty() {
        return Err(ApiError::Validation(
            "Username and password required".to_string(),
        ));
    }

    let mut user = store.get_user_by_username(username)?;

    if user.is_none() && store.count_users()? == 0 {
        if !is_valid_username(username) {
            return Err(ApiError::Validation(
                "Username must be 3-32 characters (letters, digits, . _ -)".to_string(),
            ));
        }
        if password.expose_secret().len() < 8 {
            return Err(ApiError::Validation(
                "Password must be at least 8 characters for the first admin".to_string(),
            ));
        }
        let password_hash = hash_password(password);
        user = Some(store.create_user(username, &password_hash, Role::Admin, &[])?);
    }

    let user = user.ok_or(ApiError::Unauthorized)?;
    if !verify_password(password, &user.password_hash) {
        return Err(ApiError::Unauthorized);
    }
    Ok(user)
}

/// Mint and persist a session for `user`.
///
/// # Errors
///
/// Returns an error on store failure.
pub fn open_session(store: &Store, user: &UserRecord) -> Result<SessionToken, ApiError> {
    let token = generate_token();
    let expires_at = Utc::now() + Duration::seconds(SESSION_TTL_SECS);
    store.create_session(&hash_token(&token), &user.id, expires_at)?;
    Ok(SessionToken { token, expires_at })
}

/// Destroy the session named by a raw token, if any.
///
/// # Errors
///
/// Returns an error on store failure.
pub fn close_session(store: &Store, token: &str) -> Result<(), ApiError> {
    store.delete_session(&hash_token(token))?;
    Ok(())
}

/// Resolve a `Cookie` header to the request identity, sliding the session
/// expiry forward. Absent, unknown and expired sessions all resolve to
/// `None`.
///
/// # Errors
///
/// Returns an error on store failure.
pub fn resolve_auth_user(
    store: &Store,
    cookie_header: Option<&str>,
) -> Result<Option<AuthUser>, ApiError> {
    let Some(token) = cookie_header.and_then(session_token_from_cookies) else {
        return Ok(None);
    };

    let now = Utc::now();
    let refreshed = now + Duration::seconds(SESSION_TTL_SECS);
    let user = store.resolve_session(&hash_token(&token), now, refreshed)?;
    Ok(user.as_ref().map(auth_user_from_record))
}

/// Project a stored user into the per-request identity object.
#[must_use]
pub fn auth_user_from_record(user: &UserRecord) -> AuthUser {
    AuthUser {
        id: user.id.clone(),
        username: user.username.clone(),
        role: user.role,
        service_scopes: user.service_scopes.clone(),
    }
}
