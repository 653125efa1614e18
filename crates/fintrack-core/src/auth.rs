//! Registration, login, session tokens, and refresh-token rotation
//!
//! Access tokens are opaque session tokens persisted with an expiry.
//! Refresh tokens are random secrets handed to the client once; only
//! their argon2 hash is stored. A refresh compares the presented secret
//! against the stored hash, and on success rotates both tokens. Any
//! mismatch or expiry clears the stored hash, forcing a fresh login.

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{Duration, Utc};
use fintrack_config::AuthConfig;
use password_hash::SaltString;
use rand_core::{OsRng, RngCore};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use fintrack_store::{users, User};

use crate::error::{CoreError, CoreResult};

const EXPIRY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Tokens returned from register and login
#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
}

/// Public view of a user
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub gmail_connected: bool,
    pub created_at: String,
}

impl From<&User> for Profile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role.clone(),
            gmail_connected: user.gmail_connected,
            created_at: user.created_at.clone(),
        }
    }
}

/// Result of a successful token refresh; both tokens are rotated
#[derive(Debug, Clone, Serialize)]
pub struct RefreshedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub user: Profile,
}

fn hash_secret(secret: &str) -> CoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|_| CoreError::upstream("Password hashing failed"))?;
    Ok(hash.to_string())
}

fn verify_secret(hash: &str, secret: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok()
}

/// 32 random bytes, hex encoded
fn random_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn expiry_in(duration: Duration) -> String {
    (Utc::now() + duration).format(EXPIRY_FORMAT).to_string()
}

fn refresh_token_expired(expiry: &str) -> bool {
    match chrono::NaiveDateTime::parse_from_str(expiry, EXPIRY_FORMAT) {
        Ok(expiry) => Utc::now().naive_utc() > expiry,
        // an unreadable expiry is treated as expired
        Err(_) => true,
    }
}

/// Create a session and a fresh refresh token for the user
fn issue_tokens(conn: &Connection, config: &AuthConfig, user: &User) -> CoreResult<AuthTokens> {
    let access_token = Uuid::new_v4().to_string();
    users::create_session(
        conn,
        &user.id,
        &access_token,
        &expiry_in(Duration::minutes(config.access_ttl_minutes)),
    )?;
    users::prune_sessions(conn, &user.id, config.max_sessions)?;

    let refresh_token = random_token();
    let refresh_hash = hash_secret(&refresh_token)?;
    users::set_refresh_token(
        conn,
        &user.id,
        Some(&refresh_hash),
        Some(&expiry_in(Duration::days(config.refresh_ttl_days))),
    )?;

    Ok(AuthTokens {
        access_token,
        refresh_token,
        user_id: user.id.clone(),
    })
}

/// Register a new user. A taken email is a conflict.
pub fn register(
    conn: &Connection,
    config: &AuthConfig,
    email: &str,
    name: &str,
    password: &str,
) -> CoreResult<AuthTokens> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(CoreError::validation("A valid email is required"));
    }
    if password.len() < 6 {
        return Err(CoreError::validation(
            "Password must be at least 6 characters",
        ));
    }

    if users::find_by_email(conn, &email)?.is_some() {
        return Err(CoreError::Conflict {
            message: "Email already registered".to_string(),
        });
    }

    let password_hash = hash_secret(password)?;
    let user = users::create(conn, &email, name.trim(), &password_hash)?;
    issue_tokens(conn, config, &user)
}

/// Verify credentials and issue tokens. The same Unauthorized error
/// covers unknown emails and wrong passwords.
pub fn login(
    conn: &Connection,
    config: &AuthConfig,
    email: &str,
    password: &str,
) -> CoreResult<AuthTokens> {
    let email = email.trim().to_lowercase();
    let user = users::find_by_email(conn, &email)?.ok_or(CoreError::Unauthorized)?;

    if !verify_secret(&user.password_hash, password) {
        return Err(CoreError::Unauthorized);
    }

    issue_tokens(conn, config, &user)
}

/// Exchange a refresh token for fresh tokens.
///
/// The stored hash is cleared on expiry and on mismatch, so a leaked or
/// stale token can be presented at most once.
pub fn refresh(
    conn: &Connection,
    config: &AuthConfig,
    user_id: &str,
    raw_token: &str,
) -> CoreResult<RefreshedTokens> {
    let user = users::find_by_id(conn, user_id)?.ok_or(CoreError::Unauthorized)?;

    let (stored_hash, expiry) = match (&user.refresh_token_hash, &user.refresh_token_expiry) {
        (Some(hash), Some(expiry)) => (hash, expiry),
        _ => return Err(CoreError::Unauthorized),
    };

    if refresh_token_expired(expiry) {
        users::set_refresh_token(conn, &user.id, None, None)?;
        return Err(CoreError::Unauthorized);
    }

    if !verify_secret(stored_hash, raw_token) {
        users::set_refresh_token(conn, &user.id, None, None)?;
        return Err(CoreError::Unauthorized);
    }

    let tokens = issue_tokens(conn, config, &user)?;
    Ok(RefreshedTokens {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        user: Profile::from(&user),
    })
}

/// Drop refresh state and the presented session
pub fn logout(conn: &Connection, user_id: &str, session_token: Option<&str>) -> CoreResult<()> {
    users::set_refresh_token(conn, user_id, None, None)?;
    if let Some(token) = session_token {
        users::delete_session(conn, token)?;
    }
    Ok(())
}

/// Resolve a bearer token to its user
pub fn authenticate(conn: &Connection, token: &str) -> CoreResult<User> {
    users::user_by_session(conn, token)?.ok_or(CoreError::Unauthorized)
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use fintrack_store::initialize;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn config() -> AuthConfig {
        AuthConfig::default()
    }

    #[test]
    fn test_register_login_round_trip() {
        let conn = test_conn();
        let tokens = register(&conn, &config(), "a@example.com", "Alice", "secret1").unwrap();
        assert!(!tokens.access_token.is_empty());
        assert_eq!(tokens.refresh_token.len(), 64);

        let user = authenticate(&conn, &tokens.access_token).unwrap();
        assert_eq!(user.email, "a@example.com");

        let again = login(&conn, &config(), "a@example.com", "secret1").unwrap();
        assert_ne!(again.access_token, tokens.access_token);
    }

    #[test]
    fn test_register_duplicate_email_conflicts() {
        let conn = test_conn();
        register(&conn, &config(), "a@example.com", "Alice", "secret1").unwrap();
        let result = register(&conn, &config(), "A@Example.com", "Alice", "secret1");
        assert!(matches!(result, Err(CoreError::Conflict { .. })));
    }

    #[test]
    fn test_login_wrong_password() {
        let conn = test_conn();
        register(&conn, &config(), "a@example.com", "Alice", "secret1").unwrap();
        assert!(matches!(
            login(&conn, &config(), "a@example.com", "wrong"),
            Err(CoreError::Unauthorized)
        ));
        assert!(matches!(
            login(&conn, &config(), "nobody@example.com", "secret1"),
            Err(CoreError::Unauthorized)
        ));
    }

    #[test]
    fn test_refresh_rotates_tokens() {
        let conn = test_conn();
        let tokens = register(&conn, &config(), "a@example.com", "Alice", "secret1").unwrap();

        let refreshed = refresh(&conn, &config(), &tokens.user_id, &tokens.refresh_token).unwrap();
        assert_ne!(refreshed.refresh_token, tokens.refresh_token);
        assert_eq!(refreshed.user.email, "a@example.com");

        // the old refresh token no longer verifies after rotation
        let replay = refresh(&conn, &config(), &tokens.user_id, &tokens.refresh_token);
        assert!(matches!(replay, Err(CoreError::Unauthorized)));

        // and the failed attempt cleared the stored hash entirely
        let with_new = refresh(&conn, &config(), &tokens.user_id, &refreshed.refresh_token);
        assert!(matches!(with_new, Err(CoreError::Unauthorized)));
    }

    #[test]
    fn test_refresh_with_bogus_token_clears_state() {
        let conn = test_conn();
        let tokens = register(&conn, &config(), "a@example.com", "Alice", "secret1").unwrap();

        let result = refresh(&conn, &config(), &tokens.user_id, "not-the-token");
        assert!(matches!(result, Err(CoreError::Unauthorized)));

        // even the real token is now rejected
        let result = refresh(&conn, &config(), &tokens.user_id, &tokens.refresh_token);
        assert!(matches!(result, Err(CoreError::Unauthorized)));
    }

    #[test]
    fn test_expired_refresh_token() {
        let conn = test_conn();
        let tokens = register(&conn, &config(), "a@example.com", "Alice", "secret1").unwrap();
        users::set_refresh_token(
            &conn,
            &tokens.user_id,
            Some("$argon2id$whatever"),
            Some("2000-01-01 00:00:00"),
        )
        .unwrap();

        let result = refresh(&conn, &config(), &tokens.user_id, &tokens.refresh_token);
        assert!(matches!(result, Err(CoreError::Unauthorized)));

        let user = users::find_by_id(&conn, &tokens.user_id).unwrap().unwrap();
        assert!(user.refresh_token_hash.is_none());
    }

    #[test]
    fn test_logout_invalidates_session_and_refresh() {
        let conn = test_conn();
        let tokens = register(&conn, &config(), "a@example.com", "Alice", "secret1").unwrap();

        logout(&conn, &tokens.user_id, Some(&tokens.access_token)).unwrap();

        assert!(matches!(
            authenticate(&conn, &tokens.access_token),
            Err(CoreError::Unauthorized)
        ));
        assert!(matches!(
            refresh(&conn, &config(), &tokens.user_id, &tokens.refresh_token),
            Err(CoreError::Unauthorized)
        ));
    }
}
