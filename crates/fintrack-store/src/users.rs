//! User accounts, sessions, and refresh-token state

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::User;

const USER_COLUMNS: &str = "id, email, name, password_hash, role, gmail_connected, gmail_token, \
                            refresh_token_hash, refresh_token_expiry, created_at";

fn map_user_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        password_hash: row.get(3)?,
        role: row.get(4)?,
        gmail_connected: row.get(5)?,
        gmail_token: row.get(6)?,
        refresh_token_hash: row.get(7)?,
        refresh_token_expiry: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Create a user. Fails with [crate::StoreError::Duplicate] when the email
/// is already registered.
pub fn create(conn: &Connection, email: &str, name: &str, password_hash: &str) -> StoreResult<User> {
    let id = Uuid::new_v4().to_string();
    let user = conn
        .prepare(&format!(
            "INSERT INTO users (id, email, name, password_hash) VALUES (?, ?, ?, ?) \
             RETURNING {USER_COLUMNS}"
        ))?
        .query_row(params![id, email, name, password_hash], map_user_row)?;
    Ok(user)
}

pub fn find_by_email(conn: &Connection, email: &str) -> StoreResult<Option<User>> {
    let user = conn
        .prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))?
        .query_row(params![email], map_user_row)
        .optional()?;
    Ok(user)
}

pub fn find_by_id(conn: &Connection, id: &str) -> StoreResult<Option<User>> {
    let user = conn
        .prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))?
        .query_row(params![id], map_user_row)
        .optional()?;
    Ok(user)
}

/// All users with an email connection, for the sync pass
pub fn find_gmail_connected(conn: &Connection) -> StoreResult<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE gmail_connected = 1"
    ))?;
    let users = stmt
        .query_map([], map_user_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

/// Store (or clear, with None) the hashed refresh token and its expiry
pub fn set_refresh_token(
    conn: &Connection,
    user_id: &str,
    hash: Option<&str>,
    expires_at: Option<&str>,
) -> StoreResult<()> {
    conn.execute(
        "UPDATE users SET refresh_token_hash = ?, refresh_token_expiry = ? WHERE id = ?",
        params![hash, expires_at, user_id],
    )?;
    Ok(())
}

pub fn set_password_hash(conn: &Connection, user_id: &str, password_hash: &str) -> StoreResult<()> {
    conn.execute(
        "UPDATE users SET password_hash = ? WHERE id = ?",
        params![password_hash, user_id],
    )?;
    Ok(())
}

pub fn set_gmail(
    conn: &Connection,
    user_id: &str,
    connected: bool,
    token: Option<&str>,
) -> StoreResult<()> {
    conn.execute(
        "UPDATE users SET gmail_connected = ?, gmail_token = ? WHERE id = ?",
        params![connected, token, user_id],
    )?;
    Ok(())
}

// ==================== Sessions ====================

/// Persist an access session. `expires_at` is UTC "YYYY-MM-DD HH:MM:SS"
/// so it compares against SQLite's datetime('now').
pub fn create_session(
    conn: &Connection,
    user_id: &str,
    token: &str,
    expires_at: &str,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO sessions (token, user_id, expires_at) VALUES (?, ?, ?)",
        params![token, user_id, expires_at],
    )?;
    Ok(())
}

/// Resolve an unexpired session token to its user
pub fn user_by_session(conn: &Connection, token: &str) -> StoreResult<Option<User>> {
    let user = conn
        .prepare(
            "SELECT u.id, u.email, u.name, u.password_hash, u.role, u.gmail_connected, \
                    u.gmail_token, u.refresh_token_hash, u.refresh_token_expiry, u.created_at \
             FROM users u \
             JOIN sessions s ON s.user_id = u.id \
             WHERE s.token = ? AND s.expires_at > datetime('now')",
        )?
        .query_row(params![token], map_user_row)
        .optional()?;
    Ok(user)
}

pub fn delete_session(conn: &Connection, token: &str) -> StoreResult<()> {
    conn.execute("DELETE FROM sessions WHERE token = ?", params![token])?;
    Ok(())
}

pub fn delete_sessions_for_user(conn: &Connection, user_id: &str) -> StoreResult<()> {
    conn.execute("DELETE FROM sessions WHERE user_id = ?", params![user_id])?;
    Ok(())
}

/// Keep only the most recent `max` sessions for a user
pub fn prune_sessions(conn: &Connection, user_id: &str, max: i64) -> StoreResult<()> {
    conn.execute(
        "DELETE FROM sessions WHERE user_id = ?1 AND token NOT IN (
            SELECT token FROM sessions WHERE user_id = ?1
            ORDER BY created_at DESC, token LIMIT ?2
        )",
        params![user_id, max],
    )?;
    Ok(())
}

// ==================== Synced emails ====================

/// Record that an email message has been processed for a user
pub fn mark_email_synced(conn: &Connection, user_id: &str, message_id: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO synced_emails (user_id, message_id) VALUES (?, ?)",
        params![user_id, message_id],
    )?;
    Ok(())
}

pub fn is_email_synced(conn: &Connection, user_id: &str, message_id: &str) -> StoreResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM synced_emails WHERE user_id = ? AND message_id = ?",
        params![user_id, message_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{initialize, StoreError};

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    #[test]
    fn test_create_and_find() {
        let conn = test_conn();
        let user = create(&conn, "a@example.com", "Alice", "hash").unwrap();
        assert_eq!(user.email, "a@example.com");
        assert_eq!(user.role, "user");
        assert!(!user.gmail_connected);

        let found = find_by_email(&conn, "a@example.com").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(find_by_email(&conn, "b@example.com").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_email() {
        let conn = test_conn();
        create(&conn, "a@example.com", "Alice", "hash").unwrap();
        let result = create(&conn, "a@example.com", "Alice again", "hash");
        assert!(matches!(result, Err(StoreError::Duplicate)));
    }

    #[test]
    fn test_session_round_trip() {
        let conn = test_conn();
        let user = create(&conn, "a@example.com", "Alice", "hash").unwrap();
        create_session(&conn, &user.id, "tok-1", "2999-01-01 00:00:00").unwrap();

        let found = user_by_session(&conn, "tok-1").unwrap().unwrap();
        assert_eq!(found.id, user.id);

        delete_session(&conn, "tok-1").unwrap();
        assert!(user_by_session(&conn, "tok-1").unwrap().is_none());
    }

    #[test]
    fn test_expired_session_is_rejected() {
        let conn = test_conn();
        let user = create(&conn, "a@example.com", "Alice", "hash").unwrap();
        create_session(&conn, &user.id, "tok-old", "2000-01-01 00:00:00").unwrap();
        assert!(user_by_session(&conn, "tok-old").unwrap().is_none());
    }

    #[test]
    fn test_prune_sessions_keeps_most_recent() {
        let conn = test_conn();
        let user = create(&conn, "a@example.com", "Alice", "hash").unwrap();
        for i in 0..4 {
            create_session(&conn, &user.id, &format!("tok-{i}"), "2999-01-01 00:00:00").unwrap();
        }
        prune_sessions(&conn, &user.id, 2).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_refresh_token_state() {
        let conn = test_conn();
        let user = create(&conn, "a@example.com", "Alice", "hash").unwrap();
        set_refresh_token(&conn, &user.id, Some("rt-hash"), Some("2999-01-01 00:00:00")).unwrap();
        let found = find_by_id(&conn, &user.id).unwrap().unwrap();
        assert_eq!(found.refresh_token_hash.as_deref(), Some("rt-hash"));

        set_refresh_token(&conn, &user.id, None, None).unwrap();
        let found = find_by_id(&conn, &user.id).unwrap().unwrap();
        assert!(found.refresh_token_hash.is_none());
    }

    #[test]
    fn test_synced_emails() {
        let conn = test_conn();
        let user = create(&conn, "a@example.com", "Alice", "hash").unwrap();
        assert!(!is_email_synced(&conn, &user.id, "msg-1").unwrap());
        mark_email_synced(&conn, &user.id, "msg-1").unwrap();
        mark_email_synced(&conn, &user.id, "msg-1").unwrap();
        assert!(is_email_synced(&conn, &user.id, "msg-1").unwrap());
    }
}
