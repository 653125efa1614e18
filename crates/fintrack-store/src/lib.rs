//! SQLite persistence layer for fintrack
//!
//! Modules are organized per aggregate:
//! - users: user accounts, sessions, refresh-token state
//! - entries: expense and income ledger rows
//! - recurring: recurring-rule templates
//! - budgets: per-category monthly caps
//! - notifications: in-app notification rows
//! - chat: AI chat history
//!
//! Every read and write is scoped by the owning user id; nothing in this
//! crate returns rows across users except the recurring sweep's due-rule
//! scan.

pub mod budgets;
pub mod chat;
pub mod entries;
pub mod error;
pub mod models;
pub mod notifications;
pub mod recurring;
pub mod users;

use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;

pub use error::{StoreError, StoreResult};
pub use models::*;

/// Shared connection pool type
pub type DbPool = r2d2::Pool<SqliteConnectionManager>;

/// One checked-out pool connection
pub type DbConn = r2d2::PooledConnection<SqliteConnectionManager>;

/// Open (or create) the database file and initialize the schema
pub fn open_pool(path: &Path) -> StoreResult<DbPool> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
            message: e.to_string(),
        })?;
    }
    let manager = SqliteConnectionManager::file(path)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    let pool = r2d2::Pool::new(manager)?;
    let conn = pool.get()?;
    initialize(&conn)?;
    Ok(pool)
}

/// Open an in-memory database, for tests.
///
/// The pool is capped at one connection: every pooled connection would
/// otherwise get its own private in-memory database.
pub fn open_memory_pool() -> StoreResult<DbPool> {
    let manager = SqliteConnectionManager::memory()
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    let pool = r2d2::Pool::builder().max_size(1).build(manager)?;
    let conn = pool.get()?;
    initialize(&conn)?;
    Ok(pool)
}

/// Create all tables and indexes
pub fn initialize(conn: &rusqlite::Connection) -> StoreResult<()> {
    conn.execute_batch(
        r#"
    CREATE TABLE IF NOT EXISTS users(
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'user',
        gmail_connected INTEGER NOT NULL DEFAULT 0,
        gmail_token TEXT,
        refresh_token_hash TEXT,
        refresh_token_expiry TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS sessions(
        token TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);

    CREATE TABLE IF NOT EXISTS entries(
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        kind TEXT NOT NULL CHECK(kind IN ('expense','income')),
        amount TEXT NOT NULL,
        category TEXT NOT NULL,
        description TEXT,
        date TEXT NOT NULL,
        source TEXT NOT NULL DEFAULT 'manual',
        email_id TEXT UNIQUE,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_entries_user_date ON entries(user_id, date);
    CREATE INDEX IF NOT EXISTS idx_entries_user_category ON entries(user_id, category);

    CREATE TABLE IF NOT EXISTS recurring_rules(
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        kind TEXT NOT NULL CHECK(kind IN ('expense','income')),
        amount TEXT NOT NULL,
        category TEXT NOT NULL,
        description TEXT,
        frequency TEXT NOT NULL CHECK(frequency IN ('daily','weekly','monthly','yearly')),
        next_date TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_recurring_due ON recurring_rules(is_active, next_date);

    CREATE TABLE IF NOT EXISTS budgets(
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        category TEXT NOT NULL,
        amount TEXT NOT NULL,
        month INTEGER NOT NULL,
        year INTEGER NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(user_id, category, month, year),
        FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS notifications(
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        title TEXT NOT NULL,
        message TEXT NOT NULL,
        kind TEXT NOT NULL DEFAULT 'info',
        is_read INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, created_at);

    CREATE TABLE IF NOT EXISTS chat_messages(
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        role TEXT NOT NULL CHECK(role IN ('user','assistant')),
        content TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_chat_user ON chat_messages(user_id, created_at);

    CREATE TABLE IF NOT EXISTS synced_emails(
        user_id TEXT NOT NULL,
        message_id TEXT NOT NULL,
        synced_at TEXT NOT NULL DEFAULT (datetime('now')),
        PRIMARY KEY(user_id, message_id),
        FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
    );
    "#,
    )?;
    Ok(())
}

/// Parse a stored decimal column, mapping failures to a rusqlite error
/// so row-mapping closures can use `?`.
pub(crate) fn decimal_column(raw: String, index: usize) -> rusqlite::Result<rust_decimal::Decimal> {
    raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Parse a stored enum column via FromStr
pub(crate) fn enum_column<T>(raw: String, index: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse().map_err(|message: String| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Text,
            message.into(),
        )
    })
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_is_idempotent() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        initialize(&conn).unwrap();
    }

    #[test]
    fn test_memory_pool_shares_schema() {
        let pool = open_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
