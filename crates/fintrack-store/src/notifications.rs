//! Notification storage

use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::Notification;

const NOTIFICATION_COLUMNS: &str = "id, user_id, title, message, kind, is_read, created_at";

fn map_notification_row(row: &Row) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        message: row.get(3)?,
        kind: row.get(4)?,
        is_read: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn create(
    conn: &Connection,
    user_id: &str,
    title: &str,
    message: &str,
    kind: &str,
) -> StoreResult<Notification> {
    let id = Uuid::new_v4().to_string();
    let notification = conn
        .prepare(&format!(
            "INSERT INTO notifications (id, user_id, title, message, kind) \
             VALUES (?, ?, ?, ?, ?) \
             RETURNING {NOTIFICATION_COLUMNS}"
        ))?
        .query_row(params![id, user_id, title, message, kind], map_notification_row)?;
    Ok(notification)
}

/// Latest notifications for a user, newest first
pub fn list_by_user(conn: &Connection, user_id: &str, limit: u32) -> StoreResult<Vec<Notification>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
         WHERE user_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?"
    ))?;
    let notifications = stmt
        .query_map(params![user_id, limit], map_notification_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(notifications)
}

pub fn unread_count(conn: &Connection, user_id: &str) -> StoreResult<u64> {
    let count: u64 = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND is_read = 0",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn mark_read(conn: &Connection, id: &str, user_id: &str) -> StoreResult<()> {
    let updated = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ? AND user_id = ?",
        params![id, user_id],
    )?;
    if updated == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

pub fn mark_all_read(conn: &Connection, user_id: &str) -> StoreResult<u64> {
    let updated = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE user_id = ? AND is_read = 0",
        params![user_id],
    )?;
    Ok(updated as u64)
}

pub fn delete(conn: &Connection, id: &str, user_id: &str) -> StoreResult<()> {
    let deleted = conn.execute(
        "DELETE FROM notifications WHERE id = ? AND user_id = ?",
        params![id, user_id],
    )?;
    if deleted == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

// ==================== Tests ====================
