//! AI chat history storage

use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::enum_column;
use crate::error::StoreResult;
use crate::models::{ChatMessage, ChatRole};

const CHAT_COLUMNS: &str = "id, user_id, role, content, created_at";

fn map_chat_row(row: &Row) -> rusqlite::Result<ChatMessage> {
    Ok(ChatMessage {
        id: row.get(0)?,
        user_id: row.get(1)?,
        role: enum_column(row.get(2)?, 2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn append(
    conn: &Connection,
    user_id: &str,
    role: ChatRole,
    content: &str,
) -> StoreResult<ChatMessage> {
    let id = Uuid::new_v4().to_string();
    let message = conn
        .prepare(&format!(
            "INSERT INTO chat_messages (id, user_id, role, content) VALUES (?, ?, ?, ?) \
             RETURNING {CHAT_COLUMNS}"
        ))?
        .query_row(params![id, user_id, role.to_string(), content], map_chat_row)?;
    Ok(message)
}

/// Most recent messages, newest first; the chat context window
pub fn recent(conn: &Connection, user_id: &str, limit: usize) -> StoreResult<Vec<ChatMessage>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CHAT_COLUMNS} FROM chat_messages \
         WHERE user_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?"
    ))?;
    let messages = stmt
        .query_map(params![user_id, limit], map_chat_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(messages)
}

/// Full conversation, oldest first
pub fn history(conn: &Connection, user_id: &str) -> StoreResult<Vec<ChatMessage>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CHAT_COLUMNS} FROM chat_messages \
         WHERE user_id = ? ORDER BY created_at ASC, rowid ASC"
    ))?;
    let messages = stmt
        .query_map(params![user_id], map_chat_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(messages)
}

pub fn clear(conn: &Connection, user_id: &str) -> StoreResult<u64> {
    let deleted = conn.execute(
        "DELETE FROM chat_messages WHERE user_id = ?",
        params![user_id],
    )?;
    Ok(deleted as u64)
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{initialize, users};

    fn test_conn() -> (Connection, String) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let user = users::create(&conn, "a@example.com", "Alice", "hash").unwrap();
        let id = user.id;
        (conn, id)
    }

    #[test]
    fn test_history_order_and_clear() {
        let (conn, user_id) = test_conn();
        append(&conn, &user_id, ChatRole::User, "how much did I spend?").unwrap();
        append(&conn, &user_id, ChatRole::Assistant, "1,200,000 this month").unwrap();

        let all = history(&conn, &user_id).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].role, ChatRole::User);
        assert_eq!(all[1].role, ChatRole::Assistant);

        let latest = recent(&conn, &user_id, 1).unwrap();
        assert_eq!(latest[0].role, ChatRole::Assistant);

        assert_eq!(clear(&conn, &user_id).unwrap(), 2);
        assert!(history(&conn, &user_id).unwrap().is_empty());
    }
}
