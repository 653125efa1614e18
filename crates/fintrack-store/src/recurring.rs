//! Recurring rule storage

use chrono::NaiveDate;
use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{NewRecurringRule, RecurringRule, RecurringRuleUpdate};
use crate::{decimal_column, enum_column};

const RULE_COLUMNS: &str =
    "id, user_id, kind, amount, category, description, frequency, next_date, is_active, created_at";

fn map_rule_row(row: &Row) -> rusqlite::Result<RecurringRule> {
    Ok(RecurringRule {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: enum_column(row.get(2)?, 2)?,
        amount: decimal_column(row.get(3)?, 3)?,
        category: row.get(4)?,
        description: row.get(5)?,
        frequency: enum_column(row.get(6)?, 6)?,
        next_date: row.get(7)?,
        is_active: row.get(8)?,
        created_at: row.get(9)?,
    })
}

pub fn create(conn: &Connection, new: &NewRecurringRule) -> StoreResult<RecurringRule> {
    let id = Uuid::new_v4().to_string();
    let rule = conn
        .prepare(&format!(
            "INSERT INTO recurring_rules (id, user_id, kind, amount, category, description, frequency, next_date) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING {RULE_COLUMNS}"
        ))?
        .query_row(
            params![
                id,
                new.user_id,
                new.kind.to_string(),
                new.amount.to_string(),
                new.category,
                new.description,
                new.frequency.to_string(),
                new.next_date,
            ],
            map_rule_row,
        )?;
    Ok(rule)
}

/// All rules for a user, soonest due first
pub fn list_by_user(conn: &Connection, user_id: &str) -> StoreResult<Vec<RecurringRule>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RULE_COLUMNS} FROM recurring_rules WHERE user_id = ? ORDER BY next_date ASC"
    ))?;
    let rules = stmt
        .query_map(params![user_id], map_rule_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rules)
}

pub fn find(conn: &Connection, id: &str, user_id: &str) -> StoreResult<RecurringRule> {
    let rule = conn
        .prepare(&format!(
            "SELECT {RULE_COLUMNS} FROM recurring_rules WHERE id = ? AND user_id = ?"
        ))?
        .query_row(params![id, user_id], map_rule_row)?;
    Ok(rule)
}

/// Active rules due on or before `as_of`, across all users.
///
/// This is the sweep's work queue and the only cross-user read in the
/// store.
pub fn find_due(conn: &Connection, as_of: NaiveDate) -> StoreResult<Vec<RecurringRule>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RULE_COLUMNS} FROM recurring_rules \
         WHERE is_active = 1 AND next_date <= ? ORDER BY next_date ASC"
    ))?;
    let rules = stmt
        .query_map(params![as_of], map_rule_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rules)
}

pub fn update(
    conn: &Connection,
    id: &str,
    user_id: &str,
    changes: &RecurringRuleUpdate,
) -> StoreResult<RecurringRule> {
    let mut sets: Vec<&str> = Vec::new();
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(kind) = changes.kind {
        sets.push("kind = ?");
        args.push(Box::new(kind.to_string()));
    }
    if let Some(amount) = changes.amount {
        sets.push("amount = ?");
        args.push(Box::new(amount.to_string()));
    }
    if let Some(ref category) = changes.category {
        sets.push("category = ?");
        args.push(Box::new(category.clone()));
    }
    if let Some(ref description) = changes.description {
        sets.push("description = ?");
        args.push(Box::new(description.clone()));
    }
    if let Some(frequency) = changes.frequency {
        sets.push("frequency = ?");
        args.push(Box::new(frequency.to_string()));
    }
    if let Some(next_date) = changes.next_date {
        sets.push("next_date = ?");
        args.push(Box::new(next_date));
    }

    if sets.is_empty() {
        return find(conn, id, user_id);
    }

    let sql = format!(
        "UPDATE recurring_rules SET {} WHERE id = ? AND user_id = ?",
        sets.join(", ")
    );
    args.push(Box::new(id.to_string()));
    args.push(Box::new(user_id.to_string()));

    let updated = conn.execute(&sql, params_from_iter(args.iter()))?;
    if updated == 0 {
        return Err(StoreError::NotFound);
    }
    find(conn, id, user_id)
}

/// Flip the active flag and return the updated rule
pub fn toggle_active(conn: &Connection, id: &str, user_id: &str) -> StoreResult<RecurringRule> {
    let updated = conn.execute(
        "UPDATE recurring_rules SET is_active = NOT is_active WHERE id = ? AND user_id = ?",
        params![id, user_id],
    )?;
    if updated == 0 {
        return Err(StoreError::NotFound);
    }
    find(conn, id, user_id)
}

/// Persist the advanced next-due date after a sweep pass
pub fn set_next_date(conn: &Connection, id: &str, next_date: NaiveDate) -> StoreResult<()> {
    conn.execute(
        "UPDATE recurring_rules SET next_date = ? WHERE id = ?",
        params![next_date, id],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, id: &str, user_id: &str) -> StoreResult<()> {
    let deleted = conn.execute(
        "DELETE FROM recurring_rules WHERE id = ? AND user_id = ?",
        params![id, user_id],
    )?;
    if deleted == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryKind, Frequency};
    use crate::{initialize, users};
    use rust_decimal::Decimal;

    fn test_conn() -> (Connection, String) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let user = users::create(&conn, "a@example.com", "Alice", "hash").unwrap();
        let id = user.id;
        (conn, id)
    }

    fn rule(user_id: &str, next_date: &str) -> NewRecurringRule {
        NewRecurringRule {
            user_id: user_id.to_string(),
            kind: EntryKind::Expense,
            amount: Decimal::from(1000),
            category: "bills".to_string(),
            description: Some("rent".to_string()),
            frequency: Frequency::Monthly,
            next_date: NaiveDate::parse_from_str(next_date, "%Y-%m-%d").unwrap(),
        }
    }

    #[test]
    fn test_find_due_skips_inactive_and_future() {
        let (conn, user_id) = test_conn();
        let due = create(&conn, &rule(&user_id, "2026-03-01")).unwrap();
        let inactive = create(&conn, &rule(&user_id, "2026-03-01")).unwrap();
        toggle_active(&conn, &inactive.id, &user_id).unwrap();
        create(&conn, &rule(&user_id, "2026-06-01")).unwrap();

        let as_of = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let found = find_due(&conn, as_of).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, due.id);
    }

    #[test]
    fn test_toggle_active() {
        let (conn, user_id) = test_conn();
        let created = create(&conn, &rule(&user_id, "2026-03-01")).unwrap();
        assert!(created.is_active);

        let toggled = toggle_active(&conn, &created.id, &user_id).unwrap();
        assert!(!toggled.is_active);
        let toggled = toggle_active(&conn, &created.id, &user_id).unwrap();
        assert!(toggled.is_active);
    }

    #[test]
    fn test_update_partial() {
        let (conn, user_id) = test_conn();
        let created = create(&conn, &rule(&user_id, "2026-03-01")).unwrap();

        let updated = update(
            &conn,
            &created.id,
            &user_id,
            &RecurringRuleUpdate {
                amount: Some(Decimal::from(2500)),
                frequency: Some(Frequency::Weekly),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.amount, Decimal::from(2500));
        assert_eq!(updated.frequency, Frequency::Weekly);
        // untouched fields survive
        assert_eq!(updated.category, "bills");
        assert_eq!(updated.next_date, created.next_date);
    }

    #[test]
    fn test_owner_scoping() {
        let (conn, user_id) = test_conn();
        let other = users::create(&conn, "b@example.com", "Bob", "hash").unwrap();
        let created = create(&conn, &rule(&user_id, "2026-03-01")).unwrap();

        assert!(matches!(
            find(&conn, &created.id, &other.id),
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            delete(&conn, &created.id, &other.id),
            Err(StoreError::NotFound)
        ));
    }
}
