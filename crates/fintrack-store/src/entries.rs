//! Ledger entry storage and filtered queries

use chrono::Duration;
use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection, Row};
use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{EntryFilter, EntryUpdate, LedgerEntry, NewEntry, SortOrder};
use crate::{decimal_column, enum_column};

const ENTRY_COLUMNS: &str =
    "id, user_id, kind, amount, category, description, date, source, email_id, created_at";

fn map_entry_row(row: &Row) -> rusqlite::Result<LedgerEntry> {
    Ok(LedgerEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: enum_column(row.get(2)?, 2)?,
        amount: decimal_column(row.get(3)?, 3)?,
        category: row.get(4)?,
        description: row.get(5)?,
        date: row.get(6)?,
        source: enum_column(row.get(7)?, 7)?,
        email_id: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Persist a new ledger entry.
///
/// Fails with [StoreError::Duplicate] when `email_id` is already present,
/// which keeps email imports idempotent.
pub fn create(conn: &Connection, new: &NewEntry) -> StoreResult<LedgerEntry> {
    let id = Uuid::new_v4().to_string();
    let entry = conn
        .prepare(&format!(
            "INSERT INTO entries (id, user_id, kind, amount, category, description, date, source, email_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING {ENTRY_COLUMNS}"
        ))?
        .query_row(
            params![
                id,
                new.user_id,
                new.kind.to_string(),
                new.amount.to_string(),
                new.category,
                new.description,
                new.date,
                new.source.to_string(),
                new.email_id,
            ],
            map_entry_row,
        )?;
    Ok(entry)
}

/// Append filter criteria to a WHERE clause that already scopes by user
fn push_filter(sql: &mut String, args: &mut Vec<Box<dyn ToSql>>, filter: &EntryFilter) {
    if let Some(kind) = filter.kind {
        sql.push_str(" AND kind = ?");
        args.push(Box::new(kind.to_string()));
    }
    if let Some(ref category) = filter.category {
        sql.push_str(" AND category = ?");
        args.push(Box::new(category.clone()));
    }
    if let Some(ref search) = filter.search {
        sql.push_str(" AND (LOWER(IFNULL(description, '')) LIKE ? OR LOWER(category) LIKE ?)");
        let pattern = format!("%{}%", search.to_lowercase());
        args.push(Box::new(pattern.clone()));
        args.push(Box::new(pattern));
    }
    if let Some(from) = filter.date_from {
        sql.push_str(" AND date >= ?");
        args.push(Box::new(from));
    }
    if let Some(to) = filter.date_to {
        // inclusive day: anything strictly before the next day
        sql.push_str(" AND date < ?");
        args.push(Box::new(to + Duration::days(1)));
    }
    if let Some(min) = filter.amount_min {
        sql.push_str(" AND CAST(amount AS REAL) >= ?");
        args.push(Box::new(min.to_f64().unwrap_or(0.0)));
    }
    if let Some(max) = filter.amount_max {
        sql.push_str(" AND CAST(amount AS REAL) <= ?");
        args.push(Box::new(max.to_f64().unwrap_or(f64::MAX)));
    }
}

/// All entries for a user matching a filter, newest date first
pub fn find_filtered(
    conn: &Connection,
    user_id: &str,
    filter: &EntryFilter,
) -> StoreResult<Vec<LedgerEntry>> {
    let mut sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE user_id = ?");
    let mut args: Vec<Box<dyn ToSql>> = vec![Box::new(user_id.to_string())];
    push_filter(&mut sql, &mut args, filter);
    sql.push_str(" ORDER BY date DESC, created_at DESC");

    let mut stmt = conn.prepare(&sql)?;
    let entries = stmt
        .query_map(params_from_iter(args.iter()), map_entry_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

/// Map a requested sort field to a safe ORDER BY expression
fn sort_expression(sort_by: &str) -> &'static str {
    match sort_by {
        "amount" => "CAST(amount AS REAL)",
        "category" => "category",
        "created_at" => "created_at",
        _ => "date",
    }
}

/// One page of entries plus the total match count
pub fn find_paginated(
    conn: &Connection,
    user_id: &str,
    filter: &EntryFilter,
    sort_by: &str,
    order: SortOrder,
    page: u32,
    limit: u32,
) -> StoreResult<(Vec<LedgerEntry>, u64)> {
    let mut where_clause = String::from(" FROM entries WHERE user_id = ?");
    let mut args: Vec<Box<dyn ToSql>> = vec![Box::new(user_id.to_string())];
    push_filter(&mut where_clause, &mut args, filter);

    let total: u64 = conn
        .prepare(&format!("SELECT COUNT(*){where_clause}"))?
        .query_row(params_from_iter(args.iter()), |row| row.get(0))?;

    let sql = format!(
        "SELECT {ENTRY_COLUMNS}{where_clause} ORDER BY {} {} LIMIT ? OFFSET ?",
        sort_expression(sort_by),
        order.as_sql(),
    );
    args.push(Box::new(limit));
    args.push(Box::new(page.saturating_sub(1) * limit));

    let mut stmt = conn.prepare(&sql)?;
    let entries = stmt
        .query_map(params_from_iter(args.iter()), map_entry_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok((entries, total))
}

/// Fetch one entry owned by the user
pub fn find(conn: &Connection, id: &str, user_id: &str) -> StoreResult<LedgerEntry> {
    let entry = conn
        .prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ? AND user_id = ?"
        ))?
        .query_row(params![id, user_id], map_entry_row)?;
    Ok(entry)
}

/// Apply a partial update to an owned entry and return the new row
pub fn update(
    conn: &Connection,
    id: &str,
    user_id: &str,
    changes: &EntryUpdate,
) -> StoreResult<LedgerEntry> {
    let mut sets: Vec<&str> = Vec::new();
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();

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
    if let Some(date) = changes.date {
        sets.push("date = ?");
        args.push(Box::new(date));
    }

    if sets.is_empty() {
        return find(conn, id, user_id);
    }

    let sql = format!(
        "UPDATE entries SET {} WHERE id = ? AND user_id = ?",
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

/// Delete an owned entry
pub fn delete(conn: &Connection, id: &str, user_id: &str) -> StoreResult<()> {
    let deleted = conn.execute(
        "DELETE FROM entries WHERE id = ? AND user_id = ?",
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
    use crate::models::{EntryKind, EntrySource};
    use crate::{initialize, users};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn test_conn() -> (Connection, String) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let user = users::create(&conn, "a@example.com", "Alice", "hash").unwrap();
        let id = user.id;
        (conn, id)
    }

    fn entry(user_id: &str, kind: EntryKind, amount: i64, category: &str, date: &str) -> NewEntry {
        NewEntry {
            user_id: user_id.to_string(),
            kind,
            amount: Decimal::from(amount),
            category: category.to_string(),
            description: None,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            source: EntrySource::Manual,
            email_id: None,
        }
    }

    #[test]
    fn test_create_and_find() {
        let (conn, user_id) = test_conn();
        let created = create(
            &conn,
            &entry(&user_id, EntryKind::Expense, 45000, "food", "2026-03-01"),
        )
        .unwrap();
        assert_eq!(created.amount, Decimal::from(45000));

        let found = find(&conn, &created.id, &user_id).unwrap();
        assert_eq!(found, created);
    }

    #[test]
    fn test_find_is_owner_scoped() {
        let (conn, user_id) = test_conn();
        let other = users::create(&conn, "b@example.com", "Bob", "hash").unwrap();
        let created = create(
            &conn,
            &entry(&user_id, EntryKind::Expense, 100, "food", "2026-03-01"),
        )
        .unwrap();

        let result = find(&conn, &created.id, &other.id);
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[test]
    fn test_duplicate_email_id() {
        let (conn, user_id) = test_conn();
        let mut new = entry(&user_id, EntryKind::Expense, 100, "food", "2026-03-01");
        new.source = EntrySource::Email;
        new.email_id = Some("msg-1".to_string());
        create(&conn, &new).unwrap();

        let result = create(&conn, &new);
        assert!(matches!(result, Err(StoreError::Duplicate)));
    }

    #[test]
    fn test_filters() {
        let (conn, user_id) = test_conn();
        create(
            &conn,
            &entry(&user_id, EntryKind::Expense, 100, "food", "2026-03-01"),
        )
        .unwrap();
        create(
            &conn,
            &entry(&user_id, EntryKind::Expense, 900, "transport", "2026-03-05"),
        )
        .unwrap();
        create(
            &conn,
            &entry(&user_id, EntryKind::Income, 5000, "salary", "2026-03-10"),
        )
        .unwrap();

        let expenses = find_filtered(
            &conn,
            &user_id,
            &EntryFilter {
                kind: Some(EntryKind::Expense),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(expenses.len(), 2);
        // newest first
        assert_eq!(expenses[0].category, "transport");

        let by_amount = find_filtered(
            &conn,
            &user_id,
            &EntryFilter {
                amount_min: Some(Decimal::from(500)),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_amount.len(), 2);

        let by_search = find_filtered(
            &conn,
            &user_id,
            &EntryFilter {
                search: Some("TRANS".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_search.len(), 1);
        assert_eq!(by_search[0].category, "transport");
    }

    #[test]
    fn test_date_to_is_inclusive() {
        let (conn, user_id) = test_conn();
        create(
            &conn,
            &entry(&user_id, EntryKind::Expense, 100, "food", "2026-03-05"),
        )
        .unwrap();

        let hit = find_filtered(
            &conn,
            &user_id,
            &EntryFilter {
                date_to: Some(NaiveDate::from_ymd_opt(2026, 3, 5).unwrap()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(hit.len(), 1);

        let miss = find_filtered(
            &conn,
            &user_id,
            &EntryFilter {
                date_to: Some(NaiveDate::from_ymd_opt(2026, 3, 4).unwrap()),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(miss.is_empty());
    }

    #[test]
    fn test_pagination() {
        let (conn, user_id) = test_conn();
        for day in 1..=5 {
            create(
                &conn,
                &entry(
                    &user_id,
                    EntryKind::Expense,
                    day,
                    "food",
                    &format!("2026-03-{day:02}"),
                ),
            )
            .unwrap();
        }

        let (page1, total) = find_paginated(
            &conn,
            &user_id,
            &EntryFilter::default(),
            "date",
            SortOrder::Desc,
            1,
            2,
        )
        .unwrap();
        assert_eq!(total, 5);
        assert_eq!(page1.len(), 2);
        assert_eq!(page1[0].date.to_string(), "2026-03-05");

        let (page3, _) = find_paginated(
            &conn,
            &user_id,
            &EntryFilter::default(),
            "date",
            SortOrder::Desc,
            3,
            2,
        )
        .unwrap();
        assert_eq!(page3.len(), 1);
        assert_eq!(page3[0].date.to_string(), "2026-03-01");
    }

    #[test]
    fn test_update_and_delete() {
        let (conn, user_id) = test_conn();
        let created = create(
            &conn,
            &entry(&user_id, EntryKind::Expense, 100, "food", "2026-03-01"),
        )
        .unwrap();

        let updated = update(
            &conn,
            &created.id,
            &user_id,
            &EntryUpdate {
                amount: Some(Decimal::from(250)),
                description: Some(Some("lunch".to_string())),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.amount, Decimal::from(250));
        assert_eq!(updated.description.as_deref(), Some("lunch"));

        delete(&conn, &created.id, &user_id).unwrap();
        assert!(matches!(
            find(&conn, &created.id, &user_id),
            Err(StoreError::NotFound)
        ));
    }
}
