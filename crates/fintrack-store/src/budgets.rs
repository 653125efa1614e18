//! Budget cap storage
//!
//! Uniqueness of (user, category, month, year) is enforced by the schema;
//! a violation surfaces as [crate::StoreError::Duplicate].

use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection, Row};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{Budget, BudgetUpdate};
use crate::decimal_column;

const BUDGET_COLUMNS: &str = "id, user_id, category, amount, month, year, created_at";

fn map_budget_row(row: &Row) -> rusqlite::Result<Budget> {
    Ok(Budget {
        id: row.get(0)?,
        user_id: row.get(1)?,
        category: row.get(2)?,
        amount: decimal_column(row.get(3)?, 3)?,
        month: row.get(4)?,
        year: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn create(
    conn: &Connection,
    user_id: &str,
    category: &str,
    amount: Decimal,
    month: u32,
    year: i32,
) -> StoreResult<Budget> {
    let id = Uuid::new_v4().to_string();
    let budget = conn
        .prepare(&format!(
            "INSERT INTO budgets (id, user_id, category, amount, month, year) \
             VALUES (?, ?, ?, ?, ?, ?) \
             RETURNING {BUDGET_COLUMNS}"
        ))?
        .query_row(
            params![id, user_id, category, amount.to_string(), month, year],
            map_budget_row,
        )?;
    Ok(budget)
}

/// Budgets for one month, sorted by category
pub fn list_by_month(
    conn: &Connection,
    user_id: &str,
    month: u32,
    year: i32,
) -> StoreResult<Vec<Budget>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BUDGET_COLUMNS} FROM budgets \
         WHERE user_id = ? AND month = ? AND year = ? ORDER BY category ASC"
    ))?;
    let budgets = stmt
        .query_map(params![user_id, month, year], map_budget_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(budgets)
}

pub fn find(conn: &Connection, id: &str, user_id: &str) -> StoreResult<Budget> {
    let budget = conn
        .prepare(&format!(
            "SELECT {BUDGET_COLUMNS} FROM budgets WHERE id = ? AND user_id = ?"
        ))?
        .query_row(params![id, user_id], map_budget_row)?;
    Ok(budget)
}

pub fn update(
    conn: &Connection,
    id: &str,
    user_id: &str,
    changes: &BudgetUpdate,
) -> StoreResult<Budget> {
    let mut sets: Vec<&str> = Vec::new();
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(ref category) = changes.category {
        sets.push("category = ?");
        args.push(Box::new(category.clone()));
    }
    if let Some(amount) = changes.amount {
        sets.push("amount = ?");
        args.push(Box::new(amount.to_string()));
    }
    if let Some(month) = changes.month {
        sets.push("month = ?");
        args.push(Box::new(month));
    }
    if let Some(year) = changes.year {
        sets.push("year = ?");
        args.push(Box::new(year));
    }

    if sets.is_empty() {
        return find(conn, id, user_id);
    }

    let sql = format!(
        "UPDATE budgets SET {} WHERE id = ? AND user_id = ?",
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

pub fn delete(conn: &Connection, id: &str, user_id: &str) -> StoreResult<()> {
    let deleted = conn.execute(
        "DELETE FROM budgets WHERE id = ? AND user_id = ?",
        params![id, user_id],
    )?;
    if deleted == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

// ==================== Tests ====================
