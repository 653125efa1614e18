//! Budget caps and the monthly budget-vs-spend overview

use chrono::Duration;
use rusqlite::Connection;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::BTreeMap;

use fintrack_store::{budgets, entries, Budget, BudgetUpdate, EntryFilter, EntryKind, StoreError};

use crate::error::{CoreError, CoreResult};
use crate::stats::month_window;

/// One budgeted category joined against its actual spend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetCategoryOverview {
    pub id: String,
    pub category: String,
    pub budget: Decimal,
    pub spent: Decimal,
    /// Cap minus spend; negative when the budget is blown
    pub remaining: Decimal,
    /// Whole-number percent of the cap spent; 0 when the cap is 0
    pub percentage: i64,
}

/// The full monthly overview
#[derive(Debug, Clone, Serialize)]
pub struct BudgetOverview {
    pub month: u32,
    pub year: i32,
    pub total_budget: Decimal,
    pub total_spent: Decimal,
    pub total_remaining: Decimal,
    pub categories: Vec<BudgetCategoryOverview>,
}

fn validate_month(month: u32) -> CoreResult<()> {
    if !(1..=12).contains(&month) {
        return Err(CoreError::validation(format!(
            "Month must be between 1 and 12, got {month}"
        )));
    }
    Ok(())
}

/// Create a budget cap. At most one cap may exist per category and month;
/// a second one is a conflict.
pub fn create_budget(
    conn: &Connection,
    user_id: &str,
    category: &str,
    amount: Decimal,
    month: u32,
    year: i32,
) -> CoreResult<Budget> {
    validate_month(month)?;
    if category.trim().is_empty() {
        return Err(CoreError::validation("Category must not be empty"));
    }
    if amount < Decimal::ZERO {
        return Err(CoreError::validation("Amount must not be negative"));
    }

    budgets::create(conn, user_id, category, amount, month, year).map_err(|e| match e {
        StoreError::Duplicate => CoreError::Conflict {
            message: format!("Budget for \"{category}\" in {month}/{year} already exists"),
        },
        e => e.into(),
    })
}

pub fn list_budgets(
    conn: &Connection,
    user_id: &str,
    month: u32,
    year: i32,
) -> CoreResult<Vec<Budget>> {
    validate_month(month)?;
    Ok(budgets::list_by_month(conn, user_id, month, year)?)
}

pub fn update_budget(
    conn: &Connection,
    id: &str,
    user_id: &str,
    changes: &BudgetUpdate,
) -> CoreResult<Budget> {
    if let Some(month) = changes.month {
        validate_month(month)?;
    }
    if let Some(amount) = changes.amount {
        if amount < Decimal::ZERO {
            return Err(CoreError::validation("Amount must not be negative"));
        }
    }
    budgets::update(conn, id, user_id, changes).map_err(|e| match e {
        StoreError::NotFound => CoreError::not_found("Budget"),
        e => e.into(),
    })
}

pub fn delete_budget(conn: &Connection, id: &str, user_id: &str) -> CoreResult<()> {
    budgets::delete(conn, id, user_id).map_err(|e| match e {
        StoreError::NotFound => CoreError::not_found("Budget"),
        e => e.into(),
    })
}

/// Percent of the cap spent, rounded to a whole number. Zero caps read as
/// 0% rather than dividing by zero.
pub fn cap_percentage(spent: Decimal, cap: Decimal) -> i64 {
    if cap <= Decimal::ZERO {
        return 0;
    }
    (spent / cap * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

/// Join each budget against the month's expense totals per category.
pub fn overview(
    conn: &Connection,
    user_id: &str,
    month: u32,
    year: i32,
) -> CoreResult<BudgetOverview> {
    let (start, end) = month_window(year, month)?;
    let budgets = budgets::list_by_month(conn, user_id, month, year)?;
    let expenses = entries::find_filtered(
        conn,
        user_id,
        &EntryFilter {
            kind: Some(EntryKind::Expense),
            date_from: Some(start),
            date_to: Some(end - Duration::days(1)),
            ..Default::default()
        },
    )?;

    let mut spent_by_category: BTreeMap<String, Decimal> = BTreeMap::new();
    for expense in &expenses {
        *spent_by_category.entry(expense.category.clone()).or_default() += expense.amount;
    }

    let total_budget: Decimal = budgets.iter().map(|b| b.amount).sum();
    // all of the month's spend, budgeted category or not
    let total_spent: Decimal = spent_by_category.values().copied().sum();

    let categories = budgets
        .into_iter()
        .map(|budget| {
            let spent = spent_by_category
                .get(&budget.category)
                .copied()
                .unwrap_or(Decimal::ZERO);
            BudgetCategoryOverview {
                percentage: cap_percentage(spent, budget.amount),
                remaining: budget.amount - spent,
                spent,
                id: budget.id,
                category: budget.category,
                budget: budget.amount,
            }
        })
        .collect();

    Ok(BudgetOverview {
        month,
        year,
        total_budget,
        total_spent,
        total_remaining: total_budget - total_spent,
        categories,
    })
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fintrack_store::{initialize, users, EntrySource, NewEntry};

    fn test_conn() -> (Connection, String) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let user = users::create(&conn, "a@example.com", "Alice", "hash").unwrap();
        let id = user.id;
        (conn, id)
    }

    fn spend(conn: &Connection, user_id: &str, amount: i64, category: &str, day: &str) {
        entries::create(
            conn,
            &NewEntry {
                user_id: user_id.to_string(),
                kind: EntryKind::Expense,
                amount: Decimal::from(amount),
                category: category.to_string(),
                description: None,
                date: NaiveDate::parse_from_str(day, "%Y-%m-%d").unwrap(),
                source: EntrySource::Manual,
                email_id: None,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_cap_percentage() {
        assert_eq!(
            cap_percentage(Decimal::from(1_200_000), Decimal::from(1_000_000)),
            120
        );
        assert_eq!(cap_percentage(Decimal::from(500), Decimal::from(1000)), 50);
        assert_eq!(cap_percentage(Decimal::from(500), Decimal::ZERO), 0);
    }

    #[test]
    fn test_overview_overspent_category() {
        let (conn, user_id) = test_conn();
        create_budget(&conn, &user_id, "food", Decimal::from(1_000_000), 3, 2026).unwrap();
        spend(&conn, &user_id, 700_000, "food", "2026-03-05");
        spend(&conn, &user_id, 500_000, "food", "2026-03-20");
        // other category and other month must not count
        spend(&conn, &user_id, 999, "transport", "2026-03-10");
        spend(&conn, &user_id, 999, "food", "2026-04-01");

        let overview = overview(&conn, &user_id, 3, 2026).unwrap();
        assert_eq!(overview.categories.len(), 1);
        let food = &overview.categories[0];
        assert_eq!(food.spent, Decimal::from(1_200_000));
        assert_eq!(food.remaining, Decimal::from(-200_000));
        assert_eq!(food.percentage, 120);
        // the unbudgeted transport spend still counts toward the month total
        assert_eq!(overview.total_spent, Decimal::from(1_200_999));
        assert_eq!(overview.total_remaining, Decimal::from(-200_999));
    }

    #[test]
    fn test_overview_unspent_budget() {
        let (conn, user_id) = test_conn();
        create_budget(&conn, &user_id, "transport", Decimal::from(300), 3, 2026).unwrap();

        let overview = overview(&conn, &user_id, 3, 2026).unwrap();
        let transport = &overview.categories[0];
        assert_eq!(transport.spent, Decimal::ZERO);
        assert_eq!(transport.remaining, Decimal::from(300));
        assert_eq!(transport.percentage, 0);
    }

    #[test]
    fn test_duplicate_budget_is_conflict() {
        let (conn, user_id) = test_conn();
        create_budget(&conn, &user_id, "food", Decimal::from(100), 3, 2026).unwrap();
        let result = create_budget(&conn, &user_id, "food", Decimal::from(200), 3, 2026);
        assert!(matches!(result, Err(CoreError::Conflict { .. })));
    }

    #[test]
    fn test_invalid_month_rejected() {
        let (conn, user_id) = test_conn();
        let result = create_budget(&conn, &user_id, "food", Decimal::from(100), 13, 2026);
        assert!(matches!(result, Err(CoreError::Validation { .. })));
    }
}
