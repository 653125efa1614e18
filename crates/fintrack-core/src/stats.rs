//! Aggregation over ledger entries: totals, category breakdowns, and
//! month-over-month comparison
//!
//! Both computations are pure reductions over fetched snapshots; calling
//! them twice against an unchanged store yields identical results.

use chrono::{Duration, Months, NaiveDate};
use rusqlite::Connection;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use fintrack_store::{entries, EntryFilter, EntryKind, LedgerEntry};

use crate::error::{CoreError, CoreResult};

/// Totals for one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodStats {
    pub total: Decimal,
    pub by_category: BTreeMap<String, Decimal>,
    pub count: usize,
}

impl PeriodStats {
    pub fn empty() -> Self {
        Self {
            total: Decimal::ZERO,
            by_category: BTreeMap::new(),
            count: 0,
        }
    }
}

/// Reduce entries to a total, a per-category breakdown, and a count.
///
/// The by-category values always sum exactly to the total.
pub fn summarize(entries: &[LedgerEntry]) -> PeriodStats {
    let mut total = Decimal::ZERO;
    let mut by_category: BTreeMap<String, Decimal> = BTreeMap::new();
    for entry in entries {
        total += entry.amount;
        *by_category.entry(entry.category.clone()).or_default() += entry.amount;
    }
    PeriodStats {
        total,
        by_category,
        count: entries.len(),
    }
}

/// Period-over-period change in percent, rounded to two decimal places.
///
/// Defined as 0 when the previous total is 0; dividing by zero has no
/// meaningful reading for a first month of data.
pub fn percent_change(current: Decimal, previous: Decimal) -> Decimal {
    if previous.is_zero() {
        return Decimal::ZERO;
    }
    ((current - previous) / previous.abs() * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Which side of the ledger a summary covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryKind {
    Expense,
    Income,
    Balance,
}

impl std::str::FromStr for SummaryKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "expense" => Ok(SummaryKind::Expense),
            "income" => Ok(SummaryKind::Income),
            "balance" => Ok(SummaryKind::Balance),
            _ => Err(format!("Invalid summary type: {}", s)),
        }
    }
}

/// Optional filters applied to the current period only
#[derive(Debug, Clone, Default)]
pub struct SummaryFilters {
    pub category: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub amount_min: Option<Decimal>,
    pub amount_max: Option<Decimal>,
}

impl SummaryFilters {
    fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.date_from.is_none()
            && self.date_to.is_none()
            && self.amount_min.is_none()
            && self.amount_max.is_none()
    }
}

/// Expense and income totals side by side, with their balance
#[derive(Debug, Clone, Serialize)]
pub struct BalanceStats {
    pub expense: PeriodStats,
    pub income: PeriodStats,
    pub balance: Decimal,
}

/// Month summary response; single-sided or balance form
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Summary {
    Single {
        current: PeriodStats,
        previous: PeriodStats,
        change: Decimal,
    },
    Balance {
        current: BalanceStats,
        previous: BalanceStats,
        change: Decimal,
    },
}

/// First day of the month and the first day of the following month
pub fn month_window(year: i32, month: u32) -> CoreResult<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| CoreError::validation(format!("Invalid month {month}/{year}")))?;
    let end = start
        .checked_add_months(Months::new(1))
        .unwrap_or(NaiveDate::MAX);
    Ok((start, end))
}

/// The month before the given one
pub fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

/// Build the store filter for one month window plus the extra criteria.
///
/// An explicit date sub-range in the filters overrides the month bounds,
/// mirroring how the date filter behaves on the listing endpoints.
fn period_filter(
    kind: EntryKind,
    window: (NaiveDate, NaiveDate),
    filters: Option<&SummaryFilters>,
) -> EntryFilter {
    let (start, end) = window;
    let mut filter = EntryFilter {
        kind: Some(kind),
        date_from: Some(start),
        date_to: Some(end - Duration::days(1)),
        ..Default::default()
    };
    if let Some(extra) = filters {
        filter.category = extra.category.clone();
        filter.amount_min = extra.amount_min;
        filter.amount_max = extra.amount_max;
        if extra.date_from.is_some() || extra.date_to.is_some() {
            filter.date_from = extra.date_from;
            filter.date_to = extra.date_to;
        }
    }
    filter
}

fn period_stats(
    conn: &Connection,
    user_id: &str,
    kind: EntryKind,
    window: (NaiveDate, NaiveDate),
    filters: Option<&SummaryFilters>,
) -> CoreResult<PeriodStats> {
    let fetched = entries::find_filtered(conn, user_id, &period_filter(kind, window, filters))?;
    Ok(summarize(&fetched))
}

/// Month summary with previous-month comparison.
///
/// Extra filters narrow the current period only; the previous month is
/// always the plain month window so the change figure stays comparable.
pub fn summary(
    conn: &Connection,
    user_id: &str,
    kind: SummaryKind,
    month: u32,
    year: i32,
    filters: Option<&SummaryFilters>,
) -> CoreResult<Summary> {
    let current_window = month_window(year, month)?;
    let (prev_year, prev_month) = previous_month(year, month);
    let previous_window = month_window(prev_year, prev_month)?;

    let filters = filters.filter(|f| !f.is_empty());

    match kind {
        SummaryKind::Expense | SummaryKind::Income => {
            let entry_kind = if kind == SummaryKind::Expense {
                EntryKind::Expense
            } else {
                EntryKind::Income
            };
            let current = period_stats(conn, user_id, entry_kind, current_window, filters)?;
            let previous = period_stats(conn, user_id, entry_kind, previous_window, None)?;
            let change = percent_change(current.total, previous.total);
            Ok(Summary::Single {
                current,
                previous,
                change,
            })
        }
        SummaryKind::Balance => {
            let cur_expense =
                period_stats(conn, user_id, EntryKind::Expense, current_window, filters)?;
            let cur_income =
                period_stats(conn, user_id, EntryKind::Income, current_window, filters)?;
            let prev_expense =
                period_stats(conn, user_id, EntryKind::Expense, previous_window, None)?;
            let prev_income = period_stats(conn, user_id, EntryKind::Income, previous_window, None)?;

            let current_balance = cur_income.total - cur_expense.total;
            let previous_balance = prev_income.total - prev_expense.total;
            let change = percent_change(current_balance, previous_balance);

            Ok(Summary::Balance {
                current: BalanceStats {
                    expense: cur_expense,
                    income: cur_income,
                    balance: current_balance,
                },
                previous: BalanceStats {
                    expense: prev_expense,
                    income: prev_income,
                    balance: previous_balance,
                },
                change,
            })
        }
    }
}

/// Whole-history stats for one side of the ledger, with optional filters;
/// backs the per-kind stats endpoints.
pub fn kind_stats(
    conn: &Connection,
    user_id: &str,
    kind: EntryKind,
    filters: Option<&SummaryFilters>,
) -> CoreResult<PeriodStats> {
    let mut filter = EntryFilter {
        kind: Some(kind),
        ..Default::default()
    };
    if let Some(extra) = filters {
        filter.category = extra.category.clone();
        filter.date_from = extra.date_from;
        filter.date_to = extra.date_to;
        filter.amount_min = extra.amount_min;
        filter.amount_max = extra.amount_max;
    }
    let fetched = entries::find_filtered(conn, user_id, &filter)?;
    Ok(summarize(&fetched))
}

/// Percentage share of a category within a total, one decimal place
pub fn share_of_total(amount: Decimal, total: Decimal) -> Decimal {
    if total.is_zero() {
        return Decimal::ZERO;
    }
    (amount / total * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

/// Categories ranked by descending amount
pub fn ranked_categories(stats: &PeriodStats) -> Vec<(String, Decimal)> {
    let mut ranked: Vec<(String, Decimal)> = stats
        .by_category
        .iter()
        .map(|(category, amount)| (category.clone(), *amount))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

/// Saving rate in percent: balance over income, zero when there is no income
pub fn saving_rate(income: Decimal, expense: Decimal) -> i64 {
    if income.is_zero() {
        return 0;
    }
    ((income - expense) / income * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

// ==================== Tests ====================
