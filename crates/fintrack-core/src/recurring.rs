//! Recurring transaction engine
//!
//! A recurring rule is a template with a next-due date. Materialization
//! walks that date forward one frequency step at a time, emitting one
//! ledger entry per elapsed period, until the cursor passes `as_of`. The
//! catch-up is unbounded on purpose: a sweep that was down for a month
//! back-fills every missed occurrence on its next tick.

use chrono::{Duration, Months, NaiveDate};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fintrack_store::{
    entries, recurring, EntryKind, EntrySource, Frequency, NewEntry, NewRecurringRule,
    RecurringRule,
};

use crate::error::{CoreError, CoreResult};

/// Advance a date by one frequency step.
///
/// Monthly and yearly steps clamp the day-of-month (Jan 31 -> Feb 28,
/// Feb 29 -> next Feb 28). On the (unreachable) end of the calendar the
/// cursor saturates at NaiveDate::MAX, which terminates any catch-up loop.
pub fn advance_date(date: NaiveDate, frequency: Frequency) -> NaiveDate {
    match frequency {
        Frequency::Daily => date + Duration::days(1),
        Frequency::Weekly => date + Duration::days(7),
        Frequency::Monthly => date
            .checked_add_months(Months::new(1))
            .unwrap_or(NaiveDate::MAX),
        Frequency::Yearly => date
            .checked_add_months(Months::new(12))
            .unwrap_or(NaiveDate::MAX),
    }
}

/// Materialize every occurrence of `rule` due on or before `as_of`.
///
/// Returns the back-filled entries (possibly empty) and the advanced
/// next-due date, which is guaranteed to be strictly after `as_of`.
/// Pure: persistence is the caller's job.
pub fn materialize_due(rule: &RecurringRule, as_of: NaiveDate) -> (Vec<NewEntry>, NaiveDate) {
    let mut cursor = rule.next_date;
    let mut created = Vec::new();

    while cursor <= as_of {
        created.push(NewEntry {
            user_id: rule.user_id.clone(),
            kind: rule.kind,
            amount: rule.amount,
            category: rule.category.clone(),
            description: rule.description.clone(),
            date: cursor,
            source: EntrySource::Recurring,
            email_id: None,
        });
        cursor = advance_date(cursor, rule.frequency);
    }

    (created, cursor)
}

/// Fields of a new recurring rule as submitted by the user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDraft {
    pub kind: EntryKind,
    pub amount: Decimal,
    pub category: String,
    pub description: Option<String>,
    pub frequency: Frequency,
    pub next_date: NaiveDate,
}

/// Create a rule, back-filling any occurrences that have already elapsed.
///
/// A rule whose next-due date lies in the past creates one entry per
/// elapsed period immediately; the stored rule always carries a next-due
/// date after `today`.
pub fn create_rule(
    conn: &Connection,
    user_id: &str,
    draft: RuleDraft,
    today: NaiveDate,
) -> CoreResult<RecurringRule> {
    if draft.amount < Decimal::ZERO {
        return Err(CoreError::validation("Amount must not be negative"));
    }
    if draft.category.trim().is_empty() {
        return Err(CoreError::validation("Category must not be empty"));
    }

    let mut next_date = draft.next_date;
    while next_date <= today {
        entries::create(
            conn,
            &NewEntry {
                user_id: user_id.to_string(),
                kind: draft.kind,
                amount: draft.amount,
                category: draft.category.clone(),
                description: draft.description.clone(),
                date: next_date,
                source: EntrySource::Recurring,
                email_id: None,
            },
        )?;
        next_date = advance_date(next_date, draft.frequency);
    }

    let rule = recurring::create(
        conn,
        &NewRecurringRule {
            user_id: user_id.to_string(),
            kind: draft.kind,
            amount: draft.amount,
            category: draft.category,
            description: draft.description,
            frequency: draft.frequency,
            next_date,
        },
    )?;
    Ok(rule)
}

/// Materialize and persist one due rule; returns the number of entries
/// created. Each entry is persisted individually and the advanced
/// next-due date once at the end, so a mid-loop failure leaves the date
/// unadvanced and the rule is retried on the next tick.
fn process_rule(conn: &Connection, rule: &RecurringRule, as_of: NaiveDate) -> CoreResult<usize> {
    let (created, next_date) = materialize_due(rule, as_of);
    for entry in &created {
        entries::create(conn, entry)?;
    }
    recurring::set_next_date(conn, &rule.id, next_date)?;

    if !created.is_empty() {
        log::info!(
            "created {} {}(s) \"{}\" for user {}, next due {}",
            created.len(),
            rule.kind,
            rule.description.as_deref().unwrap_or(&rule.category),
            rule.user_id,
            next_date
        );
    }
    Ok(created.len())
}

/// Outcome of one sweep tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Rules processed successfully
    pub processed: usize,
    /// Entries created across all rules
    pub created: usize,
    /// Rules that failed and will be retried next tick
    pub failed: usize,
}

/// One pass over every active rule due on or before `as_of`.
///
/// Rules run sequentially. A failing rule is logged and skipped, never
/// propagated, so one bad rule cannot starve the rest of the batch.
pub fn run_sweep(conn: &Connection, as_of: NaiveDate) -> SweepOutcome {
    let due = match recurring::find_due(conn, as_of) {
        Ok(due) => due,
        Err(e) => {
            log::error!("recurring sweep could not list due rules: {e}");
            return SweepOutcome::default();
        }
    };

    log::info!("processing {} due recurring rule(s)", due.len());

    let mut outcome = SweepOutcome::default();
    for rule in due {
        match process_rule(conn, &rule, as_of) {
            Ok(created) => {
                outcome.processed += 1;
                outcome.created += created;
            }
            Err(e) => {
                outcome.failed += 1;
                log::error!("failed to process recurring rule {}: {e}", rule.id);
            }
        }
    }
    outcome
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn rule(frequency: Frequency, next_date: &str) -> RecurringRule {
        RecurringRule {
            id: "r-1".to_string(),
            user_id: "u-1".to_string(),
            kind: EntryKind::Expense,
            amount: Decimal::from(2_000_000),
            category: "bills".to_string(),
            description: Some("rent".to_string()),
            frequency,
            next_date: date(next_date),
            is_active: true,
            created_at: String::new(),
        }
    }

    #[test]
    fn test_advance_date_steps() {
        assert_eq!(
            advance_date(date("2026-03-15"), Frequency::Daily),
            date("2026-03-16")
        );
        assert_eq!(
            advance_date(date("2026-03-15"), Frequency::Weekly),
            date("2026-03-22")
        );
        assert_eq!(
            advance_date(date("2026-03-15"), Frequency::Monthly),
            date("2026-04-15")
        );
        assert_eq!(
            advance_date(date("2026-03-15"), Frequency::Yearly),
            date("2027-03-15")
        );
    }

    #[test]
    fn test_advance_date_clamps_month_end() {
        assert_eq!(
            advance_date(date("2026-01-31"), Frequency::Monthly),
            date("2026-02-28")
        );
        // leap year
        assert_eq!(
            advance_date(date("2028-01-31"), Frequency::Monthly),
            date("2028-02-29")
        );
        assert_eq!(
            advance_date(date("2028-02-29"), Frequency::Yearly),
            date("2029-02-28")
        );
    }

    #[test]
    fn test_materialize_counts_missed_periods() {
        // the worked example: monthly rule, due since January, swept mid March
        let rule = rule(Frequency::Monthly, "2026-01-01");
        let (created, next) = materialize_due(&rule, date("2026-03-15"));

        let dates: Vec<String> = created.iter().map(|e| e.date.to_string()).collect();
        assert_eq!(dates, ["2026-01-01", "2026-02-01", "2026-03-01"]);
        assert_eq!(next, date("2026-04-01"));
        assert!(created.iter().all(|e| e.source == EntrySource::Recurring));
        assert!(created.iter().all(|e| e.amount == Decimal::from(2_000_000)));
    }

    #[test]
    fn test_materialize_future_rule_is_noop() {
        let rule = rule(Frequency::Monthly, "2026-06-01");
        let (created, next) = materialize_due(&rule, date("2026-03-15"));
        assert!(created.is_empty());
        assert_eq!(next, rule.next_date);
    }

    #[test]
    fn test_materialize_due_today_creates_one() {
        let rule = rule(Frequency::Daily, "2026-03-15");
        let (created, next) = materialize_due(&rule, date("2026-03-15"));
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].date, date("2026-03-15"));
        assert_eq!(next, date("2026-03-16"));
    }

    #[test]
    fn test_materialize_dates_strictly_increase() {
        let rule = rule(Frequency::Weekly, "2026-01-01");
        let (created, next) = materialize_due(&rule, date("2026-03-15"));
        assert_eq!(created.len(), 11);
        for pair in created.windows(2) {
            assert_eq!(pair[1].date - pair[0].date, Duration::days(7));
        }
        assert!(next > date("2026-03-15"));
    }

    mod sweep {
        use super::*;
        use fintrack_store::{initialize, users, EntryFilter};

        fn test_conn() -> (Connection, String) {
            let conn = Connection::open_in_memory().unwrap();
            initialize(&conn).unwrap();
            let user = users::create(&conn, "a@example.com", "Alice", "hash").unwrap();
            let id = user.id;
            (conn, id)
        }

        fn draft(frequency: Frequency, next_date: &str) -> RuleDraft {
            RuleDraft {
                kind: EntryKind::Expense,
                amount: Decimal::from(2_000_000),
                category: "bills".to_string(),
                description: None,
                frequency,
                next_date: date(next_date),
            }
        }

        #[test]
        fn test_create_rule_backfills_elapsed_periods() {
            let (conn, user_id) = test_conn();
            let rule = create_rule(
                &conn,
                &user_id,
                draft(Frequency::Monthly, "2026-01-01"),
                date("2026-03-15"),
            )
            .unwrap();

            assert_eq!(rule.next_date, date("2026-04-01"));
            let created = entries::find_filtered(&conn, &user_id, &EntryFilter::default()).unwrap();
            assert_eq!(created.len(), 3);
        }

        #[test]
        fn test_create_rule_future_date_creates_nothing() {
            let (conn, user_id) = test_conn();
            let rule = create_rule(
                &conn,
                &user_id,
                draft(Frequency::Monthly, "2026-06-01"),
                date("2026-03-15"),
            )
            .unwrap();

            assert_eq!(rule.next_date, date("2026-06-01"));
            let created = entries::find_filtered(&conn, &user_id, &EntryFilter::default()).unwrap();
            assert!(created.is_empty());
        }

        #[test]
        fn test_sweep_advances_and_is_idempotent_per_day() {
            let (conn, user_id) = test_conn();
            // stored directly so the sweep does the whole catch-up
            recurring::create(
                &conn,
                &NewRecurringRule {
                    user_id: user_id.clone(),
                    kind: EntryKind::Expense,
                    amount: Decimal::from(2_000_000),
                    category: "bills".to_string(),
                    description: None,
                    frequency: Frequency::Monthly,
                    next_date: date("2026-01-01"),
                },
            )
            .unwrap();

            let first = run_sweep(&conn, date("2026-03-15"));
            assert_eq!(first.processed, 1);
            assert_eq!(first.created, 3);
            assert_eq!(first.failed, 0);

            // running the sweep again the same day finds nothing due
            let second = run_sweep(&conn, date("2026-03-15"));
            assert_eq!(second.processed, 0);
            assert_eq!(second.created, 0);

            let total = entries::find_filtered(&conn, &user_id, &EntryFilter::default()).unwrap();
            assert_eq!(total.len(), 3);
        }

        #[test]
        fn test_sweep_skips_inactive_rules() {
            let (conn, user_id) = test_conn();
            let rule = recurring::create(
                &conn,
                &NewRecurringRule {
                    user_id: user_id.clone(),
                    kind: EntryKind::Income,
                    amount: Decimal::from(100),
                    category: "salary".to_string(),
                    description: None,
                    frequency: Frequency::Weekly,
                    next_date: date("2026-01-01"),
                },
            )
            .unwrap();
            recurring::toggle_active(&conn, &rule.id, &user_id).unwrap();

            let outcome = run_sweep(&conn, date("2026-03-15"));
            assert_eq!(outcome.processed, 0);
            let created = entries::find_filtered(&conn, &user_id, &EntryFilter::default()).unwrap();
            assert!(created.is_empty());
        }
    }
}
