//! End-to-end flows over an in-memory store: a user registers, recurring
//! rules back-fill, budgets track the spend, and stats line up with what
//! was written.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use fintrack_config::AuthConfig;
use fintrack_core::recurring::{create_rule, run_sweep, RuleDraft};
use fintrack_core::stats::{summary, Summary, SummaryKind};
use fintrack_core::{auth, budget, export};
use fintrack_store::{entries, open_memory_pool, EntryFilter, EntryKind, EntrySource, Frequency};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn recurring_rule_feeds_budget_and_stats() {
    let pool = open_memory_pool().unwrap();
    let conn = pool.get().unwrap();

    let tokens = auth::register(
        &conn,
        &AuthConfig::default(),
        "a@example.com",
        "Alice",
        "secret1",
    )
    .unwrap();
    let user_id = tokens.user_id;

    // rent has been due since January; creating the rule in mid March
    // back-fills three occurrences
    let rule = create_rule(
        &conn,
        &user_id,
        RuleDraft {
            kind: EntryKind::Expense,
            amount: Decimal::from(2_000_000),
            category: "bills".to_string(),
            description: Some("rent".to_string()),
            frequency: Frequency::Monthly,
            next_date: date("2026-01-01"),
        },
        date("2026-03-15"),
    )
    .unwrap();
    assert_eq!(rule.next_date, date("2026-04-01"));

    let all = entries::find_filtered(&conn, &user_id, &EntryFilter::default()).unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|e| e.source == EntrySource::Recurring));

    // the March occurrence counts against a March budget
    budget::create_budget(&conn, &user_id, "bills", Decimal::from(1_500_000), 3, 2026).unwrap();
    let overview = budget::overview(&conn, &user_id, 3, 2026).unwrap();
    assert_eq!(overview.categories[0].spent, Decimal::from(2_000_000));
    assert_eq!(overview.categories[0].remaining, Decimal::from(-500_000));
    assert_eq!(overview.categories[0].percentage, 133);

    // and shows up in the month summary against February
    let stats = summary(&conn, &user_id, SummaryKind::Expense, 3, 2026, None).unwrap();
    match stats {
        Summary::Single {
            current,
            previous,
            change,
        } => {
            assert_eq!(current.total, Decimal::from(2_000_000));
            assert_eq!(previous.total, Decimal::from(2_000_000));
            assert_eq!(change, Decimal::ZERO);
        }
        Summary::Balance { .. } => panic!("expected single-sided summary"),
    }

    // the export carries every back-filled row
    let csv = export::entries_to_csv(&all).unwrap();
    assert_eq!(csv.lines().count(), 4);
    assert!(csv.contains("2026-02-01,bills,rent,2000000"));
}

#[test]
fn sweep_catches_up_in_stages() {
    let pool = open_memory_pool().unwrap();
    let conn = pool.get().unwrap();

    let tokens = auth::register(
        &conn,
        &AuthConfig::default(),
        "b@example.com",
        "Bob",
        "secret1",
    )
    .unwrap();
    let user_id = tokens.user_id;

    // stored with a past date, as if the server had been down
    fintrack_store::recurring::create(
        &conn,
        &fintrack_store::NewRecurringRule {
            user_id: user_id.clone(),
            kind: EntryKind::Income,
            amount: Decimal::from(5_000_000),
            category: "salary".to_string(),
            description: None,
            frequency: Frequency::Monthly,
            next_date: date("2026-01-01"),
        },
    )
    .unwrap();

    let outcome = run_sweep(&conn, date("2026-02-15"));
    assert_eq!(outcome.created, 2);

    // a month later the next occurrence lands, exactly one
    let outcome = run_sweep(&conn, date("2026-03-15"));
    assert_eq!(outcome.created, 1);

    let all = entries::find_filtered(&conn, &user_id, &EntryFilter::default()).unwrap();
    let dates: Vec<String> = all.iter().map(|e| e.date.to_string()).collect();
    assert_eq!(dates, ["2026-03-01", "2026-02-01", "2026-01-01"]);
}
