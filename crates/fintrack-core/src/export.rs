//! CSV export of ledger entries

use fintrack_store::LedgerEntry;

use crate::error::{CoreError, CoreResult};

/// Render entries as CSV with a date, category, description, amount
/// header row. Entries are written in the order given (the store returns
/// newest first).
pub fn entries_to_csv(entries: &[LedgerEntry]) -> CoreResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["date", "category", "description", "amount"])
        .map_err(|e| CoreError::upstream(format!("CSV write failed: {e}")))?;

    for entry in entries {
        writer
            .write_record([
                entry.date.to_string(),
                entry.category.clone(),
                entry.description.clone().unwrap_or_default(),
                entry.amount.to_string(),
            ])
            .map_err(|e| CoreError::upstream(format!("CSV write failed: {e}")))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| CoreError::upstream(format!("CSV write failed: {e}")))?;
    String::from_utf8(bytes).map_err(|e| CoreError::upstream(format!("CSV encoding failed: {e}")))
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fintrack_store::{EntryKind, EntrySource};
    use rust_decimal::Decimal;

    fn entry(amount: i64, category: &str, description: Option<&str>) -> LedgerEntry {
        LedgerEntry {
            id: String::new(),
            user_id: "u-1".to_string(),
            kind: EntryKind::Expense,
            amount: Decimal::from(amount),
            category: category.to_string(),
            description: description.map(str::to_string),
            date: NaiveDate::from_ymd_opt(2026, 3, 5).unwrap(),
            source: EntrySource::Manual,
            email_id: None,
            created_at: String::new(),
        }
    }

    #[test]
    fn test_csv_shape() {
        let rows = [
            entry(45000, "food", Some("coffee, with milk")),
            entry(120, "transport", None),
        ];
        let csv = entries_to_csv(&rows).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "date,category,description,amount");
        // the comma in the description gets quoted
        assert_eq!(lines[1], "2026-03-05,food,\"coffee, with milk\",45000");
        assert_eq!(lines[2], "2026-03-05,transport,,120");
    }

    #[test]
    fn test_csv_empty() {
        let csv = entries_to_csv(&[]).unwrap();
        assert_eq!(csv.trim(), "date,category,description,amount");
    }
}
