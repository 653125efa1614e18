//! Persisted data models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Transaction kind: money going out or coming in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Expense,
    Income,
}

impl std::str::FromStr for EntryKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "expense" => Ok(EntryKind::Expense),
            "income" => Ok(EntryKind::Income),
            _ => Err(format!("Invalid entry kind: {}", s)),
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Expense => write!(f, "expense"),
            EntryKind::Income => write!(f, "income"),
        }
    }
}

/// How a ledger entry came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntrySource {
    Manual,
    Email,
    Recurring,
}

impl Default for EntrySource {
    fn default() -> Self {
        EntrySource::Manual
    }
}

impl std::str::FromStr for EntrySource {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(EntrySource::Manual),
            "email" => Ok(EntrySource::Email),
            "recurring" => Ok(EntrySource::Recurring),
            _ => Err(format!("Invalid entry source: {}", s)),
        }
    }
}

impl std::fmt::Display for EntrySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntrySource::Manual => write!(f, "manual"),
            EntrySource::Email => write!(f, "email"),
            EntrySource::Recurring => write!(f, "recurring"),
        }
    }
}

/// Recurrence frequency of a recurring rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl std::str::FromStr for Frequency {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "yearly" => Ok(Frequency::Yearly),
            _ => Err(format!("Invalid frequency: {}", s)),
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Frequency::Daily => write!(f, "daily"),
            Frequency::Weekly => write!(f, "weekly"),
            Frequency::Monthly => write!(f, "monthly"),
            Frequency::Yearly => write!(f, "yearly"),
        }
    }
}

/// Chat message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl std::str::FromStr for ChatRole {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            _ => Err(format!("Invalid chat role: {}", s)),
        }
    }
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatRole::User => write!(f, "user"),
            ChatRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    /// Argon2 hash of the password; never serialized
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub gmail_connected: bool,
    /// Bearer token for the Gmail API, provisioned out of band
    #[serde(skip_serializing)]
    pub gmail_token: Option<String>,
    /// Argon2 hash of the active refresh token
    #[serde(skip_serializing)]
    pub refresh_token_hash: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token_expiry: Option<String>,
    pub created_at: String,
}

/// A single recorded expense or income
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub user_id: String,
    pub kind: EntryKind,
    /// Amount of money spent or earned; always non-negative
    pub amount: Decimal,
    pub category: String,
    pub description: Option<String>,
    /// When the transaction happened
    pub date: NaiveDate,
    pub source: EntrySource,
    /// Gmail message id for email-imported entries; unique when present
    pub email_id: Option<String>,
    pub created_at: String,
}

/// Insertable form of a ledger entry
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub user_id: String,
    pub kind: EntryKind,
    pub amount: Decimal,
    pub category: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub source: EntrySource,
    pub email_id: Option<String>,
}

/// Partial update of a ledger entry; None fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct EntryUpdate {
    pub amount: Option<Decimal>,
    pub category: Option<String>,
    pub description: Option<Option<String>>,
    pub date: Option<NaiveDate>,
}

/// A template that periodically generates ledger entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringRule {
    pub id: String,
    pub user_id: String,
    pub kind: EntryKind,
    pub amount: Decimal,
    pub category: String,
    pub description: Option<String>,
    pub frequency: Frequency,
    /// Next date an occurrence is due; strictly in the future after a sweep
    pub next_date: NaiveDate,
    pub is_active: bool,
    pub created_at: String,
}

/// Insertable form of a recurring rule
#[derive(Debug, Clone)]
pub struct NewRecurringRule {
    pub user_id: String,
    pub kind: EntryKind,
    pub amount: Decimal,
    pub category: String,
    pub description: Option<String>,
    pub frequency: Frequency,
    pub next_date: NaiveDate,
}

/// Partial update of a recurring rule; None fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct RecurringRuleUpdate {
    pub kind: Option<EntryKind>,
    pub amount: Option<Decimal>,
    pub category: Option<String>,
    pub description: Option<Option<String>>,
    pub frequency: Option<Frequency>,
    pub next_date: Option<NaiveDate>,
}

/// A monthly spending cap for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: String,
    pub user_id: String,
    pub category: String,
    /// The cap amount
    pub amount: Decimal,
    pub month: u32,
    pub year: i32,
    pub created_at: String,
}

/// Partial update of a budget
#[derive(Debug, Clone, Default)]
pub struct BudgetUpdate {
    pub category: Option<String>,
    pub amount: Option<Decimal>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

/// An in-app notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub is_read: bool,
    pub created_at: String,
}

/// A persisted chat turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub user_id: String,
    pub role: ChatRole,
    pub content: String,
    pub created_at: String,
}

/// Filter over ledger entries; all fields combine with AND
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub kind: Option<EntryKind>,
    pub category: Option<String>,
    /// Case-insensitive substring over description and category
    pub search: Option<String>,
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound; queries use `< date_to + 1 day`
    pub date_to: Option<NaiveDate>,
    pub amount_min: Option<Decimal>,
    pub amount_max: Option<Decimal>,
}

impl EntryFilter {
    /// True when any criterion beyond the owner is set
    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
            && self.category.is_none()
            && self.search.is_none()
            && self.date_from.is_none()
            && self.date_to.is_none()
            && self.amount_min.is_none()
            && self.amount_max.is_none()
    }
}

/// Sort direction for paginated listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Desc
    }
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        assert_eq!("expense".parse::<EntryKind>().unwrap(), EntryKind::Expense);
        assert_eq!(EntryKind::Income.to_string(), "income");
        assert!("transfer".parse::<EntryKind>().is_err());
    }

    #[test]
    fn test_frequency_parse() {
        assert_eq!("MONTHLY".parse::<Frequency>().unwrap(), Frequency::Monthly);
        assert!("fortnightly".parse::<Frequency>().is_err());
    }

    #[test]
    fn test_empty_filter() {
        assert!(EntryFilter::default().is_empty());
        let filter = EntryFilter {
            category: Some("food".to_string()),
            ..Default::default()
        };
        assert!(!filter.is_empty());
    }
}
