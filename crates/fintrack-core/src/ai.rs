//! AI provider client, chat insights, and natural-language transaction
//! parsing
//!
//! All supported providers speak the OpenAI-compatible chat-completion
//! protocol, so one HTTP client covers them; which one is active comes
//! from priority-ordered environment lookup at startup.

use chrono::NaiveDate;
use fintrack_config::{AiConfig, ResolvedAiProvider};
use regex::Regex;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fintrack_store::{chat, entries, ChatMessage, ChatRole, DbPool, EntryFilter, EntryKind,
    EntrySource, NewEntry, StoreError};

use crate::error::{CoreError, CoreResult};
use crate::stats::{self, ranked_categories, saving_rate, share_of_total, PeriodStats};

/// Categories the parser is allowed to emit for expenses
pub const EXPENSE_CATEGORIES: [&str; 9] = [
    "food",
    "transport",
    "shopping",
    "entertainment",
    "bills",
    "health",
    "education",
    "transfer",
    "other",
];

/// Categories the parser is allowed to emit for incomes
pub const INCOME_CATEGORIES: [&str; 7] = [
    "salary",
    "freelance",
    "investment",
    "bonus",
    "gift",
    "refund",
    "other",
];

/// One turn in a chat-completion request
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    fn system(content: String) -> Self {
        Self {
            role: "system".to_string(),
            content,
        }
    }

    fn user(content: String) -> Self {
        Self {
            role: "user".to_string(),
            content,
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
}

/// Chat-completion client over whichever provider the environment selects
pub struct AiClient {
    provider: Option<ResolvedAiProvider>,
    http: reqwest::Client,
    chat_max_tokens: u32,
    history_window: usize,
}

impl AiClient {
    pub fn from_config(config: &AiConfig) -> Self {
        let provider = config.resolve_provider();
        match &provider {
            Some(resolved) => log::info!("using {} chat API", resolved.provider),
            None => log::warn!("no AI API key configured; AI endpoints will report an error"),
        }
        Self {
            provider,
            http: reqwest::Client::new(),
            chat_max_tokens: config.chat_max_tokens,
            history_window: config.history_window,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub fn history_window(&self) -> usize {
        self.history_window
    }

    /// One buffered chat completion
    async fn complete(
        &self,
        messages: &[Message],
        max_tokens: u32,
        temperature: f32,
    ) -> CoreResult<String> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| CoreError::upstream("No AI provider configured"))?;

        let url = format!("{}/chat/completions", provider.base_url);
        let request = ChatCompletionRequest {
            model: &provider.model,
            messages,
            max_tokens,
            temperature,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&provider.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CoreError::upstream(format!("Chat completion request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::upstream(format!(
                "Chat completion returned {status}"
            )));
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CoreError::upstream(format!("Malformed chat completion response: {e}")))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| CoreError::upstream("Empty chat completion"))
    }
}

// ==================== Chat ====================

struct FinancialContext {
    expense: PeriodStats,
    income: PeriodStats,
    recent: Vec<fintrack_store::LedgerEntry>,
}

fn financial_context(conn: &Connection, user_id: &str) -> CoreResult<FinancialContext> {
    let expense = stats::kind_stats(conn, user_id, EntryKind::Expense, None)?;
    let income = stats::kind_stats(conn, user_id, EntryKind::Income, None)?;
    let mut recent = entries::find_filtered(conn, user_id, &EntryFilter::default())?;
    recent.truncate(10);
    Ok(FinancialContext {
        expense,
        income,
        recent,
    })
}

fn context_prompt(context: &FinancialContext) -> String {
    let balance = context.income.total - context.expense.total;
    let mut prompt = format!(
        "You are a personal finance assistant. Answer briefly and concretely, \
         using the user's actual data below.\n\n\
         CURRENT BALANCE: {balance}\n\n\
         INCOME: total {} over {} transaction(s)\n",
        context.income.total, context.income.count
    );
    for (category, amount) in ranked_categories(&context.income) {
        prompt.push_str(&format!(
            "- {category}: {amount} ({}%)\n",
            share_of_total(amount, context.income.total)
        ));
    }
    prompt.push_str(&format!(
        "\nEXPENSES: total {} over {} transaction(s)\n",
        context.expense.total, context.expense.count
    ));
    for (category, amount) in ranked_categories(&context.expense) {
        prompt.push_str(&format!(
            "- {category}: {amount} ({}%)\n",
            share_of_total(amount, context.expense.total)
        ));
    }
    prompt.push_str("\nRECENT TRANSACTIONS:\n");
    for entry in &context.recent {
        let sign = match entry.kind {
            EntryKind::Expense => '-',
            EntryKind::Income => '+',
        };
        prompt.push_str(&format!(
            "- {}: {sign}{} {}{}\n",
            entry.date,
            entry.amount,
            entry.category,
            entry
                .description
                .as_deref()
                .map(|d| format!(" ({d})"))
                .unwrap_or_default()
        ));
    }
    prompt
}

/// Persist the user's message, run a completion over their financial
/// context plus recent history, and persist the reply.
pub async fn chat_reply(
    pool: &DbPool,
    client: &AiClient,
    user_id: &str,
    message: &str,
) -> CoreResult<ChatMessage> {
    let message = message.trim();
    if message.is_empty() {
        return Err(CoreError::validation("Message must not be empty"));
    }

    let (system, history) = {
        let conn = pool.get().map_err(StoreError::from)?;
        chat::append(&conn, user_id, ChatRole::User, message)?;
        let context = financial_context(&conn, user_id)?;
        let history = chat::recent(&conn, user_id, client.history_window())?;
        (context_prompt(&context), history)
    };

    let mut messages = vec![Message::system(system)];
    // recent() is newest-first; the model wants chronological order
    messages.extend(history.iter().rev().map(|m| Message {
        role: m.role.to_string(),
        content: m.content.clone(),
    }));

    let reply = client
        .complete(&messages, client.chat_max_tokens, 0.7)
        .await?;

    let conn = pool.get().map_err(StoreError::from)?;
    let saved = chat::append(&conn, user_id, ChatRole::Assistant, &reply)?;
    Ok(saved)
}

// ==================== Transaction parsing ====================

/// A transaction recovered from free text or an email
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTransaction {
    pub amount: Decimal,
    pub category: String,
    pub description: String,
    pub date: NaiveDate,
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
}

fn parse_system_prompt(today: NaiveDate) -> String {
    format!(
        "You turn natural-language text into a single financial transaction. \
         Reply with one JSON object only, no explanation.\n\n\
         Expense categories: {}\n\
         Income categories: {}\n\n\
         Rules:\n\
         - \"k\" means thousand (45k = 45000), \"m\" means million (1m = 1000000)\n\
         - Default type is \"expense\" unless the text clearly describes income\n\
         - When no date is given use \"{today}\"; \"today\" is \"{today}\", \"yesterday\" the day before\n\n\
         Format: {{\"amount\": number, \"category\": string, \"description\": string, \
         \"date\": \"YYYY-MM-DD\", \"type\": \"expense\"|\"income\"}}",
        EXPENSE_CATEGORIES.join(", "),
        INCOME_CATEGORIES.join(", "),
    )
}

/// Pull the first JSON object out of a model reply, tolerating markdown
/// fences and surrounding prose.
pub(crate) fn extract_json(raw: &str) -> Option<serde_json::Value> {
    let pattern = Regex::new(r"(?s)\{.*\}").ok()?;
    let matched = pattern.find(raw)?;
    serde_json::from_str(matched.as_str()).ok()
}

fn decimal_field(value: &serde_json::Value) -> Decimal {
    match value {
        serde_json::Value::Number(n) => n.to_string().parse().unwrap_or(Decimal::ZERO),
        serde_json::Value::String(s) => s.parse().unwrap_or(Decimal::ZERO),
        _ => Decimal::ZERO,
    }
}

fn sanitize_category(category: &str, kind: EntryKind) -> String {
    let allowed: &[&str] = match kind {
        EntryKind::Expense => &EXPENSE_CATEGORIES,
        EntryKind::Income => &INCOME_CATEGORIES,
    };
    let lowered = category.to_lowercase();
    if allowed.contains(&lowered.as_str()) {
        lowered
    } else {
        "other".to_string()
    }
}

fn parsed_from_json(
    json: &serde_json::Value,
    today: NaiveDate,
    original_text: Option<String>,
) -> ParsedTransaction {
    let kind = match json["type"].as_str() {
        Some("income") => EntryKind::Income,
        _ => EntryKind::Expense,
    };
    let date = json["date"]
        .as_str()
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .unwrap_or(today);
    ParsedTransaction {
        amount: decimal_field(&json["amount"]).abs(),
        category: sanitize_category(json["category"].as_str().unwrap_or("other"), kind),
        description: json["description"].as_str().unwrap_or("").to_string(),
        date,
        kind,
        original_text,
    }
}

/// Parse free text like "coffee 45k this morning" into a transaction
pub async fn parse_transaction(
    client: &AiClient,
    text: &str,
    today: NaiveDate,
) -> CoreResult<ParsedTransaction> {
    if text.trim().is_empty() {
        return Err(CoreError::validation("Text must not be empty"));
    }

    let messages = [
        Message::system(parse_system_prompt(today)),
        Message::user(text.to_string()),
    ];
    let raw = client.complete(&messages, 200, 0.0).await?;

    let json = extract_json(&raw).ok_or_else(|| {
        log::error!("failed to parse AI response: {raw}");
        CoreError::upstream("Could not parse the text, please try again")
    })?;

    Ok(parsed_from_json(&json, today, Some(text.to_string())))
}

/// Classify a bank notification email. Returns None when the email does
/// not describe a transaction.
pub async fn parse_email(
    client: &AiClient,
    subject: &str,
    body: &str,
    today: NaiveDate,
) -> CoreResult<Option<ParsedTransaction>> {
    let system = format!(
        "You read bank notification emails and extract the transaction they \
         describe. Reply with one JSON object only.\n\n\
         If the email is not a transaction notification reply {{\"type\": \"none\"}}.\n\
         Otherwise use the format {{\"amount\": number, \"category\": string, \
         \"description\": string, \"date\": \"YYYY-MM-DD\", \"type\": \"expense\"|\"income\"}}.\n\
         Expense categories: {}. Income categories: {}. \
         When the date is missing use \"{today}\".",
        EXPENSE_CATEGORIES.join(", "),
        INCOME_CATEGORIES.join(", "),
    );
    let messages = [
        Message::system(system),
        Message::user(format!("Subject: {subject}\n\n{body}")),
    ];
    let raw = client.complete(&messages, 200, 0.0).await?;

    let json = match extract_json(&raw) {
        Some(json) => json,
        None => return Ok(None),
    };
    if json["type"].as_str() == Some("none") {
        return Ok(None);
    }
    Ok(Some(parsed_from_json(&json, today, None)))
}

/// Persist a parsed transaction the user has confirmed
pub fn confirm_parsed(
    conn: &Connection,
    user_id: &str,
    parsed: &ParsedTransaction,
) -> CoreResult<fintrack_store::LedgerEntry> {
    let entry = entries::create(
        conn,
        &NewEntry {
            user_id: user_id.to_string(),
            kind: parsed.kind,
            amount: parsed.amount,
            category: parsed.category.clone(),
            description: if parsed.description.is_empty() {
                None
            } else {
                Some(parsed.description.clone())
            },
            date: parsed.date,
            source: EntrySource::Manual,
            email_id: None,
        },
    )?;
    Ok(entry)
}

// ==================== Insights ====================

/// A deterministic digest of the user's finances; no model call involved
pub fn insights(conn: &Connection, user_id: &str) -> CoreResult<String> {
    let expense = stats::kind_stats(conn, user_id, EntryKind::Expense, None)?;
    let income = stats::kind_stats(conn, user_id, EntryKind::Income, None)?;

    if expense.count == 0 && income.count == 0 {
        return Ok(
            "You have no transactions yet. Add an income or expense to get insights.".to_string(),
        );
    }

    let balance = income.total - expense.total;
    let mut text = format!(
        "Financial overview:\n\
         - Balance: {balance} ({})\n\
         - Income: {} over {} transaction(s)\n\
         - Expenses: {} over {} transaction(s)\n\n\
         Observations:",
        if balance >= Decimal::ZERO {
            "positive"
        } else {
            "negative"
        },
        income.total,
        income.count,
        expense.total,
        expense.count,
    );

    if let Some((category, amount)) = ranked_categories(&income).first() {
        text.push_str(&format!(
            "\n- Main income source: {category} ({}%)",
            share_of_total(*amount, income.total)
        ));
    }
    if let Some((category, amount)) = ranked_categories(&expense).first() {
        text.push_str(&format!(
            "\n- Biggest spending category: {category} ({}%)",
            share_of_total(*amount, expense.total)
        ));
    }
    if balance < Decimal::ZERO {
        text.push_str(&format!(
            "\n- You are spending {} more than you earn",
            balance.abs()
        ));
    } else if income.total > Decimal::ZERO {
        text.push_str(&format!(
            "\n- Saving rate: {}%",
            saving_rate(income.total, expense.total)
        ));
    }

    Ok(text)
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_extract_json_from_fenced_reply() {
        let raw = "```json\n{\"amount\": 45000, \"type\": \"expense\"}\n```";
        let json = extract_json(raw).unwrap();
        assert_eq!(json["amount"], 45000);

        let raw = "Here you go: {\"amount\": 1} thanks";
        assert!(extract_json(raw).is_some());

        assert!(extract_json("no json here").is_none());
    }

    #[test]
    fn test_parsed_from_json_defaults() {
        let today = date("2026-03-15");
        let json = serde_json::json!({
            "amount": 45000,
            "category": "food",
            "description": "coffee",
            "date": "2026-03-14",
            "type": "expense"
        });
        let parsed = parsed_from_json(&json, today, None);
        assert_eq!(parsed.amount, Decimal::from(45000));
        assert_eq!(parsed.category, "food");
        assert_eq!(parsed.date, date("2026-03-14"));
        assert_eq!(parsed.kind, EntryKind::Expense);

        // unknown category falls back to other, bad date to today
        let json = serde_json::json!({
            "amount": "120.50",
            "category": "weird",
            "date": "not-a-date",
            "type": "income"
        });
        let parsed = parsed_from_json(&json, today, None);
        assert_eq!(parsed.amount, Decimal::new(12050, 2));
        assert_eq!(parsed.category, "other");
        assert_eq!(parsed.date, today);
        assert_eq!(parsed.kind, EntryKind::Income);
    }

    #[test]
    fn test_sanitize_category_is_kind_aware() {
        assert_eq!(sanitize_category("Salary", EntryKind::Income), "salary");
        // salary is not an expense category
        assert_eq!(sanitize_category("salary", EntryKind::Expense), "other");
        assert_eq!(sanitize_category("FOOD", EntryKind::Expense), "food");
    }

    #[test]
    fn test_insights_without_data() {
        let conn = Connection::open_in_memory().unwrap();
        fintrack_store::initialize(&conn).unwrap();
        let user = fintrack_store::users::create(&conn, "a@example.com", "Alice", "hash").unwrap();

        let text = insights(&conn, &user.id).unwrap();
        assert!(text.contains("no transactions yet"));
    }

    #[test]
    fn test_insights_with_data() {
        let conn = Connection::open_in_memory().unwrap();
        fintrack_store::initialize(&conn).unwrap();
        let user = fintrack_store::users::create(&conn, "a@example.com", "Alice", "hash").unwrap();
        for (kind, amount, category) in [
            (EntryKind::Income, 5_000_000, "salary"),
            (EntryKind::Expense, 1_000_000, "food"),
            (EntryKind::Expense, 250_000, "transport"),
        ] {
            entries::create(
                &conn,
                &NewEntry {
                    user_id: user.id.clone(),
                    kind,
                    amount: Decimal::from(amount),
                    category: category.to_string(),
                    description: None,
                    date: date("2026-03-01"),
                    source: EntrySource::Manual,
                    email_id: None,
                },
            )
            .unwrap();
        }

        let text = insights(&conn, &user.id).unwrap();
        assert!(text.contains("Main income source: salary"));
        assert!(text.contains("Biggest spending category: food"));
        assert!(text.contains("Saving rate: 75%"));
    }
}
