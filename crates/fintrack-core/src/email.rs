//! Bank-email import
//!
//! Emails are pulled from the user's mailbox, parsed by the AI parser,
//! and turned into expense entries with an email provenance tag. The
//! message id is recorded both on the entry (unique column) and in a
//! synced-set, so re-running a sync never duplicates an import.

use async_trait::async_trait;
use chrono::Utc;
use fintrack_config::EmailSyncConfig;
use serde::Deserialize;
use serde_json::Value;

use fintrack_store::{entries, users, DbPool, EntryKind, EntrySource, NewEntry, StoreError, User};

use crate::ai::{self, AiClient, ParsedTransaction};
use crate::error::{CoreError, CoreResult};

/// An email candidate for import
#[derive(Debug, Clone, PartialEq)]
pub struct BankEmail {
    pub message_id: String,
    pub subject: String,
    pub body: String,
}

/// Where bank emails come from; the Gmail client in production, a stub
/// in tests
#[async_trait]
pub trait EmailSource: Send + Sync {
    async fn fetch_bank_emails(
        &self,
        access_token: &str,
        query: &str,
        max_results: u32,
    ) -> CoreResult<Vec<BankEmail>>;
}

/// Turns email text into a transaction; the AI client in production
#[async_trait]
pub trait EmailParser: Send + Sync {
    async fn parse(&self, subject: &str, body: &str) -> CoreResult<Option<ParsedTransaction>>;
}

#[async_trait]
impl EmailParser for AiClient {
    async fn parse(&self, subject: &str, body: &str) -> CoreResult<Option<ParsedTransaction>> {
        ai::parse_email(self, subject, body, Utc::now().date_naive()).await
    }
}

// ==================== Gmail ====================

const GMAIL_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

#[derive(Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Deserialize)]
struct MessageRef {
    id: String,
}

/// Gmail REST client.
///
/// Messages are fetched in metadata form: the Subject header plus
/// Gmail's plain-text snippet, which is enough context for the parser
/// without decoding MIME payloads.
pub struct GmailClient {
    http: reqwest::Client,
    base_url: String,
}

impl GmailClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: GMAIL_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different endpoint, for tests
    pub fn with_base_url(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    async fn get_json(&self, url: &str, access_token: &str) -> CoreResult<Value> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| CoreError::upstream(format!("Gmail request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::upstream(format!("Gmail returned {status}")));
        }
        response
            .json()
            .await
            .map_err(|e| CoreError::upstream(format!("Malformed Gmail response: {e}")))
    }
}

impl Default for GmailClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailSource for GmailClient {
    async fn fetch_bank_emails(
        &self,
        access_token: &str,
        query: &str,
        max_results: u32,
    ) -> CoreResult<Vec<BankEmail>> {
        let list_url = format!(
            "{}/messages?q={}&maxResults={}",
            self.base_url,
            urlencode(query),
            max_results
        );
        let list: MessageList = serde_json::from_value(self.get_json(&list_url, access_token).await?)
            .map_err(|e| CoreError::upstream(format!("Malformed Gmail message list: {e}")))?;

        let mut emails = Vec::with_capacity(list.messages.len());
        for message in list.messages {
            let detail_url = format!(
                "{}/messages/{}?format=metadata&metadataHeaders=Subject",
                self.base_url, message.id
            );
            let detail = self.get_json(&detail_url, access_token).await?;

            let subject = detail["payload"]["headers"]
                .as_array()
                .and_then(|headers| {
                    headers.iter().find(|h| {
                        h["name"]
                            .as_str()
                            .map(|n| n.eq_ignore_ascii_case("subject"))
                            .unwrap_or(false)
                    })
                })
                .and_then(|h| h["value"].as_str())
                .unwrap_or("")
                .to_string();
            let body = detail["snippet"].as_str().unwrap_or("").to_string();

            emails.push(BankEmail {
                message_id: message.id,
                subject,
                body,
            });
        }
        Ok(emails)
    }
}

fn urlencode(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

// ==================== Sync ====================

/// Outcome of one sync pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SyncOutcome {
    /// Expenses created from emails
    pub synced: u32,
    /// Emails seen but skipped (already synced, not a transaction, income)
    pub skipped: u32,
}

/// Import bank emails for one user.
///
/// Only expenses are imported; anything else is marked synced and
/// skipped. A failing email is logged and skipped, never aborts the
/// batch.
pub async fn sync_user(
    pool: &DbPool,
    source: &dyn EmailSource,
    parser: &dyn EmailParser,
    config: &EmailSyncConfig,
    user: &User,
) -> CoreResult<SyncOutcome> {
    if !user.gmail_connected {
        return Err(CoreError::validation("Gmail is not connected"));
    }
    let access_token = user
        .gmail_token
        .clone()
        .ok_or_else(|| CoreError::validation("Gmail is not connected"))?;

    let emails = source
        .fetch_bank_emails(&access_token, &config.query, config.max_results)
        .await?;

    let mut outcome = SyncOutcome::default();
    for email in emails {
        let already_synced = {
            let conn = pool.get().map_err(StoreError::from)?;
            users::is_email_synced(&conn, &user.id, &email.message_id)?
        };
        if already_synced {
            outcome.skipped += 1;
            continue;
        }

        match import_email(pool, parser, user, &email).await {
            Ok(true) => outcome.synced += 1,
            Ok(false) => outcome.skipped += 1,
            Err(e) => {
                outcome.skipped += 1;
                log::error!("failed to process email {}: {e}", email.message_id);
            }
        }
    }

    log::info!(
        "email sync for user {}: {} created, {} skipped",
        user.id,
        outcome.synced,
        outcome.skipped
    );
    Ok(outcome)
}

/// Returns Ok(true) when an expense was created
async fn import_email(
    pool: &DbPool,
    parser: &dyn EmailParser,
    user: &User,
    email: &BankEmail,
) -> CoreResult<bool> {
    let parsed = parser.parse(&email.subject, &email.body).await?;

    let conn = pool.get().map_err(StoreError::from)?;
    let parsed = match parsed {
        Some(parsed) if parsed.kind == EntryKind::Expense => parsed,
        // not a transaction, or an income: remember it and move on
        _ => {
            users::mark_email_synced(&conn, &user.id, &email.message_id)?;
            return Ok(false);
        }
    };

    let created = entries::create(
        &conn,
        &NewEntry {
            user_id: user.id.clone(),
            kind: EntryKind::Expense,
            amount: parsed.amount,
            category: parsed.category.clone(),
            description: if parsed.description.is_empty() {
                None
            } else {
                Some(parsed.description.clone())
            },
            date: parsed.date,
            source: EntrySource::Email,
            email_id: Some(email.message_id.clone()),
        },
    );

    match created {
        Ok(entry) => {
            users::mark_email_synced(&conn, &user.id, &email.message_id)?;
            log::info!(
                "created expense from email: {} - {}",
                entry.amount,
                entry.description.as_deref().unwrap_or(&entry.category)
            );
            Ok(true)
        }
        // another sync already imported this message
        Err(StoreError::Duplicate) => {
            users::mark_email_synced(&conn, &user.id, &email.message_id)?;
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

// ==================== Tests ====================
