//! Expense and income endpoints
//!
//! Both kinds share one ledger table and one set of handlers; the thin
//! per-kind wrappers below are what the router mounts.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fintrack_core::stats::{self, PeriodStats, SummaryFilters};
use fintrack_core::export;
use fintrack_store::{
    entries, EntryFilter, EntryKind, EntrySource, EntryUpdate, LedgerEntry, NewEntry, SortOrder,
};

use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateEntryDto {
    pub amount: Decimal,
    pub category: String,
    pub description: Option<String>,
    /// Defaults to today
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEntryDto {
    pub amount: Option<Decimal>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub amount_min: Option<Decimal>,
    pub amount_max: Option<Decimal>,
}

impl ListQuery {
    fn filter(&self, kind: EntryKind) -> EntryFilter {
        EntryFilter {
            kind: Some(kind),
            category: self.category.clone(),
            search: self.search.clone(),
            date_from: self.date_from,
            date_to: self.date_to,
            amount_min: self.amount_min,
            amount_max: self.amount_max,
        }
    }

    fn summary_filters(&self) -> SummaryFilters {
        SummaryFilters {
            category: self.category.clone(),
            date_from: self.date_from,
            date_to: self.date_to,
            amount_min: self.amount_min,
            amount_max: self.amount_max,
        }
    }
}

/// Paginated listing response
#[derive(Debug, Serialize)]
pub struct EntriesResponse {
    pub entries: Vec<LedgerEntry>,
    pub total_count: u64,
    pub page: u32,
    pub per_page: u32,
}

fn validate_entry(amount: Decimal, category: &str) -> Result<(), ApiError> {
    if amount < Decimal::ZERO {
        return Err(ApiError::bad_request("Amount must not be negative"));
    }
    if category.trim().is_empty() {
        return Err(ApiError::bad_request("Category must not be empty"));
    }
    Ok(())
}

// ==================== Shared handlers ====================

async fn create_entry(
    state: AppState,
    user_id: String,
    kind: EntryKind,
    dto: CreateEntryDto,
) -> Result<(StatusCode, Json<LedgerEntry>), ApiError> {
    validate_entry(dto.amount, &dto.category)?;
    let conn = state.conn()?;
    let entry = entries::create(
        &conn,
        &NewEntry {
            user_id,
            kind,
            amount: dto.amount,
            category: dto.category,
            description: dto.description,
            date: dto.date.unwrap_or_else(|| Utc::now().date_naive()),
            source: EntrySource::Manual,
            email_id: None,
        },
    )?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn list_entries(
    state: AppState,
    user_id: String,
    kind: EntryKind,
    query: ListQuery,
) -> Result<Json<EntriesResponse>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.limit.unwrap_or(10).clamp(1, 100);

    let conn = state.conn()?;
    let (entries, total_count) = entries::find_paginated(
        &conn,
        &user_id,
        &query.filter(kind),
        query.sort_by.as_deref().unwrap_or("date"),
        query.sort_order.unwrap_or_default(),
        page,
        per_page,
    )?;

    Ok(Json(EntriesResponse {
        entries,
        total_count,
        page,
        per_page,
    }))
}

async fn all_entries(
    state: AppState,
    user_id: String,
    kind: EntryKind,
) -> Result<Json<Vec<LedgerEntry>>, ApiError> {
    let conn = state.conn()?;
    let entries = entries::find_filtered(
        &conn,
        &user_id,
        &EntryFilter {
            kind: Some(kind),
            ..Default::default()
        },
    )?;
    Ok(Json(entries))
}

async fn entry_stats(
    state: AppState,
    user_id: String,
    kind: EntryKind,
    query: ListQuery,
) -> Result<Json<PeriodStats>, ApiError> {
    let conn = state.conn()?;
    let stats = stats::kind_stats(&conn, &user_id, kind, Some(&query.summary_filters()))?;
    Ok(Json(stats))
}

async fn export_entries_csv(
    state: AppState,
    user_id: String,
    kind: EntryKind,
    query: ListQuery,
) -> Result<impl IntoResponse, ApiError> {
    let conn = state.conn()?;
    let fetched = entries::find_filtered(&conn, &user_id, &query.filter(kind))?;
    let csv = export::entries_to_csv(&fetched)?;

    let filename = match kind {
        EntryKind::Expense => "attachment; filename=\"expenses.csv\"",
        EntryKind::Income => "attachment; filename=\"incomes.csv\"",
    };
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, filename),
        ],
        csv,
    ))
}

async fn get_entry(
    state: AppState,
    user_id: String,
    id: String,
) -> Result<Json<LedgerEntry>, ApiError> {
    let conn = state.conn()?;
    let entry = entries::find(&conn, &id, &user_id)?;
    Ok(Json(entry))
}

async fn update_entry(
    state: AppState,
    user_id: String,
    id: String,
    dto: UpdateEntryDto,
) -> Result<Json<LedgerEntry>, ApiError> {
    if let Some(amount) = dto.amount {
        if amount < Decimal::ZERO {
            return Err(ApiError::bad_request("Amount must not be negative"));
        }
    }
    let conn = state.conn()?;
    let entry = entries::update(
        &conn,
        &id,
        &user_id,
        &EntryUpdate {
            amount: dto.amount,
            category: dto.category,
            description: dto.description.map(Some),
            date: dto.date,
        },
    )?;
    Ok(Json(entry))
}

async fn delete_entry(state: AppState, user_id: String, id: String) -> Result<StatusCode, ApiError> {
    let conn = state.conn()?;
    entries::delete(&conn, &id, &user_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ==================== Expense wrappers ====================

pub async fn create_expense(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(dto): Json<CreateEntryDto>,
) -> Result<(StatusCode, Json<LedgerEntry>), ApiError> {
    create_entry(state, user.id, EntryKind::Expense, dto).await
}

pub async fn list_expenses(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<EntriesResponse>, ApiError> {
    list_entries(state, user.id, EntryKind::Expense, query).await
}

pub async fn all_expenses(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<LedgerEntry>>, ApiError> {
    all_entries(state, user.id, EntryKind::Expense).await
}

pub async fn expense_stats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<PeriodStats>, ApiError> {
    entry_stats(state, user.id, EntryKind::Expense, query).await
}

pub async fn export_expenses_csv(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    export_entries_csv(state, user.id, EntryKind::Expense, query).await
}

pub async fn get_expense(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<LedgerEntry>, ApiError> {
    get_entry(state, user.id, id).await
}

pub async fn update_expense(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(dto): Json<UpdateEntryDto>,
) -> Result<Json<LedgerEntry>, ApiError> {
    update_entry(state, user.id, id, dto).await
}

pub async fn delete_expense(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    delete_entry(state, user.id, id).await
}

// ==================== Income wrappers ====================

pub async fn create_income(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(dto): Json<CreateEntryDto>,
) -> Result<(StatusCode, Json<LedgerEntry>), ApiError> {
    create_entry(state, user.id, EntryKind::Income, dto).await
}

pub async fn list_incomes(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<EntriesResponse>, ApiError> {
    list_entries(state, user.id, EntryKind::Income, query).await
}

pub async fn all_incomes(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<LedgerEntry>>, ApiError> {
    all_entries(state, user.id, EntryKind::Income).await
}

pub async fn income_stats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<PeriodStats>, ApiError> {
    entry_stats(state, user.id, EntryKind::Income, query).await
}

pub async fn export_incomes_csv(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    export_entries_csv(state, user.id, EntryKind::Income, query).await
}

pub async fn get_income(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<LedgerEntry>, ApiError> {
    get_entry(state, user.id, id).await
}

pub async fn update_income(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(dto): Json<UpdateEntryDto>,
) -> Result<Json<LedgerEntry>, ApiError> {
    update_entry(state, user.id, id, dto).await
}

pub async fn delete_income(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    delete_entry(state, user.id, id).await
}
