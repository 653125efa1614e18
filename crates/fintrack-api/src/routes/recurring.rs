//! Recurring rule endpoints

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use fintrack_core::recurring::{self, RuleDraft};
use fintrack_store::{self as store, EntryKind, Frequency, RecurringRule, RecurringRuleUpdate};

use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateRecurringDto {
    pub kind: Option<EntryKind>,
    pub amount: Option<Decimal>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub frequency: Option<Frequency>,
    pub next_date: Option<NaiveDate>,
}

/// Create a rule. Occurrences that have already elapsed are back-filled
/// immediately; the stored next-due date always lies in the future.
pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(dto): Json<RuleDraft>,
) -> Result<(StatusCode, Json<RecurringRule>), ApiError> {
    let conn = state.conn()?;
    let rule = recurring::create_rule(&conn, &user.id, dto, Utc::now().date_naive())?;
    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<RecurringRule>>, ApiError> {
    let conn = state.conn()?;
    let rules = store::recurring::list_by_user(&conn, &user.id)?;
    Ok(Json(rules))
}

pub async fn get_rule(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<RecurringRule>, ApiError> {
    let conn = state.conn()?;
    let rule = store::recurring::find(&conn, &id, &user.id)?;
    Ok(Json(rule))
}

pub async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(dto): Json<UpdateRecurringDto>,
) -> Result<Json<RecurringRule>, ApiError> {
    if let Some(amount) = dto.amount {
        if amount < Decimal::ZERO {
            return Err(ApiError::bad_request("Amount must not be negative"));
        }
    }
    let conn = state.conn()?;
    let rule = store::recurring::update(
        &conn,
        &id,
        &user.id,
        &RecurringRuleUpdate {
            kind: dto.kind,
            amount: dto.amount,
            category: dto.category,
            description: dto.description.map(Some),
            frequency: dto.frequency,
            next_date: dto.next_date,
        },
    )?;
    Ok(Json(rule))
}

pub async fn toggle(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<RecurringRule>, ApiError> {
    let conn = state.conn()?;
    let rule = store::recurring::toggle_active(&conn, &id, &user.id)?;
    Ok(Json(rule))
}

pub async fn remove(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let conn = state.conn()?;
    store::recurring::delete(&conn, &id, &user.id)?;
    Ok(StatusCode::NO_CONTENT)
}
