//! Budget endpoints

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use fintrack_core::budget::{self, BudgetOverview};
use fintrack_store::{Budget, BudgetUpdate};

use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBudgetDto {
    pub category: String,
    pub amount: Decimal,
    pub month: u32,
    pub year: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBudgetDto {
    pub category: Option<String>,
    pub amount: Option<Decimal>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MonthQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl MonthQuery {
    /// Requested month, defaulting to the current one
    fn resolve(&self) -> (u32, i32) {
        let today = Utc::now().date_naive();
        (
            self.month.unwrap_or(today.month()),
            self.year.unwrap_or(today.year()),
        )
    }
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(dto): Json<CreateBudgetDto>,
) -> Result<(StatusCode, Json<Budget>), ApiError> {
    let conn = state.conn()?;
    let budget = budget::create_budget(
        &conn,
        &user.id,
        &dto.category,
        dto.amount,
        dto.month,
        dto.year,
    )?;
    Ok((StatusCode::CREATED, Json(budget)))
}

pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<MonthQuery>,
) -> Result<Json<Vec<Budget>>, ApiError> {
    let (month, year) = query.resolve();
    let conn = state.conn()?;
    let budgets = budget::list_budgets(&conn, &user.id, month, year)?;
    Ok(Json(budgets))
}

pub async fn overview(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<MonthQuery>,
) -> Result<Json<BudgetOverview>, ApiError> {
    let (month, year) = query.resolve();
    let conn = state.conn()?;
    let overview = budget::overview(&conn, &user.id, month, year)?;
    Ok(Json(overview))
}

pub async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(dto): Json<UpdateBudgetDto>,
) -> Result<Json<Budget>, ApiError> {
    let conn = state.conn()?;
    let budget = budget::update_budget(
        &conn,
        &id,
        &user.id,
        &BudgetUpdate {
            category: dto.category,
            amount: dto.amount,
            month: dto.month,
            year: dto.year,
        },
    )?;
    Ok(Json(budget))
}

pub async fn remove(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let conn = state.conn()?;
    budget::delete_budget(&conn, &id, &user.id)?;
    Ok(StatusCode::NO_CONTENT)
}
