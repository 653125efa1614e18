//! Month summary endpoint

use axum::extract::{Query, State};
use axum::Json;
use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use fintrack_core::stats::{self, Summary, SummaryFilters, SummaryKind};

use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// expense, income, or balance
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub category: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub amount_min: Option<Decimal>,
    pub amount_max: Option<Decimal>,
}

pub async fn summary(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<Summary>, ApiError> {
    let kind: SummaryKind = query
        .kind
        .as_deref()
        .unwrap_or("balance")
        .parse()
        .map_err(ApiError::bad_request)?;

    let today = Utc::now().date_naive();
    let month = query.month.unwrap_or(today.month());
    let year = query.year.unwrap_or(today.year());

    let filters = SummaryFilters {
        category: query.category.clone(),
        date_from: query.date_from,
        date_to: query.date_to,
        amount_min: query.amount_min,
        amount_max: query.amount_max,
    };

    let conn = state.conn()?;
    let summary = stats::summary(&conn, &user.id, kind, month, year, Some(&filters))?;
    Ok(Json(summary))
}
