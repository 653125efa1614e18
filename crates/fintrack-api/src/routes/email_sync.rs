//! Email sync endpoints
//!
//! Gmail access tokens are provisioned out of band and stored per user;
//! there is no OAuth consent flow here. Sync is pull-only.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use fintrack_core::email::{self, GmailClient, SyncOutcome};
use fintrack_store::users;

use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ConnectDto {
    pub access_token: String,
}

pub async fn connect(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(dto): Json<ConnectDto>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if dto.access_token.trim().is_empty() {
        return Err(ApiError::bad_request("An access token is required"));
    }
    let conn = state.conn()?;
    users::set_gmail(&conn, &user.id, true, Some(dto.access_token.trim()))?;
    Ok(Json(serde_json::json!({ "connected": true })))
}

pub async fn disconnect(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = state.conn()?;
    users::set_gmail(&conn, &user.id, false, None)?;
    Ok(Json(serde_json::json!({ "connected": false })))
}

/// Manual sync trigger; imports new bank emails as expenses
pub async fn sync(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<SyncOutcome>, ApiError> {
    let gmail = GmailClient::new();
    let outcome = email::sync_user(
        &state.pool,
        &gmail,
        state.ai.as_ref(),
        &state.config.email_sync,
        &user,
    )
    .await?;
    Ok(Json(outcome))
}

pub async fn status(AuthUser(user): AuthUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "connected": user.gmail_connected }))
}
