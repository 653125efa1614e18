//! AI chat and parsing endpoints

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use fintrack_core::ai::{self, ParsedTransaction};
use fintrack_store::{chat as chat_store, ChatMessage, LedgerEntry};

use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatDto {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ParseDto {
    pub text: String,
}

/// One chat turn: the user message goes in, the assistant reply comes
/// back; both are persisted to the history.
pub async fn chat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(dto): Json<ChatDto>,
) -> Result<Json<ChatMessage>, ApiError> {
    let reply = ai::chat_reply(&state.pool, &state.ai, &user.id, &dto.message).await?;
    Ok(Json(reply))
}

pub async fn parse(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Json(dto): Json<ParseDto>,
) -> Result<Json<ParsedTransaction>, ApiError> {
    let parsed = ai::parse_transaction(&state.ai, &dto.text, Utc::now().date_naive()).await?;
    Ok(Json(parsed))
}

pub async fn confirm(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(parsed): Json<ParsedTransaction>,
) -> Result<(StatusCode, Json<LedgerEntry>), ApiError> {
    let conn = state.conn()?;
    let entry = ai::confirm_parsed(&conn, &user.id, &parsed)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn history(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let conn = state.conn()?;
    let messages = chat_store::history(&conn, &user.id)?;
    Ok(Json(messages))
}

pub async fn clear_history(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = state.conn()?;
    let deleted = chat_store::clear(&conn, &user.id)?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

pub async fn insights(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = state.conn()?;
    let insights = ai::insights(&conn, &user.id)?;
    Ok(Json(serde_json::json!({ "insights": insights })))
}
