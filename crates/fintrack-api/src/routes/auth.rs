//! Authentication endpoints

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use fintrack_core::auth::{self, AuthTokens, Profile, RefreshedTokens};

use crate::error::ApiError;
use crate::extract::{bearer_token, AuthUser};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterDto {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginDto {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshDto {
    pub user_id: String,
    pub refresh_token: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(dto): Json<RegisterDto>,
) -> Result<(StatusCode, Json<AuthTokens>), ApiError> {
    let conn = state.conn()?;
    let tokens = auth::register(
        &conn,
        &state.config.auth,
        &dto.email,
        &dto.name,
        &dto.password,
    )?;
    Ok((StatusCode::CREATED, Json(tokens)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(dto): Json<LoginDto>,
) -> Result<Json<AuthTokens>, ApiError> {
    let conn = state.conn()?;
    let tokens = auth::login(&conn, &state.config.auth, &dto.email, &dto.password)?;
    Ok(Json(tokens))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(dto): Json<RefreshDto>,
) -> Result<Json<RefreshedTokens>, ApiError> {
    let conn = state.conn()?;
    let tokens = auth::refresh(
        &conn,
        &state.config.auth,
        &dto.user_id,
        &dto.refresh_token,
    )?;
    Ok(Json(tokens))
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    AuthUser(user): AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = state.conn()?;
    auth::logout(&conn, &user.id, bearer_token(&headers).as_deref())?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn profile(AuthUser(user): AuthUser) -> Json<Profile> {
    Json(Profile::from(&user))
}
