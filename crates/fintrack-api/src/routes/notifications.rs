//! Notification endpoints and the SSE stream

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;

use fintrack_core::auth;
use fintrack_store::{notifications, Notification};

use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::AppState;

const LIST_LIMIT: u32 = 50;
const KEEP_ALIVE_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
pub struct CreateNotificationDto {
    pub title: String,
    pub message: String,
    #[serde(default = "default_kind")]
    pub kind: String,
}

fn default_kind() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// EventSource cannot set headers, so the bearer token rides in the
    /// query string for this endpoint
    pub token: Option<String>,
}

/// Create a notification and fan it out to the user's live subscribers
pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(dto): Json<CreateNotificationDto>,
) -> Result<(StatusCode, Json<Notification>), ApiError> {
    if dto.title.trim().is_empty() {
        return Err(ApiError::bad_request("Title must not be empty"));
    }
    let notification = {
        let conn = state.conn()?;
        notifications::create(&conn, &user.id, dto.title.trim(), &dto.message, &dto.kind)?
    };
    state.hub.publish(&user.id, &notification);
    Ok((StatusCode::CREATED, Json(notification)))
}

pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let conn = state.conn()?;
    let notifications = notifications::list_by_user(&conn, &user.id, LIST_LIMIT)?;
    Ok(Json(notifications))
}

pub async fn unread_count(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = state.conn()?;
    let count = notifications::unread_count(&conn, &user.id)?;
    Ok(Json(serde_json::json!({ "count": count })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = state.conn()?;
    notifications::mark_read(&conn, &id, &user.id)?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn read_all(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = state.conn()?;
    let updated = notifications::mark_all_read(&conn, &user.id)?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}

pub async fn remove(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let conn = state.conn()?;
    notifications::delete(&conn, &id, &user.id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Server-sent notification stream.
///
/// One subscriber channel per connection; dropping the connection drops
/// the receiver and the hub prunes the sender on its next publish.
pub async fn stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let token = query.token.ok_or(ApiError::Unauthorized)?;
    let user = {
        let conn = state.conn()?;
        auth::authenticate(&conn, &token)?
    };

    let receiver = state.hub.subscribe(&user.id);
    let stream = futures::stream::unfold(receiver, |mut receiver| async move {
        let notification = receiver.recv().await?;
        let event = Event::default()
            .json_data(&notification)
            .unwrap_or_else(|_| Event::default().data("{}"));
        Some((Ok::<_, Infallible>(event), receiver))
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(KEEP_ALIVE_SECS))
            .text("heartbeat"),
    ))
}
