//! HTTP API server for fintrack
//!
//! Routes are organized into modules:
//! - routes::auth: register, login, refresh, logout, profile
//! - routes::entries: expense and income CRUD, filters, stats, CSV export
//! - routes::budgets: budget caps and the monthly overview
//! - routes::recurring: recurring rules
//! - routes::stats: the month summary
//! - routes::ai: chat, parsing, insights
//! - routes::email_sync: Gmail connection and the import pass
//! - routes::notifications: CRUD plus the SSE stream

pub mod error;
pub mod extract;
pub mod notify;
pub mod routes;

use axum::http::HeaderValue;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use fintrack_config::Config;
use fintrack_core::ai::AiClient;
use fintrack_store::{DbConn, DbPool};

pub use error::ApiError;
pub use notify::NotificationHub;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Config,
    pub ai: Arc<AiClient>,
    pub hub: NotificationHub,
}

impl AppState {
    pub fn new(pool: DbPool, config: Config) -> Self {
        let ai = Arc::new(AiClient::from_config(&config.ai));
        Self {
            pool,
            config,
            ai,
            hub: NotificationHub::new(),
        }
    }

    /// Check out a pool connection, mapping exhaustion to a 500
    pub fn conn(&self) -> Result<DbConn, ApiError> {
        self.pool.get().map_err(|e| {
            log::error!("connection pool error: {e}");
            ApiError::InternalError
        })
    }
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origin == "*" {
        return layer.allow_origin(Any);
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => layer.allow_origin(value),
        Err(_) => {
            log::warn!("invalid cors_origin '{origin}', allowing any origin");
            layer.allow_origin(Any)
        }
    }
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    use routes::{ai, auth, budgets, email_sync, entries, notifications, recurring, stats};

    let cors = cors_layer(&state.config.server.cors_origin);

    Router::new()
        .route("/api/health", get(health_check))
        // auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/profile", get(auth::profile))
        // expenses
        .route(
            "/api/expenses",
            post(entries::create_expense).get(entries::list_expenses),
        )
        .route("/api/expenses/all", get(entries::all_expenses))
        .route("/api/expenses/stats", get(entries::expense_stats))
        .route("/api/expenses/export/csv", get(entries::export_expenses_csv))
        .route(
            "/api/expenses/:id",
            get(entries::get_expense)
                .patch(entries::update_expense)
                .delete(entries::delete_expense),
        )
        // incomes
        .route(
            "/api/incomes",
            post(entries::create_income).get(entries::list_incomes),
        )
        .route("/api/incomes/all", get(entries::all_incomes))
        .route("/api/incomes/stats", get(entries::income_stats))
        .route("/api/incomes/export/csv", get(entries::export_incomes_csv))
        .route(
            "/api/incomes/:id",
            get(entries::get_income)
                .patch(entries::update_income)
                .delete(entries::delete_income),
        )
        // budgets
        .route(
            "/api/budgets",
            post(budgets::create).get(budgets::list),
        )
        .route("/api/budgets/overview", get(budgets::overview))
        .route(
            "/api/budgets/:id",
            patch(budgets::update).delete(budgets::remove),
        )
        // recurring rules
        .route(
            "/api/recurring",
            post(recurring::create).get(recurring::list),
        )
        .route(
            "/api/recurring/:id",
            get(recurring::get_rule)
                .patch(recurring::update)
                .delete(recurring::remove),
        )
        .route("/api/recurring/:id/toggle", patch(recurring::toggle))
        // stats
        .route("/api/stats/summary", get(stats::summary))
        // ai
        .route("/api/ai/chat", post(ai::chat))
        .route("/api/ai/parse", post(ai::parse))
        .route("/api/ai/parse/confirm", post(ai::confirm))
        .route(
            "/api/ai/history",
            get(ai::history).delete(ai::clear_history),
        )
        .route("/api/ai/insights", get(ai::insights))
        // email sync
        .route("/api/email-sync/gmail/connect", post(email_sync::connect))
        .route(
            "/api/email-sync/gmail/disconnect",
            post(email_sync::disconnect),
        )
        .route("/api/email-sync/sync", post(email_sync::sync))
        .route("/api/email-sync/status", get(email_sync::status))
        // notifications
        .route(
            "/api/notifications",
            post(notifications::create).get(notifications::list),
        )
        .route("/api/notifications/stream", get(notifications::stream))
        .route(
            "/api/notifications/unread-count",
            get(notifications::unread_count),
        )
        .route("/api/notifications/read-all", patch(notifications::read_all))
        .route("/api/notifications/:id/read", patch(notifications::mark_read))
        .route("/api/notifications/:id", delete(notifications::remove))
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Start the HTTP server.
///
/// Binds the configured address and serves until the process is stopped.
pub async fn start_server(state: AppState) -> std::io::Result<()> {
    let addr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    );
    let router = create_router(state);

    let listener = TcpListener::bind(&addr).await?;
    log::info!("starting fintrack server on http://{addr}");
    axum::serve(listener, router).await
}
