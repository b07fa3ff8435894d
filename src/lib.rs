pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod routes;
pub mod services;

use sqlx::PgPool;

use crate::services::schema::ConnectionConfig;

/// Shared application state passed to all Axum handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: config::AppConfig,
    /// Database and schema the reflection routes describe.
    pub schema: ConnectionConfig,
}
