//! Route definitions for the pagekit API.

pub mod health;
pub mod schema;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/schema/tables", get(schema::list_tables))
        .route("/schema/tables/{name}", get(schema::describe_table))
        .route("/schema/tables/{name}/sql", get(schema::table_sql));

    Router::new()
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
