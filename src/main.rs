use std::net::SocketAddr;

use anyhow::Context;
use mimalloc::MiMalloc;
use pagekit::config::AppConfig;
use pagekit::services::schema::ConnectionConfig;
use pagekit::{db, routes, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// M-MIMALLOC-APP: Use mimalloc as global allocator for improved performance.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pagekit=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    let pool = db::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    let database = db::current_database(&pool).await?;
    let schema = ConnectionConfig::new(database).with_schema(config.database_schema.clone());

    let host: std::net::IpAddr = config
        .host
        .parse()
        .with_context(|| format!("Invalid BACKEND_HOST `{}`", config.host))?;
    let addr = SocketAddr::from((host, config.port));
    tracing::info!(host = %addr, schema = %config.database_schema, "Starting pagekit API server");

    let app = routes::router(AppState {
        db: pool,
        config,
        schema,
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
