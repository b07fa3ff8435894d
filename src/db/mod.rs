//! Database connection pool and the live schema-reflection connection.

use std::future::Future;

use serde_json::{Map, Value};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, PgPool, Row, TypeInfo};

use crate::errors::AppError;
use crate::services::schema::{ConnectionConfig, Driver, ResultRow, SchemaConnection};

/// Create a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Name of the database the pool is connected to.
pub async fn current_database(pool: &PgPool) -> Result<String, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT current_database()::text")
        .fetch_one(pool)
        .await
}

/// `SchemaConnection` over a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgSchemaConnection {
    pool: PgPool,
    config: ConnectionConfig,
}

impl PgSchemaConnection {
    pub fn new(pool: PgPool, config: ConnectionConfig) -> Self {
        Self { pool, config }
    }
}

impl SchemaConnection for PgSchemaConnection {
    fn driver(&self) -> Driver {
        Driver::Postgres
    }

    fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn execute(
        &self,
        sql: &str,
        params: &[String],
    ) -> impl Future<Output = Result<Vec<ResultRow>, AppError>> + Send {
        let pool = self.pool.clone();
        let sql = sql.to_string();
        let params = params.to_vec();
        async move {
            let mut query = sqlx::query(&sql);
            for param in &params {
                query = query.bind(param.as_str());
            }
            let rows = query.fetch_all(&pool).await?;
            tracing::trace!(rows = rows.len(), "Reflection query returned");
            Ok(rows.iter().map(decode_row).collect())
        }
    }
}

fn decode_row(row: &PgRow) -> ResultRow {
    let mut out = Map::new();
    for column in row.columns() {
        let value = decode_value(row, column.ordinal(), column.type_info().name());
        out.insert(column.name().to_string(), value);
    }
    out
}

/// Catalog queries cast to bool, int or text, so only those are decoded natively.
fn decode_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    let decoded = match type_name {
        "BOOL" => row
            .try_get::<Option<bool>, _>(index)
            .map(|v| v.map(Value::from)),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)
            .map(|v| v.map(Value::from)),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)
            .map(|v| v.map(Value::from)),
        "INT8" => row
            .try_get::<Option<i64>, _>(index)
            .map(|v| v.map(Value::from)),
        _ => row
            .try_get::<Option<String>, _>(index)
            .map(|v| v.map(Value::from)),
    };
    match decoded {
        Ok(value) => value.unwrap_or(Value::Null),
        Err(e) => {
            tracing::warn!(column = index, type_name, error = %e, "Undecodable reflection column");
            Value::Null
        }
    }
}
