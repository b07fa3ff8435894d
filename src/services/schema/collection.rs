//! Runs dialect reflection queries against a live connection.

use std::future::Future;

use serde_json::Value;

use super::{ConnectionConfig, Driver, ResultRow, SchemaDialect};
use crate::errors::AppError;
use crate::models::schema::TableSchema;

/// Anything that can execute reflection SQL and hand back rows.
pub trait SchemaConnection: Send + Sync {
    fn driver(&self) -> Driver;

    fn config(&self) -> &ConnectionConfig;

    fn execute(
        &self,
        sql: &str,
        params: &[String],
    ) -> impl Future<Output = Result<Vec<ResultRow>, AppError>> + Send;
}

/// Lists and describes the tables visible through a connection.
pub struct Collection<C> {
    connection: C,
}

impl<C: SchemaConnection> Collection<C> {
    pub fn new(connection: C) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    fn dialect(&self) -> &'static dyn SchemaDialect {
        self.connection.driver().dialect()
    }

    /// Table names in the configured database or schema.
    pub async fn list_tables(&self) -> Result<Vec<String>, AppError> {
        let (sql, params) = self.dialect().list_tables_sql(self.connection.config());
        let rows = self.connection.execute(&sql, &params).await?;
        Ok(rows
            .iter()
            .filter_map(|row| match row.values().next() {
                Some(Value::String(name)) => Some(name.clone()),
                _ => None,
            })
            .collect())
    }

    /// Reflect one table. `name` may be schema-qualified as `schema.table`.
    pub async fn describe(&self, name: &str) -> Result<TableSchema, AppError> {
        let mut config = self.connection.config().clone();
        let table_name = match name.split_once('.') {
            Some((schema, table)) => {
                config.schema = Some(schema.to_string());
                table
            }
            None => name,
        };
        let dialect = self.dialect();
        let mut table = TableSchema::new(table_name);

        let (sql, params) = dialect.describe_table_sql(table_name, &config);
        for row in self.connection.execute(&sql, &params).await? {
            dialect.convert_field_description(&mut table, &row)?;
        }
        if table.columns().is_empty() {
            return Err(AppError::NotFound(format!(
                "Cannot describe {name}. It has 0 columns."
            )));
        }

        let (sql, params) = dialect.describe_index_sql(table_name, &config);
        for row in self.connection.execute(&sql, &params).await? {
            let detail = match dialect.index_detail_sql(&row) {
                Some((sql, params)) => self.connection.execute(&sql, &params).await?,
                None => Vec::new(),
            };
            dialect.convert_index_description(&mut table, &row, &detail)?;
        }

        let (sql, params) = dialect.describe_foreign_key_sql(table_name, &config);
        for row in self.connection.execute(&sql, &params).await? {
            dialect.convert_foreign_key_description(&mut table, &row)?;
        }

        if let Some((sql, params)) = dialect.describe_options_sql(table_name, &config) {
            for row in self.connection.execute(&sql, &params).await? {
                dialect.convert_options_description(&mut table, &row);
            }
        }

        tracing::debug!(
            driver = %self.connection.driver(),
            table = %name,
            columns = table.columns().len(),
            indexes = table.indexes().len(),
            constraints = table.constraints().len(),
            "Reflected table"
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Canned responses keyed by SQL prefix, recording every statement it sees.
    struct FakeConnection {
        driver: Driver,
        config: ConnectionConfig,
        responses: HashMap<&'static str, Vec<Value>>,
        seen: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl FakeConnection {
        fn new(driver: Driver, responses: HashMap<&'static str, Vec<Value>>) -> Self {
            Self {
                driver,
                config: ConnectionConfig::new("app").with_schema("public"),
                responses,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl SchemaConnection for FakeConnection {
        fn driver(&self) -> Driver {
            self.driver
        }

        fn config(&self) -> &ConnectionConfig {
            &self.config
        }

        fn execute(
            &self,
            sql: &str,
            params: &[String],
        ) -> impl Future<Output = Result<Vec<ResultRow>, AppError>> + Send {
            self.seen
                .lock()
                .unwrap()
                .push((sql.to_string(), params.to_vec()));
            let rows = self
                .responses
                .iter()
                .find(|(prefix, _)| sql.starts_with(**prefix))
                .map(|(_, rows)| {
                    rows.iter()
                        .map(|r| serde_json::from_value::<ResultRow>(r.clone()).unwrap())
                        .collect()
                })
                .unwrap_or_default();
            async move { Ok(rows) }
        }
    }

    #[tokio::test]
    async fn describe_sqlite_table_with_index_details() {
        let responses = HashMap::from([
            (
                "PRAGMA table_info",
                vec![
                    json!({"cid": 0, "name": "id", "type": "INTEGER", "notnull": 1, "dflt_value": null, "pk": 1}),
                    json!({"cid": 1, "name": "title", "type": "VARCHAR(50)", "notnull": 0, "dflt_value": null, "pk": 0}),
                ],
            ),
            (
                "PRAGMA index_list",
                vec![json!({"seq": 0, "name": "title_idx", "unique": 0, "origin": "c"})],
            ),
            ("PRAGMA index_info", vec![json!({"seqno": 0, "cid": 1, "name": "title"})]),
        ]);
        let collection = Collection::new(FakeConnection::new(Driver::Sqlite, responses));

        let table = collection.describe("articles").await.unwrap();
        assert_eq!(table.columns(), vec!["id", "title"]);
        assert_eq!(table.index("title_idx").unwrap().columns, vec!["title"]);
        assert_eq!(table.primary_key(), vec!["id".to_string()]);

        let seen = collection.connection().seen.lock().unwrap();
        assert!(seen.iter().any(|(sql, _)| sql == "PRAGMA index_info(\"title_idx\")"));
    }

    #[tokio::test]
    async fn describe_splits_schema_qualified_names() {
        let responses = HashMap::from([(
            "SELECT DISTINCT",
            vec![json!({"name": "id", "type": "integer", "null": "NO", "default": null, "has_serial": true})],
        )]);
        let collection = Collection::new(FakeConnection::new(Driver::Postgres, responses));

        let table = collection.describe("reporting.events").await.unwrap();
        assert_eq!(table.name(), "events");

        let seen = collection.connection().seen.lock().unwrap();
        let (_, params) = &seen[0];
        assert_eq!(params, &vec!["events".to_string(), "reporting".to_string(), "app".to_string()]);
    }

    #[tokio::test]
    async fn describe_without_columns_is_not_found() {
        let collection = Collection::new(FakeConnection::new(Driver::Mysql, HashMap::new()));
        let err = collection.describe("ghosts").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Not found: Cannot describe ghosts. It has 0 columns.");
    }

    #[tokio::test]
    async fn list_tables_reads_first_column() {
        let responses = HashMap::from([(
            "SHOW TABLES",
            vec![json!({"Tables_in_app": "articles"}), json!({"Tables_in_app": "users"})],
        )]);
        let collection = Collection::new(FakeConnection::new(Driver::Mysql, responses));
        assert_eq!(collection.list_tables().await.unwrap(), vec!["articles", "users"]);
    }

    #[tokio::test]
    async fn mysql_options_are_reflected() {
        let responses = HashMap::from([
            (
                "SHOW FULL COLUMNS",
                vec![json!({"Field": "id", "Type": "int(11)", "Null": "NO", "Default": null,
                            "Collation": null, "Comment": "", "Extra": "auto_increment"})],
            ),
            (
                "SHOW TABLE STATUS",
                vec![json!({"Name": "articles", "Engine": "InnoDB", "Collation": "utf8mb4_general_ci"})],
            ),
        ]);
        let collection = Collection::new(FakeConnection::new(Driver::Mysql, responses));
        let table = collection.describe("articles").await.unwrap();
        assert_eq!(table.options().get("engine").map(String::as_str), Some("InnoDB"));
    }
}
