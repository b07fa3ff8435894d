//! Schema reflection: per-engine dialects and the collection that drives them.
//!
//! A dialect knows how to ask an engine about its tables and how to turn the
//! answer rows into a `TableSchema`. It also renders a `TableSchema` back into
//! `CREATE TABLE` statements. Dialects never touch a connection themselves;
//! `Collection` runs their queries through a `SchemaConnection`.

pub mod collection;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::models::schema::{
    ColumnAttrs, ColumnType, Constraint, ConstraintType, ForeignAction, Index, References,
    TableSchema,
};

pub use collection::{Collection, SchemaConnection};

/// One reflected row, keyed by column name in select order.
pub type ResultRow = Map<String, Value>;

/// Connection coordinates the reflection queries are scoped to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub database: String,
    pub schema: Option<String>,
}

impl ConnectionConfig {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            schema: None,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

/// SQL statement with positional parameters.
pub type Statement = (String, Vec<String>);

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    Mysql,
    Postgres,
    Sqlite,
}

impl Driver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }

    pub fn dialect(&self) -> &'static dyn SchemaDialect {
        match self {
            Self::Mysql => &mysql::MysqlDialect,
            Self::Postgres => &postgres::PostgresDialect,
            Self::Sqlite => &sqlite::SqliteDialect,
        }
    }

    /// Quote an identifier, handling `table.column` and `*` parts.
    pub fn quote_identifier(&self, identifier: &str) -> String {
        let identifier = identifier.trim();
        if identifier.is_empty() || identifier == "*" {
            return identifier.to_string();
        }
        let quote = match self {
            Self::Mysql => '`',
            Self::Postgres | Self::Sqlite => '"',
        };
        identifier
            .split('.')
            .map(|part| {
                if part == "*" {
                    part.to_string()
                } else {
                    let doubled = part.replace(quote, &format!("{quote}{quote}"));
                    format!("{quote}{doubled}{quote}")
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Render a value as an SQL literal for DDL.
    pub fn schema_value(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) if is_plain_number(s) => s.clone(),
            Value::String(s) => quote_string(s),
            other => quote_string(&other.to_string()),
        }
    }

    /// `CREATE TABLE` plus any follow-up statements for `table`.
    pub fn create_sql(&self, table: &TableSchema) -> Result<Vec<String>, AppError> {
        let dialect = self.dialect();
        let columns = table
            .columns()
            .into_iter()
            .map(|name| dialect.column_sql(table, name))
            .collect::<Result<Vec<_>, _>>()?;
        let constraints = table
            .constraints()
            .into_iter()
            .map(|name| dialect.constraint_sql(table, name))
            .collect::<Result<Vec<_>, _>>()?;
        let indexes = table
            .indexes()
            .into_iter()
            .map(|name| dialect.index_sql(table, name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(dialect.create_table_sql(table, &columns, &constraints, &indexes))
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Driver {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" => Ok(Self::Mysql),
            "postgres" | "postgresql" | "pgsql" => Ok(Self::Postgres),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(AppError::UnsupportedDriver(s.to_string())),
        }
    }
}

fn is_plain_number(s: &str) -> bool {
    !s.is_empty()
        && s.parse::<f64>().is_ok()
        && !s.contains(',')
        && (s == "0" || !s.starts_with('0'))
        && s.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-')
}

fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Result of parsing a native type string.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescription {
    pub column_type: ColumnType,
    pub length: Option<i64>,
    pub precision: Option<i64>,
    pub unsigned: Option<bool>,
    pub fixed: Option<bool>,
}

impl ColumnDescription {
    pub fn new(column_type: ColumnType, length: Option<i64>) -> Self {
        Self {
            column_type,
            length,
            precision: None,
            unsigned: None,
            fixed: None,
        }
    }

    pub fn precision(mut self, precision: Option<i64>) -> Self {
        self.precision = precision;
        self
    }

    pub fn unsigned(mut self, unsigned: bool) -> Self {
        self.unsigned = Some(unsigned);
        self
    }

    pub fn fixed(mut self) -> Self {
        self.fixed = Some(true);
        self
    }

    /// Attribute map for `TableSchema::add_column`.
    pub fn into_attrs(self) -> ColumnAttrs {
        let mut attrs = ColumnAttrs::new();
        attrs.insert("type".into(), Value::from(self.column_type.as_str()));
        attrs.insert("length".into(), self.length.map_or(Value::Null, Value::from));
        if let Some(precision) = self.precision {
            attrs.insert("precision".into(), Value::from(precision));
        }
        if let Some(unsigned) = self.unsigned {
            attrs.insert("unsigned".into(), Value::from(unsigned));
        }
        if let Some(fixed) = self.fixed {
            attrs.insert("fixed".into(), Value::from(fixed));
        }
        attrs
    }
}

/// Engine-specific reflection queries, row conversion and DDL rendering.
pub trait SchemaDialect: Send + Sync {
    fn driver(&self) -> Driver;

    fn list_tables_sql(&self, config: &ConnectionConfig) -> Statement;

    fn describe_table_sql(&self, table: &str, config: &ConnectionConfig) -> Statement;

    fn describe_index_sql(&self, table: &str, config: &ConnectionConfig) -> Statement;

    fn describe_foreign_key_sql(&self, table: &str, config: &ConnectionConfig) -> Statement;

    fn describe_options_sql(&self, _table: &str, _config: &ConnectionConfig) -> Option<Statement> {
        None
    }

    /// Follow-up query needed to resolve one index row into its columns.
    fn index_detail_sql(&self, _row: &ResultRow) -> Option<Statement> {
        None
    }

    /// Parse a native type string such as `varchar(255)`.
    fn convert_column(&self, raw: &str) -> Result<ColumnDescription, AppError>;

    fn convert_field_description(
        &self,
        table: &mut TableSchema,
        row: &ResultRow,
    ) -> Result<(), AppError>;

    /// `detail` holds the rows of `index_detail_sql` when the dialect needs one.
    fn convert_index_description(
        &self,
        table: &mut TableSchema,
        row: &ResultRow,
        detail: &[ResultRow],
    ) -> Result<(), AppError>;

    fn convert_foreign_key_description(
        &self,
        table: &mut TableSchema,
        row: &ResultRow,
    ) -> Result<(), AppError>;

    fn convert_options_description(&self, _table: &mut TableSchema, _row: &ResultRow) {}

    fn column_sql(&self, table: &TableSchema, name: &str) -> Result<String, AppError>;

    fn index_sql(&self, table: &TableSchema, name: &str) -> Result<String, AppError>;

    fn constraint_sql(&self, table: &TableSchema, name: &str) -> Result<String, AppError>;

    fn create_table_sql(
        &self,
        table: &TableSchema,
        columns: &[String],
        constraints: &[String],
        indexes: &[String],
    ) -> Vec<String>;
}

pub(crate) fn row_str(row: &ResultRow, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn row_i64(row: &ResultRow, key: &str) -> Option<i64> {
    match row.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

pub(crate) fn row_bool(row: &ResultRow, key: &str) -> bool {
    match row.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        Some(Value::String(s)) => matches!(s.as_str(), "1" | "t" | "true" | "YES"),
        _ => false,
    }
}

pub(crate) fn required_str(row: &ResultRow, key: &str) -> Result<String, AppError> {
    row_str(row, key).ok_or_else(|| AppError::Schema(format!("Reflected row is missing `{key}`")))
}

pub(crate) fn missing_column(table: &TableSchema, name: &str) -> AppError {
    AppError::NotFound(format!("Column `{name}` on table `{}`", table.name()))
}

pub(crate) fn missing_index(table: &TableSchema, name: &str) -> AppError {
    AppError::NotFound(format!("Index `{name}` on table `{}`", table.name()))
}

pub(crate) fn missing_constraint(table: &TableSchema, name: &str) -> AppError {
    AppError::NotFound(format!("Constraint `{name}` on table `{}`", table.name()))
}

/// Map an `ON UPDATE`/`ON DELETE` rule name to an action.
pub(crate) fn convert_on_clause(clause: &str) -> ForeignAction {
    match clause.to_ascii_uppercase().as_str() {
        "CASCADE" => ForeignAction::Cascade,
        "RESTRICT" => ForeignAction::Restrict,
        "NO ACTION" => ForeignAction::NoAction,
        "SET DEFAULT" => ForeignAction::SetDefault,
        _ => ForeignAction::SetNull,
    }
}

pub(crate) fn foreign_on_clause(action: Option<ForeignAction>) -> &'static str {
    match action.unwrap_or(ForeignAction::Restrict) {
        ForeignAction::Cascade => "CASCADE",
        ForeignAction::SetNull => "SET NULL",
        ForeignAction::NoAction => "NO ACTION",
        ForeignAction::Restrict => "RESTRICT",
        ForeignAction::SetDefault => "SET DEFAULT",
    }
}

pub(crate) fn quote_columns(driver: Driver, columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| driver.quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// ` REFERENCES t (c) ON UPDATE .. ON DELETE ..` for a foreign constraint.
pub(crate) fn references_clause(driver: Driver, constraint: &Constraint) -> String {
    let (table, columns) = constraint
        .references
        .as_ref()
        .map(|r| (r.table.as_str(), r.columns.as_slice()))
        .unwrap_or_default();
    format!(
        " REFERENCES {} ({}) ON UPDATE {} ON DELETE {}",
        driver.quote_identifier(table),
        quote_columns(driver, columns),
        foreign_on_clause(constraint.update),
        foreign_on_clause(constraint.delete),
    )
}

/// Add a foreign key, appending to an existing one of the same name.
pub(crate) fn merge_foreign_key(
    table: &mut TableSchema,
    name: &str,
    column: String,
    references: References,
    update: ForeignAction,
    delete: ForeignAction,
) {
    let constraint = match table.constraint(name) {
        Some(existing) if existing.constraint_type == ConstraintType::Foreign => {
            let mut merged = existing.clone();
            if !merged.columns.contains(&column) {
                merged.columns.push(column);
            }
            if let Some(target) = merged.references.as_mut() {
                for c in references.columns {
                    if !target.columns.contains(&c) {
                        target.columns.push(c);
                    }
                }
            }
            merged
        }
        _ => Constraint::foreign(vec![column], references, update, delete),
    };
    table.add_constraint(name, constraint);
}

/// Append `column` to an index, creating it when absent.
pub(crate) fn merge_index(table: &mut TableSchema, name: &str, index: Index) {
    let merged = match table.index(name) {
        Some(existing) => {
            let mut merged = existing.clone();
            merged.columns.extend(index.columns);
            merged.length.extend(index.length);
            merged
        }
        None => index,
    };
    table.add_index(name, merged);
}

/// Append to a primary/unique constraint, creating it when absent.
pub(crate) fn merge_constraint(table: &mut TableSchema, name: &str, constraint: Constraint) {
    let merged = match table.constraint(name) {
        Some(existing) => {
            let mut merged = existing.clone();
            merged.columns.extend(constraint.columns);
            merged.length.extend(constraint.length);
            merged
        }
        None => constraint,
    };
    table.add_constraint(name, merged);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quote_identifier_per_driver() {
        assert_eq!(Driver::Mysql.quote_identifier("articles"), "`articles`");
        assert_eq!(Driver::Postgres.quote_identifier("public.articles"), "\"public\".\"articles\"");
        assert_eq!(Driver::Sqlite.quote_identifier("a.*"), "\"a\".*");
        assert_eq!(Driver::Mysql.quote_identifier("we`ird"), "`we``ird`");
    }

    #[test]
    fn schema_value_literals() {
        let d = Driver::Postgres;
        assert_eq!(d.schema_value(&Value::Null), "NULL");
        assert_eq!(d.schema_value(&json!(true)), "TRUE");
        assert_eq!(d.schema_value(&json!(12)), "12");
        assert_eq!(d.schema_value(&json!("0")), "0");
        assert_eq!(d.schema_value(&json!("10.5")), "10.5");
        assert_eq!(d.schema_value(&json!("007")), "'007'");
        assert_eq!(d.schema_value(&json!("O'Reilly")), "'O''Reilly'");
    }

    #[test]
    fn driver_from_str() {
        assert_eq!("MySQL".parse::<Driver>().unwrap(), Driver::Mysql);
        assert_eq!("postgresql".parse::<Driver>().unwrap(), Driver::Postgres);
        let err = "oracle".parse::<Driver>().unwrap_err();
        assert!(matches!(err, AppError::UnsupportedDriver(name) if name == "oracle"));
    }

    #[test]
    fn on_clause_mapping() {
        assert_eq!(convert_on_clause("CASCADE"), ForeignAction::Cascade);
        assert_eq!(convert_on_clause("NO ACTION"), ForeignAction::NoAction);
        assert_eq!(convert_on_clause("whatever"), ForeignAction::SetNull);
        assert_eq!(foreign_on_clause(Some(ForeignAction::SetNull)), "SET NULL");
    }

    #[test]
    fn row_accessors_are_lenient() {
        let row: ResultRow = serde_json::from_value(json!({
            "a": "12", "b": 3, "c": "YES", "d": null, "e": 0
        }))
        .unwrap();
        assert_eq!(row_i64(&row, "a"), Some(12));
        assert_eq!(row_str(&row, "b").as_deref(), Some("3"));
        assert!(row_bool(&row, "c"));
        assert!(!row_bool(&row, "d"));
        assert!(!row_bool(&row, "e"));
        assert!(required_str(&row, "missing").is_err());
    }
}
