//! SQLite dialect. Reflection goes through `PRAGMA` statements.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::{
    convert_on_clause, merge_constraint, merge_foreign_key, missing_column, missing_constraint,
    missing_index, quote_columns, references_clause, required_str, row_bool, row_i64, row_str,
    ColumnDescription, ConnectionConfig, Driver, ResultRow, SchemaDialect, Statement,
};
use crate::errors::AppError;
use crate::models::schema::{
    ColumnType, Constraint, ConstraintType, Index, IndexType, References, TableSchema,
    LENGTH_TINY,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

fn type_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(unsigned)?\s*([a-z]+)(?:\(([0-9,]+)\))?")
            .expect("sqlite type pattern is valid")
    })
}

fn quote(name: &str) -> String {
    Driver::Sqlite.quote_identifier(name)
}

/// `'it''s'` → `it's`; the literal `NULL` becomes null.
fn default_value(raw: Option<&Value>) -> Value {
    match raw {
        None | Some(Value::Null) => Value::Null,
        Some(Value::String(s)) if s == "NULL" => Value::Null,
        Some(Value::String(s)) if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') => {
            Value::from(s[1..s.len() - 1].replace("''", "'"))
        }
        Some(other) => other.clone(),
    }
}

impl SchemaDialect for SqliteDialect {
    fn driver(&self) -> Driver {
        Driver::Sqlite
    }

    fn list_tables_sql(&self, _config: &ConnectionConfig) -> Statement {
        (
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name <> 'sqlite_sequence' ORDER BY name"
                .to_string(),
            Vec::new(),
        )
    }

    fn describe_table_sql(&self, table: &str, _config: &ConnectionConfig) -> Statement {
        (format!("PRAGMA table_info({})", quote(table)), Vec::new())
    }

    fn describe_index_sql(&self, table: &str, _config: &ConnectionConfig) -> Statement {
        (format!("PRAGMA index_list({})", quote(table)), Vec::new())
    }

    fn describe_foreign_key_sql(&self, table: &str, _config: &ConnectionConfig) -> Statement {
        (format!("PRAGMA foreign_key_list({})", quote(table)), Vec::new())
    }

    fn index_detail_sql(&self, row: &ResultRow) -> Option<Statement> {
        let name = row_str(row, "name")?;
        Some((format!("PRAGMA index_info({})", quote(&name)), Vec::new()))
    }

    fn convert_column(&self, raw: &str) -> Result<ColumnDescription, AppError> {
        let caps = type_pattern()
            .captures(raw)
            .ok_or_else(|| AppError::SchemaParse(raw.to_string()))?;
        let unsigned = caps.get(1).is_some();
        let col = caps[2].to_ascii_lowercase();
        let (length, precision) = match caps.get(3).map(|m| m.as_str()) {
            Some(raw) => match raw.split_once(',') {
                Some((l, p)) => (l.parse().ok(), p.parse().ok()),
                None => (raw.parse().ok(), None),
            },
            None => (None, None),
        };

        let description = match col.as_str() {
            "bigint" => ColumnDescription::new(ColumnType::BigInteger, length).unsigned(unsigned),
            "smallint" => {
                ColumnDescription::new(ColumnType::SmallInteger, length).unsigned(unsigned)
            }
            "tinyint" => ColumnDescription::new(ColumnType::TinyInteger, length).unsigned(unsigned),
            c if c.contains("int") => {
                ColumnDescription::new(ColumnType::Integer, length).unsigned(unsigned)
            }
            c if c.contains("decimal") => ColumnDescription::new(ColumnType::Decimal, length)
                .precision(precision)
                .unsigned(unsigned),
            "float" | "real" | "double" => ColumnDescription::new(ColumnType::Float, length)
                .precision(precision)
                .unsigned(unsigned),
            c if c.contains("boolean") => ColumnDescription::new(ColumnType::Boolean, None),
            "char" if length == Some(36) => ColumnDescription::new(ColumnType::Uuid, None),
            "char" => ColumnDescription::new(ColumnType::String, length).fixed(),
            c if c.contains("char") => ColumnDescription::new(ColumnType::String, length),
            "binary" if length == Some(16) => {
                ColumnDescription::new(ColumnType::BinaryUuid, None)
            }
            "blob" | "clob" | "binary" | "varbinary" => {
                ColumnDescription::new(ColumnType::Binary, length)
            }
            "date" | "time" | "timestamp" | "datetime" => {
                ColumnDescription::new(ColumnType::from(col.as_str()), None)
            }
            "json" => ColumnDescription::new(ColumnType::Json, None),
            _ => ColumnDescription::new(ColumnType::Text, None),
        };
        Ok(description)
    }

    fn convert_field_description(
        &self,
        table: &mut TableSchema,
        row: &ResultRow,
    ) -> Result<(), AppError> {
        let name = required_str(row, "name")?;
        let raw_type = row_str(row, "type").unwrap_or_default();
        // Columns declared without a type have no affinity.
        let mut attrs = if raw_type.trim().is_empty() {
            ColumnDescription::new(ColumnType::Text, None).into_attrs()
        } else {
            self.convert_column(&raw_type)?.into_attrs()
        };
        attrs.insert("null".into(), Value::Bool(!row_bool(row, "notnull")));
        attrs.insert("default".into(), default_value(row.get("dflt_value")));

        let in_primary = row_i64(row, "pk").is_some_and(|pk| pk > 0);
        let existing_primary = table.constraint("primary").map(|c| c.columns.clone());
        match (&existing_primary, in_primary) {
            (None, true) => {
                attrs.insert("null".into(), Value::Bool(false));
                attrs.insert("autoIncrement".into(), Value::Bool(true));
            }
            // Composite keys cannot autoincrement.
            (Some(columns), true) => {
                if let Some(first) = columns.first() {
                    if let Some(mut existing) = table.column(first).map(|c| c.to_attrs()) {
                        existing.remove("autoIncrement");
                        table.add_column(first.clone(), existing);
                    }
                }
            }
            _ => {}
        }

        table.add_column(name.clone(), attrs);
        if in_primary {
            merge_constraint(
                table,
                "primary",
                Constraint::new(ConstraintType::Primary, vec![name]),
            );
        }
        Ok(())
    }

    fn convert_index_description(
        &self,
        table: &mut TableSchema,
        row: &ResultRow,
        detail: &[ResultRow],
    ) -> Result<(), AppError> {
        // Primary keys are already known from table_info.
        if row_str(row, "origin").as_deref() == Some("pk") {
            return Ok(());
        }
        let name = required_str(row, "name")?;
        let columns: Vec<String> = detail.iter().filter_map(|r| row_str(r, "name")).collect();

        if row_bool(row, "unique") {
            table.add_constraint(name, Constraint::new(ConstraintType::Unique, columns));
        } else {
            table.add_index(name, Index::new(IndexType::Index, columns));
        }
        Ok(())
    }

    /// Unnamed in SQLite: a key is named after its first column, later rows
    /// of the same key (`seq > 0`) extend the most recent foreign key.
    fn convert_foreign_key_description(
        &self,
        table: &mut TableSchema,
        row: &ResultRow,
    ) -> Result<(), AppError> {
        let from = required_str(row, "from")?;
        let seq = row_i64(row, "seq").unwrap_or(0);
        let name = match table.last_foreign_key() {
            Some(last) if seq > 0 => last.to_string(),
            _ => format!("{from}_fk"),
        };
        let references = References {
            table: required_str(row, "table")?,
            columns: row_str(row, "to").into_iter().collect(),
        };
        merge_foreign_key(
            table,
            &name,
            from,
            references,
            convert_on_clause(&row_str(row, "on_update").unwrap_or_default()),
            convert_on_clause(&row_str(row, "on_delete").unwrap_or_default()),
        );
        Ok(())
    }

    fn column_sql(&self, table: &TableSchema, name: &str) -> Result<String, AppError> {
        let column = table.column(name).ok_or_else(|| missing_column(table, name))?;
        let mut out = quote(name);
        let t = &column.column_type;
        let single_primary = table.primary_key() == [name.to_string()];

        let has_unsigned = matches!(
            t,
            ColumnType::BigInteger | ColumnType::Integer | ColumnType::Float | ColumnType::Decimal
        );
        if has_unsigned
            && column.unsigned == Some(true)
            && !(matches!(t, ColumnType::Integer) && single_primary)
        {
            out.push_str(" UNSIGNED");
        }

        match t {
            ColumnType::BinaryUuid => out.push_str(" BINARY(16)"),
            ColumnType::Uuid => out.push_str(" CHAR(36)"),
            ColumnType::Char => out.push_str(" NCHAR"),
            ColumnType::TinyInteger => out.push_str(" TINYINT"),
            ColumnType::SmallInteger => out.push_str(" SMALLINT"),
            ColumnType::Integer => out.push_str(" INTEGER"),
            ColumnType::BigInteger => out.push_str(" BIGINT"),
            ColumnType::Boolean => out.push_str(" BOOLEAN"),
            ColumnType::Float => out.push_str(" FLOAT"),
            ColumnType::Decimal => out.push_str(" DECIMAL"),
            ColumnType::Date => out.push_str(" DATE"),
            ColumnType::Time => out.push_str(" TIME"),
            ColumnType::DateTime | ColumnType::DateTimeFractional => out.push_str(" DATETIME"),
            ColumnType::Timestamp
            | ColumnType::TimestampFractional
            | ColumnType::TimestampTimezone => out.push_str(" TIMESTAMP"),
            ColumnType::Json => out.push_str(" TEXT"),
            ColumnType::Text if column.length != Some(LENGTH_TINY) => out.push_str(" TEXT"),
            ColumnType::String | ColumnType::Text => {
                let keyword = if column.fixed == Some(true) { " CHAR" } else { " VARCHAR" };
                out.push_str(keyword);
                if let Some(length) = column.length {
                    out.push_str(&format!("({length})"));
                }
            }
            ColumnType::Binary => match column.length {
                Some(length) => out.push_str(&format!(" BLOB({length})")),
                None => out.push_str(" BLOB"),
            },
            ColumnType::Custom(custom) => {
                out.push(' ');
                out.push_str(&custom.to_uppercase());
            }
        }

        let integer_like = matches!(
            t,
            ColumnType::Integer | ColumnType::SmallInteger | ColumnType::TinyInteger
        );
        if integer_like && !single_primary {
            if let Some(length) = column.length {
                out.push_str(&format!("({length})"));
            }
        }

        if matches!(t, ColumnType::Float | ColumnType::Decimal) {
            match (column.length, column.precision) {
                (Some(length), Some(precision)) => out.push_str(&format!("({length},{precision})")),
                (Some(length), None) => out.push_str(&format!("({length})")),
                _ => {}
            }
        }

        if column.null == Some(false) {
            out.push_str(" NOT NULL");
        }

        if matches!(t, ColumnType::Integer) && single_primary {
            out.push_str(" PRIMARY KEY AUTOINCREMENT");
        }

        if column.null == Some(true) && matches!(t, ColumnType::Timestamp) {
            out.push_str(" DEFAULT NULL");
        }
        if let Some(default) = &column.default {
            out.push_str(" DEFAULT ");
            out.push_str(&Driver::Sqlite.schema_value(default));
        }

        Ok(out)
    }

    fn index_sql(&self, table: &TableSchema, name: &str) -> Result<String, AppError> {
        let index = table.index(name).ok_or_else(|| missing_index(table, name))?;
        Ok(format!(
            "CREATE INDEX {} ON {} ({})",
            quote(name),
            quote(table.name()),
            quote_columns(Driver::Sqlite, &index.columns)
        ))
    }

    /// Empty for a single integer primary key, which is declared inline on the column.
    fn constraint_sql(&self, table: &TableSchema, name: &str) -> Result<String, AppError> {
        let constraint = table
            .constraint(name)
            .ok_or_else(|| missing_constraint(table, name))?;
        let (keyword, clause) = match constraint.constraint_type {
            ConstraintType::Primary => {
                let inline = constraint.columns.len() == 1
                    && table.column_type(&constraint.columns[0]) == Some(&ColumnType::Integer);
                if inline {
                    return Ok(String::new());
                }
                ("PRIMARY KEY", String::new())
            }
            ConstraintType::Unique => ("UNIQUE", String::new()),
            ConstraintType::Foreign => ("FOREIGN KEY", references_clause(Driver::Sqlite, constraint)),
        };
        Ok(format!(
            "CONSTRAINT {} {keyword} ({}){clause}",
            quote(name),
            quote_columns(Driver::Sqlite, &constraint.columns)
        ))
    }

    fn create_table_sql(
        &self,
        table: &TableSchema,
        columns: &[String],
        constraints: &[String],
        indexes: &[String],
    ) -> Vec<String> {
        let content = columns
            .iter()
            .chain(constraints)
            .filter(|line| !line.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(",\n");
        let temporary = if table.is_temporary() { " TEMPORARY " } else { " " };
        let mut out = vec![format!(
            "CREATE{temporary}TABLE {} (\n{content}\n)",
            quote(table.name())
        )];
        out.extend(indexes.iter().cloned());
        out
    }
}
