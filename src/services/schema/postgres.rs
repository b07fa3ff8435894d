//! PostgreSQL dialect. Queries use `$n` placeholders and cast catalog columns to
//! plain SQL types so every driver can decode them.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::{
    merge_constraint, merge_foreign_key, merge_index, missing_column, missing_constraint,
    missing_index, quote_columns, references_clause, required_str, row_bool, row_i64, row_str,
    ColumnDescription, ConnectionConfig, Driver, ResultRow, SchemaDialect, Statement,
};
use crate::errors::AppError;
use crate::models::schema::{
    ColumnType, Constraint, ConstraintType, ForeignAction, Index, IndexType, References,
    TableSchema, LENGTH_TINY,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

const DEFAULT_SCHEMA: &str = "public";

fn type_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)([a-z][a-z\s]*)(?:\(([0-9,]+)\))?(\s+with(?:out)? time zone)?")
            .expect("postgres type pattern is valid")
    })
}

fn default_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^'(.*)'(?:::.*)?$").expect("postgres default pattern is valid"))
}

fn quote(name: &str) -> String {
    Driver::Postgres.quote_identifier(name)
}

fn schema_of(config: &ConnectionConfig) -> String {
    config
        .schema
        .clone()
        .unwrap_or_else(|| DEFAULT_SCHEMA.to_string())
}

/// Strip quoting and casts from a column default; sequences become null.
fn default_value(raw: Option<&Value>) -> Value {
    let Some(raw) = raw else {
        return Value::Null;
    };
    let Value::String(text) = raw else {
        return raw.clone();
    };
    if text.starts_with("nextval") || text.starts_with("NULL::") {
        return Value::Null;
    }
    match default_pattern().captures(text) {
        Some(caps) => Value::from(caps[1].replace("''", "'")),
        None => Value::from(text.as_str()),
    }
}

fn convert_on_clause(code: &str) -> ForeignAction {
    match code {
        "r" => ForeignAction::Restrict,
        "a" => ForeignAction::NoAction,
        "c" => ForeignAction::Cascade,
        "d" => ForeignAction::SetDefault,
        _ => ForeignAction::SetNull,
    }
}

impl SchemaDialect for PostgresDialect {
    fn driver(&self) -> Driver {
        Driver::Postgres
    }

    fn list_tables_sql(&self, config: &ConnectionConfig) -> Statement {
        (
            "SELECT table_name::text AS name FROM information_schema.tables \
             WHERE table_schema = $1 AND table_type = 'BASE TABLE' ORDER BY name"
                .to_string(),
            vec![schema_of(config)],
        )
    }

    fn describe_table_sql(&self, table: &str, config: &ConnectionConfig) -> Statement {
        let sql = r#"SELECT DISTINCT c.table_schema::text AS "schema",
            c.column_name::text AS name,
            c.data_type::text AS type,
            c.is_nullable::text AS "null",
            c.column_default::text AS "default",
            c.character_maximum_length::int AS char_length,
            c.collation_name::text AS collation_name,
            d.description::text AS comment,
            c.ordinal_position::int AS ordinal_position,
            c.datetime_precision::int AS datetime_precision,
            c.numeric_precision::int AS column_precision,
            c.numeric_scale::int AS column_scale,
            pg_get_serial_sequence(attr.attrelid::regclass::text, attr.attname) IS NOT NULL AS has_serial
        FROM information_schema.columns c
        INNER JOIN pg_catalog.pg_namespace ns ON (ns.nspname = c.table_schema)
        INNER JOIN pg_catalog.pg_class cl ON (cl.relnamespace = ns.oid AND cl.relname = c.table_name)
        LEFT JOIN pg_catalog.pg_description d ON (cl.oid = d.objoid AND d.objsubid = c.ordinal_position)
        LEFT JOIN pg_catalog.pg_attribute attr ON (cl.oid = attr.attrelid AND c.column_name = attr.attname)
        WHERE c.table_name = $1 AND c.table_schema = $2 AND c.table_catalog = $3
        ORDER BY ordinal_position"#;
        (
            sql.to_string(),
            vec![table.to_string(), schema_of(config), config.database.clone()],
        )
    }

    fn describe_index_sql(&self, table: &str, config: &ConnectionConfig) -> Statement {
        let sql = "SELECT c2.relname::text AS relname, a.attname::text AS attname, \
                i.indisprimary, i.indisunique \
            FROM pg_catalog.pg_namespace n \
            INNER JOIN pg_catalog.pg_class c ON (n.oid = c.relnamespace) \
            INNER JOIN pg_catalog.pg_index i ON (c.oid = i.indrelid) \
            INNER JOIN pg_catalog.pg_class c2 ON (c2.oid = i.indexrelid) \
            INNER JOIN pg_catalog.pg_attribute a ON (a.attrelid = c.oid AND i.indrelid::regclass = a.attrelid::regclass) \
            WHERE n.nspname = $1 AND a.attnum = ANY(i.indkey) AND c.relname = $2 \
            ORDER BY i.indisprimary DESC, i.indisunique DESC, c.relname, a.attnum";
        (sql.to_string(), vec![schema_of(config), table.to_string()])
    }

    fn describe_foreign_key_sql(&self, table: &str, config: &ConnectionConfig) -> Statement {
        let sql = "SELECT c.conname::text AS name, a.attname::text AS column_name, \
                c.confupdtype::text AS on_update, c.confdeltype::text AS on_delete, \
                c.confrelid::regclass::text AS references_table, ab.attname::text AS references_field \
            FROM pg_catalog.pg_namespace n \
            INNER JOIN pg_catalog.pg_class cl ON (n.oid = cl.relnamespace) \
            INNER JOIN pg_catalog.pg_constraint c ON (n.oid = c.connamespace) \
            INNER JOIN pg_catalog.pg_attribute a ON (a.attrelid = cl.oid AND c.conrelid = a.attrelid AND a.attnum = ANY(c.conkey)) \
            INNER JOIN pg_catalog.pg_attribute ab ON (a.attrelid = cl.oid AND c.confrelid = ab.attrelid AND ab.attnum = ANY(c.confkey)) \
            WHERE n.nspname = $1 AND cl.relname = $2 AND c.contype = 'f' \
            ORDER BY name, a.attnum, ab.attnum DESC";
        (sql.to_string(), vec![schema_of(config), table.to_string()])
    }

    fn convert_column(&self, raw: &str) -> Result<ColumnDescription, AppError> {
        let caps = type_pattern()
            .captures(raw.trim())
            .ok_or_else(|| AppError::SchemaParse(raw.to_string()))?;
        let mut col = caps[1].trim().to_ascii_lowercase();
        if let Some(zone) = caps.get(3) {
            col.push(' ');
            col.push_str(&zone.as_str().trim().to_ascii_lowercase());
        }
        let length = caps
            .get(2)
            .and_then(|m| m.as_str().split(',').next())
            .and_then(|l| l.parse::<i64>().ok());

        let description = match col.as_str() {
            "date" | "time" | "boolean" => ColumnDescription::new(ColumnType::from(col.as_str()), None),
            "timestamptz" | "timestamp with time zone" => {
                ColumnDescription::new(ColumnType::TimestampTimezone, None)
            }
            c if c.contains("timestamp") => ColumnDescription::new(ColumnType::Timestamp, None),
            c if c.contains("time") => ColumnDescription::new(ColumnType::Time, None),
            "integer" | "int" | "int4" => ColumnDescription::new(ColumnType::Integer, Some(10)),
            "bigint" | "int8" => ColumnDescription::new(ColumnType::BigInteger, Some(20)),
            "smallint" | "int2" => ColumnDescription::new(ColumnType::SmallInteger, Some(5)),
            "inet" => ColumnDescription::new(ColumnType::String, Some(39)),
            "uuid" => ColumnDescription::new(ColumnType::Uuid, None),
            "char" | "character" => ColumnDescription::new(ColumnType::String, length).fixed(),
            c if c.contains("char") => ColumnDescription::new(ColumnType::String, length),
            c if c.contains("money") || c == "string" => {
                ColumnDescription::new(ColumnType::String, length)
            }
            c if c.contains("text") => ColumnDescription::new(ColumnType::Text, None),
            "bytea" => ColumnDescription::new(ColumnType::Binary, None),
            c if c == "real" || c.contains("double") => {
                ColumnDescription::new(ColumnType::Float, None)
            }
            c if c.contains("numeric") || c.contains("decimal") => {
                ColumnDescription::new(ColumnType::Decimal, None)
            }
            c if c.contains("json") => ColumnDescription::new(ColumnType::Json, None),
            _ => ColumnDescription::new(ColumnType::String, length),
        };
        Ok(description)
    }

    fn convert_field_description(
        &self,
        table: &mut TableSchema,
        row: &ResultRow,
    ) -> Result<(), AppError> {
        let name = required_str(row, "name")?;
        let raw_type = required_str(row, "type")?;
        let description = self.convert_column(&raw_type)?;
        let column_type = description.column_type.clone();
        let mut attrs = description.into_attrs();

        let mut default = default_value(row.get("default"));
        if column_type == ColumnType::Boolean {
            default = match default.as_str() {
                Some("true") => Value::Bool(true),
                Some("false") => Value::Bool(false),
                _ => default,
            };
        }
        if row_bool(row, "has_serial") {
            attrs.insert("autoIncrement".into(), Value::Bool(true));
            default = Value::Null;
        }

        attrs.insert("default".into(), default);
        attrs.insert(
            "null".into(),
            Value::from(row_str(row, "null").as_deref() == Some("YES")),
        );
        attrs.insert(
            "collate".into(),
            row_str(row, "collation_name").map_or(Value::Null, Value::from),
        );
        attrs.insert(
            "comment".into(),
            row_str(row, "comment").map_or(Value::Null, Value::from),
        );
        if let Some(char_length) = row_i64(row, "char_length") {
            attrs.insert("length".into(), Value::from(char_length));
        }
        match column_type {
            ColumnType::Decimal => {
                attrs.insert(
                    "length".into(),
                    row_i64(row, "column_precision").map_or(Value::Null, Value::from),
                );
                attrs.insert(
                    "precision".into(),
                    row_i64(row, "column_scale").map_or(Value::Null, Value::from),
                );
            }
            ColumnType::Timestamp | ColumnType::TimestampTimezone | ColumnType::Time => {
                attrs.insert(
                    "precision".into(),
                    row_i64(row, "datetime_precision").map_or(Value::Null, Value::from),
                );
            }
            _ => {}
        }

        table.add_column(name, attrs);
        Ok(())
    }

    fn convert_index_description(
        &self,
        table: &mut TableSchema,
        row: &ResultRow,
        _detail: &[ResultRow],
    ) -> Result<(), AppError> {
        let column = required_str(row, "attname")?;
        if row_bool(row, "indisprimary") {
            merge_constraint(
                table,
                "primary",
                Constraint::new(ConstraintType::Primary, vec![column]),
            );
            return Ok(());
        }

        let name = required_str(row, "relname")?;
        if row_bool(row, "indisunique") {
            merge_constraint(
                table,
                &name,
                Constraint::new(ConstraintType::Unique, vec![column]),
            );
        } else {
            merge_index(table, &name, Index::new(IndexType::Index, vec![column]));
        }
        Ok(())
    }

    fn convert_foreign_key_description(
        &self,
        table: &mut TableSchema,
        row: &ResultRow,
    ) -> Result<(), AppError> {
        let name = required_str(row, "name")?;
        let references = References {
            table: required_str(row, "references_table")?,
            columns: vec![required_str(row, "references_field")?],
        };
        merge_foreign_key(
            table,
            &name,
            required_str(row, "column_name")?,
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
        let mut serial = false;

        match t {
            ColumnType::TinyInteger | ColumnType::SmallInteger => out.push_str(" SMALLINT"),
            ColumnType::BinaryUuid | ColumnType::Uuid => out.push_str(" UUID"),
            ColumnType::Boolean => out.push_str(" BOOLEAN"),
            ColumnType::Float => out.push_str(" FLOAT"),
            ColumnType::Decimal => out.push_str(" DECIMAL"),
            ColumnType::Json => out.push_str(" JSONB"),
            ColumnType::Date => out.push_str(" DATE"),
            ColumnType::Time => out.push_str(" TIME"),
            ColumnType::DateTime
            | ColumnType::DateTimeFractional
            | ColumnType::Timestamp
            | ColumnType::TimestampFractional => out.push_str(" TIMESTAMP"),
            ColumnType::TimestampTimezone => out.push_str(" TIMESTAMPTZ"),
            ColumnType::Integer | ColumnType::BigInteger => {
                serial = table.primary_key() == [name.to_string()]
                    || column.auto_increment == Some(true);
                let keyword = match (t, serial) {
                    (ColumnType::Integer, false) => " INTEGER",
                    (ColumnType::Integer, true) => " SERIAL",
                    (_, false) => " BIGINT",
                    (_, true) => " BIGSERIAL",
                };
                out.push_str(keyword);
            }
            ColumnType::Text if column.length != Some(LENGTH_TINY) => out.push_str(" TEXT"),
            ColumnType::Binary => out.push_str(" BYTEA"),
            ColumnType::Char => {
                out.push_str(" CHAR");
                if let Some(length) = column.length {
                    out.push_str(&format!("({length})"));
                }
            }
            ColumnType::String | ColumnType::Text => {
                let keyword = if column.fixed == Some(true) { " CHAR" } else { " VARCHAR" };
                out.push_str(keyword);
                if let Some(length) = column.length {
                    out.push_str(&format!("({length})"));
                }
            }
            ColumnType::Custom(name) => {
                out.push(' ');
                out.push_str(&name.to_uppercase());
            }
        }

        if matches!(t, ColumnType::Text | ColumnType::String | ColumnType::Char) {
            if let Some(collate) = &column.collate {
                out.push_str(&format!(" COLLATE \"{collate}\""));
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

        let timestamp_like = matches!(
            t,
            ColumnType::Timestamp
                | ColumnType::TimestampFractional
                | ColumnType::TimestampTimezone
                | ColumnType::DateTime
                | ColumnType::DateTimeFractional
        );
        match &column.default {
            _ if serial => {}
            Some(Value::String(d)) if timestamp_like && d.eq_ignore_ascii_case("current_timestamp") => {
                out.push_str(" DEFAULT CURRENT_TIMESTAMP");
            }
            Some(default) => {
                let default = match (t, default) {
                    (ColumnType::Boolean, Value::Number(n)) => Value::Bool(n.as_i64() != Some(0)),
                    _ => default.clone(),
                };
                out.push_str(" DEFAULT ");
                out.push_str(&Driver::Postgres.schema_value(&default));
            }
            None if column.null == Some(true) => out.push_str(" DEFAULT NULL"),
            None => {}
        }

        Ok(out)
    }

    fn index_sql(&self, table: &TableSchema, name: &str) -> Result<String, AppError> {
        let index = table.index(name).ok_or_else(|| missing_index(table, name))?;
        Ok(format!(
            "CREATE INDEX {} ON {} ({})",
            quote(name),
            quote(table.name()),
            quote_columns(Driver::Postgres, &index.columns)
        ))
    }

    fn constraint_sql(&self, table: &TableSchema, name: &str) -> Result<String, AppError> {
        let constraint = table
            .constraint(name)
            .ok_or_else(|| missing_constraint(table, name))?;
        let columns = quote_columns(Driver::Postgres, &constraint.columns);
        let sql = match constraint.constraint_type {
            ConstraintType::Primary => format!("PRIMARY KEY ({columns})"),
            ConstraintType::Unique => format!("CONSTRAINT {} UNIQUE ({columns})", quote(name)),
            ConstraintType::Foreign => format!(
                "CONSTRAINT {} FOREIGN KEY ({columns}){} DEFERRABLE INITIALLY IMMEDIATE",
                quote(name),
                references_clause(Driver::Postgres, constraint)
            ),
        };
        Ok(sql)
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
        let table_name = quote(table.name());
        let temporary = if table.is_temporary() { " TEMPORARY " } else { " " };

        let mut out = vec![format!("CREATE{temporary}TABLE {table_name} (\n{content}\n)")];
        out.extend(indexes.iter().cloned());
        for name in table.columns() {
            let comment = table
                .column(name)
                .and_then(|c| c.comment.as_deref())
                .filter(|c| !c.is_empty());
            if let Some(comment) = comment {
                out.push(format!(
                    "COMMENT ON COLUMN {table_name}.{} IS {}",
                    quote(name),
                    Driver::Postgres.schema_value(&Value::from(comment))
                ));
            }
        }
        out
    }
}
