//! MySQL/MariaDB dialect.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::{
    convert_on_clause, merge_constraint, merge_foreign_key, merge_index, missing_column,
    missing_constraint, missing_index, quote_columns, references_clause, required_str, row_i64,
    row_str, ColumnDescription, ConnectionConfig, Driver, ResultRow, SchemaDialect, Statement,
};
use crate::errors::AppError;
use crate::models::schema::{
    length_for, length_name, ColumnType, Constraint, ConstraintType, Index, IndexType,
    References, TableSchema,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

fn type_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^([a-z]+)(?:\(([0-9,]+)\))?\s*([a-z]+)?")
            .expect("mysql type pattern is valid")
    })
}

/// Split `10,2` into length and precision.
fn split_length(raw: Option<&str>) -> (Option<i64>, Option<i64>) {
    match raw {
        Some(raw) => match raw.split_once(',') {
            Some((length, precision)) => (length.parse().ok(), precision.parse().ok()),
            None => (raw.parse().ok(), None),
        },
        None => (None, None),
    }
}

fn quote(name: &str) -> String {
    Driver::Mysql.quote_identifier(name)
}

/// Quoted key columns with optional prefix lengths.
fn key_columns(columns: &[String], length: &BTreeMap<String, i64>) -> String {
    columns
        .iter()
        .map(|c| match length.get(c) {
            Some(len) => format!("{}({len})", quote(c)),
            None => quote(c),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

impl SchemaDialect for MysqlDialect {
    fn driver(&self) -> Driver {
        Driver::Mysql
    }

    fn list_tables_sql(&self, config: &ConnectionConfig) -> Statement {
        (format!("SHOW TABLES FROM {}", quote(&config.database)), Vec::new())
    }

    fn describe_table_sql(&self, table: &str, _config: &ConnectionConfig) -> Statement {
        (format!("SHOW FULL COLUMNS FROM {}", quote(table)), Vec::new())
    }

    fn describe_index_sql(&self, table: &str, _config: &ConnectionConfig) -> Statement {
        (format!("SHOW INDEXES FROM {}", quote(table)), Vec::new())
    }

    fn describe_foreign_key_sql(&self, table: &str, config: &ConnectionConfig) -> Statement {
        let sql = "SELECT * FROM information_schema.key_column_usage AS kcu \
            INNER JOIN information_schema.referential_constraints AS rc \
            ON (kcu.CONSTRAINT_NAME = rc.CONSTRAINT_NAME AND kcu.CONSTRAINT_SCHEMA = rc.CONSTRAINT_SCHEMA) \
            WHERE kcu.TABLE_SCHEMA = ? AND kcu.TABLE_NAME = ? AND rc.TABLE_NAME = ?";
        (
            sql.to_string(),
            vec![config.database.clone(), table.to_string(), table.to_string()],
        )
    }

    fn describe_options_sql(&self, table: &str, _config: &ConnectionConfig) -> Option<Statement> {
        Some((
            "SHOW TABLE STATUS WHERE Name = ?".to_string(),
            vec![table.to_string()],
        ))
    }

    fn convert_column(&self, raw: &str) -> Result<ColumnDescription, AppError> {
        let caps = type_pattern()
            .captures(raw.trim())
            .ok_or_else(|| AppError::SchemaParse(raw.to_string()))?;
        let col = caps[1].to_ascii_lowercase();
        let (length, precision) = split_length(caps.get(2).map(|m| m.as_str()));
        let unsigned = caps
            .get(3)
            .is_some_and(|m| m.as_str().eq_ignore_ascii_case("unsigned"));

        let description = match col.as_str() {
            "date" | "time" => ColumnDescription::new(ColumnType::from(col.as_str()), None),
            "datetime" | "timestamp" => match length {
                Some(fsp) if fsp > 0 => {
                    let t = if col == "datetime" {
                        ColumnType::DateTimeFractional
                    } else {
                        ColumnType::TimestampFractional
                    };
                    ColumnDescription::new(t, None).precision(Some(fsp))
                }
                _ => ColumnDescription::new(ColumnType::from(col.as_str()), None),
            },
            "tinyint" if length == Some(1) => ColumnDescription::new(ColumnType::Boolean, None),
            "boolean" => ColumnDescription::new(ColumnType::Boolean, None),
            "bigint" => ColumnDescription::new(ColumnType::BigInteger, length).unsigned(unsigned),
            "tinyint" => ColumnDescription::new(ColumnType::TinyInteger, length).unsigned(unsigned),
            "smallint" => {
                ColumnDescription::new(ColumnType::SmallInteger, length).unsigned(unsigned)
            }
            "int" | "integer" | "mediumint" => {
                ColumnDescription::new(ColumnType::Integer, length).unsigned(unsigned)
            }
            "char" if length == Some(36) => ColumnDescription::new(ColumnType::Uuid, None),
            "char" => ColumnDescription::new(ColumnType::String, length).fixed(),
            c if c.contains("char") => ColumnDescription::new(ColumnType::String, length),
            c if c.contains("text") => {
                let size = length_for(c.trim_end_matches("text"));
                ColumnDescription::new(ColumnType::Text, size)
            }
            "binary" if length == Some(16) => {
                ColumnDescription::new(ColumnType::BinaryUuid, None)
            }
            c if c.contains("blob") => {
                let size = length_for(c.trim_end_matches("blob"));
                ColumnDescription::new(ColumnType::Binary, size)
            }
            "binary" | "varbinary" => ColumnDescription::new(ColumnType::Binary, length),
            c if c.contains("float") || c.contains("double") => {
                ColumnDescription::new(ColumnType::Float, length)
                    .precision(precision)
                    .unsigned(unsigned)
            }
            c if c.contains("decimal") => ColumnDescription::new(ColumnType::Decimal, length)
                .precision(precision)
                .unsigned(unsigned),
            c if c.contains("json") => ColumnDescription::new(ColumnType::Json, None),
            _ => ColumnDescription::new(ColumnType::String, None),
        };
        Ok(description)
    }

    fn convert_field_description(
        &self,
        table: &mut TableSchema,
        row: &ResultRow,
    ) -> Result<(), AppError> {
        let name = required_str(row, "Field")?;
        let raw_type = required_str(row, "Type")?;
        let mut attrs = self.convert_column(&raw_type)?.into_attrs();

        attrs.insert(
            "null".into(),
            Value::from(row_str(row, "Null").as_deref() == Some("YES")),
        );
        attrs.insert(
            "default".into(),
            row.get("Default").cloned().unwrap_or(Value::Null),
        );
        attrs.insert(
            "collate".into(),
            row_str(row, "Collation").map_or(Value::Null, Value::from),
        );
        attrs.insert(
            "comment".into(),
            row_str(row, "Comment")
                .filter(|c| !c.is_empty())
                .map_or(Value::Null, Value::from),
        );
        if row_str(row, "Extra").is_some_and(|e| e.contains("auto_increment")) {
            attrs.insert("autoIncrement".into(), Value::Bool(true));
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
        let key_name = required_str(row, "Key_name")?;
        let column = required_str(row, "Column_name")?;
        let is_primary = key_name == "PRIMARY";
        let name = if is_primary { "primary".to_string() } else { key_name };

        let mut length = BTreeMap::new();
        if let Some(sub_part) = row_i64(row, "Sub_part").filter(|n| *n > 0) {
            length.insert(column.clone(), sub_part);
        }

        // Composite keys arrive as one row per column.
        if row_str(row, "Index_type").as_deref() == Some("FULLTEXT") {
            let index = Index {
                length,
                ..Index::new(IndexType::Fulltext, vec![column])
            };
            merge_index(table, &name, index);
        } else if is_primary || row_i64(row, "Non_unique") == Some(0) {
            let kind = if is_primary {
                ConstraintType::Primary
            } else {
                ConstraintType::Unique
            };
            let constraint = Constraint {
                length,
                ..Constraint::new(kind, vec![column])
            };
            merge_constraint(table, &name, constraint);
        } else {
            let index = Index {
                length,
                ..Index::new(IndexType::Index, vec![column])
            };
            merge_index(table, &name, index);
        }
        Ok(())
    }

    fn convert_foreign_key_description(
        &self,
        table: &mut TableSchema,
        row: &ResultRow,
    ) -> Result<(), AppError> {
        let name = required_str(row, "CONSTRAINT_NAME")?;
        let references = References {
            table: required_str(row, "REFERENCED_TABLE_NAME")?,
            columns: vec![required_str(row, "REFERENCED_COLUMN_NAME")?],
        };
        merge_foreign_key(
            table,
            &name,
            required_str(row, "COLUMN_NAME")?,
            references,
            convert_on_clause(&row_str(row, "UPDATE_RULE").unwrap_or_default()),
            convert_on_clause(&row_str(row, "DELETE_RULE").unwrap_or_default()),
        );
        Ok(())
    }

    fn convert_options_description(&self, table: &mut TableSchema, row: &ResultRow) {
        if let Some(engine) = row_str(row, "Engine") {
            table.set_option("engine", engine);
        }
        if let Some(collation) = row_str(row, "Collation") {
            table.set_option("collation", collation);
        }
    }

    fn column_sql(&self, table: &TableSchema, name: &str) -> Result<String, AppError> {
        let column = table.column(name).ok_or_else(|| missing_column(table, name))?;
        let mut out = quote(name);
        let t = &column.column_type;

        let native = match t {
            ColumnType::TinyInteger => Some(" TINYINT"),
            ColumnType::SmallInteger => Some(" SMALLINT"),
            ColumnType::Integer => Some(" INTEGER"),
            ColumnType::BigInteger => Some(" BIGINT"),
            ColumnType::BinaryUuid => Some(" BINARY(16)"),
            ColumnType::Boolean => Some(" BOOLEAN"),
            ColumnType::Float => Some(" FLOAT"),
            ColumnType::Decimal => Some(" DECIMAL"),
            ColumnType::Date => Some(" DATE"),
            ColumnType::Time => Some(" TIME"),
            ColumnType::DateTime | ColumnType::DateTimeFractional => Some(" DATETIME"),
            ColumnType::Timestamp
            | ColumnType::TimestampFractional
            | ColumnType::TimestampTimezone => Some(" TIMESTAMP"),
            ColumnType::Uuid => Some(" CHAR(36)"),
            ColumnType::Json => Some(" JSON"),
            _ => None,
        };
        if let Some(native) = native {
            out.push_str(native);
        }

        match t {
            ColumnType::String => {
                let keyword = if column.fixed == Some(true) { " CHAR" } else { " VARCHAR" };
                out.push_str(keyword);
                out.push_str(&format!("({})", column.length.unwrap_or(255)));
            }
            ColumnType::Char => {
                out.push_str(" CHAR");
                if let Some(length) = column.length {
                    out.push_str(&format!("({length})"));
                }
            }
            ColumnType::Text => match column.length.and_then(length_name) {
                Some(size) => out.push_str(&format!(" {}TEXT", size.to_uppercase())),
                None => out.push_str(" TEXT"),
            },
            ColumnType::Binary => match (column.length.and_then(length_name), column.length) {
                (Some(size), _) => out.push_str(&format!(" {}BLOB", size.to_uppercase())),
                (None, Some(length)) => out.push_str(&format!(" VARBINARY({length})")),
                (None, None) => out.push_str(" BLOB"),
            },
            ColumnType::Custom(name) => {
                out.push(' ');
                out.push_str(&name.to_uppercase());
            }
            _ => {}
        }

        let integer_like = matches!(
            t,
            ColumnType::Integer | ColumnType::SmallInteger | ColumnType::TinyInteger
        );
        if integer_like {
            if let Some(length) = column.length {
                out.push_str(&format!("({length})"));
            }
        }

        let fractional = matches!(
            t,
            ColumnType::DateTimeFractional | ColumnType::TimestampFractional
        );
        if fractional {
            out.push_str(&format!("({})", column.precision.unwrap_or(6)));
        }

        if matches!(t, ColumnType::Float | ColumnType::Decimal) {
            match (column.length, column.precision) {
                (Some(length), Some(precision)) => out.push_str(&format!("({length},{precision})")),
                (Some(length), None) => out.push_str(&format!("({length})")),
                _ => {}
            }
        }

        let has_unsigned = matches!(
            t,
            ColumnType::Float
                | ColumnType::Decimal
                | ColumnType::TinyInteger
                | ColumnType::SmallInteger
                | ColumnType::Integer
                | ColumnType::BigInteger
        );
        if has_unsigned && column.unsigned == Some(true) {
            out.push_str(" UNSIGNED");
        }

        if matches!(t, ColumnType::Text | ColumnType::String | ColumnType::Char) {
            if let Some(collate) = &column.collate {
                out.push_str(&format!(" COLLATE {collate}"));
            }
        }

        if column.null == Some(false) {
            out.push_str(" NOT NULL");
        }

        let single_primary = table.primary_key() == [name.to_string()];
        let implicit_auto =
            single_primary && column.auto_increment.is_none() && !table.has_autoincrement();
        if matches!(t, ColumnType::Integer | ColumnType::BigInteger)
            && (column.auto_increment == Some(true) || implicit_auto)
        {
            out.push_str(" AUTO_INCREMENT");
        }

        if column.null == Some(true) && matches!(t, ColumnType::Timestamp) {
            out.push_str(" NULL");
        }

        let timestamp_like = matches!(
            t,
            ColumnType::Timestamp
                | ColumnType::TimestampFractional
                | ColumnType::DateTime
                | ColumnType::DateTimeFractional
        );
        match &column.default {
            Some(Value::String(d)) if timestamp_like && d.eq_ignore_ascii_case("current_timestamp") => {
                out.push_str(" DEFAULT CURRENT_TIMESTAMP");
            }
            Some(default) => {
                out.push_str(" DEFAULT ");
                out.push_str(&Driver::Mysql.schema_value(default));
            }
            None => {}
        }

        if let Some(comment) = column.comment.as_deref().filter(|c| !c.is_empty()) {
            out.push_str(" COMMENT ");
            out.push_str(&Driver::Mysql.schema_value(&Value::from(comment)));
        }

        Ok(out)
    }

    fn index_sql(&self, table: &TableSchema, name: &str) -> Result<String, AppError> {
        let index = table.index(name).ok_or_else(|| missing_index(table, name))?;
        let keyword = match index.index_type {
            IndexType::Index => "KEY",
            IndexType::Fulltext => "FULLTEXT KEY",
        };
        Ok(format!(
            "{keyword} {} ({})",
            quote(name),
            key_columns(&index.columns, &index.length)
        ))
    }

    fn constraint_sql(&self, table: &TableSchema, name: &str) -> Result<String, AppError> {
        let constraint = table
            .constraint(name)
            .ok_or_else(|| missing_constraint(table, name))?;
        let sql = match constraint.constraint_type {
            ConstraintType::Primary => format!(
                "PRIMARY KEY ({})",
                quote_columns(Driver::Mysql, &constraint.columns)
            ),
            ConstraintType::Unique => format!(
                "UNIQUE KEY {} ({})",
                quote(name),
                key_columns(&constraint.columns, &constraint.length)
            ),
            ConstraintType::Foreign => format!(
                "CONSTRAINT {} FOREIGN KEY ({}){}",
                quote(name),
                quote_columns(Driver::Mysql, &constraint.columns),
                references_clause(Driver::Mysql, constraint)
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
            .chain(indexes)
            .filter(|line| !line.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(",\n");
        let temporary = if table.is_temporary() { " TEMPORARY " } else { " " };
        let mut sql = format!(
            "CREATE{temporary}TABLE {} (\n{content}\n)",
            quote(table.name())
        );

        let options = table.options();
        if let Some(engine) = options.get("engine") {
            sql.push_str(&format!(" ENGINE={engine}"));
        }
        if let Some(charset) = options.get("charset") {
            sql.push_str(&format!(" DEFAULT CHARSET={charset}"));
        }
        if let Some(collate) = options.get("collate").or_else(|| options.get("collation")) {
            sql.push_str(&format!(" COLLATE={collate}"));
        }
        vec![sql]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> ResultRow {
        serde_json::from_value(value).unwrap()
    }

    fn convert(raw: &str) -> ColumnDescription {
        MysqlDialect.convert_column(raw).unwrap()
    }

    #[test]
    fn convert_common_types() {
        assert_eq!(convert("varchar(255)"), ColumnDescription::new(ColumnType::String, Some(255)));
        assert_eq!(
            convert("int(11)"),
            ColumnDescription::new(ColumnType::Integer, Some(11)).unsigned(false)
        );
        assert_eq!(convert("tinyint(1)"), ColumnDescription::new(ColumnType::Boolean, None));
        assert_eq!(convert("char(36)").column_type, ColumnType::Uuid);
        assert_eq!(convert("char(2)").fixed, Some(true));
        assert_eq!(convert("mediumtext").length, Some(16_777_215));
        assert_eq!(convert("text").length, None);
        assert_eq!(convert("longblob").length, Some(4_294_967_295));
        assert_eq!(convert("binary(16)").column_type, ColumnType::BinaryUuid);
        assert_eq!(convert("json").column_type, ColumnType::Json);
    }

    #[test]
    fn convert_numeric_with_precision_and_unsigned() {
        let d = convert("decimal(10,2) unsigned");
        assert_eq!(d.column_type, ColumnType::Decimal);
        assert_eq!((d.length, d.precision), (Some(10), Some(2)));
        assert_eq!(d.unsigned, Some(true));

        let b = convert("BIGINT(20) UNSIGNED");
        assert_eq!(b.column_type, ColumnType::BigInteger);
        assert_eq!(b.unsigned, Some(true));
    }

    #[test]
    fn convert_fractional_datetime() {
        let d = convert("datetime(6)");
        assert_eq!(d.column_type, ColumnType::DateTimeFractional);
        assert_eq!(d.precision, Some(6));
        assert_eq!(convert("timestamp").column_type, ColumnType::Timestamp);
    }

    #[test]
    fn unparseable_type_is_an_error() {
        let err = MysqlDialect.convert_column("(11)").unwrap_err();
        assert!(err.is_schema_parse());
        assert_eq!(err.to_string(), "Unable to parse column type from \"(11)\"");
    }

    #[test]
    fn field_description_populates_column() {
        let mut table = TableSchema::new("articles");
        MysqlDialect
            .convert_field_description(
                &mut table,
                &row(json!({
                    "Field": "id", "Type": "int(11) unsigned", "Null": "NO", "Default": null,
                    "Collation": null, "Comment": "", "Extra": "auto_increment"
                })),
            )
            .unwrap();
        MysqlDialect
            .convert_field_description(
                &mut table,
                &row(json!({
                    "Field": "title", "Type": "varchar(100)", "Null": "YES", "Default": "x",
                    "Collation": "utf8mb4_general_ci", "Comment": "Headline", "Extra": ""
                })),
            )
            .unwrap();

        let id = table.column("id").unwrap();
        assert_eq!(id.column_type, ColumnType::Integer);
        assert_eq!(id.null, Some(false));
        assert_eq!(id.unsigned, Some(true));
        assert_eq!(id.auto_increment, Some(true));
        assert_eq!(id.comment, None);

        let title = table.column("title").unwrap();
        assert_eq!(title.length, Some(100));
        assert_eq!(title.default, Some(json!("x")));
        assert_eq!(title.collate.as_deref(), Some("utf8mb4_general_ci"));
        assert_eq!(title.comment.as_deref(), Some("Headline"));
    }

    #[test]
    fn index_rows_merge_composite_keys() {
        let mut table = TableSchema::new("articles");
        let rows = [
            json!({"Key_name": "PRIMARY", "Column_name": "id", "Index_type": "BTREE", "Non_unique": 0, "Sub_part": null}),
            json!({"Key_name": "title_idx", "Column_name": "title", "Index_type": "BTREE", "Non_unique": 1, "Sub_part": 10}),
            json!({"Key_name": "title_idx", "Column_name": "author_id", "Index_type": "BTREE", "Non_unique": 1, "Sub_part": null}),
            json!({"Key_name": "slug", "Column_name": "slug", "Index_type": "BTREE", "Non_unique": "0", "Sub_part": null}),
            json!({"Key_name": "body_ft", "Column_name": "body", "Index_type": "FULLTEXT", "Non_unique": 1, "Sub_part": null}),
        ];
        for r in rows {
            MysqlDialect
                .convert_index_description(&mut table, &row(r), &[])
                .unwrap();
        }

        assert_eq!(table.primary_key(), vec!["id".to_string()]);
        let title = table.index("title_idx").unwrap();
        assert_eq!(title.columns, vec!["title", "author_id"]);
        assert_eq!(title.length.get("title"), Some(&10));
        assert_eq!(
            table.constraint("slug").unwrap().constraint_type,
            ConstraintType::Unique
        );
        assert_eq!(table.index("body_ft").unwrap().index_type, IndexType::Fulltext);
    }

    #[test]
    fn foreign_key_rows() {
        let mut table = TableSchema::new("articles");
        MysqlDialect
            .convert_foreign_key_description(
                &mut table,
                &row(json!({
                    "CONSTRAINT_NAME": "author_fk", "COLUMN_NAME": "author_id",
                    "REFERENCED_TABLE_NAME": "authors", "REFERENCED_COLUMN_NAME": "id",
                    "UPDATE_RULE": "CASCADE", "DELETE_RULE": "RESTRICT"
                })),
            )
            .unwrap();
        let fk = table.constraint("author_fk").unwrap();
        assert_eq!(fk.columns, vec!["author_id"]);
        assert_eq!(fk.references.as_ref().unwrap().table, "authors");
        assert_eq!(fk.update, Some(crate::models::schema::ForeignAction::Cascade));
    }

    #[test]
    fn create_table_sql_renders_columns_keys_and_options() {
        let mut table = TableSchema::new("articles");
        table
            .add_column("id", "integer")
            .add_column(
                "title",
                match json!({"type": "string", "length": 100, "null": false}) {
                    Value::Object(m) => m,
                    _ => unreachable!(),
                },
            )
            .add_column("body", "text")
            .add_constraint(
                "primary",
                Constraint::new(ConstraintType::Primary, vec!["id".into()]),
            )
            .add_index("title_idx", Index::new(IndexType::Index, vec!["title".into()]))
            .set_option("engine", "InnoDB");

        let sql = Driver::Mysql.create_sql(&table).unwrap();
        assert_eq!(
            sql,
            vec![
                "CREATE TABLE `articles` (\n\
                 `id` INTEGER AUTO_INCREMENT,\n\
                 `title` VARCHAR(100) NOT NULL,\n\
                 `body` TEXT,\n\
                 PRIMARY KEY (`id`),\n\
                 KEY `title_idx` (`title`)\n\
                 ) ENGINE=InnoDB"
                    .to_string()
            ]
        );
    }

    #[test]
    fn column_sql_defaults_and_comments() {
        let mut table = TableSchema::new("t");
        table.add_column(
            "created",
            match json!({"type": "timestamp", "default": "CURRENT_TIMESTAMP", "comment": "made"}) {
                Value::Object(m) => m,
                _ => unreachable!(),
            },
        );
        assert_eq!(
            MysqlDialect.column_sql(&table, "created").unwrap(),
            "`created` TIMESTAMP DEFAULT CURRENT_TIMESTAMP COMMENT 'made'"
        );
        assert!(MysqlDialect.column_sql(&table, "missing").unwrap_err().is_not_found());
    }
}
