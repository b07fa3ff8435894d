//! Reflected table structure: columns, indexes, constraints and table options.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Attribute map accepted by `TableSchema::add_column`.
pub type ColumnAttrs = Map<String, Value>;

/// Text/blob size classes shared by the dialects.
pub const LENGTH_TINY: i64 = 255;
pub const LENGTH_MEDIUM: i64 = 16_777_215;
pub const LENGTH_LONG: i64 = 4_294_967_295;

/// Size-class name for a known length (`tiny`, `medium`, `long`).
pub fn length_name(length: i64) -> Option<&'static str> {
    match length {
        LENGTH_TINY => Some("tiny"),
        LENGTH_MEDIUM => Some("medium"),
        LENGTH_LONG => Some("long"),
        _ => None,
    }
}

/// Length for a size-class prefix such as the `medium` of `mediumtext`.
pub fn length_for(name: &str) -> Option<i64> {
    match name {
        "tiny" => Some(LENGTH_TINY),
        "medium" => Some(LENGTH_MEDIUM),
        "long" => Some(LENGTH_LONG),
        _ => None,
    }
}

/// Abstract column type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColumnType {
    String,
    Char,
    Text,
    Uuid,
    BinaryUuid,
    Binary,
    Integer,
    TinyInteger,
    SmallInteger,
    BigInteger,
    Float,
    Decimal,
    Boolean,
    Date,
    Time,
    DateTime,
    DateTimeFractional,
    Timestamp,
    TimestampFractional,
    TimestampTimezone,
    Json,
    /// Application-defined type name.
    Custom(String),
}

impl ColumnType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Char => "char",
            Self::Text => "text",
            Self::Uuid => "uuid",
            Self::BinaryUuid => "binaryuuid",
            Self::Binary => "binary",
            Self::Integer => "integer",
            Self::TinyInteger => "tinyinteger",
            Self::SmallInteger => "smallinteger",
            Self::BigInteger => "biginteger",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime => "datetime",
            Self::DateTimeFractional => "datetimefractional",
            Self::Timestamp => "timestamp",
            Self::TimestampFractional => "timestampfractional",
            Self::TimestampTimezone => "timestamptimezone",
            Self::Json => "json",
            Self::Custom(name) => name,
        }
    }

    /// Attribute names allowed in addition to the common column keys.
    fn extra_keys(&self) -> &'static [&'static str] {
        match self {
            Self::String => &["collate", "fixed"],
            Self::Char | Self::Text => &["collate"],
            Self::Integer | Self::BigInteger => &["unsigned", "autoIncrement"],
            Self::TinyInteger | Self::SmallInteger | Self::Decimal | Self::Float => &["unsigned"],
            _ => &[],
        }
    }
}

impl From<&str> for ColumnType {
    fn from(name: &str) -> Self {
        match name {
            "string" => Self::String,
            "char" => Self::Char,
            "text" => Self::Text,
            "uuid" => Self::Uuid,
            "binaryuuid" => Self::BinaryUuid,
            "binary" => Self::Binary,
            "integer" => Self::Integer,
            "tinyinteger" => Self::TinyInteger,
            "smallinteger" => Self::SmallInteger,
            "biginteger" => Self::BigInteger,
            "float" => Self::Float,
            "decimal" => Self::Decimal,
            "boolean" => Self::Boolean,
            "date" => Self::Date,
            "time" => Self::Time,
            "datetime" => Self::DateTime,
            "datetimefractional" => Self::DateTimeFractional,
            "timestamp" => Self::Timestamp,
            "timestampfractional" => Self::TimestampFractional,
            "timestamptimezone" => Self::TimestampTimezone,
            "json" => Self::Json,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<String> for ColumnType {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<ColumnType> for String {
    fn from(column_type: ColumnType) -> Self {
        column_type.as_str().to_string()
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const COLUMN_KEYS: &[&str] = &[
    "type",
    "baseType",
    "length",
    "precision",
    "null",
    "default",
    "comment",
];

/// Column definition. Keys outside the whitelist for its type are never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub base_type: Option<String>,
    pub length: Option<i64>,
    pub precision: Option<i64>,
    pub null: Option<bool>,
    pub default: Option<Value>,
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unsigned: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_increment: Option<bool>,
}

impl Column {
    pub fn new(column_type: ColumnType) -> Self {
        Self {
            column_type,
            base_type: None,
            length: None,
            precision: None,
            null: None,
            default: None,
            comment: None,
            collate: None,
            fixed: None,
            unsigned: None,
            auto_increment: None,
        }
    }

    /// Build from an attribute map, keeping only whitelisted keys for the column's type.
    pub fn from_attrs(attrs: &ColumnAttrs) -> Self {
        let column_type = attrs
            .get("type")
            .and_then(Value::as_str)
            .map(ColumnType::from)
            .unwrap_or(ColumnType::String);
        let extras = column_type.extra_keys();
        let get = |key: &str| {
            if COLUMN_KEYS.contains(&key) || extras.contains(&key) {
                attrs.get(key).filter(|v| !v.is_null())
            } else {
                None
            }
        };

        Self {
            base_type: get("baseType").and_then(value_str),
            length: get("length").and_then(value_i64),
            precision: get("precision").and_then(value_i64),
            null: get("null").and_then(value_bool),
            default: get("default").cloned(),
            comment: get("comment").and_then(value_str),
            collate: get("collate").and_then(value_str),
            fixed: get("fixed").and_then(value_bool),
            unsigned: get("unsigned").and_then(value_bool),
            auto_increment: get("autoIncrement").and_then(value_bool),
            ..Self::new(column_type)
        }
    }

    /// Attribute map view of this column, used to re-add it with changes.
    pub fn to_attrs(&self) -> ColumnAttrs {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    pub fn default_str(&self) -> Option<String> {
        self.default.as_ref().and_then(value_str)
    }
}

fn value_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => Some(n.as_i64() != Some(0)),
        Value::String(s) => Some(!(s.is_empty() || s == "0")),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    Index,
    Fulltext,
}

/// Non-unique index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    #[serde(rename = "type")]
    pub index_type: IndexType,
    pub columns: Vec<String>,
    /// Prefix lengths keyed by column.
    #[serde(default)]
    pub length: BTreeMap<String, i64>,
}

impl Index {
    pub fn new(index_type: IndexType, columns: Vec<String>) -> Self {
        Self {
            index_type,
            columns,
            length: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintType {
    Primary,
    Unique,
    Foreign,
}

/// Referential action for foreign keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ForeignAction {
    Cascade,
    SetNull,
    NoAction,
    Restrict,
    SetDefault,
}

/// Foreign key target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct References {
    pub table: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    #[serde(rename = "type")]
    pub constraint_type: ConstraintType,
    pub columns: Vec<String>,
    #[serde(default)]
    pub length: BTreeMap<String, i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<References>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<ForeignAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<ForeignAction>,
}

impl Constraint {
    pub fn new(constraint_type: ConstraintType, columns: Vec<String>) -> Self {
        Self {
            constraint_type,
            columns,
            length: BTreeMap::new(),
            references: None,
            update: None,
            delete: None,
        }
    }

    pub fn foreign(
        columns: Vec<String>,
        references: References,
        update: ForeignAction,
        delete: ForeignAction,
    ) -> Self {
        Self {
            references: Some(references),
            update: Some(update),
            delete: Some(delete),
            ..Self::new(ConstraintType::Foreign, columns)
        }
    }
}

/// Mutable builder for a table's reflected structure.
#[derive(Debug, Clone, Default)]
pub struct TableSchema {
    name: String,
    columns: Vec<(String, Column)>,
    indexes: Vec<(String, Index)>,
    constraints: Vec<(String, Constraint)>,
    options: BTreeMap<String, String>,
    temporary: bool,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add or replace a column. `attrs` is a bare type name or an attribute map.
    pub fn add_column(&mut self, name: impl Into<String>, attrs: impl Into<ColumnSpec>) -> &mut Self {
        let column = match attrs.into() {
            ColumnSpec::Type(column_type) => Column::new(column_type),
            ColumnSpec::Attrs(attrs) => Column::from_attrs(&attrs),
        };
        upsert(&mut self.columns, name.into(), column);
        self
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        lookup(&self.columns, name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Column names in definition order.
    pub fn columns(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn column_type(&self, name: &str) -> Option<&ColumnType> {
        self.column(name).map(|c| &c.column_type)
    }

    pub fn set_column_type(&mut self, name: &str, column_type: ColumnType) -> &mut Self {
        if let Some((_, column)) = self.columns.iter_mut().find(|(n, _)| n == name) {
            column.column_type = column_type;
        }
        self
    }

    /// Nullable unless the column explicitly says otherwise.
    pub fn is_nullable(&self, name: &str) -> bool {
        self.column(name)
            .map(|c| c.null != Some(false))
            .unwrap_or(true)
    }

    /// Default values of columns that declare one.
    pub fn default_values(&self) -> Map<String, Value> {
        self.columns
            .iter()
            .filter_map(|(name, c)| c.default.clone().map(|d| (name.clone(), d)))
            .collect()
    }

    pub fn primary_key(&self) -> Vec<String> {
        self.constraints
            .iter()
            .find(|(_, c)| c.constraint_type == ConstraintType::Primary)
            .map(|(_, c)| c.columns.clone())
            .unwrap_or_default()
    }

    pub fn has_autoincrement(&self) -> bool {
        self.columns
            .iter()
            .any(|(_, c)| c.auto_increment == Some(true))
    }

    /// Store an index as given.
    pub fn add_index(&mut self, name: impl Into<String>, index: Index) -> &mut Self {
        upsert(&mut self.indexes, name.into(), index);
        self
    }

    pub fn index(&self, name: &str) -> Option<&Index> {
        lookup(&self.indexes, name)
    }

    pub fn indexes(&self) -> Vec<&str> {
        self.indexes.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn add_constraint(&mut self, name: impl Into<String>, constraint: Constraint) -> &mut Self {
        upsert(&mut self.constraints, name.into(), constraint);
        self
    }

    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        lookup(&self.constraints, name)
    }

    pub fn constraints(&self) -> Vec<&str> {
        self.constraints.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Name of the most recently added foreign key.
    pub fn last_foreign_key(&self) -> Option<&str> {
        self.constraints
            .iter()
            .rev()
            .find(|(_, c)| c.constraint_type == ConstraintType::Foreign)
            .map(|(name, _)| name.as_str())
    }

    pub fn set_option(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Merge several table options, replacing keys already set.
    pub fn set_options<K, V>(&mut self, options: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in options {
            self.set_option(key, value);
        }
        self
    }

    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    pub fn set_temporary(&mut self, temporary: bool) -> &mut Self {
        self.temporary = temporary;
        self
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }
}

/// Input to `add_column`.
#[derive(Debug, Clone)]
pub enum ColumnSpec {
    Type(ColumnType),
    Attrs(ColumnAttrs),
}

impl From<&str> for ColumnSpec {
    fn from(name: &str) -> Self {
        Self::Type(ColumnType::from(name))
    }
}

impl From<ColumnType> for ColumnSpec {
    fn from(column_type: ColumnType) -> Self {
        Self::Type(column_type)
    }
}

impl From<ColumnAttrs> for ColumnSpec {
    fn from(attrs: ColumnAttrs) -> Self {
        Self::Attrs(attrs)
    }
}

fn upsert<T>(entries: &mut Vec<(String, T)>, name: String, value: T) {
    match entries.iter_mut().find(|(n, _)| *n == name) {
        Some((_, existing)) => *existing = value,
        None => entries.push((name, value)),
    }
}

fn lookup<'a, T>(entries: &'a [(String, T)], name: &str) -> Option<&'a T> {
    entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
}

/// Serializes named entries as a JSON object in definition order.
struct Ordered<'a, T>(&'a [(String, T)]);

impl<T: Serialize> Serialize for Ordered<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(name, value)| (name, value)))
    }
}

impl Serialize for TableSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TableSchema", 6)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("columns", &Ordered(&self.columns))?;
        state.serialize_field("indexes", &Ordered(&self.indexes))?;
        state.serialize_field("constraints", &Ordered(&self.constraints))?;
        state.serialize_field("options", &self.options)?;
        state.serialize_field("temporary", &self.temporary)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> ColumnAttrs {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn add_column_with_bare_type_defaults_everything_else() {
        let mut table = TableSchema::new("articles");
        table.add_column("id", "integer");

        let column = table.column("id").unwrap();
        assert_eq!(column.column_type, ColumnType::Integer);
        let json = serde_json::to_value(column).unwrap();
        for key in ["baseType", "length", "precision", "null", "default", "comment"] {
            assert!(json[key].is_null(), "{key} should be null");
        }
    }

    #[test]
    fn add_column_drops_keys_outside_whitelist() {
        let mut table = TableSchema::new("articles");
        table.add_column(
            "title",
            attrs(json!({"type": "string", "length": 255, "fixed": true, "unsigned": true, "bogus": 1})),
        );
        table.add_column("body", attrs(json!({"type": "text", "fixed": true, "collate": "utf8_bin"})));

        let title = table.column("title").unwrap();
        assert_eq!(title.length, Some(255));
        assert_eq!(title.fixed, Some(true));
        assert_eq!(title.unsigned, None);

        let body = table.column("body").unwrap();
        assert_eq!(body.fixed, None);
        assert_eq!(body.collate.as_deref(), Some("utf8_bin"));
    }

    #[test]
    fn columns_keep_definition_order_and_replace_in_place() {
        let mut table = TableSchema::new("t");
        table.add_column("a", "string").add_column("b", "integer").add_column("a", "text");
        assert_eq!(table.columns(), vec!["a", "b"]);
        assert_eq!(table.column_type("a"), Some(&ColumnType::Text));
    }

    #[test]
    fn nullable_and_defaults() {
        let mut table = TableSchema::new("t");
        table.add_column("a", attrs(json!({"type": "integer", "null": false, "default": 0})));
        table.add_column("b", "string");
        assert!(!table.is_nullable("a"));
        assert!(table.is_nullable("b"));
        assert_eq!(Value::Object(table.default_values()), json!({"a": 0}));
    }

    #[test]
    fn add_index_is_stored_verbatim() {
        let mut table = TableSchema::new("t");
        let mut index = Index::new(IndexType::Fulltext, vec!["nope".into()]);
        index.length.insert("nope".into(), 10);
        table.add_index("ft", index.clone());
        assert_eq!(table.index("ft"), Some(&index));
    }

    #[test]
    fn primary_key_from_constraint() {
        let mut table = TableSchema::new("t");
        table.add_constraint("primary", Constraint::new(ConstraintType::Primary, vec!["id".into()]));
        assert_eq!(table.primary_key(), vec!["id".to_string()]);
    }

    #[test]
    fn custom_types_round_trip_names() {
        assert_eq!(ColumnType::from("money"), ColumnType::Custom("money".into()));
        assert_eq!(ColumnType::from("money").as_str(), "money");
        assert_eq!(String::from(ColumnType::DateTimeFractional), "datetimefractional");
    }

    #[test]
    fn serializes_as_ordered_maps() {
        let mut table = TableSchema::new("t");
        table.add_column("z", "string").add_column("a", "integer");
        let json = serde_json::to_value(&table).unwrap();
        let names: Vec<&String> = json["columns"].as_object().unwrap().keys().collect();
        assert_eq!(names, vec!["z", "a"]);
        assert_eq!(json["columns"]["a"]["type"], "integer");
    }

    #[test]
    fn set_options_merges_into_existing() {
        let mut table = TableSchema::new("t");
        table
            .set_option("engine", "MyISAM")
            .set_options([("engine", "InnoDB"), ("collation", "utf8mb4_general_ci")]);
        assert_eq!(table.options().len(), 2);
        assert_eq!(table.options()["engine"], "InnoDB");
    }

    #[test]
    fn length_names() {
        assert_eq!(length_name(LENGTH_MEDIUM), Some("medium"));
        assert_eq!(length_for("long"), Some(LENGTH_LONG));
        assert_eq!(length_for(""), None);
    }
}
