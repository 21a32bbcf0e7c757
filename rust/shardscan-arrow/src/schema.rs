//! Caller-supplied column schema of the produced partitions.

use std::{fmt, sync::Arc};

use arrow_schema::{DataType, Field, Schema, SchemaRef, TimeUnit};
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use shardscan_common::{Result, error::Error};

/// Prefix of column names that resolve against per-hit metadata instead of
/// the document body.
pub const METADATA_MARKER: &str = "es.";

/// Column receiving the document identifier.
pub const ID_COLUMN: &str = "es._id";

/// Column receiving the relevance score.
pub const SCORE_COLUMN: &str = "es._score";

/// Column receiving the concrete index name of the hit.
pub const INDEX_COLUMN: &str = "es._index";

/// Maximum length of the identifier column appended by
/// [`ColumnSchema::with_metadata_columns`].
pub const ID_COLUMN_MAX_LEN: usize = 512;

/// Logical type of a partition column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    /// Bounded text; values longer than `max_len` characters are rejected.
    String { max_len: usize },
    /// Unbounded text. Objects and arrays are stored as compact JSON.
    VarString,
    /// Point in time parsed from a string with a `chrono` format string,
    /// for example `%Y-%m-%d %H:%M:%S`.
    Time { format: String },
}

impl ColumnType {
    /// Arrow type of the column's array.
    pub fn arrow_type(&self) -> DataType {
        match self {
            ColumnType::Bool => DataType::Boolean,
            ColumnType::Int8 => DataType::Int8,
            ColumnType::Int16 => DataType::Int16,
            ColumnType::Int32 => DataType::Int32,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Float32 => DataType::Float32,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::String { .. } | ColumnType::VarString => DataType::Utf8,
            ColumnType::Time { .. } => DataType::Timestamp(TimeUnit::Nanosecond, None),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Bool => f.write_str("bool"),
            ColumnType::Int8 => f.write_str("int8"),
            ColumnType::Int16 => f.write_str("int16"),
            ColumnType::Int32 => f.write_str("int32"),
            ColumnType::Int64 => f.write_str("int64"),
            ColumnType::Float32 => f.write_str("float32"),
            ColumnType::Float64 => f.write_str("float64"),
            ColumnType::String { max_len } => write!(f, "string({max_len})"),
            ColumnType::VarString => f.write_str("varstring"),
            ColumnType::Time { format } => write!(f, "time with format {format}"),
        }
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(flatten)]
    pub column_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Column {
        Column {
            name: name.into(),
            column_type,
        }
    }

    /// Whether the column resolves against hit metadata.
    pub fn is_metadata(&self) -> bool {
        self.name.starts_with(METADATA_MARKER)
    }

    pub fn to_arrow_field(&self) -> Field {
        Field::new(&self.name, self.column_type.arrow_type(), true)
    }
}

/// Ordered list of uniquely named columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnSchema {
    columns: Vec<Column>,
}

impl ColumnSchema {
    pub fn new() -> ColumnSchema {
        ColumnSchema::default()
    }

    /// Builds a schema from `columns`, rejecting empty and duplicate names.
    pub fn try_new(columns: impl IntoIterator<Item = Column>) -> Result<ColumnSchema> {
        let mut schema = ColumnSchema::new();
        for column in columns {
            schema.add_column(column)?;
        }
        Ok(schema)
    }

    /// Appends a column.
    pub fn add_column(&mut self, column: Column) -> Result<()> {
        if column.name.is_empty() {
            return Err(Error::config("column name must not be empty"));
        }
        if self.contains(&column.name) {
            return Err(Error::config(format!(
                "duplicate column name '{}'",
                column.name
            )));
        }
        if let ColumnType::Time { format } = &column.column_type {
            verify_time_format(&column.name, format)?;
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn with_column(mut self, name: impl Into<String>, column_type: ColumnType) -> Result<Self> {
        self.add_column(Column::new(name, column_type))?;
        Ok(self)
    }

    /// Appends the identifier (`String(512)`) and score (`Float32`) columns
    /// unless the schema already declares them.
    pub fn with_metadata_columns(mut self) -> ColumnSchema {
        if !self.contains(ID_COLUMN) {
            self.columns.push(Column::new(
                ID_COLUMN,
                ColumnType::String {
                    max_len: ID_COLUMN_MAX_LEN,
                },
            ));
        }
        if !self.contains(SCORE_COLUMN) {
            self.columns
                .push(Column::new(SCORE_COLUMN, ColumnType::Float32));
        }
        self
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn find(&self, name: &str) -> Option<(usize, &Column)> {
        self.columns.iter().enumerate().find(|(_, c)| c.name == name)
    }

    pub fn to_arrow_schema(&self) -> SchemaRef {
        Arc::new(Schema::new(
            self.columns
                .iter()
                .map(Column::to_arrow_field)
                .collect::<Vec<_>>(),
        ))
    }
}

/// A time format must be a valid strftime pattern with at least one field
/// specifier (`%Y`, `%H`, ...).
fn verify_time_format(column: &str, format: &str) -> Result<()> {
    let mut has_field = false;
    for item in StrftimeItems::new(format) {
        match item {
            Item::Error => {
                return Err(Error::config(format!(
                    "column '{column}': invalid time format '{format}'"
                )));
            }
            Item::Numeric(..) | Item::Fixed(_) => has_field = true,
            _ => (),
        }
    }
    if !has_field {
        return Err(Error::config(format!(
            "column '{column}': time format '{format}' has no % specifiers"
        )));
    }
    Ok(())
}

impl<'de> Deserialize<'de> for ColumnSchema {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let columns = Vec::<Column>::deserialize(deserializer)?;
        ColumnSchema::try_new(columns).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use shardscan_common::error::ErrorKind;

    use super::*;

    #[test]
    fn test_duplicate_and_empty_names() {
        let err = ColumnSchema::new()
            .with_column("name", ColumnType::VarString)
            .unwrap()
            .with_column("name", ColumnType::Int64)
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Config { .. }));

        let err = ColumnSchema::try_new([Column::new("", ColumnType::Bool)]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Config { .. }));
    }

    #[test]
    fn test_time_format_is_checked() {
        for format in ["2006-01-02 15:04:05", "", "%Q"] {
            let err = ColumnSchema::new()
                .with_column(
                    "date",
                    ColumnType::Time {
                        format: format.to_string(),
                    },
                )
                .unwrap_err();
            assert!(matches!(err.kind(), ErrorKind::Config { .. }), "{format}");
        }

        let res = serde_json::from_str::<ColumnSchema>(
            r#"[{"name": "date", "type": "time", "format": "2006-01-02"}]"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_with_metadata_columns() {
        let schema = ColumnSchema::new()
            .with_column("coords.x", ColumnType::Float64)
            .unwrap()
            .with_column(SCORE_COLUMN, ColumnType::Float64)
            .unwrap()
            .with_metadata_columns();
        let names = schema
            .columns()
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["coords.x", SCORE_COLUMN, ID_COLUMN]);
        assert_eq!(schema.find(SCORE_COLUMN).unwrap().1.column_type, ColumnType::Float64);
        assert!(schema.find(ID_COLUMN).unwrap().1.is_metadata());
        assert!(!schema.find("coords.x").unwrap().1.is_metadata());
    }

    #[test]
    fn test_arrow_schema() {
        let schema = ColumnSchema::new()
            .with_column("flag", ColumnType::Bool)
            .unwrap()
            .with_column(
                "date",
                ColumnType::Time {
                    format: "%Y-%m-%d".to_string(),
                },
            )
            .unwrap()
            .with_column("name", ColumnType::String { max_len: 16 })
            .unwrap();
        let arrow = schema.to_arrow_schema();
        assert_eq!(arrow.fields().len(), 3);
        assert_eq!(arrow.field(0).data_type(), &DataType::Boolean);
        assert_eq!(
            arrow.field(1).data_type(),
            &DataType::Timestamp(TimeUnit::Nanosecond, None)
        );
        assert_eq!(arrow.field(2).data_type(), &DataType::Utf8);
        assert!(arrow.fields().iter().all(|f| f.is_nullable()));
    }

    #[test]
    fn test_deserialize() {
        let schema: ColumnSchema = serde_json::from_str(
            r#"[
                {"name": "name", "type": "var_string"},
                {"name": "coords.x", "type": "float64"},
                {"name": "id", "type": "string", "max_len": 20},
                {"name": "date", "type": "time", "format": "%Y-%m-%d %H:%M:%S"}
            ]"#,
        )
        .unwrap();
        assert_eq!(schema.len(), 4);
        assert_eq!(
            schema.columns()[2].column_type,
            ColumnType::String { max_len: 20 }
        );

        let dup = serde_json::from_str::<ColumnSchema>(
            r#"[{"name": "a", "type": "bool"}, {"name": "a", "type": "int8"}]"#,
        );
        assert!(dup.is_err());
    }
}
