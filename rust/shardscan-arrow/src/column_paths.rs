//! Mapping of column names to the hit field each column reads.

use serde_json::Value;
use shardscan_client::{Hit, MetadataField};
use shardscan_common::{Result, error::Error, json_path::JsonPath};

use crate::schema::{ColumnSchema, METADATA_MARKER};

/// Name of the hit member that holds the document body.
pub const BODY_ACCESSOR: &str = "_source";

/// Where a column's value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnPath {
    /// Per-hit metadata (`es._id`, `es._score`, `es._index`).
    Metadata(MetadataField),
    /// A member of the document body. `path` is the full path from the hit,
    /// starting with [`BODY_ACCESSOR`]; `relative` addresses the same member
    /// from the body itself.
    Body { path: JsonPath, relative: JsonPath },
}

impl ColumnPath {
    /// Resolves a column name.
    ///
    /// Names starting with `es.` must name a known metadata field; any other
    /// name is split on unescaped `.` into body keys, so `coords.x` reads
    /// `_source.coords.x` and `a\.b` reads the literal key `a.b`.
    pub fn resolve(name: &str) -> Result<ColumnPath> {
        if let Some(field) = name.strip_prefix(METADATA_MARKER) {
            return MetadataField::from_name(field)
                .map(ColumnPath::Metadata)
                .ok_or_else(|| {
                    Error::config(format!(
                        "column '{name}' uses the reserved '{METADATA_MARKER}' prefix \
                         but '{field}' is not a known metadata field"
                    ))
                });
        }
        let relative = JsonPath::parse(name);
        let path = relative.prefixed(&JsonPath::from_segments([BODY_ACCESSOR]));
        Ok(ColumnPath::Body { path, relative })
    }

    /// The value this column reads from `hit`, or `None` when absent.
    pub fn value<'a>(&self, hit: &'a Hit) -> Option<&'a Value> {
        match self {
            ColumnPath::Metadata(field) => Some(hit.metadata(*field)),
            ColumnPath::Body { relative, .. } => relative.lookup(&hit.source),
        }
    }
}

impl std::fmt::Display for ColumnPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnPath::Metadata(field) => f.write_str(field.name()),
            ColumnPath::Body { path, .. } => path.fmt(f),
        }
    }
}

/// Column paths of a whole schema, in column order.
#[derive(Debug, Clone)]
pub struct ColumnPaths {
    paths: Vec<ColumnPath>,
}

impl ColumnPaths {
    pub fn resolve(schema: &ColumnSchema) -> Result<ColumnPaths> {
        let paths = schema
            .columns()
            .iter()
            .map(|column| ColumnPath::resolve(&column.name))
            .collect::<Result<Vec<_>>>()?;
        Ok(ColumnPaths { paths })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn get(&self, index: usize) -> &ColumnPath {
        &self.paths[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnPath> {
        self.paths.iter()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use shardscan_common::error::ErrorKind;

    use super::*;
    use crate::schema::{ColumnType, ID_COLUMN, INDEX_COLUMN, SCORE_COLUMN};

    fn hit() -> Hit {
        let mut hit = Hit::new(
            "AXr3",
            Some(2.5),
            json!({"name": "Sol", "coords": {"x": 0.0, "y": 1.5}, "a.b": 7}),
        );
        hit.index = json!("edsm");
        hit
    }

    #[test]
    fn test_body_paths() {
        let path = ColumnPath::resolve("coords.x").unwrap();
        assert_eq!(path.to_string(), "_source.coords.x");
        assert_eq!(path.value(&hit()), Some(&json!(0.0)));

        let path = ColumnPath::resolve(r"a\.b").unwrap();
        assert_eq!(path.to_string(), r"_source.a\.b");
        assert_eq!(path.value(&hit()), Some(&json!(7)));

        assert_eq!(ColumnPath::resolve("coords.w").unwrap().value(&hit()), None);
        assert_eq!(ColumnPath::resolve("name.first").unwrap().value(&hit()), None);
    }

    #[test]
    fn test_metadata_paths() {
        let hit = hit();
        let id = ColumnPath::resolve(ID_COLUMN).unwrap();
        assert_eq!(id, ColumnPath::Metadata(MetadataField::Id));
        assert_eq!(id.value(&hit), Some(&json!("AXr3")));
        assert_eq!(
            ColumnPath::resolve(SCORE_COLUMN).unwrap().value(&hit),
            Some(&json!(2.5))
        );
        assert_eq!(
            ColumnPath::resolve(INDEX_COLUMN).unwrap().value(&hit),
            Some(&json!("edsm"))
        );
    }

    #[test]
    fn test_unknown_metadata_column() {
        let err = ColumnPath::resolve("es._routing").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Config { .. }));
    }

    #[test]
    fn test_resolve_schema() {
        let schema = ColumnSchema::new()
            .with_column("name", ColumnType::VarString)
            .unwrap()
            .with_metadata_columns();
        let paths = ColumnPaths::resolve(&schema).unwrap();
        assert_eq!(paths.len(), 3);
        assert_eq!(paths.get(1), &ColumnPath::Metadata(MetadataField::Id));
        assert_eq!(paths.get(2), &ColumnPath::Metadata(MetadataField::Score));
    }
}
