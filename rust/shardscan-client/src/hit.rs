//! Normalized search hits.

use serde_json::Value;

/// Per-hit metadata the backend reports next to the document body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataField {
    /// Document identifier.
    Id,
    /// Relevance score.
    Score,
    /// Concrete index the hit came from.
    Index,
}

impl MetadataField {
    /// Resolves the canonical metadata name (`_id`, `_score`, `_index`).
    pub fn from_name(name: &str) -> Option<MetadataField> {
        match name {
            "_id" => Some(MetadataField::Id),
            "_score" => Some(MetadataField::Score),
            "_index" => Some(MetadataField::Index),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MetadataField::Id => "_id",
            MetadataField::Score => "_score",
            MetadataField::Index => "_index",
        }
    }
}

/// One matched document, with metadata already mapped from the wire dialect's
/// field names. Absent metadata is `Value::Null`; an absent body is
/// `Value::Null` as well.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: Value,
    pub score: Value,
    pub index: Value,
    pub source: Value,
}

impl Hit {
    pub fn new(id: impl Into<String>, score: Option<f64>, source: Value) -> Hit {
        Hit {
            id: Value::String(id.into()),
            score: score.map_or(Value::Null, Value::from),
            index: Value::Null,
            source,
        }
    }

    pub fn metadata(&self, field: MetadataField) -> &Value {
        match field {
            MetadataField::Id => &self.id,
            MetadataField::Score => &self.score,
            MetadataField::Index => &self.index,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_str()
    }

    pub fn score(&self) -> Option<f64> {
        self.score.as_f64()
    }
}
