//! The search request template shared by all shards of one scan.

use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A search request: the query body plus the request-level fields the scan
/// engine fills in per shard.
///
/// The template handed to a client leaves `preference`, `size` and `scroll`
/// unset. Each scroller works on its own `clone()` of the template (the body is
/// an owned JSON tree, so the clone is deep) and sets the shard-specific
/// fields on that copy only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub index: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(skip)]
    pub scroll: Option<Duration>,
    /// Additional query-string parameters (e.g. `sort=_doc`, `_source_includes`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl SearchRequest {
    pub fn new() -> SearchRequest {
        Default::default()
    }

    /// A template matching all documents.
    pub fn match_all() -> SearchRequest {
        SearchRequest::new().with_query(serde_json::json!({ "match_all": {} }))
    }

    /// Sets the complete request body.
    pub fn with_body(self, body: Value) -> Self {
        SearchRequest {
            body: Some(body),
            ..self
        }
    }

    /// Sets the body to `{"query": query}`.
    pub fn with_query(self, query: Value) -> Self {
        self.with_body(serde_json::json!({ "query": query }))
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}
