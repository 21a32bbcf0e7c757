//! Wire-protocol generations.
//!
//! A [`Dialect`] is a table of request/response field names plus the handful of
//! fixed parameters a protocol generation needs. It renders the four requests
//! of a scan and parses page responses into normalized [`Hit`]s; the scroll
//! state machine itself is shared by all generations.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use shardscan_common::{Result, error::Error, json_path::JsonPath};

use crate::{
    hit::Hit,
    query::SearchRequest,
    time_value,
    transport::{Endpoint, Method, WireRequest},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    V6,
    V7,
    V8,
}

impl ProtocolVersion {
    pub fn dialect(self) -> &'static Dialect {
        match self {
            ProtocolVersion::V6 => &V6,
            ProtocolVersion::V7 => &V7,
            ProtocolVersion::V8 => &V8,
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::V6 => f.write_str("v6"),
            ProtocolVersion::V7 => f.write_str("v7"),
            ProtocolVersion::V8 => f.write_str("v8"),
        }
    }
}

#[derive(Debug)]
pub struct Dialect {
    pub version: ProtocolVersion,

    // Search request.
    pub preference_param: &'static str,
    pub size_param: &'static str,
    pub scroll_param: &'static str,
    pub fixed_search_params: &'static [(&'static str, &'static str)],

    // Scroll and clear-scroll bodies.
    pub scroll_body_keep_alive: &'static str,
    pub scroll_body_id: &'static str,

    // Settings request.
    pub ignore_unavailable_param: &'static str,
    pub shard_count_path: &'static str,

    // Page response.
    pub response_scroll_id: &'static str,
    pub hits_path: &'static str,
    pub id_field: &'static str,
    pub score_field: &'static str,
    pub index_field: &'static str,
    pub source_field: &'static str,
}

pub const V6: Dialect = Dialect {
    version: ProtocolVersion::V6,
    preference_param: "preference",
    size_param: "size",
    scroll_param: "scroll",
    fixed_search_params: &[],
    scroll_body_keep_alive: "scroll",
    scroll_body_id: "scroll_id",
    ignore_unavailable_param: "ignore_unavailable",
    shard_count_path: "settings.index.number_of_shards",
    response_scroll_id: "_scroll_id",
    hits_path: "hits.hits",
    id_field: "_id",
    score_field: "_score",
    index_field: "_index",
    source_field: "_source",
};

pub const V7: Dialect = Dialect {
    version: ProtocolVersion::V7,
    fixed_search_params: &[("rest_total_hits_as_int", "true")],
    ..V6
};

pub const V8: Dialect = Dialect {
    version: ProtocolVersion::V8,
    fixed_search_params: &[("track_total_hits", "false")],
    ..V6
};

/// A parsed page: the continuation token and the hits.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub scroll_id: Option<String>,
    pub hits: Vec<Hit>,
}

impl Dialect {
    /// Whether `name` is one of the query-string parameters set per shard.
    pub fn is_shard_param(&self, name: &str) -> bool {
        [self.preference_param, self.size_param, self.scroll_param].contains(&name)
    }

    pub fn settings_request(&self, index: &str) -> WireRequest {
        WireRequest::new(
            Endpoint::GetSettings,
            Method::Get,
            format!("/{index}/_settings"),
        )
        .with_param(self.ignore_unavailable_param, "true")
    }

    /// Renders the initial search of a scroll session from a per-shard copy of
    /// the query template.
    pub fn search_request(&self, query: &SearchRequest) -> WireRequest {
        let mut request = WireRequest::new(
            Endpoint::Search,
            Method::Post,
            format!("/{}/_search", query.index.join(",")),
        );
        if let Some(preference) = &query.preference {
            request = request.with_param(self.preference_param, preference.clone());
        }
        if let Some(size) = query.size {
            request = request.with_param(self.size_param, size.to_string());
        }
        if let Some(scroll) = query.scroll {
            request = request.with_param(self.scroll_param, time_value::format(scroll));
        }
        for (name, value) in self.fixed_search_params {
            if !query.params.contains_key(*name) {
                request = request.with_param(*name, *value);
            }
        }
        for (name, value) in query.params.iter().filter(|(name, _)| !self.is_shard_param(name)) {
            request = request.with_param(name.clone(), value.clone());
        }
        match &query.body {
            Some(body) => request.with_body(body.clone()),
            None => request,
        }
    }

    pub fn scroll_request(&self, scroll_id: &str, keep_alive: Duration) -> WireRequest {
        let mut body = Map::new();
        body.insert(
            self.scroll_body_keep_alive.to_string(),
            Value::String(time_value::format(keep_alive)),
        );
        body.insert(
            self.scroll_body_id.to_string(),
            Value::String(scroll_id.to_string()),
        );
        WireRequest::new(Endpoint::Scroll, Method::Post, "/_search/scroll")
            .with_body(Value::Object(body))
    }

    pub fn clear_scroll_request(&self, scroll_id: &str) -> WireRequest {
        let mut body = Map::new();
        body.insert(self.scroll_body_id.to_string(), json!([scroll_id]));
        WireRequest::new(Endpoint::ClearScroll, Method::Delete, "/_search/scroll")
            .with_body(Value::Object(body))
    }

    /// Parses a successful search or scroll response body.
    pub fn parse_page(&self, body: &Value) -> Result<Page> {
        let scroll_id = JsonPath::parse(self.response_scroll_id)
            .lookup(body)
            .and_then(Value::as_str)
            .map(str::to_string);
        let hits = JsonPath::parse(self.hits_path)
            .lookup(body)
            .ok_or_else(|| Error::invalid_response("page", format!("missing '{}'", self.hits_path)))?
            .as_array()
            .ok_or_else(|| {
                Error::invalid_response("page", format!("'{}' is not an array", self.hits_path))
            })?;
        let hits = hits
            .iter()
            .map(|hit| self.parse_hit(hit))
            .collect::<Result<Vec<_>>>()?;
        Ok(Page { scroll_id, hits })
    }

    fn parse_hit(&self, hit: &Value) -> Result<Hit> {
        let hit = hit
            .as_object()
            .ok_or_else(|| Error::invalid_response("hit", "hit is not an object"))?;
        let field = |name: &str| hit.get(name).cloned().unwrap_or(Value::Null);
        Ok(Hit {
            id: field(self.id_field),
            score: field(self.score_field),
            index: field(self.index_field),
            source: field(self.source_field),
        })
    }
}
