//! Declarative scan configuration.
//!
//! ```json
//! {
//!   "index": "edsm",
//!   "page_size": 256,
//!   "keep_alive": "5m",
//!   "v7": { "query": { "query": { "match_all": {} } }, "params": { "sort": "_doc" } }
//! }
//! ```

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shardscan_arrow::schema::ColumnSchema;
use shardscan_client::{
    DEFAULT_KEEP_ALIVE, DEFAULT_PAGE_SIZE, ProtocolVersion, SearchClientBuilder, SearchRequest,
    Transport, VersionedClient, time_value,
};
use shardscan_common::{Result, error::Error};

use crate::source::DataSource;

/// Query settings of one protocol generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VersionSection {
    /// Complete search body; a `match_all` query when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,
    /// Additional query-string parameters of the initial search.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl VersionSection {
    pub fn search_request(&self) -> SearchRequest {
        let request = match &self.query {
            Some(body) => SearchRequest::new().with_body(body.clone()),
            None => SearchRequest::match_all(),
        };
        self.params
            .iter()
            .fold(request, |request, (name, value)| {
                request.with_param(name, value)
            })
    }
}

/// Scan configuration: an index, paging settings and exactly one protocol
/// section (`v6`, `v7` or `v8`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    #[serde(default)]
    pub index: String,
    /// Documents per page; zero selects 128.
    #[serde(default)]
    pub page_size: usize,
    /// Scroll keep-alive as a time value (`"10m"`, `"30s"`); absent or zero
    /// selects 10 minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v6: Option<VersionSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v7: Option<VersionSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v8: Option<VersionSection>,
}

impl ScanConfig {
    /// Parses a JSON configuration document.
    pub fn from_json(text: &str) -> Result<ScanConfig> {
        serde_json::from_str(text).map_err(|e| Error::config(format!("invalid scan config: {e}")))
    }

    pub fn page_size(&self) -> usize {
        if self.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.page_size
        }
    }

    pub fn keep_alive(&self) -> Result<Duration> {
        let Some(text) = self.keep_alive.as_deref() else {
            return Ok(DEFAULT_KEEP_ALIVE);
        };
        let keep_alive = time_value::parse(text)
            .map_err(|e| Error::config(format!("invalid keep_alive '{text}': {e}")))?;
        Ok(if keep_alive.is_zero() {
            DEFAULT_KEEP_ALIVE
        } else {
            keep_alive
        })
    }

    /// Configured protocol sections, oldest generation first.
    pub fn sections(&self) -> impl Iterator<Item = (ProtocolVersion, &VersionSection)> {
        [
            (ProtocolVersion::V6, &self.v6),
            (ProtocolVersion::V7, &self.v7),
            (ProtocolVersion::V8, &self.v8),
        ]
        .into_iter()
        .filter_map(|(version, section)| section.as_ref().map(|s| (version, s)))
    }

    /// Builds the search client for the configured protocol generation.
    ///
    /// # Errors
    /// Returns a configuration error when the index is empty or when zero or
    /// several protocol sections are present.
    pub fn build_client(&self, transport: Arc<dyn Transport>) -> Result<VersionedClient> {
        let mut builder = SearchClientBuilder::new()
            .with_transport(transport)
            .with_index(&self.index);
        for (version, section) in self.sections() {
            builder = builder
                .with_protocol(version)
                .with_query(section.search_request());
        }
        builder.build()
    }

    /// Builds a data source scanning the configured index into `schema`.
    pub fn build_data_source(
        &self,
        transport: Arc<dyn Transport>,
        schema: ColumnSchema,
    ) -> Result<Arc<DataSource>> {
        let client = self.build_client(transport)?;
        DataSource::builder()
            .with_client(Arc::new(client))
            .with_schema(schema)
            .with_page_size(self.page_size())
            .with_keep_alive(self.keep_alive()?)
            .build()
    }
}
