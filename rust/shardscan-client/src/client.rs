//! The version-parameterized [`SearchClient`] implementation.

use std::sync::Arc;

use shardscan_common::{Result, error::Error, verify_config};

use crate::{
    DocumentScroller, ScrollParams, SearchClient,
    context::CallContext,
    dialect::{Dialect, ProtocolVersion},
    query::SearchRequest,
    scroller::ShardScroller,
    settings,
    transport::Transport,
};

/// A [`SearchClient`] speaking one protocol generation over a [`Transport`].
pub struct VersionedClient {
    transport: Arc<dyn Transport>,
    dialect: &'static Dialect,
    query: Arc<SearchRequest>,
    index: String,
}

impl VersionedClient {
    /// Creates a client bound to `index` and the `query` template.
    ///
    /// # Errors
    /// Returns a configuration error if `index` is empty or if the template
    /// carries a parameter that is set per shard (`preference`, `size`,
    /// `scroll`).
    pub fn try_new(
        transport: Arc<dyn Transport>,
        version: ProtocolVersion,
        mut query: SearchRequest,
        index: impl Into<String>,
    ) -> Result<VersionedClient> {
        let index = index.into();
        verify_config!(!index.is_empty(), "must specify an index name");
        let dialect = version.dialect();
        if let Some(name) = query.params.keys().find(|name| dialect.is_shard_param(name)) {
            return Err(Error::config(format!(
                "query parameter '{name}' is set per shard and cannot be configured"
            )));
        }
        query.index = vec![index.clone()];
        Ok(VersionedClient {
            transport,
            dialect,
            query: Arc::new(query),
            index,
        })
    }

    pub fn version(&self) -> ProtocolVersion {
        self.dialect.version
    }

    pub fn dialect(&self) -> &'static Dialect {
        self.dialect
    }
}

impl SearchClient for VersionedClient {
    fn index(&self) -> &str {
        &self.index
    }

    fn get_shard_count(&self, ctx: &CallContext) -> Result<u64> {
        ctx.check()?;
        let request = self.dialect.settings_request(&self.index);
        let response = self.transport.send(ctx, &request)?;
        if response.is_error() {
            return Err(response.to_backend_error());
        }
        let body = response.json("index settings")?;
        let count = settings::read_shard_count(&self.index, self.dialect.shard_count_path, &body)?;
        log::debug!(
            "index '{}' has {count} shards ({})",
            self.index,
            self.dialect.version
        );
        Ok(count)
    }

    fn create_scroller(&self, params: ScrollParams) -> Box<dyn DocumentScroller> {
        // The template is shared by every shard of the index: the scroller gets
        // its own copy before any shard-specific field is set.
        let query = SearchRequest::clone(&self.query);
        Box::new(ShardScroller::new(
            self.transport.clone(),
            self.dialect,
            query,
            params,
        ))
    }
}

/// Builder for a [`VersionedClient`], validating the configuration at
/// [`build`](SearchClientBuilder::build) time.
#[derive(Default, Clone)]
pub struct SearchClientBuilder {
    transport: Option<Arc<dyn Transport>>,
    versions: Vec<ProtocolVersion>,
    query: Option<SearchRequest>,
    index: Option<String>,
}

impl SearchClientBuilder {
    pub fn new() -> SearchClientBuilder {
        Default::default()
    }

    pub fn with_transport(self, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport: Some(transport),
            ..self
        }
    }

    /// Selects the protocol generation. Selecting two different generations
    /// is a configuration error reported by `build`.
    pub fn with_protocol(mut self, version: ProtocolVersion) -> Self {
        if !self.versions.contains(&version) {
            self.versions.push(version);
        }
        self
    }

    pub fn with_query(self, query: SearchRequest) -> Self {
        Self {
            query: Some(query),
            ..self
        }
    }

    pub fn with_index(self, index: impl Into<String>) -> Self {
        Self {
            index: Some(index.into()),
            ..self
        }
    }

    /// # Errors
    /// Returns a configuration error if the transport, protocol version, query
    /// or index is missing, or if conflicting protocol versions were selected.
    pub fn build(self) -> Result<VersionedClient> {
        let version = match self.versions.as_slice() {
            [] => return Err(Error::config("must specify a protocol version")),
            [version] => *version,
            [first, second, ..] => {
                return Err(Error::config(format!(
                    "cannot specify {first} and {second} protocol versions simultaneously"
                )));
            }
        };
        let transport = self
            .transport
            .ok_or_else(|| Error::config("must specify a transport"))?;
        let query = self
            .query
            .ok_or_else(|| Error::config(format!("must specify a {version} query")))?;
        VersionedClient::try_new(
            transport,
            version,
            query,
            self.index.unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{WireRequest, WireResponse};
    use shardscan_common::error::ErrorKind;

    struct Unreachable;

    impl Transport for Unreachable {
        fn send(&self, _ctx: &CallContext, _request: &WireRequest) -> Result<WireResponse> {
            Err(Error::transport("unreachable", "connection refused"))
        }
    }

    fn is_config_error(result: Result<VersionedClient>) -> bool {
        matches!(
            result.map(|_| ()).unwrap_err().kind(),
            ErrorKind::Config { .. }
        )
    }

    #[test]
    fn test_builder_requires_index() {
        let result = SearchClientBuilder::new()
            .with_transport(Arc::new(Unreachable))
            .with_protocol(ProtocolVersion::V7)
            .with_query(SearchRequest::match_all())
            .build();
        assert!(is_config_error(result));
    }

    #[test]
    fn test_builder_rejects_conflicting_versions() {
        let result = SearchClientBuilder::new()
            .with_transport(Arc::new(Unreachable))
            .with_protocol(ProtocolVersion::V6)
            .with_protocol(ProtocolVersion::V7)
            .with_query(SearchRequest::match_all())
            .with_index("edsm")
            .build();
        assert!(is_config_error(result));
    }

    #[test]
    fn test_builder_requires_version_and_query() {
        let result = SearchClientBuilder::new()
            .with_transport(Arc::new(Unreachable))
            .with_query(SearchRequest::match_all())
            .with_index("edsm")
            .build();
        assert!(is_config_error(result));

        let result = SearchClientBuilder::new()
            .with_transport(Arc::new(Unreachable))
            .with_protocol(ProtocolVersion::V8)
            .with_index("edsm")
            .build();
        assert!(is_config_error(result));
    }

    #[test]
    fn test_repeating_same_version_is_fine() {
        let client = SearchClientBuilder::new()
            .with_transport(Arc::new(Unreachable))
            .with_protocol(ProtocolVersion::V8)
            .with_protocol(ProtocolVersion::V8)
            .with_query(SearchRequest::match_all())
            .with_index("edsm")
            .build()
            .unwrap();
        assert_eq!(client.version(), ProtocolVersion::V8);
        assert_eq!(client.index(), "edsm");
    }

    #[test]
    fn test_rejects_shard_params_in_template() {
        for name in ["size", "preference", "scroll"] {
            let result = VersionedClient::try_new(
                Arc::new(Unreachable),
                ProtocolVersion::V7,
                SearchRequest::match_all().with_param(name, "1"),
                "edsm",
            );
            assert!(is_config_error(result), "{name}");
        }
        let result = VersionedClient::try_new(
            Arc::new(Unreachable),
            ProtocolVersion::V7,
            SearchRequest::match_all().with_param("sort", "_doc"),
            "edsm",
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_transport_failure_surfaces() {
        let client = VersionedClient::try_new(
            Arc::new(Unreachable),
            ProtocolVersion::V7,
            SearchRequest::match_all(),
            "edsm",
        )
        .unwrap();
        let err = client
            .get_shard_count(&CallContext::background())
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Transport { .. }));
    }
}
