//! The wire-client boundary.
//!
//! A [`Transport`] executes fully-formed [`WireRequest`]s against the search
//! backend and returns the raw response. Everything protocol-specific (paths,
//! parameter names, body shapes) is decided before the request reaches the
//! transport, by the [`Dialect`](crate::Dialect).

use std::fmt;

use serde_json::Value;
use shardscan_common::{Result, error::Error, json_path::JsonPath};

use crate::context::CallContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
            Method::Delete => f.write_str("DELETE"),
        }
    }
}

/// The four backend operations the scan engine issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    GetSettings,
    Search,
    Scroll,
    ClearScroll,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::GetSettings => f.write_str("get settings"),
            Endpoint::Search => f.write_str("search"),
            Endpoint::Scroll => f.write_str("scroll"),
            Endpoint::ClearScroll => f.write_str("clear scroll"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    pub endpoint: Endpoint,
    pub method: Method,
    /// Absolute path, e.g. `/edsm/_search`.
    pub path: String,
    /// Query-string parameters, in insertion order.
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl WireRequest {
    pub fn new(endpoint: Endpoint, method: Method, path: impl Into<String>) -> WireRequest {
        WireRequest {
            endpoint,
            method,
            path: path.into(),
            params: Vec::new(),
            body: None,
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn with_body(self, body: Value) -> Self {
        WireRequest {
            body: Some(body),
            ..self
        }
    }

    /// Returns the value of the first parameter named `name`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    pub status: u16,
    pub body: String,
}

impl WireResponse {
    pub fn new(status: u16, body: impl Into<String>) -> WireResponse {
        WireResponse {
            status,
            body: body.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        !(200..300).contains(&self.status)
    }

    /// Parses the body as JSON.
    pub fn json(&self, context: &str) -> Result<Value> {
        serde_json::from_str(&self.body)
            .map_err(|e| Error::invalid_response(context, format!("malformed JSON body: {e}")))
    }

    /// Builds the backend error for a non-success response, keeping the
    /// status, `error.type` and `error.reason` verbatim.
    pub fn to_backend_error(&self) -> Error {
        let body = serde_json::from_str::<Value>(&self.body).unwrap_or(Value::Null);
        let text = |path: &str| {
            JsonPath::parse(path)
                .lookup(&body)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        match body.get("error") {
            Some(Value::String(reason)) => Error::backend(self.status, "", reason.clone()),
            Some(_) => Error::backend(self.status, text("error.type"), text("error.reason")),
            None => Error::backend(self.status, "", self.body.trim()),
        }
    }
}

/// A blocking wire client for the search backend.
///
/// Implementations report connection-level failures as `Transport` errors.
/// When the [`CallContext`] is cancelled or expires after the request was
/// written, they return `Cancelled { phase: InFlight }`.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, ctx: &CallContext, request: &WireRequest) -> Result<WireResponse>;
}
