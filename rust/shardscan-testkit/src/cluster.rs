//! An in-memory search backend.
//!
//! [`ScriptedCluster`] answers the four requests of a scan the way a real
//! backend does: settings are keyed by index name, searches are pinned with
//! `preference=_shards:<n>`, each scroll page replaces the continuation token
//! (a replaced token is rejected with `search_context_missing_exception`), and
//! clear-scroll frees the session. Every request is recorded for assertions.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::Mutex,
};

use serde_json::{Value, json};
use shardscan_client::{
    CallContext, Endpoint, Transport, WireRequest, WireResponse, time_value,
};
use shardscan_common::{
    Result,
    error::{CancelPhase, Error},
};

use crate::data_gen::Document;

/// A one-shot failure served instead of the next request to an endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    /// Respond with a structured backend error.
    Backend {
        status: u16,
        error_type: String,
        reason: String,
    },
    /// Fail before anything reaches the backend.
    ConnectionRefused,
    /// Process the request, then report the call as cancelled while in flight.
    CancelInFlight,
    /// Process the request, then answer 200 with an unparseable body.
    MalformedBody,
}

impl Fault {
    pub fn backend(status: u16, error_type: &str, reason: &str) -> Fault {
        Fault::Backend {
            status,
            error_type: error_type.to_string(),
            reason: reason.to_string(),
        }
    }
}

struct Session {
    index: String,
    shard: usize,
    position: usize,
    page_size: usize,
    token: String,
    pages: u64,
}

#[derive(Default)]
struct ClusterState {
    indices: BTreeMap<String, Vec<Vec<Document>>>,
    sessions: HashMap<u64, Session>,
    next_session: u64,
    faults: VecDeque<(Endpoint, Fault)>,
    requests: Vec<WireRequest>,
    cleared: Vec<String>,
}

/// In-memory search backend implementing [`Transport`].
#[derive(Default)]
pub struct ScriptedCluster {
    state: Mutex<ClusterState>,
}

impl ScriptedCluster {
    pub fn new() -> ScriptedCluster {
        Default::default()
    }

    /// Creates (or replaces) an index with the given per-shard documents.
    pub fn add_index(&self, name: &str, shards: Vec<Vec<Document>>) {
        assert!(!shards.is_empty(), "an index has at least one shard");
        self.state
            .lock()
            .unwrap()
            .indices
            .insert(name.to_string(), shards);
    }

    /// Queues a fault for the next request to `endpoint`.
    pub fn inject_fault(&self, endpoint: Endpoint, fault: Fault) {
        self.state
            .lock()
            .unwrap()
            .faults
            .push_back((endpoint, fault));
    }

    /// All requests received so far, faulted ones included.
    pub fn requests(&self) -> Vec<WireRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn requests_to(&self, endpoint: Endpoint) -> Vec<WireRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.endpoint == endpoint)
            .collect()
    }

    /// Continuation tokens successfully released by clear-scroll requests.
    pub fn cleared_scroll_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().cleared.clone()
    }

    /// Number of live scroll sessions.
    pub fn open_sessions(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }
}

impl Transport for ScriptedCluster {
    fn send(&self, ctx: &CallContext, request: &WireRequest) -> Result<WireResponse> {
        if ctx.is_done() {
            return Err(Error::cancelled(CancelPhase::BeforeSend));
        }
        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());

        let fault = state
            .faults
            .iter()
            .position(|(endpoint, _)| *endpoint == request.endpoint)
            .and_then(|pos| state.faults.remove(pos))
            .map(|(_, fault)| fault);

        match fault {
            None => Ok(state.handle(request)),
            Some(Fault::Backend {
                status,
                error_type,
                reason,
            }) => Ok(error_response(status, &error_type, &reason)),
            Some(Fault::ConnectionRefused) => Err(Error::transport(
                request.path.clone(),
                "connection refused",
            )),
            Some(Fault::CancelInFlight) => {
                state.handle(request);
                Err(Error::cancelled(CancelPhase::InFlight))
            }
            Some(Fault::MalformedBody) => {
                state.handle(request);
                Ok(WireResponse::new(200, "{\"_scroll_id\": \"trunc"))
            }
        }
    }
}

fn error_response(status: u16, error_type: &str, reason: &str) -> WireResponse {
    let body = json!({
        "error": {
            "root_cause": [{ "type": error_type, "reason": reason }],
            "type": error_type,
            "reason": reason,
        },
        "status": status,
    });
    WireResponse::new(status, body.to_string())
}

impl ClusterState {
    fn handle(&mut self, request: &WireRequest) -> WireResponse {
        match request.endpoint {
            Endpoint::GetSettings => self.get_settings(request),
            Endpoint::Search => self.search(request),
            Endpoint::Scroll => self.scroll(request),
            Endpoint::ClearScroll => self.clear_scroll(request),
        }
    }

    fn get_settings(&self, request: &WireRequest) -> WireResponse {
        let index = index_from_path(&request.path, "_settings");
        let Some(shards) = self.indices.get(index) else {
            return error_response(
                404,
                "index_not_found_exception",
                &format!("no such index [{index}]"),
            );
        };
        let body = json!({
            index: {
                "settings": {
                    "index": {
                        "number_of_shards": shards.len().to_string(),
                        "number_of_replicas": "1",
                        "provided_name": index,
                    }
                }
            }
        });
        WireResponse::new(200, body.to_string())
    }

    fn search(&mut self, request: &WireRequest) -> WireResponse {
        let index = index_from_path(&request.path, "_search").to_string();
        let Some(shard_count) = self.indices.get(&index).map(Vec::len) else {
            return error_response(
                404,
                "index_not_found_exception",
                &format!("no such index [{index}]"),
            );
        };
        let shard = match request
            .param("preference")
            .and_then(|p| p.strip_prefix("_shards:"))
            .map(str::parse::<usize>)
        {
            Some(Ok(shard)) if shard < shard_count => shard,
            _ => {
                return error_response(
                    400,
                    "illegal_argument_exception",
                    "search must be pinned to an existing shard",
                );
            }
        };
        let page_size = request
            .param("size")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(10);
        if request
            .param("scroll")
            .map(time_value::parse)
            .is_none_or(|r| r.is_err())
        {
            return error_response(
                400,
                "illegal_argument_exception",
                "missing or invalid scroll keep-alive",
            );
        }

        let session_id = self.next_session;
        self.next_session += 1;
        let session = Session {
            index,
            shard,
            position: 0,
            page_size,
            token: String::new(),
            pages: 0,
        };
        self.sessions.insert(session_id, session);
        self.next_page(session_id, request.param("rest_total_hits_as_int").is_some())
    }

    fn scroll(&mut self, request: &WireRequest) -> WireResponse {
        let token = request
            .body
            .as_ref()
            .and_then(|b| b.get("scroll_id"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let Some(session_id) = self.find_session(token) else {
            return error_response(
                404,
                "search_context_missing_exception",
                &format!("No search context found for id [{token}]"),
            );
        };
        self.next_page(session_id, true)
    }

    fn clear_scroll(&mut self, request: &WireRequest) -> WireResponse {
        let tokens = request
            .body
            .as_ref()
            .and_then(|b| b.get("scroll_id"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut freed = 0;
        for token in tokens.iter().filter_map(Value::as_str) {
            if let Some(session_id) = self.find_session(token) {
                self.sessions.remove(&session_id);
                self.cleared.push(token.to_string());
                freed += 1;
            }
        }
        let status = if freed == 0 { 404 } else { 200 };
        WireResponse::new(
            status,
            json!({ "succeeded": true, "num_freed": freed }).to_string(),
        )
    }

    fn find_session(&self, token: &str) -> Option<u64> {
        self.sessions
            .iter()
            .find(|(_, session)| session.token == token)
            .map(|(id, _)| *id)
    }

    fn next_page(&mut self, session_id: u64, total_as_int: bool) -> WireResponse {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return error_response(500, "illegal_state_exception", "session vanished");
        };
        let docs = &self.indices[&session.index][session.shard];
        let end = (session.position + session.page_size).min(docs.len());
        let hits = docs[session.position..end]
            .iter()
            .map(|doc| {
                json!({
                    "_index": session.index,
                    "_type": "_doc",
                    "_id": doc.id,
                    "_score": 1.0,
                    "_source": doc.source,
                })
            })
            .collect::<Vec<_>>();
        session.position = end;
        session.pages += 1;
        session.token = format!("scroll-{session_id}-{}", session.pages);

        let total = if total_as_int {
            json!(docs.len())
        } else {
            json!({ "value": docs.len(), "relation": "eq" })
        };
        let body = json!({
            "_scroll_id": session.token,
            "took": 1,
            "timed_out": false,
            "_shards": { "total": 1, "successful": 1, "skipped": 0, "failed": 0 },
            "hits": {
                "total": total,
                "max_score": 1.0,
                "hits": hits,
            },
        });
        WireResponse::new(200, body.to_string())
    }
}

fn index_from_path<'a>(path: &'a str, operation: &str) -> &'a str {
    path.trim_start_matches('/')
        .strip_suffix(operation)
        .map(|p| p.trim_end_matches('/'))
        .unwrap_or_default()
}
