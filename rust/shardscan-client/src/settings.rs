//! Shard-count discovery from an index settings response.

use serde_json::Value;
use shardscan_common::{
    Result,
    error::Error,
    json_path::{self, JsonPath},
};

/// Extracts the primary shard count of `index` from a settings response.
///
/// The settings response is keyed by index name, so `index` is escaped before
/// being embedded in the lookup path: `logs.2024.*` must address the key
/// `logs.2024.*`, not a nested `logs` / `2024` / `*` traversal.
pub fn read_shard_count(index: &str, shard_count_path: &str, body: &Value) -> Result<u64> {
    let path = JsonPath::parse(&format!("{}.{shard_count_path}", json_path::escape(index)));
    let value = path.lookup(body).ok_or_else(|| {
        Error::invalid_response(
            "index settings",
            format!("no '{shard_count_path}' for index '{index}'"),
        )
    })?;
    let count = match value {
        Value::String(s) => s.trim().parse::<u64>().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    };
    count.ok_or_else(|| {
        Error::invalid_response(
            "index settings",
            format!("shard count of index '{index}' is not a non-negative integer: {value}"),
        )
    })
}
