//! Data generation utilities for testing.

use std::io::BufRead;

use serde_json::{Value, json};

/// A document as stored in the scripted cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub source: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, source: Value) -> Document {
        Document {
            id: id.into(),
            source,
        }
    }
}

const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Generates a 20-character identifier shaped like a backend auto-generated id.
pub fn generate_id(rng: &mut fastrand::Rng) -> String {
    (0..20)
        .map(|_| ID_ALPHABET[rng.usize(..ID_ALPHABET.len())] as char)
        .collect()
}

/// Generates `count` star-system documents:
///
/// ```text
/// { "name": "System 17", "coords": { "x": .., "y": .., "z": .. }, "date": "2017-03-04 11:22:33" }
/// ```
///
/// Coordinates are never zero. The output is deterministic for a given `seed`.
pub fn generate_star_systems(count: usize, seed: u64) -> Vec<Document> {
    let mut rng = fastrand::Rng::with_seed(seed);
    (0..count)
        .map(|i| {
            let coord = |rng: &mut fastrand::Rng| {
                let magnitude = 0.5 + rng.f64() * 25_000.0;
                if rng.bool() { magnitude } else { -magnitude }
            };
            let source = json!({
                "name": format!("System {i}"),
                "coords": {
                    "x": coord(&mut rng),
                    "y": coord(&mut rng),
                    "z": coord(&mut rng),
                },
                "date": format!(
                    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    rng.u32(2015..2024),
                    rng.u32(1..13),
                    rng.u32(1..29),
                    rng.u32(0..24),
                    rng.u32(0..60),
                    rng.u32(0..60),
                ),
            });
            Document::new(generate_id(&mut rng), source)
        })
        .collect()
}

/// Splits `documents` into `shard_count` shards using a uniform random routing,
/// deterministic for a given `seed`.
pub fn route_to_shards(
    documents: Vec<Document>,
    shard_count: usize,
    seed: u64,
) -> Vec<Vec<Document>> {
    assert_ne!(shard_count, 0);
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut shards = vec![Vec::new(); shard_count];
    for doc in documents {
        shards[rng.usize(..shard_count)].push(doc);
    }
    shards
}

/// Reads newline-delimited JSON documents. Each line is an object with `_id`
/// and `_source` members; blank lines are skipped.
pub fn read_ndjson_documents(reader: impl BufRead) -> anyhow::Result<Vec<Document>> {
    let mut documents = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line)?;
        let id = value
            .get("_id")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("line {}: missing _id", line_no + 1))?;
        let source = value.get("_source").cloned().unwrap_or(Value::Null);
        documents.push(Document::new(id, source));
    }
    Ok(documents)
}

/// A handful of well-known star systems in NDJSON form; the last one has no
/// `date`.
pub const EDSM_SAMPLE: &str = include_str!("../data/edsm_sample.ndjson");

/// Loads [`EDSM_SAMPLE`].
pub fn load_edsm_sample() -> anyhow::Result<Vec<Document>> {
    read_ndjson_documents(EDSM_SAMPLE.as_bytes())
}
