use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use arrow_array::{Array, Float32Array, Float64Array, StringArray, TimestampNanosecondArray};
use serde_json::json;
use shardscan::{
    CallContext, ColumnSchema, ColumnType, DataSource, Partition, ScanConfig, ScanSummary,
    arrow::schema::{ID_COLUMN, INDEX_COLUMN, SCORE_COLUMN},
    client::{Endpoint, Transport},
    common::error::{Error, ErrorKind},
};
use shardscan_testkit::{
    cluster::{Fault, ScriptedCluster},
    data_gen::{Document, generate_star_systems, load_edsm_sample, route_to_shards},
};

const PAGE_SIZE: usize = 128;

fn star_schema() -> ColumnSchema {
    ColumnSchema::new()
        .with_column("name", ColumnType::VarString)
        .unwrap()
        .with_column("coords.x", ColumnType::Float64)
        .unwrap()
        .with_column("coords.y", ColumnType::Float64)
        .unwrap()
        .with_column("coords.z", ColumnType::Float64)
        .unwrap()
        .with_column(
            "date",
            ColumnType::Time {
                format: "%Y-%m-%d %H:%M:%S".to_string(),
            },
        )
        .unwrap()
}

fn data_source(cluster: &Arc<ScriptedCluster>, config: &str) -> Arc<DataSource> {
    let transport: Arc<dyn Transport> = cluster.clone();
    ScanConfig::from_json(config)
        .unwrap()
        .build_data_source(transport, star_schema())
        .unwrap()
}

/// The edsm fixture: 1000 star systems routed over 4 shards.
fn edsm() -> (Arc<ScriptedCluster>, Vec<usize>, Arc<DataSource>) {
    let shards = route_to_shards(generate_star_systems(1000, 42), 4, 7);
    let sizes = shards.iter().map(Vec::len).collect();
    let cluster = Arc::new(ScriptedCluster::new());
    cluster.add_index("edsm", shards);
    let source = data_source(&cluster, r#"{"index": "edsm", "v7": {}}"#);
    (cluster, sizes, source)
}

fn string_values(partition: &Partition, column: &str) -> Vec<String> {
    partition
        .column(column)
        .unwrap()
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap()
        .iter()
        .map(|v| v.unwrap().to_string())
        .collect()
}

#[test]
fn test_edsm_scan_reads_every_document_once() {
    let (cluster, sizes, source) = edsm();
    let ctx = CallContext::background();
    let mut enumerator = source.analyze(&ctx).unwrap();
    assert_eq!(enumerator.shard_count(), 4);

    let mut ids = HashSet::new();
    let mut rows = 0;
    let mut shard = 0;
    while enumerator.has_next() {
        let handle = enumerator.next_handle().unwrap();
        assert_eq!(handle.shard(), shard);
        let iterator = handle.load();
        let mut pages = 0;
        for partition in iterator.partitions(&ctx) {
            let partition = partition.unwrap();
            assert!(partition.num_rows() <= PAGE_SIZE);
            assert_eq!(partition.shard(), shard);
            assert_eq!(partition.ordinal(), pages);
            rows += partition.num_rows();
            ids.extend(string_values(&partition, ID_COLUMN));
            pages += 1;
        }
        let expected_pages = sizes[shard as usize].div_ceil(PAGE_SIZE) + 1;
        assert_eq!(pages as usize, expected_pages, "shard {shard}");
        assert!(!iterator.has_next_partition());
        shard += 1;
    }

    assert_eq!(shard, 4);
    assert_eq!(rows, 1000);
    assert_eq!(ids.len(), 1000);
    assert!(enumerator.next_handle().is_none());
    assert_eq!(cluster.open_sessions(), 0);
    assert_eq!(cluster.cleared_scroll_ids().len(), 4);
}

#[test]
fn test_edsm_sample_values() {
    let cluster = Arc::new(ScriptedCluster::new());
    cluster.add_index("edsm", vec![load_edsm_sample().unwrap()]);
    let source = data_source(&cluster, r#"{"index": "edsm", "page_size": 4, "v8": {}}"#);
    let ctx = CallContext::background();

    let partitions = source
        .shard_handle(0)
        .load()
        .partitions(&ctx)
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let rows = partitions.iter().map(Partition::num_rows).collect::<Vec<_>>();
    assert_eq!(rows, [4, 2, 0]);

    let names = partitions
        .iter()
        .flat_map(|p| string_values(p, "name"))
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        [
            "Sol",
            "Alpha Centauri",
            "Achenar",
            "Sagittarius A*",
            "Colonia",
            "Beagle Point"
        ]
    );
    assert_eq!(string_values(&partitions[1], ID_COLUMN), ["2578", "10593"]);

    let z = partitions[1]
        .column("coords.z")
        .unwrap()
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    assert_eq!(z.value(1), 65269.75);
    let date = partitions[1]
        .column("date")
        .unwrap()
        .as_any()
        .downcast_ref::<TimestampNanosecondArray>()
        .unwrap();
    assert!(date.is_valid(0));
    assert!(date.is_null(1));
}

#[test]
fn test_enumerator_is_an_iterator() {
    let (_, _, source) = edsm();
    let handles = source
        .analyze(&CallContext::background())
        .unwrap()
        .map(|h| h.shard())
        .collect::<Vec<_>>();
    assert_eq!(handles, [0, 1, 2, 3]);
}

#[test]
fn test_partition_after_last_is_exhausted() {
    let (cluster, _, source) = edsm();
    let ctx = CallContext::background();
    let iterator = source.shard_handle(2).load();
    while iterator.has_next_partition() {
        iterator.next_partition(&ctx).unwrap();
    }
    let request_count = cluster.requests().len();
    let err = iterator.next_partition(&ctx).unwrap_err();
    assert!(err.is_exhausted());
    assert_eq!(cluster.requests().len(), request_count);
}

#[test]
fn test_handle_round_trip() {
    let (_, _, source) = edsm();
    for shard in [0, 1, u32::MAX as u64, i64::MAX as u64, u64::MAX] {
        let bytes = source.shard_handle(shard).serialize();
        assert_eq!(bytes.len(), 8);
        assert_eq!(bytes, shard.to_le_bytes());
        let handle = source.deserialize_handle(&bytes).unwrap();
        assert_eq!(handle.shard(), shard);
    }
    assert_eq!(source.shard_handle(3).to_string(), "search shard loader: 3");
}

#[test]
fn test_deserialized_handle_loads_the_same_shard() {
    let (_, sizes, source) = edsm();
    let ctx = CallContext::background();
    let bytes = source.shard_handle(1).serialize();

    // A second data source, as built by another worker from the same config.
    let (_, _, other) = edsm();
    let handle = other.deserialize_handle(&bytes).unwrap();
    let rows = handle
        .load()
        .partitions(&ctx)
        .map(|p| p.unwrap().num_rows())
        .sum::<usize>();
    assert_eq!(rows, sizes[1]);
}

#[test]
fn test_reserved_columns_and_body_paths() {
    let cluster = Arc::new(ScriptedCluster::new());
    cluster.add_index(
        "stars",
        vec![vec![
            Document::new(
                "sol",
                json!({"name": "Sol", "coords": {"x": 0.0, "y": 0.0, "z": 0.0}, "date": "2015-05-12 15:29:33"}),
            ),
            Document::new("achenar", json!({"name": "Achenar", "coords": {"x": 67.5}})),
        ]],
    );
    let transport: Arc<dyn Transport> = cluster.clone();
    let schema = star_schema()
        .with_column(INDEX_COLUMN, ColumnType::String { max_len: 64 })
        .unwrap();
    let source = ScanConfig::from_json(r#"{"index": "stars", "v8": {}}"#)
        .unwrap()
        .build_data_source(transport, schema)
        .unwrap();

    let partition = source
        .shard_handle(0)
        .load()
        .next_partition(&CallContext::background())
        .unwrap();
    assert_eq!(partition.num_rows(), 2);
    assert_eq!(partition.schema().fields().len(), 8);

    assert_eq!(string_values(&partition, ID_COLUMN), ["sol", "achenar"]);
    assert_eq!(string_values(&partition, INDEX_COLUMN), ["stars", "stars"]);
    let scores = partition
        .column(SCORE_COLUMN)
        .unwrap()
        .as_any()
        .downcast_ref::<Float32Array>()
        .unwrap();
    assert_eq!(scores.value(1), 1.0);

    let x = partition
        .column("coords.x")
        .unwrap()
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    assert_eq!(x.value(0), 0.0);
    assert_eq!(x.value(1), 67.5);

    let y = partition.column("coords.y").unwrap();
    assert!(y.is_valid(0));
    assert!(y.is_null(1));

    let date = partition
        .column("date")
        .unwrap()
        .as_any()
        .downcast_ref::<TimestampNanosecondArray>()
        .unwrap();
    assert_eq!(date.value(0), 1_431_444_573_000_000_000);
    assert!(date.is_null(1));
}

#[test]
fn test_unparsable_time_fails_partition_and_keeps_session() {
    let cluster = Arc::new(ScriptedCluster::new());
    let mut docs = generate_star_systems(300, 3);
    docs[5].source["date"] = json!("not-a-date");
    cluster.add_index("edsm", vec![docs]);
    let source = data_source(&cluster, r#"{"index": "edsm", "page_size": 128, "v7": {}}"#);
    let ctx = CallContext::background();

    let iterator = source.shard_handle(0).load();
    let err = iterator.next_partition(&ctx).unwrap_err();
    match err.into_kind() {
        ErrorKind::Coercion {
            column,
            expected,
            raw,
        } => {
            assert_eq!(column, "date");
            assert_eq!(expected, "time with format %Y-%m-%d %H:%M:%S");
            assert_eq!(raw, "\"not-a-date\"");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(iterator.has_next_partition());
    assert_eq!(cluster.open_sessions(), 1);

    let mut rows = 0;
    while iterator.has_next_partition() {
        rows += iterator.next_partition(&ctx).unwrap().num_rows();
    }
    assert_eq!(rows, 300 - 128);
    assert!(iterator.next_partition(&ctx).unwrap_err().is_exhausted());
    assert_eq!(cluster.open_sessions(), 0);
}

#[test]
fn test_closed_iterator_reports_aborted() {
    let (cluster, _, source) = edsm();
    let ctx = CallContext::background();
    let iterator = source.shard_handle(0).load();
    iterator.next_partition(&ctx).unwrap();
    assert_eq!(cluster.open_sessions(), 1);

    iterator.close();
    assert!(!iterator.has_next_partition());
    assert_eq!(cluster.open_sessions(), 0);
    let err = iterator.next_partition(&ctx).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Aborted { .. }));
    assert!(!err.is_exhausted());

    let mut partitions = iterator.partitions(&ctx);
    assert!(partitions.next().is_none());
}

#[test]
fn test_backend_error_is_retryable_without_losing_rows() {
    let (cluster, sizes, source) = edsm();
    let ctx = CallContext::background();
    let iterator = source.shard_handle(0).load();
    let mut rows = iterator.next_partition(&ctx).unwrap().num_rows();

    cluster.inject_fault(
        Endpoint::Scroll,
        Fault::backend(503, "unavailable_shards_exception", "primary shard is not active"),
    );
    let err = iterator.next_partition(&ctx).unwrap_err();
    assert!(err.is_retryable());
    assert!(iterator.has_next_partition());

    while iterator.has_next_partition() {
        rows += iterator.next_partition(&ctx).unwrap().num_rows();
    }
    assert_eq!(rows, sizes[0]);
}

#[test]
fn test_concurrent_next_partition_is_serialized() {
    let (_, sizes, source) = edsm();
    let iterator = source.shard_handle(3).load();
    let collected = Mutex::new(Vec::new());

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                let ctx = CallContext::background();
                loop {
                    match iterator.next_partition(&ctx) {
                        Ok(partition) => collected
                            .lock()
                            .unwrap()
                            .push((partition.ordinal(), partition.num_rows())),
                        Err(e) if e.is_exhausted() => break,
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
            });
        }
    });

    let mut collected = collected.into_inner().unwrap();
    collected.sort();
    let ordinals = collected.iter().map(|(o, _)| *o).collect::<Vec<_>>();
    assert_eq!(ordinals, (0..collected.len() as u64).collect::<Vec<_>>());
    assert_eq!(collected.iter().map(|(_, n)| n).sum::<usize>(), sizes[3]);
    assert_eq!(iterator.partitions_produced(), collected.len() as u64);
}

#[test]
fn test_record_batch_reader_skips_terminating_partition() {
    let (_, sizes, source) = edsm();
    let reader = source.shard_handle(1).record_batch_reader(CallContext::background());
    let schema = arrow_array::RecordBatchReader::schema(&reader);
    let batches = reader.collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(batches.len(), sizes[1].div_ceil(PAGE_SIZE));
    assert!(batches.iter().all(|b| b.num_rows() > 0 && b.schema() == schema));
    assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), sizes[1]);
}

#[test]
fn test_scan_parallel() {
    let (cluster, sizes, source) = edsm();
    let received = Mutex::new(Vec::new());
    let summary = source
        .scan_parallel(&CallContext::background(), 2, |partition| {
            received
                .lock()
                .unwrap()
                .push((partition.shard(), partition.num_rows()));
            Ok(())
        })
        .unwrap();

    let expected_partitions = sizes
        .iter()
        .map(|n| n.div_ceil(PAGE_SIZE) as u64 + 1)
        .sum::<u64>();
    assert_eq!(
        summary,
        ScanSummary {
            shards: 4,
            partitions: expected_partitions,
            rows: 1000,
        }
    );
    let received = received.into_inner().unwrap();
    assert_eq!(received.len() as u64, expected_partitions);
    for (shard, size) in sizes.iter().enumerate() {
        let rows = received
            .iter()
            .filter(|(s, _)| *s == shard as u64)
            .map(|(_, n)| n)
            .sum::<usize>();
        assert_eq!(rows, *size);
    }
    assert_eq!(cluster.open_sessions(), 0);
}

#[test]
fn test_scan_parallel_stops_at_sink_error() {
    let (cluster, _, source) = edsm();
    let err = source
        .scan_parallel(&CallContext::background(), 4, |_| {
            Err(Error::invalid_operation("sink is full"))
        })
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidOperation { .. }));
    assert_eq!(cluster.open_sessions(), 0);
}

#[test]
fn test_missing_index_fails_analyze() {
    let cluster = Arc::new(ScriptedCluster::new());
    let source = data_source(&cluster, r#"{"index": "missing", "v6": {}}"#);
    let err = source.analyze(&CallContext::background()).err().unwrap();
    assert!(matches!(err.kind(), ErrorKind::Backend { status: 404, .. }));
}

#[test]
fn test_dotted_index_name() {
    let cluster = Arc::new(ScriptedCluster::new());
    cluster.add_index(
        "logs.2024.01",
        route_to_shards(generate_star_systems(40, 9), 3, 1),
    );
    let source = data_source(
        &cluster,
        r#"{"index": "logs.2024.01", "page_size": 16, "keep_alive": "1m", "v6": {}}"#,
    );
    let summary = source
        .scan_parallel(&CallContext::background(), 3, |_| Ok(()))
        .unwrap();
    assert_eq!(summary.shards, 3);
    assert_eq!(summary.rows, 40);
    assert!(
        cluster
            .requests_to(Endpoint::Search)
            .iter()
            .all(|r| r.param("size") == Some("16") && r.param("scroll") == Some("1m"))
    );
}
