//! Persistence and value-log reclamation tests for the engine

use burrow_core::Error;
use burrow_engine::{Engine, EngineConfig};
use burrow_vlog::SyncMode;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

/// Small enough that every 100-byte write lands in its own segment
const TINY_SEGMENT: u64 = 256;

fn open_tiny(dir: &Path) -> Engine {
    let config = EngineConfig::new(dir)
        .with_max_segment_size(TINY_SEGMENT)
        .with_sync_mode(SyncMode::Sync);
    Engine::open(config).expect("Failed to open engine")
}

fn value(tag: u8) -> Vec<u8> {
    vec![tag; 100]
}

fn set(engine: &Engine, key: &[u8], value: &[u8]) {
    engine
        .update(|txn| txn.set(key, value))
        .expect("Failed to set");
}

fn get(engine: &Engine, key: &[u8]) -> Result<Vec<u8>, Error> {
    engine.view(|txn| txn.get(key))
}

#[test]
fn test_data_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = open_tiny(temp_dir.path());
        set(&engine, b"a", b"1");
        set(&engine, b"b", b"2");
        engine.update(|txn| txn.delete(b"a")).unwrap();
        engine.close().unwrap();
    }

    let engine = open_tiny(temp_dir.path());
    assert!(get(&engine, b"a").unwrap_err().is_key_not_found());
    assert_eq!(get(&engine, b"b").unwrap(), b"2");
    assert_eq!(engine.committed_ts(), 3);

    // Timestamps keep increasing after a restart.
    set(&engine, b"c", b"3");
    assert_eq!(engine.committed_ts(), 4);
}

#[test]
fn test_torn_tail_is_ignored() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = open_tiny(temp_dir.path());
        set(&engine, b"k", b"v");
        engine.close().unwrap();
    }

    let vlog_dir = temp_dir.path().join("vlog");
    let mut segments: Vec<_> = std::fs::read_dir(&vlog_dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    segments.sort();
    let last = segments.last().unwrap();
    let mut file = OpenOptions::new().append(true).open(last).unwrap();
    file.write_all(&[0x40, 0, 0, 0, 1, 0xde, 0xad]).unwrap();
    drop(file);

    let engine = open_tiny(temp_dir.path());
    assert_eq!(get(&engine, b"k").unwrap(), b"v");
    set(&engine, b"k2", b"v2");
    engine.close().unwrap();

    let engine = open_tiny(temp_dir.path());
    assert_eq!(get(&engine, b"k2").unwrap(), b"v2");
}

#[test]
fn test_gc_drains_superseded_segments() {
    let temp_dir = TempDir::new().unwrap();
    let engine = open_tiny(temp_dir.path());

    for tag in 0..6 {
        set(&engine, b"hot", &value(tag));
    }
    let (_, before) = engine.size().unwrap();

    let mut reclaimed = 0;
    while let Some(stats) = engine.run_value_log_gc(0.5).unwrap() {
        assert_eq!(stats.records_rewritten, 0);
        reclaimed += 1;
    }
    assert_eq!(reclaimed, 5);
    assert_eq!(engine.run_value_log_gc(0.5).unwrap(), None);

    let (_, after) = engine.size().unwrap();
    assert!(after < before);
    assert_eq!(get(&engine, b"hot").unwrap(), value(5));

    engine.close().unwrap();
    let engine = open_tiny(temp_dir.path());
    assert_eq!(get(&engine, b"hot").unwrap(), value(5));
}

#[test]
fn test_gc_rewrites_live_records() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = open_tiny(temp_dir.path());
        engine
            .update(|txn| {
                txn.set(b"x", &value(1))?;
                txn.set(b"y", &value(1))
            })
            .unwrap();
        set(&engine, b"x", &value(2));
        set(&engine, b"z", &value(3));

        // Half of the first segment is stale, the rest of the log is live.
        assert_eq!(engine.reclaimable_segments(0.4).unwrap().len(), 1);
        let stats = engine.run_value_log_gc(0.4).unwrap().expect("segment reclaimed");
        assert_eq!(stats.records_rewritten, 1);
        assert!(stats.bytes_reclaimed > 0);

        assert_eq!(get(&engine, b"y").unwrap(), value(1));
        engine.close().unwrap();
    }

    let engine = open_tiny(temp_dir.path());
    assert_eq!(get(&engine, b"x").unwrap(), value(2));
    assert_eq!(get(&engine, b"y").unwrap(), value(1));
    assert_eq!(get(&engine, b"z").unwrap(), value(3));
}

#[test]
fn test_gc_drops_tombstones_in_oldest_segment() {
    let temp_dir = TempDir::new().unwrap();
    {
        let engine = open_tiny(temp_dir.path());
        set(&engine, b"gone", &value(1));
        engine
            .update(|txn| {
                txn.delete(b"gone")?;
                txn.set(b"q", &value(2))
            })
            .unwrap();
        set(&engine, b"q", &value(3));
        set(&engine, b"z", &value(4));

        let first = engine.run_value_log_gc(0.5).unwrap().expect("first segment");
        assert_eq!(first.tombstones_dropped, 0);
        let second = engine.run_value_log_gc(0.5).unwrap().expect("second segment");
        assert_eq!(second.tombstones_dropped, 1);
        assert_eq!(second.records_rewritten, 0);
        engine.close().unwrap();
    }

    let engine = open_tiny(temp_dir.path());
    assert!(get(&engine, b"gone").unwrap_err().is_key_not_found());
    assert_eq!(get(&engine, b"q").unwrap(), value(3));
}

#[test]
fn test_reclaimed_tombstone_released_with_last_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let engine = open_tiny(temp_dir.path());
    set(&engine, b"gone", &value(1));

    let snapshot = engine.begin_read().unwrap();
    engine
        .update(|txn| {
            txn.delete(b"gone")?;
            txn.set(b"q", &value(2))
        })
        .unwrap();
    set(&engine, b"q", &value(3));
    set(&engine, b"z", &value(4));

    engine.run_value_log_gc(0.5).unwrap().expect("first segment");
    let second = engine.run_value_log_gc(0.5).unwrap().expect("second segment");
    assert_eq!(second.tombstones_dropped, 1);
    assert_eq!(snapshot.get(b"gone").unwrap(), value(1));

    let (held, _) = engine.size().unwrap();
    drop(snapshot);
    let (released, _) = engine.size().unwrap();
    assert!(released < held, "{released} >= {held}");
    assert!(get(&engine, b"gone").unwrap_err().is_key_not_found());
    engine.close().unwrap();

    let engine = open_tiny(temp_dir.path());
    assert!(get(&engine, b"gone").unwrap_err().is_key_not_found());
    assert_eq!(get(&engine, b"z").unwrap(), value(4));
}

#[test]
fn test_gc_keeps_versions_for_open_snapshots() {
    let temp_dir = TempDir::new().unwrap();
    let engine = open_tiny(temp_dir.path());
    set(&engine, b"k", &value(1));

    let snapshot = engine.begin_read().unwrap();
    set(&engine, b"k", &value(2));
    set(&engine, b"other", &value(3));

    while engine.run_value_log_gc(0.5).unwrap().is_some() {}
    assert_eq!(snapshot.get(b"k").unwrap(), value(1));
    drop(snapshot);
    assert_eq!(get(&engine, b"k").unwrap(), value(2));
}

fn bytes_on_disk(dir: &Path) -> u64 {
    std::fs::read_dir(dir.join("vlog"))
        .unwrap()
        .map(|entry| entry.unwrap().metadata().unwrap().len())
        .sum()
}

#[test]
fn test_reported_vlog_size_matches_disk() {
    let temp_dir = TempDir::new().unwrap();
    let engine = open_tiny(temp_dir.path());
    for i in 0..6u8 {
        set(&engine, b"hot", &value(i));
    }
    assert!(engine.value_log_usage().unwrap().len() > 1);
    assert_eq!(engine.size().unwrap().1, bytes_on_disk(temp_dir.path()));

    while engine.run_value_log_gc(0.5).unwrap().is_some() {}
    assert_eq!(engine.size().unwrap().1, bytes_on_disk(temp_dir.path()));
}
