// Integration tests for the store facade

mod common;

use burrow::keys::MAX_VALUE_SIZE;
use burrow::{CompositeKey, ErrorKind, Store};
use common::{ErrorLog, StoreFixture};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_set_get_delete() {
    let store = Store::in_memory().unwrap();

    store.set(b"1", b"1").unwrap();
    store.set(b"2", b"2").unwrap();
    assert_eq!(store.get(b"1").unwrap(), b"1");

    store.delete(b"1").unwrap();
    let err = store.get(b"1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(store.get(b"2").unwrap(), b"2");

    // Deleting twice is fine.
    store.delete(b"1").unwrap();
}

#[test]
fn test_overwrite_and_empty_value() {
    let store = Store::in_memory().unwrap();
    store.set(b"k", b"first").unwrap();
    store.set(b"k", b"").unwrap();
    assert_eq!(store.get(b"k").unwrap(), b"");
}

#[test]
fn test_empty_key_rejected() {
    let store = Store::in_memory().unwrap();
    assert_eq!(store.set(b"", b"v").unwrap_err().kind(), ErrorKind::InvalidKey);
    assert_eq!(
        store.add_to_group("", "m", b"v").unwrap_err().kind(),
        ErrorKind::InvalidKey
    );
    assert_eq!(
        store.add_to_group("g", "", b"v").unwrap_err().kind(),
        ErrorKind::InvalidKey
    );
}

#[test]
fn test_group_lifecycle() {
    let store = Store::in_memory().unwrap();
    for i in 0..13 {
        store
            .add_to_group("g", &format!("member-{i:02}"), b"A")
            .unwrap();
    }

    let members = store.get_group("g", 127).unwrap();
    assert_eq!(members.len(), 13);
    for (key, value) in &members {
        assert_eq!(key.group(), "g");
        assert_eq!(value, b"A");
    }

    for key in members.keys() {
        store.delete_from_group(key).unwrap();
    }
    assert!(store.get_group("g", 127).unwrap().is_empty());
}

#[test]
fn test_deleted_entries_release_index_memory() {
    let store = Store::in_memory().unwrap();
    for i in 0..2000 {
        let key = format!("key-{i}");
        store.set(key.as_bytes(), b"value").unwrap();
        store.delete(key.as_bytes()).unwrap();
    }
    let members: Vec<_> = (0..100)
        .map(|i| store.add_to_group("g", &i.to_string(), b"v").unwrap())
        .collect();
    for key in &members {
        store.delete_from_group(key).unwrap();
    }

    assert_eq!(store.size().unwrap(), (0, 0));
    assert!(store.scan(b"", 1).unwrap().is_empty());
    assert!(store.get_group("g", 1).unwrap().is_empty());
}

#[test]
fn test_limit_does_not_truncate() {
    let store = Store::in_memory().unwrap();
    for i in 0..10 {
        store.add_to_group("g", &i.to_string(), b"v").unwrap();
    }
    assert_eq!(store.get_group("g", 1).unwrap().len(), 10);
}

#[test]
fn test_non_positive_limit() {
    let log = ErrorLog::default();
    let store = Store::open(log.install(burrow::Config::in_memory())).unwrap();
    store.add_to_group("g", "m", b"v").unwrap();

    for limit in [0, -1, i64::MIN] {
        let err = store.get_group("g", limit).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRangeLimit);
        let err = store.scan(b"", limit).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRangeLimit);
    }
    assert_eq!(log.entries().len(), 6);
}

#[test]
fn test_prefix_named_groups_are_isolated() {
    let store = Store::in_memory().unwrap();
    store.add_to_group("user", "1", b"short").unwrap();
    store.add_to_group("users", "1", b"long").unwrap();
    store.add_to_group("use", "1", b"shorter").unwrap();

    let expectations: [(&str, &[u8]); 3] =
        [("user", b"short"), ("users", b"long"), ("use", b"shorter")];
    for (group, expected) in expectations {
        let members = store.get_group(group, 10).unwrap();
        assert_eq!(members.len(), 1, "group {group}");
        let (key, value) = members.iter().next().unwrap();
        assert_eq!(key.group(), group);
        assert_eq!(value.as_slice(), expected);
    }
}

#[test]
fn test_readding_member_overwrites() {
    let store = Store::in_memory().unwrap();
    let key = store.add_to_group("g", "m", b"one").unwrap();
    store.add_to_group("g", "m", b"two").unwrap();

    let members = store.get_group("g", 10).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[&key], b"two");
}

#[test]
fn test_scan_plain_keys() {
    let store = Store::in_memory().unwrap();
    store.set(b"log:2", b"b").unwrap();
    store.set(b"log:1", b"a").unwrap();
    store.set(b"logs", b"x").unwrap();
    store.set(b"other", b"y").unwrap();
    store.add_to_group("log:", "3", b"member").unwrap();

    let entries = store.scan(b"log:", 1).unwrap();
    assert_eq!(
        entries,
        vec![
            (b"log:1".to_vec(), b"a".to_vec()),
            (b"log:2".to_vec(), b"b".to_vec()),
        ]
    );
    assert_eq!(store.scan(b"", 1).unwrap().len(), 4);
}

#[test]
fn test_handler_sees_every_failure() {
    let log = ErrorLog::default();
    let store = Store::open(log.install(burrow::Config::in_memory())).unwrap();

    store.set(b"k", b"v").unwrap();
    assert!(store.get(b"k").is_ok());
    assert!(store.get(b"missing").is_err());
    assert!(store.get(b"").is_err());

    assert_eq!(
        log.entries(),
        vec![
            ("get".to_string(), ErrorKind::NotFound),
            ("get".to_string(), ErrorKind::InvalidKey),
        ]
    );
}

#[test]
fn test_invalid_config_reported() {
    let log = ErrorLog::default();
    let config = log
        .install(burrow::Config::in_memory())
        .with_discard_ratio(1.5);
    let err = Store::open(config).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert_eq!(log.entries(), vec![("open".to_string(), ErrorKind::Config)]);
}

#[test]
fn test_data_survives_reopen() {
    let fixture = StoreFixture::new();
    let key: CompositeKey;
    {
        let store = fixture.open();
        store.set(b"plain", b"value").unwrap();
        key = store.add_to_group("g", "kept", b"1").unwrap();
        let gone = store.add_to_group("g", "gone", b"2").unwrap();
        store.delete_from_group(&gone).unwrap();
        store.close().unwrap();
    }

    let store = fixture.open();
    assert_eq!(store.get(b"plain").unwrap(), b"value");
    let members = store.get_group("g", 10).unwrap();
    assert_eq!(members.keys().collect::<Vec<_>>(), vec![&key]);
}

#[test]
fn test_oversized_values_rejected_and_largest_survives_reopen() {
    let fixture = StoreFixture::new();
    let largest = vec![7u8; MAX_VALUE_SIZE];
    {
        let store = fixture.open();
        let too_big = vec![7u8; MAX_VALUE_SIZE + 1];
        assert_eq!(
            store.set(b"big", &too_big).unwrap_err().kind(),
            ErrorKind::InvalidValue
        );
        assert_eq!(
            store.add_to_group("g", "big", &too_big).unwrap_err().kind(),
            ErrorKind::InvalidValue
        );
        assert_eq!(store.get(b"big").unwrap_err().kind(), ErrorKind::NotFound);

        store.set(b"big", &largest).unwrap();
        store.set(b"after", b"small").unwrap();
        store.close().unwrap();
    }

    let store = fixture.open();
    assert_eq!(store.get(b"big").unwrap(), largest);
    assert_eq!(store.get(b"after").unwrap(), b"small");
    assert!(store.get_group("g", 1).unwrap().is_empty());
}

#[test]
fn test_closed_store() {
    let fixture = StoreFixture::new();
    let store = fixture.open();
    store.close().unwrap();
    store.close().unwrap();
    assert_eq!(store.get(b"k").unwrap_err().kind(), ErrorKind::EngineFailure);
    assert_eq!(store.size().unwrap_err().kind(), ErrorKind::EngineFailure);
}

fn superseded_segments(fixture: &StoreFixture, units: usize) -> Store {
    let config = fixture
        .config()
        .with_max_segment_size(256)
        .with_discard_ratio(0.5);
    let store = Store::open(config).unwrap();
    for i in 0..=units {
        store.set(b"hot", &vec![i as u8; 100]).unwrap();
    }
    store
}

#[test]
fn test_reclaim_all_drains_every_unit() {
    let fixture = StoreFixture::new();
    let store = superseded_segments(&fixture, 6);
    let (_, before) = store.size().unwrap();

    assert_eq!(store.reclaim_all().unwrap(), 6);
    assert!(!store.reclaim_once().unwrap());

    let (_, after) = store.size().unwrap();
    assert!(after < before);
    assert_eq!(store.get(b"hot").unwrap(), vec![6u8; 100]);
}

#[test]
fn test_background_loop_reclaims_on_trigger() {
    let fixture = StoreFixture::new();
    let config = fixture
        .config()
        .with_cleanup_interval(Duration::from_secs(3600))
        .with_max_segment_size(256)
        .with_discard_ratio(0.5);
    let store = Store::open(config).unwrap();
    for i in 0..8u8 {
        store.set(b"hot", &vec![i; 100]).unwrap();
    }
    let (_, before) = store.size().unwrap();

    assert!(store.trigger_maintenance());
    let deadline = Instant::now() + Duration::from_secs(10);
    while store.size().unwrap().1 >= before / 2 {
        assert!(Instant::now() < deadline, "maintenance did not run");
        thread::sleep(Duration::from_millis(10));
    }

    store.close().unwrap();
    assert!(!store.trigger_maintenance());
}

#[test]
fn test_concurrent_readers_see_whole_members() {
    let store = Arc::new(Store::in_memory().unwrap());
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut reads = 0;
                loop {
                    let members = store.get_group("g", 64).expect("torn group member");
                    for (key, value) in members {
                        assert_eq!(value, key.member().as_bytes());
                    }
                    reads += 1;
                    if done.load(Ordering::Acquire) {
                        return reads;
                    }
                }
            })
        })
        .collect();

    for round in 0..50 {
        let keys: Vec<_> = (0..8)
            .map(|i| {
                let member = format!("{round}-{i}");
                store.add_to_group("g", &member, member.as_bytes()).unwrap()
            })
            .collect();
        for key in &keys {
            store.delete_from_group(key).unwrap();
        }
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
    assert!(store.get_group("g", 64).unwrap().is_empty());
}
