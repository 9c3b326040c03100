//! Recovery Tests
//!
//! Close/reopen cycles and simulated crashes: a torn trailing WAL record
//! must be dropped as a whole, never leaving a row without its entries.

use crate::common::*;

// ============================================================================
// Clean reopen
// ============================================================================

#[test]
fn rows_and_entries_survive_reopen() {
    let mut test_db = TestDb::new_strict();
    {
        let (people, _age) = people_with_age(test_db.db());
        people.insert(&person("foo", 42)).unwrap();
        people.insert(&person("bar", 42)).unwrap();
        people.update(&person("bar", 43)).unwrap();
        people.insert(&person("baz", 1)).unwrap();
        people.delete(b"baz").unwrap();
    }

    test_db.reopen();

    let stats = test_db.db().recovery_stats().unwrap();
    assert_eq!(stats.batches_replayed, 5);

    let (people, age) = people_with_age(test_db.db());
    assert_eq!(names(&people.find_with_value(&age, "42").unwrap()), vec!["foo"]);
    assert_eq!(names(&people.find_with_value(&age, "43").unwrap()), vec!["bar"]);
    assert!(!people.exists(b"baz").unwrap());
    assert_eq!(people.count().unwrap(), 2);
}

#[test]
fn standard_durability_survives_clean_close() {
    let mut test_db = TestDb::new();
    {
        let (people, _age) = people_with_age(test_db.db());
        for i in 0..20 {
            people.insert(&person(&format!("p{:02}", i), i % 3)).unwrap();
        }
    }

    test_db.reopen();

    let (people, age) = people_with_age(test_db.db());
    assert_eq!(people.count().unwrap(), 20);
    assert_eq!(people.find_with_value(&age, "0").unwrap().len(), 7);
}

#[test]
fn writes_continue_after_reopen() {
    let mut test_db = TestDb::new_strict();
    {
        let (people, _age) = people_with_age(test_db.db());
        people.insert(&person("foo", 1)).unwrap();
    }
    test_db.reopen();
    {
        let (people, _age) = people_with_age(test_db.db());
        people.update(&person("foo", 2)).unwrap();
        assert!(matches!(
            people.insert(&person("foo", 3)),
            Err(Error::AlreadyExists { .. })
        ));
    }
    test_db.reopen();

    let (people, age) = people_with_age(test_db.db());
    assert_eq!(names(&people.find_with_value(&age, "2").unwrap()), vec!["foo"]);
    assert!(people.find_with_value(&age, "1").unwrap().is_empty());
}

#[test]
fn cache_durability_keeps_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = RelayConfig {
        durability: "cache".to_string(),
        ..RelayConfig::default()
    };
    {
        let db = Database::open_with_config(dir.path(), config).unwrap();
        let (people, _age) = people_with_age(&db);
        people.insert(&person("foo", 1)).unwrap();
        db.close().unwrap();
    }

    let db = Database::open(dir.path()).unwrap();
    let (people, _age) = people_with_age(&db);
    assert_eq!(people.count().unwrap(), 0);
}

// ============================================================================
// Simulated crashes
// ============================================================================

#[test]
fn torn_trailing_record_is_discarded_whole() {
    let mut test_db = TestDb::new_strict();
    {
        let (people, _age) = people_with_age(test_db.db());
        people.insert(&person("foo", 42)).unwrap();
        people.insert(&person("bar", 7)).unwrap();
    }
    test_db.close();

    // Cut into the last record, as a crash mid-append would.
    let wal_path = test_db.wal_path();
    truncate_file(&wal_path, file_size(&wal_path) - 3);

    test_db.reopen();
    let stats = test_db.db().recovery_stats().unwrap();
    assert_eq!(stats.batches_replayed, 1);
    assert!(stats.bytes_truncated > 0);

    let (people, age) = people_with_age(test_db.db());
    assert!(!people.exists(b"bar").unwrap());
    assert!(people.find_with_value(&age, "7").unwrap().is_empty());
    assert_eq!(names(&people.find_with_prefix(&age, "").unwrap()), vec!["foo"]);

    // The log accepts new writes after the repair.
    people.insert(&person("bar", 8)).unwrap();
    test_db.reopen();
    let (people, age) = people_with_age(test_db.db());
    assert_eq!(names(&people.find_with_value(&age, "8").unwrap()), vec!["bar"]);
}

#[test]
fn garbage_after_last_record_is_ignored() {
    let mut test_db = TestDb::new_strict();
    {
        let (people, _age) = people_with_age(test_db.db());
        people.insert(&person("foo", 42)).unwrap();
    }
    test_db.close();

    append_bytes(&test_db.wal_path(), &[0x10, 0x00, 0x00, 0x00, 0xAB, 0xCD]);

    test_db.reopen();
    let (people, age) = people_with_age(test_db.db());
    assert_eq!(names(&people.find_with_value(&age, "42").unwrap()), vec!["foo"]);
}

#[test]
fn corrupted_record_drops_it_and_everything_after() {
    let mut test_db = TestDb::new_strict();
    let header_and_first;
    {
        let (people, _age) = people_with_age(test_db.db());
        people.insert(&person("a", 1)).unwrap();
        header_and_first = file_size(&test_db.wal_path());
        people.insert(&person("b", 2)).unwrap();
        people.insert(&person("c", 3)).unwrap();
    }
    test_db.close();

    // Flip bytes inside the second record's payload.
    corrupt_file_at_offset(&test_db.wal_path(), header_and_first + 10, &[0xFF; 4]);

    test_db.reopen();
    let (people, age) = people_with_age(test_db.db());
    assert_eq!(names(&people.find_all().unwrap()), vec!["a"]);
    assert_eq!(names(&people.find_with_prefix(&age, "").unwrap()), vec!["a"]);
}

#[test]
fn trashed_segment_header_refuses_to_open() {
    let mut test_db = TestDb::new_strict();
    {
        let (people, _age) = people_with_age(test_db.db());
        people.insert(&person("foo", 1)).unwrap();
    }
    test_db.close();

    corrupt_file_at_offset(&test_db.wal_path(), 0, b"XXXX");

    assert!(matches!(test_db.try_reopen(), Err(Error::Io(_))));
}
