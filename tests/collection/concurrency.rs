//! Concurrency Tests
//!
//! Same-key mutations are serialized; distinct keys proceed in parallel;
//! queries never observe a row without its entries.

use crate::common::*;
use relaydb::key;
use relaydb::{KeyRange, MemoryStore, OrderedStore, StoreSnapshot};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn racing_inserts_of_same_key_exactly_one_wins() {
    let db = Database::cache();
    let (people, age) = people_with_age(&db);

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let successes = Arc::new(AtomicUsize::new(0));
    let conflicts = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let people = people.clone();
            let barrier = Arc::clone(&barrier);
            let successes = Arc::clone(&successes);
            let conflicts = Arc::clone(&conflicts);
            thread::spawn(move || {
                barrier.wait();
                match people.insert(&person("contested", i as u32)) {
                    Ok(()) => successes.fetch_add(1, Ordering::SeqCst),
                    Err(Error::AlreadyExists { .. }) => conflicts.fetch_add(1, Ordering::SeqCst),
                    Err(e) => panic!("unexpected error: {}", e),
                };
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert_eq!(conflicts.load(Ordering::SeqCst), threads - 1);

    // Exactly one age entry exists, matching the stored row.
    let stored = people.find_by_id(b"contested").unwrap();
    let all = people.find_with_prefix(&age, "").unwrap();
    assert_eq!(all, vec![stored]);
}

#[test]
fn concurrent_updates_leave_single_entry() {
    let db = Database::cache();
    let (people, age) = people_with_age(&db);
    people.insert(&person("foo", 0)).unwrap();

    let handles: Vec<_> = (1..=8u32)
        .map(|i| {
            let people = people.clone();
            thread::spawn(move || {
                for round in 0..50u32 {
                    people.update(&person("foo", i * 1000 + round)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let current = people.find_by_id(b"foo").unwrap();
    let indexed = people.find_with_prefix(&age, "").unwrap();
    assert_eq!(indexed, vec![current.clone()]);
    assert_eq!(
        people
            .find_with_value(&age, current.age.to_string())
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn distinct_keys_insert_in_parallel() {
    let db = Database::cache();
    let (people, age) = people_with_age(&db);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let people = people.clone();
            thread::spawn(move || {
                for i in 0..100 {
                    people
                        .insert(&person(&format!("t{}_{:03}", t, i), t))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(people.count().unwrap(), 400);
    for t in 0..4u32 {
        assert_eq!(people.find_with_value(&age, t.to_string()).unwrap().len(), 100);
    }
}

#[test]
fn readers_never_see_partial_mutations() {
    let db = Database::cache();
    let (people, age) = people_with_age(&db);
    people.insert(&person("foo", 10)).unwrap();

    let writer = {
        let people = people.clone();
        thread::spawn(move || {
            for i in 0..500u32 {
                people.update(&person("foo", 10 + (i % 2))).unwrap();
            }
        })
    };

    for _ in 0..500 {
        // The record is always in exactly one bucket, and the bucket agrees
        // with the row it resolves to.
        let found = people.find_with_range(&age, "10", "12").unwrap();
        assert_eq!(found.len(), 1);
        let ten = people.find_with_value(&age, "10").unwrap();
        for p in ten {
            assert_eq!(p.age, 10);
        }
    }
    writer.join().unwrap();
}

#[test]
fn insert_racing_update_is_ordered() {
    let db = Database::cache();
    let (people, age) = people_with_age(&db);

    for round in 0..50 {
        let name = format!("raced{:02}", round);
        let barrier = Arc::new(Barrier::new(2));

        let inserter = {
            let people = people.clone();
            let barrier = Arc::clone(&barrier);
            let name = name.clone();
            thread::spawn(move || {
                barrier.wait();
                people.insert(&person(&name, 1))
            })
        };
        let updater = {
            let people = people.clone();
            let barrier = Arc::clone(&barrier);
            let name = name.clone();
            thread::spawn(move || {
                barrier.wait();
                people.update(&person(&name, 2))
            })
        };

        inserter.join().unwrap().unwrap();
        let stored = people.find_by_id(name.as_bytes()).unwrap();
        match updater.join().unwrap() {
            // insert then update
            Ok(()) => assert_eq!(stored.age, 2),
            // update saw no row, insert landed after
            Err(Error::NotFound { .. }) => assert_eq!(stored.age, 1),
            Err(e) => panic!("unexpected error: {}", e),
        }

        let indexed: Vec<Person> = people
            .find_with_prefix(&age, "")
            .unwrap()
            .into_iter()
            .filter(|p| p.name == name)
            .collect();
        assert_eq!(indexed, vec![stored.clone()]);
        assert_eq!(
            names(&people.find_with_value(&age, stored.age.to_string()).unwrap())
                .iter()
                .filter(|n| **n == name)
                .count(),
            1
        );
    }
}

#[test]
fn update_racing_delete_is_ordered() {
    let db = Database::cache();
    let (people, age) = people_with_age(&db);

    for round in 0..50 {
        let name = format!("raced{:02}", round);
        people.insert(&person(&name, 1)).unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let updater = {
            let people = people.clone();
            let barrier = Arc::clone(&barrier);
            let name = name.clone();
            thread::spawn(move || {
                barrier.wait();
                people.update(&person(&name, 2))
            })
        };
        let deleter = {
            let people = people.clone();
            let barrier = Arc::clone(&barrier);
            let name = name.clone();
            thread::spawn(move || {
                barrier.wait();
                people.delete(name.as_bytes())
            })
        };

        deleter.join().unwrap().unwrap();
        match updater.join().unwrap() {
            Ok(()) | Err(Error::NotFound { .. }) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }

        // Either order ends with the row and all of its entries gone
        assert!(matches!(
            people.find_by_id(name.as_bytes()),
            Err(Error::NotFound { .. })
        ));
        assert!(!people.exists(name.as_bytes()).unwrap());
        assert!(people.find_with_prefix(&age, "").unwrap().is_empty());
    }
}

#[test]
fn close_stops_concurrent_writer() {
    let store = Arc::new(MemoryStore::new());
    let db = Database::with_store(store.clone(), RelayConfig::default()).unwrap();
    let (people, _age) = people_with_age(&db);

    let worker = {
        let people = people.clone();
        thread::spawn(move || {
            let mut inserted = 0usize;
            loop {
                match people.insert(&person(&format!("p{:08}", inserted), 1)) {
                    Ok(()) => inserted += 1,
                    Err(Error::DatabaseClosed) => return inserted,
                    Err(e) => panic!("unexpected error: {}", e),
                }
            }
        })
    };

    thread::sleep(std::time::Duration::from_millis(5));
    db.close().unwrap();
    let inserted = worker.join().unwrap();

    assert!(matches!(people.count(), Err(Error::DatabaseClosed)));

    // Every insert reported as successful is in the store, and nothing else
    let rows = store
        .snapshot()
        .unwrap()
        .scan(&KeyRange::prefix(key::row_prefix("people")))
        .unwrap();
    assert_eq!(rows.len(), inserted);
}
