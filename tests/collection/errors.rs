//! Error Surface Tests
//!
//! Registration, lookup and lifecycle errors, and the guarantee that a
//! failed call leaves state and output untouched.

use crate::common::*;

// ============================================================================
// Registration
// ============================================================================

#[test]
fn duplicate_collection_name() {
    let db = Database::cache();
    db.new_collection::<Person>("people").unwrap();
    assert!(matches!(
        db.new_collection::<Person>("people"),
        Err(Error::CollectionExists(_))
    ));
}

#[test]
fn duplicate_index_name() {
    let db = Database::cache();
    let (people, _age) = people_with_age(&db);
    assert!(matches!(
        people.add_multi_index("age", nickname_values),
        Err(Error::IndexExists { .. })
    ));
}

#[test]
fn index_after_first_mutation_is_refused() {
    let db = Database::cache();
    let (people, _age) = people_with_age(&db);
    people.insert(&person("foo", 1)).unwrap();

    let err = people
        .add_multi_index("nicknames", nickname_values)
        .unwrap_err();
    assert!(matches!(err, Error::IndexesFrozen { ref index, .. } if index == "nicknames"));
}

#[test]
fn failed_mutation_still_freezes_indexes() {
    let db = Database::cache();
    let (people, _age) = people_with_age(&db);
    assert!(people.delete(b"nobody").is_err());

    assert!(matches!(
        people.add_index("name", |p: &Person| p.name.as_bytes().to_vec()),
        Err(Error::IndexesFrozen { .. })
    ));
}

#[test]
fn names_with_separator_rejected() {
    let db = Database::cache();
    assert!(matches!(
        db.new_collection::<Person>("a:b"),
        Err(Error::InvalidName(_))
    ));

    let people = db.new_collection::<Person>("people").unwrap();
    assert!(matches!(
        people.add_index("", age_value),
        Err(Error::InvalidName(_))
    ));
}

// ============================================================================
// Lookups
// ============================================================================

#[test]
fn lookup_unknown_collection() {
    let db = Database::cache();
    assert!(matches!(
        db.collection::<Person>("people"),
        Err(Error::CollectionNotFound(_))
    ));
}

#[test]
fn lookup_with_wrong_record_type() {
    #[derive(Debug, serde::Serialize, serde::Deserialize)]
    struct Pet {
        tag: u64,
    }

    impl Record for Pet {
        fn primary_key(&self) -> Vec<u8> {
            self.tag.to_be_bytes().to_vec()
        }
    }

    let db = Database::cache();
    db.new_collection::<Person>("people").unwrap();
    assert!(matches!(
        db.collection::<Pet>("people"),
        Err(Error::CollectionTypeMismatch { .. })
    ));
}

#[test]
fn find_by_id_missing() {
    let db = Database::cache();
    let (people, _age) = people_with_age(&db);
    assert!(matches!(
        people.find_by_id(b"foo"),
        Err(Error::NotFound { .. })
    ));
}

// ============================================================================
// Foreign index handles
// ============================================================================

#[test]
fn index_from_another_collection_rejected() {
    let db = Database::cache();
    let (people, age) = people_with_age(&db);
    let pets = db.new_collection::<Person>("pets").unwrap();
    people.insert(&person("foo", 1)).unwrap();

    let mut out = Vec::new();
    assert!(matches!(
        pets.find_into(&age, &IndexQuery::value("1"), &mut out),
        Err(Error::UnknownIndex { .. })
    ));
    assert!(out.is_empty());
}

#[test]
fn index_from_another_database_rejected() {
    let db1 = Database::cache();
    let db2 = Database::cache();
    let (_people1, age1) = people_with_age(&db1);
    let (people2, _age2) = people_with_age(&db2);

    assert!(matches!(
        people2.find_with_value(&age1, "1"),
        Err(Error::UnknownIndex { .. })
    ));
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn handles_fail_after_close() {
    let db = Database::cache();
    let (people, age) = people_with_age(&db);
    people.insert(&person("foo", 1)).unwrap();
    db.close().unwrap();

    assert!(matches!(people.insert(&person("bar", 2)), Err(Error::DatabaseClosed)));
    assert!(matches!(people.update(&person("foo", 2)), Err(Error::DatabaseClosed)));
    assert!(matches!(people.delete(b"foo"), Err(Error::DatabaseClosed)));
    assert!(matches!(people.find_by_id(b"foo"), Err(Error::DatabaseClosed)));
    assert!(matches!(
        people.find_with_value(&age, "1"),
        Err(Error::DatabaseClosed)
    ));
    assert!(matches!(
        people.add_index("late", age_value),
        Err(Error::DatabaseClosed)
    ));
}

#[test]
fn durable_handles_fail_after_close() {
    let mut test_db = TestDb::new_strict();
    let (people, _age) = people_with_age(test_db.db());
    people.insert(&person("foo", 1)).unwrap();
    test_db.close();

    assert!(matches!(people.exists(b"foo"), Err(Error::DatabaseClosed)));
}
