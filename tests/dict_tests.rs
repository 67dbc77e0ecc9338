//! Tests for FileDict insertion and lookup
//!
//! These tests verify:
//! - Round trips and insertion order
//! - Duplicate suppression with insert_unique
//! - Generation growth when slots or buckets are exhausted
//! - Key isolation inside shared buckets
//! - Input validation (value too big, key too long, empty, NUL)
//! - Handle state (read-only, closed)

use std::sync::Arc;
use std::thread;

use filedict::{Config, FileDict, FileDictError, InsertOutcome, KeyOverflow};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_dict(buckets: u32) -> (TempDir, FileDict) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder().initial_bucket_count(buckets).build();
    let dict = FileDict::create(temp_dir.path().join("test.fdict"), config).unwrap();
    (temp_dir, dict)
}

fn setup_temp_dict_with(config: Config) -> (TempDir, FileDict) {
    let temp_dir = TempDir::new().unwrap();
    let dict = FileDict::create(temp_dir.path().join("test.fdict"), config).unwrap();
    (temp_dir, dict)
}

/// A value of `len` copies of `c`; two 100-byte values fill most of a slot
fn long_value(c: char, len: usize) -> String {
    std::iter::repeat(c).take(len).collect()
}

fn fixed_hash(_key: &[u8]) -> u64 {
    3
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_insert_then_get_single_value() {
    let (_temp, dict) = setup_temp_dict(4096);

    dict.insert("mykey", "myvalue").unwrap();

    let mut cursor = dict.get("mykey").unwrap();
    assert_eq!(cursor.value(), None);
    assert!(dict.get_next(&mut cursor).unwrap());
    assert_eq!(cursor.value(), Some("myvalue"));
    assert!(!dict.get_next(&mut cursor).unwrap());
    assert!(cursor.is_exhausted());

    // An exhausted cursor stays exhausted
    assert!(!dict.get_next(&mut cursor).unwrap());
    assert_eq!(cursor.value(), None);
}

#[test]
fn test_get_missing_key() {
    let (_temp, dict) = setup_temp_dict(16);
    dict.insert("present", "value").unwrap();

    let mut cursor = dict.get("absent").unwrap();
    assert!(!dict.get_next(&mut cursor).unwrap());
    assert!(dict.get_all("absent").unwrap().is_empty());
}

#[test]
fn test_insert_outcomes() {
    let (_temp, dict) = setup_temp_dict(16);

    assert_eq!(
        dict.insert("key", "v1").unwrap(),
        InsertOutcome::NewSlot { generation: 0 }
    );
    assert_eq!(
        dict.insert("key", "v2").unwrap(),
        InsertOutcome::Appended { generation: 0 }
    );
    assert_eq!(
        dict.insert_unique("key", "v2").unwrap(),
        InsertOutcome::Duplicate
    );
    assert!(!InsertOutcome::Duplicate.is_stored());
    assert_eq!(InsertOutcome::Appended { generation: 4 }.generation(), Some(4));
}

#[test]
fn test_unicode_values() {
    let (_temp, dict) = setup_temp_dict(16);
    dict.insert("città", "café").unwrap();
    dict.insert("città", "日本語").unwrap();
    assert_eq!(dict.get_all("città").unwrap(), vec!["café", "日本語"]);
}

// =============================================================================
// Ordering Tests
// =============================================================================

#[test]
fn test_values_in_insertion_order() {
    let (_temp, dict) = setup_temp_dict(4096);

    for i in 1..=5 {
        dict.insert("key2", &format!("key2value{}", i)).unwrap();
    }
    dict.insert("mykey", "myvalue").unwrap();

    let values = dict.get_all("key2").unwrap();
    assert_eq!(
        values,
        vec!["key2value1", "key2value2", "key2value3", "key2value4", "key2value5"]
    );
    assert_eq!(dict.generation_count().unwrap(), 1);
}

#[test]
fn test_order_preserved_across_generations() {
    let (_temp, dict) = setup_temp_dict(1);

    // 61 bytes each with terminator: four fit per slot, so 20 values need 5 generations
    let expected: Vec<String> = (0..20)
        .map(|i| format!("{:02}{}", i, long_value('v', 58)))
        .collect();
    for value in &expected {
        dict.insert("k", value).unwrap();
    }

    assert_eq!(dict.generation_count().unwrap(), 5);
    assert_eq!(dict.get_all("k").unwrap(), expected);
}

#[test]
fn test_three_values_two_per_slot() {
    let (_temp, dict) = setup_temp_dict(1);
    let a = long_value('a', 100);
    let b = long_value('b', 100);
    let c = long_value('c', 100);

    dict.insert("k", &a).unwrap();
    dict.insert("k", &b).unwrap();
    assert_eq!(dict.generation_count().unwrap(), 1);
    assert_eq!(
        dict.insert("k", &c).unwrap(),
        InsertOutcome::NewSlot { generation: 1 }
    );
    assert_eq!(dict.generation_count().unwrap(), 2);

    let mut cursor = dict.get("k").unwrap();
    let mut seen = Vec::new();
    while dict.get_next(&mut cursor).unwrap() {
        seen.push((
            cursor.value().unwrap().to_string(),
            cursor.generation().unwrap(),
            cursor.slot().unwrap(),
        ));
    }
    assert_eq!(seen, vec![(a, 0, 0), (b, 0, 0), (c, 1, 0)]);
}

#[test]
fn test_values_iterator() {
    let (_temp, dict) = setup_temp_dict(8);
    dict.insert("k", "one").unwrap();
    dict.insert("k", "two").unwrap();

    let values: Vec<String> = dict.values("k").unwrap().map(|v| v.unwrap()).collect();
    assert_eq!(values, vec!["one", "two"]);
}

// =============================================================================
// Uniqueness Tests
// =============================================================================

#[test]
fn test_insert_unique_suppresses_duplicates() {
    let (_temp, dict) = setup_temp_dict(16);

    dict.insert_unique("key", "x").unwrap();
    dict.insert_unique("key", "x").unwrap();
    assert_eq!(dict.get_all("key").unwrap(), vec!["x"]);

    dict.insert("other", "x").unwrap();
    dict.insert("other", "x").unwrap();
    assert_eq!(dict.get_all("other").unwrap(), vec!["x", "x"]);
}

#[test]
fn test_insert_unique_sees_older_generations() {
    let (_temp, dict) = setup_temp_dict(1);
    let a = long_value('a', 100);
    let b = long_value('b', 100);
    let c = long_value('c', 100);

    dict.insert("k", &a).unwrap();
    dict.insert("k", &b).unwrap();
    dict.insert("k", &c).unwrap();
    assert_eq!(dict.generation_count().unwrap(), 2);

    assert_eq!(dict.insert_unique("k", &a).unwrap(), InsertOutcome::Duplicate);
    assert_eq!(dict.insert_unique("k", &c).unwrap(), InsertOutcome::Duplicate);
    assert_eq!(dict.generation_count().unwrap(), 2);
    assert_eq!(dict.get_all("k").unwrap(), vec![a, b, c]);
}

#[test]
fn test_insert_unique_distinguishes_prefixes() {
    let (_temp, dict) = setup_temp_dict(16);
    dict.insert_unique("key", "value").unwrap();
    dict.insert_unique("key", "val").unwrap();
    dict.insert_unique("key", "values").unwrap();
    assert_eq!(dict.get_all("key").unwrap(), vec!["value", "val", "values"]);
}

// =============================================================================
// Growth Tests
// =============================================================================

#[test]
fn test_growth_one_generation_per_exhaustion() {
    let (_temp, dict) = setup_temp_dict(1);
    let mut expected = Vec::new();

    for i in 0..6 {
        let value = format!("{}{}", i, long_value('x', 99));
        dict.insert("k", &value).unwrap();
        expected.push(value);

        assert_eq!(dict.generation_count().unwrap(), i / 2 + 1);
        assert_eq!(dict.get_all("k").unwrap(), expected);
    }
}

#[test]
fn test_growth_when_bucket_full_of_foreign_keys() {
    let (_temp, dict) = setup_temp_dict(1);

    for i in 0..4 {
        assert_eq!(
            dict.insert(&format!("k{}", i), "v").unwrap(),
            InsertOutcome::NewSlot { generation: 0 }
        );
    }
    assert_eq!(dict.generation_count().unwrap(), 1);

    assert_eq!(
        dict.insert("k4", "v4").unwrap(),
        InsertOutcome::NewSlot { generation: 1 }
    );
    assert_eq!(dict.generation_count().unwrap(), 2);

    // Existing keys still append in place
    assert_eq!(
        dict.insert("k0", "v0b").unwrap(),
        InsertOutcome::Appended { generation: 0 }
    );

    assert_eq!(dict.get_all("k4").unwrap(), vec!["v4"]);
    assert_eq!(dict.get_all("k0").unwrap(), vec!["v", "v0b"]);
    for i in 1..4 {
        assert_eq!(dict.get_all(&format!("k{}", i)).unwrap(), vec!["v"]);
    }
}

#[test]
fn test_full_slot_moves_to_next_generation_not_next_slot() {
    let (_temp, dict) = setup_temp_dict(1);
    dict.insert("k", &long_value('a', 200)).unwrap();

    // Slot 1 is still empty, but k's values must not spill into it
    assert_eq!(
        dict.insert("k", &long_value('b', 100)).unwrap(),
        InsertOutcome::NewSlot { generation: 1 }
    );
    assert_eq!(
        dict.insert("other", "v").unwrap(),
        InsertOutcome::NewSlot { generation: 0 }
    );
}

#[test]
fn test_values_survive_growth_unchanged() {
    let (_temp, dict) = setup_temp_dict(2);
    let keys: Vec<String> = (0..20).map(|i| format!("key-{}", i)).collect();

    for key in &keys {
        dict.insert(key, &format!("{}-first", key)).unwrap();
    }
    let before = dict.generation_count().unwrap();

    for key in &keys {
        dict.insert(key, &long_value('z', 250)).unwrap();
    }
    assert!(dict.generation_count().unwrap() > before);

    for key in &keys {
        assert_eq!(
            dict.get_all(key).unwrap(),
            vec![format!("{}-first", key), long_value('z', 250)]
        );
    }
}

// =============================================================================
// Key Isolation Tests
// =============================================================================

#[test]
fn test_colliding_keys_stay_independent() {
    let (_temp, dict) = setup_temp_dict(1);

    dict.insert("a", "a1").unwrap();
    dict.insert("b", "b1").unwrap();
    dict.insert("a", "a2").unwrap();
    dict.insert("b", "b2").unwrap();

    assert_eq!(dict.get_all("a").unwrap(), vec!["a1", "a2"]);
    assert_eq!(dict.get_all("b").unwrap(), vec!["b1", "b2"]);
    assert!(dict.get_all("c").unwrap().is_empty());
}

#[test]
fn test_custom_hash_function() {
    let config = Config::builder()
        .initial_bucket_count(8)
        .hash_function(fixed_hash)
        .build();
    let (_temp, dict) = setup_temp_dict_with(config);

    dict.insert("alpha", "1").unwrap();
    dict.insert("beta", "2").unwrap();

    let cursor = dict.get("alpha").unwrap();
    assert_eq!(cursor.bucket(), 3);
    assert_eq!(dict.get_all("beta").unwrap(), vec!["2"]);

    let buckets: Vec<u32> = dict.entries().map(|e| e.unwrap().bucket).collect();
    assert_eq!(buckets, vec![3, 3]);
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_value_too_big_leaves_slot_untouched() {
    let (_temp, dict) = setup_temp_dict(1);

    let result = dict.insert("k", &long_value('v', 256));
    assert!(matches!(
        result,
        Err(FileDictError::ValueTooBig { len: 256, max: 255 })
    ));
    assert!(dict.get_all("k").unwrap().is_empty());
    assert_eq!(dict.entries().count(), 0);

    // The largest value that fits
    dict.insert("k", &long_value('v', 255)).unwrap();
    assert_eq!(dict.get_all("k").unwrap(), vec![long_value('v', 255)]);
    assert_eq!(dict.generation_count().unwrap(), 1);
}

#[test]
fn test_value_too_big_keeps_existing_values() {
    let (_temp, dict) = setup_temp_dict(1);
    dict.insert("k", "small").unwrap();

    assert!(dict.insert("k", &long_value('v', 300)).is_err());
    assert_eq!(dict.get_all("k").unwrap(), vec!["small"]);
    assert_eq!(dict.generation_count().unwrap(), 1);

    // The handle keeps working after an error
    dict.insert("k", "after").unwrap();
    assert_eq!(dict.get_all("k").unwrap(), vec!["small", "after"]);
}

#[test]
fn test_empty_and_nul_inputs_rejected() {
    let (_temp, dict) = setup_temp_dict(16);

    assert!(matches!(dict.insert("", "v"), Err(FileDictError::EmptyKey)));
    assert!(matches!(dict.insert("k", ""), Err(FileDictError::EmptyValue)));
    assert!(matches!(
        dict.insert("k\0x", "v"),
        Err(FileDictError::InteriorNul { field: "key" })
    ));
    assert!(matches!(
        dict.insert("k", "v\0x"),
        Err(FileDictError::InteriorNul { field: "value" })
    ));
    assert!(matches!(dict.get(""), Err(FileDictError::EmptyKey)));
}

#[test]
fn test_long_key_rejected_by_default() {
    let (_temp, dict) = setup_temp_dict(16);
    let key = long_value('k', 256);

    assert!(matches!(
        dict.insert(&key, "v"),
        Err(FileDictError::KeyTooLong { len: 256, max: 255 })
    ));
    assert!(matches!(
        dict.get(&key),
        Err(FileDictError::KeyTooLong { .. })
    ));

    let key = long_value('k', 255);
    dict.insert(&key, "v").unwrap();
    assert_eq!(dict.get_all(&key).unwrap(), vec!["v"]);
}

#[test]
fn test_long_keys_truncated_in_compat_mode() {
    let config = Config::builder()
        .initial_bucket_count(16)
        .key_overflow(KeyOverflow::Truncate)
        .build();
    let (_temp, dict) = setup_temp_dict_with(config);

    let first = long_value('a', 300);
    let second = format!("{}b", long_value('a', 300));
    dict.insert(&first, "one").unwrap();
    dict.insert(&second, "two").unwrap();

    // Both keys share their first 255 bytes and therefore one slot
    assert_eq!(dict.get_all(&first).unwrap(), vec!["one", "two"]);
    assert_eq!(dict.get(&second).unwrap().key().len(), 255);
    assert_eq!(dict.entries().count(), 1);
}

#[test]
fn test_truncation_respects_char_boundaries() {
    let config = Config::builder()
        .key_overflow(KeyOverflow::Truncate)
        .build();
    let (_temp, dict) = setup_temp_dict_with(config);

    let key: String = std::iter::repeat('é').take(200).collect();
    dict.insert(&key, "v").unwrap();

    let cursor = dict.get(&key).unwrap();
    assert_eq!(cursor.key().len(), 254);
    assert!(std::str::from_utf8(cursor.key()).is_ok());
    assert_eq!(dict.get_all(&key).unwrap(), vec!["v"]);
}

// =============================================================================
// Handle State Tests
// =============================================================================

#[test]
fn test_readonly_handle_rejects_writes() {
    let (temp, dict) = setup_temp_dict(16);
    dict.insert("k", "v").unwrap();
    dict.close().unwrap();

    let reader = FileDict::open_readonly(temp.path().join("test.fdict"), Config::default()).unwrap();
    assert!(!reader.is_writable());
    assert!(matches!(reader.insert("k", "w"), Err(FileDictError::ReadOnly)));
    assert_eq!(reader.get_all("k").unwrap(), vec!["v"]);
}

#[test]
fn test_closed_handle() {
    let (_temp, dict) = setup_temp_dict(16);
    dict.insert("k", "v").unwrap();

    dict.close().unwrap();
    dict.close().unwrap();
    assert!(dict.is_closed());
    assert_eq!(dict.file_len(), 0);

    assert!(matches!(dict.insert("k", "v"), Err(FileDictError::Closed)));
    assert!(matches!(dict.get("k"), Err(FileDictError::Closed)));
    assert!(matches!(dict.stats(), Err(FileDictError::Closed)));
    assert!(matches!(dict.generation_count(), Err(FileDictError::Closed)));
}

#[test]
fn test_cursor_after_close_fails() {
    let (_temp, dict) = setup_temp_dict(16);
    dict.insert("k", "v").unwrap();
    let mut cursor = dict.get("k").unwrap();

    dict.close().unwrap();
    assert!(matches!(
        dict.get_next(&mut cursor),
        Err(FileDictError::Closed)
    ));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_shared_handle_across_threads() {
    let (_temp, dict) = setup_temp_dict(4);
    let dict = Arc::new(dict);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let dict = Arc::clone(&dict);
            thread::spawn(move || {
                for i in 0..50 {
                    dict.insert(&format!("thread{}", t), &format!("value{:02}", i))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for t in 0..4 {
        let expected: Vec<String> = (0..50).map(|i| format!("value{:02}", i)).collect();
        assert_eq!(dict.get_all(&format!("thread{}", t)).unwrap(), expected);
    }
}

#[test]
fn test_cursor_sees_inserts_from_same_handle() {
    let (_temp, dict) = setup_temp_dict(1);
    let a = long_value('a', 100);
    let b = long_value('b', 100);
    let c = long_value('c', 100);

    dict.insert("k", &a).unwrap();
    let mut cursor = dict.get("k").unwrap();
    assert!(dict.get_next(&mut cursor).unwrap());
    assert_eq!(cursor.value(), Some(a.as_str()));

    dict.insert("k", &b).unwrap();
    dict.insert("k", &c).unwrap();
    assert_eq!(dict.generation_count().unwrap(), 2);

    assert!(dict.get_next(&mut cursor).unwrap());
    assert_eq!(cursor.value(), Some(b.as_str()));
    assert!(dict.get_next(&mut cursor).unwrap());
    assert_eq!(cursor.value(), Some(c.as_str()));
    assert!(!dict.get_next(&mut cursor).unwrap());
}
