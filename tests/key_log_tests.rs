//! Tests for KeyLog and the auto-increment counter
//!
//! These tests verify:
//! - Key assignment for auto-increment and caller-keyed tables
//! - Conflict and invalid-key detection
//! - Replay of puts and delete markers after reopen
//! - Counter persistence and repair from the log

mod common;

use std::fs;
use std::path::{Path, PathBuf};

use chunkdb::chunk::Location;
use chunkdb::keys::{AutoIncrement, KeyLog, AUTO_FILE, KEY_FILE};
use chunkdb::{ChunkDbError, Config, KeyKind, Value};
use common::setup_temp_dir;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_key_dir() -> (TempDir, PathBuf) {
    let (temp, dir) = setup_temp_dir();
    (temp, dir.join("_pk"))
}

fn open_auto(dir: &Path) -> KeyLog {
    KeyLog::open(dir, true, &Config::default()).unwrap()
}

fn open_manual(dir: &Path) -> KeyLog {
    KeyLog::open(dir, false, &Config::default()).unwrap()
}

fn loc(chunk_id: u32, slot_id: u64) -> Location {
    Location::new(chunk_id, slot_id)
}

/// Assign and put, as an insert would
fn insert_auto(keys: &mut KeyLog, location: Location) -> i64 {
    let key = keys.assign(&Value::Int(0), KeyKind::Int).unwrap();
    keys.put(&key, location).unwrap();
    key.as_int().unwrap()
}

// =============================================================================
// Auto-Increment Tests
// =============================================================================

#[test]
fn test_auto_keys_start_at_one() {
    let (_temp, dir) = setup_key_dir();
    let mut keys = open_auto(&dir);

    assert_eq!(insert_auto(&mut keys, loc(1, 1)), 1);
    assert_eq!(insert_auto(&mut keys, loc(1, 2)), 2);
    assert_eq!(insert_auto(&mut keys, loc(1, 3)), 3);
    assert_eq!(keys.auto_increment(), Some(3));
}

#[test]
fn test_auto_keys_never_reused_after_delete() {
    let (_temp, dir) = setup_key_dir();
    let mut keys = open_auto(&dir);
    for slot in 1..=3 {
        insert_auto(&mut keys, loc(1, slot));
    }

    keys.delete(&Value::Int(3)).unwrap();

    assert_eq!(insert_auto(&mut keys, loc(1, 4)), 4);
}

#[test]
fn test_auto_counter_survives_reopen() {
    let (_temp, dir) = setup_key_dir();
    {
        let mut keys = open_auto(&dir);
        for slot in 1..=5 {
            insert_auto(&mut keys, loc(1, slot));
        }
        keys.delete(&Value::Int(5)).unwrap();
    }

    let mut keys = open_auto(&dir);

    assert_eq!(insert_auto(&mut keys, loc(1, 6)), 6);
}

#[test]
fn test_explicit_key_above_counter_is_kept() {
    let (_temp, dir) = setup_key_dir();
    let mut keys = open_auto(&dir);
    insert_auto(&mut keys, loc(1, 1));

    let key = keys.assign(&Value::Int(50), KeyKind::Int).unwrap();
    keys.put(&key, loc(1, 2)).unwrap();

    assert_eq!(key, Value::Int(50));
    assert_eq!(insert_auto(&mut keys, loc(1, 3)), 51);
}

#[test]
fn test_explicit_key_at_or_below_counter_is_replaced() {
    let (_temp, dir) = setup_key_dir();
    let mut keys = open_auto(&dir);
    insert_auto(&mut keys, loc(1, 1));
    insert_auto(&mut keys, loc(1, 2));

    let key = keys.assign(&Value::Int(1), KeyKind::Int).unwrap();

    assert_eq!(key, Value::Int(3));
}

#[test]
fn test_counter_behind_log_is_raised() {
    let (_temp, dir) = setup_key_dir();
    {
        let mut keys = open_auto(&dir);
        for slot in 1..=4 {
            insert_auto(&mut keys, loc(1, slot));
        }
    }
    fs::remove_file(dir.join(AUTO_FILE)).unwrap();

    let mut keys = open_auto(&dir);

    assert_eq!(keys.auto_increment(), Some(4));
    assert_eq!(insert_auto(&mut keys, loc(1, 5)), 5);
}

#[test]
fn test_corrupt_counter_file_is_rejected() {
    let (_temp, dir) = setup_key_dir();
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(AUTO_FILE), b"abc").unwrap();

    let result = AutoIncrement::open(&dir.join(AUTO_FILE));

    assert!(matches!(result, Err(ChunkDbError::Corruption(_))));
}

// =============================================================================
// Caller-Keyed Tests
// =============================================================================

#[test]
fn test_manual_key_conflict() {
    let (_temp, dir) = setup_key_dir();
    let mut keys = open_manual(&dir);
    let key = keys.assign(&Value::from("alice"), KeyKind::Str).unwrap();
    keys.put(&key, loc(1, 1)).unwrap();

    let result = keys.assign(&Value::from("alice"), KeyKind::Str);

    assert!(matches!(result, Err(ChunkDbError::Conflict(ref k)) if k == "alice"));
}

#[test]
fn test_manual_key_free_after_delete() {
    let (_temp, dir) = setup_key_dir();
    let mut keys = open_manual(&dir);
    keys.put(&Value::from("alice"), loc(1, 1)).unwrap();
    keys.delete(&Value::from("alice")).unwrap();

    let key = keys.assign(&Value::from("alice"), KeyKind::Str).unwrap();

    assert_eq!(key, Value::from("alice"));
}

#[test]
fn test_empty_string_key_rejected() {
    let (_temp, dir) = setup_key_dir();
    let mut keys = open_manual(&dir);

    let result = keys.assign(&Value::from(""), KeyKind::Str);

    assert!(matches!(result, Err(ChunkDbError::InvalidKey(_))));
}

#[test]
fn test_wrong_kind_rejected() {
    let (_temp, dir) = setup_key_dir();
    let mut keys = open_manual(&dir);

    let result = keys.assign(&Value::Int(5), KeyKind::Str);

    assert!(matches!(result, Err(ChunkDbError::InvalidKey(_))));
}

#[test]
fn test_zero_is_a_valid_manual_int_key() {
    let (_temp, dir) = setup_key_dir();
    let mut keys = open_manual(&dir);

    let key = keys.assign(&Value::Int(0), KeyKind::Int).unwrap();

    assert_eq!(key, Value::Int(0));
}

// =============================================================================
// Replay Tests
// =============================================================================

#[test]
fn test_replay_applies_puts_and_deletes() {
    let (_temp, dir) = setup_key_dir();
    {
        let mut keys = open_manual(&dir);
        keys.put(&Value::from("a"), loc(1, 10)).unwrap();
        keys.put(&Value::from("b"), loc(1, 11)).unwrap();
        keys.put(&Value::from("a"), loc(2, 12)).unwrap();
        keys.delete(&Value::from("b")).unwrap();
    }

    let keys = open_manual(&dir);

    assert_eq!(keys.get(&Value::from("a")), Some(loc(2, 12)));
    assert_eq!(keys.get(&Value::from("b")), None);
    assert_eq!(keys.live_count(), 1);
    assert_eq!(keys.entries_on_disk(), 4);
    assert_eq!(keys.last_chunk(), Some(2));
    assert!(dir.join(KEY_FILE).exists());
}

#[test]
fn test_delete_missing_key_writes_nothing() {
    let (_temp, dir) = setup_key_dir();
    let mut keys = open_manual(&dir);

    assert_eq!(keys.delete(&Value::from("ghost")).unwrap(), None);
    assert_eq!(keys.entries_on_disk(), 0);
}

// =============================================================================
// Optimize Tests
// =============================================================================

#[test]
fn test_optimize_skips_clean_log() {
    let (_temp, dir) = setup_key_dir();
    let mut keys = open_manual(&dir);
    keys.put(&Value::from("a"), loc(1, 1)).unwrap();

    assert_eq!(keys.optimize().unwrap(), None);
}

#[test]
fn test_optimize_writes_live_keys_only() {
    let (_temp, dir) = setup_key_dir();
    let mut keys = open_manual(&dir);
    for i in 0..5 {
        keys.put(&Value::from(format!("k{}", i)), loc(1, i)).unwrap();
    }
    keys.delete(&Value::from("k1")).unwrap();
    keys.delete(&Value::from("k3")).unwrap();

    let sibling = keys.optimize().unwrap().unwrap();

    // Replaying the sibling alone gives the same live map
    let replay_dir = dir.join("replay");
    fs::create_dir_all(&replay_dir).unwrap();
    fs::copy(&sibling, replay_dir.join(KEY_FILE)).unwrap();
    let replayed = open_manual(&replay_dir);
    assert_eq!(replayed.entries_on_disk(), 3);
    assert_eq!(replayed.live_count(), 3);
    assert_eq!(replayed.get(&Value::from("k4")), Some(loc(1, 4)));
    assert_eq!(replayed.get(&Value::from("k1")), None);
}
