//! Tests for the shared log file layer
//!
//! These tests verify:
//! - Appended frames replay in order
//! - A partial trailing frame is cut off on replay
//! - Appends after a cut start on a frame boundary

mod common;

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chunkdb::log::{encode_plain, encode_slotted, FrameKind, LogFile};
use chunkdb::SyncStrategy;
use common::setup_temp_dir;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_log() -> (TempDir, PathBuf) {
    let (temp, dir) = setup_temp_dir();
    (temp, dir.join("test.log"))
}

fn append_plain(path: &Path, payloads: &[&[u8]]) {
    let mut log = LogFile::open(path, SyncStrategy::EveryWrite).unwrap();
    for payload in payloads {
        log.append(&encode_plain(payload)).unwrap();
    }
}

fn collect_plain(path: &Path) -> (Vec<Vec<u8>>, bool) {
    let mut log = LogFile::open(path, SyncStrategy::OnFlush).unwrap();
    let mut payloads = Vec::new();
    let result = log
        .replay(FrameKind::Plain, |frame| {
            payloads.push(frame.payload);
            Ok(())
        })
        .unwrap();
    (payloads, result.was_truncated)
}

// =============================================================================
// Replay Tests
// =============================================================================

#[test]
fn test_replay_empty_log() {
    let (_temp, path) = setup_temp_log();

    let (payloads, truncated) = collect_plain(&path);

    assert!(payloads.is_empty());
    assert!(!truncated);
    assert!(path.exists());
}

#[test]
fn test_replay_in_append_order() {
    let (_temp, path) = setup_temp_log();
    append_plain(&path, &[b"one", b"two", b"", b"three"]);

    let (payloads, truncated) = collect_plain(&path);

    assert_eq!(
        payloads,
        vec![b"one".to_vec(), b"two".to_vec(), Vec::new(), b"three".to_vec()]
    );
    assert!(!truncated);
}

#[test]
fn test_replay_slotted_frames() {
    let (_temp, path) = setup_temp_log();
    {
        let mut log = LogFile::open(&path, SyncStrategy::EveryWrite).unwrap();
        log.append(&encode_slotted(42, b"alpha")).unwrap();
        log.append(&encode_slotted(7, b"beta")).unwrap();
        assert_eq!(log.frames(), 2);
    }

    let mut log = LogFile::open(&path, SyncStrategy::OnFlush).unwrap();
    let mut frames = Vec::new();
    log.replay(FrameKind::Slotted, |frame| {
        frames.push((frame.slot, frame.payload));
        Ok(())
    })
    .unwrap();

    assert_eq!(
        frames,
        vec![(Some(42), b"alpha".to_vec()), (Some(7), b"beta".to_vec())]
    );
}

// =============================================================================
// Partial Write Tests
// =============================================================================

#[test]
fn test_partial_payload_is_cut_off() {
    let (_temp, path) = setup_temp_log();
    append_plain(&path, &[b"complete"]);
    let good_len = fs::metadata(&path).unwrap().len();

    // Length prefix promises 100 bytes, only 3 follow
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&100u64.to_le_bytes()).unwrap();
        file.write_all(b"abc").unwrap();
    }

    let (payloads, truncated) = collect_plain(&path);

    assert_eq!(payloads, vec![b"complete".to_vec()]);
    assert!(truncated);
    assert_eq!(fs::metadata(&path).unwrap().len(), good_len);
}

#[test]
fn test_partial_header_is_cut_off() {
    let (_temp, path) = setup_temp_log();
    append_plain(&path, &[b"a", b"b"]);
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[1, 0, 0]).unwrap();
    }

    let (payloads, truncated) = collect_plain(&path);

    assert_eq!(payloads.len(), 2);
    assert!(truncated);
}

#[test]
fn test_append_after_cut_stays_aligned() {
    let (_temp, path) = setup_temp_log();
    append_plain(&path, &[b"first"]);
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&50u64.to_le_bytes()).unwrap();
    }

    {
        let mut log = LogFile::open(&path, SyncStrategy::EveryWrite).unwrap();
        let result = log.replay(FrameKind::Plain, |_| Ok(())).unwrap();
        assert!(result.was_truncated);
        log.append(&encode_plain(b"second")).unwrap();
    }

    let (payloads, truncated) = collect_plain(&path);

    assert_eq!(payloads, vec![b"first".to_vec(), b"second".to_vec()]);
    assert!(!truncated);
}
