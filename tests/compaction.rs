//! Bundle compaction tests
//!
//! Removed assets and interrupted adds leave unreferenced runs behind;
//! compaction must cut them out without disturbing the survivors.

use asset_pack::{PackageError, PackageStore, BUNDLE_FILE_EXT};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn bundle_path(base: &Path) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(BUNDLE_FILE_EXT);
    PathBuf::from(name)
}

fn asset(i: usize) -> Vec<u8> {
    (0..2000 + i * 37).map(|b| ((b * 31 + i) % 256) as u8).collect()
}

#[test]
fn test_remove_then_compact_shrinks_bundle() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("shrink");
    let store = PackageStore::create(&base).unwrap();

    for i in 0..10 {
        store.add_asset_from_memory(&asset(i), &format!("asset{}", i), 0).unwrap();
    }
    let removed: u64 = [1usize, 4, 5, 9]
        .iter()
        .map(|i| store.remove_asset(&format!("asset{}", i)).unwrap().compressed_size as u64)
        .sum();

    // Logical delete leaves bytes in place
    let before = store.bundle_len().unwrap();
    assert_eq!(store.asset_count(), 6);

    let stats = store.compact().unwrap();
    assert_eq!(stats.bundle_len_before, before);
    assert_eq!(stats.reclaimed(), removed);
    // 4 and 5 are adjacent, 9 is trailing
    assert_eq!(stats.runs_removed, 3);
    assert_eq!(store.bundle_len().unwrap(), before - removed);

    for i in [0usize, 2, 3, 6, 7, 8] {
        assert_eq!(store.get_asset_to_memory(&format!("asset{}", i)).unwrap(), asset(i));
    }
    assert!(matches!(
        store.get_asset_to_memory("asset4"),
        Err(PackageError::NotFound(_))
    ));

    drop(store);
    let store = PackageStore::open_existing(&base).unwrap();
    store.verify().unwrap();
    assert_eq!(store.asset_count(), 6);
    assert_eq!(store.get_asset_to_memory("asset8").unwrap(), asset(8));
}

#[test]
fn test_compact_reclaims_orphaned_tail() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("orphan");

    {
        let store = PackageStore::create(&base).unwrap();
        store.add_asset_from_memory(&asset(0), "kept", 0).unwrap();
    }

    // Simulate an add that appended its run but never rewrote the metadata
    {
        let mut bundle = OpenOptions::new().append(true).open(bundle_path(&base)).unwrap();
        bundle.write_all(&[0x5A; 777]).unwrap();
    }

    let store = PackageStore::open_existing(&base).unwrap();
    let before = store.bundle_len().unwrap();
    let stats = store.compact().unwrap();
    assert_eq!(stats.reclaimed(), 777);
    assert_eq!(stats.runs_removed, 1);
    assert_eq!(store.bundle_len().unwrap(), before - 777);
    assert_eq!(store.get_asset_to_memory("kept").unwrap(), asset(0));

    // New adds land right after the live data
    let record = store.add_asset_from_memory(&asset(1), "next", 0).unwrap();
    assert_eq!(record.bundle_offset as u64, before - 777);
}

#[test]
fn test_compact_without_gaps_is_noop() {
    let dir = TempDir::new().unwrap();
    let store = PackageStore::create(dir.path().join("noop")).unwrap();
    for i in 0..3 {
        store.add_asset_from_memory(&asset(i), &format!("a{}", i), 0).unwrap();
    }
    let records: Vec<_> = store
        .asset_keys()
        .iter()
        .map(|k| store.header_record(k).unwrap())
        .collect();

    let stats = store.compact().unwrap();
    assert_eq!(stats.reclaimed(), 0);
    assert_eq!(stats.runs_removed, 0);

    let after: Vec<_> = store
        .asset_keys()
        .iter()
        .map(|k| store.header_record(k).unwrap())
        .collect();
    assert_eq!(records, after);
}

#[test]
fn test_compact_everything_removed() {
    let dir = TempDir::new().unwrap();
    let store = PackageStore::create(dir.path().join("all-gone")).unwrap();
    store.add_asset_from_memory(&asset(0), "a", 0).unwrap();
    store.add_asset_from_memory(&asset(1), "b", 0).unwrap();
    store.remove_asset("a").unwrap();
    store.remove_asset("b").unwrap();

    store.compact().unwrap();
    assert_eq!(store.bundle_len().unwrap(), 0);
    assert_eq!(store.asset_count(), 0);

    // Removed keys can be reused
    store.add_asset_from_memory(b"again", "a", 0).unwrap();
    assert_eq!(store.get_asset_to_memory("a").unwrap(), b"again");
}

#[test]
fn test_remove_missing_key() {
    let dir = TempDir::new().unwrap();
    let store = PackageStore::create(dir.path().join("missing")).unwrap();
    assert!(matches!(
        store.remove_asset("ghost"),
        Err(PackageError::NotFound(_))
    ));
    assert!(matches!(store.remove_asset(""), Err(PackageError::EmptyKey)));
}
