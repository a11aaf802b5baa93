//! Property-based tests for package correctness
//!
//! Uses proptest to check that stored assets read back unchanged and that
//! bundle offsets stay consistent across many random scenarios.

use asset_pack::{HeaderIndex, HeaderRecord, NameRegistry, PackageStore};
use proptest::prelude::*;
use std::collections::BTreeMap;
use tempfile::TempDir;

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9_/.]{1,24}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_assets_roundtrip_through_reopen(
        assets in prop::collection::btree_map(
            key_strategy(),
            prop::collection::vec(any::<u8>(), 1..4096),
            1..12
        )
    ) {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("prop");

        {
            let store = PackageStore::create(&base).unwrap();
            for (key, data) in &assets {
                store.add_asset_from_memory(data, key, 0).unwrap();
            }
        }

        let store = PackageStore::open_existing(&base).unwrap();
        prop_assert_eq!(store.asset_count(), assets.len());
        prop_assert_eq!(store.asset_keys(), assets.keys().cloned().collect::<Vec<_>>());
        for (key, data) in &assets {
            prop_assert_eq!(&store.get_asset_to_memory(key).unwrap(), data);
        }
    }

    #[test]
    fn prop_each_add_lands_at_bundle_end(
        sizes in prop::collection::vec(1usize..8192, 1..20)
    ) {
        let dir = TempDir::new().unwrap();
        let store = PackageStore::create(dir.path().join("offsets")).unwrap();

        for (i, size) in sizes.iter().enumerate() {
            let before = store.bundle_len().unwrap();
            let data: Vec<u8> = (0..*size).map(|b| (b * (i + 3)) as u8).collect();
            let record = store.add_asset_from_memory(&data, &format!("a{}", i), 0).unwrap();

            prop_assert_eq!(record.bundle_offset as u64, before);
            prop_assert_eq!(
                store.bundle_len().unwrap(),
                before + record.compressed_size as u64
            );
        }
    }

    #[test]
    fn prop_compaction_preserves_survivors(
        count in 2usize..16,
        removed in prop::collection::vec(any::<bool>(), 16)
    ) {
        let dir = TempDir::new().unwrap();
        let store = PackageStore::create(dir.path().join("compact")).unwrap();

        for i in 0..count {
            store.add_asset_from_memory(&vec![i as u8; 100 + i * 50], &format!("k{}", i), 0).unwrap();
        }
        for i in (0..count).filter(|&i| removed[i]) {
            store.remove_asset(&format!("k{}", i)).unwrap();
        }
        let live: u64 = store
            .asset_keys()
            .iter()
            .map(|k| store.header_record(k).unwrap().compressed_size as u64)
            .sum();

        store.compact().unwrap();
        prop_assert_eq!(store.bundle_len().unwrap(), live);
        for i in (0..count).filter(|&i| !removed[i]) {
            prop_assert_eq!(store.get_asset_to_memory(&format!("k{}", i)).unwrap(), vec![i as u8; 100 + i * 50]);
        }
    }

    #[test]
    fn prop_collections_survive_serialization(
        entries in prop::collection::btree_map(
            key_strategy(),
            any::<(u32, u32, u32, u32, u32)>(),
            0..40
        )
    ) {
        let mut names = NameRegistry::new();
        let mut headers = HeaderIndex::new();
        for (key, (version, compressed_size, original_size, bundle_offset, checksum)) in &entries {
            names.append(key).unwrap();
            headers.insert(key, HeaderRecord {
                version: *version,
                compressed_size: *compressed_size,
                original_size: *original_size,
                bundle_offset: *bundle_offset,
                checksum: *checksum,
            }).unwrap();
        }

        let name_bytes = names.serialize();
        let header_bytes = headers.serialize();
        prop_assert_eq!(name_bytes.len(), names.byte_size());
        prop_assert_eq!(header_bytes.len(), headers.byte_size());

        if entries.is_empty() {
            prop_assert!(name_bytes.is_empty());
            return Ok(());
        }

        let mut names_back = NameRegistry::new();
        names_back.deserialize(&name_bytes).unwrap();
        let mut headers_back = HeaderIndex::new();
        headers_back.deserialize(&header_bytes).unwrap();

        let restored: BTreeMap<_, _> = headers_back.iter().map(|(k, r)| (k.to_string(), *r)).collect();
        let original: BTreeMap<_, _> = headers.iter().map(|(k, r)| (k.to_string(), *r)).collect();
        prop_assert_eq!(restored, original);
        prop_assert_eq!(
            names_back.iter().collect::<Vec<_>>(),
            names.iter().collect::<Vec<_>>()
        );
    }
}
