#![no_main]
use asset_pack::{HeaderIndex, NameRegistry, PackageStore, METADATA_FILE_EXT, BUNDLE_FILE_EXT};
use libfuzzer_sys::fuzz_target;

// Arbitrary metadata bytes must be rejected with an error, never a panic.
fuzz_target!(|data: &[u8]| {
    let mut names = NameRegistry::new();
    let _ = names.deserialize(data);

    let mut headers = HeaderIndex::new();
    let _ = headers.deserialize(data);

    let dir = std::env::temp_dir().join(format!("asset-pack-fuzz-{}", std::process::id()));
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }
    let base = dir.join("fuzz");
    let mut meta = base.as_os_str().to_owned();
    meta.push(METADATA_FILE_EXT);
    let mut bundle = base.as_os_str().to_owned();
    bundle.push(BUNDLE_FILE_EXT);

    if std::fs::write(&meta, data).is_err() || std::fs::write(&bundle, data).is_err() {
        return;
    }
    if let Ok(store) = PackageStore::open_existing(&base) {
        for key in store.asset_keys() {
            let _ = store.get_asset_to_memory(&key);
        }
        let _ = store.verify();
    }
});
