use std::collections::BTreeSet;

use camino::Utf8PathBuf;
use chrono::Utc;
use tempfile::tempdir;

use loadout_core::registry::ProfileRegistry;
use loadout_core::updates::{UpdateInfo, UpdateState};
use loadout_core::{palette_color, Profile, ProfileMod};
use loadout_persistence::{DataStore, FileDataStore, StorageError};

fn store_in(dir: &tempfile::TempDir) -> FileDataStore {
    FileDataStore::new(Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap())
}

fn sample_profile(id: &str, name: &str) -> Profile {
    Profile {
        id: id.into(),
        name: name.into(),
        description: "test set".into(),
        tags: BTreeSet::from(["gameplay".to_string()]),
        icon_color: palette_color(0).into(),
        mods: vec![ProfileMod {
            mod_id: Some(42),
            local_mod_id: None,
            installed_version_id: Some(100),
            file_hash: "deadbeef".into(),
            file_name: "better-stairs.zip".into(),
            enabled: true,
            install_date: Utc::now(),
            cache_location: "42/100".into(),
        }],
        is_active: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn profile_documents_round_trip() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir);

    let profile = sample_profile("p1", "Main");
    store.save_profile(&profile).unwrap();

    let loaded = store.load_profile("p1").unwrap();
    assert_eq!(loaded, profile);

    let all = store.load_profiles().unwrap();
    assert_eq!(all.len(), 1);

    store.delete_profile("p1").unwrap();
    assert!(matches!(
        store.load_profile("p1"),
        Err(StorageError::ProfileNotFound(_))
    ));
}

#[test]
fn missing_documents_fall_back_to_defaults() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir);

    assert_eq!(store.load_registry().unwrap(), ProfileRegistry::default());
    assert!(store.load_disk_config().unwrap().is_none());
    assert!(store.load_update_state().unwrap().updates.is_empty());
    assert!(store.load_settings().unwrap().backups_enabled);
}

#[test]
fn registry_and_update_state_round_trip() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir);

    let mut registry = ProfileRegistry::default();
    registry.track("p1".into());
    registry.active_profile_id = Some("p1".into());
    registry.last_sync = Utc::now();
    store.save_registry(&registry).unwrap();
    assert_eq!(store.load_registry().unwrap(), registry);

    let mut state = UpdateState::default();
    state.updates.insert(
        42,
        UpdateInfo {
            mod_id: 42,
            mod_name: "Better Stairs".into(),
            latest_version_id: 101,
            discovered_at: Utc::now(),
        },
    );
    state.last_check = Some(Utc::now());
    store.save_update_state(&state).unwrap();
    assert_eq!(store.load_update_state().unwrap(), state);
}

#[test]
fn saving_twice_overwrites_atomically() {
    let dir = tempdir().unwrap();
    let store = store_in(&dir);

    let mut profile = sample_profile("p1", "Main");
    store.save_profile(&profile).unwrap();
    profile.name = "Renamed".into();
    store.save_profile(&profile).unwrap();

    let loaded = store.load_profile("p1").unwrap();
    assert_eq!(loaded.name, "Renamed");
    // No stray .tmp files left behind.
    let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("profiles"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|x| x == "tmp") == Some(true))
        .collect();
    assert!(leftovers.is_empty());
}
