use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::tempdir;

use loadout_cli::commands;
use loadout_persistence::DataStore;

fn utf8(path: &std::path::Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
}

fn seed_payload(cache: &Utf8Path, mod_id: u64, version: u64, entry: &str, marker: &str) {
    let dir = cache
        .join(mod_id.to_string())
        .join(version.to_string())
        .join(entry);
    fs::create_dir_all(dir.as_std_path()).unwrap();
    fs::write(dir.join("mod.package").as_std_path(), marker.as_bytes()).unwrap();
}

/// Full pass over the public surface: create a profile, register a cached
/// mod, activate, discover an update through a catalog, batch-update.
#[tokio::test]
async fn profile_to_update_workflow() {
    let dir = tempdir().unwrap();
    let root = utf8(dir.path());
    let services = commands::services(Some(root.join("data"))).unwrap();

    // Point the engine at sandboxed directories.
    let mut settings = services.store.load_settings().unwrap();
    settings.mods_path = root.join("Mods");
    settings.cache_root = root.join("cache");
    settings.backups_root = root.join("backups");
    services.store.save_settings(&settings).unwrap();

    seed_payload(&settings.cache_root, 42, 100, "better-stairs", "v1");

    commands::handle_profile_create(
        &services,
        "Main".into(),
        Some("daily set".into()),
        vec!["gameplay".into()],
    )
    .unwrap();
    commands::handle_add_mod(
        &services,
        "Main".into(),
        Some(42),
        None,
        "better-stairs.zip".into(),
        "42/100".into(),
        None,
        None,
        false,
    )
    .unwrap();

    commands::cmd_activate(&services, "Main".into(), None)
        .await
        .unwrap();
    assert!(settings.mods_path.join("better-stairs/mod.package").exists());

    // A catalog that knows a newer file for mod 42.
    let catalog = root.join("catalog.json");
    fs::write(
        catalog.as_std_path(),
        r#"{"42": {"latestVersionId": 140, "fileName": "better-stairs-v2.zip", "fileDate": "2026-08-01T00:00:00Z", "fileSize": 4096}}"#,
    )
    .unwrap();
    seed_payload(&settings.cache_root, 42, 140, "better-stairs", "v2");

    commands::cmd_check(&services, catalog.clone()).await.unwrap();
    let state = services.store.load_update_state().unwrap();
    assert!(state.updates.contains_key(&42));
    assert_eq!(state.updates[&42].latest_version_id, 140);

    commands::cmd_update_all(&services, catalog.clone())
        .await
        .unwrap();
    let state = services.store.load_update_state().unwrap();
    assert!(state.updates.is_empty(), "clean install clears the entry");

    // The refresh recorded the installed version, so a second check finds
    // nothing pending.
    commands::cmd_check(&services, catalog).await.unwrap();
    assert!(services.store.load_update_state().unwrap().updates.is_empty());
    assert_eq!(
        fs::read(settings.mods_path.join("better-stairs/mod.package").as_std_path()).unwrap(),
        b"v2"
    );

    // The pre-update payload was backed up first.
    let backups: Vec<_> = fs::read_dir(settings.backups_root.as_std_path())
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    assert_eq!(backups.len(), 1);
}

#[tokio::test]
async fn activate_refuses_unknown_profile() {
    let dir = tempdir().unwrap();
    let root = utf8(dir.path());
    let services = commands::services(Some(root.join("data"))).unwrap();

    assert!(commands::cmd_activate(&services, "ghost".into(), None)
        .await
        .is_err());
}
