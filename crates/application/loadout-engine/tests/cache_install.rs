use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use tempfile::tempdir;

use loadout_core::settings::DeployMode;
use loadout_core::ProfileMod;
use loadout_engine::adapters::{CacheInstaller, CatalogVersionProvider, DirBackupService};
use loadout_engine::{BackupService, ModInstaller, VersionProvider};
use loadout_infra::deploy::{classify_entry, EntryState};

fn utf8_root(dir: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
}

fn seed_cache(root: &Utf8Path, mod_id: u64, version: u64, entry: &str) {
    let payload = root
        .join("cache")
        .join(mod_id.to_string())
        .join(version.to_string())
        .join(entry);
    fs::create_dir_all(payload.as_std_path()).unwrap();
    fs::write(payload.join("mod.package").as_std_path(), b"payload").unwrap();
}

#[tokio::test]
async fn catalog_provider_filters_to_requested_ids() {
    let dir = tempdir().unwrap();
    let root = utf8_root(&dir);
    let catalog = root.join("catalog.json");
    fs::write(
        catalog.as_std_path(),
        r#"{
            "42": {"latestVersionId": 100, "fileName": "better-stairs-v2.zip", "fileDate": "2026-07-01T00:00:00Z", "fileSize": 2048},
            "77": {"latestVersionId": 300, "fileName": "faster-lifts-v9.zip", "fileDate": "2026-07-02T00:00:00Z", "fileSize": 512}
        }"#,
    )
    .unwrap();

    let provider = CatalogVersionProvider::new(catalog);
    let versions = provider.latest_versions(&[42, 5]).await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[&42].latest_version_id, 100);
    assert_eq!(versions[&42].file_name, "better-stairs-v2.zip");
}

#[tokio::test]
async fn cache_installer_materializes_the_payload() {
    let dir = tempdir().unwrap();
    let root = utf8_root(&dir);
    seed_cache(&root, 42, 100, "better-stairs");
    let mods = root.join("Mods");
    fs::create_dir_all(mods.as_std_path()).unwrap();

    let installer = CacheInstaller::new(root.join("cache"), DeployMode::Copy);
    let report = installer.install(42, &mods, None, Some(100)).await.unwrap();

    assert!(report.success, "{:?}", report.error);
    assert_eq!(report.mod_name, "better-stairs");
    assert_eq!(classify_entry(&mods.join("better-stairs")), EntryState::Managed);
    assert!(mods.join("better-stairs/mod.package").exists());
}

#[tokio::test]
async fn cache_installer_picks_newest_version_when_unpinned() {
    let dir = tempdir().unwrap();
    let root = utf8_root(&dir);
    seed_cache(&root, 42, 100, "better-stairs");
    seed_cache(&root, 42, 140, "better-stairs");
    fs::write(
        root.join("cache/42/140/better-stairs/v140-only").as_std_path(),
        b"x",
    )
    .unwrap();
    let mods = root.join("Mods");
    fs::create_dir_all(mods.as_std_path()).unwrap();

    let installer = CacheInstaller::new(root.join("cache"), DeployMode::Copy);
    let report = installer.install(42, &mods, None, None).await.unwrap();

    assert!(report.success);
    assert!(mods.join("better-stairs/v140-only").exists());
}

#[tokio::test]
async fn missing_payload_is_an_in_band_failure() {
    let dir = tempdir().unwrap();
    let root = utf8_root(&dir);
    let mods = root.join("Mods");
    fs::create_dir_all(mods.as_std_path()).unwrap();

    let installer = CacheInstaller::new(root.join("cache"), DeployMode::Copy);
    let report = installer.install(9, &mods, None, Some(1)).await.unwrap();

    assert!(!report.success);
    assert!(report.error.unwrap().contains("download cache"));
}

#[tokio::test]
async fn backup_copies_the_materialized_entry_aside() {
    let dir = tempdir().unwrap();
    let root = utf8_root(&dir);
    let mods = root.join("Mods");
    fs::create_dir_all(mods.join("better-stairs").as_std_path()).unwrap();
    fs::write(mods.join("better-stairs/mod.package").as_std_path(), b"v1").unwrap();

    let entry = ProfileMod {
        mod_id: Some(42),
        local_mod_id: None,
        installed_version_id: Some(100),
        file_hash: "00".into(),
        file_name: "better-stairs".into(),
        enabled: true,
        install_date: Utc::now(),
        cache_location: "42/100".into(),
    };

    let service = DirBackupService::new(mods.clone(), root.join("backups"));
    let receipt = service.backup(&entry).await.unwrap();

    let backup_path = receipt.backup_path.expect("backup should be created");
    assert!(backup_path.join("mod.package").exists());

    // Nothing materialized means nothing to back up, and no error either.
    let mut ghost = entry.clone();
    ghost.file_name = "not-deployed".into();
    let receipt = service.backup(&ghost).await.unwrap();
    assert!(receipt.backup_path.is_none());
}
