use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::tempdir;

use loadout_core::settings::DeployMode;
use loadout_engine::reconcile::{count_managed, ActivationJournal, PENDING_JOURNAL};
use loadout_engine::{DesiredEntry, ModSetReconciler};

fn utf8_root(dir: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
}

/// Seed a cache source directory holding one mod payload.
fn seed_mod(root: &Utf8Path, name: &str) -> DesiredEntry {
    let source = root.join("cache").join(name);
    fs::create_dir_all(source.as_std_path()).unwrap();
    fs::write(source.join("mod.package").as_std_path(), name.as_bytes()).unwrap();
    DesiredEntry {
        source_path: source,
        dest_name: name.to_string(),
    }
}

fn entry_names(mods: &Utf8Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(mods.as_std_path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn activation_materializes_exactly_the_desired_set() {
    let dir = tempdir().unwrap();
    let root = utf8_root(&dir);
    let mods = root.join("Mods");
    let desired = vec![seed_mod(&root, "alpha"), seed_mod(&root, "beta")];

    let reconciler = ModSetReconciler::new(DeployMode::Copy);
    let report = reconciler
        .activate_profile(&mods, &desired, Some("p1"))
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.created, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(entry_names(&mods), vec!["alpha", "beta"]);
    assert!(reconciler.verify(&mods, 2).unwrap());
    assert!(!mods.join(PENDING_JOURNAL).exists());
}

#[tokio::test]
async fn switching_profiles_replaces_overlapping_entries_fresh() {
    let dir = tempdir().unwrap();
    let root = utf8_root(&dir);
    let mods = root.join("Mods");
    let reconciler = ModSetReconciler::new(DeployMode::Copy);

    // Profile A: three mods.
    let a = vec![
        seed_mod(&root, "alpha"),
        seed_mod(&root, "beta"),
        seed_mod(&root, "gamma"),
    ];
    reconciler
        .activate_profile(&mods, &a, Some("a"))
        .await
        .unwrap();
    assert!(reconciler.verify(&mods, 3).unwrap());

    // A sentinel inside the materialized overlap entry must not survive the
    // switch: the entry is torn down and rebuilt, never left stale.
    fs::write(mods.join("beta/stale-marker").as_std_path(), b"old").unwrap();

    // Profile B: two mods, one overlapping with A.
    let b = vec![seed_mod(&root, "beta"), seed_mod(&root, "delta")];
    let report = reconciler
        .activate_profile(&mods, &b, Some("b"))
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(entry_names(&mods), vec!["beta", "delta"]);
    assert!(reconciler.verify(&mods, 2).unwrap());
    assert!(!mods.join("beta/stale-marker").exists());
}

#[tokio::test]
async fn repeated_activation_converges_to_the_same_set() {
    let dir = tempdir().unwrap();
    let root = utf8_root(&dir);
    let mods = root.join("Mods");
    let desired = vec![seed_mod(&root, "alpha"), seed_mod(&root, "beta")];
    let reconciler = ModSetReconciler::new(DeployMode::Link);

    for _ in 0..2 {
        let report = reconciler
            .activate_profile(&mods, &desired, None)
            .await
            .unwrap();
        assert!(report.success);
        assert_eq!(report.created, 2);
        assert_eq!(entry_names(&mods), vec!["alpha", "beta"]);
    }
}

#[tokio::test]
async fn foreign_entries_survive_a_switch_untouched() {
    let dir = tempdir().unwrap();
    let root = utf8_root(&dir);
    let mods = root.join("Mods");
    fs::create_dir_all(mods.join("hand-installed").as_std_path()).unwrap();
    fs::write(
        mods.join("hand-installed/precious.package").as_std_path(),
        b"mine",
    )
    .unwrap();
    fs::write(mods.join("Resource.cfg").as_std_path(), b"cfg").unwrap();

    let desired = vec![seed_mod(&root, "alpha")];
    let reconciler = ModSetReconciler::new(DeployMode::Copy);
    let report = reconciler
        .activate_profile(&mods, &desired, None)
        .await
        .unwrap();

    assert!(report.success);
    let mut skipped = report.skipped_foreign.clone();
    skipped.sort();
    assert_eq!(skipped, vec!["Resource.cfg", "hand-installed"]);
    assert!(mods.join("hand-installed/precious.package").exists());
    assert!(mods.join("Resource.cfg").exists());
    // Managed count excludes the foreign entries.
    assert!(reconciler.verify(&mods, 1).unwrap());
    assert_eq!(count_managed(&mods).unwrap(), 1);
}

#[tokio::test]
async fn one_bad_entry_does_not_block_the_rest() {
    let dir = tempdir().unwrap();
    let root = utf8_root(&dir);
    let mods = root.join("Mods");

    let desired = vec![
        seed_mod(&root, "alpha"),
        DesiredEntry {
            source_path: root.join("cache/not-downloaded"),
            dest_name: "missing".into(),
        },
        seed_mod(&root, "beta"),
    ];

    let reconciler = ModSetReconciler::new(DeployMode::Copy);
    let report = reconciler
        .activate_profile(&mods, &desired, None)
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.created, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].target_path, mods.join("missing"));
    assert_eq!(entry_names(&mods), vec!["alpha", "beta"]);
}

#[tokio::test]
async fn escaping_entry_names_are_rejected_per_entry() {
    let dir = tempdir().unwrap();
    let root = utf8_root(&dir);
    let mods = root.join("Mods");

    let mut bad = seed_mod(&root, "alpha");
    bad.dest_name = "../outside".into();
    let desired = vec![bad, seed_mod(&root, "beta")];

    let reconciler = ModSetReconciler::new(DeployMode::Copy);
    let report = reconciler
        .activate_profile(&mods, &desired, None)
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.created, 1);
    assert_eq!(report.failed, 1);
    assert!(!root.join("outside").exists());
}

#[tokio::test]
async fn interrupted_activation_leaves_a_detectable_journal() {
    let dir = tempdir().unwrap();
    let root = utf8_root(&dir);
    let mods = root.join("Mods");
    fs::create_dir_all(mods.as_std_path()).unwrap();

    assert!(ModSetReconciler::pending_activation(&mods)
        .unwrap()
        .is_none());

    // Simulate a crash between teardown and materialization: the journal is
    // on disk but activation never finished.
    let desired = vec![seed_mod(&root, "alpha")];
    let journal = ActivationJournal {
        profile_id: Some("p1".into()),
        desired: desired.clone(),
        started_at: chrono::Utc::now(),
    };
    fs::write(
        mods.join(PENDING_JOURNAL).as_std_path(),
        serde_json::to_string(&journal).unwrap(),
    )
    .unwrap();

    let pending = ModSetReconciler::pending_activation(&mods)
        .unwrap()
        .expect("journal should be detected");
    assert_eq!(pending.profile_id.as_deref(), Some("p1"));
    assert_eq!(pending.desired, desired);

    // Resuming is just re-running the recorded activation.
    let reconciler = ModSetReconciler::new(DeployMode::Copy);
    let report = reconciler
        .activate_profile(&mods, &pending.desired, pending.profile_id.as_deref())
        .await
        .unwrap();
    assert!(report.success);
    assert!(ModSetReconciler::pending_activation(&mods)
        .unwrap()
        .is_none());
}
