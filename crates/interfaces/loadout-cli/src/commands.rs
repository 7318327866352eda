use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use camino::Utf8PathBuf;
use humansize::{format_size, DECIMAL};
use indicatif::{ProgressBar, ProgressStyle};

use loadout_core::settings::DeployMode;
use loadout_core::{ModKey, Profile, ProfileMod};
use loadout_engine::adapters::{CacheInstaller, CatalogVersionProvider, DirBackupService};
use loadout_engine::{
    DesiredEntry, DiskCalibrator, ModSetReconciler, ProfileStore, UpdateOrchestrator,
};
use loadout_infra::benchmark::WriteBenchmark;
use loadout_infra::hashing::sha256_file;
use loadout_persistence::{DataStore, FileDataStore};

pub struct Services {
    pub store: Arc<FileDataStore>,
    pub profiles: Arc<ProfileStore>,
    pub calibrator: Arc<DiskCalibrator>,
}

pub fn services(data_dir: Option<Utf8PathBuf>) -> Result<Services> {
    let store = match data_dir {
        Some(dir) => Arc::new(FileDataStore::new(dir)),
        None => Arc::new(FileDataStore::at_default_location()?),
    };
    let bench = Arc::new(WriteBenchmark::new(store.root().to_owned()));
    let profiles = Arc::new(ProfileStore::new(store.clone()));
    let calibrator = Arc::new(DiskCalibrator::new(store.clone(), bench));
    Ok(Services {
        store,
        profiles,
        calibrator,
    })
}

pub fn find_profile(services: &Services, name_or_id: &str) -> Result<Profile> {
    services
        .profiles
        .get_all_profiles()?
        .into_iter()
        .find(|p| p.name.eq_ignore_ascii_case(name_or_id) || p.id == name_or_id)
        .ok_or_else(|| anyhow!("Profile '{}' not found", name_or_id))
}

fn orchestrator(services: &Services, catalog: Utf8PathBuf) -> Result<UpdateOrchestrator> {
    let settings = services.store.load_settings()?;
    Ok(UpdateOrchestrator::new(
        services.store.clone(),
        services.profiles.clone(),
        services.calibrator.clone(),
        Arc::new(CatalogVersionProvider::new(catalog)),
        Arc::new(CacheInstaller::new(
            settings.cache_root.clone(),
            settings.deploy_mode,
        )),
        Arc::new(DirBackupService::new(
            settings.mods_path.clone(),
            settings.backups_root.clone(),
        )),
    ))
}

pub fn handle_profile_list(services: &Services) -> Result<()> {
    let profiles = services.profiles.get_all_profiles()?;

    if profiles.is_empty() {
        println!("No profiles found.");
        return Ok(());
    }

    println!("{:<38} {:<24} {:<6} {:<6}", "ID", "NAME", "MODS", "ACTIVE");
    println!("{:-<38} {:-<24} {:-<6} {:-<6}", "", "", "", "");
    for p in profiles {
        println!(
            "{:<38} {:<24} {:<6} {:<6}",
            p.id,
            p.name,
            p.mods.len(),
            if p.is_active { "yes" } else { "" }
        );
    }
    Ok(())
}

pub fn handle_profile_create(
    services: &Services,
    name: String,
    description: Option<String>,
    tags: Vec<String>,
) -> Result<()> {
    let profile = services.profiles.create_profile(
        &name,
        description.as_deref().unwrap_or(""),
        tags.into_iter().collect::<BTreeSet<_>>(),
    )?;
    println!("Profile '{}' ({}) created successfully.", profile.name, profile.id);
    Ok(())
}

pub fn handle_profile_remove(services: &Services, name: String) -> Result<()> {
    let profile = find_profile(services, &name)?;
    services.profiles.delete_profile(&profile.id)?;
    println!("Profile '{}' removed.", profile.name);
    Ok(())
}

pub fn handle_profile_show(services: &Services, name: String) -> Result<()> {
    let profile = find_profile(services, &name)?;

    println!(":: Profile '{}'", profile.name);
    println!("   ID:          {}", profile.id);
    println!("   Description: {}", profile.description);
    println!("   Tags:        {}", profile.tags.iter().cloned().collect::<Vec<_>>().join(", "));
    println!("   Color:       {}", profile.icon_color);
    println!("   Active:      {}", profile.is_active);
    println!("   Mods:        {}", profile.mods.len());
    for m in &profile.mods {
        let key = m.key().map(|k| k.to_string()).unwrap_or_else(|| "?".into());
        println!(
            "     {:<12} {:<32} {}",
            key,
            m.file_name,
            if m.enabled { "enabled" } else { "disabled" }
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn handle_add_mod(
    services: &Services,
    profile: String,
    mod_id: Option<u64>,
    local_id: Option<String>,
    file_name: String,
    cache_location: String,
    version: Option<u64>,
    hash: Option<String>,
    disabled: bool,
) -> Result<()> {
    let target = find_profile(services, &profile)?;
    let settings = services.store.load_settings()?;

    let file_hash = match hash {
        Some(h) => h,
        None => {
            let payload = settings.cache_root.join(&cache_location);
            if payload.is_file() {
                sha256_file(&payload).with_context(|| format!("hash {payload}"))?
            } else {
                String::new()
            }
        }
    };

    // Marketplace mods keyed `<mod_id>/<version>` in the cache carry their
    // installed version implicitly.
    let installed_version_id = version.or_else(|| {
        mod_id.and_then(|_| cache_location.split('/').nth(1).and_then(|v| v.parse().ok()))
    });

    let entry = ProfileMod {
        mod_id,
        local_mod_id: local_id,
        installed_version_id,
        file_hash,
        file_name: file_name.clone(),
        enabled: !disabled,
        install_date: chrono::Utc::now(),
        cache_location,
    };
    services.profiles.add_mod_to_profile(&target.id, entry)?;
    println!("Added '{}' to profile '{}'.", file_name, target.name);
    Ok(())
}

pub fn handle_remove_mod(
    services: &Services,
    profile: String,
    mod_id: Option<u64>,
    local_id: Option<String>,
) -> Result<()> {
    let target = find_profile(services, &profile)?;
    let key = match (mod_id, local_id) {
        (Some(id), _) => ModKey::Remote(id),
        (None, Some(id)) => ModKey::Local(id),
        (None, None) => return Err(anyhow!("pass --mod-id or --local-id")),
    };
    services.profiles.remove_mod_from_profile(&target.id, &key)?;
    println!("Removed mod {key} from profile '{}'.", target.name);
    Ok(())
}

pub async fn cmd_activate(
    services: &Services,
    name: String,
    catalog: Option<Utf8PathBuf>,
) -> Result<()> {
    let profile = find_profile(services, &name)?;
    let settings = services.store.load_settings()?;

    if let Some(pending) = ModSetReconciler::pending_activation(&settings.mods_path)? {
        println!(
            ":: Recovering from an interrupted activation ({})",
            pending.profile_id.as_deref().unwrap_or("unknown profile")
        );
    }

    println!(":: Activating profile '{}'", profile.name);
    println!("   Mods dir: {}", settings.mods_path);

    services.profiles.set_active_profile(Some(&profile.id))?;

    let desired: Vec<DesiredEntry> = profile
        .enabled_mods()
        .map(|m| DesiredEntry {
            source_path: settings.cache_root.join(&m.cache_location),
            dest_name: m.entry_name(),
        })
        .collect();

    let reconciler = ModSetReconciler::new(settings.deploy_mode);
    let report = reconciler
        .activate_profile(&settings.mods_path, &desired, Some(&profile.id))
        .await?;

    println!("\n:: Activation Result");
    println!("   Created: {}", report.created);
    println!("   Failed:  {}", report.failed);
    if !report.skipped_foreign.is_empty() {
        println!("   Left in place (not ours): {}", report.skipped_foreign.join(", "));
    }
    for e in &report.errors {
        println!("   Error: {} -> {}", e.target_path, e.error);
    }
    if !reconciler.verify(&settings.mods_path, report.created)? {
        println!("   Warning: managed entry count does not match, re-run activation");
    }

    if let Some(catalog) = catalog {
        let orch = orchestrator(services, catalog)?;
        if let Some(report) = orch.auto_update_after_startup(&profile.id).await? {
            println!(
                "\n:: Auto-update: {} succeeded, {} failed",
                report.successful, report.failed
            );
        }
    }

    if report.success {
        Ok(())
    } else {
        Err(anyhow!("activation finished with {} error(s)", report.errors.len()))
    }
}

pub async fn cmd_calibrate(services: &Services, force: bool) -> Result<()> {
    if !force {
        if let Some(config) = services.calibrator.current_config()? {
            println!(":: Disk already calibrated (use --force to redo)");
            print_disk_config(&config);
            return Ok(());
        }
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Benchmarking disk write speed...");

    let config = services.calibrator.calibrate().await?;
    pb.finish_with_message("Benchmark complete.");

    println!("\n:: Calibration Result");
    print_disk_config(&config);
    Ok(())
}

fn print_disk_config(config: &loadout_core::perf::DiskPerformanceConfig) {
    println!(
        "   Write speed: {}/s ({})",
        format_size(config.disk_speed_mbps * 1024 * 1024, DECIMAL),
        loadout_core::perf::DiskClass::classify(config.disk_speed_mbps).label()
    );
    println!("   Pool size:   {}", config.pool_size);
    println!("   Measured at: {}", config.last_benchmark);
}

pub async fn cmd_check(services: &Services, catalog: Utf8PathBuf) -> Result<()> {
    let profile = services
        .profiles
        .active_profile()?
        .ok_or_else(|| anyhow!("No active profile; run `loadout activate <profile>` first"))?;

    println!(":: Checking for updates ({} mods)...", profile.mods.len());
    let orch = orchestrator(services, catalog)?;
    let check = orch.check_for_updates(&profile.mods).await?;

    println!("\n:: Update Check Result");
    println!("   Checked: {}", check.checked);
    println!("   Pending: {}", check.updates_found);
    for u in &check.updates {
        println!("     {:<10} {:<28} -> version {}", u.mod_id, u.mod_name, u.latest_version_id);
    }
    for e in &check.errors {
        println!("   Error: {e}");
    }
    Ok(())
}

pub async fn cmd_update(services: &Services, mod_id: u64, catalog: Utf8PathBuf) -> Result<()> {
    println!(":: Updating mod {mod_id}...");
    let orch = orchestrator(services, catalog)?;
    let result = orch.update_mod(mod_id, None).await?;
    println!("   Updated '{}' successfully.", result.mod_name);
    Ok(())
}

pub async fn cmd_update_all(services: &Services, catalog: Utf8PathBuf) -> Result<()> {
    println!(":: Updating all mods with pending updates...");
    let orch = orchestrator(services, catalog)?;
    let report = orch.update_all_mods().await?;

    if report.results.is_empty() {
        println!("   Nothing to update.");
        return Ok(());
    }

    println!("\n:: Batch Update Result");
    for r in &report.results {
        match &r.error {
            None => println!("   ok     {:<10} {}", r.mod_id, r.mod_name),
            Some(e) => println!("   failed {:<10} {} ({e})", r.mod_id, r.mod_name),
        }
    }
    println!("   {} succeeded, {} failed", report.successful, report.failed);
    Ok(())
}

pub fn cmd_status(services: &Services) -> Result<()> {
    let settings = services.store.load_settings()?;
    let registry = services.store.load_registry()?;
    let state = services.store.load_update_state()?;

    println!(":: Loadout Status");
    match services.profiles.active_profile()? {
        Some(p) => println!("   Active profile: {} ({} mods)", p.name, p.mods.len()),
        None => println!("   Active profile: none"),
    }
    println!("   Profiles:       {}", registry.profiles.len());
    println!("   Mods dir:       {}", settings.mods_path);
    println!("   Deploy mode:    {}", settings.deploy_mode.label());
    match services.calibrator.current_config()? {
        Some(c) => println!("   Pool size:      {} (calibrated)", c.pool_size),
        None => println!("   Pool size:      {} (default, not calibrated)", loadout_config::DEFAULT_POOL_SIZE),
    }
    println!("   Pending updates: {}", state.updates.len());
    if let Some(ts) = state.last_check {
        println!("   Last check:      {ts}");
    }

    if ModSetReconciler::pending_activation(&settings.mods_path)?.is_some() {
        println!("   Warning: an interrupted activation was detected; re-run `loadout activate`");
    }
    Ok(())
}

pub fn handle_settings_show(services: &Services) -> Result<()> {
    let settings = services.store.load_settings()?;
    println!(":: Settings");
    println!("   Mods dir:     {}", settings.mods_path);
    println!("   Cache root:   {}", settings.cache_root);
    println!("   Backups root: {}", settings.backups_root);
    println!("   Deploy mode:  {}", settings.deploy_mode.label());
    println!("   Backups:      {}", if settings.backups_enabled { "on" } else { "off" });
    println!("   Auto-update:  {}", if settings.auto_update_enabled { "on" } else { "off" });
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn handle_settings_set(
    services: &Services,
    mods_path: Option<Utf8PathBuf>,
    cache_root: Option<Utf8PathBuf>,
    backups_root: Option<Utf8PathBuf>,
    deploy_mode: Option<DeployMode>,
    backups: Option<bool>,
    auto_update: Option<bool>,
) -> Result<()> {
    let mut settings = services.store.load_settings()?;
    if let Some(v) = mods_path {
        settings.mods_path = v;
    }
    if let Some(v) = cache_root {
        settings.cache_root = v;
    }
    if let Some(v) = backups_root {
        settings.backups_root = v;
    }
    if let Some(v) = deploy_mode {
        settings.deploy_mode = v;
    }
    if let Some(v) = backups {
        settings.backups_enabled = v;
    }
    if let Some(v) = auto_update {
        settings.auto_update_enabled = v;
    }
    services.store.save_settings(&settings)?;
    println!("Settings saved.");
    Ok(())
}
