use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use loadout_config::AUTO_UPDATE_SETTLE_MS;
use loadout_core::updates::{RemoteVersion, UpdateInfo};
use loadout_core::{ProfileId, ProfileMod};
use loadout_persistence::{DataStore, StorageError};

use crate::calibrate::{CalibrationError, DiskCalibrator};
use crate::pool::{split_settled, BatchPool, PoolError};
use crate::ports::{BackupService, InstallReport, ModInstaller, ProgressFn, VersionProvider};
use crate::profiles::{ProfileError, ProfileStore};

#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("another operation is already running: {0}")]
    Busy(&'static str),
    #[error("no pending update recorded for mod {0}")]
    NoPendingUpdate(u64),
    #[error("install failed for mod {mod_id}: {reason}")]
    Install { mod_id: u64, reason: String },
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Result of one update-check pass.
#[derive(Debug, Clone, Default)]
pub struct UpdateCheck {
    pub checked: usize,
    pub updates_found: usize,
    pub updates: Vec<UpdateInfo>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ModUpdateResult {
    pub mod_id: u64,
    pub mod_name: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Aggregate batch outcome. Always returned, never raised: callers report
/// partial success from the per-mod entries.
#[derive(Debug, Clone, Default)]
pub struct BatchUpdateReport {
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<ModUpdateResult>,
}

/// Per-item install outcome, folding the installer's two failure channels
/// (in-band `success == false` and a raised error) into one tagged type.
enum UpdateOutcome {
    Installed { mod_name: String },
    ReportedFailure { reason: String },
    Faulted { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Idle,
    Checking,
    UpdatingOne,
    UpdatingAll,
}

impl EngineState {
    fn label(self) -> &'static str {
        match self {
            EngineState::Idle => "idle",
            EngineState::Checking => "update check",
            EngineState::UpdatingOne => "single update",
            EngineState::UpdatingAll => "batch update",
        }
    }
}

/// Resets the orchestrator to Idle when an operation ends, even on the
/// error paths.
struct StateGuard<'a> {
    slot: &'a Mutex<EngineState>,
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock().expect("engine state lock poisoned") = EngineState::Idle;
    }
}

/// Checks for mod updates and runs single or batch update cycles through
/// the calibrated concurrency pool. One instance allows one operation at a
/// time; a second caller gets `UpdateError::Busy` instead of interleaving.
pub struct UpdateOrchestrator {
    store: Arc<dyn DataStore>,
    profiles: Arc<ProfileStore>,
    calibrator: Arc<DiskCalibrator>,
    versions: Arc<dyn VersionProvider>,
    installer: Arc<dyn ModInstaller>,
    backup: Arc<dyn BackupService>,
    state: Mutex<EngineState>,
    auto_done: Mutex<HashSet<ProfileId>>,
    settle: Duration,
}

impl UpdateOrchestrator {
    pub fn new(
        store: Arc<dyn DataStore>,
        profiles: Arc<ProfileStore>,
        calibrator: Arc<DiskCalibrator>,
        versions: Arc<dyn VersionProvider>,
        installer: Arc<dyn ModInstaller>,
        backup: Arc<dyn BackupService>,
    ) -> Self {
        Self {
            store,
            profiles,
            calibrator,
            versions,
            installer,
            backup,
            state: Mutex::new(EngineState::Idle),
            auto_done: Mutex::new(HashSet::new()),
            settle: Duration::from_millis(AUTO_UPDATE_SETTLE_MS),
        }
    }

    /// Shorten the auto-update startup delay (tests).
    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    fn begin(&self, next: EngineState) -> Result<StateGuard<'_>, UpdateError> {
        let mut state = self.state.lock().expect("engine state lock poisoned");
        if *state != EngineState::Idle {
            return Err(UpdateError::Busy(state.label()));
        }
        *state = next;
        Ok(StateGuard { slot: &self.state })
    }

    /// Batch-query the version collaborator for every marketplace mod in
    /// the given set and merge the outcome into the persisted update state.
    /// Only entries for mods present in this check are overwritten; pending
    /// updates recorded for other mods survive untouched.
    pub async fn check_for_updates(
        &self,
        profile_mods: &[ProfileMod],
    ) -> Result<UpdateCheck, UpdateError> {
        let _guard = self.begin(EngineState::Checking)?;

        let remote_mods: Vec<&ProfileMod> =
            profile_mods.iter().filter(|m| m.mod_id.is_some()).collect();
        let ids: Vec<u64> = remote_mods.iter().filter_map(|m| m.mod_id).collect();

        let mut check = UpdateCheck {
            checked: ids.len(),
            ..UpdateCheck::default()
        };

        let remote = if ids.is_empty() {
            Default::default()
        } else {
            match self.versions.latest_versions(&ids).await {
                Ok(map) => map,
                Err(e) => {
                    warn!("version query failed: {e:#}");
                    check.errors.push(e.to_string());
                    return Ok(check);
                }
            }
        };

        let now = Utc::now();
        let mut state = self.store.load_update_state()?;
        for m in &remote_mods {
            let Some(id) = m.mod_id else { continue };
            match remote.get(&id) {
                Some(version) if update_available(m, version) => {
                    state.updates.insert(
                        id,
                        UpdateInfo {
                            mod_id: id,
                            mod_name: m.entry_name(),
                            latest_version_id: version.latest_version_id,
                            discovered_at: now,
                        },
                    );
                }
                Some(_) => {
                    // Up to date: a stale pending entry for this mod is no
                    // longer meaningful.
                    state.updates.remove(&id);
                }
                None => check.errors.push(format!("no version info for mod {id}")),
            }
        }
        state.last_check = Some(now);
        self.store.save_update_state(&state)?;

        check.updates = ids
            .iter()
            .filter_map(|id| state.updates.get(id).cloned())
            .collect();
        check.updates_found = check.updates.len();
        info!(
            "update check: {} mods checked, {} updates pending",
            check.checked, check.updates_found
        );
        Ok(check)
    }

    /// Update a single mod to its recorded pending version. The pending
    /// entry is cleared only on success; a failed install keeps it for
    /// retry.
    pub async fn update_mod(
        &self,
        mod_id: u64,
        on_progress: Option<ProgressFn>,
    ) -> Result<ModUpdateResult, UpdateError> {
        let _guard = self.begin(EngineState::UpdatingOne)?;

        let mut state = self.store.load_update_state()?;
        let info = state
            .updates
            .get(&mod_id)
            .cloned()
            .ok_or(UpdateError::NoPendingUpdate(mod_id))?;

        let settings = self.store.load_settings()?;
        let active = self.profiles.active_profile()?;

        if settings.backups_enabled {
            if let Some(entry) = active
                .as_ref()
                .and_then(|p| p.mods.iter().find(|m| m.mod_id == Some(mod_id)))
            {
                match self.backup.backup(entry).await {
                    Ok(receipt) => debug!("backed up mod {mod_id}: {:?}", receipt.backup_path),
                    Err(e) => warn!("backup for mod {mod_id} failed, continuing: {e:#}"),
                }
            }
        }

        let outcome = self
            .installer
            .install(
                mod_id,
                &settings.mods_path,
                on_progress,
                Some(info.latest_version_id),
            )
            .await;

        match normalize_outcome(outcome) {
            UpdateOutcome::Installed { mod_name } => {
                state.updates.remove(&mod_id);
                self.store.save_update_state(&state)?;
                if let Some(p) = active {
                    self.profiles
                        .refresh_profile(&p.id, std::slice::from_ref(&info))?;
                }
                Ok(ModUpdateResult {
                    mod_id,
                    mod_name: pick_name(mod_name, &info),
                    success: true,
                    error: None,
                })
            }
            UpdateOutcome::ReportedFailure { reason } | UpdateOutcome::Faulted { reason } => {
                Err(UpdateError::Install { mod_id, reason })
            }
        }
    }

    /// Update every mod with a pending entry: one backup wave (best-effort)
    /// and one install wave, both through the calibrated pool, then a
    /// single profile refresh. Always returns the aggregate report.
    pub async fn update_all_mods(&self) -> Result<BatchUpdateReport, UpdateError> {
        let _guard = self.begin(EngineState::UpdatingAll)?;

        let state = self.store.load_update_state()?;
        let mut pending: Vec<UpdateInfo> = state.updates.values().cloned().collect();
        pending.sort_by_key(|u| u.mod_id);
        if pending.is_empty() {
            return Ok(BatchUpdateReport::default());
        }

        let pool = BatchPool::new(self.calibrator.pool_size()?)?;
        let settings = self.store.load_settings()?;
        let active = self.profiles.active_profile()?;

        if settings.backups_enabled {
            let entries: Vec<ProfileMod> = active
                .as_ref()
                .map(|p| {
                    p.mods
                        .iter()
                        .filter(|m| m.mod_id.is_some_and(|id| state.updates.contains_key(&id)))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();

            let backup_results = pool
                .run(entries, None, |entry| {
                    let backup = self.backup.clone();
                    async move { backup.backup(&entry).await }
                })
                .await;
            for (index, error) in split_settled(backup_results).1 {
                warn!("backup {index} failed, continuing: {error:#}");
            }
        }

        let mods_path = settings.mods_path.clone();
        let install_results = pool
            .run(pending.clone(), None, |info| {
                let installer = self.installer.clone();
                let mods_path = mods_path.clone();
                async move {
                    installer
                        .install(info.mod_id, &mods_path, None, Some(info.latest_version_id))
                        .await
                }
            })
            .await;

        let (mut installed, mut reported, mut faulted) = (0usize, 0usize, 0usize);
        let mut report = BatchUpdateReport::default();
        let mut cleared: Vec<UpdateInfo> = Vec::new();

        for (info, res) in pending.iter().zip(install_results) {
            match normalize_outcome(res) {
                UpdateOutcome::Installed { mod_name } => {
                    installed += 1;
                    cleared.push(info.clone());
                    report.results.push(ModUpdateResult {
                        mod_id: info.mod_id,
                        mod_name: pick_name(mod_name, info),
                        success: true,
                        error: None,
                    });
                }
                UpdateOutcome::ReportedFailure { reason } => {
                    reported += 1;
                    report.results.push(ModUpdateResult {
                        mod_id: info.mod_id,
                        mod_name: info.mod_name.clone(),
                        success: false,
                        error: Some(reason),
                    });
                }
                UpdateOutcome::Faulted { reason } => {
                    faulted += 1;
                    report.results.push(ModUpdateResult {
                        mod_id: info.mod_id,
                        mod_name: info.mod_name.clone(),
                        success: false,
                        error: Some(reason),
                    });
                }
            }
        }
        debug!(
            "batch update outcomes: {installed} installed, {reported} reported failures, {faulted} faulted"
        );
        report.successful = installed;
        report.failed = reported + faulted;

        // Clear pending entries only for clean successes, against a fresh
        // read of the document.
        if !cleared.is_empty() {
            let mut state = self.store.load_update_state()?;
            for info in &cleared {
                state.updates.remove(&info.mod_id);
            }
            self.store.save_update_state(&state)?;
        }

        // Exactly one refresh per cycle, never per item.
        if let Some(p) = active {
            self.profiles.refresh_profile(&p.id, &cleared)?;
        }

        info!(
            "batch update finished: {} succeeded, {} failed",
            report.successful, report.failed
        );
        Ok(report)
    }

    /// Startup auto-update: fires at most once per active-profile-id, after
    /// a settle delay, and only when the preference allows it. Returns None
    /// when the gate does not open.
    pub async fn auto_update_after_startup(
        &self,
        profile_id: &str,
    ) -> Result<Option<BatchUpdateReport>, UpdateError> {
        let settings = self.store.load_settings()?;
        if !settings.auto_update_enabled {
            return Ok(None);
        }
        {
            // Marking done up front doubles as the in-flight guard for
            // concurrent callers with the same profile.
            let mut done = self.auto_done.lock().expect("auto-update gate lock poisoned");
            if !done.insert(profile_id.to_string()) {
                return Ok(None);
            }
        }

        tokio::time::sleep(self.settle).await;

        match self.update_all_mods().await {
            Ok(report) => Ok(Some(report)),
            Err(UpdateError::Busy(label)) => {
                debug!("auto-update skipped, {label} in progress");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

fn update_available(installed: &ProfileMod, remote: &RemoteVersion) -> bool {
    match installed.installed_version_id {
        Some(version) => remote.latest_version_id != version,
        // Entries imported before version tracking fall back to the file
        // name the marketplace reports.
        None => remote.file_name != installed.file_name,
    }
}

fn pick_name(reported: String, info: &UpdateInfo) -> String {
    if reported.is_empty() {
        info.mod_name.clone()
    } else {
        reported
    }
}

fn normalize_outcome(res: anyhow::Result<InstallReport>) -> UpdateOutcome {
    match res {
        Ok(report) if report.success => UpdateOutcome::Installed {
            mod_name: report.mod_name,
        },
        Ok(report) => UpdateOutcome::ReportedFailure {
            reason: report
                .error
                .unwrap_or_else(|| "installer reported failure".to_string()),
        },
        Err(e) => UpdateOutcome::Faulted {
            reason: format!("{e:#}"),
        },
    }
}
