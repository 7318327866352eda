use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use loadout_core::settings::DeployMode;
use loadout_infra::deploy::{classify_entry, materialize_entry, remove_entry, EntryState};

/// Durable marker written into the mods directory for the duration of an
/// activation. If it survives a crash, the next startup can detect the
/// interrupted switch and re-run activation to converge.
pub const PENDING_JOURNAL: &str = ".loadout-pending.json";

#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    #[error("mods directory is unusable: {0}")]
    Io(#[from] std::io::Error),
    #[error("activation journal error: {0}")]
    Journal(#[from] serde_json::Error),
}

/// One entry the active profile wants materialized in the mods directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DesiredEntry {
    pub source_path: Utf8PathBuf,
    pub dest_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivationJournal {
    pub profile_id: Option<String>,
    pub desired: Vec<DesiredEntry>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EntryFailure {
    pub source_path: Option<Utf8PathBuf>,
    pub target_path: Utf8PathBuf,
    pub error: String,
}

/// Aggregate activation outcome. Per-entry failures are collected here and
/// never abort the remaining entries.
#[derive(Debug, Clone, Default)]
pub struct ActivationReport {
    pub success: bool,
    pub created: usize,
    pub failed: usize,
    pub errors: Vec<EntryFailure>,
    /// Entries in the mods directory this engine does not own. They are
    /// left untouched.
    pub skipped_foreign: Vec<String>,
}

/// Materializes a profile's mod set into the game's mods directory by full
/// teardown and rebuild: no orphaned entry from a previous profile can
/// survive a switch, at the cost of a brief empty-directory window. Only
/// managed entries (links, marker-stamped copies) are ever removed.
pub struct ModSetReconciler {
    mode: DeployMode,
}

impl ModSetReconciler {
    pub fn new(mode: DeployMode) -> Self {
        Self { mode }
    }

    /// Tear down the previous mod set, then materialize `desired`. Each
    /// step is per-entry isolated; the report carries every failure.
    pub async fn activate_profile(
        &self,
        mods_path: &Utf8Path,
        desired: &[DesiredEntry],
        profile_id: Option<&str>,
    ) -> Result<ActivationReport, ActivationError> {
        fs::create_dir_all(mods_path.as_std_path())?;
        self.write_journal(mods_path, desired, profile_id)?;

        let mut report = ActivationReport::default();

        // Deactivate: best-effort removal of every managed entry. Failures
        // are collected; activation overwrites whatever is left.
        for entry in fs::read_dir(mods_path.as_std_path())? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name == PENDING_JOURNAL {
                continue;
            }
            let Some(path) = Utf8PathBuf::from_path_buf(entry.path()).ok() else {
                report.skipped_foreign.push(name);
                continue;
            };
            match classify_entry(&path) {
                EntryState::Managed => {
                    if let Err(error) = blocking_deploy(move || remove_entry(&path)).await {
                        report.errors.push(EntryFailure {
                            source_path: None,
                            target_path: mods_path.join(&name),
                            error,
                        });
                    }
                }
                EntryState::Foreign => {
                    debug!("leaving foreign entry '{name}' in place");
                    report.skipped_foreign.push(name);
                }
                EntryState::Absent => {}
            }
        }

        // Activate: each desired entry independently.
        for d in desired {
            let target = mods_path.join(&d.dest_name);
            if let Err(error) = validate_entry_name(&d.dest_name) {
                report.failed += 1;
                report.errors.push(EntryFailure {
                    source_path: Some(d.source_path.clone()),
                    target_path: target,
                    error,
                });
                continue;
            }

            let source = d.source_path.clone();
            let dest = target.clone();
            let mode = self.mode;
            match blocking_deploy(move || materialize_entry(&source, &dest, mode)).await {
                Ok(()) => report.created += 1,
                Err(error) => {
                    report.failed += 1;
                    report.errors.push(EntryFailure {
                        source_path: Some(d.source_path.clone()),
                        target_path: target,
                        error,
                    });
                }
            }
        }

        self.clear_journal(mods_path);
        report.success = report.errors.is_empty();
        Ok(report)
    }

    /// Post-condition check: the managed-entry count matches what the caller
    /// expects. Detects entries removed behind the engine's back.
    pub fn verify(&self, mods_path: &Utf8Path, expected: usize) -> Result<bool, ActivationError> {
        Ok(count_managed(mods_path)? == expected)
    }

    /// An interrupted activation left behind by a crash, if any.
    pub fn pending_activation(
        mods_path: &Utf8Path,
    ) -> Result<Option<ActivationJournal>, ActivationError> {
        let path = mods_path.join(PENDING_JOURNAL);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path.as_std_path())?;
        match serde_json::from_str(&content) {
            Ok(journal) => Ok(Some(journal)),
            Err(e) => {
                warn!("unreadable activation journal at {path}: {e}");
                Ok(None)
            }
        }
    }

    fn write_journal(
        &self,
        mods_path: &Utf8Path,
        desired: &[DesiredEntry],
        profile_id: Option<&str>,
    ) -> Result<(), ActivationError> {
        let journal = ActivationJournal {
            profile_id: profile_id.map(str::to_string),
            desired: desired.to_vec(),
            started_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&journal)?;
        fs::write(mods_path.join(PENDING_JOURNAL).as_std_path(), json)?;
        Ok(())
    }

    fn clear_journal(&self, mods_path: &Utf8Path) {
        let path = mods_path.join(PENDING_JOURNAL);
        if let Err(e) = fs::remove_file(path.as_std_path()) {
            warn!("failed to clear activation journal at {path}: {e}");
        }
    }
}

pub fn count_managed(mods_path: &Utf8Path) -> std::io::Result<usize> {
    let mut count = 0;
    for entry in fs::read_dir(mods_path.as_std_path())? {
        let entry = entry?;
        if entry.file_name().to_string_lossy() == PENDING_JOURNAL {
            continue;
        }
        if let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) {
            if classify_entry(&path) == EntryState::Managed {
                count += 1;
            }
        }
    }
    Ok(count)
}

fn validate_entry_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("entry name is empty".to_string());
    }
    if name == "." || name == ".." || name.contains('/') || name.contains('\\') {
        return Err(format!("entry name escapes the mods directory: {name}"));
    }
    Ok(())
}

async fn blocking_deploy<F>(f: F) -> Result<(), String>
where
    F: FnOnce() -> Result<(), loadout_infra::deploy::DeployError> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) => Err(format!("deploy task failed: {e}")),
    }
}
