//! File-backed default implementations of the collaborator ports: a catalog
//! document for version queries, the content-addressed download cache as the
//! install source, and a plain directory tree for backups.

use std::collections::HashMap;
use std::fs;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use tracing::debug;

use loadout_core::settings::DeployMode;
use loadout_core::updates::RemoteVersion;
use loadout_core::ProfileMod;
use loadout_infra::deploy::{copy_tree, materialize_entry};

use crate::ports::{
    BackupReceipt, BackupService, InstallReport, ModInstaller, ProgressFn, VersionProvider,
};

/// Version metadata from a local catalog document:
/// `{ "<mod_id>": { latestVersionId, fileName, fileDate, fileSize }, ... }`.
pub struct CatalogVersionProvider {
    path: Utf8PathBuf,
}

impl CatalogVersionProvider {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl VersionProvider for CatalogVersionProvider {
    async fn latest_versions(
        &self,
        mod_ids: &[u64],
    ) -> anyhow::Result<HashMap<u64, RemoteVersion>> {
        let content = tokio::fs::read_to_string(self.path.as_std_path())
            .await
            .with_context(|| format!("read catalog {}", self.path))?;
        let catalog: HashMap<u64, RemoteVersion> =
            serde_json::from_str(&content).with_context(|| format!("parse catalog {}", self.path))?;
        Ok(mod_ids
            .iter()
            .filter_map(|id| catalog.get(id).map(|v| (*id, v.clone())))
            .collect())
    }
}

/// Installs from the download cache: `cache_root/<mod_id>/<version_id>/`
/// holds the already-fetched payload, whose top-level entries are
/// materialized into the mods directory. A missing payload is an in-band
/// failure, not a raised error.
pub struct CacheInstaller {
    cache_root: Utf8PathBuf,
    mode: DeployMode,
}

impl CacheInstaller {
    pub fn new(cache_root: impl Into<Utf8PathBuf>, mode: DeployMode) -> Self {
        Self {
            cache_root: cache_root.into(),
            mode,
        }
    }
}

#[async_trait::async_trait]
impl ModInstaller for CacheInstaller {
    async fn install(
        &self,
        mod_id: u64,
        dest_mods_path: &Utf8Path,
        on_progress: Option<ProgressFn>,
        specific_version_id: Option<u64>,
    ) -> anyhow::Result<InstallReport> {
        let mod_dir = self.cache_root.join(mod_id.to_string());
        let version = match specific_version_id.or_else(|| latest_cached_version(&mod_dir)) {
            Some(v) => v,
            None => {
                return Ok(InstallReport {
                    success: false,
                    mod_name: mod_id.to_string(),
                    error: Some(format!("mod {mod_id} is not in the download cache")),
                })
            }
        };

        let payload = mod_dir.join(version.to_string());
        if !payload.exists() {
            return Ok(InstallReport {
                success: false,
                mod_name: mod_id.to_string(),
                error: Some(format!(
                    "version {version} of mod {mod_id} is not in the download cache"
                )),
            });
        }

        let dest = dest_mods_path.to_owned();
        let mode = self.mode;
        let result = tokio::task::spawn_blocking(move || -> anyhow::Result<InstallReport> {
            let mut entries: Vec<Utf8PathBuf> = Vec::new();
            for e in fs::read_dir(payload.as_std_path())? {
                let e = e?;
                entries.push(
                    Utf8PathBuf::from_path_buf(e.path())
                        .map_err(|p| anyhow::anyhow!("non-UTF8 cache entry: {}", p.display()))?,
                );
            }
            entries.sort();
            if entries.is_empty() {
                return Ok(InstallReport {
                    success: false,
                    mod_name: mod_id.to_string(),
                    error: Some(format!("cached payload for mod {mod_id} is empty")),
                });
            }

            let total = entries.len() as u64;
            let mut mod_name = String::new();
            for (i, source) in entries.iter().enumerate() {
                let name = source
                    .file_name()
                    .ok_or_else(|| anyhow::anyhow!("cache entry without a name: {source}"))?;
                if mod_name.is_empty() {
                    mod_name = name.split('.').next().unwrap_or(name).to_string();
                }
                let target = dest.join(name);
                if source.is_dir() {
                    materialize_entry(source, &target, mode)?;
                } else {
                    fs::copy(source.as_std_path(), target.as_std_path())?;
                }
                if let Some(cb) = &on_progress {
                    cb(i as u64 + 1, total);
                }
            }

            debug!("installed mod {mod_id} v{version} ({total} entries)");
            Ok(InstallReport {
                success: true,
                mod_name,
                error: None,
            })
        })
        .await
        .context("install task failed")??;

        Ok(result)
    }
}

fn latest_cached_version(mod_dir: &Utf8Path) -> Option<u64> {
    let entries = fs::read_dir(mod_dir.as_std_path()).ok()?;
    entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().to_string_lossy().parse::<u64>().ok())
        .max()
}

/// Copies a mod's materialized entry aside before an update overwrites it.
pub struct DirBackupService {
    mods_path: Utf8PathBuf,
    backups_root: Utf8PathBuf,
}

impl DirBackupService {
    pub fn new(mods_path: impl Into<Utf8PathBuf>, backups_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            mods_path: mods_path.into(),
            backups_root: backups_root.into(),
        }
    }
}

#[async_trait::async_trait]
impl BackupService for DirBackupService {
    async fn backup(&self, entry: &ProfileMod) -> anyhow::Result<BackupReceipt> {
        let source = self.mods_path.join(entry.entry_name());
        if !source.exists() {
            // Nothing materialized for this mod; there is nothing to save.
            return Ok(BackupReceipt { backup_path: None });
        }

        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let dest = self
            .backups_root
            .join(format!("{}-{stamp}", entry.entry_name()));

        let src = source.clone();
        let dst = dest.clone();
        if src.is_dir() {
            tokio::task::spawn_blocking(move || copy_tree(&src, &dst))
                .await
                .context("backup task failed")??;
        } else {
            tokio::fs::copy(src.as_std_path(), dst.as_std_path()).await?;
        }

        Ok(BackupReceipt {
            backup_path: Some(dest),
        })
    }
}
