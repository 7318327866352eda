use std::collections::HashMap;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};

use loadout_core::updates::RemoteVersion;
use loadout_core::ProfileMod;

/// Install progress callback: (bytes_done, bytes_total).
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Remote batch version query. Network details live entirely behind this
/// trait; the orchestrator only sees version metadata.
#[async_trait::async_trait]
pub trait VersionProvider: Send + Sync {
    async fn latest_versions(
        &self,
        mod_ids: &[u64],
    ) -> anyhow::Result<HashMap<u64, RemoteVersion>>;
}

/// Outcome the installer reports in-band. `success == false` carries the
/// reason in `error` rather than an `Err` return.
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub success: bool,
    pub mod_name: String,
    pub error: Option<String>,
}

#[async_trait::async_trait]
pub trait ModInstaller: Send + Sync {
    async fn install(
        &self,
        mod_id: u64,
        dest_mods_path: &Utf8Path,
        on_progress: Option<ProgressFn>,
        specific_version_id: Option<u64>,
    ) -> anyhow::Result<InstallReport>;
}

#[derive(Debug, Clone)]
pub struct BackupReceipt {
    pub backup_path: Option<Utf8PathBuf>,
}

#[async_trait::async_trait]
pub trait BackupService: Send + Sync {
    async fn backup(&self, entry: &ProfileMod) -> anyhow::Result<BackupReceipt>;
}
