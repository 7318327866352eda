use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One discovered pending update. Cleared only after a confirmed install.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    pub mod_id: u64,
    pub mod_name: String,
    pub latest_version_id: u64,
    pub discovered_at: DateTime<Utc>,
}

/// Persisted update-state document. Keys are marketplace mod ids; entries
/// for mods outside the currently active profile are retained across
/// profile switches.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateState {
    #[serde(default)]
    pub updates: HashMap<u64, UpdateInfo>,
    #[serde(default)]
    pub last_check: Option<DateTime<Utc>>,
}

/// Version metadata returned by the remote batch query collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteVersion {
    pub latest_version_id: u64,
    pub file_name: String,
    pub file_date: DateTime<Utc>,
    pub file_size: u64,
}
