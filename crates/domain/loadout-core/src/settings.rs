use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// How a profile's mod set is materialized into the mods directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeployMode {
    /// Platform link: junction-style directory symlink on Windows, symlink
    /// elsewhere.
    #[default]
    Link,
    /// Recursive copy, for filesystems where links are unavailable.
    Copy,
}

impl DeployMode {
    pub fn label(self) -> &'static str {
        match self {
            DeployMode::Link => "link",
            DeployMode::Copy => "copy",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    /// The game's mods directory the active profile is materialized into.
    pub mods_path: Utf8PathBuf,
    /// Root of the content-addressed download cache.
    pub cache_root: Utf8PathBuf,
    /// Where per-mod backups land before an update overwrites them.
    pub backups_root: Utf8PathBuf,
    #[serde(default)]
    pub deploy_mode: DeployMode,
    #[serde(default = "default_true")]
    pub backups_enabled: bool,
    #[serde(default)]
    pub auto_update_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            mods_path: Utf8PathBuf::from("Mods"),
            cache_root: Utf8PathBuf::from("cache"),
            backups_root: Utf8PathBuf::from("backups"),
            deploy_mode: DeployMode::default(),
            backups_enabled: true,
            auto_update_enabled: false,
        }
    }
}
