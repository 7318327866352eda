use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::warn;

use loadout_core::perf::DiskPerformanceConfig;
use loadout_core::registry::ProfileRegistry;
use loadout_core::settings::AppSettings;
use loadout_core::updates::UpdateState;
use loadout_core::Profile;

use crate::StorageError;

const REGISTRY_DOC: &str = "registry.json";
const DISK_PERF_DOC: &str = "disk-performance.json";
const UPDATE_STATE_DOC: &str = "update-state.json";
const SETTINGS_DOC: &str = "settings.json";
const PROFILES_DIR: &str = "profiles";

/// Persisted-document access. All writers are last-writer-wins; callers do
/// read-modify-write with no optimistic concurrency control.
pub trait DataStore: Send + Sync {
    fn load_profiles(&self) -> Result<Vec<Profile>, StorageError>;
    fn load_profile(&self, id: &str) -> Result<Profile, StorageError>;
    fn save_profile(&self, profile: &Profile) -> Result<(), StorageError>;
    fn delete_profile(&self, id: &str) -> Result<(), StorageError>;

    fn load_registry(&self) -> Result<ProfileRegistry, StorageError>;
    fn save_registry(&self, registry: &ProfileRegistry) -> Result<(), StorageError>;

    fn load_disk_config(&self) -> Result<Option<DiskPerformanceConfig>, StorageError>;
    fn save_disk_config(&self, config: &DiskPerformanceConfig) -> Result<(), StorageError>;

    fn load_update_state(&self) -> Result<UpdateState, StorageError>;
    fn save_update_state(&self, state: &UpdateState) -> Result<(), StorageError>;

    fn load_settings(&self) -> Result<AppSettings, StorageError>;
    fn save_settings(&self, settings: &AppSettings) -> Result<(), StorageError>;
}

/// JSON documents under a single data root, one file per document and one
/// file per profile.
pub struct FileDataStore {
    root: Utf8PathBuf,
}

impl FileDataStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn at_default_location() -> Result<Self, StorageError> {
        Ok(Self::new(crate::default_data_dir()?))
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn doc_path(&self, name: &str) -> Result<Utf8PathBuf, StorageError> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root)?;
        }
        Ok(self.root.join(name))
    }

    fn profile_path(&self, id: &str) -> Result<Utf8PathBuf, StorageError> {
        let safe_id: String = id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let dir = self.root.join(PROFILES_DIR);
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(dir.join(format!("{safe_id}.json")))
    }

    fn write_doc<T: serde::Serialize>(&self, path: &Utf8Path, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(value)?;
        atomic_write(path.as_std_path(), json.as_bytes())?;
        Ok(())
    }

    fn read_doc<T: serde::de::DeserializeOwned>(
        &self,
        path: &Utf8Path,
    ) -> Result<Option<T>, StorageError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path.as_std_path())?;
        Ok(Some(serde_json::from_str(&content)?))
    }
}

impl DataStore for FileDataStore {
    fn load_profiles(&self) -> Result<Vec<Profile>, StorageError> {
        let dir = self.root.join(PROFILES_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut profiles = Vec::new();
        for entry in fs::read_dir(dir.as_std_path())? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<Profile>(&content) {
                Ok(p) => profiles.push(p),
                Err(e) => warn!("skipping unreadable profile document {:?}: {e}", path),
            }
        }
        // Directory iteration order is unspecified; keep it stable for callers.
        profiles.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(profiles)
    }

    fn load_profile(&self, id: &str) -> Result<Profile, StorageError> {
        let path = self.profile_path(id)?;
        self.read_doc(&path)?
            .ok_or_else(|| StorageError::ProfileNotFound(id.to_string()))
    }

    fn save_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        let path = self.profile_path(&profile.id)?;
        self.write_doc(&path, profile)
    }

    fn delete_profile(&self, id: &str) -> Result<(), StorageError> {
        let path = self.profile_path(id)?;
        if path.exists() {
            fs::remove_file(path.as_std_path())?;
        }
        Ok(())
    }

    fn load_registry(&self) -> Result<ProfileRegistry, StorageError> {
        let path = self.doc_path(REGISTRY_DOC)?;
        Ok(self.read_doc(&path)?.unwrap_or_default())
    }

    fn save_registry(&self, registry: &ProfileRegistry) -> Result<(), StorageError> {
        let path = self.doc_path(REGISTRY_DOC)?;
        self.write_doc(&path, registry)
    }

    fn load_disk_config(&self) -> Result<Option<DiskPerformanceConfig>, StorageError> {
        let path = self.doc_path(DISK_PERF_DOC)?;
        self.read_doc(&path)
    }

    fn save_disk_config(&self, config: &DiskPerformanceConfig) -> Result<(), StorageError> {
        let path = self.doc_path(DISK_PERF_DOC)?;
        self.write_doc(&path, config)
    }

    fn load_update_state(&self) -> Result<UpdateState, StorageError> {
        let path = self.doc_path(UPDATE_STATE_DOC)?;
        Ok(self.read_doc(&path)?.unwrap_or_default())
    }

    fn save_update_state(&self, state: &UpdateState) -> Result<(), StorageError> {
        let path = self.doc_path(UPDATE_STATE_DOC)?;
        self.write_doc(&path, state)
    }

    fn load_settings(&self) -> Result<AppSettings, StorageError> {
        let path = self.doc_path(SETTINGS_DOC)?;
        Ok(self.read_doc(&path)?.unwrap_or_default())
    }

    fn save_settings(&self, settings: &AppSettings) -> Result<(), StorageError> {
        let path = self.doc_path(SETTINGS_DOC)?;
        self.write_doc(&path, settings)
    }
}

fn atomic_write(path: &std::path::Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp_path = {
        let mut name = path.as_os_str().to_os_string();
        name.push(".tmp");
        std::path::PathBuf::from(name)
    };

    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    match fs::rename(&tmp_path, path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            fs::remove_file(path).ok();
            fs::rename(&tmp_path, path)?;
        }
        Err(e) => return Err(e),
    }

    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}
