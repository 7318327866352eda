use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use loadout_core::registry::ProfileRegistry;
use loadout_core::updates::UpdateInfo;
use loadout_core::{palette_color, ModKey, Profile, ProfileId, ProfileMod};
use loadout_persistence::{DataStore, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("a profile named '{0}' already exists")]
    DuplicateName(String),
    #[error("profile '{0}' not found")]
    NotFound(String),
    #[error("profile '{0}' is active and cannot be deleted")]
    DeleteActive(String),
    #[error("mod entry carries neither a marketplace id nor a local id")]
    MissingModIdentity,
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for ProfileError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::ProfileNotFound(id) => ProfileError::NotFound(id),
            other => ProfileError::Storage(other),
        }
    }
}

/// Partial profile mutation. `id` and `created_at` are immutable; absent
/// fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<BTreeSet<String>>,
    pub icon_color: Option<String>,
}

/// CRUD + single-active-profile registry over persisted profile documents.
/// Every operation is read-modify-write against the store; the last writer
/// wins.
pub struct ProfileStore {
    store: Arc<dyn DataStore>,
}

impl ProfileStore {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// All profiles, in registry order. Profiles missing from the registry
    /// (e.g. documents restored by hand) sort last in creation order.
    pub fn get_all_profiles(&self) -> Result<Vec<Profile>, ProfileError> {
        let registry = self.store.load_registry()?;
        let mut profiles = self.store.load_profiles()?;
        profiles.sort_by_key(|p| {
            registry
                .profiles
                .iter()
                .position(|id| *id == p.id)
                .unwrap_or(usize::MAX)
        });
        Ok(profiles)
    }

    pub fn get_profile(&self, id: &str) -> Result<Profile, ProfileError> {
        Ok(self.store.load_profile(id)?)
    }

    pub fn active_profile(&self) -> Result<Option<Profile>, ProfileError> {
        let registry = self.store.load_registry()?;
        match registry.active_profile_id {
            Some(id) => Ok(Some(self.store.load_profile(&id)?)),
            None => Ok(None),
        }
    }

    pub fn create_profile(
        &self,
        name: &str,
        description: &str,
        tags: BTreeSet<String>,
    ) -> Result<Profile, ProfileError> {
        let existing = self.store.load_profiles()?;
        if existing.iter().any(|p| p.name == name) {
            return Err(ProfileError::DuplicateName(name.to_string()));
        }

        let now = Utc::now();
        let profile = Profile {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            tags,
            icon_color: palette_color(existing.len()).to_string(),
            mods: Vec::new(),
            is_active: false,
            created_at: now,
            updated_at: now,
        };

        self.store.save_profile(&profile)?;
        let mut registry = self.store.load_registry()?;
        registry.track(profile.id.clone());
        self.store.save_registry(&registry)?;

        debug!("created profile '{}' ({})", profile.name, profile.id);
        Ok(profile)
    }

    pub fn update_profile(&self, id: &str, update: ProfileUpdate) -> Result<Profile, ProfileError> {
        let mut profile = self.store.load_profile(id)?;

        if let Some(name) = update.name {
            if name != profile.name {
                let clash = self
                    .store
                    .load_profiles()?
                    .iter()
                    .any(|p| p.id != id && p.name == name);
                if clash {
                    return Err(ProfileError::DuplicateName(name));
                }
                profile.name = name;
            }
        }
        if let Some(description) = update.description {
            profile.description = description;
        }
        if let Some(tags) = update.tags {
            profile.tags = tags;
        }
        if let Some(icon_color) = update.icon_color {
            profile.icon_color = icon_color;
        }

        profile.updated_at = Utc::now();
        self.store.save_profile(&profile)?;
        Ok(profile)
    }

    /// Fails without side effects when `id` is the active profile.
    pub fn delete_profile(&self, id: &str) -> Result<(), ProfileError> {
        let mut registry = self.store.load_registry()?;
        if registry.active_profile_id.as_deref() == Some(id) {
            return Err(ProfileError::DeleteActive(id.to_string()));
        }
        // Surfaces NotFound before anything is touched.
        let _ = self.store.load_profile(id)?;

        self.store.delete_profile(id)?;
        registry.untrack(id);
        self.store.save_registry(&registry)?;
        Ok(())
    }

    /// Upsert by mod identity; a second entry with the same id replaces the
    /// first instead of duplicating it.
    pub fn add_mod_to_profile(
        &self,
        id: &str,
        entry: ProfileMod,
    ) -> Result<Profile, ProfileError> {
        if entry.key().is_none() {
            return Err(ProfileError::MissingModIdentity);
        }
        let mut profile = self.store.load_profile(id)?;
        profile.upsert_mod(entry);
        profile.updated_at = Utc::now();
        self.store.save_profile(&profile)?;
        Ok(profile)
    }

    pub fn remove_mod_from_profile(
        &self,
        id: &str,
        key: &ModKey,
    ) -> Result<Profile, ProfileError> {
        let mut profile = self.store.load_profile(id)?;
        if profile.remove_mod(key) {
            profile.updated_at = Utc::now();
            self.store.save_profile(&profile)?;
        }
        Ok(profile)
    }

    /// Flip the active flag across the whole registry so at most one profile
    /// has it, then persist the pointer. Callers pair this with
    /// `ModSetReconciler::activate_profile`; the two steps are not
    /// transactional.
    pub fn set_active_profile(&self, id: Option<&str>) -> Result<(), ProfileError> {
        if let Some(id) = id {
            let _ = self.store.load_profile(id)?;
        }

        for mut profile in self.store.load_profiles()? {
            let should_be_active = Some(profile.id.as_str()) == id;
            if profile.is_active != should_be_active {
                profile.is_active = should_be_active;
                profile.updated_at = Utc::now();
                self.store.save_profile(&profile)?;
            }
        }

        let mut registry = self.store.load_registry()?;
        registry.active_profile_id = id.map(str::to_string);
        self.store.save_registry(&registry)?;
        Ok(())
    }

    /// Re-sync after a completed update cycle: records the new installed
    /// versions on the matching mod entries, bumps the profile's
    /// `updated_at` and the registry's `last_sync`.
    pub fn refresh_profile(
        &self,
        id: &ProfileId,
        installed: &[UpdateInfo],
    ) -> Result<Profile, ProfileError> {
        let mut profile = self.store.load_profile(id)?;
        let now = Utc::now();
        for info in installed {
            if let Some(entry) = profile
                .mods
                .iter_mut()
                .find(|m| m.mod_id == Some(info.mod_id))
            {
                entry.installed_version_id = Some(info.latest_version_id);
                entry.install_date = now;
                entry.cache_location = format!("{}/{}", info.mod_id, info.latest_version_id);
            }
        }
        profile.updated_at = now;
        self.store.save_profile(&profile)?;

        let mut registry = self.store.load_registry()?;
        registry.last_sync = now;
        self.store.save_registry(&registry)?;
        Ok(profile)
    }
}
