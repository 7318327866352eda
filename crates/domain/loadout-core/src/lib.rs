use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod perf;
pub mod registry;
pub mod settings;
pub mod updates;

pub type ProfileId = String;

/// Display colors assigned to new profiles, cycled by creation order.
pub const ICON_PALETTE: [&str; 8] = [
    "#4f86f7", "#f76e5c", "#3ec97e", "#f7c64f", "#b06ef7", "#f76ec9", "#5cd6f7", "#f7a35c",
];

pub fn palette_color(index: usize) -> &'static str {
    ICON_PALETTE[index % ICON_PALETTE.len()]
}

/// Identity of a mod inside a profile: marketplace mods carry a numeric id,
/// locally imported ones a caller-assigned string id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModKey {
    Remote(u64),
    Local(String),
}

impl std::fmt::Display for ModKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModKey::Remote(id) => write!(f, "{id}"),
            ModKey::Local(id) => write!(f, "local:{id}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileMod {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_mod_id: Option<String>,
    /// Marketplace file id currently installed, when known. Local imports
    /// have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_version_id: Option<u64>,
    pub file_hash: String,
    pub file_name: String,
    pub enabled: bool,
    pub install_date: DateTime<Utc>,
    /// Content-addressed key under the download cache root.
    pub cache_location: String,
}

impl ProfileMod {
    /// A mod entry must carry exactly one identity; `mod_id` wins if a
    /// document somehow carries both.
    pub fn key(&self) -> Option<ModKey> {
        match (self.mod_id, &self.local_mod_id) {
            (Some(id), _) => Some(ModKey::Remote(id)),
            (None, Some(id)) => Some(ModKey::Local(id.clone())),
            (None, None) => None,
        }
    }

    /// Name this mod takes as a top-level entry in the mods directory: the
    /// archive name without its extension.
    pub fn entry_name(&self) -> String {
        match self.file_name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.to_string(),
            _ => self.file_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: ProfileId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub icon_color: String,
    #[serde(default)]
    pub mods: Vec<ProfileMod>,
    #[serde(default)]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Insert or replace the entry with the same identity. Returns true when
    /// an existing entry was replaced.
    pub fn upsert_mod(&mut self, entry: ProfileMod) -> bool {
        let key = entry.key();
        if let Some(key) = key {
            if let Some(existing) = self.mods.iter_mut().find(|m| m.key() == Some(key.clone())) {
                *existing = entry;
                return true;
            }
        }
        self.mods.push(entry);
        false
    }

    /// Remove the entry with the given identity. Returns true when an entry
    /// was actually removed.
    pub fn remove_mod(&mut self, key: &ModKey) -> bool {
        let before = self.mods.len();
        self.mods.retain(|m| m.key().as_ref() != Some(key));
        self.mods.len() != before
    }

    pub fn enabled_mods(&self) -> impl Iterator<Item = &ProfileMod> {
        self.mods.iter().filter(|m| m.enabled)
    }
}
