use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ProfileId;

/// Process-wide profile registry: the active-profile pointer plus profile
/// ordering. A single instance of this document exists per data root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRegistry {
    pub active_profile_id: Option<ProfileId>,
    pub profiles: Vec<ProfileId>,
    pub last_sync: DateTime<Utc>,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self {
            active_profile_id: None,
            profiles: Vec::new(),
            last_sync: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

impl ProfileRegistry {
    pub fn track(&mut self, id: ProfileId) {
        if !self.profiles.contains(&id) {
            self.profiles.push(id);
        }
    }

    pub fn untrack(&mut self, id: &str) {
        self.profiles.retain(|p| p != id);
        if self.active_profile_id.as_deref() == Some(id) {
            self.active_profile_id = None;
        }
    }
}
