use serde::Serialize;

use super::frame::FramePlatform;
use super::profile::{Profile, ProfileSource};

/// Every thread profile imported from one trace file.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileGroup {
    pub name: String,
    pub source: ProfileSource,
    pub platform: FramePlatform,
    pub trace_id: Option<String>,
    pub active_profile_index: usize,
    pub profiles: Vec<Profile>,
}

impl ProfileGroup {
    /// The profile a viewer should open first.
    pub fn active_profile(&self) -> Option<&Profile> {
        self.profiles
            .get(self.active_profile_index)
            .or_else(|| self.profiles.first())
    }

    pub fn profile_for_thread(&self, thread_id: u64) -> Option<&Profile> {
        self.profiles
            .iter()
            .find(|p| p.thread_id() == Some(thread_id))
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
