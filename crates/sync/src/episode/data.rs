use serde::{Deserialize, Serialize};

/// Persisted state of one chapter slot.
///
/// `files` is either absent or non-empty; absent marks the slot as stale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeData {
    /// Index into the group list; `0` is the container root.
    #[serde(default, skip_serializing_if = "is_root_group")]
    pub group_id: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
}

fn is_root_group(group_id: &usize) -> bool {
    *group_id == 0
}

impl EpisodeData {
    /// Whether the slot's output is present and matches the given identity.
    /// An unset `update_id` matches any recorded revision.
    pub fn is_fresh(&self, group_id: usize, update_id: Option<&str>) -> bool {
        self.has_files() && update_id.is_none_or(|u| self.update_id.as_deref() == Some(u)) && self.group_id == group_id
    }

    pub fn has_files(&self) -> bool {
        self.files.as_ref().is_some_and(|f| !f.is_empty())
    }

    pub fn owns(&self, name: &str) -> bool {
        self.files.as_ref().is_some_and(|f| f.iter().any(|n| n == name))
    }
}

/// Contents of the episode cache file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeListData {
    /// Group folder names; group `n` (1-based) lives at `groups[n - 1]`.
    pub groups: Vec<String>,
    pub episodes: Vec<EpisodeData>,
}
