//! Novel metadata as persisted in `index.json`.

use serde::{Deserialize, Serialize};

use crate::patch::Patch;

/// Key that only the legacy metadata schema carries.
pub(crate) const LEGACY_SOURCE_KEY: &str = "sourceURL";

/// Publication status reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub completed: bool,
    /// Number of chapters published so far.
    pub size: u64,
}

/// Descriptive metadata of a novel.
///
/// Field order is the on-disk key order. Unknown keys are ignored on read.
/// As a [`Patch`], every `Some` field (and a non-empty `keywords`) overrides
/// the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NovelData {
    /// Source identifier the novel was fetched from; resolves back to a provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl NovelData {
    /// Whether the fields needed to name and describe the novel are all known.
    pub fn is_complete(&self) -> bool {
        self.id.is_some() && self.name.is_some() && self.author.is_some() && self.status.is_some()
    }

    /// Whether applying `patch` would change any field.
    pub fn differs_from(&self, patch: &NovelData) -> bool {
        fn changes<T: PartialEq>(current: &Option<T>, new: &Option<T>) -> bool {
            new.as_ref().is_some_and(|n| current.as_ref() != Some(n))
        }
        changes(&self.id, &patch.id)
            || changes(&self.name, &patch.name)
            || changes(&self.author, &patch.author)
            || changes(&self.description, &patch.description)
            || changes(&self.genre, &patch.genre)
            || changes(&self.status, &patch.status)
            || (!patch.keywords.is_empty() && patch.keywords != self.keywords)
    }

    pub fn merge(&mut self, patch: NovelData) {
        fn take<T>(current: &mut Option<T>, new: Option<T>) {
            if new.is_some() {
                *current = new;
            }
        }
        take(&mut self.id, patch.id);
        take(&mut self.name, patch.name);
        take(&mut self.author, patch.author);
        take(&mut self.description, patch.description);
        take(&mut self.genre, patch.genre);
        take(&mut self.status, patch.status);
        if !patch.keywords.is_empty() {
            self.keywords = patch.keywords;
        }
    }
}

impl Patch for NovelData {
    fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.name.is_none()
            && self.author.is_none()
            && self.description.is_none()
            && self.genre.is_none()
            && self.status.is_none()
            && self.keywords.is_empty()
    }
}

/// Decoded contents of an `index.json` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum IndexFile {
    Current(NovelData),
    /// The legacy schema; carries the source URL it was fetched from.
    Legacy { source: Option<String>, data: NovelData },
}

impl IndexFile {
    pub(crate) fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        let source = match value.get(LEGACY_SOURCE_KEY) {
            None => return Ok(Self::Current(serde_json::from_value(value)?)),
            Some(source) => source.as_str().map(str::to_string),
        };
        let mut data: NovelData = serde_json::from_value(value)?;
        // Legacy ids are not source identifiers.
        data.id = None;
        Ok(Self::Legacy { source, data })
    }
}
