use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use novelsync_storage::{Folder, Tree};

use super::EpisodeData;
use crate::error::{ErrorKind, Result};
use crate::patch::{Patch, Reconcile};
use crate::provider::Chapter;
use crate::render::Sink;

/// Proposed change to an [`EpisodeData`]. `None` leaves a field alone, so a
/// chapter without an update id never erases the recorded one.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct EpisodePatch {
    pub group_id: Option<usize>,
    pub update_id: Option<String>,
    pub files: Option<Option<Vec<String>>>,
}

impl EpisodePatch {
    /// The identity a chapter at a given group claims.
    pub fn identity(group_id: usize, update_id: Option<String>) -> Self {
        Self { group_id: Some(group_id), update_id, files: None }
    }

    fn touches_identity(&self) -> bool {
        self.group_id.is_some() || self.update_id.is_some()
    }
}

impl Patch for EpisodePatch {
    fn is_empty(&self) -> bool {
        !self.touches_identity() && self.files.is_none()
    }
}

/// A chapter slot being reconciled against its chapter.
pub(crate) struct Entry<'a> {
    pub data: &'a mut EpisodeData,
    pub tree: &'a mut Tree,
    /// Group folders by group id; `0` is the container root.
    pub folders: &'a [Option<Folder>],
    pub chapter: &'a Chapter,
    pub index: usize,
}

impl Entry<'_> {
    fn folder(&self, group_id: usize) -> Option<Folder> {
        self.folders.get(group_id).copied().flatten()
    }

    /// Best-effort removal of files written before a failed write, so an
    /// entry never leaves output it doesn't record.
    async fn discard(&mut self, folder: Folder, names: &[String]) {
        for name in names {
            let removed = match self.tree.request_file(folder, name) {
                Ok(file) => self.tree.remove_file(file).await,
                Err(e) => Err(e),
            };
            if let Err(e) = removed {
                tracing::warn!(index = self.index, file = %name, error = ?e, "Could not remove partial chapter output");
            }
        }
    }
}

#[async_trait]
impl Reconcile for Entry<'_> {
    type Patch = EpisodePatch;

    // `files` is derived output, not identity: a patch touching only it never
    // triggers a fetch.
    fn should_update(&self, patch: &EpisodePatch) -> bool {
        if !patch.touches_identity() {
            return false;
        }
        let group_id = patch.group_id.unwrap_or(self.data.group_id);
        !self.data.is_fresh(group_id, patch.update_id.as_deref())
    }

    // A refetch records exactly the chapter's update id, so the old one goes
    // along with the old files.
    async fn will_update(&mut self, _patch: &EpisodePatch) -> Result<()> {
        self.data.update_id = None;
        let Some(files) = &self.data.files else {
            return Ok(());
        };
        match self.folder(self.data.group_id) {
            Some(folder) => {
                for name in files {
                    let file = self.tree.request_file(folder, name).or_raise(|| ErrorKind::Storage)?;
                    self.tree.remove_file(file).await.or_raise(|| ErrorKind::Storage)?;
                }
            },
            None => tracing::warn!(
                index = self.index,
                group_id = self.data.group_id,
                "Old group folder is unknown, leaving stale files in place"
            ),
        }
        self.data.files = None;
        Ok(())
    }

    fn update(&mut self, patch: EpisodePatch) {
        if let Some(group_id) = patch.group_id {
            self.data.group_id = group_id;
        }
        if let Some(update_id) = patch.update_id {
            self.data.update_id = Some(update_id);
        }
        if let Some(files) = patch.files {
            self.data.files = files;
        }
    }

    async fn did_update(&mut self) -> Result<()> {
        let group_id = self.data.group_id;
        let folder = self.folder(group_id).ok_or_raise(|| ErrorKind::MissingGroup(group_id))?;
        let content = self.chapter.fetch().await.or_raise(|| ErrorKind::Provider)?;
        let mut sink = Sink::new(self.index);
        content.render(&mut sink);
        if sink.is_empty() {
            tracing::warn!(index = self.index, chapter = %self.chapter.name, "Chapter rendered no files");
            return Ok(());
        }
        let mut names = Vec::new();
        for rendered in sink.into_files() {
            let written = match self.tree.request_file(folder, &rendered.name) {
                Ok(file) => self.tree.write(file, &rendered.data).await,
                Err(e) => Err(e),
            };
            match written {
                Ok(path) => tracing::debug!(path = %path.display(), bytes = rendered.data.len(), "Wrote chapter file"),
                Err(e) => {
                    self.discard(folder, &names).await;
                    return Err(e.raise(ErrorKind::Storage));
                },
            }
            names.push(rendered.name);
        }
        tracing::info!(index = self.index, chapter = %self.chapter.name, files = names.len(), "Chapter synchronized");
        self.data.files = Some(names);
        Ok(())
    }
}
