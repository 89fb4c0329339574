use async_trait::async_trait;
use exn::ResultExt;
use novelsync_storage::error::ErrorKind as StorageErrorKind;
use novelsync_storage::{Folder, Tree, sanitize_name};

use crate::error::{ErrorKind, Result};
use crate::patch::{Patch, Reconcile};
use crate::provider::Chapter;

/// Group ids for a chapter index.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Grouping {
    /// Group id of each chapter, in index order. `0` means ungrouped.
    pub ids: Vec<usize>,
    /// Folder name of each group; group `n` is at `names[n - 1]`.
    pub names: Vec<String>,
}

/// Assign group ids by walking the index in order: every change of group
/// label starts a new group, so a label that reappears after an interruption
/// gets a fresh id. Blank labels count as ungrouped.
pub(crate) fn assign_groups(chapters: &[Chapter]) -> Grouping {
    let mut grouping = Grouping::default();
    let mut running: Option<&str> = None;
    for chapter in chapters {
        let label = chapter.group.as_deref().map(str::trim).filter(|l| !l.is_empty());
        if label != running {
            running = label;
            if let Some(label) = label {
                grouping.names.push(group_folder_name(grouping.names.len() + 1, label));
            }
        }
        grouping.ids.push(if label.is_some() { grouping.names.len() } else { 0 });
    }
    grouping
}

pub(crate) fn group_folder_name(group_id: usize, label: &str) -> String {
    format!("{group_id:03} {}", sanitize_name(label))
}

/// Desired name of a group folder.
pub(crate) struct GroupPatch(pub Option<String>);

impl Patch for GroupPatch {
    fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

/// One group folder slot of an episode list.
pub(crate) struct GroupFolder<'a> {
    pub tree: &'a mut Tree,
    pub root: Folder,
    pub slot: &'a mut Option<Folder>,
    pub pending: Option<String>,
}

impl GroupFolder<'_> {
    /// Move an untracked entry occupying `name` in the container, typically a
    /// group folder left behind when the index shrank, to the first free
    /// `"{name} (n)"`.
    async fn move_aside(&mut self, name: &str) -> Result<()> {
        let tracked = self.tree.children(self.root).or_raise(|| ErrorKind::Storage)?;
        if tracked.iter().any(|child| child == name) {
            exn::bail!(ErrorKind::Storage);
        }
        let leftover = self.tree.request_folder(self.root, name).or_raise(|| ErrorKind::Storage)?;
        let mut n = 1;
        let moved = loop {
            let aside = format!("{name} ({n})");
            match self.tree.rename(leftover, &aside).await {
                Err(e) if matches!(&*e, StorageErrorKind::AlreadyExists(_)) => n += 1,
                result => break result.map(|()| aside),
            }
        };
        self.tree.close(leftover);
        let aside = moved.or_raise(|| ErrorKind::Storage)?;
        tracing::warn!(folder = %name, moved_to = %aside, "Moved untracked folder out of the way");
        Ok(())
    }
}

#[async_trait]
impl Reconcile for GroupFolder<'_> {
    type Patch = GroupPatch;

    fn should_update(&self, patch: &GroupPatch) -> bool {
        let Some(name) = &patch.0 else {
            return false;
        };
        match *self.slot {
            Some(folder) => !self.tree.name(folder).is_ok_and(|current| &current == name),
            None => true,
        }
    }

    async fn will_update(&mut self, patch: &GroupPatch) -> Result<()> {
        if self.slot.is_none()
            && let Some(name) = &patch.0
        {
            *self.slot = Some(self.tree.request_folder(self.root, name).or_raise(|| ErrorKind::Storage)?);
        }
        Ok(())
    }

    fn update(&mut self, patch: GroupPatch) {
        self.pending = patch.0;
    }

    async fn did_update(&mut self) -> Result<()> {
        let (Some(folder), Some(name)) = (*self.slot, self.pending.take()) else {
            return Ok(());
        };
        match self.tree.rename(folder, &name).await {
            Err(e) if matches!(&*e, StorageErrorKind::AlreadyExists(_)) => {
                self.move_aside(&name).await?;
                self.tree.rename(folder, &name).await.or_raise(|| ErrorKind::Storage)
            },
            result => result.or_raise(|| ErrorKind::Storage),
        }
    }
}
