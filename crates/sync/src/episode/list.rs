use std::path::PathBuf;
use std::time::Duration;

use derive_more::Display;
use exn::ResultExt;
use novelsync_compress::Compression;
use novelsync_storage::{File, Folder, Tree};
use tracing::instrument;

use super::entry::{Entry, EpisodePatch};
use super::group::{GroupFolder, GroupPatch, assign_groups};
use super::{EpisodeData, EpisodeListData};
use crate::error::{ErrorKind, Result};
use crate::patch::{Outcome, apply};
use crate::provider::Chapter;

pub const META_FOLDER: &str = "!meta";
pub const CACHE_FILE: &str = "!cache.json";

#[derive(Debug, Clone)]
pub struct EpisodeListOptions {
    /// Compression used when writing the cache. Either variant is read.
    pub compression: Compression,
    /// After updating, delete chapter files that no entry owns.
    pub check_fs: bool,
    /// Pause between two chapter fetches.
    pub fetch_delay: Duration,
}

impl Default for EpisodeListOptions {
    fn default() -> Self {
        Self { compression: Compression::Gzip, check_fs: false, fetch_delay: Duration::ZERO }
    }
}

/// Per-entry outcome counts of one [`EpisodeList::update_with`] call.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq)]
#[display("{created} new, {updated} updated, {unchanged} unchanged")]
pub struct UpdateSummary {
    /// Entries written for the first time.
    pub created: usize,
    /// Entries that had been written before and were fetched again.
    pub updated: usize,
    pub unchanged: usize,
}

/// Reconciles a container folder against a chapter index.
///
/// Holds one persisted [`EpisodeData`] per index position plus the group
/// folder names, stored in `!meta/!cache.json` (gzip: `!cache.json.gz`).
/// The cache is rewritten after every entry that changes, so an interrupted
/// run resumes with at most one entry to redo.
#[derive(Debug)]
pub struct EpisodeList {
    tree: Tree,
    root: Folder,
    meta: Folder,
    cache: File,
    options: EpisodeListOptions,
    data: EpisodeListData,
    /// Folder handles by group id; `0` is the root and always present.
    folders: Vec<Option<Folder>>,
    /// A cache file in the other compression format that must go after the next save.
    stale_variant: Option<File>,
    dirty: bool,
}

impl EpisodeList {
    /// An empty list rooted at `root`. Nothing is read or written.
    pub fn new(root: impl Into<PathBuf>, options: EpisodeListOptions) -> Result<Self> {
        let mut tree = Tree::new();
        let root = tree.root(root).or_raise(|| ErrorKind::Storage)?;
        let meta = tree.request_folder(root, META_FOLDER).or_raise(|| ErrorKind::Storage)?;
        let cache = tree
            .request_file(meta, &options.compression.apply_to(CACHE_FILE))
            .or_raise(|| ErrorKind::Storage)?;
        Ok(Self {
            tree,
            root,
            meta,
            cache,
            options,
            data: EpisodeListData::default(),
            folders: vec![Some(root)],
            stale_variant: None,
            dirty: false,
        })
    }

    /// Create a list rooted at `root` and [`load`](Self::load) its cache.
    pub async fn open(root: impl Into<PathBuf>, options: EpisodeListOptions) -> Result<Self> {
        let mut list = Self::new(root, options)?;
        list.load().await?;
        Ok(list)
    }

    pub fn data(&self) -> &EpisodeListData {
        &self.data
    }

    pub fn groups(&self) -> &[String] {
        &self.data.groups
    }

    pub fn episodes(&self) -> &[EpisodeData] {
        &self.data.episodes
    }

    pub fn root_path(&self) -> Result<PathBuf> {
        self.tree.path(self.root).or_raise(|| ErrorKind::Storage)
    }

    fn other_variant(&self) -> Compression {
        match self.options.compression {
            Compression::None => Compression::Gzip,
            Compression::Gzip => Compression::None,
        }
    }

    /// Read the cache, falling back to the other compression variant. A
    /// missing cache is a cold start. Group folders are rehydrated and
    /// entries whose files are no longer all present are marked stale.
    #[instrument(skip(self))]
    pub async fn load(&mut self) -> Result<()> {
        let variant_name = self.other_variant().apply_to(CACHE_FILE);
        let variant = self.tree.request_file(self.meta, &variant_name).or_raise(|| ErrorKind::Storage)?;
        let data = match self.read_cache(self.cache).await? {
            Some(data) => data,
            None => match self.read_cache(variant).await? {
                Some(data) => {
                    tracing::info!("Migrating episode cache to {}", self.options.compression);
                    self.dirty = true;
                    data
                },
                None => {
                    tracing::debug!("No episode cache, starting cold");
                    EpisodeListData::default()
                },
            },
        };
        self.stale_variant = match self.tree.exists(variant).await.or_raise(|| ErrorKind::Storage)? {
            true => Some(variant),
            false => None,
        };
        self.data = data;
        self.rehydrate()?;
        self.repair().await
    }

    async fn read_cache(&mut self, file: File) -> Result<Option<EpisodeListData>> {
        let bytes = match self.tree.read(file).await {
            Err(e) if e.is_not_found() => return Ok(None),
            result => result.or_raise(|| ErrorKind::Cache)?,
        };
        let json = self.options.compression.decompress(&bytes).or_raise(|| ErrorKind::Cache)?;
        Ok(Some(serde_json::from_slice(&json).or_raise(|| ErrorKind::Cache)?))
    }

    fn rehydrate(&mut self) -> Result<()> {
        for folder in self.folders.drain(1..).flatten() {
            self.tree.close(folder);
        }
        for name in &self.data.groups {
            let folder = self.tree.request_folder(self.root, name).or_raise(|| ErrorKind::Cache)?;
            self.folders.push(Some(folder));
        }
        Ok(())
    }

    async fn repair(&mut self) -> Result<()> {
        for (index, episode) in self.data.episodes.iter_mut().enumerate() {
            let Some(files) = &episode.files else {
                continue;
            };
            let folder = self.folders.get(episode.group_id).copied().flatten();
            let mut present = Vec::new();
            if let Some(folder) = folder {
                for name in files {
                    let file = self.tree.request_file(folder, name).or_raise(|| ErrorKind::Cache)?;
                    if self.tree.exists(file).await.or_raise(|| ErrorKind::Storage)? {
                        present.push(file);
                    }
                }
            }
            if !files.is_empty() && present.len() == files.len() {
                continue;
            }
            tracing::warn!(index, missing = files.len() - present.len(), "Chapter files missing, marking entry stale");
            for file in present {
                self.tree.remove_file(file).await.or_raise(|| ErrorKind::Storage)?;
            }
            episode.files = None;
            self.dirty = true;
        }
        Ok(())
    }

    /// Encode and atomically write the cache.
    pub async fn save(&mut self) -> Result<()> {
        let json = serde_json::to_vec(&self.data).or_raise(|| ErrorKind::Cache)?;
        let bytes = self.options.compression.compress(&json).or_raise(|| ErrorKind::Cache)?;
        let path = self.tree.write_atomic(self.cache, &bytes).await.or_raise(|| ErrorKind::Storage)?;
        tracing::debug!(path = %path.display(), episodes = self.data.episodes.len(), "Saved episode cache");
        if let Some(variant) = self.stale_variant.take() {
            self.tree.remove_file(variant).await.or_raise(|| ErrorKind::Storage)?;
        }
        self.dirty = false;
        Ok(())
    }

    /// Bring the container in line with `chapters`.
    ///
    /// Entries are processed strictly in order and the cache is saved after
    /// each one that changed. On failure the cache is saved once more, best
    /// effort, before the error is returned; the failed entry stays stale.
    #[instrument(skip_all, fields(chapters = chapters.len()))]
    pub async fn update_with(&mut self, chapters: &[Chapter]) -> Result<UpdateSummary> {
        match self.reconcile(chapters).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                if self.dirty
                    && let Err(save) = self.save().await
                {
                    tracing::error!(error = ?save, "Could not save episode cache after failure");
                }
                Err(e)
            },
        }
    }

    async fn reconcile(&mut self, chapters: &[Chapter]) -> Result<UpdateSummary> {
        let grouping = assign_groups(chapters);
        self.update_groups(&grouping.names).await?;

        let mut summary = UpdateSummary::default();
        for (index, (chapter, &group_id)) in chapters.iter().zip(&grouping.ids).enumerate() {
            if index == self.data.episodes.len() {
                self.data.episodes.push(EpisodeData::default());
            }
            let created = self.data.episodes[index] == EpisodeData::default();
            let mut entry = Entry {
                data: &mut self.data.episodes[index],
                tree: &mut self.tree,
                folders: &self.folders,
                chapter,
                index,
            };
            let patch = EpisodePatch::identity(group_id, chapter.update_id.clone());
            let outcome = apply(&mut entry, patch).await.inspect_err(|_| self.dirty = true)?;
            match outcome {
                Outcome::Unchanged => {
                    summary.unchanged += 1;
                    continue;
                },
                Outcome::Updated if created => summary.created += 1,
                Outcome::Updated => summary.updated += 1,
            }
            self.save().await?;
            if !self.options.fetch_delay.is_zero() && index + 1 < chapters.len() {
                tokio::time::sleep(self.options.fetch_delay).await;
            }
        }

        // Trailing chapters dropped from the index keep their files on disk.
        if self.data.episodes.len() > chapters.len() {
            self.data.episodes.truncate(chapters.len());
            self.dirty = true;
        }
        if self.data.groups.len() > grouping.names.len() {
            self.data.groups.truncate(grouping.names.len());
            for folder in self.folders.drain(grouping.names.len() + 1..).flatten() {
                self.tree.close(folder);
            }
            self.dirty = true;
        }
        if self.dirty {
            self.save().await?;
        }
        if self.options.check_fs {
            self.prune_untracked().await?;
        }
        tracing::info!(%summary, "Episode list updated");
        Ok(summary)
    }

    async fn update_groups(&mut self, names: &[String]) -> Result<()> {
        let mut changed = false;
        for (offset, name) in names.iter().enumerate() {
            let group_id = offset + 1;
            if self.folders.len() <= group_id {
                self.folders.resize(group_id + 1, None);
            }
            let mut group = GroupFolder {
                tree: &mut self.tree,
                root: self.root,
                slot: &mut self.folders[group_id],
                pending: None,
            };
            let outcome = apply(&mut group, GroupPatch(Some(name.clone()))).await?;
            match self.data.groups.get_mut(offset) {
                Some(existing) => *existing = name.clone(),
                None => self.data.groups.push(name.clone()),
            }
            // Folders already renamed must reach the cache even if a later one fails.
            if outcome == Outcome::Updated {
                changed = true;
                self.dirty = true;
            }
        }
        if changed {
            self.save().await?;
        }
        Ok(())
    }

    /// Delete files carrying the index prefix of a current entry that the
    /// entry doesn't own. Returns how many were removed.
    async fn prune_untracked(&mut self) -> Result<usize> {
        let mut removed = 0;
        for (group_id, folder) in self.folders.iter().enumerate() {
            let Some(folder) = *folder else {
                continue;
            };
            for name in self.tree.list_files(folder).await.or_raise(|| ErrorKind::Storage)? {
                let Some(index) = index_prefix(&name).filter(|i| (1..=self.data.episodes.len()).contains(i)) else {
                    continue;
                };
                let owner = &self.data.episodes[index - 1];
                if owner.group_id == group_id && owner.owns(&name) {
                    continue;
                }
                let file = self.tree.request_file(folder, &name).or_raise(|| ErrorKind::Storage)?;
                self.tree.remove_file(file).await.or_raise(|| ErrorKind::Storage)?;
                tracing::info!(group_id, file = %name, "Removed untracked chapter file");
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// The 1-based chapter index a file name starts with (`"012 Title.txt"` is 12).
fn index_prefix(name: &str) -> Option<usize> {
    let (digits, _) = name.split_once(' ')?;
    match digits.len() >= 3 && digits.bytes().all(|b| b.is_ascii_digit()) {
        true => digits.parse().ok(),
        false => None,
    }
}
