use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use novelsync_storage::{File, Folder, Tree, sanitize_name};
use tokio::fs;
use tracing::instrument;

use crate::episode::{EpisodeList, EpisodeListOptions, UpdateSummary};
use crate::error::{ErrorKind, Result};
use crate::novel::{IndexFile, NovelData};
use crate::patch::{Reconcile, apply};
use crate::provider::{Provider, Registry};

pub const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Default)]
pub struct SeriesOptions {
    /// Container folder name. When unset, the container is named after the
    /// novel once its metadata is known.
    pub basename: Option<String>,
    /// Migrate a legacy `index.json` instead of refusing it.
    pub overwrite: bool,
    pub episodes: EpisodeListOptions,
}

/// One novel mirrored into one container folder.
///
/// Owns the container, its `index.json` and, once the index has been
/// synchronized, the container's [`EpisodeList`].
pub struct Series {
    registry: Registry,
    provider: Option<Box<dyn Provider>>,
    tree: Tree,
    container: Folder,
    index: File,
    renameable: bool,
    data: NovelData,
    options: SeriesOptions,
    episodes: Option<EpisodeList>,
}

impl Series {
    /// Resolve `source` to a series.
    ///
    /// A directory that already holds an `index.json` is synchronized in
    /// place, with its provider resolved from the stored `id`. Anything else
    /// goes through `registry` and is stored under `output_dir`.
    pub async fn from_source(
        registry: Registry,
        output_dir: impl Into<PathBuf>,
        source: &str,
        options: SeriesOptions,
    ) -> Result<Self> {
        let path = Path::new(source);
        let in_place = match fs::try_exists(path.join(INDEX_FILE)).await {
            Ok(exists) => exists,
            // A file path such as a manifest.
            Err(e) if e.kind() == std::io::ErrorKind::NotADirectory => false,
            Err(e) => return Err(e).or_raise(|| ErrorKind::Storage),
        };
        if in_place {
            return Self::in_place(registry, path, options);
        }
        let provider = registry.resolve(source)?;
        Self::new(registry, output_dir, provider, options)
    }

    /// A series for `provider` stored in a child folder of `output_dir`.
    pub fn new(
        registry: Registry,
        output_dir: impl Into<PathBuf>,
        provider: Box<dyn Provider>,
        options: SeriesOptions,
    ) -> Result<Self> {
        let mut tree = Tree::new();
        let root = tree.root(output_dir).or_raise(|| ErrorKind::Storage)?;
        // Named after the source until the novel's name is known.
        let name = sanitize_name(options.basename.as_deref().unwrap_or(provider.source()));
        let container = tree.request_folder(root, &name).or_raise(|| ErrorKind::Storage)?;
        let index = tree.request_file(container, INDEX_FILE).or_raise(|| ErrorKind::Storage)?;
        let renameable = options.basename.is_none() && tree.is_renameable(container);
        Ok(Self {
            registry,
            provider: Some(provider),
            tree,
            container,
            index,
            renameable,
            data: NovelData::default(),
            options,
            episodes: None,
        })
    }

    /// A series synchronized in place in an existing container folder.
    pub fn in_place(registry: Registry, container: impl Into<PathBuf>, options: SeriesOptions) -> Result<Self> {
        let mut tree = Tree::new();
        let container = tree.root(container).or_raise(|| ErrorKind::Storage)?;
        let index = tree.request_file(container, INDEX_FILE).or_raise(|| ErrorKind::Storage)?;
        // Roots never move.
        let renameable = tree.is_renameable(container);
        Ok(Self {
            registry,
            provider: None,
            tree,
            container,
            index,
            renameable,
            data: NovelData::default(),
            options,
            episodes: None,
        })
    }

    pub fn data(&self) -> &NovelData {
        &self.data
    }

    /// Display name: the novel's name, else the container's folder name.
    pub fn name(&self) -> String {
        match &self.data.name {
            Some(name) => name.clone(),
            None => self
                .path()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                .unwrap_or_default(),
        }
    }

    pub fn path(&self) -> Result<PathBuf> {
        self.tree.path(self.container).or_raise(|| ErrorKind::Storage)
    }

    pub fn episodes(&self) -> Option<&EpisodeList> {
        self.episodes.as_ref()
    }

    fn provider(&self) -> Result<&dyn Provider> {
        self.provider.as_deref().ok_or_raise(|| ErrorKind::Metadata)
    }

    /// Read `index.json`. A missing file keeps the current in-memory data.
    #[instrument(skip(self), fields(container = %self.name()))]
    pub async fn load(&mut self) -> Result<()> {
        let bytes = match self.tree.read(self.index).await {
            Err(e) if e.is_not_found() => {
                tracing::debug!("No metadata yet");
                return self.ensure_provider();
            },
            result => result.or_raise(|| ErrorKind::Storage)?,
        };
        match IndexFile::decode(&bytes).or_raise(|| ErrorKind::Metadata)? {
            IndexFile::Current(data) => self.data.merge(data),
            IndexFile::Legacy { source, data } => {
                if !self.options.overwrite {
                    exn::bail!(ErrorKind::VersionMismatch);
                }
                tracing::warn!(source = ?source, "Migrating legacy metadata");
                self.data.merge(data);
                if self.provider.is_none()
                    && let Some(source) = source
                {
                    self.provider = Some(self.registry.resolve(&source)?);
                }
            },
        }
        self.ensure_provider()
    }

    fn ensure_provider(&mut self) -> Result<()> {
        if self.provider.is_none() {
            let id = self.data.id.as_deref().ok_or_raise(|| ErrorKind::Metadata)?;
            self.provider = Some(self.registry.resolve(id)?);
        }
        Ok(())
    }

    /// Fetch metadata if any core field is missing, move the container to
    /// the novel's name where allowed, and persist `index.json`.
    #[instrument(skip(self), fields(container = %self.name()))]
    pub async fn update(&mut self) -> Result<()> {
        let patch = match self.data.is_complete() {
            true => NovelData::default(),
            false => {
                let provider = self.provider()?;
                let mut fetched = provider.fetch().await.or_raise(|| ErrorKind::Provider)?;
                fetched.id = Some(provider.source().to_string());
                tracing::info!(name = ?fetched.name, "Fetched novel metadata");
                fetched
            },
        };
        apply(&mut *self, patch).await?;
        self.save().await
    }

    /// Write `index.json`, pretty-printed, atomically.
    pub async fn save(&mut self) -> Result<()> {
        let mut json = serde_json::to_vec_pretty(&self.data).or_raise(|| ErrorKind::Metadata)?;
        json.push(b'\n');
        let path = self.tree.write_atomic(self.index, &json).await.or_raise(|| ErrorKind::Storage)?;
        tracing::debug!(path = %path.display(), "Saved novel metadata");
        Ok(())
    }

    /// [`update`](Self::update) the metadata, then bring the container's
    /// chapters in line with the provider's index.
    #[instrument(skip(self), fields(container = %self.name()))]
    pub async fn update_index(&mut self) -> Result<UpdateSummary> {
        self.update().await?;
        let episodes = match self.episodes.take() {
            Some(episodes) => episodes,
            None => EpisodeList::open(self.path()?, self.options.episodes.clone()).await?,
        };
        let episodes = self.episodes.insert(episodes);
        let chapters = match self.provider.as_deref() {
            Some(provider) => provider.fetch_index().await.or_raise(|| ErrorKind::Provider)?,
            None => exn::bail!(ErrorKind::Metadata),
        };
        let summary = episodes.update_with(&chapters).await?;

        let size = chapters.len() as u64;
        if let Some(status) = self.data.status.as_mut()
            && status.size != size
        {
            status.size = size;
            self.save().await?;
        }
        Ok(summary)
    }
}

#[async_trait]
impl Reconcile for Series {
    type Patch = NovelData;

    fn should_update(&self, patch: &NovelData) -> bool {
        self.data.differs_from(patch)
    }

    fn update(&mut self, patch: NovelData) {
        self.data.merge(patch);
    }

    async fn did_update(&mut self) -> Result<()> {
        let Some(name) = self.data.name.as_deref().filter(|_| self.renameable) else {
            return Ok(());
        };
        let name = sanitize_name(name);
        if self.tree.name(self.container).is_ok_and(|current| current == name) {
            return Ok(());
        }
        self.tree.rename(self.container, &name).await.or_raise(|| ErrorKind::Storage)?;
        // The episode list is bound to the old path.
        self.episodes = None;
        Ok(())
    }
}

impl fmt::Debug for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Series")
            .field("provider", &self.provider.as_deref().map(Provider::source))
            .field("container", &self.path().ok())
            .field("renameable", &self.renameable)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}
