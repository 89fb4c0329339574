//! The boundary between the synchronizer and wherever novels come from.
//!
//! A [`Provider`] knows one novel: it fetches descriptive metadata and the
//! ordered chapter index. Each [`Chapter`] carries a loader that fetches its
//! content on demand; the synchronizer only calls it for chapters whose
//! output is missing or out of date.

use std::fmt;

use async_trait::async_trait;

use crate::novel::NovelData;
use crate::render::Sink;

mod error;
mod manifest;
mod registry;

pub use error::{ErrorKind, ProviderError, ProviderResult};
pub use manifest::ManifestProvider;
pub use registry::{Registry, Resolver};

#[async_trait]
pub trait Provider: Send + Sync {
    /// Identifier that resolves back to this provider through a [`Registry`].
    /// Stored as the novel's `id`.
    fn source(&self) -> &str;

    /// Fetch descriptive metadata. The returned `id` is ignored in favour of
    /// [`source`](Provider::source).
    async fn fetch(&self) -> ProviderResult<NovelData>;

    /// Fetch the ordered chapter index.
    async fn fetch_index(&self) -> ProviderResult<Vec<Chapter>>;
}

/// Fetches the content of one chapter.
#[async_trait]
pub trait ChapterLoader: Send + Sync {
    async fn load(&self) -> ProviderResult<Box<dyn Content>>;
}

/// Fetched chapter content, ready to be rendered into output files.
pub trait Content: Send + Sync {
    fn render(&self, sink: &mut Sink);
}

/// One entry of a chapter index.
pub struct Chapter {
    /// Group (volume, arc) label. Consecutive chapters with the same label
    /// share a group folder.
    pub group: Option<String>,
    pub name: String,
    /// Opaque revision marker; a change means the chapter must be re-fetched.
    pub update_id: Option<String>,
    loader: Box<dyn ChapterLoader>,
}

impl Chapter {
    pub fn new(name: impl Into<String>, loader: impl ChapterLoader + 'static) -> Self {
        Self { group: None, name: name.into(), update_id: None, loader: Box::new(loader) }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_update_id(mut self, update_id: impl Into<String>) -> Self {
        self.update_id = Some(update_id.into());
        self
    }

    /// Fetch the chapter's content.
    pub async fn fetch(&self) -> ProviderResult<Box<dyn Content>> {
        self.loader.load().await
    }
}

impl fmt::Debug for Chapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chapter")
            .field("group", &self.group)
            .field("name", &self.name)
            .field("update_id", &self.update_id)
            .finish_non_exhaustive()
    }
}
