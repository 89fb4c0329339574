//! Incremental synchronization of serialized novels.
//!
//! A [`Series`] mirrors one novel from a [`Provider`](provider::Provider)
//! into a container folder:
//!
//! ```text
//! My Novel/
//! ├── index.json          novel metadata
//! ├── !meta/
//! │   └── !cache.json.gz  one entry per chapter position
//! ├── 001 Prologue.txt    ungrouped chapters live in the container
//! └── 001 Arc 1/
//!     ├── 002 Ch.1.txt
//!     └── 003 Ch.2.txt
//! ```
//!
//! Each run compares the provider's chapter index against the cache and only
//! fetches chapters whose output is missing, whose update id changed, or
//! that moved to another group. Group folders are renamed in place when a
//! group's label changes. The cache is saved after every chapter, so an
//! interrupted run loses at most the chapter it was working on.

mod episode;
pub mod error;
mod novel;
pub mod patch;
pub mod provider;
mod render;
mod series;

pub use crate::episode::{
    CACHE_FILE, EpisodeData, EpisodeList, EpisodeListData, EpisodeListOptions, META_FOLDER, UpdateSummary,
};
pub use crate::novel::{NovelData, Status};
pub use crate::render::{Payload, RenderedFile, Sink};
pub use crate::series::{INDEX_FILE, Series, SeriesOptions};
