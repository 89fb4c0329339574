//! Per-position reconciliation of a chapter index against a container folder.

mod data;
mod entry;
mod group;
mod list;

pub use data::{EpisodeData, EpisodeListData};
pub use list::{CACHE_FILE, EpisodeList, EpisodeListOptions, META_FOLDER, UpdateSummary};
