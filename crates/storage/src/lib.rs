//! Staged filesystem nodes.
//!
//! A [`Tree`] holds in-memory handles to folders and files whose physical
//! location may still change before anything is written. Nodes are created
//! lazily on first real access, can be renamed for free while they only
//! exist in memory, and track parent/child ownership so that a folder can't
//! be removed while it still has live children.
//!
//! ```no_run
//! use novelsync_storage::Tree;
//!
//! # async fn example() -> novelsync_storage::error::Result<()> {
//! let mut tree = Tree::new();
//! let root = tree.root("/library/My Novel")?;
//! let volume = tree.request_folder(root, "001 Volume 1")?;
//! let chapter = tree.request_file(volume, "001 Prologue.txt")?;
//! // Nothing exists on disk yet; renaming is purely in-memory.
//! tree.rename(volume, "001 The Beginning").await?;
//! tree.write(chapter, b"Once upon a time\n").await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
mod name;
mod tree;

pub use crate::name::{sanitize as sanitize_name, validate as validate_name};
pub use crate::tree::{File, Folder, NodeId, Tree};
