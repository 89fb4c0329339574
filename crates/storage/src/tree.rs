//! In-memory tree of staged folders and files.
//!
//! Nodes live in an arena owned by [`Tree`]; parents hold the indices of
//! their children and children hold the index of their parent. Handles
//! ([`Folder`], [`File`]) are plain `Copy` indices, so there is no shared
//! mutable aliasing: every mutation goes through `&mut Tree`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{ErrorKind, Result};
use crate::name::validate as validate_name;

/// Index of a node inside a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

/// Handle to a staged directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Folder(NodeId);

/// Handle to a staged regular file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct File(NodeId);

impl From<Folder> for NodeId {
    fn from(folder: Folder) -> Self {
        folder.0
    }
}
impl From<File> for NodeId {
    fn from(file: File) -> Self {
        file.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Folder,
    File,
}

#[derive(Debug)]
struct Node {
    kind: Kind,
    /// Single path segment, or the full anchor path for roots. `None` once closed.
    name: Option<PathBuf>,
    parent: Option<NodeId>,
    children: BTreeSet<NodeId>,
    /// Whether the node is known to exist on disk during this process.
    materialized: bool,
}

/// Arena of staged filesystem nodes.
#[derive(Debug, Default)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchor a root folder at `path`. Roots are never renameable.
    pub fn root(&mut self, path: impl Into<PathBuf>) -> Result<Folder> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            exn::bail!(ErrorKind::InvalidName(String::new()));
        }
        Ok(Folder(self.insert(Kind::Folder, path, None)))
    }

    /// Request a child folder handle. Requesting a name that is already
    /// tracked under `parent` returns the existing handle.
    pub fn request_folder(&mut self, parent: Folder, name: &str) -> Result<Folder> {
        self.request(parent, name, Kind::Folder).map(Folder)
    }

    /// Request a child file handle. Requesting a name that is already
    /// tracked under `parent` returns the existing handle.
    pub fn request_file(&mut self, parent: Folder, name: &str) -> Result<File> {
        self.request(parent, name, Kind::File).map(File)
    }

    fn request(&mut self, parent: Folder, name: &str, kind: Kind) -> Result<NodeId> {
        let name = validate_name(name)?;
        self.node(parent.0)?;
        if let Some(existing) = self.child_named(parent.0, name) {
            if self.nodes[existing.0].kind != kind {
                exn::bail!(ErrorKind::AlreadyExists(self.path(existing)?));
            }
            return Ok(existing);
        }
        let id = self.insert(kind, PathBuf::from(name), Some(parent.0));
        self.nodes[parent.0.0].children.insert(id);
        Ok(id)
    }

    fn insert(&mut self, kind: Kind, name: PathBuf, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            name: Some(name),
            parent,
            children: BTreeSet::new(),
            materialized: false,
        });
        id
    }

    fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.nodes[parent.0]
            .children
            .iter()
            .copied()
            .find(|child| self.nodes[child.0].name.as_deref().is_some_and(|n| n.as_os_str() == name))
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        match self.nodes.get(id.0) {
            Some(node) if node.name.is_some() => Ok(node),
            _ => exn::bail!(ErrorKind::PathUndefined),
        }
    }

    /// Current name of a node (the anchor path for roots).
    pub fn name(&self, node: impl Into<NodeId>) -> Result<String> {
        let node = self.node(node.into())?;
        Ok(node.name.as_deref().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default())
    }

    /// Whether the node can be renamed (has a parent and is still open).
    pub fn is_renameable(&self, node: impl Into<NodeId>) -> bool {
        self.node(node.into()).is_ok_and(|n| n.parent.is_some())
    }

    /// Absolute path computed by walking parent links.
    ///
    /// Fails with [`PathUndefined`](ErrorKind::PathUndefined) if the node or
    /// any of its ancestors has been closed.
    pub fn path(&self, node: impl Into<NodeId>) -> Result<PathBuf> {
        let mut segments = Vec::new();
        let mut current = Some(node.into());
        while let Some(id) = current {
            let node = self.node(id)?;
            if let Some(name) = node.name.as_deref() {
                segments.push(name);
            }
            current = node.parent;
        }
        Ok(segments.into_iter().rev().collect())
    }

    /// Names of the currently open children of `folder`.
    pub fn children(&self, folder: Folder) -> Result<Vec<String>> {
        let node = self.node(folder.0)?;
        Ok(node.children.iter().filter_map(|c| self.name(*c).ok()).collect())
    }

    /// Ensure the folder exists on disk. Idempotent; a no-op once the folder
    /// has been materialized during this process.
    pub async fn access(&mut self, folder: Folder) -> Result<PathBuf> {
        let path = self.path(folder)?;
        if self.nodes[folder.0.0].materialized {
            return Ok(path);
        }
        fs::create_dir_all(&path).await.map_err(|e| ErrorKind::from_io(e, &path))?;
        let mut current = Some(folder.0);
        while let Some(id) = current {
            self.nodes[id.0].materialized = true;
            current = self.nodes[id.0].parent;
        }
        Ok(path)
    }

    fn parent_folder(&self, id: NodeId) -> Result<Folder> {
        match self.node(id)?.parent {
            Some(parent) => Ok(Folder(parent)),
            None => exn::bail!(ErrorKind::PathUndefined),
        }
    }

    /// Rename a node.
    ///
    /// The in-memory name always changes. On disk, whatever currently sits at
    /// the old path is moved; if nothing is there yet the rename is purely
    /// in-memory. Moving onto something that already exists on disk fails
    /// with [`AlreadyExists`](ErrorKind::AlreadyExists) instead of replacing
    /// it, unless only the letter case changes. Any other I/O error is
    /// propagated and the in-memory name is left untouched.
    pub async fn rename(&mut self, node: impl Into<NodeId>, new_name: &str) -> Result<()> {
        let id = node.into();
        let new_name = validate_name(new_name)?;
        let Some(parent) = self.node(id)?.parent else {
            exn::bail!(ErrorKind::NotRenameable);
        };
        let from = self.path(id)?;
        if from.file_name().is_some_and(|n| n == new_name) {
            return Ok(());
        }
        if let Some(existing) = self.child_named(parent, new_name) {
            exn::bail!(ErrorKind::AlreadyExists(self.path(existing)?));
        }
        let to = from.with_file_name(new_name);
        let case_only = from.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.eq_ignore_ascii_case(new_name));
        if !case_only && on_disk(&from).await? && on_disk(&to).await? {
            exn::bail!(ErrorKind::AlreadyExists(to));
        }
        match fs::rename(&from, &to).await {
            Ok(()) => {
                tracing::info!(from = %from.display(), to = %to.display(), "Renamed");
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(from = %from.display(), to = %to.display(), "Renamed before materialization");
                self.nodes[id.0].materialized = false;
            },
            Err(e) => return Err(exn::Exn::from(ErrorKind::from_io(e, &from))),
        }
        self.nodes[id.0].name = Some(PathBuf::from(new_name));
        Ok(())
    }

    /// Write `data` to a file, materializing its parent folder first.
    pub async fn write(&mut self, file: File, data: &[u8]) -> Result<PathBuf> {
        let parent = self.parent_folder(file.0)?;
        self.access(parent).await?;
        let path = self.path(file)?;
        fs::write(&path, data).await.map_err(|e| ErrorKind::from_io(e, &path))?;
        self.nodes[file.0.0].materialized = true;
        Ok(path)
    }

    /// Write `data` through a hidden temporary sibling and rename it over
    /// the destination, so readers only ever see the old or the new content.
    pub async fn write_atomic(&mut self, file: File, data: &[u8]) -> Result<PathBuf> {
        let parent = self.parent_folder(file.0)?;
        let folder = self.access(parent).await?;
        let path = self.path(file)?;
        let temp = folder.join(format!(".{}.tmp", self.name(file)?));
        fs::write(&temp, data).await.map_err(|e| ErrorKind::from_io(e, &temp))?;
        if let Err(e) = fs::rename(&temp, &path).await {
            // Best effort; the temporary file is hidden and overwritten next time anyway.
            _ = fs::remove_file(&temp).await;
            return Err(exn::Exn::from(ErrorKind::from_io(e, &path)));
        }
        self.nodes[file.0.0].materialized = true;
        Ok(path)
    }

    /// Read a file's contents. Returns [`NotFound`](ErrorKind::NotFound) when
    /// the file doesn't exist.
    pub async fn read(&mut self, file: File) -> Result<Vec<u8>> {
        let path = self.path(file)?;
        let data = fs::read(&path).await.map_err(|e| ErrorKind::from_io(e, &path))?;
        self.nodes[file.0.0].materialized = true;
        Ok(data)
    }

    /// Check whether the node currently exists on disk.
    pub async fn exists(&self, node: impl Into<NodeId>) -> Result<bool> {
        let path = self.path(node)?;
        Ok(fs::try_exists(&path).await.map_err(|e| ErrorKind::from_io(e, &path))?)
    }

    /// List the entry names physically present in a folder. A folder that
    /// doesn't exist yet lists as empty.
    pub async fn list(&self, folder: Folder) -> Result<Vec<String>> {
        self.list_entries(folder, false).await
    }

    /// Like [`list`](Self::list), restricted to regular files.
    pub async fn list_files(&self, folder: Folder) -> Result<Vec<String>> {
        self.list_entries(folder, true).await
    }

    async fn list_entries(&self, folder: Folder, files_only: bool) -> Result<Vec<String>> {
        let path = self.path(folder)?;
        let mut entries = match fs::read_dir(&path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(exn::Exn::from(ErrorKind::from_io(e, &path))),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| ErrorKind::from_io(e, &path))? {
            if files_only && !entry.file_type().await.map_err(|e| ErrorKind::from_io(e, &path))?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Remove a file from disk and close its handle. Idempotent: a file that
    /// is already gone is not an error.
    pub async fn remove_file(&mut self, file: File) -> Result<()> {
        let path = self.path(file)?;
        match fs::remove_file(&path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => return Err(exn::Exn::from(ErrorKind::from_io(e, &path))),
        }
        self.close(file);
        Ok(())
    }

    /// Remove an empty folder from disk and close its handle.
    ///
    /// Fails with [`NotEmpty`](ErrorKind::NotEmpty) while the folder still
    /// has live children in the tree.
    pub async fn remove_folder(&mut self, folder: Folder) -> Result<()> {
        let path = self.path(folder)?;
        if !self.nodes[folder.0.0].children.is_empty() {
            exn::bail!(ErrorKind::NotEmpty(path));
        }
        match fs::remove_dir(&path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed folder"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            // Untracked leftovers on disk.
            Err(e) if e.kind() == std::io::ErrorKind::DirectoryNotEmpty => exn::bail!(ErrorKind::NotEmpty(path)),
            Err(e) => return Err(exn::Exn::from(ErrorKind::from_io(e, &path))),
        }
        self.close(folder);
        Ok(())
    }

    /// Detach a node from its parent and forget its name. Any later path
    /// computation through this node fails with
    /// [`PathUndefined`](ErrorKind::PathUndefined). Closing twice is a no-op.
    pub fn close(&mut self, node: impl Into<NodeId>) {
        let id = node.into();
        let Some(node) = self.nodes.get_mut(id.0) else {
            return;
        };
        node.name = None;
        node.materialized = false;
        if let Some(parent) = node.parent {
            self.nodes[parent.0].children.remove(&id);
        }
    }
}

async fn on_disk(path: &Path) -> Result<bool> {
    match fs::symlink_metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ErrorKind::from_io(e, path).into()),
    }
}
