//! Provider backed by a local JSON manifest.
//!
//! ```json
//! {
//!   "novel": { "name": "The Novel", "author": "Someone", "status": { "completed": false, "size": 2 } },
//!   "chapters": [
//!     { "group": "Arc 1", "name": "Prologue", "updateId": "r1", "paragraphs": ["It began."] },
//!     { "group": "Arc 1", "name": "Chapter 1", "file": "text/ch1.txt", "resources": [{ "name": "map.png", "file": "img/map.png" }] }
//!   ]
//! }
//! ```
//!
//! Relative `file` paths resolve against the manifest's directory. Text files
//! are split into paragraphs on blank lines.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use exn::ResultExt;
use serde::Deserialize;
use tokio::fs;

use super::{Chapter, ChapterLoader, Content, ErrorKind, Provider, ProviderResult};
use crate::novel::NovelData;
use crate::render::Sink;

const SCHEME: &str = "manifest:";

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    novel: NovelData,
    #[serde(default)]
    chapters: Vec<ManifestChapter>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestChapter {
    #[serde(default)]
    group: Option<String>,
    name: String,
    #[serde(default)]
    update_id: Option<String>,
    #[serde(default)]
    paragraphs: Vec<String>,
    #[serde(default)]
    file: Option<PathBuf>,
    #[serde(default)]
    resources: Vec<Resource>,
}

#[derive(Debug, Clone, Deserialize)]
struct Resource {
    name: String,
    file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ManifestProvider {
    source: String,
    path: PathBuf,
}

impl ManifestProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self { source: format!("{SCHEME}{}", path.display()), path }
    }

    /// Recognizes `manifest:<path>` and bare paths ending in `.json`.
    pub fn resolve(source: &str) -> Option<Self> {
        if let Some(path) = source.strip_prefix(SCHEME) {
            return (!path.is_empty()).then(|| Self::new(path));
        }
        let path = Path::new(source);
        match path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
            true => Some(Self::new(path)),
            false => None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> ProviderResult<Manifest> {
        let bytes = fs::read(&self.path).await.map_err(|e| ErrorKind::from_io(e, &self.path))?;
        serde_json::from_slice(&bytes).or_raise(|| ErrorKind::InvalidData(self.path.display().to_string()))
    }

    fn base_dir(&self) -> PathBuf {
        self.path.parent().map(Path::to_path_buf).unwrap_or_default()
    }
}

#[async_trait]
impl Provider for ManifestProvider {
    fn source(&self) -> &str {
        &self.source
    }

    async fn fetch(&self) -> ProviderResult<NovelData> {
        let mut novel = self.read().await?.novel;
        novel.id = Some(self.source.clone());
        Ok(novel)
    }

    async fn fetch_index(&self) -> ProviderResult<Vec<Chapter>> {
        let base = Arc::new(self.base_dir());
        let manifest = self.read().await?;
        tracing::debug!(path = %self.path.display(), chapters = manifest.chapters.len(), "Read manifest index");
        Ok(manifest
            .chapters
            .into_iter()
            .map(|entry| {
                let mut chapter = Chapter::new(entry.name.clone(), Loader { base: Arc::clone(&base), entry: entry.clone() });
                chapter.group = entry.group;
                chapter.update_id = entry.update_id;
                chapter
            })
            .collect())
    }
}

struct Loader {
    base: Arc<PathBuf>,
    entry: ManifestChapter,
}

impl Loader {
    async fn read_file(&self, file: &Path) -> ProviderResult<Vec<u8>> {
        let path = self.base.join(file);
        fs::read(&path).await.map_err(|e| ErrorKind::from_io(e, &path).into())
    }
}

#[async_trait]
impl ChapterLoader for Loader {
    async fn load(&self) -> ProviderResult<Box<dyn Content>> {
        let mut paragraphs = self.entry.paragraphs.clone();
        if let Some(file) = &self.entry.file {
            let bytes = self.read_file(file).await?;
            let text = String::from_utf8(bytes).or_raise(|| ErrorKind::InvalidData(file.display().to_string()))?;
            paragraphs.extend(split_paragraphs(&text));
        }
        if paragraphs.is_empty() && self.entry.resources.is_empty() {
            exn::bail!(ErrorKind::Unavailable(self.entry.name.clone()));
        }
        let attachments = futures::future::try_join_all(self.entry.resources.iter().map(|r| async move {
            let data = self.read_file(&r.file).await?;
            Ok::<_, super::ProviderError>((r.name.clone(), data))
        }))
        .await?;
        Ok(Box::new(ManifestContent { title: self.entry.name.clone(), paragraphs, attachments }))
    }
}

fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
            continue;
        }
        current.push(line.trim_end());
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }
    paragraphs
}

struct ManifestContent {
    title: String,
    paragraphs: Vec<String>,
    attachments: Vec<(String, Vec<u8>)>,
}

impl Content for ManifestContent {
    fn render(&self, sink: &mut Sink) {
        if !self.paragraphs.is_empty() {
            sink.text(&format!("{}.txt", self.title), self.paragraphs.iter().cloned());
        }
        for (name, data) in &self.attachments {
            sink.binary(name, data.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("manifest:novel.json", Some("novel.json"))]
    #[case("manifest:dir/novel", Some("dir/novel"))]
    #[case("novel.JSON", Some("novel.JSON"))]
    #[case("manifest:", None)]
    #[case("https://example.com/novel/1", None)]
    #[case("some-folder", None)]
    fn test_resolve(#[case] source: &str, #[case] path: Option<&str>) {
        let provider = ManifestProvider::resolve(source);
        assert_eq!(provider.as_ref().map(|p| p.path().to_str().unwrap()), path);
    }

    #[test]
    fn test_split_paragraphs() {
        let text = "First line\ncontinued  \n\n\n  \nSecond.\n";
        assert_eq!(split_paragraphs(text), ["First line\ncontinued", "Second."]);
    }

    #[tokio::test]
    async fn test_fetch_sets_id_to_source() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("novel.json");
        std::fs::write(&path, r#"{"novel":{"id":"ignored","name":"N","author":"A"},"chapters":[]}"#).unwrap();
        let provider = ManifestProvider::new(&path);
        let novel = provider.fetch().await.unwrap();
        assert_eq!(novel.id.as_deref(), Some(provider.source()));
        assert_eq!(novel.name.as_deref(), Some("N"));
    }

    #[tokio::test]
    async fn test_chapter_renders_text_and_resources() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(temp_dir.path().join("text")).unwrap();
        std::fs::write(temp_dir.path().join("text/ch1.txt"), "One.\n\nTwo.\n").unwrap();
        std::fs::write(temp_dir.path().join("map.png"), [1u8, 2, 3]).unwrap();
        let path = temp_dir.path().join("novel.json");
        std::fs::write(
            &path,
            r#"{"chapters":[{"group":"Arc","name":"Ch 1","updateId":"r1","file":"text/ch1.txt",
                "resources":[{"name":"map.png","file":"map.png"}]}]}"#,
        )
        .unwrap();

        let chapters = ManifestProvider::new(&path).fetch_index().await.unwrap();
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].group.as_deref(), Some("Arc"));
        assert_eq!(chapters[0].update_id.as_deref(), Some("r1"));

        let content = chapters[0].fetch().await.unwrap();
        let mut sink = Sink::new(0);
        content.render(&mut sink);
        let files = sink.into_files();
        assert_eq!(files[0].name, "001 Ch 1.txt");
        assert_eq!(files[0].data, b"One.\n\nTwo.\n");
        assert_eq!(files[1].name, "001 map.png");
        assert_eq!(files[1].data, [1, 2, 3]);
    }

    #[tokio::test]
    async fn test_missing_chapter_file_is_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("novel.json");
        std::fs::write(&path, r#"{"chapters":[{"name":"Ch","file":"gone.txt"}]}"#).unwrap();
        let chapters = ManifestProvider::new(&path).fetch_index().await.unwrap();
        let err = chapters[0].fetch().await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_manifest_is_not_found() {
        let err = ManifestProvider::new("/nonexistent/novel.json").fetch().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }
}
