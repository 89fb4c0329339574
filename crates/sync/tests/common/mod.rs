#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use novelsync_sync::Sink;
use novelsync_sync::provider::{Chapter, ChapterLoader, Content, ErrorKind, ProviderResult};

/// Counts content fetches across every chapter built from it.
#[derive(Clone, Default)]
pub struct Fetches(Arc<AtomicUsize>);

impl Fetches {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub fn chapter(&self, group: Option<&str>, name: &str, update_id: Option<&str>, text: &str) -> Chapter {
        self.build(group, name, update_id, text, false)
    }

    /// A chapter whose content fetch fails.
    pub fn broken(&self, group: Option<&str>, name: &str, update_id: Option<&str>) -> Chapter {
        self.build(group, name, update_id, "", true)
    }

    fn build(&self, group: Option<&str>, name: &str, update_id: Option<&str>, text: &str, fail: bool) -> Chapter {
        let loader = Loader { fetches: self.clone(), title: name.to_string(), text: text.to_string(), fail };
        let mut chapter = Chapter::new(name, loader);
        chapter.group = group.map(str::to_string);
        chapter.update_id = update_id.map(str::to_string);
        chapter
    }
}

struct Loader {
    fetches: Fetches,
    title: String,
    text: String,
    fail: bool,
}

#[async_trait]
impl ChapterLoader for Loader {
    async fn load(&self) -> ProviderResult<Box<dyn Content>> {
        self.fetches.0.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            exn::bail!(ErrorKind::Unavailable(self.title.clone()));
        }
        Ok(Box::new(Text { title: self.title.clone(), text: self.text.clone() }))
    }
}

struct Text {
    title: String,
    text: String,
}

impl Content for Text {
    fn render(&self, sink: &mut Sink) {
        sink.text(&format!("{}.txt", self.title), self.text.split("\n\n"));
    }
}

pub fn modified(path: impl AsRef<Path>) -> SystemTime {
    std::fs::metadata(path).unwrap().modified().unwrap()
}

pub fn read(path: impl AsRef<Path>) -> String {
    std::fs::read_to_string(path).unwrap()
}

/// Sorted names of the entries in `path`.
pub fn ls(path: impl AsRef<Path>) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(path)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
