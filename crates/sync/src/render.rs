//! Turning fetched chapter content into named output files.

use novelsync_storage::sanitize_name;

/// Payload of a single output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Paragraphs of prose, written as UTF-8 text.
    Text(Vec<String>),
    /// Raw bytes written verbatim (images and other attachments).
    Binary(Vec<u8>),
}

impl Payload {
    /// Encode the payload for writing. Text paragraphs are separated by a
    /// blank line and the file ends with exactly one newline.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Binary(data) => data.clone(),
            Self::Text(paragraphs) => {
                let mut text = paragraphs
                    .iter()
                    .map(|p| p.trim_end())
                    .filter(|p| !p.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                text.push('\n');
                text.into_bytes()
            },
        }
    }
}

/// A file produced by rendering a chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    /// Final file name, including the chapter index prefix.
    pub name: String,
    pub data: Vec<u8>,
}

/// Collects the files a chapter renders to.
///
/// Every name handed to the sink is sanitized and prefixed with the
/// chapter's zero-padded, 1-based index, so `"Prologue.txt"` for the first
/// chapter becomes `"001 Prologue.txt"`. Emitting the same name twice keeps
/// the latest payload.
#[derive(Debug)]
pub struct Sink {
    prefix: String,
    files: Vec<RenderedFile>,
}

impl Sink {
    /// Sink for the chapter at zero-based position `index`.
    pub fn new(index: usize) -> Self {
        Self { prefix: format!("{:03} ", index + 1), files: Vec::new() }
    }

    pub fn emit(&mut self, name: &str, payload: Payload) {
        let name = format!("{}{}", self.prefix, sanitize_name(name));
        let data = payload.encode();
        match self.files.iter_mut().find(|f| f.name == name) {
            Some(existing) => existing.data = data,
            None => self.files.push(RenderedFile { name, data }),
        }
    }

    pub fn text<I, S>(&mut self, name: &str, paragraphs: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.emit(name, Payload::Text(paragraphs.into_iter().map(Into::into).collect()));
    }

    pub fn binary(&mut self, name: &str, data: impl Into<Vec<u8>>) {
        self.emit(name, Payload::Binary(data.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn into_files(self) -> Vec<RenderedFile> {
        self.files
    }
}
