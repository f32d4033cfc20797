use chrono::{DateTime, Utc};
use eyre::Result;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::epub::types::{DisplayTarget, EpubMetadata, Location};
use crate::epub::EpubParser;

const UNTITLED: &str = "Untitled";
const UNKNOWN_AUTHOR: &str = "Unknown";
const CFI_FRAGMENT: &str = "epubcfi(";

/// A markdown note. The first line of the edited text is its name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NoteRecord {
    pub name: String,
    pub content: String,
    /// Byte offset of the caret in `full_text()`.
    #[serde(default)]
    pub cursor: usize,
}

impl NoteRecord {
    pub fn from_text(text: &str, cursor: usize) -> Self {
        let (name, content) = split_note(text);
        Self {
            name,
            content,
            cursor: cursor.min(text.len()),
        }
    }

    /// Text as the editor shows it: name line, then content.
    pub fn full_text(&self) -> String {
        format!("{}\n{}", self.name, self.content)
    }
}

/// Splits editor text into `(name, content)` at the first newline.
pub fn split_note(text: &str) -> (String, String) {
    match text.split_once('\n') {
        Some((name, content)) => (name.to_string(), content.to_string()),
        None => (text.to_string(), String::new()),
    }
}

/// Saved reading position. Older records store a location index instead
/// of a CFI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadingProgress {
    Cfi(String),
    Index(usize),
}

impl Default for ReadingProgress {
    fn default() -> Self {
        ReadingProgress::Index(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub title: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<Vec<u8>>,
    pub data: Vec<u8>,
    #[serde(default)]
    pub progress: ReadingProgress,
    pub last_opened: DateTime<Utc>,
}

impl BookRecord {
    /// Builds a library record from EPUB bytes. Fails only when the bytes
    /// are not an archive; a missing cover is not an error.
    pub fn import(bytes: Vec<u8>) -> Result<Self> {
        let mut parser = EpubParser::new(bytes.clone())?;
        let package = parser.load();
        let defaults = EpubMetadata::default();

        let title = known_or(&package.metadata.title, &defaults.title, UNTITLED);
        let author = known_or(&package.metadata.creator, &defaults.creator, UNKNOWN_AUTHOR);
        let cover = parser.cover_image_href().and_then(|href| {
            let data = parser.get_file(&href);
            if data.is_none() {
                warn!("Cover image {href} is not in the archive");
            }
            data
        });
        debug!("Imported {title:?} by {author:?}, cover: {}", cover.is_some());

        Ok(Self {
            title,
            author,
            cover,
            data: bytes,
            progress: ReadingProgress::default(),
            last_opened: Utc::now(),
        })
    }

    /// Where to open the book. A `#epubcfi(...)` fragment wins over the
    /// saved progress; a legacy index starts from the beginning.
    pub fn initial_target(&self, hash: Option<&str>) -> DisplayTarget {
        let fragment = hash.map(|hash| hash.strip_prefix('#').unwrap_or(hash));
        if let Some(cfi) = fragment.filter(|fragment| fragment.starts_with(CFI_FRAGMENT)) {
            return DisplayTarget::Cfi(cfi.to_string());
        }
        match &self.progress {
            ReadingProgress::Cfi(cfi) if !cfi.is_empty() => DisplayTarget::Cfi(cfi.clone()),
            _ => DisplayTarget::SpineIndex(0),
        }
    }

    /// Stores the start of a relocated position. Locations without a CFI
    /// leave the saved progress alone.
    pub fn record_location(&mut self, location: &Location) {
        if let Some(cfi) = &location.start.cfi {
            self.progress = ReadingProgress::Cfi(cfi.clone());
        }
        self.last_opened = Utc::now();
    }
}

fn known_or(value: &str, parser_default: &str, fallback: &str) -> String {
    let value = value.trim();
    if value.is_empty() || value == parser_default {
        fallback.to_string()
    } else {
        value.to_string()
    }
}
