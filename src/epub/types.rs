use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpubMetadata {
    pub title: String,
    pub creator: String,
    pub language: Option<String>,
    pub identifier: Option<String>,
    pub publisher: Option<String>,
}

impl Default for EpubMetadata {
    fn default() -> Self {
        Self {
            title: "Unknown Title".to_string(),
            creator: "Unknown Author".to_string(),
            language: None,
            identifier: None,
            publisher: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpineItem {
    pub idref: String,
    /// Uncompressed size of the chapter in bytes, used to weight progress.
    pub size: u64,
    pub linear: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavPoint {
    pub id: String,
    pub label: String,
    pub content: String,
    pub children: Vec<NavPoint>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct EpubPackage {
    pub metadata: EpubMetadata,
    /// Manifest items in document order.
    pub manifest: Vec<ManifestItem>,
    pub spine: Vec<SpineItem>,
    pub toc: Vec<NavPoint>,
    pub opf_path: String,
}

impl EpubPackage {
    pub fn manifest_item(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.id == id)
    }

    pub fn spine_href(&self, index: usize) -> Option<&str> {
        let spine_item = self.spine.get(index)?;
        self.manifest_item(&spine_item.idref)
            .map(|item| item.href.as_str())
    }

    /// Archive path of a spine chapter.
    pub fn chapter_path(&self, index: usize) -> Option<String> {
        let href = self.spine_href(index)?;
        let opf_dir = match self.opf_path.rfind('/') {
            Some(slash) => &self.opf_path[..=slash],
            None => "",
        };
        Some(crate::epub::resolver::normalize_path(&format!("{opf_dir}{href}")))
    }

    /// Spine position of the chapter an href points at; the fragment is ignored.
    pub fn spine_index_for_href(&self, href: &str) -> Option<usize> {
        let path = href.split('#').next().unwrap_or_default();
        if path.is_empty() {
            return None;
        }
        let wanted = crate::epub::resolver::normalize_path(path);
        let hrefs: Vec<String> = (0..self.spine.len())
            .map(|index| {
                self.spine_href(index)
                    .map(crate::epub::resolver::normalize_path)
                    .unwrap_or_default()
            })
            .collect();
        hrefs
            .iter()
            .position(|candidate| !candidate.is_empty() && *candidate == wanted)
            .or_else(|| {
                hrefs.iter().position(|candidate| {
                    !candidate.is_empty()
                        && (candidate.ends_with(&format!("/{wanted}"))
                            || wanted.ends_with(&format!("/{candidate}")))
                })
            })
    }
}

/// What `display` should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayTarget {
    Start,
    Cfi(String),
    SpineIndex(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationDisplayed {
    /// One-based page within the chapter.
    pub page: usize,
    pub total: usize,
    pub spine_index: usize,
    pub spine_total: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationStart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cfi: Option<String>,
    pub displayed: LocationDisplayed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub start: LocationStart,
    /// Set when the location was computed without looking for a CFI.
    pub basic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutInfo {
    pub column_width: f64,
    pub gap: f64,
    pub page_stride: f64,
    pub container_width: f64,
    pub margin: f64,
    pub is_two_column: bool,
}

impl LayoutInfo {
    pub fn columns_per_page(&self) -> usize {
        if self.is_two_column { 2 } else { 1 }
    }

    /// Width of the visible text area of one page, without the trailing gap.
    pub fn visible_width(&self) -> f64 {
        self.page_stride - self.gap
    }
}
