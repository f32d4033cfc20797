//! Reading position: which page is showing, how far through the book that
//! is, and a CFI that will bring the same text back after a relayout.

use super::cfi;
use super::dom::NodeId;
use super::surface::Surface;
use super::types::{EpubPackage, LayoutInfo, Location, LocationDisplayed, LocationStart};

const STRUCTURAL_TAGS: &[&str] = &["div", "section", "article", "body"];

const CANDIDATE_TAGS: &[&str] = &["p", "h1", "h2", "h3", "h4", "h5", "h6", "img", "li"];

/// Distance into the first column probed for the top-left element.
const PROBE_INSET: f64 = 10.0;

/// Pixel slack absorbing subpixel drift when comparing positions.
pub fn fuzz_px(device_pixel_ratio: f64) -> f64 {
    (device_pixel_ratio * 2.0).clamp(2.0, 10.0)
}

/// Page holding a horizontal content position, corrected by one page when
/// the floor lands outside the visible span.
pub fn page_for_offset(left: f64, layout: &LayoutInfo, total_pages: usize, fuzz: f64) -> usize {
    let last = total_pages.saturating_sub(1) as i64;
    let stride = layout.page_stride;
    if stride <= 0.0 {
        return 0;
    }
    let mut page = (((left - layout.margin + fuzz) / stride).floor() as i64).clamp(0, last);

    let column_start = page as f64 * stride + layout.margin;
    let column_end = column_start + layout.visible_width();
    if left < column_start - fuzz {
        page -= 1;
    } else if left > column_end + fuzz {
        page += 1;
    }
    page.clamp(0, last) as usize
}

/// Number of pages a chapter with this scroll width occupies.
pub fn total_pages(scroll_width: f64, layout: &LayoutInfo) -> usize {
    if layout.page_stride <= 0.0 {
        return 1;
    }
    let pages = (scroll_width - 2.0 * layout.margin + layout.gap) / layout.page_stride;
    ((pages - 1e-3).ceil() as i64).max(1) as usize
}

#[derive(Debug, Clone)]
pub struct LocationTracker {
    sizes: Vec<u64>,
    cumulative: Vec<u64>,
    total_size: u64,
}

impl LocationTracker {
    pub fn new(package: &EpubPackage) -> Self {
        let sizes: Vec<u64> = package.spine.iter().map(|item| item.size).collect();
        let mut total_size = 0;
        let cumulative = sizes
            .iter()
            .map(|size| {
                let start = total_size;
                total_size += size;
                start
            })
            .collect();
        Self {
            sizes,
            cumulative,
            total_size,
        }
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Book percentage, weighting each chapter by its archive size.
    pub fn progress(&self, spine_index: usize, page: usize, total_pages: usize) -> Option<f64> {
        let size = *self.sizes.get(spine_index)?;
        let base = self.cumulative[spine_index];
        if self.total_size == 0 {
            return Some(0.0);
        }
        let chapter_fraction = if total_pages > 0 {
            page as f64 / total_pages as f64
        } else {
            0.0
        };
        Some((base as f64 + chapter_fraction * size as f64) / self.total_size as f64 * 100.0)
    }

    pub fn current_location<S: Surface + ?Sized>(
        &self,
        surface: &S,
        layout: &LayoutInfo,
        spine_index: usize,
        page: usize,
        total_pages: usize,
        basic: bool,
    ) -> Option<Location> {
        let percentage = self.progress(spine_index, page, total_pages)?;
        let displayed = LocationDisplayed {
            page: page + 1,
            total: total_pages,
            spine_index,
            spine_total: self.sizes.len(),
            percentage,
        };
        let without_cfi = |basic| Location {
            start: LocationStart {
                cfi: None,
                displayed,
            },
            basic,
        };
        if basic {
            return Some(without_cfi(true));
        }

        let (Some(doc), Some(element)) = (surface.document(), first_visible_element(surface, layout))
        else {
            return Some(without_cfi(false));
        };

        let fuzz = fuzz_px(surface.device_pixel_ratio());
        let visible_min = page as f64 * layout.page_stride + layout.margin;
        let left = surface
            .client_rects(element)
            .first()
            .map_or(0.0, |rect| rect.left());
        let offset = if left < visible_min - fuzz {
            first_visible_char_offset(surface, element, page, layout)
        } else {
            0
        };

        Some(Location {
            start: LocationStart {
                cfi: Some(cfi::generate(spine_index, doc, Some(element), doc.root(), offset)),
                displayed,
            },
            basic: false,
        })
    }
}

/// The content element at the top left of the visible page, skipping
/// generic containers.
pub fn first_visible_element<S: Surface + ?Sized>(surface: &S, layout: &LayoutInfo) -> Option<NodeId> {
    let doc = surface.document()?;
    let root = doc.root();
    let probe = layout.margin + PROBE_INSET;

    let hit = surface.elements_from_point(probe, probe).into_iter().find(|&id| {
        id != root
            && doc.contains(root, id)
            && doc
                .tag_name(id)
                .is_some_and(|tag| !STRUCTURAL_TAGS.contains(&tag))
    });
    if hit.is_some() {
        return hit;
    }

    let (container_width, _) = surface.container_size();
    let translate = surface.translate();
    let candidate = doc.elements_by_tag(root, CANDIDATE_TAGS).into_iter().find(|&id| {
        let rects = surface.client_rects(id);
        let Some(left) = rects.iter().map(|rect| rect.left()).reduce(f64::min) else {
            return false;
        };
        let left = left - translate;
        left >= -5.0 && left < container_width - layout.margin
    });
    Some(candidate.unwrap_or(root))
}

/// Character offset inside `element` of the first character drawn on
/// `page`, for elements that began on an earlier page.
pub fn first_visible_char_offset<S: Surface + ?Sized>(
    surface: &S,
    element: NodeId,
    page: usize,
    layout: &LayoutInfo,
) -> usize {
    let Some(doc) = surface.document() else {
        return 0;
    };
    let fuzz = fuzz_px(surface.device_pixel_ratio());
    let visible_min = page as f64 * layout.page_stride + layout.margin;
    let visible_max = visible_min + layout.visible_width();

    let mut seen = 0;
    for node in doc.text_nodes(element) {
        let len = doc.text(node).map_or(0, |text| text.chars().count());
        let text_left = doc
            .parent(node)
            .and_then(|parent| surface.client_rects(parent).first().copied())
            .map_or(0.0, |rect| rect.left());
        if text_left > visible_max {
            break;
        }

        let mut low = 0i64;
        let mut high = len as i64 - 1;
        let mut first_visible = None;
        while low <= high {
            let mid = (low + high) / 2;
            // Collapsed and zero-width characters have no box; judge by the
            // next character that does.
            let probe = (mid..=high).find_map(|index| {
                let index = index as usize;
                surface
                    .range_rects(node, index, index + 1)
                    .first()
                    .filter(|rect| rect.width > 0.0)
                    .map(|rect| (index, rect.left()))
            });
            match probe {
                Some((index, left)) if left < visible_min - fuzz => low = index as i64 + 1,
                Some((index, _)) => {
                    first_visible = Some(index);
                    high = mid - 1;
                }
                None => high = mid - 1,
            }
        }
        if let Some(index) = first_visible {
            return seen + index;
        }
        seen += len;
    }
    0
}
