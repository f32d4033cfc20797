//! The seam between the renderer and whatever actually lays chapters out.

use super::dom::{Document, NodeId};
use super::styler::ContentStyle;

/// A box in content coordinates: x grows across columns, y down a column.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left() && x < self.right() && y >= self.top() && y < self.bottom()
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let left = self.left().min(other.left());
        let top = self.top().min(other.top());
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(left, top, right - left, bottom - top)
    }
}

/// How much waiting a relayout does before measuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutMode {
    /// Wait for fonts and images before the reflow.
    #[default]
    Async,
    /// Reflow immediately; used for same-chapter restyles.
    Sync,
}

/// A rendering target able to lay out one chapter in horizontal columns.
///
/// Geometry queries answer from the most recent `settle`.
pub trait Surface {
    fn container_size(&self) -> (f64, f64);

    fn device_pixel_ratio(&self) -> f64 {
        1.0
    }

    /// Replaces the mounted content tree.
    fn mount(&mut self, document: Document);

    fn unmount(&mut self);

    fn document(&self) -> Option<&Document>;

    fn document_mut(&mut self) -> Option<&mut Document>;

    /// Applies the host and injected styles. The page translate is reset
    /// unless `preserve_translate` is set.
    fn apply_style(&mut self, style: &ContentStyle, preserve_translate: bool);

    /// Waits as `mode` asks, then reflows.
    fn settle(&mut self, mode: LayoutMode);

    fn scroll_width(&self) -> f64;

    /// Per-column boxes of an element or text node.
    fn client_rects(&self, node: NodeId) -> Vec<Rect>;

    /// Boxes of the characters `start..end` of a text node; collapsed and
    /// zero-width characters have none.
    fn range_rects(&self, text: NodeId, start: usize, end: usize) -> Vec<Rect>;

    /// Elements under a point given in container coordinates, deepest first.
    fn elements_from_point(&self, x: f64, y: f64) -> Vec<NodeId>;

    fn set_translate(&mut self, x: f64);

    fn translate(&self) -> f64;

    fn set_visible(&mut self, visible: bool);

    fn is_visible(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_contains_is_half_open() {
        let rect = Rect::new(10.0, 0.0, 5.0, 26.0);
        assert!(rect.contains(10.0, 0.0));
        assert!(rect.contains(14.9, 25.9));
        assert!(!rect.contains(15.0, 5.0));
        assert!(!rect.contains(12.0, 26.0));
    }

    #[test]
    fn test_rect_union() {
        let union = Rect::new(0.0, 10.0, 5.0, 5.0).union(&Rect::new(3.0, 0.0, 10.0, 2.0));
        assert_eq!(union, Rect::new(0.0, 0.0, 13.0, 15.0));
    }
}
