//! A deterministic column layout engine standing in for a browser's
//! multi-column flow. Every glyph advances half an em, every line is one
//! grid unit tall, and columns are filled top to bottom, left to right.

use std::collections::{BTreeMap, HashMap};
use textwrap::core::Fragment;
use textwrap::wrap_algorithms::wrap_first_fit;

use super::dom::{Document, NodeId};
use super::styler::{ContentStyle, base_font_px, computed_box, content_style, heading_scale};
use super::surface::{LayoutMode, Rect, Surface};
use crate::settings::ReaderSettings;

const EPSILON: f64 = 1e-6;

const HIDDEN_TAGS: &[&str] = &[
    "head", "title", "style", "script", "link", "meta", "noscript", "template",
];

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "caption", "dd", "details", "dialog",
    "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3",
    "h4", "h5", "h6", "header", "hgroup", "hr", "html", "li", "main", "nav", "ol", "p", "pre",
    "section", "summary", "table", "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

const REPLACED_TAGS: &[&str] = &["img", "svg"];

fn is_zero_width(ch: char) -> bool {
    matches!(ch, '\u{200b}' | '\u{200c}' | '\u{200d}' | '\u{feff}')
}

fn is_collapsible_space(ch: char) -> bool {
    ch.is_whitespace() && ch != '\u{a0}'
}

fn parse_dimension(value: Option<&str>) -> Option<f64> {
    let value = value?.trim();
    let value = value.strip_suffix("px").unwrap_or(value);
    value.parse::<f64>().ok().filter(|v| *v > 0.0)
}

#[derive(Debug, Clone, Copy)]
struct Glyph {
    node: NodeId,
    index: usize,
    advance: f64,
}

#[derive(Debug, Clone, Copy)]
enum RunItem {
    Char(Glyph, bool),
    Break,
}

#[derive(Debug, Clone, Default)]
struct Word {
    glyphs: Vec<Glyph>,
    space: Option<Glyph>,
    width: f64,
}

impl Fragment for Word {
    fn width(&self) -> f64 {
        self.width
    }

    fn whitespace_width(&self) -> f64 {
        self.space.map_or(0.0, |space| space.advance)
    }

    fn penalty_width(&self) -> f64 {
        0.0
    }
}

/// Splits a run of inline content into words, collapsing whitespace.
fn collect_words(items: &[(Glyph, bool)]) -> Vec<Word> {
    let mut words: Vec<Word> = Vec::new();
    let mut current = Word::default();
    for &(glyph, is_space) in items {
        if is_space {
            if !current.glyphs.is_empty() {
                current.space = Some(glyph);
                words.push(std::mem::take(&mut current));
            }
        } else {
            current.width += glyph.advance;
            current.glyphs.push(glyph);
        }
    }
    if !current.glyphs.is_empty() {
        words.push(current);
    }
    words
}

/// Breaks words wider than a line into line-sized pieces.
fn split_long_words(words: Vec<Word>, max_width: f64) -> Vec<Word> {
    let mut result = Vec::with_capacity(words.len());
    for word in words {
        if word.width <= max_width + EPSILON {
            result.push(word);
            continue;
        }
        let mut piece = Word::default();
        for glyph in word.glyphs {
            if !piece.glyphs.is_empty() && piece.width + glyph.advance > max_width + EPSILON {
                result.push(std::mem::take(&mut piece));
            }
            piece.width += glyph.advance;
            piece.glyphs.push(glyph);
        }
        piece.space = word.space;
        result.push(piece);
    }
    result
}

struct BlockContext {
    font_px: f64,
    indent: f64,
    first_line_pending: bool,
}

struct Flow<'a> {
    doc: &'a Document,
    font_size: u32,
    base_font_px: f64,
    grid: f64,
    column_width: f64,
    column_pitch: f64,
    margin: f64,
    column_height: f64,
    column: usize,
    y: f64,
    last_column: Option<usize>,
    char_rects: HashMap<NodeId, Vec<Option<Rect>>>,
    boxes: HashMap<NodeId, BTreeMap<usize, Rect>>,
}

impl<'a> Flow<'a> {
    fn new(doc: &'a Document, style: &ContentStyle, column_height: f64) -> Self {
        let char_rects = doc
            .descendants(doc.root())
            .into_iter()
            .filter_map(|id| doc.text(id).map(|text| (id, vec![None; text.chars().count()])))
            .collect();
        Self {
            doc,
            font_size: style.font_size,
            base_font_px: base_font_px(style.font_size),
            grid: style.grid_unit.max(1.0),
            column_width: style.layout.column_width.max(1.0),
            column_pitch: style.layout.column_width.max(1.0) + style.layout.gap,
            margin: style.layout.margin,
            column_height: column_height.max(1.0),
            column: 0,
            y: 0.0,
            last_column: None,
            char_rects,
            boxes: HashMap::new(),
        }
    }

    fn column_x(&self, column: usize) -> f64 {
        self.margin + column as f64 * self.column_pitch
    }

    fn next_column(&mut self) {
        self.column += 1;
        self.y = 0.0;
    }

    fn advance(&mut self, space: f64) {
        if space <= 0.0 {
            return;
        }
        self.y += space;
        self.wrap_if_full();
    }

    fn wrap_if_full(&mut self) {
        if self.y >= self.column_height - EPSILON {
            self.next_column();
        }
    }

    fn ensure_room(&mut self, height: f64) {
        if self.y > 0.0 && self.y + height > self.column_height + EPSILON {
            self.next_column();
        }
    }

    /// Records `rect` for `node` and every ancestor.
    fn place(&mut self, node: NodeId, rect: Rect) {
        let column = self.column;
        self.last_column = Some(self.last_column.map_or(column, |last| last.max(column)));
        let mut current = Some(node);
        while let Some(id) = current {
            self.extend_box(id, column, rect);
            current = self.doc.parent(id);
        }
    }

    fn extend_box(&mut self, id: NodeId, column: usize, rect: Rect) {
        self.boxes
            .entry(id)
            .or_default()
            .entry(column)
            .and_modify(|existing| *existing = existing.union(&rect))
            .or_insert(rect);
    }

    fn layout_block(&mut self, id: NodeId, parent_font_px: f64) {
        let tag = self.doc.tag_name(id).unwrap_or_default();
        if REPLACED_TAGS.contains(&tag) {
            self.layout_replaced(id);
            return;
        }
        let font_px = heading_scale(tag).map_or(parent_font_px, |scale| self.base_font_px * scale);
        let edges = if id == self.doc.root() {
            Default::default()
        } else {
            computed_box(self.doc, id, self.font_size)
        };
        let indent = if tag == "p" && !self.doc.has_class(id, "first") && !self.doc.has_class(id, "no-indent") {
            1.5 * font_px
        } else {
            0.0
        };

        self.advance(edges.margin_top);
        let start = (self.column, self.y);
        self.advance(edges.padding_top);

        let mut context = BlockContext {
            font_px,
            indent,
            first_line_pending: true,
        };
        let mut run = Vec::new();
        self.layout_children(id, &mut context, &mut run);
        self.flush(&mut run, &mut context);

        self.advance(edges.padding_bottom);
        let end = (self.column, self.y);
        self.advance(edges.margin_bottom);
        self.record_span(id, start, end);
    }

    fn layout_children(&mut self, id: NodeId, context: &mut BlockContext, run: &mut Vec<RunItem>) {
        for &child in self.doc.children(id) {
            if let Some(text) = self.doc.text(child) {
                for (index, ch) in text.chars().enumerate() {
                    let advance = if is_zero_width(ch) {
                        0.0
                    } else {
                        context.font_px * 0.5
                    };
                    let glyph = Glyph {
                        node: child,
                        index,
                        advance,
                    };
                    run.push(RunItem::Char(glyph, is_collapsible_space(ch)));
                }
                continue;
            }
            let tag = self.doc.tag_name(child).unwrap_or_default();
            if HIDDEN_TAGS.contains(&tag) {
                continue;
            }
            if BLOCK_TAGS.contains(&tag) || REPLACED_TAGS.contains(&tag) {
                self.flush(run, context);
                self.layout_block(child, context.font_px);
            } else if tag == "br" {
                run.push(RunItem::Break);
            } else {
                self.layout_children(child, context, run);
            }
        }
    }

    /// Lays out the pending inline run as wrapped lines.
    fn flush(&mut self, run: &mut Vec<RunItem>, context: &mut BlockContext) {
        if run.is_empty() {
            return;
        }
        let items = std::mem::take(run);
        let segments: Vec<&[RunItem]> = items.split(|item| matches!(item, RunItem::Break)).collect();
        let last_segment = segments.len() - 1;
        for (segment_index, segment) in segments.into_iter().enumerate() {
            let chars: Vec<(Glyph, bool)> = segment
                .iter()
                .filter_map(|item| match item {
                    RunItem::Char(glyph, is_space) => Some((*glyph, *is_space)),
                    RunItem::Break => None,
                })
                .collect();
            let words = split_long_words(collect_words(&chars), self.column_width);
            if words.is_empty() {
                if segment_index < last_segment {
                    self.ensure_room(self.grid);
                    self.y += self.grid;
                    self.wrap_if_full();
                    context.first_line_pending = false;
                }
                continue;
            }
            self.layout_lines(&words, context);
        }
    }

    fn layout_lines(&mut self, words: &[Word], context: &mut BlockContext) {
        let indent = if context.first_line_pending {
            context.indent.min(self.column_width - 1.0).max(0.0)
        } else {
            0.0
        };
        let line_widths = [self.column_width - indent, self.column_width];
        let lines = wrap_first_fit(words, &line_widths);

        for (line_index, line) in lines.into_iter().enumerate() {
            self.ensure_room(self.grid);
            let mut x = self.column_x(self.column) + if line_index == 0 { indent } else { 0.0 };
            for (word_index, word) in line.iter().enumerate() {
                for glyph in &word.glyphs {
                    if glyph.advance > 0.0 {
                        self.place_glyph(*glyph, Rect::new(x, self.y, glyph.advance, self.grid));
                    }
                    x += glyph.advance;
                }
                if let Some(space) = word.space
                    && word_index + 1 < line.len()
                {
                    self.place_glyph(space, Rect::new(x, self.y, space.advance, self.grid));
                    x += space.advance;
                }
            }
            self.y += self.grid;
            self.wrap_if_full();
        }
        context.first_line_pending = false;
    }

    fn place_glyph(&mut self, glyph: Glyph, rect: Rect) {
        if let Some(slot) = self
            .char_rects
            .get_mut(&glyph.node)
            .and_then(|rects| rects.get_mut(glyph.index))
        {
            *slot = Some(rect);
        }
        self.place(glyph.node, rect);
    }

    /// Images and inline SVG: centred blocks whose height is a whole number
    /// of lines and which never straddle a column break.
    fn layout_replaced(&mut self, id: NodeId) {
        let width = parse_dimension(self.doc.attr(id, "width"));
        let height = parse_dimension(self.doc.attr(id, "height"));
        let (Some(mut width), Some(mut height)) = (width, height) else {
            let rect = Rect::new(self.column_x(self.column), self.y, 0.0, 0.0);
            self.place(id, rect);
            return;
        };

        if width > self.column_width {
            height *= self.column_width / width;
            width = self.column_width;
        }
        if height > self.column_height {
            width *= self.column_height / height;
            height = self.column_height;
        }
        let mut snapped = ((height / self.grid).round() * self.grid).max(self.grid);
        if snapped > self.column_height {
            snapped = ((self.column_height / self.grid).floor() * self.grid).max(self.grid);
        }

        self.ensure_room(snapped);
        let x = self.column_x(self.column) + (self.column_width - width) / 2.0;
        self.place(id, Rect::new(x, self.y, width, snapped));
        self.y += snapped;
        self.wrap_if_full();
    }

    fn record_span(&mut self, id: NodeId, start: (usize, f64), end: (usize, f64)) {
        let (start_column, start_y) = start;
        let (end_column, end_y) = end;
        for column in start_column..=end_column {
            let top = if column == start_column { start_y } else { 0.0 };
            let bottom = if column == end_column {
                end_y
            } else {
                self.column_height
            };
            if column > start_column && bottom <= top {
                continue;
            }
            let rect = Rect::new(self.column_x(column), top, self.column_width, (bottom - top).max(0.0));
            self.extend_box(id, column, rect);
        }
    }

    fn finish(self) -> Geometry {
        let columns = self.last_column.map_or(1, |last| last + 1) as f64;
        let gap = self.column_pitch - self.column_width;
        let scroll_width =
            2.0 * self.margin + columns * self.column_width + (columns - 1.0) * gap;
        let node_rects = self
            .boxes
            .into_iter()
            .map(|(id, columns)| (id, columns.into_values().collect()))
            .collect();
        Geometry {
            node_rects,
            char_rects: self.char_rects,
            scroll_width,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Geometry {
    node_rects: HashMap<NodeId, Vec<Rect>>,
    char_rects: HashMap<NodeId, Vec<Option<Rect>>>,
    scroll_width: f64,
}

/// In-memory `Surface` used by the command line tool and the tests.
#[derive(Debug, Clone)]
pub struct FlowSurface {
    width: f64,
    height: f64,
    device_pixel_ratio: f64,
    document: Option<Document>,
    style: Option<ContentStyle>,
    translate: f64,
    visible: bool,
    geometry: Geometry,
    last_settle: Option<LayoutMode>,
}

impl FlowSurface {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio: 1.0,
            document: None,
            style: None,
            translate: 0.0,
            visible: true,
            geometry: Geometry::default(),
            last_settle: None,
        }
    }

    pub fn with_device_pixel_ratio(mut self, ratio: f64) -> Self {
        self.device_pixel_ratio = ratio;
        self
    }

    /// Resizes the container; geometry is stale until the next `settle`.
    pub fn set_container_size(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    pub fn style(&self) -> Option<&ContentStyle> {
        self.style.as_ref()
    }

    /// Mode of the most recent reflow.
    pub fn last_settle(&self) -> Option<LayoutMode> {
        self.last_settle
    }

    fn relayout(&mut self) {
        let Some(document) = &self.document else {
            self.geometry = Geometry::default();
            return;
        };
        let fallback;
        let style = match &self.style {
            Some(style) => style,
            None => {
                fallback = content_style(&ReaderSettings::default(), false, self.width, self.height);
                &fallback
            }
        };
        let mut flow = Flow::new(document, style, self.height);
        let root = document.root();
        flow.layout_block(root, flow.base_font_px);
        self.geometry = flow.finish();
    }
}

impl Surface for FlowSurface {
    fn container_size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    fn mount(&mut self, document: Document) {
        self.document = Some(document);
    }

    fn unmount(&mut self) {
        self.document = None;
        self.geometry = Geometry::default();
        self.translate = 0.0;
    }

    fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    fn document_mut(&mut self) -> Option<&mut Document> {
        self.document.as_mut()
    }

    fn apply_style(&mut self, style: &ContentStyle, preserve_translate: bool) {
        self.style = Some(style.clone());
        if !preserve_translate {
            self.translate = 0.0;
        }
    }

    fn settle(&mut self, mode: LayoutMode) {
        // Images carry their decoded size as attributes, so both modes can
        // lay out at once.
        self.last_settle = Some(mode);
        self.relayout();
    }

    fn scroll_width(&self) -> f64 {
        self.geometry.scroll_width
    }

    fn client_rects(&self, node: NodeId) -> Vec<Rect> {
        self.geometry.node_rects.get(&node).cloned().unwrap_or_default()
    }

    fn range_rects(&self, text: NodeId, start: usize, end: usize) -> Vec<Rect> {
        self.geometry
            .char_rects
            .get(&text)
            .map(|rects| {
                rects
                    .iter()
                    .skip(start)
                    .take(end.saturating_sub(start))
                    .flatten()
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn elements_from_point(&self, x: f64, y: f64) -> Vec<NodeId> {
        let Some(document) = &self.document else {
            return Vec::new();
        };
        let content_x = x + self.translate;
        let mut hits: Vec<NodeId> = self
            .geometry
            .node_rects
            .iter()
            .filter(|(id, rects)| {
                document.is_element(**id) && rects.iter().any(|rect| rect.contains(content_x, y))
            })
            .map(|(id, _)| *id)
            .collect();
        hits.sort_by(|a, b| {
            document
                .depth(*b)
                .cmp(&document.depth(*a))
                .then_with(|| b.cmp(a))
        });
        hits
    }

    fn set_translate(&mut self, x: f64) {
        self.translate = x;
    }

    fn translate(&self) -> f64 {
        self.translate
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(width: f64, height: f64) -> ContentStyle {
        let settings = ReaderSettings {
            margin: 20,
            ..ReaderSettings::default()
        };
        content_style(&settings, false, width, height)
    }

    fn surface_with(html: &str, width: f64, height: f64) -> (FlowSurface, Document) {
        let source = Document::parse_html(html);
        let body = source.elements_by_tag(source.root(), &["body"])[0];
        let mut document = Document::new("div");
        let root = document.root();
        for &child in source.children(body) {
            document.copy_subtree(&source, child, root);
        }
        let mut surface = FlowSurface::new(width, height);
        surface.mount(document.clone());
        surface.apply_style(&style(width, height), false);
        surface.settle(LayoutMode::Sync);
        (surface, document)
    }

    #[test]
    fn test_single_line_paragraph() {
        // 300x400 portrait: column width 260, grid 26, glyphs 8px wide.
        let (surface, doc) = surface_with(r#"<p class="first">ab cd</p>"#, 300.0, 400.0);
        let p = doc.elements_by_tag(doc.root(), &["p"])[0];
        let text = doc.children(p)[0];

        let rects = surface.range_rects(text, 0, 5);
        assert_eq!(rects.len(), 5);
        assert_eq!(rects[0], Rect::new(20.0, 16.0, 8.0, 26.0));
        assert_eq!(rects[2].x, 36.0);
        assert_eq!(surface.scroll_width(), 300.0);
    }

    #[test]
    fn test_first_line_indent() {
        let (surface, doc) = surface_with("<p>ab</p>", 300.0, 400.0);
        let p = doc.elements_by_tag(doc.root(), &["p"])[0];
        let text = doc.children(p)[0];
        assert_eq!(surface.range_rects(text, 0, 1)[0].x, 44.0);
    }

    #[test]
    fn test_whitespace_collapses() {
        let (surface, doc) = surface_with(r#"<p class="first">  a   b </p>"#, 300.0, 400.0);
        let p = doc.elements_by_tag(doc.root(), &["p"])[0];
        let text = doc.children(p)[0];
        // Leading spaces, repeated spaces and the trailing space have no box.
        assert!(surface.range_rects(text, 0, 2).is_empty());
        assert_eq!(surface.range_rects(text, 2, 4).len(), 2);
        assert!(surface.range_rects(text, 4, 6).is_empty());
        assert_eq!(surface.range_rects(text, 6, 7)[0].x, 36.0);
        assert!(surface.range_rects(text, 7, 8).is_empty());
    }

    #[test]
    fn test_zero_width_characters_have_no_box() {
        let (surface, doc) = surface_with("<p class=\"first\">\u{200b}ab</p>", 300.0, 400.0);
        let p = doc.elements_by_tag(doc.root(), &["p"])[0];
        let text = doc.children(p)[0];
        assert!(surface.range_rects(text, 0, 1).is_empty());
        assert_eq!(surface.range_rects(text, 1, 2)[0].x, 20.0);
    }

    #[test]
    fn test_text_continues_in_next_column() {
        // 120x130: 80px columns of five lines, ten glyphs per line.
        let words = vec!["abcdefghij"; 8].join(" ");
        let html = format!(r#"<div>{words}</div>"#);
        let (surface, doc) = surface_with(&html, 120.0, 130.0);
        let div = doc.elements_by_tag(doc.root(), &["div"])[0];
        let text = doc.children(div)[0];

        let rects = surface.client_rects(div);
        assert_eq!(rects.len(), 2);
        assert_eq!(rects[0].x, 20.0);
        assert_eq!(rects[1].x, 120.0);
        let last = surface.range_rects(text, 0, words.chars().count());
        assert_eq!(last.last().map(|rect| rect.y), Some(52.0));
        assert_eq!(surface.scroll_width(), 40.0 + 80.0 * 2.0 + 20.0);
    }

    #[test]
    fn test_image_is_snapped_and_moves_to_next_column() {
        let html = r#"<div>a</div><div>b</div><div>c</div><img width="60" height="60"/>"#;
        let (surface, doc) = surface_with(html, 120.0, 104.0);
        let img = doc.elements_by_tag(doc.root(), &["img"])[0];
        // 60px rounds to 52px; only 26px remain in the first column.
        assert_eq!(surface.client_rects(img), vec![Rect::new(130.0, 0.0, 60.0, 52.0)]);
    }

    #[test]
    fn test_wide_image_is_scaled_to_column() {
        let (surface, doc) = surface_with(r#"<img width="160" height="100"/>"#, 120.0, 400.0);
        let img = doc.elements_by_tag(doc.root(), &["img"])[0];
        // 160x100 scales to 80x50 and snaps to two lines.
        assert_eq!(surface.client_rects(img), vec![Rect::new(20.0, 0.0, 80.0, 52.0)]);
    }

    #[test]
    fn test_headings_use_wider_glyphs() {
        let (surface, doc) = surface_with("<h1>ab</h1>", 300.0, 400.0);
        let h1 = doc.elements_by_tag(doc.root(), &["h1"])[0];
        let text = doc.children(h1)[0];
        assert_eq!(surface.range_rects(text, 0, 1)[0].width, 12.0);
    }

    #[test]
    fn test_elements_from_point_deepest_first() {
        let (mut surface, doc) =
            surface_with(r#"<div><p class="first"><em>ab</em></p></div>"#, 300.0, 400.0);
        let em = doc.elements_by_tag(doc.root(), &["em"])[0];
        let p = doc.elements_by_tag(doc.root(), &["p"])[0];
        let hits = surface.elements_from_point(22.0, 20.0);
        assert_eq!(hits[0], em);
        assert_eq!(hits[1], p);
        assert_eq!(hits.last(), Some(&doc.root()));

        surface.set_translate(500.0);
        assert!(!surface.elements_from_point(22.0, 20.0).contains(&em));
    }

    #[test]
    fn test_line_breaks() {
        let (surface, doc) = surface_with(r#"<div>a<br/><br/>b</div>"#, 300.0, 400.0);
        let div = doc.elements_by_tag(doc.root(), &["div"])[0];
        let b = *doc.children(div).last().unwrap();
        assert_eq!(surface.range_rects(b, 0, 1)[0].y, 52.0);
    }
}
