//! Mapping between buffer offsets and positions inside the rendered tree.
//!
//! Positions inside the tree are addressed like DOM boundary points: a path of
//! child indices from the editable root plus an offset (a byte offset inside a
//! text node, a child index inside an element).

use super::render::{RenderElement, RenderNode, PREFIX_CLASS};
use super::text::{visible_len, Selection, ZERO_WIDTH_SPACE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomPoint {
    pub path: Vec<usize>,
    pub offset: usize,
}

impl DomPoint {
    pub fn new(path: Vec<usize>, offset: usize) -> Self {
        Self { path, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomRange {
    pub start: DomPoint,
    pub end: DomPoint,
}

impl DomRange {
    pub fn collapsed(point: DomPoint) -> Self {
        Self {
            start: point.clone(),
            end: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// Visible length of everything before `offset` inside `node`, following `path`.
fn visible_before(node: &RenderNode, path: &[usize], offset: usize) -> Option<usize> {
    match (node, path.split_first()) {
        (RenderNode::Text(text), None) => {
            let offset = offset.min(text.len());
            text.get(..offset).map(visible_len)
        }
        (RenderNode::Element(element), None) => Some(
            element
                .children
                .iter()
                .take(offset)
                .map(|child| visible_len(&child.text_content()))
                .sum(),
        ),
        (RenderNode::Element(element), Some((first, rest))) => {
            let child = element.children.get(*first)?;
            let before: usize = element.children[..*first]
                .iter()
                .map(|c| visible_len(&c.text_content()))
                .sum();
            Some(before + visible_before(child, rest, offset)?)
        }
        (RenderNode::Text(_), Some(_)) => None,
    }
}

fn offset_in_root(root: &RenderElement, point: &DomPoint) -> Option<usize> {
    let Some((block_index, rest)) = point.path.split_first() else {
        // The root itself is the container: count whole lines.
        return Some(
            root.children
                .iter()
                .take(point.offset)
                .map(|child| visible_len(&child.text_content()) + 1)
                .sum(),
        );
    };
    let block = root.children.get(*block_index)?;
    let accumulated: usize = root.children[..*block_index]
        .iter()
        .map(|child| visible_len(&child.text_content()) + 1)
        .sum();
    Some(accumulated + visible_before(block, rest, point.offset)?)
}

/// Reads the buffer selection out of a range on the rendered tree.
///
/// Without a range, or with one that does not resolve inside `root`, the
/// selection is `{0, 0}`.
pub fn get_selection(root: &RenderElement, range: Option<&DomRange>) -> Selection {
    let Some(range) = range else {
        return Selection::default();
    };
    match (
        offset_in_root(root, &range.start),
        offset_in_root(root, &range.end),
    ) {
        (Some(start), Some(end)) => Selection::new(start, end),
        _ => {
            log::debug!("selection does not resolve inside the editor root");
            Selection::default()
        }
    }
}

/// Raw byte offset in `text` reached after `target` visible bytes.
fn find_actual_offset(text: &str, target: usize) -> usize {
    let mut filtered = 0;
    for (index, ch) in text.char_indices() {
        if filtered >= target {
            return index;
        }
        if ch != ZERO_WIDTH_SPACE {
            filtered += ch.len_utf8();
        }
    }
    text.len()
}

struct TextNodeRef<'a> {
    path: Vec<usize>,
    text: &'a str,
    hidden: bool,
}

fn collect_text_nodes<'a>(
    element: &'a RenderElement,
    path: &mut Vec<usize>,
    hidden: bool,
    out: &mut Vec<TextNodeRef<'a>>,
) {
    for (index, child) in element.children.iter().enumerate() {
        path.push(index);
        match child {
            RenderNode::Text(text) => out.push(TextNodeRef {
                path: path.clone(),
                text,
                hidden,
            }),
            RenderNode::Element(inner) => {
                collect_text_nodes(inner, path, inner.has_class(PREFIX_CLASS), out)
            }
        }
        path.pop();
    }
}

fn point_in_block(block: &RenderNode, block_index: usize, offset_in_block: usize) -> DomPoint {
    let element = match block {
        RenderNode::Element(element) => element,
        RenderNode::Text(text) => {
            return DomPoint::new(vec![block_index], find_actual_offset(text, offset_in_block));
        }
    };

    let mut nodes = Vec::new();
    collect_text_nodes(element, &mut vec![block_index], false, &mut nodes);

    let mut node_offset = 0;
    for node in nodes {
        let filtered = visible_len(node.text);
        if node_offset + filtered >= offset_in_block {
            // A caret at the very end of a hidden prefix belongs after it.
            if node.hidden && node_offset + filtered == offset_in_block {
                node_offset += filtered;
                continue;
            }
            let actual = find_actual_offset(node.text, offset_in_block - node_offset);
            return DomPoint::new(node.path, actual);
        }
        node_offset += filtered;
    }
    DomPoint::new(vec![block_index], 0)
}

fn point_at_offset(root: &RenderElement, offset: usize) -> DomPoint {
    let mut accumulated = 0;
    for (index, child) in root.children.iter().enumerate() {
        let block_len = visible_len(&child.text_content());
        if accumulated + block_len >= offset {
            return point_in_block(child, index, offset - accumulated);
        }
        accumulated += block_len + 1;
    }
    DomPoint::new(Vec::new(), root.children.len())
}

/// Builds the tree range for a buffer selection.
pub fn set_selection(root: &RenderElement, start: usize, end: usize) -> DomRange {
    let start_point = point_at_offset(root, start);
    if start == end {
        return DomRange::collapsed(start_point);
    }
    DomRange {
        start: start_point,
        end: point_at_offset(root, end),
    }
}

/// Moves a caret sitting after a lone zero-width space to before it, so the
/// platform sees the caret at the start of an empty line.
pub fn fix_caret_after_zero_width_space(root: &RenderElement, range: &DomRange) -> Option<DomRange> {
    if !range.is_collapsed() {
        return None;
    }
    let RenderNode::Text(text) = root.node_at(&range.start.path)? else {
        return None;
    };
    let zero_width = ZERO_WIDTH_SPACE.to_string();
    if *text != zero_width || range.start.offset != ZERO_WIDTH_SPACE.len_utf8() {
        return None;
    }
    Some(DomRange::collapsed(DomPoint::new(range.start.path.clone(), 0)))
}

/// Carries a caret across a wholesale content replacement.
///
/// The two contents are compared through their common prefix and suffix; a
/// caret in the unchanged head stays put, one in the unchanged tail moves
/// with it, and one inside the rewritten middle lands where the rewrite
/// starts.
pub fn calculate_cursor_position(current: &str, updated: &str, cursor: usize) -> usize {
    let prefix = current
        .char_indices()
        .zip(updated.chars())
        .find(|((_, a), b)| a != b)
        .map_or(current.len().min(updated.len()), |((index, _), _)| index);

    let max_suffix = (current.len() - prefix).min(updated.len() - prefix);
    let suffix = current[prefix..]
        .chars()
        .rev()
        .zip(updated[prefix..].chars().rev())
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| a.len_utf8())
        .scan(0usize, |total, len| {
            *total += len;
            Some(*total)
        })
        .take_while(|total| *total <= max_suffix)
        .last()
        .unwrap_or(0);

    let removed = current.len() - prefix - suffix;
    let inserted = updated.len() - prefix - suffix;

    if cursor < prefix {
        cursor
    } else if cursor == prefix && removed == 0 {
        prefix + inserted
    } else if cursor < prefix + removed {
        prefix
    } else {
        (cursor - removed + inserted).min(updated.len())
    }
}
