//! A small subset of EPUB canonical fragment identifiers, enough to store a
//! reading position and find it again:
//! `epubcfi(/6/{(spine+1)*2}!{/steps}/{offset})`.

use log::debug;
use regex::Regex;
use std::sync::LazyLock;

use super::dom::{Document, NodeId};
use super::surface::{Rect, Surface};

const PREFIX: &str = "epubcfi(";

/// Characters probed past the target offset before giving up on finding a
/// visible glyph.
pub const MAX_LOOKAHEAD: usize = 64;

static SPINE_STEP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/6/(\d+)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCfi {
    pub spine_index: usize,
    pub path: String,
    /// Characters into the element's text.
    pub offset: usize,
}

pub fn generate(
    spine_index: usize,
    doc: &Document,
    element: Option<NodeId>,
    root: NodeId,
    offset: usize,
) -> String {
    let spine_step = (spine_index + 1) * 2;
    match element {
        Some(element) => {
            let path = element_path(doc, element, root);
            format!("{PREFIX}/6/{spine_step}!{path}/{offset})")
        }
        None => format!("{PREFIX}/6/{spine_step}!/0)"),
    }
}

fn element_path(doc: &Document, element: NodeId, root: NodeId) -> String {
    let mut steps = Vec::new();
    let mut current = element;
    while current != root {
        let Some(parent) = doc.parent(current) else {
            break;
        };
        if let Some(index) = doc
            .element_children(parent)
            .iter()
            .position(|&child| child == current)
        {
            steps.push(((index + 1) * 2).to_string());
        }
        current = parent;
    }
    steps.reverse();
    format!("/{}", steps.join("/"))
}

/// Leading decimal digits of `s`, or 0.
fn leading_number(s: &str) -> usize {
    let digits: String = s.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

pub fn parse(cfi: &str) -> Option<ParsedCfi> {
    let inner = cfi.strip_prefix(PREFIX)?;
    let mut chars = inner.chars();
    chars.next_back();
    let inner = chars.as_str();

    let parts: Vec<&str> = inner.split('!').collect();
    if parts.len() < 2 {
        return None;
    }

    let spine_index = match SPINE_STEP.captures(parts[0]) {
        Some(caps) => {
            let step: usize = caps[1].parse().ok()?;
            if step < 2 {
                debug!("CFI spine step out of range: {cfi}");
                return None;
            }
            step / 2 - 1
        }
        None => 0,
    };

    let location = parts[1];
    let (path, offset) = match location.rfind('/') {
        Some(last_slash) if last_slash > 0 => (
            &location[..last_slash],
            leading_number(&location[last_slash + 1..]),
        ),
        _ => (location, 0),
    };

    Some(ParsedCfi {
        spine_index,
        path: path.to_string(),
        offset,
    })
}

/// Follows the even-numbered steps of `path` down from `root`. A step that
/// does not resolve stops the walk at the node reached so far.
pub fn element_by_path(doc: &Document, root: NodeId, path: &str) -> Option<NodeId> {
    if path.is_empty() || path == "/0" {
        return None;
    }
    let mut current = root;
    for step in path.split('/').filter(|step| !step.is_empty()) {
        let Ok(step) = step.parse::<usize>() else {
            return Some(current);
        };
        let children = doc.element_children(current);
        match (step / 2).checked_sub(1).and_then(|index| children.get(index)) {
            Some(&child) => current = child,
            None => return Some(current),
        }
    }
    Some(current)
}

/// The text node and local character offset holding the `offset`-th
/// character of `element`'s text.
pub fn locate_text_position(doc: &Document, element: NodeId, offset: usize) -> Option<(NodeId, usize)> {
    let mut seen = 0;
    for node in doc.text_nodes(element) {
        let len = doc.text(node).map_or(0, |text| text.chars().count());
        if seen + len >= offset {
            return Some((node, offset - seen));
        }
        seen += len;
    }
    None
}

/// Box of the first visible character at or after `offset` in `element`,
/// looking at most `MAX_LOOKAHEAD` characters ahead. Falls back to the
/// element's first box.
pub fn target_char_rect<S: Surface + ?Sized>(surface: &S, element: NodeId, offset: usize) -> Option<Rect> {
    let doc = surface.document()?;
    let element_rect = || surface.client_rects(element).first().copied();

    let Some((start_node, start_offset)) = locate_text_position(doc, element, offset) else {
        return element_rect();
    };

    let text_nodes = doc.text_nodes(element);
    let start = text_nodes.iter().position(|&node| node == start_node).unwrap_or(0);
    let mut budget = MAX_LOOKAHEAD + 1;
    let mut local = start_offset;
    for &node in &text_nodes[start..] {
        let len = doc.text(node).map_or(0, |text| text.chars().count());
        while local < len && budget > 0 {
            if let Some(rect) = surface.range_rects(node, local, local + 1).first() {
                return Some(*rect);
            }
            local += 1;
            budget -= 1;
        }
        if budget == 0 {
            break;
        }
        local = 0;
    }
    element_rect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::flow::FlowSurface;
    use crate::epub::surface::LayoutMode;
    use crate::epub::styler::content_style;
    use crate::settings::ReaderSettings;

    fn sample() -> Document {
        let mut doc = Document::new("div");
        let root = doc.root();
        doc.append_element(root, "style");
        let section = doc.append_element(root, "section");
        let first = doc.append_element(section, "p");
        doc.append_text(first, "one");
        let second = doc.append_element(section, "p");
        doc.append_text(second, "two ");
        let em = doc.append_element(second, "em");
        doc.append_text(em, "three");
        doc
    }

    #[test]
    fn test_generate_and_resolve_path() {
        let doc = sample();
        let second = doc.elements_by_tag(doc.root(), &["p"])[1];
        let cfi = generate(2, &doc, Some(second), doc.root(), 5);
        assert_eq!(cfi, "epubcfi(/6/6!/4/4/5)");

        let parsed = parse(&cfi).unwrap();
        assert_eq!(
            parsed,
            ParsedCfi {
                spine_index: 2,
                path: "/4/4".to_string(),
                offset: 5
            }
        );
        assert_eq!(element_by_path(&doc, doc.root(), &parsed.path), Some(second));
    }

    #[test]
    fn test_generate_without_element() {
        let doc = sample();
        assert_eq!(generate(0, &doc, None, doc.root(), 9), "epubcfi(/6/2!/0)");
        let parsed = parse("epubcfi(/6/2!/0)").unwrap();
        assert_eq!(parsed.path, "/0");
        assert_eq!(parsed.offset, 0);
        assert_eq!(element_by_path(&doc, doc.root(), &parsed.path), None);
    }

    #[test]
    fn test_parse_rejects_foreign_input() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("/6/4!/2/0"), None);
        assert_eq!(parse("epubcfi(/6/4)"), None);
        assert_eq!(parse("epubcfi(/6/0!/4/1)"), None);
        assert_eq!(parse("epubcfi(/6/99999999999999999999999!/4/1)"), None);
    }

    #[test]
    fn test_parse_offset_leading_digits() {
        let parsed = parse("epubcfi(/6/4!/4/2/12:3)").unwrap();
        assert_eq!(parsed.spine_index, 1);
        assert_eq!(parsed.path, "/4/2");
        assert_eq!(parsed.offset, 12);

        let parsed = parse("epubcfi(/6/4!/4/2/x)").unwrap();
        assert_eq!(parsed.offset, 0);
    }

    #[test]
    fn test_element_by_path_degrades_to_last_valid() {
        let doc = sample();
        let section = doc.elements_by_tag(doc.root(), &["section"])[0];
        assert_eq!(element_by_path(&doc, doc.root(), "/4/40/2"), Some(section));
        assert_eq!(element_by_path(&doc, doc.root(), "/4/abc"), Some(section));
        assert_eq!(element_by_path(&doc, doc.root(), ""), None);
    }

    #[test]
    fn test_locate_text_position_crosses_nodes() {
        let doc = sample();
        let second = doc.elements_by_tag(doc.root(), &["p"])[1];
        let em = doc.elements_by_tag(doc.root(), &["em"])[0];
        let three = doc.children(em)[0];
        let two = doc.children(second)[0];

        assert_eq!(locate_text_position(&doc, second, 2), Some((two, 2)));
        assert_eq!(locate_text_position(&doc, second, 4), Some((two, 4)));
        assert_eq!(locate_text_position(&doc, second, 6), Some((three, 2)));
        assert_eq!(locate_text_position(&doc, second, 20), None);
    }

    #[test]
    fn test_target_char_rect_skips_invisible_characters() {
        let mut doc = Document::new("div");
        let root = doc.root();
        let p = doc.append_element(root, "p");
        doc.set_attr(p, "class", "first");
        doc.append_text(p, "ab");
        let em = doc.append_element(p, "em");
        doc.append_text(em, "\u{200b}\u{200b}cd");

        let mut surface = FlowSurface::new(300.0, 400.0);
        surface.mount(doc.clone());
        surface.apply_style(&content_style(&ReaderSettings::default(), false, 300.0, 400.0), false);
        surface.settle(LayoutMode::Sync);

        // Offset 2 is the first zero-width space; the probe walks on to "c".
        let rect = target_char_rect(&surface, p, 2).unwrap();
        assert_eq!(rect.x, 36.0);

        let fallback = target_char_rect(&surface, p, 50).unwrap();
        assert_eq!(fallback.x, 20.0);
    }
}
