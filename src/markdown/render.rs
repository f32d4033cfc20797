//! Pure rendering of a buffer into the tree shown by the editing surface.
//!
//! Every source character survives into the tree as text (prefixes inside
//! `markdown-prefix` spans, delimiters inside `markdown-delimiter` spans), so
//! offsets counted over the tree match offsets into the buffer.

use super::block::{parse_block_line, BlockKind, BlockToken};
use super::inline::{link_target, parse_inline_markdown, InlineKind, InlineToken};
use super::text::ZERO_WIDTH_SPACE;

pub const PREFIX_CLASS: &str = "markdown-prefix";
pub const DELIMITER_CLASS: &str = "markdown-delimiter";

#[derive(Debug, Clone, PartialEq)]
pub enum RenderNode {
    Element(RenderElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderElement {
    pub tag: &'static str,
    pub classes: Vec<&'static str>,
    pub attrs: Vec<(&'static str, String)>,
    /// Rendered with `contenteditable="false"`; the caret never enters it.
    pub non_editable: bool,
    /// Set on checkbox inputs: the buffer line their click toggles.
    pub toggle_line: Option<usize>,
    pub children: Vec<RenderNode>,
}

impl RenderElement {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            ..Self::default()
        }
    }

    pub fn class(mut self, class: &'static str) -> Self {
        self.classes.push(class);
        self
    }

    pub fn attr(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.attrs.push((name, value.into()));
        self
    }

    pub fn child(mut self, node: impl Into<RenderNode>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.child(RenderNode::Text(text.into()))
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| *c == class)
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn text_content(&self) -> String {
        let mut text = String::new();
        for child in &self.children {
            child.collect_text(&mut text);
        }
        text
    }

    /// Follows child indices from this element.
    pub fn node_at(&self, path: &[usize]) -> Option<&RenderNode> {
        let (first, rest) = path.split_first()?;
        let child = self.children.get(*first)?;
        if rest.is_empty() {
            return Some(child);
        }
        match child {
            RenderNode::Element(element) => element.node_at(rest),
            RenderNode::Text(_) => None,
        }
    }

    pub fn to_html(&self) -> String {
        let mut html = String::new();
        self.write_html(&mut html);
        html
    }

    fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(self.tag);
        if !self.classes.is_empty() {
            out.push_str(" class=\"");
            out.push_str(&self.classes.join(" "));
            out.push('"');
        }
        for (name, value) in &self.attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&html_escape::encode_double_quoted_attribute(value));
            out.push('"');
        }
        if self.non_editable {
            out.push_str(" contenteditable=\"false\"");
        }
        if let Some(line) = self.toggle_line {
            out.push_str(&format!(" data-line=\"{line}\""));
        }
        out.push('>');
        if self.tag == "input" {
            return;
        }
        for child in &self.children {
            match child {
                RenderNode::Element(element) => element.write_html(out),
                RenderNode::Text(text) => out.push_str(&html_escape::encode_text(text)),
            }
        }
        out.push_str("</");
        out.push_str(self.tag);
        out.push('>');
    }
}

impl RenderNode {
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        self.collect_text(&mut text);
        text
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            RenderNode::Text(text) => out.push_str(text),
            RenderNode::Element(element) => {
                for child in &element.children {
                    child.collect_text(out);
                }
            }
        }
    }

    pub fn as_element(&self) -> Option<&RenderElement> {
        match self {
            RenderNode::Element(element) => Some(element),
            RenderNode::Text(_) => None,
        }
    }
}

impl From<RenderElement> for RenderNode {
    fn from(element: RenderElement) -> Self {
        RenderNode::Element(element)
    }
}

fn delimited(tag: &'static str, token: &InlineToken) -> RenderElement {
    let delimiter = token.delimiter.unwrap_or_default();
    RenderElement::new(tag)
        .child(RenderElement::new("span").class(DELIMITER_CLASS).text(delimiter))
        .text(token.content.clone())
        .child(RenderElement::new("span").class(DELIMITER_CLASS).text(delimiter))
}

fn render_inline_token(token: &InlineToken) -> RenderNode {
    match token.kind {
        InlineKind::Text => RenderNode::Text(token.content.clone()),
        InlineKind::Strong => delimited("strong", token).into(),
        InlineKind::Emphasis => delimited("em", token).into(),
        InlineKind::Strikethrough => delimited("s", token).into(),
        InlineKind::Code => delimited("code", token).class("md-inline-code").into(),
        InlineKind::Link => RenderElement::new("a")
            .class("md-link")
            .attr("href", link_target(token.url.as_deref().unwrap_or_default()))
            .attr("target", "_blank")
            .attr("rel", "noopener noreferrer")
            .text(token.raw.clone().unwrap_or_else(|| token.content.clone()))
            .into(),
    }
}

pub fn render_inline_markdown(text: &str) -> Vec<RenderNode> {
    parse_inline_markdown(text)
        .iter()
        .map(render_inline_token)
        .collect()
}

fn render_block_content(block: &BlockToken) -> Vec<RenderNode> {
    let mut prefix = RenderElement::new("span").class(PREFIX_CLASS);
    if !block.prefix.is_empty() {
        prefix = prefix.text(block.prefix.clone());
    }
    let mut nodes = vec![prefix.into()];
    if block.content.is_empty() {
        nodes.push(RenderNode::Text(ZERO_WIDTH_SPACE.to_string()));
    } else {
        nodes.extend(render_inline_markdown(&block.content));
    }
    nodes
}

fn render_list_item(block: &BlockToken, index: usize, content: Vec<RenderNode>) -> RenderElement {
    let indentation = block.prefix.len() - block.prefix.trim_start().len();
    let marker = match block.kind {
        BlockKind::Checkbox => {
            let mut input = RenderElement::new("input").attr("type", "checkbox");
            if block.prefix.contains("[x]") {
                input = input.attr("checked", "checked");
            }
            input.toggle_line = Some(index);
            RenderElement::new("label")
                .class("md-list-marker")
                .child(input)
        }
        BlockKind::OrderedList => RenderElement::new("label")
            .class("md-list-marker")
            .class("md-ordered-marker")
            .child(
                RenderElement::new("span")
                    .class("md-ordered-number")
                    .attr("data-content", block.prefix.trim()),
            ),
        _ => RenderElement::new("label")
            .class("md-list-marker")
            .class("md-list-bullet"),
    };
    let mut marker = marker.attr("style", format!("left: {indentation}ch"));
    marker.non_editable = true;

    let mut body = RenderElement::new("div").class("md-list-content");
    body.children = content;

    RenderElement::new("div")
        .class("md-line")
        .class(block.kind.class_name())
        .attr("style", format!("padding-left: {indentation}ch"))
        .child(marker)
        .child(body)
}

fn render_block(block: &BlockToken, index: usize) -> RenderElement {
    match block.kind {
        BlockKind::Heading1 | BlockKind::Heading2 | BlockKind::Heading3 => {
            let tag = match block.kind {
                BlockKind::Heading1 => "h1",
                BlockKind::Heading2 => "h2",
                _ => "h3",
            };
            let mut heading = RenderElement::new(tag)
                .class("md-line")
                .class(block.kind.class_name());
            heading.children = render_block_content(block);
            heading
        }
        BlockKind::Checkbox | BlockKind::UnorderedList | BlockKind::OrderedList => {
            render_list_item(block, index, render_block_content(block))
        }
        BlockKind::Table => {
            let mut row = RenderElement::new("div").class("md-line").class("md-table");
            row.children = render_block_content(block);
            row
        }
        BlockKind::Paragraph if block.content.is_empty() => RenderElement::new("div")
            .class("md-line")
            .class("md-text")
            .class("empty")
            .text(ZERO_WIDTH_SPACE.to_string()),
        BlockKind::Paragraph => {
            let mut paragraph = RenderElement::new("div").class("md-line").class("md-text");
            paragraph.children = render_inline_markdown(&block.content);
            paragraph
        }
    }
}

/// Renders the whole buffer: one block child of the editable root per line.
pub fn render_markdown(markdown: &str) -> RenderElement {
    let mut root = RenderElement::new("div")
        .class("md-editor")
        .attr("contenteditable", "true");
    root.children = markdown
        .split('\n')
        .enumerate()
        .map(|(index, line)| render_block(&parse_block_line(line), index).into())
        .collect();
    root
}

/// The buffer line a click on `path` toggles, when it lands on a checkbox.
pub fn checkbox_target(root: &RenderElement, path: &[usize]) -> Option<usize> {
    root.node_at(path)?.as_element()?.toggle_line
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_one_block_per_line() {
        let root = render_markdown("# Title\n\n- item");
        assert_eq!(root.children.len(), 3);
        let heading = root.children[0].as_element().unwrap();
        assert_eq!(heading.tag, "h1");
        assert!(heading.has_class("md-h1"));
        let empty = root.children[1].as_element().unwrap();
        assert!(empty.has_class("empty"));
        assert_eq!(empty.text_content(), "\u{200B}");
    }

    #[test]
    fn test_text_content_preserves_source() {
        let source = "- [x] **done** [a](b)";
        let root = render_markdown(source);
        assert_eq!(root.children[0].text_content(), source);
    }

    #[test]
    fn test_checkbox_carries_toggle_line() {
        let root = render_markdown("intro\n- [ ] task");
        // block 1 -> marker label 0 -> input 0
        assert_eq!(checkbox_target(&root, &[1, 0, 0]), Some(1));
        assert_eq!(checkbox_target(&root, &[0]), None);
    }

    #[test]
    fn test_ordered_marker_data_content() {
        let root = render_markdown("    3. third");
        let block = root.children[0].as_element().unwrap();
        assert_eq!(block.get_attr("style"), Some("padding-left: 4ch"));
        let number = block.node_at(&[0, 0]).and_then(RenderNode::as_element).unwrap();
        assert_eq!(number.get_attr("data-content"), Some("3."));
    }

    #[test]
    fn test_to_html_escapes_text() {
        let root = render_markdown("a < b & `c`");
        let html = root.to_html();
        assert!(html.contains("a &lt; b &amp; "));
        assert!(html.contains(
            "<code class=\"md-inline-code\"><span class=\"markdown-delimiter\">`</span>c"
        ));
    }

    #[test]
    fn test_link_renders_raw_source() {
        let root = render_markdown("[x](y.com)");
        let paragraph = root.children[0].as_element().unwrap();
        let link = paragraph.children[0].as_element().unwrap();
        assert_eq!(link.tag, "a");
        assert_eq!(link.get_attr("href"), Some("https://y.com"));
        assert_eq!(link.text_content(), "[x](y.com)");
    }

    #[test]
    fn test_autolink_without_scheme_opens_over_https() {
        let root = render_markdown("go www.a.com now");
        let paragraph = root.children[0].as_element().unwrap();
        let link = paragraph
            .children
            .iter()
            .filter_map(RenderNode::as_element)
            .find(|element| element.tag == "a")
            .unwrap();
        assert_eq!(link.get_attr("href"), Some("https://www.a.com"));
        assert_eq!(link.text_content(), "www.a.com");

        let root = render_markdown("[s](http://b.org)");
        let paragraph = root.children[0].as_element().unwrap();
        let link = paragraph.children[0].as_element().unwrap();
        assert_eq!(link.get_attr("href"), Some("http://b.org"));
    }
}
