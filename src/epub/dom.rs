//! Arena tree holding a chapter's markup once it has been parsed. The
//! renderer rewrites attributes in place, the surface lays it out, and CFI
//! paths are computed against it.

use scraper::{ElementRef, Html};

pub type NodeId = usize;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    pub fn new(root_name: &str) -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Element {
                    name: root_name.to_string(),
                    attrs: Vec::new(),
                },
            }],
        }
    }

    /// Parses an HTML or XHTML document leniently; the root is `<html>`.
    pub fn parse_html(source: &str) -> Self {
        let html = Html::parse_document(source);
        let root = html.root_element();
        let mut document = Self::new(root.value().name());
        document.set_attrs_from(0, root);
        document.import_children(0, root);
        document
    }

    fn set_attrs_from(&mut self, id: NodeId, element: ElementRef<'_>) {
        for (name, value) in element.value().attrs() {
            self.set_attr(id, name, value);
        }
    }

    fn import_children(&mut self, parent: NodeId, element: ElementRef<'_>) {
        for child in element.children() {
            if let Some(child_element) = ElementRef::wrap(child) {
                let id = self.append_element(parent, child_element.value().name());
                self.set_attrs_from(id, child_element);
                self.import_children(id, child_element);
            } else if let Some(text) = child.value().as_text() {
                self.append_text(parent, &text.to_string());
            }
        }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            kind,
        });
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.push(id);
        }
        id
    }

    pub fn append_element(&mut self, parent: NodeId, name: &str) -> NodeId {
        self.push(
            parent,
            NodeKind::Element {
                name: name.to_ascii_lowercase(),
                attrs: Vec::new(),
            },
        )
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push(parent, NodeKind::Text(text.to_string()))
    }

    /// Copies `source_id` and everything below it from `source` under `parent`.
    pub fn copy_subtree(&mut self, source: &Document, source_id: NodeId, parent: NodeId) {
        let Some(node) = source.node(source_id) else {
            return;
        };
        let id = self.push(parent, node.kind.clone());
        for &child in &node.children {
            self.copy_subtree(source, child, id);
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id)?.kind {
            NodeKind::Element { name, .. } => Some(name),
            NodeKind::Text(_) => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.tag_name(id).is_some()
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id)?.kind {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element { .. } => None,
        }
    }

    pub fn attrs(&self, id: NodeId) -> &[(String, String)] {
        match self.node(id).map(|node| &node.kind) {
            Some(NodeKind::Element { attrs, .. }) => attrs,
            _ => &[],
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attrs(id)
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        let Some(Node {
            kind: NodeKind::Element { attrs, .. },
            ..
        }) = self.nodes.get_mut(id)
        else {
            return;
        };
        match attrs.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => attrs.push((name.to_string(), value.to_string())),
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|name| name == class))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map_or(&[], |node| node.children.as_slice())
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&child| self.is_element(child))
            .collect()
    }

    /// Nodes below `id` in document order, not including `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            found.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        found
    }

    pub fn elements_by_tag(&self, id: NodeId, tags: &[&str]) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&node| self.tag_name(node).is_some_and(|tag| tags.contains(&tag)))
            .collect()
    }

    pub fn text_nodes(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&node| self.text(node).is_some())
            .collect()
    }

    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.text(id) {
            return text.to_string();
        }
        self.text_nodes(id)
            .into_iter()
            .filter_map(|node| self.text(node))
            .collect()
    }

    /// True when `node` is `ancestor` or lies below it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.parent(id);
        while let Some(parent) = current {
            depth += 1;
            current = self.parent(parent);
        }
        depth
    }

    /// Value of one declaration in the inline `style` attribute.
    pub fn style_property(&self, id: NodeId, property: &str) -> Option<String> {
        let style = self.attr(id, "style")?;
        style
            .split(';')
            .filter_map(|declaration| declaration.split_once(':'))
            .filter(|(name, _)| name.trim().eq_ignore_ascii_case(property))
            .map(|(_, value)| value.trim().to_string())
            .next_back()
    }

    /// Sets one inline style declaration, replacing an earlier one.
    pub fn set_style_property(&mut self, id: NodeId, property: &str, value: &str) {
        let mut declarations: Vec<String> = self
            .attr(id, "style")
            .unwrap_or_default()
            .split(';')
            .map(str::trim)
            .filter(|declaration| !declaration.is_empty())
            .filter(|declaration| {
                declaration
                    .split_once(':')
                    .is_none_or(|(name, _)| !name.trim().eq_ignore_ascii_case(property))
            })
            .map(str::to_string)
            .collect();
        declarations.push(format!("{property}: {value}"));
        self.set_attr(id, "style", &declarations.join("; "));
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut html = String::new();
        for &child in self.children(id) {
            self.write_html(child, &mut html);
        }
        html
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut html = String::new();
        self.write_html(id, &mut html);
        html
    }

    fn write_html(&self, id: NodeId, html: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Text(text) => {
                let raw_parent = self
                    .parent(id)
                    .and_then(|parent| self.tag_name(parent))
                    .is_some_and(|tag| tag == "style" || tag == "script");
                if raw_parent {
                    html.push_str(text);
                } else {
                    html.push_str(&html_escape::encode_text(text));
                }
            }
            NodeKind::Element { name, attrs } => {
                html.push('<');
                html.push_str(name);
                for (key, value) in attrs {
                    html.push_str(&format!(
                        " {key}=\"{}\"",
                        html_escape::encode_double_quoted_attribute(value)
                    ));
                }
                html.push('>');
                if VOID_ELEMENTS.contains(&name.as_str()) {
                    return;
                }
                for &child in &node.children {
                    self.write_html(child, html);
                }
                html.push_str(&format!("</{name}>"));
            }
        }
    }
}
