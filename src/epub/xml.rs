//! A small owned element tree over `quick-xml`, enough for the package
//! document, the container file and the NCX table of contents. Names are
//! stored without their namespace prefix.

use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    fn from_start(start: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Option<Self> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.ok()?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.decode_and_unescape_value(reader.decoder()).ok()?;
            attrs.push((key, value.into_owned()));
        }
        Some(Self {
            name,
            attrs,
            children: Vec::new(),
        })
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn element_children(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.element_children()
            .filter(move |child| child.name == name)
    }

    /// Descendant elements in document order, not including `self`.
    pub fn descendants(&self) -> Vec<&XmlElement> {
        let mut found = Vec::new();
        for child in self.element_children() {
            found.push(child);
            found.extend(child.descendants());
        }
        found
    }

    pub fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a XmlElement> {
        self.descendants()
            .into_iter()
            .filter(|element| element.name == name)
            .collect()
    }

    /// First descendant named `name`.
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        self.descendants()
            .into_iter()
            .find(|element| element.name == name)
    }

    /// Elements matching `parent > child` anywhere below `self`.
    pub fn select_children<'a>(&'a self, parent: &str, child: &'a str) -> Vec<&'a XmlElement> {
        self.descendants_named(parent)
            .into_iter()
            .flat_map(|element| element.children_named(child))
            .collect()
    }

    pub fn text(&self) -> String {
        let mut text = String::new();
        for child in &self.children {
            match child {
                XmlNode::Text(value) => text.push_str(value),
                XmlNode::Element(element) => text.push_str(&element.text()),
            }
        }
        text
    }
}

fn resolve_entity(name: &str) -> Option<String> {
    let resolved = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        _ => {
            let number = name.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)?
        }
    };
    Some(resolved.to_string())
}

fn push_text(stack: &mut [XmlElement], text: String) {
    if let Some(parent) = stack.last_mut() {
        if let Some(XmlNode::Text(previous)) = parent.children.last_mut() {
            previous.push_str(&text);
        } else {
            parent.children.push(XmlNode::Text(text));
        }
    }
}

/// Parses `source` into a document node whose children are the top-level
/// elements, so `find` also sees the root element. Malformed input gives
/// `None`.
pub fn parse_xml(source: &str) -> Option<XmlElement> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let mut reader = Reader::from_str(source);

    let mut stack = vec![XmlElement::default()];
    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(err) => {
                debug!("Malformed XML at {}: {err}", reader.buffer_position());
                return None;
            }
        };
        match event {
            Event::Start(start) => {
                let element = XmlElement::from_start(&start, &reader)?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = XmlElement::from_start(&start, &reader)?;
                stack.last_mut()?.children.push(XmlNode::Element(element));
            }
            Event::End(_) => {
                if stack.len() < 2 {
                    return None;
                }
                let element = stack.pop()?;
                stack.last_mut()?.children.push(XmlNode::Element(element));
            }
            Event::Text(text) => {
                let text = text.decode().ok()?.into_owned();
                push_text(&mut stack, text);
            }
            Event::CData(data) => {
                let text = data.decode().ok()?.into_owned();
                push_text(&mut stack, text);
            }
            Event::GeneralRef(reference) => {
                let name = reference.decode().ok()?;
                if let Some(text) = resolve_entity(&name) {
                    push_text(&mut stack, text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        return None;
    }
    stack.pop()
}
