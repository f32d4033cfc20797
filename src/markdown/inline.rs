use regex::{Captures, Regex};
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineKind {
    Text,
    Strong,
    Emphasis,
    Strikethrough,
    Link,
    Code,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineToken {
    pub kind: InlineKind,
    pub content: String,
    pub delimiter: Option<&'static str>,
    pub url: Option<String>,
    pub raw: Option<String>,
}

impl InlineToken {
    fn text(content: String) -> Self {
        Self {
            kind: InlineKind::Text,
            content,
            delimiter: None,
            url: None,
            raw: None,
        }
    }

    fn delimited(kind: InlineKind, delimiter: &'static str, caps: &Captures<'_>) -> Self {
        Self {
            kind,
            content: caps[1].to_string(),
            delimiter: Some(delimiter),
            url: None,
            raw: Some(caps[0].to_string()),
        }
    }

    fn link(content: &str, url: &str, raw: &str) -> Self {
        Self {
            kind: InlineKind::Link,
            content: content.to_string(),
            url: Some(url.to_string()),
            delimiter: None,
            raw: Some(raw.to_string()),
        }
    }

    /// Number of source bytes this token consumed.
    pub fn source_len(&self) -> usize {
        match (&self.raw, self.delimiter) {
            (Some(raw), _) => raw.len(),
            (None, Some(delimiter)) => delimiter.len() * 2 + self.content.len(),
            (None, None) => self.content.len(),
        }
    }
}

enum Shape {
    Delimited(InlineKind, &'static str),
    Link,
    Autolink,
}

// Tried in order at every position; the first match wins.
static INLINE_PATTERNS: LazyLock<Vec<(Shape, Regex)>> = LazyLock::new(|| {
    vec![
        (
            Shape::Delimited(InlineKind::Code, "`"),
            Regex::new(r"^`([^`]+)`").unwrap(),
        ),
        (Shape::Link, Regex::new(r"^\[([^\]]*)\]\(([^)]*)\)").unwrap()),
        (
            Shape::Autolink,
            Regex::new(r"(?i)^((?:https?://|www\.)[^\s/]+\.[^\s]+)").unwrap(),
        ),
        (
            Shape::Delimited(InlineKind::Strong, "**"),
            Regex::new(r"^\*\*(\S(?:.*?\S)?)\*\*").unwrap(),
        ),
        (
            Shape::Delimited(InlineKind::Strong, "__"),
            Regex::new(r"^__(\S(?:.*?\S)?)__").unwrap(),
        ),
        (
            Shape::Delimited(InlineKind::Strikethrough, "~~"),
            Regex::new(r"^~~(\S(?:.*?\S)?)~~").unwrap(),
        ),
        (
            Shape::Delimited(InlineKind::Emphasis, "*"),
            Regex::new(r"^\*(\S(?:.*?\S)?)\*").unwrap(),
        ),
        // No underscore inside, so `__` never opens emphasis.
        (
            Shape::Delimited(InlineKind::Emphasis, "_"),
            Regex::new(r"^_([^_\s](?:[^_]*[^_\s])?)_").unwrap(),
        ),
    ]
});

fn try_match_pattern(text: &str) -> Option<InlineToken> {
    for (shape, pattern) in INLINE_PATTERNS.iter() {
        let Some(caps) = pattern.captures(text) else {
            continue;
        };
        let token = match shape {
            Shape::Delimited(kind, delimiter) => InlineToken::delimited(*kind, delimiter, &caps),
            Shape::Link => InlineToken::link(&caps[1], &caps[2], &caps[0]),
            Shape::Autolink => InlineToken::link(&caps[1], &caps[1], &caps[0]),
        };
        return Some(token);
    }
    None
}

/// Splits a block's content into styled spans, scanning left to right.
pub fn parse_inline_markdown(text: &str) -> Vec<InlineToken> {
    let mut tokens: Vec<InlineToken> = Vec::new();
    let mut index = 0;
    while index < text.len() {
        if let Some(token) = try_match_pattern(&text[index..]) {
            index += token.source_len();
            tokens.push(token);
            continue;
        }
        let Some(ch) = text[index..].chars().next() else {
            break;
        };
        match tokens.last_mut() {
            Some(last) if last.kind == InlineKind::Text => last.content.push(ch),
            _ => tokens.push(InlineToken::text(ch.to_string())),
        }
        index += ch.len_utf8();
    }
    tokens
}

/// Links without a scheme open over https.
pub fn link_target(url: &str) -> String {
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}
