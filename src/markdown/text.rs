//! Buffer primitives shared by the tokenizer, the feature handlers and the
//! input pipeline. Every offset is a byte offset into the buffer and always
//! sits on a `char` boundary.

use regex::Regex;
use std::sync::LazyLock;

pub const INDENT: &str = "    ";
pub const INDENT_SIZE: usize = INDENT.len();
pub const ZERO_WIDTH_SPACE: char = '\u{200B}';

/// Any list line: bullet, number or checkbox, with its marker captured.
pub static LIST_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*([-*]|\d+\.)\s(?:\[[ x]\]\s)?)").unwrap());

pub static TABLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\|").unwrap());

static LEADING_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*").unwrap());

/// A caret or range in a buffer. Offsets are UTF-8 byte offsets into the
/// content, so they slice it directly; `clamped` keeps them on char boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn caret(position: usize) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    pub fn is_caret(&self) -> bool {
        self.start == self.end
    }

    /// Orders and clamps the selection so it can be used to slice `content`.
    pub fn clamped(&self, content: &str) -> Self {
        let start = floor_char_boundary(content, self.start.min(self.end));
        let end = floor_char_boundary(content, self.start.max(self.end));
        Self { start, end }
    }
}

/// The outcome of an edit: the whole new buffer and the caret inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditResult {
    pub content: String,
    pub cursor: usize,
}

impl EditResult {
    pub fn new(content: String, cursor: usize) -> Self {
        Self { content, cursor }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange<'a> {
    pub start: usize,
    pub end: usize,
    pub line: &'a str,
}

/// The line containing `position`.
pub fn line_range(content: &str, position: usize) -> LineRange<'_> {
    let start = line_start(content, position);
    let end = line_end(content, position);
    LineRange {
        start,
        end,
        line: &content[start..end],
    }
}

pub fn line_start(content: &str, position: usize) -> usize {
    let position = floor_char_boundary(content, position);
    content[..position].rfind('\n').map_or(0, |index| index + 1)
}

pub fn line_end(content: &str, start: usize) -> usize {
    let start = floor_char_boundary(content, start);
    content[start..]
        .find('\n')
        .map_or(content.len(), |index| start + index)
}

/// Replaces `content[start..end]` with `text`.
pub fn splice(content: &str, start: usize, end: usize, text: &str) -> String {
    let mut spliced = String::with_capacity(content.len() + text.len());
    spliced.push_str(&content[..start]);
    spliced.push_str(text);
    spliced.push_str(&content[end..]);
    spliced
}

/// Rebuilds `content` with the line at `range` replaced by `line`.
pub fn replace_line(content: &str, range: &LineRange<'_>, line: &str) -> String {
    splice(content, range.start, range.end, line)
}

pub fn leading_whitespace(line: &str) -> &str {
    LEADING_WHITESPACE
        .find(line)
        .map_or("", |found| found.as_str())
}

/// Visible length of `text`: zero-width spaces do not count.
pub fn visible_len(text: &str) -> usize {
    text.chars()
        .filter(|&ch| ch != ZERO_WIDTH_SPACE)
        .map(char::len_utf8)
        .sum()
}

pub fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut index = index;
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_range_middle_line() {
        let content = "first\nsecond\nthird";
        let range = line_range(content, 8);
        assert_eq!(range.start, 6);
        assert_eq!(range.end, 12);
        assert_eq!(range.line, "second");
    }

    #[test]
    fn test_line_range_at_line_boundaries() {
        let content = "a\nb";
        assert_eq!(line_range(content, 1).line, "a");
        assert_eq!(line_range(content, 2).line, "b");
        assert_eq!(line_range("", 0).line, "");
    }

    #[test]
    fn test_splice_replaces_range() {
        assert_eq!(splice("hello world", 6, 11, "there"), "hello there");
        assert_eq!(splice("abc", 1, 1, "-"), "a-bc");
    }

    #[test]
    fn test_visible_len_skips_zero_width_space() {
        assert_eq!(visible_len("\u{200B}"), 0);
        assert_eq!(visible_len("a\u{200B}b"), 2);
        assert_eq!(visible_len("é"), 2);
    }

    #[test]
    fn test_list_pattern_variants() {
        assert!(LIST_PATTERN.is_match("- item"));
        assert!(LIST_PATTERN.is_match("    12. item"));
        assert!(LIST_PATTERN.is_match("* [x] done"));
        assert!(!LIST_PATTERN.is_match("-item"));
        assert!(!LIST_PATTERN.is_match("| a |"));
    }

    #[test]
    fn test_selection_clamped_orders_and_bounds() {
        let selection = Selection::new(10, 2).clamped("abcd");
        assert_eq!(selection, Selection::new(2, 4));
    }

    #[test]
    fn test_selection_offsets_are_bytes() {
        let content = "héllo";
        let selection = Selection::new(2, 3).clamped(content);
        assert_eq!(selection, Selection::new(1, 3));
        assert_eq!(&content[selection.start..selection.end], "é");
        let caret = Selection::caret(content.len()).clamped(content);
        assert_eq!(caret.start, 6);
    }
}
