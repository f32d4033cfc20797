//! Key handling over the feature chain: Tab, Enter, Backspace at the start
//! of a list item, and typed characters.

use crate::markdown::features::FEATURES;
use crate::markdown::text::{
    line_range, replace_line, splice, EditResult, LineRange, Selection, INDENT, INDENT_SIZE,
    LIST_PATTERN, TABLE_PATTERN,
};

fn indent_list_line(
    content: &str,
    selection: Selection,
    shift: bool,
    range: &LineRange<'_>,
) -> Option<EditResult> {
    if shift {
        let unindented = range.line.strip_prefix(INDENT)?;
        return Some(EditResult::new(
            replace_line(content, range, unindented),
            selection.start.saturating_sub(INDENT_SIZE),
        ));
    }
    Some(EditResult::new(
        replace_line(content, range, &format!("{INDENT}{}", range.line)),
        selection.start + INDENT_SIZE,
    ))
}

/// Tab on a structured line, or `None` when the line is plain text or
/// nothing applies.
pub fn handle_structured_tab(
    content: &str,
    selection: Selection,
    shift: bool,
) -> Option<EditResult> {
    let range = line_range(content, selection.start);
    let is_list = LIST_PATTERN.is_match(range.line);
    if !is_list && !TABLE_PATTERN.is_match(range.line) {
        return None;
    }
    FEATURES
        .iter()
        .filter(|feature| feature.match_line(range.line).is_some())
        .find_map(|feature| feature.on_tab(content, selection, shift, &range))
        .or_else(|| {
            is_list
                .then(|| indent_list_line(content, selection, shift, &range))
                .flatten()
        })
}

/// Tab always produces an edit: structured lines get their own handling,
/// anything else gets an indent inserted at the selection.
pub fn handle_tab(content: &str, selection: Selection, shift: bool) -> EditResult {
    if let Some(result) = handle_structured_tab(content, selection, shift) {
        return result;
    }
    if shift {
        return EditResult::new(content.to_string(), selection.start);
    }
    EditResult::new(
        splice(content, selection.start, selection.end, INDENT),
        selection.start + INDENT_SIZE,
    )
}

pub fn handle_enter(content: &str, selection: Selection) -> EditResult {
    let range = line_range(content, selection.start);
    let before_cursor = &content[range.start..selection.start];

    if LIST_PATTERN.is_match(before_cursor) || TABLE_PATTERN.is_match(before_cursor) {
        let handled = FEATURES.iter().find_map(|feature| {
            let caps = feature.match_line(before_cursor)?;
            feature.on_enter(content, selection, &caps, &range)
        });
        if let Some(result) = handled {
            return result;
        }
    }

    EditResult::new(
        splice(content, selection.start, selection.end, "\n"),
        selection.start + 1,
    )
}

/// Backspace with the caret right after a list prefix, or at the start of a
/// table row.
pub fn handle_backspace_at_list_start(
    content: &str,
    selection: Selection,
) -> Option<EditResult> {
    if !selection.is_caret() {
        return None;
    }
    let range = line_range(content, selection.start);
    let column = selection.start - range.start;

    let at_prefix_end = match LIST_PATTERN.captures(range.line) {
        Some(caps) => column == caps[1].len(),
        None => TABLE_PATTERN.is_match(range.line) && column == 0,
    };
    if !at_prefix_end {
        return None;
    }

    FEATURES.iter().find_map(|feature| {
        let caps = feature.match_line(range.line)?;
        feature.on_backspace(content, selection, &caps, &range)
    })
}

pub fn handle_input(ch: char, content: &str, selection: Selection) -> Option<EditResult> {
    FEATURES
        .iter()
        .find_map(|feature| feature.on_input(ch, content, selection))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tab_on_plain_text_inserts_indent() {
        let result = handle_tab("abc", Selection::new(1, 2), false);
        assert_eq!(result.content, "a    c");
        assert_eq!(result.cursor, 5);
    }

    #[test]
    fn test_shift_tab_on_plain_text_is_noop() {
        let result = handle_tab("    abc", Selection::caret(5), true);
        assert_eq!(result.content, "    abc");
        assert_eq!(result.cursor, 5);
    }

    #[test]
    fn test_tab_indents_bullet_line() {
        let result = handle_tab("- a\n- b", Selection::caret(7), false);
        assert_eq!(result.content, "- a\n    - b");
        assert_eq!(result.cursor, 11);

        let result = handle_tab(&result.content, Selection::caret(11), true);
        assert_eq!(result.content, "- a\n- b");
        assert_eq!(result.cursor, 7);
    }

    #[test]
    fn test_tab_in_table_moves_cell() {
        let result = handle_tab("| a | b |", Selection::caret(2), false);
        assert_eq!(result.content, "| a | b |");
        assert_eq!(result.cursor, 6);
    }

    #[test]
    fn test_enter_plain_splits_line() {
        let result = handle_enter("hello", Selection::caret(2));
        assert_eq!(result.content, "he\nllo");
        assert_eq!(result.cursor, 3);
    }

    #[test]
    fn test_enter_continues_ordered_list() {
        let result = handle_enter("1. foo", Selection::caret(6));
        assert_eq!(result.content, "1. foo\n2. ");
        assert_eq!(result.cursor, 10);
    }

    #[test]
    fn test_enter_continues_checkbox() {
        let result = handle_enter("- [x] a", Selection::caret(7));
        assert_eq!(result.content, "- [x] a\n- [ ] ");
        assert_eq!(result.cursor, 14);
    }

    #[test]
    fn test_backspace_needs_caret_at_prefix_end() {
        assert!(handle_backspace_at_list_start("- a", Selection::caret(3)).is_none());
        assert!(handle_backspace_at_list_start("- a", Selection::new(2, 3)).is_none());
        assert!(handle_backspace_at_list_start("plain", Selection::caret(0)).is_none());

        let result = handle_backspace_at_list_start("- [ ] a", Selection::caret(6)).unwrap();
        assert_eq!(result.content, "a");
        assert_eq!(result.cursor, 0);
    }

    #[test]
    fn test_backspace_at_empty_table_row() {
        let result = handle_backspace_at_list_start("| a |\n|   |", Selection::caret(6)).unwrap();
        assert_eq!(result.content, "| a |\n");
    }

    #[test]
    fn test_input_expands_shortcuts() {
        let result = handle_input(' ', "x", Selection::caret(1)).unwrap();
        assert_eq!(result.content, "- [ ] ");
        assert_eq!(result.cursor, 6);
        assert!(handle_input(' ', "word", Selection::caret(4)).is_none());
    }
}
