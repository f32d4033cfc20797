use regex::Regex;

use crate::markdown::text::{
    line_end, line_start, replace_line, splice, EditResult, LineRange, Selection, INDENT,
    INDENT_SIZE,
};

/// Removes one level of indentation from the line, if it has one.
pub(super) fn handle_indent_backspace(
    content: &str,
    selection: Selection,
    range: &LineRange<'_>,
) -> Option<EditResult> {
    let unindented = range.line.strip_prefix(INDENT)?;
    Some(EditResult::new(
        replace_line(content, range, unindented),
        selection.start.saturating_sub(INDENT_SIZE),
    ))
}

/// Drops the first `prefix_len` bytes of the line; the caret goes to line start.
pub(super) fn strip_prefix(content: &str, range: &LineRange<'_>, prefix_len: usize) -> EditResult {
    let rest = range.line.get(prefix_len..).unwrap_or_default();
    EditResult::new(replace_line(content, range, rest), range.start)
}

/// True when the caret sits right after the prefix and nothing but
/// whitespace follows it on the line.
pub(super) fn is_emptied_item(
    content: &str,
    selection: Selection,
    range: &LineRange<'_>,
    prefix_len: usize,
) -> bool {
    if selection.start != range.start + prefix_len {
        return false;
    }
    let end = line_end(content, range.start).max(selection.start);
    content[selection.start..end].trim().is_empty()
}

/// The text between the start of the caret's line and the caret.
pub(super) fn typed_prefix(content: &str, selection: Selection) -> (usize, &str) {
    let start = line_start(content, selection.start);
    (start, &content[start..selection.start])
}

/// Tries each `(pattern, nested)` shortcut against the typed line prefix and
/// replaces the prefix with `marker`, keeping the captured indent and adding
/// one level when `nested`.
pub(super) fn apply_shortcut(
    shortcuts: &[(Regex, bool)],
    marker: &str,
    content: &str,
    selection: Selection,
) -> Option<EditResult> {
    let (start, typed) = typed_prefix(content, selection);
    shortcuts.iter().find_map(|(pattern, nested)| {
        let caps = pattern.captures(typed)?;
        let indent = caps.get(1).map_or("", |m| m.as_str());
        let replacement = format!("{indent}{}{marker}", if *nested { INDENT } else { "" });
        Some(EditResult::new(
            splice(content, start, selection.start, &replacement),
            start + replacement.len(),
        ))
    })
}
