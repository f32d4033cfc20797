use regex::{Captures, Regex};
use std::sync::LazyLock;

use super::helpers::{apply_shortcut, handle_indent_backspace, is_emptied_item, strip_prefix, typed_prefix};
use crate::markdown::text::{splice, EditResult, LineRange, Selection};

pub(super) static PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*[-*] )\[([ x])\]\s").unwrap());

const MARKER: &str = "- [ ] ";

static SHORTCUTS: LazyLock<Vec<(Regex, bool)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"^(\s*)[-*] \[\]$").unwrap(), false),
        (Regex::new(r"^(\s*)[-*] [xX]$").unwrap(), false),
        (Regex::new(r"^(\s*)[-*] \[[ x]\] \[\]$").unwrap(), true),
        (Regex::new(r"^(\s*)[-*] \[[ x]\] [xX]$").unwrap(), true),
        (Regex::new(r"^(\s*)\d+\. \[\]$").unwrap(), false),
        (Regex::new(r"^(\s*)\d+\. [xX]$").unwrap(), false),
    ]
});

static CHECKBOX_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*[-*] )\[([ x])\](.*)").unwrap());

pub(super) fn on_enter(
    content: &str,
    selection: Selection,
    caps: &Captures<'_>,
    range: &LineRange<'_>,
) -> Option<EditResult> {
    if is_emptied_item(content, selection, range, caps[0].len()) {
        return on_backspace(content, selection, caps, range);
    }
    // New items always start unchecked.
    let continued = format!("\n{}[ ] ", &caps[1]);
    Some(EditResult::new(
        splice(content, selection.start, selection.end, &continued),
        selection.start + continued.len(),
    ))
}

pub(super) fn on_backspace(
    content: &str,
    selection: Selection,
    caps: &Captures<'_>,
    range: &LineRange<'_>,
) -> Option<EditResult> {
    if let Some(result) = handle_indent_backspace(content, selection, range) {
        return Some(result);
    }
    Some(strip_prefix(content, range, caps[0].len()))
}

pub(super) fn on_input(ch: char, content: &str, selection: Selection) -> Option<EditResult> {
    if ch != ' ' {
        return None;
    }
    let (start, typed) = typed_prefix(content, selection);
    if matches!(typed, "[]" | "x" | "X") {
        return Some(EditResult::new(
            splice(content, start, selection.start, MARKER),
            start + MARKER.len(),
        ));
    }
    apply_shortcut(&SHORTCUTS, MARKER, content, selection)
}

/// Flips the checkbox on line `line_index`; other lines are left alone.
pub fn toggle_checkbox(content: &str, line_index: usize) -> String {
    content
        .split('\n')
        .enumerate()
        .map(|(index, line)| {
            if index != line_index {
                return line.to_string();
            }
            match CHECKBOX_LINE.captures(line) {
                Some(caps) => {
                    let mark = if &caps[2] == "x" { " " } else { "x" };
                    format!("{}[{mark}]{}", &caps[1], &caps[3])
                }
                None => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
