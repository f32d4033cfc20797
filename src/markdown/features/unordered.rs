use regex::{Captures, Regex};
use std::sync::LazyLock;

use super::helpers::{apply_shortcut, handle_indent_backspace, is_emptied_item, strip_prefix, typed_prefix};
use crate::markdown::text::{splice, EditResult, LineRange, Selection};

pub(super) static PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\s*[-*] )").unwrap());

static SHORTCUTS: LazyLock<Vec<(Regex, bool)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"^(\s*)[-*] [-*]$").unwrap(), true),
        (Regex::new(r"^(\s*)[-*] \[[ x]\] [-*]$").unwrap(), false),
        (Regex::new(r"^(\s*)\d+\. [-*]$").unwrap(), false),
    ]
});

/// A bullet line that is not a checkbox.
pub(super) fn match_line(line: &str) -> Option<Captures<'_>> {
    let caps = PATTERN.captures(line)?;
    let rest = &line[caps.get(0)?.end()..];
    if rest.starts_with("[ ]") || rest.starts_with("[x]") {
        return None;
    }
    Some(caps)
}

pub(super) fn on_enter(
    content: &str,
    selection: Selection,
    caps: &Captures<'_>,
    range: &LineRange<'_>,
) -> Option<EditResult> {
    let prefix = &caps[1];
    if is_emptied_item(content, selection, range, prefix.len()) {
        return on_backspace(content, selection, caps, range);
    }
    let continued = format!("\n{prefix}");
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
    Some(strip_prefix(content, range, caps[1].len()))
}

pub(super) fn on_input(ch: char, content: &str, selection: Selection) -> Option<EditResult> {
    if ch != ' ' {
        return None;
    }
    let (start, typed) = typed_prefix(content, selection);
    if typed == "*" || typed == "-" {
        let replacement = format!("{typed} ");
        return Some(EditResult::new(
            splice(content, start, selection.start, &replacement),
            start + replacement.len(),
        ));
    }
    apply_shortcut(&SHORTCUTS, "- ", content, selection)
}
