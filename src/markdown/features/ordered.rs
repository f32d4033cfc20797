use regex::{Captures, Regex};
use std::sync::LazyLock;

use super::helpers::{apply_shortcut, handle_indent_backspace, is_emptied_item, strip_prefix, typed_prefix};
use crate::markdown::text::{
    floor_char_boundary, leading_whitespace, line_start, replace_line, splice, EditResult,
    LineRange, Selection, INDENT, INDENT_SIZE,
};

pub(super) static PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)(\d+)\.\s").unwrap());

static NUMBERED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)(\d+)\.\s(.*)").unwrap());

static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\s*)\d+\.").unwrap());

const MARKER: &str = "1. ";

static SHORTCUTS: LazyLock<Vec<(Regex, bool)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"^(\s*)[-*] 1\.$").unwrap(), false),
        (Regex::new(r"^(\s*)[-*] \[[ x]\] 1\.$").unwrap(), false),
        (Regex::new(r"^(\s*)\d+\. 1\.$").unwrap(), true),
    ]
});

pub(super) fn on_tab(
    content: &str,
    selection: Selection,
    shift: bool,
    range: &LineRange<'_>,
) -> Option<EditResult> {
    let indented = if shift {
        let unindented = range.line.strip_prefix(INDENT)?;
        EditResult::new(
            replace_line(content, range, unindented),
            selection.start.saturating_sub(INDENT_SIZE),
        )
    } else {
        // A nested list restarts at one.
        let restarted = LEADING_NUMBER.replace(range.line, "${1}1.");
        EditResult::new(
            replace_line(content, range, &format!("{INDENT}{restarted}")),
            selection.start + INDENT_SIZE,
        )
    };
    Some(renumber_around(indented, range.start))
}

pub(super) fn on_enter(
    content: &str,
    selection: Selection,
    caps: &Captures<'_>,
    range: &LineRange<'_>,
) -> Option<EditResult> {
    if is_emptied_item(content, selection, range, caps[0].len()) {
        return on_backspace(content, selection, caps, range);
    }
    let number = caps[2].parse::<u64>().map_or(1, |n| n.saturating_add(1));
    let continued = format!("\n{}{number}. ", &caps[1]);
    let inserted = splice(content, selection.start, selection.end, &continued);
    Some(renumber_ordered_list(
        &inserted,
        selection.start + continued.len(),
    ))
}

pub(super) fn on_backspace(
    content: &str,
    selection: Selection,
    caps: &Captures<'_>,
    range: &LineRange<'_>,
) -> Option<EditResult> {
    if let Some(unindented) = handle_indent_backspace(content, selection, range) {
        return Some(renumber_around(unindented, range.start));
    }
    let stripped = strip_prefix(content, range, caps[0].len());
    match next_line_start(&stripped.content, range.start) {
        Some(next) => {
            let renumbered = renumber_ordered_list(&stripped.content, next);
            Some(EditResult::new(renumbered.content, stripped.cursor))
        }
        None => Some(stripped),
    }
}

pub(super) fn on_input(ch: char, content: &str, selection: Selection) -> Option<EditResult> {
    if ch != ' ' {
        return None;
    }
    let (start, typed) = typed_prefix(content, selection);
    let expanded = if typed == "1." {
        EditResult::new(
            splice(content, start, selection.start, MARKER),
            start + MARKER.len(),
        )
    } else {
        apply_shortcut(&SHORTCUTS, MARKER, content, selection)?
    };
    Some(renumber_ordered_list(&expanded.content, expanded.cursor))
}

fn next_line_start(content: &str, from: usize) -> Option<usize> {
    let next = content[from..].find('\n')? + from + 1;
    (next < content.len()).then_some(next)
}

/// Renumbers the list around the edited line, then the one following it,
/// which may have been split off or merged. The caret comes from the first pass.
fn renumber_around(edit: EditResult, line_start: usize) -> EditResult {
    let renumbered = renumber_ordered_list(&edit.content, edit.cursor);
    match next_line_start(&renumbered.content, line_start) {
        Some(next) => {
            let after = renumber_ordered_list(&renumbered.content, next);
            EditResult::new(after.content, renumbered.cursor)
        }
        None => renumbered,
    }
}

/// Renumbers the ordered-list block containing the caret so its items at
/// the block's indent count up from the first item's number. Deeper lines
/// are skipped; a blank line, a shallower line or an unnumbered line at the
/// same depth ends the block. When the caret line is not numbered but the
/// next line is, that following block is renumbered instead.
///
/// Applying it twice gives the same buffer and caret as applying it once.
pub fn renumber_ordered_list(content: &str, cursor: usize) -> EditResult {
    let cursor = floor_char_boundary(content, cursor);
    let lines: Vec<&str> = content.split('\n').collect();
    let line_index = content[..cursor].matches('\n').count();

    let (indent, block_start) = match NUMBERED_LINE.captures(lines[line_index]) {
        Some(caps) => {
            let indent = caps[1].len();
            (indent, walk_to_block_start(&lines, line_index, indent))
        }
        None => match lines.get(line_index + 1).and_then(|l| NUMBERED_LINE.captures(l)) {
            Some(caps) => (caps[1].len(), line_index + 1),
            None => return EditResult::new(content.to_string(), cursor),
        },
    };

    let mut rewritten: Vec<String> = lines.iter().map(|line| line.to_string()).collect();
    let mut next_number: Option<u64> = None;
    for (index, line) in lines.iter().enumerate().skip(block_start) {
        if line.trim().is_empty() {
            break;
        }
        let depth = leading_whitespace(line).len();
        if depth > indent {
            continue;
        }
        if depth < indent {
            break;
        }
        let Some(caps) = NUMBERED_LINE.captures(line) else {
            break;
        };
        let number = next_number.unwrap_or_else(|| caps[2].parse().unwrap_or(1));
        rewritten[index] = format!("{}{number}. {}", &caps[1], &caps[3]);
        next_number = Some(number.saturating_add(1));
    }

    let shift_before: isize = (0..line_index)
        .map(|index| rewritten[index].len() as isize - lines[index].len() as isize)
        .sum();
    let old_start = line_start(content, cursor);
    let column = cursor - old_start;
    let line_indent = leading_whitespace(lines[line_index]).len();
    let new_column = if column > line_indent {
        let delta = rewritten[line_index].len() as isize - lines[line_index].len() as isize;
        ((column as isize + delta).max(line_indent as isize) as usize)
            .min(rewritten[line_index].len())
    } else {
        column
    };

    let updated = rewritten.join("\n");
    let new_cursor = (old_start as isize + shift_before) as usize + new_column;
    let new_cursor = floor_char_boundary(&updated, new_cursor);
    EditResult::new(updated, new_cursor)
}

fn walk_to_block_start(lines: &[&str], line_index: usize, indent: usize) -> usize {
    let mut start = line_index;
    while start > 0 {
        let previous = lines[start - 1];
        if previous.trim().is_empty() {
            break;
        }
        let depth = leading_whitespace(previous).len();
        if depth > indent {
            start -= 1;
            continue;
        }
        if depth < indent || !NUMBERED_LINE.is_match(previous) {
            break;
        }
        start -= 1;
    }
    start
}
