//! Pipe tables: rows start with `|`, cells are separated by `|`, and a row
//! whose cells are dashes separates the header from the body.

use regex::Regex;
use std::sync::LazyLock;

use crate::markdown::text::{line_end, EditResult, LineRange, Selection};

pub(super) static PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\|").unwrap());

static DASHES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-+$").unwrap());

/// Cells of a row, untrimmed. The piece before the first pipe and an empty
/// piece after the closing pipe are dropped.
pub fn parse_table_row(line: &str) -> Option<Vec<&str>> {
    if !line.starts_with('|') {
        return None;
    }
    let mut cells: Vec<&str> = line.split('|').skip(1).collect();
    if cells.last() == Some(&"") {
        cells.pop();
    }
    Some(cells)
}

pub fn ensure_closing_pipe(line: &str) -> String {
    if line.ends_with('|') {
        line.to_string()
    } else {
        format!("{line}|")
    }
}

pub fn is_separator_row(cells: &[&str]) -> bool {
    match cells.first() {
        None => false,
        Some(first) if first.trim() == "-" => true,
        Some(_) => cells.iter().all(|cell| DASHES.is_match(cell.trim())),
    }
}

/// The contiguous run of table rows around `line_index`, inclusive.
pub fn table_block(lines: &[&str], line_index: usize) -> (usize, usize) {
    let is_row = |index: usize| lines.get(index).is_some_and(|line| line.starts_with('|'));
    let mut start = line_index;
    while start > 0 && is_row(start - 1) {
        start -= 1;
    }
    let mut end = line_index;
    while is_row(end + 1) {
        end += 1;
    }
    (start, end)
}

/// Pads every cell to its column width; widths are measured in chars and
/// ignore separator rows. Returns the rows and the widths used.
pub fn format_table(rows: &[&str]) -> (Vec<String>, Vec<usize>) {
    let normalized: Vec<String> = rows.iter().map(|row| ensure_closing_pipe(row)).collect();
    let parsed: Vec<Vec<&str>> = normalized
        .iter()
        .filter_map(|row| parse_table_row(row))
        .collect();
    let columns = parsed.iter().map(Vec::len).max().unwrap_or(0);

    let mut widths = vec![1; columns];
    for row in parsed.iter().filter(|row| !is_separator_row(row)) {
        for (column, cell) in row.iter().enumerate() {
            widths[column] = widths[column].max(cell.trim().chars().count());
        }
    }

    let formatted = parsed
        .iter()
        .map(|row| {
            let cells: Vec<String> = if is_separator_row(row) {
                widths.iter().map(|width| "-".repeat(width + 2)).collect()
            } else {
                widths
                    .iter()
                    .enumerate()
                    .map(|(column, width)| {
                        let cell = row.get(column).map_or("", |cell| cell.trim());
                        let pad = width.saturating_sub(cell.chars().count());
                        format!(" {cell}{} ", " ".repeat(pad))
                    })
                    .collect()
            };
            format!("|{}|", cells.join("|"))
        })
        .collect();
    (formatted, widths)
}

fn delete_row(content: &str, range: &LineRange<'_>) -> EditResult {
    let end = line_end(content, range.start);
    let end = if end < content.len() { end + 1 } else { end };
    EditResult::new(
        format!("{}{}", &content[..range.start], &content[end..]),
        range.start,
    )
}

/// Enter on an empty row removes it. Otherwise the table is reformatted and
/// a blank row goes in under the current one, caret in its first cell.
pub(super) fn on_enter(content: &str, range: &LineRange<'_>) -> Option<EditResult> {
    let normalized = ensure_closing_pipe(range.line);
    let cells = parse_table_row(&normalized)?;
    if cells.is_empty() {
        return None;
    }
    if cells.iter().all(|cell| cell.trim().is_empty()) {
        return Some(delete_row(content, range));
    }

    let lines: Vec<&str> = content.split('\n').collect();
    let line_index = content[..range.start].matches('\n').count();
    let (start, end) = table_block(&lines, line_index);
    let (mut formatted, widths) = format_table(&lines[start..=end]);
    let blank_cells: Vec<String> = widths.iter().map(|width| " ".repeat(width + 2)).collect();
    let relative = line_index - start;
    formatted.insert(relative + 1, format!("|{}|", blank_cells.join("|")));

    let before = lines[..start].join("\n");
    let mut updated = String::new();
    if start > 0 {
        updated.push_str(&before);
        updated.push('\n');
    }
    updated.push_str(&formatted.join("\n"));
    if end + 1 < lines.len() {
        updated.push('\n');
        updated.push_str(&lines[end + 1..].join("\n"));
    }

    let table_start = if start > 0 { before.len() + 1 } else { 0 };
    let new_row_start = table_start + formatted[..=relative].join("\n").len() + 1;
    Some(EditResult::new(updated, new_row_start + 2))
}

/// Moves the caret to the start of the next cell, or the previous one with
/// shift. Past the last cell Tab goes to the end of the row; Shift+Tab in
/// the first cell does nothing.
pub(super) fn on_tab(
    content: &str,
    selection: Selection,
    shift: bool,
    range: &LineRange<'_>,
) -> Option<EditResult> {
    let line = range.line;
    let relative = selection.start.saturating_sub(range.start);
    let pipes: Vec<usize> = line.match_indices('|').map(|(index, _)| index).collect();
    if pipes.is_empty() {
        return None;
    }
    let current = pipes
        .iter()
        .filter(|&&pipe| pipe < relative)
        .count()
        .saturating_sub(1);

    let target = if shift {
        if current == 0 {
            return None;
        }
        pipes[current - 1] + 1
    } else if current + 1 < pipes.len() - 1 {
        pipes[current + 1] + 1
    } else {
        return Some(EditResult::new(content.to_string(), range.start + line.len()));
    };
    let target = if line.as_bytes().get(target) == Some(&b' ') {
        target + 1
    } else {
        target
    };
    Some(EditResult::new(content.to_string(), range.start + target))
}

pub(super) fn on_backspace(content: &str, range: &LineRange<'_>) -> Option<EditResult> {
    let cells = parse_table_row(range.line)?;
    if cells.iter().all(|cell| cell.trim().is_empty()) {
        Some(delete_row(content, range))
    } else {
        None
    }
}
