//! Smart-editing features. Each one recognises its own kind of line and may
//! take over Tab, Enter, Backspace or a typed character on it; a handler
//! returning `None` lets the next feature or the default behaviour run.

mod helpers;
mod ordered;
mod table;
mod todo;
mod unordered;

use regex::Captures;

use crate::markdown::text::{EditResult, LineRange, Selection};

pub use ordered::renumber_ordered_list;
pub use table::{ensure_closing_pipe, format_table, is_separator_row, parse_table_row, table_block};
pub use todo::toggle_checkbox;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Table,
    Todo,
    OrderedList,
    UnorderedList,
}

/// Features in the order they are consulted.
pub const FEATURES: [Feature; 4] = [
    Feature::Table,
    Feature::Todo,
    Feature::OrderedList,
    Feature::UnorderedList,
];

impl Feature {
    pub fn name(&self) -> &'static str {
        match self {
            Feature::Table => "table",
            Feature::Todo => "todo",
            Feature::OrderedList => "orderedList",
            Feature::UnorderedList => "unorderedList",
        }
    }

    pub fn match_line<'a>(&self, line: &'a str) -> Option<Captures<'a>> {
        match self {
            Feature::Table => table::PATTERN.captures(line),
            Feature::Todo => todo::PATTERN.captures(line),
            Feature::OrderedList => ordered::PATTERN.captures(line),
            Feature::UnorderedList => unordered::match_line(line),
        }
    }

    pub fn on_tab(
        &self,
        content: &str,
        selection: Selection,
        shift: bool,
        range: &LineRange<'_>,
    ) -> Option<EditResult> {
        match self {
            Feature::Table => table::on_tab(content, selection, shift, range),
            Feature::OrderedList => ordered::on_tab(content, selection, shift, range),
            Feature::Todo | Feature::UnorderedList => None,
        }
    }

    pub fn on_enter(
        &self,
        content: &str,
        selection: Selection,
        caps: &Captures<'_>,
        range: &LineRange<'_>,
    ) -> Option<EditResult> {
        match self {
            Feature::Table => table::on_enter(content, range),
            Feature::Todo => todo::on_enter(content, selection, caps, range),
            Feature::OrderedList => ordered::on_enter(content, selection, caps, range),
            Feature::UnorderedList => unordered::on_enter(content, selection, caps, range),
        }
    }

    pub fn on_backspace(
        &self,
        content: &str,
        selection: Selection,
        caps: &Captures<'_>,
        range: &LineRange<'_>,
    ) -> Option<EditResult> {
        match self {
            Feature::Table => table::on_backspace(content, range),
            Feature::Todo => todo::on_backspace(content, selection, caps, range),
            Feature::OrderedList => ordered::on_backspace(content, selection, caps, range),
            Feature::UnorderedList => unordered::on_backspace(content, selection, caps, range),
        }
    }

    /// Shortcut expansion when `ch` is typed at the caret.
    pub fn on_input(&self, ch: char, content: &str, selection: Selection) -> Option<EditResult> {
        match self {
            Feature::Table => None,
            Feature::Todo => todo::on_input(ch, content, selection),
            Feature::OrderedList => ordered::on_input(ch, content, selection),
            Feature::UnorderedList => unordered::on_input(ch, content, selection),
        }
    }
}
