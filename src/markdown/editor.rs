//! Turns platform input events into buffer edits, and keeps the live
//! buffer and caret of an open note.

use log::debug;
use regex::Regex;
use std::sync::LazyLock;

use crate::markdown::features::{renumber_ordered_list, toggle_checkbox};
use crate::markdown::input::{handle_backspace_at_list_start, handle_enter, handle_input, handle_tab};
use crate::markdown::render::{checkbox_target, render_markdown, RenderElement};
use crate::markdown::selection::{calculate_cursor_position, get_selection, DomRange};
use crate::markdown::text::{floor_char_boundary, line_start, splice, EditResult, Selection};

static TRAILING_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+\s*$").unwrap());

/// A `beforeinput` event, reduced to what the editor needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    InsertText(String),
    /// Autocorrect replacement; the text comes from the composition event
    /// since the input event itself carries none on some platforms.
    InsertReplacementText(Option<String>),
    InsertFromPaste(String),
    InsertParagraph,
    DeleteByCut,
    DeleteContentBackward,
    DeleteSoftLineBackward,
    DeleteWordBackward,
}

pub fn process_tab(content: &str, selection: Selection, shift: bool) -> EditResult {
    handle_tab(content, selection, shift)
}

fn insert_text(content: &str, selection: Selection, text: &str) -> EditResult {
    EditResult::new(
        splice(content, selection.start, selection.end, text),
        selection.start + text.len(),
    )
}

fn delete_and_renumber(content: &str, start: usize, end: usize) -> EditResult {
    renumber_ordered_list(&splice(content, start, end, ""), start)
}

fn delete_backward(content: &str, selection: Selection) -> Option<EditResult> {
    if selection.end > selection.start {
        return Some(delete_and_renumber(content, selection.start, selection.end));
    }
    if selection.start == 0 {
        return None;
    }
    let previous = floor_char_boundary(content, selection.start - 1);
    Some(delete_and_renumber(content, previous, selection.start))
}

/// The edit an input event makes, or `None` when the event changes nothing.
pub fn process_before_input(
    event: &InputEvent,
    content: &str,
    selection: Selection,
) -> Option<EditResult> {
    let selection = selection.clamped(content);
    match event {
        InputEvent::InsertText(text) => {
            if text.is_empty() {
                return None;
            }
            // Some keyboards confirm a suggestion with the newline inside the text.
            if let Some(word) = text.strip_suffix('\n') {
                let inserted = insert_text(content, selection, word);
                return Some(handle_enter(
                    &inserted.content,
                    Selection::caret(inserted.cursor),
                ));
            }
            if text == " " && selection.is_caret() {
                if let Some(result) = handle_input(' ', content, selection) {
                    return Some(result);
                }
            }
            Some(insert_text(content, selection, text))
        }
        InputEvent::InsertReplacementText(replacement) => {
            let replacement = replacement.as_deref().filter(|text| !text.is_empty())?;
            Some(insert_text(content, selection, replacement))
        }
        InputEvent::InsertFromPaste(text) => {
            if text.is_empty() {
                return None;
            }
            Some(insert_text(content, selection, text))
        }
        InputEvent::InsertParagraph => Some(handle_enter(content, selection)),
        InputEvent::DeleteByCut => delete_backward(content, selection),
        InputEvent::DeleteContentBackward => handle_backspace_at_list_start(content, selection)
            .or_else(|| delete_backward(content, selection)),
        InputEvent::DeleteSoftLineBackward => {
            let start = line_start(content, selection.start);
            (selection.start > start)
                .then(|| delete_and_renumber(content, start, selection.start))
        }
        InputEvent::DeleteWordBackward => {
            let word = TRAILING_WORD.find(&content[..selection.start])?;
            Some(delete_and_renumber(content, word.start(), selection.start))
        }
    }
}

/// The text being edited together with its caret. Every edit replaces both
/// at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorSession {
    content: String,
    selection: Selection,
}

impl EditorSession {
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        let selection = Selection::caret(content.len());
        Self { content, selection }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection.clamped(&self.content);
    }

    /// Reads the selection back from a DOM range over the rendered tree.
    pub fn sync_selection(&mut self, range: Option<&DomRange>) {
        let root = self.render();
        self.selection = get_selection(&root, range).clamped(&self.content);
    }

    pub fn apply(&mut self, result: EditResult) {
        let cursor = floor_char_boundary(&result.content, result.cursor);
        self.content = result.content;
        self.selection = Selection::caret(cursor);
    }

    pub fn tab(&mut self, shift: bool) {
        let result = process_tab(&self.content, self.selection, shift);
        self.apply(result);
    }

    /// Applies the event; returns whether it changed anything.
    pub fn before_input(&mut self, event: &InputEvent) -> bool {
        match process_before_input(event, &self.content, self.selection) {
            Some(result) => {
                self.apply(result);
                true
            }
            None => {
                debug!("Input event left the buffer unchanged: {event:?}");
                false
            }
        }
    }

    pub fn toggle_checkbox(&mut self, line_index: usize) {
        let toggled = toggle_checkbox(&self.content, line_index);
        let cursor = self.selection.start;
        self.apply(EditResult::new(toggled, cursor));
    }

    /// Handles a click on the rendered node at `path`; true when it hit a checkbox.
    pub fn click(&mut self, path: &[usize]) -> bool {
        match checkbox_target(&self.render(), path) {
            Some(line_index) => {
                self.toggle_checkbox(line_index);
                true
            }
            None => false,
        }
    }

    /// Swaps in a note that changed elsewhere; the first line holds its name.
    pub fn replace_content(&mut self, name: &str, content: &str) {
        let updated = format!("{name}\n{content}");
        let cursor = calculate_cursor_position(&self.content, &updated, self.selection.start);
        self.apply(EditResult::new(updated, cursor));
    }

    pub fn render(&self) -> RenderElement {
        render_markdown(&self.content)
    }
}
