use pretty_assertions::assert_eq;
use quire::markdown::block::parse_block_line;
use quire::markdown::selection::set_selection;
use quire::markdown::{
    EditorSession, InputEvent, Selection, process_before_input, renumber_ordered_list,
    toggle_checkbox,
};
use quire::models::NoteRecord;

fn type_text(session: &mut EditorSession, text: &str) {
    for ch in text.chars() {
        assert!(session.before_input(&InputEvent::InsertText(ch.to_string())));
    }
}

#[test]
fn test_enter_continues_numbered_list() {
    let mut session = EditorSession::new("1. foo");
    assert!(session.before_input(&InputEvent::InsertParagraph));
    assert_eq!(session.content(), "1. foo\n2. ");
    assert_eq!(session.selection(), Selection::caret("1. foo\n2. ".len()));
}

#[test]
fn test_checkbox_toggles_both_ways() {
    let checked = toggle_checkbox("- [ ] task", 0);
    assert_eq!(checked, "- [x] task");
    assert_eq!(toggle_checkbox(&checked, 0), "- [ ] task");

    let mut session = EditorSession::new("notes\n- [ ] task");
    session.toggle_checkbox(1);
    assert_eq!(session.content(), "notes\n- [x] task");
}

#[test]
fn test_enter_in_table_row_adds_padded_row() {
    let mut session = EditorSession::new("| a | b |\n| - | - |");
    session.set_selection(Selection::caret(7));
    type_text(&mut session, "c");
    let row_end = session.content().find('\n').unwrap();
    session.set_selection(Selection::caret(row_end));
    assert!(session.before_input(&InputEvent::InsertParagraph));

    let lines: Vec<&str> = session.content().split('\n').collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains(" bc "));
    assert!(lines[1].chars().all(|ch| ch == '|' || ch == ' '));
    assert_eq!(lines[1].len(), lines[0].len());
    assert_eq!(session.selection(), Selection::caret(lines[0].len() + 1 + 2));
}

#[test]
fn test_typing_x_space_makes_a_checkbox() {
    let mut session = EditorSession::new("first\n");
    type_text(&mut session, "x ");
    assert_eq!(session.content(), "first\n- [ ] ");
    assert_eq!(session.selection(), Selection::caret("first\n- [ ] ".len()));
}

#[test]
fn test_renumbering_is_idempotent() {
    let buffers = [
        "1. a\n1. b\n1. c",
        "3. a\n7. b\n\n1. c\n5. d",
        "1. a\n    4. nested\n    9. nested\n2. b",
        "- bullet\n2. a\n2. b\ntext",
        "",
        "1. é\n1. ü",
    ];
    for buffer in buffers {
        for cursor in (0..=buffer.len()).filter(|&cursor| buffer.is_char_boundary(cursor)) {
            let once = renumber_ordered_list(buffer, cursor);
            let twice = renumber_ordered_list(&once.content, once.cursor);
            assert_eq!(twice, once, "{buffer:?} at {cursor}");
        }
    }
}

#[test]
fn test_block_tokenizer_is_total() {
    for line in ["", " ", "\t\t", "#", "####", "|", "- [", "1.", "1. ", "* ", "\u{200b}", "é"] {
        let token = parse_block_line(line);
        assert_eq!(format!("{}{}", token.prefix, token.content), line);
    }
}

#[test]
fn test_session_selection_survives_rendering() {
    let mut session = EditorSession::new("# Title\n- [x] done **now**\n2. next");
    let root = session.render();
    for offset in [0, 3, 8, 14, 20, session.content().len()] {
        let range = set_selection(&root, offset, offset);
        session.sync_selection(Some(&range));
        assert_eq!(session.selection(), Selection::caret(offset));
    }
    session.sync_selection(None);
    assert_eq!(session.selection(), Selection::caret(0));
}

#[test]
fn test_note_round_trips_through_the_editor() {
    let note = NoteRecord::from_text("Shopping\n- milk", 0);
    let mut session = EditorSession::new(note.full_text());
    assert!(session.before_input(&InputEvent::InsertParagraph));
    type_text(&mut session, "eggs");

    let saved = NoteRecord::from_text(session.content(), session.selection().start);
    assert_eq!(saved.name, "Shopping");
    assert_eq!(saved.content, "- milk\n- eggs");
    assert_eq!(saved.cursor, saved.full_text().len());
}

#[test]
fn test_events_without_effect_return_none() {
    assert!(process_before_input(&InputEvent::InsertText(String::new()), "abc", Selection::caret(1)).is_none());
    assert!(
        process_before_input(&InputEvent::DeleteContentBackward, "", Selection::caret(0)).is_none()
    );
}
