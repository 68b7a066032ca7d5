use super::*;
use proptest::prelude::*;

fn buf_with(s: &str) -> GapBuffer {
    let mut b = GapBuffer::new();
    b.insert_str(s).unwrap();
    b
}

fn check_invariants(b: &GapBuffer) {
    let (g, c, e, sentinel) = b.invariants();
    assert!(g <= c, "g <= c violated");
    assert!(c <= e, "c <= e violated");
    assert_eq!(sentinel, 0, "sentinel byte missing");
}

#[test]
fn test_new_is_empty() {
    let b = GapBuffer::new();
    assert!(b.is_empty());
    assert_eq!(b.content(), b"");
    assert_eq!(b.row(), 1);
    assert_eq!(b.col(), 1);
    check_invariants(&b);
}

#[test]
fn test_insert_and_content() {
    let b = buf_with("hello");
    assert_eq!(b.content(), b"hello");
    assert_eq!(b.cursor(), 5);
    assert_eq!(b.col(), 6);
    assert!(b.is_modified());
    check_invariants(&b);
}

#[test]
fn test_row_col_tracking() {
    let mut b = buf_with("ab\ncd");
    assert_eq!(b.row(), 2);
    assert_eq!(b.col(), 3);
    b.insert_ch(b'\n').unwrap();
    assert_eq!(b.row(), 3);
    assert_eq!(b.col(), 1);
    b.insert_ch(b'\t').unwrap();
    assert_eq!(b.col(), 1 + crate::constants::TAB_SIZE);
}

#[test]
fn test_movement_over_gap() {
    let mut b = buf_with("abc");
    assert!(b.left_ch());
    assert!(b.left_ch());
    assert_eq!(b.cursor(), 1);
    assert_eq!(b.current_byte(), b'b');
    b.insert_ch(b'X').unwrap();
    assert_eq!(b.content(), b"aXbc");
    assert!(b.right_ch());
    assert!(b.right_ch());
    assert!(!b.right_ch());
    check_invariants(&b);
}

#[test]
fn test_left_ch_recomputes_col_across_newline() {
    let mut b = buf_with("ab\tcd\nx");
    // Cursor after x: row 2 col 2
    assert!(b.left_ch()); // On x
    assert!(b.left_ch()); // On the newline, back on row 1
    assert_eq!(b.row(), 1);
    // a, b, tab, c, d: col = 1 + 1 + 1 + TAB + 1 + 1
    assert_eq!(b.col(), 5 + crate::constants::TAB_SIZE);
}

#[test]
fn test_delete_and_backspace() {
    let mut b = buf_with("abc");
    assert!(!b.delete_ch()); // At the end, only the sentinel remains
    assert!(b.backspace_ch());
    assert_eq!(b.content(), b"ab");
    b.start_of_buffer();
    assert!(b.delete_ch());
    assert_eq!(b.content(), b"b");
    assert!(!b.left_ch());
    check_invariants(&b);
}

#[test]
fn test_sentinel_cannot_be_deleted() {
    let mut b = GapBuffer::new();
    assert!(!b.delete_ch());
    assert!(!b.backspace_ch());
}

#[test]
fn test_grow_gap_preserves_content() {
    let mut b = GapBuffer::new();
    let long: String = "xy".repeat(2000);
    b.insert_str(&long).unwrap();
    assert_eq!(b.content(), long.as_bytes());
    check_invariants(&b);
}

// ----- undo / redo ------------------------------------------------------

#[test]
fn test_undo_single_insert() {
    let mut b = GapBuffer::new();
    b.insert_ch(b'a').unwrap();
    assert_eq!(b.reverse(ReplayKind::Undo).unwrap(), Replay::Applied);
    assert_eq!(b.content(), b"");
    assert_eq!(b.cursor(), 0);
}

#[test]
fn test_group_undo_is_atomic() {
    let mut b = GapBuffer::new();
    b.insert_str("abc").unwrap();
    assert_eq!(b.reverse(ReplayKind::Undo).unwrap(), Replay::Applied);
    assert_eq!(b.content(), b"");
    assert_eq!(b.cursor(), 0);
}

#[test]
fn test_undo_then_redo_round_trip() {
    let mut b = GapBuffer::new();
    b.insert_str("hello").unwrap();
    b.insert_str(" world").unwrap();

    b.reverse(ReplayKind::Undo).unwrap();
    assert_eq!(b.content(), b"hello");
    b.reverse(ReplayKind::Undo).unwrap();
    assert_eq!(b.content(), b"");

    b.reverse(ReplayKind::Redo).unwrap();
    assert_eq!(b.content(), b"hello");
    b.reverse(ReplayKind::Redo).unwrap();
    assert_eq!(b.content(), b"hello world");
    assert_eq!(b.reverse(ReplayKind::Redo).unwrap(), Replay::NoHistory);
}

#[test]
fn test_undo_of_delete_restores_byte() {
    let mut b = buf_with("abc");
    b.start_of_buffer();
    b.delete_ch();
    assert_eq!(b.content(), b"bc");
    b.reverse(ReplayKind::Undo).unwrap();
    assert_eq!(b.content(), b"abc");
}

#[test]
fn test_no_history_sentinel() {
    let mut b = GapBuffer::new();
    assert_eq!(b.reverse(ReplayKind::Undo).unwrap(), Replay::NoHistory);
    assert_eq!(b.reverse(ReplayKind::Redo).unwrap(), Replay::NoHistory);
    // A failed reverse must not corrupt normal recording
    b.insert_ch(b'a').unwrap();
    assert_eq!(b.reverse(ReplayKind::Undo).unwrap(), Replay::Applied);
    assert_eq!(b.content(), b"");
}

#[test]
fn test_redo_truncated_by_normal_edit() {
    let mut b = GapBuffer::new();
    b.insert_ch(b'a').unwrap();
    b.insert_ch(b'b').unwrap();
    b.reverse(ReplayKind::Undo).unwrap();
    assert_eq!(b.content(), b"a");
    b.insert_ch(b'c').unwrap();
    assert_eq!(b.content(), b"ac");
    // History may not fork
    assert_eq!(b.reverse(ReplayKind::Redo).unwrap(), Replay::NoHistory);
}

#[test]
fn test_undo_positions_cursor() {
    let mut b = buf_with("abcd");
    b.start_of_buffer();
    b.right_ch();
    b.insert_str("XY").unwrap();
    assert_eq!(b.content(), b"aXYbcd");
    b.end_of_buffer();
    b.reverse(ReplayKind::Undo).unwrap();
    assert_eq!(b.content(), b"abcd");
}

// ----- vertical motion --------------------------------------------------

#[test]
fn test_up_down_line() {
    let mut b = buf_with("abcdef\nxy\nlmnopq");
    b.start_of_buffer();
    for _ in 0..4 {
        b.right_ch();
    }
    assert_eq!(b.col(), 5);

    // A short line stops at its last position before the newline
    assert!(b.down_line());
    assert_eq!(b.row(), 2);
    assert_eq!(b.col(), 3);

    // The sticky target survives the stop on the short line
    assert!(b.down_line());
    assert_eq!(b.row(), 3);
    assert_eq!(b.col(), 5);

    assert!(b.up_line());
    assert_eq!(b.row(), 2);
    assert!(b.up_line());
    assert_eq!(b.row(), 1);
    assert_eq!(b.col(), 5);
    assert!(!b.up_line());
}

#[test]
fn test_horizontal_motion_clears_sticky_column() {
    let mut b = buf_with("abcdef\nxy\nlmnopq");
    b.start_of_buffer();
    for _ in 0..4 {
        b.right_ch();
    }
    b.down_line(); // Sticky target is 5, stops at col 3
    b.left_ch(); // Horizontal motion clears the target
    b.down_line();
    assert_eq!(b.row(), 3);
    assert_eq!(b.col(), 2);
}

#[test]
fn test_down_line_at_last_line() {
    let mut b = buf_with("ab");
    b.start_of_buffer();
    assert!(!b.down_line());
}

#[test]
fn test_start_end_of_line() {
    let mut b = buf_with("one\ntwo three");
    b.start_of_line();
    assert_eq!(b.col(), 1);
    assert_eq!(b.current_byte(), b't');
    b.end_of_line();
    assert_eq!(b.current_byte(), 0); // Sentinel at end of buffer
    b.up_line();
    b.end_of_line();
    assert_eq!(b.current_byte(), b'\n');
}

// ----- words ------------------------------------------------------------

#[test]
fn test_left_word() {
    let mut b = buf_with("foo bar");
    b.left_word();
    assert_eq!(b.current_byte(), b'b');
    b.left_word();
    assert_eq!(b.current_byte(), b'f');
}

#[test]
fn test_right_word_case_transform() {
    let mut b = buf_with("hello world");
    b.start_of_buffer();
    b.right_word(Some(Case::Upper)).unwrap();
    assert_eq!(b.content(), b"HELLO world");
    // The transform is one undo group
    b.reverse(ReplayKind::Undo).unwrap();
    assert_eq!(b.content(), b"hello world");
}

#[test]
fn test_right_word_plain() {
    let mut b = buf_with("one two");
    b.start_of_buffer();
    b.right_word(None).unwrap();
    assert_eq!(b.current_byte(), b't');
    assert_eq!(b.content(), b"one two");
}

#[test]
fn test_goto_row() {
    let mut b = buf_with("a\nb\nc");
    assert!(b.goto_row(2));
    assert_eq!(b.current_byte(), b'b');
    assert!(b.goto_row(3));
    assert_eq!(b.current_byte(), b'c');
    assert!(!b.goto_row(9));
}

#[test]
fn test_insert_hex() {
    let mut b = GapBuffer::new();
    b.insert_hex(b"414243").unwrap();
    assert_eq!(b.content(), b"ABC");
    b.reverse(ReplayKind::Undo).unwrap();
    assert_eq!(b.content(), b"");
    assert!(b.insert_hex(b"41424").is_err());
    assert!(b.insert_hex(b"4g").is_err());
}

// ----- mark and region --------------------------------------------------

#[test]
fn test_copy_region() {
    let mut b = buf_with("hello world");
    b.start_of_buffer();
    b.set_mark();
    for _ in 0..5 {
        b.right_ch();
    }
    let mut p = GapBuffer::new();
    b.copy_region(&mut p, false).unwrap();
    assert_eq!(p.content(), b"hello");
    assert_eq!(b.content(), b"hello world");
    assert!(!b.mark_set());
}

#[test]
fn test_cut_region_is_one_group() {
    let mut b = buf_with("hello world");
    b.start_of_buffer();
    b.set_mark();
    for _ in 0..6 {
        b.right_ch();
    }
    let mut p = GapBuffer::new();
    b.copy_region(&mut p, true).unwrap();
    assert_eq!(p.content(), b"hello ");
    assert_eq!(b.content(), b"world");

    b.reverse(ReplayKind::Undo).unwrap();
    assert_eq!(b.content(), b"hello world");
}

#[test]
fn test_copy_region_cursor_before_mark() {
    let mut b = buf_with("hello world");
    b.set_mark(); // Mark at end
    b.start_of_buffer();
    let mut p = GapBuffer::new();
    b.copy_region(&mut p, false).unwrap();
    assert_eq!(p.content(), b"hello world");
}

#[test]
fn test_cut_region_cursor_before_mark() {
    let mut b = buf_with("abcdef");
    b.left_ch(); // Mark before f
    b.set_mark();
    b.start_of_buffer();
    b.right_ch();
    b.right_ch();
    let mut p = GapBuffer::new();
    b.copy_region(&mut p, true).unwrap();
    assert_eq!(p.content(), b"cde");
    assert_eq!(b.content(), b"abf");
}

#[test]
fn test_copy_region_no_mark() {
    let mut b = buf_with("x");
    let mut p = GapBuffer::new();
    assert!(b.copy_region(&mut p, false).is_err());
}

#[test]
fn test_mark_survives_movement() {
    let mut b = buf_with("abc");
    b.start_of_buffer();
    b.set_mark();
    b.right_ch();
    b.right_ch();
    b.left_ch();
    let mut p = GapBuffer::new();
    b.copy_region(&mut p, false).unwrap();
    assert_eq!(p.content(), b"a");
}

#[test]
fn test_swap_cursor_and_mark() {
    let mut b = buf_with("abcdef");
    b.start_of_buffer();
    b.set_mark();
    for _ in 0..4 {
        b.right_ch();
    }
    assert_eq!(b.cursor(), 4);
    assert!(b.swap_cursor_and_mark());
    assert_eq!(b.cursor(), 0);
    assert!(b.swap_cursor_and_mark());
    assert_eq!(b.cursor(), 4);

    let mut no_mark = buf_with("x");
    assert!(!no_mark.swap_cursor_and_mark());
}

#[test]
fn test_cut_to_eol() {
    let mut b = buf_with("one two\nthree");
    b.goto_row(1);
    b.right_ch();
    b.right_ch();
    b.right_ch();
    let mut p = GapBuffer::new();
    b.cut_to_eol(&mut p).unwrap();
    assert_eq!(b.content(), b"one\nthree");
    assert_eq!(p.content(), b" two");
}

#[test]
fn test_cut_to_eol_on_newline_deletes_it() {
    let mut b = buf_with("ab\ncd");
    b.goto_row(1);
    b.end_of_line();
    let mut p = GapBuffer::new();
    b.cut_to_eol(&mut p).unwrap();
    assert_eq!(b.content(), b"abcd");
}

#[test]
fn test_cut_to_sol() {
    let mut b = buf_with("one two");
    b.end_of_buffer();
    let mut p = GapBuffer::new();
    b.cut_to_sol(&mut p).unwrap();
    assert_eq!(b.content(), b"");
    assert_eq!(p.content(), b"one two");
}

#[test]
fn test_paste() {
    let mut b = buf_with("hello world");
    b.start_of_buffer();
    b.set_mark();
    for _ in 0..6 {
        b.right_ch();
    }
    let mut p = GapBuffer::new();
    b.copy_region(&mut p, false).unwrap();

    b.end_of_buffer();
    b.paste(&p).unwrap();
    assert_eq!(b.content(), b"hello worldhello ");
    b.reverse(ReplayKind::Undo).unwrap();
    assert_eq!(b.content(), b"hello world");
}

#[test]
fn test_match_bracket() {
    let mut b = buf_with("(a[b]{c}<d>)");
    b.start_of_buffer();
    assert!(b.match_bracket());
    assert_eq!(b.current_byte(), b')');
    assert!(b.match_bracket());
    assert_eq!(b.current_byte(), b'(');
}

#[test]
fn test_match_bracket_nested() {
    let mut b = buf_with("((x))");
    b.start_of_buffer();
    assert!(b.match_bracket());
    assert_eq!(b.cursor(), 4);
}

#[test]
fn test_match_bracket_unbalanced_restores_cursor() {
    let mut b = buf_with("(ab");
    b.start_of_buffer();
    assert!(!b.match_bracket());
    assert_eq!(b.cursor(), 0);
    assert_eq!(b.current_byte(), b'(');
}

#[test]
fn test_match_bracket_not_on_bracket() {
    let mut b = buf_with("abc");
    b.start_of_buffer();
    assert!(!b.match_bracket());
}

#[test]
fn test_trim_clean() {
    let mut b = buf_with("a \nb\t \n\n\n");
    b.trim_clean().unwrap();
    assert_eq!(b.content(), b"a\nb\n");
}

#[test]
fn test_trim_clean_removes_non_printables() {
    let mut b = buf_with("a\x01b\x02c");
    b.trim_clean().unwrap();
    assert_eq!(b.content(), b"abc");
}

#[test]
fn test_trim_clean_keeps_tabs() {
    let mut b = buf_with("a\tb");
    b.trim_clean().unwrap();
    assert_eq!(b.content(), b"a\tb");
}

#[test]
fn test_trim_clean_is_one_group() {
    let mut b = buf_with("x \n\n\n");
    b.trim_clean().unwrap();
    assert_eq!(b.content(), b"x\n");
    b.reverse(ReplayKind::Undo).unwrap();
    assert_eq!(b.content(), b"x \n\n\n");
}

#[test]
fn test_word_under_cursor() {
    let mut b = buf_with("foo bar baz");
    b.start_of_buffer();
    for _ in 0..5 {
        b.right_ch();
    }
    let mut tmp = GapBuffer::new();
    b.word_under_cursor(&mut tmp).unwrap();
    assert_eq!(tmp.content(), b"bar");
}

#[test]
fn test_word_under_cursor_on_space() {
    let mut b = buf_with("a b");
    b.start_of_buffer();
    b.right_ch();
    let mut tmp = GapBuffer::new();
    assert!(b.word_under_cursor(&mut tmp).is_err());
}

#[test]
fn test_copy_logical_line() {
    let mut b = buf_with("one \\\ntwo\nthree");
    b.goto_row(2); // On "two"
    let mut tmp = GapBuffer::new();
    b.copy_logical_line(&mut tmp).unwrap();
    assert_eq!(tmp.content(), b"one two");
}

#[test]
fn test_copy_logical_line_plain() {
    let mut b = buf_with("alpha\nbeta");
    b.goto_row(2);
    let mut tmp = GapBuffer::new();
    b.copy_logical_line(&mut tmp).unwrap();
    assert_eq!(tmp.content(), b"beta");
}

// ----- search and replace -----------------------------------------------

#[test]
fn test_exact_forward_search() {
    let mut b = buf_with("hello world hello");
    b.start_of_buffer();
    assert!(b.exact_forward_search(b"world"));
    assert_eq!(b.cursor(), 6);
    // The search starts after the cursor
    assert!(b.exact_forward_search(b"hello"));
    assert_eq!(b.cursor(), 12);
    assert!(!b.exact_forward_search(b"hello"));
}

#[test]
fn test_regex_forward_search_moves_past_match() {
    let mut b = buf_with("ab 12 cd");
    b.start_of_buffer();
    assert!(b.regex_forward_search(b"[0-9]+").unwrap());
    assert_eq!(b.cursor(), 5);
    assert!(!b.regex_forward_search(b"[0-9]+").unwrap());
}

#[test]
fn test_regex_forward_search_bad_pattern() {
    let mut b = buf_with("x");
    b.start_of_buffer();
    assert!(b.regex_forward_search(b"[oops").is_err());
}

#[test]
fn test_regex_replace_region() {
    let mut b = buf_with("aXbXc");
    b.start_of_buffer();
    b.set_mark();
    b.end_of_buffer();
    b.regex_replace_region(b"/X/-").unwrap();
    assert_eq!(b.content(), b"a-b-c");

    // The whole replace is one undo group
    b.reverse(ReplayKind::Undo).unwrap();
    assert_eq!(b.content(), b"aXbXc");
}

#[test]
fn test_regex_replace_region_requires_mark() {
    let mut b = buf_with("x");
    assert!(b.regex_replace_region(b"/x/y").is_err());
}

#[test]
fn test_regex_replace_region_missing_delim() {
    let mut b = buf_with("x");
    b.set_mark();
    b.start_of_buffer();
    assert!(b.regex_replace_region(b"/x").is_err());
}

// ----- persistence ------------------------------------------------------

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("note.txt");

    let mut b = GapBuffer::new();
    b.insert_str("line one\nline two\n").unwrap();
    b.left_ch(); // The gap position must not affect the output
    b.rename(&path);
    b.save().unwrap();
    assert!(!b.is_modified());
    assert_eq!(std::fs::read(&path).unwrap(), b"line one\nline two\n");

    let b2 = GapBuffer::from_file(&path).unwrap();
    assert_eq!(b2.content(), b"line one\nline two\n");
    assert!(!b2.is_modified());
}

#[test]
fn test_save_without_filename() {
    let mut b = buf_with("x");
    assert!(b.save().is_err());
}

#[test]
fn test_save_creates_missing_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deep/nested/file.txt");
    let mut b = buf_with("data");
    b.rename(&path);
    b.save().unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"data");
}

#[test]
fn test_from_missing_file_is_empty() {
    let b = GapBuffer::from_file(Path::new("/no/such/quill_file")).unwrap();
    assert!(b.is_empty());
    assert!(b.filename().is_some());
}

#[test]
fn test_reset_preserves_filename() {
    let mut b = buf_with("x");
    b.rename(Path::new("kept.txt"));
    b.reset();
    assert!(b.is_empty());
    assert_eq!(b.filename().unwrap(), Path::new("kept.txt"));
}

// ----- buffer list ------------------------------------------------------

#[test]
fn test_buffer_list() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let c = dir.path().join("c.txt");
    std::fs::write(&a, "A").unwrap();
    std::fs::write(&c, "C").unwrap();

    let mut list = BufferList::new(GapBuffer::new());
    list.open(&a).unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list.active().unwrap().content(), b"A");

    list.open(&c).unwrap();
    assert_eq!(list.active().unwrap().content(), b"C");

    // Removal moves to the previous buffer
    assert!(list.remove());
    assert_eq!(list.active().unwrap().content(), b"A");

    assert!(list.prev());
    assert!(list.active().unwrap().is_empty());
    assert!(!list.prev());
    assert!(list.next());

    assert!(list.remove());
    assert!(list.remove() || list.is_empty());
}

// ----- shell ------------------------------------------------------------

#[test]
fn test_insert_shell_cmd() {
    let mut b = buf_with("before");
    let es = b.insert_shell_cmd("printf hi").unwrap();
    assert_eq!(es, 0);
    assert_eq!(b.content(), b"before\nhi");
    b.reverse(ReplayKind::Undo).unwrap();
    assert_eq!(b.content(), b"before");
}

#[test]
fn test_insert_shell_cmd_exit_status() {
    let mut b = GapBuffer::new();
    let es = b.insert_shell_cmd("exit 3").unwrap();
    assert_eq!(es, 3);
}

#[test]
fn test_shell_line() {
    let mut b = buf_with("echo spot");
    let mut tmp = GapBuffer::new();
    let es = b.shell_line(&mut tmp).unwrap();
    assert_eq!(es, 0);
    assert_eq!(b.content(), b"echo spot\nspot\n");
}

// ----- properties -------------------------------------------------------

#[derive(Debug, Clone)]
enum EditOp {
    Insert(u8),
    InsertStr(String),
    Delete,
    Backspace,
    Left,
    Right,
}

fn edit_op() -> impl Strategy<Value = EditOp> {
    prop_oneof![
        proptest::sample::select(&b"ax\n\tZ9 "[..]).prop_map(EditOp::Insert),
        "[a-c\n]{0,5}".prop_map(EditOp::InsertStr),
        Just(EditOp::Delete),
        Just(EditOp::Backspace),
        Just(EditOp::Left),
        Just(EditOp::Right),
    ]
}

/// Reference model: a plain byte vector plus a cursor index.
fn apply_model(model: &mut Vec<u8>, cur: &mut usize, op: &EditOp) {
    match op {
        EditOp::Insert(ch) => {
            model.insert(*cur, *ch);
            *cur += 1;
        }
        EditOp::InsertStr(s) => {
            for &ch in s.as_bytes() {
                model.insert(*cur, ch);
                *cur += 1;
            }
        }
        EditOp::Delete => {
            if *cur < model.len() {
                model.remove(*cur);
            }
        }
        EditOp::Backspace => {
            if *cur > 0 {
                *cur -= 1;
                model.remove(*cur);
            }
        }
        EditOp::Left => *cur = cur.saturating_sub(1),
        EditOp::Right => {
            if *cur < model.len() {
                *cur += 1;
            }
        }
    }
}

fn apply_buf(b: &mut GapBuffer, op: &EditOp) {
    match op {
        EditOp::Insert(ch) => b.insert_ch(*ch).unwrap(),
        EditOp::InsertStr(s) => b.insert_str(s).unwrap(),
        EditOp::Delete => {
            b.delete_ch();
        }
        EditOp::Backspace => {
            b.backspace_ch();
        }
        EditOp::Left => {
            b.left_ch();
        }
        EditOp::Right => {
            b.right_ch();
        }
    }
}

proptest! {
    #[test]
    fn prop_structure_matches_model(ops in proptest::collection::vec(edit_op(), 0..40)) {
        let mut b = GapBuffer::new();
        let mut model: Vec<u8> = Vec::new();
        let mut cur = 0usize;

        for op in &ops {
            apply_buf(&mut b, op);
            apply_model(&mut model, &mut cur, op);

            check_invariants(&b);
            prop_assert_eq!(b.content(), model.clone());
            prop_assert_eq!(b.cursor(), cur);

            // Row and column derived from the logical prefix
            let prefix = &model[..cur];
            let row = 1 + prefix.iter().filter(|&&ch| ch == b'\n').count();
            let line_start = prefix
                .iter()
                .rposition(|&ch| ch == b'\n')
                .map_or(0, |p| p + 1);
            let col = 1 + prefix[line_start..]
                .iter()
                .map(|&ch| if ch == b'\t' { crate::constants::TAB_SIZE } else { 1 })
                .sum::<usize>();
            prop_assert_eq!(b.row(), row);
            prop_assert_eq!(b.col(), col);
        }
    }

    #[test]
    fn prop_undo_all_then_redo_all(ops in proptest::collection::vec(edit_op(), 0..30)) {
        let mut b = GapBuffer::new();
        for op in &ops {
            apply_buf(&mut b, op);
        }
        let final_content = b.content();

        while b.reverse(ReplayKind::Undo).unwrap() == Replay::Applied {}
        prop_assert_eq!(b.content(), b"");
        prop_assert_eq!(b.cursor(), 0);

        while b.reverse(ReplayKind::Redo).unwrap() == Replay::Applied {}
        prop_assert_eq!(b.content(), final_content);
    }

    #[test]
    fn prop_redo_empty_after_normal_edit(ops in proptest::collection::vec(edit_op(), 1..20)) {
        let mut b = GapBuffer::new();
        b.insert_str("seed").unwrap();
        for op in &ops {
            apply_buf(&mut b, op);
        }
        if b.reverse(ReplayKind::Undo).unwrap() == Replay::Applied {
            b.insert_ch(b'!').unwrap();
            prop_assert_eq!(b.reverse(ReplayKind::Redo).unwrap(), Replay::NoHistory);
        }
    }
}
