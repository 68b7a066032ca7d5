//! Gap buffer with grouped undo and redo
//!
//! Text is a byte array split into three regions: `[0, g)` before the
//! cursor, `[g, c)` the gap, and `[c, e]` after the cursor. The byte at
//! `e` is a NUL sentinel that cannot be deleted. Movement slides bytes
//! across the gap; edits write at `g` or advance `c`.
//!
//! Every edit appends an atomic operation to a log. Multi-character
//! operations bracket their edits between start-group and end-group
//! records so undo and redo step across them as one user action.
//! Normal edits record into the undo log and truncate the redo log to
//! prevent a fork in history; replaying an undo records into the redo
//! log, and replaying a redo records into the undo log.

use crate::constants::{INIT_GAP_BUF_SIZE, TAB_SIZE};
use crate::error::{Error, Result};
use crate::num::hex_to_val;
use crate::outbuf::create_w;
use crate::regex;
use crate::search::quick_search;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

mod list;
pub use list::BufferList;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OpId {
    StartGroup,
    EndGroup,
    Insert,
    Delete,
}

#[derive(Clone, Copy, Debug)]
struct AtomicOp {
    id: OpId,
    g_loc: usize,
    ch: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RecordMode {
    Normal,
    Undoing,
    Redoing,
}

/// Direction for [`GapBuffer::reverse`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplayKind {
    Undo,
    Redo,
}

/// Outcome of [`GapBuffer::reverse`]. An empty history is a normal
/// result, not an error.
#[derive(Debug, PartialEq, Eq)]
pub enum Replay {
    Applied,
    NoHistory,
}

/// Case transform applied by [`GapBuffer::right_word`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Case {
    Lower,
    Upper,
}

pub struct GapBuffer {
    filename: Option<PathBuf>,
    a: Vec<u8>,
    /// Gap start, the logical cursor.
    g: usize,
    /// Gap end, the index of the byte under the cursor.
    c: usize,
    /// Last valid index, always holding the sentinel.
    e: usize,
    m_set: bool,
    m: usize,
    /// Row number, starting from 1.
    r: usize,
    /// Column number, starting from 1.
    col: usize,
    /// Draw start, managed by the owning view.
    d: usize,
    sc_set: bool,
    /// Sticky target column for vertical motion.
    sc: usize,
    modified: bool,
    mode: RecordMode,
    undo: Vec<AtomicOp>,
    redo: Vec<AtomicOp>,
}

fn is_print(u: u8) -> bool {
    (0x20..0x7F).contains(&u)
}

fn is_alpha_u(u: u8) -> bool {
    u.is_ascii_alphabetic() || u == b'_'
}

fn is_alnum_u(u: u8) -> bool {
    u.is_ascii_alphanumeric() || u == b'_'
}

impl Default for GapBuffer {
    fn default() -> Self {
        GapBuffer::new()
    }
}

impl GapBuffer {
    pub fn new() -> Self {
        let s = INIT_GAP_BUF_SIZE;
        GapBuffer {
            filename: None,
            a: vec![0; s],
            g: 0,
            c: s - 1,
            e: s - 1,
            m_set: false,
            m: 0,
            r: 1,
            col: 1,
            d: 0,
            sc_set: false,
            sc: 0,
            modified: false,
            mode: RecordMode::Normal,
            undo: Vec::new(),
            redo: Vec::new(),
        }
    }

    /// Load a file into a fresh buffer. A missing file yields an empty
    /// buffer carrying the name, ready to be saved.
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut b = GapBuffer::new();
        match b.insert_file(path) {
            Ok(()) => {}
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        b.rename(path);
        b.modified = false;
        Ok(b)
    }

    /// Clear content and state. The filename is preserved.
    pub fn reset(&mut self) {
        self.g = 0;
        self.c = self.e;
        self.m_set = false;
        self.m = 0;
        self.r = 1;
        self.col = 1;
        self.sc_set = false;
        self.sc = 0;
        self.d = 0;
        self.modified = true;
        self.undo.clear();
        self.redo.clear();
    }

    #[must_use]
    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    #[must_use]
    pub fn row(&self) -> usize {
        self.r
    }

    #[must_use]
    pub fn col(&self) -> usize {
        self.col
    }

    /// Cursor position in the logical string.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.g
    }

    /// Byte under the cursor; the sentinel when at the end.
    #[must_use]
    pub fn current_byte(&self) -> u8 {
        self.a[self.c]
    }

    #[must_use]
    pub fn mark_set(&self) -> bool {
        self.m_set
    }

    #[must_use]
    pub fn draw_start(&self) -> usize {
        self.d
    }

    pub fn set_draw_start(&mut self, d: usize) {
        self.d = d;
    }

    /// The logical content: prefix plus suffix, without the sentinel.
    #[must_use]
    pub fn content(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.g + self.e - self.c);
        out.extend_from_slice(&self.a[..self.g]);
        out.extend_from_slice(&self.a[self.c..self.e]);
        out
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.g + self.e - self.c
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ----- operation log ------------------------------------------------

    fn record(&mut self, id: OpId, g_loc: usize, ch: u8) {
        let buf = match self.mode {
            RecordMode::Undoing => &mut self.redo,
            _ => &mut self.undo,
        };
        buf.push(AtomicOp { id, g_loc, ch });
    }

    fn start_group(&mut self) {
        self.record(OpId::StartGroup, self.g, b' ');
    }

    fn end_group(&mut self) {
        self.record(OpId::EndGroup, self.g, b' ');
    }

    /// Replay the undo or redo log across one whole group, inverting
    /// each operation and recording the inverse into the opposite log.
    pub fn reverse(&mut self, kind: ReplayKind) -> Result<Replay> {
        self.mode = match kind {
            ReplayKind::Undo => RecordMode::Undoing,
            ReplayKind::Redo => RecordMode::Redoing,
        };

        let replay_empty = match kind {
            ReplayKind::Undo => self.undo.is_empty(),
            ReplayKind::Redo => self.redo.is_empty(),
        };
        if replay_empty {
            self.mode = RecordMode::Normal;
            return Ok(Replay::NoHistory);
        }

        let mut depth: i64 = 0;
        loop {
            let op = {
                let replay = match kind {
                    ReplayKind::Undo => &self.undo,
                    ReplayKind::Redo => &self.redo,
                };
                match replay.last() {
                    Some(op) => *op,
                    None => break,
                }
            };

            // Move into position
            while self.g > op.g_loc {
                if !self.left_ch() {
                    break;
                }
            }
            while self.g < op.g_loc {
                if !self.right_ch() {
                    break;
                }
            }
            if self.g != op.g_loc {
                self.mode = RecordMode::Normal;
                return Err(Error::Infra("operation log out of step with buffer"));
            }

            // Invert the operation
            match op.id {
                OpId::StartGroup => {
                    self.record(op.id, op.g_loc, op.ch);
                    depth += 1;
                }
                OpId::EndGroup => {
                    self.record(op.id, op.g_loc, op.ch);
                    depth -= 1;
                }
                OpId::Insert => {
                    if !self.delete_ch() {
                        self.mode = RecordMode::Normal;
                        return Err(Error::Infra("operation log out of step with buffer"));
                    }
                }
                OpId::Delete => {
                    self.insert_ch(op.ch)?;
                    if !self.left_ch() {
                        self.mode = RecordMode::Normal;
                        return Err(Error::Infra("operation log out of step with buffer"));
                    }
                }
            }

            let replay = match kind {
                ReplayKind::Undo => &mut self.undo,
                ReplayKind::Redo => &mut self.redo,
            };
            replay.pop();

            if depth == 0 {
                break;
            }
        }

        self.mode = RecordMode::Normal;
        Ok(Replay::Applied)
    }

    // ----- edits --------------------------------------------------------

    fn grow_gap(&mut self, will_use: usize) -> Result<()> {
        if will_use <= self.c - self.g {
            return Ok(());
        }
        let s = self.e + 1;
        let new_s = s
            .checked_add(will_use)
            .and_then(|n| n.checked_mul(2))
            .ok_or(Error::Infra("gap buffer size overflow"))?;
        self.a
            .try_reserve_exact(new_s - self.a.len())
            .map_err(|_| Error::Infra("out of memory"))?;
        self.a.resize(new_s, 0);
        let increase = new_s - s;
        self.a.copy_within(self.c..=self.e, self.c + increase);

        // The mark is cleared upon modification, but just in case
        if self.m_set && self.m >= self.c {
            self.m += increase;
        }
        self.c += increase;
        self.e += increase;
        Ok(())
    }

    pub fn insert_ch(&mut self, ch: u8) -> Result<()> {
        self.sc_set = false;
        if self.g == self.c {
            self.grow_gap(1)?;
        }

        self.record(OpId::Insert, self.g, ch);
        if self.mode == RecordMode::Normal && !self.redo.is_empty() {
            self.redo.clear();
        }

        self.a[self.g] = ch;
        self.g += 1;
        if ch == b'\n' {
            self.r += 1;
            self.col = 1;
        } else if ch == b'\t' {
            self.col += TAB_SIZE;
        } else {
            self.col += 1;
        }
        self.m_set = false;
        self.modified = true;
        Ok(())
    }

    pub fn insert_str(&mut self, s: &str) -> Result<()> {
        self.insert_mem(s.as_bytes())
    }

    pub fn insert_mem(&mut self, mem: &[u8]) -> Result<()> {
        self.start_group();
        for &ch in mem {
            self.insert_ch(ch)?;
        }
        self.end_group();
        Ok(())
    }

    /// Insert a whole file at the cursor, then move to the start of the
    /// buffer. One undo group.
    pub fn insert_file(&mut self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)?;
        self.start_group();
        self.sc_set = false;
        for &ch in &bytes {
            self.insert_ch(ch)?;
        }
        self.start_of_buffer();
        self.end_group();
        Ok(())
    }

    /// Delete the byte under the cursor. The sentinel cannot be
    /// deleted.
    pub fn delete_ch(&mut self) -> bool {
        self.sc_set = false;
        if self.c == self.e {
            return false;
        }

        self.record(OpId::Delete, self.g, self.a[self.c]);
        if self.mode == RecordMode::Normal && !self.redo.is_empty() {
            self.redo.clear();
        }

        self.c += 1;
        self.m_set = false;
        self.modified = true;
        true
    }

    pub fn backspace_ch(&mut self) -> bool {
        if self.g == 0 {
            return false;
        }
        self.start_group();
        self.left_ch();
        self.delete_ch();
        self.end_group();
        true
    }

    // ----- movement -----------------------------------------------------

    pub fn left_ch(&mut self) -> bool {
        self.sc_set = false;
        if self.g == 0 {
            return false;
        }

        self.g -= 1;
        self.c -= 1;
        self.a[self.c] = self.a[self.g];
        let u = self.a[self.c];
        if u == b'\n' {
            self.r -= 1;
            // Work out the column of the previous line
            let mut count = 1;
            let mut i = self.g;
            while i > 0 {
                i -= 1;
                let ch = self.a[i];
                if ch == b'\n' {
                    break;
                } else if ch == b'\t' {
                    count += TAB_SIZE;
                } else {
                    count += 1;
                }
            }
            self.col = count;
        } else if u == b'\t' {
            self.col -= TAB_SIZE;
        } else {
            self.col -= 1;
        }
        // Move the mark across the gap
        if self.m_set && self.m == self.g {
            self.m = self.c;
        }
        true
    }

    pub fn right_ch(&mut self) -> bool {
        self.sc_set = false;
        if self.c == self.e {
            return false;
        }

        let u = self.a[self.c];
        if u == b'\n' {
            self.r += 1;
            self.col = 1;
        } else if u == b'\t' {
            self.col += TAB_SIZE;
        } else {
            self.col += 1;
        }
        self.a[self.g] = self.a[self.c];
        // Move the mark across the gap
        if self.m_set && self.m == self.c {
            self.m = self.g;
        }
        self.g += 1;
        self.c += 1;
        true
    }

    pub fn start_of_buffer(&mut self) {
        while self.left_ch() {}
    }

    pub fn end_of_buffer(&mut self) {
        while self.right_ch() {}
    }

    pub fn start_of_line(&mut self) {
        while self.col != 1 {
            self.left_ch();
        }
    }

    pub fn end_of_line(&mut self) {
        while self.a[self.c] != b'\n' && self.c != self.e {
            self.right_ch();
        }
    }

    /// Move up one line, aiming at the sticky target column. The first
    /// vertical motion after a horizontal change records the current
    /// column as the target.
    pub fn up_line(&mut self) -> bool {
        let target_col = if self.sc_set { self.sc } else { self.col };
        if self.r == 1 {
            return false;
        }

        let r_orig = self.r;
        while self.r == r_orig {
            self.left_ch();
        }
        while self.col > target_col {
            self.left_ch();
        }

        // Movement cleared the sticky column, so set it again
        self.sc_set = true;
        self.sc = target_col;
        true
    }

    /// Move down one line, stopping at the last position of a short
    /// line.
    pub fn down_line(&mut self) -> bool {
        let target_col = if self.sc_set { self.sc } else { self.col };
        let r_orig = self.r;
        let mut moved = true;

        while self.r == r_orig {
            if !self.right_ch() {
                // End of buffer on the same line, go back
                while self.col > target_col {
                    self.left_ch();
                }
                moved = false;
                break;
            }
        }
        if moved {
            while self.col != target_col && self.a[self.c] != b'\n' {
                if !self.right_ch() {
                    break;
                }
            }
        }

        self.sc_set = true;
        self.sc = target_col;
        moved
    }

    /// Move left to the start of the previous word.
    pub fn left_word(&mut self) {
        loop {
            if !self.left_ch() {
                return;
            }
            if is_alpha_u(self.a[self.c]) {
                break;
            }
        }
        // Look behind before moving, to stop at the start of the word
        while self.g > 0 && is_alpha_u(self.a[self.g - 1]) {
            self.left_ch();
        }
    }

    /// Move right one word, optionally folding its case in passing.
    pub fn right_word(&mut self, transform: Option<Case>) -> Result<()> {
        self.start_group();

        while !is_alpha_u(self.a[self.c]) {
            if !self.right_ch() {
                self.end_group();
                return Ok(());
            }
        }

        loop {
            let u = self.a[self.c];
            if u.is_ascii_uppercase() && transform == Some(Case::Lower) {
                self.delete_ch();
                self.insert_ch(u.to_ascii_lowercase())?;
            } else if u.is_ascii_lowercase() && transform == Some(Case::Upper) {
                self.delete_ch();
                self.insert_ch(u.to_ascii_uppercase())?;
            } else if !self.right_ch() {
                break;
            }
            if !is_alnum_u(u) {
                break;
            }
        }

        self.end_group();
        Ok(())
    }

    /// Move the cursor to the start of the given 1-based row.
    pub fn goto_row(&mut self, row: usize) -> bool {
        self.start_of_buffer();
        while self.r != row {
            if !self.right_ch() {
                return false;
            }
        }
        true
    }

    /// Insert bytes given as pairs of hex digits. One undo group.
    pub fn insert_hex(&mut self, hex: &[u8]) -> Result<()> {
        if hex.len() % 2 != 0 {
            return Err(Error::syntax("odd number of hex digits"));
        }
        self.start_group();
        for pair in hex.chunks_exact(2) {
            match hex_to_val(pair[0], pair[1]) {
                Ok(x) => self.insert_ch(x)?,
                Err(e) => {
                    self.end_group();
                    return Err(e);
                }
            }
        }
        self.end_group();
        Ok(())
    }

    // ----- mark and region ----------------------------------------------

    pub fn set_mark(&mut self) {
        self.m_set = true;
        self.m = self.c;
    }

    pub fn swap_cursor_and_mark(&mut self) -> bool {
        if !self.m_set {
            return false;
        }

        if self.c > self.m {
            let m_orig = self.m;
            self.m = self.c;
            while self.g != m_orig {
                self.left_ch();
            }
        } else {
            let g_orig = self.g;
            while self.c != self.m {
                self.right_ch();
            }
            self.m = g_orig;
        }
        true
    }

    /// Append the region to `p`, optionally deleting it from this
    /// buffer. The region runs from the mark to the cursor in either
    /// direction; the mark is never inside the gap.
    pub fn copy_region(&mut self, p: &mut GapBuffer, cut: bool) -> Result<()> {
        if cut {
            self.start_group();
        }
        self.sc_set = false;

        if !self.m_set {
            if cut {
                self.end_group();
            }
            return Err(Error::usage("no mark set"));
        }

        p.reset();

        if self.m == self.c {
            if cut {
                self.end_group();
            }
            return Ok(());
        }

        if self.m < self.c {
            for i in self.m..self.g {
                let ch = self.a[i];
                p.insert_ch(ch)?;
            }
            if cut {
                let num = self.g - self.m;
                for _ in 0..num {
                    self.backspace_ch();
                }
            }
        } else {
            for i in self.c..self.m {
                let ch = self.a[i];
                p.insert_ch(ch)?;
            }
            if cut {
                let num = self.m - self.c;
                for _ in 0..num {
                    self.delete_ch();
                }
            }
        }

        // Clear the mark even when just copying
        if !cut {
            self.m_set = false;
        }

        if cut {
            self.end_group();
        }
        Ok(())
    }

    pub fn cut_to_eol(&mut self, p: &mut GapBuffer) -> Result<()> {
        if self.a[self.c] == b'\n' {
            self.delete_ch();
            return Ok(());
        }
        self.m_set = true;
        self.m = self.c;
        self.end_of_line();
        self.copy_region(p, true)
    }

    pub fn cut_to_sol(&mut self, p: &mut GapBuffer) -> Result<()> {
        self.m_set = true;
        self.m = self.c;
        self.start_of_line();
        self.copy_region(p, true)
    }

    /// Move to the matching bracket of the one under the cursor. The
    /// cursor is restored when the partner is missing.
    pub fn match_bracket(&mut self) -> bool {
        let orig_ch = self.a[self.c];
        let (target, move_right) = match orig_ch {
            b'<' => (b'>', true),
            b'[' => (b']', true),
            b'{' => (b'}', true),
            b'(' => (b')', true),
            b'>' => (b'<', false),
            b']' => (b'[', false),
            b'}' => (b'{', false),
            b')' => (b'(', false),
            _ => return false,
        };

        let c_orig = self.c;
        let mut depth: usize = 1;
        loop {
            let moved = if move_right {
                self.right_ch()
            } else {
                self.left_ch()
            };
            if !moved {
                break;
            }

            let ch = self.a[self.c];
            if ch == orig_ch {
                depth += 1;
            }
            if ch == target {
                depth -= 1;
            }
            if depth == 0 {
                return true;
            }
        }

        // Go back
        if move_right {
            while self.c != c_orig {
                self.left_ch();
            }
        } else {
            while self.c != c_orig {
                self.right_ch();
            }
        }
        false
    }

    /// Strip trailing whitespace from every line, reduce trailing
    /// newlines to one, and delete non-printable bytes other than tab
    /// and newline. One undo group.
    pub fn trim_clean(&mut self) -> Result<()> {
        let r_orig = self.r;
        let col_orig = self.col;

        self.start_group();

        self.end_of_buffer();
        if !self.left_ch() {
            self.end_group();
            return Ok(());
        }

        if self.a[self.c] == b'\n' {
            loop {
                if !self.left_ch() {
                    break;
                }
                if self.a[self.c] == b'\n' {
                    self.delete_ch(); // Eat surplus trailing newlines
                } else {
                    break;
                }
            }
        }

        let mut eol = true;
        loop {
            let ch = self.a[self.c];
            if ch == b'\n' {
                eol = true;
            } else if eol && (ch == b' ' || ch == b'\t') {
                self.delete_ch(); // Eat trailing whitespace
            } else if !is_print(ch) && ch != b'\t' && self.c != self.e {
                self.delete_ch();
            } else {
                eol = false;
            }

            if !self.left_ch() {
                break;
            }
        }

        // Move back
        while self.r != r_orig {
            if !self.right_ch() {
                break;
            }
        }
        while self.col != col_orig && self.a[self.c] != b'\n' {
            if !self.right_ch() {
                break;
            }
        }

        self.end_group();
        Ok(())
    }

    /// Copy the word under the cursor into `tmp`.
    pub fn word_under_cursor(&mut self, tmp: &mut GapBuffer) -> Result<()> {
        tmp.reset();

        let u = self.a[self.c];
        if u == b' ' || u == b'\t' {
            return Err(Error::usage("no word under the cursor"));
        }

        let mut p = self.c;
        while p != self.e {
            let u = self.a[p];
            if u == b' ' || u == b'\n' || u == b'\t' {
                break;
            }
            if u != 0 {
                tmp.insert_ch(u)?; // Skip embedded NUL bytes
            }
            p += 1;
        }

        tmp.start_of_buffer();
        let mut p = self.g;
        while p > 0 {
            let u = self.a[p - 1];
            if u == b' ' || u == b'\n' || u == b'\t' {
                break;
            }
            if u != 0 {
                tmp.insert_ch(u)?;
                tmp.left_ch();
            }
            p -= 1;
        }
        Ok(())
    }

    /// Copy the logical line under the cursor into `tmp`, joining
    /// backslash-newline continuations and removing the backslashes.
    pub fn copy_logical_line(&mut self, tmp: &mut GapBuffer) -> Result<()> {
        // Move to the start of the logical line
        while self.col != 1 || (self.g >= 2 && self.a[self.g - 2] == b'\\') {
            self.left_ch();
        }

        self.m_set = true;
        self.m = self.c;

        // Move to the end of the logical line
        while (self.a[self.c] != b'\n' || (self.g > 0 && self.a[self.g - 1] == b'\\'))
            && self.c != self.e
        {
            self.right_ch();
        }

        self.copy_region(tmp, false)?;

        // Delete the continuation backslashes and combine the lines
        tmp.start_of_buffer();
        while tmp.c != tmp.e {
            match tmp.a[tmp.c] {
                b'\\' => {
                    if tmp.c + 1 == tmp.e || tmp.a[tmp.c + 1] == b'\n' {
                        tmp.delete_ch();
                    } else {
                        tmp.right_ch();
                    }
                }
                b'\n' => {
                    tmp.delete_ch();
                }
                _ => {
                    tmp.right_ch();
                }
            }
        }
        Ok(())
    }

    // ----- search and replace -------------------------------------------

    /// Exact search after the cursor, moving to the start of the match.
    pub fn exact_forward_search(&mut self, needle: &[u8]) -> bool {
        if self.c == self.e {
            return false;
        }
        match quick_search(&self.a[self.c + 1..self.e], needle) {
            Some(off) => {
                let mut num = off + 1;
                while num > 0 {
                    self.right_ch();
                    num -= 1;
                }
                true
            }
            None => false,
        }
    }

    /// Regex search after the cursor, moving past the match.
    pub fn regex_forward_search(&mut self, pattern: &[u8]) -> Result<bool> {
        if self.c == self.e {
            return Ok(false);
        }
        let sol = self.a[self.c] == b'\n';
        match regex::regex_search(&self.a[self.c + 1..self.e], pattern, sol, false) {
            Ok((offset, len)) => {
                let mut num = 1 + offset + len;
                while num > 0 {
                    self.right_ch();
                    num -= 1;
                }
                Ok(true)
            }
            Err(Error::NoMatch) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Regex replace across the region. `cmd` is `DELIM FIND DELIM
    /// REPLACE`. The region is replaced in place and the whole
    /// operation is one undo group.
    pub fn regex_replace_region(&mut self, cmd: &[u8]) -> Result<()> {
        self.start_group();
        let r = self.regex_replace_region_inner(cmd);
        self.end_group();
        r
    }

    fn regex_replace_region_inner(&mut self, cmd: &[u8]) -> Result<()> {
        self.sc_set = false;

        if !self.m_set {
            return Err(Error::usage("no mark set"));
        }
        if cmd.is_empty() {
            return Err(Error::usage("empty search command"));
        }

        let delim = cmd[0];
        let rest = &cmd[1..];
        let sep = rest
            .iter()
            .position(|&ch| ch == delim)
            .ok_or_else(|| Error::usage("missing delimiter"))?;
        let find = &rest[..sep];
        let replace = &rest[sep + 1..];

        // Move the cursor to the start of the region
        if self.c > self.m {
            self.swap_cursor_and_mark();
        }

        let res = regex::regex_replace(&self.a[self.c..self.m], find, replace, false)?;

        // Delete the region, then insert the result
        let count = self.m - self.c;
        for _ in 0..count {
            if !self.delete_ch() {
                return Err(Error::Infra("region delete out of step"));
            }
        }
        self.insert_mem(&res)?;
        Ok(())
    }

    // ----- shell --------------------------------------------------------

    /// Run a shell command, inserting its captured standard output on a
    /// new line. Only printable bytes, tabs and newlines are kept.
    /// Returns the exit status. One undo group.
    pub fn insert_shell_cmd(&mut self, cmd: &str) -> Result<i32> {
        let output = Command::new("sh").arg("-c").arg(cmd).output()?;

        self.start_group();
        self.insert_ch(b'\n')?;
        for &x in &output.stdout {
            if is_print(x) || x == b'\t' || x == b'\n' {
                self.insert_ch(x)?;
            }
        }
        self.end_group();

        output
            .status
            .code()
            .ok_or(Error::Infra("command terminated by signal"))
    }

    /// Execute the logical line under the cursor with stderr folded
    /// into stdout, inserting the output below.
    pub fn shell_line(&mut self, tmp: &mut GapBuffer) -> Result<i32> {
        self.start_group();
        let r = self.shell_line_inner(tmp);
        self.end_group();
        r
    }

    fn shell_line_inner(&mut self, tmp: &mut GapBuffer) -> Result<i32> {
        self.copy_logical_line(tmp)?;
        tmp.end_of_buffer();
        tmp.insert_str(" 2>&1")?;
        tmp.start_of_buffer();

        // An embedded NUL terminates the command early
        let bytes = &tmp.a[tmp.c..tmp.e];
        let end = bytes.iter().position(|&ch| ch == 0).unwrap_or(bytes.len());
        let cmd = String::from_utf8_lossy(&bytes[..end]).into_owned();

        self.insert_shell_cmd(&cmd)
    }

    /// Re-insert a previously copied region. One undo group.
    pub fn paste(&mut self, p: &GapBuffer) -> Result<()> {
        self.start_group();
        for i in 0..p.g {
            self.insert_ch(p.a[i])?;
        }
        // The paste cursor should be at its end, but just in case
        for i in p.c..p.e {
            self.insert_ch(p.a[i])?;
        }
        self.end_group();
        Ok(())
    }

    // ----- persistence --------------------------------------------------

    /// Write the prefix and suffix to the filename, without the
    /// sentinel, creating missing directories.
    pub fn save(&mut self) -> Result<()> {
        self.sc_set = false;

        let path = self
            .filename
            .clone()
            .ok_or_else(|| Error::usage("no filename"))?;
        let mut fp = create_w(&path, false)?;
        fp.write_all(&self.a[..self.g])?;
        fp.write_all(&self.a[self.c..self.e])?;
        self.modified = false;
        Ok(())
    }

    /// Replace the filename and mark the buffer modified.
    pub fn rename(&mut self, path: &Path) {
        self.sc_set = false;
        self.filename = Some(path.to_path_buf());
        self.modified = true;
    }

    #[cfg(test)]
    pub(crate) fn invariants(&self) -> (usize, usize, usize, u8) {
        (self.g, self.c, self.e, self.a[self.e])
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
