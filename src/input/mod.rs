//! Stacked pushback input
//!
//! Input is a stack of named sources. Each source owns an optional
//! reader plus a pushback region stored in reverse order, so un-reading
//! is a push and re-reading is a pop. Pushback logically precedes any
//! bytes still in the reader. When a source's reader is exhausted the
//! source is popped and reading continues from the one beneath it.

use crate::error::Result;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

pub struct Source {
    id: u64,
    name: String,
    reader: Option<Box<dyn Read>>,
    /// Terminates expression evaluation at a newline token.
    interactive: bool,
    /// Pushback bytes, in reverse order.
    pb: Vec<u8>,
    /// Current row number, starting from 1.
    row: usize,
    /// Row increments on the read after a newline, not at the newline.
    incr_row: bool,
}

impl Source {
    fn new(id: u64, name: &str, reader: Option<Box<dyn Read>>, interactive: bool) -> Self {
        Source {
            id,
            name: name.to_string(),
            reader,
            interactive,
            pb: Vec::new(),
            row: 1,
            incr_row: false,
        }
    }
}

#[derive(Default)]
pub struct InputStack {
    /// The current source is the last element.
    sources: Vec<Source>,
    next_id: u64,
}

impl InputStack {
    pub fn new() -> Self {
        InputStack::default()
    }

    /// Build a stack holding one anonymous in-memory source.
    pub fn from_str(s: &str) -> Result<Self> {
        let mut input = InputStack::new();
        input.unget_str(s.as_bytes())?;
        Ok(input)
    }

    fn fresh_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Push a new source on the front; it becomes the current source.
    pub fn unget_source(&mut self, reader: Box<dyn Read>, name: &str) {
        let id = self.fresh_id();
        self.sources.push(Source::new(id, name, Some(reader), false));
    }

    pub fn unget_file(&mut self, path: &Path) -> Result<()> {
        let fp = File::open(path)?;
        self.unget_source(
            Box::new(BufReader::new(fp)),
            &path.to_string_lossy(),
        );
        Ok(())
    }

    /// Add a new source at the tail; it is read after all others.
    pub fn append_source(&mut self, reader: Box<dyn Read>, name: &str, interactive: bool) {
        let id = self.fresh_id();
        self.sources
            .insert(0, Source::new(id, name, Some(reader), interactive));
    }

    pub fn append_file(&mut self, path: &Path) -> Result<()> {
        let fp = File::open(path)?;
        self.append_source(
            Box::new(BufReader::new(fp)),
            &path.to_string_lossy(),
            false,
        );
        Ok(())
    }

    pub fn append_stdin(&mut self) {
        self.append_source(Box::new(std::io::stdin()), "stdin", true);
    }

    /// Name of the current source, for diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        self.sources.last().map_or("", |s| s.name.as_str())
    }

    /// Row number of the current source.
    #[must_use]
    pub fn row(&self) -> usize {
        self.sources.last().map_or(1, |s| s.row)
    }

    /// Identity of the current source. Changes whenever a different
    /// underlying source starts supplying bytes.
    #[must_use]
    pub fn source_id(&self) -> u64 {
        self.sources.last().map_or(0, |s| s.id)
    }

    /// True when the current source reads interactively.
    #[must_use]
    pub fn interactive(&self) -> bool {
        self.sources.last().is_some_and(|s| s.interactive)
    }

    /// Read one byte. `Ok(None)` is the end of all sources.
    pub fn get_ch(&mut self) -> Result<Option<u8>> {
        loop {
            let Some(src) = self.sources.last_mut() else {
                return Ok(None);
            };

            if let Some(ch) = src.pb.pop() {
                return Ok(Some(ch));
            }

            if let Some(reader) = src.reader.as_mut() {
                let mut byte = [0u8; 1];
                loop {
                    match reader.read(&mut byte) {
                        Ok(0) => break,
                        Ok(_) => {
                            if src.incr_row {
                                src.row += 1;
                                src.incr_row = false;
                            }
                            if byte[0] == b'\n' {
                                src.incr_row = true;
                            }
                            return Ok(Some(byte[0]));
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(e) => return Err(e.into()),
                    }
                }
            }

            // Reader exhausted. Pop this source and retry the next, or
            // drop the reader of the final source and report the end.
            if self.sources.len() > 1 {
                self.sources.pop();
            } else {
                self.sources.last_mut().unwrap().reader = None;
                return Ok(None);
            }
        }
    }

    fn current_or_anon(&mut self) -> &mut Source {
        if self.sources.is_empty() {
            let id = self.fresh_id();
            self.sources.push(Source::new(id, "", None, false));
        }
        self.sources.last_mut().unwrap()
    }

    /// Un-read one byte onto the current source.
    pub fn unget_ch(&mut self, ch: u8) -> Result<()> {
        self.current_or_anon().pb.push(ch);
        Ok(())
    }

    /// Un-read a string; it will be re-read left to right.
    pub fn unget_str(&mut self, s: &[u8]) -> Result<()> {
        let src = self.current_or_anon();
        src.pb.extend(s.iter().rev());
        Ok(())
    }

    /// Eat whitespace (and NUL) bytes, leaving the next byte unread.
    pub fn eat_whitespace(&mut self) -> Result<()> {
        while let Some(ch) = self.get_ch()? {
            if !(ch.is_ascii_whitespace() || ch == b'\0') {
                self.unget_ch(ch)?;
                break;
            }
        }
        Ok(())
    }

    /// Delete up to and including the next newline.
    pub fn delete_to_nl(&mut self) -> Result<()> {
        while let Some(ch) = self.get_ch()? {
            if ch == b'\n' {
                break;
            }
        }
        Ok(())
    }

    /// Check for `s` at the start of input and eat it on a match. On a
    /// mismatch or EOF every consumed byte is returned to the pushback
    /// region, leaving the stream unchanged. An empty pattern is a
    /// no-match.
    pub fn eat_str_if_match(&mut self, s: &[u8]) -> Result<bool> {
        if s.is_empty() {
            return Ok(false);
        }
        let mut i = 0;
        while i < s.len() {
            match self.get_ch()? {
                None => break,
                Some(ch) => {
                    if ch != s[i] {
                        self.unget_ch(ch)?;
                        break;
                    }
                }
            }
            i += 1;
        }
        if i == s.len() {
            return Ok(true);
        }
        while i > 0 {
            self.unget_ch(s[i - 1])?;
            i -= 1;
        }
        Ok(false)
    }

    /// Read one token: a decimal number (optionally `0x`/`0X` hex when
    /// `interpret_hex` is set), an identifier, or a single other byte.
    /// `Ok(None)` is the end of all sources.
    pub fn get_word(&mut self, interpret_hex: bool) -> Result<Option<Vec<u8>>> {
        #[derive(PartialEq)]
        enum Kind {
            Num,
            Hex,
            Word,
        }

        let Some(ch) = self.get_ch()? else {
            return Ok(None);
        };
        let mut token = vec![ch];

        let mut kind = if ch.is_ascii_digit() {
            Kind::Num
        } else if ch.is_ascii_alphabetic() || ch == b'_' {
            Kind::Word
        } else {
            return Ok(Some(token)); // Single byte token
        };

        let mut second_ch = true;
        while let Some(ch) = self.get_ch()? {
            if interpret_hex && second_ch && kind == Kind::Num && (ch == b'x' || ch == b'X') {
                kind = Kind::Hex;
            }

            let more = match kind {
                Kind::Num => ch.is_ascii_digit(),
                Kind::Word => ch.is_ascii_alphanumeric() || ch == b'_',
                Kind::Hex => second_ch || ch.is_ascii_hexdigit(),
            };
            if more {
                token.push(ch);
            } else {
                self.unget_ch(ch)?;
                break;
            }
            second_ch = false;
        }

        Ok(Some(token))
    }
}
