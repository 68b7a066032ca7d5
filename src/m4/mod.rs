//! m4-style macro processor
//!
//! A single stacked input feeds a tokenizer driven by the current
//! quote and comment strings. Known identifiers push a call frame and
//! collect arguments into a shared store; expansion pushes the result
//! back onto the input so it is re-tokenized and may invoke further
//! macros. Output accumulates in diversions; diversion 0 drains to the
//! external sink whenever it ends in a newline.

use crate::constants::m4::{
    DEFAULT_LEFT_COMMENT, DEFAULT_LEFT_QUOTE, DEFAULT_RIGHT_COMMENT, DEFAULT_RIGHT_QUOTE,
    DIV_NEG_1, NUM_ARGS, NUM_BUCKETS, NUM_DIVS,
};
use crate::error::{Error, Result};
use crate::input::InputStack;
use crate::outbuf::OutBuf;
use crate::symtab::SymTab;
use std::io::Write;
use tracing::warn;

mod builtins;
pub use builtins::Builtin;

/// A macro definition: user text or a built-in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Binding {
    Text(Vec<u8>),
    Builtin(Builtin),
}

/// An open macro call. `m_i` indexes the string-start array at the
/// call's definition slot; the slots that follow are the macro name
/// and the collected arguments.
#[derive(Clone, Copy)]
struct Frame {
    builtin: Option<Builtin>,
    m_i: usize,
    bracket_depth: usize,
}

/// Outcome of one driver step.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    Continue,
    Eof,
    Exit(i32),
}

pub struct MacroProcessor {
    req_exit_val: Option<i32>,
    macros: SymTab<Binding>,
    trace_tab: SymTab<()>,
    pub input: InputStack,
    /// Definition, name and argument strings of all open calls,
    /// NUL-terminated, located by `str_start`.
    store: OutBuf,
    str_start: Vec<usize>,
    stack: Vec<Frame>,
    /// A built-in passed back by `defn`, consumed by an enclosing
    /// `define` or `pushdef`.
    pending_builtin: Option<Builtin>,
    wrap: OutBuf,
    divs: [OutBuf; NUM_DIVS],
    active_div: usize,
    /// `None` disables comment processing.
    left_comment: Option<Vec<u8>>,
    right_comment: Option<Vec<u8>>,
    comment_on: bool,
    left_quote: Vec<u8>,
    right_quote: Vec<u8>,
    quote_depth: usize,
    /// Emit a bare built-in's name verbatim instead of re-reading it.
    pass_through: bool,
    /// Source identity at the last `#line` emission.
    sticky_src: u64,
    line_direct: bool,
    tty_output: bool,
    sys_val: i32,
    error_exit: bool,
    warn_to_error: bool,
    trace_on: bool,
    /// Exit code of the first surviving user error.
    saved_err: Option<i32>,
    sink: Box<dyn Write>,
}

impl MacroProcessor {
    pub fn new(sink: Box<dyn Write>) -> Self {
        let mut macros = SymTab::new(NUM_BUCKETS);
        for &b in Builtin::ALL {
            macros.upsert(b.name(), Binding::Builtin(b), false);
        }
        MacroProcessor {
            req_exit_val: None,
            macros,
            trace_tab: SymTab::new(NUM_BUCKETS),
            input: InputStack::new(),
            store: OutBuf::new(),
            str_start: Vec::new(),
            stack: Vec::new(),
            pending_builtin: None,
            wrap: OutBuf::new(),
            divs: Default::default(),
            active_div: 0,
            left_comment: Some(DEFAULT_LEFT_COMMENT.into()),
            right_comment: Some(DEFAULT_RIGHT_COMMENT.into()),
            comment_on: false,
            left_quote: DEFAULT_LEFT_QUOTE.into(),
            right_quote: DEFAULT_RIGHT_QUOTE.into(),
            quote_depth: 0,
            pass_through: false,
            sticky_src: 0,
            line_direct: false,
            tty_output: false,
            sys_val: 0,
            error_exit: false,
            warn_to_error: false,
            trace_on: false,
            saved_err: None,
            sink,
        }
    }

    pub fn set_line_directives(&mut self, on: bool) {
        self.line_direct = on;
    }

    pub fn set_tty_output(&mut self, on: bool) {
        self.tty_output = on;
    }

    /// Exit code of the first user error that processing survived.
    #[must_use]
    pub fn saved_err(&self) -> Option<i32> {
        self.saved_err
    }

    // ----- store access -------------------------------------------------

    /// The string at string-start slot `i`, up to its NUL terminator.
    fn slot(&self, i: usize) -> &[u8] {
        let start = self.str_start[i];
        let bytes = &self.store.as_bytes()[start..];
        let end = bytes.iter().position(|&ch| ch == 0).unwrap_or(bytes.len());
        &bytes[..end]
    }

    fn frame(&self) -> &Frame {
        self.stack.last().expect("no open macro call")
    }

    /// Arguments collected for the current call.
    fn num_args(&self) -> usize {
        self.str_start.len() - (self.frame().m_i + 2)
    }

    /// Argument `n` of the current call; `arg(0)` is the macro name.
    /// An uncollected number yields the empty string.
    fn arg(&self, n: usize) -> &[u8] {
        if n > self.num_args() {
            return b"";
        }
        self.slot(self.frame().m_i + 1 + n)
    }

    fn arg_str(&self, n: usize) -> String {
        String::from_utf8_lossy(self.arg(n)).into_owned()
    }

    /// The definition text of the current call.
    fn def(&self) -> &[u8] {
        self.slot(self.frame().m_i)
    }

    /// The routing of produced text: the store during argument
    /// collection, otherwise the active diversion.
    fn output(&mut self) -> &mut OutBuf {
        if self.stack.is_empty() {
            &mut self.divs[self.active_div]
        } else {
            &mut self.store
        }
    }

    // ----- diagnostics --------------------------------------------------

    fn warn_loc(&self, class: &str, msg: &str) {
        let macro_name = if self.stack.is_empty() {
            String::new()
        } else {
            format!("{}: ", self.arg_str(0))
        };
        eprintln!(
            "{}:{}: {}{} warning: {}",
            self.input.name(),
            self.input.row(),
            macro_name,
            class,
            msg
        );
        warn!("{class} warning: {msg}");
    }

    /// A usage warning, promoted to an error under `warnerr`.
    fn warn_usage(&mut self, msg: &str) -> Result<()> {
        self.warn_loc("usage", msg);
        if self.warn_to_error {
            return Err(Error::usage(msg));
        }
        Ok(())
    }

    /// A syntax warning, promoted to an error under `warnerr`.
    fn warn_syntax(&mut self, msg: &str) -> Result<()> {
        self.warn_loc("syntax", msg);
        if self.warn_to_error {
            return Err(Error::syntax(msg));
        }
        Ok(())
    }

    /// Describe the open call stack on stderr, innermost first.
    pub fn dump_stack(&self) {
        eprintln!("Left quote: {}", String::from_utf8_lossy(&self.left_quote));
        eprintln!(
            "Right quote: {}",
            String::from_utf8_lossy(&self.right_quote)
        );
        eprintln!("Stack dump:");
        let mut i = self.str_start.len();
        for frame in self.stack.iter().rev() {
            let num_args = i - (frame.m_i + 2);
            eprintln!(
                "{} macro:",
                if frame.builtin.is_none() {
                    "User-defined"
                } else {
                    "Built-in"
                }
            );
            eprintln!("Bracket depth: {}", frame.bracket_depth);
            eprintln!("Def: {}", String::from_utf8_lossy(self.slot(frame.m_i)));
            eprintln!(
                "Macro: {}",
                String::from_utf8_lossy(self.slot(frame.m_i + 1))
            );
            for j in 1..=num_args {
                eprintln!(
                    "Arg {}: {}",
                    j,
                    String::from_utf8_lossy(self.slot(frame.m_i + 1 + j))
                );
            }
            i = frame.m_i;
        }
    }

    // ----- definitions --------------------------------------------------

    fn validate_macro_name(name: &str) -> Result<()> {
        let bytes = name.as_bytes();
        let ok = match bytes.first() {
            Some(&ch) => {
                (ch.is_ascii_alphabetic() || ch == b'_')
                    && bytes[1..]
                        .iter()
                        .all(|&ch| ch.is_ascii_alphanumeric() || ch == b'_')
            }
            None => false,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::syntax(format!("invalid macro name: {name}")))
        }
    }

    /// True when the definition references `$n` with a gap below it.
    fn def_has_gaps(def: &[u8]) -> bool {
        let mut present = [false; NUM_ARGS];
        present[0] = true; // The macro name is always present
        let mut i = 0;
        while i < def.len() {
            if def[i] == b'$' && i + 1 < def.len() && def[i + 1].is_ascii_digit() {
                present[(def[i + 1] - b'0') as usize] = true;
                i += 1;
            }
            i += 1;
        }
        for i in 1..NUM_ARGS {
            if present[i] && !present[i - 1] {
                return true;
            }
        }
        false
    }

    /// Define a user macro, or bind a built-in passed back by `defn`.
    pub fn add_macro(&mut self, name: &str, def: &[u8], push_hist: bool) -> Result<()> {
        Self::validate_macro_name(name)?;

        if def.is_empty() && self.pending_builtin.is_some() {
            let b = self.pending_builtin.take().unwrap();
            self.macros.upsert(name, Binding::Builtin(b), push_hist);
        } else {
            if Self::def_has_gaps(def) {
                self.warn_syntax("macro definition has gaps in argument references")?;
            }
            self.macros.upsert(name, Binding::Text(def.to_vec()), push_hist);
        }
        Ok(())
    }

    /// Remove a definition, warning when the name is unknown.
    pub fn undefine(&mut self, name: &str) -> Result<()> {
        if !self.macros.delete(name, false) {
            self.warn_usage(&format!("macro does not exist: {name}"))?;
        }
        Ok(())
    }

    // ----- expansion ----------------------------------------------------

    /// Substitute `$0`..`$9`, `$#`, `$*` and `$@` in the definition of
    /// the finished call, and push the result back onto the input.
    /// A `$` followed by a second digit is a reference plus a literal
    /// digit; arguments past the ninth are only reachable through
    /// `$*`, `$@` and `shift`.
    fn sub_args(&mut self) -> Result<()> {
        let def = self.def().to_vec();
        let n_args = self.num_args();
        let mut accessed = [false; NUM_ARGS];
        let mut all_args_accessed = false;
        let mut tmp: Vec<u8> = Vec::with_capacity(def.len());

        let mut i = 0;
        while i < def.len() {
            let ch = def[i];
            if ch != b'$' || i + 1 == def.len() {
                tmp.push(ch);
                i += 1;
                continue;
            }
            let next_ch = def[i + 1];
            if next_ch.is_ascii_digit() {
                let x = (next_ch - b'0') as usize;
                accessed[x] = true;
                if x > n_args {
                    self.warn_usage(&format!("uncollected argument number {x} accessed"))?;
                } else {
                    tmp.extend_from_slice(self.arg(x));
                }
                i += 2;
            } else if next_ch == b'#' {
                tmp.extend_from_slice(n_args.to_string().as_bytes());
                i += 2;
            } else if next_ch == b'*' || next_ch == b'@' {
                all_args_accessed = true;
                for j in 1..=n_args {
                    if next_ch == b'@' {
                        tmp.extend_from_slice(&self.left_quote.clone());
                    }
                    tmp.extend_from_slice(self.arg(j));
                    if next_ch == b'@' {
                        tmp.extend_from_slice(&self.right_quote.clone());
                    }
                    if j != n_args {
                        tmp.push(b',');
                    }
                }
                i += 2;
            } else {
                tmp.push(ch);
                i += 1;
            }
        }

        if !all_args_accessed {
            for j in 1..=n_args {
                if j >= NUM_ARGS || !accessed[j] {
                    self.warn_usage(&format!("collected argument number {j} not accessed"))?;
                }
            }
        }

        self.input.unget_str(&tmp)
    }

    /// Finish the current call: run the built-in or substitute the
    /// user definition, release the call's store slots, and pop the
    /// frame. Output reverts to the enclosing collection, if any.
    fn end_macro(&mut self) -> Result<()> {
        let frame = *self.frame();

        let r = match frame.builtin {
            Some(b) => {
                let r = b.run(self);
                if let Err(ref e) = r {
                    eprintln!(
                        "{}:{}: {}: failed: {}",
                        self.input.name(),
                        self.input.row(),
                        self.arg_str(0),
                        e
                    );
                }
                r
            }
            None => self.sub_args(),
        };

        let name = self.arg(0).to_vec();

        // Release this call's slots
        let store_mark = self.str_start[frame.m_i];
        self.str_start.truncate(frame.m_i);
        self.store.truncate(store_mark);

        // Popping redirects output to the enclosing call, if any
        self.stack.pop();

        if self.pass_through {
            self.output().put_mem(&name)?;
            self.pass_through = false;
        }

        r
    }

    // ----- line directives ----------------------------------------------

    /// Emit `#line <row> "<name>"` when the underlying source changed,
    /// and only at the start of an output line. Diversion 0 is flushed
    /// only on newline, so an empty buffer marks the line start.
    fn line_directive(&mut self) -> Result<()> {
        if !self.line_direct {
            return Ok(());
        }
        let src = self.input.source_id();
        let at_sol = {
            let out = self.output();
            out.is_empty() || out.last() == Some(b'\n')
        };
        if at_sol && self.sticky_src != src {
            let text = format!("#line {} \"{}\"\n", self.input.row(), self.input.name());
            self.output().put_str(&text)?;
            self.sticky_src = src;
        }
        Ok(())
    }

    // ----- driver -------------------------------------------------------

    /// Handle the result of a finished macro call: fatal errors and
    /// `errexit` propagate; other user errors are remembered and
    /// survived.
    fn survive(&mut self, r: Result<()>) -> Result<()> {
        match r {
            Ok(()) => Ok(()),
            Err(e) => {
                if !e.is_user() || self.error_exit {
                    return Err(e);
                }
                self.saved_err = Some(e.exit_code());
                Ok(())
            }
        }
    }

    /// One iteration of the driver loop.
    pub fn step(&mut self) -> Result<Step> {
        if let Some(v) = self.req_exit_val {
            return Ok(Step::Exit(v));
        }

        // Flush on newline only, so that an empty buffer represents
        // the start of an output line
        if self.divs[0].last() == Some(b'\n') {
            let tty = self.tty_output;
            let MacroProcessor { divs, sink, .. } = self;
            divs[0].flush_to(sink.as_mut(), tty)?;
        }

        self.divs[DIV_NEG_1].clear();

        // Comments are recognised only outside quotes
        if self.quote_depth == 0 {
            if let (Some(lc), Some(rc)) = (self.left_comment.clone(), self.right_comment.clone()) {
                if !self.comment_on {
                    let r = self.input.eat_str_if_match(&lc)?;
                    self.line_directive()?;
                    if r {
                        self.output().put_mem(&lc)?;
                        self.comment_on = true;
                        // A right comment may follow immediately
                        return Ok(Step::Continue);
                    }
                } else {
                    let r = self.input.eat_str_if_match(&rc)?;
                    self.line_directive()?;
                    if r {
                        self.output().put_mem(&rc)?;
                        self.comment_on = false;
                        return Ok(Step::Continue);
                    }
                }
            }
        }

        // Quotes are suspended inside an open comment. During argument
        // collection the delimiters are kept in the store, so quoting
        // inside a collected definition still defers expansion when
        // the definition is re-read later; stripping of the outer
        // level happens only when text reaches a diversion.
        if !self.comment_on {
            let collecting = !self.stack.is_empty();

            let lq = self.left_quote.clone();
            let r = self.input.eat_str_if_match(&lq)?;
            self.line_directive()?;
            if r {
                if self.quote_depth > 0 || collecting {
                    self.output().put_mem(&lq)?;
                }
                self.quote_depth += 1;
                // There may be several quotes in a row
                return Ok(Step::Continue);
            }

            let rq = self.right_quote.clone();
            let r = self.input.eat_str_if_match(&rq)?;
            self.line_directive()?;
            if r {
                if self.quote_depth != 1 || collecting {
                    self.output().put_mem(&rq)?;
                }
                self.quote_depth = self.quote_depth.saturating_sub(1);
                return Ok(Step::Continue);
            }
        }

        // Not a delimiter, so read a token
        let Some(token) = self.input.get_word(false)? else {
            if !self.wrap.is_empty() {
                let w = std::mem::take(&mut self.wrap).into_bytes();
                self.input.unget_str(&w)?;
                return Ok(Step::Continue);
            }
            return Ok(Step::Eof);
        };

        self.line_directive()?;

        let depth1 = self
            .stack
            .last()
            .is_some_and(|frame| frame.bracket_depth == 1);

        if self.comment_on || self.quote_depth > 0 {
            // In a comment, or quoted, so pass through
            self.output().put_mem(&token)?;
        } else if depth1 && token == b"," {
            // Argument separator
            self.output().put_ch(0)?;
            self.str_start.push(self.store.len());
            self.input.eat_whitespace()?;
        } else if depth1 && token == b")" {
            // End of argument collection
            self.output().put_ch(0)?;
            let r = self.end_macro();
            self.survive(r)?;
        } else if !self.stack.is_empty() && token == b"(" {
            // Nested unquoted open bracket
            self.output().put_mem(&token)?;
            self.stack.last_mut().unwrap().bracket_depth += 1;
        } else if !self.stack.is_empty() && token == b")" {
            // Nested unquoted close bracket
            self.output().put_mem(&token)?;
            self.stack.last_mut().unwrap().bracket_depth -= 1;
        } else {
            self.dispatch_token(&token)?;
        }

        Ok(Step::Continue)
    }

    /// Pass a plain token through, or begin a macro invocation.
    fn dispatch_token(&mut self, token: &[u8]) -> Result<()> {
        let binding = if token[0].is_ascii_alphabetic() || token[0] == b'_' {
            let name = String::from_utf8_lossy(token);
            self.macros.lookup(&name).cloned()
        } else {
            None
        };

        let Some(binding) = binding else {
            // Not a macro, pass through
            self.output().put_mem(token)?;
            return Ok(());
        };

        self.stack.push(Frame {
            builtin: match binding {
                Binding::Builtin(b) => Some(b),
                Binding::Text(_) => None,
            },
            m_i: self.str_start.len(),
            bracket_depth: 1,
        });

        self.str_start.push(self.store.len());
        if let Binding::Text(def) = &binding {
            self.store.put_mem(def)?;
        }
        self.store.put_ch(0)?;

        self.str_start.push(self.store.len());
        self.store.put_mem(token)?;
        self.store.put_ch(0)?;

        if self.trace_on {
            let name = String::from_utf8_lossy(token).into_owned();
            if self.trace_tab.contains(&name) {
                eprintln!(
                    "Trace: {}:{}: {}: Stack depth: {}",
                    self.input.name(),
                    self.input.row(),
                    name,
                    self.stack.len()
                );
            }
        }

        // See whether the macro is called with or without brackets
        if self.input.eat_str_if_match(b"(")? {
            self.str_start.push(self.store.len());
            // Ready to collect argument 1
            self.input.eat_whitespace()?;
        } else {
            // Called without arguments
            let r = self.end_macro();
            self.survive(r)?;
        }
        Ok(())
    }

    /// Drive the processor until the input is exhausted, a built-in
    /// requests an exit value, or a fatal error occurs. All held
    /// diversions flush in order on termination.
    pub fn run(&mut self) -> Result<i32> {
        let req = loop {
            match self.step()? {
                Step::Continue => {}
                Step::Eof => break None,
                Step::Exit(v) => break Some(v),
            }
        };

        if req.is_none() {
            if !self.stack.is_empty() {
                eprintln!("m4: stack not completed");
                self.saved_err = Some(1);
            }
            if self.quote_depth != 0 {
                eprintln!("m4: quotes not balanced");
                self.saved_err = Some(1);
            }

            // Automatically undivert all diversions
            let tty = self.tty_output;
            let MacroProcessor { divs, sink, .. } = self;
            for div in divs.iter_mut().take(NUM_DIVS - 1) {
                div.flush_to(sink.as_mut(), tty)?;
            }
        }

        // A requested exit value of zero is overwritten by an error
        match req {
            Some(v) if v != 0 => Ok(v),
            _ => Ok(self.saved_err.unwrap_or(0)),
        }
    }
}
