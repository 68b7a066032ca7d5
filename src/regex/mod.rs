//! Regular expression engine
//!
//! Four phases: a preprocessing scan producing a character-set bank and
//! a token sequence, shunting-yard conversion to postfix, Thompson
//! construction of an NFA over a flat state arena, and a subset
//! simulation that tracks the longest match. `^` and `$` are not
//! operators; they are transition criteria based on the read status.
//!
//! Search slides the starting position forward for the first match.
//! Replace alternates match and emit with a previous-match-length guard
//! so zero-length matches make progress.

use crate::error::{Error, Result};
use tracing::debug;

/// A packed set of 256 bits, one per byte value.
#[derive(Clone)]
pub struct CharSet([u8; 32]);

impl CharSet {
    fn new() -> Self {
        CharSet([0; 32])
    }

    fn add(&mut self, u: u8) {
        self.0[u as usize / 8] |= 1 << (u % 8);
    }

    fn remove(&mut self, u: u8) {
        self.0[u as usize / 8] &= !(1 << (u % 8));
    }

    fn add_all(&mut self) {
        self.0 = [0xFF; 32];
    }

    fn negate(&mut self) {
        for byte in &mut self.0 {
            *byte = !*byte;
        }
    }

    #[must_use]
    pub fn contains(&self, u: u8) -> bool {
        self.0[u as usize / 8] & (1 << (u % 8)) != 0
    }
}

/// Preprocessed pattern element. Sets and anchors are operands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tok {
    Set(usize),
    Sol,
    Eol,
    Star,
    Plus,
    Quest,
    Concat,
    Alt,
    LParen,
    RParen,
}

impl Tok {
    fn is_operand(self) -> bool {
        matches!(self, Tok::Set(_) | Tok::Sol | Tok::Eol)
    }
}

/// Transition criterion for an NFA branch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Trans {
    /// No link.
    #[default]
    None,
    /// Instantaneous transition, no input read.
    Eps,
    /// Start-of-line read status.
    Sol,
    /// End-of-line read status.
    Eol,
    /// Consume one byte in the identified set.
    Set(usize),
}

/// Node in the NFA. Branch b, when linked, is always an epsilon split.
#[derive(Clone, Copy, Debug, Default)]
struct State {
    t_a: Trans,
    a: usize,
    eps_b: bool,
    b: usize,
}

/// Start and end state of an NFA fragment.
#[derive(Clone, Copy, Default)]
struct Frag {
    start: usize,
    end: usize,
}

/// A compiled pattern.
pub struct Regex {
    sets: Vec<CharSet>,
    states: Vec<State>,
    start: usize,
    end: usize,
    nl_sen: bool,
}

fn escape_literal(p: &[u8], i: &mut usize) -> Result<u8> {
    // *i indexes the byte after the backslash
    let u = *p.get(*i).ok_or_else(|| Error::syntax("trailing backslash"))?;
    *i += 1;
    Ok(match u {
        b't' => b'\t',
        b'n' => b'\n',
        b'r' => b'\r',
        b'0' => b'\0',
        b'x' => {
            let h1 = *p.get(*i).ok_or_else(|| Error::syntax("short hex escape"))?;
            let h0 = *p
                .get(*i + 1)
                .ok_or_else(|| Error::syntax("short hex escape"))?;
            *i += 2;
            crate::num::hex_to_val(h1, h0)?
        }
        other => other,
    })
}

/// Single left-to-right scan: build the character-set bank and the
/// token sequence, inserting explicit concatenation tokens.
fn preprocess(pattern: &[u8], nl_sen: bool) -> Result<(Vec<CharSet>, Vec<Tok>)> {
    let mut sets: Vec<CharSet> = Vec::new();
    let mut toks: Vec<Tok> = Vec::new();
    let mut add_concat = false;
    let mut i = 0;

    let mut operand = |toks: &mut Vec<Tok>, add_concat: &mut bool, t: Tok| {
        if *add_concat {
            toks.push(Tok::Concat);
        }
        toks.push(t);
        *add_concat = true;
    };

    while i < pattern.len() {
        let ch = pattern[i];
        match ch {
            b'\\' => {
                i += 1;
                let u = escape_literal(pattern, &mut i)?;
                let mut cs = CharSet::new();
                cs.add(u);
                sets.push(cs);
                operand(&mut toks, &mut add_concat, Tok::Set(sets.len() - 1));
            }
            b'[' => {
                i += 1;
                let mut cs = CharSet::new();
                let negate = pattern.get(i) == Some(&b'^');
                if negate {
                    i += 1;
                }
                // Any byte is literal in the first position
                let first = *p_at(pattern, i)?;
                cs.add(first);
                i += 1;
                while *p_at(pattern, i)? != b']' {
                    let u = pattern[i];
                    if u == b'-' && pattern.get(i + 1).is_some_and(|&n| n != b']') {
                        // Range; descending ranges add nothing
                        let lo = pattern[i - 1];
                        let hi = *p_at(pattern, i + 1)?;
                        let mut j = lo;
                        while j <= hi {
                            cs.add(j);
                            if j == u8::MAX {
                                break;
                            }
                            j += 1;
                        }
                        i += 1; // Eat the separator
                    } else {
                        cs.add(u);
                    }
                    i += 1;
                }
                i += 1; // Eat the closing bracket
                if negate {
                    cs.negate();
                }
                sets.push(cs);
                operand(&mut toks, &mut add_concat, Tok::Set(sets.len() - 1));
            }
            b'*' | b'+' | b'?' => {
                toks.push(match ch {
                    b'*' => Tok::Star,
                    b'+' => Tok::Plus,
                    _ => Tok::Quest,
                });
                add_concat = true;
                i += 1;
            }
            b'^' => {
                operand(&mut toks, &mut add_concat, Tok::Sol);
                i += 1;
            }
            b'$' => {
                operand(&mut toks, &mut add_concat, Tok::Eol);
                i += 1;
            }
            b'(' => {
                if add_concat {
                    toks.push(Tok::Concat);
                }
                toks.push(Tok::LParen);
                add_concat = false;
                i += 1;
            }
            b')' => {
                toks.push(Tok::RParen);
                add_concat = true;
                i += 1;
            }
            b'|' => {
                toks.push(Tok::Alt);
                add_concat = false;
                i += 1;
            }
            b'.' => {
                let mut cs = CharSet::new();
                cs.add_all();
                if nl_sen {
                    cs.remove(b'\n');
                }
                sets.push(cs);
                operand(&mut toks, &mut add_concat, Tok::Set(sets.len() - 1));
                i += 1;
            }
            other => {
                let mut cs = CharSet::new();
                cs.add(other);
                sets.push(cs);
                operand(&mut toks, &mut add_concat, Tok::Set(sets.len() - 1));
                i += 1;
            }
        }
    }

    Ok((sets, toks))
}

fn p_at(pattern: &[u8], i: usize) -> Result<&u8> {
    pattern
        .get(i)
        .ok_or_else(|| Error::syntax("unclosed character set"))
}

/// Convert the token sequence to postfix.
///
/// Precedence, low to high: alternation, concatenation, the unary
/// postfix operators, parentheses.
fn shunting_yard(toks: &[Tok]) -> Result<Vec<Tok>> {
    let mut out: Vec<Tok> = Vec::with_capacity(toks.len());
    let mut ops: Vec<Tok> = Vec::new();

    for &t in toks {
        if t.is_operand() {
            out.push(t);
            continue;
        }
        match t {
            Tok::LParen => ops.push(t),
            Tok::RParen => loop {
                let h = ops
                    .pop()
                    .ok_or_else(|| Error::syntax("unmatched closing parenthesis"))?;
                if h == Tok::LParen {
                    break;
                }
                out.push(h);
            },
            Tok::Star | Tok::Plus | Tok::Quest => {
                while let Some(&h) = ops.last() {
                    if matches!(h, Tok::LParen | Tok::Concat | Tok::Alt) {
                        break;
                    }
                    out.push(h);
                    ops.pop();
                }
                ops.push(t);
            }
            Tok::Concat => {
                while let Some(&h) = ops.last() {
                    if matches!(h, Tok::LParen | Tok::Alt) {
                        break;
                    }
                    out.push(h);
                    ops.pop();
                }
                ops.push(t);
            }
            Tok::Alt => {
                while let Some(&h) = ops.last() {
                    if h == Tok::LParen {
                        break;
                    }
                    out.push(h);
                    ops.pop();
                }
                ops.push(t);
            }
            _ => unreachable!(),
        }
    }

    while let Some(h) = ops.pop() {
        if h == Tok::LParen {
            return Err(Error::syntax("unmatched opening parenthesis"));
        }
        out.push(h);
    }

    Ok(out)
}

/// Hand out the next state index, reusing the slot released by the
/// most recent concatenation when one is available.
fn alloc_state(states: &mut Vec<State>, reuse: &mut Option<usize>) -> usize {
    if let Some(i) = reuse.take() {
        i
    } else {
        states.push(State::default());
        states.len() - 1
    }
}

/// Thompson's construction over the postfix program.
fn generate_nfa(postfix: &[Tok]) -> Result<(Vec<State>, usize, usize)> {
    let mut states: Vec<State> = Vec::with_capacity(postfix.len() * 2);
    let mut stack: Vec<Frag> = Vec::with_capacity(postfix.len());
    let mut reuse: Option<usize> = None;

    // An empty program matches the empty string at every position
    if postfix.is_empty() {
        states.push(State::default());
        return Ok((states, 0, 0));
    }

    for &t in postfix {
        if t.is_operand() {
            let start = alloc_state(&mut states, &mut reuse);
            let end = alloc_state(&mut states, &mut reuse);
            states[start].t_a = match t {
                Tok::Set(id) => Trans::Set(id),
                Tok::Sol => Trans::Sol,
                Tok::Eol => Trans::Eol,
                _ => unreachable!(),
            };
            states[start].a = end;
            stack.push(Frag { start, end });
            continue;
        }
        match t {
            Tok::Star | Tok::Plus | Tok::Quest => {
                let frag = stack
                    .pop()
                    .ok_or_else(|| Error::syntax("unary operator without operand"))?;

                if t != Tok::Quest {
                    // Loop back
                    states[frag.end].t_a = Trans::Eps;
                    states[frag.end].a = frag.start;
                }

                let new_start = alloc_state(&mut states, &mut reuse);
                let new_end = alloc_state(&mut states, &mut reuse);

                states[new_start].t_a = Trans::Eps;
                states[new_start].a = frag.start;
                if t != Tok::Plus {
                    // Bypass
                    states[new_start].eps_b = true;
                    states[new_start].b = new_end;
                }

                if t == Tok::Quest {
                    states[frag.end].t_a = Trans::Eps;
                    states[frag.end].a = new_end;
                } else {
                    states[frag.end].eps_b = true;
                    states[frag.end].b = new_end;
                }

                stack.push(Frag {
                    start: new_start,
                    end: new_end,
                });
            }
            Tok::Concat => {
                let second = stack
                    .pop()
                    .ok_or_else(|| Error::syntax("concatenation without operand"))?;
                let first = stack
                    .pop()
                    .ok_or_else(|| Error::syntax("concatenation without operand"))?;

                // Merge: copy the second fragment's start onto the
                // first fragment's end, releasing the old start
                states[first.end] = states[second.start];
                states[second.start] = State::default();
                reuse = Some(second.start);

                stack.push(Frag {
                    start: first.start,
                    end: second.end,
                });
            }
            Tok::Alt => {
                let top = stack
                    .pop()
                    .ok_or_else(|| Error::syntax("alternation without operand"))?;
                let bottom = stack
                    .pop()
                    .ok_or_else(|| Error::syntax("alternation without operand"))?;

                let new_start = alloc_state(&mut states, &mut reuse);
                let new_end = alloc_state(&mut states, &mut reuse);

                states[new_start].t_a = Trans::Eps;
                states[new_start].a = top.start;
                states[new_start].eps_b = true;
                states[new_start].b = bottom.start;

                states[top.end].t_a = Trans::Eps;
                states[top.end].a = new_end;
                states[bottom.end].t_a = Trans::Eps;
                states[bottom.end].a = new_end;

                stack.push(Frag {
                    start: new_start,
                    end: new_end,
                });
            }
            _ => return Err(Error::syntax("invalid operator")),
        }
    }

    if stack.len() != 1 {
        return Err(Error::syntax("incomplete pattern"));
    }
    let frag = stack[0];
    Ok((states, frag.start, frag.end))
}

impl Regex {
    /// Compile a pattern. In newline-sensitive mode `.` excludes `\n`
    /// and the simulation stops at line boundaries.
    pub fn compile(pattern: &[u8], nl_sen: bool) -> Result<Regex> {
        let (sets, toks) = preprocess(pattern, nl_sen)?;
        let postfix = shunting_yard(&toks)?;
        let (states, start, end) = generate_nfa(&postfix)?;
        Ok(Regex {
            sets,
            states,
            start,
            end,
            nl_sen,
        })
    }

    /// Log the NFA edges, one per line, for pattern debugging.
    pub fn dump(&self) {
        for (i, s) in self.states.iter().enumerate() {
            match s.t_a {
                Trans::None => {}
                Trans::Eps => debug!("{i} -- e --> {}", s.a),
                Trans::Sol => debug!("{i} -- ^ --> {}", s.a),
                Trans::Eol => debug!("{i} -- $ --> {}", s.a),
                Trans::Set(id) => debug!("{i} -- set {id} --> {}", s.a),
            }
            if s.eps_b {
                debug!("{i} -- e --> {}", s.b);
            }
        }
        debug!("start {} end {}", self.start, self.end);
    }

    /// Run the NFA anchored at the start of `mem`, returning the length
    /// of the longest match. `sol` is the start-of-line read status at
    /// that position.
    fn run(&self, mem: &[u8], sol: bool) -> Option<usize> {
        let n = self.states.len();
        let mut sl = vec![false; n];
        let mut sl_next = vec![false; n];
        sl[self.start] = true;

        let mut p = 0;
        let mut max_match: Option<usize> = None;

        loop {
            let eol = p == mem.len() || (self.nl_sen && mem[p] == b'\n');

            // Epsilon closure: accumulative, no elimination. Iterate
            // until a pass adds nothing new.
            loop {
                sl_next.iter_mut().for_each(|s| *s = false);
                for i in 0..n {
                    if !sl[i] {
                        continue;
                    }
                    sl_next[i] = true;
                    let s = &self.states[i];
                    let fires = match s.t_a {
                        Trans::Eps => true,
                        Trans::Sol => sol,
                        Trans::Eol => eol,
                        _ => false,
                    };
                    if fires {
                        sl_next[s.a] = true;
                        if s.eps_b {
                            sl_next[s.b] = true;
                        }
                    }
                }
                if sl == sl_next {
                    break;
                }
                std::mem::swap(&mut sl, &mut sl_next);
            }

            // Longest match so far
            if sl[self.end] {
                max_match = Some(p);
            }

            if !sl.iter().any(|&s| s) {
                break;
            }
            if p == mem.len() {
                break;
            }
            if self.nl_sen && eol {
                break;
            }

            // Read one byte: states must move or be eliminated
            let u = mem[p];
            p += 1;
            sl_next.iter_mut().for_each(|s| *s = false);
            for i in 0..n {
                if !sl[i] {
                    continue;
                }
                if let Trans::Set(id) = self.states[i].t_a {
                    if self.sets[id].contains(u) {
                        sl_next[self.states[i].a] = true;
                    }
                }
            }
            std::mem::swap(&mut sl, &mut sl_next);
        }

        max_match
    }

    /// Slide the start position forward until the NFA matches,
    /// returning the offset and length of the first match. `sol` is the
    /// start-of-line read status at offset zero.
    pub fn find(&self, mem: &[u8], mut sol: bool) -> Option<(usize, usize)> {
        let mut start = 0;
        loop {
            if start != 0 {
                sol = self.nl_sen && mem[start - 1] == b'\n';
            }
            // Still run on a length of zero
            if let Some(len) = self.run(&mem[start..], sol) {
                return Some((start, len));
            }
            if start == mem.len() {
                return None;
            }
            start += 1;
        }
    }
}

/// Search `mem` for the first match of `pattern`.
pub fn regex_search(
    mem: &[u8],
    pattern: &[u8],
    sol: bool,
    nl_sen: bool,
) -> Result<(usize, usize)> {
    let re = Regex::compile(pattern, nl_sen)?;
    re.find(mem, sol).ok_or(Error::NoMatch)
}

/// Process the replacement escape vocabulary: the same literals as
/// patterns, with no operators.
fn unescape_replacement(replace: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(replace.len());
    let mut i = 0;
    while i < replace.len() {
        let u = replace[i];
        if u == b'\\' {
            i += 1;
            out.push(escape_literal(replace, &mut i)?);
        } else {
            out.push(u);
            i += 1;
        }
    }
    Ok(out)
}

/// Replace every match of `pattern` in `mem` with `replace`.
///
/// A zero-length match emits the replacement only when the previous
/// match also had zero length, and advances by passing one byte
/// through, so the loop always progresses.
pub fn regex_replace(
    mem: &[u8],
    pattern: &[u8],
    replace: &[u8],
    nl_sen: bool,
) -> Result<Vec<u8>> {
    let re = Regex::compile(pattern, nl_sen)?;
    let nr = unescape_replacement(replace)?;

    let mut out = Vec::with_capacity(mem.len());
    let mut m = 0;
    let mut sol = true;
    let mut prev_match_len = 0;

    loop {
        if m != 0 {
            sol = nl_sen && mem[m - 1] == b'\n';
        }
        match re.find(&mem[m..], sol) {
            Some((offset, len)) => {
                out.extend_from_slice(&mem[m..m + offset]);
                if len > 0 || prev_match_len == 0 {
                    out.extend_from_slice(&nr);
                }
                m += offset + len;
                prev_match_len = len;

                if m == mem.len() {
                    break;
                }
                if len == 0 {
                    // Pass the jumped byte through
                    out.push(mem[m]);
                    m += 1;
                }
            }
            None => break,
        }
    }

    out.extend_from_slice(&mem[m..]);
    Ok(out)
}
