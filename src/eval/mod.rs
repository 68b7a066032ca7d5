//! Arithmetic expression evaluation
//!
//! A shunting-yard evaluator over a word-tokenized input stream.
//! Signed 64-bit arithmetic with explicit overflow, divide-by-zero and
//! syntax outcomes. After any user error the rest of the current input
//! line is consumed so the next line starts clean.

use crate::error::{Error, Result};
use crate::input::InputStack;
use crate::num::str_to_num;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    LParen,
    RParen,
    Positive,
    Negative,
    BitNot,
    LogicalNot,
    Pow,
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    LogicalAnd,
    LogicalOr,
}

#[derive(Clone, Copy, PartialEq)]
enum Assoc {
    Left,
    Right,
}

impl Op {
    fn prec(self) -> u8 {
        match self {
            Op::LParen | Op::RParen => 12,
            Op::Positive | Op::Negative | Op::BitNot | Op::LogicalNot => 11,
            Op::Pow => 10,
            Op::Mul | Op::Div | Op::Mod => 9,
            Op::Add | Op::Sub => 8,
            Op::Shl | Op::Shr => 7,
            Op::Lt | Op::Le | Op::Gt | Op::Ge => 6,
            Op::Eq | Op::Ne => 5,
            Op::BitAnd => 4,
            Op::BitXor => 3,
            Op::BitOr => 2,
            Op::LogicalAnd => 1,
            Op::LogicalOr => 0,
        }
    }

    fn assoc(self) -> Assoc {
        match self {
            Op::Positive | Op::Negative | Op::BitNot | Op::LogicalNot | Op::Pow => Assoc::Right,
            _ => Assoc::Left,
        }
    }

    fn arity(self) -> usize {
        match self {
            Op::LParen | Op::RParen => 0,
            Op::Positive | Op::Negative | Op::BitNot | Op::LogicalNot => 1,
            _ => 2,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Op::LParen => "(",
            Op::RParen => ")",
            Op::Positive | Op::Add => "+",
            Op::Negative | Op::Sub => "-",
            Op::BitNot => "~",
            Op::LogicalNot => "!",
            Op::Pow => "**",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Mod => "%",
            Op::Shl => "<<",
            Op::Shr => ">>",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::BitAnd => "&",
            Op::BitXor => "^",
            Op::BitOr => "|",
            Op::LogicalAnd => "&&",
            Op::LogicalOr => "||",
        }
    }
}

/// Symbol table scanned in order; two-character operators precede any
/// one-character operator sharing their first byte. `+` and `-` match
/// their unary forms here and are rebound to the binary forms when the
/// previous token rules out a unary reading.
const OPER: [Op; 23] = [
    Op::LParen,
    Op::RParen,
    Op::Positive,
    Op::Negative,
    Op::BitNot,
    Op::Pow,
    Op::Mul,
    Op::Div,
    Op::Mod,
    Op::Shl,
    Op::Shr,
    Op::Le,
    Op::Lt,
    Op::Ge,
    Op::Gt,
    Op::Eq,
    Op::Ne,
    Op::LogicalNot,
    Op::LogicalAnd,
    Op::BitAnd,
    Op::BitXor,
    Op::LogicalOr,
    Op::BitOr,
];

/// Apply one operation with overflow checking. `b` is ignored for
/// unary operators.
fn apply(op: Op, a: i64, b: i64) -> Result<i64> {
    match op {
        Op::Positive => Ok(a),
        Op::Negative => a.checked_neg().ok_or(Error::UserOverflow),
        Op::BitNot => Ok(!a),
        Op::LogicalNot => Ok((a == 0) as i64),
        Op::Pow => checked_pow(a, b),
        Op::Mul => a.checked_mul(b).ok_or(Error::UserOverflow),
        Op::Div | Op::Mod => {
            if b == 0 {
                return Err(Error::DivideByZero);
            }
            if a == i64::MIN && b == -1 {
                return Err(Error::UserOverflow);
            }
            Ok(if op == Op::Div { a / b } else { a % b })
        }
        Op::Add => a.checked_add(b).ok_or(Error::UserOverflow),
        Op::Sub => a.checked_sub(b).ok_or(Error::UserOverflow),
        Op::Shl => u32::try_from(b)
            .ok()
            .and_then(|s| a.checked_shl(s))
            .ok_or(Error::UserOverflow),
        Op::Shr => u32::try_from(b)
            .ok()
            .and_then(|s| a.checked_shr(s))
            .ok_or(Error::UserOverflow),
        Op::Lt => Ok((a < b) as i64),
        Op::Le => Ok((a <= b) as i64),
        Op::Gt => Ok((a > b) as i64),
        Op::Ge => Ok((a >= b) as i64),
        Op::Eq => Ok((a == b) as i64),
        Op::Ne => Ok((a != b) as i64),
        Op::BitAnd => Ok(a & b),
        Op::BitXor => Ok(a ^ b),
        Op::BitOr => Ok(a | b),
        Op::LogicalAnd => Ok((a != 0 && b != 0) as i64),
        Op::LogicalOr => Ok((a != 0 || b != 0) as i64),
        Op::LParen | Op::RParen => unreachable!("parens are never applied as operators"),
    }
}

/// Exponentiation by repeated checked multiplication. Anything to the
/// power of zero is one; a negative exponent is a syntax error.
fn checked_pow(a: i64, b: i64) -> Result<i64> {
    if b == 0 {
        return Ok(1);
    }
    if a == 0 || b == 1 {
        return Ok(a);
    }
    if b < 0 {
        return Err(Error::syntax("negative exponent"));
    }
    let mut x = a;
    for _ in 1..b {
        x = x.checked_mul(a).ok_or(Error::UserOverflow)?;
    }
    Ok(x)
}

/// Pop operands for `op`, apply it, and push the result.
fn process_operator(x: &mut Vec<i64>, op: Op, trace: &mut String) -> Result<()> {
    if x.len() < op.arity() {
        return Err(Error::syntax("insufficient operands"));
    }

    trace.push_str(op.symbol());
    if op == Op::Positive || op == Op::Negative {
        trace.push_str("ve");
    }
    trace.push(' ');

    if op.arity() == 1 {
        let a = x.pop().unwrap();
        x.push(apply(op, a, 0)?);
    } else {
        let b = x.pop().unwrap();
        let a = x.pop().unwrap();
        x.push(apply(op, a, b)?);
    }
    Ok(())
}

/// Evaluate one expression from the input stream. `Ok(None)` means the
/// input ended before any token was read.
pub fn eval_input(input: &mut InputStack, verbose: bool) -> Result<Option<i64>> {
    let mut last_token_nl = false;
    let r = eval_loop(input, verbose, &mut last_token_nl);
    if r.is_err() && !last_token_nl {
        // Eat the rest of the line so the next one starts clean
        input.delete_to_nl()?;
    }
    r
}

fn eval_loop(
    input: &mut InputStack,
    verbose: bool,
    last_token_nl: &mut bool,
) -> Result<Option<i64>> {
    let mut x: Vec<i64> = Vec::new(); // Operand stack
    let mut y: Vec<Op> = Vec::new(); // Operator stack
    let mut unary = true; // A + or - here would be unary
    let mut last_num = false;
    let mut first_read = true;
    let mut trace = String::new();

    loop {
        let token = input.get_word(true)?;
        if token.is_none() && first_read {
            return Ok(None);
        }
        first_read = false;

        let ends = match &token {
            None => true,
            Some(t) => {
                *last_token_nl = t.as_slice() == b"\n";
                input.interactive() && *last_token_nl
            }
        };
        if ends {
            while let Some(h) = y.pop() {
                if h == Op::LParen {
                    return Err(Error::syntax("open bracket not closed"));
                }
                process_operator(&mut x, h, &mut trace)?;
            }
            break;
        }

        let token = token.unwrap();
        let t = token[0];

        if t.is_ascii_digit() {
            let num = str_to_num(&token, i64::MAX as u64)? as i64;
            if verbose {
                trace.push_str(&format!("{num} "));
            }
            x.push(num);
            if last_num {
                return Err(Error::syntax("two consecutive numbers"));
            }
            unary = false;
            last_num = true;
        } else if t.is_ascii_graphic() {
            // Operators may be two characters long, so peek one token
            let next_token = input.get_word(true)?;
            let nt = next_token.as_ref().map_or(0, |nt| nt[0]);

            let mut found = None;
            for &cand in &OPER {
                let sym = cand.symbol().as_bytes();
                if sym[0] == t && (sym.len() == 1 || sym[1] == nt) {
                    found = Some((cand, sym.len()));
                    break;
                }
            }
            let Some((mut op, sym_len)) = found else {
                return Err(Error::syntax("invalid operator"));
            };

            // Return the lookahead if the operator was one character
            if sym_len == 1 {
                if let Some(next_token) = &next_token {
                    input.unget_str(next_token)?;
                }
            }

            // Distinguish unary and binary + and -
            if !unary {
                if op == Op::Positive {
                    op = Op::Add;
                } else if op == Op::Negative {
                    op = Op::Sub;
                }
            }

            match op {
                Op::LParen => {
                    y.push(op);
                    unary = true;
                    last_num = false;
                }
                Op::RParen => {
                    loop {
                        let Some(h) = y.pop() else {
                            return Err(Error::syntax("open bracket not found"));
                        };
                        if h == Op::LParen {
                            break;
                        }
                        process_operator(&mut x, h, &mut trace)?;
                    }
                    unary = false;
                    last_num = false;
                }
                _ => {
                    while let Some(&h) = y.last() {
                        if h == Op::LParen
                            || (op.assoc() == Assoc::Left && h.prec() < op.prec())
                            || (op.assoc() == Assoc::Right && h.prec() <= op.prec())
                        {
                            break;
                        }
                        process_operator(&mut x, h, &mut trace)?;
                        y.pop();
                    }
                    y.push(op);
                    unary = true;
                    last_num = false;
                }
            }
        }
        // Non-graphic bytes are eaten
    }

    if verbose {
        debug!("postfix: {}", trace.trim_end());
    }

    match x.len() {
        0 => Ok(Some(0)),
        1 => Ok(Some(x[0])),
        _ => Err(Error::syntax("multiple numbers left on the stack")),
    }
}

/// Evaluate an expression held in a string.
pub fn eval_str(expr: &str, verbose: bool) -> Result<i64> {
    let mut input = InputStack::from_str(expr)?;
    match eval_input(&mut input, verbose)? {
        Some(v) => Ok(v),
        None => Err(Error::usage("empty expression")),
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
