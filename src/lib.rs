//! quill - byte-oriented text-processing tools sharing a utility core

pub mod constants;
pub mod error;
pub mod eval;
pub mod gapbuf;
pub mod input;
pub mod m4;
pub mod num;
pub mod outbuf;
pub mod regex;
pub mod search;
pub mod symtab;
