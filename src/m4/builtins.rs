//! Built-in macro catalogue
//!
//! Each built-in carries a name, a parameter description and argument
//! bounds; dispatch is by enum. Results that re-enter the input are
//! pushed back onto the stream so they are re-tokenized like any other
//! expansion.

use super::{Binding, MacroProcessor};
use crate::constants::m4::{DIV_NEG_1, NUM_DIVS};
use crate::error::{Error, Result};
use crate::num::{str_to_u32, str_to_usize};
use crate::regex::{regex_replace, Regex};
use crate::search::quick_search;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    Define,
    Pushdef,
    Undefine,
    Popdef,
    Changecom,
    Changequote,
    Shift,
    Divert,
    Undivert,
    Writediv,
    Divnum,
    Maketemp,
    Mkstemp,
    Include,
    Sinclude,
    Dnl,
    Tnl,
    Regexrep,
    Lsdir,
    Ifdef,
    Ifelse,
    Defn,
    Dumpdef,
    M4wrap,
    Errprint,
    Len,
    Substr,
    Index,
    Translit,
    Incr,
    Decr,
    Eval,
    Syscmd,
    Esyscmd,
    Sysval,
    M4exit,
    Errok,
    Errexit,
    Warnerr,
    Warnok,
    Traceon,
    Traceoff,
    Recrm,
}

impl Builtin {
    pub const ALL: &'static [Builtin] = &[
        Builtin::Define,
        Builtin::Pushdef,
        Builtin::Undefine,
        Builtin::Popdef,
        Builtin::Changecom,
        Builtin::Changequote,
        Builtin::Shift,
        Builtin::Divert,
        Builtin::Undivert,
        Builtin::Writediv,
        Builtin::Divnum,
        Builtin::Maketemp,
        Builtin::Mkstemp,
        Builtin::Include,
        Builtin::Sinclude,
        Builtin::Dnl,
        Builtin::Tnl,
        Builtin::Regexrep,
        Builtin::Lsdir,
        Builtin::Ifdef,
        Builtin::Ifelse,
        Builtin::Defn,
        Builtin::Dumpdef,
        Builtin::M4wrap,
        Builtin::Errprint,
        Builtin::Len,
        Builtin::Substr,
        Builtin::Index,
        Builtin::Translit,
        Builtin::Incr,
        Builtin::Decr,
        Builtin::Eval,
        Builtin::Syscmd,
        Builtin::Esyscmd,
        Builtin::Sysval,
        Builtin::M4exit,
        Builtin::Errok,
        Builtin::Errexit,
        Builtin::Warnerr,
        Builtin::Warnok,
        Builtin::Traceon,
        Builtin::Traceoff,
        Builtin::Recrm,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Define => "define",
            Builtin::Pushdef => "pushdef",
            Builtin::Undefine => "undefine",
            Builtin::Popdef => "popdef",
            Builtin::Changecom => "changecom",
            Builtin::Changequote => "changequote",
            Builtin::Shift => "shift",
            Builtin::Divert => "divert",
            Builtin::Undivert => "undivert",
            Builtin::Writediv => "writediv",
            Builtin::Divnum => "divnum",
            Builtin::Maketemp => "maketemp",
            Builtin::Mkstemp => "mkstemp",
            Builtin::Include => "include",
            Builtin::Sinclude => "sinclude",
            Builtin::Dnl => "dnl",
            Builtin::Tnl => "tnl",
            Builtin::Regexrep => "regexrep",
            Builtin::Lsdir => "lsdir",
            Builtin::Ifdef => "ifdef",
            Builtin::Ifelse => "ifelse",
            Builtin::Defn => "defn",
            Builtin::Dumpdef => "dumpdef",
            Builtin::M4wrap => "m4wrap",
            Builtin::Errprint => "errprint",
            Builtin::Len => "len",
            Builtin::Substr => "substr",
            Builtin::Index => "index",
            Builtin::Translit => "translit",
            Builtin::Incr => "incr",
            Builtin::Decr => "decr",
            Builtin::Eval => "eval",
            Builtin::Syscmd => "syscmd",
            Builtin::Esyscmd => "esyscmd",
            Builtin::Sysval => "sysval",
            Builtin::M4exit => "m4exit",
            Builtin::Errok => "errok",
            Builtin::Errexit => "errexit",
            Builtin::Warnerr => "warnerr",
            Builtin::Warnok => "warnok",
            Builtin::Traceon => "traceon",
            Builtin::Traceoff => "traceoff",
            Builtin::Recrm => "recrm",
        }
    }

    #[must_use]
    pub fn par_desc(self) -> &'static str {
        match self {
            Builtin::Define | Builtin::Pushdef => "(macro_name, macro_def)",
            Builtin::Undefine | Builtin::Popdef | Builtin::Defn => "(macro_name)",
            Builtin::Changecom => "[(left_comment[, right_comment])]",
            Builtin::Changequote => "[(left_quote, right_quote)]",
            Builtin::Shift => "(arg1[, ... ])",
            Builtin::Divert => "[(div_num)]",
            Builtin::Undivert => "[(div_num_or_filename)]",
            Builtin::Writediv => "(div_num, filename[, append])",
            Builtin::Divnum | Builtin::Sysval => "",
            Builtin::Maketemp | Builtin::Mkstemp => "(templateXXXXXX)",
            Builtin::Include | Builtin::Sinclude => "(filename)",
            Builtin::Dnl => "",
            Builtin::Tnl => "(str)",
            Builtin::Regexrep => "(text, regex_find, replace[, newline_insensitive, verbose])",
            Builtin::Lsdir => "[(dir_name)]",
            Builtin::Ifdef => "(macro_name, when_defined[, when_undefined])",
            Builtin::Ifelse => "(switch, case_a, when_a[, case_b, when_b, ... ][, default])",
            Builtin::Dumpdef | Builtin::Traceon | Builtin::Traceoff => "[(macro_name[, ... ])]",
            Builtin::M4wrap => "(code_to_include_at_end)",
            Builtin::Errprint => "(error_message)",
            Builtin::Len => "(str)",
            Builtin::Substr => "(str, start_index[, size])",
            Builtin::Index => "(big_str, small_str)",
            Builtin::Translit => "(str, from_chars, to_chars)",
            Builtin::Incr | Builtin::Decr => "(number)",
            Builtin::Eval => "(arithmetic_expression[, base, pad, verbose])",
            Builtin::Syscmd | Builtin::Esyscmd => "(shell_command)",
            Builtin::M4exit => "[(exit_value)]",
            Builtin::Errok | Builtin::Errexit | Builtin::Warnerr | Builtin::Warnok => "",
            Builtin::Recrm => "(file_path)",
        }
    }

    pub(super) fn run(self, m4: &mut MacroProcessor) -> Result<()> {
        match self {
            Builtin::Define => bi_define(m4, false),
            Builtin::Pushdef => bi_define(m4, true),
            Builtin::Undefine => bi_undefine(m4, false),
            Builtin::Popdef => bi_undefine(m4, true),
            Builtin::Changecom => bi_changecom(m4),
            Builtin::Changequote => bi_changequote(m4),
            Builtin::Shift => bi_shift(m4),
            Builtin::Divert => bi_divert(m4),
            Builtin::Undivert => bi_undivert(m4),
            Builtin::Writediv => bi_writediv(m4),
            Builtin::Divnum => bi_divnum(m4),
            Builtin::Maketemp => bi_maketemp(m4),
            Builtin::Mkstemp => bi_mkstemp(m4),
            Builtin::Include => bi_include(m4),
            Builtin::Sinclude => bi_sinclude(m4),
            Builtin::Dnl => bi_dnl(m4),
            Builtin::Tnl => bi_tnl(m4),
            Builtin::Regexrep => bi_regexrep(m4),
            Builtin::Lsdir => bi_lsdir(m4),
            Builtin::Ifdef => bi_ifdef(m4),
            Builtin::Ifelse => bi_ifelse(m4),
            Builtin::Defn => bi_defn(m4),
            Builtin::Dumpdef => bi_dumpdef(m4),
            Builtin::M4wrap => bi_m4wrap(m4),
            Builtin::Errprint => bi_errprint(m4),
            Builtin::Len => bi_len(m4),
            Builtin::Substr => bi_substr(m4),
            Builtin::Index => bi_index(m4),
            Builtin::Translit => bi_translit(m4),
            Builtin::Incr => bi_incr_decr(m4, true),
            Builtin::Decr => bi_incr_decr(m4, false),
            Builtin::Eval => bi_eval(m4),
            Builtin::Syscmd => bi_syscmd(m4),
            Builtin::Esyscmd => bi_esyscmd(m4),
            Builtin::Sysval => bi_sysval(m4),
            Builtin::M4exit => bi_m4exit(m4),
            Builtin::Errok => {
                m4.max_pars(self, 0)?;
                m4.error_exit = false;
                Ok(())
            }
            Builtin::Errexit => {
                m4.max_pars(self, 0)?;
                m4.error_exit = true;
                Ok(())
            }
            Builtin::Warnerr => {
                m4.max_pars(self, 0)?;
                m4.warn_to_error = true;
                Ok(())
            }
            Builtin::Warnok => {
                m4.max_pars(self, 0)?;
                m4.warn_to_error = false;
                Ok(())
            }
            Builtin::Traceon => bi_traceon(m4),
            Builtin::Traceoff => bi_traceoff(m4),
            Builtin::Recrm => bi_recrm(m4),
        }
    }
}

impl MacroProcessor {
    /// A bare invocation of this built-in emits its name verbatim,
    /// avoiding infinite self-substitution.
    fn pass_through_if_bare(&mut self) -> bool {
        if self.num_args() == 0 {
            self.pass_through = true;
            true
        } else {
            false
        }
    }

    fn max_pars(&mut self, b: Builtin, n: usize) -> Result<()> {
        if self.num_args() > n {
            self.warn_usage(&format!("unused arguments collected: {}", b.par_desc()))?;
        }
        Ok(())
    }

    fn min_pars(&mut self, b: Builtin, n: usize) -> Result<()> {
        if self.num_args() < n {
            let msg = format!(
                "required arguments not collected: {}{}",
                self.arg_str(0),
                b.par_desc()
            );
            eprintln!(
                "{}:{}: usage error: {}",
                self.input.name(),
                self.input.row(),
                msg
            );
            return Err(Error::Usage(msg));
        }
        Ok(())
    }

    /// Unget `text` wrapped in the current quotes, so it is re-read
    /// literally.
    fn unget_quoted(&mut self, text: &[u8]) -> Result<()> {
        let rq = self.right_quote.clone();
        let lq = self.left_quote.clone();
        self.input.unget_str(&rq)?;
        self.input.unget_str(text)?;
        self.input.unget_str(&lq)
    }
}

fn bi_define(m4: &mut MacroProcessor, push_hist: bool) -> Result<()> {
    let b = if push_hist {
        Builtin::Pushdef
    } else {
        Builtin::Define
    };
    if m4.pass_through_if_bare() {
        return Ok(());
    }
    m4.max_pars(b, 2)?;
    m4.min_pars(b, 2)?;

    let name = m4.arg_str(1);
    let def = m4.arg(2).to_vec();
    m4.add_macro(&name, &def, push_hist)
}

fn bi_undefine(m4: &mut MacroProcessor, pop_hist: bool) -> Result<()> {
    let b = if pop_hist {
        Builtin::Popdef
    } else {
        Builtin::Undefine
    };
    if m4.pass_through_if_bare() {
        return Ok(());
    }
    m4.max_pars(b, 1)?;
    m4.min_pars(b, 1)?;

    let name = m4.arg_str(1);
    if !m4.macros.delete(&name, pop_hist) {
        m4.warn_usage(&format!("macro does not exist: {name}"))?;
    }
    Ok(())
}

/// All delimiter bytes should be graphic, non-comma and non-paren.
fn bad_delim(s: &[u8]) -> bool {
    s.iter()
        .any(|&ch| !ch.is_ascii_graphic() || ch == b',' || ch == b'(' || ch == b')')
}

fn bi_changecom(m4: &mut MacroProcessor) -> Result<()> {
    m4.max_pars(Builtin::Changecom, 2)?;

    if m4.num_args() == 0 {
        // Disable comments
        m4.left_comment = None;
        m4.right_comment = None;
        return Ok(());
    }

    let lc = m4.arg(1).to_vec();
    if lc.is_empty() {
        return Err(Error::usage("empty left comment"));
    }
    if bad_delim(&lc) {
        m4.warn_usage(&format!(
            "poor choice of left comment: {}",
            String::from_utf8_lossy(&lc)
        ))?;
    }

    let rc = if m4.num_args() >= 2 {
        let rc = m4.arg(2).to_vec();
        if rc.is_empty() {
            return Err(Error::usage("empty right comment"));
        }
        if bad_delim(&rc) {
            m4.warn_usage(&format!(
                "poor choice of right comment: {}",
                String::from_utf8_lossy(&rc)
            ))?;
        }
        rc
    } else {
        super::DEFAULT_RIGHT_COMMENT.into()
    };

    if lc == rc {
        m4.warn_usage("left and right comments should not be the same")?;
    }

    m4.left_comment = Some(lc);
    m4.right_comment = Some(rc);
    Ok(())
}

fn bi_changequote(m4: &mut MacroProcessor) -> Result<()> {
    m4.max_pars(Builtin::Changequote, 2)?;

    let (lq, rq) = if m4.num_args() >= 2 {
        let lq = m4.arg(1).to_vec();
        let rq = m4.arg(2).to_vec();
        if lq.is_empty() {
            return Err(Error::usage("empty left quote"));
        }
        if rq.is_empty() {
            return Err(Error::usage("empty right quote"));
        }
        if bad_delim(&lq) {
            m4.warn_usage(&format!(
                "poor choice of left quote: {}",
                String::from_utf8_lossy(&lq)
            ))?;
        }
        if bad_delim(&rq) {
            m4.warn_usage(&format!(
                "poor choice of right quote: {}",
                String::from_utf8_lossy(&rq)
            ))?;
        }
        if lq == rq {
            m4.warn_usage("left and right quotes should not be the same")?;
        }
        (lq, rq)
    } else {
        (
            super::DEFAULT_LEFT_QUOTE.into(),
            super::DEFAULT_RIGHT_QUOTE.into(),
        )
    };

    m4.left_quote = lq;
    m4.right_quote = rq;
    Ok(())
}

fn bi_shift(m4: &mut MacroProcessor) -> Result<()> {
    if m4.pass_through_if_bare() {
        return Ok(());
    }

    // Comma separated quoted arguments, except for the first.
    // Ungetting, so work in reverse.
    let n = m4.num_args();
    for i in (2..=n).rev() {
        let a = m4.arg(i).to_vec();
        m4.unget_quoted(&a)?;
        if i != 2 {
            m4.input.unget_ch(b',')?;
        }
    }
    Ok(())
}

fn bi_divert(m4: &mut MacroProcessor) -> Result<()> {
    m4.max_pars(Builtin::Divert, 1)?;

    if m4.num_args() == 0 {
        m4.active_div = 0;
        return Ok(());
    }
    let a = m4.arg(1);
    if a == b"-1" {
        m4.active_div = DIV_NEG_1;
        return Ok(());
    }
    if a.len() == 1 && a[0].is_ascii_digit() {
        m4.active_div = (a[0] - b'0') as usize;
        return Ok(());
    }
    Err(Error::usage("invalid diversion number"))
}

fn bi_undivert(m4: &mut MacroProcessor) -> Result<()> {
    let n = m4.num_args();
    if n == 0 {
        // Undivert everything into the current diversion
        for i in 0..NUM_DIVS - 1 {
            if i != m4.active_div {
                let mut t = std::mem::take(&mut m4.divs[i]);
                m4.divs[m4.active_div].put_obuf(&mut t)?;
                m4.divs[i] = t;
            }
        }
        return Ok(());
    }

    for i in 1..=n {
        let a = m4.arg(i).to_vec();
        if a.is_empty() {
            return Err(Error::usage("argument is empty string"));
        }
        if a.iter().all(|ch| ch.is_ascii_digit()) {
            let x = (a[0] - b'0') as usize;
            if a.len() != 1 || x == m4.active_div {
                return Err(Error::usage("invalid diversion number"));
            }
            let mut t = std::mem::take(&mut m4.divs[x]);
            m4.divs[m4.active_div].put_obuf(&mut t)?;
            m4.divs[x] = t;
        } else {
            // A filename: append straight into the active diversion,
            // even during argument collection
            let path = PathBuf::from(String::from_utf8_lossy(&a).into_owned());
            let div = m4.active_div;
            m4.divs[div].put_file(&path)?;
        }
    }
    Ok(())
}

fn bi_writediv(m4: &mut MacroProcessor) -> Result<()> {
    if m4.pass_through_if_bare() {
        return Ok(());
    }
    m4.max_pars(Builtin::Writediv, 3)?;
    m4.min_pars(Builtin::Writediv, 2)?;

    let append = m4.num_args() >= 3 && m4.arg(3) == b"1";
    let a = m4.arg(1);

    // Diversions 0 and -1 cannot be written
    if a.len() == 1 && a[0].is_ascii_digit() && a[0] != b'0' {
        let x = (a[0] - b'0') as usize;
        let path = PathBuf::from(m4.arg_str(2));
        m4.divs[x].write_file(&path, append)
    } else {
        Err(Error::usage("invalid diversion number"))
    }
}

fn bi_divnum(m4: &mut MacroProcessor) -> Result<()> {
    m4.max_pars(Builtin::Divnum, 0)?;
    if m4.active_div == DIV_NEG_1 {
        m4.input.unget_str(b"-1")
    } else {
        m4.input.unget_ch(b'0' + m4.active_div as u8)
    }
}

/// Split a template into its prefix and the length of its trailing
/// run of `X` bytes.
fn split_template(template: &str) -> Result<(&str, usize)> {
    let stripped = template.trim_end_matches('X');
    let x_run = template.len() - stripped.len();
    if x_run == 0 {
        return Err(Error::syntax("invalid template, no X suffix"));
    }
    Ok((stripped, x_run))
}

fn bi_maketemp(m4: &mut MacroProcessor) -> Result<()> {
    if m4.pass_through_if_bare() {
        return Ok(());
    }
    m4.max_pars(Builtin::Maketemp, 1)?;
    m4.min_pars(Builtin::Maketemp, 1)?;

    // The trailing Xs are replaced by the process id; the file is not
    // created
    let template = m4.arg_str(1);
    let (prefix, _) = split_template(&template)?;
    let name = format!("{}{}", prefix, std::process::id());
    m4.input.unget_str(name.as_bytes())
}

fn bi_mkstemp(m4: &mut MacroProcessor) -> Result<()> {
    if m4.pass_through_if_bare() {
        return Ok(());
    }
    m4.max_pars(Builtin::Mkstemp, 1)?;
    m4.min_pars(Builtin::Mkstemp, 1)?;

    let template = m4.arg_str(1);
    let (stripped, x_run) = split_template(&template)?;
    let path = Path::new(stripped);
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    let prefix = path.file_name().map_or("", |f| f.to_str().unwrap_or(""));

    let file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix("")
        .rand_bytes(x_run)
        .keep(true)
        .tempfile_in(dir)?;
    let name = file.path().to_string_lossy().into_owned();
    m4.input.unget_str(name.as_bytes())
}

fn bi_include(m4: &mut MacroProcessor) -> Result<()> {
    if m4.pass_through_if_bare() {
        return Ok(());
    }
    m4.max_pars(Builtin::Include, 1)?;
    m4.min_pars(Builtin::Include, 1)?;

    let path = PathBuf::from(m4.arg_str(1));
    m4.input.unget_file(&path)
}

fn bi_sinclude(m4: &mut MacroProcessor) -> Result<()> {
    if m4.pass_through_if_bare() {
        return Ok(());
    }
    m4.max_pars(Builtin::Sinclude, 1)?;
    m4.min_pars(Builtin::Sinclude, 1)?;

    // Silent include: a missing file is no error and no warning
    let path = PathBuf::from(m4.arg_str(1));
    if path.exists() {
        m4.input.unget_file(&path)?;
    }
    Ok(())
}

fn bi_dnl(m4: &mut MacroProcessor) -> Result<()> {
    m4.max_pars(Builtin::Dnl, 0)?;
    m4.input.delete_to_nl()
}

fn bi_tnl(m4: &mut MacroProcessor) -> Result<()> {
    if m4.pass_through_if_bare() {
        return Ok(());
    }
    m4.max_pars(Builtin::Tnl, 1)?;
    m4.min_pars(Builtin::Tnl, 1)?;

    // Trim trailing newline and carriage return bytes
    let mut s = m4.arg(1).to_vec();
    while matches!(s.last(), Some(b'\n') | Some(b'\r')) {
        s.pop();
    }
    m4.input.unget_str(&s)
}

fn bi_regexrep(m4: &mut MacroProcessor) -> Result<()> {
    if m4.pass_through_if_bare() {
        return Ok(());
    }
    m4.max_pars(Builtin::Regexrep, 5)?;
    m4.min_pars(Builtin::Regexrep, 3)?;

    let nl_sen = m4.arg(4) != b"1"; // Newline sensitive by default
    let verbose = m4.arg(5) == b"1";

    let text = m4.arg(1).to_vec();
    let find = m4.arg(2).to_vec();
    let replace = m4.arg(3).to_vec();

    if verbose {
        Regex::compile(&find, nl_sen)?.dump();
    }

    let res = regex_replace(&text, &find, &replace, nl_sen)?;
    m4.input.unget_str(&res)
}

fn bi_lsdir(m4: &mut MacroProcessor) -> Result<()> {
    if m4.pass_through_if_bare() {
        return Ok(());
    }
    m4.max_pars(Builtin::Lsdir, 1)?;

    let dir = if m4.num_args() >= 1 {
        m4.arg_str(1)
    } else {
        ".".to_string()
    };

    let mut dirs: Vec<String> = Vec::new();
    let mut files: Vec<String> = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() {
            dirs.push(name);
        } else {
            files.push(name);
        }
    }
    dirs.sort_unstable();
    files.sort_unstable();

    let mut listing = String::new();
    for d in &dirs {
        listing.push_str(d);
        listing.push('\n');
    }
    listing.push_str("----------\n");
    for f in &files {
        listing.push_str(f);
        listing.push('\n');
    }
    m4.input.unget_str(listing.as_bytes())
}

fn bi_ifdef(m4: &mut MacroProcessor) -> Result<()> {
    if m4.pass_through_if_bare() {
        return Ok(());
    }
    m4.max_pars(Builtin::Ifdef, 3)?;
    m4.min_pars(Builtin::Ifdef, 2)?;

    let name = m4.arg_str(1);
    if m4.macros.contains(&name) {
        let when = m4.arg(2).to_vec();
        m4.input.unget_str(&when)
    } else if m4.num_args() >= 3 {
        let when = m4.arg(3).to_vec();
        m4.input.unget_str(&when)
    } else {
        Ok(())
    }
}

fn bi_ifelse(m4: &mut MacroProcessor) -> Result<()> {
    if m4.pass_through_if_bare() {
        return Ok(());
    }
    m4.min_pars(Builtin::Ifelse, 3)?;

    let n = m4.num_args();
    let mut i = 2;
    while i + 1 <= n {
        if m4.arg(1) == m4.arg(i) {
            let when = m4.arg(i + 1).to_vec();
            return m4.input.unget_str(&when);
        }
        i += 2;
    }

    // Default
    if n > 3 && n % 2 == 0 {
        let def = m4.arg(n).to_vec();
        return m4.input.unget_str(&def);
    }
    Ok(())
}

fn bi_defn(m4: &mut MacroProcessor) -> Result<()> {
    if m4.pass_through_if_bare() {
        return Ok(());
    }
    m4.min_pars(Builtin::Defn, 1)?;

    let n = m4.num_args();
    let mut last: Option<Binding> = None;
    // Reverse order because ungetting
    for i in (1..=n).rev() {
        let name = m4.arg_str(i);
        let binding = m4.macros.lookup(&name).cloned();
        if let Some(Binding::Text(def)) = &binding {
            let def = def.clone();
            m4.unget_quoted(&def)?;
        }
        last = binding;
    }

    if n == 1 {
        if let Some(Binding::Builtin(b)) = last {
            // A built-in's definition is not text. Pass it back only
            // when this defn sits in the second argument slot of an
            // enclosing define or pushdef, so the binding transfers.
            if m4.stack.len() >= 2 {
                let parent = m4.stack[m4.stack.len() - 2];
                let this = m4.stack[m4.stack.len() - 1];
                let parent_is_definer = matches!(
                    parent.builtin,
                    Some(Builtin::Define) | Some(Builtin::Pushdef)
                );
                if parent_is_definer && this.m_i - parent.m_i == 4 {
                    m4.pending_builtin = Some(b);
                }
            }
        }
    }
    Ok(())
}

fn bi_dumpdef(m4: &mut MacroProcessor) -> Result<()> {
    let n = m4.num_args();
    if n == 0 {
        // Dump every definition
        let mut all: Vec<(String, Binding)> = m4
            .macros
            .iter()
            .map(|(name, b)| (name.to_string(), b.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, binding) in all {
            dump_one(&name, Some(&binding));
        }
        return Ok(());
    }

    for i in 1..=n {
        let name = m4.arg_str(i);
        if name.is_empty() {
            return Err(Error::usage("argument is empty string"));
        }
        let binding = m4.macros.lookup(&name).cloned();
        dump_one(&name, binding.as_ref());
    }
    Ok(())
}

fn dump_one(name: &str, binding: Option<&Binding>) {
    match binding {
        None => eprintln!("Undefined: {name}"),
        Some(Binding::Text(def)) => {
            eprintln!("User-def: {}: {}", name, String::from_utf8_lossy(def));
        }
        Some(Binding::Builtin(b)) => {
            eprintln!("Built-in: {}{}", name, b.par_desc());
        }
    }
}

fn bi_m4wrap(m4: &mut MacroProcessor) -> Result<()> {
    if m4.pass_through_if_bare() {
        return Ok(());
    }
    m4.max_pars(Builtin::M4wrap, 1)?;
    m4.min_pars(Builtin::M4wrap, 1)?;

    let code = m4.arg(1).to_vec();
    m4.wrap.put_mem(&code)
}

fn bi_errprint(m4: &mut MacroProcessor) -> Result<()> {
    if m4.pass_through_if_bare() {
        return Ok(());
    }
    m4.max_pars(Builtin::Errprint, 1)?;
    m4.min_pars(Builtin::Errprint, 1)?;

    eprintln!("{}", m4.arg_str(1));
    Ok(())
}

fn bi_len(m4: &mut MacroProcessor) -> Result<()> {
    if m4.pass_through_if_bare() {
        return Ok(());
    }
    m4.max_pars(Builtin::Len, 1)?;
    m4.min_pars(Builtin::Len, 1)?;

    let len = m4.arg(1).len().to_string();
    m4.input.unget_str(len.as_bytes())
}

fn bi_substr(m4: &mut MacroProcessor) -> Result<()> {
    if m4.pass_through_if_bare() {
        return Ok(());
    }
    m4.max_pars(Builtin::Substr, 3)?;
    m4.min_pars(Builtin::Substr, 2)?;

    let mut s = m4.arg(1).to_vec();
    let len = s.len();
    let x = str_to_usize(m4.arg(2)).map_err(|_| Error::usage("invalid number"))?;

    if m4.num_args() >= 3 {
        let y = str_to_usize(m4.arg(3)).map_err(|_| Error::usage("invalid number"))?;
        let stop = x.checked_add(y).ok_or(Error::UserOverflow)?;
        if stop < len {
            s.truncate(stop);
        } else if stop > len {
            m4.warn_usage("substring is out of bounds")?;
        }
    }

    if x < len {
        m4.input.unget_str(&s[x..])
    } else {
        m4.warn_usage("index is out of bounds")
    }
}

fn bi_index(m4: &mut MacroProcessor) -> Result<()> {
    if m4.pass_through_if_bare() {
        return Ok(());
    }
    m4.max_pars(Builtin::Index, 2)?;
    m4.min_pars(Builtin::Index, 2)?;

    let res = match quick_search(m4.arg(1), m4.arg(2)) {
        Some(offset) => offset.to_string(),
        None => "-1".to_string(),
    };
    m4.input.unget_str(res.as_bytes())
}

/// Reads one byte at a time from a translit component, expanding
/// `a-b` ranges in either direction.
struct RangeReader<'a> {
    s: &'a [u8],
    i: usize,
    on: bool,
    cur: u8,
    stop: u8,
    decr: bool,
}

impl<'a> RangeReader<'a> {
    fn new(s: &'a [u8]) -> Self {
        RangeReader {
            s,
            i: 0,
            on: false,
            cur: 0,
            stop: 0,
            decr: false,
        }
    }

    fn set_range(&mut self) {
        if self.i < self.s.len()
            && self.s.get(self.i + 1) == Some(&b'-')
            && self.i + 2 < self.s.len()
        {
            self.on = true;
            self.cur = self.s[self.i];
            self.stop = self.s[self.i + 2];
            self.decr = self.stop < self.cur;
            self.i += 3;
        }
    }

    /// Next byte of the expansion; 0 when exhausted.
    fn next_ch(&mut self) -> u8 {
        if !self.on {
            self.set_range();
        }
        if self.on {
            let ch = self.cur;
            if self.cur == self.stop {
                self.on = false;
            } else if self.decr {
                self.cur -= 1;
            } else {
                self.cur += 1;
            }
            ch
        } else if self.i < self.s.len() {
            let ch = self.s[self.i];
            self.i += 1;
            ch
        } else {
            0
        }
    }
}

fn bi_translit(m4: &mut MacroProcessor) -> Result<()> {
    if m4.pass_through_if_bare() {
        return Ok(());
    }
    m4.max_pars(Builtin::Translit, 3)?;
    m4.min_pars(Builtin::Translit, 3)?;

    let text = m4.arg(1).to_vec();
    let from = m4.arg(2).to_vec();
    let to = m4.arg(3).to_vec();

    let mut f_r = RangeReader::new(&from);
    let mut t_r = RangeReader::new(&to);

    // Build the mapping: 0 unmapped, -1 delete, otherwise the target
    let mut map = [0i32; 256];
    loop {
        let f_ch = f_r.next_ch();
        let t_ch = t_r.next_ch();
        if f_ch == 0 {
            if t_ch != 0 {
                m4.warn_syntax("TO component of mapping exceeds FROM component")?;
            }
            break;
        }
        // The first match stays
        if map[f_ch as usize] == 0 {
            map[f_ch as usize] = if t_ch == 0 { -1 } else { i32::from(t_ch) };
        }
    }

    let mut out = Vec::with_capacity(text.len());
    for &u in &text {
        let x = map[u as usize];
        if x == 0 {
            out.push(u);
        } else if x != -1 {
            out.push(x as u8);
        }
    }
    m4.input.unget_str(&out)
}

fn bi_incr_decr(m4: &mut MacroProcessor, incr: bool) -> Result<()> {
    let b = if incr { Builtin::Incr } else { Builtin::Decr };
    if m4.pass_through_if_bare() {
        return Ok(());
    }
    m4.max_pars(b, 1)?;
    m4.min_pars(b, 1)?;

    let a = m4.arg(1).to_vec();
    let (mut neg, digits) = match a.first() {
        Some(&b'-') => (true, &a[1..]),
        _ => (false, &a[..]),
    };
    let mut x =
        str_to_usize(digits).map_err(|_| Error::usage("invalid number"))? as u64;

    if incr {
        if neg && x > 0 {
            x -= 1;
        } else {
            x = x.checked_add(1).ok_or(Error::UserOverflow)?;
        }
    } else if !neg && x > 0 {
        x -= 1;
    } else {
        x = x.checked_add(1).ok_or(Error::UserOverflow)?;
        neg = true;
    }
    if x == 0 {
        neg = false;
    }

    let res = format!("{}{}", if neg { "-" } else { "" }, x);
    m4.input.unget_str(res.as_bytes())
}

fn bi_eval(m4: &mut MacroProcessor) -> Result<()> {
    if m4.pass_through_if_bare() {
        return Ok(());
    }
    m4.max_pars(Builtin::Eval, 4)?;
    m4.min_pars(Builtin::Eval, 1)?;

    let base = if m4.num_args() >= 2 {
        str_to_u32(m4.arg(2)).map_err(|_| Error::usage("invalid base"))?
    } else {
        10
    };
    let pad = if m4.num_args() >= 3 {
        str_to_usize(m4.arg(3)).map_err(|_| Error::usage("invalid pad"))?
    } else {
        0
    };
    let verbose = m4.arg(4) == b"1";

    let expr = m4.arg_str(1);
    let x = crate::eval::eval_str(&expr, verbose)?;
    let num = crate::num::to_str_radix(x, base, pad)?;
    m4.input.unget_str(num.as_bytes())
}

fn sh_status(status: std::process::ExitStatus) -> Result<i32> {
    status
        .code()
        .ok_or(Error::Infra("command terminated by signal"))
}

fn bi_syscmd(m4: &mut MacroProcessor) -> Result<()> {
    if m4.pass_through_if_bare() {
        return Ok(());
    }
    m4.max_pars(Builtin::Syscmd, 1)?;
    m4.min_pars(Builtin::Syscmd, 1)?;

    let cmd = m4.arg_str(1);
    let status = Command::new("sh").arg("-c").arg(&cmd).status()?;
    m4.sys_val = sh_status(status)?;
    Ok(())
}

fn bi_esyscmd(m4: &mut MacroProcessor) -> Result<()> {
    if m4.pass_through_if_bare() {
        return Ok(());
    }
    m4.max_pars(Builtin::Esyscmd, 1)?;
    m4.min_pars(Builtin::Esyscmd, 1)?;

    let cmd = m4.arg_str(1);
    let output = Command::new("sh").arg("-c").arg(&cmd).output()?;

    let captured: Vec<u8> = output
        .stdout
        .iter()
        .copied()
        .filter(|&ch| ch != 0)
        .collect();
    m4.input.unget_str(&captured)?;
    m4.sys_val = sh_status(output.status)?;
    Ok(())
}

fn bi_sysval(m4: &mut MacroProcessor) -> Result<()> {
    m4.max_pars(Builtin::Sysval, 0)?;
    let v = m4.sys_val.to_string();
    m4.input.unget_str(v.as_bytes())
}

fn bi_m4exit(m4: &mut MacroProcessor) -> Result<()> {
    m4.max_pars(Builtin::M4exit, 1)?;

    let x = if m4.num_args() >= 1 {
        let x = str_to_usize(m4.arg(1)).map_err(|_| Error::usage("invalid exit value"))?;
        if x > u8::MAX as usize {
            return Err(Error::usage("exit value out of range"));
        }
        x
    } else {
        0
    };
    m4.req_exit_val = Some(x as i32);
    Ok(())
}

fn bi_traceon(m4: &mut MacroProcessor) -> Result<()> {
    let n = m4.num_args();
    if n == 0 {
        // Trace every current macro
        let names: Vec<String> = m4.macros.iter().map(|(name, _)| name.to_string()).collect();
        for name in names {
            m4.trace_tab.upsert(&name, (), false);
        }
        m4.trace_on = true;
        return Ok(());
    }

    for i in 1..=n {
        MacroProcessor::validate_macro_name(&m4.arg_str(i))?;
    }
    for i in 1..=n {
        let name = m4.arg_str(i);
        m4.trace_tab.upsert(&name, (), false);
    }
    m4.trace_on = true;
    Ok(())
}

fn bi_traceoff(m4: &mut MacroProcessor) -> Result<()> {
    if !m4.trace_on {
        return Ok(()); // Nothing to do
    }

    let n = m4.num_args();
    if n == 0 {
        m4.trace_tab = crate::symtab::SymTab::new(crate::constants::m4::NUM_BUCKETS);
        m4.trace_on = false;
        return Ok(());
    }

    for i in 1..=n {
        let name = m4.arg_str(i);
        if !m4.trace_tab.delete(&name, false) {
            m4.warn_usage(&format!("trace entry does not exist: {name}"))?;
        }
    }
    Ok(())
}

fn bi_recrm(m4: &mut MacroProcessor) -> Result<()> {
    if m4.pass_through_if_bare() {
        return Ok(());
    }
    m4.max_pars(Builtin::Recrm, 1)?;
    m4.min_pars(Builtin::Recrm, 1)?;

    let arg = m4.arg_str(1);
    if arg.is_empty() {
        return Err(Error::usage("argument is empty string"));
    }
    let path = Path::new(&arg);
    match std::fs::symlink_metadata(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
        Ok(meta) => {
            if meta.is_dir() {
                std::fs::remove_dir_all(path)?;
            } else {
                std::fs::remove_file(path)?;
            }
            Ok(())
        }
    }
}
