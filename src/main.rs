//! qm4 - the quill macro processor
//! Main entry point

use anyhow::Context;
use quill::m4::MacroProcessor;
use std::io::IsTerminal;
use std::path::Path;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "qm4 [-s] [-D macro_name[=macro_def]] ... [-U macro_name] ... file ...";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("qm4: {e:#}");
            let code = e
                .downcast_ref::<quill::error::Error>()
                .map_or(1, quill::error::Error::exit_code);
            std::process::exit(code);
        }
    }
}

fn run() -> anyhow::Result<i32> {
    let mut m4 = MacroProcessor::new(Box::new(std::io::stdout()));
    m4.set_tty_output(std::io::stdout().is_terminal());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut no_file = true;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-s" => m4.set_line_directives(true),
            "-D" => {
                let spec = args
                    .get(i + 1)
                    .with_context(|| format!("usage: {USAGE}"))?;
                let (name, def) = match spec.split_once('=') {
                    Some((n, d)) => (n, d.as_bytes()),
                    None => (spec.as_str(), &b""[..]),
                };
                m4.add_macro(name, def, false)?;
                i += 1;
            }
            "-U" => {
                let name = args
                    .get(i + 1)
                    .with_context(|| format!("usage: {USAGE}"))?;
                m4.undefine(name)?;
                i += 1;
            }
            "-" => {
                m4.input.append_stdin();
                no_file = false;
            }
            file => {
                m4.input
                    .append_file(Path::new(file))
                    .with_context(|| format!("cannot open {file}"))?;
                no_file = false;
            }
        }
        i += 1;
    }

    if no_file {
        m4.input.append_stdin();
    }

    match m4.run() {
        Ok(code) => Ok(code),
        Err(e) => {
            m4.dump_stack();
            Err(e.into())
        }
    }
}
