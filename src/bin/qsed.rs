//! qsed - regular expression stream editor

use anyhow::Context;
use memmap2::Mmap;
use quill::outbuf::OutBuf;
use quill::regex::regex_replace;
use std::fs::File;
use std::io::Write;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "qsed find replace -nls|-nli [file]";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("qsed: {e:#}");
        let code = e
            .downcast_ref::<quill::error::Error>()
            .map_or(1, quill::error::Error::exit_code);
        std::process::exit(code);
    }
}

fn run() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() != 3 && args.len() != 4 {
        anyhow::bail!("usage: {USAGE}");
    }

    let nl_sen = match args[2].as_str() {
        "-nls" => true,
        "-nli" => false,
        _ => anyhow::bail!("usage: {USAGE}"),
    };

    // A named file is mapped read-only; standard input is slurped
    let mapped;
    let mut slurped = OutBuf::new();
    let mem: &[u8] = if let Some(path) = args.get(3) {
        let fp = File::open(path).with_context(|| format!("cannot open {path}"))?;
        mapped = unsafe { Mmap::map(&fp) }.with_context(|| format!("cannot map {path}"))?;
        &mapped
    } else {
        slurped.put_stream(&mut std::io::stdin().lock())?;
        slurped.as_bytes()
    };

    let res = regex_replace(mem, args[0].as_bytes(), args[1].as_bytes(), nl_sen)?;

    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    lock.write_all(&res)?;
    lock.flush()?;
    Ok(())
}
