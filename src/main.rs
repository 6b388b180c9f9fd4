use bytepath::{LoadOptions, ParseMode, find_xpath_in_with_options};
use clap::Parser;
use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Runs an XPath 1.0 query over an XML or HTML file and prints the matches as JSON.
#[derive(Parser, Debug)]
#[command(name = "bytepath", version)]
struct Cli {
    /// Input file, or `-` to read standard input
    file: PathBuf,

    /// XPath 1.0 expression selecting a node-set
    xpath: String,

    /// Namespace binding for prefixed name tests, as `prefix=uri` (repeatable)
    #[arg(short = 'n', long = "namespace", value_parser = parse_binding)]
    namespaces: Vec<(String, String)>,

    /// Parse tolerantly as HTML instead of strict XML
    #[arg(long)]
    html: bool,

    /// Accept a DOCTYPE declaration in XML input
    #[arg(long)]
    allow_dtd: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

fn parse_binding(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((prefix, uri)) if !prefix.is_empty() => Ok((prefix.to_string(), uri.to_string())),
        _ => Err(format!("expected prefix=uri, got '{}'", raw)),
    }
}

fn read_input(file: &Path) -> io::Result<Vec<u8>> {
    if file.as_os_str() == "-" {
        let mut buffer = Vec::new();
        io::stdin().read_to_end(&mut buffer)?;
        Ok(buffer)
    } else {
        fs::read(file)
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let buffer = read_input(&cli.file)?;
    log::debug!("Read {} byte(s) from {}", buffer.len(), cli.file.display());

    let options = LoadOptions::default()
        .with_mode(if cli.html { ParseMode::Html } else { ParseMode::Xml })
        .with_allow_dtd(cli.allow_dtd);
    let namespaces: HashMap<String, String> = cli.namespaces.iter().cloned().collect();

    let results = find_xpath_in_with_options(&buffer, &cli.xpath, &namespaces, &options)?;

    let mut out = io::stdout().lock();
    if cli.pretty {
        serde_json::to_writer_pretty(&mut out, &results)?;
    } else {
        serde_json::to_writer(&mut out, &results)?;
    }
    writeln!(out)?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
