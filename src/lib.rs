// SPDX-License-Identifier: MIT

//! # ironform
//!
//! CGI form-data intake. Reads a POST body from stdin, as announced by the
//! `CONTENT_LENGTH` and `CONTENT_TYPE` environment variables, and turns it
//! into two outputs: the serialized form fields and a record of every
//! uploaded file, spooled to temporary storage.
//!
//! The `run` function is the binary's entry point; embedders use
//! [`form::FormParser`] directly.

pub mod cli;
pub mod config;
pub mod content_type;
pub mod error;
pub mod form;
pub mod headers;
pub mod lines;
pub mod multipart;
pub mod request;
pub mod upload;

use crate::cli::Cli;
use crate::config::Config;
use crate::form::{FormParser, FormResult};
use crate::request::RequestContext;
use clap::Parser;
use clap::error::ErrorKind;
use log::error;
use std::ffi::OsString;
use std::io::{self, Write};

/// Initializes the logger, parses command-line arguments and handles one request.
///
/// The form result is written to stdout as a `text/plain` CGI response.
/// Configuration errors and a failed write to stdout exit the process with
/// status 1; anything wrong with the request itself only shapes the result.
pub fn run() {
    let cli = parse_cli(std::env::args_os());

    // Load configuration with precedence: CLI > ENV > INI > Defaults
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let log_level = if config.verbose {
        "debug"
    } else if config.detailed_logging {
        "info"
    } else {
        "warn"
    };

    // RUST_LOG still wins when set
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    log::debug!("Log level set to: {log_level}");

    match config.source {
        Some(ref path) => log::info!("Loaded configuration from: {}", path.display()),
        None => log::debug!("No configuration file found, using defaults and overrides"),
    }
    if !cli.search_words.is_empty() {
        log::debug!("Ignoring query words passed as arguments: {:?}", cli.search_words);
    }

    if config.verbose {
        config.print_summary();
    }

    if let Err(e) = cli.validate() {
        error!("Configuration validation error: {e}");
        std::process::exit(1);
    }

    let context = RequestContext::from_env();
    let mut result = FormParser::new(&config).process(&context, io::stdin().lock());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = write_cgi_response(&mut out, &mut result).and_then(|()| out.flush()) {
        error!("Failed to write response: {e}");
        std::process::exit(1);
    }
}

/// Parse arguments, falling back to defaults when the server passed words the
/// parser rejects. Help and version requests still exit.
pub fn parse_cli<I, T>(args: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            eprintln!("Ignoring command-line arguments: {e}");
            Cli::default()
        }
    }
}

/// Write `result` as a CGI response, consuming both outputs.
///
/// Each present output becomes one line, `post=<bytes>` and
/// `files=<records>`; absent outputs are left out. `%`, CR and LF inside an
/// output are percent-encoded so every output stays on its own line.
pub fn write_cgi_response<W: Write>(out: &mut W, result: &mut FormResult) -> io::Result<()> {
    out.write_all(b"Content-Type: text/plain\r\n\r\n")?;

    if let Some(post) = result.take_post() {
        write_line(out, b"post=", &post)?;
    }

    if let Some(files) = result.take_files() {
        write_line(out, b"files=", files.as_bytes())?;
    }

    Ok(())
}

fn write_line<W: Write>(out: &mut W, key: &[u8], value: &[u8]) -> io::Result<()> {
    out.write_all(key)?;
    out.write_all(&escape_line(value))?;
    out.write_all(b"\n")
}

/// Percent-encode the bytes that would break the line framing
pub fn escape_line(value: &[u8]) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(value.len());
    for &byte in value {
        match byte {
            b'%' => escaped.extend_from_slice(b"%25"),
            b'\r' => escaped.extend_from_slice(b"%0D"),
            b'\n' => escaped.extend_from_slice(b"%0A"),
            _ => escaped.push(byte),
        }
    }
    escaped
}
