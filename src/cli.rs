// SPDX-License-Identifier: MIT

use crate::error::FormError;
use crate::form::NulPolicy;
use clap::Parser;
use log::warn;
use std::path::PathBuf;

/// Largest accepted body size, in MB
const MAX_BODY_SIZE_MB: u64 = 10240;

// Command-line interface. The request itself always arrives through the CGI
// environment and stdin; flags only tune how it is handled.
#[derive(Parser, Clone, Debug, Default)]
#[command(
    version,
    about = "CGI form-data intake: parses the request body into post and files data.",
    long_about = "Reads CONTENT_LENGTH and CONTENT_TYPE from the environment and the request body from stdin.\n multipart/form-data bodies are split into fields and files; uploaded files are spooled to the upload directory.\n Any other body is passed through untouched.\n The result is written as a text/plain CGI response with a post= line and a files= line."
)]
pub struct Cli {
    /// Directory where uploaded files are spooled (defaults to the system temp directory)
    #[arg(short, long)]
    pub upload_dir: Option<PathBuf>,

    /// File name prefix for spooled uploads
    #[arg(long, value_parser = validate_temp_prefix)]
    pub temp_prefix: Option<String>,

    /// How NUL bytes in text field values are handled
    #[arg(long, value_enum)]
    pub nul_policy: Option<NulPolicy>,

    /// Maximum accepted request body size in MB
    #[arg(long, value_parser = validate_body_size)]
    pub max_body_size: Option<u64>,

    /// Enable verbose logging (log level: debug)
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable more detailed logging (log level: info)
    #[arg(long)]
    pub detailed_logging: bool,

    /// Configuration file path (INI format). If not provided, looks for ironform.ini in the current directory, ~/.config/ironform/config.ini or /etc/ironform/config.ini
    #[arg(long, value_parser = validate_config_file)]
    pub config_file: Option<String>,

    /// Words of a query string without '=', passed as arguments by CGI servers
    #[arg(hide = true, trailing_var_arg = true)]
    pub search_words: Vec<String>,
}

/// Validate body size is within safe bounds (1-10240 MB)
fn validate_body_size(s: &str) -> Result<u64, String> {
    let size: u64 = s
        .parse()
        .map_err(|_| "Body size must be a positive number".to_string())?;

    if size == 0 {
        return Err("Body size must be greater than 0 MB".to_string());
    }

    if size > MAX_BODY_SIZE_MB {
        return Err(format!(
            "Body size must not exceed {MAX_BODY_SIZE_MB} MB (10 GB)"
        ));
    }

    Ok(size)
}

/// Temp prefixes end up inside a single path component
fn validate_temp_prefix(s: &str) -> Result<String, String> {
    if s.is_empty() {
        return Err("Temp prefix cannot be empty".to_string());
    }
    if s.contains(['/', '\\']) || s.contains("..") {
        return Err(format!("Temp prefix must not contain path separators: {s}"));
    }
    Ok(s.to_string())
}

/// Validate config file path exists and is readable
fn validate_config_file(s: &str) -> Result<String, String> {
    if s.is_empty() {
        return Err("Config file path cannot be empty".to_string());
    }

    let path = PathBuf::from(s);

    if !path.exists() {
        return Err(format!("Config file does not exist: {s}"));
    }

    if !path.is_file() {
        return Err(format!("Config path is not a file: {s}"));
    }

    match std::fs::File::open(&path) {
        Ok(_) => Ok(s.to_string()),
        Err(e) => Err(format!("Cannot read config file {s}: {e}")),
    }
}

impl Cli {
    /// Validate the CLI configuration for consistency
    pub fn validate(&self) -> Result<(), FormError> {
        if let Some(ref dir) = self.upload_dir {
            if !dir.exists() {
                return Err(FormError::invalid_configuration(format!(
                    "Upload directory not found: {}",
                    dir.display()
                )));
            }
            if !dir.is_dir() {
                return Err(FormError::invalid_configuration(format!(
                    "Upload path is not a directory: {}",
                    dir.display()
                )));
            }
        }

        if self.max_body_size.is_some_and(|mb| mb > 2048) {
            warn!("Large body size limit configured; bodies are held in memory while parsing.");
        }

        Ok(())
    }

    /// Convert the body size limit from MB to bytes
    pub fn max_body_size_bytes(&self) -> Option<u64> {
        // Bounded by MAX_BODY_SIZE_MB, so this can't overflow
        self.max_body_size.map(|mb| mb * 1024 * 1024)
    }
}
