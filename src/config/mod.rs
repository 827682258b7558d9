//! Configuration management for ironform
//! Supports INI files with environment and CLI argument overrides

pub mod ini_parser;

use crate::cli::Cli;
use crate::error::FormError;
use crate::form::NulPolicy;
use crate::upload::DEFAULT_TEMP_PREFIX;
use ini_parser::IniConfig;
use std::env;
use std::path::{Path, PathBuf};

pub const ENV_UPLOAD_DIR: &str = "IRONFORM_UPLOAD_DIR";
pub const ENV_TEMP_PREFIX: &str = "IRONFORM_TEMP_PREFIX";
pub const ENV_NUL_POLICY: &str = "IRONFORM_NUL_POLICY";

/// Default body size limit: 10GB
pub const DEFAULT_MAX_BODY_SIZE: u64 = 10240 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    // Upload settings
    pub upload_dir: PathBuf,
    pub temp_prefix: String,

    // Parser settings
    pub nul_policy: NulPolicy,
    pub max_body_size: u64,

    // Logging settings
    pub verbose: bool,
    pub detailed_logging: bool,

    /// INI file the settings were read from, if any
    pub source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upload_dir: env::temp_dir(),
            temp_prefix: DEFAULT_TEMP_PREFIX.to_string(),
            nul_policy: NulPolicy::default(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            verbose: false,
            detailed_logging: false,
            source: None,
        }
    }
}

impl Config {
    /// Load configuration with precedence: CLI args > ENV > INI file > Defaults
    pub fn load(cli: &Cli) -> Result<Self, FormError> {
        Self::load_with_env(cli, |key| env::var(key).ok())
    }

    /// Same as [`Config::load`], reading environment values through `env`
    pub fn load_with_env<F>(cli: &Cli, env: F) -> Result<Self, FormError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Runs before the logger exists; run() reports `source` afterwards
        let source = Self::find_config_file(cli)?;
        let ini = match source {
            Some(ref path) => IniConfig::load_file(path)?,
            None => IniConfig::new(),
        };

        Ok(Self {
            upload_dir: Self::get_upload_dir(&ini, cli, &env),
            temp_prefix: Self::get_temp_prefix(&ini, cli, &env)?,

            nul_policy: Self::get_nul_policy(&ini, cli, &env)?,
            max_body_size: Self::get_max_body_size(&ini, cli)?,

            verbose: cli.verbose || ini.get_bool_or("logging", "verbose", false),
            detailed_logging: cli.detailed_logging
                || ini.get_bool_or("logging", "detailed", false),

            source,
        })
    }

    /// Find configuration file in order of preference
    fn find_config_file(cli: &Cli) -> Result<Option<PathBuf>, FormError> {
        // 1. Explicit --config-file
        if let Some(ref config_path) = cli.config_file {
            let path = PathBuf::from(config_path);
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(FormError::invalid_configuration(format!(
                "Config file specified but not found: {config_path}"
            )));
        }

        // 2. Current directory
        let current_config = PathBuf::from("ironform.ini");
        if current_config.exists() {
            return Ok(Some(current_config));
        }

        // 3. ~/.config/ironform/config.ini
        if let Some(home_dir) = env::var_os("HOME") {
            let user_config = Path::new(&home_dir)
                .join(".config")
                .join("ironform")
                .join("config.ini");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // 4. System config
        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/ironform/config.ini");
            if system_config.exists() {
                return Ok(Some(system_config));
            }
        }

        Ok(None)
    }

    fn get_upload_dir<F>(ini: &IniConfig, cli: &Cli, env: &F) -> PathBuf
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ref upload_dir) = cli.upload_dir {
            return upload_dir.clone();
        }

        if let Some(upload_dir) = env(ENV_UPLOAD_DIR).filter(|dir| !dir.is_empty()) {
            return PathBuf::from(upload_dir);
        }

        if let Some(upload_dir) = ini.get_string("upload", "directory") {
            return PathBuf::from(upload_dir);
        }

        env::temp_dir()
    }

    fn get_temp_prefix<F>(ini: &IniConfig, cli: &Cli, env: &F) -> Result<String, FormError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = cli
            .temp_prefix
            .clone()
            .or_else(|| env(ENV_TEMP_PREFIX))
            .or_else(|| ini.get_string("upload", "prefix"))
            .unwrap_or_else(|| DEFAULT_TEMP_PREFIX.to_string());

        if prefix.is_empty() || prefix.contains(['/', '\\']) || prefix.contains("..") {
            return Err(FormError::invalid_configuration(format!(
                "Invalid temp prefix: '{prefix}'"
            )));
        }
        Ok(prefix)
    }

    fn get_nul_policy<F>(ini: &IniConfig, cli: &Cli, env: &F) -> Result<NulPolicy, FormError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(policy) = cli.nul_policy {
            return Ok(policy);
        }

        match env(ENV_NUL_POLICY).or_else(|| ini.get_string("parser", "nul_policy")) {
            Some(raw) => raw.parse().map_err(FormError::invalid_configuration),
            None => Ok(NulPolicy::default()),
        }
    }

    fn get_max_body_size(ini: &IniConfig, cli: &Cli) -> Result<u64, FormError> {
        if let Some(bytes) = cli.max_body_size_bytes() {
            return Ok(bytes);
        }

        match ini.get_string("parser", "max_body_size") {
            Some(raw) => ini
                .get_file_size("parser", "max_body_size")
                .filter(|&bytes| bytes > 0)
                .ok_or_else(|| {
                    FormError::invalid_configuration(format!("Invalid max_body_size: '{raw}'"))
                }),
            None => Ok(DEFAULT_MAX_BODY_SIZE),
        }
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        log::info!("Configuration Summary:");
        log::info!("  Upload Directory: {}", self.upload_dir.display());
        log::info!("  Temp Prefix: {}", self.temp_prefix);
        log::info!("  NUL Policy: {:?}", self.nul_policy);
        log::info!(
            "  Max Body Size: {} MB",
            self.max_body_size / (1024 * 1024)
        );
        log::info!("  Verbose Logging: {}", self.verbose);
        log::info!("  Detailed Logging: {}", self.detailed_logging);
    }
}
