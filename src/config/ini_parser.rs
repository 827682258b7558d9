//! Minimal INI reader for ironform settings
//! Sections, `key = value` pairs, `#`/`;` comments and size suffixes

use crate::error::FormError;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct IniConfig {
    sections: HashMap<String, HashMap<String, String>>,
}

enum IniLine<'a> {
    Blank,
    Section(&'a str),
    Entry(&'a str, &'a str),
}

impl IniConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from file
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, FormError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            FormError::invalid_configuration(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::parse(&content)
    }

    /// Parse INI content. Keys before the first section land in the "" section.
    pub fn parse(content: &str) -> Result<Self, FormError> {
        let mut config = Self::new();
        let mut section = String::new();

        for (index, raw) in content.lines().enumerate() {
            match Self::classify_line(raw, index + 1)? {
                IniLine::Blank => {}
                IniLine::Section(name) => {
                    section = name.to_string();
                    config.sections.entry(section.clone()).or_default();
                }
                IniLine::Entry(key, value) => {
                    config
                        .sections
                        .entry(section.clone())
                        .or_default()
                        .insert(key.to_string(), value.to_string());
                }
            }
        }

        Ok(config)
    }

    fn classify_line(raw: &str, line_number: usize) -> Result<IniLine<'_>, FormError> {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            return Ok(IniLine::Blank);
        }

        if let Some(inner) = line.strip_prefix('[') {
            let name = inner
                .strip_suffix(']')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| {
                    FormError::invalid_configuration(format!(
                        "Invalid section at line {line_number}: {line}"
                    ))
                })?;
            return Ok(IniLine::Section(name));
        }

        let (key, value) = line.split_once('=').ok_or_else(|| {
            FormError::invalid_configuration(format!(
                "Invalid syntax at line {line_number}: {line}"
            ))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(FormError::invalid_configuration(format!(
                "Empty key at line {line_number}: {line}"
            )));
        }

        // Inline comments
        let value = value
            .split(['#', ';'])
            .next()
            .unwrap_or_default()
            .trim();
        Ok(IniLine::Entry(key, value))
    }

    /// Get string value
    pub fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.sections.get(section)?.get(key).cloned()
    }

    /// Get boolean value
    pub fn get_bool(&self, section: &str, key: &str) -> Option<bool> {
        match self.get_string(section, key)?.to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Some(true),
            "false" | "no" | "0" | "off" => Some(false),
            _ => None,
        }
    }

    pub fn get_bool_or(&self, section: &str, key: &str, default: bool) -> bool {
        self.get_bool(section, key).unwrap_or(default)
    }

    /// Parse file size (supports KB, MB, GB, TB suffixes)
    pub fn get_file_size(&self, section: &str, key: &str) -> Option<u64> {
        parse_file_size(&self.get_string(section, key)?)
    }
}

/// Parse sizes like "10GB", "512KB" or "1.5MB" into bytes
fn parse_file_size(value: &str) -> Option<u64> {
    const UNITS: [(&str, u64); 5] = [
        ("TB", 1024 * 1024 * 1024 * 1024),
        ("GB", 1024 * 1024 * 1024),
        ("MB", 1024 * 1024),
        ("KB", 1024),
        ("B", 1),
    ];

    let value = value.trim().to_uppercase();
    if let Ok(bytes) = value.parse::<u64>() {
        return Some(bytes);
    }

    let (number, multiplier) = UNITS
        .iter()
        .find_map(|(suffix, multiplier)| Some((value.strip_suffix(*suffix)?, *multiplier)))?;
    let number = number.trim();

    if let Ok(whole) = number.parse::<u64>() {
        return whole.checked_mul(multiplier);
    }

    // Decimal values like "1.5"
    number
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| (n * multiplier as f64) as u64)
}
