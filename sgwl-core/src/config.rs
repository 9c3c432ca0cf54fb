//! Configuration resolution
//!
//! Each setting is taken from the first non-empty source in this order:
//! command-line flag, process environment, settings file. The settings file
//! is parsed into a map and never written into the process environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const ACCESS_KEY_ID_ENV: &str = "ALIBABA_CLOUD_ACCESS_KEY_ID";
pub const ACCESS_KEY_SECRET_ENV: &str = "ALIBABA_CLOUD_ACCESS_KEY_SECRET";
pub const REGION_ID_ENV: &str = "ALIBABA_CLOUD_REGION_ID";
pub const SECURITY_GROUP_ID_ENV: &str = "ALIBABA_CLOUD_SECURITY_GROUP_ID";

/// Default settings file, relative to the working directory
pub const DEFAULT_SETTINGS_FILE: &str = ".env";

/// Errors raised while resolving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more required settings are empty after all sources were consulted
    #[error("missing required settings: {} (set them via flags, environment or settings file)", .0.join(", "))]
    Missing(Vec<&'static str>),

    /// The settings file could not be read
    #[error("failed to read settings file {}: {source}", .path.display())]
    SettingsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A settings file line is not of the form KEY=VALUE
    #[error("invalid line {line} in settings file: expected KEY=VALUE")]
    InvalidLine { line: usize },
}

/// Resolved, immutable configuration for one run
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub access_key_id: String,
    pub access_key_secret: String,
    pub region_id: String,
    pub security_group_id: String,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<redacted>")
            .field("region_id", &self.region_id)
            .field("security_group_id", &self.security_group_id)
            .finish()
    }
}

/// Values given explicitly on the command line
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
    pub region_id: Option<String>,
    pub security_group_id: Option<String>,
}

/// Resolve settings from flags, environment and settings file values
///
/// `env` looks up a process environment variable by name. Empty strings in
/// any source fall through to the next one.
pub fn resolve<E>(
    overrides: &SettingsOverrides,
    env: E,
    file: &HashMap<String, String>,
) -> Result<Settings, ConfigError>
where
    E: Fn(&str) -> Option<String>,
{
    let mut missing = Vec::new();

    let mut pick = |flag: &Option<String>, name: &'static str| -> String {
        let value = non_empty(flag.clone())
            .or_else(|| non_empty(env(name)))
            .or_else(|| non_empty(file.get(name).cloned()));
        match value {
            Some(v) => v,
            None => {
                missing.push(name);
                String::new()
            }
        }
    };

    let settings = Settings {
        access_key_id: pick(&overrides.access_key_id, ACCESS_KEY_ID_ENV),
        access_key_secret: pick(&overrides.access_key_secret, ACCESS_KEY_SECRET_ENV),
        region_id: pick(&overrides.region_id, REGION_ID_ENV),
        security_group_id: pick(&overrides.security_group_id, SECURITY_GROUP_ID_ENV),
    };

    if missing.is_empty() {
        Ok(settings)
    } else {
        Err(ConfigError::Missing(missing))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Read and parse a settings file
pub fn load_settings_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::SettingsFile {
        path: path.to_path_buf(),
        source,
    })?;
    let values = parse_settings(&content)?;
    log::debug!(
        "Loaded {} entries from settings file {}",
        values.len(),
        path.display()
    );
    Ok(values)
}

/// Parse `KEY=VALUE` lines
///
/// Blank lines and `#` comments are skipped, an `export ` prefix is allowed,
/// and values wrapped in matching single or double quotes are unquoted.
/// Later duplicates win.
pub fn parse_settings(content: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut values = HashMap::new();

    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((key, value)) = line.split_once('=') else {
            return Err(ConfigError::InvalidLine { line: index + 1 });
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::InvalidLine { line: index + 1 });
        }

        values.insert(key.to_string(), unquote(value.trim()).to_string());
    }

    Ok(values)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        // Anything after the closing quote, such as a comment, is dropped
        if let Some(end) = value.strip_prefix(quote).and_then(|rest| rest.find(quote)) {
            return &value[1..1 + end];
        }
    }
    // Unquoted values may carry a trailing comment
    match value.find(" #") {
        Some(pos) => value[..pos].trim_end(),
        None => value,
    }
}
