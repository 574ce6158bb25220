use std::env;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ConfigError;
use crate::extractor::{PairingMode, TargetKeys};

pub const DEFAULT_OUTPUT_SUFFIX: &str = ".ids";

pub const SUFFIX_VAR: &str = "LOG_IDS_SUFFIX";
pub const EVENT_KEY_VAR: &str = "LOG_IDS_EVENT_KEY";
pub const MODEL_KEY_VAR: &str = "LOG_IDS_MODEL_KEY";
pub const PAIRING_VAR: &str = "LOG_IDS_PAIRING";
pub const DIAGNOSTICS_VAR: &str = "LOG_IDS_DIAGNOSTICS";

/// How a line that is not valid JSON is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Diagnostics {
    /// Malformed lines are reported exactly like lines without an event id.
    #[default]
    Collapsed,
    /// Malformed lines get their own error carrying the scanner failure.
    Detailed,
}

impl FromStr for Diagnostics {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "collapsed" => Ok(Self::Collapsed),
            "detailed" => Ok(Self::Detailed),
            _ => Err(ConfigError::InvalidValue {
                name: "diagnostics",
                value: s.to_string(),
                expected: "collapsed, detailed",
            }),
        }
    }
}

impl FromStr for PairingMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            _ => Err(ConfigError::InvalidValue {
                name: "pairing",
                value: s.to_string(),
                expected: "strict, lenient",
            }),
        }
    }
}

/// Settings for an indexing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerConfig {
    /// Appended to the input path to name the output file.
    pub output_suffix: String,
    pub keys: TargetKeys,
    pub pairing: PairingMode,
    pub diagnostics: Diagnostics,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
            keys: TargetKeys::default(),
            pairing: PairingMode::default(),
            diagnostics: Diagnostics::default(),
        }
    }
}

impl IndexerConfig {
    /// Load settings from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build settings from an arbitrary variable source. Unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(suffix) = lookup(SUFFIX_VAR) {
            config.output_suffix = suffix;
        }
        if let Some(key) = lookup(EVENT_KEY_VAR) {
            config.keys.event = key.into_bytes();
        }
        if let Some(key) = lookup(MODEL_KEY_VAR) {
            config.keys.model = key.into_bytes();
        }
        if let Some(mode) = lookup(PAIRING_VAR) {
            config.pairing = mode.parse()?;
        }
        if let Some(mode) = lookup(DIAGNOSTICS_VAR) {
            config.diagnostics = mode.parse()?;
        }
        config.validate()?;
        Ok(config)
    }

    /// An empty suffix would point the output at the input file itself.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_suffix.is_empty() {
            return Err(ConfigError::Empty { name: "output suffix" });
        }
        if self.keys.event.is_empty() {
            return Err(ConfigError::Empty { name: "event key" });
        }
        if self.keys.model.is_empty() {
            return Err(ConfigError::Empty { name: "model key" });
        }
        Ok(())
    }
}
