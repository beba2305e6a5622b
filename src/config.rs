//! Configuration for datatype canonicalization
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (datatypes.toml)
//! - Environment variables (DATATYPES__*)
//!
//! ## Example config file (datatypes.toml):
//! ```toml
//! [naming]
//! prefix = "datatype"
//!
//! [batching]
//! dedup_identical_declarations = true
//!
//! [closure]
//! cycle_policy = "allow"
//!
//! [output]
//! format = "pretty"
//! ```

use config_crate::{Config, Environment, File};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{DatatypeError, Result};
use crate::graph::CyclePolicy;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanonConfig {
    #[serde(default)]
    pub naming: NamingConfig,

    #[serde(default)]
    pub batching: BatchingConfig,

    #[serde(default)]
    pub closure: ClosureConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Generated name settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Prefix of every generated datatype name
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

/// Cross-source batching settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchingConfig {
    /// Process sources with identical declarations once
    #[serde(default = "default_true")]
    pub dedup_identical_declarations: bool,
}

/// Closure extraction settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClosureConfig {
    #[serde(default)]
    pub cycle_policy: CyclePolicy,
}

/// Output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

impl OutputFormat {
    /// Serialize a value in this format
    pub fn to_json<T: Serialize>(&self, value: &T) -> serde_json::Result<String> {
        match self {
            OutputFormat::Pretty => serde_json::to_string_pretty(value),
            OutputFormat::Compact => serde_json::to_string(value),
        }
    }
}

fn default_prefix() -> String {
    "datatype".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
        }
    }
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            dedup_identical_declarations: true,
        }
    }
}

impl CanonConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, adding a required file on top of the defaults
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_locations = [
            "datatypes.toml",
            ".datatypes.toml",
            "config/datatypes.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "datatypes") {
            let xdg_config = config_dir.config_dir().join("datatypes.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // DATATYPES__NAMING__PREFIX=topic
        builder = builder.add_source(
            Environment::with_prefix("DATATYPES")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check values the type system cannot
    pub fn validate(&self) -> Result<()> {
        // Must not end in a digit, or "{prefix}{batch}" could be ambiguous
        let prefix_pattern = Regex::new(r"^[A-Za-z_/](?:[A-Za-z0-9_/]*[A-Za-z_/])?$")
            .map_err(|e| DatatypeError::InvalidConfig(e.to_string()))?;
        if !prefix_pattern.is_match(&self.naming.prefix) {
            return Err(DatatypeError::InvalidConfig(format!(
                "naming.prefix {:?} may only contain letters, digits, '_' or '/' and must not start or end with a digit",
                self.naming.prefix
            )));
        }
        Ok(())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| DatatypeError::InvalidConfig(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
