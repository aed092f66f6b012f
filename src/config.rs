//! Session configuration
//!
//! Loaded from a TOML file; every field has a default so an empty file (or
//! no file at all) gives the behaviour of the original command tool.
//!
//! ```toml
//! dump_on_fault = true
//! terminate_on_fault = true
//! output_format = "json"
//! log_level = "debug"
//! log_dir = "logs"
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How dumps are written to the output stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// The `+++++DUMP+++++` text report
    #[default]
    Text,
    /// One JSON object per dump
    Json,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(Error::Config(format!("unknown output format: {}", other))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Dump the heap after a segmentation fault
    pub dump_on_fault: bool,
    /// End the session after a segmentation fault
    pub terminate_on_fault: bool,
    /// Dump format
    pub output_format: OutputFormat,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Directory for rolling log files
    pub log_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dump_on_fault: true,
            terminate_on_fault: true,
            output_format: OutputFormat::Text,
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl SessionConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(format!("invalid TOML: {}", e)))
    }

    /// Load a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() -> Result<()> {
        assert_eq!(SessionConfig::from_toml("")?, SessionConfig::default());
        Ok(())
    }

    #[test]
    fn test_partial_toml() -> Result<()> {
        let config = SessionConfig::from_toml(
            r#"
            terminate_on_fault = false
            output_format = "json"
            log_dir = "/tmp/sflheap"
            "#,
        )?;

        assert!(config.dump_on_fault);
        assert!(!config.terminate_on_fault);
        assert_eq!(config.output_format, OutputFormat::Json);
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/sflheap")));
        assert_eq!(config.log_level, "info");
        Ok(())
    }

    #[test]
    fn test_bad_toml_is_a_config_error() {
        assert!(matches!(
            SessionConfig::from_toml("output_format = \"xml\""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() -> Result<()> {
        let path = std::env::temp_dir().join(format!("sflheap_config_{}.toml", std::process::id()));
        std::fs::write(&path, "dump_on_fault = false\n")?;

        let config = SessionConfig::load(&path)?;
        assert!(!config.dump_on_fault);

        std::fs::remove_file(path).ok();
        Ok(())
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>().ok(), Some(OutputFormat::Json));
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
