use std::{fmt, io, path::Path};

use thiserror::Error;

/// Errors that can occur while loading or parsing configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O operation error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// TOML parsing error with location context
    #[error("failed to parse TOML at '{location}': {details}")]
    TomlParse {
        /// Location of TOML being parsed (file path or "string")
        location: String,
        /// Parse error details
        details: String,
    },

    /// A configuration value failed validation
    #[error("invalid config field '{field}': {reason}")]
    InvalidField {
        /// The field that is invalid
        field: String,
        /// Reason why the field is invalid
        reason: String,
    },
}

impl ConfigError {
    /// Creates a TOML parsing error with optional file path context.
    pub fn toml_parse(error: impl fmt::Display, path: Option<&Path>) -> Self {
        let location = match path {
            Some(p) => {
                let clean_path = p.canonicalize().unwrap_or_else(|_| p.to_path_buf());
                clean_path.to_string_lossy().to_string()
            }
            None => "string".to_string(),
        };

        ConfigError::TomlParse {
            location,
            details: error.to_string(),
        }
    }
}
