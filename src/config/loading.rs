use std::{fs, path::Path};

use super::{Config, ConfigError};

impl Config {
    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    /// Returns error if the string is not valid TOML or does not match the schema
    pub fn from_toml_str(content: &str) -> Result<Config, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::toml_parse(e, None))?;
        Ok(config.normalized())
    }

    /// Loads a configuration from a TOML file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::toml_parse(e, Some(path)))?;
        Ok(config.normalized())
    }

    fn normalized(mut self) -> Self {
        self.playback = self.playback.normalized();
        self
    }
}
