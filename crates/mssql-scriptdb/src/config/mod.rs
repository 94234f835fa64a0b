//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::{Path, PathBuf};

use crate::error::{Result, ScriptError};

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl SourceConfig {
    /// Whether TLS is requested for the connection.
    pub fn encryption_enabled(&self) -> bool {
        self.encrypt
    }

    /// Effective authentication method: an empty user means integrated.
    pub fn auth_method(&self) -> AuthMethod {
        if self.user.is_empty() {
            AuthMethod::Integrated
        } else {
            self.auth
        }
    }
}

impl ExportConfig {
    /// Destination root for a bulk export. It must already exist.
    pub fn check_destination(&self) -> Result<PathBuf> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| ScriptError::Config("export.path is required".into()))?;
        if !path.is_dir() {
            return Err(ScriptError::Config(format!(
                "Path {} does not exist or is not a directory",
                path.display()
            )));
        }
        Ok(path.clone())
    }

    /// Destination root for list mode: the configured path or the current
    /// directory.
    pub fn list_destination(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}
