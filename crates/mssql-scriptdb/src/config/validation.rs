//! Configuration validation.

use super::{AuthMethod, Config};
use crate::core::validate_identifier;
use crate::error::{Result, ScriptError};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.source.host.is_empty() {
        return Err(ScriptError::Config("source.host is required".into()));
    }
    if config.source.database.is_empty() {
        return Err(ScriptError::Config("source.database is required".into()));
    }
    if config.source.auth_method() == AuthMethod::Integrated && !cfg!(windows) {
        return Err(ScriptError::Config(
            "Integrated authentication is only supported on Windows; set source.user and source.password".into(),
        ));
    }
    if config.source.port == 0 {
        return Err(ScriptError::Config("source.port must be non-zero".into()));
    }
    validate_identifier(&config.source.database)?;

    Ok(())
}
