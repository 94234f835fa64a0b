//! Error types for the script export library.

use std::path::PathBuf;
use thiserror::Error;

/// Exit code for configuration errors (bad YAML, missing destination, ...).
pub const EXIT_CONFIG_ERROR: u8 = 1;

/// Exit code for connection and pool errors.
pub const EXIT_CONNECTION_ERROR: u8 = 2;

/// Exit code for scripting and name resolution errors.
pub const EXIT_SCRIPT_ERROR: u8 = 3;

/// Exit code for artifact write failures.
pub const EXIT_WRITE_ERROR: u8 = 4;

/// Exit code for other IO errors (config file not found, ...).
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for export operations.
#[derive(Error, Debug)]
pub enum ScriptError {
    /// Configuration error (invalid YAML, missing fields, missing path, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source database connection or query error
    #[error("Source database error: {0}")]
    Source(#[from] tiberius::error::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Dotted object name could not be resolved to an object
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// The schema provider failed to produce the script of an object
    #[error("Scripting failed for {object}: {message}")]
    Fetch { object: String, message: String },

    /// An artifact could not be written
    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScriptError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        ScriptError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Fetch error
    pub fn fetch(object: impl Into<String>, message: impl Into<String>) -> Self {
        ScriptError::Fetch {
            object: object.into(),
            message: message.into(),
        }
    }

    /// Create a Write error
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScriptError::Write {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            ScriptError::Config(_) | ScriptError::Yaml(_) | ScriptError::Json(_) => {
                EXIT_CONFIG_ERROR
            }
            ScriptError::Source(_) | ScriptError::Pool { .. } => EXIT_CONNECTION_ERROR,
            ScriptError::Resolution(_) | ScriptError::Fetch { .. } => EXIT_SCRIPT_ERROR,
            ScriptError::Write { .. } => EXIT_WRITE_ERROR,
            ScriptError::Io(_) => EXIT_IO_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for export operations.
pub type Result<T> = std::result::Result<T, ScriptError>;
