//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::{parse_tasks, Task, TaskPlan};
use crate::script::NormalizeOptions;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (MSSQL).
    pub source: SourceConfig,

    /// Export behavior configuration.
    #[serde(default)]
    pub export: ExportConfig,
}

/// How the source connection authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// SQL Server login with user and password.
    #[default]
    SqlServer,

    /// Windows integrated authentication (SSPI).
    Integrated,
}

/// Source database (MSSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 1433).
    #[serde(default = "default_mssql_port")]
    pub port: u16,

    /// Database to script; also the default database for list-mode names.
    pub database: String,

    /// Authentication method (default: sql_server).
    #[serde(default)]
    pub auth: AuthMethod,

    /// Username (SQL Server authentication). Leaving it empty selects
    /// integrated authentication.
    #[serde(default)]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Encrypt connection (default: true).
    #[serde(default = "default_true")]
    pub encrypt: bool,

    /// Trust server certificate (default: false).
    #[serde(default)]
    pub trust_server_cert: bool,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("auth", &self.auth)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .finish()
    }
}

/// Export behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Destination root folder. Required for bulk export; list mode falls
    /// back to the current directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Task tokens (SPROC, TABLE, UDF, UDT, VIEW, TRIG, PS, PF).
    #[serde(default = "default_tasks")]
    pub tasks: Vec<String>,

    /// Rewrite CREATE to ALTER for procedures, views and functions (default: true).
    #[serde(default = "default_true")]
    pub script_as_alter: bool,

    /// Emit existence guards (default: true).
    #[serde(default = "default_true")]
    pub use_headers: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            path: None,
            tasks: default_tasks(),
            script_as_alter: true,
            use_headers: true,
        }
    }
}

impl ExportConfig {
    /// Normalizer options derived from this configuration.
    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            script_as_alter: self.script_as_alter,
            use_headers: self.use_headers,
        }
    }

    /// Parsed task selection.
    pub fn task_plan(&self) -> TaskPlan {
        parse_tasks(&self.tasks)
    }
}

fn default_tasks() -> Vec<String> {
    Task::ALL.iter().map(|t| t.token().to_string()).collect()
}

fn default_mssql_port() -> u16 {
    1433
}

fn default_true() -> bool {
    true
}
