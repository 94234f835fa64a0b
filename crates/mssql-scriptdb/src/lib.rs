//! # mssql-scriptdb
//!
//! Export SQL Server object definitions into individual, re-runnable script
//! files, one per object, suitable for version control and redeployment.
//!
//! The library provides:
//!
//! - **Schema provider** that scripts objects from the system catalog
//! - **Script normalization** (CREATE to ALTER rewrite, existence guards,
//!   `GO` batch separators, deferred execution of trigger batches in tables)
//! - **Name resolution** for input lists of dotted object names
//! - **Export orchestration** with progress events
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mssql_scriptdb::{Config, MssqlPool, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> mssql_scriptdb::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let pool = MssqlPool::new(config.source.clone()).await?;
//!     let orchestrator = Orchestrator::new(Arc::new(pool), config.export, config.source.database);
//!     let summary = orchestrator.run().await?;
//!     println!("Wrote {} scripts", summary.objects_written);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod resolve;
pub mod script;
pub mod source;

// Re-exports for convenient access
pub use config::{AuthMethod, Config, ExportConfig, SourceConfig};
pub use core::{FunctionKind, ObjectDescriptor, ObjectKind, Task};
pub use error::{Result, ScriptError};
pub use orchestrator::{ExportSummary, ObjectState, Orchestrator, ProgressEvent};
pub use resolve::{NameResolver, QualifiedName, RejectedName, Resolution};
pub use script::{NormalizeOptions, ScriptNormalizer};
pub use source::{HealthCheckResult, MssqlPool, ObjectTypeLookup, SchemaProvider, ScriptFetcher};
