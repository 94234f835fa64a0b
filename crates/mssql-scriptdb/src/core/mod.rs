//! Core types shared by the scripting pipeline.
//!
//! - [`object`]: object descriptors and the [`ObjectKind`] taxonomy
//! - [`identifier`]: identifier quoting and literal escaping for generated SQL
//! - [`task`]: selectable bulk export tasks

pub mod identifier;
pub mod object;
pub mod task;

pub use identifier::{escape_literal, nstring, qualify_mssql, quote_mssql, validate_identifier};
pub use object::{FunctionKind, ObjectDescriptor, ObjectKind, DEFAULT_SCHEMA};
pub use task::{parse_tasks, task_tokens, Task, TaskPlan};
