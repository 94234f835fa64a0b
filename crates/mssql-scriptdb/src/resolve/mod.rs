//! Resolution of dotted object names from an input list.
//!
//! Each line names one object as `name`, `schema.name` or
//! `database.schema.name`, optionally followed by `.sql` (so a directory
//! listing of previously exported files can be fed back in). Names with three
//! or more dots are rejected: a dot inside an object name cannot be told apart
//! from a separator.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::{ObjectDescriptor, ObjectKind, DEFAULT_SCHEMA};
use crate::error::{Result, ScriptError};
use crate::source::ObjectTypeLookup;

/// A parsed, not yet classified, three-part name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualifiedName {
    pub database: String,
    pub schema: String,
    pub name: String,
}

impl std::fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.database, self.schema, self.name)
    }
}

/// An input line that did not produce a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedName {
    pub input: String,
    pub reason: String,
}

/// Outcome of resolving an input list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub objects: Vec<ObjectDescriptor>,
    pub rejected: Vec<RejectedName>,
}

/// Parse one input line.
///
/// Returns `Ok(None)` for blank lines and `ScriptError::Resolution` for
/// malformed names.
pub fn parse_object_name(line: &str, default_database: &str) -> Result<Option<QualifiedName>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let name = strip_sql_suffix(trimmed);
    let parts: Vec<&str> = name.split('.').collect();

    let (database, schema, object) = match parts.as_slice() {
        [object] => (default_database, DEFAULT_SCHEMA, *object),
        [schema, object] => (default_database, *schema, *object),
        [database, schema, object] => (*database, *schema, *object),
        _ => {
            return Err(ScriptError::Resolution(format!(
                "{} is in wrong format, it should be one-point name like dbo.name or two-point name like db.dbo.name",
                name
            )))
        }
    };

    if database.is_empty() || schema.is_empty() || object.is_empty() {
        return Err(ScriptError::Resolution(format!(
            "{} has an empty name part",
            name
        )));
    }

    Ok(Some(QualifiedName {
        database: database.to_string(),
        schema: schema.to_string(),
        name: object.to_string(),
    }))
}

fn strip_sql_suffix(name: &str) -> &str {
    let len = name.len();
    if len >= 4 && name.is_char_boundary(len - 4) && name[len - 4..].eq_ignore_ascii_case(".sql") {
        &name[..len - 4]
    } else {
        name
    }
}

/// Map a `sys.objects.type` code to a kind exportable from an input list.
///
/// Only stored procedures and user tables are scripted in list mode.
pub fn kind_from_type_code(code: &str) -> Option<ObjectKind> {
    let code = code.trim();
    [ObjectKind::StoredProcedure, ObjectKind::Table]
        .into_iter()
        .find(|kind| kind.type_code() == Some(code))
}

/// Resolves input lines to object descriptors via a metadata lookup.
pub struct NameResolver<'a, L: ObjectTypeLookup + ?Sized> {
    lookup: &'a L,
    default_database: String,
}

impl<'a, L: ObjectTypeLookup + ?Sized> NameResolver<'a, L> {
    pub fn new(lookup: &'a L, default_database: impl Into<String>) -> Self {
        Self {
            lookup,
            default_database: default_database.into(),
        }
    }

    /// Resolve every line. Failures are recorded in [`Resolution::rejected`]
    /// and never stop the remaining lines.
    pub async fn resolve<S: AsRef<str>>(&self, lines: &[S]) -> Resolution {
        let mut resolution = Resolution::default();

        for line in lines {
            let input = line.as_ref().trim();
            let qualified = match parse_object_name(input, &self.default_database) {
                Ok(Some(q)) => q,
                Ok(None) => continue,
                Err(e) => {
                    reject(&mut resolution, input, e.to_string());
                    continue;
                }
            };

            let code = match self.lookup.lookup_type(&qualified).await {
                Ok(Some(code)) => code,
                Ok(None) => {
                    reject(
                        &mut resolution,
                        input,
                        format!("Object {}.{} is not found", qualified.schema, qualified.name),
                    );
                    continue;
                }
                Err(e) => {
                    reject(&mut resolution, input, e.to_string());
                    continue;
                }
            };

            let Some(kind) = kind_from_type_code(&code) else {
                reject(
                    &mut resolution,
                    input,
                    format!("Object type '{}' is not supported in list mode", code.trim()),
                );
                continue;
            };

            match ObjectDescriptor::new(
                qualified.database,
                qualified.schema,
                qualified.name,
                kind,
            ) {
                Ok(descriptor) => {
                    debug!("Resolved {} as {}", input, kind);
                    resolution.objects.push(descriptor);
                }
                Err(e) => reject(&mut resolution, input, e.to_string()),
            }
        }

        resolution
    }
}

fn reject(resolution: &mut Resolution, input: &str, reason: String) {
    warn!("Skipping {}: {}", input, reason);
    resolution.rejected.push(RejectedName {
        input: input.to_string(),
        reason,
    });
}
