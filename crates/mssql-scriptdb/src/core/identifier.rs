//! Identifier validation, bracket quoting and string literal escaping.
//!
//! Object names end up in three places inside generated scripts: as bracketed
//! identifiers (`[dbo].[Orders]`), inside `N'...'` literals passed to
//! `OBJECT_ID`, and inside the nested literal of an `sp_executesql` stub. Each
//! layer has its own escaping rule; the helpers here apply them consistently.

use crate::error::{Result, ScriptError};

/// Maximum identifier length for SQL Server (sysname).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier before it is spliced into SQL text.
///
/// Rejects empty identifiers, identifiers containing null bytes and
/// identifiers longer than `sysname` allows.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ScriptError::Config("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(ScriptError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err(ScriptError::Config(format!(
            "Identifier exceeds maximum length of {} characters: {:?}",
            MAX_IDENTIFIER_LENGTH, name
        )));
    }

    Ok(())
}

/// Quote a SQL Server identifier using brackets.
///
/// Closing brackets are doubled.
///
/// ```ignore
/// assert_eq!(quote_mssql("users"), "[users]");
/// assert_eq!(quote_mssql("table]name"), "[table]]name]");
/// ```
pub fn quote_mssql(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Qualify an object name with its schema, both bracket-quoted.
pub fn qualify_mssql(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_mssql(schema), quote_mssql(name))
}

/// Escape text for use inside a T-SQL string literal (`'` doubled).
pub fn escape_literal(text: &str) -> String {
    text.replace('\'', "''")
}

/// Render a Unicode string literal: `N'...'`.
pub fn nstring(text: &str) -> String {
    format!("N'{}'", escape_literal(text))
}
