//! Existence guards placed in front of exported scripts.
//!
//! Create guards (procedures, views, functions) create a throw-away stub when
//! the object is missing so the `ALTER` that follows always has something to
//! alter. The stub goes through `sp_executesql` because `CREATE PROCEDURE` and
//! friends must otherwise start a batch.
//!
//! Drop guards (triggers, partition objects) remove the object if present so
//! the `CREATE` that follows succeeds.
//!
//! Every guard ends with its own `GO` and a blank line. The table guard is the
//! exception: it is only the `IF NOT EXISTS` condition, and the caller wraps
//! the table body in `BEGIN ... END`.

use super::BATCH_SEPARATOR;
use crate::core::{nstring, qualify_mssql, quote_mssql, FunctionKind, ObjectKind};

/// Guard preamble for an object, or `None` when the kind has no preamble.
///
/// Database-scoped kinds ignore `schema`. User-defined types never get a
/// header. For tables this returns the bare [`table_guard`] condition.
pub fn preamble(kind: ObjectKind, name: &str, schema: &str) -> Option<String> {
    match kind {
        ObjectKind::StoredProcedure => Some(procedure_guard(name, schema)),
        ObjectKind::View => Some(view_guard(name, schema)),
        ObjectKind::Function(f) => Some(function_guard(f, name, schema)),
        ObjectKind::Table => Some(table_guard(name, schema)),
        ObjectKind::Trigger => Some(trigger_drop_guard(name, schema)),
        ObjectKind::DatabaseTrigger => Some(database_trigger_drop_guard(name)),
        ObjectKind::PartitionScheme => Some(partition_scheme_drop_guard(name)),
        ObjectKind::PartitionFunction => Some(partition_function_drop_guard(name)),
        ObjectKind::UserDefinedType => None,
    }
}

/// Stub-creating guard for a stored procedure.
pub fn procedure_guard(name: &str, schema: &str) -> String {
    create_guard(name, schema, "P", "CREATE PROCEDURE {} AS SELECT 1 col")
}

/// Stub-creating guard for a view.
pub fn view_guard(name: &str, schema: &str) -> String {
    create_guard(name, schema, "V", "CREATE VIEW {} AS SELECT 1 col")
}

/// Stub-creating guard for a function; the stub matches the function subtype
/// so a later `ALTER FUNCTION` does not have to change the kind.
pub fn function_guard(kind: FunctionKind, name: &str, schema: &str) -> String {
    let stub = match kind {
        FunctionKind::Inline => "CREATE FUNCTION {}() RETURNS TABLE AS RETURN SELECT 1 a",
        FunctionKind::Scalar => "CREATE FUNCTION {}() RETURNS INT AS BEGIN RETURN 1 END",
        FunctionKind::Table => "CREATE FUNCTION {}() RETURNS @t TABLE (i INT) AS BEGIN RETURN END",
    };
    create_guard(name, schema, kind.type_code(), stub)
}

/// Condition opening a table script's existence block.
pub fn table_guard(name: &str, schema: &str) -> String {
    format!(
        "IF NOT EXISTS (SELECT 1 FROM sys.objects WHERE object_id = OBJECT_ID({}) AND type = N'U')",
        nstring(&qualify_mssql(schema, name))
    )
}

/// Drop guard for a DML trigger.
pub fn trigger_drop_guard(name: &str, schema: &str) -> String {
    let qualified = qualify_mssql(schema, name);
    drop_guard(
        &format!(
            "SELECT 1 FROM sys.objects WHERE object_id = OBJECT_ID({}) AND type = N'TR'",
            nstring(&qualified)
        ),
        &format!("DROP TRIGGER {}", qualified),
    )
}

/// Drop guard for a database-scoped DDL trigger.
pub fn database_trigger_drop_guard(name: &str) -> String {
    drop_guard(
        &format!(
            "SELECT 1 FROM sys.triggers WHERE parent_class = 0 AND name = {}",
            nstring(name)
        ),
        &format!("DROP TRIGGER {} ON DATABASE", quote_mssql(name)),
    )
}

/// Drop guard for a partition scheme.
pub fn partition_scheme_drop_guard(name: &str) -> String {
    drop_guard(
        &format!("SELECT 1 FROM sys.partition_schemes WHERE name = {}", nstring(name)),
        &format!("DROP PARTITION SCHEME {}", quote_mssql(name)),
    )
}

/// Drop guard for a partition function.
pub fn partition_function_drop_guard(name: &str) -> String {
    drop_guard(
        &format!("SELECT 1 FROM sys.partition_functions WHERE name = {}", nstring(name)),
        &format!("DROP PARTITION FUNCTION {}", quote_mssql(name)),
    )
}

fn create_guard(name: &str, schema: &str, type_code: &str, stub_template: &str) -> String {
    let qualified = qualify_mssql(schema, name);
    let stub = stub_template.replacen("{}", &qualified, 1);
    format!(
        "IF NOT EXISTS (SELECT 1 FROM sys.objects WHERE object_id = OBJECT_ID({}) AND type = N'{}')\n  EXEC sp_executesql {}\n{}\n\n",
        nstring(&qualified),
        type_code,
        nstring(&stub),
        BATCH_SEPARATOR
    )
}

fn drop_guard(exists_query: &str, drop_statement: &str) -> String {
    format!(
        "IF EXISTS ({})\n  {}\n{}\n\n",
        exists_query, drop_statement, BATCH_SEPARATOR
    )
}
