//! Turns raw scripter batches into deployable, re-runnable script files.
//!
//! The `CREATE` → `ALTER` rewrite is a regular-expression substitution on the
//! first matching keyword sequence of each batch. It is not a SQL parser: a
//! batch that does not match (already `ALTER`, `CREATE OR ALTER`, ...) is
//! emitted unchanged, and a match inside a leading comment is rewritten too.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::headers;
use super::BATCH_SEPARATOR;
use crate::core::{nstring, ObjectDescriptor, ObjectKind};

static CREATE_PROCEDURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bCREATE\s+PROC(?:EDURE)?\s").expect("valid regex"));
static CREATE_VIEW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bCREATE\s+VIEW\s").expect("valid regex"));
static CREATE_FUNCTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bCREATE\s+FUNCTION\s").expect("valid regex"));
static CREATE_TRIGGER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bCREATE\s+(?:OR\s+ALTER\s+)?TRIGGER\b").expect("valid regex")
});

/// Initial capacity of the reusable output buffer.
const BUFFER_CAPACITY: usize = 64 * 1024;

/// Switches that shape the generated artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeOptions {
    /// Rewrite `CREATE` to `ALTER` for procedures, views and functions.
    pub script_as_alter: bool,
    /// Prepend existence guards.
    pub use_headers: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            script_as_alter: true,
            use_headers: true,
        }
    }
}

/// Script normalizer with a reusable output buffer.
///
/// The buffer is cleared at the start of every [`normalize`](Self::normalize)
/// call, so no text from a previous object can leak into the next artifact.
#[derive(Debug)]
pub struct ScriptNormalizer {
    options: NormalizeOptions,
    buffer: String,
}

impl ScriptNormalizer {
    pub fn new(options: NormalizeOptions) -> Self {
        Self {
            options,
            buffer: String::with_capacity(BUFFER_CAPACITY),
        }
    }

    /// Build the artifact for one object from its raw batches.
    pub fn normalize(&mut self, object: &ObjectDescriptor, batches: &[String]) -> &str {
        self.buffer.clear();

        let schema = object.schema_or_default();
        match object.kind {
            ObjectKind::StoredProcedure => {
                self.module(object, batches, &CREATE_PROCEDURE, "ALTER PROCEDURE ")
            }
            ObjectKind::View => self.module(object, batches, &CREATE_VIEW, "ALTER VIEW "),
            ObjectKind::Function(_) => {
                self.module(object, batches, &CREATE_FUNCTION, "ALTER FUNCTION ")
            }
            ObjectKind::Table => self.table(&object.name, schema, batches),
            ObjectKind::Trigger
            | ObjectKind::DatabaseTrigger
            | ObjectKind::PartitionScheme
            | ObjectKind::PartitionFunction => {
                if self.options.use_headers {
                    if let Some(guard) = headers::preamble(object.kind, &object.name, schema) {
                        self.buffer.push_str(&guard);
                    }
                }
                for batch in batches {
                    self.push_batch(batch);
                }
            }
            // Headers are intentionally not generated for user-defined types.
            ObjectKind::UserDefinedType => {
                for batch in batches {
                    self.push_batch(batch);
                }
            }
        }

        &self.buffer
    }

    fn module(
        &mut self,
        object: &ObjectDescriptor,
        batches: &[String],
        create: &Regex,
        alter: &str,
    ) {
        if self.options.use_headers {
            if let Some(guard) =
                headers::preamble(object.kind, &object.name, object.schema_or_default())
            {
                self.buffer.push_str(&guard);
            }
        }

        for batch in batches {
            if self.options.script_as_alter {
                let rewritten = create.replace(batch, alter);
                self.push_batch(&rewritten);
            } else {
                self.push_batch(batch);
            }
        }
    }

    fn table(&mut self, name: &str, schema: &str, batches: &[String]) {
        let split = batches.len().min(2);
        let (header, body) = batches.split_at(split);

        // SET options emitted by the scripter always come first.
        for batch in header {
            self.push_batch(batch);
        }

        if body.is_empty() {
            return;
        }

        if self.options.use_headers {
            // Body batches share one IF ... BEGIN/END block: a GO inside it
            // would split the block, so the separator only follows END.
            self.push_line(&headers::table_guard(name, schema));
            self.push_line("BEGIN");
            for batch in body {
                if is_trigger_batch(batch) {
                    self.push_line(&deferred(batch));
                } else {
                    self.push_line(batch);
                }
            }
            self.push_line("END");
            self.push_line(BATCH_SEPARATOR);
        } else {
            for batch in body {
                if is_trigger_batch(batch) {
                    self.push_batch(&deferred(batch));
                } else {
                    self.push_batch(batch);
                }
            }
        }
    }

    fn push_line(&mut self, text: &str) {
        self.buffer.push_str(text);
        self.buffer.push('\n');
    }

    fn push_batch(&mut self, text: &str) {
        self.push_line(text);
        self.push_line(BATCH_SEPARATOR);
    }
}

impl Default for ScriptNormalizer {
    fn default() -> Self {
        Self::new(NormalizeOptions::default())
    }
}

/// One-shot normalization.
pub fn normalize(object: &ObjectDescriptor, batches: &[String], options: NormalizeOptions) -> String {
    ScriptNormalizer::new(options).normalize(object, batches).to_string()
}

/// Whether a batch contains a trigger creation statement.
pub fn is_trigger_batch(batch: &str) -> bool {
    CREATE_TRIGGER.is_match(batch)
}

/// Wrap a statement in `sp_executesql` so it can live inside a block.
fn deferred(statement: &str) -> String {
    format!("EXEC sp_executesql {}", nstring(statement))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FunctionKind;

    fn obj(kind: ObjectKind, name: &str) -> ObjectDescriptor {
        ObjectDescriptor::new("TestDB", "dbo", name, kind).unwrap()
    }

    fn batches(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn opts(script_as_alter: bool, use_headers: bool) -> NormalizeOptions {
        NormalizeOptions {
            script_as_alter,
            use_headers,
        }
    }

    fn strip_preamble<'a>(artifact: &'a str, guard: &str) -> &'a str {
        artifact.strip_prefix(guard).expect("artifact starts with guard")
    }

    #[test]
    fn test_view_end_to_end() {
        let view = obj(ObjectKind::View, "V1");
        let out = normalize(&view, &batches(&["CREATE VIEW dbo.V1 AS SELECT 1"]), opts(true, true));

        let guard = headers::view_guard("V1", "dbo");
        assert!(out.starts_with(&guard));
        assert_eq!(strip_preamble(&out, &guard), "ALTER VIEW dbo.V1 AS SELECT 1\nGO\n");
    }

    #[test]
    fn test_procedure_rewrite_any_case_and_whitespace() {
        let proc_ = obj(ObjectKind::StoredProcedure, "P");
        for raw in [
            "CREATE PROCEDURE dbo.P AS SELECT 1",
            "create proc dbo.P AS SELECT 1",
            "Create\t\n  Procedure dbo.P AS SELECT 1",
            "CrEaTe   PrOc\ndbo.P AS SELECT 1",
        ] {
            let out = normalize(&proc_, &batches(&[raw]), opts(true, false));
            assert!(out.starts_with("ALTER PROCEDURE dbo.P"), "raw: {raw:?} -> {out:?}");
        }
    }

    #[test]
    fn test_function_rewrite_uses_subtype_guard() {
        let func = obj(ObjectKind::Function(FunctionKind::Inline), "fnRows");
        let raw = batches(&[
            "SET ANSI_NULLS ON",
            "SET QUOTED_IDENTIFIER ON",
            "CREATE   FUNCTION [dbo].[fnRows]() RETURNS TABLE AS RETURN SELECT 1 a",
        ]);
        let out = normalize(&func, &raw, opts(true, true));

        let guard = headers::function_guard(FunctionKind::Inline, "fnRows", "dbo");
        assert_eq!(
            strip_preamble(&out, &guard),
            "SET ANSI_NULLS ON\nGO\nSET QUOTED_IDENTIFIER ON\nGO\n\
             ALTER FUNCTION [dbo].[fnRows]() RETURNS TABLE AS RETURN SELECT 1 a\nGO\n"
        );
    }

    #[test]
    fn test_rewrite_only_touches_first_occurrence() {
        let proc_ = obj(ObjectKind::StoredProcedure, "Gen");
        let raw = batches(&["CREATE PROCEDURE dbo.Gen AS EXEC('CREATE PROCEDURE dbo.X AS SELECT 1')"]);
        let out = normalize(&proc_, &raw, opts(true, false));
        assert_eq!(
            out,
            "ALTER PROCEDURE dbo.Gen AS EXEC('CREATE PROCEDURE dbo.X AS SELECT 1')\nGO\n"
        );
    }

    #[test]
    fn test_unmatched_batch_is_left_alone() {
        let view = obj(ObjectKind::View, "V");
        let raw = batches(&["CREATE OR ALTER VIEW dbo.V AS SELECT 1"]);
        let out = normalize(&view, &raw, opts(true, false));
        assert_eq!(out, "CREATE OR ALTER VIEW dbo.V AS SELECT 1\nGO\n");
    }

    #[test]
    fn test_force_create_keeps_create() {
        let proc_ = obj(ObjectKind::StoredProcedure, "P");
        let out = normalize(&proc_, &batches(&["CREATE PROCEDURE dbo.P AS SELECT 1"]), opts(false, false));
        assert_eq!(out, "CREATE PROCEDURE dbo.P AS SELECT 1\nGO\n");
    }

    #[test]
    fn test_no_headers_is_plain_join_for_non_table_kinds() {
        let raw = batches(&["SET ANSI_NULLS ON", "SELECT 1", "GRANT EXECUTE ON [dbo].[X] TO [app]"]);
        let expected = "SET ANSI_NULLS ON\nGO\nSELECT 1\nGO\nGRANT EXECUTE ON [dbo].[X] TO [app]\nGO\n";
        for kind in [
            ObjectKind::StoredProcedure,
            ObjectKind::View,
            ObjectKind::Function(FunctionKind::Scalar),
            ObjectKind::Trigger,
            ObjectKind::DatabaseTrigger,
            ObjectKind::PartitionScheme,
            ObjectKind::PartitionFunction,
            ObjectKind::UserDefinedType,
        ] {
            let out = normalize(&obj(kind, "X"), &raw, opts(false, false));
            assert_eq!(out, expected, "kind {kind:?}");
        }
    }

    #[test]
    fn test_trigger_gets_drop_guard_without_rewrite() {
        let trg = obj(ObjectKind::Trigger, "trgAudit");
        let raw = batches(&["CREATE TRIGGER [dbo].[trgAudit] ON [dbo].[T] AFTER INSERT AS SELECT 1"]);
        let out = normalize(&trg, &raw, opts(true, true));

        let guard = headers::trigger_drop_guard("trgAudit", "dbo");
        assert_eq!(
            strip_preamble(&out, &guard),
            "CREATE TRIGGER [dbo].[trgAudit] ON [dbo].[T] AFTER INSERT AS SELECT 1\nGO\n"
        );
    }

    #[test]
    fn test_partition_objects_get_drop_guards() {
        let pf = ObjectDescriptor::database_scoped("TestDB", "pfYear", ObjectKind::PartitionFunction)
            .unwrap();
        let out = normalize(
            &pf,
            &batches(&["CREATE PARTITION FUNCTION [pfYear](int) AS RANGE LEFT FOR VALUES (2020)"]),
            opts(true, true),
        );
        assert!(out.starts_with(&headers::partition_function_drop_guard("pfYear")));
        assert!(out.ends_with("FOR VALUES (2020)\nGO\n"));
    }

    #[test]
    fn test_user_type_never_gets_header() {
        let udt = obj(ObjectKind::UserDefinedType, "Phone");
        let out = normalize(&udt, &batches(&["CREATE TYPE [dbo].[Phone] FROM [varchar](20) NULL"]), opts(true, true));
        assert_eq!(out, "CREATE TYPE [dbo].[Phone] FROM [varchar](20) NULL\nGO\n");
    }

    fn table_batches() -> Vec<String> {
        batches(&[
            "SET ANSI_NULLS ON",
            "SET QUOTED_IDENTIFIER ON",
            "CREATE TABLE [dbo].[T](\n\t[Id] [int] NOT NULL\n) ON [PRIMARY]",
            "CREATE TRIGGER [dbo].[trgT] ON [dbo].[T] AFTER INSERT AS PRINT 'inserted'",
            "ALTER TABLE [dbo].[T] ADD CONSTRAINT [DF_T_Id] DEFAULT ((0)) FOR [Id]",
        ])
    }

    #[test]
    fn test_table_with_headers() {
        let table = obj(ObjectKind::Table, "T");
        let out = normalize(&table, &table_batches(), opts(true, true));

        let expected = format!(
            "SET ANSI_NULLS ON\nGO\nSET QUOTED_IDENTIFIER ON\nGO\n{}\nBEGIN\n\
             CREATE TABLE [dbo].[T](\n\t[Id] [int] NOT NULL\n) ON [PRIMARY]\n\
             EXEC sp_executesql N'CREATE TRIGGER [dbo].[trgT] ON [dbo].[T] AFTER INSERT AS PRINT ''inserted'''\n\
             ALTER TABLE [dbo].[T] ADD CONSTRAINT [DF_T_Id] DEFAULT ((0)) FOR [Id]\n\
             END\nGO\n",
            headers::table_guard("T", "dbo")
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn test_table_without_headers() {
        let table = obj(ObjectKind::Table, "T");
        let out = normalize(&table, &table_batches(), opts(true, false));

        assert_eq!(
            out,
            "SET ANSI_NULLS ON\nGO\nSET QUOTED_IDENTIFIER ON\nGO\n\
             CREATE TABLE [dbo].[T](\n\t[Id] [int] NOT NULL\n) ON [PRIMARY]\nGO\n\
             EXEC sp_executesql N'CREATE TRIGGER [dbo].[trgT] ON [dbo].[T] AFTER INSERT AS PRINT ''inserted'''\nGO\n\
             ALTER TABLE [dbo].[T] ADD CONSTRAINT [DF_T_Id] DEFAULT ((0)) FOR [Id]\nGO\n"
        );
    }

    #[test]
    fn test_table_starts_with_first_two_batches() {
        let table = obj(ObjectKind::Table, "T");
        for (alter, headers_on) in [(true, true), (true, false), (false, true), (false, false)] {
            let out = normalize(&table, &table_batches(), opts(alter, headers_on));
            assert!(out.starts_with("SET ANSI_NULLS ON\nGO\nSET QUOTED_IDENTIFIER ON\nGO\n"));
        }
    }

    #[test]
    fn test_table_trigger_never_top_level() {
        let table = obj(ObjectKind::Table, "T");
        for headers_on in [true, false] {
            let out = normalize(&table, &table_batches(), opts(true, headers_on));
            for line in out.lines() {
                if line.contains("CREATE TRIGGER") {
                    assert!(line.starts_with("EXEC sp_executesql N'CREATE TRIGGER"), "{line}");
                }
            }
        }
    }

    #[test]
    fn test_table_trigger_detection_is_case_insensitive() {
        assert!(is_trigger_batch("create   trigger x on t after insert as select 1"));
        assert!(is_trigger_batch("CREATE OR ALTER TRIGGER x ON t AFTER INSERT AS SELECT 1"));
        assert!(!is_trigger_batch("ALTER TABLE [dbo].[T] ENABLE TRIGGER [trgT]"));
    }

    #[test]
    fn test_table_with_only_header_batches() {
        let table = obj(ObjectKind::Table, "T");
        let out = normalize(&table, &batches(&["SET ANSI_NULLS ON"]), opts(true, true));
        assert_eq!(out, "SET ANSI_NULLS ON\nGO\n");
    }

    #[test]
    fn test_buffer_is_reset_between_objects() {
        let mut normalizer = ScriptNormalizer::new(opts(true, true));
        let big = normalizer
            .normalize(&obj(ObjectKind::Table, "T"), &table_batches())
            .to_string();
        assert!(big.contains("CREATE TABLE"));

        let small = normalizer
            .normalize(&obj(ObjectKind::UserDefinedType, "U"), &batches(&["CREATE TYPE [dbo].[U] FROM int NULL"]))
            .to_string();
        assert_eq!(small, "CREATE TYPE [dbo].[U] FROM int NULL\nGO\n");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut normalizer = ScriptNormalizer::default();
        let proc_ = obj(ObjectKind::StoredProcedure, "P");
        let raw = batches(&["SET ANSI_NULLS ON", "CREATE PROCEDURE dbo.P AS SELECT 1"]);
        let first = normalizer.normalize(&proc_, &raw).to_string();
        let second = normalizer.normalize(&proc_, &raw).to_string();
        assert_eq!(first, second);
        assert_eq!(first, normalize(&proc_, &raw, NormalizeOptions::default()));
    }
}
