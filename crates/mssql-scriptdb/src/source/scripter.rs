//! Rendering of catalog metadata into raw script batches.
//!
//! Every function here is pure: the provider loads metadata, these functions
//! turn it into the ordered batch list the normalizer consumes. Batches never
//! contain a `GO` separator.

use crate::core::{nstring, qualify_mssql, quote_mssql, ObjectDescriptor, ObjectKind};

use super::types::{
    CheckConstraint, Column, DefaultConstraint, ExtendedProperty, ForeignKey, Index,
    ModuleDefinition, ObjectExtras, PartitionFunctionDefinition, PartitionSchemeDefinition,
    Permission, TableDefinition, TriggerParent, UserTypeDefinition,
};

/// `SET ANSI_NULLS` and `SET QUOTED_IDENTIFIER` batches.
pub fn set_options(ansi_nulls: bool, quoted_identifier: bool) -> [String; 2] {
    [
        format!("SET ANSI_NULLS {}", on_off(ansi_nulls)),
        format!("SET QUOTED_IDENTIFIER {}", on_off(quoted_identifier)),
    ]
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "ON"
    } else {
        "OFF"
    }
}

/// Batches for a procedure, view, function or trigger.
pub fn module_batches(
    object: &ObjectDescriptor,
    module: &ModuleDefinition,
    extras: &ObjectExtras,
) -> Vec<String> {
    let mut batches: Vec<String> =
        set_options(module.uses_ansi_nulls, module.uses_quoted_identifier).into();
    batches.push(module.definition.trim().to_string());

    if let Some(trigger) = &module.trigger {
        if trigger.is_disabled {
            batches.push(match &trigger.parent {
                Some(parent) => format!(
                    "DISABLE TRIGGER {} ON {}",
                    qualify_mssql(object.schema_or_default(), &object.name),
                    qualify_mssql(&parent.schema, &parent.name)
                ),
                None => format!("DISABLE TRIGGER {} ON DATABASE", quote_mssql(&object.name)),
            });
        }
    }

    if object.kind.is_schema_scoped() {
        let securable = qualify_mssql(object.schema_or_default(), &object.name);
        batches.extend(extras.permissions.iter().map(|p| permission_statement(p, &securable)));

        let parent = module.trigger.as_ref().and_then(|t| t.parent.as_ref());
        for prop in &extras.extended_properties {
            let levels = property_levels(object, parent, prop.column.as_deref());
            batches.push(extended_property_statement(prop, &levels));
        }
    }

    batches
}

/// Batches for a table: the two `SET` options, then `CREATE TABLE` and the
/// dependent statements (indexes, defaults, foreign keys, checks, permissions,
/// extended properties).
pub fn table_batches(table: &TableDefinition) -> Vec<String> {
    let qualified = qualify_mssql(&table.schema, &table.name);
    let mut batches: Vec<String> = set_options(table.uses_ansi_nulls, true).into();

    batches.push(create_table_statement(table));

    for index in table.indexes.iter().filter(|i| !i.is_constraint()) {
        batches.push(create_index_statement(&qualified, index));
    }

    for default in &table.defaults {
        batches.push(default_constraint_statement(&qualified, default));
    }

    for fk in &table.foreign_keys {
        batches.push(foreign_key_statement(&qualified, fk));
        batches.push(constraint_state_statement(&qualified, &fk.name, fk.is_disabled));
    }

    for check in &table.check_constraints {
        batches.push(check_constraint_statement(&qualified, check));
        batches.push(constraint_state_statement(&qualified, &check.name, check.is_disabled));
    }

    batches.extend(
        table
            .extras
            .permissions
            .iter()
            .map(|p| permission_statement(p, &qualified)),
    );

    for prop in &table.extras.extended_properties {
        let mut levels = vec![
            ("SCHEMA", table.schema.clone()),
            ("TABLE", table.name.clone()),
        ];
        if let Some(column) = &prop.column {
            levels.push(("COLUMN", column.clone()));
        }
        batches.push(extended_property_statement(prop, &levels));
    }

    batches
}

/// `CREATE TABLE` with columns and inline key constraints.
pub fn create_table_statement(table: &TableDefinition) -> String {
    let mut lines: Vec<String> = table.columns.iter().map(column_definition).collect();

    for index in table.indexes.iter().filter(|i| i.is_constraint()) {
        lines.push(key_constraint_definition(index));
    }

    let mut sql = format!(
        "CREATE TABLE {}(\n\t{}\n)",
        qualify_mssql(&table.schema, &table.name),
        lines.join(",\n\t")
    );
    sql.push_str(&data_space_clause(
        table.data_space.as_deref(),
        table.partition_column.as_deref(),
    ));
    sql
}

/// One column line of `CREATE TABLE`.
pub fn column_definition(col: &Column) -> String {
    let name = quote_mssql(&col.name);

    if let Some(expr) = &col.computed {
        let persisted = if col.is_persisted { " PERSISTED" } else { "" };
        return format!("{} AS {}{}", name, expr, persisted);
    }

    let mut sql = format!("{} {}", name, format_column_type(col));

    if let Some(collation) = col.collation.as_deref().filter(|_| !col.is_user_type) {
        sql.push_str(" COLLATE ");
        sql.push_str(collation);
    }

    if let Some((seed, increment)) = &col.identity {
        sql.push_str(&format!(" IDENTITY({},{})", seed, increment));
    }

    sql.push_str(if col.is_nullable { " NULL" } else { " NOT NULL" });
    sql
}

/// Column type as written in DDL; user types are schema-qualified.
pub fn format_column_type(col: &Column) -> String {
    if col.is_user_type {
        qualify_mssql(&col.type_schema, &col.data_type)
    } else {
        format_mssql_type(&col.data_type, col.max_length, col.precision, col.scale)
    }
}

/// Format a system type with its length, precision or scale.
///
/// `max_length` is in bytes as reported by `sys.columns`/`sys.types`, so
/// Unicode character types are halved.
pub fn format_mssql_type(data_type: &str, max_length: i32, precision: i32, scale: i32) -> String {
    let quoted = quote_mssql(data_type);
    let lower = data_type.to_lowercase();
    match lower.as_str() {
        "float" => {
            if precision > 0 && precision != 53 {
                format!("{}({})", quoted, precision)
            } else {
                quoted
            }
        }
        "decimal" | "numeric" => {
            if precision > 0 {
                format!("{}({}, {})", quoted, precision, scale)
            } else {
                format!("{}(18, 0)", quoted)
            }
        }
        "datetime2" | "time" | "datetimeoffset" => format!("{}({})", quoted, scale),
        "char" | "varchar" | "binary" | "varbinary" => {
            format!("{}({})", quoted, length_spec(max_length, 1))
        }
        "nchar" | "nvarchar" => format!("{}({})", quoted, length_spec(max_length, 2)),
        _ => quoted,
    }
}

fn length_spec(max_length: i32, bytes_per_char: i32) -> String {
    if max_length == -1 {
        "max".to_string()
    } else if max_length > 0 {
        (max_length / bytes_per_char).to_string()
    } else {
        "1".to_string()
    }
}

fn key_constraint_definition(index: &Index) -> String {
    let kind = if index.is_primary_key {
        "PRIMARY KEY"
    } else {
        "UNIQUE"
    };
    let mut sql = format!(
        "CONSTRAINT {} {} {} ({})",
        quote_mssql(&index.name),
        kind,
        clustering(index),
        key_columns(index)
    );
    sql.push_str(&data_space_clause(
        index.data_space.as_deref(),
        index.partition_column.as_deref(),
    ));
    sql
}

/// `CREATE INDEX` for an index that does not back a constraint.
pub fn create_index_statement(table: &str, index: &Index) -> String {
    let unique = if index.is_unique { "UNIQUE " } else { "" };
    let mut sql = format!(
        "CREATE {}{} INDEX {} ON {} ({})",
        unique,
        clustering(index),
        quote_mssql(&index.name),
        table,
        key_columns(index)
    );

    if !index.include_cols.is_empty() {
        let include: Vec<String> = index.include_cols.iter().map(|c| quote_mssql(c)).collect();
        sql.push_str(&format!(" INCLUDE ({})", include.join(", ")));
    }

    if let Some(filter) = &index.filter {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }

    sql.push_str(&data_space_clause(
        index.data_space.as_deref(),
        index.partition_column.as_deref(),
    ));
    sql
}

fn clustering(index: &Index) -> &'static str {
    if index.is_clustered {
        "CLUSTERED"
    } else {
        "NONCLUSTERED"
    }
}

fn key_columns(index: &Index) -> String {
    index
        .columns
        .iter()
        .map(|c| {
            format!(
                "{} {}",
                quote_mssql(&c.name),
                if c.descending { "DESC" } else { "ASC" }
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn data_space_clause(data_space: Option<&str>, partition_column: Option<&str>) -> String {
    match (data_space, partition_column) {
        (Some(space), Some(column)) => {
            format!(" ON {}({})", quote_mssql(space), quote_mssql(column))
        }
        (Some(space), None) => format!(" ON {}", quote_mssql(space)),
        (None, _) => String::new(),
    }
}

/// `ALTER TABLE ... ADD CONSTRAINT ... DEFAULT ... FOR ...`.
pub fn default_constraint_statement(table: &str, default: &DefaultConstraint) -> String {
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} DEFAULT {} FOR {}",
        table,
        quote_mssql(&default.name),
        default.definition,
        quote_mssql(&default.column)
    )
}

/// `ALTER TABLE ... ADD CONSTRAINT ... FOREIGN KEY`.
pub fn foreign_key_statement(table: &str, fk: &ForeignKey) -> String {
    let columns: Vec<String> = fk.columns.iter().map(|c| quote_mssql(c)).collect();
    let ref_columns: Vec<String> = fk.ref_columns.iter().map(|c| quote_mssql(c)).collect();

    let mut sql = format!(
        "ALTER TABLE {} WITH {} ADD CONSTRAINT {} FOREIGN KEY({}) REFERENCES {} ({})",
        table,
        check_mode(fk.is_not_trusted),
        quote_mssql(&fk.name),
        columns.join(", "),
        qualify_mssql(&fk.ref_schema, &fk.ref_table),
        ref_columns.join(", ")
    );

    if let Some(action) = referential_action(&fk.on_delete) {
        sql.push_str(" ON DELETE ");
        sql.push_str(&action);
    }
    if let Some(action) = referential_action(&fk.on_update) {
        sql.push_str(" ON UPDATE ");
        sql.push_str(&action);
    }
    sql
}

fn referential_action(action: &str) -> Option<String> {
    match action {
        "" | "NO_ACTION" => None,
        other => Some(other.replace('_', " ")),
    }
}

/// `ALTER TABLE ... ADD CONSTRAINT ... CHECK (...)`.
pub fn check_constraint_statement(table: &str, check: &CheckConstraint) -> String {
    format!(
        "ALTER TABLE {} WITH {} ADD CONSTRAINT {} CHECK ({})",
        table,
        check_mode(check.is_not_trusted),
        quote_mssql(&check.name),
        check.definition
    )
}

fn check_mode(is_not_trusted: bool) -> &'static str {
    if is_not_trusted {
        "NOCHECK"
    } else {
        "CHECK"
    }
}

fn constraint_state_statement(table: &str, name: &str, is_disabled: bool) -> String {
    format!(
        "ALTER TABLE {} {} CONSTRAINT {}",
        table,
        if is_disabled { "NOCHECK" } else { "CHECK" },
        quote_mssql(name)
    )
}

/// `GRANT`/`DENY` statement for an object or column permission.
pub fn permission_statement(perm: &Permission, securable: &str) -> String {
    let columns = perm
        .column
        .as_deref()
        .map(|c| format!(" ({})", quote_mssql(c)))
        .unwrap_or_default();

    match perm.state.as_str() {
        "GRANT_WITH_GRANT_OPTION" => format!(
            "GRANT {} ON {}{} TO {} WITH GRANT OPTION",
            perm.permission,
            securable,
            columns,
            quote_mssql(&perm.grantee)
        ),
        state => format!(
            "{} {} ON {}{} TO {}",
            state,
            perm.permission,
            securable,
            columns,
            quote_mssql(&perm.grantee)
        ),
    }
}

/// Level names passed to `sp_addextendedproperty` for a schema object.
pub fn property_levels(
    object: &ObjectDescriptor,
    trigger_parent: Option<&TriggerParent>,
    column: Option<&str>,
) -> Vec<(&'static str, String)> {
    let schema = object.schema_or_default().to_string();
    let mut levels = vec![("SCHEMA", schema)];

    match (object.kind, trigger_parent) {
        (ObjectKind::Trigger, Some(parent)) => {
            let parent_type = if parent.is_view { "VIEW" } else { "TABLE" };
            levels.push((parent_type, parent.name.clone()));
            levels.push(("TRIGGER", object.name.clone()));
            return levels;
        }
        (ObjectKind::StoredProcedure, _) => levels.push(("PROCEDURE", object.name.clone())),
        (ObjectKind::View, _) => levels.push(("VIEW", object.name.clone())),
        (ObjectKind::Function(_), _) => levels.push(("FUNCTION", object.name.clone())),
        (ObjectKind::UserDefinedType, _) => levels.push(("TYPE", object.name.clone())),
        _ => levels.push(("TABLE", object.name.clone())),
    }

    if let Some(column) = column {
        levels.push(("COLUMN", column.to_string()));
    }
    levels
}

/// `EXEC sys.sp_addextendedproperty` call.
pub fn extended_property_statement(
    prop: &ExtendedProperty,
    levels: &[(&'static str, String)],
) -> String {
    let mut sql = format!(
        "EXEC sys.sp_addextendedproperty @name = {}, @value = {}",
        nstring(&prop.name),
        nstring(&prop.value)
    );
    for (i, (level_type, level_name)) in levels.iter().enumerate() {
        sql.push_str(&format!(
            ", @level{i}type = N'{}', @level{i}name = {}",
            level_type,
            nstring(level_name)
        ));
    }
    sql
}

/// `CREATE TYPE ... FROM` for an alias type.
pub fn user_type_batches(udt: &UserTypeDefinition) -> Vec<String> {
    vec![format!(
        "CREATE TYPE {} FROM {} {}",
        qualify_mssql(&udt.schema, &udt.name),
        format_mssql_type(&udt.base_type, udt.max_length, udt.precision, udt.scale),
        if udt.is_nullable { "NULL" } else { "NOT NULL" }
    )]
}

/// `CREATE PARTITION FUNCTION`.
pub fn partition_function_batches(pf: &PartitionFunctionDefinition) -> Vec<String> {
    vec![format!(
        "CREATE PARTITION FUNCTION {}({}) AS RANGE {} FOR VALUES ({})",
        quote_mssql(&pf.name),
        pf.parameter_type,
        if pf.boundary_on_right { "RIGHT" } else { "LEFT" },
        pf.boundaries.join(", ")
    )]
}

/// `CREATE PARTITION SCHEME`.
pub fn partition_scheme_batches(ps: &PartitionSchemeDefinition) -> Vec<String> {
    let filegroups: Vec<String> = ps.filegroups.iter().map(|f| quote_mssql(f)).collect();
    vec![format!(
        "CREATE PARTITION SCHEME {} AS PARTITION {} TO ({})",
        quote_mssql(&ps.name),
        quote_mssql(&ps.function_name),
        filegroups.join(", ")
    )]
}
