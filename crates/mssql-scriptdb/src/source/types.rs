//! Catalog metadata used to render raw script batches.

use serde::{Deserialize, Serialize};

use crate::core::ObjectDescriptor;

/// An object returned by enumeration, with its system-object flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub object: ObjectDescriptor,
    /// Shipped by Microsoft or marked as database tools support.
    pub is_system: bool,
}

/// T-SQL module (procedure, view, function, trigger) definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleDefinition {
    /// Module text as stored in `sys.sql_modules`.
    pub definition: String,
    pub uses_ansi_nulls: bool,
    pub uses_quoted_identifier: bool,
    /// Set for triggers only.
    pub trigger: Option<TriggerState>,
}

/// Trigger-specific state scripted after the definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerState {
    pub is_disabled: bool,
    /// Parent of a DML trigger; `None` for database triggers.
    pub parent: Option<TriggerParent>,
}

/// Table or view a DML trigger is attached to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerParent {
    pub schema: String,
    pub name: String,
    pub is_view: bool,
}

/// Object or column level permission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    /// `GRANT`, `DENY` or `GRANT_WITH_GRANT_OPTION`.
    pub state: String,
    /// Permission name (e.g. `EXECUTE`, `SELECT`).
    pub permission: String,
    /// Grantee principal name.
    pub grantee: String,
    /// Column for column-level permissions.
    pub column: Option<String>,
}

/// Extended property attached to an object or one of its columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtendedProperty {
    pub name: String,
    pub value: String,
    /// Column the property belongs to, `None` for object-level properties.
    pub column: Option<String>,
}

/// Permissions and extended properties shared by every schema object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectExtras {
    pub permissions: Vec<Permission>,
    pub extended_properties: Vec<ExtendedProperty>,
}

/// Table metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Schema name.
    pub schema: String,

    /// Table name.
    pub name: String,

    /// `SET ANSI_NULLS` state the table was created with.
    pub uses_ansi_nulls: bool,

    /// Column definitions, in column_id order.
    pub columns: Vec<Column>,

    /// Rowstore indexes, including primary key and unique constraints.
    pub indexes: Vec<Index>,

    /// Default constraints.
    pub defaults: Vec<DefaultConstraint>,

    /// Foreign key constraints.
    pub foreign_keys: Vec<ForeignKey>,

    /// Check constraints.
    pub check_constraints: Vec<CheckConstraint>,

    /// Data space (filegroup or partition scheme) of the heap or clustered index.
    pub data_space: Option<String>,

    /// Partitioning column when `data_space` is a partition scheme.
    pub partition_column: Option<String>,

    /// Permissions and extended properties.
    pub extras: ObjectExtras,
}

impl TableDefinition {
    /// Get the fully qualified table name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// Column metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Type name (e.g. "int", "nvarchar", or a user type name).
    pub data_type: String,

    /// Schema of the type; only meaningful for user-defined types.
    pub type_schema: String,

    /// Whether `data_type` is a user-defined type.
    pub is_user_type: bool,

    /// Maximum length in bytes (-1 for max), as reported by `sys.columns`.
    pub max_length: i32,

    /// Numeric precision.
    pub precision: i32,

    /// Numeric scale.
    pub scale: i32,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Identity seed and increment, for identity columns.
    pub identity: Option<(String, String)>,

    /// Computed column expression.
    pub computed: Option<String>,

    /// Whether a computed column is persisted.
    pub is_persisted: bool,

    /// Column collation for character columns.
    pub collation: Option<String>,
}

/// Index column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    pub name: String,
    pub descending: bool,
}

/// Index metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Index {
    /// Index id within the table.
    pub index_id: i32,

    /// Index name.
    pub name: String,

    /// Key columns in key order.
    pub columns: Vec<IndexColumn>,

    /// Included columns (non-key).
    pub include_cols: Vec<String>,

    /// Whether the index is unique.
    pub is_unique: bool,

    /// Whether the index is clustered.
    pub is_clustered: bool,

    /// Backs a PRIMARY KEY constraint.
    pub is_primary_key: bool,

    /// Backs a UNIQUE constraint.
    pub is_unique_constraint: bool,

    /// Filter predicate of a filtered index.
    pub filter: Option<String>,

    /// Data space (filegroup or partition scheme).
    pub data_space: Option<String>,

    /// Partitioning column when `data_space` is a partition scheme.
    pub partition_column: Option<String>,
}

impl Index {
    /// Whether this index is declared as a table constraint.
    pub fn is_constraint(&self) -> bool {
        self.is_primary_key || self.is_unique_constraint
    }
}

/// Default constraint metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultConstraint {
    pub name: String,
    pub column: String,
    /// Default expression as stored (already parenthesized).
    pub definition: String,
}

/// Foreign key metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,

    /// Source column names.
    pub columns: Vec<String>,

    /// Referenced schema name.
    pub ref_schema: String,

    /// Referenced table name.
    pub ref_table: String,

    /// Referenced column names.
    pub ref_columns: Vec<String>,

    /// ON DELETE action (`NO_ACTION`, `CASCADE`, `SET_NULL`, `SET_DEFAULT`).
    pub on_delete: String,

    /// ON UPDATE action.
    pub on_update: String,

    /// Constraint is disabled (`NOCHECK`).
    pub is_disabled: bool,

    /// Constraint was created or re-enabled without validating existing rows.
    pub is_not_trusted: bool,
}

/// Check constraint metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckConstraint {
    /// Constraint name.
    pub name: String,

    /// Constraint definition (SQL expression, parenthesized).
    pub definition: String,

    pub is_disabled: bool,

    pub is_not_trusted: bool,
}

/// Alias data type created with `CREATE TYPE ... FROM`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserTypeDefinition {
    pub schema: String,
    pub name: String,
    /// System base type name.
    pub base_type: String,
    pub max_length: i32,
    pub precision: i32,
    pub scale: i32,
    pub is_nullable: bool,
}

/// Partition function metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartitionFunctionDefinition {
    pub name: String,
    /// Parameter type, formatted (e.g. `[datetime2](7)`).
    pub parameter_type: String,
    /// `RANGE RIGHT` when true, `RANGE LEFT` otherwise.
    pub boundary_on_right: bool,
    /// Boundary values rendered as SQL literals.
    pub boundaries: Vec<String>,
}

/// Partition scheme metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartitionSchemeDefinition {
    pub name: String,
    pub function_name: String,
    /// Destination filegroups in partition order.
    pub filegroups: Vec<String>,
}

/// Result of a connectivity check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub connected: bool,
    pub latency_ms: u64,
    pub server_version: Option<String>,
    pub error: Option<String>,
}
