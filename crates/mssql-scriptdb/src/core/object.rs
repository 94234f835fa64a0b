//! Object descriptors and the object kind taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, ScriptError};

/// Schema used when a shorthand name omits it.
pub const DEFAULT_SCHEMA: &str = "dbo";

/// Subtype of a T-SQL user-defined function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    /// Scalar function (`FN`).
    Scalar,
    /// Inline table-valued function (`IF`).
    Inline,
    /// Multi-statement table-valued function (`TF`).
    Table,
}

impl FunctionKind {
    /// `sys.objects.type` code of this function subtype.
    pub fn type_code(self) -> &'static str {
        match self {
            FunctionKind::Scalar => "FN",
            FunctionKind::Inline => "IF",
            FunctionKind::Table => "TF",
        }
    }

    /// Map a `sys.objects.type` code to a function subtype.
    ///
    /// CLR functions (`FS`, `FT`, `AF`) have no T-SQL body and return `None`.
    pub fn from_type_code(code: &str) -> Option<Self> {
        match code.trim() {
            "FN" => Some(FunctionKind::Scalar),
            "IF" => Some(FunctionKind::Inline),
            "TF" => Some(FunctionKind::Table),
            _ => None,
        }
    }
}

/// Category of schema object that can be exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    StoredProcedure,
    Table,
    View,
    Function(FunctionKind),
    /// DML trigger attached to a table or view.
    Trigger,
    /// Database-scoped DDL trigger.
    DatabaseTrigger,
    PartitionScheme,
    PartitionFunction,
    UserDefinedType,
}

impl ObjectKind {
    /// Folder under the destination root that receives artifacts of this kind.
    pub fn folder(self) -> &'static str {
        match self {
            ObjectKind::StoredProcedure => "StoredProcedures",
            ObjectKind::Table => "Tables",
            ObjectKind::View => "Views",
            ObjectKind::Function(_) => "Functions",
            ObjectKind::Trigger | ObjectKind::DatabaseTrigger => "Triggers",
            ObjectKind::PartitionScheme => "PartitionSchemes",
            ObjectKind::PartitionFunction => "PartitionFunctions",
            ObjectKind::UserDefinedType => "UserTypes",
        }
    }

    /// Human readable label.
    pub fn label(self) -> &'static str {
        match self {
            ObjectKind::StoredProcedure => "Stored Procedure",
            ObjectKind::Table => "Table",
            ObjectKind::View => "View",
            ObjectKind::Function(_) => "User Defined Function",
            ObjectKind::Trigger => "Trigger",
            ObjectKind::DatabaseTrigger => "Database Trigger",
            ObjectKind::PartitionScheme => "Partition Scheme",
            ObjectKind::PartitionFunction => "Partition Function",
            ObjectKind::UserDefinedType => "User Defined Type",
        }
    }

    /// `sys.objects.type` code, for kinds that live in `sys.objects`.
    pub fn type_code(self) -> Option<&'static str> {
        match self {
            ObjectKind::StoredProcedure => Some("P"),
            ObjectKind::Table => Some("U"),
            ObjectKind::View => Some("V"),
            ObjectKind::Function(f) => Some(f.type_code()),
            ObjectKind::Trigger => Some("TR"),
            ObjectKind::DatabaseTrigger
            | ObjectKind::PartitionScheme
            | ObjectKind::PartitionFunction
            | ObjectKind::UserDefinedType => None,
        }
    }

    /// Whether objects of this kind belong to a schema.
    pub fn is_schema_scoped(self) -> bool {
        !matches!(
            self,
            ObjectKind::DatabaseTrigger | ObjectKind::PartitionScheme | ObjectKind::PartitionFunction
        )
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identifies one schema object for the duration of an export pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    /// Database holding the object.
    pub database: String,
    /// Owning schema; `None` for database-scoped objects.
    pub schema: Option<String>,
    /// Object name (never empty).
    pub name: String,
    /// Object kind.
    pub kind: ObjectKind,
}

impl ObjectDescriptor {
    /// Descriptor for a schema-scoped object. An empty schema falls back to `dbo`.
    pub fn new(
        database: impl Into<String>,
        schema: impl Into<String>,
        name: impl Into<String>,
        kind: ObjectKind,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ScriptError::Config(
                "Object name cannot be empty".to_string(),
            ));
        }
        let schema = schema.into();
        let schema = if schema.is_empty() {
            DEFAULT_SCHEMA.to_string()
        } else {
            schema
        };
        Ok(Self {
            database: database.into(),
            schema: Some(schema),
            name,
            kind,
        })
    }

    /// Descriptor for a database-scoped object (DDL trigger, partition scheme/function).
    pub fn database_scoped(
        database: impl Into<String>,
        name: impl Into<String>,
        kind: ObjectKind,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ScriptError::Config(
                "Object name cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            database: database.into(),
            schema: None,
            name,
            kind,
        })
    }

    /// Schema name, or `dbo` for database-scoped objects.
    pub fn schema_or_default(&self) -> &str {
        self.schema.as_deref().unwrap_or(DEFAULT_SCHEMA)
    }

    /// `schema.name`, or just `name` when the object has no schema.
    pub fn full_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }

    /// File name (without extension) of the artifact.
    pub fn file_stem(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name.trim()),
            None => self.name.trim().to_string(),
        }
    }
}

impl fmt::Display for ObjectDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) if !self.database.is_empty() => {
                write!(f, "{}.{}.{}", self.database, schema, self.name)
            }
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => f.write_str(&self.name),
        }
    }
}
