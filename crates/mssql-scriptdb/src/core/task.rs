//! Bulk export tasks selected by the user (`SPROC`, `TABLE`, ...).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::object::ObjectKind;

/// One bulk export pass over all objects of a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Task {
    StoredProcedures,
    Tables,
    UserTypes,
    Functions,
    Views,
    Triggers,
    PartitionSchemes,
    PartitionFunctions,
}

impl Task {
    /// All tasks, in the order they are listed in help output.
    pub const ALL: [Task; 8] = [
        Task::StoredProcedures,
        Task::Tables,
        Task::Functions,
        Task::UserTypes,
        Task::Views,
        Task::Triggers,
        Task::PartitionSchemes,
        Task::PartitionFunctions,
    ];

    /// Token used on the command line and in config files.
    pub fn token(self) -> &'static str {
        match self {
            Task::StoredProcedures => "SPROC",
            Task::Tables => "TABLE",
            Task::UserTypes => "UDT",
            Task::Functions => "UDF",
            Task::Views => "VIEW",
            Task::Triggers => "TRIG",
            Task::PartitionSchemes => "PS",
            Task::PartitionFunctions => "PF",
        }
    }

    /// Section label reported when the pass starts.
    pub fn label(self) -> &'static str {
        match self {
            Task::StoredProcedures => "Stored Procedures",
            Task::Tables => "Tables",
            Task::UserTypes => "User Defined Types",
            Task::Functions => "User Defined Functions",
            Task::Views => "Views",
            Task::Triggers => "Triggers",
            Task::PartitionSchemes => "PartitionSchemes",
            Task::PartitionFunctions => "PartitionFunctions",
        }
    }

    /// Output folder of the pass.
    pub fn folder(self) -> &'static str {
        self.primary_kind().folder()
    }

    /// Representative object kind written by this pass.
    pub fn primary_kind(self) -> ObjectKind {
        match self {
            Task::StoredProcedures => ObjectKind::StoredProcedure,
            Task::Tables => ObjectKind::Table,
            Task::UserTypes => ObjectKind::UserDefinedType,
            Task::Functions => ObjectKind::Function(super::FunctionKind::Scalar),
            Task::Views => ObjectKind::View,
            Task::Triggers => ObjectKind::DatabaseTrigger,
            Task::PartitionSchemes => ObjectKind::PartitionScheme,
            Task::PartitionFunctions => ObjectKind::PartitionFunction,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Task {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        Task::ALL
            .into_iter()
            .find(|t| t.token().eq_ignore_ascii_case(token))
            .ok_or_else(|| token.to_string())
    }
}

/// Ordered, de-duplicated task selection plus the tokens that were not recognised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPlan {
    pub tasks: Vec<Task>,
    pub unknown: Vec<String>,
}

impl TaskPlan {
    pub fn contains(&self, task: Task) -> bool {
        self.tasks.contains(&task)
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Individual, trimmed task tokens in input order. Each entry may itself be a
/// comma separated list.
pub fn task_tokens<S: AsRef<str>>(tokens: &[S]) -> impl Iterator<Item = &str> {
    tokens
        .iter()
        .flat_map(|t| t.as_ref().split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Parse task tokens into a de-duplicated plan.
pub fn parse_tasks<S: AsRef<str>>(tokens: &[S]) -> TaskPlan {
    let mut plan = TaskPlan::default();

    for token in task_tokens(tokens) {
        match token.parse::<Task>() {
            Ok(task) if !plan.tasks.contains(&task) => plan.tasks.push(task),
            Ok(_) => {}
            Err(unknown) => plan.unknown.push(unknown),
        }
    }

    plan
}
