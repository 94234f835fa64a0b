//! Export orchestrator: enumerates, scripts, normalizes and writes objects.

mod progress;

pub use progress::{ObjectState, ProgressEvent};

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ExportConfig;
use crate::core::{task_tokens, ObjectDescriptor, ObjectKind, Task, TaskPlan};
use crate::error::{Result, ScriptError};
use crate::resolve::{NameResolver, RejectedName};
use crate::script::ScriptNormalizer;
use crate::source::{CatalogEntry, SchemaProvider};

/// Result of an export run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSummary {
    /// Unique run identifier.
    pub run_id: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Artifacts written.
    pub objects_written: usize,

    /// Objects that could not be scripted or written.
    pub objects_failed: usize,

    /// Names of the failed objects.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_objects: Vec<String>,

    /// Input-list entries that did not resolve to an object.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected_names: Vec<RejectedName>,
}

impl ExportSummary {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Per-run mutable state.
struct RunState {
    normalizer: ScriptNormalizer,
    written: usize,
    failed: Vec<String>,
}

/// Export orchestrator.
pub struct Orchestrator {
    source: Arc<dyn SchemaProvider>,
    config: ExportConfig,
    database: String,
    progress_tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl Orchestrator {
    /// Create an orchestrator exporting from `database` through `source`.
    pub fn new(
        source: Arc<dyn SchemaProvider>,
        config: ExportConfig,
        database: impl Into<String>,
    ) -> Self {
        Self {
            source,
            config,
            database: database.into(),
            progress_tx: None,
        }
    }

    /// Set progress channel for updates.
    pub fn with_progress(mut self, tx: mpsc::Sender<ProgressEvent>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// Log an event and forward it to the progress channel if configured.
    async fn report(&self, event: ProgressEvent) {
        match &event.state {
            ObjectState::Failed(message) => {
                warn!("{} {} failed: {}", event.label, event.object, message)
            }
            ObjectState::Processing if event.object.is_empty() => info!("{}", event.label),
            ObjectState::Processing => debug!("{} {}", event.label, event.object),
        }
        if let Some(tx) = &self.progress_tx {
            let _ = tx.send(event).await;
        }
    }

    fn new_run(&self) -> RunState {
        RunState {
            normalizer: ScriptNormalizer::new(self.config.normalize_options()),
            written: 0,
            failed: Vec::new(),
        }
    }

    /// Run the configured bulk tasks.
    ///
    /// The destination must exist. Unknown task tokens are reported and
    /// skipped. The first fetch or write failure aborts the run.
    pub async fn run(&self) -> Result<ExportSummary> {
        let started_at = Utc::now();
        let start = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        let root = self.config.check_destination()?;
        let plan = self.config.task_plan();
        if plan.is_empty() && plan.unknown.is_empty() {
            return Err(ScriptError::Config("No export tasks selected".into()));
        }

        info!(
            "Starting export run {} of {} into {}",
            run_id,
            self.database,
            root.display()
        );

        let mut state = self.new_run();
        let mut done = HashSet::new();
        for token in task_tokens(&self.config.tasks) {
            match token.parse::<Task>() {
                Ok(task) => {
                    if done.insert(task) {
                        self.run_task(task, &plan, &root, &mut state).await?;
                    }
                }
                Err(unknown) => {
                    self.report(ProgressEvent::header(format!("---> Unknown task : {}", unknown)))
                        .await
                }
            }
        }

        self.report(ProgressEvent::header("Process completed.")).await;
        Ok(self.summarize(state, run_id, started_at, start, Vec::new()))
    }

    async fn run_task(
        &self,
        task: Task,
        plan: &TaskPlan,
        root: &Path,
        state: &mut RunState,
    ) -> Result<()> {
        self.report(ProgressEvent::header(task.label())).await;
        let folder = self.task_folder(root, task.label(), task.folder()).await?;
        let entries = self.source.list_objects(task).await?;

        match task {
            Task::Tables => {
                let trigger_folder = if plan.contains(Task::Triggers) {
                    Some(
                        self.task_folder(root, task.label(), ObjectKind::Trigger.folder())
                            .await?,
                    )
                } else {
                    None
                };
                for entry in user_objects(&entries) {
                    self.export_object(&entry.object, &folder, state).await?;
                    if let Some(trigger_folder) = &trigger_folder {
                        self.export_table_triggers(&entry.object, trigger_folder, state)
                            .await?;
                    }
                }
            }
            Task::Triggers => {
                for entry in user_objects(&entries) {
                    self.export_object(&entry.object, &folder, state).await?;
                }
                // Without TABLE, DML triggers are not written by the table pass.
                if !plan.contains(Task::Tables) {
                    let tables = self.source.list_objects(Task::Tables).await?;
                    for table in user_objects(&tables) {
                        self.export_table_triggers(&table.object, &folder, state).await?;
                    }
                }
            }
            _ => {
                for entry in user_objects(&entries) {
                    self.export_object(&entry.object, &folder, state).await?;
                }
            }
        }

        Ok(())
    }

    /// Create a bulk task folder; a failure is reported before it is returned.
    async fn task_folder(&self, root: &Path, label: &str, folder: &str) -> Result<PathBuf> {
        match ensure_folder(root, folder).await {
            Ok(path) => Ok(path),
            Err(e) => {
                self.report(ProgressEvent::failed(label, folder, e.to_string()))
                    .await;
                Err(e)
            }
        }
    }

    async fn export_table_triggers(
        &self,
        table: &ObjectDescriptor,
        folder: &Path,
        state: &mut RunState,
    ) -> Result<()> {
        let triggers = self.source.list_table_triggers(table).await?;
        for trigger in user_objects(&triggers) {
            self.export_object(&trigger.object, folder, state).await?;
        }
        Ok(())
    }

    /// Export one object in bulk mode; failures are reported, then returned.
    async fn export_object(
        &self,
        object: &ObjectDescriptor,
        folder: &Path,
        state: &mut RunState,
    ) -> Result<()> {
        self.report(ProgressEvent::processing(object.kind.label(), object.full_name()))
            .await;

        match write_artifact(self.source.as_ref(), object, folder, state).await {
            Ok(path) => {
                state.written += 1;
                debug!("Wrote {}", path.display());
                Ok(())
            }
            Err(e) => {
                self.report(ProgressEvent::failed(
                    object.kind.label(),
                    object.full_name(),
                    e.to_string(),
                ))
                .await;
                state.failed.push(object.to_string());
                Err(e)
            }
        }
    }

    /// Export the objects named in an input list.
    ///
    /// Names that do not resolve are collected in the summary; objects that
    /// fail to script or write are reported and skipped.
    pub async fn run_input_file(&self, list: &Path) -> Result<ExportSummary> {
        let started_at = Utc::now();
        let start = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        let root = self.config.list_destination();
        if !root.is_dir() {
            return Err(ScriptError::Config(format!(
                "Path {} does not exist or is not a directory",
                root.display()
            )));
        }

        self.report(ProgressEvent::header("Input file")).await;
        let content = tokio::fs::read_to_string(list).await?;
        // Drop a leading UTF-8 BOM.
        let content = content.strip_prefix('\u{feff}').unwrap_or(content.as_str());
        let lines: Vec<&str> = content.lines().collect();

        let resolution = NameResolver::new(self.source.as_ref(), self.database.as_str())
            .resolve(&lines)
            .await;
        info!(
            "Resolved {} of {} names from {}",
            resolution.objects.len(),
            resolution.objects.len() + resolution.rejected.len(),
            list.display()
        );
        for rejected in &resolution.rejected {
            self.report(ProgressEvent::failed("Input file", &rejected.input, &rejected.reason))
                .await;
        }

        let mut state = self.new_run();
        for object in &resolution.objects {
            self.report(ProgressEvent::processing(object.kind.label(), object.full_name()))
                .await;

            let result = match ensure_folder(&root, object.kind.folder()).await {
                Ok(folder) => write_artifact(self.source.as_ref(), object, &folder, &mut state).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(_) => state.written += 1,
                Err(e) => {
                    self.report(ProgressEvent::failed(
                        object.kind.label(),
                        object.full_name(),
                        e.to_string(),
                    ))
                    .await;
                    state.failed.push(object.to_string());
                }
            }
        }

        self.report(ProgressEvent::header("Process completed.")).await;
        Ok(self.summarize(state, run_id, started_at, start, resolution.rejected))
    }

    fn summarize(
        &self,
        state: RunState,
        run_id: String,
        started_at: DateTime<Utc>,
        start: Instant,
        rejected_names: Vec<RejectedName>,
    ) -> ExportSummary {
        let summary = ExportSummary {
            run_id,
            started_at,
            completed_at: Utc::now(),
            duration_seconds: start.elapsed().as_secs_f64(),
            objects_written: state.written,
            objects_failed: state.failed.len(),
            failed_objects: state.failed,
            rejected_names,
        };
        info!(
            "Export finished: {} written, {} failed in {:.2}s",
            summary.objects_written, summary.objects_failed, summary.duration_seconds
        );
        summary
    }
}

fn user_objects(entries: &[CatalogEntry]) -> impl Iterator<Item = &CatalogEntry> {
    entries.iter().filter(|e| !e.is_system)
}

async fn ensure_folder(root: &Path, folder: &str) -> Result<PathBuf> {
    let path = root.join(folder);
    tokio::fs::create_dir_all(&path)
        .await
        .map_err(|e| ScriptError::write(&path, e))?;
    Ok(path)
}

/// Fetch, normalize and write one artifact. Nothing is written when the
/// fetch fails.
async fn write_artifact(
    source: &dyn SchemaProvider,
    object: &ObjectDescriptor,
    folder: &Path,
    state: &mut RunState,
) -> Result<PathBuf> {
    let batches = source.fetch_script(object).await?;
    let text = state.normalizer.normalize(object, &batches);
    let path = folder.join(format!("{}.sql", object.file_stem()));
    tokio::fs::write(&path, text)
        .await
        .map_err(|e| ScriptError::write(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FunctionKind;
    use crate::resolve::QualifiedName;
    use crate::source::{ObjectTypeLookup, ScriptFetcher};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const DB: &str = "Sales";

    fn entry(schema: &str, name: &str, kind: ObjectKind, is_system: bool) -> CatalogEntry {
        CatalogEntry {
            object: ObjectDescriptor::new(DB, schema, name, kind).unwrap(),
            is_system,
        }
    }

    #[derive(Default)]
    struct FakeSource {
        objects: HashMap<Task, Vec<CatalogEntry>>,
        table_triggers: HashMap<String, Vec<CatalogEntry>>,
        scripts: HashMap<String, Vec<String>>,
        types: HashMap<(String, String), String>,
    }

    impl FakeSource {
        fn with(mut self, task: Task, entry: CatalogEntry, batches: &[&str]) -> Self {
            self.add_script(&entry.object, batches);
            self.objects.entry(task).or_default().push(entry);
            self
        }

        fn with_table_trigger(mut self, table: &str, trigger: CatalogEntry, batches: &[&str]) -> Self {
            self.add_script(&trigger.object, batches);
            self.table_triggers
                .entry(table.to_string())
                .or_default()
                .push(trigger);
            self
        }

        fn with_type(mut self, schema: &str, name: &str, code: &str) -> Self {
            self.types
                .insert((schema.to_string(), name.to_string()), code.to_string());
            self
        }

        fn add_script(&mut self, object: &ObjectDescriptor, batches: &[&str]) {
            self.scripts.insert(
                object.to_string(),
                batches.iter().map(|b| b.to_string()).collect(),
            );
        }
    }

    #[async_trait]
    impl ScriptFetcher for FakeSource {
        async fn list_objects(&self, task: Task) -> Result<Vec<CatalogEntry>> {
            Ok(self.objects.get(&task).cloned().unwrap_or_default())
        }

        async fn list_table_triggers(&self, table: &ObjectDescriptor) -> Result<Vec<CatalogEntry>> {
            Ok(self
                .table_triggers
                .get(&table.full_name())
                .cloned()
                .unwrap_or_default())
        }

        async fn fetch_script(&self, object: &ObjectDescriptor) -> Result<Vec<String>> {
            self.scripts
                .get(&object.to_string())
                .cloned()
                .ok_or_else(|| ScriptError::fetch(object.to_string(), "object not found"))
        }
    }

    #[async_trait]
    impl ObjectTypeLookup for FakeSource {
        async fn lookup_type(&self, name: &QualifiedName) -> Result<Option<String>> {
            Ok(self
                .types
                .get(&(name.schema.clone(), name.name.clone()))
                .cloned())
        }
    }

    fn export_config(dir: &TempDir, tasks: &[&str]) -> ExportConfig {
        ExportConfig {
            path: Some(dir.path().to_path_buf()),
            tasks: tasks.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    fn drain(rx: &mut mpsc::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn read(dir: &TempDir, relative: &str) -> String {
        std::fs::read_to_string(dir.path().join(relative)).unwrap()
    }

    fn table_batches() -> [&'static str; 3] {
        [
            "SET ANSI_NULLS ON",
            "SET QUOTED_IDENTIFIER ON",
            "CREATE TABLE [dbo].[Orders]([Id] [int] NOT NULL)",
        ]
    }

    #[tokio::test]
    async fn test_bulk_export_writes_normalized_artifacts() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::default()
            .with(
                Task::Views,
                entry("dbo", "vOrders", ObjectKind::View, false),
                &["CREATE VIEW dbo.vOrders AS SELECT 1 AS x"],
            )
            .with(
                Task::Views,
                entry("sys", "vInternal", ObjectKind::View, true),
                &["CREATE VIEW sys.vInternal AS SELECT 1"],
            )
            .with(
                Task::Functions,
                entry("util", "fnOne", ObjectKind::Function(FunctionKind::Scalar), false),
                &["CREATE FUNCTION util.fnOne() RETURNS INT AS BEGIN RETURN 1 END"],
            );

        let orchestrator =
            Orchestrator::new(Arc::new(source), export_config(&dir, &["VIEW,UDF"]), DB);
        let summary = orchestrator.run().await.unwrap();

        assert_eq!(summary.objects_written, 2);
        assert_eq!(summary.objects_failed, 0);

        let view = read(&dir, "Views/dbo.vOrders.sql");
        assert!(view.starts_with("IF NOT EXISTS (SELECT 1 FROM sys.objects WHERE object_id = OBJECT_ID(N'[dbo].[vOrders]') AND type = N'V')"));
        assert!(view.ends_with("ALTER VIEW dbo.vOrders AS SELECT 1 AS x\nGO\n"));
        assert!(!dir.path().join("Views/sys.vInternal.sql").exists());

        let function = read(&dir, "Functions/util.fnOne.sql");
        assert!(function.contains("type = N'FN'"));
        assert!(function.contains("ALTER FUNCTION util.fnOne()"));
    }

    #[tokio::test]
    async fn test_bulk_export_without_headers_or_alter() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::default().with(
            Task::StoredProcedures,
            entry("dbo", "GetOrders", ObjectKind::StoredProcedure, false),
            &["SET ANSI_NULLS ON", "CREATE PROCEDURE dbo.GetOrders AS SELECT 1"],
        );
        let config = ExportConfig {
            script_as_alter: false,
            use_headers: false,
            ..export_config(&dir, &["SPROC"])
        };

        Orchestrator::new(Arc::new(source), config, DB).run().await.unwrap();

        assert_eq!(
            read(&dir, "StoredProcedures/dbo.GetOrders.sql"),
            "SET ANSI_NULLS ON\nGO\nCREATE PROCEDURE dbo.GetOrders AS SELECT 1\nGO\n"
        );
    }

    #[tokio::test]
    async fn test_table_and_trigger_tasks_together() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::default()
            .with(
                Task::Tables,
                entry("dbo", "Orders", ObjectKind::Table, false),
                &table_batches(),
            )
            .with_table_trigger(
                "dbo.Orders",
                entry("dbo", "trgOrders", ObjectKind::Trigger, false),
                &["CREATE TRIGGER dbo.trgOrders ON dbo.Orders AFTER INSERT AS SELECT 1"],
            )
            .with_table_trigger(
                "dbo.Orders",
                entry("dbo", "trgShipped", ObjectKind::Trigger, true),
                &["CREATE TRIGGER dbo.trgShipped ON dbo.Orders AFTER INSERT AS SELECT 1"],
            )
            .with(
                Task::Triggers,
                CatalogEntry {
                    object: ObjectDescriptor::database_scoped(DB, "trgDdl", ObjectKind::DatabaseTrigger)
                        .unwrap(),
                    is_system: false,
                },
                &["CREATE TRIGGER trgDdl ON DATABASE FOR CREATE_TABLE AS SELECT 1"],
            );

        let (tx, mut rx) = mpsc::channel(256);
        let orchestrator =
            Orchestrator::new(Arc::new(source), export_config(&dir, &["TABLE", "TRIG"]), DB)
                .with_progress(tx);
        let summary = orchestrator.run().await.unwrap();

        assert_eq!(summary.objects_written, 3);
        assert!(dir.path().join("Tables/dbo.Orders.sql").exists());
        assert!(dir.path().join("Triggers/dbo.trgOrders.sql").exists());
        assert!(!dir.path().join("Triggers/dbo.trgShipped.sql").exists());

        let ddl = read(&dir, "Triggers/trgDdl.sql");
        assert!(ddl.starts_with("IF EXISTS (SELECT 1 FROM sys.triggers WHERE parent_class = 0 AND name = N'trgDdl')"));

        let events = drain(&mut rx);
        let trigger_events = events
            .iter()
            .filter(|e| e.object == "dbo.trgOrders")
            .count();
        assert_eq!(trigger_events, 1, "DML trigger exported once");
        assert_eq!(events.last().unwrap().label, "Process completed.");
    }

    #[tokio::test]
    async fn test_trigger_task_alone_exports_dml_triggers() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::default()
            .with(
                Task::Tables,
                entry("dbo", "Orders", ObjectKind::Table, false),
                &table_batches(),
            )
            .with(
                Task::Tables,
                entry("dbo", "sysdiagrams", ObjectKind::Table, true),
                &table_batches(),
            )
            .with_table_trigger(
                "dbo.Orders",
                entry("dbo", "trgOrders", ObjectKind::Trigger, false),
                &["CREATE TRIGGER dbo.trgOrders ON dbo.Orders AFTER INSERT AS SELECT 1"],
            )
            .with_table_trigger(
                "dbo.sysdiagrams",
                entry("dbo", "trgDiagrams", ObjectKind::Trigger, false),
                &["CREATE TRIGGER dbo.trgDiagrams ON dbo.sysdiagrams AFTER INSERT AS SELECT 1"],
            );

        let summary = Orchestrator::new(Arc::new(source), export_config(&dir, &["TRIG"]), DB)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.objects_written, 1);
        let trigger = read(&dir, "Triggers/dbo.trgOrders.sql");
        assert!(trigger.starts_with("IF EXISTS (SELECT 1 FROM sys.objects WHERE object_id = OBJECT_ID(N'[dbo].[trgOrders]') AND type = N'TR')"));
        assert!(trigger.contains("CREATE TRIGGER dbo.trgOrders"));
        assert!(!dir.path().join("Tables").exists());
    }

    #[tokio::test]
    async fn test_unknown_task_is_reported_and_skipped() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::default().with(
            Task::PartitionFunctions,
            CatalogEntry {
                object: ObjectDescriptor::database_scoped(DB, "pfYear", ObjectKind::PartitionFunction)
                    .unwrap(),
                is_system: false,
            },
            &["CREATE PARTITION FUNCTION [pfYear]([int]) AS RANGE RIGHT FOR VALUES (2020)"],
        );

        let (tx, mut rx) = mpsc::channel(256);
        let summary = Orchestrator::new(Arc::new(source), export_config(&dir, &["BOGUS, pf"]), DB)
            .with_progress(tx)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.objects_written, 1);
        assert!(dir.path().join("PartitionFunctions/pfYear.sql").exists());

        let labels: Vec<String> = drain(&mut rx).into_iter().map(|e| e.label).collect();
        assert_eq!(
            labels,
            vec![
                "---> Unknown task : BOGUS",
                "PartitionFunctions",
                "Partition Function",
                "Process completed.",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_destination_is_config_error() {
        let dir = TempDir::new().unwrap();
        let mut config = export_config(&dir, &["SPROC"]);
        config.path = Some(dir.path().join("nope"));

        let err = Orchestrator::new(Arc::new(FakeSource::default()), config, DB)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptError::Config(_)));
    }

    #[tokio::test]
    async fn test_bulk_fetch_failure_aborts_run() {
        let dir = TempDir::new().unwrap();
        let mut source = FakeSource::default()
            .with(
                Task::StoredProcedures,
                entry("dbo", "A", ObjectKind::StoredProcedure, false),
                &["CREATE PROCEDURE dbo.A AS SELECT 1"],
            )
            .with(
                Task::StoredProcedures,
                entry("dbo", "B", ObjectKind::StoredProcedure, false),
                &["CREATE PROCEDURE dbo.B AS SELECT 1"],
            )
            .with(
                Task::StoredProcedures,
                entry("dbo", "C", ObjectKind::StoredProcedure, false),
                &["CREATE PROCEDURE dbo.C AS SELECT 1"],
            );
        source.scripts.remove("Sales.dbo.B");

        let (tx, mut rx) = mpsc::channel(256);
        let err = Orchestrator::new(Arc::new(source), export_config(&dir, &["SPROC"]), DB)
            .with_progress(tx)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, ScriptError::Fetch { .. }));
        assert!(dir.path().join("StoredProcedures/dbo.A.sql").exists());
        assert!(!dir.path().join("StoredProcedures/dbo.B.sql").exists());
        assert!(!dir.path().join("StoredProcedures/dbo.C.sql").exists());

        let failures: Vec<ProgressEvent> =
            drain(&mut rx).into_iter().filter(|e| e.is_failure()).collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].object, "dbo.B");
    }

    #[tokio::test]
    async fn test_list_mode_continues_past_failures() {
        let dir = TempDir::new().unwrap();
        let mut source = FakeSource::default()
            .with_type("dbo", "GetOrders", "P ")
            .with_type("sales", "Orders", "U ")
            .with_type("dbo", "Gone", "P ")
            .with_type("dbo", "vOrders", "V ");
        source.add_script(
            &ObjectDescriptor::new(DB, "dbo", "GetOrders", ObjectKind::StoredProcedure).unwrap(),
            &["CREATE PROCEDURE dbo.GetOrders AS SELECT 1"],
        );
        source.add_script(
            &ObjectDescriptor::new(DB, "sales", "Orders", ObjectKind::Table).unwrap(),
            &table_batches(),
        );

        let list = dir.path().join("objects.txt");
        std::fs::write(
            &list,
            "dbo.Gone\nGetOrders.sql\n\na.b.c.d\nsales.Orders\ndbo.vOrders\ndbo.Missing\n",
        )
        .unwrap();

        let out = TempDir::new().unwrap();
        let config = ExportConfig {
            path: Some(out.path().to_path_buf()),
            ..Default::default()
        };
        let summary = Orchestrator::new(Arc::new(source), config, DB)
            .run_input_file(&list)
            .await
            .unwrap();

        assert_eq!(summary.objects_written, 2);
        assert_eq!(summary.failed_objects, vec!["Sales.dbo.Gone".to_string()]);
        let rejected: Vec<&str> = summary
            .rejected_names
            .iter()
            .map(|r| r.input.as_str())
            .collect();
        assert_eq!(rejected, vec!["a.b.c.d", "dbo.vOrders", "dbo.Missing"]);

        let proc = read(&out, "StoredProcedures/dbo.GetOrders.sql");
        assert!(proc.contains("ALTER PROCEDURE dbo.GetOrders"));
        let table = read(&out, "Tables/sales.Orders.sql");
        assert!(table.starts_with("SET ANSI_NULLS ON\nGO\nSET QUOTED_IDENTIFIER ON\nGO\n"));
        assert!(!out.path().join("StoredProcedures/dbo.Gone.sql").exists());
    }

    #[tokio::test]
    async fn test_list_mode_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let config = ExportConfig {
            path: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let err = Orchestrator::new(Arc::new(FakeSource::default()), config, DB)
            .run_input_file(&dir.path().join("missing.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptError::Io(_)));
    }

    #[tokio::test]
    async fn test_list_mode_strips_bom_and_crlf() {
        let dir = TempDir::new().unwrap();
        let mut source = FakeSource::default()
            .with_type("dbo", "GetOrders", "P ")
            .with_type("dbo", "Orders", "U ");
        source.add_script(
            &ObjectDescriptor::new(DB, "dbo", "GetOrders", ObjectKind::StoredProcedure).unwrap(),
            &["CREATE PROCEDURE dbo.GetOrders AS SELECT 1"],
        );
        source.add_script(
            &ObjectDescriptor::new(DB, "dbo", "Orders", ObjectKind::Table).unwrap(),
            &table_batches(),
        );

        let list = dir.path().join("objects.txt");
        std::fs::write(&list, "\u{FEFF}dbo.GetOrders\r\nOrders.sql\r\n").unwrap();

        let config = ExportConfig {
            path: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let summary = Orchestrator::new(Arc::new(source), config, DB)
            .run_input_file(&list)
            .await
            .unwrap();

        assert!(summary.rejected_names.is_empty(), "{:?}", summary.rejected_names);
        assert_eq!(summary.objects_written, 2);
        assert!(dir.path().join("StoredProcedures/dbo.GetOrders.sql").exists());
        assert!(dir.path().join("Tables/dbo.Orders.sql").exists());
    }

    #[tokio::test]
    async fn test_bulk_write_failure_aborts_run() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::default()
            .with(
                Task::Views,
                entry("dbo", "A", ObjectKind::View, false),
                &["CREATE VIEW dbo.A AS SELECT 1"],
            )
            .with(
                Task::Views,
                entry("dbo", "B", ObjectKind::View, false),
                &["CREATE VIEW dbo.B AS SELECT 1"],
            );
        // A directory in place of the artifact makes the write fail.
        std::fs::create_dir_all(dir.path().join("Views/dbo.A.sql")).unwrap();

        let (tx, mut rx) = mpsc::channel(256);
        let err = Orchestrator::new(Arc::new(source), export_config(&dir, &["VIEW"]), DB)
            .with_progress(tx)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, ScriptError::Write { .. }));
        assert_eq!(err.exit_code(), 4);
        assert!(!dir.path().join("Views/dbo.B.sql").exists());

        let failures: Vec<ProgressEvent> =
            drain(&mut rx).into_iter().filter(|e| e.is_failure()).collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].label, "View");
        assert_eq!(failures[0].object, "dbo.A");
    }

    #[tokio::test]
    async fn test_list_mode_write_failure_is_reported_and_skipped() {
        let dir = TempDir::new().unwrap();
        let mut source = FakeSource::default()
            .with_type("dbo", "A", "P ")
            .with_type("dbo", "B", "P ");
        for name in ["A", "B"] {
            source.add_script(
                &ObjectDescriptor::new(DB, "dbo", name, ObjectKind::StoredProcedure).unwrap(),
                &["CREATE PROCEDURE dbo.X AS SELECT 1"],
            );
        }
        std::fs::create_dir_all(dir.path().join("StoredProcedures/dbo.A.sql")).unwrap();

        let list = dir.path().join("objects.txt");
        std::fs::write(&list, "dbo.A\ndbo.B\n").unwrap();

        let config = ExportConfig {
            path: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let (tx, mut rx) = mpsc::channel(256);
        let summary = Orchestrator::new(Arc::new(source), config, DB)
            .with_progress(tx)
            .run_input_file(&list)
            .await
            .unwrap();

        assert_eq!(summary.objects_written, 1);
        assert_eq!(summary.failed_objects, vec!["Sales.dbo.A".to_string()]);
        assert!(dir.path().join("StoredProcedures/dbo.B.sql").is_file());

        let failures: Vec<ProgressEvent> =
            drain(&mut rx).into_iter().filter(|e| e.is_failure()).collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].object, "dbo.A");
        assert!(failures[0].to_string().contains("Failed to write"));
    }

    #[tokio::test]
    async fn test_bulk_folder_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource::default().with(
            Task::Views,
            entry("dbo", "A", ObjectKind::View, false),
            &["CREATE VIEW dbo.A AS SELECT 1"],
        );
        // A file where the task folder should go.
        std::fs::write(dir.path().join("Views"), "").unwrap();

        let (tx, mut rx) = mpsc::channel(256);
        let err = Orchestrator::new(Arc::new(source), export_config(&dir, &["VIEW"]), DB)
            .with_progress(tx)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, ScriptError::Write { .. }));
        let failures: Vec<ProgressEvent> =
            drain(&mut rx).into_iter().filter(|e| e.is_failure()).collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].label, "Views");
        assert_eq!(failures[0].object, "Views");
    }

    #[test]
    fn test_summary_json() {
        let summary = ExportSummary {
            run_id: "r1".to_string(),
            started_at: Utc::now(),
            completed_at: Utc::now(),
            duration_seconds: 0.5,
            objects_written: 3,
            objects_failed: 0,
            failed_objects: vec![],
            rejected_names: vec![],
        };
        let json = summary.to_json().unwrap();
        assert!(json.contains("\"objects_written\": 3"));
        assert!(!json.contains("failed_objects"));
    }
}
