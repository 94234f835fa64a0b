//! MSSQL catalog access: object enumeration, type lookup and script fetching.

pub mod scripter;
mod types;

pub use types::*;

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use tiberius::{AuthMethod as TdsAuth, Client, Config, EncryptionLevel, Query, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use crate::config::{AuthMethod, SourceConfig};
use crate::core::{quote_mssql, validate_identifier, FunctionKind, ObjectDescriptor, ObjectKind, Task};
use crate::error::{Result, ScriptError};
use crate::resolve::QualifiedName;

/// Enumerates objects and produces their raw script batches.
#[async_trait]
pub trait ScriptFetcher: Send + Sync {
    /// Objects handled by a bulk export task, in catalog order.
    ///
    /// For [`Task::Triggers`] this returns database-scoped DDL triggers only;
    /// DML triggers are reached through [`ScriptFetcher::list_table_triggers`].
    async fn list_objects(&self, task: Task) -> Result<Vec<CatalogEntry>>;

    /// DML triggers attached to one table.
    async fn list_table_triggers(&self, table: &ObjectDescriptor) -> Result<Vec<CatalogEntry>>;

    /// Raw batches for one object, without batch separators.
    async fn fetch_script(&self, object: &ObjectDescriptor) -> Result<Vec<String>>;
}

/// Looks up the `sys.objects.type` code of a named object.
#[async_trait]
pub trait ObjectTypeLookup: Send + Sync {
    /// `Ok(None)` when the object does not exist.
    async fn lookup_type(&self, name: &QualifiedName) -> Result<Option<String>>;
}

/// Everything an export run needs from the database.
pub trait SchemaProvider: ScriptFetcher + ObjectTypeLookup {}

impl<T: ScriptFetcher + ObjectTypeLookup> SchemaProvider for T {}

/// Connection manager for bb8 pool with tiberius.
#[derive(Clone)]
struct TiberiusConnectionManager {
    config: SourceConfig,
}

impl TiberiusConnectionManager {
    fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    fn build_config(&self) -> std::result::Result<Config, tiberius::error::Error> {
        let mut config = Config::new();
        config.host(&self.config.host);
        config.port(self.config.port);
        config.database(&self.config.database);
        config.application_name("mssql-scriptdb");

        match self.config.auth_method() {
            AuthMethod::SqlServer => {
                config.authentication(TdsAuth::sql_server(&self.config.user, &self.config.password));
            }
            #[cfg(windows)]
            AuthMethod::Integrated => config.authentication(TdsAuth::Integrated),
            #[cfg(not(windows))]
            AuthMethod::Integrated => {
                return Err(tiberius::error::Error::Conversion(
                    "integrated authentication is only supported on Windows".into(),
                ))
            }
        }

        if self.config.encryption_enabled() {
            if self.config.trust_server_cert {
                config.trust_cert();
            }
            config.encryption(EncryptionLevel::Required);
        } else {
            config.encryption(EncryptionLevel::NotSupported);
        }

        Ok(config)
    }
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = Client<Compat<TcpStream>>;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        let config = self.build_config()?;
        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            })?;

        tcp.set_nodelay(true).ok();

        Client::connect(config, tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

type Connection<'a> = PooledConnection<'a, TiberiusConnectionManager>;

/// Pooled SQL Server connection scripting objects from the system catalog.
pub struct MssqlPool {
    pool: Pool<TiberiusConnectionManager>,
    config: SourceConfig,
}

impl MssqlPool {
    /// Create a pool and verify connectivity.
    pub async fn new(config: SourceConfig) -> Result<Self> {
        Self::with_max_connections(config, 2).await
    }

    /// Create a pool with the given maximum number of connections.
    pub async fn with_max_connections(config: SourceConfig, max_size: u32) -> Result<Self> {
        let manager = TiberiusConnectionManager::new(config.clone());
        let pool = Pool::builder()
            .max_size(max_size)
            .min_idle(Some(1))
            .build(manager)
            .await
            .map_err(|e| ScriptError::pool(e, "creating MSSQL pool"))?;

        {
            let mut conn = pool
                .get()
                .await
                .map_err(|e| ScriptError::pool(e, "testing MSSQL connection"))?;
            conn.simple_query("SELECT 1").await?.into_row().await?;
        }

        info!(
            "Connected to MSSQL: {}:{}/{} (pool_size={})",
            config.host, config.port, config.database, max_size
        );

        Ok(Self { pool, config })
    }

    /// Database objects are enumerated in.
    pub fn database(&self) -> &str {
        &self.config.database
    }

    async fn get_client(&self) -> Result<Connection<'_>> {
        self.pool
            .get()
            .await
            .map_err(|e| ScriptError::pool(e, "acquiring MSSQL connection"))
    }

    /// Run `SELECT @@VERSION` and report latency.
    pub async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let version = async {
            let mut client = self.get_client().await?;
            let row = client.simple_query("SELECT @@VERSION").await?.into_row().await?;
            Ok::<_, ScriptError>(row.and_then(|r| r.get::<&str, _>(0).map(str::to_string)))
        }
        .await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match version {
            Ok(server_version) => HealthCheckResult {
                connected: true,
                latency_ms,
                server_version: server_version
                    .map(|v| v.lines().next().unwrap_or_default().trim().to_string()),
                error: None,
            },
            Err(e) => HealthCheckResult {
                connected: false,
                latency_ms,
                server_version: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// Run a catalog query with positional parameters and collect all rows.
    async fn query_rows(&self, sql: &str, params: &[Param<'_>]) -> Result<Vec<Row>> {
        let mut client = self.get_client().await?;
        let mut query = Query::new(sql);
        for param in params {
            match param {
                Param::Text(s) => query.bind(*s),
                Param::Int(i) => query.bind(*i),
            }
        }
        let stream = query.query(&mut *client).await?;
        Ok(stream.into_first_result().await?)
    }

    async fn list_schema_objects(&self, type_codes: &str) -> Result<Vec<(String, String, String, bool)>> {
        let cat = catalog(&self.config.database)?;
        let sql = format!(
            r#"
            SELECT s.name, o.name, o.type,
                   CAST(CASE WHEN o.is_ms_shipped = 1 OR EXISTS (
                       SELECT 1 FROM {cat}.extended_properties ep
                       WHERE ep.class = 1 AND ep.major_id = o.object_id AND ep.minor_id = 0
                         AND ep.name = N'microsoft_database_tools_support')
                   THEN 1 ELSE 0 END AS bit)
            FROM {cat}.objects o
            JOIN {cat}.schemas s ON s.schema_id = o.schema_id
            WHERE o.type IN ({type_codes})
            ORDER BY s.name, o.name
            "#
        );

        let rows = self.query_rows(&sql, &[]).await?;
        Ok(rows
            .iter()
            .map(|row| {
                (
                    text(row, 0),
                    text(row, 1),
                    text(row, 2).trim().to_string(),
                    row.get::<bool, _>(3).unwrap_or(false),
                )
            })
            .collect())
    }

    async fn list_named(&self, sql: &str, kind: ObjectKind) -> Result<Vec<CatalogEntry>> {
        let rows = self.query_rows(sql, &[]).await?;
        rows.iter()
            .map(|row| {
                Ok(CatalogEntry {
                    object: ObjectDescriptor::database_scoped(
                        self.config.database.clone(),
                        text(row, 0),
                        kind,
                    )?,
                    is_system: row.get::<bool, _>(1).unwrap_or(false),
                })
            })
            .collect()
    }

    async fn object_id(&self, object: &ObjectDescriptor) -> Result<i32> {
        let cat = catalog(&object.database)?;
        let sql = format!(
            "SELECT o.object_id FROM {cat}.objects o JOIN {cat}.schemas s ON s.schema_id = o.schema_id \
             WHERE s.name = @P1 AND o.name = @P2"
        );
        let rows = self
            .query_rows(
                &sql,
                &[Param::Text(object.schema_or_default()), Param::Text(&object.name)],
            )
            .await?;
        rows.first()
            .and_then(|r| r.get::<i32, _>(0))
            .ok_or_else(|| ScriptError::fetch(object.to_string(), "object not found"))
    }

    async fn load_module(&self, cat: &str, object: &ObjectDescriptor, object_id: i32) -> Result<ModuleDefinition> {
        let sql = format!(
            "SELECT m.definition, m.uses_ansi_nulls, m.uses_quoted_identifier \
             FROM {cat}.sql_modules m WHERE m.object_id = @P1"
        );
        let rows = self.query_rows(&sql, &[Param::Int(object_id)]).await?;
        let row = rows
            .first()
            .ok_or_else(|| ScriptError::fetch(object.to_string(), "module definition not found"))?;
        let definition = row
            .get::<&str, _>(0)
            .ok_or_else(|| ScriptError::fetch(object.to_string(), "definition is encrypted or unavailable"))?;

        Ok(ModuleDefinition {
            definition: definition.to_string(),
            uses_ansi_nulls: row.get::<bool, _>(1).unwrap_or(true),
            uses_quoted_identifier: row.get::<bool, _>(2).unwrap_or(true),
            trigger: None,
        })
    }

    async fn load_trigger_state(&self, cat: &str, object_id: i32) -> Result<TriggerState> {
        let sql = format!(
            "SELECT t.is_disabled, ps.name, po.name, CAST(CASE WHEN po.type = 'V' THEN 1 ELSE 0 END AS bit) \
             FROM {cat}.triggers t \
             JOIN {cat}.objects po ON po.object_id = t.parent_id \
             JOIN {cat}.schemas ps ON ps.schema_id = po.schema_id \
             WHERE t.object_id = @P1"
        );
        let rows = self.query_rows(&sql, &[Param::Int(object_id)]).await?;
        Ok(rows
            .first()
            .map(|row| TriggerState {
                is_disabled: row.get::<bool, _>(0).unwrap_or(false),
                parent: Some(TriggerParent {
                    schema: text(row, 1),
                    name: text(row, 2),
                    is_view: row.get::<bool, _>(3).unwrap_or(false),
                }),
            })
            .unwrap_or_default())
    }

    async fn load_extras(&self, cat: &str, object_id: i32) -> Result<ObjectExtras> {
        let sql = format!(
            r#"
            SELECT p.state_desc, p.permission_name, pr.name, c.name
            FROM {cat}.database_permissions p
            JOIN {cat}.database_principals pr ON pr.principal_id = p.grantee_principal_id
            LEFT JOIN {cat}.columns c ON c.object_id = p.major_id AND c.column_id = p.minor_id
            WHERE p.class = 1 AND p.major_id = @P1 AND p.state IN ('G', 'D', 'W')
            ORDER BY pr.name, p.permission_name, p.minor_id
            "#
        );
        let permissions = self
            .query_rows(&sql, &[Param::Int(object_id)])
            .await?
            .iter()
            .map(|row| Permission {
                state: text(row, 0),
                permission: text(row, 1),
                grantee: text(row, 2),
                column: opt_text(row, 3),
            })
            .collect();

        let sql = format!(
            r#"
            SELECT ep.name, CONVERT(nvarchar(max), ep.value), c.name
            FROM {cat}.extended_properties ep
            LEFT JOIN {cat}.columns c ON c.object_id = ep.major_id AND c.column_id = ep.minor_id
            WHERE ep.class = 1 AND ep.major_id = @P1
            ORDER BY ep.minor_id, ep.name
            "#
        );
        let extended_properties = self
            .query_rows(&sql, &[Param::Int(object_id)])
            .await?
            .iter()
            .map(|row| ExtendedProperty {
                name: text(row, 0),
                value: text(row, 1),
                column: opt_text(row, 2),
            })
            .collect();

        Ok(ObjectExtras {
            permissions,
            extended_properties,
        })
    }

    async fn fetch_module(&self, object: &ObjectDescriptor) -> Result<Vec<String>> {
        let cat = catalog(&object.database)?;
        let object_id = self.object_id(object).await?;
        let mut module = self.load_module(&cat, object, object_id).await?;
        if object.kind == ObjectKind::Trigger {
            module.trigger = Some(self.load_trigger_state(&cat, object_id).await?);
        }
        let extras = self.load_extras(&cat, object_id).await?;
        Ok(scripter::module_batches(object, &module, &extras))
    }

    async fn fetch_database_trigger(&self, object: &ObjectDescriptor) -> Result<Vec<String>> {
        let cat = catalog(&object.database)?;
        let sql = format!(
            "SELECT m.definition, m.uses_ansi_nulls, m.uses_quoted_identifier, t.is_disabled \
             FROM {cat}.triggers t JOIN {cat}.sql_modules m ON m.object_id = t.object_id \
             WHERE t.parent_class = 0 AND t.name = @P1"
        );
        let rows = self.query_rows(&sql, &[Param::Text(&object.name)]).await?;
        let row = rows
            .first()
            .ok_or_else(|| ScriptError::fetch(object.to_string(), "object not found"))?;
        let definition = row
            .get::<&str, _>(0)
            .ok_or_else(|| ScriptError::fetch(object.to_string(), "definition is encrypted or unavailable"))?;

        let module = ModuleDefinition {
            definition: definition.to_string(),
            uses_ansi_nulls: row.get::<bool, _>(1).unwrap_or(true),
            uses_quoted_identifier: row.get::<bool, _>(2).unwrap_or(true),
            trigger: Some(TriggerState {
                is_disabled: row.get::<bool, _>(3).unwrap_or(false),
                parent: None,
            }),
        };
        Ok(scripter::module_batches(object, &module, &ObjectExtras::default()))
    }

    async fn fetch_table(&self, object: &ObjectDescriptor) -> Result<Vec<String>> {
        let cat = catalog(&object.database)?;
        let object_id = self.object_id(object).await?;

        let mut table = TableDefinition {
            schema: object.schema_or_default().to_string(),
            name: object.name.clone(),
            ..Default::default()
        };

        let sql = format!("SELECT t.uses_ansi_nulls FROM {cat}.tables t WHERE t.object_id = @P1");
        table.uses_ansi_nulls = self
            .query_rows(&sql, &[Param::Int(object_id)])
            .await?
            .first()
            .and_then(|r| r.get::<bool, _>(0))
            .unwrap_or(true);

        self.load_columns(&cat, object_id, &mut table).await?;
        self.load_indexes(&cat, object_id, &mut table).await?;
        self.load_defaults(&cat, object_id, &mut table).await?;
        self.load_foreign_keys(&cat, object_id, &mut table).await?;
        self.load_check_constraints(&cat, object_id, &mut table).await?;
        table.extras = self.load_extras(&cat, object_id).await?;

        debug!(
            "Loaded {} columns, {} indexes, {} foreign keys for {}",
            table.columns.len(),
            table.indexes.len(),
            table.foreign_keys.len(),
            table.full_name()
        );

        Ok(scripter::table_batches(&table))
    }

    async fn load_columns(&self, cat: &str, object_id: i32, table: &mut TableDefinition) -> Result<()> {
        let sql = format!(
            r#"
            SELECT c.name, tp.name, ts.name, tp.is_user_defined,
                   CAST(c.max_length AS INT), CAST(c.precision AS INT), CAST(c.scale AS INT),
                   c.is_nullable,
                   CONVERT(nvarchar(40), ic.seed_value), CONVERT(nvarchar(40), ic.increment_value),
                   cc.definition, CAST(ISNULL(cc.is_persisted, 0) AS bit), c.collation_name
            FROM {cat}.columns c
            JOIN {cat}.types tp ON tp.user_type_id = c.user_type_id
            JOIN {cat}.schemas ts ON ts.schema_id = tp.schema_id
            LEFT JOIN {cat}.identity_columns ic ON ic.object_id = c.object_id AND ic.column_id = c.column_id
            LEFT JOIN {cat}.computed_columns cc ON cc.object_id = c.object_id AND cc.column_id = c.column_id
            WHERE c.object_id = @P1
            ORDER BY c.column_id
            "#
        );

        for row in self.query_rows(&sql, &[Param::Int(object_id)]).await? {
            let identity = match (opt_text(&row, 8), opt_text(&row, 9)) {
                (Some(seed), Some(increment)) => Some((seed, increment)),
                _ => None,
            };
            table.columns.push(Column {
                name: text(&row, 0),
                data_type: text(&row, 1),
                type_schema: text(&row, 2),
                is_user_type: row.get::<bool, _>(3).unwrap_or(false),
                max_length: row.get::<i32, _>(4).unwrap_or(0),
                precision: row.get::<i32, _>(5).unwrap_or(0),
                scale: row.get::<i32, _>(6).unwrap_or(0),
                is_nullable: row.get::<bool, _>(7).unwrap_or(true),
                identity,
                computed: opt_text(&row, 10),
                is_persisted: row.get::<bool, _>(11).unwrap_or(false),
                collation: opt_text(&row, 12),
            });
        }
        Ok(())
    }

    async fn load_indexes(&self, cat: &str, object_id: i32, table: &mut TableDefinition) -> Result<()> {
        let sql = format!(
            r#"
            SELECT CAST(i.index_id AS INT), i.name, i.is_unique, i.is_primary_key,
                   i.is_unique_constraint, CAST(CASE WHEN i.type = 1 THEN 1 ELSE 0 END AS bit),
                   i.filter_definition, ds.name, CAST(i.type AS INT)
            FROM {cat}.indexes i
            LEFT JOIN {cat}.data_spaces ds ON ds.data_space_id = i.data_space_id
            WHERE i.object_id = @P1 AND i.type IN (0, 1, 2) AND i.is_hypothetical = 0
            ORDER BY i.index_id
            "#
        );
        let index_rows = self.query_rows(&sql, &[Param::Int(object_id)]).await?;

        let sql = format!(
            r#"
            SELECT CAST(ic.index_id AS INT), c.name, ic.is_descending_key, ic.is_included_column,
                   CAST(ic.key_ordinal AS INT), CAST(ic.partition_ordinal AS INT)
            FROM {cat}.index_columns ic
            JOIN {cat}.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id
            WHERE ic.object_id = @P1
            ORDER BY ic.index_id, ic.key_ordinal, ic.index_column_id
            "#
        );
        let column_rows = self.query_rows(&sql, &[Param::Int(object_id)]).await?;

        let mut key_columns: HashMap<i32, Vec<IndexColumn>> = HashMap::new();
        let mut include_columns: HashMap<i32, Vec<String>> = HashMap::new();
        let mut partition_columns: HashMap<i32, String> = HashMap::new();
        for row in &column_rows {
            let index_id = row.get::<i32, _>(0).unwrap_or(0);
            let name = text(row, 1);
            if row.get::<i32, _>(5).unwrap_or(0) == 1 {
                partition_columns.insert(index_id, name.clone());
            }
            if row.get::<bool, _>(3).unwrap_or(false) {
                include_columns.entry(index_id).or_default().push(name);
            } else if row.get::<i32, _>(4).unwrap_or(0) > 0 {
                key_columns.entry(index_id).or_default().push(IndexColumn {
                    name,
                    descending: row.get::<bool, _>(2).unwrap_or(false),
                });
            }
        }

        for row in &index_rows {
            let index_id = row.get::<i32, _>(0).unwrap_or(0);
            let data_space = opt_text(row, 7);
            let partition_column = partition_columns.get(&index_id).cloned();

            // Heap or clustered index carries the table's storage.
            if index_id <= 1 {
                table.data_space = data_space.clone();
                table.partition_column = partition_column.clone();
            }
            if row.get::<i32, _>(8).unwrap_or(0) == 0 {
                continue;
            }

            table.indexes.push(Index {
                index_id,
                name: text(row, 1),
                columns: key_columns.remove(&index_id).unwrap_or_default(),
                include_cols: include_columns.remove(&index_id).unwrap_or_default(),
                is_unique: row.get::<bool, _>(2).unwrap_or(false),
                is_primary_key: row.get::<bool, _>(3).unwrap_or(false),
                is_unique_constraint: row.get::<bool, _>(4).unwrap_or(false),
                is_clustered: row.get::<bool, _>(5).unwrap_or(false),
                filter: opt_text(row, 6),
                data_space,
                partition_column,
            });
        }
        Ok(())
    }

    async fn load_defaults(&self, cat: &str, object_id: i32, table: &mut TableDefinition) -> Result<()> {
        let sql = format!(
            r#"
            SELECT dc.name, c.name, dc.definition
            FROM {cat}.default_constraints dc
            JOIN {cat}.columns c ON c.object_id = dc.parent_object_id AND c.column_id = dc.parent_column_id
            WHERE dc.parent_object_id = @P1
            ORDER BY dc.name
            "#
        );
        table.defaults = self
            .query_rows(&sql, &[Param::Int(object_id)])
            .await?
            .iter()
            .map(|row| DefaultConstraint {
                name: text(row, 0),
                column: text(row, 1),
                definition: text(row, 2),
            })
            .collect();
        Ok(())
    }

    async fn load_foreign_keys(&self, cat: &str, object_id: i32, table: &mut TableDefinition) -> Result<()> {
        let sql = format!(
            r#"
            SELECT fk.object_id, fk.name, rs.name, rt.name,
                   fk.delete_referential_action_desc, fk.update_referential_action_desc,
                   fk.is_disabled, fk.is_not_trusted
            FROM {cat}.foreign_keys fk
            JOIN {cat}.objects rt ON rt.object_id = fk.referenced_object_id
            JOIN {cat}.schemas rs ON rs.schema_id = rt.schema_id
            WHERE fk.parent_object_id = @P1
            ORDER BY fk.name
            "#
        );
        let fk_rows = self.query_rows(&sql, &[Param::Int(object_id)]).await?;

        let sql = format!(
            r#"
            SELECT fkc.constraint_object_id, pc.name, rc.name
            FROM {cat}.foreign_key_columns fkc
            JOIN {cat}.columns pc ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id
            JOIN {cat}.columns rc ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id
            WHERE fkc.parent_object_id = @P1
            ORDER BY fkc.constraint_object_id, fkc.constraint_column_id
            "#
        );
        let mut columns: HashMap<i32, (Vec<String>, Vec<String>)> = HashMap::new();
        for row in self.query_rows(&sql, &[Param::Int(object_id)]).await? {
            let entry = columns.entry(row.get::<i32, _>(0).unwrap_or(0)).or_default();
            entry.0.push(text(&row, 1));
            entry.1.push(text(&row, 2));
        }

        for row in &fk_rows {
            let (cols, ref_cols) = columns
                .remove(&row.get::<i32, _>(0).unwrap_or(0))
                .unwrap_or_default();
            table.foreign_keys.push(ForeignKey {
                name: text(row, 1),
                columns: cols,
                ref_schema: text(row, 2),
                ref_table: text(row, 3),
                ref_columns: ref_cols,
                on_delete: text(row, 4),
                on_update: text(row, 5),
                is_disabled: row.get::<bool, _>(6).unwrap_or(false),
                is_not_trusted: row.get::<bool, _>(7).unwrap_or(false),
            });
        }
        Ok(())
    }

    async fn load_check_constraints(&self, cat: &str, object_id: i32, table: &mut TableDefinition) -> Result<()> {
        let sql = format!(
            r#"
            SELECT cc.name, cc.definition, cc.is_disabled, cc.is_not_trusted
            FROM {cat}.check_constraints cc
            WHERE cc.parent_object_id = @P1
            ORDER BY cc.name
            "#
        );
        table.check_constraints = self
            .query_rows(&sql, &[Param::Int(object_id)])
            .await?
            .iter()
            .map(|row| CheckConstraint {
                name: text(row, 0),
                definition: text(row, 1),
                is_disabled: row.get::<bool, _>(2).unwrap_or(false),
                is_not_trusted: row.get::<bool, _>(3).unwrap_or(false),
            })
            .collect();
        Ok(())
    }

    async fn fetch_user_type(&self, object: &ObjectDescriptor) -> Result<Vec<String>> {
        let cat = catalog(&object.database)?;
        let sql = format!(
            r#"
            SELECT bt.name, CAST(t.max_length AS INT), CAST(t.precision AS INT),
                   CAST(t.scale AS INT), t.is_nullable
            FROM {cat}.types t
            JOIN {cat}.schemas s ON s.schema_id = t.schema_id
            JOIN {cat}.types bt ON bt.user_type_id = t.system_type_id
            WHERE s.name = @P1 AND t.name = @P2 AND t.is_user_defined = 1
            "#
        );
        let rows = self
            .query_rows(
                &sql,
                &[Param::Text(object.schema_or_default()), Param::Text(&object.name)],
            )
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| ScriptError::fetch(object.to_string(), "object not found"))?;

        Ok(scripter::user_type_batches(&UserTypeDefinition {
            schema: object.schema_or_default().to_string(),
            name: object.name.clone(),
            base_type: text(row, 0),
            max_length: row.get::<i32, _>(1).unwrap_or(0),
            precision: row.get::<i32, _>(2).unwrap_or(0),
            scale: row.get::<i32, _>(3).unwrap_or(0),
            is_nullable: row.get::<bool, _>(4).unwrap_or(true),
        }))
    }

    async fn fetch_partition_function(&self, object: &ObjectDescriptor) -> Result<Vec<String>> {
        let cat = catalog(&object.database)?;
        let sql = format!(
            r#"
            SELECT pf.function_id, pf.boundary_value_on_right, tp.name,
                   CAST(pp.max_length AS INT), CAST(pp.precision AS INT), CAST(pp.scale AS INT)
            FROM {cat}.partition_functions pf
            JOIN {cat}.partition_parameters pp ON pp.function_id = pf.function_id
            JOIN {cat}.types tp ON tp.user_type_id = pp.user_type_id
            WHERE pf.name = @P1
            "#
        );
        let rows = self.query_rows(&sql, &[Param::Text(&object.name)]).await?;
        let row = rows
            .first()
            .ok_or_else(|| ScriptError::fetch(object.to_string(), "object not found"))?;
        let function_id = row.get::<i32, _>(0).unwrap_or(0);

        let sql = format!(
            r#"
            SELECT CASE
                WHEN rv.value IS NULL THEN N'NULL'
                WHEN CAST(SQL_VARIANT_PROPERTY(rv.value, 'BaseType') AS sysname) IN
                    (N'tinyint', N'smallint', N'int', N'bigint', N'decimal', N'numeric',
                     N'float', N'real', N'money', N'smallmoney', N'bit')
                    THEN CONVERT(nvarchar(4000), rv.value)
                WHEN CAST(SQL_VARIANT_PROPERTY(rv.value, 'BaseType') AS sysname) IN
                    (N'date', N'datetime', N'datetime2', N'smalldatetime', N'datetimeoffset', N'time')
                    THEN N'N''' + CONVERT(nvarchar(4000), rv.value, 126) + N''''
                ELSE N'N''' + REPLACE(CONVERT(nvarchar(4000), rv.value), N'''', N'''''') + N''''
            END
            FROM {cat}.partition_range_values rv
            WHERE rv.function_id = @P1
            ORDER BY rv.boundary_id
            "#
        );
        let boundaries = self
            .query_rows(&sql, &[Param::Int(function_id)])
            .await?
            .iter()
            .map(|r| text(r, 0))
            .collect();

        Ok(scripter::partition_function_batches(&PartitionFunctionDefinition {
            name: object.name.clone(),
            parameter_type: scripter::format_mssql_type(
                &text(row, 2),
                row.get::<i32, _>(3).unwrap_or(0),
                row.get::<i32, _>(4).unwrap_or(0),
                row.get::<i32, _>(5).unwrap_or(0),
            ),
            boundary_on_right: row.get::<bool, _>(1).unwrap_or(false),
            boundaries,
        }))
    }

    async fn fetch_partition_scheme(&self, object: &ObjectDescriptor) -> Result<Vec<String>> {
        let cat = catalog(&object.database)?;
        let sql = format!(
            r#"
            SELECT ps.data_space_id, pf.name
            FROM {cat}.partition_schemes ps
            JOIN {cat}.partition_functions pf ON pf.function_id = ps.function_id
            WHERE ps.name = @P1
            "#
        );
        let rows = self.query_rows(&sql, &[Param::Text(&object.name)]).await?;
        let row = rows
            .first()
            .ok_or_else(|| ScriptError::fetch(object.to_string(), "object not found"))?;
        let scheme_id = row.get::<i32, _>(0).unwrap_or(0);

        let sql = format!(
            r#"
            SELECT fg.name
            FROM {cat}.destination_data_spaces dds
            JOIN {cat}.filegroups fg ON fg.data_space_id = dds.data_space_id
            WHERE dds.partition_scheme_id = @P1
            ORDER BY dds.destination_id
            "#
        );
        let filegroups = self
            .query_rows(&sql, &[Param::Int(scheme_id)])
            .await?
            .iter()
            .map(|r| text(r, 0))
            .collect();

        Ok(scripter::partition_scheme_batches(&PartitionSchemeDefinition {
            name: object.name.clone(),
            function_name: text(row, 1),
            filegroups,
        }))
    }
}

#[async_trait]
impl ScriptFetcher for MssqlPool {
    async fn list_objects(&self, task: Task) -> Result<Vec<CatalogEntry>> {
        let database = self.config.database.clone();
        let cat = catalog(&database)?;

        let entries = match task {
            Task::StoredProcedures | Task::Tables | Task::Views | Task::Functions => {
                let codes = match task {
                    Task::StoredProcedures => "'P'",
                    Task::Tables => "'U'",
                    Task::Views => "'V'",
                    _ => "'FN', 'IF', 'TF'",
                };
                let mut entries = Vec::new();
                for (schema, name, code, is_system) in self.list_schema_objects(codes).await? {
                    let kind = match task {
                        Task::Functions => match FunctionKind::from_type_code(&code) {
                            Some(f) => ObjectKind::Function(f),
                            None => continue,
                        },
                        other => other.primary_kind(),
                    };
                    entries.push(CatalogEntry {
                        object: ObjectDescriptor::new(database.clone(), schema, name, kind)?,
                        is_system,
                    });
                }
                entries
            }
            Task::UserTypes => {
                let sql = format!(
                    "SELECT s.name, t.name FROM {cat}.types t JOIN {cat}.schemas s ON s.schema_id = t.schema_id \
                     WHERE t.is_user_defined = 1 AND t.is_table_type = 0 AND t.is_assembly_type = 0 \
                     ORDER BY s.name, t.name"
                );
                self.query_rows(&sql, &[])
                    .await?
                    .iter()
                    .map(|row| {
                        Ok(CatalogEntry {
                            object: ObjectDescriptor::new(
                                database.clone(),
                                text(row, 0),
                                text(row, 1),
                                ObjectKind::UserDefinedType,
                            )?,
                            is_system: false,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?
            }
            Task::Triggers => {
                let sql = format!(
                    "SELECT t.name, t.is_ms_shipped FROM {cat}.triggers t WHERE t.parent_class = 0 ORDER BY t.name"
                );
                self.list_named(&sql, ObjectKind::DatabaseTrigger).await?
            }
            Task::PartitionSchemes => {
                let sql = format!(
                    "SELECT ps.name, CAST(0 AS bit) FROM {cat}.partition_schemes ps ORDER BY ps.name"
                );
                self.list_named(&sql, ObjectKind::PartitionScheme).await?
            }
            Task::PartitionFunctions => {
                let sql = format!(
                    "SELECT pf.name, CAST(0 AS bit) FROM {cat}.partition_functions pf ORDER BY pf.name"
                );
                self.list_named(&sql, ObjectKind::PartitionFunction).await?
            }
        };

        info!("Found {} {}", entries.len(), task.label());
        Ok(entries)
    }

    async fn list_table_triggers(&self, table: &ObjectDescriptor) -> Result<Vec<CatalogEntry>> {
        let cat = catalog(&table.database)?;
        let sql = format!(
            r#"
            SELECT ts.name, t.name, t.is_ms_shipped
            FROM {cat}.triggers t
            JOIN {cat}.objects tob ON tob.object_id = t.object_id
            JOIN {cat}.schemas ts ON ts.schema_id = tob.schema_id
            JOIN {cat}.objects p ON p.object_id = t.parent_id
            JOIN {cat}.schemas ps ON ps.schema_id = p.schema_id
            WHERE t.parent_class = 1 AND ps.name = @P1 AND p.name = @P2
            ORDER BY t.name
            "#
        );
        let rows = self
            .query_rows(
                &sql,
                &[Param::Text(table.schema_or_default()), Param::Text(&table.name)],
            )
            .await?;

        rows.iter()
            .map(|row| {
                Ok(CatalogEntry {
                    object: ObjectDescriptor::new(
                        table.database.clone(),
                        text(row, 0),
                        text(row, 1),
                        ObjectKind::Trigger,
                    )?,
                    is_system: row.get::<bool, _>(2).unwrap_or(false),
                })
            })
            .collect()
    }

    async fn fetch_script(&self, object: &ObjectDescriptor) -> Result<Vec<String>> {
        debug!("Scripting {} {}", object.kind.label(), object);
        match object.kind {
            ObjectKind::StoredProcedure
            | ObjectKind::View
            | ObjectKind::Function(_)
            | ObjectKind::Trigger => self.fetch_module(object).await,
            ObjectKind::Table => self.fetch_table(object).await,
            ObjectKind::DatabaseTrigger => self.fetch_database_trigger(object).await,
            ObjectKind::UserDefinedType => self.fetch_user_type(object).await,
            ObjectKind::PartitionFunction => self.fetch_partition_function(object).await,
            ObjectKind::PartitionScheme => self.fetch_partition_scheme(object).await,
        }
    }
}

#[async_trait]
impl ObjectTypeLookup for MssqlPool {
    async fn lookup_type(&self, name: &QualifiedName) -> Result<Option<String>> {
        let cat = catalog(&name.database)?;
        let sql = format!(
            "SELECT o.type FROM {cat}.objects o JOIN {cat}.schemas s ON o.schema_id = s.schema_id \
             WHERE o.name = @P1 AND s.name = @P2"
        );
        let rows = self
            .query_rows(&sql, &[Param::Text(&name.name), Param::Text(&name.schema)])
            .await?;
        Ok(rows.first().map(|r| text(r, 0).trim().to_string()))
    }
}

/// Bound query parameter.
enum Param<'a> {
    Text(&'a str),
    Int(i32),
}

/// Three-part prefix for catalog views of `database`, e.g. `[Sales].sys`.
fn catalog(database: &str) -> Result<String> {
    validate_identifier(database)?;
    Ok(format!("{}.sys", quote_mssql(database)))
}

fn text(row: &Row, idx: usize) -> String {
    row.get::<&str, _>(idx).unwrap_or_default().to_string()
}

fn opt_text(row: &Row, idx: usize) -> Option<String> {
    row.get::<&str, _>(idx).map(str::to_string)
}
