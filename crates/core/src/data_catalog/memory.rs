//! In-memory catalog serving scripted tables.
//!
//! Useful for tests and for embedding the planner where table metadata is
//! already at hand. Tables are registered with their snapshots and the file
//! scan tasks each snapshot enumerates; failures, slow enumerations and an
//! unreachable catalog can be scripted as well.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use tracing::debug;

use super::{
    with_guard, CatalogError, CatalogResult, FilePlanRequest, FileScanTaskStream,
    ReceiverStreamBuilder, SnapshotInfo, TableCatalog, TableMetadata, DEFAULT_SPLIT_SIZE,
};
use crate::kernel::{FileScanTask, TableIdent};

const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Default)]
struct ScriptedTable {
    properties: HashMap<String, String>,
    current_snapshot_id: Option<i64>,
    snapshots: Vec<(SnapshotInfo, Vec<FileScanTask>)>,
    fail_after: Option<usize>,
    task_delay: Option<Duration>,
}

impl ScriptedTable {
    fn snapshot(&self, snapshot_id: i64) -> Option<&(SnapshotInfo, Vec<FileScanTask>)> {
        self.snapshots
            .iter()
            .find(|(info, _)| info.snapshot_id == snapshot_id)
    }
}

/// Counts an open enumeration until dropped.
#[derive(Debug)]
struct EnumerationGuard {
    open: Arc<AtomicUsize>,
}

impl EnumerationGuard {
    fn acquire(open: &Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self { open: open.clone() }
    }
}

impl Drop for EnumerationGuard {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A catalog backed by scripted in-memory tables.
#[derive(Debug)]
pub struct InMemoryCatalog {
    name: String,
    tables: RwLock<HashMap<TableIdent, ScriptedTable>>,
    available: AtomicBool,
    open_enumerations: Arc<AtomicUsize>,
    default_split_size: u64,
}

impl InMemoryCatalog {
    /// Create an empty catalog
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            open_enumerations: Arc::new(AtomicUsize::new(0)),
            default_split_size: DEFAULT_SPLIT_SIZE,
        }
    }

    /// Override the catalog's default split size
    pub fn with_default_split_size(mut self, split_size: u64) -> Self {
        self.default_split_size = split_size;
        self
    }

    /// Register a table without snapshots.
    pub fn create_table(&self, table: TableIdent, properties: HashMap<String, String>) {
        self.tables.write().insert(
            table,
            ScriptedTable {
                properties,
                ..Default::default()
            },
        );
    }

    /// Commit a snapshot enumerating `tasks` and make it current.
    ///
    /// Registers the table if it does not exist yet.
    pub fn commit_snapshot(&self, table: &TableIdent, snapshot_id: i64, tasks: Vec<FileScanTask>) {
        let mut tables = self.tables.write();
        let entry = tables.entry(table.clone()).or_default();
        let info = SnapshotInfo {
            snapshot_id,
            parent_snapshot_id: entry.current_snapshot_id,
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as i64)
                .unwrap_or_default(),
        };
        entry.snapshots.retain(|(s, _)| s.snapshot_id != snapshot_id);
        entry.snapshots.push((info, tasks));
        entry.current_snapshot_id = Some(snapshot_id);
    }

    /// Point the table at another snapshot, or at none.
    pub fn set_current_snapshot(&self, table: &TableIdent, snapshot_id: Option<i64>) {
        if let Some(entry) = self.tables.write().get_mut(table) {
            entry.current_snapshot_id = snapshot_id;
        }
    }

    /// Make enumerations of `table` fail after yielding `tasks` tasks.
    pub fn fail_enumeration_after(&self, table: &TableIdent, tasks: usize) {
        if let Some(entry) = self.tables.write().get_mut(table) {
            entry.fail_after = Some(tasks);
        }
    }

    /// Delay every task yielded for `table`.
    pub fn delay_tasks(&self, table: &TableIdent, delay: Duration) {
        if let Some(entry) = self.tables.write().get_mut(table) {
            entry.task_delay = Some(delay);
        }
    }

    /// Simulate losing (or regaining) the catalog connection.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of enumerations whose stream has not been dropped yet.
    pub fn open_enumerations(&self) -> usize {
        self.open_enumerations.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> CatalogResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CatalogError::Unavailable {
                catalog: self.name.clone(),
                source: "connection refused".into(),
            })
        }
    }

    fn table(&self, table: &TableIdent) -> CatalogResult<ScriptedTable> {
        self.tables
            .read()
            .get(table)
            .cloned()
            .ok_or_else(|| CatalogError::TableNotFound {
                table: table.clone(),
            })
    }
}

#[async_trait::async_trait]
impl TableCatalog for InMemoryCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load_table(&self, table: &TableIdent) -> CatalogResult<TableMetadata> {
        self.ensure_available()?;
        let scripted = self.table(table)?;
        Ok(TableMetadata {
            current_snapshot_id: scripted.current_snapshot_id,
            properties: scripted.properties,
        })
    }

    async fn snapshot(
        &self,
        table: &TableIdent,
        snapshot_id: i64,
    ) -> CatalogResult<Option<SnapshotInfo>> {
        self.ensure_available()?;
        let scripted = self.table(table)?;
        Ok(scripted.snapshot(snapshot_id).map(|(info, _)| info.clone()))
    }

    async fn plan_files(&self, request: FilePlanRequest) -> CatalogResult<FileScanTaskStream> {
        self.ensure_available()?;
        let scripted = self.table(&request.table)?;
        let tasks = scripted
            .snapshot(request.snapshot_id)
            .map(|(_, tasks)| tasks.clone())
            .ok_or_else(|| CatalogError::Generic {
                catalog: self.name.clone(),
                source: format!(
                    "snapshot {} of {} has no manifest",
                    request.snapshot_id, request.table
                )
                .into(),
            })?;
        debug!(
            table = %request.table,
            snapshot_id = request.snapshot_id,
            tasks = tasks.len(),
            "enumerating scripted file scan tasks"
        );

        let fail_after = scripted.fail_after;
        let task_delay = scripted.task_delay;
        let mut builder = ReceiverStreamBuilder::<FileScanTask>::new(CHANNEL_CAPACITY);
        let tx = builder.tx();
        builder.spawn(async move {
            let total = tasks.len();
            let mut tasks = tasks.into_iter();
            for emitted in 0..=total {
                if fail_after == Some(emitted) {
                    return Err(CatalogError::Io {
                        source: format!("manifest read failed after {emitted} tasks").into(),
                    });
                }
                let Some(task) = tasks.next() else {
                    break;
                };
                if let Some(delay) = task_delay {
                    tokio::time::sleep(delay).await;
                }
                if tx.send(Ok(task)).await.is_err() {
                    break;
                }
            }
            Ok(())
        });

        Ok(with_guard(
            builder.build(),
            EnumerationGuard::acquire(&self.open_enumerations),
        ))
    }

    fn default_split_size(&self) -> u64 {
        self.default_split_size
    }
}
