//! Catalog abstraction for snapshot-versioned tables
//!
//! The planner never talks to a table format library directly. It consumes a
//! [`TableCatalog`], which resolves snapshots and enumerates file scan tasks
//! with their delete files already attached. To plan against a new catalog,
//! implement this trait.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use futures::stream::BoxStream;

use crate::kernel::{FileScanTask, TableIdent};

pub mod memory;
pub mod stream;

pub use stream::{with_guard, ReceiverStreamBuilder};

/// Split size used when neither the planner nor the table configures one.
pub const DEFAULT_SPLIT_SIZE: u64 = 128 * 1024 * 1024;

/// A result type for catalog implementations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Lazily produced file scan tasks of one snapshot.
///
/// Dropping the stream releases whatever the catalog holds open for the
/// enumeration.
pub type FileScanTaskStream = BoxStream<'static, CatalogResult<FileScanTask>>;

/// Shared handle to a catalog
pub type CatalogRef = Arc<dyn TableCatalog>;

/// Error enum that represents a catalog failure.
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    /// The catalog could not be reached
    #[error("Catalog '{catalog}' is unavailable: {source}")]
    Unavailable {
        /// Name of the catalog
        catalog: String,
        /// Underlying failure
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// The table is not registered in the catalog
    #[error("Table not found in catalog: {table}")]
    TableNotFound {
        /// The requested table
        table: TableIdent,
    },

    /// Reading table metadata or manifests failed
    #[error("I/O error reading catalog metadata: {source}")]
    Io {
        /// Underlying failure
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// A generic error qualified in the message
    #[error("Error in {catalog} catalog: {source}")]
    Generic {
        /// Name of the catalog
        catalog: String,
        /// Error message
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

/// Table level metadata read from the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableMetadata {
    /// Current snapshot, `None` when nothing was ever committed
    pub current_snapshot_id: Option<i64>,
    /// Table properties
    pub properties: HashMap<String, String>,
}

/// A committed snapshot of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    /// Snapshot id
    pub snapshot_id: i64,
    /// Parent snapshot id, if any
    pub parent_snapshot_id: Option<i64>,
    /// Commit time in milliseconds since the unix epoch
    pub timestamp_ms: i64,
}

/// Request to enumerate the files of one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePlanRequest {
    /// Table to enumerate
    pub table: TableIdent,
    /// Snapshot to enumerate
    pub snapshot_id: i64,
    /// Target split size in bytes
    pub target_split_size: u64,
}

/// Capabilities the planner consumes from an external table catalog.
///
/// Implementations are shared across concurrent planning passes and must be
/// safe for concurrent use.
#[async_trait::async_trait]
pub trait TableCatalog: Send + Sync + Debug {
    /// Name of the catalog, used in error reports
    fn name(&self) -> &str;

    /// Read table level metadata.
    async fn load_table(&self, table: &TableIdent) -> CatalogResult<TableMetadata>;

    /// Look up a snapshot by id, returning `None` when the table has no such snapshot.
    async fn snapshot(
        &self,
        table: &TableIdent,
        snapshot_id: i64,
    ) -> CatalogResult<Option<SnapshotInfo>>;

    /// Enumerate the file scan tasks of a snapshot.
    ///
    /// Pruning happens here, inside the catalog. Each task comes with every
    /// delete file that applies to its data file.
    async fn plan_files(&self, request: FilePlanRequest) -> CatalogResult<FileScanTaskStream>;

    /// Split size used when neither planner nor table configure one.
    fn default_split_size(&self) -> u64 {
        DEFAULT_SPLIT_SIZE
    }
}
