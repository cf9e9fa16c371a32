//! Errors raised while planning a table scan
use std::fmt;
use std::time::Duration;

use crate::data_catalog::CatalogError;
use crate::kernel::TableIdent;

/// A result returned by the scan planner
pub type PlanResult<T, E = PlanError> = std::result::Result<T, E>;

/// The pipeline stage a planning failure originated from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PlanStage {
    /// Parsing and validating planner configuration
    Configure,
    /// Resolving the snapshot to scan
    Resolve,
    /// Enumerating file scan tasks from the catalog
    Enumerate,
    /// Turning file scan tasks into scan ranges
    Build,
    /// Attaching locality hints
    Locate,
    /// Rendering scan ranges into wire messages
    Serialize,
}

impl AsRef<str> for PlanStage {
    fn as_ref(&self) -> &str {
        match self {
            Self::Configure => "configure",
            Self::Resolve => "resolve",
            Self::Enumerate => "enumerate",
            Self::Build => "build",
            Self::Locate => "locate",
            Self::Serialize => "serialize",
        }
    }
}

impl fmt::Display for PlanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Scan planning error.
///
/// Every failure aborts planning of the whole table reference. There is no
/// partial result, since a scan that silently misses files or deletes
/// returns wrong rows instead of failing.
#[allow(missing_docs)]
#[derive(thiserror::Error, Debug)]
pub enum PlanError {
    /// The catalog could not be reached or its table metadata could not be read.
    #[error("Catalog '{catalog}' unavailable while resolving {table}: {source}")]
    CatalogUnavailable {
        table: TableIdent,
        catalog: String,
        #[source]
        source: CatalogError,
    },

    /// An explicit snapshot id was requested that the table does not have.
    #[error("Snapshot {snapshot_id} not found in table {table}")]
    SnapshotNotFound { table: TableIdent, snapshot_id: i64 },

    /// A configuration value could not be parsed or is out of range.
    ///
    /// Values parsed before planning carry no table. Values read from table
    /// properties, or rejected once a snapshot is bound, carry the table,
    /// the snapshot when known and the stage that rejected them.
    #[error("Invalid configuration for '{key}' during {stage}: {message}")]
    InvalidConfiguration {
        table: Option<TableIdent>,
        snapshot_id: Option<i64>,
        stage: PlanStage,
        key: String,
        message: String,
    },

    /// File enumeration failed before or while streaming tasks.
    #[error("Failed to enumerate files of {table} at snapshot {snapshot_id}: {source}")]
    PlanningIO {
        table: TableIdent,
        snapshot_id: i64,
        #[source]
        source: CatalogError,
    },

    /// A delete file without exactly one recognized delete kind.
    #[error(
        "Delete file '{delete_file}' of data file '{data_file}' in {table} at snapshot {snapshot_id} is not classified: {reason}"
    )]
    UnclassifiedDeleteFile {
        table: TableIdent,
        snapshot_id: i64,
        data_file: String,
        delete_file: String,
        reason: String,
    },

    /// Planning exceeded the configured timeout.
    #[error("Planning {table} timed out after {timeout:?} during {stage}")]
    PlanningTimeout {
        table: TableIdent,
        snapshot_id: Option<i64>,
        stage: PlanStage,
        timeout: Duration,
    },

    /// Planning was cancelled by the caller.
    #[error("Planning {table} was cancelled during {stage}")]
    Cancelled {
        table: TableIdent,
        snapshot_id: Option<i64>,
        stage: PlanStage,
    },

    /// An upstream invariant was violated. Indicates a defect in the catalog
    /// integration rather than a transient condition.
    #[error("Internal inconsistency planning {table} at snapshot {snapshot_id} during {stage}: {message}")]
    InternalInconsistency {
        table: TableIdent,
        snapshot_id: i64,
        stage: PlanStage,
        message: String,
    },
}

impl PlanError {
    /// The stage of the pipeline that failed.
    pub fn stage(&self) -> PlanStage {
        match self {
            Self::CatalogUnavailable { .. } | Self::SnapshotNotFound { .. } => PlanStage::Resolve,
            Self::PlanningIO { .. } => PlanStage::Enumerate,
            Self::UnclassifiedDeleteFile { .. } => PlanStage::Build,
            Self::InvalidConfiguration { stage, .. }
            | Self::PlanningTimeout { stage, .. }
            | Self::Cancelled { stage, .. }
            | Self::InternalInconsistency { stage, .. } => *stage,
        }
    }

    /// The table being planned, if the failure is tied to one.
    pub fn table(&self) -> Option<&TableIdent> {
        match self {
            Self::InvalidConfiguration { table, .. } => table.as_ref(),
            Self::CatalogUnavailable { table, .. }
            | Self::SnapshotNotFound { table, .. }
            | Self::PlanningIO { table, .. }
            | Self::UnclassifiedDeleteFile { table, .. }
            | Self::PlanningTimeout { table, .. }
            | Self::Cancelled { table, .. }
            | Self::InternalInconsistency { table, .. } => Some(table),
        }
    }

    /// The snapshot being planned, if it was resolved before the failure.
    pub fn snapshot_id(&self) -> Option<i64> {
        match self {
            Self::CatalogUnavailable { .. } => None,
            Self::SnapshotNotFound { snapshot_id, .. }
            | Self::PlanningIO { snapshot_id, .. }
            | Self::UnclassifiedDeleteFile { snapshot_id, .. }
            | Self::InternalInconsistency { snapshot_id, .. } => Some(*snapshot_id),
            Self::InvalidConfiguration { snapshot_id, .. }
            | Self::PlanningTimeout { snapshot_id, .. }
            | Self::Cancelled { snapshot_id, .. } => *snapshot_id,
        }
    }

    /// Whether this error signals a broken contract with the catalog
    /// integration. Such errors are defects to fix, not conditions to retry.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::UnclassifiedDeleteFile { .. } | Self::InternalInconsistency { .. }
        )
    }
}
