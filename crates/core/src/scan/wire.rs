//! Messages handed to the execution layer
use serde::{Deserialize, Serialize};

use super::{ScanRangeDescriptor, SnapshotHandle};
use crate::kernel::{DeleteFileDescriptor, DeleteKind, FileFormat, Literal, TableIdent};
use crate::{PlanError, PlanResult, PlanStage};

/// Delete kind as understood by workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum WireFileContent {
    PositionDeletes,
    EqualityDeletes,
}

impl From<&DeleteKind> for WireFileContent {
    fn from(kind: &DeleteKind) -> Self {
        match kind {
            DeleteKind::PositionDeletes => Self::PositionDeletes,
            DeleteKind::EqualityDeletes { .. } => Self::EqualityDeletes,
        }
    }
}

/// A delete file entry of a [`WireScanRange`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireDeleteFile {
    /// Full path of the delete file
    pub full_path: String,
    /// Length of the delete file in bytes
    pub length: u64,
    /// How the file deletes rows
    pub file_content: WireFileContent,
}

impl From<&DeleteFileDescriptor> for WireDeleteFile {
    fn from(delete: &DeleteFileDescriptor) -> Self {
        Self {
            full_path: delete.path.clone(),
            length: delete.length,
            file_content: WireFileContent::from(&delete.kind),
        }
    }
}

/// One unit of scan work, as sent to a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireScanRange {
    /// Full path of the data file
    pub full_path: String,
    /// Format of the data file
    pub file_format: FileFormat,
    /// First byte to read
    pub offset: u64,
    /// Number of bytes to read
    pub length: u64,
    /// Total length of the data file
    pub file_length: u64,
    /// Partition values of the data file
    pub partition_values: Vec<Literal>,
    /// Delete files to apply, in catalog order
    pub delete_files: Vec<WireDeleteFile>,
    /// Hosts preferred for reading the range, best first
    pub candidate_hosts: Vec<String>,
}

/// Renders scan range descriptors as wire messages.
#[derive(Debug, Clone)]
pub struct ScanRangeSerializer {
    table: TableIdent,
    snapshot_id: i64,
}

impl ScanRangeSerializer {
    /// Create a serializer for the snapshot bound to `handle`
    pub fn new(handle: &SnapshotHandle) -> Self {
        Self {
            table: handle.ident().clone(),
            snapshot_id: handle.snapshot_id(),
        }
    }

    /// Render `descriptor`.
    ///
    /// Only fails when the descriptor breaks an invariant established
    /// upstream: an empty path, a range past the end of the file, or
    /// missing locality assignment.
    pub fn serialize(&self, descriptor: &ScanRangeDescriptor) -> PlanResult<WireScanRange> {
        if descriptor.path().is_empty() {
            return Err(self.inconsistency("scan range without a file path".to_string()));
        }
        if descriptor
            .start()
            .checked_add(descriptor.length())
            .is_none_or(|end| end > descriptor.file_length())
        {
            return Err(self.inconsistency(format!(
                "range [{}, {}+{}) exceeds length {} of '{}'",
                descriptor.start(),
                descriptor.start(),
                descriptor.length(),
                descriptor.file_length(),
                descriptor.path()
            )));
        }
        let Some(hosts) = descriptor.candidate_hosts() else {
            return Err(self.inconsistency(format!(
                "no locality assigned to range of '{}' at {}",
                descriptor.path(),
                descriptor.start()
            )));
        };

        Ok(WireScanRange {
            full_path: descriptor.path().to_string(),
            file_format: descriptor.format(),
            offset: descriptor.start(),
            length: descriptor.length(),
            file_length: descriptor.file_length(),
            partition_values: descriptor.partition_values().to_vec(),
            delete_files: descriptor.deletes().iter().map(WireDeleteFile::from).collect(),
            candidate_hosts: hosts.to_vec(),
        })
    }

    fn inconsistency(&self, message: String) -> PlanError {
        PlanError::InternalInconsistency {
            table: self.table.clone(),
            snapshot_id: self.snapshot_id,
            stage: PlanStage::Serialize,
            message,
        }
    }
}
