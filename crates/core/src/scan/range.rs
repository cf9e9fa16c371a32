//! Scan range construction
//!
//! A [`FileScanTask`] covers a byte range of one data file. Workers read
//! ranges no larger than the target split size, so large tasks are cut into
//! contiguous chunks. Every chunk carries the full list of classified delete
//! files of its task: any row of the data file may be deleted by any of them.
use crate::kernel::{DeleteFileDescriptor, FileFormat, FileScanTask, Literal, TableIdent};
use crate::{PlanError, PlanResult, PlanStage};

use super::SnapshotHandle;

/// A contiguous byte range of one data file with the deletes that apply to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRangeDescriptor {
    path: String,
    format: FileFormat,
    file_length: u64,
    start: u64,
    length: u64,
    partition_values: Vec<Literal>,
    deletes: Vec<DeleteFileDescriptor>,
    candidate_hosts: Option<Vec<String>>,
}

impl ScanRangeDescriptor {
    /// Full path of the data file
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Format of the data file
    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// Total length of the data file
    pub fn file_length(&self) -> u64 {
        self.file_length
    }

    /// First byte of the range
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Number of bytes in the range
    pub fn length(&self) -> u64 {
        self.length
    }

    /// One past the last byte of the range
    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    /// Partition values of the data file
    pub fn partition_values(&self) -> &[Literal] {
        &self.partition_values
    }

    /// Delete files to apply, in catalog order
    pub fn deletes(&self) -> &[DeleteFileDescriptor] {
        &self.deletes
    }

    /// Hosts preferred for reading this range.
    ///
    /// `None` until locality has been assigned.
    pub fn candidate_hosts(&self) -> Option<&[String]> {
        self.candidate_hosts.as_deref()
    }

    /// Attach candidate hosts, replacing any assigned before
    pub fn with_candidate_hosts(mut self, hosts: Vec<String>) -> Self {
        self.candidate_hosts = Some(hosts);
        self
    }
}

/// Turns file scan tasks into scan range descriptors.
#[derive(Debug, Clone)]
pub struct ScanRangeBuilder {
    table: TableIdent,
    snapshot_id: i64,
    split_size: u64,
}

impl ScanRangeBuilder {
    /// Create a builder for the snapshot bound to `handle`
    pub fn new(handle: &SnapshotHandle) -> Self {
        Self {
            table: handle.ident().clone(),
            snapshot_id: handle.snapshot_id(),
            split_size: handle.target_split_size(),
        }
    }

    /// Build the descriptors for one task, ordered by offset.
    pub fn build(&self, task: FileScanTask) -> PlanResult<Vec<ScanRangeDescriptor>> {
        let FileScanTask {
            data_file,
            deletes,
            start,
            length,
        } = task;

        let deletes = deletes
            .into_iter()
            .map(|delete| {
                let delete_file = delete.path.clone();
                DeleteFileDescriptor::try_from(delete).map_err(|reason| {
                    PlanError::UnclassifiedDeleteFile {
                        table: self.table.clone(),
                        snapshot_id: self.snapshot_id,
                        data_file: data_file.path.clone(),
                        delete_file,
                        reason: reason.to_string(),
                    }
                })
            })
            .collect::<PlanResult<Vec<_>>>()?;

        let file_length = data_file.file_size_in_bytes;
        let end = start.checked_add(length).filter(|end| *end <= file_length);
        let Some(end) = end else {
            return Err(self.inconsistency(format!(
                "task range [{start}, {start}+{length}) exceeds length {file_length} of '{}'",
                data_file.path
            )));
        };
        if self.split_size == 0 {
            return Err(self.inconsistency("split size must be positive".to_string()));
        }

        let chunks = length.div_ceil(self.split_size).max(1);
        let descriptors = (0..chunks)
            .map(|chunk| {
                let offset = start + chunk * self.split_size;
                ScanRangeDescriptor {
                    path: data_file.path.clone(),
                    format: data_file.format,
                    file_length,
                    start: offset,
                    length: self.split_size.min(end - offset),
                    partition_values: data_file.partition.clone(),
                    deletes: deletes.clone(),
                    candidate_hosts: None,
                }
            })
            .collect();
        Ok(descriptors)
    }

    fn inconsistency(&self, message: String) -> PlanError {
        PlanError::InternalInconsistency {
            table: self.table.clone(),
            snapshot_id: self.snapshot_id,
            stage: PlanStage::Build,
            message,
        }
    }
}
