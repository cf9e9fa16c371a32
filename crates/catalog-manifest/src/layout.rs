//! On-storage layout of manifest catalogs
//!
//! ```text
//! <root>/<database>/<table>/metadata/table.json
//! <root>/<database>/<table>/<manifest>          (one per snapshot manifest entry)
//! ```
//!
//! `table.json` holds the table properties and the snapshot log. Manifests are
//! newline delimited JSON, one [`ManifestEntry`] per line. Manifest paths are
//! relative to the table directory.
use std::collections::HashMap;

use lakescan_core::{DataFile, DeleteFile, FileScanTask, SnapshotInfo, TableIdent};
use object_store::path::Path;
use serde::{Deserialize, Serialize};

/// Name of the table metadata document
pub const TABLE_METADATA_FILE: &str = "table.json";

/// Table metadata document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TableDocument {
    /// Current snapshot, absent until the first commit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_snapshot_id: Option<i64>,
    /// Table properties
    #[serde(default)]
    pub properties: HashMap<String, String>,
    /// Committed snapshots
    #[serde(default)]
    pub snapshots: Vec<SnapshotDocument>,
}

impl TableDocument {
    pub(crate) fn snapshot(&self, snapshot_id: i64) -> Option<&SnapshotDocument> {
        self.snapshots.iter().find(|s| s.snapshot_id == snapshot_id)
    }
}

/// A snapshot entry of the table metadata document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SnapshotDocument {
    /// Id of the snapshot, unique within the table
    pub snapshot_id: i64,
    /// Snapshot this one was committed on top of
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_snapshot_id: Option<i64>,
    /// Commit time in milliseconds since the epoch
    pub timestamp_ms: i64,
    /// Manifests listing the files of the snapshot, relative to the table directory
    #[serde(default)]
    pub manifests: Vec<String>,
}

impl From<&SnapshotDocument> for SnapshotInfo {
    fn from(snapshot: &SnapshotDocument) -> Self {
        SnapshotInfo {
            snapshot_id: snapshot.snapshot_id,
            parent_snapshot_id: snapshot.parent_snapshot_id,
            timestamp_ms: snapshot.timestamp_ms,
        }
    }
}

/// One line of a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ManifestEntry {
    /// The data file to scan
    pub data_file: DataFile,
    /// Delete files applying to the data file
    #[serde(default)]
    pub deletes: Vec<DeleteFile>,
    /// Byte range of a pre-split task. The whole file when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<(u64, u64)>,
}

impl From<ManifestEntry> for FileScanTask {
    fn from(entry: ManifestEntry) -> Self {
        let task = FileScanTask::new(entry.data_file, entry.deletes);
        match entry.range {
            Some((start, length)) => task.with_range(start, length),
            None => task,
        }
    }
}

impl From<FileScanTask> for ManifestEntry {
    fn from(task: FileScanTask) -> Self {
        let range = (!task.is_whole_file()).then_some((task.start, task.length));
        Self {
            data_file: task.data_file,
            deletes: task.deletes,
            range,
        }
    }
}

/// Directory holding the files of `table`
pub fn table_dir(root: &Path, table: &TableIdent) -> Path {
    root.child(table.database.as_str()).child(table.table.as_str())
}

/// Location of the metadata document of `table`
pub fn table_metadata_path(root: &Path, table: &TableIdent) -> Path {
    table_dir(root, table)
        .child("metadata")
        .child(TABLE_METADATA_FILE)
}

/// Location of a manifest listed by a snapshot of `table`
pub fn manifest_path(
    root: &Path,
    table: &TableIdent,
    manifest: &str,
) -> Result<Path, object_store::path::Error> {
    let relative = Path::parse(manifest)?;
    Ok(table_dir(root, table)
        .parts()
        .chain(relative.parts())
        .collect())
}
