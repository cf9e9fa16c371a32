//! Manifest catalog.
//!
//! A [`TableCatalog`] reading table metadata and manifests laid out as JSON
//! documents in an object store. See [`layout`] for the format.
#![deny(missing_docs)]
use std::sync::Arc;

use bytes::Bytes;
use lakescan_core::data_catalog::{ReceiverStreamBuilder, DEFAULT_SPLIT_SIZE};
use lakescan_core::{
    CatalogError, CatalogResult, FilePlanRequest, FileScanTask, FileScanTaskStream, SnapshotInfo,
    TableCatalog, TableIdent, TableMetadata,
};
use object_store::path::Path;
use object_store::ObjectStore;
use tracing::debug;
use url::Url;

pub mod layout;

use layout::{manifest_path, table_metadata_path, ManifestEntry, TableDocument};

const CHANNEL_CAPACITY: usize = 64;

/// Errors reading a manifest catalog
#[derive(thiserror::Error, Debug)]
pub enum ManifestError {
    /// Error reading from the object store
    #[error("Object store error: {source}")]
    ObjectStore {
        /// Store error
        #[from]
        source: object_store::Error,
    },

    /// The table metadata document is not valid
    #[error("Invalid table metadata in '{path}': {source}")]
    InvalidDocument {
        /// Location of the document
        path: String,
        /// Parse error
        #[source]
        source: serde_json::Error,
    },

    /// A manifest line is not a valid entry
    #[error("Invalid manifest entry at {path}:{line}: {source}")]
    InvalidEntry {
        /// Location of the manifest
        path: String,
        /// One based line number of the entry
        line: usize,
        /// Parse error
        #[source]
        source: serde_json::Error,
    },

    /// A snapshot lists a manifest path that is not a valid object path
    #[error("Invalid manifest path '{path}': {source}")]
    InvalidPath {
        /// The path as listed in the snapshot
        path: String,
        /// Path error
        #[source]
        source: object_store::path::Error,
    },

    /// The snapshot is not in the table's snapshot log
    #[error("Snapshot {snapshot_id} not found in {table}")]
    MissingSnapshot {
        /// Table whose snapshot log was searched
        table: TableIdent,
        /// The missing snapshot
        snapshot_id: i64,
    },
}

impl From<ManifestError> for CatalogError {
    fn from(val: ManifestError) -> Self {
        CatalogError::Io {
            source: Box::new(val),
        }
    }
}

/// A catalog over manifests stored in an [`ObjectStore`]
#[derive(Debug, Clone)]
pub struct ManifestCatalog {
    name: String,
    store: Arc<dyn ObjectStore>,
    root: Path,
    default_split_size: u64,
}

impl ManifestCatalog {
    /// Create a catalog over the root of `store`
    pub fn new(name: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            name: name.into(),
            store,
            root: Path::default(),
            default_split_size: DEFAULT_SPLIT_SIZE,
        }
    }

    /// Create a catalog for the warehouse at `url`, e.g. `file:///data/warehouse`
    pub fn try_from_url(name: impl Into<String>, url: &Url) -> Result<Self, ManifestError> {
        let (store, root) = object_store::parse_url(url)?;
        Ok(Self::new(name, Arc::from(store)).with_root(root))
    }

    /// Resolve tables below `root` instead of the store root
    pub fn with_root(mut self, root: Path) -> Self {
        self.root = root;
        self
    }

    /// Override the default split size reported to the planner
    pub fn with_default_split_size(mut self, split_size: u64) -> Self {
        self.default_split_size = split_size;
        self
    }

    async fn read_table(&self, table: &TableIdent) -> Result<TableDocument, ManifestError> {
        let path = table_metadata_path(&self.root, table);
        let bytes = self.store.get(&path).await?.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|source| ManifestError::InvalidDocument {
            path: path.to_string(),
            source,
        })
    }

    /// Map a failure to read table metadata.
    fn metadata_error(&self, table: &TableIdent, err: ManifestError) -> CatalogError {
        match err {
            ManifestError::ObjectStore {
                source: object_store::Error::NotFound { .. },
            } => CatalogError::TableNotFound {
                table: table.clone(),
            },
            err @ ManifestError::ObjectStore { .. } => CatalogError::Unavailable {
                catalog: self.name.clone(),
                source: Box::new(err),
            },
            err => CatalogError::Generic {
                catalog: self.name.clone(),
                source: Box::new(err),
            },
        }
    }
}

#[async_trait::async_trait]
impl TableCatalog for ManifestCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load_table(&self, table: &TableIdent) -> CatalogResult<TableMetadata> {
        let document = self
            .read_table(table)
            .await
            .map_err(|err| self.metadata_error(table, err))?;
        debug!(
            table = %table,
            current_snapshot_id = ?document.current_snapshot_id,
            snapshots = document.snapshots.len(),
            "loaded table metadata"
        );
        Ok(TableMetadata {
            current_snapshot_id: document.current_snapshot_id,
            properties: document.properties,
        })
    }

    async fn snapshot(
        &self,
        table: &TableIdent,
        snapshot_id: i64,
    ) -> CatalogResult<Option<SnapshotInfo>> {
        let document = self
            .read_table(table)
            .await
            .map_err(|err| self.metadata_error(table, err))?;
        Ok(document.snapshot(snapshot_id).map(SnapshotInfo::from))
    }

    async fn plan_files(&self, request: FilePlanRequest) -> CatalogResult<FileScanTaskStream> {
        let FilePlanRequest {
            table, snapshot_id, ..
        } = request;
        let document = match self.read_table(&table).await {
            Ok(document) => document,
            Err(ManifestError::ObjectStore {
                source: object_store::Error::NotFound { .. },
            }) => return Err(CatalogError::TableNotFound { table }),
            Err(err) => return Err(err.into()),
        };
        let manifests = document
            .snapshot(snapshot_id)
            .map(|snapshot| snapshot.manifests.clone())
            .ok_or_else(|| ManifestError::MissingSnapshot {
                table: table.clone(),
                snapshot_id,
            })?;
        debug!(
            table = %table,
            snapshot_id,
            manifests = manifests.len(),
            "enumerating manifests"
        );

        let store = self.store.clone();
        let root = self.root.clone();
        let mut builder = ReceiverStreamBuilder::<FileScanTask>::new(CHANNEL_CAPACITY);
        let tx = builder.tx();
        builder.spawn(async move {
            for manifest in manifests {
                let path = manifest_path(&root, &table, &manifest).map_err(|source| {
                    ManifestError::InvalidPath {
                        path: manifest.clone(),
                        source,
                    }
                })?;
                let bytes = read_manifest(store.as_ref(), &path).await?;
                for task in parse_manifest(&path, &bytes) {
                    if tx.send(Ok(task?)).await.is_err() {
                        // the consumer is gone
                        return Ok(());
                    }
                }
            }
            Ok(())
        });
        Ok(builder.build())
    }

    fn default_split_size(&self) -> u64 {
        self.default_split_size
    }
}

async fn read_manifest(store: &dyn ObjectStore, path: &Path) -> Result<Bytes, ManifestError> {
    Ok(store.get(path).await?.bytes().await?)
}

/// Parse the non-blank lines of a manifest, in order.
fn parse_manifest<'a>(
    path: &'a Path,
    bytes: &'a Bytes,
) -> impl Iterator<Item = Result<FileScanTask, ManifestError>> + 'a {
    bytes
        .split(|b| *b == b'\n')
        .enumerate()
        .filter(|(_, line)| !line.iter().all(u8::is_ascii_whitespace))
        .map(move |(index, line)| {
            serde_json::from_slice::<ManifestEntry>(line)
                .map(FileScanTask::from)
                .map_err(|source| ManifestError::InvalidEntry {
                    path: path.to_string(),
                    line: index + 1,
                    source,
                })
        })
}
