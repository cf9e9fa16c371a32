//! Snapshot resolution
//!
//! Binds a table reference to one committed snapshot and fixes the split
//! size used for the rest of the planning pass.
use tracing::debug;

use crate::config::{parse_split_size, PlannerConfig, SPLIT_TARGET_SIZE};
use crate::data_catalog::{CatalogRef, TableMetadata};
use crate::kernel::{TableIdent, TableReference};
use crate::{PlanError, PlanResult, PlanStage};

/// Which snapshot of a table to scan.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SnapshotSelector {
    /// The table's current snapshot
    #[default]
    Current,
    /// An explicit snapshot id
    Id(i64),
}

/// A table bound to one snapshot, ready for file enumeration.
///
/// Created once per planning pass and not shared beyond it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHandle {
    table: TableReference,
    selector: SnapshotSelector,
    snapshot_id: i64,
    target_split_size: u64,
}

impl SnapshotHandle {
    /// Create a handle for an already resolved snapshot.
    pub fn new(
        table: TableReference,
        selector: SnapshotSelector,
        snapshot_id: i64,
        target_split_size: u64,
    ) -> Self {
        Self {
            table,
            selector,
            snapshot_id,
            target_split_size,
        }
    }

    /// The table being scanned
    pub fn table(&self) -> &TableReference {
        &self.table
    }

    /// Catalog identity of the table being scanned
    pub fn ident(&self) -> &TableIdent {
        self.table.ident()
    }

    /// How the snapshot was selected
    pub fn selector(&self) -> SnapshotSelector {
        self.selector
    }

    /// The resolved snapshot id
    pub fn snapshot_id(&self) -> i64 {
        self.snapshot_id
    }

    /// Target split size in bytes
    pub fn target_split_size(&self) -> u64 {
        self.target_split_size
    }
}

/// Outcome of snapshot resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The table has a snapshot to scan
    Snapshot(SnapshotHandle),
    /// Nothing was ever committed to the table; the scan is empty
    EmptyTable,
}

/// Resolves table references to snapshot handles through the catalog.
#[derive(Debug, Clone)]
pub struct SnapshotResolver {
    catalog: CatalogRef,
    split_size_override: Option<u64>,
}

impl SnapshotResolver {
    /// Create a resolver over `catalog`
    pub fn new(catalog: CatalogRef, config: &PlannerConfig) -> Self {
        Self {
            catalog,
            split_size_override: config.target_split_size,
        }
    }

    /// Resolve `table` at the snapshot picked by `selector`.
    pub async fn resolve(
        &self,
        table: &TableReference,
        selector: SnapshotSelector,
    ) -> PlanResult<Resolution> {
        let ident = table.ident();
        let metadata = self
            .catalog
            .load_table(ident)
            .await
            .map_err(|source| PlanError::CatalogUnavailable {
                table: ident.clone(),
                catalog: self.catalog.name().to_string(),
                source,
            })?;

        let snapshot_id = match selector {
            SnapshotSelector::Current => match metadata.current_snapshot_id {
                Some(snapshot_id) => snapshot_id,
                None => {
                    debug!(table = %ident, "table has no committed snapshot");
                    return Ok(Resolution::EmptyTable);
                }
            },
            SnapshotSelector::Id(snapshot_id) => {
                let snapshot = self
                    .catalog
                    .snapshot(ident, snapshot_id)
                    .await
                    .map_err(|source| PlanError::CatalogUnavailable {
                        table: ident.clone(),
                        catalog: self.catalog.name().to_string(),
                        source,
                    })?;
                match snapshot {
                    Some(snapshot) => snapshot.snapshot_id,
                    None => {
                        return Err(PlanError::SnapshotNotFound {
                            table: ident.clone(),
                            snapshot_id,
                        })
                    }
                }
            }
        };

        let target_split_size = self
            .target_split_size(&metadata)
            .map_err(|err| match err {
                PlanError::InvalidConfiguration { key, message, .. } => {
                    PlanError::InvalidConfiguration {
                        table: Some(ident.clone()),
                        snapshot_id: Some(snapshot_id),
                        stage: PlanStage::Resolve,
                        key,
                        message,
                    }
                }
                other => other,
            })?;
        debug!(
            table = %ident,
            snapshot_id,
            target_split_size,
            "resolved snapshot"
        );
        Ok(Resolution::Snapshot(SnapshotHandle::new(
            table.clone(),
            selector,
            snapshot_id,
            target_split_size,
        )))
    }

    fn target_split_size(&self, metadata: &TableMetadata) -> PlanResult<u64> {
        if let Some(split_size) = self.split_size_override {
            return Ok(split_size);
        }
        match metadata.properties.get(SPLIT_TARGET_SIZE) {
            Some(value) => parse_split_size(SPLIT_TARGET_SIZE, value),
            None => Ok(self.catalog.default_split_size()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::data_catalog::memory::InMemoryCatalog;
    use crate::data_catalog::DEFAULT_SPLIT_SIZE;
    use crate::test_utils::{TableFactory, TaskFactory};

    fn catalog() -> Arc<InMemoryCatalog> {
        Arc::new(InMemoryCatalog::new("iceberg_catalog"))
    }

    async fn resolve(
        catalog: Arc<InMemoryCatalog>,
        config: &PlannerConfig,
        selector: SnapshotSelector,
    ) -> PlanResult<Resolution> {
        SnapshotResolver::new(catalog, config)
            .resolve(&TableFactory::reference(), selector)
            .await
    }

    #[tokio::test]
    async fn test_resolve_current_snapshot() {
        let catalog = catalog();
        catalog.commit_snapshot(&TableFactory::ident(), 1, vec![]);
        catalog.commit_snapshot(
            &TableFactory::ident(),
            2,
            vec![TaskFactory::task("input.orc", 1024, vec![])],
        );

        let resolution = resolve(catalog, &PlannerConfig::default(), SnapshotSelector::Current)
            .await
            .unwrap();
        let Resolution::Snapshot(handle) = resolution else {
            panic!("expected a snapshot");
        };
        assert_eq!(handle.snapshot_id(), 2);
        assert_eq!(handle.selector(), SnapshotSelector::Current);
        assert_eq!(handle.target_split_size(), DEFAULT_SPLIT_SIZE);
        assert_eq!(handle.ident(), &TableFactory::ident());
    }

    #[tokio::test]
    async fn test_resolve_explicit_snapshot() {
        let catalog = catalog();
        catalog.commit_snapshot(&TableFactory::ident(), 1, vec![]);
        catalog.commit_snapshot(&TableFactory::ident(), 2, vec![]);

        let resolution = resolve(catalog.clone(), &PlannerConfig::default(), SnapshotSelector::Id(1))
            .await
            .unwrap();
        assert!(matches!(resolution, Resolution::Snapshot(h) if h.snapshot_id() == 1));

        let err = resolve(catalog, &PlannerConfig::default(), SnapshotSelector::Id(9))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PlanError::SnapshotNotFound { snapshot_id: 9, .. }
        ));
    }

    #[tokio::test]
    async fn test_empty_table() {
        let catalog = catalog();
        catalog.create_table(TableFactory::ident(), HashMap::new());

        let resolution = resolve(catalog.clone(), &PlannerConfig::default(), SnapshotSelector::Current)
            .await
            .unwrap();
        assert_eq!(resolution, Resolution::EmptyTable);

        // an explicit id can't exist on a table without snapshots
        let err = resolve(catalog, &PlannerConfig::default(), SnapshotSelector::Id(1))
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::SnapshotNotFound { .. }));
    }

    #[tokio::test]
    async fn test_catalog_unavailable() {
        let catalog = catalog();
        catalog.commit_snapshot(&TableFactory::ident(), 1, vec![]);
        catalog.set_available(false);

        let err = resolve(catalog, &PlannerConfig::default(), SnapshotSelector::Current)
            .await
            .unwrap_err();
        match err {
            PlanError::CatalogUnavailable { table, catalog, .. } => {
                assert_eq!(table, TableFactory::ident());
                assert_eq!(catalog, "iceberg_catalog");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_split_size_precedence() {
        let catalog = Arc::new(InMemoryCatalog::new("iceberg_catalog").with_default_split_size(4096));
        catalog.create_table(
            TableFactory::ident(),
            HashMap::from([(SPLIT_TARGET_SIZE.to_string(), "2048".to_string())]),
        );
        catalog.commit_snapshot(&TableFactory::ident(), 1, vec![]);

        let split_size = |resolution: Resolution| match resolution {
            Resolution::Snapshot(handle) => handle.target_split_size(),
            Resolution::EmptyTable => panic!("expected a snapshot"),
        };

        // table property beats the catalog default
        let resolution = resolve(catalog.clone(), &PlannerConfig::default(), SnapshotSelector::Current)
            .await
            .unwrap();
        assert_eq!(split_size(resolution), 2048);

        // planner configuration beats the table property
        let config = PlannerConfig::default().with_target_split_size(512);
        let resolution = resolve(catalog.clone(), &config, SnapshotSelector::Current)
            .await
            .unwrap();
        assert_eq!(split_size(resolution), 512);

        // without either, the catalog default applies
        let other = Arc::new(InMemoryCatalog::new("iceberg_catalog").with_default_split_size(4096));
        other.commit_snapshot(&TableFactory::ident(), 1, vec![]);
        let resolution = resolve(other, &PlannerConfig::default(), SnapshotSelector::Current)
            .await
            .unwrap();
        assert_eq!(split_size(resolution), 4096);
    }

    #[tokio::test]
    async fn test_invalid_split_size_property() {
        for value in ["lots", "0"] {
            let catalog = catalog();
            catalog.create_table(
                TableFactory::ident(),
                HashMap::from([(SPLIT_TARGET_SIZE.to_string(), value.to_string())]),
            );
            catalog.commit_snapshot(&TableFactory::ident(), 5, vec![]);

            let err = resolve(catalog, &PlannerConfig::default(), SnapshotSelector::Current)
                .await
                .unwrap_err();
            assert!(
                matches!(err, PlanError::InvalidConfiguration { ref key, .. } if key == SPLIT_TARGET_SIZE),
                "{value} should be rejected"
            );
            assert_eq!(err.stage(), PlanStage::Resolve);
            assert_eq!(err.table(), Some(&TableFactory::ident()));
            assert_eq!(err.snapshot_id(), Some(5));
        }
    }
}
