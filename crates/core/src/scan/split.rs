//! File enumeration against the catalog
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use tracing::{debug, trace};

use super::SnapshotHandle;
use crate::config::SPLIT_TARGET_SIZE;
use crate::data_catalog::{CatalogRef, FilePlanRequest};
use crate::kernel::FileScanTask;
use crate::{PlanError, PlanResult, PlanStage};

/// Lazily produced file scan tasks, with catalog failures already mapped.
pub type PlanFileStream = BoxStream<'static, PlanResult<FileScanTask>>;

/// Drives the catalog's file enumeration for a resolved snapshot.
#[derive(Debug, Clone)]
pub struct SplitPlanner {
    catalog: CatalogRef,
}

impl SplitPlanner {
    /// Create a split planner over `catalog`
    pub fn new(catalog: CatalogRef) -> Self {
        Self { catalog }
    }

    /// Open the enumeration of the snapshot bound to `handle`.
    ///
    /// The returned stream owns the catalog's enumeration; dropping it
    /// releases whatever the catalog holds open.
    pub async fn plan_files(&self, handle: &SnapshotHandle) -> PlanResult<PlanFileStream> {
        if handle.target_split_size() == 0 {
            return Err(PlanError::InvalidConfiguration {
                table: Some(handle.ident().clone()),
                snapshot_id: Some(handle.snapshot_id()),
                stage: PlanStage::Enumerate,
                key: SPLIT_TARGET_SIZE.to_string(),
                message: "split size must be positive".to_string(),
            });
        }

        let table = handle.ident().clone();
        let snapshot_id = handle.snapshot_id();
        let request = FilePlanRequest {
            table: table.clone(),
            snapshot_id,
            target_split_size: handle.target_split_size(),
        };
        debug!(
            table = %table,
            snapshot_id,
            target_split_size = request.target_split_size,
            catalog = self.catalog.name(),
            "opening file enumeration"
        );

        let stream =
            self.catalog
                .plan_files(request)
                .await
                .map_err(|source| PlanError::PlanningIO {
                    table: table.clone(),
                    snapshot_id,
                    source,
                })?;

        Ok(stream
            .inspect_ok(|task| {
                trace!(
                    path = %task.data_file.path,
                    start = task.start,
                    length = task.length,
                    deletes = task.deletes.len(),
                    "enumerated file scan task"
                )
            })
            .map_err(move |source| PlanError::PlanningIO {
                table: table.clone(),
                snapshot_id,
                source,
            })
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::data_catalog::memory::InMemoryCatalog;
    use crate::scan::SnapshotSelector;
    use crate::test_utils::{TableFactory, TaskFactory};

    fn handle(snapshot_id: i64, split_size: u64) -> SnapshotHandle {
        SnapshotHandle::new(
            TableFactory::reference(),
            SnapshotSelector::Current,
            snapshot_id,
            split_size,
        )
    }

    #[tokio::test]
    async fn test_plan_files_yields_catalog_tasks() {
        let catalog = Arc::new(InMemoryCatalog::new("iceberg_catalog"));
        let tasks = vec![
            TaskFactory::task("a.orc", 100, vec![TaskFactory::position_delete("d.orc")]),
            TaskFactory::task("b.orc", 200, vec![]),
        ];
        catalog.commit_snapshot(&TableFactory::ident(), 1, tasks.clone());

        let planner = SplitPlanner::new(catalog.clone());
        let stream = planner.plan_files(&handle(1, 1024)).await.unwrap();
        let planned: Vec<FileScanTask> = stream.try_collect().await.unwrap();
        assert_eq!(planned, tasks);
        assert_eq!(catalog.open_enumerations(), 0);
    }

    #[tokio::test]
    async fn test_zero_split_size() {
        let catalog = Arc::new(InMemoryCatalog::new("iceberg_catalog"));
        catalog.commit_snapshot(&TableFactory::ident(), 1, vec![]);

        let err = SplitPlanner::new(catalog.clone())
            .plan_files(&handle(1, 0))
            .await
            .err()
            .expect("expected plan_files to fail");
        assert!(
            matches!(err, PlanError::InvalidConfiguration { ref key, .. } if key == SPLIT_TARGET_SIZE)
        );
        assert_eq!(err.stage(), PlanStage::Enumerate);
        assert_eq!(err.table(), Some(&TableFactory::ident()));
        assert_eq!(err.snapshot_id(), Some(1));
        assert_eq!(catalog.open_enumerations(), 0);
    }

    #[tokio::test]
    async fn test_enumeration_failures_are_planning_io() {
        let catalog = Arc::new(InMemoryCatalog::new("iceberg_catalog"));
        catalog.commit_snapshot(
            &TableFactory::ident(),
            1,
            vec![
                TaskFactory::task("a.orc", 100, vec![]),
                TaskFactory::task("b.orc", 100, vec![]),
            ],
        );
        let planner = SplitPlanner::new(catalog.clone());

        // failing mid-stream
        catalog.fail_enumeration_after(&TableFactory::ident(), 1);
        let result: PlanResult<Vec<_>> = planner
            .plan_files(&handle(1, 1024))
            .await
            .unwrap()
            .try_collect()
            .await;
        assert!(matches!(
            result,
            Err(PlanError::PlanningIO { snapshot_id: 1, .. })
        ));

        // failing to open
        catalog.set_available(false);
        let err = planner
            .plan_files(&handle(1, 1024))
            .await
            .err()
            .expect("expected plan_files to fail");
        assert!(matches!(err, PlanError::PlanningIO { .. }));
        assert_eq!(catalog.open_enumerations(), 0);
    }
}
