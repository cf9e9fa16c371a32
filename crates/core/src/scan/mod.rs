//! Scan range planning
//!
//! Planning one table reference runs a fixed pipeline:
//!
//! 1. [`SnapshotResolver`] binds the table to a snapshot and a split size.
//! 2. [`SplitPlanner`] opens the catalog's file enumeration as a lazy stream.
//! 3. [`ScanRangeBuilder`] classifies delete files and cuts tasks into ranges.
//! 4. [`LocalityAssigner`] attaches candidate hosts.
//! 5. [`ScanRangeSerializer`] renders the ranges for the execution layer.
//!
//! [`ScanPlanner`] drives the pipeline under the configured timeout and an
//! optional cancellation token. Any failure aborts the pass without a partial
//! result, and the catalog enumeration is released on every exit path.
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, field, instrument, warn, Span};

use crate::config::PlannerConfig;
use crate::data_catalog::CatalogRef;
use crate::kernel::{TableIdent, TableReference};
use crate::{PlanError, PlanResult, PlanStage};

pub mod locality;
pub mod range;
pub mod resolver;
pub mod split;
pub mod wire;

pub use locality::{BlockLocation, BlockLocator, LocalityAssigner, NoBlockLocations, StaticBlockLocations};
pub use range::{ScanRangeBuilder, ScanRangeDescriptor};
pub use resolver::{Resolution, SnapshotHandle, SnapshotResolver, SnapshotSelector};
pub use split::{PlanFileStream, SplitPlanner};
pub use wire::{ScanRangeSerializer, WireDeleteFile, WireFileContent, WireScanRange};

/// Counters describing one planning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanMetrics {
    /// Distinct data files enumerated
    pub files_scanned: usize,
    /// Distinct delete files referenced by the enumerated tasks
    pub delete_files: usize,
    /// Sum of the lengths of all scan ranges
    pub bytes_planned: u64,
    /// Number of scan ranges emitted
    pub scan_ranges: usize,
}

/// Outcome of planning one table reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningResult {
    /// Scan ranges to execute
    pub scan_ranges: Vec<WireScanRange>,
    /// The snapshot the ranges were planned from, `None` for an empty table
    pub snapshot_id: Option<i64>,
    /// Parallelism the caller asked for. Advisory only.
    pub parallelism_hint: usize,
    /// Planning counters
    pub metrics: PlanMetrics,
}

impl PlanningResult {
    /// A result without scan ranges
    pub fn empty(parallelism_hint: usize) -> Self {
        Self {
            scan_ranges: Vec::new(),
            snapshot_id: None,
            parallelism_hint,
            metrics: PlanMetrics::default(),
        }
    }

    /// Whether there is nothing to scan
    pub fn is_empty(&self) -> bool {
        self.scan_ranges.is_empty()
    }
}

/// Plans table scans against a catalog.
///
/// A planner is cheap to clone and may be used for many passes, including
/// concurrent passes over independent tables.
#[derive(Debug, Clone)]
pub struct ScanPlanner {
    catalog: CatalogRef,
    config: PlannerConfig,
    locator: Arc<dyn BlockLocator>,
}

enum Interrupt {
    TimedOut,
    Cancelled,
}

impl ScanPlanner {
    /// Create a planner with default configuration and no locality information
    pub fn new(catalog: CatalogRef) -> Self {
        Self {
            catalog,
            config: PlannerConfig::default(),
            locator: Arc::new(NoBlockLocations),
        }
    }

    /// Use `config` for subsequent passes
    pub fn with_config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `locator` to assign candidate hosts
    pub fn with_block_locator(mut self, locator: Arc<dyn BlockLocator>) -> Self {
        self.locator = locator;
        self
    }

    /// The configuration used by this planner
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plan the scan of `table` at the snapshot picked by `selector`.
    ///
    /// `parallelism_hint` is recorded in the result; the ranges produced do
    /// not depend on it.
    pub async fn plan(
        &self,
        table: &TableReference,
        selector: SnapshotSelector,
        parallelism_hint: usize,
    ) -> PlanResult<PlanningResult> {
        self.plan_with_cancellation(table, selector, parallelism_hint, CancellationToken::new())
            .await
    }

    /// Like [`ScanPlanner::plan`], returning [`PlanError::Cancelled`] as soon
    /// as `cancel` fires.
    #[instrument(
        name = "plan",
        skip_all,
        fields(table = %table.ident(), snapshot_id = field::Empty, parallelism_hint = parallelism_hint)
    )]
    pub async fn plan_with_cancellation(
        &self,
        table: &TableReference,
        selector: SnapshotSelector,
        parallelism_hint: usize,
        cancel: CancellationToken,
    ) -> PlanResult<PlanningResult> {
        let ident = table.ident();
        let deadline = self
            .config
            .planning_timeout
            .map(|timeout| Instant::now() + timeout);

        let resolver = SnapshotResolver::new(self.catalog.clone(), &self.config);
        let resolution = run_guarded(resolver.resolve(table, selector), deadline, &cancel)
            .await
            .map_err(|interrupt| self.interrupted(interrupt, ident, None, PlanStage::Resolve))??;

        let handle = match resolution {
            Resolution::Snapshot(handle) => handle,
            Resolution::EmptyTable => {
                debug!("table is empty, nothing to plan");
                return Ok(PlanningResult::empty(parallelism_hint));
            }
        };
        Span::current().record("snapshot_id", handle.snapshot_id());

        let snapshot_id = handle.snapshot_id();
        let (scan_ranges, metrics) = run_guarded(self.plan_ranges(&handle), deadline, &cancel)
            .await
            .map_err(|interrupt| {
                self.interrupted(interrupt, ident, Some(snapshot_id), PlanStage::Enumerate)
            })??;

        debug!(
            files_scanned = metrics.files_scanned,
            delete_files = metrics.delete_files,
            bytes_planned = metrics.bytes_planned,
            scan_ranges = metrics.scan_ranges,
            "planned scan"
        );
        Ok(PlanningResult {
            scan_ranges,
            snapshot_id: Some(snapshot_id),
            parallelism_hint,
            metrics,
        })
    }

    async fn plan_ranges(
        &self,
        handle: &SnapshotHandle,
    ) -> PlanResult<(Vec<WireScanRange>, PlanMetrics)> {
        let mut tasks = SplitPlanner::new(self.catalog.clone())
            .plan_files(handle)
            .await?;
        let builder = ScanRangeBuilder::new(handle);
        let assigner = LocalityAssigner::new(self.locator.clone(), self.config.max_candidate_hosts);
        let serializer = ScanRangeSerializer::new(handle);

        let mut data_files = HashSet::new();
        let mut delete_files = HashSet::new();
        let mut bytes_planned = 0;
        let mut scan_ranges = Vec::new();
        while let Some(task) = tasks.try_next().await? {
            data_files.insert(task.data_file.path.clone());
            delete_files.extend(task.deletes.iter().map(|delete| delete.path.clone()));
            for descriptor in builder.build(task)? {
                let descriptor = assigner.assign_locations(descriptor);
                let range = serializer.serialize(&descriptor)?;
                bytes_planned += range.length;
                scan_ranges.push(range);
            }
        }

        let metrics = PlanMetrics {
            files_scanned: data_files.len(),
            delete_files: delete_files.len(),
            bytes_planned,
            scan_ranges: scan_ranges.len(),
        };
        Ok((scan_ranges, metrics))
    }

    fn interrupted(
        &self,
        interrupt: Interrupt,
        table: &TableIdent,
        snapshot_id: Option<i64>,
        stage: PlanStage,
    ) -> PlanError {
        match interrupt {
            Interrupt::TimedOut => {
                let timeout = self.config.planning_timeout.unwrap_or_default();
                warn!(?timeout, %stage, "scan planning timed out");
                PlanError::PlanningTimeout {
                    table: table.clone(),
                    snapshot_id,
                    stage,
                    timeout,
                }
            }
            Interrupt::Cancelled => {
                warn!(%stage, "scan planning cancelled");
                PlanError::Cancelled {
                    table: table.clone(),
                    snapshot_id,
                    stage,
                }
            }
        }
    }
}

/// Run `fut` until it completes, `deadline` passes or `cancel` fires.
///
/// `fut` is dropped on interruption, releasing whatever it holds.
async fn run_guarded<F: Future>(
    fut: F,
    deadline: Option<Instant>,
    cancel: &CancellationToken,
) -> Result<F::Output, Interrupt> {
    let bounded = async {
        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .map_err(|_| Interrupt::TimedOut),
            None => Ok(fut.await),
        }
    };
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupt::Cancelled),
        result = bounded => result,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use crate::config::SPLIT_TARGET_SIZE;
    use crate::data_catalog::memory::InMemoryCatalog;
    use crate::kernel::{FileContent, Literal};
    use crate::test_utils::{TableFactory, TaskFactory};

    fn catalog_with(tasks: Vec<crate::kernel::FileScanTask>) -> Arc<InMemoryCatalog> {
        let catalog = Arc::new(InMemoryCatalog::new("iceberg_catalog"));
        catalog.commit_snapshot(&TableFactory::ident(), 1, tasks);
        catalog
    }

    fn planner(catalog: Arc<InMemoryCatalog>, split_size: u64) -> ScanPlanner {
        ScanPlanner::new(catalog)
            .with_config(PlannerConfig::default().with_target_split_size(split_size))
    }

    async fn plan(planner: &ScanPlanner) -> PlanResult<PlanningResult> {
        planner
            .plan(&TableFactory::reference(), SnapshotSelector::Current, 4)
            .await
    }

    #[tokio::test]
    async fn test_position_delete_scan() {
        let catalog = catalog_with(vec![TaskFactory::task(
            "input.orc",
            1024,
            vec![TaskFactory::position_delete("delete.orc")],
        )]);
        let result = plan(&planner(catalog, 1024)).await.unwrap();

        assert_eq!(result.snapshot_id, Some(1));
        assert_eq!(result.parallelism_hint, 4);
        assert_eq!(result.scan_ranges.len(), 1);
        let range = &result.scan_ranges[0];
        assert_eq!((range.offset, range.length), (0, 1024));
        assert_eq!(range.full_path, "input.orc");
        assert_eq!(range.delete_files.len(), 1);
        assert_eq!(range.delete_files[0].full_path, "delete.orc");
        assert_eq!(range.delete_files[0].file_content, WireFileContent::PositionDeletes);
        assert!(range.candidate_hosts.is_empty());
    }

    #[tokio::test]
    async fn test_equality_delete_scan() {
        let catalog = catalog_with(vec![TaskFactory::task(
            "input.orc",
            1024,
            vec![TaskFactory::equality_delete("delete.orc", vec![1])],
        )]);
        let result = plan(&planner(catalog, 1024)).await.unwrap();

        assert_eq!(result.scan_ranges.len(), 1);
        let range = &result.scan_ranges[0];
        assert_eq!((range.offset, range.length), (0, 1024));
        assert_eq!(range.delete_files[0].file_content, WireFileContent::EqualityDeletes);
    }

    #[tokio::test]
    async fn test_split_without_deletes() {
        let catalog = catalog_with(vec![TaskFactory::task("input.orc", 1024, vec![])]);
        let result = plan(&planner(catalog, 512)).await.unwrap();

        let ranges: Vec<_> = result
            .scan_ranges
            .iter()
            .map(|r| (r.offset, r.length))
            .collect();
        assert_eq!(ranges, vec![(0, 512), (512, 512)]);
        assert!(result.scan_ranges.iter().all(|r| r.delete_files.is_empty()));
        assert_eq!(
            result.metrics,
            PlanMetrics {
                files_scanned: 1,
                delete_files: 0,
                bytes_planned: 1024,
                scan_ranges: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_ranges_cover_files_exactly() {
        let catalog = catalog_with(vec![
            TaskFactory::task("a.orc", 1000, vec![TaskFactory::position_delete("d1.orc")]),
            TaskFactory::task("b.orc", 77, vec![]),
            TaskFactory::task("c.orc", 0, vec![]),
            TaskFactory::task(
                "d.orc",
                2048,
                vec![
                    TaskFactory::position_delete("d1.orc"),
                    TaskFactory::equality_delete("d2.orc", vec![3]),
                ],
            ),
        ]);
        let result = plan(&planner(catalog, 256)).await.unwrap();

        let mut covered: HashMap<&str, Vec<(u64, u64)>> = HashMap::new();
        for range in &result.scan_ranges {
            assert!(range.length <= 256);
            assert!(range.offset + range.length <= range.file_length);
            covered
                .entry(range.full_path.as_str())
                .or_default()
                .push((range.offset, range.length));
        }
        for (path, ranges) in covered {
            let mut next = 0;
            for (offset, length) in ranges {
                assert_eq!(offset, next, "gap or overlap in {path}");
                next = offset + length;
            }
        }

        assert_eq!(result.metrics.files_scanned, 4);
        assert_eq!(result.metrics.delete_files, 2);
        assert_eq!(result.metrics.bytes_planned, 1000 + 77 + 2048);
        assert_eq!(result.metrics.scan_ranges, 4 + 1 + 1 + 8);
        assert_eq!(result.metrics.scan_ranges, result.scan_ranges.len());
    }

    #[tokio::test]
    async fn test_planning_is_deterministic() {
        let catalog = catalog_with(vec![
            TaskFactory::task("a.orc", 1000, vec![TaskFactory::position_delete("d.orc")]),
            TaskFactory::task("b.orc", 3000, vec![]),
        ]);
        let planner = planner(catalog, 700);
        let first = plan(&planner).await.unwrap();
        let second = plan(&planner).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_empty_table() {
        let catalog = Arc::new(InMemoryCatalog::new("iceberg_catalog"));
        catalog.create_table(TableFactory::ident(), HashMap::new());
        let result = plan(&ScanPlanner::new(catalog.clone())).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(result.snapshot_id, None);
        assert_eq!(result.metrics, PlanMetrics::default());
        assert_eq!(catalog.open_enumerations(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_without_files() {
        let catalog = catalog_with(vec![]);
        let result = plan(&ScanPlanner::new(catalog)).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(result.snapshot_id, Some(1));
    }

    #[tokio::test]
    async fn test_errors_abort_the_pass() {
        // unreachable catalog
        let catalog = catalog_with(vec![TaskFactory::task("a.orc", 10, vec![])]);
        catalog.set_available(false);
        let err = plan(&ScanPlanner::new(catalog)).await.unwrap_err();
        assert!(matches!(err, PlanError::CatalogUnavailable { .. }));
        assert_eq!(err.stage(), PlanStage::Resolve);

        // unknown snapshot
        let catalog = catalog_with(vec![]);
        let err = ScanPlanner::new(catalog)
            .plan(&TableFactory::reference(), SnapshotSelector::Id(42), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::SnapshotNotFound { snapshot_id: 42, .. }));

        // enumeration failure after some tasks
        let catalog = catalog_with(vec![
            TaskFactory::task("a.orc", 10, vec![]),
            TaskFactory::task("b.orc", 10, vec![]),
        ]);
        catalog.fail_enumeration_after(&TableFactory::ident(), 1);
        let err = plan(&ScanPlanner::new(catalog.clone())).await.unwrap_err();
        assert!(matches!(err, PlanError::PlanningIO { snapshot_id: 1, .. }));
        assert_eq!(catalog.open_enumerations(), 0);

        // unknown delete content
        let catalog = catalog_with(vec![TaskFactory::task(
            "a.orc",
            10,
            vec![TaskFactory::delete_file("x.orc", FileContent::Unknown(5), vec![])],
        )]);
        let err = plan(&ScanPlanner::new(catalog.clone())).await.unwrap_err();
        assert!(matches!(err, PlanError::UnclassifiedDeleteFile { .. }));
        assert_eq!(catalog.open_enumerations(), 0);
    }

    #[tokio::test]
    async fn test_timeout_releases_enumeration() {
        let catalog = catalog_with(vec![
            TaskFactory::task("a.orc", 10, vec![]),
            TaskFactory::task("b.orc", 10, vec![]),
        ]);
        catalog.delay_tasks(&TableFactory::ident(), Duration::from_secs(5));
        let planner = ScanPlanner::new(catalog.clone())
            .with_config(PlannerConfig::default().with_planning_timeout(Duration::from_millis(50)));

        let err = plan(&planner).await.unwrap_err();
        match err {
            PlanError::PlanningTimeout {
                snapshot_id,
                stage,
                timeout,
                ..
            } => {
                assert_eq!(snapshot_id, Some(1));
                assert_eq!(stage, PlanStage::Enumerate);
                assert_eq!(timeout, Duration::from_millis(50));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(catalog.open_enumerations(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_releases_enumeration() {
        let catalog = catalog_with(vec![TaskFactory::task("a.orc", 10, vec![])]);
        catalog.delay_tasks(&TableFactory::ident(), Duration::from_secs(5));
        let planner = ScanPlanner::new(catalog.clone());

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = planner
            .plan_with_cancellation(&TableFactory::reference(), SnapshotSelector::Current, 1, cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PlanError::Cancelled {
                snapshot_id: Some(1),
                stage: PlanStage::Enumerate,
                ..
            }
        ));
        assert_eq!(catalog.open_enumerations(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let catalog = catalog_with(vec![TaskFactory::task("a.orc", 10, vec![])]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = ScanPlanner::new(catalog.clone())
            .plan_with_cancellation(&TableFactory::reference(), SnapshotSelector::Current, 1, cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PlanError::Cancelled {
                snapshot_id: None,
                stage: PlanStage::Resolve,
                ..
            }
        ));
        assert_eq!(catalog.open_enumerations(), 0);
    }

    #[tokio::test]
    async fn test_table_split_size_property() {
        let catalog = Arc::new(InMemoryCatalog::new("iceberg_catalog"));
        catalog.create_table(
            TableFactory::ident(),
            HashMap::from([(SPLIT_TARGET_SIZE.to_string(), "400".to_string())]),
        );
        catalog.commit_snapshot(
            &TableFactory::ident(),
            1,
            vec![TaskFactory::task("a.orc", 1000, vec![])],
        );
        let result = plan(&ScanPlanner::new(catalog)).await.unwrap();
        assert_eq!(result.scan_ranges.len(), 3);
    }

    #[tokio::test]
    async fn test_zero_split_size_property_names_table() {
        let catalog = Arc::new(InMemoryCatalog::new("iceberg_catalog"));
        catalog.create_table(
            TableFactory::ident(),
            HashMap::from([(SPLIT_TARGET_SIZE.to_string(), "0".to_string())]),
        );
        catalog.commit_snapshot(
            &TableFactory::ident(),
            5,
            vec![TaskFactory::task("a.orc", 1000, vec![])],
        );

        let err = plan(&ScanPlanner::new(catalog.clone())).await.unwrap_err();
        assert!(matches!(err, PlanError::InvalidConfiguration { .. }));
        assert_eq!(err.stage(), PlanStage::Resolve);
        assert_eq!(err.table(), Some(&TableFactory::ident()));
        assert_eq!(err.snapshot_id(), Some(5));
        assert_eq!(catalog.open_enumerations(), 0);
    }

    #[tokio::test]
    async fn test_locality_is_attached() {
        let catalog = catalog_with(vec![TaskFactory::task("a.orc", 1024, vec![])]);
        let locator = StaticBlockLocations::new().with_file(
            "a.orc",
            vec![
                BlockLocation::new(0, 512, ["host-a"]),
                BlockLocation::new(512, 512, ["host-b"]),
            ],
        );
        let planner = planner(catalog, 512).with_block_locator(Arc::new(locator));
        let result = plan(&planner).await.unwrap();
        let hosts: Vec<_> = result
            .scan_ranges
            .iter()
            .map(|r| r.candidate_hosts.clone())
            .collect();
        assert_eq!(hosts, vec![vec!["host-a".to_string()], vec!["host-b".to_string()]]);
    }

    #[tokio::test]
    async fn test_planning_result_json() {
        let data_file =
            TaskFactory::partitioned_data_file("a.orc", 10, vec![Literal::Int(7)]);
        let catalog = catalog_with(vec![crate::kernel::FileScanTask::new(data_file, vec![])]);
        let result = plan(&ScanPlanner::new(catalog)).await.unwrap();

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["snapshot_id"], 1);
        assert_eq!(json["parallelism_hint"], 4);
        assert_eq!(json["metrics"]["bytes_planned"], 10);
        assert_eq!(
            json["scan_ranges"][0]["partition_values"],
            serde_json::json!([{"type": "int", "value": 7}])
        );
        let decoded: PlanningResult = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, result);
    }
}
