//! Scan range planning for snapshot-versioned lakehouse tables
//!
//! The planner turns a table reference into the list of byte ranges an
//! execution layer reads, each carrying the merge-on-read delete files that
//! apply to it and the hosts best placed to read it.
//!
//! # Usage
//!
//! Plan the current snapshot of a table registered in an in-memory catalog:
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use lakescan_core::data_catalog::memory::InMemoryCatalog;
//! use lakescan_core::{
//!     Column, DataFile, FileFormat, FileScanTask, PrimitiveType, ScanPlanner, SnapshotSelector,
//!     TableIdent, TableReference,
//! };
//!
//! async {
//!   let ident = TableIdent::new("iceberg_catalog", "db", "table");
//!   let catalog = Arc::new(InMemoryCatalog::new("iceberg_catalog"));
//!   let data_file = DataFile {
//!       path: "s3://bucket/db/table/data/00000.orc".to_string(),
//!       format: FileFormat::Orc,
//!       file_size_in_bytes: 1024,
//!       record_count: 10,
//!       partition: vec![],
//!   };
//!   catalog.commit_snapshot(&ident, 1, vec![FileScanTask::new(data_file, vec![])]);
//!
//!   let table = TableReference::new(ident, [Column::new("id", PrimitiveType::Long, false)]);
//!   let result = ScanPlanner::new(catalog)
//!       .plan(&table, SnapshotSelector::Current, 8)
//!       .await
//!       .unwrap();
//!   assert_eq!(result.scan_ranges.len(), 1);
//! };
//! ```
//!
//! # Catalogs
//!
//! The planner consumes a [`TableCatalog`]. This crate ships
//! [`data_catalog::memory::InMemoryCatalog`]; the `lakescan-catalog-manifest`
//! crate reads table metadata and manifests from an object store.
#![deny(missing_docs)]

pub mod config;
pub mod data_catalog;
pub mod errors;
pub mod kernel;
pub mod scan;

#[cfg(test)]
pub mod test_utils;

pub use self::config::PlannerConfig;
pub use self::data_catalog::{
    CatalogError, CatalogRef, CatalogResult, FilePlanRequest, FileScanTaskStream, SnapshotInfo,
    TableCatalog, TableMetadata,
};
pub use self::errors::*;
pub use self::kernel::*;
pub use self::scan::*;
