#![allow(dead_code)]
use lakescan_core::{
    Column, DataFile, DeleteFile, FileContent, FileFormat, FileScanTask, PrimitiveType, TableIdent,
    TableReference,
};
use tracing_subscriber::EnvFilter;

/// Route planner logs to the test output, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn table(name: &str) -> TableReference {
    TableReference::new(
        TableIdent::new("iceberg_catalog", "db", name),
        [
            Column::new("id", PrimitiveType::Long, false),
            Column::new("name", PrimitiveType::String, true),
        ],
    )
}

pub fn data_file(path: &str, length: u64) -> DataFile {
    DataFile {
        path: path.to_string(),
        format: FileFormat::Orc,
        file_size_in_bytes: length,
        record_count: 100,
        partition: vec![],
    }
}

pub fn delete_file(path: &str, content: FileContent, equality_ids: Vec<i32>) -> DeleteFile {
    DeleteFile {
        path: path.to_string(),
        format: FileFormat::Orc,
        file_size_in_bytes: 1024,
        record_count: 1,
        content,
        equality_ids,
    }
}

pub fn task(path: &str, length: u64, deletes: Vec<DeleteFile>) -> FileScanTask {
    FileScanTask::new(data_file(path, length), deletes)
}
