use crate::kernel::{DataFile, DeleteFile, FileContent, FileFormat, FileScanTask, Literal};

pub struct TaskFactory;

impl TaskFactory {
    pub fn data_file(path: &str, length: u64) -> DataFile {
        DataFile {
            path: path.to_string(),
            format: FileFormat::Orc,
            file_size_in_bytes: length,
            record_count: 1,
            partition: vec![],
        }
    }

    pub fn partitioned_data_file(path: &str, length: u64, partition: Vec<Literal>) -> DataFile {
        DataFile {
            partition,
            ..Self::data_file(path, length)
        }
    }

    pub fn position_delete(path: &str) -> DeleteFile {
        Self::delete_file(path, FileContent::PositionDeletes, vec![])
    }

    pub fn equality_delete(path: &str, equality_ids: Vec<i32>) -> DeleteFile {
        Self::delete_file(path, FileContent::EqualityDeletes, equality_ids)
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
        FileScanTask::new(Self::data_file(path, length), deletes)
    }
}
