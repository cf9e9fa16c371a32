use std::fmt;

use serde::{Deserialize, Serialize};

use super::Literal;

/// Physical file formats of data and delete files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[allow(missing_docs)]
pub enum FileFormat {
    Orc,
    Parquet,
    Avro,
}

impl AsRef<str> for FileFormat {
    fn as_ref(&self) -> &str {
        match self {
            Self::Orc => "ORC",
            Self::Parquet => "PARQUET",
            Self::Avro => "AVRO",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Content tag of a file as recorded by the catalog.
///
/// Serialized as the integer code used in manifests: `0` data, `1` position
/// deletes, `2` equality deletes. Codes the planner does not know are kept as
/// [`FileContent::Unknown`] so they can be rejected explicitly instead of
/// failing to parse or being dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum FileContent {
    /// Rows of the table
    Data,
    /// Deletes by data file path and row position
    PositionDeletes,
    /// Deletes by equality on a set of columns
    EqualityDeletes,
    /// A content code this planner does not recognize
    Unknown(i32),
}

impl From<i32> for FileContent {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::Data,
            1 => Self::PositionDeletes,
            2 => Self::EqualityDeletes,
            other => Self::Unknown(other),
        }
    }
}

impl From<FileContent> for i32 {
    fn from(content: FileContent) -> Self {
        match content {
            FileContent::Data => 0,
            FileContent::PositionDeletes => 1,
            FileContent::EqualityDeletes => 2,
            FileContent::Unknown(code) => code,
        }
    }
}

/// A data file of a table snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DataFile {
    /// Full path of the file
    pub path: String,
    /// File format
    pub format: FileFormat,
    /// Total size of the file in bytes
    pub file_size_in_bytes: u64,
    /// Number of rows in the file
    pub record_count: u64,
    /// Partition values of the file, ordered as the partition spec
    #[serde(default)]
    pub partition: Vec<Literal>,
}

/// A delete file as reported by the catalog, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeleteFile {
    /// Full path of the file
    pub path: String,
    /// File format
    pub format: FileFormat,
    /// Total size of the file in bytes
    pub file_size_in_bytes: u64,
    /// Number of delete records in the file
    pub record_count: u64,
    /// Content tag recorded by the catalog
    pub content: FileContent,
    /// Field ids compared by equality deletes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub equality_ids: Vec<i32>,
}

/// One unit of file enumeration: a byte range of a data file together with
/// every delete file the catalog found to apply to it.
#[derive(Debug, Clone, PartialEq)]
pub struct FileScanTask {
    /// The data file to read
    pub data_file: DataFile,
    /// Delete files applying to the data file, in catalog order
    pub deletes: Vec<DeleteFile>,
    /// First byte of the data file covered by this task
    pub start: u64,
    /// Number of bytes covered by this task
    pub length: u64,
}

impl FileScanTask {
    /// Create a task covering the whole data file.
    pub fn new(data_file: DataFile, deletes: Vec<DeleteFile>) -> Self {
        let length = data_file.file_size_in_bytes;
        Self {
            data_file,
            deletes,
            start: 0,
            length,
        }
    }

    /// Restrict the task to `[start, start + length)` of its data file.
    pub fn with_range(mut self, start: u64, length: u64) -> Self {
        self.start = start;
        self.length = length;
        self
    }

    /// Whether the task covers its whole data file
    pub fn is_whole_file(&self) -> bool {
        self.start == 0 && self.length == self.data_file.file_size_in_bytes
    }
}
