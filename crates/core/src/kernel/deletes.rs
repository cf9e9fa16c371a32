//! Delete file classification
//!
//! Merge-on-read tables record deletes in separate files. A delete file either
//! removes rows by position (data file path plus row ordinal) or by equality
//! on a set of columns. Readers must apply every delete file attached to a
//! data file, each with the semantics of its own kind, so the kind is fixed
//! once when the catalog's report is classified and carried unchanged to the
//! execution layer.
//!
//! The catalog reports a raw [`FileContent`] tag. Classification turns it into
//! a closed [`DeleteKind`]; anything that is not exactly one known delete kind
//! is rejected, since ignoring a delete file would return deleted rows.

use crate::kernel::{DeleteFile, FileContent, FileFormat};

/// How a delete file removes rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeleteKind {
    /// Rows are deleted by data file path and row position.
    PositionDeletes,
    /// Rows are deleted when they match a delete record on these field ids.
    EqualityDeletes {
        /// Field ids compared for equality
        equality_ids: Vec<i32>,
    },
}

impl DeleteKind {
    /// The content tag corresponding to this kind
    pub fn content(&self) -> FileContent {
        match self {
            Self::PositionDeletes => FileContent::PositionDeletes,
            Self::EqualityDeletes { .. } => FileContent::EqualityDeletes,
        }
    }

    /// Field ids compared by equality deletes, empty for position deletes
    pub fn equality_ids(&self) -> &[i32] {
        match self {
            Self::PositionDeletes => &[],
            Self::EqualityDeletes { equality_ids } => equality_ids,
        }
    }
}

/// Reason a delete file could not be classified.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    /// The file is tagged as data, not as deletes
    #[error("file is tagged as a data file")]
    DataContent,

    /// The content code is not one this planner knows
    #[error("unrecognized content code {0}")]
    UnknownContent(i32),

    /// An equality delete that names no columns
    #[error("equality delete file declares no equality field ids")]
    MissingEqualityIds,

    /// A position delete that also names equality columns
    #[error("position delete file declares equality field ids {0:?}")]
    AmbiguousEqualityIds(Vec<i32>),
}

/// Classify the content reported for a delete file.
pub fn classify(delete: &DeleteFile) -> Result<DeleteKind, ClassificationError> {
    match delete.content {
        FileContent::PositionDeletes if delete.equality_ids.is_empty() => {
            Ok(DeleteKind::PositionDeletes)
        }
        FileContent::PositionDeletes => Err(ClassificationError::AmbiguousEqualityIds(
            delete.equality_ids.clone(),
        )),
        FileContent::EqualityDeletes if delete.equality_ids.is_empty() => {
            Err(ClassificationError::MissingEqualityIds)
        }
        FileContent::EqualityDeletes => Ok(DeleteKind::EqualityDeletes {
            equality_ids: delete.equality_ids.clone(),
        }),
        FileContent::Data => Err(ClassificationError::DataContent),
        FileContent::Unknown(code) => Err(ClassificationError::UnknownContent(code)),
    }
}

/// A delete file with its kind resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeleteFileDescriptor {
    /// Full path of the file
    pub path: String,
    /// File format
    pub format: FileFormat,
    /// Size of the file in bytes
    pub length: u64,
    /// Number of delete records in the file
    pub record_count: u64,
    /// How the file deletes rows
    pub kind: DeleteKind,
}

impl TryFrom<DeleteFile> for DeleteFileDescriptor {
    type Error = ClassificationError;

    fn try_from(delete: DeleteFile) -> Result<Self, Self::Error> {
        let kind = classify(&delete)?;
        Ok(Self {
            path: delete.path,
            format: delete.format,
            length: delete.file_size_in_bytes,
            record_count: delete.record_count,
            kind,
        })
    }
}
