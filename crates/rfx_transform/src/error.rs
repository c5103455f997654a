use thiserror::Error;

use crate::edit::EditError;

/// Failure of a whole-document transform. No partial output is produced.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error(transparent)]
    Parse(#[from] anyhow::Error),
    #[error("conflicting edits: {0}")]
    Edit(#[from] EditError),
    #[error("failed to build source map: {0}")]
    SourceMap(String),
    #[error("unsupported file type: {0}")]
    UnsupportedFile(String),
    #[error("script region {start}..{end} is outside the document")]
    RegionOutOfBounds { start: usize, end: usize },
}
