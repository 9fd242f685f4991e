//! Error types for sheetunlock

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for a whole unlock run
pub type UnlockResult<T> = std::result::Result<T, UnlockError>;

/// Errors raised by the individual pipeline operations
#[derive(Debug, Error)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP error
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// XML attribute error
    #[error("XML attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    /// Structurally broken XML that the tokenizer accepts
    #[error("Malformed XML: {0}")]
    Malformed(String),

    /// Archive entry whose name would land outside the workspace
    #[error("Unsafe archive entry name: {0}")]
    UnsafeEntry(String),

    /// Path that cannot be turned into a workspace layout
    #[error("Invalid path: {}", .0.display())]
    InvalidPath(PathBuf),

    /// File type the pipeline does not handle
    #[error("Unsupported input (expected .xlsx or .xlsm): {}", .0.display())]
    Unsupported(PathBuf),

    /// Invalid [`UnlockOptions`](crate::UnlockOptions)
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
}

impl Error {
    /// Whether this error means an XML part could not be parsed.
    ///
    /// Parse failures are recovered per part; everything else is fatal.
    pub fn is_parse(&self) -> bool {
        matches!(self, Error::Xml(_) | Error::XmlAttr(_) | Error::Malformed(_))
    }
}

/// Pipeline stage at which a run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Input and option checks before anything touches the disk
    Validate,
    /// Unpacking the workbook archive into the workspace
    Extract,
    /// Removing sheet protection from worksheet parts
    Worksheets,
    /// Removing workbook protection from the workbook part
    Workbook,
    /// Building the new archive from the workspace
    Repackage,
    /// Deleting the workspace and publishing the output
    Finalize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validate => "validate",
            Stage::Extract => "extract",
            Stage::Worksheets => "worksheet cleanup",
            Stage::Workbook => "workbook cleanup",
            Stage::Repackage => "repackage",
            Stage::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

/// Failure of an unlock run, tagged with the stage that failed
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct UnlockError {
    /// Stage that failed
    pub stage: Stage,
    /// Underlying cause
    #[source]
    pub source: Error,
}

impl UnlockError {
    /// Create a new error for `stage`
    pub fn new(stage: Stage, source: Error) -> Self {
        Self { stage, source }
    }
}

/// Attach a [`Stage`] to a fallible operation
pub(crate) trait StageExt<T> {
    fn at(self, stage: Stage) -> UnlockResult<T>;
}

impl<T> StageExt<T> for Result<T> {
    fn at(self, stage: Stage) -> UnlockResult<T> {
        self.map_err(|source| UnlockError::new(stage, source))
    }
}
