//! Filesystem layout of one unlock run
//!
//! Every path the pipeline touches is derived from the input path alone:
//!
//! ```text
//! <dir>/Report.xlsm                       input
//! <dir>/Report/extracted/                 workspace
//! <dir>/Report/extracted/xl/worksheets/   worksheet parts
//! <dir>/Report/extracted/xl/workbook.xml  workbook part
//! <dir>/unlocked_Report.zip               intermediate archive
//! <dir>/unlocked_Report.xlsm              output
//! ```

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::options::UnlockOptions;

/// Name of the workspace directory inside the scratch root
pub const WORKSPACE_DIR: &str = "extracted";

/// Worksheet directory, relative to the workspace
pub const WORKSHEETS_DIR: &str = "xl/worksheets";

/// Workbook part, relative to the workspace
pub const WORKBOOK_PART: &str = "xl/workbook.xml";

/// Paths used by one unlock run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkbookLayout {
    /// The workbook being unlocked
    pub input: PathBuf,
    /// `<dir>/<stem>`, removed at the end of the run if empty
    pub scratch_root: PathBuf,
    /// `<dir>/<stem>/extracted`, holds the unpacked archive
    pub workspace: PathBuf,
    /// `<workspace>/xl/worksheets`
    pub worksheets_dir: PathBuf,
    /// `<workspace>/xl/workbook.xml`
    pub workbook_part: PathBuf,
    /// `<dir>/<prefix><stem>.zip`
    pub intermediate: PathBuf,
    /// `<dir>/<prefix><file name>`
    pub output: PathBuf,
}

impl WorkbookLayout {
    /// Derive the layout for `input`. Does not touch the filesystem.
    pub fn new<P: AsRef<Path>>(input: P, options: &UnlockOptions) -> Result<Self> {
        let input = input.as_ref();
        let file_name = input
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::InvalidPath(input.to_path_buf()))?;
        let stem = base_name(file_name);
        if stem.is_empty() {
            return Err(Error::InvalidPath(input.to_path_buf()));
        }

        let dir = input.parent().unwrap_or_else(|| Path::new(""));
        let scratch_root = dir.join(stem);
        // An extension-less input would have the scratch root collide with itself.
        if scratch_root == input {
            return Err(Error::InvalidPath(input.to_path_buf()));
        }
        let workspace = scratch_root.join(WORKSPACE_DIR);

        Ok(Self {
            input: input.to_path_buf(),
            worksheets_dir: workspace.join(WORKSHEETS_DIR),
            workbook_part: workspace.join(WORKBOOK_PART),
            intermediate: dir.join(format!("{}{}.zip", options.output_prefix, stem)),
            output: dir.join(format!("{}{}", options.output_prefix, file_name)),
            workspace,
            scratch_root,
        })
    }
}

/// File name with its last extension removed
fn base_name(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => file_name,
    }
}
