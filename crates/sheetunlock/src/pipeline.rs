//! The unlock pipeline
//!
//! One run moves through
//! `Idle → Extracted → WorksheetsCleaned → WorkbookCleaned → Repackaged → Finalized`.
//! Each stage commits its filesystem effects before the next one starts. The
//! first failing stage ends the run with an [`UnlockError`] naming that stage.
//!
//! # Example
//!
//! ```rust,ignore
//! use sheetunlock::Unlocker;
//!
//! let report = Unlocker::default().run("Budget.xlsm")?;
//! println!("Saved to {}", report.output.display());
//! ```

use std::path::{Path, PathBuf};

use crate::archive::{extract_archive, repackage};
use crate::error::{Error, Stage, StageExt, UnlockError, UnlockResult};
use crate::finalize::{discard, discard_workspace, finalize};
use crate::layout::WorkbookLayout;
use crate::options::UnlockOptions;
use crate::protection::{strip_workbook, strip_worksheets, PartOutcome, WorksheetSummary};

/// Extensions accepted by [`check_supported`]
pub const SUPPORTED_EXTENSIONS: &[&str] = &["xlsx", "xlsm"];

/// Progress of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    /// Nothing done yet
    Idle,
    /// Archive unpacked into the workspace
    Extracted,
    /// Worksheet parts rewritten
    WorksheetsCleaned,
    /// Workbook part rewritten
    WorkbookCleaned,
    /// New archive built
    Repackaged,
    /// Workspace removed and output published
    Finalized,
}

/// Result of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockReport {
    /// Published workbook
    pub output: PathBuf,
    /// File entries in the published archive
    pub entries: usize,
    /// Worksheet pass summary
    pub worksheets: WorksheetSummary,
    /// Workbook part outcome, `None` if the archive has no workbook part
    pub workbook: Option<PartOutcome>,
}

impl UnlockReport {
    /// Whether a `workbookProtection` element was removed
    pub fn workbook_protection_removed(&self) -> bool {
        self.workbook.map_or(false, |outcome| outcome.removed() > 0)
    }
}

/// Reject paths whose extension is not `.xlsx` or `.xlsm`.
///
/// [`Unlocker::run`] does not gate on extension; callers that want to refuse
/// other files call this first.
pub fn check_supported<P: AsRef<Path>>(path: P) -> UnlockResult<()> {
    let path = path.as_ref();
    let supported = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        });
    if supported {
        Ok(())
    } else {
        Err(UnlockError::new(
            Stage::Validate,
            Error::Unsupported(path.to_path_buf()),
        ))
    }
}

/// Unlock `input` with default options and return the published path
pub fn run<P: AsRef<Path>>(input: P) -> UnlockResult<PathBuf> {
    Unlocker::default().run(input).map(|report| report.output)
}

/// Removes sheet and workbook protection from workbooks
#[derive(Debug, Clone, Default)]
pub struct Unlocker {
    options: UnlockOptions,
}

impl Unlocker {
    /// Create an unlocker with the given options
    pub fn new(options: UnlockOptions) -> Self {
        Self { options }
    }

    /// Options in use
    pub fn options(&self) -> &UnlockOptions {
        &self.options
    }

    /// Paths a run on `input` would use
    pub fn layout<P: AsRef<Path>>(&self, input: P) -> UnlockResult<WorkbookLayout> {
        self.options.validate().at(Stage::Validate)?;
        WorkbookLayout::new(input, &self.options).at(Stage::Validate)
    }

    /// Run the full pipeline on `input`
    pub fn run<P: AsRef<Path>>(&self, input: P) -> UnlockResult<UnlockReport> {
        self.run_with_progress(input, |_| {})
    }

    /// Run the full pipeline, calling `progress` after every completed stage
    pub fn run_with_progress<P, F>(&self, input: P, mut progress: F) -> UnlockResult<UnlockReport>
    where
        P: AsRef<Path>,
        F: FnMut(PipelineState),
    {
        let layout = self.layout(input)?;
        progress(PipelineState::Idle);

        let result = self.run_stages(&layout, &mut progress);
        match &result {
            Err(err) if err.stage == Stage::Finalize => {
                log::warn!(
                    "Unlocked archive kept at {}",
                    layout.intermediate.display()
                );
                if self.options.cleanup_on_failure {
                    discard_workspace(&layout);
                }
            }
            Err(_) if self.options.cleanup_on_failure => discard(&layout),
            _ => {}
        }
        result
    }

    fn run_stages(
        &self,
        layout: &WorkbookLayout,
        progress: &mut dyn FnMut(PipelineState),
    ) -> UnlockResult<UnlockReport> {
        log::info!("Unlocking {}", layout.input.display());

        self.extract(layout)?;
        progress(PipelineState::Extracted);

        let worksheets = self.strip_worksheets(layout)?;
        progress(PipelineState::WorksheetsCleaned);

        let workbook = self.strip_workbook(layout)?;
        progress(PipelineState::WorkbookCleaned);

        let entries = self.repackage(layout)?;
        progress(PipelineState::Repackaged);

        let output = self.finalize(layout)?;
        progress(PipelineState::Finalized);

        log::info!("Saved unlocked workbook to {}", output.display());
        Ok(UnlockReport {
            output,
            entries,
            worksheets,
            workbook,
        })
    }

    /// Unpack the input into the workspace
    pub fn extract(&self, layout: &WorkbookLayout) -> UnlockResult<usize> {
        let files = extract_archive(&layout.input, &layout.workspace).at(Stage::Extract)?;
        log::info!(
            "Extracted {files} part(s) to {}",
            layout.workspace.display()
        );
        Ok(files)
    }

    /// Remove matching sheet protection from every worksheet part
    pub fn strip_worksheets(&self, layout: &WorkbookLayout) -> UnlockResult<WorksheetSummary> {
        let summary =
            strip_worksheets(&layout.worksheets_dir, &self.options).at(Stage::Worksheets)?;
        log::info!(
            "Removed {} sheet protection element(s) from {} worksheet(s)",
            summary.removed,
            summary.scanned - summary.skipped
        );
        if summary.skipped > 0 {
            log::warn!(
                "{} worksheet(s) could not be parsed and were kept unchanged",
                summary.skipped
            );
        }
        Ok(summary)
    }

    /// Remove workbook protection from the workbook part
    pub fn strip_workbook(&self, layout: &WorkbookLayout) -> UnlockResult<Option<PartOutcome>> {
        let outcome = strip_workbook(&layout.workbook_part, &self.options).at(Stage::Workbook)?;
        match outcome {
            Some(PartOutcome::Rewritten { removed: 0 }) => {
                log::info!("Workbook has no workbook protection")
            }
            Some(PartOutcome::Rewritten { .. }) => log::info!("Workbook protection removed"),
            Some(PartOutcome::Skipped) | None => {}
        }
        Ok(outcome)
    }

    /// Build the intermediate archive from the workspace
    pub fn repackage(&self, layout: &WorkbookLayout) -> UnlockResult<usize> {
        let entries = repackage(&layout.workspace, &layout.intermediate).at(Stage::Repackage)?;
        log::info!(
            "Packed {entries} part(s) into {}",
            layout.intermediate.display()
        );
        Ok(entries)
    }

    /// Remove the workspace and publish the intermediate archive
    pub fn finalize(&self, layout: &WorkbookLayout) -> UnlockResult<PathBuf> {
        finalize(layout).at(Stage::Finalize)
    }
}
