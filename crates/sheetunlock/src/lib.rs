//! # sheetunlock
//!
//! Removes sheet and workbook protection from XLSX/XLSM workbooks.
//!
//! A workbook is a ZIP archive of XML parts. Unlocking it means:
//!
//! - unpacking the archive into a scratch workspace next to the input
//! - dropping `sheetProtection` elements hashed with SHA-512 from every
//!   `xl/worksheets/sheet<N>.xml`
//! - dropping the `workbookProtection` element from `xl/workbook.xml`
//! - packing the workspace into a new archive
//! - deleting the workspace and publishing `unlocked_<name>` beside the input
//!
//! The input file is never modified. No password is recovered; the protection
//! markers are simply removed.
//!
//! ## Example
//!
//! ```rust,no_run
//! let output = sheetunlock::run("/data/Report.xlsm").unwrap();
//! assert_eq!(output, std::path::Path::new("/data/unlocked_Report.xlsm"));
//! ```

pub mod archive;
pub mod error;
pub mod finalize;
pub mod layout;
pub mod options;
pub mod pipeline;
pub mod protection;

pub use error::{Error, Result, Stage, UnlockError, UnlockResult};
pub use layout::WorkbookLayout;
pub use options::UnlockOptions;
pub use pipeline::{check_supported, run, PipelineState, UnlockReport, Unlocker};
pub use protection::{ElementFilter, PartOutcome, WorksheetSummary};
