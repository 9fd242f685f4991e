//! End-to-end tests for sheetunlock.
//!
//! Each test builds the workbook archive it needs in a temp directory with
//! `zip::ZipWriter`, runs the pipeline on it, and inspects the published
//! archive.

mod common;

pub use common::*;
