//! Unlock options

use crate::error::{Error, Result};

/// Default prefix of the published workbook's file name
pub const DEFAULT_OUTPUT_PREFIX: &str = "unlocked_";

/// Hash algorithm of the sheet protection entries that get removed
pub const DEFAULT_SHEET_ALGORITHM: &str = "SHA-512";

/// Options for an unlock run
#[derive(Debug, Clone)]
pub struct UnlockOptions {
    /// Prefix for the intermediate archive and the published workbook (default: `unlocked_`)
    pub output_prefix: String,
    /// Re-indent rewritten parts (default: true)
    pub pretty_print: bool,
    /// `algorithmName` a `sheetProtection` element must carry to be removed (default: `SHA-512`).
    ///
    /// Only SHA-512 entries are removed by default; legacy and other hashes stay
    /// in place. Any other value goes beyond that behaviour and removes the
    /// entries hashed with the given algorithm instead.
    pub sheet_algorithm: String,
    /// Remove the workspace and intermediate archive when a stage fails (default: true)
    pub cleanup_on_failure: bool,
}

impl Default for UnlockOptions {
    fn default() -> Self {
        Self {
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
            pretty_print: true,
            sheet_algorithm: DEFAULT_SHEET_ALGORITHM.to_string(),
            cleanup_on_failure: true,
        }
    }
}

impl UnlockOptions {
    /// Check the options before any path is derived from them
    pub fn validate(&self) -> Result<()> {
        if self.output_prefix.is_empty() {
            return Err(Error::InvalidOptions(
                "output prefix must not be empty".into(),
            ));
        }
        if self.output_prefix.contains(['/', '\\']) {
            return Err(Error::InvalidOptions(format!(
                "output prefix must not contain a path separator: {:?}",
                self.output_prefix
            )));
        }
        if self.sheet_algorithm.is_empty() {
            return Err(Error::InvalidOptions(
                "sheet algorithm must not be empty".into(),
            ));
        }
        Ok(())
    }
}
