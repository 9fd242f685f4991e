//! Workspace removal and output publishing
//!
//! Both steps tolerate having already run, so a finalize interrupted between
//! deleting the workspace and renaming the archive can simply be repeated.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::layout::WorkbookLayout;

/// Delete the workspace, then move the intermediate archive to the output path
pub fn finalize(layout: &WorkbookLayout) -> Result<PathBuf> {
    remove_workspace(layout)?;
    publish(layout)
}

/// Recursively delete the workspace and, if nothing else is in it, the scratch root.
///
/// A workspace that is already gone is not an error.
pub fn remove_workspace(layout: &WorkbookLayout) -> Result<()> {
    match fs::remove_dir_all(&layout.workspace) {
        Ok(()) => log::debug!("Removed workspace {}", layout.workspace.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    remove_scratch_root(&layout.scratch_root);
    Ok(())
}

// The scratch root shares its name with the workbook, so it may be a directory
// the user owns. Only an empty one is removed.
fn remove_scratch_root(root: &Path) {
    match fs::remove_dir(root) {
        Ok(()) => log::debug!("Removed scratch directory {}", root.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => log::warn!("Leaving {} in place: {e}", root.display()),
    }
}

/// Rename the intermediate archive to the output path, replacing any earlier output.
///
/// If the intermediate archive is missing but the output exists, a previous
/// finalize already got this far and the output is returned as is.
pub fn publish(layout: &WorkbookLayout) -> Result<PathBuf> {
    match fs::rename(&layout.intermediate, &layout.output) {
        Ok(()) => Ok(layout.output.clone()),
        Err(e) if e.kind() == ErrorKind::NotFound && layout.output.is_file() => {
            log::info!(
                "{} already published, nothing to rename",
                layout.output.display()
            );
            Ok(layout.output.clone())
        }
        Err(e) => Err(e.into()),
    }
}

/// Best-effort removal of everything a failed run left behind.
///
/// The input and any previously published output are never touched.
pub fn discard(layout: &WorkbookLayout) {
    discard_workspace(layout);
    match fs::remove_file(&layout.intermediate) {
        Ok(()) => log::debug!("Removed {}", layout.intermediate.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove {}: {e}", layout.intermediate.display()),
    }
}

/// Best-effort removal of the workspace alone.
///
/// Used when publishing failed: the built archive stays under its
/// intermediate name so [`finalize`] can be run again.
pub fn discard_workspace(layout: &WorkbookLayout) {
    if let Err(e) = remove_workspace(layout) {
        log::warn!(
            "Could not remove workspace {}: {e}",
            layout.workspace.display()
        );
    }
}
