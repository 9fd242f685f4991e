//! Workbook archive extraction and repackaging

use std::fs::{self, File};
use std::io::{self, BufReader, ErrorKind, Read, Seek, Write};
use std::path::{Component, Path};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, Result};

/// Unpack the archive at `archive_path` into `workspace`.
///
/// A workspace left behind by an earlier interrupted run is cleared first.
/// Returns the number of file entries written.
pub fn extract_archive(archive_path: &Path, workspace: &Path) -> Result<usize> {
    let file = File::open(archive_path)?;
    let archive = ZipArchive::new(BufReader::new(file))?;

    match fs::remove_dir_all(workspace) {
        Ok(()) => log::info!("Cleared stale workspace {}", workspace.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    fs::create_dir_all(workspace)?;

    extract_entries(archive, workspace)
}

/// Unpack every entry of `archive` below `workspace`
pub fn extract_entries<R: Read + Seek>(mut archive: ZipArchive<R>, workspace: &Path) -> Result<usize> {
    let mut files = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| Error::UnsafeEntry(entry.name().to_string()))?;
        let target = workspace.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        log::debug!("Extracted {}", entry.name());
        files += 1;
    }
    Ok(files)
}

/// Write every regular file under `workspace` into a new deflated archive at `archive_path`.
///
/// Entry names are the paths relative to `workspace` with `/` separators.
/// Returns the number of entries written.
pub fn repackage(workspace: &Path, archive_path: &Path) -> Result<usize> {
    let file = File::create(archive_path)?;
    let mut zip = ZipWriter::new(file);
    let written = write_tree(workspace, &mut zip)?;
    zip.finish()?;
    Ok(written)
}

fn write_tree<W: Write + Seek>(workspace: &Path, zip: &mut ZipWriter<W>) -> Result<usize> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut written = 0;
    for entry in WalkDir::new(workspace)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry_name(workspace, entry.path())?;

        zip.start_file(name.as_str(), options)?;
        let mut src = File::open(entry.path())?;
        io::copy(&mut src, zip)?;
        log::debug!("Packed {name}");
        written += 1;
    }
    Ok(written)
}

/// Archive entry name of `path` below `root`
fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| Error::InvalidPath(path.to_path_buf()))?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(
                part.to_str()
                    .ok_or_else(|| Error::InvalidPath(path.to_path_buf()))?,
            ),
            _ => return Err(Error::InvalidPath(path.to_path_buf())),
        }
    }
    Ok(parts.join("/"))
}

/// File entry names of the archive at `archive_path`, in archive order
pub fn entry_names(archive_path: &Path) -> Result<Vec<String>> {
    let archive = ZipArchive::new(BufReader::new(File::open(archive_path)?))?;
    Ok(archive
        .file_names()
        .filter(|name| !name.ends_with('/'))
        .map(str::to_string)
        .collect())
}
