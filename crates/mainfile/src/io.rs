//! Bounded file I/O utilities.
//!
//! All content reads during matching go through [`read_prefix`], which
//! caps the number of bytes pulled from disk so a directory of huge
//! files cannot blow up memory or latency.

use crate::{MatchError, Result};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Read at most `limit` bytes from the start of a file.
///
/// # Errors
///
/// Returns `MatchError::Io` if the file cannot be opened or read.
pub fn read_prefix(path: impl AsRef<Path>, limit: usize) -> Result<Vec<u8>> {
    let file = File::open(path.as_ref())?;
    let mut buf = Vec::with_capacity(limit.min(64 * 1024));
    file.take(limit as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

/// List the regular files directly inside a directory, sorted by name.
///
/// Subdirectories are not entered; the immediate parent folder is the
/// scope of one resolution pass. Sorting keeps the listing independent
/// of file-system iteration order.
///
/// # Errors
///
/// Returns `MatchError::Io` if the directory cannot be read.
pub fn list_directory(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(MatchError::Io(std::io::Error::new(
            std::io::ErrorKind::NotADirectory,
            format!("not a directory: {}", dir.display()),
        )));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Recursively collect all regular files under `root`, sorted by path.
pub fn walk_tree(root: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    let mut files = Vec::new();
    walk_tree_impl(root, &mut files)?;
    files.sort();
    Ok(files)
}

fn walk_tree_impl(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        } else if path.is_dir() {
            walk_tree_impl(&path, files)?;
        }
    }
    Ok(())
}
