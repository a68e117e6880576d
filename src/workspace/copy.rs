//! Recursive directory copy.
//!
//! Local sources are copied into the workspace before building so the
//! caller's tree is never touched by the build.

use std::fs;
use std::path::Path;

use crate::error::Result;

/// Copy `src` into `dest`, creating `dest`.
///
/// Symlinks are followed. An existing `dest` is merged into. The parent
/// of `dest` must exist; it is never recreated, so a workspace removed
/// mid-copy stays removed.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<u64> {
    if !dest.is_dir() {
        fs::create_dir(dest)?;
    }
    let mut copied = 0;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dest.join(entry.file_name());

        if from.is_dir() {
            copied += copy_tree(&from, &to)?;
        } else {
            fs::copy(&from, &to)?;
            copied += 1;
        }
    }

    Ok(copied)
}
