//! Generated-file output.
//!
//! Writes generated units under a root directory and prunes serializer
//! files left over from earlier runs, so renaming or deleting a type never
//! leaves a stale `_ser.rs` file behind. Files the generator does not own
//! (anything not ending in `_ser.rs`) are never touched.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::CodegenError;
use crate::generator::GeneratedUnit;

const GENERATED_SUFFIX: &str = "_ser.rs";

/// Writes generated units to disk and removes stale ones.
pub struct GeneratedFileWriter {
    root: PathBuf,
}

impl GeneratedFileWriter {
    /// Creates a writer rooted at the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Writes all units, creating directories as needed, then prunes every
    /// `_ser.rs` file under the root that no unit claims. Unchanged files
    /// are left alone to keep their modification time stable.
    pub fn write(&self, units: &[GeneratedUnit]) -> Result<(), CodegenError> {
        let mut active: BTreeSet<PathBuf> = BTreeSet::new();

        for unit in units {
            let path = self.root.join(&unit.rel_path);
            active.insert(path.clone());
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            if fs::read_to_string(&path).is_ok_and(|existing| existing == unit.content) {
                debug!(path = %path.display(), "unchanged");
                continue;
            }
            fs::write(&path, &unit.content)?;
            info!(path = %path.display(), identity = %unit.identity, "wrote serializer");
        }

        self.prune(&self.root, &active)?;
        Ok(())
    }

    fn prune(&self, dir: &Path, active: &BTreeSet<PathBuf>) -> Result<(), CodegenError> {
        if !dir.is_dir() {
            return Ok(());
        }
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                self.prune(&path, active)?;
                continue;
            }
            let is_generated = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(GENERATED_SUFFIX));
            if is_generated && !active.contains(&path) {
                fs::remove_file(&path)?;
                info!(path = %path.display(), "pruned stale serializer");
            }
        }
        Ok(())
    }
}
