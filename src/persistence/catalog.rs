//! Named similar pairs artifacts in a directory.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::error::{PersistenceError, PersistenceResult};
use super::format::write_store;
use super::mapped::MappedSimilarPairs;
use crate::pairs::{PairsView, SimilarPairs};

/// File extension of pairs files.
pub const PAIRS_EXTENSION: &str = "pairs";

/// A directory of named pairs files, `<root>/<name>.pairs`.
#[derive(Debug, Clone)]
pub struct PairsCatalog {
    root: PathBuf,
}

impl PairsCatalog {
    /// Use `root`, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> PersistenceResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PersistenceResult<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(format!("{name}.{PAIRS_EXTENSION}")))
    }

    /// Save a completed store under a new name.
    ///
    /// Fails with `AlreadyExists` if the name is taken; the name is reserved
    /// atomically by the create-new open, so two concurrent creates cannot
    /// both succeed.
    pub fn create(&self, name: &str, store: &SimilarPairs) -> PersistenceResult<()> {
        if !store.is_complete() {
            return Err(PersistenceError::InvalidState(format!(
                "cannot save {name}: similar pairs are {:?}",
                store.state()
            )));
        }
        let path = self.path(name)?;
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => PersistenceError::AlreadyExists(name.to_string()),
                _ => PersistenceError::Io(e),
            })?;

        if let Err(e) = write_file(file, store) {
            // Do not leave a truncated artifact behind under the name.
            let _ = fs::remove_file(&path);
            return Err(e);
        }
        info!(
            name,
            cells = store.cell_count(),
            k = store.k(),
            pairs = store.total_pairs(),
            "saved similar pairs"
        );
        Ok(())
    }

    /// Map an existing artifact read-only.
    pub fn open_mapped(&self, name: &str) -> PersistenceResult<MappedSimilarPairs> {
        let path = self.path(name)?;
        let mapped = MappedSimilarPairs::open(&path).map_err(|e| match e {
            PersistenceError::NotFound(_) => PersistenceError::NotFound(name.to_string()),
            other => other,
        })?;
        debug!(name, cells = mapped.cell_count(), k = mapped.k(), "opened similar pairs");
        Ok(mapped)
    }

    /// Read an existing artifact into memory.
    pub fn load(&self, name: &str) -> PersistenceResult<SimilarPairs> {
        Ok(self.open_mapped(name)?.to_store())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Names of all artifacts, sorted.
    pub fn list(&self) -> PersistenceResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PAIRS_EXTENSION) || !path.is_file() {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_name(stem).is_ok() {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delete an artifact. `NotFound` if there is none under `name`.
    pub fn remove(&self, name: &str) -> PersistenceResult<()> {
        let path = self.path(name)?;
        fs::remove_file(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => PersistenceError::NotFound(name.to_string()),
            _ => PersistenceError::Io(e),
        })?;
        info!(name, "removed similar pairs");
        Ok(())
    }
}

fn write_file(file: File, store: &SimilarPairs) -> PersistenceResult<()> {
    let mut w = BufWriter::new(file);
    write_store(store, &mut w)?;
    w.flush()?;
    w.get_ref().sync_all()?;
    Ok(())
}

/// Names are non-empty, made of ASCII letters, digits, `-`, `_` and `.`,
/// and do not start with `.`.
fn validate_name(name: &str) -> PersistenceResult<()> {
    let ok = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(PersistenceError::InvalidName(format!("{name:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_validation() {
        assert!(validate_name("run-1_k20.v2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name(".hidden").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("..").is_err());
    }
}
