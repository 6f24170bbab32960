//! Checkpoint store for solved blocks.
//!
//! One pretty-printed JSON file per block, named `block-{id:06}.json`.
//! Files are written to a temporary name and renamed into place, so a
//! reader never sees a partial entry.

use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::solve::SolvedBlock;
use crate::error::{Error, Result};

const PREFIX: &str = "block-";
const SUFFIX: &str = ".json";

/// Directory of solved block checkpoints.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Open a store, creating the directory if it doesn't exist.
    pub fn new(dir: &Path) -> Result<Self> {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a block's entry.
    pub fn path_for(&self, block_id: u64) -> PathBuf {
        self.dir.join(format!("{PREFIX}{block_id:06}{SUFFIX}"))
    }

    /// Write one block.
    pub fn save(&self, block: &SolvedBlock) -> Result<PathBuf> {
        let path = self.path_for(block.id);
        let tmp = self.dir.join(format!(
            ".{PREFIX}{:06}{SUFFIX}.{}.tmp",
            block.id,
            std::process::id()
        ));

        let json = serde_json::to_string_pretty(block)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;

        log::debug!(
            "Checkpointed block {} [{}, {}] to {}",
            block.id,
            block.min_z,
            block.max_z,
            path.display()
        );
        Ok(path)
    }

    /// Entry paths in sorted order.
    pub fn entries(&self) -> Result<Vec<PathBuf>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(PREFIX) && name.ends_with(SUFFIX))
            })
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Read one block.
    pub fn load(&self, block_id: u64) -> Result<SolvedBlock> {
        Self::read_entry(&self.path_for(block_id))
    }

    /// Read every block, sorted by id.
    ///
    /// Fails if fewer than `min_entries` entries exist.
    pub fn load_all(&self, min_entries: usize) -> Result<Vec<SolvedBlock>> {
        let paths = self.entries()?;
        if paths.len() < min_entries {
            return Err(Error::InsufficientCheckpoints {
                found: paths.len(),
                required: min_entries,
            });
        }

        let mut blocks = paths
            .iter()
            .map(|path| Self::read_entry(path))
            .collect::<Result<Vec<_>>>()?;
        blocks.sort_by_key(|b| b.id);

        log::info!(
            "Loaded {} checkpoints from {}",
            blocks.len(),
            self.dir.display()
        );
        Ok(blocks)
    }

    fn read_entry(path: &Path) -> Result<SolvedBlock> {
        let content = fs::read_to_string(path).map_err(|e| Error::Checkpoint {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| Error::Checkpoint {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}
