//! Output workspace management
//!
//! Owns the per-run directory tree: a top-level output root with `run_data`,
//! `tmp_data`, and `xml_data` beneath it. All four roots exist before
//! scheduling begins, so no worker ever races to create a parent directory.

#![allow(dead_code)]

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const RUN_DATA_DIR: &str = "run_data";
const TMP_DATA_DIR: &str = "tmp_data";
const XML_DATA_DIR: &str = "xml_data";

/// Per-suite subpaths handed to a worker
///
/// Workers receive only these; they never touch the roots themselves.
#[derive(Clone, Debug)]
pub struct SuitePaths {
    pub run_dir: PathBuf,
    pub tmp_dir: PathBuf,
}

/// The prepared output directory tree
#[derive(Clone, Debug)]
pub struct Workspace {
    top: PathBuf,
    run_root: PathBuf,
    tmp_root: PathBuf,
    xml_root: PathBuf,
}

impl Workspace {
    /// Create the four-directory tree if absent. Idempotent; a top path that
    /// collides with a non-directory or cannot be created is fatal.
    pub fn prepare(top: impl Into<PathBuf>) -> Result<Self> {
        let top = top.into();
        if top.exists() && !top.is_dir() {
            bail!(
                "workspace path {} exists and is not a directory",
                top.display()
            );
        }

        let run_root = top.join(RUN_DATA_DIR);
        let tmp_root = top.join(TMP_DATA_DIR);
        let xml_root = top.join(XML_DATA_DIR);

        for root in [&top, &run_root, &tmp_root, &xml_root] {
            std::fs::create_dir_all(root)
                .with_context(|| format!("failed to create {}", root.display()))?;
        }

        info!("Workspace prepared at {}", top.display());
        Ok(Self {
            top,
            run_root,
            tmp_root,
            xml_root,
        })
    }

    /// Remove prior contents of the three data subtrees and recreate them.
    /// Never touches anything outside the workspace tree; the caller decides
    /// whether to invoke this at all.
    pub fn clear(&self) -> Result<()> {
        for root in [&self.run_root, &self.tmp_root, &self.xml_root] {
            if root.exists() {
                std::fs::remove_dir_all(root)
                    .with_context(|| format!("failed to clear {}", root.display()))?;
            }
            std::fs::create_dir_all(root)
                .with_context(|| format!("failed to recreate {}", root.display()))?;
        }
        debug!("Workspace data directories cleared");
        Ok(())
    }

    /// Allocate the disjoint per-suite subpaths. Uniqueness of suite names
    /// (enforced at discovery) makes the run directories disjoint by
    /// construction.
    pub fn for_suite(&self, suite: &str) -> Result<SuitePaths> {
        let run_dir = self.run_root.join(suite);
        let tmp_dir = self.tmp_root.join(suite);
        for dir in [&run_dir, &tmp_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(SuitePaths { run_dir, tmp_dir })
    }

    pub fn top(&self) -> &Path {
        &self.top
    }

    pub fn run_root(&self) -> &Path {
        &self.run_root
    }

    pub fn tmp_root(&self) -> &Path {
        &self.tmp_root
    }

    pub fn xml_root(&self) -> &Path {
        &self.xml_root
    }
}
