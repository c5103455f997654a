//! Input discovery: explicit files and directory walks filtered by the
//! configured include/exclude globs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use rfx_ast::Options;
use walkdir::WalkDir;

pub struct FileFilter {
    include: GlobSet,
    exclude: GlobSet,
}

impl FileFilter {
    pub fn new(options: &Options) -> Result<Self> {
        Ok(Self {
            include: build_set(&options.include)?,
            exclude: build_set(&options.exclude)?,
        })
    }

    pub fn accepts(&self, path: &Path) -> bool {
        self.include.is_match(path) && !self.exclude.is_match(path)
    }

    /// Expand `inputs` into the files to process. Explicitly named files are
    /// only subject to the exclude list; directories are walked and filtered
    /// by both.
    pub fn collect(&self, inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for input in inputs {
            if input.is_dir() {
                for entry in WalkDir::new(input).sort_by_file_name() {
                    let entry =
                        entry.with_context(|| format!("failed to walk {}", input.display()))?;
                    if entry.file_type().is_file() && self.accepts(entry.path()) {
                        files.push(entry.into_path());
                    }
                }
            } else if !self.exclude.is_match(input) {
                files.push(input.clone());
            } else {
                tracing::debug!(path = %input.display(), "excluded");
            }
        }
        Ok(files)
    }
}

fn build_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).with_context(|| format!("invalid glob `{pattern}`"))?;
        builder.add(glob);
    }
    builder.build().context("failed to compile globs")
}
