//! Compiled source globs for one asset category.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use jwalk::WalkDir;

use crate::utils::path::{relative_to, to_slash};

const IGNORED_FILES: &[&str] = &[".DS_Store", "Thumbs.db"];

/// A base directory plus include/exclude globs relative to it.
///
/// `*` never crosses a `/`, so `*.html` only matches files directly under the
/// base while `**/*.js` matches at any depth.
#[derive(Clone)]
pub struct SourceSet {
    base: PathBuf,
    include: GlobSet,
    exclude: Option<GlobSet>,
    include_patterns: Vec<String>,
    exclude_patterns: Vec<String>,
}

impl fmt::Debug for SourceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceSet")
            .field("base", &self.base)
            .field("include", &self.include_patterns)
            .field("exclude", &self.exclude_patterns)
            .finish()
    }
}

impl SourceSet {
    pub fn new(base: impl Into<PathBuf>, include: &[String], exclude: &[String]) -> Result<Self> {
        let base = base.into();
        let include_set = build_globset(include)
            .with_context(|| format!("building include globs for {}", base.display()))?;
        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(
                build_globset(exclude)
                    .with_context(|| format!("building exclude globs for {}", base.display()))?,
            )
        };

        Ok(Self {
            base,
            include: include_set,
            exclude: exclude_set,
            include_patterns: include.to_vec(),
            exclude_patterns: exclude.to_vec(),
        })
    }

    /// Absolute base directory.
    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn include_patterns(&self) -> &[String] {
        &self.include_patterns
    }

    /// Whether an absolute path belongs to this set.
    pub fn matches(&self, path: &Path) -> bool {
        relative_to(path, &self.base).is_some_and(|rel| self.matches_relative(&to_slash(rel)))
    }

    /// Whether a `/`-separated path relative to the base belongs to this set.
    pub fn matches_relative(&self, rel: &str) -> bool {
        if rel.is_empty() || !self.include.is_match(rel) {
            return false;
        }
        !self.exclude.as_ref().is_some_and(|ex| ex.is_match(rel))
    }

    /// All matching files, sorted by path.
    ///
    /// A missing base directory yields an empty list. An unreadable entry
    /// below the base is an error rather than a silently shorter list.
    pub fn scan(&self) -> Result<Vec<PathBuf>> {
        if !self.base.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.base) {
            let entry =
                entry.with_context(|| format!("scanning {}", self.base.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_str().unwrap_or_default();
            if IGNORED_FILES.contains(&name) {
                continue;
            }
            let path = entry.path();
            if self.matches(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Build a GlobSet where `*` does not match `/`.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(pat)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
