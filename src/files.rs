use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::{DirEntry, WalkDir};

/// Directory the tool keeps its own state in. Never walked.
pub const STATE_DIR: &str = ".layerfix";

#[derive(Debug, Clone)]
pub struct TraversalOptions {
    /// How many directory levels below the root to descend; 0 keeps only the
    /// root's own files.
    pub max_depth: usize,
    pub include_hidden: bool,
    pub exclude: Vec<String>,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            max_depth: 32,
            include_hidden: true,
            exclude: Vec::new(),
        }
    }
}

/// A path the walk could not descend into or stat.
#[derive(Debug, Clone)]
pub struct SkippedPath {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct FileListing {
    pub files: Vec<PathBuf>,
    pub skipped: Vec<SkippedPath>,
}

/// Rejects folders that do not directly contain a project marker file.
pub fn ensure_project_root(root: &Path, marker_extension: &str) -> Result<()> {
    let entries =
        fs::read_dir(root).with_context(|| format!("unable to open folder {}", root.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("reading {}", root.display()))?;
        let is_file = entry.file_type().map(|kind| kind.is_file()).unwrap_or(false);
        if is_file && entry.file_name().to_string_lossy().ends_with(marker_extension) {
            return Ok(());
        }
    }
    bail!(
        "couldn't find a {marker_extension} file in {}; please choose a different folder",
        root.display()
    )
}

/// Lists every file under `root`, depth first, sorted by name within each
/// directory. Exclude globs match the path below `root`, with forward slashes.
/// Entries the walk fails on are collected in `skipped` and the walk goes on.
pub fn collect_files(root: &Path, options: &TraversalOptions) -> Result<FileListing> {
    let exclude = build_exclude_globs(&options.exclude)?;
    let include_hidden = options.include_hidden;
    let walker = WalkDir::new(root)
        .follow_links(true)
        .max_depth(options.max_depth.saturating_add(1))
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !(is_state_dir(entry) || (!include_hidden && is_hidden(entry)))
        });

    let mut listing = FileListing::default();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().unwrap_or(root).to_path_buf();
                listing.skipped.push(SkippedPath {
                    path,
                    error: format!("walking {}: {err}", root.display()),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = relative_slashes(root, entry.path());
        if exclude
            .as_ref()
            .is_some_and(|set| set.is_match(relative.as_str()))
        {
            continue;
        }

        listing.files.push(entry.into_path());
    }

    Ok(listing)
}

fn is_state_dir(entry: &DirEntry) -> bool {
    entry.depth() == 1 && entry.file_type().is_dir() && entry.file_name() == STATE_DIR
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn relative_slashes(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn build_exclude_globs(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).map_err(|err| anyhow!("invalid exclude glob '{pattern}': {err}"))?;
        builder.add(glob);
    }

    builder
        .build()
        .map(Some)
        .map_err(|err| anyhow!("unable to build exclude globs: {err}"))
}
