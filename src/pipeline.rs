use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::config::Settings;
use crate::diff;
use crate::encoding::EncodingStrategy;
use crate::extract::{FileKind, extract_locations};
use crate::files::{self, FileListing};
use crate::logging;
use crate::patterns::{LayerPatterns, LegacyValue};
use crate::rewrite::{FileOutcome, FixCounts, count_pattern, rewrite_text, update_layer_props};
use crate::scan::{MatchRecord, scan_locations};
use crate::source::{DiskSource, MemorySource, ScriptSource};

const PREVIEW_CONTEXT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: String,
    pub error: String,
}

/// Everything a fix run found, across all files.
#[derive(Debug, Default, Serialize)]
pub struct FolderReport {
    pub unresolved: Vec<MatchRecord>,
    pub fixed: usize,
    pub counts: FixCounts,
    pub files_visited: usize,
    pub files_changed: usize,
    pub failures: Vec<FileFailure>,
    pub dry_run: bool,
}

impl FolderReport {
    fn absorb(&mut self, outcome: FileOutcome) {
        self.fixed += outcome.fixed();
        self.counts.front += outcome.counts.front;
        self.counts.behind += outcome.counts.behind;
        self.counts.back += outcome.counts.back;
        self.counts.commented_out += outcome.counts.commented_out;
        if outcome.change.is_some() {
            self.files_changed += 1;
        }
        self.unresolved.extend(outcome.unresolved);
    }

    /// The `(unresolved, fix count)` pair the report is built around.
    pub fn summary(&self) -> (&[MatchRecord], usize) {
        (&self.unresolved, self.fixed)
    }
}

#[derive(Debug, Default, Serialize)]
pub struct ScanReport {
    pub unresolved: Vec<MatchRecord>,
    pub fixable: FixCounts,
    pub canonical: usize,
    pub files_scanned: usize,
    pub failures: Vec<FileFailure>,
}

#[derive(Debug, Clone, Copy)]
pub struct FixOptions<'a> {
    /// Write fixed files back. When unset, nothing is written.
    pub persist: bool,
    /// Print a diff of every file that would change without being written.
    pub preview: bool,
    /// Project root to keep the change log under. `None` disables the log.
    pub log_root: Option<&'a Path>,
}

/// Runs the fixer over every source in order. A failing file is recorded and
/// the run moves on to the next one.
pub fn fix_sources<S, I>(sources: I, patterns: &LayerPatterns, options: &FixOptions<'_>) -> FolderReport
where
    S: ScriptSource,
    I: IntoIterator<Item = S>,
{
    let mut report = FolderReport {
        dry_run: !options.persist,
        ..FolderReport::default()
    };
    for mut source in sources {
        report.files_visited += 1;
        match update_layer_props(&mut source, patterns, options.persist) {
            Ok(outcome) => {
                announce(source.name(), &outcome.counts);
                if let Some(change) = &outcome.change {
                    if outcome.written {
                        if let Some(root) = options.log_root {
                            if let Err(err) = logging::record_change(
                                root,
                                source.path(),
                                outcome.counts,
                                outcome.unresolved.len(),
                            ) {
                                eprintln!("warning: unable to update change log: {err:#}");
                            }
                        }
                    } else if options.preview {
                        println!(
                            "--- preview: {} ({}) ---",
                            source.path().display(),
                            diff::summarize_lines(&change.before, &change.after)
                        );
                        diff::print_diff(&change.before, &change.after, PREVIEW_CONTEXT);
                    }
                }
                report.absorb(outcome);
            }
            Err(err) => {
                eprintln!("skipping {}: {err:#}", source.path().display());
                report.failures.push(failure(source.path(), &err));
            }
        }
    }
    report
}

/// Report-only pass: what would be fixed, what is already canonical, and what
/// needs manual attention. Nothing is written.
pub fn scan_sources<S, I>(sources: I, patterns: &LayerPatterns) -> ScanReport
where
    S: ScriptSource,
    I: IntoIterator<Item = S>,
{
    let mut report = ScanReport::default();
    for mut source in sources {
        match scan_one(&mut source, patterns) {
            Ok(None) => {}
            Ok(Some((unresolved, fixable, canonical))) => {
                report.files_scanned += 1;
                report.unresolved.extend(unresolved);
                report.fixable.front += fixable.front;
                report.fixable.behind += fixable.behind;
                report.fixable.back += fixable.back;
                report.fixable.commented_out += fixable.commented_out;
                report.canonical += canonical;
            }
            Err(err) => {
                eprintln!("skipping {}: {err:#}", source.path().display());
                report.failures.push(failure(source.path(), &err));
            }
        }
    }
    report
}

/// Reads the file once; every count afterwards runs on the in-memory copy.
fn scan_one(
    source: &mut dyn ScriptSource,
    patterns: &LayerPatterns,
) -> Result<Option<(Vec<MatchRecord>, FixCounts, usize)>> {
    if !FileKind::from_name(source.name()).qualifies() {
        return Ok(None);
    }
    let contents = source.read_text()?;
    let mut loaded = MemorySource::new(source.path(), contents.as_str());
    let canonical = count_pattern(&mut loaded, patterns.canonical())?.unwrap_or(0);
    let locations = extract_locations(source.name(), &contents)?;
    let unresolved = scan_locations(&locations, patterns);
    let fixable = rewrite_text(&contents, patterns).counts;
    Ok(Some((unresolved, fixable, canonical)))
}

/// Validates the project folder, walks it, and fixes every entity and script.
/// Dry-run diffs are printed only when `preview` is set.
pub fn fix_folder(
    root: &Path,
    settings: &Settings,
    patterns: &LayerPatterns,
    preview: bool,
) -> Result<FolderReport> {
    files::ensure_project_root(root, &settings.marker_extension)?;
    let encoding = EncodingStrategy::new(settings.encoding.as_deref())?;
    let listing = files::collect_files(root, &settings.traversal)?;
    let sources = listing
        .files
        .iter()
        .map(|path| DiskSource::new(path, &encoding, settings.no_backup));
    let options = FixOptions {
        persist: !settings.dry_run,
        preview,
        log_root: Some(root),
    };
    let mut report = fix_sources(sources, patterns, &options);
    report.failures.extend(walk_failures(&listing));
    Ok(report)
}

pub fn scan_folder(root: &Path, settings: &Settings, patterns: &LayerPatterns) -> Result<ScanReport> {
    files::ensure_project_root(root, &settings.marker_extension)?;
    let encoding = EncodingStrategy::new(settings.encoding.as_deref())?;
    let listing = files::collect_files(root, &settings.traversal)?;
    let sources = listing
        .files
        .iter()
        .map(|path| DiskSource::new(path, &encoding, true));
    let mut report = scan_sources(sources, patterns);
    report.failures.extend(walk_failures(&listing));
    Ok(report)
}

fn walk_failures(listing: &FileListing) -> Vec<FileFailure> {
    listing
        .skipped
        .iter()
        .map(|skipped| {
            eprintln!("skipping {}: {}", skipped.path.display(), skipped.error);
            FileFailure {
                path: skipped.path.display().to_string(),
                error: skipped.error.clone(),
            }
        })
        .collect()
}

fn announce(name: &str, counts: &FixCounts) {
    for value in LegacyValue::REWRITE_ORDER {
        let found = counts.legacy(value);
        if found > 0 {
            eprintln!("found {found} cases of {value} in {name}");
        }
    }
    if counts.commented_out > 0 {
        eprintln!(
            "found {} cases of layer: \"<other string>\" in {name}; commented them out",
            counts.commented_out
        );
    }
}

fn failure(path: &Path, err: &anyhow::Error) -> FileFailure {
    FileFailure {
        path: path.display().to_string(),
        error: format!("{err:#}"),
    }
}
