use anyhow::Result;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::extract::{FileKind, extract_locations};
use crate::patterns::{self, LayerPatterns, LegacyValue};
use crate::scan::{MatchRecord, scan_locations};
use crate::source::ScriptSource;

/// Substitutions applied to one file, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixCounts {
    pub front: usize,
    pub behind: usize,
    pub back: usize,
    pub commented_out: usize,
}

impl FixCounts {
    pub fn total(&self) -> usize {
        self.front + self.behind + self.back + self.commented_out
    }

    pub fn legacy(&self, value: LegacyValue) -> usize {
        match value {
            LegacyValue::Front => self.front,
            LegacyValue::Behind => self.behind,
            LegacyValue::Back => self.back,
        }
    }

    fn legacy_mut(&mut self, value: LegacyValue) -> &mut usize {
        match value {
            LegacyValue::Front => &mut self.front,
            LegacyValue::Behind => &mut self.behind,
            LegacyValue::Back => &mut self.back,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rewrite {
    pub text: String,
    pub counts: FixCounts,
}

/// The file content before and after rewriting.
#[derive(Debug, Clone)]
pub struct TextChange {
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, Default)]
pub struct FileOutcome {
    pub unresolved: Vec<MatchRecord>,
    pub counts: FixCounts,
    pub written: bool,
    pub change: Option<TextChange>,
}

impl FileOutcome {
    pub fn fixed(&self) -> usize {
        self.counts.total()
    }
}

/// Runs the legacy passes in order, then comments out any other quoted value.
/// Works on the text exactly as stored, so escaped JSON stays escaped.
pub fn rewrite_text(text: &str, patterns: &LayerPatterns) -> Rewrite {
    let mut counts = FixCounts::default();
    let mut current = text.to_string();

    for value in LegacyValue::REWRITE_ORDER {
        let (next, hits) = replace_counted(patterns.legacy(value), &current, |caps| {
            Some(patterns::legacy_replacement(caps, value))
        });
        *counts.legacy_mut(value) = hits;
        current = next;
    }

    let (next, hits) = replace_counted(patterns.unrecognized(), &current, patterns::commented_out);
    counts.commented_out = hits;
    current = next;

    Rewrite {
        text: current,
        counts,
    }
}

/// Replaces every match for which `make_text` returns a value, leaving the
/// others untouched. Returns the new text and how many matches were replaced.
fn replace_counted<F>(regex: &Regex, text: &str, mut make_text: F) -> (String, usize)
where
    F: FnMut(&Captures<'_>) -> Option<String>,
{
    let mut hits = 0usize;
    let replaced = regex.replace_all(text, |caps: &Captures<'_>| match make_text(caps) {
        Some(replacement) => {
            hits += 1;
            replacement
        }
        None => caps[0].to_string(),
    });
    (replaced.into_owned(), hits)
}

/// Scans the file for assignments that need manual attention, then fixes what
/// it can. The scan runs on the per-location text before any rewrite; the
/// rewrite runs on the raw file. The file is only written when at least one
/// substitution happened and `persist` is set.
pub fn update_layer_props(
    source: &mut dyn ScriptSource,
    patterns: &LayerPatterns,
    persist: bool,
) -> Result<FileOutcome> {
    if !FileKind::from_name(source.name()).qualifies() {
        return Ok(FileOutcome::default());
    }

    let contents = source.read_text()?;
    let locations = extract_locations(source.name(), &contents)?;
    let unresolved = scan_locations(&locations, patterns);

    let rewrite = rewrite_text(&contents, patterns);
    if rewrite.counts.total() == 0 {
        return Ok(FileOutcome {
            unresolved,
            ..FileOutcome::default()
        });
    }

    if persist {
        source.write_text(&rewrite.text)?;
    }
    Ok(FileOutcome {
        unresolved,
        counts: rewrite.counts,
        written: persist,
        change: Some(TextChange {
            before: contents,
            after: rewrite.text,
        }),
    })
}

/// Counts `regex` hits in a qualifying file. Returns `None` for files that are
/// neither entities nor scripts, without reading them.
pub fn count_pattern(source: &mut dyn ScriptSource, regex: &Regex) -> Result<Option<usize>> {
    if !FileKind::from_name(source.name()).qualifies() {
        return Ok(None);
    }
    let contents = source.read_text()?;
    Ok(Some(regex.find_iter(&contents).count()))
}
