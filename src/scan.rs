use serde::Serialize;

use crate::extract::Location;
use crate::patterns::LayerPatterns;

/// A `layer:` assignment that needs a human to look at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    pub location: String,
    pub line: String,
}

impl MatchRecord {
    pub fn new(location: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            line: line.into(),
        }
    }
}

pub fn scan_locations(locations: &[Location], patterns: &LayerPatterns) -> Vec<MatchRecord> {
    let mut records = Vec::new();
    for location in locations {
        scan_text(&location.label, &location.text, patterns, &mut records);
    }
    records
}

/// Reports at most one record per line: the first assignment on it that is
/// neither fixable nor already canonical.
pub fn scan_text(label: &str, text: &str, patterns: &LayerPatterns, acc: &mut Vec<MatchRecord>) {
    for (idx, raw_line) in text.split('\n').enumerate() {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        let unresolved = patterns
            .bare()
            .find_iter(line)
            .any(|found| !patterns.covers_at(line, found.start()));
        if unresolved {
            acc.push(MatchRecord::new(format!("{label} line {}", idx + 1), line));
        }
    }
}
