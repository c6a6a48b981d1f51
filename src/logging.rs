use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::files::STATE_DIR;
use crate::rewrite::FixCounts;

const LOG_FILE: &str = "change_log.jsonl";
const MAX_ENTRIES: usize = 500;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeLogEntry {
    pub timestamp: String,
    pub path: String,
    pub fixed: usize,
    pub counts: FixCounts,
    pub unresolved: usize,
}

pub fn log_path(root: &Path) -> PathBuf {
    root.join(STATE_DIR).join(LOG_FILE)
}

/// Appends one line per written file to the project's change log.
pub fn record_change(root: &Path, path: &Path, counts: FixCounts, unresolved: usize) -> Result<()> {
    let log_path = ensure_log_file(root)?;
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".into());
    let relative = path.strip_prefix(root).unwrap_or(path);
    let entry = ChangeLogEntry {
        timestamp,
        path: relative.to_string_lossy().replace('\\', "/"),
        fixed: counts.total(),
        counts,
        unresolved,
    };
    let json = serde_json::to_string(&entry)?;
    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(&log_path)
        .with_context(|| format!("opening {}", log_path.display()))?;
    writeln!(file, "{json}")?;
    truncate_log(&log_path)?;
    Ok(())
}

/// Returns the last `tail` entries, oldest first.
pub fn read_recent(root: &Path, tail: usize) -> Result<Vec<ChangeLogEntry>> {
    let path = log_path(root);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = fs::File::open(&path).with_context(|| format!("reading {}", path.display()))?;
    let mut entries = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: ChangeLogEntry = serde_json::from_str(&line)
            .with_context(|| format!("parsing change log entry in {}", path.display()))?;
        entries.push(entry);
    }
    let skip = entries.len().saturating_sub(tail);
    Ok(entries.split_off(skip))
}

fn ensure_log_file(root: &Path) -> Result<PathBuf> {
    let dir = root.join(STATE_DIR);
    if !dir.exists() {
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    Ok(dir.join(LOG_FILE))
}

fn truncate_log(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .read(true)
        .open(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let reader = BufReader::new(file);
    let lines: Vec<_> = reader.lines().collect::<Result<_, _>>()?;
    if lines.len() <= MAX_ENTRIES {
        return Ok(());
    }
    let keep = &lines[lines.len() - MAX_ENTRIES..];
    fs::write(path, keep.join("\n") + "\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn counts(front: usize) -> FixCounts {
        FixCounts {
            front,
            ..FixCounts::default()
        }
    }

    #[test]
    fn entries_round_trip_relative_to_root() {
        let temp = tempdir().expect("temp dir");
        let file = temp.path().join("scripts").join("a.hx");
        record_change(temp.path(), &file, counts(2), 1).expect("record");

        let entries = read_recent(temp.path(), 10).expect("read");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "scripts/a.hx");
        assert_eq!(entries[0].fixed, 2);
        assert_eq!(entries[0].unresolved, 1);
    }

    #[test]
    fn tail_keeps_most_recent() {
        let temp = tempdir().expect("temp dir");
        for idx in 0..3 {
            let file = temp.path().join(format!("{idx}.hx"));
            record_change(temp.path(), &file, counts(idx), 0).expect("record");
        }
        let entries = read_recent(temp.path(), 2).expect("read");
        let paths: Vec<_> = entries.iter().map(|entry| entry.path.as_str()).collect();
        assert_eq!(paths, vec!["1.hx", "2.hx"]);
    }

    #[test]
    fn log_is_capped() {
        let temp = tempdir().expect("temp dir");
        let file = temp.path().join("a.hx");
        for _ in 0..MAX_ENTRIES + 5 {
            record_change(temp.path(), &file, counts(1), 0).expect("record");
        }
        let entries = read_recent(temp.path(), usize::MAX).expect("read");
        assert_eq!(entries.len(), MAX_ENTRIES);
    }

    #[test]
    fn missing_log_reads_as_empty() {
        let temp = tempdir().expect("temp dir");
        assert!(read_recent(temp.path(), 5).expect("read").is_empty());
    }
}
