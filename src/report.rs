use std::fmt::Write as _;

use anyhow::Result;
use serde::Serialize;

use crate::pipeline::{FileFailure, FolderReport, ScanReport};
use crate::scan::MatchRecord;

pub fn render_fix(report: &FolderReport) -> String {
    let (unresolved, fixed) = report.summary();
    let mut out = String::new();
    if fixed == 0 && unresolved.is_empty() {
        out.push_str("found no layer VfxStats to fix automatically.\n");
    } else {
        let verb = if report.dry_run { "would fix" } else { "fixed" };
        let _ = writeln!(out, "{verb} {fixed} matches of layer VfxStat.");
        let counts = &report.counts;
        if fixed > 0 {
            let _ = writeln!(
                out,
                "  front={}, behind={}, back={}, commented-out={}",
                counts.front, counts.behind, counts.back, counts.commented_out
            );
        }
        push_unresolved(&mut out, unresolved);
    }
    push_failures(&mut out, &report.failures);
    let _ = writeln!(
        out,
        "files: visited={}, changed={}, failed={}",
        report.files_visited,
        report.files_changed,
        report.failures.len()
    );
    out
}

pub fn render_scan(report: &ScanReport) -> String {
    let mut out = String::new();
    let fixable = &report.fixable;
    let _ = writeln!(
        out,
        "{} matches of layer VfxStat can be fixed automatically (front={}, behind={}, back={}, commented-out={}).",
        fixable.total(),
        fixable.front,
        fixable.behind,
        fixable.back,
        fixable.commented_out
    );
    let _ = writeln!(out, "{} already use a VfxLayer constant.", report.canonical);
    push_unresolved(&mut out, &report.unresolved);
    push_failures(&mut out, &report.failures);
    let _ = writeln!(out, "files scanned: {}", report.files_scanned);
    out
}

pub fn render_json<T: Serialize>(report: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

fn push_unresolved(out: &mut String, unresolved: &[MatchRecord]) {
    if unresolved.is_empty() {
        return;
    }
    out.push_str("Wasn't able to change these matches:\n");
    for record in unresolved {
        let _ = writeln!(out, "  {}\n    {}", record.location, record.line.trim());
    }
}

fn push_failures(out: &mut String, failures: &[FileFailure]) {
    if failures.is_empty() {
        return;
    }
    let _ = writeln!(out, "failed to process {} file(s):", failures.len());
    for failure in failures {
        let _ = writeln!(out, "  {}: {}", failure.path, failure.error);
    }
}
