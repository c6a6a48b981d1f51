use similar::{ChangeTag, TextDiff};

/// Prints a grouped line diff with `context` unchanged lines around each hunk.
pub fn print_diff(old: &str, new: &str, context: usize) {
    let diff = TextDiff::configure()
        .algorithm(similar::Algorithm::Myers)
        .diff_lines(old, new);

    for (idx, group) in diff.grouped_ops(context).iter().enumerate() {
        if idx > 0 {
            println!("...");
        }
        for op in group {
            for change in diff.iter_changes(op) {
                match change.tag() {
                    ChangeTag::Delete => print!("- "),
                    ChangeTag::Insert => print!("+ "),
                    ChangeTag::Equal => print!("  "),
                }
                print!("{change}");
                if change.missing_newline() {
                    println!();
                }
            }
        }
    }
}

/// Short "N lines changed" summary used in status lines.
pub fn summarize_lines(old: &str, new: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let changed = diff
        .iter_all_changes()
        .filter(|change| change.tag() == ChangeTag::Insert)
        .count();
    match changed {
        1 => "1 line changed".to_string(),
        n => format!("{n} lines changed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_inserted_lines() {
        let old = "a\nlayer: \"front\"\nb\n";
        let new = "a\nlayer: VfxLayer.CHARACTERS_FRONT\nb\n";
        assert_eq!(summarize_lines(old, new), "1 line changed");
        assert_eq!(summarize_lines(old, old), "0 lines changed");
    }
}
