//! Line-based unified diff used for `change_vs_previous`.

const CONTEXT_LINES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Equal,
    Delete,
    Insert,
}

/// Unified diff of `previous` against `current`. Returns `None` when there is
/// no previous text, an empty string when the texts are identical.
pub fn change_vs_previous(previous: Option<&str>, current: &str) -> Option<String> {
    let previous = previous?;
    if previous == current {
        return Some(String::new());
    }

    let old: Vec<&str> = previous.lines().collect();
    let new: Vec<&str> = current.lines().collect();
    let ops = diff_ops(&old, &new);

    let mut output = vec!["--- previous".to_string(), "+++ current".to_string()];
    for hunk in group_hunks(&ops) {
        output.push(hunk_header(&ops[hunk.clone()]));
        for (op, old_idx, new_idx) in &ops[hunk] {
            match op {
                Op::Equal => output.push(format!(" {}", old[*old_idx])),
                Op::Delete => output.push(format!("-{}", old[*old_idx])),
                Op::Insert => output.push(format!("+{}", new[*new_idx])),
            }
        }
    }
    Some(output.join("\n"))
}

/// Per-line opcodes from an LCS alignment. Each entry carries the indices it
/// refers to (only one side is meaningful for deletes/inserts).
fn diff_ops(old: &[&str], new: &[&str]) -> Vec<(Op, usize, usize)> {
    let n = old.len();
    let m = new.len();
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old[i] == new[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut ops = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);
    while i < n && j < m {
        if old[i] == new[j] {
            ops.push((Op::Equal, i, j));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            ops.push((Op::Delete, i, j));
            i += 1;
        } else {
            ops.push((Op::Insert, i, j));
            j += 1;
        }
    }
    while i < n {
        ops.push((Op::Delete, i, j));
        i += 1;
    }
    while j < m {
        ops.push((Op::Insert, i, j));
        j += 1;
    }
    ops
}

/// Ranges of `ops` forming hunks: changed runs padded with up to three lines
/// of context, merged when their context overlaps.
fn group_hunks(ops: &[(Op, usize, usize)]) -> Vec<std::ops::Range<usize>> {
    let changed: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter(|(_, (op, _, _))| *op != Op::Equal)
        .map(|(idx, _)| idx)
        .collect();
    if changed.is_empty() {
        return Vec::new();
    }

    let mut hunks: Vec<std::ops::Range<usize>> = Vec::new();
    for &idx in &changed {
        let start = idx.saturating_sub(CONTEXT_LINES);
        let end = (idx + CONTEXT_LINES + 1).min(ops.len());
        match hunks.last_mut() {
            Some(last) if start <= last.end => last.end = end,
            _ => hunks.push(start..end),
        }
    }
    hunks
}

fn hunk_header(ops: &[(Op, usize, usize)]) -> String {
    let old_lines = ops.iter().filter(|(op, _, _)| *op != Op::Insert).count();
    let new_lines = ops.iter().filter(|(op, _, _)| *op != Op::Delete).count();
    let old_start = ops
        .iter()
        .find(|(op, _, _)| *op != Op::Insert)
        .map(|(_, i, _)| i + 1)
        .unwrap_or(0);
    let new_start = ops
        .iter()
        .find(|(op, _, _)| *op != Op::Delete)
        .map(|(_, _, j)| j + 1)
        .unwrap_or(0);
    format!(
        "@@ -{} +{} @@",
        format_range(old_start, old_lines),
        format_range(new_start, new_lines)
    )
}

fn format_range(start: usize, length: usize) -> String {
    if length == 1 {
        format!("{start}")
    } else {
        format!("{start},{length}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_statement_has_no_diff() {
        assert_eq!(change_vs_previous(None, "anything"), None);
    }

    #[test]
    fn identical_statements_yield_empty_string() {
        assert_eq!(change_vs_previous(Some("a\nb"), "a\nb"), Some(String::new()));
    }

    #[test]
    fn single_line_change_is_marked() {
        let diff = change_vs_previous(
            Some("The Committee decided to hold rates.\nInflation remains elevated."),
            "The Committee decided to raise rates.\nInflation remains elevated.",
        )
        .unwrap();
        assert!(diff.starts_with("--- previous\n+++ current"));
        assert!(diff.contains("-The Committee decided to hold rates."));
        assert!(diff.contains("+The Committee decided to raise rates."));
        assert!(diff.contains(" Inflation remains elevated."));
    }

    #[test]
    fn distant_changes_split_into_hunks() {
        let previous: Vec<String> = (0..30).map(|i| format!("line {i}")).collect();
        let mut current = previous.clone();
        current[2] = "changed early".to_string();
        current[25] = "changed late".to_string();

        let old_text = previous.join("\n");
        let new_text = current.join("\n");
        let diff = change_vs_previous(Some(old_text.as_str()), &new_text).unwrap();
        let hunk_count = diff.lines().filter(|l| l.starts_with("@@")).count();
        assert_eq!(hunk_count, 2);
        assert!(diff.contains("-line 2"));
        assert!(diff.contains("+changed early"));
        assert!(diff.contains("+changed late"));
    }

    #[test]
    fn pure_additions_are_inserts() {
        let diff = change_vs_previous(Some("a"), "a\nb\nc").unwrap();
        assert!(diff.contains("+b"));
        assert!(diff.contains("+c"));
        assert!(!diff.contains("-a"));
    }
}
