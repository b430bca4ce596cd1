use std::cmp::Ordering;

/// Compare two version strings.
///
/// A leading `v` is ignored and dot-separated segments are compared
/// numerically; parsing stops at the first non-numeric segment, so
/// `1.2.3-beta` compares as `1.2`. Missing segments count as zero.
///
/// Strings that are numerically equal but not identical are ordered by their
/// raw text, which makes this a total order: `Equal` means the two strings are
/// the same.
#[must_use]
pub fn compare(a: &str, b: &str) -> Ordering {
    let left = numeric_segments(a);
    let right = numeric_segments(b);
    let len = left.len().max(right.len());

    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => {}
            other => return other,
        }
    }

    a.cmp(b)
}

/// `true` when `remote` should replace `current`.
#[must_use]
pub fn is_newer(remote: &str, current: &str) -> bool {
    compare(current, remote) == Ordering::Less
}

fn numeric_segments(version: &str) -> Vec<u64> {
    let trimmed = version.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);

    let segments: Vec<u64> = trimmed
        .split('.')
        .map_while(|segment| segment.trim().parse::<u64>().ok())
        .collect();

    if segments.is_empty() {
        vec![0]
    } else {
        segments
    }
}
