use std::cmp::Ordering;

/// Compare dotted tool versions (`0.9.10` > `0.9.2`).
///
/// Segments are compared numerically by their leading digits, then by the
/// remaining text (`1.0rc1` < `1.0rc2`). A version with extra segments is newer
/// (`1.0.1` > `1.0`). Non-numeric versions still order totally.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(x), Some(y)) => {
                let ord = compare_segment(x, y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn compare_segment(a: &str, b: &str) -> Ordering {
    let (a_num, a_rest) = split_numeric(a);
    let (b_num, b_rest) = split_numeric(b);
    match (a_num, b_num) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a_rest.cmp(b_rest)),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

fn split_numeric(segment: &str) -> (Option<u64>, &str) {
    let end = segment
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(segment.len());
    let (digits, rest) = segment.split_at(end);
    (digits.parse().ok(), rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_segments_compare_as_numbers() {
        assert_eq!(compare_versions("0.9.10", "0.9.2"), Ordering::Greater);
        assert_eq!(compare_versions("1.0", "1.0.1"), Ordering::Less);
        assert_eq!(compare_versions("0.7.0", "0.7.0"), Ordering::Equal);
    }

    #[test]
    fn suffixes_and_words_still_order() {
        assert_eq!(compare_versions("1.0rc1", "1.0rc2"), Ordering::Less);
        assert_eq!(compare_versions("1.0", "latest"), Ordering::Greater);
        assert_eq!(compare_versions("nightly", "latest"), Ordering::Greater);
    }
}
