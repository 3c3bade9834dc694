use crate::row::Row;
use std::ops::Range;

/// Split `0..len` into `n` contiguous ranges whose sizes differ by at most one.
/// Earlier ranges take the remainder.
pub(crate) fn split_ranges(len: usize, n: usize) -> Vec<Range<usize>> {
    let n = n.clamp(1, len.max(1));
    let base = len / n;
    let extra = len % n;
    let mut start = 0;
    (0..n)
        .map(|i| {
            let size = base + usize::from(i < extra);
            let r = start..start + size;
            start += size;
            r
        })
        .collect()
}

/// Copy each range of `rows` into its own vector.
pub(crate) fn clone_chunks(rows: &[Row], n: usize) -> Vec<Vec<Row>> {
    split_ranges(rows.len(), n)
        .into_iter()
        .map(|r| rows[r].to_vec())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_balanced_and_cover_everything() {
        let ranges = split_ranges(10, 4);
        let sizes: Vec<usize> = ranges.iter().map(ExactSizeIterator::len).collect();
        assert_eq!(sizes, vec![3, 3, 2, 2]);
        assert_eq!(ranges.first().map(|r| r.start), Some(0));
        assert_eq!(ranges.last().map(|r| r.end), Some(10));
        for w in ranges.windows(2) {
            assert_eq!(w[0].end, w[1].start);
        }
    }

    #[test]
    fn never_more_ranges_than_items() {
        assert_eq!(split_ranges(3, 8).len(), 3);
        assert_eq!(split_ranges(0, 4), vec![0..0]);
    }
}
