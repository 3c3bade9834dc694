//! Assertion functions for pipeline and sort output.

use crate::row::Row;
use crate::sort::Comparator;
use std::cmp::Ordering;

/// Assert that two row lists are equal in order and content.
///
/// # Panics
///
/// Panics if the lists differ in length or at any index.
///
/// # Example
///
/// ```
/// use rowflow::row;
/// use rowflow::testing::assert_rows_equal;
///
/// assert_rows_equal(&[row!({"a": 1})], &[row!({"a": 1})]);
/// ```
pub fn assert_rows_equal(actual: &[Row], expected: &[Row]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Row count mismatch:\n  Expected length: {}\n  Actual length: {}\n  Expected: {expected:?}\n  Actual: {actual:?}",
        expected.len(),
        actual.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert_eq!(a, e, "Row mismatch at index {i}:\n  Expected: {e:?}\n  Actual: {a:?}");
    }
}

/// Assert that `rows` is ordered by `comparator` (non-decreasing).
///
/// # Panics
///
/// Panics at the first adjacent pair out of order, or if the comparator names
/// an unregistered rule.
pub fn assert_sorted_by(rows: &[Row], comparator: &Comparator) {
    let bound = match comparator.bind() {
        Ok(b) => b,
        Err(e) => panic!("cannot bind comparator {comparator:?}: {e}"),
    };
    for (i, pair) in rows.windows(2).enumerate() {
        assert!(
            bound.compare(&pair[0], &pair[1]) != Ordering::Greater,
            "Rows out of order at index {i}..{}:\n  {:?}\n  {:?}",
            i + 1,
            pair[0],
            pair[1]
        );
    }
}

/// Assert that `actual` holds exactly the rows of `expected`, in any order.
///
/// Duplicates count: a row appearing twice in `expected` must appear twice
/// in `actual`.
///
/// # Panics
///
/// Panics if the multisets differ.
pub fn assert_permutation_of(actual: &[Row], expected: &[Row]) {
    let canon = |rows: &[Row]| {
        let mut v: Vec<String> = rows.iter().map(|r| serde_json::to_string(r).unwrap_or_default()).collect();
        v.sort();
        v
    };
    let (a, e) = (canon(actual), canon(expected));
    if a != e {
        let missing: Vec<_> = e.iter().filter(|r| !a.contains(r)).take(5).collect();
        let extra: Vec<_> = a.iter().filter(|r| !e.contains(r)).take(5).collect();
        panic!(
            "Not a permutation:\n  Expected {} rows, got {}\n  Missing (first 5): {missing:?}\n  Extra (first 5): {extra:?}",
            e.len(),
            a.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;

    #[test]
    #[should_panic(expected = "out of order")]
    fn detects_disorder() {
        assert_sorted_by(&[row!({"a": 2}), row!({"a": 1})], &Comparator::asc("a"));
    }

    #[test]
    #[should_panic(expected = "Not a permutation")]
    fn duplicates_matter() {
        assert_permutation_of(&[row!({"a": 1}), row!({"a": 1})], &[row!({"a": 1}), row!({"a": 2})]);
    }
}
