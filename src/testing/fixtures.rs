//! Deterministic datasets for tests.

use crate::row::Row;
use serde_json::json;

/// `n` rows `{key: i, "seq": i}` for `i` in `0..n`, in ascending order.
///
/// # Example
///
/// ```
/// use rowflow::testing::rows_with_key;
///
/// let rows = rows_with_key(3, "id");
/// assert_eq!(rows[2].get_i64("id"), Some(2));
/// ```
#[must_use]
pub fn rows_with_key(n: usize, key: &str) -> Vec<Row> {
    (0..n)
        .map(|i| Row::from_iter([(key.to_string(), json!(i)), ("seq".to_string(), json!(i))]))
        .collect()
}

/// `n` rows `{"k": .., "seq": i}` with pseudo-random keys.
///
/// Keys repeat (there are about `n / 4` distinct values), which makes the set
/// useful for checking sort stability through `seq`. The same `seed` always
/// gives the same rows.
#[must_use]
pub fn shuffled_rows(n: usize, seed: u64) -> Vec<Row> {
    let distinct = (n / 4).max(1) as u64;
    let mut state = seed;
    (0..n)
        .map(|i| {
            // Knuth's MMIX LCG constants.
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let k = (state >> 33) % distinct;
            Row::from_iter([("k", json!(k)), ("seq", json!(i))])
        })
        .collect()
}
