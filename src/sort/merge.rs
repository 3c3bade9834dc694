//! Recombining sorted chunks.
//!
//! Both strategies take from the earlier chunk when two heads compare equal.
//! Chunks are contiguous slices of the input in order, so the merged output
//! is exactly what a stable sort of the whole input would produce.

use crate::config::MergeStrategy;
use crate::row::Row;
use crate::sort::comparator::BoundComparator;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

pub(crate) fn merge_chunks(chunks: Vec<Vec<Row>>, cmp: &BoundComparator, strategy: MergeStrategy) -> Vec<Row> {
    match strategy {
        MergeStrategy::Pairwise => pairwise(chunks, cmp),
        MergeStrategy::KWay => k_way(chunks, cmp),
    }
}

/// `((c0 + c1) + c2) + ...`: the accumulator is always the earlier data.
fn pairwise(chunks: Vec<Vec<Row>>, cmp: &BoundComparator) -> Vec<Row> {
    chunks
        .into_iter()
        .reduce(|acc, next| merge_two(acc, next, cmp))
        .unwrap_or_default()
}

fn merge_two(left: Vec<Row>, right: Vec<Row>, cmp: &BoundComparator) -> Vec<Row> {
    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut l = left.into_iter().peekable();
    let mut r = right.into_iter().peekable();
    loop {
        let take_left = match (l.peek(), r.peek()) {
            (Some(a), Some(b)) => cmp.compare(a, b) != Ordering::Greater,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_left { l.next() } else { r.next() };
        out.extend(next);
    }
    out
}

/// Head of one chunk in the k-way heap.
struct Head<'a> {
    row: Row,
    chunk: usize,
    by: &'a BoundComparator,
}

impl PartialEq for Head<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Head<'_> {}

impl PartialOrd for Head<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Head<'_> {
    // Reversed: `BinaryHeap` is a max-heap and we want the smallest row,
    // then the lowest chunk index, on top.
    fn cmp(&self, other: &Self) -> Ordering {
        self.by
            .compare(&other.row, &self.row)
            .then_with(|| other.chunk.cmp(&self.chunk))
    }
}

fn k_way(chunks: Vec<Vec<Row>>, cmp: &BoundComparator) -> Vec<Row> {
    let total = chunks.iter().map(Vec::len).sum();
    let mut iters: Vec<_> = chunks.into_iter().map(Vec::into_iter).collect();
    let mut heap = BinaryHeap::with_capacity(iters.len());
    for (chunk, it) in iters.iter_mut().enumerate() {
        if let Some(row) = it.next() {
            heap.push(Head { row, chunk, by: cmp });
        }
    }

    let mut out = Vec::with_capacity(total);
    while let Some(Head { row, chunk, .. }) = heap.pop() {
        out.push(row);
        if let Some(next) = iters[chunk].next() {
            heap.push(Head { row: next, chunk, by: cmp });
        }
    }
    out
}
