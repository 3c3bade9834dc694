use anyhow::Result;
use rowflow::sort::WORKER_THREAD_PREFIX;
use rowflow::testing::*;
use rowflow::*;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::Duration;

fn in_worker() -> bool {
    std::thread::current()
        .name()
        .is_some_and(|n| n.starts_with(WORKER_THREAD_PREFIX))
}

fn by_k(a: &Row, b: &Row) -> Ordering {
    a.get_i64("k").cmp(&b.get_i64("k"))
}

fn parallel(workers: usize) -> SortOptions {
    SortOptions::default()
        .with_worker_threshold(10_000)
        .with_max_workers(workers)
        .with_available_units(workers)
}

fn seqs(rows: &[Row]) -> Vec<i64> {
    rows.iter().filter_map(|r| r.get_i64("seq")).collect()
}

#[test]
fn small_inputs_stay_in_the_calling_thread() -> Result<()> {
    let rows = vec![row!({"a": 3}), row!({"a": 1}), row!({"a": 2})];
    let (sorted, report) = sort_with_report(rows, &Comparator::asc("a"), &parallel(4))?;
    assert_eq!(report.path, SortPath::Sequential);
    assert_rows_equal(&sorted, &[row!({"a": 1}), row!({"a": 2}), row!({"a": 3})]);
    Ok(())
}

#[test]
fn empty_and_single_inputs() -> Result<()> {
    assert!(sort(vec![], &Comparator::asc("a"), &parallel(4))?.is_empty());
    let one = sort(vec![row!({"a": 1})], &Comparator::asc("a"), &parallel(4))?;
    assert_eq!(one, vec![row!({"a": 1})]);
    Ok(())
}

#[test]
fn one_unit_means_sequential() -> Result<()> {
    let opts = SortOptions::default().with_worker_threshold(0).with_available_units(1);
    let (_, report) = sort_with_report(shuffled_rows(50, 1), &Comparator::asc("k"), &opts)?;
    assert_eq!(report.path, SortPath::Sequential);
    Ok(())
}

#[test]
fn parallel_sort_matches_the_sequential_sort_exactly() -> Result<()> {
    let rows = shuffled_rows(100_000, 42);
    let cmp = Comparator::asc("k");

    let (par, report) = sort_with_report(rows.clone(), &cmp, &parallel(4))?;
    assert_eq!(report.path, SortPath::Parallel { workers: 4 });

    let seq = sort(rows.clone(), &cmp, &SortOptions::sequential())?;
    assert_eq!(seqs(&par), seqs(&seq));
    assert_sorted_by(&par, &cmp);
    assert_permutation_of(&par, &rows);
    Ok(())
}

#[test]
fn equal_keys_keep_their_input_order() -> Result<()> {
    let sorted = sort(shuffled_rows(40_000, 9), &Comparator::asc("k"), &parallel(3))?;
    for pair in sorted.windows(2) {
        if pair[0].get_i64("k") == pair[1].get_i64("k") {
            assert!(pair[0].get_i64("seq") < pair[1].get_i64("seq"));
        }
    }
    Ok(())
}

#[test]
fn k_way_merge_equals_pairwise_merge() -> Result<()> {
    let rows = shuffled_rows(30_000, 5);
    let cmp = Comparator::desc("k");
    let pairwise = sort(rows.clone(), &cmp, &parallel(6))?;
    let k_way = sort(rows, &cmp, &parallel(6).with_merge(MergeStrategy::KWay))?;
    assert_eq!(seqs(&pairwise), seqs(&k_way));
    assert_sorted_by(&k_way, &cmp);
    Ok(())
}

#[test]
fn descending_and_mixed_types() -> Result<()> {
    let rows = vec![
        row!({"v": "b"}),
        row!({"v": 2}),
        row!({}),
        row!({"v": true}),
        row!({"v": 1.5}),
        row!({"v": "a"}),
    ];
    let asc = sort(rows.clone(), &Comparator::asc("v"), &SortOptions::sequential())?;
    let order: Vec<Option<&Value>> = asc.iter().map(|r| r.get("v")).collect();
    assert_eq!(
        order,
        vec![
            None,
            Some(&Value::from(true)),
            Some(&Value::from(1.5)),
            Some(&Value::from(2)),
            Some(&Value::from("a")),
            Some(&Value::from("b")),
        ]
    );

    let desc = sort(rows, &Comparator::desc("v"), &SortOptions::sequential())?;
    assert_eq!(desc.first(), asc.last());
    Ok(())
}

#[test]
fn integers_and_floats_past_2_pow_53_sort_consistently() -> Result<()> {
    let base = 1_u64 << 53;
    let n = 4_000_u64;
    let mut rows: Vec<Row> = (0..n)
        .map(|i| {
            let k = (i * 7_919) % n;
            if k % 2 == 0 {
                row!({"v": base + k, "seq": i})
            } else {
                row!({"v": (base + k) as f64, "seq": i})
            }
        })
        .collect();
    rows.push(row!({"v": base + 1, "seq": n}));
    rows.push(row!({"v": base as f64, "seq": n + 1}));

    let cmp = Comparator::asc("v");
    for opts in [SortOptions::sequential(), parallel(4).with_worker_threshold(1_000)] {
        let sorted = sort(rows.clone(), &cmp, &opts)?;
        assert_sorted_by(&sorted, &cmp);
        assert_permutation_of(&sorted, &rows);
        let ints: Vec<u64> = sorted.iter().filter_map(|r| r.get("v").and_then(Value::as_u64)).collect();
        assert!(ints.windows(2).all(|w| w[0] <= w[1]), "integers out of order");
    }
    Ok(())
}

#[test]
fn already_sorted_input_below_and_above_the_threshold() -> Result<()> {
    let cmp = Comparator::asc("k");
    for (n, path) in [(500, SortPath::Sequential), (20_000, SortPath::Parallel { workers: 4 })] {
        let rows = rows_with_key(n, "k");
        let (sorted, report) = sort_with_report(rows.clone(), &cmp, &parallel(4))?;
        assert_eq!(report.path, path);
        assert_sorted_by(&sorted, &cmp);
        assert_permutation_of(&sorted, &rows);
        assert_eq!(seqs(&sorted), seqs(&rows));
    }
    Ok(())
}

#[test]
fn reverse_sorted_input_below_and_above_the_threshold() -> Result<()> {
    let cmp = Comparator::asc("k");
    for (n, path) in [(500, SortPath::Sequential), (20_000, SortPath::Parallel { workers: 4 })] {
        let rows: Vec<Row> = rows_with_key(n, "k").into_iter().rev().collect();
        let (sorted, report) = sort_with_report(rows.clone(), &cmp, &parallel(4))?;
        assert_eq!(report.path, path);
        assert_sorted_by(&sorted, &cmp);
        assert_permutation_of(&sorted, &rows);

        let k_way = sort(rows, &cmp, &parallel(4).with_merge(MergeStrategy::KWay))?;
        assert_eq!(seqs(&k_way), seqs(&sorted));

        let back = sort(sorted.clone(), &Comparator::desc("k"), &parallel(4))?;
        assert_eq!(back.first().and_then(|r| r.get_i64("k")), Some(n as i64 - 1));
        assert_sorted_by(&back, &Comparator::desc("k"));
    }
    Ok(())
}

#[test]
fn custom_rules_are_resolved_by_name() -> Result<()> {
    fn by_seq_parity(a: &Row, b: &Row) -> Ordering {
        let parity = |r: &Row| r.get_i64("seq").map(|s| s % 2);
        parity(a).cmp(&parity(b))
    }
    register_rule("tests::by_seq_parity", by_seq_parity);

    let rows = shuffled_rows(20_000, 3);
    let (sorted, report) = sort_with_report(rows, &Comparator::custom("tests::by_seq_parity"), &parallel(4))?;
    assert_eq!(report.path, SortPath::Parallel { workers: 4 });
    assert!(sorted[..10_000].iter().all(|r| r.get_i64("seq").is_some_and(|s| s % 2 == 0)));
    assert!(sorted[10_000..].iter().all(|r| r.get_i64("seq").is_some_and(|s| s % 2 == 1)));
    Ok(())
}

#[test]
fn worker_panic_falls_back_to_a_correct_sort() -> Result<()> {
    fn panics_in_workers(a: &Row, b: &Row) -> Ordering {
        if in_worker() {
            panic!("worker comparator exploded");
        }
        by_k(a, b)
    }
    register_rule("tests::panics_in_workers", panics_in_workers);

    let rows = shuffled_rows(20_000, 8);
    let cmp = Comparator::custom("tests::panics_in_workers");
    let (sorted, report) = sort_with_report(rows.clone(), &cmp, &parallel(4))?;

    assert!(report.fell_back(), "{report:?}");
    let SortPath::Fallback { workers, reason } = &report.path else {
        unreachable!();
    };
    assert_eq!(*workers, 4);
    assert!(reason.contains("exploded"), "{reason}");

    register_rule("tests::by_k", by_k);
    let expected = sort(rows, &Comparator::custom("tests::by_k"), &SortOptions::sequential())?;
    assert_eq!(seqs(&sorted), seqs(&expected));
    Ok(())
}

static SLEPT: AtomicBool = AtomicBool::new(false);

#[test]
fn silent_worker_times_out_into_fallback() -> Result<()> {
    fn sleeps_once_in_a_worker(a: &Row, b: &Row) -> Ordering {
        if in_worker() && !SLEPT.swap(true, AtomicOrdering::SeqCst) {
            std::thread::sleep(Duration::from_secs(2));
        }
        by_k(a, b)
    }
    register_rule("tests::sleeps_once", sleeps_once_in_a_worker);

    let rows = shuffled_rows(20_000, 13);
    let opts = parallel(4).with_worker_timeout(Duration::from_millis(100));
    let (sorted, report) = sort_with_report(rows.clone(), &Comparator::custom("tests::sleeps_once"), &opts)?;

    assert!(
        matches!(&report.path, SortPath::Fallback { reason, .. } if reason.contains("within")),
        "{report:?}"
    );
    assert_sorted_by(&sorted, &Comparator::asc("k"));
    assert_permutation_of(&sorted, &rows);
    Ok(())
}

#[test]
fn unknown_rule_surfaces_from_the_fallback() {
    let cmp = Comparator::custom("tests::never_registered");
    assert_eq!(
        sort(shuffled_rows(10, 1), &cmp, &SortOptions::default()),
        Err(SortError::UnknownRule("tests::never_registered".into()))
    );
    assert_eq!(
        sort(shuffled_rows(20_000, 1), &cmp, &parallel(4)),
        Err(SortError::UnknownRule("tests::never_registered".into()))
    );
}

#[test]
fn comparator_panic_in_the_caller_is_an_error() {
    fn always_panics(_: &Row, _: &Row) -> Ordering {
        panic!("no order here");
    }
    register_rule("tests::always_panics", always_panics);
    let err = sort(shuffled_rows(10, 2), &Comparator::custom("tests::always_panics"), &SortOptions::default());
    assert!(matches!(err, Err(SortError::ComparatorPanicked(ref m)) if m.contains("no order here")));
}

#[test]
fn unregistered_rules_stop_resolving() {
    fn noop(_: &Row, _: &Row) -> Ordering {
        Ordering::Equal
    }
    register_rule("tests::temporary", noop);
    assert!(Comparator::custom("tests::temporary").bind().is_ok());
    assert!(unregister_rule("tests::temporary").is_some());
    assert!(matches!(
        Comparator::custom("tests::temporary").bind(),
        Err(SortError::UnknownRule(_))
    ));
}

#[test]
fn invalid_options_are_rejected() {
    let opts = SortOptions::default().with_max_workers(0);
    assert!(matches!(
        sort(vec![row!({"a": 1})], &Comparator::asc("a"), &opts),
        Err(SortError::Config(_))
    ));
}
