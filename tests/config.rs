use rowflow::*;
use std::collections::HashMap;
use std::time::Duration;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn adapter_defaults_are_valid() {
    let cfg = AdapterConfig::default();
    assert_eq!(cfg.capacity, 1024);
    assert!(cfg.validate().is_ok());
}

#[test]
fn watermarks_in_rows() {
    let cfg = AdapterConfig::with_capacity(10);
    assert_eq!(cfg.high_water_rows(), 8);
    assert_eq!(cfg.low_water_rows(), 5);

    let tiny = AdapterConfig::with_capacity(1);
    assert_eq!(tiny.high_water_rows(), 1);
    assert_eq!(tiny.low_water_rows(), 0);
}

#[test]
fn adapter_validation() {
    assert!(matches!(
        AdapterConfig::with_capacity(0).validate(),
        Err(PipelineError::Config(_))
    ));
    assert!(AdapterConfig::default().with_watermarks(0.9, 0.8).validate().is_err());
    assert!(AdapterConfig::default().with_watermarks(0.2, 1.5).validate().is_err());
    assert!(AdapterConfig::default().with_watermarks(0.25, 1.0).validate().is_ok());
}

#[test]
fn adapter_overrides_from_lookup() {
    let cfg = AdapterConfig::from_lookup(env(&[
        ("ROWFLOW_ADAPTER_CAPACITY", " 64 "),
        ("ROWFLOW_ADAPTER_LOW_WATER", "0.25"),
        ("ROWFLOW_ADAPTER_HIGH_WATER", "lots"),
    ]));
    assert_eq!(cfg.capacity, 64);
    assert_eq!(cfg.low_water, 0.25);
    assert_eq!(cfg.high_water, AdapterConfig::default().high_water);
}

#[test]
fn sort_options_validation_and_presets() {
    let opts = SortOptions::default();
    assert_eq!(opts.worker_threshold, 10_000);
    assert!(opts.max_workers >= 1);
    assert!(opts.validate().is_ok());

    assert!(matches!(
        SortOptions::default().with_available_units(0).validate(),
        Err(SortError::Config(_))
    ));
    assert_eq!(SortOptions::sequential().worker_threshold, usize::MAX);
}

#[test]
fn sort_overrides_from_lookup() {
    let opts = SortOptions::from_lookup(env(&[
        ("ROWFLOW_SORT_WORKER_THRESHOLD", "500"),
        ("ROWFLOW_SORT_MAX_WORKERS", "-3"),
    ]));
    assert_eq!(opts.worker_threshold, 500);
    assert_eq!(opts.max_workers, SortOptions::default().max_workers);
}

#[test]
fn options_round_trip_through_serde() -> anyhow::Result<()> {
    let opts = SortOptions::default()
        .with_merge(MergeStrategy::KWay)
        .with_worker_timeout(Duration::from_millis(250));
    let json = serde_json::to_string(&opts)?;
    assert!(json.contains("\"k_way\""), "{json}");
    assert_eq!(serde_json::from_str::<SortOptions>(&json)?, opts);

    let adapter = AdapterConfig::with_capacity(7);
    let back: AdapterConfig = serde_json::from_str(&serde_json::to_string(&adapter)?)?;
    assert_eq!(back, adapter);
    Ok(())
}
