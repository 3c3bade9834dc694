use anyhow::Result;
use rowflow::io::compression::{auto_detect_reader, auto_detect_writer, Codec};
use rowflow::*;
use std::fs;
use std::io::{Read, Write};

fn sample() -> Vec<Row> {
    (0..200).map(|i| row!({"id": i.to_string(), "label": format!("row-{i}")})).collect()
}

#[test]
fn format_is_inferred_through_compression_extensions() -> Result<()> {
    assert_eq!(FormatOptions::from_path("x.csv.gz")?, FormatOptions::csv());
    assert_eq!(FormatOptions::from_path("x.JSONL.zst")?, FormatOptions::jsonl());
    assert_eq!(FormatOptions::from_path("x.tsv")?, FormatOptions::tsv());
    assert!(FormatOptions::from_path("x.parquet").is_err());
    Ok(())
}

#[test]
fn uncompressed_paths_pass_through() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("plain.txt");
    let mut w = auto_detect_writer(fs::File::create(&path)?, &path)?;
    w.write_all(b"a,b\n")?;
    w.finish()?;
    assert_eq!(fs::read(&path)?, b"a,b\n");

    let mut text = String::new();
    auto_detect_reader(fs::File::open(&path)?, &path)?.read_to_string(&mut text)?;
    assert_eq!(text, "a,b\n");
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn gzip_sink_round_trips_through_a_file_source() -> Result<()> {
    assert_eq!(Codec::from_path("out.csv.GZ"), Some(Codec::Gzip));

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("out.csv.gz");
    Pipeline::from_rows(sample())
        .prepare_to_sink(path.clone(), WriteOptions::new(FormatOptions::csv()))
        .run()?;
    assert!(fs::read(&path)?.starts_with(&[0x1f, 0x8b]));

    let back = Pipeline::open_path(&path)?.collect()?;
    assert_eq!(back, sample());
    Ok(())
}

#[cfg(feature = "compression-zstd")]
#[test]
fn zstd_sink_round_trips_through_a_file_source() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("events.jsonl.zst");
    let out = Pipeline::from_rows(sample())
        .prepare_to_sink(path.clone(), WriteOptions::new(FormatOptions::jsonl()))
        .run()?;
    assert_eq!(out.row_count(), 200);

    let back = Pipeline::open_path(&path)?.collect()?;
    assert_eq!(back, sample());
    Ok(())
}

#[cfg(feature = "compression-zstd")]
#[test]
fn magic_bytes_identify_a_misnamed_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let packed = dir.path().join("rows.jsonl.zst");
    Pipeline::from_rows(sample())
        .prepare_to_sink(packed.clone(), WriteOptions::new(FormatOptions::jsonl()))
        .run()?;
    let misnamed = dir.path().join("rows.jsonl");
    fs::rename(&packed, &misnamed)?;

    let back = open_source(misnamed.as_path(), FormatOptions::jsonl()).collect()?;
    assert_eq!(back.len(), 200);
    Ok(())
}
