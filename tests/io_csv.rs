use anyhow::Result;
use rowflow::io::csv::CsvEncoder;
use rowflow::io::RowEncoder;
use rowflow::testing::assert_rows_equal;
use rowflow::*;
use std::fs;

#[test]
fn decode_with_header() -> Result<()> {
    let rows = decode("id,name\n1,ada\n2,bob\n", &FormatOptions::csv())?;
    assert_rows_equal(
        &rows,
        &[row!({"id": "1", "name": "ada"}), row!({"id": "2", "name": "bob"})],
    );
    Ok(())
}

#[test]
fn decode_with_type_inference() -> Result<()> {
    let opts = FormatOptions::csv().with_type_inference(true);
    let rows = decode("n,f,b,s,e\n7,2.5,true,x,\n", &opts)?;
    assert_eq!(rows, vec![row!({"n": 7, "f": 2.5, "b": true, "s": "x", "e": null})]);
    Ok(())
}

#[test]
fn headerless_input_gets_numbered_or_named_columns() -> Result<()> {
    let numbered = decode("1,2\n3,4\n", &FormatOptions::csv().with_headers(false))?;
    assert_eq!(numbered[1], row!({"column_1": "3", "column_2": "4"}));

    let named = decode(
        "1,2\n",
        &FormatOptions::csv().with_headers(false).with_columns(["x", "y"]),
    )?;
    assert_eq!(named, vec![row!({"x": "1", "y": "2"})]);
    Ok(())
}

#[test]
fn tsv_and_trim() -> Result<()> {
    let rows = decode("a\tb\n 1 \t two\n", &FormatOptions::tsv().with_trim(true))?;
    assert_eq!(rows, vec![row!({"a": "1", "b": "two"})]);
    Ok(())
}

#[test]
fn ragged_record_is_an_error_naming_the_line() {
    let err = decode("a,b\n1,2\n3\n", &FormatOptions::csv()).unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("line 3"), "{msg}");
}

#[test]
fn encode_uses_the_union_header() -> Result<()> {
    let rows = vec![row!({"a": "1"}), row!({"b": "2", "a": "3"})];
    let text = encode(&rows, &FormatOptions::csv())?;
    assert_eq!(text, "a,b\n1,\n3,2\n");
    Ok(())
}

#[test]
fn encode_is_deterministic_and_round_trips_strings() -> Result<()> {
    let rows = vec![
        row!({"id": "1", "note": "has, comma"}),
        row!({"id": "2", "note": "has \"quotes\""}),
    ];
    let opts = FormatOptions::csv();
    let once = encode(&rows, &opts)?;
    assert_eq!(once, encode(&rows, &opts)?);
    assert_eq!(decode(&once, &opts)?, rows);
    Ok(())
}

#[test]
fn scalar_rows_round_trip_with_inference() -> Result<()> {
    let rows = vec![row!({"n": 1, "x": 0.25, "ok": false}), row!({"n": -4, "x": 10.5, "ok": true})];
    let opts = FormatOptions::csv().with_type_inference(true);
    assert_eq!(decode(&encode(&rows, &opts)?, &opts)?, rows);
    Ok(())
}

#[test]
fn streaming_encoder_rejects_columns_outside_its_header() {
    let mut buf = Vec::new();
    let mut enc = CsvEncoder::new(&mut buf, &FormatOptions::csv());
    assert!(enc.write_row(&row!({"a": 1})).is_ok());
    let err = enc.write_row(&row!({"a": 2, "z": 3})).unwrap_err();
    assert!(err.to_string().contains("`z`"), "{err}");
}

#[test]
fn file_pipeline_round_trip() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("people.csv");
    fs::write(&input, "name,age\nada,36\nbob,17\ncy,52\n")?;
    let output = dir.path().join("out/adults.csv");

    let written = Pipeline::open_path(&input)?
        .filter(|r| r.get_str("age").and_then(|a| a.parse::<u32>().ok()).is_some_and(|a| a >= 18))
        .prepare_to_sink(output.clone(), WriteOptions::new(FormatOptions::csv()))
        .run()?;
    assert_eq!(written.row_count(), 2);

    assert_eq!(fs::read_to_string(&output)?, "name,age\nada,36\ncy,52\n");
    Ok(())
}

#[test]
fn malformed_file_fails_the_run_as_a_source_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("bad.csv");
    fs::write(&input, "a,b\n1,2\n1,2,3\n")?;
    let err = open_source(input.as_path(), FormatOptions::csv()).collect().unwrap_err();
    assert!(matches!(err, PipelineError::Source { .. }), "{err:?}");
    Ok(())
}
