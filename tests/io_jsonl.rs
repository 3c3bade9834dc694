use anyhow::Result;
use rowflow::testing::assert_rows_equal;
use rowflow::*;
use std::fs;

#[test]
fn decode_skips_blank_lines() -> Result<()> {
    let text = "{\"a\":1}\n\n   \n{\"a\":2,\"b\":[1,2]}\n";
    let rows = decode(text, &FormatOptions::jsonl())?;
    assert_rows_equal(&rows, &[row!({"a": 1}), row!({"a": 2, "b": [1, 2]})]);
    Ok(())
}

#[test]
fn malformed_line_is_reported_with_its_number() {
    let err = decode("{\"a\":1}\n{\"a\":\n", &FormatOptions::jsonl()).unwrap_err();
    assert!(err.to_string().contains("line 2"), "{err}");
}

#[test]
fn non_object_line_is_rejected() {
    let err = decode("{\"a\":1}\n[1,2]\n", &FormatOptions::jsonl()).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("line 2") && msg.contains("array"), "{msg}");
}

#[test]
fn round_trip_is_exact_and_keeps_column_order() -> Result<()> {
    let rows = vec![
        row!({"z": 1, "a": {"nested": [true, null]}, "m": "text"}),
        row!({"only": 2.5}),
    ];
    let text = encode(&rows, &FormatOptions::jsonl())?;
    assert_eq!(
        text,
        "{\"z\":1,\"a\":{\"nested\":[true,null]},\"m\":\"text\"}\n{\"only\":2.5}\n"
    );
    assert_eq!(decode(&text, &FormatOptions::jsonl())?, rows);
    Ok(())
}

#[test]
fn inline_text_source() -> Result<()> {
    let p = Pipeline::from_text("{\"v\":1}\n{\"v\":2}\n{\"v\":3}\n", FormatOptions::jsonl())
        .filter(|r| r.get_i64("v") != Some(2));
    let out = p.collect()?;
    assert_eq!(out, vec![row!({"v": 1}), row!({"v": 3})]);
    Ok(())
}

#[test]
fn file_to_file_with_remap() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("events.ndjson");
    fs::write(
        &input,
        "{\"id\":1,\"user\":{\"name\":\"ada\"}}\n{\"id\":2,\"user\":{\"name\":\"bob\"}}\n",
    )?;
    let output = dir.path().join("flat.jsonl");

    let out = Pipeline::open_path(&input)?
        .remap(PathMap::new().with("id", "id").with("user.name", "who"))
        .prepare_to_sink(output.clone(), WriteOptions::new(FormatOptions::jsonl()))
        .run()?;
    assert_eq!(out.row_count(), 2);
    assert_eq!(
        fs::read_to_string(&output)?,
        "{\"id\":1,\"who\":\"ada\"}\n{\"id\":2,\"who\":\"bob\"}\n"
    );
    Ok(())
}
