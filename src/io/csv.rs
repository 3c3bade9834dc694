//! Delimited text (CSV/TSV) codec on top of the `csv` crate.
//!
//! Without type inference every cell decodes to a JSON string, which makes
//! `decode(encode(rows))` exact for string-valued rows. With inference a cell
//! becomes, in order of preference: `null` (empty), a bool, an `i64`, a finite
//! `f64`, or a string.

use crate::io::format::{FormatOptions, RowDecoder, RowEncoder};
use crate::row::{Row, Value};
use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use serde_json::Number;
use std::collections::HashSet;
use std::io::{Read, Write};

pub struct CsvDecoder<R: Read> {
    reader: csv::Reader<R>,
    has_headers: bool,
    explicit: Option<Vec<String>>,
    headers: Option<Vec<String>>,
    record: StringRecord,
    infer: bool,
}

impl<R: Read> CsvDecoder<R> {
    pub fn new(reader: R, opts: &FormatOptions) -> Self {
        let reader = ReaderBuilder::new()
            .delimiter(opts.delimiter)
            .has_headers(opts.has_headers)
            // Field counts are checked against the header below, with the line.
            .flexible(true)
            .trim(if opts.trim { Trim::All } else { Trim::None })
            .from_reader(reader);
        Self {
            reader,
            has_headers: opts.has_headers,
            explicit: opts.columns.clone(),
            headers: None,
            record: StringRecord::new(),
            infer: opts.infer_types,
        }
    }

    fn resolve_headers(&mut self) -> Result<()> {
        if self.headers.is_some() {
            return Ok(());
        }
        let headers = match (&self.explicit, self.has_headers) {
            (Some(cols), _) => cols.clone(),
            (None, true) => self
                .reader
                .headers()
                .context("read CSV header")?
                .iter()
                .map(str::to_string)
                .collect(),
            // Header-less without names: columns are numbered once the first
            // record shows how many there are.
            (None, false) => return Ok(()),
        };
        self.headers = Some(headers);
        Ok(())
    }
}

impl<R: Read + Send> RowDecoder for CsvDecoder<R> {
    fn next_row(&mut self) -> Result<Option<Row>> {
        self.resolve_headers()?;
        let more = self.reader.read_record(&mut self.record).with_context(|| {
            let line = self.record.position().map_or(0, |p| p.line());
            format!("parse CSV record near line {line}")
        })?;
        if !more {
            return Ok(None);
        }
        let headers = self
            .headers
            .get_or_insert_with(|| (1..=self.record.len()).map(|i| format!("column_{i}")).collect());
        if headers.len() != self.record.len() {
            let line = self.record.position().map_or(0, |p| p.line());
            bail!(
                "CSV record on line {line} has {} fields, expected {}",
                self.record.len(),
                headers.len()
            );
        }
        let row = headers
            .iter()
            .zip(self.record.iter())
            .map(|(h, cell)| (h.clone(), decode_cell(cell, self.infer)))
            .collect();
        Ok(Some(row))
    }
}

fn decode_cell(cell: &str, infer: bool) -> Value {
    if !infer {
        return Value::String(cell.to_string());
    }
    if cell.is_empty() {
        return Value::Null;
    }
    if cell.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if cell.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Some(n) = cell.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    Value::String(cell.to_string())
}

/// Text of one cell. Nested values are written as JSON.
pub fn cell_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => v.to_string(),
    }
}

pub struct CsvEncoder<W: Write> {
    writer: csv::Writer<W>,
    header: Option<Vec<String>>,
    known: HashSet<String>,
    emit_header: bool,
    header_written: bool,
}

impl<W: Write> CsvEncoder<W> {
    pub fn new(writer: W, opts: &FormatOptions) -> Self {
        let writer = WriterBuilder::new()
            .delimiter(opts.delimiter)
            .has_headers(false)
            .from_writer(writer);
        let header = opts.columns.clone();
        let known = header.iter().flatten().cloned().collect();
        Self {
            writer,
            header,
            known,
            emit_header: opts.has_headers,
            header_written: false,
        }
    }

    fn write_header_once(&mut self) -> Result<()> {
        if self.header_written || !self.emit_header {
            return Ok(());
        }
        self.header_written = true;
        if let Some(h) = &self.header
            && !h.is_empty()
        {
            self.writer.write_record(h).context("write CSV header")?;
        }
        Ok(())
    }
}

impl<W: Write> RowEncoder for CsvEncoder<W> {
    fn write_row(&mut self, row: &Row) -> Result<()> {
        if self.header.is_none() {
            let cols: Vec<String> = row.keys().cloned().collect();
            self.known = cols.iter().cloned().collect();
            self.header = Some(cols);
        }
        self.write_header_once()?;
        if let Some(extra) = row.keys().find(|k| !self.known.contains(*k)) {
            bail!("column `{extra}` is not part of the CSV header");
        }
        let Some(header) = &self.header else {
            return Ok(());
        };
        let cells: Vec<String> = header
            .iter()
            .map(|h| row.get(h).map(cell_text).unwrap_or_default())
            .collect();
        self.writer.write_record(&cells).context("write CSV record")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.write_header_once()?;
        self.writer.flush().context("flush CSV output")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inference_order() {
        assert_eq!(decode_cell("", true), Value::Null);
        assert_eq!(decode_cell("TRUE", true), Value::Bool(true));
        assert_eq!(decode_cell("-12", true), Value::from(-12));
        assert_eq!(decode_cell("2.5", true), Value::from(2.5));
        assert_eq!(decode_cell("NaN", true), Value::from("NaN"));
        assert_eq!(decode_cell("12", false), Value::from("12"));
    }

    #[test]
    fn nested_values_render_as_json() {
        assert_eq!(cell_text(&serde_json::json!([1, "a"])), r#"[1,"a"]"#);
        assert_eq!(cell_text(&Value::Null), "");
    }
}
