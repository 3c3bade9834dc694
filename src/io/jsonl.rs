//! JSON Lines codec: one JSON object per line.
//!
//! Blank and whitespace-only lines are skipped on read. Every other line must
//! parse as a JSON object; anything else fails with the line number.

use crate::io::format::{RowDecoder, RowEncoder};
use crate::row::{type_name, Row, Value};
use anyhow::{bail, Context, Result};
use std::io::{BufRead, Write};

pub struct JsonlDecoder<R: BufRead> {
    reader: R,
    line_no: u64,
    buf: String,
}

impl<R: BufRead> JsonlDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            buf: String::new(),
        }
    }
}

impl<R: BufRead + Send> RowDecoder for JsonlDecoder<R> {
    fn next_row(&mut self) -> Result<Option<Row>> {
        loop {
            self.buf.clear();
            let n = self
                .reader
                .read_line(&mut self.buf)
                .with_context(|| format!("read line {}", self.line_no + 1))?;
            if n == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let line = self.buf.trim();
            if line.is_empty() {
                continue;
            }
            let v: Value = serde_json::from_str(line)
                .with_context(|| format!("parse JSONL line {}: {}", self.line_no, line))?;
            return match v {
                Value::Object(map) => Ok(Some(Row::from(map))),
                other => bail!(
                    "JSONL line {} is not an object (found {})",
                    self.line_no,
                    type_name(&other)
                ),
            };
        }
    }
}

pub struct JsonlEncoder<W: Write> {
    writer: W,
}

impl<W: Write> JsonlEncoder<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> RowEncoder for JsonlEncoder<W> {
    fn write_row(&mut self, row: &Row) -> Result<()> {
        serde_json::to_writer(&mut self.writer, row).context("serialize row as JSON")?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush().context("flush JSONL output")
    }
}
