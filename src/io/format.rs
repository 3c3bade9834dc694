//! Decoding text into rows and encoding rows back into text.
//!
//! Both directions are pure: the same input and [`FormatOptions`] always give
//! the same rows or the same bytes. Malformed input is an error naming the
//! offending line or record; a row is never silently skipped.
//!
//! The streaming halves ([`RowDecoder`], [`RowEncoder`]) are what pipeline
//! sources and sinks use. [`decode`] and [`encode`] are whole-buffer
//! conveniences built on them.

use crate::io::compression::Codec;
use crate::io::csv::{CsvDecoder, CsvEncoder};
use crate::io::jsonl::{JsonlDecoder, JsonlEncoder};
use crate::row::Row;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufReader, Cursor, Read, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Csv,
    Jsonl,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatOptions {
    pub format: Format,
    /// Field delimiter for delimited text.
    pub delimiter: u8,
    /// Whether the first record is a header (read) or a header is emitted (write).
    pub has_headers: bool,
    /// Explicit column names. On read this overrides the header (or names
    /// header-less columns); on write it fixes the header and column order.
    pub columns: Option<Vec<String>>,
    /// Turn CSV cells into null/bool/integer/float where they parse as such.
    pub infer_types: bool,
    /// Trim whitespace around CSV fields.
    pub trim: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self::csv()
    }
}

impl FormatOptions {
    #[must_use]
    pub fn csv() -> Self {
        Self {
            format: Format::Csv,
            delimiter: b',',
            has_headers: true,
            columns: None,
            infer_types: false,
            trim: false,
        }
    }

    #[must_use]
    pub fn tsv() -> Self {
        Self {
            delimiter: b'\t',
            ..Self::csv()
        }
    }

    #[must_use]
    pub fn jsonl() -> Self {
        Self {
            format: Format::Jsonl,
            ..Self::csv()
        }
    }

    /// Guess the format from a file name, looking through `.gz`/`.zst`.
    ///
    /// # Errors
    /// Fails for extensions other than `csv`, `tsv`, `jsonl`, `ndjson`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let name = path.as_ref().to_string_lossy().to_lowercase();
        let name = Codec::strip_extension(&name);
        let ext = name.rsplit_once('.').map(|(_, e)| e).unwrap_or_default();
        match ext {
            "csv" => Ok(Self::csv()),
            "tsv" | "tab" => Ok(Self::tsv()),
            "jsonl" | "ndjson" => Ok(Self::jsonl()),
            other => bail!("cannot infer a row format from extension `{other}`"),
        }
    }

    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    #[must_use]
    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }

    #[must_use]
    pub fn with_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_type_inference(mut self, infer: bool) -> Self {
        self.infer_types = infer;
        self
    }

    #[must_use]
    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }
}

/// Incremental row reader.
pub trait RowDecoder: Send {
    /// Next row, `Ok(None)` at end of input.
    fn next_row(&mut self) -> Result<Option<Row>>;
}

/// Incremental row writer.
pub trait RowEncoder {
    fn write_row(&mut self, row: &Row) -> Result<()>;

    /// Flush buffered output. Writes a bare header when configured and no row came.
    fn finish(&mut self) -> Result<()>;
}

pub fn decoder_for(reader: Box<dyn Read + Send>, opts: &FormatOptions) -> Box<dyn RowDecoder> {
    match opts.format {
        Format::Csv => Box::new(CsvDecoder::new(reader, opts)),
        Format::Jsonl => Box::new(JsonlDecoder::new(BufReader::new(reader))),
    }
}

pub fn encoder_for<'w, W: Write + 'w>(writer: W, opts: &FormatOptions) -> Box<dyn RowEncoder + 'w> {
    match opts.format {
        Format::Csv => Box::new(CsvEncoder::new(writer, opts)),
        Format::Jsonl => Box::new(JsonlEncoder::new(writer)),
    }
}

/// Decode a whole text buffer.
///
/// # Errors
/// Fails on the first malformed line or record.
pub fn decode(text: &str, opts: &FormatOptions) -> Result<Vec<Row>> {
    let mut dec = decoder_for(Box::new(Cursor::new(text.as_bytes().to_vec())), opts);
    let mut out = Vec::new();
    while let Some(row) = dec.next_row()? {
        out.push(row);
    }
    Ok(out)
}

/// Encode rows into a string.
///
/// For CSV without explicit `columns`, the header is the union of all row
/// keys in first-seen order; missing cells are written empty.
///
/// # Errors
/// Fails if a row cannot be serialized.
pub fn encode(rows: &[Row], opts: &FormatOptions) -> Result<String> {
    let mut buf = Vec::new();
    encode_to(&mut buf, rows, opts)?;
    String::from_utf8(buf).context("encoded output is not UTF-8")
}

/// Encode rows into `writer`; returns the number of rows written.
///
/// # Errors
/// See [`encode`].
pub fn encode_to<W: Write>(writer: W, rows: &[Row], opts: &FormatOptions) -> Result<usize> {
    let opts = match (opts.format, &opts.columns) {
        (Format::Csv, None) => {
            let mut cols: Vec<String> = Vec::new();
            for row in rows {
                for k in row.keys() {
                    if !cols.contains(k) {
                        cols.push(k.clone());
                    }
                }
            }
            opts.clone().with_columns(cols)
        }
        _ => opts.clone(),
    };
    let mut enc = encoder_for(writer, &opts);
    for (i, row) in rows.iter().enumerate() {
        enc.write_row(row).with_context(|| format!("encode row #{}", i + 1))?;
    }
    enc.finish()?;
    Ok(rows.len())
}
