//! Transparent compression for file sources and sinks.
//!
//! Detection is extension-first (`.gz`, `.gzip`, `.zst`, `.zstd`). Readers fall
//! back to magic bytes when the extension says nothing. Writers only look at
//! the extension.
//!
//! Codecs are compiled in through the `compression-gzip` and `compression-zstd`
//! features. Without them every path is a buffered pass-through.

use anyhow::{Context, Result};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// A compression format recognised by this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Gzip,
    Zstd,
}

impl Codec {
    pub fn name(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
        }
    }

    fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Gzip => &[".gz", ".gzip"],
            Self::Zstd => &[".zst", ".zstd"],
        }
    }

    fn magic(self) -> &'static [u8] {
        match self {
            Self::Gzip => &[0x1f, 0x8b],
            Self::Zstd => &[0x28, 0xb5, 0x2f, 0xfd],
        }
    }

    /// Codecs enabled in this build.
    pub fn enabled() -> &'static [Codec] {
        &[
            #[cfg(feature = "compression-gzip")]
            Codec::Gzip,
            #[cfg(feature = "compression-zstd")]
            Codec::Zstd,
        ]
    }

    /// Match an enabled codec against the end of `path` (case-insensitive).
    pub fn from_path(path: impl AsRef<Path>) -> Option<Codec> {
        let s = path.as_ref().to_string_lossy().to_lowercase();
        Self::enabled()
            .iter()
            .copied()
            .find(|c| c.extensions().iter().any(|ext| s.ends_with(ext)))
    }

    fn from_magic(head: &[u8]) -> Option<Codec> {
        Self::enabled()
            .iter()
            .copied()
            .find(|c| !head.is_empty() && head.starts_with(c.magic()))
    }

    /// Strip a recognised compression extension, e.g. `a.csv.gz` -> `a.csv`.
    pub fn strip_extension(path: &str) -> &str {
        let lower = path.to_lowercase();
        for c in [Codec::Gzip, Codec::Zstd] {
            for ext in c.extensions() {
                if lower.ends_with(ext) {
                    return &path[..path.len() - ext.len()];
                }
            }
        }
        path
    }

    #[allow(unused_variables)]
    fn wrap_reader(self, reader: Box<dyn Read + Send>) -> io::Result<Box<dyn Read + Send>> {
        match self {
            #[cfg(feature = "compression-gzip")]
            Self::Gzip => Ok(Box::new(flate2::read::MultiGzDecoder::new(reader))),
            #[cfg(feature = "compression-zstd")]
            Self::Zstd => Ok(Box::new(zstd::stream::read::Decoder::new(reader)?)),
            #[allow(unreachable_patterns)]
            other => Err(io::Error::other(format!("{} support not compiled in", other.name()))),
        }
    }
}

/// Wrap `reader` with a decompressor when `path_hint` or the leading bytes say so.
///
/// # Errors
/// Fails if the stream head cannot be read or the decompressor cannot start.
pub fn auto_detect_reader<R: Read + Send + 'static>(
    reader: R,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn Read + Send>> {
    if let Some(codec) = Codec::from_path(&path_hint) {
        return codec
            .wrap_reader(Box::new(BufReader::new(reader)))
            .with_context(|| format!("wrap reader with {} codec", codec.name()));
    }

    let mut buf = BufReader::new(reader);
    let sniffed = Codec::from_magic(buf.fill_buf().context("peek stream head")?);
    match sniffed {
        Some(codec) => codec
            .wrap_reader(Box::new(buf))
            .with_context(|| format!("wrap reader with {} codec", codec.name())),
        None => Ok(Box::new(buf)),
    }
}

/// A sink-side writer that may compress. Call [`finish`](Self::finish) to
/// flush and write any trailer; dropping without it loses the trailer.
pub struct CompressedWriter {
    inner: WriterKind,
}

enum WriterKind {
    Plain(BufWriter<Box<dyn Write + Send>>),
    #[cfg(feature = "compression-gzip")]
    Gzip(flate2::write::GzEncoder<BufWriter<Box<dyn Write + Send>>>),
    #[cfg(feature = "compression-zstd")]
    Zstd(zstd::stream::write::Encoder<'static, BufWriter<Box<dyn Write + Send>>>),
}

impl CompressedWriter {
    pub fn plain(writer: Box<dyn Write + Send>) -> Self {
        Self {
            inner: WriterKind::Plain(BufWriter::new(writer)),
        }
    }

    /// # Errors
    /// Propagates flush and trailer write failures.
    pub fn finish(self) -> io::Result<()> {
        match self.inner {
            WriterKind::Plain(mut w) => w.flush(),
            #[cfg(feature = "compression-gzip")]
            WriterKind::Gzip(w) => w.finish()?.flush(),
            #[cfg(feature = "compression-zstd")]
            WriterKind::Zstd(w) => w.finish()?.flush(),
        }
    }
}

impl Write for CompressedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            WriterKind::Plain(w) => w.write(buf),
            #[cfg(feature = "compression-gzip")]
            WriterKind::Gzip(w) => w.write(buf),
            #[cfg(feature = "compression-zstd")]
            WriterKind::Zstd(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            WriterKind::Plain(w) => w.flush(),
            #[cfg(feature = "compression-gzip")]
            WriterKind::Gzip(w) => w.flush(),
            #[cfg(feature = "compression-zstd")]
            WriterKind::Zstd(w) => w.flush(),
        }
    }
}

/// Wrap `writer` with a compressor chosen by the extension of `path_hint`.
///
/// # Errors
/// Fails if the compressor cannot be initialised.
pub fn auto_detect_writer<W: Write + Send + 'static>(
    writer: W,
    path_hint: impl AsRef<Path>,
) -> Result<CompressedWriter> {
    let buffered = BufWriter::new(Box::new(writer) as Box<dyn Write + Send>);
    let inner = match Codec::from_path(&path_hint) {
        #[cfg(feature = "compression-gzip")]
        Some(Codec::Gzip) => WriterKind::Gzip(flate2::write::GzEncoder::new(
            buffered,
            flate2::Compression::default(),
        )),
        #[cfg(feature = "compression-zstd")]
        Some(Codec::Zstd) => WriterKind::Zstd(
            zstd::stream::write::Encoder::new(buffered, 3).context("start zstd encoder")?,
        ),
        _ => WriterKind::Plain(buffered),
    };
    Ok(CompressedWriter { inner })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_known_extensions() {
        assert_eq!(Codec::strip_extension("data.csv.gz"), "data.csv");
        assert_eq!(Codec::strip_extension("data.JSONL.ZST"), "data.JSONL");
        assert_eq!(Codec::strip_extension("data.tsv"), "data.tsv");
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn gzip_round_trip_through_buffers() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("x.txt.gz");
        let mut w = auto_detect_writer(std::fs::File::create(&path)?, &path)?;
        w.write_all(b"hello\nworld\n")?;
        w.finish()?;

        // Magic-byte detection kicks in even without the extension hint.
        let mut r = auto_detect_reader(std::fs::File::open(&path)?, "no-extension")?;
        let mut s = String::new();
        r.read_to_string(&mut s)?;
        assert_eq!(s, "hello\nworld\n");
        Ok(())
    }
}
