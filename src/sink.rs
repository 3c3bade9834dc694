//! Where a pipeline's rows go when it is run with a sink terminal.
//!
//! Two shapes are supported:
//! - [`SinkTarget`]: encoded output written to a file or a shared writer,
//!   configured by [`WriteOptions`];
//! - [`PipeSink`]: an external consumer receiving rows one at a time.

use crate::error::PipelineError;
use crate::io::format::FormatOptions;
use crate::row::Row;
use anyhow::{bail, Result};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::{Arc, Mutex};

/// An external push consumer for [`Pipeline::prepare_pipe_to`](crate::Pipeline::prepare_pipe_to).
///
/// `write_row` is called once per row in order. Exactly one of `finish`
/// (after the last row) or `abort` (with the first error) is called per run.
pub trait PipeSink: Send {
    fn write_row(&mut self, row: Row) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    fn abort(&mut self, _err: &PipelineError) {}
}

/// What a [`ChannelSink`] receiver sees: rows in order, then the error if the
/// run failed. The channel disconnects when the run is over.
pub type ChannelItem = Result<Row, PipelineError>;

enum ChannelTx {
    Bounded(SyncSender<ChannelItem>),
    Unbounded(Sender<ChannelItem>),
}

impl ChannelTx {
    fn send(&self, item: ChannelItem) -> Result<()> {
        let sent = match self {
            Self::Bounded(tx) => tx.send(item).is_ok(),
            Self::Unbounded(tx) => tx.send(item).is_ok(),
        };
        if !sent {
            bail!("pipe receiver hung up");
        }
        Ok(())
    }
}

/// Hands rows to another thread over an `mpsc` channel.
///
/// `finish` drops the sender, so the receiver observes completion as a
/// disconnect. `abort` first sends the error, then drops the sender. A
/// channel sink serves a single run; later runs fail with a sink error.
///
/// ```
/// use rowflow::*;
///
/// let (sink, rx) = ChannelSink::bounded(16);
/// let p = Pipeline::from_rows(vec![row!({"a": 1}), row!({"a": 2})]).prepare_pipe_to(sink);
/// let consumer = std::thread::spawn(move || rx.iter().filter(|item| item.is_ok()).count());
/// p.run()?;
/// assert_eq!(consumer.join().ok(), Some(2));
/// # Ok::<(), PipelineError>(())
/// ```
pub struct ChannelSink {
    tx: Option<ChannelTx>,
}

impl ChannelSink {
    /// A sink over `sync_channel(capacity)`: `write_row` blocks while the
    /// channel is full.
    pub fn bounded(capacity: usize) -> (Self, Receiver<ChannelItem>) {
        let (tx, rx) = mpsc::sync_channel(capacity);
        (Self { tx: Some(ChannelTx::Bounded(tx)) }, rx)
    }

    pub fn unbounded() -> (Self, Receiver<ChannelItem>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx: Some(ChannelTx::Unbounded(tx)) }, rx)
    }

    /// Whether the sender has been dropped by `finish` or `abort`.
    pub fn is_closed(&self) -> bool {
        self.tx.is_none()
    }
}

impl PipeSink for ChannelSink {
    fn write_row(&mut self, row: Row) -> Result<()> {
        match &self.tx {
            Some(tx) => tx.send(Ok(row)),
            None => bail!("channel sink already closed by an earlier run"),
        }
    }

    fn finish(&mut self) -> Result<()> {
        self.tx = None;
        Ok(())
    }

    fn abort(&mut self, err: &PipelineError) {
        if let Some(tx) = self.tx.take() {
            // The receiver may already be gone.
            let _ = tx.send(Err(err.clone()));
        }
    }
}

impl PipeSink for Vec<Row> {
    fn write_row(&mut self, row: Row) -> Result<()> {
        self.push(row);
        Ok(())
    }
}

/// Destination of encoded output.
#[derive(Clone)]
pub enum SinkTarget {
    /// A file, created (with parent directories) on run and compressed by
    /// extension.
    Path(PathBuf),
    /// A caller-owned writer, locked for the duration of each write.
    Writer(Arc<Mutex<dyn Write + Send>>),
}

impl SinkTarget {
    pub(crate) fn label(&self) -> String {
        match self {
            Self::Path(p) => p.display().to_string(),
            Self::Writer(_) => "<writer>".to_string(),
        }
    }
}

impl std::fmt::Debug for SinkTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(p) => f.debug_tuple("Path").field(p).finish(),
            Self::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}

impl From<PathBuf> for SinkTarget {
    fn from(p: PathBuf) -> Self {
        Self::Path(p)
    }
}

impl From<&Path> for SinkTarget {
    fn from(p: &Path) -> Self {
        Self::Path(p.to_path_buf())
    }
}

impl<W: Write + Send + 'static> From<Arc<Mutex<W>>> for SinkTarget {
    fn from(w: Arc<Mutex<W>>) -> Self {
        Self::Writer(w)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub format: FormatOptions,
    /// Written verbatim before the first encoded byte.
    pub preamble: Option<String>,
}

impl WriteOptions {
    pub fn new(format: FormatOptions) -> Self {
        Self {
            format,
            preamble: None,
        }
    }

    #[must_use]
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }
}

/// `Write` over a [`SinkTarget::Writer`].
pub(crate) struct SharedWriter(pub(crate) Arc<Mutex<dyn Write + Send>>);

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("sink writer lock poisoned"))?
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("sink writer lock poisoned"))?
            .flush()
    }
}

/// Counts the bytes that pass through.
pub(crate) struct CountingWriter<W> {
    inner: W,
    bytes: u64,
}

impl<W: Write> CountingWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    pub(crate) fn bytes(&self) -> u64 {
        self.bytes
    }

    pub(crate) fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counting_writer_counts_accepted_bytes() {
        let mut w = CountingWriter::new(Vec::new());
        w.write_all(b"hello ").unwrap();
        w.write_all(b"world").unwrap();
        assert_eq!(w.bytes(), 11);
        assert_eq!(w.into_inner(), b"hello world");
    }

    #[test]
    fn shared_writer_reaches_the_shared_buffer() {
        let buf = Arc::new(Mutex::new(Vec::<u8>::new()));
        let SinkTarget::Writer(target) = SinkTarget::from(buf.clone()) else {
            panic!("expected a writer target");
        };
        let mut w = SharedWriter(target);
        w.write_all(b"abc").unwrap();
        assert_eq!(buf.lock().unwrap().as_slice(), b"abc");
    }
}
