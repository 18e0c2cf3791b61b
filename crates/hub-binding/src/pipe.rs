//! Blocking producer feeding a streaming request body.
//!
//! The producer runs on the blocking pool and writes through a bounded
//! channel; the HTTP client drains the other end. A producer failure is
//! delivered as the final stream item so the request fails with it
//! instead of completing with a truncated body.

use std::io::{self, BufWriter, Write};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::error::{Error, Result};

const BUFFER_SIZE: usize = 64 * 1024;
const CHANNEL_DEPTH: usize = 8;

pub(crate) type Sink = BufWriter<ChannelWriter>;

/// `Write` adapter over the body channel.
pub(crate) struct ChannelWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
}

impl ChannelWriter {
    pub(crate) fn new(tx: mpsc::Sender<io::Result<Bytes>>) -> Self {
        Self { tx }
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "request body closed"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Spawn `produce` and return the body it streams into.
///
/// Must be called from within a tokio runtime.
pub(crate) fn body<F>(produce: F) -> reqwest::Body
where
    F: FnOnce(&mut Sink) -> Result<()> + Send + 'static,
{
    reqwest::Body::wrap_stream(stream(produce))
}

fn stream<F>(produce: F) -> ReceiverStream<io::Result<Bytes>>
where
    F: FnOnce(&mut Sink) -> Result<()> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
    let errors = tx.clone();
    tokio::task::spawn_blocking(move || {
        let mut sink = BufWriter::with_capacity(BUFFER_SIZE, ChannelWriter::new(tx));
        let result = produce(&mut sink).and_then(|()| {
            sink.flush()
                .map_err(|e| Error::Request(format!("request body: {e}")))
        });
        if let Err(err) = result {
            // Drop buffered bytes; the error must be the last item.
            let (writer, _) = sink.into_parts();
            drop(writer);
            warn!("request body producer failed: {err}");
            let _ = errors.blocking_send(Err(io::Error::other(err.to_string())));
        }
    });
    ReceiverStream::new(rx)
}
