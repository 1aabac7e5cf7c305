use tokio::sync::mpsc;

use crate::error::Result;

/// Readiness notifications a stream delivers to its owner.
///
/// Streams never act on these themselves; the session schedules them onto its
/// own execution context so reads and writes cannot interleave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The stream finished opening.
    OpenCompleted,
    /// Inbound bytes are buffered and can be read.
    BytesAvailable,
    /// The stream can accept more outbound bytes.
    SpaceAvailable,
    /// The stream failed; no further I/O will succeed.
    ErrorOccurred(String),
    /// The peer closed the stream.
    EndEncountered,
}

/// Sending half of the notification channel handed to [`ByteStream::open`].
#[derive(Debug, Clone)]
pub struct StreamEvents {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl StreamEvents {
    /// Create a notification channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Deliver an event. Returns `false` once the owner has gone away.
    pub fn notify(&self, event: StreamEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Whether the owner is still listening.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A bidirectional, packet-oriented byte stream to a brick.
///
/// This is the whole contract the session needs from a transport. How the
/// stream was established (pairing, RFCOMM channel setup) is not its concern.
pub trait ByteStream: Send + 'static {
    /// Open the stream and start delivering notifications to `events`.
    fn open(&mut self, events: StreamEvents) -> Result<()>;

    /// Write as many bytes of `buf` as the stream accepts right now.
    ///
    /// Returns the number of bytes accepted; `0` means the stream would block.
    /// An `Err` means the stream is unusable.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Read buffered inbound bytes into `buf`.
    ///
    /// Returns `0` when nothing is available. Never blocks.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Whether inbound bytes are buffered right now.
    fn has_bytes_available(&self) -> bool;

    /// Close the stream. Idempotent.
    fn close(&mut self);

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str {
        "stream"
    }
}

impl<S: ByteStream + ?Sized> ByteStream for Box<S> {
    fn open(&mut self, events: StreamEvents) -> Result<()> {
        (**self).open(events)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        (**self).write(buf)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn has_bytes_available(&self) -> bool {
        (**self).has_bytes_available()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn transport_name(&self) -> &'static str {
        (**self).transport_name()
    }
}
