use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use bytes::{Buf, BytesMut};
use tracing::{debug, trace, warn};

use crate::error::{Result, TransportError};
use crate::traits::{ByteStream, StreamEvent, StreamEvents};

const READ_CHUNK_SIZE: usize = 1024;
const INITIAL_INBOX_CAPACITY: usize = 4 * 1024;

/// Bytes accepted by [`IoStream::write`] but not yet handed to the OS.
pub const OUTBOX_CAPACITY: usize = 4 * 1024;

/// How long `close` waits for accepted bytes to reach the OS.
const CLOSE_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// A blocking OS handle that can be split into a reader and a writer.
pub trait DuplexIo: Read + Write + Send + Sized + 'static {
    /// Duplicate the handle for a background thread.
    fn try_clone_io(&self) -> std::io::Result<Self>;

    /// Prepare the reader half before the reader thread starts.
    fn prepare_reader(&self) -> std::io::Result<()> {
        Ok(())
    }

    /// Unblock the background threads during close.
    fn shutdown_io(&self) -> std::io::Result<()> {
        Ok(())
    }

    /// Transport name for diagnostics.
    fn io_name() -> &'static str;
}

impl DuplexIo for std::fs::File {
    fn try_clone_io(&self) -> std::io::Result<Self> {
        self.try_clone()
    }

    fn io_name() -> &'static str {
        "device-file"
    }
}

#[cfg(unix)]
impl DuplexIo for std::os::unix::net::UnixStream {
    fn try_clone_io(&self) -> std::io::Result<Self> {
        self.try_clone()
    }

    fn prepare_reader(&self) -> std::io::Result<()> {
        // Short timeout so the reader notices shutdown without a byte arriving.
        self.set_read_timeout(Some(Duration::from_millis(100)))
    }

    fn shutdown_io(&self) -> std::io::Result<()> {
        self.shutdown(std::net::Shutdown::Both)
    }

    fn io_name() -> &'static str {
        "unix-socket-bridge"
    }
}

#[derive(Default)]
struct Outbox {
    pending: BytesMut,
    in_flight: bool,
    want_space: bool,
    closing: bool,
    failed: Option<(ErrorKind, String)>,
}

/// Outbox shared with the writer thread. `changed` wakes either side.
#[derive(Default)]
struct Outbound {
    outbox: Mutex<Outbox>,
    changed: Condvar,
}

impl Outbound {
    fn lock(&self) -> MutexGuard<'_, Outbox> {
        lock(&self.outbox)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, Outbox>) -> MutexGuard<'a, Outbox> {
        self.changed
            .wait(guard)
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Adapts a blocking OS handle to [`ByteStream`].
///
/// Two background threads own the blocking calls. The reader fills an inbox
/// and emits `BytesAvailable`; the session drains the inbox from its own
/// context. `write` copies into a bounded outbox that the writer thread
/// flushes to the handle, so a stalled peer shows up as `Ok(0)` instead of
/// a blocked session. Once the outbox has room again the writer emits
/// `SpaceAvailable`.
pub struct IoStream<T: DuplexIo> {
    io: T,
    inbox: Arc<Mutex<BytesMut>>,
    outbound: Arc<Outbound>,
    shutdown: Arc<AtomicBool>,
    events: Option<StreamEvents>,
    reader: Option<thread::JoinHandle<()>>,
    writer: Option<thread::JoinHandle<()>>,
}

impl<T: DuplexIo> IoStream<T> {
    /// Wrap an already-established handle.
    pub fn new(io: T) -> Self {
        Self {
            io,
            inbox: Arc::new(Mutex::new(BytesMut::with_capacity(INITIAL_INBOX_CAPACITY))),
            outbound: Arc::new(Outbound::default()),
            shutdown: Arc::new(AtomicBool::new(false)),
            events: None,
            reader: None,
            writer: None,
        }
    }

    /// Borrow the underlying handle.
    pub fn get_ref(&self) -> &T {
        &self.io
    }

    fn inbox(&self) -> MutexGuard<'_, BytesMut> {
        lock(&self.inbox)
    }

    /// Give the writer thread a bounded window to flush what was accepted.
    fn drain_outbox(&self) {
        let deadline = Instant::now() + CLOSE_DRAIN_TIMEOUT;
        let mut outbox = self.outbound.lock();
        outbox.closing = true;
        self.outbound.changed.notify_all();

        while outbox.in_flight || !outbox.pending.is_empty() {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                debug!(
                    discarded = outbox.pending.len(),
                    "outbound bytes not flushed before close"
                );
                outbox.pending.clear();
                break;
            };
            outbox = match self.outbound.changed.wait_timeout(outbox, remaining) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<T: DuplexIo> ByteStream for IoStream<T> {
    fn open(&mut self, events: StreamEvents) -> Result<()> {
        if self.events.is_some() {
            return Err(TransportError::AlreadyOpen);
        }

        let reader_io = self.io.try_clone_io()?;
        reader_io.prepare_reader()?;
        let writer_io = self.io.try_clone_io()?;

        let inbox = Arc::clone(&self.inbox);
        let shutdown = Arc::clone(&self.shutdown);
        let reader_events = events.clone();
        let reader = thread::Builder::new()
            .name("brickwire-reader".to_string())
            .spawn(move || reader_loop(reader_io, inbox, shutdown, reader_events))?;

        let outbound = Arc::clone(&self.outbound);
        let writer_events = events.clone();
        let writer = thread::Builder::new()
            .name("brickwire-writer".to_string())
            .spawn(move || writer_loop(writer_io, outbound, writer_events))?;

        debug!(transport = T::io_name(), "stream opened");
        events.notify(StreamEvent::OpenCompleted);
        events.notify(StreamEvent::SpaceAvailable);
        self.reader = Some(reader);
        self.writer = Some(writer);
        self.events = Some(events);
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let Some(events) = &self.events else {
            return Err(TransportError::NotOpen);
        };

        let mut outbox = self.outbound.lock();
        if let Some((kind, message)) = &outbox.failed {
            return Err(TransportError::Io(std::io::Error::new(*kind, message.clone())));
        }

        let room = OUTBOX_CAPACITY.saturating_sub(outbox.pending.len());
        let accepted = room.min(buf.len());
        if accepted == 0 {
            outbox.want_space = true;
            trace!(pending = outbox.pending.len(), "outbox full");
            return Ok(0);
        }

        outbox.pending.extend_from_slice(&buf[..accepted]);
        let has_room = outbox.pending.len() < OUTBOX_CAPACITY;
        if !has_room {
            outbox.want_space = true;
        }
        self.outbound.changed.notify_all();
        drop(outbox);

        if has_room {
            events.notify(StreamEvent::SpaceAvailable);
        }
        Ok(accepted)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.events.is_none() {
            return Err(TransportError::NotOpen);
        }

        let mut inbox = self.inbox();
        let n = inbox.len().min(buf.len());
        buf[..n].copy_from_slice(&inbox[..n]);
        inbox.advance(n);
        Ok(n)
    }

    fn has_bytes_available(&self) -> bool {
        !self.inbox().is_empty()
    }

    fn close(&mut self) {
        if self.events.take().is_none() {
            return;
        }

        self.shutdown.store(true, Ordering::Release);
        self.drain_outbox();
        if let Err(err) = self.io.shutdown_io() {
            debug!(%err, "shutdown of stream handle failed");
        }

        // Threads still blocked in the OS exit on their next wakeup.
        for handle in [self.reader.take(), self.writer.take()].into_iter().flatten() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
        debug!(transport = T::io_name(), "stream closed");
    }

    fn transport_name(&self) -> &'static str {
        T::io_name()
    }
}

impl<T: DuplexIo> Drop for IoStream<T> {
    fn drop(&mut self) {
        self.close();
    }
}

fn reader_loop<T: DuplexIo>(
    mut io: T,
    inbox: Arc<Mutex<BytesMut>>,
    shutdown: Arc<AtomicBool>,
    events: StreamEvents,
) {
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        if shutdown.load(Ordering::Acquire) || events.is_closed() {
            break;
        }

        match io.read(&mut chunk) {
            Ok(0) => {
                if !shutdown.load(Ordering::Acquire) {
                    debug!("stream reached end");
                    events.notify(StreamEvent::EndEncountered);
                }
                break;
            }
            Ok(n) => {
                lock(&inbox).extend_from_slice(&chunk[..n]);
                trace!(len = n, "buffered inbound bytes");
                events.notify(StreamEvent::BytesAvailable);
            }
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
                ) =>
            {
                continue;
            }
            Err(err) => {
                if !shutdown.load(Ordering::Acquire) {
                    warn!(%err, "stream read failed");
                    events.notify(StreamEvent::ErrorOccurred(err.to_string()));
                }
                break;
            }
        }
    }
}

fn writer_loop<T: DuplexIo>(mut io: T, outbound: Arc<Outbound>, events: StreamEvents) {
    loop {
        let chunk = {
            let mut outbox = outbound.lock();
            while outbox.pending.is_empty() && !outbox.closing {
                outbox = outbound.wait(outbox);
            }
            if outbox.pending.is_empty() {
                break;
            }
            outbox.in_flight = true;
            outbox.pending.split().freeze()
        };

        let result = io.write_all(&chunk).and_then(|()| io.flush());

        let mut outbox = outbound.lock();
        outbox.in_flight = false;
        match result {
            Ok(()) => {
                trace!(len = chunk.len(), "flushed outbound bytes");
                let space = std::mem::take(&mut outbox.want_space);
                outbound.changed.notify_all();
                drop(outbox);
                if space {
                    events.notify(StreamEvent::SpaceAvailable);
                }
            }
            Err(err) => {
                let closing = outbox.closing;
                outbox.failed = Some((err.kind(), err.to_string()));
                outbox.pending.clear();
                outbound.changed.notify_all();
                drop(outbox);
                if !closing {
                    warn!(%err, "stream write failed");
                    events.notify(StreamEvent::ErrorOccurred(err.to_string()));
                }
                break;
            }
        }
    }
}
