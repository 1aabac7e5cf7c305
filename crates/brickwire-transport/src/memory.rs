use std::sync::{Arc, Mutex, MutexGuard};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, TransportError};
use crate::traits::{ByteStream, StreamEvent, StreamEvents};

struct Shared {
    inbound: BytesMut,
    outbound: BytesMut,
    write_budget: Option<usize>,
    fail_writes: bool,
    events: Option<StreamEvents>,
    open: bool,
    write_calls: usize,
}

impl Shared {
    fn notify(&self, event: StreamEvent) {
        if let Some(events) = &self.events {
            events.notify(event);
        }
    }
}

/// In-process stream for tests and dry runs.
///
/// The paired [`MemoryPeer`] plays the brick: it injects reply bytes, inspects
/// written frames, and can throttle or break the write side.
pub struct MemoryStream {
    shared: Arc<Mutex<Shared>>,
}

/// Test-side handle to a [`MemoryStream`].
#[derive(Clone)]
pub struct MemoryPeer {
    shared: Arc<Mutex<Shared>>,
}

/// Create a connected stream/peer pair.
pub fn memory_pair() -> (MemoryStream, MemoryPeer) {
    let shared = Arc::new(Mutex::new(Shared {
        inbound: BytesMut::new(),
        outbound: BytesMut::new(),
        write_budget: None,
        fail_writes: false,
        events: None,
        open: false,
        write_calls: 0,
    }));
    (
        MemoryStream {
            shared: Arc::clone(&shared),
        },
        MemoryPeer { shared },
    )
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ByteStream for MemoryStream {
    fn open(&mut self, events: StreamEvents) -> Result<()> {
        let mut shared = lock(&self.shared);
        if shared.open {
            return Err(TransportError::AlreadyOpen);
        }
        shared.open = true;
        events.notify(StreamEvent::OpenCompleted);
        events.notify(StreamEvent::SpaceAvailable);
        if !shared.inbound.is_empty() {
            events.notify(StreamEvent::BytesAvailable);
        }
        shared.events = Some(events);
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let mut shared = lock(&self.shared);
        if !shared.open {
            return Err(TransportError::NotOpen);
        }
        shared.write_calls += 1;
        if shared.fail_writes {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "memory stream write failure",
            )));
        }

        let n = match shared.write_budget {
            Some(budget) => budget.min(buf.len()),
            None => buf.len(),
        };
        if let Some(budget) = shared.write_budget.as_mut() {
            *budget -= n;
        }
        shared.outbound.extend_from_slice(&buf[..n]);

        // Unthrottled writes drain instantly, so space is available again.
        if shared.write_budget.is_none() {
            shared.notify(StreamEvent::SpaceAvailable);
        }
        Ok(n)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut shared = lock(&self.shared);
        if !shared.open {
            return Err(TransportError::NotOpen);
        }
        let n = shared.inbound.len().min(buf.len());
        buf[..n].copy_from_slice(&shared.inbound[..n]);
        shared.inbound.advance(n);
        Ok(n)
    }

    fn has_bytes_available(&self) -> bool {
        !lock(&self.shared).inbound.is_empty()
    }

    fn close(&mut self) {
        let mut shared = lock(&self.shared);
        shared.open = false;
        shared.events = None;
    }

    fn transport_name(&self) -> &'static str {
        "memory"
    }
}

impl MemoryPeer {
    /// Append raw bytes to the stream's inbound side and signal readability.
    pub fn push_inbound(&self, bytes: &[u8]) {
        let mut shared = lock(&self.shared);
        shared.inbound.extend_from_slice(bytes);
        shared.notify(StreamEvent::BytesAvailable);
    }

    /// Prefix `body` with its little-endian u16 length and push it inbound.
    pub fn push_frame(&self, body: &[u8]) {
        let mut framed = BytesMut::with_capacity(body.len() + 2);
        framed.put_u16_le(body.len() as u16);
        framed.extend_from_slice(body);
        self.push_inbound(&framed);
    }

    /// Signal readability without adding bytes.
    pub fn nudge_readable(&self) {
        lock(&self.shared).notify(StreamEvent::BytesAvailable);
    }

    /// Take everything written so far.
    pub fn take_written(&self) -> Bytes {
        lock(&self.shared).outbound.split().freeze()
    }

    /// Pop the next complete length-prefixed frame (prefix included).
    pub fn pop_written_frame(&self) -> Option<Bytes> {
        let mut shared = lock(&self.shared);
        if shared.outbound.len() < 2 {
            return None;
        }
        let len = u16::from_le_bytes([shared.outbound[0], shared.outbound[1]]) as usize;
        if shared.outbound.len() < len + 2 {
            return None;
        }
        Some(shared.outbound.split_to(len + 2).freeze())
    }

    /// Limit how many more bytes the stream accepts. `None` removes the limit.
    pub fn set_write_budget(&self, budget: Option<usize>) {
        lock(&self.shared).write_budget = budget;
    }

    /// Raise the write budget by `extra` bytes and signal writability.
    pub fn grant_space(&self, extra: usize) {
        let mut shared = lock(&self.shared);
        if let Some(budget) = shared.write_budget.as_mut() {
            *budget += extra;
        }
        shared.notify(StreamEvent::SpaceAvailable);
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self, fail: bool) {
        lock(&self.shared).fail_writes = fail;
    }

    /// Report a stream error to the owner.
    pub fn raise_error(&self, message: &str) {
        lock(&self.shared).notify(StreamEvent::ErrorOccurred(message.to_string()));
    }

    /// Report end-of-stream to the owner.
    pub fn disconnect(&self) {
        lock(&self.shared).notify(StreamEvent::EndEncountered);
    }

    /// Whether the stream side is currently open.
    pub fn is_open(&self) -> bool {
        lock(&self.shared).open
    }

    /// Number of `write` calls the stream has received.
    pub fn write_calls(&self) -> usize {
        lock(&self.shared).write_calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_frames_are_split_on_length_prefix() {
        let (mut stream, peer) = memory_pair();
        let (events, _rx) = StreamEvents::channel();
        stream.open(events).unwrap();

        stream.write(&[0x03, 0x00, 0x01, 0x00, 0x80]).unwrap();
        stream.write(&[0x02, 0x00, 0x02]).unwrap();

        assert_eq!(
            peer.pop_written_frame().unwrap().as_ref(),
            &[0x03, 0x00, 0x01, 0x00, 0x80]
        );
        // Second frame is incomplete.
        assert!(peer.pop_written_frame().is_none());
        assert_eq!(peer.take_written().as_ref(), &[0x02, 0x00, 0x02]);
    }

    #[test]
    fn write_budget_limits_accepted_bytes() {
        let (mut stream, peer) = memory_pair();
        let (events, mut rx) = StreamEvents::channel();
        stream.open(events).unwrap();
        while rx.try_recv().is_ok() {}

        peer.set_write_budget(Some(3));
        assert_eq!(stream.write(&[1, 2, 3, 4, 5]).unwrap(), 3);
        assert_eq!(stream.write(&[4, 5]).unwrap(), 0);
        assert!(rx.try_recv().is_err());

        peer.grant_space(2);
        assert_eq!(rx.try_recv().unwrap(), StreamEvent::SpaceAvailable);
        assert_eq!(stream.write(&[4, 5]).unwrap(), 2);
        assert_eq!(peer.take_written().as_ref(), &[1, 2, 3, 4, 5]);
        assert_eq!(peer.write_calls(), 3);
    }

    #[test]
    fn inbound_bytes_signal_and_drain() {
        let (mut stream, peer) = memory_pair();
        let (events, mut rx) = StreamEvents::channel();
        stream.open(events).unwrap();
        while rx.try_recv().is_ok() {}

        peer.push_frame(&[0x01, 0x00, 0x02]);
        assert_eq!(rx.try_recv().unwrap(), StreamEvent::BytesAvailable);
        assert!(stream.has_bytes_available());

        let mut buf = [0u8; 8];
        assert_eq!(stream.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], &[0x03, 0x00, 0x01, 0x00, 0x02]);
        assert!(!stream.has_bytes_available());
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn failing_writes_surface_as_io_errors() {
        let (mut stream, peer) = memory_pair();
        let (events, _rx) = StreamEvents::channel();
        stream.open(events).unwrap();

        peer.fail_writes(true);
        assert!(matches!(stream.write(&[1]), Err(TransportError::Io(_))));
    }

    #[test]
    fn close_stops_io() {
        let (mut stream, peer) = memory_pair();
        let (events, _rx) = StreamEvents::channel();
        stream.open(events).unwrap();
        assert!(peer.is_open());

        stream.close();
        assert!(!peer.is_open());
        assert!(matches!(stream.write(&[1]), Err(TransportError::NotOpen)));
    }
}
