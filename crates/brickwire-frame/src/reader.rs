use bytes::{Buf, Bytes, BytesMut};
use brickwire_transport::ByteStream;
use tracing::{debug, trace, warn};

use crate::bytecodec;
use crate::command::{LENGTH_PREFIX_LEN, MAX_GLOBAL_SIZE};
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 2 * 1024;
const READ_CHUNK_SIZE: usize = 1024;

/// Largest reply body: header, system status and a full global region.
pub const DEFAULT_MAX_FRAME_LEN: usize = MAX_GLOBAL_SIZE as usize + 8;

/// What to do with a frame whose body arrives across several notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Read the prefix, then the body; if either is short, drop what was read.
    #[default]
    DropTorn,
    /// Keep partial frames buffered until the rest arrives.
    Reassemble,
}

enum Step {
    Frame(Bytes),
    Skipped,
    Torn,
    Empty,
}

/// Pulls complete length-prefixed frames out of a [`ByteStream`].
///
/// Returned frames have the prefix stripped: they start at the sequence.
pub struct FrameReader {
    mode: ReadMode,
    max_frame_len: usize,
    buf: BytesMut,
    torn_frames: u64,
}

impl FrameReader {
    pub fn new(mode: ReadMode) -> Self {
        Self::with_max_frame_len(mode, DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(mode: ReadMode, max_frame_len: usize) -> Self {
        Self {
            mode,
            max_frame_len,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            torn_frames: 0,
        }
    }

    pub fn mode(&self) -> ReadMode {
        self.mode
    }

    /// Frames dropped because they were short or oversized.
    pub fn torn_frames(&self) -> u64 {
        self.torn_frames
    }

    /// Bytes held back waiting for the rest of a frame (reassembly only).
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Drain the stream's buffered input into complete frames.
    ///
    /// Keeps reading while the stream reports bytes, so several frames
    /// delivered under one notification all come out. Short reads are
    /// logged and never returned as errors; only stream failures are.
    pub fn read_available<S: ByteStream + ?Sized>(&mut self, stream: &mut S) -> Result<Vec<Bytes>> {
        match self.mode {
            ReadMode::DropTorn => self.read_dropping_torn(stream),
            ReadMode::Reassemble => self.read_reassembling(stream),
        }
    }

    fn read_dropping_torn<S: ByteStream + ?Sized>(&mut self, stream: &mut S) -> Result<Vec<Bytes>> {
        let mut frames = Vec::new();
        loop {
            match self.next_discrete(stream)? {
                Step::Frame(frame) => frames.push(frame),
                Step::Skipped | Step::Torn => {}
                Step::Empty => break,
            }
            if !stream.has_bytes_available() {
                break;
            }
        }
        Ok(frames)
    }

    fn next_discrete<S: ByteStream + ?Sized>(&mut self, stream: &mut S) -> Result<Step> {
        let mut prefix = [0u8; LENGTH_PREFIX_LEN];
        let got = read_up_to(stream, &mut prefix)?;
        if got == 0 {
            debug!("bytes-available notification without data");
            return Ok(Step::Empty);
        }
        if got < LENGTH_PREFIX_LEN {
            warn!(got, "short read on length prefix, dropping");
            self.torn_frames += 1;
            return Ok(Step::Torn);
        }

        let len = u16::from_le_bytes(prefix) as usize;
        if len == 0 {
            trace!("empty frame");
            return Ok(Step::Skipped);
        }

        let mut body = BytesMut::zeroed(len);
        let got = read_up_to(stream, &mut body)?;
        if got < len {
            warn!(expected = len, got, "short read on frame body, dropping torn frame");
            self.torn_frames += 1;
            return Ok(Step::Torn);
        }
        if len > self.max_frame_len {
            warn!(len, max = self.max_frame_len, "oversized frame dropped");
            self.torn_frames += 1;
            return Ok(Step::Torn);
        }

        trace!(len, bytes = %bytecodec::hex_dump(&body), "frame received");
        Ok(Step::Frame(body.freeze()))
    }

    fn read_reassembling<S: ByteStream + ?Sized>(&mut self, stream: &mut S) -> Result<Vec<Bytes>> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let n = stream.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }

        let mut frames = Vec::new();
        while self.buf.len() >= LENGTH_PREFIX_LEN {
            let len = u16::from_le_bytes([self.buf[0], self.buf[1]]) as usize;
            if len > self.max_frame_len {
                // No way to find the next frame boundary; start over.
                warn!(
                    len,
                    max = self.max_frame_len,
                    discarded = self.buf.len(),
                    "oversized frame, discarding reassembly buffer"
                );
                self.torn_frames += 1;
                self.buf.clear();
                break;
            }
            if self.buf.len() < LENGTH_PREFIX_LEN + len {
                trace!(
                    have = self.buf.len(),
                    need = LENGTH_PREFIX_LEN + len,
                    "waiting for rest of frame"
                );
                break;
            }

            self.buf.advance(LENGTH_PREFIX_LEN);
            if len == 0 {
                continue;
            }
            let body = self.buf.split_to(len).freeze();
            trace!(len, bytes = %bytecodec::hex_dump(&body), "frame received");
            frames.push(body);
        }
        Ok(frames)
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new(ReadMode::default())
    }
}

/// Read until `buf` is full or the stream has nothing more right now.
fn read_up_to<S: ByteStream + ?Sized>(stream: &mut S, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use brickwire_transport::{memory_pair, MemoryPeer, MemoryStream, StreamEvents, TransportError};

    use super::*;
    use crate::error::FrameError;

    fn open_pair() -> (MemoryStream, MemoryPeer) {
        let (mut stream, peer) = memory_pair();
        let (events, _rx) = StreamEvents::channel();
        stream.open(events).unwrap();
        (stream, peer)
    }

    #[test]
    fn reads_single_frame() {
        let (mut stream, peer) = open_pair();
        peer.push_frame(&[0x01, 0x00, 0x02, 0xAA]);

        let mut reader = FrameReader::default();
        let frames = reader.read_available(&mut stream).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), &[0x01, 0x00, 0x02, 0xAA]);
    }

    #[test]
    fn reads_back_to_back_frames() {
        let (mut stream, peer) = open_pair();
        peer.push_frame(&[0x01, 0x00, 0x02]);
        peer.push_frame(&[0x02, 0x00, 0x02, 0x07]);

        let mut reader = FrameReader::new(ReadMode::DropTorn);
        let frames = reader.read_available(&mut stream).unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].as_ref(), &[0x02, 0x00, 0x02, 0x07]);
    }

    #[test]
    fn drop_torn_discards_split_body() {
        let (mut stream, peer) = open_pair();
        let mut reader = FrameReader::new(ReadMode::DropTorn);

        peer.push_inbound(&[0x05, 0x00, 0x01, 0x00]);
        assert!(reader.read_available(&mut stream).unwrap().is_empty());
        assert_eq!(reader.torn_frames(), 1);

        // The remainder is misread as a fresh prefix and also dropped.
        peer.push_inbound(&[0x02, 0xAA, 0xBB]);
        assert!(reader.read_available(&mut stream).unwrap().is_empty());

        peer.push_frame(&[0x09, 0x00, 0x02]);
        let frames = reader.read_available(&mut stream).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), &[0x09, 0x00, 0x02]);
    }

    #[test]
    fn drop_torn_counts_short_prefix() {
        let (mut stream, peer) = open_pair();
        let mut reader = FrameReader::default();

        peer.push_inbound(&[0x05]);
        assert!(reader.read_available(&mut stream).unwrap().is_empty());
        assert_eq!(reader.torn_frames(), 1);
        assert!(!stream.has_bytes_available());
    }

    #[test]
    fn reassemble_joins_split_body() {
        let (mut stream, peer) = open_pair();
        let mut reader = FrameReader::new(ReadMode::Reassemble);

        peer.push_inbound(&[0x05, 0x00, 0x01, 0x00]);
        assert!(reader.read_available(&mut stream).unwrap().is_empty());
        assert_eq!(reader.buffered(), 4);

        peer.push_inbound(&[0x02, 0xAA, 0xBB, 0x03]);
        let frames = reader.read_available(&mut stream).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), &[0x01, 0x00, 0x02, 0xAA, 0xBB]);
        assert_eq!(reader.buffered(), 1);
        assert_eq!(reader.torn_frames(), 0);
    }

    #[test]
    fn oversized_frames_are_dropped() {
        let (mut stream, peer) = open_pair();
        let mut reader = FrameReader::with_max_frame_len(ReadMode::DropTorn, 4);

        peer.push_frame(&[0u8; 6]);
        peer.push_frame(&[0x01, 0x00, 0x02]);
        let frames = reader.read_available(&mut stream).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(reader.torn_frames(), 1);

        let mut reader = FrameReader::with_max_frame_len(ReadMode::Reassemble, 4);
        peer.push_frame(&[0u8; 6]);
        assert!(reader.read_available(&mut stream).unwrap().is_empty());
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn zero_length_frames_are_skipped() {
        let (mut stream, peer) = open_pair();
        peer.push_inbound(&[0x00, 0x00]);
        peer.push_frame(&[0x01, 0x00, 0x02]);

        let frames = FrameReader::default().read_available(&mut stream).unwrap();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn stream_failure_propagates() {
        let (mut stream, _peer) = memory_pair();
        let err = FrameReader::default()
            .read_available(&mut stream)
            .unwrap_err();
        assert!(matches!(
            err,
            FrameError::Transport(TransportError::NotOpen)
        ));
    }
}
