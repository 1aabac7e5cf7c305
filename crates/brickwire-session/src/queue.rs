use std::collections::VecDeque;

use bytes::Bytes;

/// One outbound frame, or what is left of it after a partial write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedFrame {
    pub sequence: u16,
    pub bytes: Bytes,
    /// Part of this frame is already on the wire.
    pub partial: bool,
}

impl QueuedFrame {
    pub fn new(sequence: u16, bytes: Bytes) -> Self {
        Self {
            sequence,
            bytes,
            partial: false,
        }
    }
}

/// Bounded outbound queue that drops the oldest frames when full.
///
/// The newest frame is always kept. A partially written frame is never
/// evicted, since dropping it would desynchronize the peer's framing.
#[derive(Debug)]
pub struct WriteQueue {
    frames: VecDeque<QueuedFrame>,
    capacity: usize,
}

impl WriteQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Enqueue `frame`, returning whatever had to be evicted to make room.
    pub fn push(&mut self, frame: QueuedFrame) -> Vec<QueuedFrame> {
        let mut evicted = Vec::new();
        while self.frames.len() >= self.capacity {
            let Some(oldest) = self.frames.iter().position(|f| !f.partial) else {
                break;
            };
            if let Some(frame) = self.frames.remove(oldest) {
                evicted.push(frame);
            }
        }
        self.frames.push_back(frame);
        evicted
    }

    /// Put a frame (or its unwritten tail) back at the head for retry.
    pub fn push_front(&mut self, frame: QueuedFrame) {
        self.frames.push_front(frame);
    }

    pub fn pop_front(&mut self) -> Option<QueuedFrame> {
        self.frames.pop_front()
    }

    /// Remove everything, oldest first.
    pub fn clear(&mut self) -> Vec<QueuedFrame> {
        self.frames.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
