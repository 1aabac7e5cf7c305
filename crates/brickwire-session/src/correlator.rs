use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use brickwire_frame::{FrameError, Reply, ReplyHeader};
use bytes::Bytes;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::error::{Result, SessionError};

type Completion = oneshot::Sender<Result<Reply>>;

/// The caller's side of one outstanding reply.
///
/// Resolves exactly once: with the reply, or with the error that ended the
/// wait. Dropping it abandons the wait; the session reclaims the entry.
#[derive(Debug)]
pub struct PendingReply {
    sequence: u16,
    rx: oneshot::Receiver<Result<Reply>>,
}

impl PendingReply {
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Take the outcome if it has already arrived.
    pub fn try_take(&mut self) -> Option<Result<Reply>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(SessionError::ConnectionClosed)),
        }
    }
}

impl Future for PendingReply {
    type Output = Result<Reply>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|outcome| outcome.unwrap_or(Err(SessionError::ConnectionClosed)))
    }
}

/// What happened to an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Handed to the waiting caller.
    Delivered { sequence: u16 },
    /// Nobody was waiting for this sequence.
    Orphaned { sequence: u16 },
}

/// Sequence allocation and reply matching for one session.
#[derive(Debug, Default)]
pub struct ResponseCorrelator {
    last: u16,
    pending: HashMap<u16, Completion>,
}

impl ResponseCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next sequence: 1, 2, ..., 0xFFFF, 1, ... Never 0.
    pub fn next_sequence(&mut self) -> u16 {
        self.last = match self.last {
            u16::MAX => 1,
            n => n + 1,
        };
        self.last
    }

    /// Start waiting for the reply to `sequence`.
    ///
    /// An entry whose caller already dropped its [`PendingReply`] is
    /// reclaimed; a live one fails with `DuplicateSequence`.
    pub fn register(&mut self, sequence: u16) -> Result<PendingReply> {
        if sequence == 0 {
            return Err(FrameError::InvalidParameter("sequence 0 is reserved".to_string()).into());
        }
        if let Some(existing) = self.pending.get(&sequence) {
            if !existing.is_closed() {
                return Err(SessionError::DuplicateSequence(sequence));
            }
            debug!(sequence, "reclaiming abandoned pending reply");
        }

        let (tx, rx) = oneshot::channel();
        self.pending.insert(sequence, tx);
        trace!(sequence, pending = self.pending.len(), "registered pending reply");
        Ok(PendingReply { sequence, rx })
    }

    /// Match a frame body (length prefix stripped) to its waiter.
    ///
    /// Orphans are not errors. A frame with an unknown reply type, or too
    /// short for its type, is rejected and its entry stays pending.
    pub fn dispatch(&mut self, frame: Bytes) -> Result<Dispatch> {
        let header = ReplyHeader::parse(&frame)?;
        let sequence = header.sequence;

        if !self.pending.contains_key(&sequence) {
            debug!(sequence, reply_type = header.reply_type, "orphaned reply dropped");
            return Ok(Dispatch::Orphaned { sequence });
        }

        let reply = match Reply::decode(frame) {
            Ok(reply) => reply,
            Err(FrameError::UnknownReplyType(reply_type)) => {
                warn!(sequence, reply_type, "reply with unknown type dropped");
                return Err(SessionError::UnknownReplyType {
                    sequence,
                    reply_type,
                });
            }
            Err(err) => {
                warn!(sequence, %err, "malformed reply dropped");
                return Err(err.into());
            }
        };

        if let Some(tx) = self.pending.remove(&sequence) {
            if reply.is_error() {
                debug!(sequence, reply_type = ?reply.reply_type, "brick reported an error");
            }
            if tx.send(Ok(reply)).is_err() {
                debug!(sequence, "reply arrived after caller stopped waiting");
            }
        }
        Ok(Dispatch::Delivered { sequence })
    }

    /// Stop waiting for `sequence`. Returns whether an entry was removed.
    pub fn cancel(&mut self, sequence: u16) -> bool {
        self.pending.remove(&sequence).is_some()
    }

    /// Resolve one entry with an error.
    pub fn fail(&mut self, sequence: u16, err: SessionError) -> bool {
        match self.pending.remove(&sequence) {
            Some(tx) => {
                let _ = tx.send(Err(err));
                true
            }
            None => false,
        }
    }

    /// Resolve every entry with `ConnectionClosed`. Returns how many there were.
    pub fn fail_all(&mut self) -> usize {
        let count = self.pending.len();
        for (_, tx) in self.pending.drain() {
            let _ = tx.send(Err(SessionError::ConnectionClosed));
        }
        count
    }

    pub fn contains(&self, sequence: u16) -> bool {
        self.pending.contains_key(&sequence)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use brickwire_frame::ReplyType;

    use super::*;

    #[test]
    fn sequences_wrap_past_zero() {
        let mut correlator = ResponseCorrelator::new();
        let mut previous = 0u16;
        for i in 0..70_000u32 {
            let seq = correlator.next_sequence();
            assert_ne!(seq, 0);
            if i < 65_535 {
                assert_eq!(seq as u32, i + 1);
            } else if i == 65_535 {
                assert_eq!(previous, 0xFFFF);
                assert_eq!(seq, 1);
            }
            previous = seq;
        }
    }

    #[test]
    fn direct_reply_is_delivered() {
        let mut correlator = ResponseCorrelator::new();
        let seq = correlator.next_sequence();
        let mut pending = correlator.register(seq).unwrap();
        assert!(pending.try_take().is_none());

        let frame = Bytes::from_static(&[0x01, 0x00, 0x02, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(
            correlator.dispatch(frame).unwrap(),
            Dispatch::Delivered { sequence: 1 }
        );

        let reply = pending.try_take().unwrap().unwrap();
        assert_eq!(reply.reply_type, ReplyType::DirectReply);
        assert_eq!(reply.payload.as_ref(), &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(correlator.is_empty());
    }

    #[test]
    fn system_reply_carries_opcode_and_status() {
        let mut correlator = ResponseCorrelator::new();
        let mut pending = correlator.register(0x0203).unwrap();

        let frame = Bytes::from_static(&[0x03, 0x02, 0x03, 0x9B, 0x07, 0xEE]);
        correlator.dispatch(frame).unwrap();

        let reply = pending.try_take().unwrap().unwrap();
        assert_eq!(reply.system_opcode, Some(0x9B));
        assert_eq!(reply.system_status, Some(0x07));
        assert_eq!(reply.payload.as_ref(), &[0xEE]);
    }

    #[test]
    fn orphan_does_not_touch_other_entries() {
        let mut correlator = ResponseCorrelator::new();
        let mut pending = correlator.register(5).unwrap();

        let frame = Bytes::from_static(&[0x06, 0x00, 0x02, 0xFF]);
        assert_eq!(
            correlator.dispatch(frame).unwrap(),
            Dispatch::Orphaned { sequence: 6 }
        );
        assert!(correlator.contains(5));
        assert!(pending.try_take().is_none());

        let unsolicited = Bytes::from_static(&[0x00, 0x00, 0x02]);
        assert!(matches!(
            correlator.dispatch(unsolicited).unwrap(),
            Dispatch::Orphaned { sequence: 0 }
        ));
    }

    #[test]
    fn unknown_reply_type_leaves_entry_pending() {
        let mut correlator = ResponseCorrelator::new();
        let mut pending = correlator.register(9).unwrap();

        let frame = Bytes::from_static(&[0x09, 0x00, 0x7A, 0x01]);
        let err = correlator.dispatch(frame).unwrap_err();
        assert!(matches!(
            err,
            SessionError::UnknownReplyType {
                sequence: 9,
                reply_type: 0x7A
            }
        ));
        assert!(correlator.contains(9));
        assert!(pending.try_take().is_none());
    }

    #[test]
    fn truncated_header_is_an_error() {
        let mut correlator = ResponseCorrelator::new();
        assert!(matches!(
            correlator.dispatch(Bytes::from_static(&[0x01])),
            Err(SessionError::Frame(FrameError::Truncated { .. }))
        ));
    }

    #[test]
    fn duplicate_live_sequence_is_rejected() {
        let mut correlator = ResponseCorrelator::new();
        let _pending = correlator.register(3).unwrap();
        assert!(matches!(
            correlator.register(3),
            Err(SessionError::DuplicateSequence(3))
        ));
    }

    #[test]
    fn abandoned_sequence_is_reclaimed() {
        let mut correlator = ResponseCorrelator::new();
        drop(correlator.register(3).unwrap());
        assert!(correlator.register(3).is_ok());
        assert_eq!(correlator.len(), 1);
    }

    #[test]
    fn zero_cannot_be_registered() {
        let mut correlator = ResponseCorrelator::new();
        assert!(matches!(
            correlator.register(0),
            Err(SessionError::Frame(FrameError::InvalidParameter(_)))
        ));
    }

    #[test]
    fn fail_all_closes_every_waiter() {
        let mut correlator = ResponseCorrelator::new();
        let mut waiters: Vec<_> = (1..=3).map(|s| correlator.register(s).unwrap()).collect();

        assert_eq!(correlator.fail_all(), 3);
        assert!(correlator.is_empty());
        for pending in &mut waiters {
            assert!(matches!(
                pending.try_take(),
                Some(Err(SessionError::ConnectionClosed))
            ));
        }
    }

    #[test]
    fn cancel_and_fail_single_entries() {
        let mut correlator = ResponseCorrelator::new();
        let mut dropped = correlator.register(1).unwrap();
        let _kept = correlator.register(2).unwrap();

        assert!(correlator.fail(1, SessionError::Dropped { sequence: 1 }));
        assert!(matches!(
            dropped.try_take(),
            Some(Err(SessionError::Dropped { sequence: 1 }))
        ));
        assert!(correlator.cancel(2));
        assert!(!correlator.cancel(2));
        assert!(correlator.is_empty());
    }

    #[tokio::test]
    async fn pending_reply_is_a_future() {
        let mut correlator = ResponseCorrelator::new();
        let pending = correlator.register(4).unwrap();
        correlator
            .dispatch(Bytes::from_static(&[0x04, 0x00, 0x02, 0x2A]))
            .unwrap();

        let reply = pending.await.unwrap();
        assert_eq!(reply.sequence, 4);
        assert_eq!(reply.payload.as_ref(), &[0x2A]);
    }
}
