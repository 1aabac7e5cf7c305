use std::time::Duration;

use brickwire_frame::{bytecodec, Command, FrameReader, Reply};
use brickwire_transport::{ByteStream, StreamEvent, StreamEvents, TransportError};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::correlator::{Dispatch, PendingReply, ResponseCorrelator};
use crate::error::{Result, SessionError};
use crate::queue::{QueuedFrame, WriteQueue};

/// Lifecycle of a session. Closed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed,
}

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub bytes_written: u64,
    pub partial_writes: u64,
    pub dropped_frames: u64,
    pub orphaned_replies: u64,
    pub torn_frames: u64,
    pub pending: usize,
    pub queued: usize,
}

/// Everything the session owns, driven from a single task.
///
/// Kept synchronous so the state machine can be exercised without a runtime.
pub(crate) struct SessionCore<S> {
    stream: S,
    config: SessionConfig,
    correlator: ResponseCorrelator,
    queue: WriteQueue,
    reader: FrameReader,
    write_ready: bool,
    paced_until: Option<Instant>,
    closed: bool,
    stats: SessionStats,
}

impl<S: ByteStream> SessionCore<S> {
    pub(crate) fn new(stream: S, config: SessionConfig) -> Self {
        Self {
            stream,
            correlator: ResponseCorrelator::new(),
            queue: WriteQueue::new(config.queue_capacity),
            reader: FrameReader::with_max_frame_len(config.read_mode, config.max_frame_len),
            write_ready: true,
            paced_until: None,
            closed: false,
            stats: SessionStats::default(),
            config,
        }
    }

    pub(crate) fn open(&mut self, events: StreamEvents) -> Result<()> {
        self.stream.open(events)?;
        info!(
            transport = self.stream.transport_name(),
            queue_capacity = self.queue.capacity(),
            pacing_ms = self.config.pacing.as_millis() as u64,
            "session opened"
        );
        Ok(())
    }

    /// Sequence, finalize, register, enqueue. In that order, so the pending
    /// entry exists before any byte can reach the wire.
    pub(crate) fn submit(&mut self, mut command: Command) -> Result<Option<PendingReply>> {
        if self.closed {
            return Err(SessionError::ConnectionClosed);
        }

        let sequence = self.correlator.next_sequence();
        command.assign_sequence(sequence)?;
        let frame = command.finalize()?;
        let pending = if command.expects_reply() {
            Some(self.correlator.register(sequence)?)
        } else {
            None
        };

        trace!(sequence, bytes = %bytecodec::hex_dump(&frame), "frame queued");
        for evicted in self.queue.push(QueuedFrame::new(sequence, frame)) {
            warn!(
                sequence = evicted.sequence,
                queued = self.queue.len(),
                "write queue full, dropping oldest frame"
            );
            self.stats.dropped_frames += 1;
            self.correlator.fail(
                evicted.sequence,
                SessionError::Dropped {
                    sequence: evicted.sequence,
                },
            );
        }
        Ok(pending)
    }

    /// Write the head of the queue if the stream is ready and pacing allows.
    pub(crate) fn pump(&mut self, now: Instant) -> Result<()> {
        if self.closed || !self.write_ready {
            return Ok(());
        }
        if let Some(until) = self.paced_until {
            if now < until {
                return Ok(());
            }
            self.paced_until = None;
        }
        let Some(frame) = self.queue.pop_front() else {
            return Ok(());
        };

        let written = self.stream.write(&frame.bytes)?;
        self.write_ready = false;
        self.stats.bytes_written += written as u64;

        if written == 0 {
            debug!(sequence = frame.sequence, "stream would block, retrying on space");
            self.queue.push_front(frame);
            return Ok(());
        }
        if written < frame.bytes.len() {
            debug!(
                sequence = frame.sequence,
                written,
                remaining = frame.bytes.len() - written,
                "partial write, requeueing remainder"
            );
            self.stats.partial_writes += 1;
            self.queue.push_front(QueuedFrame {
                sequence: frame.sequence,
                bytes: frame.bytes.slice(written..),
                partial: true,
            });
            return Ok(());
        }

        self.stats.frames_sent += 1;
        debug!(sequence = frame.sequence, len = written, "frame written");
        self.paced_until = Some(now + self.config.pacing);
        Ok(())
    }

    /// When the next write may start, if one is waiting only on pacing.
    pub(crate) fn pacing_deadline(&self) -> Option<Instant> {
        if self.closed || !self.write_ready || self.queue.is_empty() {
            return None;
        }
        self.paced_until
    }

    /// React to a stream notification. An `Err` means the stream is gone.
    pub(crate) fn on_event(&mut self, event: StreamEvent) -> Result<()> {
        match event {
            StreamEvent::OpenCompleted => {
                debug!("stream reported open");
                Ok(())
            }
            StreamEvent::SpaceAvailable => {
                self.write_ready = true;
                Ok(())
            }
            StreamEvent::BytesAvailable => self.read_frames(),
            StreamEvent::ErrorOccurred(message) => Err(SessionError::Transport(
                TransportError::Io(std::io::Error::other(message)),
            )),
            StreamEvent::EndEncountered => {
                info!("brick closed the stream");
                Err(SessionError::ConnectionClosed)
            }
        }
    }

    fn read_frames(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let frames = self.reader.read_available(&mut self.stream)?;
        self.stats.torn_frames = self.reader.torn_frames();

        for frame in frames {
            self.stats.frames_received += 1;
            match self.correlator.dispatch(frame) {
                Ok(Dispatch::Delivered { sequence }) => {
                    trace!(sequence, "reply delivered");
                }
                Ok(Dispatch::Orphaned { .. }) => self.stats.orphaned_replies += 1,
                // Correlator anomalies cost one frame, never the session.
                Err(err) => debug!(%err, "reply frame dropped"),
            }
        }
        Ok(())
    }

    pub(crate) fn cancel(&mut self, sequence: u16) -> bool {
        let removed = self.correlator.cancel(sequence);
        if removed {
            debug!(sequence, "pending reply cancelled");
        }
        removed
    }

    /// Drop queued writes, fail every waiter, close the stream. Idempotent.
    pub(crate) fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let discarded = self.queue.clear().len();
        let failed = self.correlator.fail_all();
        self.stream.close();
        info!(discarded, failed, "session closed");
    }

    pub(crate) fn stats(&self) -> SessionStats {
        SessionStats {
            pending: self.correlator.len(),
            queued: self.queue.len(),
            ..self.stats
        }
    }
}

enum Message {
    Send {
        command: Command,
        ack: oneshot::Sender<Result<Option<PendingReply>>>,
    },
    Cancel {
        sequence: u16,
        ack: oneshot::Sender<bool>,
    },
    Stats {
        ack: oneshot::Sender<SessionStats>,
    },
    Close {
        ack: oneshot::Sender<()>,
    },
}

/// Entry point for opening sessions.
pub struct Session;

impl Session {
    /// Open `stream` and start the session task on the current runtime.
    ///
    /// Every read, write and table update happens on that task; the
    /// returned handle only exchanges messages with it.
    pub fn open<S: ByteStream>(stream: S, config: SessionConfig) -> Result<SessionHandle> {
        let transport = stream.transport_name();
        let mut core = SessionCore::new(stream, config);
        let (events, event_rx) = StreamEvents::channel();
        core.open(events)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Open);
        tokio::spawn(run(core, rx, event_rx, state_tx));

        Ok(SessionHandle {
            tx,
            state: state_rx,
            transport,
        })
    }
}

async fn run<S: ByteStream>(
    mut core: SessionCore<S>,
    mut messages: mpsc::UnboundedReceiver<Message>,
    mut events: mpsc::UnboundedReceiver<StreamEvent>,
    state: watch::Sender<SessionState>,
) {
    loop {
        if let Err(err) = core.pump(Instant::now()) {
            warn!(%err, "write failed, closing session");
            break;
        }
        let deadline = core.pacing_deadline();

        tokio::select! {
            message = messages.recv() => match message {
                Some(Message::Send { command, ack }) => {
                    let _ = ack.send(core.submit(command));
                }
                Some(Message::Cancel { sequence, ack }) => {
                    let _ = ack.send(core.cancel(sequence));
                }
                Some(Message::Stats { ack }) => {
                    let _ = ack.send(core.stats());
                }
                Some(Message::Close { ack }) => {
                    core.close();
                    state.send_replace(SessionState::Closed);
                    let _ = ack.send(());
                    return;
                }
                None => {
                    debug!("all session handles dropped");
                    break;
                }
            },
            Some(event) = events.recv() => {
                if let Err(err) = core.on_event(event) {
                    warn!(%err, "stream failed, closing session");
                    break;
                }
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {}
        }
    }

    core.close();
    state.send_replace(SessionState::Closed);
}

/// Cloneable handle to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Message>,
    state: watch::Receiver<SessionState>,
    transport: &'static str,
}

impl SessionHandle {
    /// Queue `command` for transmission.
    ///
    /// Returns once the frame is queued, with a [`PendingReply`] for reply
    /// command types.
    pub async fn send(&self, command: Command) -> Result<Option<PendingReply>> {
        let (ack, rx) = oneshot::channel();
        self.tx
            .send(Message::Send { command, ack })
            .map_err(|_| SessionError::ConnectionClosed)?;
        rx.await.map_err(|_| SessionError::ConnectionClosed)?
    }

    /// Send a reply command and wait for its reply, with no time limit.
    pub async fn request(&self, command: Command) -> Result<Reply> {
        self.send_expecting_reply(command).await?.await
    }

    /// Send a reply command and wait at most `timeout` for the reply.
    ///
    /// On expiry the pending entry is cancelled, so a late reply is treated
    /// as an orphan.
    pub async fn request_timeout(&self, command: Command, timeout: Duration) -> Result<Reply> {
        let pending = self.send_expecting_reply(command).await?;
        let sequence = pending.sequence();
        match tokio::time::timeout(timeout, pending).await {
            Ok(outcome) => outcome,
            Err(_) => {
                debug!(sequence, ?timeout, "request timed out");
                self.cancel(sequence).await;
                Err(SessionError::Timeout(timeout))
            }
        }
    }

    async fn send_expecting_reply(&self, command: Command) -> Result<PendingReply> {
        if !command.expects_reply() {
            return Err(SessionError::NoReplyExpected);
        }
        self.send(command)
            .await?
            .ok_or(SessionError::NoReplyExpected)
    }

    /// Stop waiting for `sequence`. Returns whether it was still pending.
    pub async fn cancel(&self, sequence: u16) -> bool {
        let (ack, rx) = oneshot::channel();
        if self.tx.send(Message::Cancel { sequence, ack }).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    pub async fn stats(&self) -> Result<SessionStats> {
        let (ack, rx) = oneshot::channel();
        self.tx
            .send(Message::Stats { ack })
            .map_err(|_| SessionError::ConnectionClosed)?;
        rx.await.map_err(|_| SessionError::ConnectionClosed)
    }

    /// Close the session: queued writes are discarded and every pending
    /// reply fails with `ConnectionClosed`.
    pub async fn close(&self) {
        let (ack, rx) = oneshot::channel();
        if self.tx.send(Message::Close { ack }).is_ok() {
            let _ = rx.await;
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Resolves once the session has closed for any reason.
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        let _ = state.wait_for(|s| *s == SessionState::Closed).await;
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use brickwire_frame::opcode;
    use brickwire_transport::{memory_pair, MemoryPeer, MemoryStream};

    use super::*;

    fn open_core(config: SessionConfig) -> (SessionCore<MemoryStream>, MemoryPeer) {
        let (stream, peer) = memory_pair();
        let mut core = SessionCore::new(stream, config);
        let (events, _rx) = StreamEvents::channel();
        core.open(events).unwrap();
        (core, peer)
    }

    fn stop_all() -> Command {
        let mut cmd = Command::direct_no_reply();
        cmd.append_opcode(opcode::OUTPUT_STOP).unwrap();
        cmd
    }

    #[test]
    fn pacing_holds_the_second_write() {
        let (mut core, peer) = open_core(SessionConfig::default());
        core.submit(stop_all()).unwrap();
        core.submit(stop_all()).unwrap();

        let t0 = Instant::now();
        core.pump(t0).unwrap();
        assert!(peer.pop_written_frame().is_some());

        core.on_event(StreamEvent::SpaceAvailable).unwrap();
        core.pump(t0 + Duration::from_millis(124)).unwrap();
        assert!(peer.pop_written_frame().is_none());
        assert_eq!(core.pacing_deadline(), Some(t0 + Duration::from_millis(125)));

        core.pump(t0 + Duration::from_millis(125)).unwrap();
        assert!(peer.pop_written_frame().is_some());
        assert_eq!(core.stats().frames_sent, 2);
    }

    #[test]
    fn write_waits_for_space() {
        let (mut core, peer) = open_core(SessionConfig {
            pacing: Duration::ZERO,
            ..SessionConfig::default()
        });
        core.submit(stop_all()).unwrap();
        core.submit(stop_all()).unwrap();

        let now = Instant::now();
        core.pump(now).unwrap();
        core.pump(now).unwrap();
        assert_eq!(peer.write_calls(), 1);

        core.on_event(StreamEvent::SpaceAvailable).unwrap();
        core.pump(now).unwrap();
        assert_eq!(peer.write_calls(), 2);
    }

    #[test]
    fn partial_write_keeps_remainder_at_head() {
        let (mut core, peer) = open_core(SessionConfig::default());
        peer.set_write_budget(Some(3));
        core.submit(stop_all()).unwrap();

        let now = Instant::now();
        core.pump(now).unwrap();
        assert_eq!(core.stats().partial_writes, 1);
        assert_eq!(core.stats().queued, 1);

        peer.set_write_budget(None);
        core.on_event(StreamEvent::SpaceAvailable).unwrap();
        core.pump(now).unwrap();

        let frame = peer.pop_written_frame().unwrap();
        assert_eq!(frame.len(), 8);
        assert_eq!(&frame[2..4], &[0x01, 0x00]);
        assert_eq!(core.stats().frames_sent, 1);
    }

    #[test]
    fn stream_end_and_error_are_fatal() {
        let (mut core, _peer) = open_core(SessionConfig::default());
        assert!(matches!(
            core.on_event(StreamEvent::EndEncountered),
            Err(SessionError::ConnectionClosed)
        ));
        assert!(matches!(
            core.on_event(StreamEvent::ErrorOccurred("link lost".into())),
            Err(SessionError::Transport(_))
        ));
    }

    #[test]
    fn close_discards_queued_frames_and_fails_waiters() {
        let (mut core, peer) = open_core(SessionConfig::default());
        peer.set_write_budget(Some(0));

        let firmware = || {
            let mut cmd = Command::direct_reply(0x10).unwrap();
            cmd.get_firmware_version(0x10, 0).unwrap();
            cmd
        };
        let mut first = core.submit(firmware()).unwrap().unwrap();
        let mut second = core.submit(firmware()).unwrap().unwrap();
        core.pump(Instant::now()).unwrap();
        assert_eq!(core.stats().queued, 2);
        assert_eq!(core.stats().pending, 2);

        core.close();

        let stats = core.stats();
        assert_eq!(stats.queued, 0);
        assert_eq!(stats.pending, 0);
        assert!(matches!(first.try_take(), Some(Err(SessionError::ConnectionClosed))));
        assert!(matches!(second.try_take(), Some(Err(SessionError::ConnectionClosed))));
        assert!(peer.take_written().is_empty());
    }

    #[test]
    fn submit_after_close_is_rejected() {
        let (mut core, peer) = open_core(SessionConfig::default());
        core.close();
        core.close();
        assert!(!peer.is_open());
        assert!(matches!(
            core.submit(stop_all()),
            Err(SessionError::ConnectionClosed)
        ));
    }

    #[test]
    fn finalized_command_cannot_be_submitted() {
        let (mut core, _peer) = open_core(SessionConfig::default());
        let mut cmd = stop_all();
        cmd.finalize().unwrap();
        assert!(matches!(
            core.submit(cmd),
            Err(SessionError::Frame(brickwire_frame::FrameError::InvalidState(_)))
        ));
    }
}
