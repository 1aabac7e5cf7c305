use std::time::Duration;

use brickwire_frame::{BrickButton, Command, InputPort, LedPattern, OutputPort, Reply};
use brickwire_session::{Session, SessionConfig, SessionError, SessionHandle};
use brickwire_transport::ByteStream;
use tracing::{debug, warn};

use crate::error::{BrickError, Result};
use crate::poll::{BrickSnapshot, SensorPoller};
use crate::requests;

/// Default time to wait for a query reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

const FLUSH_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Controller behavior on top of a session.
#[derive(Debug, Clone)]
pub struct BrickConfig {
    /// Upper bound for every query. A query that exceeds it is cancelled.
    pub reply_timeout: Duration,
    /// Report every sensor poll, not only the ones that changed something.
    pub always_emit_poll_events: bool,
}

impl Default for BrickConfig {
    fn default() -> Self {
        Self {
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            always_emit_poll_events: false,
        }
    }
}

/// A connected EV3 brick.
///
/// Motor, LED and sound operations are fire-and-forget: they return once the
/// command is queued. Queries wait for the brick's reply, bounded by
/// [`BrickConfig::reply_timeout`].
#[derive(Debug, Clone)]
pub struct Brick {
    session: SessionHandle,
    config: BrickConfig,
}

impl Brick {
    pub fn new(session: SessionHandle, config: BrickConfig) -> Self {
        Self { session, config }
    }

    /// Open a session on `stream` and wrap it.
    pub fn open<S: ByteStream>(
        stream: S,
        session_config: SessionConfig,
        config: BrickConfig,
    ) -> Result<Self> {
        let session = Session::open(stream, session_config)?;
        Ok(Self::new(session, config))
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn config(&self) -> &BrickConfig {
        &self.config
    }

    /// A poller honoring this brick's `always_emit_poll_events`.
    pub fn poller(&self) -> SensorPoller {
        SensorPoller::new(self.config.always_emit_poll_events)
    }

    /// Queue `command` without waiting for a reply.
    pub async fn send(&self, command: Command) -> Result<()> {
        // A reply command sent this way is abandoned; its reply becomes an orphan.
        let _ = self.session.send(command).await?;
        Ok(())
    }

    /// Send a reply command and wait for a successful reply.
    pub async fn query(&self, command: Command) -> Result<Reply> {
        let reply = self
            .session
            .request_timeout(command, self.config.reply_timeout)
            .await?;
        if reply.is_error() {
            warn!(sequence = reply.sequence, reply_type = ?reply.reply_type, "brick rejected command");
            return Err(BrickError::Rejected {
                sequence: reply.sequence,
            });
        }
        Ok(reply)
    }

    pub async fn turn_motor_at_power(&self, ports: OutputPort, power: i16) -> Result<()> {
        self.send(requests::turn_motor_at_power(ports, power)?).await
    }

    pub async fn turn_motor_at_speed(&self, ports: OutputPort, speed: i16) -> Result<()> {
        self.send(requests::turn_motor_at_speed(ports, speed)?).await
    }

    pub async fn step_motor_at_power(
        &self,
        ports: OutputPort,
        power: i16,
        steps: u32,
        brake: bool,
    ) -> Result<()> {
        self.send(requests::step_motor_at_power(ports, power, steps, brake)?)
            .await
    }

    pub async fn step_motor_at_speed(
        &self,
        ports: OutputPort,
        speed: i16,
        steps: u32,
        brake: bool,
    ) -> Result<()> {
        self.send(requests::step_motor_at_speed(ports, speed, steps, brake)?)
            .await
    }

    pub async fn turn_motor_at_power_for_time(
        &self,
        ports: OutputPort,
        power: i16,
        milliseconds: u32,
        brake: bool,
    ) -> Result<()> {
        self.send(requests::turn_motor_at_power_for_time(
            ports,
            power,
            milliseconds,
            brake,
        )?)
        .await
    }

    pub async fn turn_motor_at_speed_for_time(
        &self,
        ports: OutputPort,
        speed: i16,
        milliseconds: u32,
        brake: bool,
    ) -> Result<()> {
        self.send(requests::turn_motor_at_speed_for_time(
            ports,
            speed,
            milliseconds,
            brake,
        )?)
        .await
    }

    pub async fn stop_motor(&self, ports: OutputPort, brake: bool) -> Result<()> {
        self.send(requests::stop_motor(ports, brake)?).await
    }

    pub async fn clear_count(&self, ports: OutputPort) -> Result<()> {
        self.send(requests::clear_count(ports)?).await
    }

    pub async fn set_led_pattern(&self, pattern: LedPattern) -> Result<()> {
        self.send(requests::set_led_pattern(pattern)?).await
    }

    pub async fn play_tone(&self, volume: u8, frequency: u16, duration_ms: u16) -> Result<()> {
        self.send(requests::play_tone(volume, frequency, duration_ms)?)
            .await
    }

    /// Short rising arpeggio, handy as a "connected" signal.
    pub async fn play_startup_sound(&self, volume: u8) -> Result<()> {
        self.send(requests::startup_sound(volume)?).await
    }

    pub async fn play_sound(&self, volume: u8, filename: &str) -> Result<()> {
        self.send(requests::play_sound(volume, filename)?).await
    }

    pub async fn program_start(&self, filename: &str, debug: bool) -> Result<()> {
        self.send(requests::program_start(filename, debug)?).await
    }

    pub async fn program_stop(&self) -> Result<()> {
        self.send(requests::program_stop()?).await
    }

    pub async fn firmware_version(&self) -> Result<String> {
        let reply = self.query(requests::firmware_version()?).await?;
        Ok(requests::decode_text(&reply))
    }

    pub async fn device_name(&self, port: InputPort) -> Result<String> {
        let reply = self.query(requests::device_name(port)?).await?;
        Ok(requests::decode_text(&reply))
    }

    /// Battery level, 0-100.
    pub async fn battery_level(&self) -> Result<u8> {
        let reply = self.query(requests::battery_level()?).await?;
        Ok(requests::decode_battery_level(&reply)?)
    }

    /// Battery voltage in volts.
    pub async fn battery_voltage(&self) -> Result<f32> {
        let reply = self.query(requests::battery_voltage()?).await?;
        Ok(requests::decode_battery_voltage(&reply)?)
    }

    pub async fn is_button_pressed(&self, button: BrickButton) -> Result<bool> {
        let reply = self.query(requests::button_pressed(button)?).await?;
        Ok(requests::decode_button_pressed(&reply)?)
    }

    pub async fn ready_raw(&self, port: InputPort, mode: u8) -> Result<i32> {
        let reply = self.query(requests::ready_raw(port, mode)?).await?;
        Ok(requests::decode_raw(&reply)?)
    }

    /// Read every port and button once.
    pub async fn snapshot(&self, poller: &SensorPoller) -> Result<BrickSnapshot> {
        let reply = self.query(poller.command()?).await?;
        Ok(BrickSnapshot::decode(&reply.payload)?)
    }

    /// Poll once and return the snapshot if `poller` decides it is worth
    /// reporting.
    pub async fn poll_sensors(&self, poller: &mut SensorPoller) -> Result<Option<BrickSnapshot>> {
        let snapshot = self.snapshot(poller).await?;
        if poller.observe(snapshot.clone()) {
            Ok(Some(snapshot))
        } else {
            debug!("sensor poll unchanged");
            Ok(None)
        }
    }

    /// Wait until every queued frame has been written.
    ///
    /// [`close`](Self::close) discards queued frames, so fire-and-forget
    /// callers flush first.
    pub async fn flush(&self, limit: Duration) -> Result<()> {
        let drained = async {
            loop {
                if self.session.stats().await?.queued == 0 {
                    return Ok::<(), BrickError>(());
                }
                tokio::time::sleep(FLUSH_POLL_INTERVAL).await;
            }
        };
        match tokio::time::timeout(limit, drained).await {
            Ok(outcome) => outcome,
            Err(_) => Err(SessionError::Timeout(limit).into()),
        }
    }

    pub async fn close(&self) {
        self.session.close().await;
    }
}

#[cfg(test)]
mod tests {
    use brickwire_frame::{opcode, DeviceType};
    use brickwire_transport::{memory_pair, MemoryPeer};

    use super::*;
    use crate::poll::{BUTTONS_OFFSET, POLL_GLOBAL_SIZE};

    fn open_brick(config: BrickConfig) -> (Brick, MemoryPeer) {
        let (stream, peer) = memory_pair();
        let brick = Brick::open(stream, SessionConfig::default(), config).unwrap();
        (brick, peer)
    }

    /// Answer the next written frame with `reply_type` and `data`.
    fn answer(peer: MemoryPeer, reply_type: u8, data: Vec<u8>) -> tokio::task::JoinHandle<Vec<u8>> {
        tokio::spawn(async move {
            loop {
                if let Some(frame) = peer.pop_written_frame() {
                    let mut reply = vec![frame[2], frame[3], reply_type];
                    reply.extend_from_slice(&data);
                    peer.push_frame(&reply);
                    return frame.to_vec();
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn firmware_version_is_trimmed_at_nul() {
        let (brick, peer) = open_brick(BrickConfig::default());
        let mut data = b"V1.09H".to_vec();
        data.resize(16, 0);
        let brick_side = answer(peer, 0x02, data);

        assert_eq!(brick.firmware_version().await.unwrap(), "V1.09H");
        let frame = brick_side.await.unwrap();
        assert_eq!(&frame[7..9], &[0x81, 0x0A]);
    }

    #[tokio::test(start_paused = true)]
    async fn battery_and_button_queries_decode() {
        let (brick, peer) = open_brick(BrickConfig::default());
        let level = answer(peer.clone(), 0x02, vec![64, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(brick.battery_level().await.unwrap(), 64);
        level.await.unwrap();

        let button = answer(peer.clone(), 0x02, vec![1]);
        assert!(brick.is_button_pressed(BrickButton::Left).await.unwrap());
        let frame = button.await.unwrap();
        assert_eq!(frame[10], BrickButton::Left.as_byte());

        let volts = answer(peer, 0x02, 7.9f32.to_le_bytes().to_vec());
        assert_eq!(brick.battery_voltage().await.unwrap(), 7.9);
        volts.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn error_reply_is_rejected() {
        let (brick, peer) = open_brick(BrickConfig::default());
        let brick_side = answer(peer, 0x04, vec![0; 4]);

        let err = brick.ready_raw(InputPort::One, 0).await.unwrap_err();
        assert!(matches!(err, BrickError::Rejected { .. }));
        brick_side.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn silent_brick_times_out() {
        let (brick, _peer) = open_brick(BrickConfig {
            reply_timeout: Duration::from_millis(500),
            ..BrickConfig::default()
        });

        let err = brick.device_name(InputPort::Two).await.unwrap_err();
        assert!(matches!(err, BrickError::Session(SessionError::Timeout(_))));
        assert_eq!(brick.session().stats().await.unwrap().pending, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn motor_commands_are_fire_and_forget() {
        let (brick, peer) = open_brick(BrickConfig::default());

        brick.turn_motor_at_speed(OutputPort::A, 40).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        let frame = peer.pop_written_frame().unwrap();
        assert_eq!(frame[4], 0x80);
        assert_eq!(frame[7], opcode::OUTPUT_SPEED as u8);
        assert_eq!(brick.session().stats().await.unwrap().pending, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn startup_sound_goes_out_as_one_frame() {
        let (brick, peer) = open_brick(BrickConfig::default());

        brick.play_startup_sound(30).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        let frame = peer.pop_written_frame().unwrap();
        assert_eq!(frame[4], 0x80);
        assert_eq!(&frame[7..9], &[0x94, 0x01]);
        assert_eq!(frame.last(), Some(&0x01));
        assert!(peer.pop_written_frame().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn flush_waits_for_paced_writes() {
        let (brick, peer) = open_brick(BrickConfig::default());

        brick.stop_motor(OutputPort::ALL, true).await.unwrap();
        brick.set_led_pattern(LedPattern::Green).await.unwrap();
        brick.flush(Duration::from_secs(1)).await.unwrap();

        assert!(peer.pop_written_frame().is_some());
        assert!(peer.pop_written_frame().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn flush_gives_up_on_a_stalled_stream() {
        let (brick, peer) = open_brick(BrickConfig::default());
        peer.set_write_budget(Some(0));

        brick.clear_count(OutputPort::A).await.unwrap();
        let err = brick.flush(Duration::from_millis(300)).await.unwrap_err();
        assert!(matches!(err, BrickError::Session(SessionError::Timeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_reports_changes_only() {
        let (brick, peer) = open_brick(BrickConfig::default());
        let mut poller = brick.poller();

        let mut region = vec![0x7E; usize::from(POLL_GLOBAL_SIZE)];
        region[BUTTONS_OFFSET..].fill(0);

        let first = answer(peer.clone(), 0x02, region.clone());
        let snapshot = brick.poll_sensors(&mut poller).await.unwrap().unwrap();
        assert_eq!(snapshot.ports[0].device, DeviceType::Empty);
        first.await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        let second = answer(peer, 0x02, region);
        assert!(brick.poll_sensors(&mut poller).await.unwrap().is_none());
        second.await.unwrap();
    }
}
