//! Whole-brick sensor polling.
//!
//! One DirectReply command reads type, mode and all three value forms from
//! every input port plus the six face buttons. The global region is laid out
//! as eight 11-byte port records followed by one byte per button:
//!
//! | offset | width | field          |
//! |--------|-------|----------------|
//! | +0     | 1     | device type    |
//! | +1     | 1     | device mode    |
//! | +2     | 4     | SI value (f32) |
//! | +6     | 4     | raw value (i32)|
//! | +10    | 1     | percent        |
//!
//! Buttons follow at 88..94 in the order back, left, up, right, down, enter.

use brickwire_frame::{bytecodec, BrickButton, Command, DeviceType, InputPort, Result};

/// Bytes per port record.
pub const PORT_RECORD_LEN: usize = 11;
/// Offset of the first button byte.
pub const BUTTONS_OFFSET: usize = PORT_RECORD_LEN * InputPort::ALL.len();
/// Global region size of the polling command.
pub const POLL_GLOBAL_SIZE: u16 = (BUTTONS_OFFSET + POLLED_BUTTONS.len()) as u16;
/// SI differences at or below this are not reported as changes.
pub const SI_TOLERANCE: f32 = 0.01;

const POLLED_BUTTONS: [BrickButton; 6] = [
    BrickButton::Back,
    BrickButton::Left,
    BrickButton::Up,
    BrickButton::Right,
    BrickButton::Down,
    BrickButton::Enter,
];

/// Readings from one input port.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortState {
    pub port: InputPort,
    pub device: DeviceType,
    pub mode: u8,
    pub si: f32,
    pub raw: i32,
    pub percent: u8,
}

impl PortState {
    fn decode(port: InputPort, record: &[u8]) -> Result<Self> {
        Ok(Self {
            port,
            device: DeviceType::from_byte(bytecodec::read_u8(record, 0)?),
            mode: bytecodec::read_u8(record, 1)?,
            si: bytecodec::read_f32(record, 2)?,
            raw: bytecodec::read_i32(record, 6)?,
            percent: bytecodec::read_u8(record, 10)?,
        })
    }

    /// Mode alone is not a change; a new mode shows up in the values.
    fn differs_from(&self, other: &PortState) -> bool {
        self.device != other.device
            || (self.si - other.si).abs() > SI_TOLERANCE
            || self.raw != other.raw
            || self.percent != other.percent
    }
}

/// Face button states, true while held.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Buttons {
    pub back: bool,
    pub left: bool,
    pub up: bool,
    pub right: bool,
    pub down: bool,
    pub enter: bool,
}

impl Buttons {
    fn decode(src: &[u8]) -> Result<Self> {
        let pressed = |i: usize| bytecodec::read_u8(src, i).map(|b| b == 1);
        Ok(Self {
            back: pressed(0)?,
            left: pressed(1)?,
            up: pressed(2)?,
            right: pressed(3)?,
            down: pressed(4)?,
            enter: pressed(5)?,
        })
    }
}

/// One decoded poll of the whole brick.
#[derive(Debug, Clone, PartialEq)]
pub struct BrickSnapshot {
    pub ports: [PortState; 8],
    pub buttons: Buttons,
}

impl BrickSnapshot {
    /// Decode the global region returned by [`poll_command`].
    pub fn decode(payload: &[u8]) -> Result<Self> {
        // Reject short replies before slicing records.
        bytecodec::read_u8(payload, usize::from(POLL_GLOBAL_SIZE) - 1)?;

        let mut ports = [PortState {
            port: InputPort::One,
            device: DeviceType::Empty,
            mode: 0,
            si: 0.0,
            raw: 0,
            percent: 0,
        }; 8];
        for (i, port) in InputPort::ALL.into_iter().enumerate() {
            let start = i * PORT_RECORD_LEN;
            ports[i] = PortState::decode(port, &payload[start..start + PORT_RECORD_LEN])?;
        }

        Ok(Self {
            ports,
            buttons: Buttons::decode(&payload[BUTTONS_OFFSET..])?,
        })
    }

    pub fn port(&self, port: InputPort) -> &PortState {
        &self.ports[port_index(port)]
    }

    fn differs_from(&self, other: &BrickSnapshot) -> bool {
        self.buttons != other.buttons
            || self
                .ports
                .iter()
                .zip(other.ports.iter())
                .any(|(a, b)| a.differs_from(b))
    }
}

fn port_index(port: InputPort) -> usize {
    InputPort::ALL
        .iter()
        .position(|p| *p == port)
        .unwrap_or_default()
}

/// Build the polling command, reading each port in `modes[i]`.
pub fn poll_command(modes: &[u8; 8]) -> Result<Command> {
    let mut cmd = Command::direct_reply(POLL_GLOBAL_SIZE)?;
    for (i, port) in InputPort::ALL.into_iter().enumerate() {
        let base = (i * PORT_RECORD_LEN) as u8;
        cmd.get_type_mode(port, base, base + 1)?;
        cmd.ready_si(port, modes[i], base + 2)?;
        cmd.ready_raw(port, modes[i], base + 6)?;
        cmd.ready_percent(port, modes[i], base + 10)?;
    }
    for (i, button) in POLLED_BUTTONS.into_iter().enumerate() {
        cmd.is_brick_button_pressed(button, (BUTTONS_OFFSET + i) as u8)?;
    }
    Ok(cmd)
}

/// Tracks the last snapshot and decides which polls are worth reporting.
#[derive(Debug, Clone, Default)]
pub struct SensorPoller {
    modes: [u8; 8],
    always_emit: bool,
    last: Option<BrickSnapshot>,
}

impl SensorPoller {
    /// With `always_emit`, every poll is reported, changed or not.
    pub fn new(always_emit: bool) -> Self {
        Self {
            always_emit,
            ..Self::default()
        }
    }

    pub fn set_mode(&mut self, port: InputPort, mode: u8) {
        self.modes[port_index(port)] = mode;
    }

    pub fn mode(&self, port: InputPort) -> u8 {
        self.modes[port_index(port)]
    }

    pub fn command(&self) -> Result<Command> {
        poll_command(&self.modes)
    }

    pub fn last(&self) -> Option<&BrickSnapshot> {
        self.last.as_ref()
    }

    /// Record `snapshot`; returns whether it should be reported.
    ///
    /// The first snapshot always counts as a change.
    pub fn observe(&mut self, snapshot: BrickSnapshot) -> bool {
        let changed = self
            .last
            .as_ref()
            .is_none_or(|last| last.differs_from(&snapshot));
        self.last = Some(snapshot);
        changed || self.always_emit
    }
}

#[cfg(test)]
mod tests {
    use brickwire_frame::{opcode, CommandType};

    use super::*;

    fn region() -> Vec<u8> {
        let mut data = vec![0u8; usize::from(POLL_GLOBAL_SIZE)];
        for i in 0..8 {
            data[i * PORT_RECORD_LEN] = 0x7E;
        }
        data
    }

    fn set_port(data: &mut [u8], index: usize, device: u8, si: f32, raw: i32, percent: u8) {
        let base = index * PORT_RECORD_LEN;
        data[base] = device;
        data[base + 2..base + 6].copy_from_slice(&si.to_le_bytes());
        data[base + 6..base + 10].copy_from_slice(&raw.to_le_bytes());
        data[base + 10] = percent;
    }

    #[test]
    fn layout_constants() {
        assert_eq!(BUTTONS_OFFSET, 88);
        assert_eq!(POLL_GLOBAL_SIZE, 94);
    }

    #[test]
    fn poll_command_targets_every_record() {
        let cmd = poll_command(&[0; 8]).unwrap();
        assert_eq!(cmd.command_type(), CommandType::DirectReply);
        assert_eq!(cmd.global_size(), 94);

        let payload = cmd.payload();
        // First port: GET_TYPEMODE layer 0, port 0, globals 0 and 1.
        assert_eq!(
            &payload[..8],
            &[0x99, 0x05, 0x81, 0x00, 0x81, 0x00, 0xE1, 0x00]
        );
        assert_eq!(&payload[8..10], &[0xE1, 0x01]);
        // Last button: enter at global 93.
        assert_eq!(
            &payload[payload.len() - 6..],
            &[
                (opcode::UI_BUTTON_PRESSED >> 8) as u8,
                opcode::UI_BUTTON_PRESSED as u8,
                0x81,
                BrickButton::Enter.as_byte(),
                0xE1,
                93
            ]
        );
    }

    #[test]
    fn snapshot_decodes_ports_and_buttons() {
        let mut data = region();
        set_port(&mut data, 0, 16, 1.0, 1, 100);
        set_port(&mut data, 4, 7, 90.5, 181, 0);
        data[BUTTONS_OFFSET + 2] = 1;
        data[BUTTONS_OFFSET + 5] = 1;

        let snapshot = BrickSnapshot::decode(&data).unwrap();
        assert_eq!(snapshot.port(InputPort::One).device, DeviceType::Touch);
        assert_eq!(snapshot.port(InputPort::One).percent, 100);
        let a = snapshot.port(InputPort::A);
        assert_eq!(a.device, DeviceType::LargeMotor);
        assert_eq!(a.si, 90.5);
        assert_eq!(a.raw, 181);
        assert_eq!(snapshot.port(InputPort::Two).device, DeviceType::Empty);
        assert_eq!(
            snapshot.buttons,
            Buttons {
                up: true,
                enter: true,
                ..Buttons::default()
            }
        );
    }

    #[test]
    fn short_region_is_rejected() {
        assert!(BrickSnapshot::decode(&[0u8; 93]).is_err());
    }

    #[test]
    fn small_si_drift_is_not_a_change() {
        let mut poller = SensorPoller::new(false);
        let mut data = region();
        set_port(&mut data, 2, 29, 10.0, 10, 10);
        assert!(poller.observe(BrickSnapshot::decode(&data).unwrap()));
        assert!(!poller.observe(BrickSnapshot::decode(&data).unwrap()));

        set_port(&mut data, 2, 29, 10.005, 10, 10);
        assert!(!poller.observe(BrickSnapshot::decode(&data).unwrap()));

        set_port(&mut data, 2, 29, 10.5, 10, 10);
        assert!(poller.observe(BrickSnapshot::decode(&data).unwrap()));

        data[BUTTONS_OFFSET] = 1;
        assert!(poller.observe(BrickSnapshot::decode(&data).unwrap()));
    }

    #[test]
    fn always_emit_reports_unchanged_polls() {
        let mut poller = SensorPoller::new(true);
        let snapshot = BrickSnapshot::decode(&region()).unwrap();
        assert!(poller.observe(snapshot.clone()));
        assert!(poller.observe(snapshot));
    }

    #[test]
    fn modes_flow_into_the_command() {
        let mut poller = SensorPoller::new(false);
        poller.set_mode(InputPort::Three, 2);
        assert_eq!(poller.mode(InputPort::Three), 2);
        assert_eq!(poller.mode(InputPort::One), 0);

        let default = poll_command(&[0; 8]).unwrap();
        let moded = poller.command().unwrap();
        assert_eq!(default.payload().len(), moded.payload().len());
        assert_ne!(default.payload(), moded.payload());
    }
}
