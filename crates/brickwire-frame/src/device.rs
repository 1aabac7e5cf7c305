//! Port, device, button and LED tables.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use crate::error::FrameError;

/// A sensor input. Ports A-D read the motors' tacho sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InputPort {
    One = 0x00,
    Two = 0x01,
    Three = 0x02,
    Four = 0x03,
    A = 0x10,
    B = 0x11,
    C = 0x12,
    D = 0x13,
}

impl InputPort {
    /// Every input port, in polling order.
    pub const ALL: [InputPort; 8] = [
        InputPort::One,
        InputPort::Two,
        InputPort::Three,
        InputPort::Four,
        InputPort::A,
        InputPort::B,
        InputPort::C,
        InputPort::D,
    ];

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            InputPort::One => "1",
            InputPort::Two => "2",
            InputPort::Three => "3",
            InputPort::Four => "4",
            InputPort::A => "A",
            InputPort::B => "B",
            InputPort::C => "C",
            InputPort::D => "D",
        }
    }
}

impl fmt::Display for InputPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for InputPort {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InputPort::ALL
            .into_iter()
            .find(|port| port.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FrameError::InvalidParameter(format!("unknown input port: {s}")))
    }
}

/// A set of motor outputs, combined with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OutputPort(u8);

impl OutputPort {
    pub const A: OutputPort = OutputPort(0x01);
    pub const B: OutputPort = OutputPort(0x02);
    pub const C: OutputPort = OutputPort(0x04);
    pub const D: OutputPort = OutputPort(0x08);
    pub const ALL: OutputPort = OutputPort(0x0F);

    pub const fn from_bits(bits: u8) -> Self {
        OutputPort(bits & 0x0F)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: OutputPort) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for OutputPort {
    type Output = OutputPort;

    fn bitor(self, rhs: OutputPort) -> OutputPort {
        OutputPort(self.0 | rhs.0)
    }
}

impl BitOrAssign for OutputPort {
    fn bitor_assign(&mut self, rhs: OutputPort) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for OutputPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (port, label) in [
            (OutputPort::A, 'A'),
            (OutputPort::B, 'B'),
            (OutputPort::C, 'C'),
            (OutputPort::D, 'D'),
        ] {
            if self.contains(port) {
                write!(f, "{label}")?;
            }
        }
        Ok(())
    }
}

/// Parses `"all"` or any combination of the letters A-D, e.g. `"BC"`.
impl FromStr for OutputPort {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(OutputPort::ALL);
        }
        let mut ports = OutputPort::default();
        for c in s.chars() {
            ports |= match c.to_ascii_uppercase() {
                'A' => OutputPort::A,
                'B' => OutputPort::B,
                'C' => OutputPort::C,
                'D' => OutputPort::D,
                ',' | '+' => continue,
                _ => {
                    return Err(FrameError::InvalidParameter(format!(
                        "unknown output port: {s}"
                    )))
                }
            };
        }
        if ports.is_empty() {
            return Err(FrameError::InvalidParameter(
                "no output port given".to_string(),
            ));
        }
        Ok(ports)
    }
}

/// Device reported by a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    LargeMotor,
    MediumMotor,
    Touch,
    Color,
    Ultrasonic,
    Gyroscope,
    Infrared,
    Initializing,
    Empty,
    WrongPort,
    Unknown,
    /// A code outside the table, kept verbatim.
    Other(u8),
}

impl DeviceType {
    pub fn from_byte(value: u8) -> Self {
        match value {
            7 => DeviceType::LargeMotor,
            8 => DeviceType::MediumMotor,
            16 => DeviceType::Touch,
            29 => DeviceType::Color,
            30 => DeviceType::Ultrasonic,
            32 => DeviceType::Gyroscope,
            33 => DeviceType::Infrared,
            0x7D => DeviceType::Initializing,
            0x7E => DeviceType::Empty,
            0x7F => DeviceType::WrongPort,
            0xFF => DeviceType::Unknown,
            other => DeviceType::Other(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            DeviceType::LargeMotor => 7,
            DeviceType::MediumMotor => 8,
            DeviceType::Touch => 16,
            DeviceType::Color => 29,
            DeviceType::Ultrasonic => 30,
            DeviceType::Gyroscope => 32,
            DeviceType::Infrared => 33,
            DeviceType::Initializing => 0x7D,
            DeviceType::Empty => 0x7E,
            DeviceType::WrongPort => 0x7F,
            DeviceType::Unknown => 0xFF,
            DeviceType::Other(code) => code,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::LargeMotor => f.write_str("large-motor"),
            DeviceType::MediumMotor => f.write_str("medium-motor"),
            DeviceType::Touch => f.write_str("touch"),
            DeviceType::Color => f.write_str("color"),
            DeviceType::Ultrasonic => f.write_str("ultrasonic"),
            DeviceType::Gyroscope => f.write_str("gyroscope"),
            DeviceType::Infrared => f.write_str("infrared"),
            DeviceType::Initializing => f.write_str("initializing"),
            DeviceType::Empty => f.write_str("empty"),
            DeviceType::WrongPort => f.write_str("wrong-port"),
            DeviceType::Unknown => f.write_str("unknown"),
            DeviceType::Other(code) => write!(f, "0x{code:02x}"),
        }
    }
}

/// A button on the face of the brick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BrickButton {
    None = 0,
    Up = 1,
    Enter = 2,
    Down = 3,
    Right = 4,
    Left = 5,
    Back = 6,
    Any = 7,
}

impl BrickButton {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl FromStr for BrickButton {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "none" => BrickButton::None,
            "up" => BrickButton::Up,
            "enter" => BrickButton::Enter,
            "down" => BrickButton::Down,
            "right" => BrickButton::Right,
            "left" => BrickButton::Left,
            "back" => BrickButton::Back,
            "any" => BrickButton::Any,
            _ => return Err(FrameError::InvalidParameter(format!("unknown button: {s}"))),
        })
    }
}

/// Pattern for the LEDs around the brick buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LedPattern {
    Black = 0,
    Green = 1,
    Red = 2,
    Orange = 3,
    GreenFlash = 4,
    RedFlash = 5,
    OrangeFlash = 6,
    GreenPulse = 7,
    RedPulse = 8,
    OrangePulse = 9,
}

impl LedPattern {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Accepts kebab or snake case, e.g. `green-flash` or `red_pulse`.
impl FromStr for LedPattern {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase().replace('_', "-");
        Ok(match name.as_str() {
            "black" | "off" => LedPattern::Black,
            "green" => LedPattern::Green,
            "red" => LedPattern::Red,
            "orange" => LedPattern::Orange,
            "green-flash" => LedPattern::GreenFlash,
            "red-flash" => LedPattern::RedFlash,
            "orange-flash" => LedPattern::OrangeFlash,
            "green-pulse" => LedPattern::GreenPulse,
            "red-pulse" => LedPattern::RedPulse,
            "orange-pulse" => LedPattern::OrangePulse,
            _ => {
                return Err(FrameError::InvalidParameter(format!(
                    "unknown LED pattern: {s}"
                )))
            }
        })
    }
}

/// Motor direction for `OUTPUT_POLARITY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum Polarity {
    Backward = -1,
    Opposite = 0,
    Forward = 1,
}

impl Polarity {
    /// Two's-complement byte as sent on the wire.
    pub fn as_byte(self) -> u8 {
        self as i8 as u8
    }
}
