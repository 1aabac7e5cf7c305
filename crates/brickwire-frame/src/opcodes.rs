//! Opcode and status tables.
//!
//! Sub-command opcodes are folded into a `u16` as `(opcode << 8) | subcode`;
//! [`crate::Command::append_opcode`] splits them back apart on the wire.

use crate::error::FrameError;

/// Direct-command opcodes.
pub mod opcode {
    pub const PROGRAM_STOP: u16 = 0x02;
    pub const PROGRAM_START: u16 = 0x03;

    pub const UI_READ_GET_VBATT: u16 = 0x8101;
    pub const UI_READ_GET_FIRMWARE: u16 = 0x810A;
    pub const UI_READ_GET_LBATT: u16 = 0x8112;
    pub const UI_WRITE_LED: u16 = 0x821B;
    pub const UI_BUTTON_PRESSED: u16 = 0x8309;

    pub const UI_DRAW_UPDATE: u16 = 0x8400;
    pub const UI_DRAW_CLEAN: u16 = 0x8401;
    pub const UI_DRAW_PIXEL: u16 = 0x8402;
    pub const UI_DRAW_LINE: u16 = 0x8403;
    pub const UI_DRAW_CIRCLE: u16 = 0x8404;
    pub const UI_DRAW_TEXT: u16 = 0x8405;
    pub const UI_DRAW_FILL_RECT: u16 = 0x8409;
    pub const UI_DRAW_RECT: u16 = 0x840A;
    pub const UI_DRAW_INVERSE_RECT: u16 = 0x8410;
    pub const UI_DRAW_SELECT_FONT: u16 = 0x8411;
    pub const UI_DRAW_TOPLINE: u16 = 0x8412;
    pub const UI_DRAW_FILL_WINDOW: u16 = 0x8413;
    pub const UI_DRAW_DOT_LINE: u16 = 0x8415;
    pub const UI_DRAW_FILL_CIRCLE: u16 = 0x8418;
    pub const UI_DRAW_BMP_FILE: u16 = 0x841C;

    pub const TIMER_WAIT: u16 = 0x85;

    pub const SOUND_BREAK: u16 = 0x9400;
    pub const SOUND_TONE: u16 = 0x9401;
    pub const SOUND_PLAY: u16 = 0x9402;
    pub const SOUND_REPEAT: u16 = 0x9403;
    pub const SOUND_SERVICE: u16 = 0x9404;
    pub const SOUND_READY: u16 = 0x96;

    pub const INPUT_DEVICE_GET_TYPE_MODE: u16 = 0x9905;
    pub const INPUT_DEVICE_CLEAR_ALL: u16 = 0x990A;
    pub const INPUT_DEVICE_GET_DEVICE_NAME: u16 = 0x9915;
    pub const INPUT_DEVICE_GET_MODE_NAME: u16 = 0x9916;
    pub const INPUT_DEVICE_CLEAR_CHANGES: u16 = 0x991A;
    pub const INPUT_DEVICE_READY_PCT: u16 = 0x991B;
    pub const INPUT_DEVICE_READY_RAW: u16 = 0x991C;
    pub const INPUT_DEVICE_READY_SI: u16 = 0x991D;

    pub const INPUT_READ: u16 = 0x9A;
    pub const INPUT_READ_SI: u16 = 0x9D;
    pub const INPUT_READ_EXT: u16 = 0x9E;

    pub const OUTPUT_SET_TYPE: u16 = 0xA1;
    pub const OUTPUT_RESET: u16 = 0xA2;
    pub const OUTPUT_STOP: u16 = 0xA3;
    pub const OUTPUT_POWER: u16 = 0xA4;
    pub const OUTPUT_SPEED: u16 = 0xA5;
    pub const OUTPUT_START: u16 = 0xA6;
    pub const OUTPUT_POLARITY: u16 = 0xA7;
    pub const OUTPUT_READY: u16 = 0xAA;
    pub const OUTPUT_STEP_POWER: u16 = 0xAC;
    pub const OUTPUT_TIME_POWER: u16 = 0xAD;
    pub const OUTPUT_STEP_SPEED: u16 = 0xAE;
    pub const OUTPUT_TIME_SPEED: u16 = 0xAF;
    pub const OUTPUT_STEP_SYNC: u16 = 0xB0;
    pub const OUTPUT_TIME_SYNC: u16 = 0xB1;
    pub const OUTPUT_CLEAR_COUNT: u16 = 0xB2;
    pub const OUTPUT_GET_COUNT: u16 = 0xB3;

    pub const FILE_LOAD_IMAGE: u16 = 0xC008;

    /// Highest single-byte opcode. Anything above is written as two bytes.
    pub const TST: u16 = 0xFF;
}

/// System-command opcodes.
pub mod system_opcode {
    pub const BEGIN_DOWNLOAD: u16 = 0x92;
    pub const CONTINUE_DOWNLOAD: u16 = 0x93;
    pub const CLOSE_FILE_HANDLE: u16 = 0x98;
    pub const CREATE_DIRECTORY: u16 = 0x9B;
    pub const DELETE_FILE: u16 = 0x9C;
}

/// Status byte carried by system replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SystemStatus {
    Success = 0x00,
    UnknownHandle = 0x01,
    HandleNotReady = 0x02,
    CorruptFile = 0x03,
    NoHandlesAvailable = 0x04,
    NoPermission = 0x05,
    IllegalPath = 0x06,
    FileExists = 0x07,
    EndOfFile = 0x08,
    SizeError = 0x09,
    UnknownError = 0x0A,
    IllegalFilename = 0x0B,
    IllegalConnection = 0x0C,
}

impl TryFrom<u8> for SystemStatus {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use SystemStatus::*;
        Ok(match value {
            0x00 => Success,
            0x01 => UnknownHandle,
            0x02 => HandleNotReady,
            0x03 => CorruptFile,
            0x04 => NoHandlesAvailable,
            0x05 => NoPermission,
            0x06 => IllegalPath,
            0x07 => FileExists,
            0x08 => EndOfFile,
            0x09 => SizeError,
            0x0A => UnknownError,
            0x0B => IllegalFilename,
            0x0C => IllegalConnection,
            other => {
                return Err(FrameError::InvalidParameter(format!(
                    "unknown system status 0x{other:02x}"
                )))
            }
        })
    }
}

/// Data format selector for `INPUT_READ`-family opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Format {
    Percent = 0x10,
    Raw = 0x11,
    Si = 0x12,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_byte_opcodes_sit_above_tst() {
        for code in [
            opcode::UI_READ_GET_FIRMWARE,
            opcode::SOUND_TONE,
            opcode::INPUT_DEVICE_READY_SI,
            opcode::FILE_LOAD_IMAGE,
        ] {
            assert!(code > opcode::TST, "0x{code:04x}");
        }
        for code in [opcode::OUTPUT_POWER, opcode::SOUND_READY, opcode::PROGRAM_START] {
            assert!(code <= opcode::TST, "0x{code:04x}");
        }
    }

    #[test]
    fn system_status_table() {
        assert_eq!(SystemStatus::try_from(0).unwrap(), SystemStatus::Success);
        assert_eq!(
            SystemStatus::try_from(0x0C).unwrap(),
            SystemStatus::IllegalConnection
        );
        assert!(SystemStatus::try_from(0x0D).is_err());
    }
}
