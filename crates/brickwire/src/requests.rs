//! Ready-made commands for the operations [`Brick`](crate::Brick) exposes,
//! and decoders for their replies.
//!
//! Kept separate from the session so the CLI can encode the same frames in
//! dry-run mode without opening a device.

use brickwire_frame::{
    bytecodec, BrickButton, Command, CommandType, InputPort, LedPattern, OutputPort, Reply, Result,
};

/// Bytes reserved for the firmware version string.
pub const FIRMWARE_LEN: u8 = 0x10;
/// Bytes reserved for a device name.
pub const DEVICE_NAME_LEN: u8 = 0x7F;

const BATTERY_LEVEL_GLOBAL_SIZE: u16 = 8;
const PROGRAM_ID: u16 = 0x01;
const PROGRAM_SIZE_INDEX: u8 = 0;
const PROGRAM_IP_INDEX: u8 = 4;
const PROGRAM_GLOBAL_SIZE: u16 = 8;

pub fn turn_motor_at_power(ports: OutputPort, power: i16) -> Result<Command> {
    let mut cmd = Command::direct_no_reply();
    cmd.turn_motor_at_power(ports, power)?;
    cmd.start_motor(ports)?;
    Ok(cmd)
}

pub fn turn_motor_at_speed(ports: OutputPort, speed: i16) -> Result<Command> {
    let mut cmd = Command::direct_no_reply();
    cmd.turn_motor_at_speed(ports, speed)?;
    cmd.start_motor(ports)?;
    Ok(cmd)
}

pub fn step_motor_at_power(
    ports: OutputPort,
    power: i16,
    steps: u32,
    brake: bool,
) -> Result<Command> {
    let mut cmd = Command::direct_no_reply();
    cmd.step_motor_at_power(ports, power, steps, brake)?;
    Ok(cmd)
}

pub fn step_motor_at_speed(
    ports: OutputPort,
    speed: i16,
    steps: u32,
    brake: bool,
) -> Result<Command> {
    let mut cmd = Command::direct_no_reply();
    cmd.step_motor_at_speed(ports, speed, steps, brake)?;
    Ok(cmd)
}

pub fn turn_motor_at_power_for_time(
    ports: OutputPort,
    power: i16,
    milliseconds: u32,
    brake: bool,
) -> Result<Command> {
    let mut cmd = Command::direct_no_reply();
    cmd.turn_motor_at_power_for_time(ports, power, milliseconds, brake)?;
    Ok(cmd)
}

pub fn turn_motor_at_speed_for_time(
    ports: OutputPort,
    speed: i16,
    milliseconds: u32,
    brake: bool,
) -> Result<Command> {
    let mut cmd = Command::direct_no_reply();
    cmd.turn_motor_at_speed_for_time(ports, speed, milliseconds, brake)?;
    Ok(cmd)
}

pub fn stop_motor(ports: OutputPort, brake: bool) -> Result<Command> {
    let mut cmd = Command::direct_no_reply();
    cmd.stop_motor(ports, brake)?;
    Ok(cmd)
}

pub fn clear_count(ports: OutputPort) -> Result<Command> {
    let mut cmd = Command::direct_no_reply();
    cmd.clear_count(ports)?;
    Ok(cmd)
}

pub fn set_led_pattern(pattern: LedPattern) -> Result<Command> {
    let mut cmd = Command::direct_no_reply();
    cmd.set_led_pattern(pattern)?;
    Ok(cmd)
}

pub fn play_tone(volume: u8, frequency: u16, duration_ms: u16) -> Result<Command> {
    let mut cmd = Command::direct_no_reply();
    cmd.play_tone(volume, frequency, duration_ms)?;
    Ok(cmd)
}

pub fn startup_sound(volume: u8) -> Result<Command> {
    let mut cmd = Command::direct_no_reply();
    cmd.startup_sound(volume)?;
    Ok(cmd)
}

pub fn play_sound(volume: u8, filename: &str) -> Result<Command> {
    let mut cmd = Command::direct_no_reply();
    cmd.play_sound(volume, filename)?;
    Ok(cmd)
}

/// Load and start the program at `filename` in the user slot.
///
/// No reply is requested, but the brick still needs 8 global bytes to pass
/// the image size and address from load to start.
pub fn program_start(filename: &str, debug: bool) -> Result<Command> {
    let mut cmd = Command::new(CommandType::DirectNoReply, PROGRAM_GLOBAL_SIZE, 0)?;
    cmd.program_start(
        PROGRAM_ID,
        filename,
        PROGRAM_SIZE_INDEX,
        PROGRAM_IP_INDEX,
        debug,
    )?;
    Ok(cmd)
}

pub fn program_stop() -> Result<Command> {
    let mut cmd = Command::direct_no_reply();
    cmd.program_stop(PROGRAM_ID)?;
    Ok(cmd)
}

pub fn firmware_version() -> Result<Command> {
    let mut cmd = Command::direct_reply(u16::from(FIRMWARE_LEN))?;
    cmd.get_firmware_version(FIRMWARE_LEN, 0)?;
    Ok(cmd)
}

pub fn device_name(port: InputPort) -> Result<Command> {
    let mut cmd = Command::direct_reply(u16::from(DEVICE_NAME_LEN))?;
    cmd.get_device_name(port, DEVICE_NAME_LEN, 0)?;
    Ok(cmd)
}

pub fn battery_level() -> Result<Command> {
    let mut cmd = Command::direct_reply(BATTERY_LEVEL_GLOBAL_SIZE)?;
    cmd.get_battery_level(0)?;
    Ok(cmd)
}

pub fn battery_voltage() -> Result<Command> {
    let mut cmd = Command::direct_reply(4)?;
    cmd.get_battery_voltage(0)?;
    Ok(cmd)
}

pub fn button_pressed(button: BrickButton) -> Result<Command> {
    let mut cmd = Command::direct_reply(1)?;
    cmd.is_brick_button_pressed(button, 0)?;
    Ok(cmd)
}

pub fn ready_raw(port: InputPort, mode: u8) -> Result<Command> {
    let mut cmd = Command::direct_reply(4)?;
    cmd.ready_raw(port, mode, 0)?;
    Ok(cmd)
}

/// NUL-padded text at the start of the global region.
pub fn decode_text(reply: &Reply) -> String {
    bytecodec::text_until_nul(&reply.payload)
}

pub fn decode_battery_level(reply: &Reply) -> Result<u8> {
    bytecodec::read_u8(&reply.payload, 0)
}

pub fn decode_battery_voltage(reply: &Reply) -> Result<f32> {
    bytecodec::read_f32(&reply.payload, 0)
}

pub fn decode_button_pressed(reply: &Reply) -> Result<bool> {
    Ok(bytecodec::read_u8(&reply.payload, 0)? != 0)
}

pub fn decode_raw(reply: &Reply) -> Result<i32> {
    bytecodec::read_i32(&reply.payload, 0)
}

#[cfg(test)]
mod tests {
    use brickwire_frame::{opcode, ReplyType};
    use bytes::Bytes;

    use super::*;

    fn reply(payload: &[u8]) -> Reply {
        Reply {
            sequence: 1,
            reply_type: ReplyType::DirectReply,
            payload: Bytes::copy_from_slice(payload),
            system_opcode: None,
            system_status: None,
        }
    }

    #[test]
    fn motor_power_is_followed_by_start() {
        let cmd = turn_motor_at_power(OutputPort::B | OutputPort::C, -50).unwrap();
        assert_eq!(
            cmd.payload(),
            &[
                opcode::OUTPUT_POWER as u8,
                0x81,
                0x00,
                0x81,
                0x06,
                0x81,
                0xCE,
                opcode::OUTPUT_START as u8,
                0x81,
                0x00,
                0x81,
                0x06,
            ]
        );
        assert!(!cmd.expects_reply());
    }

    #[test]
    fn startup_sound_is_one_fire_and_forget_frame() {
        let cmd = startup_sound(50).unwrap();
        assert!(!cmd.expects_reply());
        let sound_ready = cmd
            .payload()
            .iter()
            .filter(|&&b| b == opcode::SOUND_READY as u8)
            .count();
        assert_eq!(sound_ready, 3);
        assert!(cmd.payload().starts_with(&[0x94, 0x01, 0x81, 50, 0x82, 0x06, 0x01]));
    }

    #[test]
    fn query_global_sizes() {
        assert_eq!(firmware_version().unwrap().global_size(), 0x10);
        assert_eq!(device_name(InputPort::One).unwrap().global_size(), 0x7F);
        assert_eq!(battery_level().unwrap().global_size(), 8);
        assert_eq!(battery_voltage().unwrap().global_size(), 4);
        assert_eq!(button_pressed(BrickButton::Enter).unwrap().global_size(), 1);
        assert_eq!(ready_raw(InputPort::Two, 0).unwrap().global_size(), 4);
    }

    #[test]
    fn button_query_names_the_requested_button() {
        let cmd = button_pressed(BrickButton::Back).unwrap();
        let payload = cmd.payload();
        assert_eq!(&payload[..2], &[0x83, 0x09]);
        assert_eq!(&payload[2..4], &[0x81, BrickButton::Back.as_byte()]);
        assert_eq!(&payload[4..], &[0xE1, 0x00]);
    }

    #[test]
    fn program_start_reserves_image_slots() {
        let cmd = program_start("../prjs/demo/demo.rbf", false).unwrap();
        assert_eq!(cmd.command_type(), CommandType::DirectNoReply);
        assert_eq!(cmd.global_size(), 8);
        assert!(cmd.payload().starts_with(&[0xC0, 0x08]));
    }

    #[test]
    fn decoders_read_the_global_region() {
        assert_eq!(decode_text(&reply(b"V1.09H\0\0junk")), "V1.09H");
        assert_eq!(decode_battery_level(&reply(&[87, 0, 0, 0])).unwrap(), 87);
        assert_eq!(
            decode_battery_voltage(&reply(&7.5f32.to_le_bytes())).unwrap(),
            7.5
        );
        assert!(decode_button_pressed(&reply(&[1])).unwrap());
        assert!(!decode_button_pressed(&reply(&[0])).unwrap());
        assert_eq!(decode_raw(&reply(&(-12i32).to_le_bytes())).unwrap(), -12);
    }

    #[test]
    fn short_reply_is_truncated() {
        assert!(decode_battery_voltage(&reply(&[0, 0])).is_err());
    }
}
