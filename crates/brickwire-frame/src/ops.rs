//! Named brick operations appended onto a [`Command`].
//!
//! Every output and input operation starts with the daisy-chain layer byte,
//! always 0 here. Power and speed travel as the low byte of the signed value.

use crate::command::Command;
use crate::device::{BrickButton, DeviceType, InputPort, LedPattern, OutputPort, Polarity};
use crate::error::Result;
use crate::opcodes::opcode;

const LAYER: u8 = 0x00;

/// Ramp-down used by [`Command::step_motor_at_power`].
pub const DEFAULT_POWER_RAMP_DOWN: u32 = 10;

/// Frequency (Hz) and duration (ms) of each startup note.
const STARTUP_NOTES: [(u16, u16); 4] = [(262, 150), (330, 150), (392, 150), (523, 300)];

fn low_byte(value: i16) -> u8 {
    value as u8
}

impl Command {
    fn output_header(&mut self, code: u16, ports: OutputPort) -> Result<()> {
        self.append_opcode(code)?;
        self.append_parameter(LAYER)?;
        self.append_parameter(ports.bits())
    }

    fn input_header(&mut self, code: u16, port: InputPort) -> Result<()> {
        self.append_opcode(code)?;
        self.append_parameter(LAYER)?;
        self.append_parameter(port.as_byte())
    }

    pub fn set_led_pattern(&mut self, pattern: LedPattern) -> Result<()> {
        self.append_opcode(opcode::UI_WRITE_LED)?;
        self.append_parameter(pattern.as_byte())
    }

    /// Set motor power (-100..=100). Takes effect after [`start_motor`](Self::start_motor).
    pub fn turn_motor_at_power(&mut self, ports: OutputPort, power: i16) -> Result<()> {
        self.output_header(opcode::OUTPUT_POWER, ports)?;
        self.append_parameter(low_byte(power))
    }

    /// Set regulated motor speed (-100..=100).
    pub fn turn_motor_at_speed(&mut self, ports: OutputPort, speed: i16) -> Result<()> {
        self.output_header(opcode::OUTPUT_SPEED, ports)?;
        self.append_parameter(low_byte(speed))
    }

    pub fn step_motor_at_power(
        &mut self,
        ports: OutputPort,
        power: i16,
        steps: u32,
        brake: bool,
    ) -> Result<()> {
        self.step_motor_at_power_ramped(ports, power, 0, steps, DEFAULT_POWER_RAMP_DOWN, brake)
    }

    /// Power profile in tacho counts: ramp up, constant, ramp down.
    pub fn step_motor_at_power_ramped(
        &mut self,
        ports: OutputPort,
        power: i16,
        ramp_up: u32,
        constant: u32,
        ramp_down: u32,
        brake: bool,
    ) -> Result<()> {
        self.output_header(opcode::OUTPUT_STEP_POWER, ports)?;
        self.profile(low_byte(power), ramp_up, constant, ramp_down, brake)
    }

    pub fn step_motor_at_speed(
        &mut self,
        ports: OutputPort,
        speed: i16,
        steps: u32,
        brake: bool,
    ) -> Result<()> {
        self.step_motor_at_speed_ramped(ports, speed, 0, steps, 0, brake)
    }

    /// Speed profile in tacho counts: ramp up, constant, ramp down.
    pub fn step_motor_at_speed_ramped(
        &mut self,
        ports: OutputPort,
        speed: i16,
        ramp_up: u32,
        constant: u32,
        ramp_down: u32,
        brake: bool,
    ) -> Result<()> {
        self.output_header(opcode::OUTPUT_STEP_SPEED, ports)?;
        self.profile(low_byte(speed), ramp_up, constant, ramp_down, brake)
    }

    pub fn turn_motor_at_power_for_time(
        &mut self,
        ports: OutputPort,
        power: i16,
        milliseconds: u32,
        brake: bool,
    ) -> Result<()> {
        self.output_header(opcode::OUTPUT_TIME_POWER, ports)?;
        self.profile(low_byte(power), 0, milliseconds, 0, brake)
    }

    pub fn turn_motor_at_speed_for_time(
        &mut self,
        ports: OutputPort,
        speed: i16,
        milliseconds: u32,
        brake: bool,
    ) -> Result<()> {
        self.turn_motor_at_speed_for_time_ramped(ports, speed, 0, milliseconds, 0, brake)
    }

    /// Speed profile in milliseconds: ramp up, constant, ramp down.
    pub fn turn_motor_at_speed_for_time_ramped(
        &mut self,
        ports: OutputPort,
        speed: i16,
        ramp_up_ms: u32,
        constant_ms: u32,
        ramp_down_ms: u32,
        brake: bool,
    ) -> Result<()> {
        self.output_header(opcode::OUTPUT_TIME_SPEED, ports)?;
        self.profile(low_byte(speed), ramp_up_ms, constant_ms, ramp_down_ms, brake)
    }

    fn profile(&mut self, level: u8, up: u32, constant: u32, down: u32, brake: bool) -> Result<()> {
        self.append_parameter(level)?;
        self.append_parameter(up)?;
        self.append_parameter(constant)?;
        self.append_parameter(down)?;
        self.append_parameter(brake)
    }

    /// Run two motors in lockstep for `steps` tacho counts.
    ///
    /// `turn_ratio` ranges -200..=200: 0 drives straight, 100 stops the
    /// inner motor, 200 spins the pair in opposite directions.
    pub fn step_motor_sync(
        &mut self,
        ports: OutputPort,
        speed: i16,
        turn_ratio: i16,
        steps: u32,
        brake: bool,
    ) -> Result<()> {
        self.output_header(opcode::OUTPUT_STEP_SYNC, ports)?;
        self.sync_profile(speed, turn_ratio, steps, brake)
    }

    /// Like [`step_motor_sync`](Self::step_motor_sync) with a duration in milliseconds.
    pub fn time_motor_sync(
        &mut self,
        ports: OutputPort,
        speed: i16,
        turn_ratio: i16,
        milliseconds: u32,
        brake: bool,
    ) -> Result<()> {
        self.output_header(opcode::OUTPUT_TIME_SYNC, ports)?;
        self.sync_profile(speed, turn_ratio, milliseconds, brake)
    }

    fn sync_profile(&mut self, speed: i16, turn_ratio: i16, amount: u32, brake: bool) -> Result<()> {
        self.append_parameter(low_byte(speed))?;
        self.append_parameter(turn_ratio)?;
        self.append_parameter(amount)?;
        self.append_parameter(brake)
    }

    pub fn clear_count(&mut self, ports: OutputPort) -> Result<()> {
        self.output_header(opcode::OUTPUT_CLEAR_COUNT, ports)
    }

    pub fn start_motor(&mut self, ports: OutputPort) -> Result<()> {
        self.output_header(opcode::OUTPUT_START, ports)
    }

    pub fn stop_motor(&mut self, ports: OutputPort, brake: bool) -> Result<()> {
        self.output_header(opcode::OUTPUT_STOP, ports)?;
        self.append_parameter(brake)
    }

    /// Make the brick wait for the outputs to finish. No layer byte.
    pub fn output_ready(&mut self, ports: OutputPort) -> Result<()> {
        self.append_opcode(opcode::OUTPUT_READY)?;
        self.append_parameter(ports.bits())
    }

    pub fn output_set_type(&mut self, ports: OutputPort, device: DeviceType) -> Result<()> {
        self.output_header(opcode::OUTPUT_SET_TYPE, ports)?;
        self.append_parameter(device.as_byte())
    }

    pub fn set_polarity(&mut self, ports: OutputPort, polarity: Polarity) -> Result<()> {
        self.output_header(opcode::OUTPUT_POLARITY, ports)?;
        self.append_parameter(polarity.as_byte())
    }

    /// Firmware version string, `max_len` bytes at global `index`.
    pub fn get_firmware_version(&mut self, max_len: u8, index: u8) -> Result<()> {
        self.append_opcode(opcode::UI_READ_GET_FIRMWARE)?;
        self.append_parameter(max_len)?;
        self.append_global_index(index)
    }

    /// One byte at global `index`: non-zero while `button` is held.
    pub fn is_brick_button_pressed(&mut self, button: BrickButton, index: u8) -> Result<()> {
        self.append_opcode(opcode::UI_BUTTON_PRESSED)?;
        self.append_parameter(button.as_byte())?;
        self.append_global_index(index)
    }

    pub fn get_type_mode(&mut self, port: InputPort, type_index: u8, mode_index: u8) -> Result<()> {
        self.input_header(opcode::INPUT_DEVICE_GET_TYPE_MODE, port)?;
        self.append_global_index(type_index)?;
        self.append_global_index(mode_index)
    }

    /// SI value as an f32 at global `index`.
    pub fn ready_si(&mut self, port: InputPort, mode: u8, index: u8) -> Result<()> {
        self.ready(opcode::INPUT_DEVICE_READY_SI, port, mode, index)
    }

    /// Raw value as an i32 at global `index`.
    pub fn ready_raw(&mut self, port: InputPort, mode: u8, index: u8) -> Result<()> {
        self.ready(opcode::INPUT_DEVICE_READY_RAW, port, mode, index)
    }

    /// Percent value as one byte at global `index`.
    pub fn ready_percent(&mut self, port: InputPort, mode: u8, index: u8) -> Result<()> {
        self.ready(opcode::INPUT_DEVICE_READY_PCT, port, mode, index)
    }

    fn ready(&mut self, code: u16, port: InputPort, mode: u8, index: u8) -> Result<()> {
        self.input_header(code, port)?;
        self.append_parameter(0u8)?; // type: keep current
        self.append_parameter(mode)?;
        self.append_parameter(1u8)?; // value count
        self.append_global_index(index)
    }

    pub fn get_device_name(&mut self, port: InputPort, buffer_size: u8, index: u8) -> Result<()> {
        self.input_header(opcode::INPUT_DEVICE_GET_DEVICE_NAME, port)?;
        self.append_parameter(buffer_size)?;
        self.append_global_index(index)
    }

    /// Battery level 0-100 as one byte at global `index`.
    pub fn get_battery_level(&mut self, index: u8) -> Result<()> {
        self.append_opcode(opcode::UI_READ_GET_LBATT)?;
        self.append_global_index(index)
    }

    /// Battery voltage as an f32 at global `index`.
    pub fn get_battery_voltage(&mut self, index: u8) -> Result<()> {
        self.append_opcode(opcode::UI_READ_GET_VBATT)?;
        self.append_global_index(index)
    }

    /// Volume 0-100, frequency 250-10000 Hz, duration in ms.
    pub fn play_tone(&mut self, volume: u8, frequency: u16, duration_ms: u16) -> Result<()> {
        self.append_opcode(opcode::SOUND_TONE)?;
        self.append_parameter(volume)?;
        self.append_parameter(frequency)?;
        self.append_parameter(duration_ms)
    }

    /// Play a sound file stored on the brick.
    pub fn play_sound(&mut self, volume: u8, filename: &str) -> Result<()> {
        self.append_opcode(opcode::SOUND_PLAY)?;
        self.append_parameter(volume)?;
        self.append_parameter(filename)
    }

    /// Make the brick wait for the current sound to finish.
    pub fn sound_ready(&mut self) -> Result<()> {
        self.append_opcode(opcode::SOUND_READY)
    }

    /// Rising C-E-G-C arpeggio, each note waiting for the previous one.
    pub fn startup_sound(&mut self, volume: u8) -> Result<()> {
        for (i, (frequency, duration_ms)) in STARTUP_NOTES.into_iter().enumerate() {
            if i > 0 {
                self.sound_ready()?;
            }
            self.play_tone(volume, frequency, duration_ms)?;
        }
        Ok(())
    }

    /// Load a program image into slot `id`.
    ///
    /// The brick writes the image size and address (each 4 bytes) at the
    /// given global offsets; [`program_start`](Self::program_start) reads
    /// them back.
    pub fn load_image(&mut self, id: u16, name: &str, size_index: u8, ip_index: u8) -> Result<()> {
        self.append_opcode(opcode::FILE_LOAD_IMAGE)?;
        self.append_parameter(id)?;
        self.append_parameter(name)?;
        self.append_global_index(size_index)?;
        self.append_global_index(ip_index)
    }

    pub fn program_start(
        &mut self,
        id: u16,
        filename: &str,
        size_index: u8,
        ip_index: u8,
        debug: bool,
    ) -> Result<()> {
        self.load_image(id, filename, size_index, ip_index)?;
        self.append_opcode(opcode::PROGRAM_START)?;
        self.append_parameter(id)?;
        self.append_global_index(size_index)?;
        self.append_global_index(ip_index)?;
        self.append_parameter(debug)
    }

    pub fn program_stop(&mut self, id: u16) -> Result<()> {
        self.append_opcode(opcode::PROGRAM_STOP)?;
        self.append_parameter(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(build: impl FnOnce(&mut Command) -> Result<()>) -> Vec<u8> {
        let mut cmd = Command::direct_no_reply();
        build(&mut cmd).unwrap();
        cmd.payload().to_vec()
    }

    #[test]
    fn startup_sound_chains_tones_with_sound_ready() {
        let tone = |hz: u16, ms: u16| {
            let [hz_lo, hz_hi] = hz.to_le_bytes();
            let [ms_lo, ms_hi] = ms.to_le_bytes();
            vec![0x94, 0x01, 0x81, 40, 0x82, hz_lo, hz_hi, 0x82, ms_lo, ms_hi]
        };
        let expected = [
            tone(262, 150),
            vec![0x96],
            tone(330, 150),
            vec![0x96],
            tone(392, 150),
            vec![0x96],
            tone(523, 300),
        ]
        .concat();

        assert_eq!(payload(|c| c.startup_sound(40)), expected);
    }

    #[test]
    fn motor_power_sends_low_byte() {
        assert_eq!(
            payload(|c| c.turn_motor_at_power(OutputPort::A | OutputPort::D, -50)),
            vec![0xA4, 0x81, 0x00, 0x81, 0x09, 0x81, 0xCE]
        );
        assert_eq!(
            payload(|c| c.turn_motor_at_speed(OutputPort::B, 100)),
            vec![0xA5, 0x81, 0x00, 0x81, 0x02, 0x81, 100]
        );
    }

    #[test]
    fn step_power_uses_default_ramp_down() {
        let bytes = payload(|c| c.step_motor_at_power(OutputPort::C, 75, 360, true));
        assert_eq!(
            bytes,
            vec![
                0xAC, 0x81, 0x00, 0x81, 0x04, 0x81, 75, //
                0x83, 0, 0, 0, 0, //
                0x83, 0x68, 0x01, 0, 0, //
                0x83, 10, 0, 0, 0, //
                0x81, 0x01,
            ]
        );
    }

    #[test]
    fn sync_sends_turn_ratio_as_short() {
        let bytes = payload(|c| c.time_motor_sync(OutputPort::B | OutputPort::C, 30, -200, 1500, false));
        assert_eq!(
            bytes,
            vec![
                0xB1, 0x81, 0x00, 0x81, 0x06, 0x81, 30, //
                0x82, 0x38, 0xFF, //
                0x83, 0xDC, 0x05, 0, 0, //
                0x81, 0x00,
            ]
        );
    }

    #[test]
    fn stop_and_output_ready() {
        assert_eq!(
            payload(|c| c.stop_motor(OutputPort::ALL, true)),
            vec![0xA3, 0x81, 0x00, 0x81, 0x0F, 0x81, 0x01]
        );
        assert_eq!(
            payload(|c| c.output_ready(OutputPort::A)),
            vec![0xAA, 0x81, 0x01]
        );
    }

    #[test]
    fn tone_parameters() {
        assert_eq!(
            payload(|c| c.play_tone(50, 1000, 500)),
            vec![0x94, 0x01, 0x81, 50, 0x82, 0xE8, 0x03, 0x82, 0xF4, 0x01]
        );
    }

    #[test]
    fn button_pressed_uses_requested_button() {
        assert_eq!(
            payload(|c| c.is_brick_button_pressed(BrickButton::Left, 3)),
            vec![0x83, 0x09, 0x81, 5, 0xE1, 3]
        );
    }

    #[test]
    fn ready_si_layout() {
        assert_eq!(
            payload(|c| c.ready_si(InputPort::Two, 1, 4)),
            vec![0x99, 0x1D, 0x81, 0x00, 0x81, 0x01, 0x81, 0x00, 0x81, 0x01, 0x81, 0x01, 0xE1, 4]
        );
    }

    #[test]
    fn program_start_loads_image_first() {
        let bytes = payload(|c| c.program_start(1, "../prjs/a.rbf", 0, 4, false));
        let mut expected = vec![0xC0, 0x08, 0x82, 0x01, 0x00, 0x84];
        expected.extend_from_slice(b"../prjs/a.rbf");
        expected.extend_from_slice(&[0x00, 0xE1, 0, 0xE1, 4]);
        expected.extend_from_slice(&[0x03, 0x82, 0x01, 0x00, 0xE1, 0, 0xE1, 4, 0x81, 0x00]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn firmware_and_battery_queries() {
        assert_eq!(
            payload(|c| c.get_firmware_version(0x10, 0)),
            vec![0x81, 0x0A, 0x81, 0x10, 0xE1, 0x00]
        );
        assert_eq!(
            payload(|c| c.get_battery_level(0)),
            vec![0x81, 0x12, 0xE1, 0x00]
        );
    }
}
