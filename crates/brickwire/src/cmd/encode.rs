use brickwire::frame::{Command, CommandType};
use clap::ValueEnum;

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_frames, OutputFormat};

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum TypeArg {
    DirectReply,
    DirectNoReply,
    SystemReply,
    SystemNoReply,
}

impl From<TypeArg> for CommandType {
    fn from(value: TypeArg) -> Self {
        match value {
            TypeArg::DirectReply => CommandType::DirectReply,
            TypeArg::DirectNoReply => CommandType::DirectNoReply,
            TypeArg::SystemReply => CommandType::SystemReply,
            TypeArg::SystemNoReply => CommandType::SystemNoReply,
        }
    }
}

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let frame = encode(&args)?;
    print_frames(&[frame], format);
    Ok(SUCCESS)
}

fn encode(args: &EncodeArgs) -> CliResult<bytes::Bytes> {
    let mut cmd = Command::new(args.command_type.into(), args.global, args.local)
        .map_err(|err| frame_error("invalid command header", err))?;
    for item in &args.items {
        append_item(&mut cmd, item)?;
    }
    cmd.assign_sequence(args.sequence)
        .and_then(|_| cmd.finalize())
        .map_err(|err| frame_error("encode failed", err))
}

fn append_item(cmd: &mut Command, item: &str) -> CliResult<()> {
    let (kind, value) = item
        .split_once(':')
        .ok_or_else(|| CliError::new(USAGE, format!("expected KIND:VALUE, got {item}")))?;

    let appended = match kind {
        "op" => cmd.append_opcode(parse_opcode(value)?),
        "u8" => cmd.append_parameter(parse_number::<u8>(value)?),
        "i16" => cmd.append_parameter(parse_number::<i16>(value)?),
        "u16" => cmd.append_parameter(parse_number::<u16>(value)?),
        "u32" => cmd.append_parameter(parse_number::<u32>(value)?),
        "str" => cmd.append_parameter(value),
        "gv" => cmd.append_global_index(parse_number::<u8>(value)?),
        other => {
            return Err(CliError::new(
                USAGE,
                format!("unknown item kind {other:?} (op, u8, i16, u16, u32, str, gv)"),
            ))
        }
    };
    appended.map_err(|err| frame_error(&format!("cannot append {item}"), err))
}

/// Opcodes are always hex, with or without `0x`.
fn parse_opcode(value: &str) -> CliResult<u16> {
    let digits = value.trim().trim_start_matches("0x");
    u16::from_str_radix(digits, 16)
        .map_err(|_| CliError::new(USAGE, format!("invalid opcode: {value}")))
}

/// Decimal, or hex with a `0x` prefix.
fn parse_number<T: TryFrom<i64>>(value: &str) -> CliResult<T> {
    let value = value.trim();
    let parsed = match value.strip_prefix("0x") {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => value.parse::<i64>(),
    }
    .map_err(|_| CliError::new(USAGE, format!("invalid number: {value}")))?;
    T::try_from(parsed).map_err(|_| CliError::new(USAGE, format!("number out of range: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> EncodeArgs {
        EncodeArgs {
            command_type: TypeArg::DirectReply,
            global: 16,
            local: 0,
            sequence: 0x0102,
            items: items.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn firmware_query_encodes() {
        let frame = encode(&args(&["op:810A", "u8:16", "gv:0"])).unwrap();
        assert_eq!(
            frame.as_ref(),
            &[0x0B, 0x00, 0x02, 0x01, 0x00, 0x10, 0x00, 0x81, 0x0A, 0x81, 0x10, 0xE1, 0x00]
        );
    }

    #[test]
    fn hex_and_negative_numbers() {
        let frame = encode(&EncodeArgs {
            command_type: TypeArg::DirectNoReply,
            global: 0,
            ..args(&["op:0xA4", "u8:0x00", "u8:1", "i16:-2"])
        })
        .unwrap();
        assert_eq!(frame[4], 0x80);
        assert_eq!(&frame[7..], &[0xA4, 0x81, 0x00, 0x81, 0x01, 0x82, 0xFE, 0xFF]);
    }

    #[test]
    fn bad_items_are_usage_errors() {
        assert_eq!(encode(&args(&["u8:300"])).unwrap_err().code, USAGE);
        assert_eq!(encode(&args(&["nope"])).unwrap_err().code, USAGE);
        assert_eq!(encode(&args(&["f32:1.0"])).unwrap_err().code, USAGE);
        assert_eq!(encode(&args(&["str:a\0b"])).unwrap_err().code, USAGE);
    }

    #[test]
    fn oversized_global_region_is_rejected() {
        let err = encode(&EncodeArgs {
            global: 2000,
            ..args(&["op:01"])
        })
        .unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}
