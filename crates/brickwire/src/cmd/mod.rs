use std::path::PathBuf;
use std::time::Duration;

use brickwire::frame::{self, BrickButton, InputPort, LedPattern, OutputPort};
use brickwire::{Brick, BrickConfig, SessionConfig};
use bytes::Bytes;
use clap::{Args, Subcommand};
use tracing::info;

use crate::exit::{brick_error, frame_error, transport_error, CliError, CliResult, USAGE};
use crate::output::{print_frames, OutputFormat};

pub mod encode;
pub mod info;
pub mod led;
pub mod motor;
pub mod poll;
pub mod sensor;
pub mod tone;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print firmware version and battery state.
    Info(InfoArgs),
    /// Play a tone.
    Tone(ToneArgs),
    /// Set the LED pattern.
    Led(LedArgs),
    /// Drive, stop or reset motors.
    Motor(MotorArgs),
    /// Read one sensor port.
    Sensor(SensorArgs),
    /// Poll every sensor port and button.
    Poll(PollArgs),
    /// Encode an arbitrary command and print its frame.
    Encode(EncodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Where commands go.
#[derive(Debug, Clone)]
pub enum Target {
    Device(PathBuf),
    Socket(PathBuf),
    /// Encode and print frames; open nothing.
    DryRun,
}

/// Settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct Context {
    pub target: Target,
    pub format: OutputFormat,
    pub session: SessionConfig,
    pub brick: BrickConfig,
}

pub fn run(command: Command, ctx: Context) -> CliResult<i32> {
    match command {
        Command::Version(args) => version::run(args),
        Command::Encode(args) => encode::run(args, ctx.format),
        other => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|err| crate::exit::io_error("failed to start runtime", err))?;
            runtime.block_on(run_async(other, ctx))
        }
    }
}

async fn run_async(command: Command, ctx: Context) -> CliResult<i32> {
    match command {
        Command::Info(args) => info::run(args, &ctx).await,
        Command::Tone(args) => tone::run(args, &ctx).await,
        Command::Led(args) => led::run(args, &ctx).await,
        Command::Motor(args) => motor::run(args, &ctx).await,
        Command::Sensor(args) => sensor::run(args, &ctx).await,
        Command::Poll(args) => poll::run(args, &ctx).await,
        Command::Version(_) | Command::Encode(_) => Err(CliError::new(
            USAGE,
            "subcommand does not talk to a brick",
        )),
    }
}

/// Open a session to the configured brick.
pub async fn connect(ctx: &Context) -> CliResult<Brick> {
    let brick = match &ctx.target {
        Target::Device(path) => {
            let stream = brickwire::transport::open_device(path)
                .map_err(|err| transport_error("open failed", err))?;
            Brick::open(stream, ctx.session.clone(), ctx.brick.clone())
        }
        #[cfg(unix)]
        Target::Socket(path) => {
            let stream = brickwire::transport::connect_unix(path)
                .map_err(|err| transport_error("connect failed", err))?;
            Brick::open(stream, ctx.session.clone(), ctx.brick.clone())
        }
        #[cfg(not(unix))]
        Target::Socket(_) => {
            return Err(CliError::new(
                USAGE,
                "--socket is only supported on Unix platforms",
            ))
        }
        Target::DryRun => {
            return Err(CliError::new(USAGE, "dry run does not open a brick"));
        }
    }
    .map_err(|err| brick_error("session failed", err))?;

    info!(transport = brick.session().transport_name(), "connected");
    Ok(brick)
}

/// Send fire-and-forget commands, or print them under `--dry-run`.
pub async fn send_all(commands: Vec<frame::Command>, ctx: &Context) -> CliResult<i32> {
    if matches!(ctx.target, Target::DryRun) {
        return dry_run(commands, ctx.format);
    }

    let brick = connect(ctx).await?;
    let count = commands.len();
    for command in commands {
        brick
            .send(command)
            .await
            .map_err(|err| brick_error("send failed", err))?;
    }
    let limit = ctx.session.pacing * (count as u32 + 1) + ctx.brick.reply_timeout;
    let flushed = brick
        .flush(limit)
        .await
        .map_err(|err| brick_error("flush failed", err));
    brick.close().await;
    flushed?;

    info!(count, "commands sent");
    Ok(crate::exit::SUCCESS)
}

/// Number and finalize `commands` locally and print the frames.
pub fn dry_run(commands: Vec<frame::Command>, format: OutputFormat) -> CliResult<i32> {
    let frames = finalize_all(commands)?;
    print_frames(&frames, format);
    Ok(crate::exit::SUCCESS)
}

fn finalize_all(commands: Vec<frame::Command>) -> CliResult<Vec<Bytes>> {
    commands
        .into_iter()
        .zip(1u16..)
        .map(|(mut command, sequence)| {
            command.assign_sequence(sequence)?;
            command.finalize()
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| frame_error("encode failed", err))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

fn parse_port_mode(input: &str) -> Result<(InputPort, u8), String> {
    let (port, mode) = input
        .split_once('=')
        .ok_or_else(|| format!("expected PORT=MODE, got {input}"))?;
    let port: InputPort = port.parse().map_err(|err| format!("{err}"))?;
    let mode: u8 = mode
        .trim()
        .parse()
        .map_err(|_| format!("invalid mode: {mode}"))?;
    Ok((port, mode))
}

#[derive(Args, Debug, Default)]
pub struct InfoArgs {}

#[derive(Args, Debug)]
pub struct ToneArgs {
    /// Frequency in hertz (250-10000).
    #[arg(long, short = 'f', default_value = "440", value_parser = clap::value_parser!(u16).range(250..=10000))]
    pub frequency: u16,
    /// Duration in milliseconds.
    #[arg(long, short = 'd', default_value = "500")]
    pub duration: u16,
    /// Volume (0-100).
    #[arg(long, short = 'v', default_value = "50", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub volume: u8,
}

#[derive(Args, Debug)]
pub struct LedArgs {
    /// Pattern name, e.g. green, red-flash, orange-pulse, black.
    pub pattern: LedPattern,
}

#[derive(Args, Debug)]
pub struct MotorArgs {
    /// Output ports, e.g. A, BC, all.
    pub ports: OutputPort,
    /// Unregulated power (-100..100).
    #[arg(long, allow_hyphen_values = true, conflicts_with = "speed", value_parser = clap::value_parser!(i16).range(-100..=100))]
    pub power: Option<i16>,
    /// Regulated speed (-100..100).
    #[arg(long, allow_hyphen_values = true, value_parser = clap::value_parser!(i16).range(-100..=100))]
    pub speed: Option<i16>,
    /// Run for this many tacho counts.
    #[arg(long, conflicts_with = "time")]
    pub steps: Option<u32>,
    /// Run for this many milliseconds.
    #[arg(long)]
    pub time: Option<u32>,
    /// Brake at the end instead of coasting.
    #[arg(long)]
    pub brake: bool,
    /// Stop the motors.
    #[arg(long, conflicts_with_all = ["power", "speed"])]
    pub stop: bool,
    /// Reset the tacho counters.
    #[arg(long, conflicts_with_all = ["power", "speed"])]
    pub clear_count: bool,
}

#[derive(Args, Debug)]
pub struct SensorArgs {
    /// Input port: 1-4 or A-D.
    pub port: InputPort,
    /// Device mode to read in.
    #[arg(long, default_value = "0")]
    pub mode: u8,
    /// Also report whether this button is held.
    #[arg(long)]
    pub button: Option<BrickButton>,
}

#[derive(Args, Debug)]
pub struct PollArgs {
    /// Time between polls (e.g. 500ms, 2s).
    #[arg(long, default_value = "500ms")]
    pub interval: String,
    /// Stop after N reported snapshots.
    #[arg(long)]
    pub count: Option<usize>,
    /// Report every poll, changed or not.
    #[arg(long)]
    pub always_emit: bool,
    /// Read a port in a specific mode (repeatable), e.g. 3=2.
    #[arg(long = "mode", value_name = "PORT=MODE", value_parser = parse_port_mode)]
    pub modes: Vec<(InputPort, u8)>,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Command type.
    #[arg(long = "type", value_enum, default_value = "direct-reply")]
    pub command_type: encode::TypeArg,
    /// Global region size in bytes.
    #[arg(long, default_value = "0")]
    pub global: u16,
    /// Local region size in bytes.
    #[arg(long, default_value = "0")]
    pub local: u8,
    /// Sequence number to write.
    #[arg(long, default_value = "1")]
    pub sequence: u16,
    /// Items in order: op:HEX, u8:N, i16:N, u16:N, u32:N, str:TEXT, gv:N.
    #[arg(required = true, allow_hyphen_values = true)]
    pub items: Vec<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
    }

    #[test]
    fn port_modes_parse() {
        assert_eq!(parse_port_mode("3=2").unwrap(), (InputPort::Three, 2));
        assert_eq!(parse_port_mode("a=1").unwrap(), (InputPort::A, 1));
        assert!(parse_port_mode("3").is_err());
        assert!(parse_port_mode("9=1").is_err());
    }

    #[test]
    fn dry_run_numbers_frames_from_one() {
        let frames = finalize_all(vec![
            brickwire::requests::play_tone(50, 440, 500).unwrap(),
            brickwire::requests::set_led_pattern(LedPattern::Red).unwrap(),
        ])
        .unwrap();
        assert_eq!(&frames[0][2..4], &[1, 0]);
        assert_eq!(&frames[1][2..4], &[2, 0]);
        assert_eq!(
            u16::from_le_bytes([frames[1][0], frames[1][1]]) as usize,
            frames[1].len() - 2
        );
    }
}
