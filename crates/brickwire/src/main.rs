mod cmd;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;

use brickwire::{BrickConfig, SessionConfig};
use clap::Parser;

use crate::cmd::{parse_duration, Command, Context, Target};
use crate::exit::{CliError, CliResult, USAGE};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "brickwire", version, about = "LEGO EV3 brick command-line client")]
struct Cli {
    /// RFCOMM device node bound to the brick (e.g. /dev/rfcomm0).
    #[arg(long, value_name = "PATH", env = "BRICKWIRE_DEVICE", global = true)]
    device: Option<PathBuf>,

    /// Unix socket of a Bluetooth bridge daemon.
    #[arg(
        long,
        value_name = "PATH",
        env = "BRICKWIRE_SOCKET",
        global = true,
        conflicts_with = "device"
    )]
    socket: Option<PathBuf>,

    /// Print encoded frames instead of talking to a brick.
    #[arg(long, global = true)]
    dry_run: bool,

    /// Reply timeout for queries (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", global = true)]
    timeout: String,

    /// Delay after each write (e.g. 125ms).
    #[arg(long, default_value = "125ms", global = true)]
    pacing: String,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr). RUST_LOG overrides.
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn context(&self) -> CliResult<Context> {
        let target = match (&self.device, &self.socket) {
            _ if self.dry_run => Target::DryRun,
            (Some(path), _) => Target::Device(path.clone()),
            (None, Some(path)) => Target::Socket(path.clone()),
            (None, None) if self.needs_brick() => {
                return Err(CliError::new(
                    USAGE,
                    "no brick given: pass --device, --socket or --dry-run",
                ))
            }
            (None, None) => Target::DryRun,
        };

        Ok(Context {
            target,
            format: self.format.unwrap_or_else(OutputFormat::default_for_stdout),
            session: SessionConfig {
                pacing: parse_duration(&self.pacing)?,
                ..SessionConfig::default()
            },
            brick: BrickConfig {
                reply_timeout: parse_duration(&self.timeout)?,
                ..BrickConfig::default()
            },
        })
    }

    fn needs_brick(&self) -> bool {
        !matches!(self.command, Command::Version(_) | Command::Encode(_))
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let result = cli
        .context()
        .and_then(|ctx| cmd::run(cli.command, ctx));

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
