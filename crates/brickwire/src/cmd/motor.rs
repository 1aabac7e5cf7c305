use brickwire::frame::{Command, FrameError};
use brickwire::requests;

use crate::cmd::{send_all, Context, MotorArgs};
use crate::exit::{frame_error, CliError, CliResult, USAGE};

pub async fn run(args: MotorArgs, ctx: &Context) -> CliResult<i32> {
    let commands = commands(&args)?;
    send_all(commands, ctx).await
}

/// Drive mode picked from the flags: power or speed, then steps, time or
/// run until stopped.
fn commands(args: &MotorArgs) -> CliResult<Vec<Command>> {
    let ports = args.ports;
    if ports.is_empty() {
        return Err(CliError::new(USAGE, "no output ports given"));
    }

    let mut commands = Vec::new();
    if args.clear_count {
        commands.push(requests::clear_count(ports));
    }

    if args.stop {
        commands.push(requests::stop_motor(ports, args.brake));
    } else if let Some(power) = args.power {
        commands.push(match (args.steps, args.time) {
            (Some(steps), _) => requests::step_motor_at_power(ports, power, steps, args.brake),
            (_, Some(ms)) => requests::turn_motor_at_power_for_time(ports, power, ms, args.brake),
            _ => requests::turn_motor_at_power(ports, power),
        });
    } else if let Some(speed) = args.speed {
        commands.push(match (args.steps, args.time) {
            (Some(steps), _) => requests::step_motor_at_speed(ports, speed, steps, args.brake),
            (_, Some(ms)) => requests::turn_motor_at_speed_for_time(ports, speed, ms, args.brake),
            _ => requests::turn_motor_at_speed(ports, speed),
        });
    } else if !args.clear_count {
        return Err(CliError::new(
            USAGE,
            "pass one of --power, --speed, --stop or --clear-count",
        ));
    }

    commands
        .into_iter()
        .collect::<Result<Vec<_>, FrameError>>()
        .map_err(|err| frame_error("encode failed", err))
}
