use brickwire::{requests, Brick};
use serde::Serialize;

use crate::cmd::{connect, dry_run, Context, InfoArgs, Target};
use crate::exit::{brick_error, frame_error, CliResult, SUCCESS};
use crate::output::print_fields;

#[derive(Serialize)]
struct InfoOutput {
    transport: &'static str,
    firmware: String,
    battery_level: u8,
    battery_voltage: f32,
}

pub async fn run(_args: InfoArgs, ctx: &Context) -> CliResult<i32> {
    if matches!(ctx.target, Target::DryRun) {
        let commands = [
            requests::firmware_version(),
            requests::battery_level(),
            requests::battery_voltage(),
        ]
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| frame_error("encode failed", err))?;
        return dry_run(commands, ctx.format);
    }

    let brick = connect(ctx).await?;
    let outcome = query(&brick).await;
    brick.close().await;
    let out = outcome.map_err(|err| brick_error("query failed", err))?;

    let fields = [
        ("transport", out.transport.to_string()),
        ("firmware", out.firmware.clone()),
        ("battery_level", format!("{}%", out.battery_level)),
        ("battery_voltage", format!("{:.2} V", out.battery_voltage)),
    ];
    print_fields(&out, &fields, ctx.format);
    Ok(SUCCESS)
}

async fn query(brick: &Brick) -> brickwire::Result<InfoOutput> {
    Ok(InfoOutput {
        transport: brick.session().transport_name(),
        firmware: brick.firmware_version().await?,
        battery_level: brick.battery_level().await?,
        battery_voltage: brick.battery_voltage().await?,
    })
}
