use brickwire::{requests, Brick};
use serde::Serialize;

use crate::cmd::{connect, dry_run, Context, SensorArgs, Target};
use crate::exit::{brick_error, frame_error, CliResult, SUCCESS};
use crate::output::print_fields;

#[derive(Serialize)]
struct SensorOutput {
    port: String,
    device_name: String,
    mode: u8,
    raw: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    button_pressed: Option<bool>,
}

pub async fn run(args: SensorArgs, ctx: &Context) -> CliResult<i32> {
    if matches!(ctx.target, Target::DryRun) {
        let mut commands = vec![
            requests::device_name(args.port),
            requests::ready_raw(args.port, args.mode),
        ];
        if let Some(button) = args.button {
            commands.push(requests::button_pressed(button));
        }
        let commands = commands
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| frame_error("encode failed", err))?;
        return dry_run(commands, ctx.format);
    }

    let brick = connect(ctx).await?;
    let outcome = query(&brick, &args).await;
    brick.close().await;
    let out = outcome.map_err(|err| brick_error("query failed", err))?;

    let mut fields = vec![
        ("port", out.port.clone()),
        ("device_name", out.device_name.clone()),
        ("mode", out.mode.to_string()),
        ("raw", out.raw.to_string()),
    ];
    if let Some(pressed) = out.button_pressed {
        fields.push(("button_pressed", pressed.to_string()));
    }
    print_fields(&out, &fields, ctx.format);
    Ok(SUCCESS)
}

async fn query(brick: &Brick, args: &SensorArgs) -> brickwire::Result<SensorOutput> {
    let button_pressed = match args.button {
        Some(button) => Some(brick.is_button_pressed(button).await?),
        None => None,
    };
    Ok(SensorOutput {
        port: args.port.to_string(),
        device_name: brick.device_name(args.port).await?,
        mode: args.mode,
        raw: brick.ready_raw(args.port, args.mode).await?,
        button_pressed,
    })
}
