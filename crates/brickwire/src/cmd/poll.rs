use brickwire::{Brick, SensorPoller};
use tracing::info;

use crate::cmd::{connect, dry_run, parse_duration, Context, PollArgs, Target};
use crate::exit::{brick_error, frame_error, CliResult, SUCCESS};
use crate::output::print_snapshot;

pub async fn run(args: PollArgs, ctx: &Context) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let mut poller = SensorPoller::new(args.always_emit || ctx.brick.always_emit_poll_events);
    for (port, mode) in &args.modes {
        poller.set_mode(*port, *mode);
    }

    if matches!(ctx.target, Target::DryRun) {
        let command = poller
            .command()
            .map_err(|err| frame_error("encode failed", err))?;
        return dry_run(vec![command], ctx.format);
    }

    let brick = connect(ctx).await?;
    let outcome = tokio::select! {
        outcome = poll_loop(&brick, &mut poller, interval, args.count, ctx) => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            Ok(())
        }
    };
    brick.close().await;
    outcome?;
    Ok(SUCCESS)
}

async fn poll_loop(
    brick: &Brick,
    poller: &mut SensorPoller,
    interval: std::time::Duration,
    count: Option<usize>,
    ctx: &Context,
) -> CliResult<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut reported = 0usize;

    while count.is_none_or(|limit| reported < limit) {
        ticker.tick().await;
        let snapshot = brick
            .poll_sensors(poller)
            .await
            .map_err(|err| brick_error("poll failed", err))?;
        if let Some(snapshot) = snapshot {
            print_snapshot(&snapshot, ctx.format);
            reported += 1;
        }
    }
    Ok(())
}
