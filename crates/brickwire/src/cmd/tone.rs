use brickwire::requests;

use crate::cmd::{send_all, Context, ToneArgs};
use crate::exit::{frame_error, CliResult};

pub async fn run(args: ToneArgs, ctx: &Context) -> CliResult<i32> {
    let command = requests::play_tone(args.volume, args.frequency, args.duration)
        .map_err(|err| frame_error("encode failed", err))?;
    send_all(vec![command], ctx).await
}
