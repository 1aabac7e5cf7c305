use brickwire::requests;

use crate::cmd::{send_all, Context, LedArgs};
use crate::exit::{frame_error, CliResult};

pub async fn run(args: LedArgs, ctx: &Context) -> CliResult<i32> {
    let command =
        requests::set_led_pattern(args.pattern).map_err(|err| frame_error("encode failed", err))?;
    send_all(vec![command], ctx).await
}
