use clap::Parser;
use miette::Result;
use tracing::info;

use crate::{
	actions::Context,
	display::{self, DisplayArgs},
};

/// Turn the display off.
///
/// Turns off the display and its backlight, and puts the controller to sleep. Useful after a
/// stream was killed without a chance to clean up.
#[derive(Debug, Clone, Parser)]
pub struct OffArgs {
	#[command(flatten)]
	pub display: DisplayArgs,
}

pub fn run(ctx: Context<OffArgs>) -> Result<()> {
	let lcd = display::open(&ctx.args_top.display)?;
	display::finish(lcd, Ok(()))?;
	info!("display off");
	Ok(())
}
