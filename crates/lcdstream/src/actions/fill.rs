use std::{sync::atomic::Ordering, thread::sleep, time::Duration};

use clap::Parser;
use embedded_graphics::pixelcolor::Rgb565;
use miette::Result;
use st7789_spidev_driver::FrameBuffer;
use tracing::info;

use crate::{
	actions::Context,
	display::{self, DisplayArgs},
};

/// Fill the display with one colour.
///
/// This brings the display up from reset and paints it, which makes a quick wiring check. The
/// colour stays up until Ctrl-C, then the display is turned off.
#[derive(Debug, Clone, Parser)]
pub struct FillArgs {
	#[command(flatten)]
	pub display: DisplayArgs,

	/// Red, 0-255.
	pub red: u8,

	/// Green, 0-255.
	pub green: u8,

	/// Blue, 0-255.
	pub blue: u8,
}

pub fn run(ctx: Context<FillArgs>) -> Result<()> {
	ctx.watch_interrupts()?;
	let FillArgs {
		display: ref display_args,
		red,
		green,
		blue,
	} = ctx.args_top;

	let mut lcd = display::open(display_args)?;
	let mut frame = FrameBuffer::new(lcd.width(), lcd.height())?;
	let result = lcd.start(&frame).and_then(|()| {
		frame.fill(Rgb565::new(red >> 3, green >> 2, blue >> 3));
		let report = lcd.draw(&frame)?;
		info!(red, green, blue, ?report, "display filled, Ctrl-C to stop");

		while ctx.running().load(Ordering::SeqCst) {
			sleep(Duration::from_millis(100));
		}
		Ok(())
	});

	display::finish(lcd, result)?;
	Ok(())
}
