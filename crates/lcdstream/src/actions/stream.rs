use std::{
	fs::File,
	io::{Read, Write, stdin, stdout},
	path::PathBuf,
	sync::atomic::{AtomicBool, Ordering},
};

use clap::{Parser, ValueHint};
use miette::{IntoDiagnostic, Result, WrapErr};
use st7789_spidev_driver::{
	ControlLine, Delay, Driver, Error, FrameBuffer, FrameConverter, FrameRate, SpiBus,
};
use tracing::{debug, info, instrument, warn};

use crate::{
	actions::Context,
	display::{self, DisplayArgs},
	source::{Capture, FrameSource, PixelOrder, RawFrameReader},
};

/// Stream raw video frames to the display.
///
/// Frames are read as raw 24-bit pixels, e.g. from a camera piped through
/// `ffmpeg -f rawvideo -pix_fmt rgb24 -`. Each one is resized to the display if needed, white
/// balanced, converted to RGB565, and sent. Streaming stops at the end of the input or on Ctrl-C,
/// and the display is then turned off.
#[derive(Debug, Clone, Parser)]
pub struct StreamArgs {
	#[command(flatten)]
	pub display: DisplayArgs,

	/// Where to read frames from: a file, a FIFO, or '-' for stdin.
	#[arg(long, short, default_value = "-", value_hint = ValueHint::FilePath)]
	pub input: PathBuf,

	/// Width of the input frames, in pixels.
	#[arg(long, default_value_t = 320, value_parser = clap::value_parser!(u32).range(1..=8192))]
	pub source_width: u32,

	/// Height of the input frames, in pixels.
	#[arg(long, default_value_t = 240, value_parser = clap::value_parser!(u32).range(1..=8192))]
	pub source_height: u32,

	/// Channel order of the input frames.
	#[arg(long, value_enum, default_value_t)]
	pub pixel_order: PixelOrder,

	/// Send frames as they are, without white balance.
	#[arg(long)]
	pub no_white_balance: bool,

	/// Print the frame rate to stdout as frames go out.
	#[arg(long)]
	pub fps: bool,

	/// Give up after this many frames in a row where no data reached the display.
	///
	/// 0 never gives up.
	#[arg(long, default_value_t = 30)]
	pub max_dead_frames: usize,
}

pub fn run(ctx: Context<StreamArgs>) -> Result<()> {
	ctx.watch_interrupts()?;
	let args = &ctx.args_top;

	let input: Box<dyn Read> = if args.input.as_os_str() == "-" {
		Box::new(stdin().lock())
	} else {
		Box::new(
			File::open(&args.input)
				.into_diagnostic()
				.wrap_err_with(|| format!("opening {}", args.input.display()))?,
		)
	};
	let mut source = RawFrameReader::new(
		input,
		args.source_width,
		args.source_height,
		args.pixel_order,
	);

	let mut lcd = display::open(&args.display)?;
	let mut pipeline = Pipeline::new(lcd.width(), lcd.height(), args)?;
	let result = lcd
		.start(&pipeline.frame)
		.and_then(|()| pipeline.run(&mut lcd, &mut source, ctx.running()))
		.map(|frames| info!(frames, "stream ended"));

	if args.fps {
		println!();
	}

	display::finish(lcd, result)?;
	Ok(())
}

/// Capture, convert, send; until the source ends or the running flag is cleared.
#[derive(Debug)]
pub struct Pipeline {
	frame: FrameBuffer,
	converter: FrameConverter,
	fps: FrameRate,
	show_fps: bool,
	max_dead_frames: usize,
}

impl Pipeline {
	pub fn new(width: u16, height: u16, args: &StreamArgs) -> st7789_spidev_driver::Result<Self> {
		Ok(Self {
			frame: FrameBuffer::new(width, height)?,
			converter: FrameConverter::new(!args.no_white_balance),
			fps: FrameRate::new(),
			show_fps: args.fps,
			max_dead_frames: args.max_dead_frames,
		})
	}

	/// Returns how many frames were sent.
	///
	/// Empty captures are skipped. Frames with failed blocks are sent as far as they go. Command
	/// failures, source read errors, and too many dead frames in a row are returned.
	#[instrument(level = "debug", skip_all)]
	pub fn run<B, L, D, S>(
		&mut self,
		lcd: &mut Driver<B, L, D>,
		source: &mut S,
		running: &AtomicBool,
	) -> st7789_spidev_driver::Result<u64>
	where
		B: SpiBus,
		L: ControlLine,
		D: Delay,
		S: FrameSource,
	{
		let mut frames = 0;
		let mut dead = 0;

		while running.load(Ordering::SeqCst) {
			let image = match source.capture()? {
				Capture::Frame(image) => image,
				Capture::Empty => {
					debug!("no frame this cycle");
					continue;
				}
				Capture::Ended => break,
			};

			let rate = self.fps.record_frame();
			if self.show_fps {
				print!("\rFPS: {rate:.2}");
				stdout().flush().ok();
			}

			self.converter.convert(image, &mut self.frame);
			let report = lcd.draw(&self.frame)?;
			frames += 1;

			if report.is_dead() {
				dead += 1;
				warn!(dead, "no block of this frame reached the display");
				if self.max_dead_frames > 0 && dead >= self.max_dead_frames {
					return Err(Error::BusLost { frames: dead });
				}
			} else {
				dead = 0;
			}
		}

		Ok(frames)
	}
}

#[cfg(test)]
mod tests {
	use std::io::{self, Cursor};

	use st7789_spidev_driver::{DriverArgs, Level, SpiTransport};

	use super::*;

	/// A bus where every transfer longer than one byte fails, if so asked.
	#[derive(Debug)]
	struct Bus {
		fail_data: bool,
	}

	impl SpiBus for Bus {
		fn send(&mut self, bytes: &[u8], _: Option<u32>) -> io::Result<()> {
			if self.fail_data && bytes.len() > 1 {
				Err(io::Error::other("message too long"))
			} else {
				Ok(())
			}
		}
	}

	#[derive(Debug)]
	struct Line;

	impl ControlLine for Line {
		fn set(&mut self, _: Level) {}
		fn release(self) {}
	}

	#[derive(Debug)]
	struct NoDelay;

	impl Delay for NoDelay {
		fn delay_ms(&mut self, _: u32) {}
	}

	fn lcd(fail_data: bool) -> Driver<Bus, Line, NoDelay> {
		let args = DriverArgs {
			width: 4,
			height: 2,
			..Default::default()
		};
		Driver::new(
			SpiTransport::new(Bus { fail_data }),
			Line,
			Line,
			Line,
			NoDelay,
			&args,
		)
	}

	fn args(extra: &[&str]) -> StreamArgs {
		StreamArgs::parse_from(["stream"].iter().chain(extra))
	}

	fn source(frames: usize, trailing: usize) -> RawFrameReader<Cursor<Vec<u8>>> {
		let bytes = vec![128; 8 * 6 * 3 * frames + trailing];
		RawFrameReader::new(Cursor::new(bytes), 8, 6, PixelOrder::Rgb)
	}

	#[test]
	fn streams_until_source_ends() {
		let mut lcd = lcd(false);
		let mut pipeline = Pipeline::new(4, 2, &args(&[])).unwrap();
		let running = AtomicBool::new(true);

		let frames = pipeline
			.run(&mut lcd, &mut source(5, 10), &running)
			.unwrap();
		assert_eq!(frames, 5);
	}

	#[test]
	fn stops_when_not_running() {
		let mut lcd = lcd(false);
		let mut pipeline = Pipeline::new(4, 2, &args(&[])).unwrap();
		let running = AtomicBool::new(false);

		let frames = pipeline
			.run(&mut lcd, &mut source(5, 0), &running)
			.unwrap();
		assert_eq!(frames, 0);
	}

	#[test]
	fn lost_bus_is_fatal() {
		let mut lcd = lcd(true);
		let mut pipeline = Pipeline::new(4, 2, &args(&["--max-dead-frames", "3"])).unwrap();
		let running = AtomicBool::new(true);

		let err = pipeline
			.run(&mut lcd, &mut source(10, 0), &running)
			.unwrap_err();
		assert!(matches!(err, Error::BusLost { frames: 3 }));
		assert!(err.is_fatal());
	}

	#[test]
	fn dead_frames_can_be_tolerated() {
		let mut lcd = lcd(true);
		let mut pipeline = Pipeline::new(4, 2, &args(&["--max-dead-frames", "0"])).unwrap();
		let running = AtomicBool::new(true);

		let frames = pipeline
			.run(&mut lcd, &mut source(4, 0), &running)
			.unwrap();
		assert_eq!(frames, 4);
	}

	#[test]
	fn source_errors_are_fatal() {
		struct Broken;
		impl FrameSource for Broken {
			fn capture(&mut self) -> io::Result<Capture<'_>> {
				Err(io::Error::other("camera unplugged"))
			}
		}

		let mut lcd = lcd(false);
		let mut pipeline = Pipeline::new(4, 2, &args(&[])).unwrap();
		let err = pipeline
			.run(&mut lcd, &mut Broken, &AtomicBool::new(true))
			.unwrap_err();
		assert!(matches!(err, Error::Io(_)));
	}
}
