use std::{num::ParseIntError, path::PathBuf};

use clap::{Parser, ValueHint};
use st7789_spidev_driver::{
	BLOCK_SIZE, ControlLine, Delay, Driver, DriverArgs, SYSFS_GPIO_ROOT, SpiBus,
};
use tracing::error;

/// Display wiring and geometry.
///
/// Defaults are for a 320x240 panel on the first SPI bus, as wired on the reference board.
#[derive(Debug, Clone, Parser)]
pub struct DisplayArgs {
	/// Path to the spidev device.
	#[arg(
		long,
		env = "LCD_SPI_DEVICE",
		default_value = "/dev/spidev0.0",
		value_hint = ValueHint::FilePath
	)]
	pub spi_device: PathBuf,

	/// GPIO pin number for the display's data/command pin.
	#[arg(long, env = "LCD_DC", default_value_t = 53)]
	pub dc: u32,

	/// GPIO pin number for the display's reset pin.
	#[arg(long, env = "LCD_RESET", default_value_t = 52)]
	pub reset: u32,

	/// GPIO pin number for the display's backlight control pin.
	#[arg(long, env = "LCD_BACKLIGHT", default_value_t = 4)]
	pub backlight: u32,

	/// Root of the sysfs GPIO interface.
	#[arg(
		long,
		env = "LCD_GPIO_ROOT",
		default_value = SYSFS_GPIO_ROOT,
		value_hint = ValueHint::DirPath
	)]
	pub gpio_root: PathBuf,

	/// SPI bus frequency in Hz.
	#[arg(long, env = "LCD_FREQUENCY", default_value_t = 80_000_000)]
	pub frequency: u32,

	/// SPI frequency in Hz for frame data.
	///
	/// Defaults to the bus frequency.
	#[arg(long, env = "LCD_DATA_FREQUENCY")]
	pub data_frequency: Option<u32>,

	/// Display width in pixels.
	#[arg(long, env = "LCD_WIDTH", default_value_t = 320)]
	pub width: u16,

	/// Display height in pixels.
	#[arg(long, env = "LCD_HEIGHT", default_value_t = 240)]
	pub height: u16,

	/// Column offset of the panel in controller memory.
	#[arg(long, env = "LCD_X_OFFSET", default_value_t = 0)]
	pub x_offset: u16,

	/// Row offset of the panel in controller memory.
	#[arg(long, env = "LCD_Y_OFFSET", default_value_t = 0)]
	pub y_offset: u16,

	/// Bytes per SPI transfer when sending frames.
	///
	/// Must not exceed the spidev buffer size, set with `spidev.bufsiz=` on the kernel command line
	/// (4096 by default). Otherwise every block fails with "Message too long".
	#[arg(
		long,
		env = "LCD_BLOCK_SIZE",
		default_value_t = BLOCK_SIZE as u32,
		value_parser = clap::value_parser!(u32).range(1..)
	)]
	pub block_size: u32,

	/// Memory access control byte, which sets the orientation.
	///
	/// Accepts decimal or 0x-prefixed hex.
	#[arg(long, env = "LCD_MADCTL", default_value = "0xA0", value_parser = parse_byte)]
	pub madctl: u8,
}

fn parse_byte(s: &str) -> Result<u8, ParseIntError> {
	match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
		Some(hex) => u8::from_str_radix(hex, 16),
		None => s.parse(),
	}
}

impl From<&DisplayArgs> for DriverArgs {
	fn from(args: &DisplayArgs) -> Self {
		Self {
			spi_device: args.spi_device.clone(),
			gpio_root: args.gpio_root.clone(),
			dc: args.dc,
			reset: args.reset,
			backlight: args.backlight,
			frequency: args.frequency,
			data_frequency: args.data_frequency.unwrap_or(args.frequency),
			width: args.width,
			height: args.height,
			x_offset: args.x_offset,
			y_offset: args.y_offset,
			block_size: args.block_size as usize,
			madctl: args.madctl,
		}
	}
}

#[cfg(target_os = "linux")]
pub fn open(args: &DisplayArgs) -> miette::Result<st7789_spidev_driver::LinuxDriver> {
	Ok(st7789_spidev_driver::LinuxDriver::open(&args.into())?)
}

#[cfg(not(target_os = "linux"))]
pub fn open(
	_args: &DisplayArgs,
) -> miette::Result<Driver<NoBus, NoLine, st7789_spidev_driver::StdDelay>> {
	miette::bail!("SPI displays are only supported on Linux")
}

#[cfg(not(target_os = "linux"))]
#[derive(Debug)]
pub enum NoBus {}

#[cfg(not(target_os = "linux"))]
impl SpiBus for NoBus {
	fn send(&mut self, _: &[u8], _: Option<u32>) -> std::io::Result<()> {
		match *self {}
	}
}

#[cfg(not(target_os = "linux"))]
#[derive(Debug)]
pub enum NoLine {}

#[cfg(not(target_os = "linux"))]
impl ControlLine for NoLine {
	fn set(&mut self, _: st7789_spidev_driver::Level) {
		match *self {}
	}

	fn release(self) {
		match self {}
	}
}

/// End a display session.
///
/// After a clean run the display is shut down (display off, backlight off, controller asleep).
/// After a fatal error nothing more is sent to the display. Either way the hardware is then
/// released, and the first error is returned.
pub fn finish<B, L, D>(
	mut lcd: Driver<B, L, D>,
	result: st7789_spidev_driver::Result<()>,
) -> st7789_spidev_driver::Result<()>
where
	B: SpiBus,
	L: ControlLine,
	D: Delay,
{
	let result = match result {
		Ok(()) => lcd.shutdown(),
		Err(err) => {
			error!("display error, releasing without shutdown: {err}");
			Err(err)
		}
	};
	lcd.release();
	result
}

#[cfg(test)]
mod tests {
	use std::{cell::RefCell, io, rc::Rc};

	use st7789_spidev_driver::{Error, Level, SpiTransport};

	use super::*;

	/// Everything the fakes below see, in order.
	#[derive(Clone, Debug, Default)]
	struct Log(Rc<RefCell<Vec<String>>>);

	impl Log {
		fn push(&self, entry: String) {
			self.0.borrow_mut().push(entry);
		}

		fn take(&self) -> Vec<String> {
			self.0.take()
		}
	}

	#[derive(Debug)]
	struct Bus(Log);

	impl SpiBus for Bus {
		fn send(&mut self, bytes: &[u8], _: Option<u32>) -> io::Result<()> {
			self.0.push(format!("write {bytes:02X?}"));
			Ok(())
		}
	}

	#[derive(Debug)]
	struct Line(&'static str, Log);

	impl ControlLine for Line {
		fn set(&mut self, level: Level) {
			self.1.push(format!("{} {level:?}", self.0));
		}

		fn release(self) {
			self.1.push(format!("release {}", self.0));
		}
	}

	#[derive(Debug)]
	struct NoDelay;

	impl Delay for NoDelay {
		fn delay_ms(&mut self, _: u32) {}
	}

	fn lcd(log: &Log) -> Driver<Bus, Line, NoDelay> {
		Driver::new(
			SpiTransport::new(Bus(log.clone())),
			Line("dc", log.clone()),
			Line("reset", log.clone()),
			Line("backlight", log.clone()),
			NoDelay,
			&DriverArgs::default(),
		)
	}

	#[test]
	fn fatal_error_releases_without_commands() {
		let log = Log::default();
		let err = finish(lcd(&log), Err(Error::BusLost { frames: 30 })).unwrap_err();

		assert!(matches!(err, Error::BusLost { frames: 30 }));
		assert_eq!(
			log.take(),
			["release backlight", "release reset", "release dc"]
		);
	}

	#[test]
	fn clean_finish_shuts_down_then_releases() {
		let log = Log::default();
		finish(lcd(&log), Ok(())).unwrap();

		let log = log.take();
		let writes: Vec<_> = log.iter().filter(|e| e.starts_with("write")).collect();
		assert_eq!(writes, ["write [28]", "write [10]"]);
		assert!(log.contains(&"backlight Low".to_string()));
		assert_eq!(
			&log[log.len() - 3..],
			["release backlight", "release reset", "release dc"]
		);
	}

	#[test]
	fn block_size_must_be_positive() {
		let args = DisplayArgs::parse_from(["display", "--block-size", "1024"]);
		assert_eq!(DriverArgs::from(&args).block_size, 1024);
		assert!(DisplayArgs::try_parse_from(["display", "--block-size", "0"]).is_err());
	}

	#[test]
	fn defaults_match_reference_board() {
		let args = DisplayArgs::parse_from(["display"]);
		let ours = DriverArgs::from(&args);
		let reference = DriverArgs::default();
		assert_eq!(ours.spi_device, reference.spi_device);
		assert_eq!(ours.gpio_root, reference.gpio_root);
		assert_eq!(
			(ours.dc, ours.reset, ours.backlight),
			(reference.dc, reference.reset, reference.backlight)
		);
		assert_eq!(ours.frequency, reference.frequency);
		assert_eq!(ours.data_frequency, reference.data_frequency);
		assert_eq!((ours.width, ours.height), (reference.width, reference.height));
		assert_eq!((ours.x_offset, ours.y_offset), (0, 0));
		assert_eq!(ours.block_size, reference.block_size);
		assert_eq!(ours.madctl, reference.madctl);
	}

	#[test]
	fn data_frequency_override() {
		let args = DisplayArgs::parse_from(["display", "--frequency", "40000000"]);
		assert_eq!(DriverArgs::from(&args).data_frequency, 40_000_000);

		let args = DisplayArgs::parse_from(["display", "--data-frequency", "62500000"]);
		let driver = DriverArgs::from(&args);
		assert_eq!(driver.frequency, 80_000_000);
		assert_eq!(driver.data_frequency, 62_500_000);
	}

	#[test]
	fn madctl_accepts_hex_and_decimal() {
		assert_eq!(parse_byte("0xA0"), Ok(0xA0));
		assert_eq!(parse_byte("0X60"), Ok(0x60));
		assert_eq!(parse_byte("112"), Ok(0x70));
		assert!(parse_byte("0x100").is_err());
	}
}
