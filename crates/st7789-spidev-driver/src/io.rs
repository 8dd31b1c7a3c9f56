use std::{path::PathBuf, thread::sleep, time::Duration};

use tracing::{debug, instrument, trace};

use crate::{
	commands::Command,
	convert::FrameBuffer,
	error::{Error, Result},
	gpio::{ControlLine, Level, SYSFS_GPIO_ROOT},
	helpers::MemoryAccessControl,
	script::Script,
	spi::{SpiBus, SpiTransport},
};

/// Default size of one frame data transfer, in bytes.
pub const BLOCK_SIZE: usize = 4096;

/// Blocking millisecond delays, for controller timings.
pub trait Delay {
	fn delay_ms(&mut self, ms: u32);
}

/// [`Delay`] that sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl Delay for StdDelay {
	fn delay_ms(&mut self, ms: u32) {
		sleep(Duration::from_millis(ms.into()));
	}
}

/// Driver for the LCD display.
///
/// This is the whole hardware session: the SPI transport, the three control lines, and the
/// display geometry. It is exclusively owned by whoever streams frames to it.
#[derive(Debug)]
pub struct Driver<B, L, D> {
	pub(crate) spi: SpiTransport<B>,
	pub(crate) dc: L,
	pub(crate) reset: L,
	pub(crate) backlight: L,
	pub(crate) delay: D,
	pub(crate) width: u16,
	pub(crate) height: u16,
	pub(crate) x_offset: u16,
	pub(crate) y_offset: u16,
	pub(crate) block_size: usize,
	pub(crate) data_frequency: u32,
	pub(crate) madctl: u8,
	pub(crate) awake: bool,
}

/// Arguments to create a new LCD driver.
///
/// This is a struct to hold the arguments for the LCD driver: SPI device and clocks, GPIO pins,
/// and the display geometry.
///
/// It implements [`Default`] with the wiring of the reference board: a 320x240 panel on
/// `/dev/spidev0.0`, D/C on GPIO 53, reset on GPIO 52, backlight on GPIO 4.
#[derive(Debug, Clone)]
pub struct DriverArgs {
	/// Path to the spidev device.
	pub spi_device: PathBuf,

	/// Root of the sysfs GPIO class.
	pub gpio_root: PathBuf,

	/// GPIO pin number for the display's data/command pin.
	pub dc: u32,

	/// GPIO pin number for the display's reset pin.
	pub reset: u32,

	/// GPIO pin number for the display's backlight control pin.
	pub backlight: u32,

	/// SPI bus clock in Hz, as configured on the device.
	pub frequency: u32,

	/// SPI clock in Hz for frame data transfers.
	pub data_frequency: u32,

	/// Width of the addressable window, in pixels.
	pub width: u16,

	/// Height of the addressable window, in pixels.
	pub height: u16,

	/// Column offset of the window in controller RAM.
	pub x_offset: u16,

	/// Row offset of the window in controller RAM.
	pub y_offset: u16,

	/// Largest single frame data transfer, in bytes.
	///
	/// Must fit within the spidev buffer size (`spidev.bufsiz`, 4096 by default).
	pub block_size: usize,

	/// Memory access control (orientation) byte sent during init.
	pub madctl: u8,
}

impl Default for DriverArgs {
	fn default() -> Self {
		Self {
			spi_device: PathBuf::from("/dev/spidev0.0"),
			gpio_root: PathBuf::from(SYSFS_GPIO_ROOT),
			dc: 53,
			reset: 52,
			backlight: 4,
			frequency: 80_000_000,
			data_frequency: 80_000_000,
			width: 320,
			height: 240,
			x_offset: 0,
			y_offset: 0,
			block_size: BLOCK_SIZE,
			madctl: MemoryAccessControl::landscape().into(),
		}
	}
}

#[cfg(target_os = "linux")]
mod linux {
	use spidev::Spidev;
	use tracing::{info, instrument};

	use super::{Driver, DriverArgs, StdDelay};
	use crate::{
		error::Result,
		gpio::{SysfsGpio, SysfsLine},
		spi::SpiTransport,
	};

	/// A [`Driver`] on a Linux spidev device and sysfs GPIO lines.
	pub type LinuxDriver = Driver<Spidev, SysfsLine, StdDelay>;

	impl LinuxDriver {
		/// Connect to the LCD display I/O.
		///
		/// This exports the control lines and opens and configures the SPI device, but doesn't
		/// touch the display otherwise. Usually you'll want to call [`start()`](Driver::start)
		/// next.
		///
		/// If the SPI device can't be used, the lines acquired so far are released before the error
		/// is returned.
		#[instrument(level = "debug")]
		pub fn open(args: &DriverArgs) -> Result<Self> {
			let gpio = SysfsGpio::new(&args.gpio_root);
			let lcd = Self::connect(
				|pin| gpio.acquire(pin),
				|| {
					let mut spi = SpiTransport::open(&args.spi_device)?;
					spi.configure(args.frequency)?;
					Ok(spi)
				},
				StdDelay,
				args,
			)?;
			info!(device=%args.spi_device.display(), "display connected");
			Ok(lcd)
		}
	}
}

#[cfg(target_os = "linux")]
pub use linux::LinuxDriver;

impl<B, L, D> Driver<B, L, D>
where
	B: SpiBus,
	L: ControlLine,
	D: Delay,
{
	/// Assemble a driver from already-acquired parts.
	pub fn new(
		spi: SpiTransport<B>,
		dc: L,
		reset: L,
		backlight: L,
		delay: D,
		args: &DriverArgs,
	) -> Self {
		Self {
			spi,
			dc,
			reset,
			backlight,
			delay,
			width: args.width,
			height: args.height,
			x_offset: args.x_offset,
			y_offset: args.y_offset,
			block_size: args.block_size.max(1),
			data_frequency: args.data_frequency,
			madctl: args.madctl,
			awake: false,
		}
	}

	/// Acquire the parts of a driver in order: D/C line, reset line, SPI, backlight line.
	///
	/// `line` acquires a control line by pin number. If `spi` fails, the reset and D/C lines are
	/// released, in that order, before its error is returned.
	pub fn connect(
		mut line: impl FnMut(u32) -> L,
		spi: impl FnOnce() -> Result<SpiTransport<B>>,
		delay: D,
		args: &DriverArgs,
	) -> Result<Self> {
		let dc = line(args.dc);
		let reset = line(args.reset);
		let spi = match spi() {
			Ok(spi) => spi,
			Err(err) => {
				reset.release();
				dc.release();
				return Err(err);
			}
		};

		let backlight = line(args.backlight);
		Ok(Self::new(spi, dc, reset, backlight, delay, args))
	}

	pub fn width(&self) -> u16 {
		self.width
	}

	pub fn height(&self) -> u16 {
		self.height
	}

	#[instrument(level = "trace", skip(self))]
	fn set_dc(&mut self, level: Level) {
		self.dc.set(level);
	}

	#[instrument(level = "trace", skip(self))]
	fn set_reset(&mut self, level: Level) {
		self.reset.set(level);
	}

	/// Pulse the reset line: high, low, high, 10ms apart.
	#[instrument(level = "debug", skip(self))]
	pub fn hard_reset(&mut self) {
		self.set_reset(Level::High);
		self.delay.delay_ms(10);
		self.set_reset(Level::Low);
		self.delay.delay_ms(10);
		self.set_reset(Level::High);
		self.delay.delay_ms(10);
	}

	/// Perform the init sequence.
	#[instrument(level = "debug", skip(self))]
	pub fn init(&mut self) -> Result<()> {
		self.run_script(&Script::init(self.madctl))?;
		self.awake = true;
		Ok(())
	}

	/// Bring the display up, ready to stream.
	///
	/// Resets and initialises the controller, turns the backlight on, addresses the full window,
	/// pushes `blank` as the first frame, then lets the panel settle for 100ms. A `blank` of the
	/// wrong size is refused before the display is touched.
	#[instrument(level = "debug", skip(self, blank))]
	pub fn start(&mut self, blank: &FrameBuffer) -> Result<()> {
		self.check_frame(blank)?;
		self.hard_reset();
		self.init()?;
		self.backlight(true);
		let last = (self.width.saturating_sub(1), self.height.saturating_sub(1));
		self.set_window((0, 0), last)?;
		let report = self.send_frame(blank)?;
		self.delay.delay_ms(100);
		if report.failed > 0 {
			debug!(?report, "blank frame partially sent");
		}
		debug!(width = self.width, height = self.height, "display started");
		Ok(())
	}

	/// Set the area of the screen to draw to, and begin writing to it.
	///
	/// Corners are inclusive and relative to the display; offsets are added here.
	#[instrument(level = "debug", skip(self))]
	pub fn set_window(&mut self, start: (u16, u16), end: (u16, u16)) -> Result<()> {
		if start.0 > end.0 || start.1 > end.1 || end.0 >= self.width || end.1 >= self.height {
			return Err(Error::Window {
				start,
				end,
				width: self.width,
				height: self.height,
			});
		}

		let (x, y) = (self.x_offset, self.y_offset);
		self.run_script(&Script::window(
			(x.saturating_add(start.0), y.saturating_add(start.1)),
			(x.saturating_add(end.0), y.saturating_add(end.1)),
		))
	}

	/// Restart a RAM write at the top-left of the current window.
	#[instrument(level = "trace", skip(self))]
	pub fn begin_ram_write(&mut self) -> Result<()> {
		self.command(Command::MemoryWrite)
	}

	/// Turn the backlight on or off.
	#[instrument(level = "trace", skip(self))]
	pub fn backlight(&mut self, on: bool) {
		self.backlight.set(Level::from(on));
	}

	/// Turn the display on or off.
	#[instrument(level = "trace", skip(self))]
	pub fn display(&mut self, on: bool) -> Result<()> {
		if on {
			self.command(Command::DisplayOn)
		} else {
			self.command(Command::DisplayOff)
		}
	}

	/// Send a command byte.
	///
	/// Failure is fatal: a lost command byte desynchronises the controller.
	#[instrument(level = "trace", skip(self, command))]
	pub fn command(&mut self, command: impl Into<u8>) -> Result<()> {
		let opcode = command.into();
		self.set_dc(Level::Low);
		trace!(byte=%format!("{opcode:02X}"), "writing command byte to SPI");
		self.spi.transfer(&[opcode], None).map_err(|err| match err {
			Error::Transfer {
				attempts, source, ..
			} => Error::Command {
				opcode,
				attempts,
				source,
			},
			other => other,
		})
	}

	pub(crate) fn data_mode(&mut self) {
		self.set_dc(Level::High);
	}

	/// Write one argument byte of a command; failure is as fatal as the command's own.
	pub(crate) fn data_byte(&mut self, opcode: u8, byte: u8) -> Result<()> {
		self.spi.transfer(&[byte], None).map_err(|err| match err {
			Error::Transfer {
				attempts, source, ..
			} => Error::Command {
				opcode,
				attempts,
				source,
			},
			other => other,
		})
	}

	/// Go to sleep.
	#[instrument(level = "trace", skip(self))]
	pub fn sleep(&mut self) -> Result<()> {
		if self.awake {
			self.command(Command::Sleep)?;
			self.delay.delay_ms(5);
			self.awake = false;
		}

		Ok(())
	}

	/// Wake up from sleep.
	#[instrument(level = "trace", skip(self))]
	pub fn wake(&mut self) -> Result<()> {
		if !self.awake {
			self.command(Command::WakeUp)?;
			self.delay.delay_ms(120);
			self.awake = true;
		}

		Ok(())
	}

	/// Put the display to rest: display off, backlight off, controller asleep.
	#[instrument(level = "debug", skip(self))]
	pub fn shutdown(&mut self) -> Result<()> {
		self.display(false)?;
		self.backlight(false);
		self.command(Command::Sleep)?;
		self.delay.delay_ms(5);
		self.awake = false;
		Ok(())
	}

	/// Release the hardware, in reverse order of acquisition.
	///
	/// Release is best-effort and errors are discarded: the backlight line is unexported, the SPI
	/// device closed, then the reset and D/C lines unexported. Nothing is sent to the display, so
	/// this is also what happens after a fatal error.
	#[instrument(level = "debug", skip(self))]
	pub fn release(self) {
		let Self {
			spi,
			dc,
			reset,
			backlight,
			..
		} = self;
		backlight.release();
		drop(spi);
		reset.release();
		dc.release();
		debug!("display released");
	}
}

#[cfg(test)]
impl Driver<crate::mock::MockBus, crate::mock::MockLine, crate::mock::MockDelay> {
	/// A 320x240 driver wired to a recorder.
	pub(crate) fn mocked(rec: &crate::mock::Recorder) -> Self {
		Self::new(
			SpiTransport::new(rec.bus()),
			rec.line("dc"),
			rec.line("reset"),
			rec.line("backlight"),
			rec.delay(),
			&DriverArgs::default(),
		)
	}
}
