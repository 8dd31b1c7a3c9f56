use std::{
	fs,
	path::{Path, PathBuf},
};

use tracing::{debug, instrument};

/// Default location of the sysfs GPIO class.
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// Logic level of an output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
	Low,
	High,
}

impl Level {
	fn as_str(self) -> &'static str {
		match self {
			Level::Low => "0",
			Level::High => "1",
		}
	}
}

impl From<bool> for Level {
	fn from(high: bool) -> Self {
		if high { Level::High } else { Level::Low }
	}
}

/// A digital output line driving one of the display's control pins.
///
/// Writes are best-effort: a line never reports failure to its caller.
pub trait ControlLine {
	/// Drive the line to a level.
	fn set(&mut self, level: Level);

	/// Give the line back to the system.
	fn release(self)
	where
		Self: Sized;
}

/// Controller for GPIO lines exposed through the sysfs export/direction/value/unexport files.
///
/// Every write this controller performs follows the same policy: it is best-effort, failures are
/// logged at debug level and otherwise discarded. A line that failed to export is still handed
/// out, and its writes will quietly go nowhere. This tolerates another process (or an earlier run)
/// having exported the pin already, and boards where lines are managed externally.
#[derive(Debug, Clone)]
pub struct SysfsGpio {
	root: PathBuf,
}

impl Default for SysfsGpio {
	fn default() -> Self {
		Self::new(SYSFS_GPIO_ROOT)
	}
}

impl SysfsGpio {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn pin_file(&self, pin: u32, name: &str) -> PathBuf {
		self.root.join(format!("gpio{pin}")).join(name)
	}

	/// Export a pin and configure it as an output.
	///
	/// Acquiring an already-exported pin is harmless.
	#[instrument(level = "debug", skip(self))]
	pub fn acquire(&self, pin: u32) -> SysfsLine {
		best_effort(&self.root.join("export"), &pin.to_string());
		best_effort(&self.pin_file(pin, "direction"), "out");
		SysfsLine {
			gpio: self.clone(),
			pin,
		}
	}

	/// Write a level to a pin.
	#[instrument(level = "trace", skip(self))]
	pub fn set(&self, pin: u32, level: Level) {
		best_effort(&self.pin_file(pin, "value"), level.as_str());
	}

	/// Unexport a pin.
	#[instrument(level = "debug", skip(self))]
	pub fn release(&self, pin: u32) {
		best_effort(&self.root.join("unexport"), &pin.to_string());
	}
}

fn best_effort(path: &Path, contents: &str) {
	if let Err(err) = fs::write(path, contents) {
		debug!(path=%path.display(), contents, "gpio write discarded: {err}");
	}
}

/// One exported output line, as handed out by [`SysfsGpio::acquire`].
#[derive(Debug)]
pub struct SysfsLine {
	gpio: SysfsGpio,
	pin: u32,
}

impl SysfsLine {
	pub fn pin(&self) -> u32 {
		self.pin
	}
}

impl ControlLine for SysfsLine {
	fn set(&mut self, level: Level) {
		self.gpio.set(self.pin, level);
	}

	fn release(self) {
		self.gpio.release(self.pin);
	}
}
