use std::{collections::TryReserveError, io, path::PathBuf};

/// Error type for driver operations.
#[derive(Debug, thiserror::Error)]
#[cfg_attr(feature = "miette", derive(miette::Diagnostic))]
pub enum Error {
	#[error("cannot open SPI device {}", path.display())]
	#[cfg_attr(
		feature = "miette",
		diagnostic(help("check the device path, and that spidev is enabled for this bus"))
	)]
	Open { path: PathBuf, source: io::Error },

	#[error("cannot configure SPI bus for mode 0 at {speed_hz} Hz")]
	#[cfg_attr(
		feature = "miette",
		diagnostic(help("the controller may not support this clock, try a lower --frequency"))
	)]
	Configure { speed_hz: u32, source: io::Error },

	#[error("command 0x{opcode:02X} failed after {attempts} attempts")]
	#[cfg_attr(
		feature = "miette",
		diagnostic(help("the display is in an unknown state, check wiring and the D/C pin"))
	)]
	Command {
		opcode: u8,
		attempts: usize,
		source: io::Error,
	},

	#[error("SPI transfer of {len} bytes failed after {attempts} attempts")]
	#[cfg_attr(
		feature = "miette",
		diagnostic(help("SPI error, check settings or increase spidev.bufsiz"))
	)]
	Transfer {
		len: usize,
		attempts: usize,
		source: io::Error,
	},

	#[error("SPI bus lost: every block of the last {frames} frames failed")]
	#[cfg_attr(feature = "miette", diagnostic(help("check the display is still connected")))]
	BusLost { frames: usize },

	#[error("cannot allocate a {bytes}-byte frame buffer")]
	#[cfg_attr(
		feature = "miette",
		diagnostic(help("out of memory, check --width and --height are the panel's"))
	)]
	Allocation {
		bytes: usize,
		source: TryReserveError,
	},

	#[error("window {start:?} to {end:?} does not fit a {width}x{height} display")]
	#[cfg_attr(
		feature = "miette",
		diagnostic(help(
			"corners are inclusive: the last column is width - 1, the last row is height - 1"
		))
	)]
	Window {
		start: (u16, u16),
		end: (u16, u16),
		width: u16,
		height: u16,
	},

	#[error("frame is {width}x{height} but the display is {display_width}x{display_height}")]
	#[cfg_attr(
		feature = "miette",
		diagnostic(help("frame buffers must be allocated at the display's size"))
	)]
	FrameSize {
		width: u16,
		height: u16,
		display_width: u16,
		display_height: u16,
	},

	#[error("malformed command script at byte {offset}: {reason}")]
	#[cfg_attr(
		feature = "miette",
		diagnostic(help(
			"entries are: opcode, count (0x80 = delay follows), arguments, delay; then 0x00"
		))
	)]
	Script { offset: usize, reason: &'static str },

	#[error("local (non-SPI/GPIO) I/O error")]
	#[cfg_attr(
		feature = "miette",
		diagnostic(help("this is not from the display, check the frame input"))
	)]
	Io(#[from] io::Error),
}

impl Error {
	/// Whether this error leaves the display unusable.
	///
	/// Only a single failed data transfer is recoverable: the frame transmitter skips the block
	/// and carries on. Everything else means the controller state can no longer be trusted.
	pub fn is_fatal(&self) -> bool {
		!matches!(self, Self::Transfer { .. })
	}
}

/// Convenience type for Results in this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_data_transfers_are_recoverable() {
		let transfer = Error::Transfer {
			len: 4096,
			attempts: 3,
			source: io::Error::other("bus busy"),
		};
		assert!(!transfer.is_fatal());

		let command = Error::Command {
			opcode: 0x2C,
			attempts: 3,
			source: io::Error::other("bus busy"),
		};
		assert!(command.is_fatal());
		assert_eq!(command.to_string(), "command 0x2C failed after 3 attempts");

		assert!(Error::BusLost { frames: 30 }.is_fatal());

		let size = Error::FrameSize {
			width: 10,
			height: 10,
			display_width: 320,
			display_height: 240,
		};
		assert!(size.is_fatal());
		assert_eq!(size.to_string(), "frame is 10x10 but the display is 320x240");
	}
}
