use std::{io, thread::sleep, time::Duration};

use tracing::{instrument, trace};

use crate::error::{Error, Result};

/// How many times a single transfer is attempted before it is declared failed.
pub const MAX_ATTEMPTS: usize = 3;

/// Pause between two attempts of the same transfer.
pub const RETRY_DELAY: Duration = Duration::from_millis(1);

/// A raw SPI bus that can write one transaction.
///
/// Implementations make exactly one attempt; retrying is [`SpiTransport`]'s job.
pub trait SpiBus {
	/// Write `bytes` as a single transaction, optionally at a different clock than the bus default.
	fn send(&mut self, bytes: &[u8], speed_hz: Option<u32>) -> io::Result<()>;
}

/// An SPI session with bounded retry on every transfer.
#[derive(Debug)]
pub struct SpiTransport<B> {
	bus: B,
}

impl<B: SpiBus> SpiTransport<B> {
	pub fn new(bus: B) -> Self {
		Self { bus }
	}

	/// Perform one transfer, retrying transient failures.
	///
	/// The transfer is attempted at most [`MAX_ATTEMPTS`] times, with [`RETRY_DELAY`] between
	/// attempts. Returns as soon as one attempt succeeds; the error from the last attempt is
	/// returned if none did.
	#[instrument(level = "trace", skip(self, bytes), fields(len = bytes.len()))]
	pub fn transfer(&mut self, bytes: &[u8], speed_hz: Option<u32>) -> Result<()> {
		let mut attempt = 1;
		loop {
			match self.bus.send(bytes, speed_hz) {
				Ok(()) => return Ok(()),
				Err(source) if attempt >= MAX_ATTEMPTS => {
					return Err(Error::Transfer {
						len: bytes.len(),
						attempts: attempt,
						source,
					});
				}
				Err(err) => {
					trace!(attempt, "spi transfer failed, retrying: {err}");
					attempt += 1;
					sleep(RETRY_DELAY);
				}
			}
		}
	}
}

#[cfg(target_os = "linux")]
mod linux {
	use std::{io, path::Path};

	use spidev::{SpiModeFlags, Spidev, SpidevOptions, SpidevTransfer};
	use tracing::{debug, instrument};

	use super::{SpiBus, SpiTransport};
	use crate::error::{Error, Result};

	impl SpiBus for Spidev {
		fn send(&mut self, bytes: &[u8], speed_hz: Option<u32>) -> io::Result<()> {
			let mut transfer = SpidevTransfer::write(bytes);
			if let Some(speed) = speed_hz {
				transfer.speed_hz = speed;
			}
			self.transfer(&mut transfer)
		}
	}

	impl SpiTransport<Spidev> {
		/// Open an spidev device for writing.
		#[instrument(level = "debug")]
		pub fn open(path: &Path) -> Result<Self> {
			let bus = Spidev::open(path).map_err(|source| Error::Open {
				path: path.to_owned(),
				source,
			})?;
			Ok(Self::new(bus))
		}

		/// Set the bus to mode 0, 8-bit words, at the given clock.
		#[instrument(level = "debug", skip(self))]
		pub fn configure(&mut self, speed_hz: u32) -> Result<()> {
			let options = SpidevOptions::new()
				.bits_per_word(8)
				.max_speed_hz(speed_hz)
				.lsb_first(false)
				.mode(SpiModeFlags::SPI_MODE_0)
				.build();
			self.bus
				.configure(&options)
				.map_err(|source| Error::Configure { speed_hz, source })?;
			debug!(speed_hz, "spi bus configured");
			Ok(())
		}
	}
}
