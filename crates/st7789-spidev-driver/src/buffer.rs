use std::ops::Range;

use tracing::{instrument, trace, warn};

use crate::{
	convert::FrameBuffer,
	error::{Error, Result},
	gpio::ControlLine,
	io::Delay,
	spi::SpiBus,
};

/// What happened to the blocks of one frame send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[must_use]
pub struct FrameReport {
	/// Blocks the frame was split into.
	pub blocks: usize,

	/// Blocks that failed every attempt and were skipped.
	pub failed: usize,
}

impl FrameReport {
	/// Whether nothing of the frame reached the display.
	pub fn is_dead(&self) -> bool {
		self.blocks > 0 && self.failed == self.blocks
	}
}

/// Split `len` bytes into consecutive `block`-sized ranges; the last one may be shorter.
pub(crate) fn blocks(len: usize, block: usize) -> impl Iterator<Item = Range<usize>> {
	let block = block.max(1);
	(0..len)
		.step_by(block)
		.map(move |start| start..(start + block).min(len))
}

impl<B, L, D> crate::Driver<B, L, D>
where
	B: SpiBus,
	L: ControlLine,
	D: Delay,
{
	/// Stream raw pixel data to display RAM in blocks.
	///
	/// D/C is driven high once, then the bytes go out in blocks of the configured size at the
	/// data clock. A block that fails every attempt is skipped: the frame carries on from the next
	/// block, so a bad bus gives a corrupted frame rather than a stalled stream.
	#[instrument(level = "trace", skip(self, bytes), fields(len = bytes.len()))]
	pub fn send_bytes(&mut self, bytes: &[u8]) -> FrameReport {
		let mut report = FrameReport::default();
		if bytes.is_empty() {
			return report;
		}

		self.data_mode();
		for range in blocks(bytes.len(), self.block_size) {
			report.blocks += 1;
			let offset = range.start;
			if let Err(err) = self.spi.transfer(&bytes[range], Some(self.data_frequency)) {
				report.failed += 1;
				warn!(offset, "skipping frame block: {err}");
			}
		}

		trace!(?report, "frame data sent");
		report
	}

	/// Frames must be exactly the display's size.
	pub(crate) fn check_frame(&self, frame: &FrameBuffer) -> Result<()> {
		if (frame.width(), frame.height()) == (self.width, self.height) {
			Ok(())
		} else {
			Err(Error::FrameSize {
				width: frame.width(),
				height: frame.height(),
				display_width: self.width,
				display_height: self.height,
			})
		}
	}

	/// Send a whole frame buffer.
	///
	/// This does not address the window first; see [`draw()`](Self::draw). A frame of the wrong
	/// size is refused before anything is sent.
	pub fn send_frame(&mut self, frame: &FrameBuffer) -> Result<FrameReport> {
		self.check_frame(frame)?;
		Ok(self.send_bytes(frame.as_bytes()))
	}

	/// Restart the RAM write and send a frame: one full refresh of the display.
	///
	/// Only the RAM write command and the frame size check can fail here; data blocks are
	/// reported, not raised.
	#[instrument(level = "trace", skip(self, frame))]
	pub fn draw(&mut self, frame: &FrameBuffer) -> Result<FrameReport> {
		self.check_frame(frame)?;
		self.begin_ram_write()?;
		self.send_frame(frame)
	}
}
