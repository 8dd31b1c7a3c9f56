use std::io::{self, ErrorKind, Read};

use clap::ValueEnum;
use image::RgbImage;
use tracing::{debug, warn};

/// Channel order of raw input frames.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum PixelOrder {
	/// Red, green, blue (ffmpeg's `rgb24`).
	#[default]
	Rgb,

	/// Blue, green, red (ffmpeg's `bgr24`, OpenCV's default).
	Bgr,
}

/// What a frame source produced this cycle.
#[derive(Debug)]
pub enum Capture<'f> {
	/// A full frame, in RGB order.
	Frame(&'f RgbImage),

	/// Nothing usable this cycle; try again.
	Empty,

	/// The source is exhausted.
	Ended,
}

/// Hands out frames, one per pipeline cycle.
pub trait FrameSource {
	fn capture(&mut self) -> io::Result<Capture<'_>>;
}

/// Reads fixed-size raw frames, 3 bytes per pixel, from a byte stream.
///
/// A clean end of stream ends the source. A truncated last frame is reported as empty, then the
/// source ends. A read that would block or timed out is also reported as empty; the bytes read so
/// far are kept and the frame is completed on the next capture.
#[derive(Debug)]
pub struct RawFrameReader<R> {
	reader: R,
	order: PixelOrder,
	image: RgbImage,
	filled: usize,
	ended: bool,
}

impl<R: Read> RawFrameReader<R> {
	pub fn new(reader: R, width: u32, height: u32, order: PixelOrder) -> Self {
		Self {
			reader,
			order,
			image: RgbImage::new(width, height),
			filled: 0,
			ended: false,
		}
	}

	/// Read until the frame is full or the stream ends. Progress is kept in `self.filled`.
	fn fill(&mut self) -> io::Result<()> {
		let buf: &mut [u8] = &mut self.image;
		while self.filled < buf.len() {
			match self.reader.read(&mut buf[self.filled..]) {
				Ok(0) => break,
				Ok(n) => self.filled += n,
				Err(err) if err.kind() == ErrorKind::Interrupted => {}
				Err(err) => return Err(err),
			}
		}
		Ok(())
	}
}

impl<R: Read> FrameSource for RawFrameReader<R> {
	fn capture(&mut self) -> io::Result<Capture<'_>> {
		if self.ended {
			return Ok(Capture::Ended);
		}

		let expected = self.image.len();
		match self.fill() {
			Ok(()) => {}
			Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
				debug!(filled = self.filled, expected, "frame not ready: {err}");
				return Ok(Capture::Empty);
			}
			Err(err) => return Err(err),
		}

		let filled = std::mem::take(&mut self.filled);
		if expected > 0 && filled == expected {
			if self.order == PixelOrder::Bgr {
				for pixel in self.image.pixels_mut() {
					pixel.0.swap(0, 2);
				}
			}
			return Ok(Capture::Frame(&self.image));
		}

		self.ended = true;
		if filled == 0 {
			debug!("end of frame stream");
			Ok(Capture::Ended)
		} else {
			warn!(filled, expected, "truncated frame at end of stream");
			Ok(Capture::Empty)
		}
	}
}
