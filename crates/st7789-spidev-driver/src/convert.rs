use embedded_graphics::pixelcolor::{
	Rgb565,
	raw::{RawData, RawU16},
};
use image::{
	Rgb, RgbImage,
	imageops::{self, FilterType},
};
use tracing::{instrument, trace};

use crate::error::{Error, Result};

/// A frame in the controller's wire format: row-major RGB565, high byte first.
///
/// The length is fixed at `width * height * 2` bytes for the life of the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
	width: u16,
	height: u16,
	bytes: Vec<u8>,
}

impl FrameBuffer {
	/// Allocate an all-black frame.
	pub fn new(width: u16, height: u16) -> Result<Self> {
		let len = usize::from(width) * usize::from(height) * 2;
		let mut bytes = Vec::new();
		bytes
			.try_reserve_exact(len)
			.map_err(|source| Error::Allocation { bytes: len, source })?;
		bytes.resize(len, 0);
		Ok(Self {
			width,
			height,
			bytes,
		})
	}

	pub fn width(&self) -> u16 {
		self.width
	}

	pub fn height(&self) -> u16 {
		self.height
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.bytes
	}

	/// Set every pixel to black.
	pub fn clear(&mut self) {
		self.bytes.fill(0);
	}

	/// Set every pixel to one colour.
	pub fn fill(&mut self, colour: Rgb565) {
		let pixel = RawU16::from(colour).into_inner().to_be_bytes();
		for chunk in self.bytes.chunks_exact_mut(2) {
			chunk.copy_from_slice(&pixel);
		}
	}

	pub(crate) fn pixel_mut(&mut self, x: u16, y: u16) -> Option<&mut [u8]> {
		if x >= self.width || y >= self.height {
			return None;
		}

		let at = (usize::from(y) * usize::from(self.width) + usize::from(x)) * 2;
		self.bytes.get_mut(at..at + 2)
	}
}

/// Pack 8-bit channels into a native RGB565 value: `R(5) << 11 | G(6) << 5 | B(5)`.
pub fn pack565(r: u8, g: u8, b: u8) -> u16 {
	RawU16::from(Rgb565::new(r >> 3, g >> 2, b >> 3)).into_inner()
}

/// Pack 8-bit channels into the two wire bytes of an RGB565 pixel, high byte first.
pub fn to_packed565(r: u8, g: u8, b: u8) -> [u8; 2] {
	pack565(r, g, b).to_be_bytes()
}

/// Gray-world white balance, in place.
///
/// Scales each channel so its mean matches the mean of all three. A channel whose mean is zero
/// is left alone. Returns the gains applied, as `[r, g, b]`.
#[instrument(level = "trace", skip(image))]
pub fn auto_white_balance(image: &mut RgbImage) -> [f64; 3] {
	let count = f64::from(image.width()) * f64::from(image.height());
	if count == 0.0 {
		return [1.0; 3];
	}

	let mut sums = [0_u64; 3];
	for Rgb(channels) in image.pixels() {
		for (sum, &value) in sums.iter_mut().zip(channels) {
			*sum += u64::from(value);
		}
	}

	let means = sums.map(|sum| sum as f64 / count);
	let grand = means.iter().sum::<f64>() / 3.0;
	let gains = means.map(|mean| if mean > 0.0 { grand / mean } else { 1.0 });
	trace!(?means, ?gains, "white balance");

	if gains.iter().all(|&gain| gain == 1.0) {
		return gains;
	}

	for Rgb(channels) in image.pixels_mut() {
		for (value, gain) in channels.iter_mut().zip(gains) {
			*value = (f64::from(*value) * gain).round().clamp(0.0, 255.0) as u8;
		}
	}

	gains
}

/// Turns raw frames into [`FrameBuffer`] contents.
///
/// Holds one scratch image, reused across frames, so the incoming frame is never modified.
#[derive(Debug, Clone)]
pub struct FrameConverter {
	scratch: RgbImage,
	white_balance: bool,
}

impl Default for FrameConverter {
	fn default() -> Self {
		Self::new(true)
	}
}

impl FrameConverter {
	pub fn new(white_balance: bool) -> Self {
		Self {
			scratch: RgbImage::new(0, 0),
			white_balance,
		}
	}

	/// Convert a frame to fill `out` exactly.
	///
	/// The frame is resized (bilinear) to the buffer's size if it differs, white-balanced if
	/// enabled, then packed pixel by pixel in row-major order.
	#[instrument(level = "trace", skip_all, fields(from = ?frame.dimensions()))]
	pub fn convert(&mut self, frame: &RgbImage, out: &mut FrameBuffer) {
		let target = (u32::from(out.width), u32::from(out.height));
		if frame.dimensions() == target {
			if self.scratch.dimensions() != target {
				self.scratch = RgbImage::new(target.0, target.1);
			}
			self.scratch.copy_from_slice(frame);
		} else {
			self.scratch = imageops::resize(frame, target.0, target.1, FilterType::Triangle);
		}

		if self.white_balance {
			auto_white_balance(&mut self.scratch);
		}

		for (chunk, Rgb([r, g, b])) in out.bytes.chunks_exact_mut(2).zip(self.scratch.pixels()) {
			chunk.copy_from_slice(&to_packed565(*r, *g, *b));
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn packing_quantizes_within_one_step() {
		for r in (0..=255).step_by(3) {
			for g in (0..=255).step_by(5) {
				for b in (0..=255).step_by(7) {
					let packed = pack565(r, g, b);
					let r5 = u8::try_from(packed >> 11).unwrap();
					let g6 = u8::try_from((packed >> 5) & 0x3F).unwrap();
					let b5 = u8::try_from(packed & 0x1F).unwrap();
					assert!(r - (r5 << 3) < 8, "red {r}");
					assert!(g - (g6 << 2) < 4, "green {g}");
					assert!(b - (b5 << 3) < 8, "blue {b}");
				}
			}
		}
	}

	#[test]
	fn wire_bytes_are_swapped() {
		assert_eq!(pack565(255, 255, 255), 0xFFFF);
		assert_eq!(pack565(255, 0, 0), 0xF800);
		assert_eq!(to_packed565(255, 0, 0), [0xF8, 0x00]);
		assert_eq!(to_packed565(0, 0, 255), [0x00, 0x1F]);
		assert_eq!(to_packed565(0, 255, 0), [0x07, 0xE0]);
		for (r, g, b) in [(12, 200, 99), (1, 2, 3), (250, 128, 7)] {
			assert_eq!(
				u16::from_le_bytes(to_packed565(r, g, b)),
				pack565(r, g, b).swap_bytes()
			);
		}
	}

	#[test]
	fn balanced_frame_is_untouched() {
		let mut image = RgbImage::from_fn(8, 4, |x, y| {
			let v = ((x + y) * 20) as u8;
			Rgb([v, v, v])
		});
		let before = image.clone();
		assert_eq!(auto_white_balance(&mut image), [1.0; 3]);
		assert_eq!(image, before);
	}

	#[test]
	fn zero_channel_keeps_unit_gain() {
		let mut image = RgbImage::from_pixel(4, 4, Rgb([0, 90, 30]));
		let gains = auto_white_balance(&mut image);
		assert_eq!(gains[0], 1.0);
		assert!(gains.iter().all(|gain| gain.is_finite()));
		assert_eq!(image.get_pixel(0, 0), &Rgb([0, 40, 40]));

		let mut black = RgbImage::new(4, 4);
		assert_eq!(auto_white_balance(&mut black), [1.0; 3]);
	}

	#[test]
	fn pure_red_frame() {
		let frame = RgbImage::from_pixel(320, 240, Rgb([255, 0, 0]));
		let mut out = FrameBuffer::new(320, 240).unwrap();
		FrameConverter::default().convert(&frame, &mut out);

		// gray-world takes red to a third, the zero channels keep unit gain
		let expected = to_packed565(85, 0, 0);
		assert_eq!(expected, [0x50, 0x00]);
		assert_ne!(expected, to_packed565(255, 0, 0));
		assert_eq!(out.as_bytes().len(), 320 * 240 * 2);
		assert!(out.as_bytes().chunks_exact(2).all(|px| px == expected));
		// source frame is read-only
		assert_eq!(frame.get_pixel(0, 0), &Rgb([255, 0, 0]));
	}

	#[test]
	fn resizes_to_buffer() {
		let frame = RgbImage::from_pixel(64, 48, Rgb([255, 255, 255]));
		let mut out = FrameBuffer::new(32, 24).unwrap();
		FrameConverter::new(false).convert(&frame, &mut out);
		assert!(out.as_bytes().iter().all(|&b| b == 0xFF));
	}

	#[test]
	fn white_balance_can_be_disabled() {
		let frame = RgbImage::from_pixel(4, 2, Rgb([255, 0, 0]));
		let mut out = FrameBuffer::new(4, 2).unwrap();
		FrameConverter::new(false).convert(&frame, &mut out);
		assert_eq!(&out.as_bytes()[..2], &[0xF8, 0x00]);
	}

	#[test]
	fn buffer_fill_and_clear() {
		let mut buffer = FrameBuffer::new(3, 2).unwrap();
		assert_eq!(buffer.as_bytes(), &[0; 12]);
		buffer.fill(Rgb565::new(31, 0, 0));
		assert_eq!(&buffer.as_bytes()[..4], &[0xF8, 0x00, 0xF8, 0x00]);
		buffer.clear();
		assert_eq!(buffer.as_bytes(), &[0; 12]);
	}
}
