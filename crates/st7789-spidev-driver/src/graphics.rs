use std::convert::Infallible;

use embedded_graphics::{
	Pixel,
	draw_target::DrawTarget,
	geometry::{OriginDimensions, Size},
	pixelcolor::{
		Rgb565,
		raw::{RawData, RawU16},
	},
};

use crate::convert::FrameBuffer;

impl OriginDimensions for FrameBuffer {
	fn size(&self) -> Size {
		Size::new(self.width().into(), self.height().into())
	}
}

impl DrawTarget for FrameBuffer {
	type Color = Rgb565;
	type Error = Infallible;

	fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
	where
		I: IntoIterator<Item = Pixel<Self::Color>>,
	{
		for Pixel(coord, color) in pixels.into_iter() {
			let Ok(x) = u16::try_from(coord.x) else {
				continue;
			};
			let Ok(y) = u16::try_from(coord.y) else {
				continue;
			};

			if let Some(pixel) = self.pixel_mut(x, y) {
				pixel.copy_from_slice(&RawU16::from(color).into_inner().to_be_bytes());
			}
		}

		Ok(())
	}

	fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
		self.fill(color);
		Ok(())
	}
}
