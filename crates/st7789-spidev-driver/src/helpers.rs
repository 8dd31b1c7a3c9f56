use bitvec::{BitArr, order::Msb0};

/// Memory access control (MADCTL) byte builder.
///
/// Bits, most significant first: MY, MX, MV, ML, RGB/BGR, MH, then two reserved bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MemoryAccessControl(BitArr!(for 8, in u8, Msb0));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vertical {
	TopToBottom,
	BottomToTop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Horizontal {
	LeftToRight,
	RightToLeft,
}

impl MemoryAccessControl {
	pub fn row_order(mut self, direction: Vertical) -> Self {
		self.0.set(0, direction == Vertical::BottomToTop);
		self
	}

	pub fn col_order(mut self, direction: Horizontal) -> Self {
		self.0.set(1, direction == Horizontal::RightToLeft);
		self
	}

	pub fn normal(mut self) -> Self {
		self.0.set(2, false);
		self
	}

	/// Swap rows and columns, for landscape orientation.
	pub fn exchanged(mut self) -> Self {
		self.0.set(2, true);
		self
	}

	/// Vertical refresh order (aka Line Address Order).
	pub fn v_refresh(mut self, direction: Vertical) -> Self {
		self.0.set(3, direction == Vertical::BottomToTop);
		self
	}

	pub fn rgb(mut self) -> Self {
		self.0.set(4, false);
		self
	}

	pub fn bgr(mut self) -> Self {
		self.0.set(4, true);
		self
	}

	/// Horizontal refresh order (aka Data Latch Order).
	pub fn h_refresh(mut self, direction: Horizontal) -> Self {
		self.0.set(5, direction == Horizontal::RightToLeft);
		self
	}

	/// Landscape, bottom-to-top rows, RGB order: 0xA0.
	pub fn landscape() -> Self {
		Self::default()
			.row_order(Vertical::BottomToTop)
			.exchanged()
			.rgb()
	}
}

impl From<MemoryAccessControl> for u8 {
	fn from(control: MemoryAccessControl) -> u8 {
		let arr: [u8; 1] = control.0.into_inner();
		arr[0]
	}
}

pub const COLMOD_RGB_65K: u8 = 0b0101;
pub const COLMOD_RGB_262K: u8 = 0b0110;

pub const COLMOD_12BPP: u8 = 0b0011;
pub const COLMOD_16BPP: u8 = 0b0101;
pub const COLMOD_18BPP: u8 = 0b0110;

/// Build the COLMOD byte from its RGB interface and control interface nibbles.
pub const fn colmod(rgb: u8, control: u8) -> u8 {
	(rgb << 4) | control
}

/// Split a 16-bit address into the two bytes CASET and RASET expect.
pub(crate) fn address_bytes(start: u16, end: u16) -> [u8; 4] {
	let [s1, s0] = start.to_be_bytes();
	let [e1, e0] = end.to_be_bytes();
	[s1, s0, e1, e0]
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn landscape_madctl() {
		assert_eq!(u8::from(MemoryAccessControl::landscape()), 0xA0);
	}

	#[test]
	fn madctl_bits_are_msb_first() {
		let byte = |m: MemoryAccessControl| u8::from(m);
		let zero = MemoryAccessControl::default();
		assert_eq!(byte(zero), 0);
		assert_eq!(byte(zero.row_order(Vertical::BottomToTop)), 0x80);
		assert_eq!(byte(zero.col_order(Horizontal::RightToLeft)), 0x40);
		assert_eq!(byte(zero.exchanged()), 0x20);
		assert_eq!(byte(zero.v_refresh(Vertical::BottomToTop)), 0x10);
		assert_eq!(byte(zero.bgr()), 0x08);
		assert_eq!(byte(zero.h_refresh(Horizontal::RightToLeft)), 0x04);
		assert_eq!(byte(zero.bgr().rgb().exchanged().normal()), 0);
	}

	#[test]
	fn sixteen_bit_colmod() {
		assert_eq!(colmod(COLMOD_RGB_65K, COLMOD_16BPP), 0x55);
		assert_eq!(colmod(COLMOD_RGB_262K, COLMOD_18BPP), 0x66);
		assert_eq!(colmod(COLMOD_RGB_65K, COLMOD_12BPP), 0x53);
	}

	#[test]
	fn addresses_are_big_endian() {
		assert_eq!(address_bytes(0, 319), [0x00, 0x00, 0x01, 0x3F]);
		assert_eq!(address_bytes(20, 259), [0x00, 0x14, 0x01, 0x03]);
	}
}
