/// LCD display commands
///
/// This is the subset of the ST7789 command set used to bring the display up and stream frames.
/// Descriptions are derived from usage and the ST7789 datasheet.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
	/// No-op (NOP).
	///
	/// This command does nothing, and can be used to terminate a data stream early.
	Nop = 0x00,

	/// Software reset (SWRESET).
	///
	/// Resets registers to their defaults. Needs at least 120ms before the next command, more if
	/// the controller was asleep.
	SoftwareReset = 0x01,

	/// Sleep (SLPIN).
	///
	/// This must be followed by a delay of at least 5ms.
	Sleep = 0x10,

	/// Wake up (SLPOUT).
	///
	/// This must be followed by a delay of at least 120ms.
	WakeUp = 0x11,

	/// Normal display mode on (NORON).
	///
	/// Leaves partial mode, if it was on.
	NormalDisplayMode = 0x13,

	/// Switch on display inversion (INVON).
	///
	/// Most IPS panels wired to an ST7789 need this for colours to come out right.
	InversionOn = 0x21,

	/// Gamma curve select (GAMSET).
	///
	/// 1 byte: curve number, as a bit (0x01, 0x02, 0x04, 0x08).
	GammaSet = 0x26,

	/// Turn display off (DISPOFF).
	DisplayOff = 0x28,

	/// Turn display on (DISPON).
	DisplayOn = 0x29,

	/// Set column addresses (CASET).
	///
	/// This sets the area of the screen the display will write to.
	///
	/// 2 u16s:
	/// - start column
	/// - end column
	ColumnAddressSet = 0x2A,

	/// Set row addresses (RASET).
	///
	/// This sets the area of the screen the display will write to.
	///
	/// 2 u16s:
	/// - start row
	/// - end row
	RowAddressSet = 0x2B,

	/// Memory write (RAMWR).
	///
	/// This will consider the next bytes as pixel data to write to the screen, starting from the
	/// top-left of the current window. Either send all the data as expected by window size
	/// (`width * height * 2 bytes`), or send a NOP to end the write.
	MemoryWrite = 0x2C,

	/// Memory access control (MADCTL).
	///
	/// Use [`MemoryAccessControl`](super::helpers::MemoryAccessControl) to build the byte.
	MemoryAccessControl = 0x36,

	/// Interface pixel format (COLMOD).
	///
	/// 2 nibbles:
	/// - RGB interface colour format:
	///   - 0b0101: 65K
	///   - 0b0110: 262K
	/// - control interface colour format:
	///   - 0b0011: 12 bit/pixel
	///   - 0b0101: 16 bit/pixel
	///   - 0b0110: 18 bit/pixel
	///   - 0b0111: 16M truncated
	InterfacePixelFormat = 0x3A,

	/// Digital gamma enable (DGMEN).
	DigitalGammaEnable = 0xBA,
}

impl From<Command> for u8 {
	fn from(command: Command) -> u8 {
		command as u8
	}
}
