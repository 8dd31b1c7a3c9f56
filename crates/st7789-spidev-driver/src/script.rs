use tracing::{instrument, trace};

use crate::{
	commands::Command,
	error::{Error, Result},
	gpio::ControlLine,
	helpers::{COLMOD_16BPP, COLMOD_RGB_65K, address_bytes, colmod},
	io::Delay,
	spi::SpiBus,
};

/// Bit set in the packed count byte when a delay byte follows the arguments.
pub const DELAY_FLAG: u8 = 0x80;

/// Packed delay value standing in for 500ms.
pub const LONG_DELAY: u8 = 255;

const LONG_DELAY_MS: u16 = 500;
const MAX_ARGS: usize = 0x7F;

/// One command in a [`Script`]: opcode, its data bytes, and how long to wait after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
	pub opcode: u8,
	pub data: Vec<u8>,
	pub delay_ms: Option<u16>,
}

impl Step {
	pub fn new(command: impl Into<u8>) -> Self {
		Self {
			opcode: command.into(),
			data: Vec::new(),
			delay_ms: None,
		}
	}

	pub fn data(mut self, bytes: &[u8]) -> Self {
		self.data = bytes.to_vec();
		self
	}

	pub fn delay(mut self, ms: u16) -> Self {
		self.delay_ms = Some(ms);
		self
	}
}

/// An ordered list of controller commands.
///
/// Scripts are built once (from the tables below, or by parsing the packed byte format) and then
/// only read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script(Vec<Step>);

impl Script {
	pub fn new(steps: Vec<Step>) -> Self {
		Self(steps)
	}

	pub fn steps(&self) -> &[Step] {
		&self.0
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Decode the packed script format.
	///
	/// Each entry is an opcode, then a byte whose low 7 bits are the argument count and whose high
	/// bit flags a trailing delay byte, then the arguments, then the delay byte if flagged. A delay
	/// byte of 255 means 500ms. An opcode of 0 terminates the script; anything after it is ignored.
	pub fn parse(packed: &[u8]) -> Result<Self> {
		let mut steps = Vec::new();
		let mut offset = 0;

		loop {
			let &opcode = packed.get(offset).ok_or(Error::Script {
				offset,
				reason: "missing terminator",
			})?;
			if opcode == 0 {
				return Ok(Self(steps));
			}

			let &packed_count = packed.get(offset + 1).ok_or(Error::Script {
				offset: offset + 1,
				reason: "missing argument count",
			})?;
			let count = usize::from(packed_count & !DELAY_FLAG);
			let args_start = offset + 2;
			let args_end = args_start + count;
			let data = packed.get(args_start..args_end).ok_or(Error::Script {
				offset: args_start,
				reason: "arguments run past the end",
			})?;

			let mut step = Step::new(opcode).data(data);
			offset = args_end;

			if packed_count & DELAY_FLAG != 0 {
				let &delay = packed.get(offset).ok_or(Error::Script {
					offset,
					reason: "missing delay",
				})?;
				step = step.delay(match delay {
					LONG_DELAY => LONG_DELAY_MS,
					ms => u16::from(ms),
				});
				offset += 1;
			}

			steps.push(step);
		}
	}

	/// Encode into the packed format read by [`Script::parse`], terminator included.
	///
	/// Delays above 254ms other than exactly 500ms cannot be represented, nor can more than 127
	/// arguments.
	pub fn to_packed(&self) -> Result<Vec<u8>> {
		let mut packed = Vec::new();
		for step in &self.0 {
			let offset = packed.len();
			if step.opcode == 0 {
				return Err(Error::Script {
					offset,
					reason: "opcode 0 is reserved for the terminator",
				});
			}
			if step.data.len() > MAX_ARGS {
				return Err(Error::Script {
					offset,
					reason: "too many arguments",
				});
			}

			let flag = if step.delay_ms.is_some() { DELAY_FLAG } else { 0 };
			packed.push(step.opcode);
			packed.push(step.data.len() as u8 | flag);
			packed.extend_from_slice(&step.data);
			match step.delay_ms {
				None => {}
				Some(LONG_DELAY_MS) => packed.push(LONG_DELAY),
				Some(ms) if ms < u16::from(LONG_DELAY) => packed.push(ms as u8),
				Some(_) => {
					return Err(Error::Script {
						offset,
						reason: "delay cannot be encoded",
					});
				}
			}
		}
		packed.push(0);
		Ok(packed)
	}

	/// Controller bring-up: reset, wake, 16-bit colour, orientation, gamma, inversion, display on.
	pub fn init(madctl: u8) -> Self {
		Self(vec![
			Step::new(Command::SoftwareReset).delay(150),
			Step::new(Command::WakeUp).delay(500),
			Step::new(Command::InterfacePixelFormat)
				.data(&[colmod(COLMOD_RGB_65K, COLMOD_16BPP)])
				.delay(10),
			Step::new(Command::MemoryAccessControl).data(&[madctl]),
			Step::new(Command::GammaSet).data(&[0x07]),
			Step::new(Command::DigitalGammaEnable).data(&[0x08, 0x08]),
			Step::new(Command::InversionOn).delay(10),
			Step::new(Command::NormalDisplayMode).delay(10),
			Step::new(Command::DisplayOn).delay(500),
		])
	}

	/// Address a window (inclusive corners, already offset), then start a RAM write.
	pub fn window(start: (u16, u16), end: (u16, u16)) -> Self {
		Self(vec![
			Step::new(Command::ColumnAddressSet).data(&address_bytes(start.0, end.0)),
			Step::new(Command::RowAddressSet).data(&address_bytes(start.1, end.1)),
			Step::new(Command::MemoryWrite),
		])
	}
}

impl<B, L, D> crate::Driver<B, L, D>
where
	B: SpiBus,
	L: ControlLine,
	D: Delay,
{
	/// Replay a script: each opcode as a command, each argument as its own data byte, then the
	/// step's delay.
	///
	/// Any failed byte is fatal, as the controller can no longer be assumed to be in sync.
	#[instrument(level = "debug", skip(self, script), fields(steps = script.len()))]
	pub fn run_script(&mut self, script: &Script) -> Result<()> {
		for step in script.steps() {
			trace!(
				opcode=%format!("{:02X}", step.opcode),
				args = step.data.len(),
				delay = ?step.delay_ms,
				"script step"
			);
			self.command(step.opcode)?;
			if !step.data.is_empty() {
				self.data_mode();
				for &byte in &step.data {
					self.data_byte(step.opcode, byte)?;
				}
			}
			if let Some(ms) = step.delay_ms {
				self.delay.delay_ms(u32::from(ms));
			}
		}

		Ok(())
	}
}
