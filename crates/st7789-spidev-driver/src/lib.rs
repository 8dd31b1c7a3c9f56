//! A Linux spidev driver for streaming video frames to an ST7789-based SPI display.
//!
//! The display's control lines (data/command, reset, backlight) are driven through the sysfs GPIO
//! interface, and frames go out over a spidev device in fixed-size blocks with bounded retry.
//! Frames are converted from 8-bit RGB with a gray-world white balance into the controller's
//! big-endian RGB565 wire format.
//!
//! [`FrameBuffer`] also implements [`embedded_graphics`]' `DrawTarget`, for drawing still images.
//!
//! # Example
//!
//! ```no_run
//! # use image::{Rgb, RgbImage};
//! # use st7789_spidev_driver::{DriverArgs, FrameBuffer, FrameConverter, LinuxDriver, Result};
//! # fn main() -> Result<()> {
//! let args = DriverArgs::default();
//! let mut lcd = LinuxDriver::open(&args)?;
//! let mut frame = FrameBuffer::new(lcd.width(), lcd.height())?;
//! lcd.start(&frame)?;
//!
//! let image = RgbImage::from_pixel(320, 240, Rgb([200, 120, 40]));
//! FrameConverter::default().convert(&image, &mut frame);
//! let report = lcd.draw(&frame)?;
//! assert_eq!(report.failed, 0);
//!
//! lcd.shutdown()?;
//! lcd.release();
//! # Ok(()) }
//! ```

#[doc(inline)]
pub use buffer::FrameReport;

#[doc(inline)]
pub use commands::Command;

#[doc(inline)]
pub use convert::*;

#[doc(inline)]
pub use error::{Error, Result};

#[doc(inline)]
pub use fps::FrameRate;

#[doc(inline)]
pub use gpio::*;

#[doc(inline)]
pub use helpers::*;

#[doc(inline)]
pub use io::*;

#[doc(inline)]
pub use script::{Script, Step};

#[doc(inline)]
pub use spi::{MAX_ATTEMPTS, RETRY_DELAY, SpiBus, SpiTransport};

mod buffer;
mod commands;
mod convert;
mod error;
mod fps;
mod gpio;
mod graphics;
mod helpers;
mod io;
mod script;
mod spi;

#[cfg(test)]
mod mock;
