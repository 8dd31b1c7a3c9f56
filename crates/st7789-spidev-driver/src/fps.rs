use jiff::Timestamp;
use tracing::debug;

/// Frames-per-second counter, updated on wall-clock second rollover.
///
/// The rate is the number of frames recorded since the previous rollover, divided by the whole
/// seconds elapsed. It reads zero until the second rollover has been seen.
#[derive(Debug, Clone, Default)]
pub struct FrameRate {
	rate: f64,
	frames: u32,
	last: Option<i64>,
}

impl FrameRate {
	pub fn new() -> Self {
		Self::default()
	}

	/// The last computed rate.
	pub fn rate(&self) -> f64 {
		self.rate
	}

	/// Count one frame, against the system clock.
	pub fn record_frame(&mut self) -> f64 {
		self.record_frame_at(Timestamp::now().as_second())
	}

	/// Count one frame completed during the given unix second.
	pub fn record_frame_at(&mut self, second: i64) -> f64 {
		self.frames = self.frames.saturating_add(1);
		if self.last == Some(second) {
			return self.rate;
		}

		if let Some(last) = self.last.filter(|&last| second > last) {
			self.rate = f64::from(self.frames) / (second - last) as f64;
			debug!(fps = self.rate, "frame rate");
		}
		self.frames = 0;
		self.last = Some(second);
		self.rate
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn one_frame_per_second() {
		let mut fps = FrameRate::new();
		assert_eq!(fps.record_frame_at(100), 0.0);
		for second in 101..105 {
			assert_eq!(fps.record_frame_at(second), 1.0);
		}
	}

	#[test]
	fn counts_frames_within_a_second() {
		let mut fps = FrameRate::new();
		fps.record_frame_at(10);
		for _ in 0..29 {
			fps.record_frame_at(10);
		}
		// rollover frame counts toward the finished interval
		assert_eq!(fps.record_frame_at(11), 30.0);
		assert_eq!(fps.rate(), 30.0);
	}

	#[test]
	fn gaps_average_over_elapsed_seconds() {
		let mut fps = FrameRate::new();
		fps.record_frame_at(0);
		fps.record_frame_at(0);
		assert_eq!(fps.record_frame_at(4), 0.5);
	}

	#[test]
	fn clock_going_backwards() {
		let mut fps = FrameRate::new();
		fps.record_frame_at(50);
		fps.record_frame_at(51);
		let rate = fps.record_frame_at(40);
		assert!(rate.is_finite());
		assert_eq!(rate, 1.0);
		assert_eq!(fps.record_frame_at(41), 1.0);
	}

	#[test]
	fn system_clock() {
		let mut fps = FrameRate::new();
		assert!(fps.record_frame().is_finite());
	}
}
