//! Recording stand-ins for the hardware seams, for tests.

use std::{
	cell::RefCell,
	collections::VecDeque,
	io,
	rc::Rc,
};

use crate::{
	gpio::{ControlLine, Level},
	io::Delay,
	spi::SpiBus,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
	Line(&'static str, Level),
	Write { bytes: Vec<u8>, speed_hz: Option<u32> },
	Delay(u32),
	Released(&'static str),
}

#[derive(Debug, Default)]
struct State {
	events: Vec<Event>,
	attempts: usize,
	plan: VecDeque<bool>,
}

/// Shared event log for a mock bus, its lines, and its delay.
///
/// Bus attempts follow the plan (true = succeed, false = fail), then succeed once it runs out.
/// Only successful writes are logged as events.
#[derive(Debug, Clone, Default)]
pub struct Recorder(Rc<RefCell<State>>);

impl Recorder {
	pub fn bus(&self) -> MockBus {
		MockBus(self.clone())
	}

	pub fn line(&self, name: &'static str) -> MockLine {
		MockLine(name, self.clone())
	}

	pub fn delay(&self) -> MockDelay {
		MockDelay(self.clone())
	}

	pub fn plan(&self, outcomes: impl IntoIterator<Item = bool>) {
		self.0.borrow_mut().plan.extend(outcomes);
	}

	pub fn attempts(&self) -> usize {
		self.0.borrow().attempts
	}

	pub fn events(&self) -> Vec<Event> {
		self.0.borrow().events.clone()
	}

	pub fn clear(&self) {
		let mut state = self.0.borrow_mut();
		state.events.clear();
		state.attempts = 0;
	}

	pub fn writes(&self) -> Vec<Vec<u8>> {
		self.0
			.borrow()
			.events
			.iter()
			.filter_map(|event| match event {
				Event::Write { bytes, .. } => Some(bytes.clone()),
				_ => None,
			})
			.collect()
	}

	fn push(&self, event: Event) {
		self.0.borrow_mut().events.push(event);
	}
}

#[derive(Debug)]
pub struct MockBus(Recorder);

impl SpiBus for MockBus {
	fn send(&mut self, bytes: &[u8], speed_hz: Option<u32>) -> io::Result<()> {
		let ok = {
			let mut state = self.0.0.borrow_mut();
			state.attempts += 1;
			state.plan.pop_front().unwrap_or(true)
		};

		if ok {
			self.0.push(Event::Write {
				bytes: bytes.to_vec(),
				speed_hz,
			});
			Ok(())
		} else {
			Err(io::Error::other("planned failure"))
		}
	}
}

#[derive(Debug)]
pub struct MockLine(&'static str, Recorder);

impl ControlLine for MockLine {
	fn set(&mut self, level: Level) {
		self.1.push(Event::Line(self.0, level));
	}

	fn release(self) {
		self.1.push(Event::Released(self.0));
	}
}

#[derive(Debug)]
pub struct MockDelay(Recorder);

impl Delay for MockDelay {
	fn delay_ms(&mut self, ms: u32) {
		self.0.push(Event::Delay(ms));
	}
}
