use std::sync::{
	Arc,
	atomic::{AtomicBool, Ordering},
};

use miette::{IntoDiagnostic, Result, WrapErr};
use tracing::{debug, info};

#[derive(Clone, Debug)]
pub struct Context<A = ()> {
	pub args_top: A,
	pub running: Arc<AtomicBool>,
}

impl Context {
	pub fn new() -> Self {
		Self {
			args_top: (),
			running: Arc::new(AtomicBool::new(true)),
		}
	}
}

impl<A> Context<A> {
	pub fn with_top<C>(self, args_top: C) -> Context<C> {
		Context::<C> {
			args_top,
			running: self.running,
		}
	}

	pub fn take_top(self) -> (A, Context) {
		(
			self.args_top,
			Context {
				args_top: (),
				running: self.running,
			},
		)
	}

	/// Clear the running flag on Ctrl-C (or SIGTERM), instead of exiting.
	///
	/// Loops check [`running()`](Self::running) between frames and wind down cleanly.
	pub fn watch_interrupts(&self) -> Result<()> {
		let running = self.running.clone();
		ctrlc::set_handler(move || {
			info!("interrupted, stopping");
			running.store(false, Ordering::SeqCst);
		})
		.into_diagnostic()
		.wrap_err("ctrlc: set_handler")?;
		debug!("watching for interrupts");
		Ok(())
	}

	pub fn running(&self) -> &AtomicBool {
		&self.running
	}
}
