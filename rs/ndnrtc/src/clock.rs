use std::sync::Arc;

use tokio::time::Instant;

/// A monotonic time source.
///
/// Every idle check, playout deadline and rate measurement reads time through this.
pub trait Clock: Send + Sync + 'static {
	/// Milliseconds since the clock was created.
	fn millis(&self) -> u64;

	/// Microseconds since the clock was created.
	fn micros(&self) -> u64;
}

pub type SharedClock = Arc<dyn Clock>;

/// The production clock.
///
/// We use tokio so it can be stubbed for testing.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
	epoch: Instant,
}

impl MonotonicClock {
	pub fn new() -> Self {
		Self { epoch: Instant::now() }
	}

	pub fn shared() -> SharedClock {
		Arc::new(Self::new())
	}
}

impl Default for MonotonicClock {
	fn default() -> Self {
		Self::new()
	}
}

impl Clock for MonotonicClock {
	fn millis(&self) -> u64 {
		self.epoch.elapsed().as_millis() as u64
	}

	fn micros(&self) -> u64 {
		self.epoch.elapsed().as_micros() as u64
	}
}
