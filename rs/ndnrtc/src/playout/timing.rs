use std::time::Duration;

/// Tracks how long extraction takes and shortens the next wait accordingly.
///
/// Every cycle the time spent beyond the scheduled wait is added to a running processing
/// estimate, and whole milliseconds of it are taken off the next frame's playout time.
#[derive(Debug, Default, Clone)]
pub struct JitterTiming {
	frame_playout_ms: u64,
	processing_us: u64,
	playout_timestamp_us: Option<u64>,
}

impl JitterTiming {
	/// Forget everything measured so far.
	pub fn flush(&mut self) {
		*self = Self::default();
	}

	/// Mark the start of a playout cycle.
	pub fn start_frame_playout(&mut self, now_us: u64) {
		if let Some(previous) = self.playout_timestamp_us {
			let elapsed = now_us.saturating_sub(previous);
			let overhead = elapsed.saturating_sub(self.frame_playout_ms * 1000);
			self.processing_us += overhead;

			tracing::trace!(elapsed, overhead, processing = self.processing_us, "playout cycle");
		}

		self.playout_timestamp_us = Some(now_us);
	}

	/// Turn the producer's declared frame interval into the delay before the next cycle.
	pub fn update_playout_time(&mut self, declared_ms: i64) -> Duration {
		let mut playout_us = declared_ms.max(0) as u64 * 1000;

		if self.processing_us >= 1000 {
			let mut processing = self.processing_us / 1000 * 1000;
			if processing > playout_us {
				tracing::trace!(processing, playout_us, "processing exceeds playout time");
				processing = playout_us;
				playout_us = 0;
			} else {
				playout_us -= processing;
			}

			self.processing_us -= processing;
		}

		self.frame_playout_ms = playout_us / 1000;
		Duration::from_millis(self.frame_playout_ms)
	}

	pub fn processing_us(&self) -> u64 {
		self.processing_us
	}
}
