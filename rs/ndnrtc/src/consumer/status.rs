use crate::{Error, PlaybackEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConsumerStatus {
	#[default]
	Stopped,
	/// Started, nothing received yet.
	NoData,
	/// Receiving, waiting for the first sample to assemble.
	Adjusting,
	/// Filling the buffer up to the jitter target.
	Buffering,
	/// Playing.
	Fetching,
}

impl ConsumerStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Stopped => "stopped",
			Self::NoData => "no-data",
			Self::Adjusting => "adjusting",
			Self::Buffering => "buffering",
			Self::Fetching => "fetching",
		}
	}

	/// Whether the consumer was started.
	pub fn is_running(&self) -> bool {
		*self != Self::Stopped
	}
}

impl std::fmt::Display for ConsumerStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Notifications about one consumer.
pub trait ConsumerObserver: Send + Sync {
	fn on_status_changed(&self, _status: ConsumerStatus) {}
	fn on_rebuffering_occurred(&self) {}
	fn on_playback_event(&self, _event: PlaybackEvent, _seq_no: u64) {}
	fn on_thread_switched(&self, _thread: &str) {}

	/// The consumer hit a failure it cannot recover from and stopped.
	fn on_error(&self, _err: &Error) {}
}
