//! Counters and gauges describing a consumer pipeline.
//!
//! Every component of one consumer shares the same [Statistics] handle and writes the
//! indicators it owns. Readers take a [Statistics::snapshot].

use std::{collections::BTreeMap, sync::Arc};

use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Indicator {
	// segment controller
	SegmentsReceivedNum,
	TimeoutsNum,
	NacksNum,
	AppNackNum,
	BytesReceived,
	RawBytesReceived,

	// pipeliner
	RequestedNum,
	RequestedKeyNum,
	RtxNum,
	/// Current pipeline limit.
	DW,
	/// Current pipeline occupancy.
	W,

	// round trips
	DrdOriginalEst,
	DrdCachedEst,

	// buffer
	AssembledNum,
	AssembledKeyNum,
	RecoveredNum,
	RecoveredKeyNum,
	IncompleteNum,
	IncompleteKeyNum,
	DroppedNum,
	DroppedKeyNum,
	LateNum,
	BufferTargetSize,
	BufferPlayableSize,
	BufferReservedSize,

	// playout
	PlayedNum,
	PlayedKeyNum,
	SkippedNum,
	SkippedIncompleteNum,
	SkippedNoKeyNum,
	SkippedBadGopNum,
	LastPlayedNo,
	LastPlayedKeyNo,
	LastPlayedDeltaNo,

	// consumer
	RebufferingsNum,
	StateNum,
	CurrentProducerFramerate,
}

impl Indicator {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::SegmentsReceivedNum => "segments received",
			Self::TimeoutsNum => "timeouts",
			Self::NacksNum => "nacks",
			Self::AppNackNum => "app nacks",
			Self::BytesReceived => "payload bytes received",
			Self::RawBytesReceived => "bytes received",
			Self::RequestedNum => "requested",
			Self::RequestedKeyNum => "requested key",
			Self::RtxNum => "retransmissions",
			Self::DW => "pipeline limit",
			Self::W => "pipeline",
			Self::DrdOriginalEst => "drd original",
			Self::DrdCachedEst => "drd cached",
			Self::AssembledNum => "assembled",
			Self::AssembledKeyNum => "assembled key",
			Self::RecoveredNum => "recovered",
			Self::RecoveredKeyNum => "recovered key",
			Self::IncompleteNum => "incomplete",
			Self::IncompleteKeyNum => "incomplete key",
			Self::DroppedNum => "dropped",
			Self::DroppedKeyNum => "dropped key",
			Self::LateNum => "late",
			Self::BufferTargetSize => "buffer target",
			Self::BufferPlayableSize => "buffer playable",
			Self::BufferReservedSize => "buffer reserved",
			Self::PlayedNum => "played",
			Self::PlayedKeyNum => "played key",
			Self::SkippedNum => "skipped",
			Self::SkippedIncompleteNum => "skipped incomplete",
			Self::SkippedNoKeyNum => "skipped no key",
			Self::SkippedBadGopNum => "skipped bad gop",
			Self::LastPlayedNo => "last played",
			Self::LastPlayedKeyNo => "last played key",
			Self::LastPlayedDeltaNo => "last played delta",
			Self::RebufferingsNum => "rebufferings",
			Self::StateNum => "state",
			Self::CurrentProducerFramerate => "producer rate",
		}
	}
}

/// A shared indicator → value store.
#[derive(Clone, Default)]
pub struct Statistics {
	values: Arc<Mutex<BTreeMap<Indicator, f64>>>,
}

impl Statistics {
	pub fn new() -> Self {
		Self::default()
	}

	/// The current value, zero if it was never written.
	pub fn get(&self, indicator: Indicator) -> f64 {
		self.values.lock().get(&indicator).copied().unwrap_or_default()
	}

	pub fn set(&self, indicator: Indicator, value: f64) {
		self.values.lock().insert(indicator, value);
	}

	pub fn add(&self, indicator: Indicator, value: f64) {
		*self.values.lock().entry(indicator).or_default() += value;
	}

	pub fn increment(&self, indicator: Indicator) {
		self.add(indicator, 1.);
	}

	/// Increment `indicator`, and `key` too when the sample is a key frame.
	pub fn increment_class(&self, indicator: Indicator, key: Indicator, is_key: bool) {
		let mut values = self.values.lock();
		*values.entry(indicator).or_default() += 1.;
		if is_key {
			*values.entry(key).or_default() += 1.;
		}
	}

	pub fn snapshot(&self) -> BTreeMap<Indicator, f64> {
		self.values.lock().clone()
	}

	pub fn reset(&self) {
		self.values.lock().clear();
	}
}

impl std::fmt::Debug for Statistics {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let values = self.snapshot();
		f.debug_map()
			.entries(values.iter().map(|(k, v)| (k.as_str(), v)))
			.finish()
	}
}
