use std::{collections::HashMap, time::Duration};

use crate::{
	ConsumerConfig, DrdEstimator, Indicator, Interest, InterestControl, LatencyControl, PipelineAdjust, Statistics,
	WireSegment,
};

/// Tunes the interest window and the jitter target to the network.
///
/// Every expressed interest is timestamped by nonce; its answer yields one round trip
/// for the [DrdEstimator]. Answers from the producer itself move the window limits and
/// the jitter target, the pace of arriving samples grows or shrinks the window between
/// those limits.
#[derive(Debug)]
pub struct PipelineControl {
	drd: DrdEstimator,
	interest: InterestControl,
	latency: LatencyControl,

	// Interest nonce to the clock millisecond it was expressed at.
	expressed: HashMap<u32, u64>,
	stats: Statistics,
}

impl PipelineControl {
	pub fn new(config: &ConsumerConfig, stats: Statistics) -> Self {
		Self {
			drd: DrdEstimator::new(),
			interest: InterestControl::new(config.pipeline_window, stats.clone()),
			latency: LatencyControl::new(
				config.jitter_target,
				config.latency_timeout,
				config.default_rate,
				stats.clone(),
			),
			expressed: HashMap::new(),
			stats,
		}
	}

	pub fn expressed<'a>(&mut self, interests: impl IntoIterator<Item = &'a Interest>, now_ms: u64) {
		for interest in interests {
			self.expressed.insert(interest.nonce, now_ms);
		}
	}

	/// The interest timed out or was nacked.
	pub fn unanswered(&mut self, interest: &Interest) {
		self.expressed.remove(&interest.nonce);
	}

	/// A segment arrived, `first` when no other segment of its sample did before.
	pub fn on_segment(&mut self, segment: &WireSegment, first: bool, now_ms: u64) {
		let Some(header) = segment.header() else {
			return;
		};

		if let Some(sent) = self.expressed.remove(&segment.interest().nonce) {
			let rtt = now_ms.saturating_sub(sent) as f64;
			let original = segment.is_original();
			self.drd.observe(rtt, original, header.generation_delay_ms as f64);
			tracing::trace!(rtt, original, "round trip");

			if original {
				self.interest.on_original_drd(&self.drd);
				self.latency.on_original_drd(&self.drd);
				self.stats.set(Indicator::DrdOriginalEst, self.drd.original_estimate());
			} else {
				self.stats.set(Indicator::DrdCachedEst, self.drd.cached_estimate());
			}
		}

		let info = segment.info();
		if !info.is_parity() && info.segment_no == 0 && header.sample_rate > 0. {
			self.interest.set_rate(header.sample_rate, &self.drd);
			self.latency.set_rate(header.sample_rate);
		}

		if first {
			let adjust = self.latency.sample_arrived(now_ms);
			match adjust {
				PipelineAdjust::Increase => {
					self.interest.burst();
				}
				PipelineAdjust::Decrease => {
					self.interest.withhold();
				}
				PipelineAdjust::Keep => return,
			}

			tracing::trace!(?adjust, limit = self.interest.limit(), "pipeline adjusted");
			self.latency.pipeline_changed(adjust, now_ms);
		}
	}

	/// Samples to keep in flight.
	pub fn window(&self) -> usize {
		self.interest.limit()
	}

	pub fn jitter_target(&self) -> Duration {
		self.latency.jitter_target()
	}

	pub fn drd(&self) -> &DrdEstimator {
		&self.drd
	}

	/// Start over from the configured window and jitter target.
	pub fn reset(&mut self) {
		self.drd.reset();
		self.interest.reset();
		self.latency.reset();
		self.expressed.clear();
	}
}
