use std::time::Duration;

use crate::{DrdEstimator, Indicator, SlidingAverage, Statistics};

// Jitter target in DRD deviations above the mean.
const TARGET_ALPHA: f64 = 2.;
// The jitter target never grows past this many times the configured one.
const TARGET_FACTOR: f64 = 4.;

const STABILITY_WINDOW: usize = 10;
const STABILITY_OCCURRENCES: u32 = 4;
const STABILITY_THRESHOLD: f64 = 0.3;
const RATE_SIMILARITY: f64 = 1. - STABILITY_THRESHOLD;

/// What the interest window should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineAdjust {
	Keep,
	Increase,
	Decrease,
}

// Whether samples arrive at a steady pace close to the producer's rate.
//
// Compares the mean inter-arrival delay of the last samples with the mean of the ones
// before, and both with the producer's frame interval.
#[derive(Debug)]
struct StabilityEstimator {
	recent: SlidingAverage,
	previous: SlidingAverage,
	stable_count: u32,
	unstable_count: u32,
	stable: bool,
	last_ms: Option<u64>,
}

impl StabilityEstimator {
	fn new() -> Self {
		Self {
			recent: SlidingAverage::new(STABILITY_WINDOW),
			previous: SlidingAverage::new(STABILITY_WINDOW),
			stable_count: 0,
			unstable_count: 0,
			stable: false,
			last_ms: None,
		}
	}

	fn observe(&mut self, now_ms: u64, rate: f64) {
		let Some(last) = self.last_ms.replace(now_ms) else {
			return;
		};

		let delta = now_ms.saturating_sub(last) as f64;
		self.previous.push(self.recent.oldest().unwrap_or_default());
		self.recent.push(delta);

		let (mean, previous) = (self.recent.value(), self.previous.value());
		if mean == 0. || previous == 0. {
			return;
		}

		let period = 1000. / rate;
		let similarity = 1. - (mean - period).abs() / period;

		if (previous / mean - 1.).abs() <= STABILITY_THRESHOLD && similarity >= RATE_SIMILARITY {
			self.unstable_count = 0;
			self.stable_count += 1;
		} else {
			self.unstable_count += 1;
			if self.unstable_count >= STABILITY_OCCURRENCES {
				self.stable_count = 0;
			}
		}

		self.stable = self.stable_count >= STABILITY_OCCURRENCES;
	}
}

/// Keeps playout latency close to the network's delay.
///
/// The jitter target follows the producer's DRD. The pipeline is grown while samples
/// arrive irregularly, and shrunk once they arrive steadily at the producer's rate,
/// waiting `timeout` between consecutive decisions.
#[derive(Debug)]
pub struct LatencyControl {
	minimum: Duration,
	target: Duration,
	timeout: Duration,
	rate: f64,

	stability: StabilityEstimator,
	timestamp_ms: Option<u64>,
	waiting: bool,

	stats: Statistics,
}

impl LatencyControl {
	pub fn new(minimum: Duration, timeout: Duration, rate: f64, stats: Statistics) -> Self {
		stats.set(Indicator::BufferTargetSize, minimum.as_millis() as f64);

		Self {
			minimum,
			target: minimum,
			timeout,
			rate,
			stability: StabilityEstimator::new(),
			timestamp_ms: None,
			waiting: false,
			stats,
		}
	}

	/// Buffered media required before playout starts.
	pub fn jitter_target(&self) -> Duration {
		self.target
	}

	pub fn set_rate(&mut self, rate: f64) {
		if rate.is_finite() && rate > 0. {
			self.rate = rate;
		}
	}

	/// A new answer from the producer itself was averaged in, returns whether the jitter
	/// target changed.
	pub fn on_original_drd(&mut self, drd: &DrdEstimator) -> bool {
		let average = drd.original();
		let delay = average.value() + TARGET_ALPHA * average.deviation();

		let minimum = self.minimum.as_millis() as f64;
		let target = match delay > minimum {
			true => delay.min(TARGET_FACTOR * minimum),
			false => minimum,
		};

		let target = Duration::from_millis(target as u64);
		if target == self.target {
			return false;
		}

		tracing::debug!(?target, "jitter target");
		self.target = target;
		self.stats.set(Indicator::BufferTargetSize, target.as_millis() as f64);
		true
	}

	/// The first segment of a sample arrived.
	pub fn sample_arrived(&mut self, now_ms: u64) -> PipelineAdjust {
		let since = *self.timestamp_ms.get_or_insert(now_ms);
		let timed_out = now_ms.saturating_sub(since) > self.timeout.as_millis() as u64;

		self.stability.observe(now_ms, self.rate);

		if self.stability.stable {
			if !self.waiting || timed_out {
				return PipelineAdjust::Decrease;
			}
		} else if timed_out {
			self.timestamp_ms = Some(now_ms);
			self.waiting = false;
			return PipelineAdjust::Increase;
		}

		PipelineAdjust::Keep
	}

	/// The pipeline followed `adjust`.
	pub fn pipeline_changed(&mut self, adjust: PipelineAdjust, now_ms: u64) {
		if adjust == PipelineAdjust::Decrease {
			self.timestamp_ms = Some(now_ms);
			self.waiting = true;
		}
	}

	pub fn reset(&mut self) {
		self.target = self.minimum;
		self.stability = StabilityEstimator::new();
		self.timestamp_ms = None;
		self.waiting = false;
		self.stats.set(Indicator::BufferTargetSize, self.minimum.as_millis() as f64);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn control() -> (LatencyControl, Statistics) {
		let stats = Statistics::new();
		let control = LatencyControl::new(Duration::from_millis(150), Duration::from_secs(1), 30., stats.clone());
		(control, stats)
	}

	fn drd(values: &[f64]) -> DrdEstimator {
		let mut drd = DrdEstimator::new();
		for v in values {
			drd.observe(*v, true, 0.);
		}
		drd
	}

	#[test]
	fn test_target_follows_drd() {
		let (mut control, stats) = control();
		assert_eq!(control.jitter_target(), Duration::from_millis(150));
		assert_eq!(stats.get(Indicator::BufferTargetSize), 150.);

		// mean 300, deviation 20
		assert!(control.on_original_drd(&drd(&[280., 320.])));
		assert_eq!(control.jitter_target(), Duration::from_millis(340));
		assert_eq!(stats.get(Indicator::BufferTargetSize), 340.);

		// capped at four times the configured target
		assert!(control.on_original_drd(&drd(&[2000.])));
		assert_eq!(control.jitter_target(), Duration::from_millis(600));

		// never below it
		assert!(control.on_original_drd(&drd(&[20.])));
		assert_eq!(control.jitter_target(), Duration::from_millis(150));
		assert!(!control.on_original_drd(&drd(&[40.])));
	}

	#[test]
	fn test_steady_arrivals_decrease() {
		let (mut control, _) = control();

		let mut now = 0;
		let mut adjust = PipelineAdjust::Keep;
		for _ in 0..30 {
			now += 33;
			adjust = control.sample_arrived(now);
			if adjust != PipelineAdjust::Keep {
				break;
			}
		}
		assert_eq!(adjust, PipelineAdjust::Decrease);

		// then wait before shrinking again
		control.pipeline_changed(adjust, now);
		assert_eq!(control.sample_arrived(now + 33), PipelineAdjust::Keep);
		assert_eq!(control.sample_arrived(now + 1100), PipelineAdjust::Decrease);
	}

	#[test]
	fn test_irregular_arrivals_increase() {
		let (mut control, _) = control();

		// bursts of samples, far slower than the producer's rate
		let mut adjust = Vec::new();
		for i in 0..12u64 {
			let now = (i / 3) * 400 + (i % 3);
			adjust.push(control.sample_arrived(now));
		}

		assert!(!adjust.contains(&PipelineAdjust::Decrease));
		assert_eq!(adjust.iter().filter(|a| **a == PipelineAdjust::Increase).count(), 1);
	}

	#[test]
	fn test_reset() {
		let (mut control, stats) = control();
		control.on_original_drd(&drd(&[500.]));

		control.reset();
		assert_eq!(control.jitter_target(), Duration::from_millis(150));
		assert_eq!(stats.get(Indicator::BufferTargetSize), 150.);
	}
}
