use std::collections::VecDeque;

/// Samples kept by the DRD averages.
pub const DRD_WINDOW: usize = 20;

/// Assumed until the first answer from the producer arrives.
pub const INITIAL_DRD_MS: f64 = 150.;

/// The mean and deviation of the last `window` values.
#[derive(Debug, Clone)]
pub struct SlidingAverage {
	window: usize,
	samples: VecDeque<f64>,
}

impl SlidingAverage {
	pub fn new(window: usize) -> Self {
		let window = window.max(1);
		Self {
			window,
			samples: VecDeque::with_capacity(window),
		}
	}

	pub fn push(&mut self, value: f64) {
		if self.samples.len() == self.window {
			self.samples.pop_front();
		}
		self.samples.push_back(value);
	}

	/// Zero until the first value.
	pub fn value(&self) -> f64 {
		match self.samples.is_empty() {
			true => 0.,
			false => self.samples.iter().sum::<f64>() / self.samples.len() as f64,
		}
	}

	/// Standard deviation of the window.
	pub fn deviation(&self) -> f64 {
		if self.samples.is_empty() {
			return 0.;
		}

		let mean = self.value();
		let variance = self.samples.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / self.samples.len() as f64;
		variance.sqrt()
	}

	pub fn oldest(&self) -> Option<f64> {
		self.samples.front().copied()
	}

	pub fn latest(&self) -> Option<f64> {
		self.samples.back().copied()
	}

	pub fn len(&self) -> usize {
		self.samples.len()
	}

	pub fn is_empty(&self) -> bool {
		self.samples.is_empty()
	}

	pub fn clear(&mut self) {
		self.samples.clear();
	}
}

/// Estimates the data retrieval delay (DRD).
///
/// Answers from the producer itself and answers from network caches are averaged apart:
/// only the former tell how far the consumer is from the live edge. The producer reports
/// how long an interest waited for its sample to be generated, which is not network delay
/// and is subtracted.
#[derive(Debug, Clone)]
pub struct DrdEstimator {
	original: SlidingAverage,
	cached: SlidingAverage,
	generation: SlidingAverage,
}

impl Default for DrdEstimator {
	fn default() -> Self {
		Self {
			original: SlidingAverage::new(DRD_WINDOW),
			cached: SlidingAverage::new(DRD_WINDOW),
			generation: SlidingAverage::new(DRD_WINDOW),
		}
	}
}

impl DrdEstimator {
	pub fn new() -> Self {
		Self::default()
	}

	/// Record one answer, `rtt_ms` after its interest was expressed.
	pub fn observe(&mut self, rtt_ms: f64, original: bool, generation_delay_ms: f64) {
		if original {
			self.original.push((rtt_ms - generation_delay_ms).max(0.));
			self.generation.push(generation_delay_ms);
		} else {
			self.cached.push(rtt_ms);
		}
	}

	pub fn original(&self) -> &SlidingAverage {
		&self.original
	}

	pub fn cached(&self) -> &SlidingAverage {
		&self.cached
	}

	pub fn original_estimate(&self) -> f64 {
		match self.original.is_empty() {
			true => INITIAL_DRD_MS,
			false => self.original.value(),
		}
	}

	pub fn cached_estimate(&self) -> f64 {
		match self.cached.is_empty() {
			true => INITIAL_DRD_MS,
			false => self.cached.value(),
		}
	}

	pub fn generation_delay(&self) -> f64 {
		self.generation.value()
	}

	pub fn reset(&mut self) {
		self.original.clear();
		self.cached.clear();
		self.generation.clear();
	}
}
