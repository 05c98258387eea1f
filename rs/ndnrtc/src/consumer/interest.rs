use crate::{DrdEstimator, Indicator, Statistics};

// How far the limit may grow above the demand.
const UPPER_FACTOR: usize = 8;

// Deviations of DRD added to its mean when estimating demand.
const DEVIATION_ALPHA: f64 = 1.;

/// Sizes the window of samples in flight.
///
/// Enough samples must be requested to cover one data retrieval delay at the producer's
/// rate. That demand is the lower limit; bursts and withholds move the limit between it
/// and eight times it. Nothing is tuned until the producer's rate is known.
#[derive(Debug)]
pub struct InterestControl {
	minimum: usize,
	lower: usize,
	upper: usize,
	limit: usize,
	rate: Option<f64>,
	stats: Statistics,
}

impl InterestControl {
	pub fn new(minimum: usize, stats: Statistics) -> Self {
		let minimum = minimum.max(1);
		stats.set(Indicator::DW, minimum as f64);

		Self {
			minimum,
			lower: minimum,
			upper: minimum * UPPER_FACTOR,
			limit: minimum,
			rate: None,
			stats,
		}
	}

	pub fn limit(&self) -> usize {
		self.limit
	}

	pub fn limits(&self) -> (usize, usize) {
		(self.lower, self.upper)
	}

	/// The producer's rate changed, returns whether the limit did.
	pub fn set_rate(&mut self, rate: f64, drd: &DrdEstimator) -> bool {
		if !(rate.is_finite() && rate > 0.) || self.rate == Some(rate) {
			return false;
		}

		self.rate = Some(rate);
		self.update_limits(drd)
	}

	/// A new answer from the producer itself was averaged in.
	pub fn on_original_drd(&mut self, drd: &DrdEstimator) -> bool {
		match self.rate {
			Some(_) => self.update_limits(drd),
			None => false,
		}
	}

	/// Grow the limit by half.
	pub fn burst(&mut self) -> bool {
		if self.rate.is_none() {
			return false;
		}

		let limit = self.limit + self.limit.div_ceil(2);
		self.change_limit(limit)
	}

	/// Shrink the limit halfway to the lower limit.
	pub fn withhold(&mut self) -> bool {
		if self.rate.is_none() {
			return false;
		}

		let excess = self.limit.saturating_sub(self.lower);
		let step = excess.div_ceil(2);
		if step == 0 {
			return false;
		}

		self.change_limit(self.limit - step)
	}

	pub fn reset(&mut self) {
		self.rate = None;
		self.lower = self.minimum;
		self.upper = self.minimum * UPPER_FACTOR;
		self.limit = self.minimum;
		self.stats.set(Indicator::DW, self.limit as f64);
	}

	fn demand(&self, rate: f64, drd: &DrdEstimator) -> usize {
		let average = drd.original();
		if average.value() <= 0. {
			return self.minimum;
		}

		let delay = average.value() + DEVIATION_ALPHA * average.deviation();
		let demand = (delay * rate / 1000.).ceil() as usize;
		demand.max(self.minimum)
	}

	fn update_limits(&mut self, drd: &DrdEstimator) -> bool {
		let Some(rate) = self.rate else {
			return false;
		};

		let demand = self.demand(rate, drd);
		if demand == self.lower && demand * UPPER_FACTOR == self.upper {
			return false;
		}

		self.lower = demand;
		self.upper = demand * UPPER_FACTOR;
		tracing::debug!(rate, drd = drd.original().value(), lower = self.lower, upper = self.upper, "pipeline limits");

		self.change_limit(self.limit)
	}

	fn change_limit(&mut self, limit: usize) -> bool {
		let limit = limit.clamp(self.lower, self.upper);
		if limit == self.limit {
			return false;
		}

		tracing::debug!(from = self.limit, to = limit, "pipeline limit");
		self.limit = limit;
		self.stats.set(Indicator::DW, limit as f64);
		true
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn drd(values: &[f64]) -> DrdEstimator {
		let mut drd = DrdEstimator::new();
		for v in values {
			drd.observe(*v, true, 0.);
		}
		drd
	}

	#[test]
	fn test_waits_for_rate() {
		let stats = Statistics::new();
		let mut control = InterestControl::new(4, stats.clone());
		assert_eq!(control.limit(), 4);
		assert_eq!(stats.get(Indicator::DW), 4.);

		let drd = drd(&[400.]);
		assert!(!control.on_original_drd(&drd));
		assert!(!control.burst());
		assert_eq!(control.limit(), 4);
	}

	#[test]
	fn test_limits_follow_drd() {
		let stats = Statistics::new();
		let mut control = InterestControl::new(4, stats.clone());

		// 400ms at 30 samples per second
		assert!(control.set_rate(30., &drd(&[400.])));
		assert_eq!(control.limits(), (12, 96));
		assert_eq!(control.limit(), 12);
		assert_eq!(stats.get(Indicator::DW), 12.);

		// the deviation counts too: mean 400, deviation 100
		assert!(control.on_original_drd(&drd(&[300., 500.])));
		assert_eq!(control.limit(), 15);

		// a faster network lowers the floor, the limit follows withholds
		assert!(!control.on_original_drd(&drd(&[50.])));
		assert_eq!(control.limits(), (4, 32));
		assert_eq!(control.limit(), 15);
	}

	#[test]
	fn test_no_drd_keeps_minimum() {
		let mut control = InterestControl::new(4, Statistics::new());
		assert!(!control.set_rate(30., &DrdEstimator::new()));
		assert_eq!(control.limit(), 4);
	}

	#[test]
	fn test_burst_and_withhold() {
		let stats = Statistics::new();
		let mut control = InterestControl::new(4, stats.clone());
		control.set_rate(30., &drd(&[100.]));
		assert_eq!(control.limits(), (4, 32));

		assert!(control.burst());
		assert_eq!(control.limit(), 6);
		assert!(control.burst());
		assert_eq!(control.limit(), 9);
		assert_eq!(stats.get(Indicator::DW), 9.);

		assert!(control.withhold());
		assert_eq!(control.limit(), 6);
		assert!(control.withhold());
		assert!(control.withhold());
		assert_eq!(control.limit(), 4);
		assert!(!control.withhold());

		// never above the upper limit
		for _ in 0..10 {
			control.burst();
		}
		assert_eq!(control.limit(), 32);
	}

	#[test]
	fn test_reset() {
		let stats = Statistics::new();
		let mut control = InterestControl::new(4, stats.clone());
		control.set_rate(30., &drd(&[400.]));
		control.burst();

		control.reset();
		assert_eq!(control.limit(), 4);
		assert_eq!(control.limits(), (4, 32));
		assert_eq!(stats.get(Indicator::DW), 4.);
		assert!(!control.burst());
	}
}
