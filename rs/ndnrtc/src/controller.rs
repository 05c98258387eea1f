use std::{
	sync::{Arc, Weak},
	time::Duration,
};

use parking_lot::Mutex;

use crate::{
	ContentType, Data, Indicator, Interest, MonotonicClock, NackReason, NamespaceInfo, NetworkNack, Periodic,
	ResponseHandler, SharedClock, Statistics, WireSegment, extract_info,
};

/// Receives everything the [SegmentController] demultiplexes.
///
/// Every method has an empty default so observers implement only what they need.
pub trait SegmentObserver: Send + Sync {
	fn segment_arrived(&self, _segment: &WireSegment) {}
	fn segment_request_timeout(&self, _info: &NamespaceInfo, _interest: &Interest) {}
	fn segment_nack(&self, _info: &NamespaceInfo, _reason: NackReason, _interest: &Interest) {}
	fn segment_starvation(&self) {}
}

/// The single entry point for transport responses.
///
/// Data, timeouts and nacks are counted, parsed into [NamespaceInfo] and handed to every
/// attached [SegmentObserver]. While active, a periodic idle check raises starvation once per
/// episode of silence longer than the idle threshold.
#[derive(Clone)]
pub struct SegmentController {
	inner: Arc<Inner>,
}

struct Inner {
	max_idle: Duration,
	stats: Statistics,
	clock: SharedClock,
	state: Mutex<State>,
	observers: Mutex<Vec<Arc<dyn SegmentObserver>>>,
}

#[derive(Default)]
struct State {
	active: bool,
	last_data_ms: u64,
	starvation_fired: bool,
	idle_check: Option<Periodic>,
}

impl SegmentController {
	pub fn new(max_idle: Duration, stats: Statistics) -> Self {
		Self::with_clock(max_idle, stats, MonotonicClock::shared())
	}

	pub fn with_clock(max_idle: Duration, stats: Statistics, clock: SharedClock) -> Self {
		Self {
			inner: Arc::new(Inner {
				max_idle,
				stats,
				clock,
				state: Default::default(),
				observers: Default::default(),
			}),
		}
	}

	/// Activate or deactivate the controller.
	///
	/// Activating resets the idle timer and arms the starvation check, which requires a
	/// tokio runtime. Calling it twice with the same value does nothing.
	pub fn set_active(&self, active: bool) {
		let mut state = self.inner.state.lock();
		if state.active == active {
			return;
		}

		state.active = active;
		state.starvation_fired = false;

		if active {
			state.last_data_ms = self.inner.clock.millis();

			let weak = Arc::downgrade(&self.inner);
			state.idle_check = Some(Periodic::start(self.inner.max_idle, move || {
				weak.upgrade().and_then(|inner| inner.check_starvation())
			}));
		} else {
			state.idle_check = None;
		}

		tracing::debug!(active, "segment controller");
	}

	pub fn is_active(&self) -> bool {
		self.inner.state.lock().active
	}

	pub fn max_idle_time(&self) -> Duration {
		self.inner.max_idle
	}

	/// Time since the last data arrived, or since activation.
	pub fn idle_time(&self) -> Duration {
		let last = self.inner.state.lock().last_data_ms;
		Duration::from_millis(self.inner.clock.millis().saturating_sub(last))
	}

	pub fn attach(&self, observer: Arc<dyn SegmentObserver>) {
		self.inner.observers.lock().push(observer);
	}

	pub fn detach(&self, observer: &Arc<dyn SegmentObserver>) {
		self.inner.observers.lock().retain(|o| !Arc::ptr_eq(o, observer));
	}

	/// The callbacks to register with the transport for every interest.
	///
	/// They hold no strong reference, so they become no-ops once the controller is dropped.
	pub fn handler(&self) -> ResponseHandler {
		let data = Arc::downgrade(&self.inner);
		let timeout = data.clone();
		let nack = data.clone();

		ResponseHandler {
			on_data: Arc::new(move |interest, d| upgrade(&data, |inner| inner.on_data(interest, d))),
			on_timeout: Arc::new(move |interest| upgrade(&timeout, |inner| inner.on_timeout(interest))),
			on_nack: Arc::new(move |interest, n| upgrade(&nack, |inner| inner.on_nack(interest, n))),
		}
	}

	pub fn on_data(&self, interest: &Interest, data: &Data) {
		self.inner.on_data(interest, data)
	}

	pub fn on_timeout(&self, interest: &Interest) {
		self.inner.on_timeout(interest)
	}

	pub fn on_nack(&self, interest: &Interest, nack: &NetworkNack) {
		self.inner.on_nack(interest, nack)
	}
}

fn upgrade<F: FnOnce(&Inner)>(weak: &Weak<Inner>, f: F) {
	if let Some(inner) = weak.upgrade() {
		f(&inner)
	}
}

impl Inner {
	fn observers(&self) -> Vec<Arc<dyn SegmentObserver>> {
		self.observers.lock().clone()
	}

	fn on_data(&self, interest: &Interest, data: &Data) {
		{
			let mut state = self.state.lock();
			if !state.active {
				tracing::warn!(name = %data.name, "data arrived while inactive");
				return;
			}

			if data.content_type == ContentType::Nack {
				tracing::debug!(name = %data.name, "application nack");
				self.stats.increment(Indicator::AppNackNum);
				return;
			}

			state.last_data_ms = self.clock.millis();
			state.starvation_fired = false;
		}

		let Some(info) = extract_info(&data.name) else {
			tracing::warn!(name = %data.name, "failed to extract namespace info");
			return;
		};

		let segment = WireSegment::new(info, interest.clone(), data.clone());
		if !segment.is_valid() {
			tracing::warn!(name = %data.name, "received invalid segment");
			return;
		}

		tracing::trace!(name = %data.name, size = data.content.len(), "segment arrived");

		self.stats.increment(Indicator::SegmentsReceivedNum);
		self.stats.add(Indicator::BytesReceived, segment.payload().len() as f64);
		self.stats.add(Indicator::RawBytesReceived, data.content.len() as f64);

		for observer in self.observers() {
			observer.segment_arrived(&segment);
		}
	}

	fn on_timeout(&self, interest: &Interest) {
		if !self.state.lock().active {
			return;
		}

		let Some(info) = extract_info(&interest.name) else {
			tracing::warn!(name = %interest.name, "timeout for an unrecognized name");
			return;
		};

		tracing::debug!(name = %interest.name, "timeout");

		for observer in self.observers() {
			observer.segment_request_timeout(&info, interest);
		}
		self.stats.increment(Indicator::TimeoutsNum);
	}

	fn on_nack(&self, interest: &Interest, nack: &NetworkNack) {
		if !self.state.lock().active {
			return;
		}

		let Some(info) = extract_info(&interest.name) else {
			tracing::warn!(name = %interest.name, "nack for an unrecognized name");
			return;
		};

		tracing::debug!(name = %interest.name, reason = nack.reason.code(), "nack");

		for observer in self.observers() {
			observer.segment_nack(&info, nack.reason, interest);
		}
		self.stats.increment(Indicator::NacksNum);
	}

	// Returns the delay until the next idle check.
	fn check_starvation(&self) -> Option<Duration> {
		let starving = {
			let mut state = self.state.lock();
			if !state.active {
				return None;
			}

			let idle = self.clock.millis().saturating_sub(state.last_data_ms);
			let starving = idle >= self.max_idle.as_millis() as u64 && !state.starvation_fired;
			if starving {
				state.starvation_fired = true;
				tracing::warn!(idle, "no data received, starvation");
			}

			starving
		};

		if starving {
			for observer in self.observers() {
				observer.segment_starvation();
			}
		}

		Some(self.max_idle)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Name, SegmentHeader};
	use std::sync::atomic::{AtomicUsize, Ordering};

	#[derive(Default)]
	struct Recorder {
		arrived: Mutex<Vec<WireSegment>>,
		timeouts: AtomicUsize,
		nacks: Mutex<Vec<NackReason>>,
		starvations: AtomicUsize,
	}

	impl SegmentObserver for Recorder {
		fn segment_arrived(&self, segment: &WireSegment) {
			self.arrived.lock().push(segment.clone());
		}

		fn segment_request_timeout(&self, _info: &NamespaceInfo, _interest: &Interest) {
			self.timeouts.fetch_add(1, Ordering::SeqCst);
		}

		fn segment_nack(&self, _info: &NamespaceInfo, reason: NackReason, _interest: &Interest) {
			self.nacks.lock().push(reason);
		}

		fn segment_starvation(&self) {
			self.starvations.fetch_add(1, Ordering::SeqCst);
		}
	}

	const NAME: &str = "/ndn/edu/ucla/remap/peter/ndncon/instance1/ndnrtc/%FD%02/video/camera/hi/d/%FE%07/%00%00";

	fn setup() -> (SegmentController, Arc<Recorder>, Statistics) {
		let stats = Statistics::new();
		let controller = SegmentController::new(Duration::from_millis(1000), stats.clone());
		let recorder = Arc::new(Recorder::default());
		controller.attach(recorder.clone());
		(controller, recorder, stats)
	}

	fn interest(name: &str) -> Interest {
		Interest::new(name.parse().unwrap(), Duration::from_secs(1))
	}

	fn data(name: &str) -> Data {
		let header = SegmentHeader {
			playback_no: 1,
			sample_rate: 30.,
			..Default::default()
		};
		Data::new(name.parse().unwrap(), header.wrap(b"frame"))
	}

	#[tokio::test(start_paused = true)]
	async fn test_clean_fetch() {
		let (controller, recorder, stats) = setup();
		controller.set_active(true);

		let interest = interest(NAME);
		let data = data(NAME);
		controller.handler().data(&interest, &data);

		let arrived = recorder.arrived.lock();
		assert_eq!(arrived.len(), 1);
		assert_eq!(arrived[0].data(), &data);
		assert_eq!(arrived[0].interest(), &interest);
		assert_eq!(stats.get(Indicator::SegmentsReceivedNum), 1.);
		assert_eq!(stats.get(Indicator::BytesReceived), 5.);
		assert_eq!(stats.get(Indicator::RawBytesReceived), data.content.len() as f64);
	}

	#[tokio::test(start_paused = true)]
	async fn test_timeout_then_nack() {
		let (controller, recorder, stats) = setup();
		controller.set_active(true);

		let interest = interest(NAME);
		controller.on_timeout(&interest);
		controller.on_nack(&interest, &NetworkNack::default());

		assert_eq!(recorder.timeouts.load(Ordering::SeqCst), 1);
		assert_eq!(*recorder.nacks.lock(), vec![NackReason::None]);
		assert_eq!(stats.get(Indicator::TimeoutsNum), 1.);
		assert_eq!(stats.get(Indicator::NacksNum), 1.);
	}

	#[tokio::test(start_paused = true)]
	async fn test_inactive_gating() {
		let (controller, recorder, stats) = setup();

		let interest = interest(NAME);
		controller.on_data(&interest, &data(NAME));
		controller.on_timeout(&interest);
		controller.on_nack(&interest, &NetworkNack::new(NackReason::Congestion));

		assert!(recorder.arrived.lock().is_empty());
		assert_eq!(recorder.timeouts.load(Ordering::SeqCst), 0);
		assert!(recorder.nacks.lock().is_empty());
		assert!(stats.snapshot().is_empty());

		controller.set_active(true);
		controller.on_data(&interest, &data(NAME));
		controller.on_timeout(&interest);
		controller.on_nack(&interest, &NetworkNack::new(NackReason::Congestion));

		assert_eq!(recorder.arrived.lock().len(), 1);
		assert_eq!(recorder.timeouts.load(Ordering::SeqCst), 1);
		assert_eq!(*recorder.nacks.lock(), vec![NackReason::Congestion]);
		assert_eq!(stats.get(Indicator::SegmentsReceivedNum), 1.);
		assert_eq!(stats.get(Indicator::TimeoutsNum), 1.);
		assert_eq!(stats.get(Indicator::NacksNum), 1.);

		controller.set_active(false);
		controller.on_data(&interest, &data(NAME));
		assert_eq!(recorder.arrived.lock().len(), 1);
		assert_eq!(stats.get(Indicator::SegmentsReceivedNum), 1.);
	}

	#[tokio::test(start_paused = true)]
	async fn test_malformed_names_dropped() {
		let (controller, recorder, stats) = setup();
		controller.set_active(true);

		let bad = "/ndn/edu/ucla/ndnrtc/%FD%02/video/camera/hi/d/%FD%07/%00%00";
		controller.on_data(&interest(bad), &data(bad));
		controller.on_timeout(&interest(bad));
		controller.on_nack(&interest(bad), &NetworkNack::default());

		// the name parses, but the content does not
		controller.on_data(&interest(NAME), &Data::new(NAME.parse::<Name>().unwrap(), &b"junk"[..]));

		assert!(recorder.arrived.lock().is_empty());
		assert_eq!(recorder.timeouts.load(Ordering::SeqCst), 0);
		assert!(recorder.nacks.lock().is_empty());
		assert_eq!(stats.get(Indicator::SegmentsReceivedNum), 0.);
		assert_eq!(stats.get(Indicator::TimeoutsNum), 0.);
	}

	#[tokio::test(start_paused = true)]
	async fn test_app_nack() {
		let (controller, recorder, stats) = setup();
		controller.set_active(true);

		let nack = data(NAME).with_content_type(ContentType::Nack);
		controller.on_data(&interest(NAME), &nack);

		assert!(recorder.arrived.lock().is_empty());
		assert_eq!(stats.get(Indicator::AppNackNum), 1.);
		assert_eq!(stats.get(Indicator::SegmentsReceivedNum), 0.);
	}

	#[tokio::test(start_paused = true)]
	async fn test_starvation_fires_once() {
		let (controller, recorder, _) = setup();
		controller.set_active(true);

		tokio::time::sleep(Duration::from_millis(10_500)).await;
		assert_eq!(recorder.starvations.load(Ordering::SeqCst), 1);
		assert!(controller.idle_time() >= Duration::from_millis(10_000));
	}

	#[tokio::test(start_paused = true)]
	async fn test_starvation_rearms_after_data() {
		let (controller, recorder, _) = setup();
		controller.set_active(true);

		tokio::time::sleep(Duration::from_millis(1500)).await;
		assert_eq!(recorder.starvations.load(Ordering::SeqCst), 1);

		controller.on_data(&interest(NAME), &data(NAME));
		assert_eq!(controller.idle_time(), Duration::ZERO);

		// checks run at 2000 (idle 500) and 3000 (idle 1500)
		tokio::time::sleep(Duration::from_millis(1000)).await;
		assert_eq!(recorder.starvations.load(Ordering::SeqCst), 1);
		tokio::time::sleep(Duration::from_millis(1000)).await;
		assert_eq!(recorder.starvations.load(Ordering::SeqCst), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_deactivate_cancels_idle_check() {
		let (controller, recorder, _) = setup();
		controller.set_active(true);
		controller.set_active(false);

		tokio::time::sleep(Duration::from_millis(5000)).await;
		assert_eq!(recorder.starvations.load(Ordering::SeqCst), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn test_detach() {
		let (controller, recorder, _) = setup();
		controller.set_active(true);

		let observer: Arc<dyn SegmentObserver> = recorder.clone();
		controller.detach(&observer);
		controller.on_data(&interest(NAME), &data(NAME));

		assert!(recorder.arrived.lock().is_empty());
	}
}
