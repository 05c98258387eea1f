use std::{
	sync::{Arc, Weak},
	time::Duration,
};

use parking_lot::Mutex;

use crate::{
	AudioProcessor, AudioSink, Buffer, ConsumerConfig, ConsumerObserver, ConsumerStatus, Error, Face, Indicator,
	Interest, MonotonicClock, NackReason, NamespaceInfo, NetworkNack, PipelineControl, PlaybackEvent, Pipeliner,
	Playout, PlayoutObserver, ResponseHandler, Result, SampleProcessor, SegmentController, SegmentObserver, SharedClock,
	Statistics, VideoProcessor, VideoSink, WireSegment, thread_prefix,
};

/// Fetches one remote stream thread and plays it out.
///
/// The consumer wires a [SegmentController], a [Pipeliner], a [Buffer] and a [Playout]
/// together. Nothing is requested until [Consumer::start]; from then on every arriving
/// segment is routed into the buffer and answered with the next interests, and playout
/// begins once the buffer holds the jitter target. A [PipelineControl] sizes the window
/// and the jitter target from the measured retrieval delay.
#[derive(Clone)]
pub struct Consumer {
	inner: Arc<Inner>,
}

struct Inner {
	config: ConsumerConfig,
	face: Arc<dyn Face>,
	stats: Statistics,
	clock: SharedClock,

	controller: SegmentController,
	buffer: Arc<Mutex<Buffer>>,
	playout: Playout,

	// Locked before the buffer, never the other way around.
	state: Mutex<State>,
	observers: Mutex<Vec<Arc<dyn ConsumerObserver>>>,
}

struct State {
	status: ConsumerStatus,
	initialized: bool,
	pipeliner: Pipeliner,
	control: PipelineControl,
	thread: String,

	// When fetching last (re)started, in clock milliseconds.
	restarted_ms: u64,
}

// What to tell observers once the locks are released.
enum Notice {
	Status(ConsumerStatus),
	Rebuffering,
	Playback(PlaybackEvent, u64),
	ThreadSwitched(String),
	Error(Error),
}

impl Consumer {
	pub fn video(config: ConsumerConfig, face: Arc<dyn Face>, sink: Box<dyn VideoSink>) -> Self {
		let stats = Statistics::new();
		let processor = VideoProcessor::new(sink, stats.clone());
		Self::new(config, face, stats, Box::new(processor))
	}

	pub fn audio(config: ConsumerConfig, face: Arc<dyn Face>, sink: Box<dyn AudioSink>) -> Self {
		let stats = Statistics::new();
		let processor = AudioProcessor::new(sink, stats.clone());
		Self::new(config, face, stats, Box::new(processor))
	}

	/// A consumer with a custom processor, which should write to `stats`.
	pub fn new(
		config: ConsumerConfig,
		face: Arc<dyn Face>,
		stats: Statistics,
		processor: Box<dyn SampleProcessor>,
	) -> Self {
		let clock = MonotonicClock::shared();
		let controller = SegmentController::with_clock(config.max_idle_time, stats.clone(), clock.clone());
		let buffer = Arc::new(Mutex::new(Buffer::new(
			config.buffer_capacity,
			config.default_rate,
			stats.clone(),
		)));
		let playout = Playout::with_clock(buffer.clone(), processor, config.queue_poll, clock.clone());

		let prefix = thread_prefix(&config.base_prefix, config.stream_type, &config.stream, &config.thread);
		let state = State {
			status: ConsumerStatus::Stopped,
			initialized: false,
			pipeliner: Pipeliner::new(prefix, &config, stats.clone()),
			control: PipelineControl::new(&config, stats.clone()),
			thread: config.thread.clone(),
			restarted_ms: 0,
		};

		Self {
			inner: Arc::new(Inner {
				config,
				face,
				stats,
				clock,
				controller,
				buffer,
				playout,
				state: Mutex::new(state),
				observers: Default::default(),
			}),
		}
	}

	/// Validate the configuration and connect the pipeline stages.
	///
	/// Calling it again after a success does nothing.
	pub fn init(&self) -> Result<()> {
		let mut state = self.inner.state.lock();
		if state.initialized {
			return Ok(());
		}

		self.inner.config.validate()?;

		let link = Arc::new(Link {
			consumer: Arc::downgrade(&self.inner),
		});
		self.inner.controller.attach(link.clone());
		self.inner.playout.attach(link);

		state.initialized = true;
		tracing::debug!(prefix = %state.pipeliner.prefix(), "consumer initialized");

		Ok(())
	}

	/// Start fetching, requires a tokio runtime.
	pub fn start(&self) -> Result<()> {
		let interest = {
			let mut state = self.inner.state.lock();
			if !state.initialized {
				return Err(Error::NotInitialized);
			}
			if state.status.is_running() {
				return Err(Error::AlreadyRunning);
			}

			self.inner.controller.set_active(true);
			self.inner.set_status(&mut state, ConsumerStatus::NoData);
			self.inner.restart(&mut state)
		};

		tracing::info!(name = %interest.name, "consumer started");

		self.inner.notify(vec![Notice::Status(ConsumerStatus::NoData)]);
		self.inner.express_rightmost(interest);

		Ok(())
	}

	/// Stop fetching and drop everything buffered. Does nothing when already stopped.
	pub fn stop(&self) {
		if self.inner.halt() {
			self.inner.notify(vec![Notice::Status(ConsumerStatus::Stopped)]);
		}
	}

	/// Drop the buffered samples and rediscover the live edge without a full restart.
	pub fn trigger_rebuffering(&self) -> Result<()> {
		self.inner.rebuffer()
	}

	/// Fetch another quality thread of the same stream.
	///
	/// A running consumer rebuffers from the new thread's live edge.
	pub fn switch_thread(&self, thread: &str) -> Result<()> {
		if thread.is_empty() {
			return Err(Error::InvalidConfig("empty thread name".into()));
		}

		let running = {
			let mut state = self.inner.state.lock();
			if state.thread == thread {
				return Ok(());
			}

			let config = &self.inner.config;
			let prefix = thread_prefix(&config.base_prefix, config.stream_type, &config.stream, thread);
			state.pipeliner.set_prefix(prefix);
			state.thread = thread.to_string();

			state.status.is_running()
		};

		tracing::info!(thread, "switching thread");

		if running {
			self.inner.rebuffer()?;
		}

		self.inner.notify(vec![Notice::ThreadSwitched(thread.to_string())]);
		Ok(())
	}

	pub fn status(&self) -> ConsumerStatus {
		self.inner.state.lock().status
	}

	pub fn thread(&self) -> String {
		self.inner.state.lock().thread.clone()
	}

	pub fn statistics(&self) -> Statistics {
		self.inner.stats.clone()
	}

	pub fn config(&self) -> &ConsumerConfig {
		&self.inner.config
	}

	/// Time without data, counted from the last start or rebuffering at most.
	pub fn idle_time(&self) -> Duration {
		let restarted = self.inner.state.lock().restarted_ms;
		let since_restart = Duration::from_millis(self.inner.clock.millis().saturating_sub(restarted));

		self.inner.controller.idle_time().min(since_restart)
	}

	pub fn attach(&self, observer: Arc<dyn ConsumerObserver>) {
		self.inner.observers.lock().push(observer);
	}

	pub fn detach(&self, observer: &Arc<dyn ConsumerObserver>) {
		self.inner.observers.lock().retain(|o| !Arc::ptr_eq(o, observer));
	}
}

impl Inner {
	fn set_status(&self, state: &mut State, status: ConsumerStatus) -> bool {
		if state.status == status {
			return false;
		}

		tracing::debug!(from = %state.status, to = %status, "consumer status");
		state.status = status;
		self.stats.set(Indicator::StateNum, status as u8 as f64);
		true
	}

	// Rediscover the live edge with a clean pipeline, returning the rightmost interest.
	fn restart(&self, state: &mut State) -> Interest {
		let now = self.clock.millis();
		state.restarted_ms = now;
		state.control.reset();

		// Nothing is requested before the live edge is known.
		let interest = state.pipeliner.start();
		state.pipeliner.set_window(state.control.window());

		state.control.expressed([&interest], now);
		interest
	}

	// Returns whether the consumer was running.
	fn halt(&self) -> bool {
		let mut state = self.state.lock();
		if !state.status.is_running() {
			return false;
		}

		self.controller.set_active(false);
		self.playout.stop();
		self.buffer.lock().reset();
		state.pipeliner.reset();
		state.control.reset();
		self.set_status(&mut state, ConsumerStatus::Stopped);

		tracing::info!("consumer stopped");
		true
	}

	fn rebuffer(self: &Arc<Self>) -> Result<()> {
		let (interest, changed) = {
			let mut state = self.state.lock();
			if !state.status.is_running() {
				return Err(Error::NotRunning);
			}

			self.stats.increment(Indicator::RebufferingsNum);
			self.playout.stop();
			self.buffer.lock().reset();

			let changed = self.set_status(&mut state, ConsumerStatus::Adjusting);
			(self.restart(&mut state), changed)
		};

		tracing::warn!(name = %interest.name, "rebuffering");

		let mut notices = vec![Notice::Rebuffering];
		if changed {
			notices.push(Notice::Status(ConsumerStatus::Adjusting));
		}
		self.notify(notices);
		self.express_rightmost(interest);

		Ok(())
	}

	fn on_segment(self: &Arc<Self>, segment: &WireSegment) {
		let info = segment.info();
		if info.is_meta() || info.stream_type != self.config.stream_type || info.stream_name != self.config.stream {
			return;
		}

		let mut notices = Vec::new();
		let interests = {
			let mut state = self.state.lock();
			if !state.status.is_running() || info.thread_name != state.thread {
				tracing::trace!(name = %segment.data().name, "segment for another thread");
				return;
			}

			let now = self.clock.millis();
			let (slot, first, departed, has_ready, playable) = {
				let mut buffer = self.buffer.lock();
				let slot = buffer.received(segment);
				let first = slot.is_some()
					&& segment
						.header()
						.and_then(|header| buffer.slot(header.playback_no))
						.is_some_and(|s| s.received_data() + s.received_parity() == 1);
				(slot, first, buffer.take_departed(), buffer.has_ready(), buffer.playable_duration())
			};

			state.control.on_segment(segment, first, now);
			let window = state.control.window();

			let mut interests = state.pipeliner.set_window(window);
			interests.extend(state.pipeliner.forget(&departed));
			interests.extend(state.pipeliner.on_segment(segment, slot));
			state.control.expressed(&interests, now);

			if state.status == ConsumerStatus::NoData && self.set_status(&mut state, ConsumerStatus::Adjusting) {
				notices.push(Notice::Status(ConsumerStatus::Adjusting));
			}

			if state.status == ConsumerStatus::Adjusting
				&& has_ready && self.set_status(&mut state, ConsumerStatus::Buffering)
			{
				notices.push(Notice::Status(ConsumerStatus::Buffering));
			}

			let target = state.control.jitter_target().as_millis() as f64;
			if state.status == ConsumerStatus::Buffering && playable >= target {
				// Play the surplus out faster to get back to the target latency.
				let fast_forward = Duration::from_millis((playable - target) as u64);
				match self.playout.start(fast_forward) {
					Ok(()) | Err(Error::AlreadyRunning) => {
						if self.set_status(&mut state, ConsumerStatus::Fetching) {
							notices.push(Notice::Status(ConsumerStatus::Fetching));
						}
					}
					Err(err) => notices.push(Notice::Error(err)),
				}
			}

			interests
		};

		self.express(interests);
		self.notify(notices);
	}

	fn on_timeout(&self, info: &NamespaceInfo, interest: &Interest) {
		let interests = {
			let mut state = self.state.lock();
			state.control.unanswered(interest);
			if !state.status.is_running() || info.thread_name != state.thread {
				return;
			}

			let departed = self.buffer.lock().take_departed();
			let mut interests = state.pipeliner.forget(&departed);
			interests.extend(state.pipeliner.on_timeout(info, interest));
			state.control.expressed(&interests, self.clock.millis());
			interests
		};

		self.express(interests);
	}

	// The rightmost interest went unanswered, ask again while still discovering.
	fn rediscover(self: &Arc<Self>, unanswered: &Interest) {
		let interest = {
			let mut state = self.state.lock();
			state.control.unanswered(unanswered);
			if !state.status.is_running() || state.pipeliner.is_discovered() {
				return;
			}

			let interest = state.pipeliner.rightmost();
			state.control.expressed([&interest], self.clock.millis());
			interest
		};

		tracing::debug!(name = %interest.name, "no live edge yet");
		self.express_rightmost(interest);
	}

	fn fail(&self, err: Error) {
		tracing::error!(%err, "consumer failed");

		let mut notices = Vec::new();
		if self.halt() {
			notices.push(Notice::Status(ConsumerStatus::Stopped));
		}
		notices.push(Notice::Error(err));

		self.notify(notices);
	}

	fn express(&self, interests: Vec<Interest>) {
		if interests.is_empty() {
			return;
		}

		let handler = self.controller.handler();
		for interest in interests {
			tracing::trace!(name = %interest.name, "express");
			self.face.express_interest(interest, handler.clone());
		}
	}

	// The rightmost name stops short of a sample, so the controller cannot route its
	// timeouts. Data still goes through the controller, the answer names a full segment.
	fn express_rightmost(self: &Arc<Self>, interest: Interest) {
		let timeout = Arc::downgrade(self);
		let nack = timeout.clone();

		let handler = ResponseHandler {
			on_data: self.controller.handler().on_data,
			on_timeout: Arc::new(move |interest: &Interest| {
				if let Some(inner) = timeout.upgrade() {
					inner.rediscover(interest)
				}
			}),
			on_nack: Arc::new(move |interest: &Interest, _: &NetworkNack| {
				if let Some(inner) = nack.upgrade() {
					inner.rediscover(interest)
				}
			}),
		};

		self.face.express_interest(interest, handler);
	}

	fn notify(&self, notices: Vec<Notice>) {
		if notices.is_empty() {
			return;
		}

		let observers = self.observers.lock().clone();
		for notice in notices.iter() {
			for observer in observers.iter() {
				match notice {
					Notice::Status(status) => observer.on_status_changed(*status),
					Notice::Rebuffering => observer.on_rebuffering_occurred(),
					Notice::Playback(event, seq_no) => observer.on_playback_event(*event, *seq_no),
					Notice::ThreadSwitched(thread) => observer.on_thread_switched(thread),
					Notice::Error(err) => observer.on_error(err),
				}
			}
		}
	}
}

// Routes controller and playout events back to the consumer without keeping it alive.
struct Link {
	consumer: Weak<Inner>,
}

impl SegmentObserver for Link {
	fn segment_arrived(&self, segment: &WireSegment) {
		if let Some(inner) = self.consumer.upgrade() {
			inner.on_segment(segment);
		}
	}

	fn segment_request_timeout(&self, info: &NamespaceInfo, interest: &Interest) {
		if let Some(inner) = self.consumer.upgrade() {
			inner.on_timeout(info, interest);
		}
	}

	fn segment_nack(&self, info: &NamespaceInfo, reason: NackReason, interest: &Interest) {
		tracing::trace!(name = %interest.name, ?reason, "nack");
		if let Some(inner) = self.consumer.upgrade() {
			inner.on_timeout(info, interest);
		}
	}

	fn segment_starvation(&self) {
		if let Some(inner) = self.consumer.upgrade() {
			if let Err(err) = inner.rebuffer() {
				tracing::debug!(%err, "starvation while stopped");
			}
		}
	}
}

impl PlayoutObserver for Link {
	fn frame_skipped(&self, _playback_no: u64, seq_no: u64, _key: bool, reason: PlaybackEvent) {
		if let Some(inner) = self.consumer.upgrade() {
			inner.notify(vec![Notice::Playback(reason, seq_no)]);
		}
	}

	fn recovery_failure(&self, seq_no: u64, key: bool) {
		tracing::warn!(seq_no, key, "sample did not decode after assembly");
	}

	fn playout_failure(&self, err: &Error) {
		if let Some(inner) = self.consumer.upgrade() {
			inner.fail(err.clone());
		}
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::*;
	use crate::{
		Data, Frame, SegmentHeader, StreamType, extract_info,
		testing::{Producer, RecordingFace},
	};

	#[derive(Clone, Default)]
	struct Sink {
		played: Arc<Mutex<Vec<u64>>>,
	}

	impl VideoSink for Sink {
		fn process_frame(&mut self, frame: &Frame) -> Result<()> {
			self.played.lock().push(frame.playback_no);
			Ok(())
		}
	}

	#[derive(Default)]
	struct Observer {
		statuses: Mutex<Vec<ConsumerStatus>>,
		rebufferings: Mutex<u32>,
		threads: Mutex<Vec<String>>,
	}

	impl ConsumerObserver for Observer {
		fn on_status_changed(&self, status: ConsumerStatus) {
			self.statuses.lock().push(status);
		}

		fn on_rebuffering_occurred(&self) {
			*self.rebufferings.lock() += 1;
		}

		fn on_thread_switched(&self, thread: &str) {
			self.threads.lock().push(thread.to_string());
		}
	}

	fn config() -> ConsumerConfig {
		ConsumerConfig {
			base_prefix: "/ndn/edu/ucla/remap/peter".parse().unwrap(),
			stream: "camera".into(),
			thread: "hi".into(),
			stream_type: StreamType::Video,
			..Default::default()
		}
	}

	fn setup(config: ConsumerConfig) -> (Consumer, Arc<RecordingFace>, Sink, Arc<Observer>) {
		let face = Arc::new(RecordingFace::default());
		let sink = Sink::default();
		let consumer = Consumer::video(config, face.clone(), Box::new(sink.clone()));

		let observer = Arc::new(Observer::default());
		consumer.attach(observer.clone());

		(consumer, face, sink, observer)
	}

	// Answers every interest the producer has data for, until nothing is left to answer.
	fn serve(face: &RecordingFace, published: &HashMap<String, Data>, edge: &Data) {
		loop {
			let expressed = face.take();
			if expressed.is_empty() {
				return;
			}

			for (interest, handler) in expressed {
				if interest.rightmost {
					handler.data(&interest, edge);
				} else if let Some(data) = published.get(&interest.name.to_string()) {
					handler.data(&interest, data);
				}
			}
		}
	}

	// The first data segment of a delta sample.
	fn delta(producer: &Producer, published: &HashMap<String, Data>, seq: u64) -> Data {
		let name = producer.prefix.clone().append("d").append_sequence(seq).append_segment(0);
		published[&name.to_string()].clone()
	}

	// The same data as answered by the producer itself to `interest`.
	fn original(interest: &Interest, data: &Data) -> Data {
		let segment = WireSegment::new(extract_info(&data.name).unwrap(), interest.clone(), data.clone());
		let header = SegmentHeader {
			interest_nonce: interest.nonce,
			..*segment.header().unwrap()
		};

		let mut data = data.clone();
		data.content = header.wrap(segment.payload());
		data
	}

	fn publish(producer: &mut Producer, count: usize) -> HashMap<String, Data> {
		let mut published = HashMap::new();
		for _ in 0..count {
			let sample = producer.next(150);
			for (_, data) in sample.data.iter().chain(sample.parity.iter()) {
				published.insert(data.name.to_string(), data.clone());
			}
		}
		published
	}

	#[tokio::test(start_paused = true)]
	async fn test_lifecycle_errors() {
		let (consumer, _, _, _) = setup(config());
		assert!(matches!(consumer.start(), Err(Error::NotInitialized)));
		assert!(matches!(consumer.trigger_rebuffering(), Err(Error::NotRunning)));

		consumer.init().unwrap();
		consumer.start().unwrap();
		assert!(matches!(consumer.start(), Err(Error::AlreadyRunning)));

		let (consumer, _, _, _) = setup(ConsumerConfig {
			buffer_capacity: 0,
			..config()
		});
		assert!(matches!(consumer.init(), Err(Error::InvalidConfig(_))));
	}

	#[tokio::test(start_paused = true)]
	async fn test_start_expresses_rightmost() {
		let (consumer, face, _, observer) = setup(config());
		consumer.init().unwrap();
		consumer.start().unwrap();

		assert_eq!(consumer.status(), ConsumerStatus::NoData);
		assert_eq!(*observer.statuses.lock(), vec![ConsumerStatus::NoData]);

		let expressed = face.take();
		assert_eq!(expressed.len(), 1);
		let (interest, handler) = &expressed[0];
		assert!(interest.rightmost);
		assert_eq!(interest.name, Producer::video().prefix.append("d"));

		// unanswered, so ask again
		handler.timeout(interest);
		let retry = face.take();
		assert_eq!(retry.len(), 1);
		assert!(retry[0].0.rightmost);
		assert_eq!(retry[0].0.name, interest.name);
	}

	#[tokio::test(start_paused = true)]
	async fn test_fetch_and_play() {
		let (consumer, face, sink, observer) = setup(config());
		consumer.init().unwrap();
		consumer.start().unwrap();

		// key 0 and deltas 0..29, the live edge is delta 4
		let mut producer = Producer::video();
		let published = publish(&mut producer, 30);
		let edge = delta(&producer, &published, 4);

		serve(&face, &published, &edge);

		assert_eq!(consumer.status(), ConsumerStatus::Fetching);
		assert_eq!(
			*observer.statuses.lock(),
			vec![
				ConsumerStatus::NoData,
				ConsumerStatus::Adjusting,
				ConsumerStatus::Buffering,
				ConsumerStatus::Fetching
			]
		);

		let stats = consumer.statistics();
		assert_eq!(stats.get(Indicator::AssembledNum), 30.);
		assert_eq!(stats.get(Indicator::AssembledKeyNum), 1.);
		assert_eq!(stats.get(Indicator::StateNum), ConsumerStatus::Fetching as u8 as f64);
		assert_eq!(stats.get(Indicator::BufferTargetSize), 150.);

		tokio::time::sleep(Duration::from_millis(1500)).await;
		assert_eq!(*sink.played.lock(), (0..30).collect::<Vec<u64>>());
		assert_eq!(stats.get(Indicator::PlayedNum), 30.);
		assert_eq!(stats.get(Indicator::PlayedKeyNum), 1.);
	}

	#[tokio::test(start_paused = true)]
	async fn test_starvation_rebuffers() {
		let (consumer, face, _, observer) = setup(config());
		consumer.init().unwrap();
		consumer.start().unwrap();

		let mut producer = Producer::video();
		let published = publish(&mut producer, 10);
		let edge = delta(&producer, &published, 2);
		serve(&face, &published, &edge);
		assert_eq!(consumer.status(), ConsumerStatus::Fetching);

		// the producer went quiet
		tokio::time::sleep(Duration::from_millis(2500)).await;

		assert_eq!(consumer.status(), ConsumerStatus::Adjusting);
		assert_eq!(*observer.rebufferings.lock(), 1);
		assert_eq!(consumer.statistics().get(Indicator::RebufferingsNum), 1.);

		let expressed = face.take();
		assert!(expressed.iter().any(|(i, _)| i.rightmost));

		// starvation is reported once per outage
		tokio::time::sleep(Duration::from_millis(5000)).await;
		assert_eq!(*observer.rebufferings.lock(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_stop() {
		let (consumer, face, sink, observer) = setup(config());
		consumer.init().unwrap();
		consumer.start().unwrap();

		let mut producer = Producer::video();
		let published = publish(&mut producer, 10);
		let edge = delta(&producer, &published, 2);

		let rightmost = face.take();
		consumer.stop();
		assert_eq!(consumer.status(), ConsumerStatus::Stopped);
		assert_eq!(observer.statuses.lock().last(), Some(&ConsumerStatus::Stopped));

		// late answers are ignored
		for (interest, handler) in rightmost {
			handler.data(&interest, &edge);
		}
		assert!(face.take().is_empty());

		tokio::time::sleep(Duration::from_millis(1000)).await;
		assert!(sink.played.lock().is_empty());

		// stopping twice is harmless, and the consumer can start over
		consumer.stop();
		consumer.start().unwrap();
		assert_eq!(consumer.status(), ConsumerStatus::NoData);
	}

	#[tokio::test(start_paused = true)]
	async fn test_switch_thread() {
		let (consumer, face, _, observer) = setup(config());
		consumer.init().unwrap();
		consumer.start().unwrap();
		face.take();

		// segments of other threads are ignored
		let mut low = Producer::new(StreamType::Video, "camera", "lo");
		let published = publish(&mut low, 2);
		let edge = delta(&low, &published, 0);

		let rightmost = Interest::rightmost(low.prefix.clone().append("d"), Duration::from_secs(2));
		consumer.inner.controller.on_data(&rightmost, &edge);
		assert_eq!(consumer.status(), ConsumerStatus::NoData);
		assert!(face.take().is_empty());

		consumer.switch_thread("lo").unwrap();
		assert_eq!(consumer.thread(), "lo");
		assert_eq!(*observer.threads.lock(), vec!["lo".to_string()]);
		assert_eq!(*observer.rebufferings.lock(), 1);

		let expressed = face.take();
		assert_eq!(expressed.len(), 1);
		assert_eq!(expressed[0].0.name, low.prefix.clone().append("d"));

		// now they are welcome
		consumer.inner.controller.on_data(&rightmost, &edge);
		assert!(!face.take().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn test_window_follows_drd() {
		let (consumer, face, _, _) = setup(config());
		consumer.init().unwrap();
		consumer.start().unwrap();

		let stats = consumer.statistics();
		assert_eq!(stats.get(Indicator::DW), 8.);
		assert_eq!(stats.get(Indicator::BufferTargetSize), 150.);

		let mut producer = Producer::video();
		let published = publish(&mut producer, 30);
		let edge = delta(&producer, &published, 4);

		// the producer answers every interest itself, 400ms later
		for _ in 0..3 {
			let expressed = face.take();
			tokio::time::advance(Duration::from_millis(400)).await;

			for (interest, handler) in expressed {
				let data = match interest.rightmost {
					true => Some(&edge),
					false => published.get(&interest.name.to_string()),
				};
				if let Some(data) = data {
					handler.data(&interest, &original(&interest, data));
				}
			}
		}

		// 400ms at 30 samples per second
		assert_eq!(consumer.inner.state.lock().control.drd().original_estimate(), 400.);
		assert_eq!(stats.get(Indicator::DW), 12.);
		assert_eq!(stats.get(Indicator::BufferTargetSize), 400.);
		assert!(consumer.inner.state.lock().pipeliner.outstanding() <= 12);

		consumer.trigger_rebuffering().unwrap();
		assert_eq!(stats.get(Indicator::DW), 8.);
		assert_eq!(stats.get(Indicator::BufferTargetSize), 150.);
		assert!(consumer.inner.state.lock().control.drd().original().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn test_idle_time_since_restart() {
		let (consumer, _, _, _) = setup(config());
		consumer.init().unwrap();
		consumer.start().unwrap();

		tokio::time::sleep(Duration::from_millis(1500)).await;
		assert_eq!(consumer.idle_time(), Duration::from_millis(1500));

		consumer.trigger_rebuffering().unwrap();
		assert_eq!(consumer.idle_time(), Duration::ZERO);
	}
}
