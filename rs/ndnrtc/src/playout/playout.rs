use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;

use crate::{Buffer, BufferSlot, Error, JitterTiming, MonotonicClock, Periodic, Result, SharedClock};

/// Why a sample was not played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackEvent {
	/// A delta frame did not assemble in time.
	DeltaSkipIncomplete,
	/// A delta frame belongs to a GOP that lost a frame.
	DeltaSkipInvalidGop,
	/// A delta frame arrived before any usable key frame.
	DeltaSkipNoKey,
	/// A key frame did not assemble in time.
	KeySkipIncomplete,
}

#[derive(Debug, Clone)]
pub enum PlayoutEvent {
	FrameProcessed {
		playback_no: u64,
		seq_no: u64,
		key: bool,
	},
	FrameSkipped {
		playback_no: u64,
		seq_no: u64,
		key: bool,
		reason: PlaybackEvent,
	},
	/// The sample was marked ready but its content did not decode.
	RecoveryFailure {
		seq_no: u64,
		key: bool,
	},
	QueueEmpty,
	/// The sink failed; the consumer has to escalate.
	Failure(Error),
}

/// Media specific handling of released samples.
pub trait SampleProcessor: Send {
	fn process_sample(&mut self, slot: &BufferSlot) -> Vec<PlayoutEvent>;

	/// Forget per-stream state, called when playout stops.
	fn flush(&mut self) {}
}

pub trait PlayoutObserver: Send + Sync {
	fn on_queue_empty(&self) {}
	fn frame_processed(&self, _playback_no: u64, _key: bool) {}
	fn frame_skipped(&self, _playback_no: u64, _seq_no: u64, _key: bool, _reason: PlaybackEvent) {}
	fn recovery_failure(&self, _seq_no: u64, _key: bool) {}
	fn playout_failure(&self, _err: &Error) {}
}

/// Releases samples from the buffer on the producer's cadence.
///
/// Each cycle pops the next sample, hands it to the [SampleProcessor], and waits for the
/// producer's inter-frame interval minus the time the cycle itself took. Frames that were
/// released late are made up for by shortening the following waits.
#[derive(Clone)]
pub struct Playout {
	inner: Arc<Inner>,
}

struct Inner {
	buffer: Arc<Mutex<Buffer>>,
	processor: Mutex<Box<dyn SampleProcessor>>,
	observers: Mutex<Vec<Arc<dyn PlayoutObserver>>>,
	clock: SharedClock,

	// How long to wait when the buffer has nothing to release.
	poll: Duration,

	state: Mutex<State>,
}

#[derive(Default)]
struct State {
	running: bool,
	task: Option<Periodic>,
	timing: JitterTiming,

	// Producer timestamp of the last released sample.
	last_timestamp: Option<u64>,
	// Nominal delays scheduled since then.
	waited: i64,
	// Milliseconds to add to upcoming delays, negative to catch up.
	adjustment: i64,
}

impl State {
	fn correct_adjustment(&mut self, timestamp: u64) {
		if let Some(last) = self.last_timestamp {
			let declared = timestamp as i64 - last as i64;
			self.adjustment += declared - self.waited;
		}

		self.last_timestamp = Some(timestamp);
		self.waited = 0;
	}

	fn adjust_delay(&mut self, delay: i64) -> i64 {
		if self.adjustment < 0 && -self.adjustment > delay {
			self.adjustment += delay;
			0
		} else {
			let adjusted = delay + self.adjustment;
			self.adjustment = 0;
			adjusted
		}
	}
}

impl Playout {
	pub fn new(buffer: Arc<Mutex<Buffer>>, processor: Box<dyn SampleProcessor>, poll: Duration) -> Self {
		Self::with_clock(buffer, processor, poll, MonotonicClock::shared())
	}

	pub fn with_clock(
		buffer: Arc<Mutex<Buffer>>,
		processor: Box<dyn SampleProcessor>,
		poll: Duration,
		clock: SharedClock,
	) -> Self {
		Self {
			inner: Arc::new(Inner {
				buffer,
				processor: Mutex::new(processor),
				observers: Default::default(),
				clock,
				poll,
				state: Default::default(),
			}),
		}
	}

	/// Start releasing samples, requires a tokio runtime.
	///
	/// `fast_forward` is taken off the first delays, skipping over an initial gap.
	pub fn start(&self, fast_forward: Duration) -> Result<()> {
		let mut state = self.inner.state.lock();
		if state.running {
			return Err(Error::AlreadyRunning);
		}

		state.timing.flush();
		state.last_timestamp = None;
		state.waited = 0;
		state.adjustment = -(fast_forward.as_millis() as i64);
		state.running = true;

		let weak = Arc::downgrade(&self.inner);
		state.task = Some(Periodic::start(Duration::ZERO, move || {
			weak.upgrade().and_then(|inner| inner.extract_sample())
		}));

		tracing::info!(fast_forward = ?fast_forward, "playout started");
		Ok(())
	}

	/// Cancel the pending cycle and forget all timing state.
	pub fn stop(&self) {
		{
			let mut state = self.inner.state.lock();
			if !state.running {
				return;
			}

			state.running = false;
			state.task = None;
			state.timing.flush();
			state.last_timestamp = None;
			state.waited = 0;
			state.adjustment = 0;
		}

		self.inner.processor.lock().flush();
		tracing::info!("playout stopped");
	}

	pub fn is_running(&self) -> bool {
		self.inner.state.lock().running
	}

	pub fn attach(&self, observer: Arc<dyn PlayoutObserver>) {
		self.inner.observers.lock().push(observer);
	}

	pub fn detach(&self, observer: &Arc<dyn PlayoutObserver>) {
		self.inner.observers.lock().retain(|o| !Arc::ptr_eq(o, observer));
	}
}

impl Inner {
	// One playout cycle, returning the delay until the next.
	fn extract_sample(&self) -> Option<Duration> {
		{
			let mut state = self.state.lock();
			if !state.running {
				return None;
			}
			state.timing.start_frame_playout(self.clock.micros());
		}

		let (slot, next_timestamp, period) = {
			let mut buffer = self.buffer.lock();
			let slot = buffer.pop_next();
			(slot, buffer.next_timestamp(), buffer.sample_period())
		};

		let mut events = Vec::new();
		let released = slot.map(|slot| {
			events.extend(self.processor.lock().process_sample(&slot));
			let timestamp = slot.header().map(|h| h.publish_timestamp_ms).unwrap_or_default();
			self.buffer.lock().release(slot);
			timestamp
		});

		let delay = {
			let mut state = self.state.lock();
			if !state.running {
				return None;
			}

			let nominal = match released {
				Some(timestamp) => {
					state.correct_adjustment(timestamp);
					match next_timestamp {
						Some(next) if next > timestamp => (next - timestamp) as i64,
						_ => period.round() as i64,
					}
				}
				None => {
					events.push(PlayoutEvent::QueueEmpty);
					self.poll.as_millis() as i64
				}
			};

			state.waited += nominal;
			let adjusted = state.adjust_delay(nominal);
			let delay = state.timing.update_playout_time(adjusted);

			tracing::trace!(?released, nominal, adjusted, ?delay, "playout cycle");
			delay
		};

		self.notify(&events);
		Some(delay)
	}

	fn notify(&self, events: &[PlayoutEvent]) {
		if events.is_empty() {
			return;
		}

		let observers = self.observers.lock().clone();
		for event in events {
			for observer in observers.iter() {
				match event {
					PlayoutEvent::FrameProcessed { playback_no, key, .. } => {
						observer.frame_processed(*playback_no, *key)
					}
					PlayoutEvent::FrameSkipped {
						playback_no,
						seq_no,
						key,
						reason,
					} => observer.frame_skipped(*playback_no, *seq_no, *key, *reason),
					PlayoutEvent::RecoveryFailure { seq_no, key } => observer.recovery_failure(*seq_no, *key),
					PlayoutEvent::QueueEmpty => observer.on_queue_empty(),
					PlayoutEvent::Failure(err) => observer.playout_failure(err),
				}
			}
		}
	}
}
