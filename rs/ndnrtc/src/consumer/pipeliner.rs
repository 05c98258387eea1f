use std::{
	collections::{HashMap, VecDeque},
	time::Duration,
};

use crate::{
	ConsumerConfig, Indicator, Interest, MAX_SEGMENTS, Name, NamespaceInfo, PARITY_COMPONENT, SampleClass,
	SegmentClass, SlotState, Statistics, StreamType, WireSegment,
};

const ESTIMATOR_WINDOW: usize = 30;

/// Sliding averages of how many segments samples have, per class.
#[derive(Debug, Clone)]
pub struct SampleEstimator {
	initial: HashMap<(SampleClass, SegmentClass), usize>,
	windows: HashMap<(SampleClass, SegmentClass), VecDeque<usize>>,
}

impl SampleEstimator {
	pub fn new(config: &ConsumerConfig) -> Self {
		let mut initial = HashMap::new();
		for class in [SampleClass::Delta, SampleClass::Key] {
			let (data, parity) = config.segment_estimate(class);
			initial.insert((class, SegmentClass::Data), data);
			initial.insert((class, SegmentClass::Parity), parity);
		}

		Self {
			initial,
			windows: HashMap::new(),
		}
	}

	pub fn observe(&mut self, class: SampleClass, segment: SegmentClass, count: usize) {
		let window = self.windows.entry((class, segment)).or_default();
		if window.len() == ESTIMATOR_WINDOW {
			window.pop_front();
		}
		window.push_back(count);
	}

	/// The number of segments to request up front.
	pub fn estimate(&self, class: SampleClass, segment: SegmentClass) -> usize {
		match self.windows.get(&(class, segment)) {
			Some(window) if !window.is_empty() => {
				let sum: usize = window.iter().sum();
				sum.div_ceil(window.len())
			}
			_ => self.initial.get(&(class, segment)).copied().unwrap_or(1),
		}
	}
}

type SampleId = (SampleClass, u64);

// A sample that was requested and is not assembled yet.
#[derive(Debug, Default)]
struct Pending {
	data_count: Option<usize>,
	parity_count: Option<usize>,
	data_requested: usize,
	parity_requested: usize,
	retries: HashMap<(SegmentClass, u64), u32>,
}

/// Decides which interests to express.
///
/// The pipeliner never touches the transport: every method returns the interests the
/// caller has to express. It starts with a rightmost interest to discover the live edge,
/// then keeps a window of samples in flight, requesting the estimated number of segments
/// for each and the rest once the producer reveals the real count.
#[derive(Debug)]
pub struct Pipeliner {
	prefix: Name,
	stream_type: StreamType,
	lifetime: Duration,
	window: usize,
	max_rtx: u32,
	estimator: SampleEstimator,
	stats: Statistics,

	discovered: bool,
	// The delta sample that answered the rightmost interest.
	edge: u64,
	backfilled: bool,
	next_delta: u64,
	last_key: Option<u64>,

	backlog: VecDeque<SampleId>,
	pending: HashMap<SampleId, Pending>,
}

impl Pipeliner {
	pub fn new(prefix: Name, config: &ConsumerConfig, stats: Statistics) -> Self {
		Self {
			prefix,
			stream_type: config.stream_type,
			lifetime: config.interest_lifetime,
			window: config.pipeline_window,
			max_rtx: config.max_rtx,
			estimator: SampleEstimator::new(config),
			stats,
			discovered: false,
			edge: 0,
			backfilled: false,
			next_delta: 0,
			last_key: None,
			backlog: VecDeque::new(),
			pending: HashMap::new(),
		}
	}

	/// Forget everything and return the interest that rediscovers the live edge.
	pub fn start(&mut self) -> Interest {
		self.reset();
		self.rightmost()
	}

	/// The interest for the latest sample of the thread.
	pub fn rightmost(&self) -> Interest {
		let prefix = match self.stream_type {
			StreamType::Video => self.prefix.clone().append(SampleClass::Delta.as_str()),
			StreamType::Audio => self.prefix.clone(),
		};

		Interest::rightmost(prefix, self.lifetime)
	}

	/// Fetch from another thread, the caller restarts discovery afterwards.
	pub fn set_prefix(&mut self, prefix: Name) {
		self.prefix = prefix;
	}

	pub fn prefix(&self) -> &Name {
		&self.prefix
	}

	pub fn is_discovered(&self) -> bool {
		self.discovered
	}

	/// Samples currently in flight.
	pub fn outstanding(&self) -> usize {
		self.pending.len()
	}

	/// Change the samples kept in flight, returning what a larger window requests.
	///
	/// A smaller window only stops new requests until enough samples leave it.
	pub fn set_window(&mut self, window: usize) -> Vec<Interest> {
		let window = window.max(1);
		if window == self.window {
			return Vec::new();
		}

		let grown = window > self.window;
		self.window = window;

		match grown {
			true => self.fill(),
			false => Vec::new(),
		}
	}

	pub fn reset(&mut self) {
		self.discovered = false;
		self.edge = 0;
		self.backfilled = false;
		self.next_delta = 0;
		self.last_key = None;
		self.backlog.clear();
		self.pending.clear();
		self.stats.set(Indicator::W, 0.);
	}

	/// A segment arrived and the buffer put its slot in `state`.
	pub fn on_segment(&mut self, segment: &WireSegment, state: Option<SlotState>) -> Vec<Interest> {
		let info = segment.info();
		let Some(header) = segment.header() else {
			return Vec::new();
		};

		let ready = state.is_some_and(|s| s.is_ready());

		if !self.discovered {
			self.discover(info, header.paired_seq_no, ready);
		}

		if self.stream_type == StreamType::Video {
			if info.is_delta() && self.last_key.is_none_or(|key| header.paired_seq_no > key) {
				// The first delta of a new GOP, fetch its key frame.
				self.last_key = Some(header.paired_seq_no);
				self.backlog.push_front((SampleClass::Key, header.paired_seq_no));
			}

			if info.is_key() && !self.backfilled {
				self.backfill(header.paired_seq_no);
			}
		}

		let mut interests = self.fill();

		let id = (info.class, info.sample_no);
		let sample = self.sample_prefix(id);

		if let Some(pending) = self.pending.get_mut(&id) {
			let count = segment
				.segments_count()
				.filter(|count| !info.is_parity() && *count <= MAX_SEGMENTS);
			if let Some(count) = count {
				if pending.data_count.is_none() {
					pending.data_count = Some(count);
					self.estimator.observe(info.class, SegmentClass::Data, count);
				}
			}

			if pending.parity_count.is_none() {
				let count = (header.parity_segments as usize).min(MAX_SEGMENTS);
				pending.parity_count = Some(count);
				self.estimator.observe(info.class, SegmentClass::Parity, count);
			}

			// The producer published more than estimated.
			if let Some(count) = pending.data_count {
				for seg in pending.data_requested..count {
					interests.push(Interest::new(sample.clone().append_segment(seg as u64), self.lifetime));
				}
				pending.data_requested = pending.data_requested.max(count);
			}
			if let Some(count) = pending.parity_count {
				let parity = sample.append(PARITY_COMPONENT);
				for seg in pending.parity_requested..count {
					interests.push(Interest::new(parity.clone().append_segment(seg as u64), self.lifetime));
				}
				pending.parity_requested = pending.parity_requested.max(count);
			}
		}

		if ready && self.pending.remove(&id).is_some() {
			interests.extend(self.fill());
		}

		interests
	}

	/// Samples left the buffer, so nothing more will arrive for them.
	///
	/// Their window slots are freed whether or not they were assembled.
	pub fn forget(&mut self, samples: &[(SampleClass, u64)]) -> Vec<Interest> {
		let before = self.pending.len();
		for id in samples {
			self.pending.remove(id);
		}

		if self.pending.len() == before {
			return Vec::new();
		}

		tracing::trace!(freed = before - self.pending.len(), "samples left the buffer");
		self.fill()
	}

	fn discover(&mut self, info: &NamespaceInfo, paired: u64, ready: bool) {
		self.discovered = true;
		self.edge = info.sample_no;
		self.next_delta = info.sample_no + 1;

		// The sample the rightmost interest returned is fetched in full like any other.
		if !ready {
			self.backlog.push_back((info.class, info.sample_no));
		}

		tracing::info!(edge = info.sample_no, key = paired, prefix = %self.prefix, "discovered live edge");
	}

	// Request the deltas between the key frame and the live edge.
	fn backfill(&mut self, first_delta: u64) {
		self.backfilled = true;

		for seq in (first_delta..self.edge).rev() {
			let id = (SampleClass::Delta, seq);
			if !self.pending.contains_key(&id) && !self.backlog.contains(&id) {
				self.backlog.push_front(id);
			}
		}
	}

	// Keep the window full.
	fn fill(&mut self) -> Vec<Interest> {
		let mut interests = Vec::new();
		if !self.discovered {
			return interests;
		}

		// Key frames are requested as soon as they are known, regardless of the window.
		while let Some(at) = self.backlog.iter().position(|(class, _)| *class == SampleClass::Key) {
			if let Some(id) = self.backlog.remove(at) {
				if !self.pending.contains_key(&id) {
					interests.extend(self.request(id));
				}
			}
		}

		while self.pending.len() < self.window {
			let id = match self.backlog.pop_front() {
				Some(id) => id,
				None => {
					let id = (SampleClass::Delta, self.next_delta);
					self.next_delta += 1;
					id
				}
			};

			if self.pending.contains_key(&id) {
				continue;
			}

			interests.extend(self.request(id));
		}

		self.stats.set(Indicator::W, self.pending.len() as f64);
		interests
	}

	fn request(&mut self, id: SampleId) -> Vec<Interest> {
		let (class, _) = id;
		let data = self.estimator.estimate(class, SegmentClass::Data);
		let parity = self.estimator.estimate(class, SegmentClass::Parity);

		let sample = self.sample_prefix(id);
		let mut interests = Vec::with_capacity(data + parity);
		for seg in 0..data {
			interests.push(Interest::new(sample.clone().append_segment(seg as u64), self.lifetime));
		}

		let parity_prefix = sample.append(PARITY_COMPONENT);
		for seg in 0..parity {
			interests.push(Interest::new(parity_prefix.clone().append_segment(seg as u64), self.lifetime));
		}

		self.pending.insert(
			id,
			Pending {
				data_requested: data,
				parity_requested: parity,
				..Default::default()
			},
		);

		self.stats
			.increment_class(Indicator::RequestedNum, Indicator::RequestedKeyNum, class == SampleClass::Key);
		tracing::trace!(?id, data, parity, "request sample");

		interests
	}

	fn sample_prefix(&self, (class, seq): SampleId) -> Name {
		match self.stream_type {
			StreamType::Video => self.prefix.clone().append(class.as_str()).append_sequence(seq),
			StreamType::Audio => self.prefix.clone().append_sequence(seq),
		}
	}

	/// An interest timed out or was nacked; re-express it while the sample is wanted.
	pub fn on_timeout(&mut self, info: &NamespaceInfo, interest: &Interest) -> Vec<Interest> {
		let id = (info.class, info.sample_no);
		let Some(pending) = self.pending.get_mut(&id) else {
			return Vec::new();
		};

		let count = match info.segment_class {
			SegmentClass::Data => pending.data_count,
			SegmentClass::Parity => pending.parity_count,
			_ => return Vec::new(),
		};

		// The producer never published this segment.
		if count.is_some_and(|count| info.segment_no >= count as u64) {
			return Vec::new();
		}

		let retries = pending.retries.entry((info.segment_class, info.segment_no)).or_default();
		if *retries < self.max_rtx {
			*retries += 1;
			self.stats.increment(Indicator::RtxNum);
			tracing::debug!(name = %interest.name, retries = *retries, "re-expressing");
			return vec![Interest::new(interest.name.clone(), self.lifetime)];
		}

		tracing::debug!(?id, "giving up on sample");
		self.pending.remove(&id);
		self.fill()
	}
}
