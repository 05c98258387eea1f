use std::collections::BTreeMap;

use crate::{BufferSlot, Indicator, SampleClass, SlotPool, SlotState, Statistics, WireSegment};

/// The set of in-flight samples, keyed by playback number.
///
/// Slots are created when the first segment of a sample arrives, and leave the buffer
/// either through [Buffer::pop_next] in ascending order or through eviction once the
/// capacity is exceeded. A sample that left is never recreated by late segments.
#[derive(Debug)]
pub struct Buffer {
	slots: BTreeMap<u64, BufferSlot>,
	capacity: usize,
	pool: SlotPool,

	// The highest playback number that left the buffer.
	last_released: Option<u64>,
	// Samples that left since the last take_departed.
	departed: Vec<(SampleClass, u64)>,

	// Latest producer rate, used to turn slot counts into durations.
	rate: f64,
	stats: Statistics,
}

impl Buffer {
	pub fn new(capacity: usize, default_rate: f64, stats: Statistics) -> Self {
		Self {
			slots: BTreeMap::new(),
			capacity: capacity.max(1),
			pool: SlotPool::new(capacity),
			last_released: None,
			departed: Vec::new(),
			rate: default_rate,
			stats,
		}
	}

	/// Route a segment to its slot, returning the slot's state afterwards.
	///
	/// Returns `None` when the segment was dropped.
	pub fn received(&mut self, segment: &WireSegment) -> Option<SlotState> {
		let header = segment.header()?;
		let playback_no = header.playback_no;

		if self.last_released.is_some_and(|last| playback_no <= last) {
			tracing::trace!(playback_no, "late segment");
			self.stats.increment(Indicator::LateNum);
			return None;
		}

		if header.sample_rate > 0. {
			self.rate = header.sample_rate;
			self.stats.set(Indicator::CurrentProducerFramerate, header.sample_rate);
		}

		let (before, after, is_key) = match self.slots.get_mut(&playback_no) {
			Some(slot) => {
				let before = slot.state();
				if !slot.add(segment) {
					return None;
				}
				(before, slot.state(), slot.is_key())
			}
			None => {
				let mut slot = self.pool.take();
				if !slot.add(segment) {
					self.pool.put(slot);
					return None;
				}

				let state = slot.state();
				let is_key = slot.is_key();
				self.slots.insert(playback_no, slot);
				(SlotState::Empty, state, is_key)
			}
		};

		if before != after {
			match after {
				SlotState::Complete => {
					self.stats
						.increment_class(Indicator::AssembledNum, Indicator::AssembledKeyNum, is_key);
				}
				SlotState::Recovered => {
					self.stats
						.increment_class(Indicator::AssembledNum, Indicator::AssembledKeyNum, is_key);
					self.stats
						.increment_class(Indicator::RecoveredNum, Indicator::RecoveredKeyNum, is_key);
				}
				_ => {}
			}
		}

		self.evict();
		self.update_sizes();

		self.slots.get(&playback_no).map(BufferSlot::state)
	}

	fn evict(&mut self) {
		while self.slots.len() > self.capacity {
			let Some((playback_no, slot)) = self.slots.pop_first() else {
				return;
			};

			tracing::debug!(playback_no, state = ?slot.state(), "evicted slot");
			self.stats
				.increment_class(Indicator::DroppedNum, Indicator::DroppedKeyNum, slot.is_key());
			self.mark_released(playback_no, &slot);
			self.pool.put(slot);
		}
	}

	/// Take the next sample in playback order.
	///
	/// The oldest slot is returned once it's ready. If it is still assembling while a newer
	/// sample is already ready, its deadline has passed: it is finalized
	/// [SlotState::Incomplete] and returned so playout can skip it.
	pub fn pop_next(&mut self) -> Option<BufferSlot> {
		let (_, head) = self.slots.first_key_value()?;
		if !head.state().is_ready() && !self.slots.values().any(|s| s.state().is_ready()) {
			return None;
		}

		let (playback_no, mut slot) = self.slots.pop_first()?;
		if slot.finalize() == SlotState::Incomplete {
			tracing::debug!(playback_no, "sample incomplete at its deadline");
			self.stats
				.increment_class(Indicator::IncompleteNum, Indicator::IncompleteKeyNum, slot.is_key());
		}

		self.mark_released(playback_no, &slot);
		self.update_sizes();

		Some(slot)
	}

	/// Hand a consumed slot back for reuse.
	pub fn release(&mut self, slot: BufferSlot) {
		self.pool.put(slot);
	}

	fn mark_released(&mut self, playback_no: u64, slot: &BufferSlot) {
		self.last_released = Some(self.last_released.map_or(playback_no, |last| last.max(playback_no)));
		if let Some(info) = slot.info() {
			self.departed.push((info.class, info.sample_no));
		}
	}

	/// The samples that left the buffer, played or not, since the last call.
	///
	/// Segments still arriving for them are dropped as late.
	pub fn take_departed(&mut self) -> Vec<(SampleClass, u64)> {
		std::mem::take(&mut self.departed)
	}

	/// Milliseconds of media in ready slots.
	pub fn playable_duration(&self) -> f64 {
		let mut ready = self
			.slots
			.values()
			.filter(|s| s.state().is_ready())
			.filter_map(|s| s.header());

		let Some(first) = ready.next() else {
			return 0.;
		};

		let last = ready.last().unwrap_or(first);
		let span = last.publish_timestamp_ms.saturating_sub(first.publish_timestamp_ms) as f64;
		span + self.sample_period()
	}

	/// Milliseconds of media still being assembled.
	pub fn pending_duration(&self) -> f64 {
		let pending = self.slots.values().filter(|s| s.state() == SlotState::Assembling).count();
		pending as f64 * self.sample_period()
	}

	/// The producer's frame interval in milliseconds.
	pub fn sample_period(&self) -> f64 {
		match self.rate > 0. {
			true => 1000. / self.rate,
			false => 0.,
		}
	}

	/// Producer timestamp of the oldest slot.
	pub fn next_timestamp(&self) -> Option<u64> {
		let (_, slot) = self.slots.first_key_value()?;
		slot.header().map(|h| h.publish_timestamp_ms)
	}

	pub fn has_ready(&self) -> bool {
		self.slots.values().any(|s| s.state().is_ready())
	}

	pub fn slot(&self, playback_no: u64) -> Option<&BufferSlot> {
		self.slots.get(&playback_no)
	}

	pub fn last_released(&self) -> Option<u64> {
		self.last_released
	}

	pub fn len(&self) -> usize {
		self.slots.len()
	}

	pub fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}

	/// Drop every slot and forget what was played.
	pub fn reset(&mut self) {
		let slots = std::mem::take(&mut self.slots);
		for slot in slots.into_values() {
			self.pool.put(slot);
		}

		self.last_released = None;
		self.departed.clear();
		self.update_sizes();

		tracing::debug!("buffer reset");
	}

	fn update_sizes(&self) {
		self.stats.set(Indicator::BufferPlayableSize, self.playable_duration());
		self.stats.set(Indicator::BufferReservedSize, self.pending_duration());
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::Producer;

	fn buffer(capacity: usize) -> (Buffer, Statistics) {
		let stats = Statistics::new();
		(Buffer::new(capacity, 30., stats.clone()), stats)
	}

	#[test]
	fn test_assemble_in_order() {
		let (mut buffer, stats) = buffer(10);
		let mut producer = Producer::video();

		for _ in 0..3 {
			let sample = producer.next(250);
			for segment in sample.data.iter().map(crate::testing::wire) {
				buffer.received(&segment);
			}
		}

		assert_eq!(buffer.len(), 3);
		assert_eq!(stats.get(Indicator::AssembledNum), 3.);
		assert_eq!(stats.get(Indicator::AssembledKeyNum), 1.);
		assert!(buffer.has_ready());

		// three frames at 30fps
		assert_eq!(buffer.playable_duration(), 66. + 1000. / 30.);

		for playback_no in 0..3 {
			let slot = buffer.pop_next().unwrap();
			assert_eq!(slot.playback_no(), playback_no);
			assert_eq!(slot.state(), SlotState::Complete);
			buffer.release(slot);
		}

		assert!(buffer.pop_next().is_none());
		assert_eq!(stats.get(Indicator::BufferPlayableSize), 0.);
	}

	#[test]
	fn test_recovered_counted() {
		let (mut buffer, stats) = buffer(10);
		let mut producer = Producer::video();
		let sample = producer.next(350);

		buffer.received(&sample.data_segment(0));
		buffer.received(&sample.data_segment(1));
		buffer.received(&sample.data_segment(2));
		assert_eq!(buffer.received(&sample.parity_segment(1)), Some(SlotState::Recovered));

		assert_eq!(stats.get(Indicator::RecoveredNum), 1.);
		assert_eq!(stats.get(Indicator::RecoveredKeyNum), 1.);
	}

	#[test]
	fn test_head_waits_until_overtaken() {
		let (mut buffer, stats) = buffer(10);
		let mut producer = Producer::video();
		let first = producer.next(250);
		let second = producer.next(50);

		buffer.received(&first.data_segment(0));
		assert!(buffer.pop_next().is_none());
		assert_eq!(buffer.len(), 1);

		buffer.received(&second.data_segment(0));

		let slot = buffer.pop_next().unwrap();
		assert_eq!(slot.playback_no(), 0);
		assert_eq!(slot.state(), SlotState::Incomplete);
		assert_eq!(stats.get(Indicator::IncompleteNum), 1.);
		assert_eq!(stats.get(Indicator::IncompleteKeyNum), 1.);

		let slot = buffer.pop_next().unwrap();
		assert_eq!(slot.playback_no(), 1);
		assert_eq!(slot.state(), SlotState::Complete);
	}

	#[test]
	fn test_late_segments_dropped() {
		let (mut buffer, stats) = buffer(10);
		let mut producer = Producer::video();
		let sample = producer.next(250);

		buffer.received(&sample.data_segment(0));
		buffer.received(&sample.data_segment(1));
		buffer.received(&sample.data_segment(2));
		let slot = buffer.pop_next().unwrap();
		buffer.release(slot);

		// a retransmitted segment must not recreate the slot
		assert_eq!(buffer.received(&sample.data_segment(1)), None);
		assert!(buffer.is_empty());
		assert_eq!(stats.get(Indicator::LateNum), 1.);
	}

	#[test]
	fn test_eviction_oldest_first() {
		let (mut buffer, stats) = buffer(2);
		let mut producer = Producer::video();
		let samples: Vec<_> = (0..3).map(|_| producer.next(250)).collect();

		for sample in samples.iter() {
			buffer.received(&sample.data_segment(0));
		}

		assert_eq!(buffer.len(), 2);
		assert!(buffer.slot(0).is_none());
		assert!(buffer.slot(1).is_some());
		assert_eq!(stats.get(Indicator::DroppedNum), 1.);
		assert_eq!(stats.get(Indicator::DroppedKeyNum), 1.);

		// the evicted sample is gone for good
		assert_eq!(buffer.received(&samples[0].data_segment(1)), None);
	}

	#[test]
	fn test_departed() {
		let (mut buffer, _) = buffer(2);
		let mut producer = Producer::video();
		let samples: Vec<_> = (0..4).map(|_| producer.next(250)).collect();

		buffer.received(&samples[0].data_segment(0));
		buffer.received(&samples[1].data_segment(0));
		buffer.received(&samples[2].data_segment(0));
		assert_eq!(buffer.take_departed(), vec![(SampleClass::Key, 0)]);
		assert!(buffer.take_departed().is_empty());

		for segment in samples[3].segments() {
			buffer.received(&segment);
		}
		assert_eq!(buffer.take_departed(), vec![(SampleClass::Delta, 0)]);

		// overtaken by the ready sample
		assert_eq!(buffer.pop_next().unwrap().state(), SlotState::Incomplete);
		assert_eq!(buffer.pop_next().unwrap().state(), SlotState::Complete);
		assert_eq!(
			buffer.take_departed(),
			vec![(SampleClass::Delta, 1), (SampleClass::Delta, 2)]
		);
	}

	#[test]
	fn test_out_of_range_segment() {
		let (mut buffer, _) = buffer(10);
		let mut producer = Producer::video();
		let sample = producer.next(250);

		let (interest, data) = &sample.data[0];
		let name = data.name.prefix(data.name.len() - 1).append_segment(u64::MAX);
		let data = crate::Data::new(name, data.content.clone());

		assert_eq!(buffer.received(&crate::testing::wire(&(interest.clone(), data))), None);
		assert!(buffer.is_empty());
	}

	#[test]
	fn test_reset() {
		let (mut buffer, _) = buffer(10);
		let mut producer = Producer::video();
		let sample = producer.next(50);

		buffer.received(&sample.data_segment(0));
		buffer.pop_next().unwrap();
		buffer.received(&producer.next(50).data_segment(0));

		buffer.reset();
		assert!(buffer.is_empty());
		assert_eq!(buffer.last_released(), None);

		// after a reset old samples are welcome again
		assert_eq!(buffer.received(&sample.data_segment(0)), Some(SlotState::Complete));
	}
}
