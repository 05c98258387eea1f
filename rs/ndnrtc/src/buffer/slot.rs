use bytes::{Bytes, BytesMut};

use crate::{Frame, MAX_SYMBOLS, NamespaceInfo, Readiness, Rs28Decoder, SegmentClass, SegmentHeader, WireSegment};

/// The most data or parity segments a sample may have.
///
/// A Reed-Solomon block over GF(2^8) holds at most [MAX_SYMBOLS] symbols, so no producer
/// publishes more. Segments numbered past it are dropped.
pub const MAX_SEGMENTS: usize = MAX_SYMBOLS - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotState {
	#[default]
	Empty,
	Assembling,
	/// Every data segment arrived.
	Complete,
	/// Missing data segments were reconstructed from parity.
	Recovered,
	/// The deadline passed before the sample could be assembled.
	Incomplete,
}

impl SlotState {
	/// Whether the sample can be handed to the decoder.
	pub fn is_ready(&self) -> bool {
		matches!(self, Self::Complete | Self::Recovered)
	}
}

/// The reassembly unit for one sample.
///
/// The producer doesn't announce how many data segments a sample has; the count becomes
/// known once a segment carrying the final block id arrives, and completion is checked
/// on every arrival after that.
#[derive(Debug, Default)]
pub struct BufferSlot {
	state: SlotState,
	info: Option<NamespaceInfo>,
	header: Option<SegmentHeader>,

	expected_data: Option<usize>,
	expected_parity: Option<usize>,

	data: Vec<Option<Bytes>>,
	parity: Vec<Option<Bytes>>,
	received_data: usize,
	received_parity: usize,
}

impl BufferSlot {
	/// Record a segment, returning false if it was ignored.
	///
	/// Segments are ignored when they have no header, belong to a different sample,
	/// are duplicates, fall outside the announced segment range or [MAX_SEGMENTS], or
	/// arrive after the slot was finalized.
	pub fn add(&mut self, segment: &WireSegment) -> bool {
		let Some(header) = segment.header() else {
			return false;
		};
		let info = segment.info();

		let Some(index) = usize::try_from(info.segment_no).ok().filter(|i| *i < MAX_SEGMENTS) else {
			tracing::debug!(segment_no = info.segment_no, "segment number out of range");
			return false;
		};
		let bad_count = segment.data().final_block_id.is_some()
			&& segment.segments_count().is_none_or(|count| count > MAX_SEGMENTS);
		if bad_count || header.parity_segments as usize > MAX_SEGMENTS {
			tracing::debug!(name = %segment.data().name, "too many segments announced");
			return false;
		}

		match self.state {
			SlotState::Empty => {
				self.info = Some(info.clone());
				self.header = Some(*header);
				self.expected_parity = Some(header.parity_segments as usize);
				self.state = SlotState::Assembling;
			}
			SlotState::Assembling => {
				if !self.same_sample(info) {
					tracing::warn!(?info, "segment does not belong to the slot");
					return false;
				}
			}
			_ => return false,
		}

		let added = match info.segment_class {
			SegmentClass::Data => {
				if let Some(count) = segment.segments_count() {
					self.fix_expected_data(count);
				}
				if self.expected_data.is_some_and(|expected| index >= expected) {
					return false;
				}
				store(&mut self.data, index, segment.payload())
			}
			SegmentClass::Parity => {
				if self.expected_parity.is_some_and(|expected| index >= expected) {
					return false;
				}
				store(&mut self.parity, index, segment.payload())
			}
			SegmentClass::Manifest | SegmentClass::Meta => false,
		};

		if !added {
			return false;
		}

		match info.segment_class {
			SegmentClass::Parity => self.received_parity += 1,
			_ => self.received_data += 1,
		}

		self.check_completion();
		true
	}

	fn same_sample(&self, info: &NamespaceInfo) -> bool {
		self.info.as_ref().is_some_and(|own| {
			own.class == info.class && own.sample_no == info.sample_no && own.thread_name == info.thread_name
		})
	}

	fn fix_expected_data(&mut self, count: usize) {
		if self.expected_data.is_some() {
			return;
		}

		self.expected_data = Some(count);

		// Anything stored past the end was bogus.
		if self.data.len() > count {
			self.data.truncate(count);
			self.received_data = self.data.iter().filter(|s| s.is_some()).count();
		}
	}

	fn check_completion(&mut self) {
		let Some(expected) = self.expected_data else {
			return;
		};

		if self.received_data >= expected {
			self.state = SlotState::Complete;
		} else if self.received_parity > 0 && self.received_data + self.received_parity >= expected {
			self.recover(expected);
		}
	}

	// Reconstruct the missing data segments. The slot stays Assembling on failure,
	// the next arriving segment triggers another attempt.
	fn recover(&mut self, source: usize) {
		let repair = self.expected_parity.unwrap_or_default();
		if repair == 0 {
			return;
		}

		// Every parity symbol has the length of a full segment.
		let Some(symbol_len) = self.parity.iter().flatten().map(Bytes::len).next() else {
			return;
		};
		if symbol_len == 0 {
			tracing::warn!(playback_no = self.playback_no(), "empty parity segment");
			return;
		}

		let oversized = self.data.iter().flatten().any(|s| s.len() > symbol_len);
		if oversized || self.parity.iter().flatten().any(|s| s.len() != symbol_len) {
			tracing::warn!(playback_no = self.playback_no(), "segment sizes don't match parity");
			return;
		}

		self.data.resize(source, None);
		self.parity.resize(repair, None);

		let mut data = vec![0u8; source * symbol_len];
		let mut parity = vec![0u8; repair * symbol_len];
		let mut readiness = Vec::with_capacity(source + repair);

		for (i, segment) in self.data.iter().enumerate() {
			match segment {
				Some(segment) => {
					data[i * symbol_len..i * symbol_len + segment.len()].copy_from_slice(segment);
					readiness.push(Readiness::Ready);
				}
				None => readiness.push(Readiness::Repair),
			}
		}

		for (i, segment) in self.parity.iter().enumerate() {
			match segment {
				Some(segment) => {
					parity[i * symbol_len..(i + 1) * symbol_len].copy_from_slice(segment);
					readiness.push(Readiness::Ready);
				}
				None => readiness.push(Readiness::Empty),
			}
		}

		let decoded = Rs28Decoder::new(source, repair, symbol_len)
			.and_then(|decoder| decoder.decode(&mut data, &parity, &readiness));
		match decoded {
			Ok(repaired) => {
				let data = Bytes::from(data);
				for (i, segment) in self.data.iter_mut().enumerate() {
					if segment.is_none() {
						*segment = Some(data.slice(i * symbol_len..(i + 1) * symbol_len));
					}
				}

				tracing::debug!(playback_no = self.playback_no(), repaired, "recovered sample");
				self.state = SlotState::Recovered;
			}
			Err(err) => {
				tracing::debug!(playback_no = self.playback_no(), ?err, "fec recovery failed");
			}
		}
	}

	/// Give up on assembling: the deadline has passed.
	pub fn finalize(&mut self) -> SlotState {
		if self.state == SlotState::Assembling {
			self.state = SlotState::Incomplete;
		}
		self.state
	}

	/// The reassembled sample, if it is ready and decodes.
	pub fn frame(&self) -> Option<Frame> {
		if !self.state.is_ready() {
			return None;
		}

		let (info, header) = (self.info.as_ref()?, self.header.as_ref()?);

		let mut packet = BytesMut::new();
		for segment in self.data.iter() {
			packet.extend_from_slice(segment.as_ref()?);
		}

		let payload = match Frame::unpack(packet.freeze()) {
			Ok(payload) => payload,
			Err(err) => {
				tracing::warn!(playback_no = header.playback_no, ?err, "corrupt sample");
				return None;
			}
		};

		Some(Frame {
			playback_no: header.playback_no,
			seq_no: info.sample_no,
			timestamp: header.publish_timestamp_ms,
			keyframe: info.is_key(),
			payload,
		})
	}

	pub fn state(&self) -> SlotState {
		self.state
	}

	pub fn info(&self) -> Option<&NamespaceInfo> {
		self.info.as_ref()
	}

	pub fn header(&self) -> Option<&SegmentHeader> {
		self.header.as_ref()
	}

	pub fn playback_no(&self) -> u64 {
		self.header.map(|h| h.playback_no).unwrap_or_default()
	}

	pub fn seq_no(&self) -> u64 {
		self.info.as_ref().map(|i| i.sample_no).unwrap_or_default()
	}

	pub fn is_key(&self) -> bool {
		self.info.as_ref().is_some_and(NamespaceInfo::is_key)
	}

	pub fn expected_data(&self) -> Option<usize> {
		self.expected_data
	}

	pub fn expected_parity(&self) -> Option<usize> {
		self.expected_parity
	}

	pub fn received_data(&self) -> usize {
		self.received_data
	}

	pub fn received_parity(&self) -> usize {
		self.received_parity
	}

	/// Whether the given segment was already stored.
	pub fn has_segment(&self, class: SegmentClass, index: usize) -> bool {
		let store = match class {
			SegmentClass::Data => &self.data,
			SegmentClass::Parity => &self.parity,
			_ => return false,
		};
		store.get(index).is_some_and(Option::is_some)
	}

	/// Reset to [SlotState::Empty], keeping allocations.
	pub fn clear(&mut self) {
		self.state = SlotState::Empty;
		self.info = None;
		self.header = None;
		self.expected_data = None;
		self.expected_parity = None;
		self.data.clear();
		self.parity.clear();
		self.received_data = 0;
		self.received_parity = 0;
	}
}

fn store(segments: &mut Vec<Option<Bytes>>, index: usize, payload: &Bytes) -> bool {
	let Some(len) = index.checked_add(1) else {
		return false;
	};
	if segments.len() < len {
		segments.resize(len, None);
	}

	match segments[index] {
		Some(_) => false,
		None => {
			segments[index] = Some(payload.clone());
			true
		}
	}
}
