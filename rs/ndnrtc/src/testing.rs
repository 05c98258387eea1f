//! Helpers shared by unit tests: a producer that publishes samples the way a live
//! stream does, and a transport that records what was expressed.

use std::time::Duration;

use parking_lot::Mutex;

use crate::{
	Data, Face, Frame, Interest, Name, ResponseHandler, Rs28Encoder, SampleClass, SegmentHeader, StreamType,
	WireSegment, extract_info, thread_prefix,
};

pub const LIFETIME: Duration = Duration::from_secs(2);

/// The data and parity segments of one sample, with the interests that fetch them.
pub struct Sample {
	pub playback_no: u64,
	pub seq_no: u64,
	pub key: bool,
	pub payload: Vec<u8>,
	pub data: Vec<(Interest, Data)>,
	pub parity: Vec<(Interest, Data)>,
}

impl Sample {
	pub fn segments(&self) -> impl Iterator<Item = WireSegment> + '_ {
		self.data.iter().chain(self.parity.iter()).map(wire)
	}

	pub fn data_segment(&self, index: usize) -> WireSegment {
		wire(&self.data[index])
	}

	pub fn parity_segment(&self, index: usize) -> WireSegment {
		wire(&self.parity[index])
	}
}

pub fn wire((interest, data): &(Interest, Data)) -> WireSegment {
	let info = extract_info(&data.name).expect("producer names parse");
	WireSegment::new(info, interest.clone(), data.clone())
}

pub struct Producer {
	pub prefix: Name,
	pub stream_type: StreamType,
	pub segment_size: usize,
	pub parity_ratio: f64,
	pub rate: f64,
	pub gop: u64,

	pub playback_no: u64,
	pub delta_seq: u64,
	pub key_seq: u64,
}

impl Producer {
	pub fn video() -> Self {
		Self::new(StreamType::Video, "camera", "hi")
	}

	pub fn audio() -> Self {
		Self::new(StreamType::Audio, "mic", "hd")
	}

	pub fn new(stream_type: StreamType, stream: &str, thread: &str) -> Self {
		let base: Name = "/ndn/edu/ucla/remap/peter".parse().unwrap();
		Self {
			prefix: thread_prefix(&base, stream_type, stream, thread),
			stream_type,
			segment_size: 100,
			parity_ratio: 0.5,
			rate: 30.,
			gop: 30,
			playback_no: 0,
			delta_seq: 0,
			key_seq: 0,
		}
	}

	/// Publish the next sample, a key frame every `gop` samples.
	pub fn next(&mut self, size: usize) -> Sample {
		let key = self.stream_type == StreamType::Video && self.playback_no % self.gop == 0;
		let payload: Vec<u8> = (0..size).map(|i| (i as u64 * 31 + self.playback_no) as u8).collect();
		self.publish(key, payload)
	}

	pub fn publish(&mut self, key: bool, payload: Vec<u8>) -> Sample {
		let (class, seq_no, paired) = match key {
			true => (SampleClass::Key, self.key_seq, self.delta_seq),
			false => (SampleClass::Delta, self.delta_seq, self.key_seq.saturating_sub(1)),
		};

		let mut sample_prefix = self.prefix.clone();
		if self.stream_type == StreamType::Video {
			sample_prefix = sample_prefix.append(class.as_str());
		}
		sample_prefix = sample_prefix.append_sequence(seq_no);

		let packet = Frame::pack(&payload);
		let chunks: Vec<&[u8]> = packet.chunks(self.segment_size).collect();
		let parity_count = (chunks.len() as f64 * self.parity_ratio).ceil() as usize;

		let header = SegmentHeader {
			interest_nonce: 0,
			interest_arrival_ms: 0,
			generation_delay_ms: 0,
			playback_no: self.playback_no,
			paired_seq_no: paired,
			sample_rate: self.rate,
			publish_timestamp_ms: (self.playback_no as f64 * 1000. / self.rate) as u64,
			parity_segments: parity_count as u16,
		};

		let data = chunks
			.iter()
			.enumerate()
			.map(|(seg, chunk)| {
				let name = sample_prefix.clone().append_segment(seg as u64);
				let data = Data::new(name.clone(), header.wrap(chunk)).with_final_block_id(chunks.len() as u64 - 1);
				(Interest::new(name, LIFETIME), data)
			})
			.collect();

		let mut parity = Vec::new();
		if parity_count > 0 {
			let mut block = vec![0u8; chunks.len() * self.segment_size];
			for (i, chunk) in chunks.iter().enumerate() {
				block[i * self.segment_size..i * self.segment_size + chunk.len()].copy_from_slice(chunk);
			}

			let mut repair = vec![0u8; parity_count * self.segment_size];
			Rs28Encoder::new(chunks.len(), parity_count, self.segment_size)
				.unwrap()
				.encode(&block, &mut repair)
				.unwrap();

			for (seg, symbol) in repair.chunks(self.segment_size).enumerate() {
				let name = sample_prefix.clone().append("_parity").append_segment(seg as u64);
				let data = Data::new(name.clone(), header.wrap(symbol)).with_final_block_id(parity_count as u64 - 1);
				parity.push((Interest::new(name, LIFETIME), data));
			}
		}

		let sample = Sample {
			playback_no: self.playback_no,
			seq_no,
			key,
			payload,
			data,
			parity,
		};

		self.playback_no += 1;
		match key {
			true => self.key_seq += 1,
			false => self.delta_seq += 1,
		}

		sample
	}
}

/// A transport that only records interests.
#[derive(Default)]
pub struct RecordingFace {
	pub expressed: Mutex<Vec<(Interest, ResponseHandler)>>,
}

impl RecordingFace {
	pub fn take(&self) -> Vec<(Interest, ResponseHandler)> {
		std::mem::take(&mut *self.expressed.lock())
	}

	pub fn names(&self) -> Vec<String> {
		self.expressed.lock().iter().map(|(i, _)| i.name.to_string()).collect()
	}
}

impl Face for RecordingFace {
	fn express_interest(&self, interest: Interest, handler: ResponseHandler) {
		self.expressed.lock().push((interest, handler));
	}
}
