use bytes::Bytes;

use crate::{
	Data, Interest, NamespaceInfo,
	coding::{Decode, DecodeError, Encode},
};

const HEADER_MARKER: u16 = 0x5a5a;
const BODY_MARKER: u16 = 0xa5a5;

/// The header every data and parity segment starts with.
///
/// The first three fields describe how the producer answered the interest,
/// the rest describe the sample the segment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SegmentHeader {
	/// Nonce of the interest the producer answered.
	pub interest_nonce: u32,
	/// When that interest arrived at the producer.
	pub interest_arrival_ms: u64,
	/// How long the interest waited for the sample to be produced.
	pub generation_delay_ms: u32,

	/// Position of the sample in the combined key and delta sequence.
	pub playback_no: u64,
	/// For a delta frame, the key frame of its GOP. For a key frame, the delta that follows it.
	pub paired_seq_no: u64,
	/// The producer's sample rate at the time of publishing.
	pub sample_rate: f64,
	/// Producer timestamp of the sample in milliseconds.
	pub publish_timestamp_ms: u64,
	/// Number of parity segments published for the sample.
	pub parity_segments: u16,
}

impl Encode for SegmentHeader {
	fn encode<W: bytes::BufMut>(&self, w: &mut W) {
		HEADER_MARKER.encode(w);
		self.interest_nonce.encode(w);
		self.interest_arrival_ms.encode(w);
		self.generation_delay_ms.encode(w);
		self.playback_no.encode(w);
		self.paired_seq_no.encode(w);
		self.sample_rate.encode(w);
		self.publish_timestamp_ms.encode(w);
		self.parity_segments.encode(w);
		BODY_MARKER.encode(w);
	}
}

impl Decode for SegmentHeader {
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError> {
		let marker = u16::decode(buf)?;
		if marker != HEADER_MARKER {
			return Err(DecodeError::InvalidMarker(marker));
		}

		let header = Self {
			interest_nonce: u32::decode(buf)?,
			interest_arrival_ms: u64::decode(buf)?,
			generation_delay_ms: u32::decode(buf)?,
			playback_no: u64::decode(buf)?,
			paired_seq_no: u64::decode(buf)?,
			sample_rate: f64::decode(buf)?,
			publish_timestamp_ms: u64::decode(buf)?,
			parity_segments: u16::decode(buf)?,
		};

		let marker = u16::decode(buf)?;
		if marker != BODY_MARKER {
			return Err(DecodeError::InvalidMarker(marker));
		}

		if !header.sample_rate.is_finite() || header.sample_rate < 0. {
			return Err(DecodeError::InvalidValue);
		}

		Ok(header)
	}
}

impl SegmentHeader {
	/// Prefix `payload` with this header.
	pub fn wrap(&self, payload: &[u8]) -> Bytes {
		let mut buf = bytes::BytesMut::new();
		self.encode(&mut buf);
		buf.extend_from_slice(payload);
		buf.freeze()
	}
}

/// One segment received from the network.
///
/// Meta segments have no [SegmentHeader], their payload is the whole content.
#[derive(Debug, Clone)]
pub struct WireSegment {
	info: NamespaceInfo,
	interest: Interest,
	data: Data,
	header: Option<SegmentHeader>,
	payload: Bytes,
	valid: bool,
}

impl WireSegment {
	pub fn new(info: NamespaceInfo, interest: Interest, data: Data) -> Self {
		let mut content = data.content.clone();

		let (header, valid) = match info.is_meta() {
			true => (None, !content.is_empty()),
			false => match SegmentHeader::decode(&mut content) {
				Ok(header) => (Some(header), true),
				Err(err) => {
					tracing::trace!(?err, name = %data.name, "failed to decode segment header");
					(None, false)
				}
			},
		};

		Self {
			info,
			interest,
			payload: content,
			data,
			header,
			valid,
		}
	}

	pub fn info(&self) -> &NamespaceInfo {
		&self.info
	}

	pub fn interest(&self) -> &Interest {
		&self.interest
	}

	pub fn data(&self) -> &Data {
		&self.data
	}

	pub fn header(&self) -> Option<&SegmentHeader> {
		self.header.as_ref()
	}

	/// The content after the header.
	pub fn payload(&self) -> &Bytes {
		&self.payload
	}

	/// Whether the content decoded against the segment format.
	pub fn is_valid(&self) -> bool {
		self.valid
	}

	/// The number of segments of this segment's class, if the producer marked it.
	pub fn segments_count(&self) -> Option<usize> {
		let last = self.data.final_block_id.as_ref()?.to_segment()?;
		usize::try_from(last).ok()?.checked_add(1)
	}

	/// Whether this is the terminal segment of its class.
	pub fn is_last(&self) -> bool {
		self.data
			.final_block_id
			.as_ref()
			.and_then(|c| c.to_segment())
			.is_some_and(|last| last == self.info.segment_no)
	}

	/// Whether the producer answered this exact interest, rather than a cache.
	pub fn is_original(&self) -> bool {
		self.header
			.is_some_and(|header| header.interest_nonce == self.interest.nonce)
	}
}
