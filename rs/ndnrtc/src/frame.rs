use bytes::Bytes;
use derive_more::Debug;

use crate::coding::{Decode, DecodeError, Encode};

/// An encoded media sample, reassembled from its data segments.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
	/// Position in the combined key and delta sequence.
	pub playback_no: u64,

	/// Sequence number in the sample's own namespace, delta or key.
	pub seq_no: u64,

	/// The producer timestamp in milliseconds.
	///
	/// This is NOT a wall clock time of the consumer.
	pub timestamp: u64,

	/// Whether this frame can be decoded independently.
	pub keyframe: bool,

	/// The encoded media, format depends on the codec.
	#[debug("{} bytes", payload.len())]
	pub payload: Bytes,
}

impl Frame {
	/// Wrap an encoded sample so it can be split into segments.
	///
	/// The length prefix lets [Frame::unpack] ignore the zero padding added for FEC.
	pub fn pack(payload: &[u8]) -> Bytes {
		payload.encode_bytes()
	}

	/// Extract the encoded sample from the concatenated segment payloads.
	pub fn unpack(mut packet: Bytes) -> Result<Bytes, DecodeError> {
		Bytes::decode(&mut packet)
	}
}
