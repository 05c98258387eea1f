use thiserror::Error;

/// Read the value from the buffer.
///
/// If [DecodeError::Short] is returned, the buffer did not contain the whole value.
pub trait Decode: Sized {
	/// Decode the value from the given buffer.
	fn decode<B: bytes::Buf>(buf: &mut B) -> Result<Self, DecodeError>;
}

/// A decode error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
	#[error("short buffer")]
	Short,

	#[error("invalid value")]
	InvalidValue,

	#[error("invalid marker: {0:#06x}")]
	InvalidMarker(u16),

	#[error("bounds exceeded")]
	BoundsExceeded,
}

impl Decode for bool {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		match u8::decode(r)? {
			0 => Ok(false),
			1 => Ok(true),
			_ => Err(DecodeError::InvalidValue),
		}
	}
}

impl Decode for u8 {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		match r.has_remaining() {
			true => Ok(r.get_u8()),
			false => Err(DecodeError::Short),
		}
	}
}

impl Decode for u16 {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		match r.remaining() >= 2 {
			true => Ok(r.get_u16()),
			false => Err(DecodeError::Short),
		}
	}
}

impl Decode for u32 {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		match r.remaining() >= 4 {
			true => Ok(r.get_u32()),
			false => Err(DecodeError::Short),
		}
	}
}

impl Decode for u64 {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		match r.remaining() >= 8 {
			true => Ok(r.get_u64()),
			false => Err(DecodeError::Short),
		}
	}
}

impl Decode for f64 {
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		match r.remaining() >= 8 {
			true => Ok(r.get_f64()),
			false => Err(DecodeError::Short),
		}
	}
}

impl Decode for bytes::Bytes {
	/// Decode a byte string with a u32 length prefix.
	fn decode<R: bytes::Buf>(r: &mut R) -> Result<Self, DecodeError> {
		let len = u32::decode(r)? as usize;
		if r.remaining() < len {
			return Err(DecodeError::Short);
		}
		Ok(r.copy_to_bytes(len))
	}
}
